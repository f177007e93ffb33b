mod config;

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use ub_builder::{BuildContext, ProvisionStep, TracingUi, UpCloudServerApi};

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match build().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "build failed");
            ExitCode::FAILURE
        }
    }
}

async fn build() -> ub_builder::Result<()> {
    let config = AppConfig::from_env()?;
    let ssh_public_key = config.read_ssh_public_key()?;
    let api = UpCloudServerApi::from_env()?;

    let step = ProvisionStep::new(Arc::new(api), Arc::new(TracingUi));
    let mut ctx = BuildContext::new(config.build, ssh_public_key);

    let result = step.run(&mut ctx).await;

    if result.is_ok()
        && let Some(server) = &ctx.server
    {
        tracing::info!(
            server_id = %server.id,
            public_ipv4 = ?server.public_ipv4(),
            public_ipv6 = ?server.public_ipv6(),
            "build server ready"
        );
    }

    // Teardown runs whether or not provisioning succeeded.
    let report = step.cleanup(&mut ctx).await;
    if !report.is_clean() {
        tracing::warn!(stages = ?report.stages, "cleanup finished with failures");
    }

    result
}
