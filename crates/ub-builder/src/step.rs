use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::config::BuildConfig;
use crate::plan::resolve_plan;
use crate::types::{ProvisionRequest, ServerHandle, ServerState, StateCondition};
use crate::ui::Ui;
use crate::{Error, Operation, Result, ServerApi};

/// Per-build state shared between `ProvisionStep::run` and
/// `ProvisionStep::cleanup`.
///
/// `server` is set as soon as the provider accepts the create call, so a
/// later cleanup can reap a server that never became ready.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub config: BuildConfig,
    pub ssh_public_key: String,
    pub server: Option<ServerHandle>,
}

impl BuildContext {
    pub fn new(config: BuildConfig, ssh_public_key: impl Into<String>) -> Self {
        Self {
            config,
            ssh_public_key: ssh_public_key.into(),
            server: None,
        }
    }
}

/// Creates the build server and tears it down again.
pub struct ProvisionStep {
    pub(crate) api: Arc<dyn ServerApi>,
    pub(crate) ui: Arc<dyn Ui>,
}

impl ProvisionStep {
    pub fn new(api: Arc<dyn ServerApi>, ui: Arc<dyn Ui>) -> Self {
        Self { api, ui }
    }

    /// Resolve the plan, create the server and wait for it to start.
    ///
    /// An `Err` means the build must halt. The failure has already been
    /// reported through the `Ui`.
    pub async fn run(&self, ctx: &mut BuildContext) -> Result<()> {
        match self.provision(ctx).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(error = %e, "provisioning failed");
                self.ui.error(&e.to_string());
                Err(e)
            }
        }
    }

    async fn provision(&self, ctx: &mut BuildContext) -> Result<()> {
        let selection = resolve_plan(self.api.as_ref(), &ctx.config).await?;
        let sizing = selection.sizing(&ctx.config);
        let request =
            ProvisionRequest::new(&ctx.config, &selection, sizing, &ctx.ssh_public_key, Utc::now());

        self.ui.say(&format!("Creating server \"{}\" ...", request.title));
        let created = self
            .api
            .create_server(&request)
            .await
            .map_err(|e| Error::remote(Operation::CreateServer, &request.title, e))?;

        let id = created.id.clone();
        let title = created.title.clone();
        info!(server_id = %id, title = %title, "server created");
        ctx.server = Some(created);

        self.ui.say(&format!(
            "Waiting for server \"{title}\" to enter the \"started\" state ..."
        ));
        let started = self
            .api
            .wait_for_state(
                &id,
                StateCondition::Reach(ServerState::Started),
                ctx.config.state_timeout,
            )
            .await
            .map_err(|e| Error::remote(Operation::AwaitStarted, &title, e))?;
        ctx.server = Some(started);

        self.ui.say(&format!("Server \"{title}\" is now in \"started\" state"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, FailPoint, FakeApi, RecordingUi, config, plan};
    use pretty_assertions::assert_eq;

    fn step(api: &Arc<FakeApi>, ui: &Arc<RecordingUi>) -> ProvisionStep {
        ProvisionStep::new(api.clone(), ui.clone())
    }

    fn context() -> BuildContext {
        BuildContext::new(config(), "ssh-ed25519 AAAAC3 builder")
    }

    #[tokio::test]
    async fn named_plan_provisions_and_waits_for_started() {
        let api = Arc::new(FakeApi::new().with_plans(vec![plan("1xCPU-1GB", 1, 1024, 10)]));
        let ui = Arc::new(RecordingUi::default());
        let mut ctx = context();
        ctx.config.plan = Some("1xCPU-1GB".into());

        step(&api, &ui).run(&mut ctx).await.unwrap();

        let calls = api.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], Call::ListPlans);
        let Call::CreateServer(req) = &calls[1] else {
            panic!("expected create, got {:?}", calls[1]);
        };
        assert_eq!(req.plan.as_deref(), Some("1xCPU-1GB"));
        assert_eq!(req.storage.size, 10);
        assert_eq!(req.login_user.ssh_keys, vec![ctx.ssh_public_key.clone()]);
        assert_eq!(
            calls[2],
            Call::WaitForState(
                FakeApi::SERVER_ID.into(),
                StateCondition::Reach(ServerState::Started)
            )
        );

        let server = ctx.server.as_ref().unwrap();
        assert_eq!(server.state, ServerState::Started);
        assert!(ui.errors().is_empty());
        assert_eq!(ui.said().len(), 3);
    }

    #[tokio::test]
    async fn unmatched_sizing_falls_back_to_config_values() {
        let api = Arc::new(FakeApi::new().with_plans(vec![plan("1xCPU-1GB", 1, 1024, 10)]));
        let ui = Arc::new(RecordingUi::default());
        let mut ctx = context();
        ctx.config.cpu = 2;
        ctx.config.memory = 2048;

        step(&api, &ui).run(&mut ctx).await.unwrap();

        let Call::CreateServer(req) = &api.calls()[1] else {
            panic!("expected create");
        };
        assert_eq!(req.plan, None);
        assert_eq!((req.core_number, req.memory_amount), (2, 2048));
    }

    #[tokio::test]
    async fn unknown_plan_halts_before_create() {
        let api = Arc::new(FakeApi::new().with_plans(vec![plan("1xCPU-1GB", 1, 1024, 10)]));
        let ui = Arc::new(RecordingUi::default());
        let mut ctx = context();
        ctx.config.plan = Some("16xCPU-64GB".into());

        let err = step(&api, &ui).run(&mut ctx).await.unwrap_err();

        assert!(matches!(err, Error::PlanNotFound(_)));
        assert_eq!(api.calls(), vec![Call::ListPlans]);
        assert!(ctx.server.is_none());
        assert_eq!(ui.errors().len(), 1);
    }

    #[tokio::test]
    async fn create_failure_leaves_nothing_to_clean() {
        let api = Arc::new(FakeApi::new().failing(FailPoint::CreateServer));
        let ui = Arc::new(RecordingUi::default());
        let mut ctx = context();

        let err = step(&api, &ui).run(&mut ctx).await.unwrap_err();

        assert!(matches!(err, Error::Remote { operation: Operation::CreateServer, .. }));
        assert!(ctx.server.is_none());
        assert!(ui.errors()[0].contains("create server"));
    }

    #[tokio::test]
    async fn started_timeout_keeps_handle_published() {
        let api = Arc::new(FakeApi::new().failing(FailPoint::AwaitStarted));
        let ui = Arc::new(RecordingUi::default());
        let mut ctx = context();

        let err = step(&api, &ui).run(&mut ctx).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Timeout { operation: Operation::AwaitStarted, waited, .. }
                if waited == ctx.config.state_timeout
        ));
        let server = ctx.server.as_ref().expect("handle must survive a failed wait");
        assert_eq!(server.id, FakeApi::SERVER_ID);
        assert_eq!(server.state, ServerState::Maintenance);
        assert!(ui.errors()[0].contains(&server.title));
    }

    #[tokio::test]
    async fn started_timeout_is_reported_as_a_wait_failure() {
        let api = Arc::new(FakeApi::new().failing(FailPoint::AwaitStarted));
        let ui = Arc::new(RecordingUi::default());
        let mut ctx = context();

        step(&api, &ui).run(&mut ctx).await.unwrap_err();

        let errors = ui.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("timed out after"), "{}", errors[0]);
        assert!(errors[0].contains("to enter the \"started\" state"));
        assert!(!errors[0].contains("creat"));
    }
}
