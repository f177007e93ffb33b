//! Typed Rust client for the UpCloud REST API.
//!
//! Covers the subset needed for short-lived build servers:
//! plans (list), servers (create, get, stop, delete, wait for state)
//! and storages (delete).

mod types;

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use tokio::time::Instant;
use tracing::debug;

pub use reqwest::StatusCode;
pub use types::*;

const BASE_URL: &str = "https://api.upcloud.com/1.3";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const STOP_TIMEOUT_SECS: u32 = 60;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("upcloud api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upcloud api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("server {uuid} did not reach the expected state within {waited:?}")]
    Timeout { uuid: String, waited: Duration },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the UpCloud REST API, authenticated with an API sub-account.
#[derive(Clone)]
pub struct UpCloudClient {
    auth: String,
    base_url: String,
    poll_interval: Duration,
    http: reqwest::Client,
}

impl UpCloudClient {
    /// Every request is bounded by a 30 s client-side timeout.
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Result<Self> {
        let credentials =
            BASE64_STANDARD.encode(format!("{}:{}", username.as_ref(), password.as_ref()));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            auth: format!("Basic {credentials}"),
            base_url: BASE_URL.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            http,
        })
    }

    /// Point the client at another endpoint, e.g. a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Delay between two polls in `wait_for_server_state`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    // ── Plans ────────────────────────────────────────────────────────

    pub async fn get_plans(&self) -> Result<Vec<Plan>> {
        let resp = self
            .http
            .get(self.url("/plan"))
            .header("Authorization", &self.auth)
            .send()
            .await?;

        let plans: PlansResponse = Self::check(resp, "list plans").await?.json().await?;
        Ok(plans.plans.plan)
    }

    // ── Servers ──────────────────────────────────────────────────────

    pub async fn create_server(&self, req: &CreateServerRequest) -> Result<ServerDetails> {
        let resp = self
            .http
            .post(self.url("/server"))
            .header("Authorization", &self.auth)
            .json(&ServerEnvelope { server: req })
            .send()
            .await?;

        let created: ServerResponse = Self::check(resp, "create server").await?.json().await?;
        Ok(created.server)
    }

    pub async fn get_server_details(&self, uuid: &str) -> Result<ServerDetails> {
        let resp = self
            .http
            .get(self.url(&format!("/server/{uuid}")))
            .header("Authorization", &self.auth)
            .send()
            .await?;

        let details: ServerResponse = Self::check(resp, "get server").await?.json().await?;
        Ok(details.server)
    }

    /// Request a soft shutdown. The server keeps running until the
    /// hypervisor confirms; use `wait_for_server_state` to observe it.
    pub async fn stop_server(&self, uuid: &str) -> Result<ServerDetails> {
        let resp = self
            .http
            .post(self.url(&format!("/server/{uuid}/stop")))
            .header("Authorization", &self.auth)
            .json(&StopServerEnvelope {
                stop_server: StopServer {
                    stop_type: "soft",
                    timeout: STOP_TIMEOUT_SECS.to_string(),
                },
            })
            .send()
            .await?;

        let details: ServerResponse = Self::check(resp, "stop server").await?.json().await?;
        Ok(details.server)
    }

    pub async fn delete_server(&self, uuid: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/server/{uuid}")))
            .header("Authorization", &self.auth)
            .send()
            .await?;

        Self::check(resp, "delete server").await?;
        Ok(())
    }

    /// Poll the server until `req` is satisfied or `req.timeout` elapses.
    ///
    /// A poll still in flight at the deadline is abandoned.
    pub async fn wait_for_server_state(
        &self,
        req: &WaitForServerStateRequest,
    ) -> Result<ServerDetails> {
        let started = Instant::now();
        let timed_out = || Error::Timeout {
            uuid: req.uuid.clone(),
            waited: req.timeout,
        };

        loop {
            let remaining = req.timeout.saturating_sub(started.elapsed());
            let details = tokio::time::timeout(remaining, self.get_server_details(&req.uuid))
                .await
                .map_err(|_| timed_out())??;

            debug!(
                server_id = %req.uuid,
                state = %details.state,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "polling server state"
            );

            if req.is_satisfied_by(&details.state) {
                return Ok(details);
            }

            let elapsed = started.elapsed();
            if elapsed >= req.timeout {
                return Err(timed_out());
            }

            let remaining = req.timeout - elapsed;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }

    // ── Storages ─────────────────────────────────────────────────────

    pub async fn delete_storage(&self, uuid: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/storage/{uuid}")))
            .header("Authorization", &self.auth)
            .send()
            .await?;

        Self::check(resp, "delete storage").await?;
        Ok(())
    }
}
