//! Provisioning of a single throwaway UpCloud server used as a disk-image
//! build target, and its guaranteed teardown.

pub mod cleanup;
pub mod config;
pub mod plan;
pub mod step;
pub mod types;
pub mod ui;
pub mod upcloud;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use async_trait::async_trait;

pub use cleanup::{CleanupReport, CleanupStage, OnFailure, StageOutcome};
pub use config::BuildConfig;
pub use plan::{DEFAULT_PLAN, coalesce_positive, resolve_plan, select_plan};
pub use step::{BuildContext, ProvisionStep};
pub use types::{
    Plan, PlanSelection, ProvisionRequest, ServerHandle, ServerState, Sizing, StateCondition,
    StorageDevice, StorageKind,
};
pub use ui::{TracingUi, Ui};
pub use upcloud::UpCloudServerApi;

/// Remote lifecycle operation, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListPlans,
    CreateServer,
    AwaitStarted,
    AwaitMaintenanceExit,
    GetDetails,
    StopServer,
    AwaitStopped,
    DeleteServer,
    DeleteDisk,
}

impl Operation {
    pub fn describe(&self, target: &str) -> String {
        match self {
            Self::ListPlans => format!("list plans for \"{target}\""),
            Self::CreateServer => format!("create server \"{target}\""),
            Self::AwaitStarted => {
                format!("wait for server \"{target}\" to enter the \"started\" state")
            }
            Self::AwaitMaintenanceExit => {
                format!("wait for server \"{target}\" to exit the \"maintenance\" state")
            }
            Self::GetDetails => format!("get details for server \"{target}\""),
            Self::StopServer => format!("stop server \"{target}\""),
            Self::AwaitStopped => {
                format!("wait for server \"{target}\" to enter the \"stopped\" state")
            }
            Self::DeleteServer => format!("delete server \"{target}\""),
            Self::DeleteDisk => format!("delete disk \"{target}\""),
        }
    }
}

fn describe(operation: &Operation, target: &str) -> String {
    operation.describe(target)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("plan '{0}' not found")]
    PlanNotFound(String),

    #[error("failed to {}: {source}", describe(.operation, .target))]
    Remote {
        operation: Operation,
        target: String,
        #[source]
        source: upcloud_api::Error,
    },

    #[error("timed out after {waited:?} trying to {}", describe(.operation, .target))]
    Timeout {
        operation: Operation,
        target: String,
        waited: Duration,
    },

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attach the failing operation and resource title to a provider error.
    /// Expired bounded waits become `Timeout`.
    pub fn remote(
        operation: Operation,
        target: impl Into<String>,
        source: upcloud_api::Error,
    ) -> Self {
        match source {
            upcloud_api::Error::Timeout { waited, .. } => Self::Timeout {
                operation,
                target: target.into(),
                waited,
            },
            source => Self::Remote {
                operation,
                target: target.into(),
                source,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Remote resource API the provisioning step drives.
///
/// `UpCloudServerApi` is the production implementation. Every call is a
/// single request except `wait_for_state`, which polls until `condition`
/// holds or `timeout` elapses and then fails with `upcloud_api::Error::Timeout`.
#[async_trait]
pub trait ServerApi: Send + Sync {
    async fn list_plans(&self) -> upcloud_api::Result<Vec<Plan>>;

    async fn create_server(&self, req: &ProvisionRequest) -> upcloud_api::Result<ServerHandle>;

    async fn get_server(&self, id: &str) -> upcloud_api::Result<ServerHandle>;

    async fn wait_for_state(
        &self,
        id: &str,
        condition: StateCondition,
        timeout: Duration,
    ) -> upcloud_api::Result<ServerHandle>;

    async fn stop_server(&self, id: &str) -> upcloud_api::Result<()>;

    async fn delete_server(&self, id: &str) -> upcloud_api::Result<()>;

    async fn delete_storage(&self, id: &str) -> upcloud_api::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_name_operation_and_resource() {
        let err = Error::remote(
            Operation::DeleteServer,
            "upcloud-builder-1",
            upcloud_api::Error::Api {
                endpoint: "delete server",
                status: upcloud_api::StatusCode::CONFLICT,
                body: "SERVER_STATE_ILLEGAL".into(),
            },
        );

        let msg = err.to_string();
        assert!(msg.starts_with("failed to delete server \"upcloud-builder-1\""), "{msg}");
        assert!(msg.contains("SERVER_STATE_ILLEGAL"), "{msg}");
    }

    #[test]
    fn expired_waits_become_timeouts() {
        let err = Error::remote(
            Operation::AwaitStarted,
            "upcloud-builder-1",
            upcloud_api::Error::Timeout {
                uuid: "00a1".into(),
                waited: Duration::from_secs(300),
            },
        );

        assert!(matches!(
            err,
            Error::Timeout { operation: Operation::AwaitStarted, waited, .. }
                if waited == Duration::from_secs(300)
        ));
        assert_eq!(
            err.to_string(),
            "timed out after 300s trying to wait for server \"upcloud-builder-1\" to enter the \"started\" state"
        );
    }
}
