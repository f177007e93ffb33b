use tracing::{info, warn};

use crate::step::{BuildContext, ProvisionStep};
use crate::types::{ServerState, StateCondition, StorageDevice};
use crate::{Error, Operation, Result};

/// One step of the teardown sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStage {
    AwaitMaintenanceExit,
    FetchDetails,
    StopServer,
    DeleteServer,
    DeleteDisk,
}

/// What a failing stage means for the stages after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    Abort,
    Continue,
}

impl CleanupStage {
    pub const PIPELINE: [CleanupStage; 5] = [
        Self::AwaitMaintenanceExit,
        Self::FetchDetails,
        Self::StopServer,
        Self::DeleteServer,
        Self::DeleteDisk,
    ];

    /// Nothing may be deleted unless the server was observed stopped, so
    /// every stage up to and including the stop aborts on failure.
    pub fn on_failure(self) -> OnFailure {
        match self {
            Self::AwaitMaintenanceExit | Self::FetchDetails | Self::StopServer => OnFailure::Abort,
            Self::DeleteServer | Self::DeleteDisk => OnFailure::Continue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    Skipped,
    Failed(String),
}

/// Outcome of every stage that ran, in order. Stages after an aborting
/// failure are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub stages: Vec<(CleanupStage, StageOutcome)>,
}

impl CleanupReport {
    pub fn outcome(&self, stage: CleanupStage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, outcome)| outcome)
    }

    /// True when no stage failed. An empty report (nothing to clean) is clean.
    pub fn is_clean(&self) -> bool {
        !self
            .stages
            .iter()
            .any(|(_, outcome)| matches!(outcome, StageOutcome::Failed(_)))
    }
}

struct Teardown {
    id: String,
    title: String,
    state: ServerState,
    disk: Option<StorageDevice>,
}

impl ProvisionStep {
    /// Stop and delete the server published by `run`, then its disk.
    ///
    /// Does nothing when no server was created. Failures are reported through
    /// the `Ui` and recorded in the returned report; they never propagate.
    pub async fn cleanup(&self, ctx: &mut BuildContext) -> CleanupReport {
        let mut report = CleanupReport::default();
        let Some(server) = ctx.server.as_ref() else {
            return report;
        };

        let mut teardown = Teardown {
            id: server.id.clone(),
            title: server.title.clone(),
            state: server.state,
            disk: None,
        };

        for stage in CleanupStage::PIPELINE {
            let outcome = match self.run_stage(stage, &mut teardown, ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(server_id = %teardown.id, ?stage, error = %e, "cleanup stage failed");
                    self.ui.error(&e.to_string());
                    StageOutcome::Failed(e.to_string())
                }
            };

            let abort = matches!(outcome, StageOutcome::Failed(_))
                && stage.on_failure() == OnFailure::Abort;
            report.stages.push((stage, outcome));
            if abort {
                break;
            }
        }

        info!(server_id = %teardown.id, clean = report.is_clean(), "cleanup finished");
        report
    }

    async fn run_stage(
        &self,
        stage: CleanupStage,
        teardown: &mut Teardown,
        ctx: &mut BuildContext,
    ) -> Result<StageOutcome> {
        let timeout = ctx.config.state_timeout;
        let title = teardown.title.clone();

        match stage {
            CleanupStage::AwaitMaintenanceExit => {
                self.ui.say(&format!(
                    "Waiting for server \"{title}\" to exit the \"maintenance\" state ..."
                ));
                let current = self
                    .api
                    .wait_for_state(
                        &teardown.id,
                        StateCondition::Leave(ServerState::Maintenance),
                        timeout,
                    )
                    .await
                    .map_err(|e| Error::remote(Operation::AwaitMaintenanceExit, &title, e))?;
                teardown.state = current.state;
                Ok(StageOutcome::Completed)
            }
            CleanupStage::FetchDetails => {
                let current = self
                    .api
                    .get_server(&teardown.id)
                    .await
                    .map_err(|e| Error::remote(Operation::GetDetails, &title, e))?;
                teardown.state = current.state;
                teardown.disk = current.first_disk().cloned();
                ctx.server = Some(current);
                Ok(StageOutcome::Completed)
            }
            CleanupStage::StopServer => {
                if teardown.state == ServerState::Stopped {
                    return Ok(StageOutcome::Skipped);
                }

                self.ui.say(&format!("Stopping server \"{title}\" ..."));
                self.api
                    .stop_server(&teardown.id)
                    .await
                    .map_err(|e| Error::remote(Operation::StopServer, &title, e))?;

                self.ui.say(&format!(
                    "Waiting for server \"{title}\" to enter the \"stopped\" state ..."
                ));
                let stopped = self
                    .api
                    .wait_for_state(&teardown.id, StateCondition::Reach(ServerState::Stopped), timeout)
                    .await
                    .map_err(|e| Error::remote(Operation::AwaitStopped, &title, e))?;
                teardown.state = stopped.state;
                ctx.server = Some(stopped);
                Ok(StageOutcome::Completed)
            }
            CleanupStage::DeleteServer => {
                self.ui.say(&format!("Deleting server \"{title}\" ..."));
                self.api
                    .delete_server(&teardown.id)
                    .await
                    .map_err(|e| Error::remote(Operation::DeleteServer, &title, e))?;
                teardown.state = ServerState::Deleted;
                if let Some(server) = ctx.server.as_mut() {
                    server.state = ServerState::Deleted;
                }
                Ok(StageOutcome::Completed)
            }
            CleanupStage::DeleteDisk => {
                let Some(disk) = teardown.disk.as_ref() else {
                    return Ok(StageOutcome::Skipped);
                };

                self.ui.say(&format!("Deleting disk \"{}\" ...", disk.title));
                self.api
                    .delete_storage(&disk.id)
                    .await
                    .map_err(|e| Error::remote(Operation::DeleteDisk, &disk.title, e))?;
                Ok(StageOutcome::Completed)
            }
        }
    }
}
