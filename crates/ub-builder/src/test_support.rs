//! In-memory `ServerApi` and `Ui` doubles shared by the unit tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::BuildConfig;
use crate::types::{
    Plan, ProvisionRequest, ServerHandle, ServerState, StateCondition, StorageDevice, StorageKind,
};
use crate::ui::Ui;
use crate::ServerApi;

pub fn config() -> BuildConfig {
    BuildConfig {
        zone: "fi-hel1".into(),
        plan: None,
        cpu: 0,
        memory: 0,
        storage_uuid: "01000000-0000-4000-8000-000030220200".into(),
        storage_size: 0,
        state_timeout: Duration::from_secs(300),
        ssh_username: "root".into(),
    }
}

pub fn plan(name: &str, core_number: i32, memory_amount: i32, storage_size: i32) -> Plan {
    Plan {
        name: name.into(),
        core_number,
        memory_amount,
        storage_size,
    }
}

pub fn handle(state: ServerState) -> ServerHandle {
    ServerHandle {
        id: FakeApi::SERVER_ID.into(),
        title: "upcloud-builder-1700000000".into(),
        state,
        storage_devices: vec![StorageDevice {
            id: FakeApi::DISK_ID.into(),
            title: "upcloud-builder-1700000000-disk1".into(),
            kind: StorageKind::Disk,
        }],
        ip_addresses: vec![],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListPlans,
    CreateServer(ProvisionRequest),
    GetServer(String),
    WaitForState(String, StateCondition),
    StopServer(String),
    DeleteServer(String),
    DeleteStorage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ListPlans,
    CreateServer,
    AwaitStarted,
    AwaitMaintenanceExit,
    GetServer,
    StopServer,
    AwaitStopped,
    DeleteServer,
    DeleteStorage,
}

/// Scripted provider: every call is recorded, selected calls fail.
///
/// Waits succeed immediately with the target state unless scripted to fail,
/// in which case they report a timeout.
pub struct FakeApi {
    plans: Vec<Plan>,
    state: ServerState,
    with_disk: bool,
    failures: HashSet<FailPoint>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub const SERVER_ID: &'static str = "0077fa3d-32db-4b09-9f5f-30d9e9afb565";
    pub const DISK_ID: &'static str = "01d4fcd4-e446-433b-8a9c-551a1284952e";

    pub fn new() -> Self {
        Self {
            plans: Vec::new(),
            state: ServerState::Started,
            with_disk: true,
            failures: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_plans(mut self, plans: Vec<Plan>) -> Self {
        self.plans = plans;
        self
    }

    /// State reported by `get_server`.
    pub fn with_state(mut self, state: ServerState) -> Self {
        self.state = state;
        self
    }

    pub fn without_disk(mut self) -> Self {
        self.with_disk = false;
        self
    }

    pub fn failing(mut self, point: FailPoint) -> Self {
        self.failures.insert(point);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn server(&self, state: ServerState) -> ServerHandle {
        let mut server = handle(state);
        if !self.with_disk {
            server.storage_devices.clear();
        }
        server
    }

    fn check(&self, point: FailPoint, endpoint: &'static str) -> upcloud_api::Result<()> {
        if self.failures.contains(&point) {
            return Err(upcloud_api::Error::Api {
                endpoint,
                status: upcloud_api::StatusCode::INTERNAL_SERVER_ERROR,
                body: "scripted failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ServerApi for FakeApi {
    async fn list_plans(&self) -> upcloud_api::Result<Vec<Plan>> {
        self.record(Call::ListPlans);
        self.check(FailPoint::ListPlans, "list plans")?;
        Ok(self.plans.clone())
    }

    async fn create_server(&self, req: &ProvisionRequest) -> upcloud_api::Result<ServerHandle> {
        self.record(Call::CreateServer(req.clone()));
        self.check(FailPoint::CreateServer, "create server")?;
        let mut server = self.server(ServerState::Maintenance);
        server.title = req.title.clone();
        Ok(server)
    }

    async fn get_server(&self, id: &str) -> upcloud_api::Result<ServerHandle> {
        self.record(Call::GetServer(id.into()));
        self.check(FailPoint::GetServer, "get server")?;
        Ok(self.server(self.state))
    }

    async fn wait_for_state(
        &self,
        id: &str,
        condition: StateCondition,
        timeout: Duration,
    ) -> upcloud_api::Result<ServerHandle> {
        self.record(Call::WaitForState(id.into(), condition));

        let point = match condition {
            StateCondition::Reach(ServerState::Stopped) => FailPoint::AwaitStopped,
            StateCondition::Leave(_) => FailPoint::AwaitMaintenanceExit,
            StateCondition::Reach(_) => FailPoint::AwaitStarted,
        };
        if self.failures.contains(&point) {
            return Err(upcloud_api::Error::Timeout {
                uuid: id.into(),
                waited: timeout,
            });
        }

        let state = match condition {
            StateCondition::Reach(state) => state,
            StateCondition::Leave(state) if self.state == state => ServerState::Started,
            StateCondition::Leave(_) => self.state,
        };
        Ok(self.server(state))
    }

    async fn stop_server(&self, id: &str) -> upcloud_api::Result<()> {
        self.record(Call::StopServer(id.into()));
        self.check(FailPoint::StopServer, "stop server")
    }

    async fn delete_server(&self, id: &str) -> upcloud_api::Result<()> {
        self.record(Call::DeleteServer(id.into()));
        self.check(FailPoint::DeleteServer, "delete server")
    }

    async fn delete_storage(&self, id: &str) -> upcloud_api::Result<()> {
        self.record(Call::DeleteStorage(id.into()));
        self.check(FailPoint::DeleteStorage, "delete storage")
    }
}

#[derive(Default)]
pub struct RecordingUi {
    said: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingUi {
    pub fn said(&self) -> Vec<String> {
        self.said.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Ui for RecordingUi {
    fn say(&self, message: &str) {
        self.said.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}
