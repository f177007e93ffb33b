use std::time::Duration;

use serde::{Deserialize, Serialize};

// ── Plan types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Plan {
    pub name: String,
    pub core_number: i32,
    pub memory_amount: i32,
    pub storage_size: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlansResponse {
    pub plans: PlanList,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlanList {
    #[serde(default)]
    pub plan: Vec<Plan>,
}

// ── Server types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub zone: String,
    pub title: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_amount: Option<i32>,
    pub password_delivery: String,
    pub login_user: LoginUser,
    pub storage_devices: CreateStorageDevices,
    pub ip_addresses: CreateIpAddresses,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginUser {
    pub create_password: String,
    pub username: String,
    pub ssh_keys: SshKeys,
}

#[derive(Debug, Clone, Serialize)]
pub struct SshKeys {
    pub ssh_key: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateStorageDevices {
    pub storage_device: Vec<CreateStorageDevice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateStorageDevice {
    pub action: String,
    pub storage: String,
    pub title: String,
    pub size: i32,
    pub tier: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateIpAddresses {
    pub ip_address: Vec<CreateIpAddress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateIpAddress {
    pub access: String,
    pub family: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ServerEnvelope<'a> {
    pub server: &'a CreateServerRequest,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerResponse {
    pub server: ServerDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerDetails {
    pub uuid: String,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub storage_devices: StorageDeviceList,
    #[serde(default)]
    pub ip_addresses: IpAddressList,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageDeviceList {
    #[serde(default)]
    pub storage_device: Vec<ServerStorageDevice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerStorageDevice {
    #[serde(rename = "storage")]
    pub uuid: String,
    #[serde(rename = "storage_title", default)]
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpAddressList {
    #[serde(default)]
    pub ip_address: Vec<IpAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpAddress {
    pub access: String,
    pub family: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StopServerEnvelope {
    pub stop_server: StopServer,
}

#[derive(Debug, Serialize)]
pub(crate) struct StopServer {
    pub stop_type: &'static str,
    pub timeout: String,
}

// ── State waits ──────────────────────────────────────────────────────

/// Poll target for `wait_for_server_state`.
///
/// With `desired_state` set the wait ends once the server reports that state.
/// With `undesired_state` set it ends once the server reports anything else.
#[derive(Debug, Clone)]
pub struct WaitForServerStateRequest {
    pub uuid: String,
    pub desired_state: Option<String>,
    pub undesired_state: Option<String>,
    pub timeout: Duration,
}

impl WaitForServerStateRequest {
    pub fn is_satisfied_by(&self, state: &str) -> bool {
        if let Some(desired) = &self.desired_state
            && desired != state
        {
            return false;
        }
        if let Some(undesired) = &self.undesired_state
            && undesired == state
        {
            return false;
        }
        true
    }
}
