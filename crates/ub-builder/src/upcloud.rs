use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use upcloud_api::{UpCloudClient, WaitForServerStateRequest};

use crate::types::{
    Access, IpAddress, IpFamily, Plan, ProvisionRequest, ServerHandle, ServerState,
    StateCondition, StorageDevice, StorageKind,
};
use crate::{Error, Result, ServerApi};

/// `ServerApi` backed by the UpCloud REST API.
pub struct UpCloudServerApi {
    client: UpCloudClient,
}

impl UpCloudServerApi {
    pub fn new(client: UpCloudClient) -> Self {
        Self { client }
    }

    /// Create from env vars: `UPCLOUD_API_USER` and `UPCLOUD_API_PASSWORD` (both required).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::MissingEnv(key.into()))
        };

        let username = var("UPCLOUD_API_USER")?;
        let password = var("UPCLOUD_API_PASSWORD")?;

        let client = UpCloudClient::new(username, password)
            .map_err(|e| Error::InvalidConfig(format!("upcloud http client: {e}")))?;
        Ok(Self::new(client))
    }

    fn to_handle(details: upcloud_api::ServerDetails) -> ServerHandle {
        let storage_devices = details
            .storage_devices
            .storage_device
            .into_iter()
            .map(|device| StorageDevice {
                kind: StorageKind::parse(&device.kind),
                id: device.uuid,
                title: device.title,
            })
            .collect();

        let ip_addresses = details
            .ip_addresses
            .ip_address
            .into_iter()
            .filter_map(|ip| {
                let access = match ip.access.as_str() {
                    "private" => Access::Private,
                    "public" => Access::Public,
                    "utility" => Access::Utility,
                    _ => return None,
                };
                let family = match ip.family.as_str() {
                    "IPv4" => IpFamily::V4,
                    "IPv6" => IpFamily::V6,
                    _ => return None,
                };
                Some(IpAddress {
                    access,
                    family,
                    address: ip.address,
                })
            })
            .collect();

        ServerHandle {
            state: ServerState::parse(&details.state),
            id: details.uuid,
            title: details.title,
            storage_devices,
            ip_addresses,
        }
    }

    fn create_request(req: &ProvisionRequest) -> upcloud_api::CreateServerRequest {
        upcloud_api::CreateServerRequest {
            zone: req.zone.clone(),
            title: req.title.clone(),
            hostname: req.hostname.clone(),
            plan: req.plan.clone(),
            core_number: Some(req.core_number).filter(|n| *n > 0),
            memory_amount: Some(req.memory_amount).filter(|n| *n > 0),
            password_delivery: req.password_delivery.as_str().into(),
            login_user: upcloud_api::LoginUser {
                create_password: (if req.login_user.create_password { "yes" } else { "no" }).into(),
                username: req.login_user.username.clone(),
                ssh_keys: upcloud_api::SshKeys {
                    ssh_key: req.login_user.ssh_keys.clone(),
                },
            },
            storage_devices: upcloud_api::CreateStorageDevices {
                storage_device: vec![upcloud_api::CreateStorageDevice {
                    action: "clone".into(),
                    storage: req.storage.source.clone(),
                    title: req.storage.title.clone(),
                    size: req.storage.size,
                    tier: req.storage.tier.as_str().into(),
                }],
            },
            ip_addresses: upcloud_api::CreateIpAddresses {
                ip_address: req
                    .network_interfaces
                    .iter()
                    .map(|iface| upcloud_api::CreateIpAddress {
                        access: iface.access.as_str().into(),
                        family: iface.family.as_str().into(),
                    })
                    .collect(),
            },
        }
    }
}

#[async_trait]
impl ServerApi for UpCloudServerApi {
    async fn list_plans(&self) -> upcloud_api::Result<Vec<Plan>> {
        let plans = self.client.get_plans().await?;
        Ok(plans
            .into_iter()
            .map(|plan| Plan {
                name: plan.name,
                core_number: plan.core_number,
                memory_amount: plan.memory_amount,
                storage_size: plan.storage_size,
            })
            .collect())
    }

    async fn create_server(&self, req: &ProvisionRequest) -> upcloud_api::Result<ServerHandle> {
        let details = self.client.create_server(&Self::create_request(req)).await?;
        info!(server_id = %details.uuid, zone = %req.zone, "upcloud: server created");
        Ok(Self::to_handle(details))
    }

    async fn get_server(&self, id: &str) -> upcloud_api::Result<ServerHandle> {
        let details = self.client.get_server_details(id).await?;
        Ok(Self::to_handle(details))
    }

    async fn wait_for_state(
        &self,
        id: &str,
        condition: StateCondition,
        timeout: Duration,
    ) -> upcloud_api::Result<ServerHandle> {
        let (desired_state, undesired_state) = match condition {
            StateCondition::Reach(state) => (Some(state.as_str().to_string()), None),
            StateCondition::Leave(state) => (None, Some(state.as_str().to_string())),
        };

        let details = self
            .client
            .wait_for_server_state(&WaitForServerStateRequest {
                uuid: id.to_string(),
                desired_state,
                undesired_state,
                timeout,
            })
            .await?;

        info!(server_id = %id, state = %details.state, "upcloud: wait finished");
        Ok(Self::to_handle(details))
    }

    async fn stop_server(&self, id: &str) -> upcloud_api::Result<()> {
        self.client.stop_server(id).await?;
        info!(server_id = %id, "upcloud: server stop requested");
        Ok(())
    }

    async fn delete_server(&self, id: &str) -> upcloud_api::Result<()> {
        self.client.delete_server(id).await?;
        info!(server_id = %id, "upcloud: server deleted");
        Ok(())
    }

    async fn delete_storage(&self, id: &str) -> upcloud_api::Result<()> {
        self.client.delete_storage(id).await?;
        info!(storage_id = %id, "upcloud: storage deleted");
        Ok(())
    }
}
