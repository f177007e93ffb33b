use std::fmt;

use chrono::{DateTime, Utc};

use crate::config::BuildConfig;
use crate::plan::coalesce_positive;

/// Prefix of every build server title and hostname.
pub const TITLE_PREFIX: &str = "upcloud-builder";

/// Storage size in GiB used when neither the plan nor the config sets one.
pub const DEFAULT_STORAGE_SIZE: i32 = 10;

/// A named bundle of cores, memory (MiB) and default storage (GiB) from the
/// provider's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub name: String,
    pub core_number: i32,
    pub memory_amount: i32,
    pub storage_size: i32,
}

/// Outcome of plan resolution.
///
/// `Custom` means no catalog entry applies and the configured CPU and memory
/// are sent as-is. It is returned both when an explicit CPU/memory pair has no
/// exact match and when the default plan is missing from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSelection {
    Named(Plan),
    Custom,
}

impl PlanSelection {
    pub fn plan_name(&self) -> Option<&str> {
        match self {
            Self::Named(plan) => Some(&plan.name),
            Self::Custom => None,
        }
    }

    /// Effective sizing: positive config values override the plan, and the
    /// storage size never drops below `DEFAULT_STORAGE_SIZE` when unset.
    pub fn sizing(&self, config: &BuildConfig) -> Sizing {
        let (core_number, memory_amount, storage_size) = match self {
            Self::Named(plan) => (plan.core_number, plan.memory_amount, plan.storage_size),
            Self::Custom => (0, 0, 0),
        };

        let mut storage_size = coalesce_positive(storage_size, config.storage_size);
        if storage_size <= 0 {
            storage_size = DEFAULT_STORAGE_SIZE;
        }

        Sizing {
            core_number: coalesce_positive(core_number, config.cpu),
            memory_amount: coalesce_positive(memory_amount, config.memory),
            storage_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizing {
    pub core_number: i32,
    pub memory_amount: i32,
    pub storage_size: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    MaxIops,
}

impl StorageTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxIops => "maxiops",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Private,
    Public,
    Utility,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
            Self::Utility => "utility",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V4 => "IPv4",
            Self::V6 => "IPv6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInterface {
    pub access: Access,
    pub family: IpFamily,
}

/// Every build server gets a private IPv4 plus public IPv4 and IPv6.
pub const NETWORK_INTERFACES: [NetworkInterface; 3] = [
    NetworkInterface {
        access: Access::Private,
        family: IpFamily::V4,
    },
    NetworkInterface {
        access: Access::Public,
        family: IpFamily::V4,
    },
    NetworkInterface {
        access: Access::Public,
        family: IpFamily::V6,
    },
];

/// Disk cloned from an existing storage (template or image) at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageClone {
    pub source: String,
    pub title: String,
    pub size: i32,
    pub tier: StorageTier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginUser {
    pub username: String,
    pub ssh_keys: Vec<String>,
    pub create_password: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordDelivery {
    None,
}

impl PasswordDelivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
        }
    }
}

/// Everything needed to create the build server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub title: String,
    pub hostname: String,
    pub zone: String,
    pub core_number: i32,
    pub memory_amount: i32,
    pub plan: Option<String>,
    pub storage: StorageClone,
    pub network_interfaces: Vec<NetworkInterface>,
    pub login_user: LoginUser,
    pub password_delivery: PasswordDelivery,
}

impl ProvisionRequest {
    pub fn new(
        config: &BuildConfig,
        selection: &PlanSelection,
        sizing: Sizing,
        ssh_public_key: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let title = format!("{TITLE_PREFIX}-{}", now.timestamp());

        Self {
            hostname: title.clone(),
            zone: config.zone.clone(),
            core_number: sizing.core_number,
            memory_amount: sizing.memory_amount,
            plan: selection.plan_name().map(String::from),
            storage: StorageClone {
                source: config.storage_uuid.clone(),
                title: format!("{title}-disk1"),
                size: sizing.storage_size,
                tier: StorageTier::MaxIops,
            },
            network_interfaces: NETWORK_INTERFACES.to_vec(),
            login_user: LoginUser {
                username: config.ssh_username.clone(),
                ssh_keys: vec![ssh_public_key.to_string()],
                create_password: false,
            },
            password_delivery: PasswordDelivery::None,
            title,
        }
    }
}

/// Provider-reported server state. `Deleted` is only ever set locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Started,
    Stopped,
    Maintenance,
    Error,
    Deleted,
    Unknown,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Maintenance => "maintenance",
            Self::Error => "error",
            Self::Deleted => "deleted",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(state: &str) -> Self {
        match state {
            "started" => Self::Started,
            "stopped" => Self::Stopped,
            "maintenance" => Self::Maintenance,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCondition {
    /// Wait until the server reports this state.
    Reach(ServerState),
    /// Wait until the server reports any other state.
    Leave(ServerState),
}

impl StateCondition {
    pub fn is_satisfied_by(&self, state: ServerState) -> bool {
        match self {
            Self::Reach(target) => state == *target,
            Self::Leave(target) => state != *target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Disk,
    Cdrom,
    Template,
    Other,
}

impl StorageKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "disk" => Self::Disk,
            "cdrom" => Self::Cdrom,
            "template" => Self::Template,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDevice {
    pub id: String,
    pub title: String,
    pub kind: StorageKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAddress {
    pub access: Access,
    pub family: IpFamily,
    pub address: String,
}

/// Durable record of the created server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandle {
    pub id: String,
    pub title: String,
    pub state: ServerState,
    pub storage_devices: Vec<StorageDevice>,
    pub ip_addresses: Vec<IpAddress>,
}

impl ServerHandle {
    /// First attached device of type disk; the only storage reaped on cleanup.
    pub fn first_disk(&self) -> Option<&StorageDevice> {
        self.storage_devices
            .iter()
            .find(|device| device.kind == StorageKind::Disk)
    }

    pub fn public_ipv4(&self) -> Option<&str> {
        self.public_address(IpFamily::V4)
    }

    pub fn public_ipv6(&self) -> Option<&str> {
        self.public_address(IpFamily::V6)
    }

    fn public_address(&self, family: IpFamily) -> Option<&str> {
        self.ip_addresses
            .iter()
            .find(|ip| ip.access == Access::Public && ip.family == family && !ip.address.is_empty())
            .map(|ip| ip.address.as_str())
    }
}
