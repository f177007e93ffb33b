use std::time::Duration;

use uuid::Uuid;

use crate::{Error, Result};

const DEFAULT_STATE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_SSH_USERNAME: &str = "root";

/// Build settings consumed by the provisioning step.
///
/// `cpu`, `memory` and `storage_size` of zero mean "use the plan default".
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub zone: String,
    pub plan: Option<String>,
    pub cpu: i32,
    pub memory: i32,
    pub storage_uuid: String,
    pub storage_size: i32,
    pub state_timeout: Duration,
    pub ssh_username: String,
}

impl BuildConfig {
    /// Create from env vars:
    ///
    /// - `UPCLOUD_ZONE` (required)
    /// - `UPCLOUD_STORAGE_UUID` (required, storage to clone the disk from)
    /// - `UPCLOUD_PLAN` (optional)
    /// - `UPCLOUD_CPU`, `UPCLOUD_MEMORY`, `UPCLOUD_STORAGE_SIZE` (optional, integers)
    /// - `UPCLOUD_STATE_TIMEOUT_SECS` (default: 300)
    /// - `UPCLOUD_SSH_USERNAME` (default: `"root"`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let zone = var("UPCLOUD_ZONE").ok_or_else(|| Error::MissingEnv("UPCLOUD_ZONE".into()))?;

        let storage_uuid = var("UPCLOUD_STORAGE_UUID")
            .ok_or_else(|| Error::MissingEnv("UPCLOUD_STORAGE_UUID".into()))?;
        Uuid::parse_str(&storage_uuid).map_err(|e| {
            Error::InvalidConfig(format!("UPCLOUD_STORAGE_UUID '{storage_uuid}': {e}"))
        })?;

        let int = |key: &str| -> Result<i32> {
            match var(key) {
                Some(raw) => raw
                    .parse::<i32>()
                    .map_err(|_| Error::InvalidConfig(format!("{key} must be an integer, got '{raw}'"))),
                None => Ok(0),
            }
        };

        let state_timeout_secs = match var("UPCLOUD_STATE_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().ok().filter(|secs| *secs > 0).ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "UPCLOUD_STATE_TIMEOUT_SECS must be a positive integer, got '{raw}'"
                ))
            })?,
            None => DEFAULT_STATE_TIMEOUT_SECS,
        };

        Ok(Self {
            zone,
            plan: var("UPCLOUD_PLAN"),
            cpu: int("UPCLOUD_CPU")?,
            memory: int("UPCLOUD_MEMORY")?,
            storage_uuid,
            storage_size: int("UPCLOUD_STORAGE_SIZE")?,
            state_timeout: Duration::from_secs(state_timeout_secs),
            ssh_username: var("UPCLOUD_SSH_USERNAME").unwrap_or_else(|| DEFAULT_SSH_USERNAME.into()),
        })
    }
}
