use std::env;
use std::path::PathBuf;

use ub_builder::{BuildConfig, Error, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub build: BuildConfig,
    pub ssh_public_key_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            build: BuildConfig::from_env()?,
            ssh_public_key_path: env::var("UPCLOUD_SSH_PUBLIC_KEY_PATH")
                .map(PathBuf::from)
                .map_err(|_| Error::MissingEnv("UPCLOUD_SSH_PUBLIC_KEY_PATH".into()))?,
        })
    }

    /// Public half of the key pair generated for this build.
    pub fn read_ssh_public_key(&self) -> Result<String> {
        let key = std::fs::read_to_string(&self.ssh_public_key_path)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{} is empty",
                self.ssh_public_key_path.display()
            )));
        }
        Ok(key.to_string())
    }
}
