use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use connection_store::default_store_path;
use rocket::serde::Deserialize;
use shared::{DEFAULT_BROKER_PORT, DEFAULT_UPDATE_INTERVAL_MS};

pub const CONFIG_ENV_VAR: &str = "REMOTE_CTRL_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "remote-ctrl.json";

pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
const MIN_KEEP_ALIVE_SECS: u64 = 5;
pub const DEFAULT_MOTION_PORT: u16 = 25570;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(crate = "rocket::serde", default)]
pub struct ServerConfig {
    /// Where the connection list lives. Defaults to the user's data directory.
    pub store_path: Option<PathBuf>,
    pub broker_port: u16,
    pub keep_alive_secs: u64,
    pub update_interval_ms: u64,
    /// UDP port attitude datagrams are received on.
    pub motion_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            broker_port: DEFAULT_BROKER_PORT,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            motion_port: DEFAULT_MOTION_PORT,
        }
    }
}

impl ServerConfig {
    /// Loads the file named by `REMOTE_CTRL_CONFIG`, or `remote-ctrl.json` in
    /// the working directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!(
                "config: No config file at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Couldn't read config file {}", path.display()))?;
        let config: ServerConfig = serde_json::from_str(&content)
            .with_context(|| format!("Couldn't parse config file {}", path.display()))?;

        if config.update_interval_ms == 0 {
            anyhow::bail!("update_interval_ms must be greater than zero");
        }

        if config.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            anyhow::bail!("keep_alive_secs must be at least {}", MIN_KEEP_ALIVE_SECS);
        }

        log::info!("config: Loaded {}", path.display());

        Ok(config)
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(default_store_path)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}
