use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tunnelup_core::UpdateConfig;
use tunnelup_platform::AppPaths;

pub const DEFAULT_METADATA_ENDPOINT: &str = "https://updates.tunnelup.app/v1/latest";

/// Persisted updater settings. Missing fields take the values of
/// [`UpdateConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSettings {
    pub metadata_endpoint: String,
    pub max_download_attempts: u32,
    pub retry_delays_secs: Vec<u64>,
    pub max_artifact_bytes: u64,
    pub restricted_status: u16,
    pub disconnect_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub installer_program: PathBuf,
    pub debug_logging: bool,
    pub max_log_size_bytes: u64,
}

const DEFAULT_MAX_LOG_SIZE_BYTES: u64 = 5 * 1024 * 1024;

impl Default for UpdateSettings {
    fn default() -> Self {
        let config = UpdateConfig::default();
        Self {
            metadata_endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            max_download_attempts: config.max_attempts,
            retry_delays_secs: config.retry_delays.iter().map(Duration::as_secs).collect(),
            max_artifact_bytes: config.max_artifact_bytes,
            restricted_status: config.restricted_status,
            disconnect_timeout_secs: config.disconnect_timeout.as_secs(),
            poll_interval_ms: u64::try_from(config.poll_interval.as_millis()).unwrap_or(u64::MAX),
            connect_timeout_secs: config.connect_timeout.as_secs(),
            read_timeout_secs: config.read_timeout.as_secs(),
            installer_program: config.installer_program,
            debug_logging: false,
            max_log_size_bytes: DEFAULT_MAX_LOG_SIZE_BYTES,
        }
    }
}

impl UpdateSettings {
    pub fn load() -> Self {
        let Ok(paths) = AppPaths::new() else {
            return Self::default();
        };
        Self::load_from(&paths.settings_file())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                log::warn!("Ignoring unreadable settings {}: {error}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        let paths = AppPaths::new().map_err(std::io::Error::other)?;
        paths.ensure_dirs()?;
        self.save_to(&paths.settings_file())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
    }

    #[must_use]
    pub fn update_config(&self) -> UpdateConfig {
        UpdateConfig {
            max_attempts: self.max_download_attempts,
            retry_delays: self
                .retry_delays_secs
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
            max_artifact_bytes: self.max_artifact_bytes,
            restricted_status: self.restricted_status,
            disconnect_timeout: Duration::from_secs(self.disconnect_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            installer_program: self.installer_program.clone(),
            artifact_dir: None,
        }
    }
}
