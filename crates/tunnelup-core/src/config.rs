use std::path::PathBuf;
use std::time::Duration;

use crate::download::DownloadPolicy;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAYS_SECS: [u64; 2] = [2, 5];
const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 512 * 1024 * 1024;
const DEFAULT_RESTRICTED_STATUS: u16 = 451;
const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_INSTALLER_PROGRAM: &str = "msiexec";

/// Tunables for a single update run.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Total download attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause before each retry; the last entry repeats when attempts outnumber it.
    pub retry_delays: Vec<Duration>,
    /// Hard cap on the artifact body.
    pub max_artifact_bytes: u64,
    /// HTTP status the download service uses to signal a georestriction.
    pub restricted_status: u16,
    pub disconnect_timeout: Duration,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    /// Idle timeout between body reads; large artifacts have no total deadline.
    pub read_timeout: Duration,
    pub installer_program: PathBuf,
    /// Directory for the temp artifact; `None` means the system temp dir.
    pub artifact_dir: Option<PathBuf>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delays: DEFAULT_RETRY_DELAYS_SECS
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            restricted_status: DEFAULT_RESTRICTED_STATUS,
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            installer_program: PathBuf::from(DEFAULT_INSTALLER_PROGRAM),
            artifact_dir: None,
        }
    }
}

impl UpdateConfig {
    #[must_use]
    pub fn artifact_dir(&self) -> PathBuf {
        self.artifact_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    #[must_use]
    pub fn download_policy(&self) -> DownloadPolicy {
        DownloadPolicy {
            max_attempts: self.max_attempts,
            retry_delays: self.retry_delays.clone(),
            max_bytes: self.max_artifact_bytes,
            restricted_status: self.restricted_status,
        }
    }
}

/// Build the HTTP client used for metadata queries and artifact downloads.
///
/// # Errors
/// Returns an error if the TLS backend or client configuration cannot be
/// initialized.
pub fn build_http_client(config: &UpdateConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .user_agent(format!("tunnelup/{}/updater", env!("CARGO_PKG_VERSION")))
        .build()
}
