//! Host-facing entry point for tunnelup self-updates.
//!
//! Wires persisted settings, file logging and the cross-process run lock
//! around the `tunnelup-core` orchestrator.

mod logging;
mod settings;
mod update_lock;

use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::mpsc;
use tunnelup_core::{HttpMetadataSource, MsiexecLauncher, Updater, build_http_client};

pub use logging::{init_logging, set_debug_logging};
pub use settings::{DEFAULT_METADATA_ENDPOINT, UpdateSettings};
pub use tunnelup_core::{SessionControl, SessionState, UpdateProgress, UpdateResult};
pub use update_lock::{AcquireError, UpdateLock};

/// Run one self-update using the persisted settings, logging to the update
/// log configured by them.
///
/// Only one run proceeds per machine; a concurrent call gets
/// [`UpdateResult::GeneralFailure`] without touching the network.
pub async fn run_update(
    session: Arc<dyn SessionControl>,
    current_version: &str,
    progress: Option<mpsc::Sender<UpdateProgress>>,
) -> UpdateResult {
    let settings = UpdateSettings::load();
    init_logging(&settings);
    info!("Starting update check from version {current_version}");

    let _lock = match UpdateLock::acquire() {
        Ok(lock) => lock,
        Err(error) => {
            warn!("Not starting update: {error}");
            return UpdateResult::GeneralFailure;
        }
    };

    run_with_settings(&settings, session, current_version, progress).await
}

/// Run one self-update with explicit settings. Callers serialize runs.
pub async fn run_with_settings(
    settings: &UpdateSettings,
    session: Arc<dyn SessionControl>,
    current_version: &str,
    progress: Option<mpsc::Sender<UpdateProgress>>,
) -> UpdateResult {
    let config = settings.update_config();
    let client = match build_http_client(&config) {
        Ok(client) => client,
        Err(error) => {
            error!("Failed to build update HTTP client: {error}");
            return UpdateResult::GeneralFailure;
        }
    };

    let metadata = Arc::new(HttpMetadataSource::new(
        client.clone(),
        settings.metadata_endpoint.clone(),
    ));
    let launcher = Arc::new(MsiexecLauncher::new(config.installer_program.clone()));

    let mut updater = Updater::new(client, metadata, session, launcher, config);
    if let Some(progress) = progress {
        updater = updater.with_progress(progress);
    }
    updater.run(current_version).await
}
