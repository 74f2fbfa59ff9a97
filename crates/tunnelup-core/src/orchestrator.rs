use std::fmt;
use std::sync::Arc;

use log::{error, info};
use tokio::sync::mpsc;

use crate::artifact::TempArtifact;
use crate::config::UpdateConfig;
use crate::download::{ArtifactSink, DownloadOutcome, download};
use crate::installer::InstallerLauncher;
use crate::integrity::{HashAlgorithm, verify_digest};
use crate::metadata::{MetadataSource, UpdateDescriptor};
use crate::progress::{UpdateProgress, report};
use crate::session::{DisconnectCoordinator, SessionControl};

/// Terminal outcome of one update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    SuccessNoUpdate,
    Success,
    /// Unsupported digest algorithm or a digest mismatch.
    InvalidSignature,
    DisconnectTimeout,
    HttpError,
    RunFailure,
    Georestricted,
    GeneralFailure,
}

impl UpdateResult {
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::SuccessNoUpdate | Self::Success)
    }
}

impl fmt::Display for UpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::SuccessNoUpdate => "already up to date",
            Self::Success => "update installed",
            Self::InvalidSignature => "update failed integrity verification",
            Self::DisconnectTimeout => "timed out waiting for the tunnel to disconnect",
            Self::HttpError => "network error while updating",
            Self::RunFailure => "installer failed",
            Self::Georestricted => "update is not available in this region",
            Self::GeneralFailure => "update failed",
        };
        f.write_str(message)
    }
}

/// Sequences discovery, download, verification, session quiescing and install.
///
/// Runs must be serialized by the caller; the updater holds no state between
/// them beyond its configuration.
pub struct Updater {
    client: reqwest::Client,
    metadata: Arc<dyn MetadataSource>,
    coordinator: DisconnectCoordinator,
    launcher: Arc<dyn InstallerLauncher>,
    config: UpdateConfig,
    progress: Option<mpsc::Sender<UpdateProgress>>,
}

impl Updater {
    pub fn new(
        client: reqwest::Client,
        metadata: Arc<dyn MetadataSource>,
        session: Arc<dyn SessionControl>,
        launcher: Arc<dyn InstallerLauncher>,
        config: UpdateConfig,
    ) -> Self {
        Self {
            client,
            metadata,
            coordinator: DisconnectCoordinator::new(session, config.poll_interval),
            launcher,
            config,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: mpsc::Sender<UpdateProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run one update from discovery to install.
    ///
    /// The temp artifact never outlives this call: it is removed (or queued
    /// for removal on reboot) on every path, after the installer has exited
    /// when one was started.
    pub async fn run(&self, current_version: &str) -> UpdateResult {
        report(self.progress.as_ref(), UpdateProgress::Checking);
        let descriptor = match self.metadata.query_update(current_version).await {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => {
                info!("No update available for {current_version}");
                return UpdateResult::SuccessNoUpdate;
            }
            Err(error) => {
                error!("Update check failed: {error}");
                return UpdateResult::HttpError;
            }
        };

        let Some(algorithm) = HashAlgorithm::from_id(&descriptor.hash_algorithm) else {
            error!(
                "Refusing update with unsupported digest algorithm '{}'",
                descriptor.hash_algorithm
            );
            return UpdateResult::InvalidSignature;
        };

        let mut artifact = match TempArtifact::create_in(&self.config.artifact_dir()).await {
            Ok(artifact) => artifact,
            Err(error) => {
                error!("Failed to allocate update artifact: {error}");
                return UpdateResult::GeneralFailure;
            }
        };

        let result = self
            .install_verified(&descriptor, algorithm, &mut artifact)
            .await;
        artifact.discard().await;

        info!("Update run finished: {result}");
        result
    }

    async fn install_verified(
        &self,
        descriptor: &UpdateDescriptor,
        algorithm: HashAlgorithm,
        artifact: &mut TempArtifact,
    ) -> UpdateResult {
        let mut sink = ArtifactSink::new(artifact, algorithm);
        let outcome = download(
            &self.client,
            &descriptor.download_url,
            &mut sink,
            &self.config.download_policy(),
            self.progress.as_ref(),
        )
        .await;
        match outcome {
            DownloadOutcome::Success => {}
            DownloadOutcome::TransportFailure => return UpdateResult::HttpError,
            DownloadOutcome::Georestricted => return UpdateResult::Georestricted,
            DownloadOutcome::GeneralFailure => return UpdateResult::GeneralFailure,
        }

        report(self.progress.as_ref(), UpdateProgress::Verifying);
        let digest = sink.finish();
        if !verify_digest(&digest, &descriptor.expected_hash) {
            error!(
                "Update {} digest mismatch, discarding download",
                algorithm.id()
            );
            return UpdateResult::InvalidSignature;
        }
        info!("Update {} digest verified", algorithm.id());

        if let Err(error) = artifact.seal().await {
            error!("Failed to finalize update artifact: {error}");
            return UpdateResult::GeneralFailure;
        }

        report(self.progress.as_ref(), UpdateProgress::Disconnecting);
        if !self
            .coordinator
            .ensure_disconnected(self.config.disconnect_timeout)
            .await
        {
            return UpdateResult::DisconnectTimeout;
        }

        report(self.progress.as_ref(), UpdateProgress::Installing);
        if self.launcher.launch(artifact.path()).await {
            UpdateResult::Success
        } else {
            UpdateResult::RunFailure
        }
    }
}
