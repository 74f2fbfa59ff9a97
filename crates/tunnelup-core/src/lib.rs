//! Self-update core for the tunnelup client.
//!
//! This crate sequences one update run end to end:
//! - Metadata discovery (`metadata`), behind the [`MetadataSource`] seam.
//! - Streaming download with bounded retries and a size cap (`download`).
//! - Incremental digest computation and verification (`integrity`).
//! - Unpredictable, exclusively-created temp artifacts (`artifact`).
//! - Quiescing the live tunnel session before install (`session`).
//! - Running the installer and classifying its exit (`installer`).
//!
//! [`Updater::run`] is the only entry point callers need; it always returns a
//! single [`UpdateResult`].

mod artifact;
mod config;
mod download;
mod installer;
mod integrity;
mod metadata;
mod orchestrator;
mod progress;
mod session;

/// Exclusively-created temp file holding the downloaded installer.
pub use artifact::{ArtifactError, TempArtifact};
/// Tunables for a run and the HTTP client it uses.
pub use config::{UpdateConfig, build_http_client};
/// Streaming downloader, its sink seam and retry policy.
pub use download::{ArtifactSink, DownloadOutcome, DownloadPolicy, DownloadSink, download};
/// Installer process seam and the msiexec-style default.
pub use installer::{InstallerLauncher, MsiexecLauncher, installer_args};
/// Hash algorithm registry and digest comparison.
pub use integrity::{DigestState, HashAlgorithm, verify_digest};
/// Update discovery seam, HTTP implementation and version comparison.
pub use metadata::{
    HttpMetadataSource, MetadataError, MetadataSource, UpdateDescriptor, is_newer_version,
};
/// Orchestration entry point and its terminal result.
pub use orchestrator::{UpdateResult, Updater};
pub use progress::UpdateProgress;
/// Narrow view of the tunnel session and the disconnect race built on it.
pub use session::{DisconnectCoordinator, SessionControl, SessionState};
