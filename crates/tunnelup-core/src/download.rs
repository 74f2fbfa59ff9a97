use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::artifact::{ArtifactError, TempArtifact};
use crate::integrity::{DigestState, HashAlgorithm};
use crate::progress::{UpdateProgress, report};

/// How a download run ended, as far as the orchestrator cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success,
    /// Every attempt failed below HTTP: connect, reset, timeout or a broken body.
    TransportFailure,
    Georestricted,
    GeneralFailure,
}

/// Retry and size policy for one artifact download.
#[derive(Debug, Clone)]
pub struct DownloadPolicy {
    pub max_attempts: u32,
    pub retry_delays: Vec<Duration>,
    pub max_bytes: u64,
    pub restricted_status: u16,
}

impl DownloadPolicy {
    fn delay_before_retry(&self, retry: usize) -> Duration {
        self.retry_delays
            .get(retry)
            .or_else(|| self.retry_delays.last())
            .copied()
            .unwrap_or_default()
    }
}

/// Destination for streamed body bytes.
///
/// `reset` must return the sink to its freshly-created state; it runs before
/// every attempt so nothing from a broken attempt survives into the next one.
#[async_trait]
pub trait DownloadSink: Send {
    async fn reset(&mut self) -> Result<(), ArtifactError>;
    async fn write(&mut self, chunk: &[u8]) -> Result<(), ArtifactError>;
}

/// Writes into the temp artifact while hashing the same bytes.
pub struct ArtifactSink<'a> {
    artifact: &'a mut TempArtifact,
    digest: DigestState,
}

impl<'a> ArtifactSink<'a> {
    pub fn new(artifact: &'a mut TempArtifact, algorithm: HashAlgorithm) -> Self {
        Self {
            artifact,
            digest: algorithm.hasher(),
        }
    }

    /// Finish hashing and release the artifact borrow.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.digest.finalize()
    }
}

#[async_trait]
impl DownloadSink for ArtifactSink<'_> {
    async fn reset(&mut self) -> Result<(), ArtifactError> {
        self.artifact.truncate().await?;
        self.digest.reset();
        Ok(())
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<(), ArtifactError> {
        self.artifact.write_chunk(chunk).await?;
        self.digest.update(chunk);
        Ok(())
    }
}

#[derive(Debug)]
enum AttemptError {
    Transport(reqwest::Error),
    Status(reqwest::StatusCode),
    TooLarge { limit: u64 },
    Sink(ArtifactError),
}

/// Stream `url` into `sink` under `policy`.
///
/// Only transport failures are retried. A non-success status ends the run at
/// once: the policy's restricted status maps to
/// [`DownloadOutcome::Georestricted`], anything else to
/// [`DownloadOutcome::GeneralFailure`]. Bodies over `max_bytes` are aborted,
/// never truncated. Partial bytes may remain in the sink on failure.
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    sink: &mut dyn DownloadSink,
    policy: &DownloadPolicy,
    progress: Option<&mpsc::Sender<UpdateProgress>>,
) -> DownloadOutcome {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        if attempt > 1 {
            let delay = policy.delay_before_retry(attempt as usize - 2);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if let Err(error) = sink.reset().await {
            error!("Failed to reset update artifact before download: {error}");
            return DownloadOutcome::GeneralFailure;
        }

        debug!("Downloading update from {url} (attempt {attempt}/{attempts})");
        match download_once(client, url, sink, policy.max_bytes, progress).await {
            Ok(bytes) => {
                info!("Download complete: {bytes} bytes");
                return DownloadOutcome::Success;
            }
            Err(AttemptError::Transport(error)) => {
                warn!("Download attempt {attempt}/{attempts} failed: {error}");
            }
            Err(AttemptError::Status(status)) if status.as_u16() == policy.restricted_status => {
                error!("Update download refused with HTTP {status}: restricted in this region");
                return DownloadOutcome::Georestricted;
            }
            Err(AttemptError::Status(status)) => {
                error!("Update download failed with HTTP {status}");
                return DownloadOutcome::GeneralFailure;
            }
            Err(AttemptError::TooLarge { limit }) => {
                error!("Update download exceeds the {limit} byte limit, aborting");
                return DownloadOutcome::GeneralFailure;
            }
            Err(AttemptError::Sink(error)) => {
                error!("Failed to store update download: {error}");
                return DownloadOutcome::GeneralFailure;
            }
        }
    }

    error!("Update download failed after {attempts} attempts");
    DownloadOutcome::TransportFailure
}

async fn download_once(
    client: &reqwest::Client,
    url: &str,
    sink: &mut dyn DownloadSink,
    max_bytes: u64,
    progress: Option<&mpsc::Sender<UpdateProgress>>,
) -> Result<u64, AttemptError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(AttemptError::Transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(AttemptError::Status(status));
    }

    let total = response.content_length();
    if total.is_some_and(|declared| declared > max_bytes) {
        return Err(AttemptError::TooLarge { limit: max_bytes });
    }

    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(AttemptError::Transport)?;
        let chunk_len = chunk.len() as u64;
        if downloaded + chunk_len > max_bytes {
            return Err(AttemptError::TooLarge { limit: max_bytes });
        }
        sink.write(&chunk).await.map_err(AttemptError::Sink)?;
        downloaded += chunk_len;
        report(
            progress,
            UpdateProgress::Downloading {
                downloaded,
                total: total.unwrap_or(0),
            },
        );
    }

    Ok(downloaded)
}
