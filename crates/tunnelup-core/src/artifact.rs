use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

const NAME_ENTROPY_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("update artifact is no longer writable")]
    Sealed,
}

impl ArtifactError {
    fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::Io {
            context,
            source: std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        }
    }
}

/// The downloaded installer, owned by exactly one update run.
///
/// The file name is 64 lowercase hex characters drawn from the OS random
/// source and the file is opened with create-new semantics, so an existing
/// (possibly attacker-planted) path is never reused. Dropping the value
/// without calling [`TempArtifact::discard`] still removes the file.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    removed: bool,
}

impl TempArtifact {
    /// Exclusively create a fresh artifact file inside `dir`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created, including when the
    /// generated path already exists.
    pub async fn create_in(dir: &Path) -> Result<Self, ArtifactError> {
        let path = dir.join(random_file_name());

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let file = options.open(&path).await.map_err(|error| {
            ArtifactError::io_with_path("failed to create update artifact", &path, &error)
        })?;

        debug!("Created update artifact at {}", path.display());
        Ok(Self {
            path,
            file: Some(file),
            removed: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a chunk of the downloaded body.
    ///
    /// # Errors
    /// Returns an error if the artifact was already sealed or the write fails.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ArtifactError> {
        let file = self.file.as_mut().ok_or(ArtifactError::Sealed)?;
        file.write_all(chunk).await.map_err(|error| {
            ArtifactError::io_with_path("failed to write update artifact", &self.path, &error)
        })
    }

    /// Discard everything written so far, keeping the same file.
    ///
    /// # Errors
    /// Returns an error if the artifact was already sealed or truncation fails.
    pub async fn truncate(&mut self) -> Result<(), ArtifactError> {
        let file = self.file.as_mut().ok_or(ArtifactError::Sealed)?;
        file.flush().await.map_err(|error| {
            ArtifactError::io_with_path("failed to flush update artifact", &self.path, &error)
        })?;
        file.set_len(0).await.map_err(|error| {
            ArtifactError::io_with_path("failed to truncate update artifact", &self.path, &error)
        })?;
        file.seek(SeekFrom::Start(0)).await.map_err(|error| {
            ArtifactError::io_with_path("failed to rewind update artifact", &self.path, &error)
        })?;
        Ok(())
    }

    /// Flush to disk and release the write handle so an installer can open it.
    ///
    /// # Errors
    /// Returns an error if flushing or syncing the file fails.
    pub async fn seal(&mut self) -> Result<(), ArtifactError> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        file.flush().await.map_err(|error| {
            ArtifactError::io_with_path("failed to flush update artifact", &self.path, &error)
        })?;
        file.sync_all().await.map_err(|error| {
            ArtifactError::io_with_path("failed to sync update artifact", &self.path, &error)
        })?;
        Ok(())
    }

    /// Remove the artifact, falling back to a reboot-time deletion request
    /// when the file cannot be removed right away.
    pub async fn discard(mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush().await;
        }
        self.removed = true;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed update artifact {}", self.path.display()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                warn!(
                    "Failed to remove update artifact {}: {error}",
                    self.path.display()
                );
                match tunnelup_platform::schedule_delete_on_reboot(&self.path) {
                    Ok(()) => info!("Update artifact will be removed on next reboot"),
                    Err(error) => warn!("Could not schedule deferred removal: {error}"),
                }
            }
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.file.take();
        if let Err(error) = std::fs::remove_file(&self.path)
            && error.kind() != std::io::ErrorKind::NotFound
        {
            warn!(
                "Failed to remove abandoned update artifact {}: {error}",
                self.path.display()
            );
            let _ = tunnelup_platform::schedule_delete_on_reboot(&self.path);
        }
    }
}

fn random_file_name() -> String {
    let mut bytes = [0_u8; NAME_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::{ArtifactError, TempArtifact, random_file_name};

    #[test]
    fn random_file_name_is_64_lowercase_hex_chars() {
        let name = random_file_name();
        assert_eq!(name.len(), 64);
        assert!(
            name.chars()
                .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch))
        );
        assert_ne!(name, random_file_name());
    }

    #[tokio::test]
    async fn create_write_and_discard_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let mut artifact = TempArtifact::create_in(temp.path())
            .await
            .expect("artifact should be created");
        let path = artifact.path().to_path_buf();
        assert_eq!(path.parent(), Some(temp.path()));

        artifact.write_chunk(b"stale").await.expect("write should succeed");
        artifact.truncate().await.expect("truncate should succeed");
        artifact.write_chunk(b"fresh").await.expect("write should succeed");
        artifact.seal().await.expect("seal should succeed");

        assert_eq!(std::fs::read(&path).expect("artifact should be readable"), b"fresh");
        assert!(matches!(
            artifact.write_chunk(b"late").await,
            Err(ArtifactError::Sealed)
        ));

        artifact.discard().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_removes_undiscarded_artifact() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let artifact = TempArtifact::create_in(temp.path())
            .await
            .expect("artifact should be created");
        let path = artifact.path().to_path_buf();
        assert!(path.exists());

        drop(artifact);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn artifact_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir should be created");
        let artifact = TempArtifact::create_in(temp.path())
            .await
            .expect("artifact should be created");
        let mode = std::fs::metadata(artifact.path())
            .expect("artifact metadata should be readable")
            .permissions()
            .mode();
        assert_eq!(mode & 0o077, 0);
        artifact.discard().await;
    }

    #[tokio::test]
    async fn create_fails_in_missing_directory() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let missing = temp.path().join("does-not-exist");
        let result = TempArtifact::create_in(&missing).await;
        assert!(matches!(result, Err(ArtifactError::Io { .. })));
    }
}
