use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{error, info};

/// Runs a verified artifact's installer to completion.
#[async_trait]
pub trait InstallerLauncher: Send + Sync {
    /// `true` only if the installer started and exited successfully.
    async fn launch(&self, artifact: &Path) -> bool;
}

/// Windows Installer invocation: basic UI without a cancel button, reboot
/// suppressed, package addressed relative to its own directory.
#[derive(Debug, Clone)]
pub struct MsiexecLauncher {
    program: PathBuf,
}

impl MsiexecLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for MsiexecLauncher {
    fn default() -> Self {
        Self::new("msiexec")
    }
}

/// Fixed installer command line for a package file name.
#[must_use]
pub fn installer_args(package_file_name: &OsStr) -> Vec<OsString> {
    vec![
        OsString::from("/qb!-"),
        OsString::from("REBOOT=ReallySuppress"),
        OsString::from("/i"),
        package_file_name.to_os_string(),
    ]
}

#[async_trait]
impl InstallerLauncher for MsiexecLauncher {
    async fn launch(&self, artifact: &Path) -> bool {
        let (Some(working_dir), Some(file_name)) = (artifact.parent(), artifact.file_name()) else {
            error!("Invalid installer path: {}", artifact.display());
            return false;
        };

        info!(
            "Launching installer {} for {}",
            self.program.display(),
            artifact.display()
        );
        let status = tokio::process::Command::new(&self.program)
            .args(installer_args(file_name))
            .current_dir(working_dir)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                info!("Installer finished successfully");
                true
            }
            Ok(status) => {
                error!("Installer exited with {status}");
                false
            }
            Err(error) => {
                error!("Failed to start installer: {error}");
                false
            }
        }
    }
}
