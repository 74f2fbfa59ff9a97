//! Host-level "delete on next reboot" for files that cannot be removed
//! immediately (for example because an installer still holds them open).

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeferredDeleteError {
    #[error("deferred deletion is not supported on this platform")]
    Unsupported,
    #[cfg(windows)]
    #[error("win32 call {api} failed with code {code}")]
    Win32 { api: &'static str, code: u32 },
}

/// Ask the operating system to delete `path` the next time it boots.
///
/// # Errors
/// Returns [`DeferredDeleteError::Unsupported`] on hosts without such a
/// primitive, or the Win32 error code when the request is rejected.
#[cfg(windows)]
pub fn schedule_delete_on_reboot(path: &Path) -> Result<(), DeferredDeleteError> {
    use std::os::windows::ffi::OsStrExt;

    use windows_sys::Win32::Foundation::GetLastError;
    use windows_sys::Win32::Storage::FileSystem::{MOVEFILE_DELAY_UNTIL_REBOOT, MoveFileExW};

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    // SAFETY: `wide` is NUL-terminated and outlives the call. A null
    // destination together with MOVEFILE_DELAY_UNTIL_REBOOT registers the
    // source for deletion at boot.
    let scheduled =
        unsafe { MoveFileExW(wide.as_ptr(), std::ptr::null(), MOVEFILE_DELAY_UNTIL_REBOOT) };
    if scheduled == 0 {
        // SAFETY: reads the calling thread's last-error value only.
        let code = unsafe { GetLastError() };
        return Err(DeferredDeleteError::Win32 {
            api: "MoveFileExW",
            code,
        });
    }

    log::info!("Scheduled {} for deletion on reboot", path.display());
    Ok(())
}

/// Ask the operating system to delete `path` the next time it boots.
///
/// # Errors
/// Always returns [`DeferredDeleteError::Unsupported`]; this host has no
/// reboot-time deletion primitive.
#[cfg(not(windows))]
pub fn schedule_delete_on_reboot(path: &Path) -> Result<(), DeferredDeleteError> {
    log::debug!(
        "Deferred deletion unavailable for {} on this platform",
        path.display()
    );
    Err(DeferredDeleteError::Unsupported)
}
