use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("another update run is already in progress")]
    AlreadyRunning,
    #[error("failed to resolve application paths: {0}")]
    Paths(#[from] tunnelup_platform::AppPathsError),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[cfg(windows)]
    #[error("win32 call {api} failed with code {code}")]
    Win32 { api: &'static str, code: u32 },
}

impl AcquireError {
    #[cfg_attr(windows, allow(dead_code))]
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

#[cfg(windows)]
mod windows_impl {
    use std::ptr;
    use windows_sys::Win32::Foundation::{CloseHandle, ERROR_ALREADY_EXISTS, GetLastError, HANDLE};
    use windows_sys::Win32::System::Threading::CreateMutexA;

    const MUTEX_NAME: &[u8] = b"Global\\TunnelUpUpdateMutex\0";

    /// Held for the duration of one update run.
    pub struct UpdateLock {
        handle: HANDLE,
    }

    impl UpdateLock {
        pub fn acquire() -> Result<Self, super::AcquireError> {
            // SAFETY: calling Win32 mutex APIs with a static NUL-terminated
            // name and null security attributes is valid here; handle results
            // are checked before use.
            unsafe {
                let handle = CreateMutexA(ptr::null(), 1, MUTEX_NAME.as_ptr());

                if handle.is_null() {
                    let code = GetLastError();
                    return Err(super::AcquireError::Win32 {
                        api: "CreateMutexA",
                        code,
                    });
                }

                let last_error = GetLastError();
                if last_error == ERROR_ALREADY_EXISTS {
                    CloseHandle(handle);
                    return Err(super::AcquireError::AlreadyRunning);
                }

                Ok(Self { handle })
            }
        }
    }

    // SAFETY: the handle is only used to detect a concurrent run by name and
    // is closed exactly once in `Drop`; closing it from another thread is
    // permitted by Win32.
    unsafe impl Send for UpdateLock {}

    impl Drop for UpdateLock {
        fn drop(&mut self) {
            // SAFETY: `self.handle` was returned by `CreateMutexA` and remains
            // owned by this guard until drop.
            unsafe {
                CloseHandle(self.handle);
            }
        }
    }
}

#[cfg(not(windows))]
mod other_impl {
    use std::fs::{File, OpenOptions};
    use std::io::{Seek, SeekFrom, Write};
    use std::path::Path;

    use fs2::FileExt;
    use tunnelup_platform::AppPaths;

    /// Held for the duration of one update run.
    pub struct UpdateLock {
        _file: File,
    }

    impl UpdateLock {
        pub fn acquire() -> Result<Self, super::AcquireError> {
            let paths = AppPaths::new()?;
            paths.ensure_dirs().map_err(|error| {
                super::AcquireError::io("failed to create app directories", error)
            })?;
            Self::acquire_at(&paths.update_lock_file())
        }

        pub fn acquire_at(path: &Path) -> Result<Self, super::AcquireError> {
            let mut lock_file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)
                .map_err(|error| {
                    super::AcquireError::io("failed to open update lock file", error)
                })?;

            match lock_file.try_lock_exclusive() {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                    return Err(super::AcquireError::AlreadyRunning);
                }
                Err(error) => {
                    return Err(super::AcquireError::io(
                        "failed to acquire update lock",
                        error,
                    ));
                }
            }

            lock_file
                .set_len(0)
                .and_then(|()| lock_file.seek(SeekFrom::Start(0)).map(|_| ()))
                .and_then(|()| writeln!(lock_file, "{}", std::process::id()))
                .map_err(|error| {
                    super::AcquireError::io("failed to write update lock metadata", error)
                })?;

            Ok(Self { _file: lock_file })
        }
    }
}

#[cfg(not(windows))]
pub use other_impl::UpdateLock;
#[cfg(windows)]
pub use windows_impl::UpdateLock;
