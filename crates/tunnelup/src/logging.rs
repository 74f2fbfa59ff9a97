use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use tunnelup_platform::AppPaths;

use crate::settings::UpdateSettings;

static LOG_FILE: OnceLock<PathBuf> = OnceLock::new();

/// Path the previous generation of `log_path` is rotated to.
fn previous_log_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.file_name().unwrap_or_default().to_os_string();
    name.push(".1");
    log_path.with_file_name(name)
}

/// Move an oversized update log aside so each run starts a fresh file. Only
/// one previous generation is kept. Returns whether a rotation happened.
fn rotate_if_oversized(log_path: &Path, max_log_size: u64) -> io::Result<bool> {
    match std::fs::metadata(log_path) {
        Ok(metadata) if metadata.len() > max_log_size => {
            std::fs::rename(log_path, previous_log_path(log_path))?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

/// Route `tunnelup` logs to the update log in the app data directory.
///
/// The logger is installed once per process; later calls only apply the
/// level from `settings`. Returns the log file in use, if any.
pub fn init_logging(settings: &UpdateSettings) -> Option<&'static Path> {
    if let Some(path) = LOG_FILE.get() {
        set_debug_logging(settings.debug_logging);
        return Some(path);
    }

    let paths = AppPaths::new().ok()?;
    paths.ensure_dirs().ok()?;
    install_file_logger(&paths.log_file(), settings)
}

fn install_file_logger(log_path: &Path, settings: &UpdateSettings) -> Option<&'static Path> {
    let rotated = rotate_if_oversized(log_path, settings.max_log_size_bytes).unwrap_or(false);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .ok()?;

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("tunnelup")
        .build();
    WriteLogger::init(LevelFilter::Debug, config, file).ok()?;
    set_debug_logging(settings.debug_logging);

    let path = LOG_FILE.get_or_init(|| log_path.to_path_buf());
    if rotated {
        log::info!("Previous update log moved to {}", previous_log_path(path).display());
    }
    Some(path)
}

/// Debug mode includes per-attempt download detail; otherwise info and above.
pub fn set_debug_logging(debug_enabled: bool) {
    let level = if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    log::set_max_level(level);
}
