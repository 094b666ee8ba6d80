//! Per-run log file setup.
//!
//! Each run writes to `<log_dir>/<kind>_<YYYYmmdd_HHMMSS>.log`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use engine_logging::{LevelFilter, LogDestination};

pub fn run_log_path(log_dir: &Path, kind: &str, started: DateTime<Local>) -> PathBuf {
    log_dir.join(format!("{kind}_{}.log", started.format("%Y%m%d_%H%M%S")))
}

/// Installs the logger and returns the log file in use, if any.
///
/// When the file cannot be created the run continues with terminal logging.
pub fn initialize(log_dir: &Path, kind: &str, also_terminal: bool) -> Option<PathBuf> {
    let path = run_log_path(log_dir, kind, Local::now());
    let destination = if also_terminal {
        LogDestination::Both
    } else {
        LogDestination::File
    };
    match engine_logging::initialize(destination, &path, LevelFilter::Info) {
        Ok(()) => Some(path),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", path, err);
            let _ = engine_logging::initialize(LogDestination::Terminal, &path, LevelFilter::Info);
            None
        }
    }
}
