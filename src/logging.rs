// src/logging.rs
//
// Engine logging: `tlog!` writes a time-of-day line to stderr and, once file logging
// is on, a date-qualified copy to the current run's log file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Current run's log file. `tlog!` mirrors every message here while it is `Some`.
pub(crate) static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Symlink that always points at the newest run log (Unix only)
const LATEST_LINK: &str = "portwatch.log";
/// Suffix shared by every per-run log file
const RUN_LOG_SUFFIX: &str = "-portwatch.log";
/// Run logs kept in the directory; older ones are removed when a new run starts
pub const KEEP_RUN_LOGS: usize = 20;

/// Stderr prefix: local time of day
pub(crate) fn stderr_stamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Log file prefix: local date and time, so a file read later stands on its own
pub(crate) fn file_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Start mirroring `tlog!` output to a new run log in `log_dir`.
/// Returns the path of the file opened.
pub fn init_file_logging(log_dir: &Path) -> Result<PathBuf, String> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| format!("Failed to create log dir {}: {}", log_dir.display(), e))?;

    let filename = format!(
        "{}{}",
        chrono::Local::now().format("%Y%m%d-%H%M%S"),
        RUN_LOG_SUFFIX
    );
    let log_path = log_dir.join(&filename);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| format!("Failed to open log file {}: {}", log_path.display(), e))?;

    #[cfg(unix)]
    {
        let link = log_dir.join(LATEST_LINK);
        let _ = std::fs::remove_file(&link);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &link) {
            eprintln!("{} [Logging] No {} link: {}", stderr_stamp(), LATEST_LINK, e);
        }
    }

    let pruned = prune_run_logs(log_dir, KEEP_RUN_LOGS);

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    // Direct eprintln: tlog! would take LOG_FILE again
    eprintln!(
        "{} [Logging] Mirroring to {} ({} old run logs removed)",
        stderr_stamp(),
        log_path.display(),
        pruned
    );

    Ok(log_path)
}

/// Stop mirroring and close the run log.
pub fn stop_file_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if guard.take().is_some() {
            eprintln!("{} [Logging] Mirroring stopped", stderr_stamp());
        }
    }
}

/// Remove all but the newest `keep` run logs in `log_dir`. Returns how many were removed.
/// Run log names start with a sortable timestamp, so name order is age order.
pub fn prune_run_logs(log_dir: &Path, keep: usize) -> usize {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return 0;
    };

    let mut runs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(RUN_LOG_SUFFIX) && n != LATEST_LINK)
                .unwrap_or(false)
        })
        .collect();

    if runs.len() <= keep {
        return 0;
    }

    runs.sort();
    let excess = runs.len() - keep;
    runs.iter()
        .take(excess)
        .filter(|p| std::fs::remove_file(p).is_ok())
        .count()
}

/// Timestamped logging macro.
/// Stderr lines carry the time of day; the mirrored file line carries the full date.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let msg = format!($($arg)*);
        eprintln!("{} {}", $crate::logging::stderr_stamp(), msg);
        if let Ok(mut guard) = $crate::logging::LOG_FILE.lock() {
            if let Some(ref mut f) = *guard {
                let _ = writeln!(f, "{} {}", $crate::logging::file_stamp(), msg);
            }
        }
    }};
}
