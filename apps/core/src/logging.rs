use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "quasimode.log";
const ARCHIVE_PREFIX: &str = "quasimode-";
const MAX_LOG_BYTES: u64 = 1_000_000;
const MAX_ARCHIVES: usize = 5;

static SUBSCRIBER_INSTALLED: OnceLock<()> = OnceLock::new();
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("log file io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },
}

pub fn logs_dir() -> PathBuf {
    crate::config::stable_app_data_dir().join("logs")
}

pub fn init(level: &str) -> Result<(), LoggingError> {
    init_in(&logs_dir(), level)
}

pub fn init_in(log_dir: &Path, level: &str) -> Result<(), LoggingError> {
    if SUBSCRIBER_INSTALLED.get().is_some() {
        return Ok(());
    }

    let filter = build_filter(level)?;
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(LOG_FILE_NAME);
    rotate_if_needed(&log_path, log_dir)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .is_ok();
    if installed {
        let _ = SUBSCRIBER_INSTALLED.set(());
    }

    install_panic_hook();
    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LoggingError::Filter {
        filter: level.to_string(),
        message: e.to_string(),
    })
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn rotate_if_needed(log_path: &Path, log_dir: &Path) -> Result<(), std::io::Error> {
    let meta = match fs::metadata(log_path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    if meta.len() < MAX_LOG_BYTES {
        return Ok(());
    }

    let mut stamp = now_secs();
    let mut archived = log_dir.join(format!("{ARCHIVE_PREFIX}{stamp}.log"));
    while archived.exists() {
        stamp += 1;
        archived = log_dir.join(format!("{ARCHIVE_PREFIX}{stamp}.log"));
    }
    fs::rename(log_path, archived)?;
    prune_old_archives(log_dir)
}

fn prune_old_archives(log_dir: &Path) -> Result<(), std::io::Error> {
    let mut archives = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ARCHIVE_PREFIX) && n.ends_with(".log"))
        })
        .collect::<Vec<_>>();

    archives.sort();
    let excess = archives.len().saturating_sub(MAX_ARCHIVES);
    for oldest in archives.drain(..excess) {
        let _ = fs::remove_file(oldest);
    }
    Ok(())
}

fn install_panic_hook() {
    let _ = PANIC_HOOK_INSTALLED.get_or_init(|| {
        let prior = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            let location = panic_info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "unknown".to_string());
            let payload = panic_info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic payload unavailable".to_string());
            tracing::error!(%location, %payload, "panic");
            prior(panic_info);
        }));
    });
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{logs_dir, rotate_if_needed, ARCHIVE_PREFIX, LOG_FILE_NAME, MAX_ARCHIVES, MAX_LOG_BYTES};

    #[test]
    fn logs_dir_lives_under_app_data() {
        let dir = logs_dir();
        assert!(dir.ends_with("logs"));
        assert_eq!(dir.parent(), Some(crate::config::stable_app_data_dir().as_path()));
    }

    #[test]
    fn oversized_log_is_archived_and_archives_are_pruned() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        for stamp in 0..MAX_ARCHIVES {
            fs::write(dir.path().join(format!("{ARCHIVE_PREFIX}{stamp}.log")), b"old")
                .expect("archive should be written");
        }
        let log_path = dir.path().join(LOG_FILE_NAME);
        fs::write(&log_path, vec![b'x'; MAX_LOG_BYTES as usize]).expect("log should be written");

        rotate_if_needed(&log_path, dir.path()).expect("rotation should succeed");

        assert!(!log_path.exists());
        let archives = fs::read_dir(dir.path())
            .expect("dir should be readable")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(ARCHIVE_PREFIX))
            .count();
        assert_eq!(archives, MAX_ARCHIVES);
        assert!(!dir.path().join(format!("{ARCHIVE_PREFIX}0.log")).exists());
    }

    #[test]
    fn small_log_is_left_alone() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let log_path = dir.path().join(LOG_FILE_NAME);
        fs::write(&log_path, b"short").expect("log should be written");
        rotate_if_needed(&log_path, dir.path()).expect("rotation should succeed");
        assert!(log_path.exists());
    }
}
