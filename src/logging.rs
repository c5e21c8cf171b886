//! # Logging Module
//!
//! Inizializzazione di `tracing` con doppio output e gestione dei file di log.
//!
//! ## Output:
//! - Console: formato compatto con colori
//! - File: `YYYYmmdd_HHMMSS_<name>.log` nella log dir, senza ANSI, con
//!   `file:line` dell'evento
//!
//! ## Rotazione:
//! Il file corrente viene ruotato a 5 MiB; si mantengono 30 backup
//! (`<file>.1` è il più recente). La scrittura avviene su un thread
//! dedicato (`tracing_appender::non_blocking`): la `WorkerGuard` restituita
//! da `setup_logging` va tenuta in vita fino all'uscita per svuotare il buffer.
//!
//! ## Retention (opt-in con `--manage-old-logs`):
//! - `.log` / `.csv` più vecchi di 7 giorni vengono compressi in `.gz`
//! - `.log` / `.csv` / `.gz` più vecchi di 180 giorni vengono eliminati
//!
//! ## Livelli:
//! `critical` non esiste in `tracing`: corrisponde al filtro `error` e gli
//! eventi catastrofici portano il campo `severity = "critical"`.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::ValueEnum;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FOLDER_NAME: &str = "logs";
pub const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
pub const BACKUP_COUNT: usize = 30;
pub const COMPRESS_AFTER: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const RETENTION: Duration = Duration::from_secs(180 * 24 * 60 * 60);

const TARGET_EXTENSIONS: &[&str] = &["log", "csv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    #[default]
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Critical => LevelFilter::ERROR,
        }
    }
}

/// Append-only log file that rolls over by size
pub struct RotatingFileWriter {
    path: PathBuf,
    file: File,
    size: u64,
    max_bytes: u64,
    backups: usize,
}

impl RotatingFileWriter {
    pub fn new(path: &Path, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
            max_bytes,
            backups,
        })
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups > 0 {
            let oldest = self.backup_path(self.backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..self.backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
        }

        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// `<dir>/YYYYmmdd_HHMMSS_<name>.log`
pub fn log_file_path(log_dir: &Path, name: &str, now: DateTime<Local>) -> PathBuf {
    log_dir.join(format!("{}_{}.log", now.format("%Y%m%d_%H%M%S"), name))
}

/// `logs` next to the executable, or under the user data dir
pub fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(LOG_FOLDER_NAME)))
        .or_else(|| dirs::data_local_dir().map(|dir| dir.join("media-normalizer").join(LOG_FOLDER_NAME)))
        .unwrap_or_else(|| PathBuf::from(LOG_FOLDER_NAME))
}

/// Install console and file logging.
///
/// Returns the log file path and the guard of the background writer; events
/// still buffered are flushed when the guard is dropped.
pub fn setup_logging(
    name: &str,
    level: LogLevel,
    log_dir: &Path,
    manage_old_logs: bool,
) -> Result<(PathBuf, WorkerGuard)> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Cannot create log directory: {}", log_dir.display()))?;

    let log_path = log_file_path(log_dir, name, Local::now());
    let writer = RotatingFileWriter::new(&log_path, MAX_LOG_SIZE, BACKUP_COUNT)
        .with_context(|| format!("Cannot open log file: {}", log_path.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(writer);

    let filter = EnvFilter::builder()
        .with_default_directive(level.level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(file_writer),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    if manage_old_logs {
        compress_logs_older_than(log_dir, COMPRESS_AFTER)?;
        delete_old_logs(log_dir, RETENTION)?;
    }

    Ok((log_path, guard))
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext))
        .unwrap_or(false)
}

fn is_older_than(path: &Path, cutoff: SystemTime) -> io::Result<bool> {
    Ok(fs::metadata(path)?.modified()? < cutoff)
}

fn gzip_file(path: &Path) -> io::Result<PathBuf> {
    let mut gz_name = path.as_os_str().to_os_string();
    gz_name.push(".gz");
    let gz_path = PathBuf::from(gz_name);

    let mut input = File::open(path)?;
    let mut encoder = GzEncoder::new(File::create(&gz_path)?, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(path)?;
    Ok(gz_path)
}

/// Gzip `.log`/`.csv` files not modified within `age`; returns how many were compressed
pub fn compress_logs_older_than(log_dir: &Path, age: Duration) -> Result<usize> {
    let cutoff = SystemTime::now() - age;
    let mut compressed = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        if !path.is_file() || !has_extension(&path, TARGET_EXTENSIONS) {
            continue;
        }
        match is_older_than(&path, cutoff).and_then(|old| if old { gzip_file(&path).map(Some) } else { Ok(None) }) {
            Ok(Some(gz)) => {
                info!("Compressed old log: {}", gz.display());
                compressed += 1;
            }
            Ok(None) => {}
            Err(e) => error!("Failed to compress {}: {}", path.display(), e),
        }
    }

    Ok(compressed)
}

/// Remove `.log`/`.csv`/`.gz` files not modified within `age`; returns how many were deleted
pub fn delete_old_logs(log_dir: &Path, age: Duration) -> Result<usize> {
    let cutoff = SystemTime::now() - age;
    let mut deleted = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        if !path.is_file() || !(has_extension(&path, TARGET_EXTENSIONS) || has_extension(&path, &["gz"])) {
            continue;
        }
        match is_older_than(&path, cutoff).and_then(|old| if old { fs::remove_file(&path).map(|_| true) } else { Ok(false) }) {
            Ok(true) => {
                info!("Deleted expired log: {}", path.display());
                deleted += 1;
            }
            Ok(false) => {}
            Err(e) => error!("Failed to delete {}: {}", path.display(), e),
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::set_mtime;
    use chrono::TimeZone;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(LogLevel::default(), LogLevel::Debug);
        assert_eq!(LogLevel::Warning.level_filter(), LevelFilter::WARN);
        assert_eq!(LogLevel::Critical.level_filter(), LevelFilter::ERROR);
        assert_eq!(LogLevel::from_str("warning", true).unwrap(), LogLevel::Warning);
    }

    #[test]
    fn test_log_file_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let path = log_file_path(Path::new("/var/logs"), "main", now);
        assert_eq!(path, PathBuf::from("/var/logs/20240309_070501_main.log"));
    }

    #[test]
    fn test_rotation_keeps_configured_backups() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");
        let mut writer = RotatingFileWriter::new(&path, 100, 2).unwrap();

        for _ in 0..4 {
            writer.write_all(&[b'x'; 60]).unwrap();
        }
        writer.flush().unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), 60);
        assert!(dir.path().join("run.log.1").exists());
        assert!(dir.path().join("run.log.2").exists());
        assert!(!dir.path().join("run.log.3").exists());
    }

    #[test]
    fn test_setup_logging_writes_dated_file() {
        let dir = TempDir::new().unwrap();
        let (path, guard) = setup_logging("suite", LogLevel::Debug, dir.path(), false).unwrap();

        assert_eq!(path.parent().unwrap(), dir.path());
        let file_name = path.file_name().unwrap().to_str().unwrap();
        let (stamp, rest) = file_name.split_at(15);
        assert_eq!(rest, "_suite.log");
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S").is_ok(), "{}", stamp);

        info!("normalizer log line");
        drop(guard);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("normalizer log line"), "log file was: {:?}", text);
        assert!(text.contains("logging.rs"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_compress_only_old_log_files() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("old.log");
        let fresh = dir.path().join("fresh.log");
        let other = dir.path().join("notes.txt");
        fs::write(&old, b"old line\n").unwrap();
        fs::write(&fresh, b"fresh line\n").unwrap();
        fs::write(&other, b"keep").unwrap();
        set_mtime(&old, SystemTime::now() - 10 * DAY);
        set_mtime(&other, SystemTime::now() - 10 * DAY);

        let count = compress_logs_older_than(dir.path(), COMPRESS_AFTER).unwrap();

        assert_eq!(count, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(other.exists());

        let mut text = String::new();
        GzDecoder::new(File::open(dir.path().join("old.log.gz")).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "old line\n");
    }

    #[test]
    fn test_delete_expired_files() {
        let dir = TempDir::new().unwrap();
        let expired_gz = dir.path().join("a.log.gz");
        let expired_csv = dir.path().join("b.csv");
        let recent = dir.path().join("c.log");
        for file in [&expired_gz, &expired_csv, &recent] {
            fs::write(file, b"x").unwrap();
        }
        set_mtime(&expired_gz, SystemTime::now() - 200 * DAY);
        set_mtime(&expired_csv, SystemTime::now() - 200 * DAY);
        set_mtime(&recent, SystemTime::now() - 20 * DAY);

        let count = delete_old_logs(dir.path(), RETENTION).unwrap();

        assert_eq!(count, 2);
        assert!(!expired_gz.exists());
        assert!(!expired_csv.exists());
        assert!(recent.exists());
    }
}
