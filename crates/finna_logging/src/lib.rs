//! Logging setup shared by the Finna maintenance tools.
//!
//! Everything goes to a size-rotated file under `~/.finna/logs`; stderr only
//! shows warnings unless the caller asked for verbose output.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "finna=info,finna_db=info,finna_scroller=info";
const KEEP_LOG_FILES: usize = 5;
const LOG_FILE_LIMIT: u64 = 10 * 1024 * 1024;

pub struct LogConfig<'a> {
    /// Base name of the log file.
    pub app_name: &'a str,
    /// Mirror the file filter on stderr.
    pub verbose: bool,
    /// Overrides the default logs directory.
    pub log_dir: Option<PathBuf>,
}

/// Install the global tracing subscriber.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let dir = match config.log_dir {
        Some(dir) => dir,
        None => logs_dir()?,
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    let writer = LogFileWriter::open(&dir, config.app_name)?;

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let stderr_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(stderr_filter),
        )
        .try_init()
        .context("Logging already initialised")?;

    Ok(())
}

/// Finna home directory: `$FINNA_HOME`, else `~/.finna`.
pub fn finna_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("FINNA_HOME") {
        return Ok(PathBuf::from(home));
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".finna"))
}

/// Logs directory: `<finna home>/logs`.
pub fn logs_dir() -> Result<PathBuf> {
    Ok(finna_home()?.join("logs"))
}

/// Appends to `<name>.log`, shifting it to `<name>.log.1`..`.N` once full.
struct RotatingLog {
    current: PathBuf,
    keep: usize,
    limit: u64,
    file: Option<File>,
    written: u64,
}

impl RotatingLog {
    fn open(dir: &Path, name: &str, keep: usize, limit: u64) -> io::Result<Self> {
        let mut log = Self {
            current: dir.join(format!("{}.log", file_stem(name))),
            keep: keep.max(1),
            limit,
            file: None,
            written: 0,
        };
        log.reopen()?;
        if log.written > log.limit {
            log.roll()?;
        }
        Ok(log)
    }

    fn backup(&self, index: usize) -> PathBuf {
        let mut name = self.current.clone().into_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current)?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn roll(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        let backups = self.keep - 1;
        if backups > 0 {
            let oldest = self.backup(backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..backups).rev() {
                let from = self.backup(index);
                if from.exists() {
                    fs::rename(&from, self.backup(index + 1))?;
                }
            }
            if self.current.exists() {
                fs::rename(&self.current, self.backup(1))?;
            }
        } else if self.current.exists() {
            fs::remove_file(&self.current)?;
        }
        self.reopen()
    }
}

impl Write for RotatingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.limit {
            self.roll()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// `MakeWriter` handing out handles to one shared [`RotatingLog`].
#[derive(Clone)]
struct LogFileWriter(Arc<Mutex<RotatingLog>>);

impl LogFileWriter {
    fn open(dir: &Path, name: &str) -> Result<Self> {
        let log = RotatingLog::open(dir, name, KEEP_LOG_FILES, LOG_FILE_LIMIT)
            .with_context(|| format!("Failed to open log file for {}", name))?;
        Ok(Self(Arc::new(Mutex::new(log))))
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileWriter {
    type Writer = LogFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .flush()
    }
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    if stem.is_empty() {
        "finna".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_replaces_path_characters() {
        assert_eq!(file_stem("finna db/upgrade"), "finna_db_upgrade");
        assert_eq!(file_stem(""), "finna");
    }

    #[test]
    fn rolls_over_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RotatingLog::open(dir.path(), "finna", 3, 16).unwrap();
        for _ in 0..4 {
            log.write_all(b"0123456789abcdef").unwrap();
        }
        log.flush().unwrap();

        assert!(dir.path().join("finna.log").exists());
        assert!(dir.path().join("finna.log.1").exists());
        assert!(dir.path().join("finna.log.2").exists());
        assert!(!dir.path().join("finna.log.3").exists());
        let current = fs::read(dir.path().join("finna.log")).unwrap();
        assert_eq!(current.len(), 16);
    }

    #[test]
    fn oversized_file_is_rolled_on_open() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.log"), vec![b'x'; 64]).unwrap();
        let log = RotatingLog::open(dir.path(), "app", 2, 32).unwrap();
        assert_eq!(log.written, 0);
        assert_eq!(fs::read(dir.path().join("app.log.1")).unwrap().len(), 64);
    }
}
