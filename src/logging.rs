//! Log sink setup.
//!
//! Everything goes to a size-capped rotating file. Events with target
//! `delivery` (messages and calls that went out) are mirrored to stdout.
//! The result is a `Dispatch` handed to the runner, not a global default.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Dispatch;
use tracing_subscriber::{filter::filter_fn, fmt, fmt::MakeWriter, prelude::*, EnvFilter};

pub const LOG_MAX_BYTES: u64 = 1024 * 1024;
pub const LOG_BACKUP_COUNT: usize = 5;
pub const DEFAULT_LOG_PATH: &str = "logs/glucose-alert.log";

/// Target for the "sent" trail that is also printed to stdout.
pub const DELIVERY_TARGET: &str = "delivery";

const DEFAULT_FILTER: &str = "glucose_alert=info,delivery=info,warn";

/// Append-only file that rolls over to `<path>.1 .. <path>.N` past `max_bytes`.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    size: u64,
}

impl RotatingFile {
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = open_append(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            backups,
            file,
            size,
        })
    }

    pub fn backup_path(&self, n: usize) -> PathBuf {
        let mut s = self.path.as_os_str().to_owned();
        s.push(format!(".{n}"));
        PathBuf::from(s)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backups == 0 {
            self.file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .create(true)
                .open(&self.path)?;
            self.size = 0;
            return Ok(());
        }
        for n in (1..self.backups).rev() {
            let src = self.backup_path(n);
            if src.exists() {
                fs::rename(&src, self.backup_path(n + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;
        self.file = open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Build the file + stdout subscriber. `RUST_LOG` overrides the default filter.
pub fn build_dispatch(path: &Path) -> io::Result<Dispatch> {
    build_dispatch_with(path, io::stdout)
}

/// Same as [`build_dispatch`] with the delivery mirror going to `mirror`.
pub fn build_dispatch_with<M>(path: &Path, mirror: M) -> io::Result<Dispatch>
where
    M: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let file = RotatingFile::open(path, LOG_MAX_BYTES, LOG_BACKUP_COUNT)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));

    let mirror_layer = fmt::layer()
        .with_target(false)
        .with_writer(mirror)
        .with_filter(filter_fn(|meta| meta.target() == DELIVERY_TARGET));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(mirror_layer);

    Ok(Dispatch::new(subscriber))
}

/// Record a failure that happened before the cycle's dispatch existed.
///
/// Tries the log file at `path` first; falls back to a plain stderr subscriber
/// when the file cannot be opened.
pub fn report_startup_error(path: &Path, err: &anyhow::Error) {
    let dispatch = build_dispatch(path).unwrap_or_else(|_| {
        Dispatch::new(
            tracing_subscriber::fmt()
                .with_ansi(false)
                .with_writer(io::stderr)
                .finish(),
        )
    });
    let chain = format!("{err:#}");
    tracing::dispatcher::with_default(&dispatch, || {
        tracing::error!(error = %chain, "startup failed");
    });
}
