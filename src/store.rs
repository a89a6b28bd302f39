//! Last-seen marker: one ISO-8601 timestamp in a flat text file.
//!
//! Reads never fail. A missing or corrupt file means "never seen" and is
//! reset to the epoch sentinel. Writes replace the whole file via rename.
//! No locking: overlapping invocations would race on the file.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tokio::fs;

use crate::error::StoreError;

pub const DEFAULT_PATH: &str = "state/last_seen.txt";

/// Marker value meaning "no reading evaluated yet".
pub fn sentinel() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|n| n.and_utc())
}

/// Lossless RFC 3339 rendering (sub-seconds only when present).
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[derive(Debug, Clone)]
pub struct LastSeenStore {
    path: PathBuf,
}

impl LastSeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted marker, or the sentinel (written back) if absent/unreadable.
    pub async fn read_last_seen(&self) -> DateTime<Utc> {
        match fs::read_to_string(&self.path).await {
            Ok(s) => match parse_timestamp(&s) {
                Some(t) => return t,
                None => tracing::warn!(
                    path = %self.path.display(),
                    content = %s.trim(),
                    "unparseable last-seen marker, resetting"
                ),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no last-seen marker yet")
            }
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "reading last-seen marker: {e:#}"
            ),
        }

        let t = sentinel();
        if let Err(e) = self.write_last_seen(t).await {
            tracing::warn!("initializing last-seen marker: {e:#}");
        }
        t
    }

    pub async fn write_last_seen(&self, t: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(|e| self.io_err(dir, e))?;
        }
        let tmp = self.tmp_path();
        fs::write(&tmp, format_timestamp(t))
            .await
            .map_err(|e| self.io_err(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_err(&self.path, e))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut s: OsString = self.path.as_os_str().to_owned();
        s.push(".tmp");
        PathBuf::from(s)
    }

    fn io_err(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
