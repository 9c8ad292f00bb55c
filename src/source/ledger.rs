// src/source/ledger.rs
//! Persistent record of source URLs that have already been published.
//!
//! The file is replaced whole on every write (temp file + rename), so a crash
//! mid-write leaves the previous record intact.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_LEDGER_FILE: &str = "used_sources.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerRecord {
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UsedSourceLedger {
    path: PathBuf,
}

impl UsedSourceLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Used URLs. Missing or unreadable ledgers count as empty.
    pub fn load(&self) -> HashSet<String> {
        match self.read_record() {
            Ok(Some(rec)) => rec.urls.into_iter().collect(),
            Ok(None) => HashSet::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ledger unreadable, treating as empty");
                HashSet::new()
            }
        }
    }

    /// Append `url` and persist. Call only after the platform confirmed the post.
    pub fn record(&self, url: &str) -> io::Result<()> {
        self.record_at(url, Utc::now())
    }

    pub fn record_at(&self, url: &str, now: DateTime<Utc>) -> io::Result<()> {
        let mut rec = match self.read_record() {
            Ok(Some(rec)) => rec,
            Ok(None) => LedgerRecord::default(),
            Err(e) => {
                // Keep the damaged file around instead of silently dropping its history.
                let backup = self.path.with_extension("json.corrupt");
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "ledger corrupt, preserving copy and starting fresh"
                );
                fs::copy(&self.path, &backup)?;
                LedgerRecord::default()
            }
        };

        if !rec.urls.iter().any(|u| u == url) {
            rec.urls.push(url.to_string());
        }
        rec.last_updated = Some(now);

        let json = serde_json::to_string_pretty(&rec)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_atomic(&self.path, json.as_bytes())?;
        info!(path = %self.path.display(), url, total = rec.urls.len(), "source recorded in ledger");
        Ok(())
    }

    fn read_record(&self) -> io::Result<Option<LedgerRecord>> {
        let s = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let rec: LedgerRecord =
            serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(rec))
    }
}

/// Write to `<path>.tmp`, flush to disk, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}
