use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::snapshot::replace_file;
use crate::subject::Subject;

/// Minimum age before a cached snapshot is refetched.
pub const DEFAULT_MIN_REFRESH_SECS: i64 = 24 * 60 * 60;

/// Outcome of a staleness check.
///
/// When `stale` is true, `last_updated` is the caller's `now`: the caller is
/// about to fetch, so the optimistic timestamp is what gets rendered unless the
/// fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub stale: bool,
    pub last_updated: i64,
}

/// Per-subject record of the last successful upstream fetch.
///
/// One small file per subject whose content is a decimal unix timestamp.
/// Records are overwritten on success and never deleted.
#[derive(Debug, Clone)]
pub struct RefetchLedger {
    dir: PathBuf,
    min_refresh_secs: i64,
}

impl RefetchLedger {
    pub fn new(dir: impl Into<PathBuf>, min_refresh_secs: i64) -> Self {
        Self {
            dir: dir.into(),
            min_refresh_secs,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn min_refresh_secs(&self) -> i64 {
        self.min_refresh_secs
    }

    fn record_path(&self, subject: &Subject) -> PathBuf {
        self.dir
            .join(format!("{}.{}.txt", subject.kind().as_str(), subject.key()))
    }

    /// Timestamp of the last successful fetch, or `None` if the subject was never fetched.
    pub fn last_success(&self, subject: &Subject) -> io::Result<Option<i64>> {
        let path = self.record_path(subject);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        match raw.trim().parse::<i64>() {
            Ok(ts) => Ok(Some(ts)),
            Err(_) => {
                warn!(subject = %subject, path = %path.display(), "unreadable refetch record, treating as missing");
                Ok(None)
            }
        }
    }

    pub fn is_stale(&self, subject: &Subject, now: i64) -> io::Result<Freshness> {
        let freshness = match self.last_success(subject)? {
            Some(ts) if ts.saturating_add(self.min_refresh_secs) >= now => Freshness {
                stale: false,
                last_updated: ts,
            },
            _ => Freshness {
                stale: true,
                last_updated: now,
            },
        };
        Ok(freshness)
    }

    /// Overwrite the subject's record. Only called after a successful fetch.
    pub fn record_success(&self, subject: &Subject, now: i64) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        replace_file(&self.dir, &self.record_path(subject), now.to_string().as_bytes())
    }
}
