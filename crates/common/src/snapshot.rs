use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::subject::Subject;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no snapshot stored for {0}")]
    NotFound(String),
    #[error("snapshot io: {0}")]
    Io(#[from] io::Error),
}

/// Raw upstream payloads on disk.
///
/// Layout: `<data_dir>/<kind>/<key>/<unix_ts>.<key>.txt` for history (never
/// overwritten) and `<data_dir>/<kind>/<key>/<key>.txt` for the latest copy.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn subject_dir(&self, subject: &Subject) -> PathBuf {
        self.dir.join(subject.kind().as_str()).join(subject.key())
    }

    pub fn latest_path(&self, subject: &Subject) -> PathBuf {
        self.subject_dir(subject)
            .join(format!("{}.txt", subject.key()))
    }

    pub fn history_path(&self, subject: &Subject, ts: i64) -> PathBuf {
        self.subject_dir(subject)
            .join(format!("{ts}.{}.txt", subject.key()))
    }

    /// Persist `bytes` as both a permanent timestamped snapshot and the latest copy.
    ///
    /// The latest copy is replaced through a rename so a concurrent reader sees
    /// either the old or the new payload, never a partial one.
    pub fn write(&self, subject: &Subject, ts: i64, bytes: &[u8]) -> Result<(), StoreError> {
        let dir = self.subject_dir(subject);
        fs::create_dir_all(&dir)?;

        let history = self.history_path(subject, ts);
        match OpenOptions::new().write(true).create_new(true).open(&history) {
            Ok(mut file) => file.write_all(bytes)?,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(subject = %subject, ts, "history snapshot already present, keeping first");
            }
            Err(e) => return Err(e.into()),
        }

        replace_file(&dir, &self.latest_path(subject), bytes)?;
        Ok(())
    }

    pub fn read_latest(&self, subject: &Subject) -> Result<Vec<u8>, StoreError> {
        read_or_not_found(&self.latest_path(subject), subject)
    }

    pub fn has_latest(&self, subject: &Subject) -> bool {
        self.latest_path(subject).is_file()
    }

    /// Timestamps of every historical snapshot for a subject, oldest first.
    pub fn history(&self, subject: &Subject) -> Result<Vec<i64>, StoreError> {
        let dir = self.subject_dir(subject);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let suffix = format!(".{}.txt", subject.key());
        let mut stamps = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(ts) = name
                .strip_suffix(&suffix)
                .and_then(|prefix| prefix.parse::<i64>().ok())
            {
                stamps.push(ts);
            }
        }
        stamps.sort_unstable();
        Ok(stamps)
    }
}

/// Replace `path` through a uniquely named temp file in `dir`, so writers in
/// separate processes never share a temp name.
pub(crate) fn replace_file(dir: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path)?;
    Ok(())
}

fn read_or_not_found(path: &Path, subject: &Subject) -> Result<Vec<u8>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(subject.to_string())),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_keeps_history_and_replaces_latest() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let subject = Subject::player("Berserkguard").unwrap();

        store.write(&subject, 100, b"first").unwrap();
        store.write(&subject, 200, b"second").unwrap();

        assert_eq!(store.read_latest(&subject).unwrap(), b"second");
        assert_eq!(store.history(&subject).unwrap(), vec![100, 200]);
        assert_eq!(
            fs::read(tmp.path().join("user/berserkguard/100.berserkguard.txt")).unwrap(),
            b"first"
        );
        assert!(tmp.path().join("user/berserkguard/berserkguard.txt").is_file());
    }

    #[test]
    fn test_history_is_never_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let subject = Subject::player("zezima").unwrap();

        store.write(&subject, 100, b"first").unwrap();
        store.write(&subject, 100, b"again").unwrap();

        assert_eq!(fs::read(store.history_path(&subject, 100)).unwrap(), b"first");
        assert_eq!(store.read_latest(&subject).unwrap(), b"again");
    }

    #[test]
    fn test_independent_stores_write_one_subject_concurrently() {
        let tmp = tempfile::tempdir().unwrap();
        let subject = Subject::player("Berserkguard").unwrap();

        let writers: Vec<_> = (0..2)
            .map(|n| {
                let store = SnapshotStore::new(tmp.path());
                let subject = subject.clone();
                std::thread::spawn(move || {
                    (0..200)
                        .filter(|i| store.write(&subject, n * 1_000 + i, b"payload").is_err())
                        .count()
                })
            })
            .collect();
        let errors: usize = writers.into_iter().map(|w| w.join().unwrap()).sum();

        assert_eq!(errors, 0);
        let store = SnapshotStore::new(tmp.path());
        assert_eq!(store.read_latest(&subject).unwrap(), b"payload");
        assert_eq!(store.history(&subject).unwrap().len(), 400);
        let leftovers = fs::read_dir(store.subject_dir(&subject)).unwrap().count();
        assert_eq!(leftovers, 401);
    }

    #[test]
    fn test_read_latest_not_found_for_unknown_subject() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let subject = Subject::player("nobody").unwrap();

        assert!(!store.has_latest(&subject));
        assert!(matches!(
            store.read_latest(&subject),
            Err(StoreError::NotFound(s)) if s == "user:nobody"
        ));
        assert!(store.history(&subject).unwrap().is_empty());
    }
}
