//! Memory Record Store: per-user ordered metadata.
//!
//! Position `i` handed out by [`RecordStore::append`] is the index of that
//! record in every later [`RecordStore::list`], until the user is cleared.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::types::MemoryRecord;
use super::{user_stem, MemoryError};

pub trait RecordStore: Send + Sync {
    /// Append `record` for `user_id` and return its position (the prior count).
    fn append(&self, user_id: &str, record: MemoryRecord) -> Result<usize, MemoryError>;

    /// Full ordered snapshot. Unknown users and unreadable artifacts yield an empty list.
    fn list(&self, user_id: &str) -> Vec<MemoryRecord>;

    /// Number of records. A corrupt artifact counts as zero; an artifact that
    /// cannot be read right now is an error.
    fn len(&self, user_id: &str) -> Result<usize, MemoryError>;

    /// Drop every record at position `len` and beyond.
    fn truncate(&self, user_id: &str, len: usize) -> Result<(), MemoryError>;

    /// Forget the user entirely. Idempotent.
    fn clear(&self, user_id: &str) -> Result<(), MemoryError>;
}

/// Records kept in process memory only.
#[derive(Default)]
pub struct InMemoryRecordStore {
    users: RwLock<HashMap<String, Vec<MemoryRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn append(&self, user_id: &str, record: MemoryRecord) -> Result<usize, MemoryError> {
        let mut users = self.users.write().map_err(|_| MemoryError::Poisoned)?;
        let records = users.entry(user_id.to_string()).or_default();
        records.push(record);
        Ok(records.len() - 1)
    }

    fn list(&self, user_id: &str) -> Vec<MemoryRecord> {
        match self.users.read() {
            Ok(users) => users.get(user_id).cloned().unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    fn len(&self, user_id: &str) -> Result<usize, MemoryError> {
        let users = self.users.read().map_err(|_| MemoryError::Poisoned)?;
        Ok(users.get(user_id).map_or(0, Vec::len))
    }

    fn truncate(&self, user_id: &str, len: usize) -> Result<(), MemoryError> {
        let mut users = self.users.write().map_err(|_| MemoryError::Poisoned)?;
        if let Some(records) = users.get_mut(user_id) {
            records.truncate(len);
        }
        Ok(())
    }

    fn clear(&self, user_id: &str) -> Result<(), MemoryError> {
        let mut users = self.users.write().map_err(|_| MemoryError::Poisoned)?;
        users.remove(user_id);
        Ok(())
    }
}

/// Records persisted as a JSON array in `memory_<stem>.json`, one file per user.
///
/// Every write replaces the whole file via a temp file and rename, so readers
/// see either the old or the new array.
pub struct JsonRecordStore {
    dir: PathBuf,
}

impl JsonRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sidecar path for a user.
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("memory_{}.json", user_stem(user_id)))
    }

    /// Load the user's records. A missing or malformed file reads as empty;
    /// I/O failures are returned so a write never overwrites data it could
    /// not read.
    fn load(&self, path: &Path) -> Result<Vec<MemoryRecord>, MemoryError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&contents) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt memory file, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, path: &Path, records: &[MemoryRecord]) -> Result<(), MemoryError> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(records)?;

        let tmp_path = path.with_extension("json.tmp");
        let result = (|| -> Result<(), MemoryError> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }
}

impl RecordStore for JsonRecordStore {
    fn append(&self, user_id: &str, record: MemoryRecord) -> Result<usize, MemoryError> {
        let path = self.path_for(user_id);
        let mut records = self.load(&path)?;
        records.push(record);
        self.write(&path, &records)?;
        Ok(records.len() - 1)
    }

    fn list(&self, user_id: &str) -> Vec<MemoryRecord> {
        let path = self.path_for(user_id);
        self.load(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "unreadable memory file, treating as empty");
            Vec::new()
        })
    }

    fn len(&self, user_id: &str) -> Result<usize, MemoryError> {
        Ok(self.load(&self.path_for(user_id))?.len())
    }

    fn truncate(&self, user_id: &str, len: usize) -> Result<(), MemoryError> {
        let path = self.path_for(user_id);
        if !path.exists() {
            return Ok(());
        }
        let mut records = self.load(&path)?;
        if records.len() > len {
            records.truncate(len);
            self.write(&path, &records)?;
        }
        Ok(())
    }

    fn clear(&self, user_id: &str) -> Result<(), MemoryError> {
        let path = self.path_for(user_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "memory file deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
