//! Local persistent store for guest carts
//!
//! A string-keyed slot store. Each cart owns one slot holding the JSON array of
//! its lines.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use crate::domain::aggregates::LineItem;

#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("Local store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode cart lines: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable key/value slots. Synchronous; only the owning cart touches a slot.
pub trait LocalStore: Send + Sync + 'static {
    fn read(&self, key: &str) -> Result<Option<String>, LocalStoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;
    fn remove(&self, key: &str) -> Result<(), LocalStoreError>;
}

/// Outcome of reading a cart slot.
#[derive(Debug, PartialEq)]
pub enum SlotContents {
    Missing,
    Lines(Vec<LineItem>),
    /// The slot exists but does not hold a line array.
    Malformed(String),
}

impl SlotContents {
    pub fn into_lines(self) -> Vec<LineItem> {
        match self { Self::Lines(lines) => lines, Self::Missing | Self::Malformed(_) => Vec::new() }
    }
}

pub fn read_lines(store: &dyn LocalStore, key: &str) -> Result<SlotContents, LocalStoreError> {
    let Some(raw) = store.read(key)? else { return Ok(SlotContents::Missing) };
    Ok(match serde_json::from_str::<Vec<LineItem>>(&raw) {
        Ok(lines) => SlotContents::Lines(lines),
        Err(e) => SlotContents::Malformed(e.to_string()),
    })
}

pub fn write_lines(store: &dyn LocalStore, key: &str, lines: &[LineItem]) -> Result<(), LocalStoreError> {
    store.write(key, &serde_json::to_string(lines)?)
}

/// Process-local slots.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocalStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, LocalStoreError> { Ok(self.slots().get(key).cloned()) }
    fn write(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        self.slots().insert(key.to_string(), value.to_string());
        Ok(())
    }
    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        self.slots().remove(key);
        Ok(())
    }
}

/// One JSON file per slot under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LocalStoreError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self { dir: dir.as_ref().to_path_buf() })
    }

    /// Keys become file names; anything outside `[A-Za-z0-9_-]` is replaced.
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl LocalStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        // Write-then-rename so a crash never leaves a half-written slot.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
