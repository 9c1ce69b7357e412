//! # Storage Layer
//!
//! The [`DocumentStore`] trait is the only way the rest of the crate touches
//! persisted content. A store holds exactly one [`Document`] and replaces it
//! whole on every write.
//!
//! ## Implementations
//!
//! - [`checksum::ChecksumStore`]: JSON file with SHA-256 validation, atomic
//!   rename and a one-deep rolling backup.
//! - [`memory::MemoryStore`]: process-local, for serverless deployments and tests.
//! - [`DualModeStore`]: picks one of the above once, from [`StorageMode`].
//!
//! ## Failure Semantics
//!
//! Reads never fail: a missing, corrupt or tampered file degrades to the
//! backup, then to an empty default. Writes report success as a `bool` and
//! leave the previous document in place when they fail.
//!
//! ## Storage Layout
//!
//! ```text
//! <data-dir>/
//! ├── data.json           # Canonical document (pretty-printed)
//! ├── data.backup.json    # Previous data.json, replaced on every write
//! ├── data.checksum       # Hex SHA-256 of data.json
//! └── data.json.tmp       # Staging file, only present mid-write
//! ```
//!
//! Concurrent writers are not serialized; the later rename wins.

use crate::model::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod checksum;
pub mod memory;

use checksum::ChecksumStore;
use memory::MemoryStore;

/// Where documents live for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    File,
    Memory,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::File => f.write_str("file"),
            StorageMode::Memory => f.write_str("memory"),
        }
    }
}

/// What a store holds before anything has been loaded into it.
#[derive(Debug, Clone)]
pub enum LocalState {
    Absent,
    Present(Document),
    Corrupt(String),
}

/// Abstract interface for document persistence.
///
/// Implementations must guarantee `write(d)` followed by `read()` yields a
/// document equal to `d`.
pub trait DocumentStore {
    /// Load the current document. Never fails; degrades to defaults.
    fn read(&self) -> Document;

    /// Replace the stored document. Returns false if nothing was changed.
    fn write(&self, doc: &Document) -> bool;

    /// Drop all persisted state. Intended for test harnesses.
    fn clear(&self);

    /// Inspect existing state without recovery or side effects.
    fn probe(&self) -> LocalState;

    fn mode(&self) -> StorageMode;
}

/// Storage facade selected once at startup.
pub enum DualModeStore {
    File(ChecksumStore),
    Memory(MemoryStore),
}

impl DualModeStore {
    pub fn new(mode: StorageMode, data_dir: impl Into<PathBuf>) -> Self {
        match mode {
            StorageMode::File => DualModeStore::File(ChecksumStore::new(data_dir)),
            StorageMode::Memory => DualModeStore::Memory(MemoryStore::new()),
        }
    }

    pub fn file(data_dir: impl Into<PathBuf>) -> Self {
        DualModeStore::File(ChecksumStore::new(data_dir))
    }

    pub fn memory(initial: Option<Document>) -> Self {
        DualModeStore::Memory(match initial {
            Some(doc) => MemoryStore::with_initial(doc),
            None => MemoryStore::new(),
        })
    }

    /// Data directory for file mode.
    pub fn data_dir(&self) -> Option<&Path> {
        match self {
            DualModeStore::File(store) => Some(store.root()),
            DualModeStore::Memory(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&ChecksumStore> {
        match self {
            DualModeStore::File(store) => Some(store),
            DualModeStore::Memory(_) => None,
        }
    }
}

impl DocumentStore for DualModeStore {
    fn read(&self) -> Document {
        match self {
            DualModeStore::File(store) => {
                if !store.exists() {
                    let doc = Document::default();
                    if store.write(&doc) {
                        info!(path = %store.data_path().display(), "materialized default document");
                    } else {
                        warn!(path = %store.data_path().display(), "could not materialize default document");
                    }
                    return doc;
                }
                store.read()
            }
            DualModeStore::Memory(store) => store.read(),
        }
    }

    fn write(&self, doc: &Document) -> bool {
        match self {
            DualModeStore::File(store) => store.write(doc),
            DualModeStore::Memory(store) => store.write(doc),
        }
    }

    fn clear(&self) {
        match self {
            DualModeStore::File(store) => DocumentStore::clear(store),
            DualModeStore::Memory(store) => store.clear(),
        }
    }

    fn probe(&self) -> LocalState {
        match self {
            DualModeStore::File(store) => store.probe(),
            DualModeStore::Memory(store) => store.probe(),
        }
    }

    fn mode(&self) -> StorageMode {
        match self {
            DualModeStore::File(_) => StorageMode::File,
            DualModeStore::Memory(_) => StorageMode::Memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Document {
        let mut doc = Document::default();
        doc.team.push(
            Record::new()
                .with("id", 1)
                .with("name", "Ada")
                .with("expertise", json!(["compilers", "math"])),
        );
        doc.services.push(Record::new().with("id", 1_700_000_000_000_i64).with("title", "Audit"));
        doc.settings.0.insert("siteTitle".into(), json!("Acme"));
        doc
    }

    #[test]
    fn roundtrip_holds_in_both_modes() {
        let dir = TempDir::new().unwrap();
        for store in [DualModeStore::file(dir.path()), DualModeStore::memory(None)] {
            let doc = sample();
            assert!(store.write(&doc));
            assert_eq!(store.read(), doc, "mode {}", store.mode());
        }
    }

    #[test]
    fn file_mode_materializes_missing_file_on_read() {
        let dir = TempDir::new().unwrap();
        let store = DualModeStore::file(dir.path());
        assert_eq!(store.read(), Document::default());
        assert!(dir.path().join(checksum::DATA_FILE).exists());
    }

    #[test]
    fn memory_mode_uses_injected_initial_state() {
        let store = DualModeStore::memory(Some(sample()));
        assert_eq!(store.read(), sample());
        assert!(store.data_dir().is_none());
    }

    #[test]
    fn mode_is_fixed_by_construction() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            DualModeStore::new(StorageMode::File, dir.path()).mode(),
            StorageMode::File
        );
        assert_eq!(
            DualModeStore::new(StorageMode::Memory, dir.path()).mode(),
            StorageMode::Memory
        );
    }

    #[test]
    fn clear_in_file_mode_removes_data() {
        let dir = TempDir::new().unwrap();
        let store = DualModeStore::file(dir.path());
        assert!(store.write(&sample()));
        store.clear();
        assert!(matches!(store.probe(), LocalState::Absent));
    }

    #[test]
    fn storage_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&StorageMode::Memory).unwrap(), "\"memory\"");
        let mode: StorageMode = serde_json::from_str("\"file\"").unwrap();
        assert_eq!(mode, StorageMode::File);
    }
}
