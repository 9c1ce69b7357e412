use super::{DocumentStore, LocalState, StorageMode};
use crate::error::{Result, SiteError};
use crate::model::Document;
use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const DATA_FILE: &str = "data.json";
pub const BACKUP_FILE: &str = "data.backup.json";
pub const CHECKSUM_FILE: &str = "data.checksum";
pub const TMP_FILE: &str = "data.json.tmp";

/// Hex-encoded SHA-256 of the given bytes.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Canonical on-disk serialization. The checksum is only valid for these exact bytes.
pub fn serialize(doc: &Document) -> Result<String> {
    serde_json::to_string_pretty(doc).map_err(SiteError::Serialization)
}

/// File-backed document store.
///
/// Writes go to `data.json.tmp`, are parsed back and compared before the
/// previous `data.json` is copied to `data.backup.json` and the temp file is
/// renamed over it. The rename is the only mutation of the canonical path.
pub struct ChecksumStore {
    root: PathBuf,
    simulate_validation_failure: Cell<bool>,
}

impl ChecksumStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            simulate_validation_failure: Cell::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_path(&self) -> PathBuf {
        self.root.join(DATA_FILE)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.root.join(BACKUP_FILE)
    }

    pub fn checksum_path(&self) -> PathBuf {
        self.root.join(CHECKSUM_FILE)
    }

    pub fn tmp_path(&self) -> PathBuf {
        self.root.join(TMP_FILE)
    }

    pub fn exists(&self) -> bool {
        self.data_path().exists()
    }

    /// Make the temp-file verification step fail, for exercising the abort path.
    pub fn set_simulate_validation_failure(&self, simulate: bool) {
        self.simulate_validation_failure.set(simulate);
    }

    /// Loads the document, degrading to the backup and then to defaults.
    pub fn read(&self) -> Document {
        match self.try_read() {
            Ok(doc) => doc,
            Err(SiteError::NotFound(_)) => {
                info!(path = %self.data_path().display(), "no data file, using defaults");
                Document::default()
            }
            Err(e) => {
                warn!(error = %e, "data file unusable, attempting backup recovery");
                match self.recover_from_backup() {
                    Some(doc) => doc,
                    None => {
                        error!("backup recovery failed, falling back to an empty document");
                        Document::default()
                    }
                }
            }
        }
    }

    /// Strict read: reports missing, corrupt and tampered files as errors.
    pub fn try_read(&self) -> Result<Document> {
        let path = self.data_path();
        if !path.exists() {
            return Err(SiteError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(&path)?;

        if let Some(expected) = self.stored_checksum()? {
            let actual = checksum(content.as_bytes());
            if actual != expected {
                return Err(SiteError::Integrity {
                    path,
                    expected,
                    actual,
                });
            }
        }

        serde_json::from_str(&content).map_err(|source| SiteError::Parse { path, source })
    }

    /// The recorded checksum, or `None` when the file is absent or empty.
    pub fn stored_checksum(&self) -> Result<Option<String>> {
        let path = self.checksum_path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }

    /// Persists `doc`. Returns false with the previous data file intact if any
    /// step before the rename fails.
    pub fn write(&self, doc: &Document) -> bool {
        match self.try_write(doc) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, path = %self.data_path().display(), "write aborted");
                let tmp = self.tmp_path();
                if tmp.exists() {
                    if let Err(e) = fs::remove_file(&tmp) {
                        warn!(error = %e, path = %tmp.display(), "could not remove temp file");
                    }
                }
                false
            }
        }
    }

    fn try_write(&self, doc: &Document) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
        }

        let content = serialize(doc)?;
        let sum = checksum(content.as_bytes());
        let tmp = self.tmp_path();
        fs::write(&tmp, &content)?;

        self.verify_staged(&tmp, doc, &sum)?;

        let data = self.data_path();
        if data.exists() {
            fs::copy(&data, self.backup_path())?;
        }

        fs::rename(&tmp, &data)?;

        // The data file is committed at this point. A stale checksum would make
        // the next read discard it, so drop the checksum rather than keep it.
        if let Err(e) = fs::write(self.checksum_path(), &sum) {
            warn!(error = %e, "checksum not persisted, validation disabled until next write");
            if let Err(e) = fs::remove_file(self.checksum_path()) {
                warn!(error = %e, "stale checksum could not be removed");
            }
        }

        debug!(path = %data.display(), checksum = %sum, "document written");
        Ok(())
    }

    fn verify_staged(&self, tmp: &Path, doc: &Document, sum: &str) -> Result<()> {
        if self.simulate_validation_failure.get() {
            return Err(SiteError::WriteFailure(
                "simulated temp file validation failure".to_string(),
            ));
        }
        let staged = fs::read_to_string(tmp)?;
        if checksum(staged.as_bytes()) != sum {
            return Err(SiteError::WriteFailure(
                "temp file checksum does not match".to_string(),
            ));
        }
        let parsed: Document = serde_json::from_str(&staged).map_err(|source| SiteError::Parse {
            path: tmp.to_path_buf(),
            source,
        })?;
        if &parsed != doc {
            return Err(SiteError::WriteFailure(
                "temp file does not round-trip".to_string(),
            ));
        }
        Ok(())
    }

    /// Restores the backup over the data file and returns its content.
    pub fn recover_from_backup(&self) -> Option<Document> {
        match self.try_recover() {
            Ok(doc) => {
                info!(path = %self.backup_path().display(), "recovered document from backup");
                Some(doc)
            }
            Err(e) => {
                warn!(error = %e, "backup unavailable");
                None
            }
        }
    }

    fn try_recover(&self) -> Result<Document> {
        let backup = self.backup_path();
        if !backup.exists() {
            return Err(SiteError::NotFound(backup.display().to_string()));
        }
        let content = fs::read_to_string(&backup)?;
        let doc: Document = serde_json::from_str(&content).map_err(|source| SiteError::Parse {
            path: backup.clone(),
            source,
        })?;

        if let Err(e) = self.restore_raw(&content) {
            warn!(error = %e, "backup parsed but could not be restored over the data file");
        }
        Ok(doc)
    }

    fn restore_raw(&self, content: &str) -> Result<()> {
        let tmp = self.tmp_path();
        fs::write(&tmp, content)?;
        fs::rename(&tmp, self.data_path())?;
        fs::write(self.checksum_path(), checksum(content.as_bytes()))?;
        Ok(())
    }

    /// Raw look at the data file without checksum validation or recovery.
    pub fn probe(&self) -> LocalState {
        let path = self.data_path();
        if !path.exists() {
            return LocalState::Absent;
        }
        let parsed = fs::read_to_string(&path)
            .map_err(SiteError::Io)
            .and_then(|c| {
                serde_json::from_str::<Document>(&c)
                    .map_err(|source| SiteError::Parse { path, source })
            });
        match parsed {
            Ok(doc) => LocalState::Present(doc),
            Err(e) => LocalState::Corrupt(e.to_string()),
        }
    }

    /// Removes the data file and its derived artifacts.
    pub fn remove_files(&self) -> Result<()> {
        for path in [
            self.data_path(),
            self.backup_path(),
            self.checksum_path(),
            self.tmp_path(),
        ] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

impl DocumentStore for ChecksumStore {
    fn read(&self) -> Document {
        ChecksumStore::read(self)
    }

    fn write(&self, doc: &Document) -> bool {
        ChecksumStore::write(self, doc)
    }

    fn clear(&self) {
        if let Err(e) = self.remove_files() {
            warn!(error = %e, "failed to clear data files");
        }
    }

    fn probe(&self) -> LocalState {
        ChecksumStore::probe(self)
    }

    fn mode(&self) -> StorageMode {
        StorageMode::File
    }
}
