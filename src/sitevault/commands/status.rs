use crate::commands::CmdResult;
use crate::error::Result;
use crate::model::Collection;
use crate::store::{DocumentStore, DualModeStore, StorageMode};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub mode: StorageMode,
    pub data_dir: Option<PathBuf>,
    pub modified: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    pub backup_present: bool,
    pub counts: Vec<(Collection, usize)>,
}

pub fn run(store: &DualModeStore) -> Result<CmdResult> {
    let doc = store.read();
    let mut report = StatusReport {
        mode: store.mode(),
        data_dir: store.data_dir().map(|p| p.to_path_buf()),
        modified: None,
        checksum: None,
        backup_present: false,
        counts: doc.counts(),
    };

    if let Some(file) = store.as_file() {
        report.modified = fs::metadata(file.data_path())
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        report.checksum = file.stored_checksum()?;
        report.backup_present = file.backup_path().exists();
    }

    Ok(CmdResult {
        status: Some(report),
        ..CmdResult::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Record};
    use tempfile::TempDir;

    #[test]
    fn file_status_reports_artifacts_and_counts() {
        let dir = TempDir::new().unwrap();
        let store = DualModeStore::file(dir.path());
        let mut doc = Document::default();
        doc.news.push(Record::new().with("id", 1));
        assert!(store.write(&doc));

        let report = run(&store).unwrap().status.unwrap();
        assert_eq!(report.mode, StorageMode::File);
        assert!(report.modified.is_some());
        assert!(report.checksum.is_some());
        assert!(!report.backup_present);
        assert!(report.counts.contains(&(Collection::News, 1)));
    }

    #[test]
    fn memory_status_has_no_files() {
        let store = DualModeStore::memory(None);
        let report = run(&store).unwrap().status.unwrap();
        assert_eq!(report.mode, StorageMode::Memory);
        assert!(report.data_dir.is_none());
        assert!(report.modified.is_none());
    }
}
