use crate::commands::{CmdMessage, CmdResult};
use crate::error::{Result, SiteError};
use crate::model::Document;
use crate::store::checksum::ChecksumStore;
use std::fs;

/// Findings of a consistency check on the data directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    pub data_present: bool,
    pub data_valid: bool,
    pub checksum_present: bool,
    pub backup_present: bool,
    pub backup_valid: bool,
    pub removed_stale_tmp: bool,
    pub restored_from_backup: bool,
}

pub fn run(store: &ChecksumStore) -> Result<CmdResult> {
    let mut report = DoctorReport::default();
    let mut result = CmdResult::default();

    let tmp = store.tmp_path();
    if tmp.exists() {
        fs::remove_file(&tmp)?;
        report.removed_stale_tmp = true;
    }

    let backup = store.backup_path();
    report.backup_present = backup.exists();
    if report.backup_present {
        report.backup_valid = fs::read_to_string(&backup)
            .ok()
            .and_then(|c| serde_json::from_str::<Document>(&c).ok())
            .is_some();
    }
    report.checksum_present = store.stored_checksum()?.is_some();
    report.data_present = store.exists();

    match store.try_read() {
        Ok(_) => report.data_valid = true,
        Err(SiteError::NotFound(_)) => {}
        Err(e) => {
            result.add_message(CmdMessage::warning(format!("Data file is unusable: {}", e)));
            report.restored_from_backup = store.recover_from_backup().is_some();
        }
    }

    if report.removed_stale_tmp {
        result.add_message(CmdMessage::info("  - Removed a leftover staging file."));
    }
    if !report.data_present {
        result.add_message(CmdMessage::info("No data file yet."));
    } else if report.data_valid {
        result.add_message(CmdMessage::success("Data file is valid."));
    } else if report.restored_from_backup {
        result.add_message(CmdMessage::success("  - Restored the data file from backup."));
    } else {
        result.add_message(CmdMessage::error(
            "  - No usable backup; reads will fall back to an empty document.",
        ));
    }
    if !report.checksum_present && report.data_present {
        result.add_message(CmdMessage::warning(
            "No checksum recorded; integrity is not verified until the next write.",
        ));
    }
    if report.backup_present && !report.backup_valid {
        result.add_message(CmdMessage::warning("Backup file is not valid JSON."));
    }

    result.doctor = Some(report);
    Ok(result)
}
