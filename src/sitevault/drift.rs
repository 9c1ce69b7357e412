//! # Drift Reconciliation
//!
//! Compares two snapshots of one collection, typically the local store and the
//! remote API, and classifies every record that differs. Records are paired
//! with the same rule the merger uses (`id`, then `email`).
//!
//! Results are advisory. [`suggest`] proposes a one-sided fix per difference;
//! applying it is a separate step ([`apply_pull`], or pushing
//! [`pending_pushes`] to the remote).

use crate::merge::same_record;
use crate::model::{Record, Settings, CREATED_AT, UPDATED_AT};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// Fields that change on every write and never count as drift.
pub const VOLATILE_FIELDS: [&str; 5] = [CREATED_AT, UPDATED_AT, "created_at", "updated_at", "lastModified"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDelta {
    pub field: String,
    pub local: Option<Value>,
    pub remote: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Difference {
    MissingInRemote {
        local: Record,
    },
    MissingInLocal {
        remote: Record,
    },
    Mismatch {
        local: Record,
        remote: Record,
        fields: Vec<FieldDelta>,
    },
}

impl Difference {
    /// Identifier of the record this difference is about, if it has one.
    pub fn key(&self) -> Option<&Value> {
        match self {
            Difference::MissingInRemote { local } => local.id(),
            Difference::MissingInLocal { remote } => remote.id(),
            Difference::Mismatch { local, remote, .. } => local.id().or_else(|| remote.id()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Difference::MissingInRemote { .. } => "missing in remote",
            Difference::MissingInLocal { .. } => "missing in local",
            Difference::Mismatch { .. } => "mismatch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    PushToRemote,
    PullFromRemote,
}

fn is_volatile(field: &str) -> bool {
    VOLATILE_FIELDS.contains(&field)
}

/// Per-field differences between two records, volatile fields excluded.
pub fn field_deltas(local: &Record, remote: &Record) -> Vec<FieldDelta> {
    let fields: BTreeSet<&String> = local
        .fields()
        .chain(remote.fields())
        .map(|(k, _)| k)
        .filter(|k| !is_volatile(k))
        .collect();

    fields
        .into_iter()
        .filter_map(|field| {
            let l = local.get(field);
            let r = remote.get(field);
            if l == r {
                None
            } else {
                Some(FieldDelta {
                    field: field.clone(),
                    local: l.cloned(),
                    remote: r.cloned(),
                })
            }
        })
        .collect()
}

pub fn diff(local: &[Record], remote: &[Record]) -> Vec<Difference> {
    let mut differences = Vec::new();
    let mut matched_remote = vec![false; remote.len()];

    for l in local {
        let found = remote
            .iter()
            .enumerate()
            .find(|(i, r)| !matched_remote[*i] && same_record(l, r));
        match found {
            Some((i, r)) => {
                matched_remote[i] = true;
                let fields = field_deltas(l, r);
                if !fields.is_empty() {
                    differences.push(Difference::Mismatch {
                        local: l.clone(),
                        remote: r.clone(),
                        fields,
                    });
                }
            }
            None => differences.push(Difference::MissingInRemote { local: l.clone() }),
        }
    }

    for (r, matched) in remote.iter().zip(matched_remote) {
        if !matched {
            differences.push(Difference::MissingInLocal { remote: r.clone() });
        }
    }

    differences
}

/// Settings are a single record, so they can only mismatch.
pub fn diff_singleton(local: &Settings, remote: &Settings) -> Option<Difference> {
    let local = Record(local.0.clone());
    let remote = Record(remote.0.clone());
    let fields = field_deltas(&local, &remote);
    if fields.is_empty() {
        None
    } else {
        Some(Difference::Mismatch {
            local,
            remote,
            fields,
        })
    }
}

pub fn suggest(difference: &Difference) -> Option<Resolution> {
    match difference {
        Difference::MissingInRemote { .. } => Some(Resolution::PushToRemote),
        Difference::MissingInLocal { .. } => None,
        Difference::Mismatch { .. } => Some(Resolution::PullFromRemote),
    }
}

/// Replaces local records with their remote version for every mismatch.
/// Returns how many records changed.
pub fn apply_pull(local: &mut [Record], differences: &[Difference]) -> usize {
    let mut applied = 0;
    for difference in differences {
        if suggest(difference) != Some(Resolution::PullFromRemote) {
            continue;
        }
        if let Difference::Mismatch { remote, .. } = difference {
            if let Some(slot) = local.iter_mut().find(|l| same_record(l, remote)) {
                *slot = remote.clone();
                applied += 1;
            }
        }
    }
    applied
}

/// Local records the remote is missing.
pub fn pending_pushes(differences: &[Difference]) -> Vec<Record> {
    differences
        .iter()
        .filter(|d| suggest(d) == Some(Resolution::PushToRemote))
        .filter_map(|d| match d {
            Difference::MissingInRemote { local } => Some(local.clone()),
            _ => None,
        })
        .collect()
}
