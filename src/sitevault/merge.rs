//! # Record Merging
//!
//! Applies incoming partial updates over existing content. Incoming values win
//! field by field (last writer wins), except for the fields a caller names in
//! [`Preserve`], which keep their existing value.
//!
//! Records are matched on `id`. When either side has no `id`, a shared
//! non-empty `email` counts as a match instead. Unmatched incoming records are
//! appended in arrival order; existing order never changes.
//!
//! Everything here is pure.

use crate::error::{Result, SiteError};
use crate::model::{type_name, Record, Settings};
use serde_json::Value;
use std::collections::BTreeSet;

/// Field names that a merge must not overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preserve(BTreeSet<String>);

impl Preserve {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for Preserve {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::fields(iter)
    }
}

/// Loose id comparison: `1` and `"1"` are the same record.
pub fn ids_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::Number(n)) | (Value::Number(n), Value::String(x)) => {
            x.trim() == n.to_string()
        }
        _ => a == b,
    }
}

/// Whether `incoming` refers to the same record as `existing`.
pub fn same_record(existing: &Record, incoming: &Record) -> bool {
    match (existing.id(), incoming.id()) {
        (Some(a), Some(b)) => ids_equal(a, b),
        _ => match (existing.email(), incoming.email()) {
            (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
            _ => false,
        },
    }
}

/// Overwrites fields of `target` with those of `incoming`, skipping preserved
/// fields that `target` already has.
fn overlay(target: &mut Record, incoming: &Record, preserve: &Preserve) {
    for (key, value) in incoming.fields() {
        if preserve.contains(key) && target.get(key).is_some() {
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}

pub fn merge_collection(existing: &[Record], incoming: &[Record], preserve: &Preserve) -> Vec<Record> {
    let mut merged: Vec<Record> = existing.to_vec();
    for record in incoming {
        match merged.iter_mut().find(|current| same_record(current, record)) {
            Some(current) => overlay(current, record, preserve),
            None => merged.push(record.clone()),
        }
    }
    merged
}

pub fn merge_singleton(existing: &Settings, incoming: &Settings, preserve: &Preserve) -> Settings {
    let mut merged = existing.clone();
    for (key, value) in &incoming.0 {
        merged.0.insert(key.clone(), value.clone());
    }
    for field in preserve.iter() {
        if let Some(value) = existing.0.get(field) {
            merged.0.insert(field.clone(), value.clone());
        }
    }
    merged
}

/// Merges wire-shaped values: arrays as collections, objects as singletons.
pub fn merge_value(existing: &Value, incoming: &Value, preserve: &Preserve) -> Result<Value> {
    match (existing, incoming) {
        (Value::Array(current), Value::Array(update)) => {
            let current = to_records(current)?;
            let update = to_records(update)?;
            Ok(Value::Array(
                merge_collection(&current, &update, preserve)
                    .into_iter()
                    .map(Record::into_value)
                    .collect(),
            ))
        }
        (Value::Object(current), Value::Object(update)) => {
            let merged = merge_singleton(
                &Settings(current.clone()),
                &Settings(update.clone()),
                preserve,
            );
            Ok(merged.into_value())
        }
        (Value::Array(_), other) => Err(SiteError::Shape(format!(
            "cannot merge {} into a collection",
            type_name(other)
        ))),
        (Value::Object(_), other) => Err(SiteError::Shape(format!(
            "cannot merge {} into a singleton",
            type_name(other)
        ))),
        (other, _) => Err(SiteError::Shape(format!(
            "cannot merge into {}",
            type_name(other)
        ))),
    }
}

fn to_records(items: &[Value]) -> Result<Vec<Record>> {
    items.iter().cloned().map(Record::from_value).collect()
}
