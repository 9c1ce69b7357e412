use crate::commands::{CmdMessage, CmdResult};
use crate::error::{Result, SiteError};
use crate::merge::{merge_collection, merge_singleton, same_record, Preserve};
use crate::model::{
    records_from_value, type_name, Collection, Document, Record, Settings, CREATED_AT, UPDATED_AT,
};
use crate::normalize::{normalize_record, normalize_records};
use crate::store::DocumentStore;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Merges a partial update (one object or an array of them) into a collection.
///
/// Callers never set timestamps: `createdAt`/`updatedAt` in the input are
/// dropped and stamped here. Records with neither an `id` nor a match get a
/// timestamp-derived id.
pub fn upsert<S: DocumentStore>(
    store: &S,
    collection: Collection,
    incoming: Value,
    preserve: &Preserve,
    now: DateTime<Utc>,
) -> Result<CmdResult> {
    if collection.is_singleton() {
        return update_settings(store, incoming, preserve, now);
    }

    let incoming = match incoming {
        Value::Object(map) => vec![Record::from(map)],
        array @ Value::Array(_) => records_from_value(array)?,
        other => {
            return Err(SiteError::Shape(format!(
                "expected an object or an array of objects, got {}",
                type_name(&other)
            )));
        }
    };

    let mut doc = store.read();
    let records = list_mut(&mut doc, collection)?;

    let mut prepared: Vec<Record> = Vec::with_capacity(incoming.len());
    for record in incoming {
        let mut record = normalize_record(collection, record);
        record.remove(CREATED_AT);
        record.remove(UPDATED_AT);
        let known = records.iter().chain(prepared.iter()).any(|r| same_record(r, &record));
        if record.id().is_none() && !known {
            let id = next_id(records.iter().chain(prepared.iter()), now);
            record.insert("id", Value::from(id));
        }
        prepared.push(record);
    }

    let mut merged = merge_collection(records, &prepared, preserve);
    let mut affected = Vec::with_capacity(prepared.len());
    for record in &prepared {
        if let Some(slot) = merged.iter_mut().find(|m| same_record(m, record)) {
            slot.touch(now);
            affected.push(slot.clone());
        }
    }
    *records = merged;

    persist(store, &doc)?;

    let mut result = CmdResult::default().with_affected(affected);
    result.changed = true;
    result.add_message(CmdMessage::success(format!(
        "Saved {} record(s) in {}",
        result.affected.len(),
        collection
    )));
    Ok(result)
}

/// Shallow-merges into the settings singleton. `id` stays 1.
pub fn update_settings<S: DocumentStore>(
    store: &S,
    incoming: Value,
    preserve: &Preserve,
    now: DateTime<Utc>,
) -> Result<CmdResult> {
    let mut map = match incoming {
        Value::Object(map) => map,
        other => {
            return Err(SiteError::Shape(format!(
                "settings update must be an object, got {}",
                type_name(&other)
            )));
        }
    };
    map.remove(CREATED_AT);
    map.remove(UPDATED_AT);

    let mut doc = store.read();
    let mut merged = merge_singleton(&doc.settings, &Settings(map), preserve);
    merged.0.insert("id".to_string(), Value::from(1));
    merged.0.insert(UPDATED_AT.to_string(), Value::String(stamp(now)));
    doc.settings = merged;

    persist(store, &doc)?;

    let mut result = CmdResult::default().with_value(doc.settings.into_value());
    result.changed = true;
    result.add_message(CmdMessage::success("Settings updated"));
    Ok(result)
}

/// Replaces a collection wholesale with the given wire value.
pub fn replace<S: DocumentStore>(
    store: &S,
    collection: Collection,
    value: Value,
    now: DateTime<Utc>,
) -> Result<CmdResult> {
    let mut doc = store.read();
    doc.set_collection_value(collection, value)?;

    if let Some(records) = doc.records_mut(collection) {
        let mut normalized = normalize_records(collection, std::mem::take(records));
        for i in 0..normalized.len() {
            if normalized[i].id().is_none() {
                let id = next_id(normalized.iter(), now);
                normalized[i].insert("id", Value::from(id));
            }
        }
        *records = normalized;
    }

    persist(store, &doc)?;

    let count = doc.records(collection).map_or(1, Vec::len);
    let mut result = CmdResult::default().with_value(doc.collection_value(collection));
    result.changed = true;
    result.add_message(CmdMessage::success(format!(
        "Replaced {} ({} entr{})",
        collection,
        count,
        if count == 1 { "y" } else { "ies" }
    )));
    Ok(result)
}

pub(crate) fn list_mut(doc: &mut Document, collection: Collection) -> Result<&mut Vec<Record>> {
    doc.records_mut(collection)
        .ok_or_else(|| SiteError::Api(format!("{} is not a list collection", collection)))
}

pub(crate) fn persist<S: DocumentStore>(store: &S, doc: &Document) -> Result<()> {
    if store.write(doc) {
        Ok(())
    } else {
        Err(SiteError::WriteFailure(
            "document was not persisted; previous content kept".to_string(),
        ))
    }
}

fn stamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Millisecond timestamp, bumped past any id already taken.
fn next_id<'a>(taken: impl Iterator<Item = &'a Record> + Clone, now: DateTime<Utc>) -> i64 {
    let mut candidate = now.timestamp_millis();
    while taken
        .clone()
        .any(|r| r.id().and_then(Value::as_i64) == Some(candidate))
    {
        candidate += 1;
    }
    candidate
}
