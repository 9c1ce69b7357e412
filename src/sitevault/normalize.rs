//! Ingestion-time cleanup of caller supplied records.
//!
//! Runs once when a record enters the store so the merge and diff code can
//! rely on one shape: numeric ids are numbers, testimonial text lives under
//! `testimonial`, and list-valued team fields are arrays.

use crate::model::{Collection, Document, Record};
use serde_json::Value;

const LIST_FIELDS: [&str; 3] = ["skills", "expertise", "specialties"];

pub fn normalize_record(collection: Collection, mut record: Record) -> Record {
    if let Some(Value::String(raw)) = record.get("id") {
        if let Ok(n) = raw.trim().parse::<i64>() {
            record.insert("id", Value::from(n));
        }
    }

    if let Some(Value::String(email)) = record.get("email") {
        let trimmed = email.trim();
        if trimmed.len() != email.len() {
            let trimmed = trimmed.to_string();
            record.insert("email", Value::String(trimmed));
        }
    }

    if collection == Collection::Testimonials && record.get("testimonial").is_none() {
        if let Some(message) = record.remove("message") {
            record.insert("testimonial", message);
        }
    }

    for field in LIST_FIELDS {
        if let Some(Value::String(raw)) = record.get(field) {
            let items: Vec<Value> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect();
            record.insert(field, Value::Array(items));
        }
    }

    record
}

pub fn normalize_records(collection: Collection, records: Vec<Record>) -> Vec<Record> {
    records
        .into_iter()
        .map(|r| normalize_record(collection, r))
        .collect()
}

/// Normalizes every list collection of a document in place.
pub fn normalize_document(doc: &mut Document) {
    for collection in Collection::ALL {
        if let Some(records) = doc.records_mut(collection) {
            let taken = std::mem::take(records);
            *records = normalize_records(collection, taken);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn numeric_string_ids_become_numbers() {
        let r = normalize_record(Collection::Team, rec(json!({"id": " 42 "})));
        assert_eq!(r.id(), Some(&json!(42)));

        let r = normalize_record(Collection::Team, rec(json!({"id": "abc"})));
        assert_eq!(r.id(), Some(&json!("abc")));
    }

    #[test]
    fn testimonial_message_alias_is_renamed() {
        let r = normalize_record(
            Collection::Testimonials,
            rec(json!({"id": 1, "message": "Great work"})),
        );
        assert_eq!(r.get("testimonial"), Some(&json!("Great work")));
        assert!(r.get("message").is_none());
    }

    #[test]
    fn existing_testimonial_wins_over_alias() {
        let r = normalize_record(
            Collection::Testimonials,
            rec(json!({"testimonial": "A", "message": "B"})),
        );
        assert_eq!(r.get("testimonial"), Some(&json!("A")));
        assert_eq!(r.get("message"), Some(&json!("B")));
    }

    #[test]
    fn message_is_left_alone_outside_testimonials() {
        let r = normalize_record(Collection::Contacts, rec(json!({"message": "hi"})));
        assert_eq!(r.get("message"), Some(&json!("hi")));
        assert!(r.get("testimonial").is_none());
    }

    #[test]
    fn comma_separated_lists_are_split() {
        let r = normalize_record(
            Collection::Team,
            rec(json!({"skills": "rust, go ,, sql", "expertise": ["a"]})),
        );
        assert_eq!(r.get("skills"), Some(&json!(["rust", "go", "sql"])));
        assert_eq!(r.get("expertise"), Some(&json!(["a"])));
    }

    #[test]
    fn emails_are_trimmed() {
        let r = normalize_record(Collection::Team, rec(json!({"email": " a@b.io "})));
        assert_eq!(r.email(), Some("a@b.io"));
    }

    #[test]
    fn document_normalization_covers_all_lists() {
        let mut doc = Document::default();
        doc.jobs.push(rec(json!({"id": "7"})));
        doc.testimonials.push(rec(json!({"message": "x"})));
        normalize_document(&mut doc);
        assert_eq!(doc.jobs[0].id(), Some(&json!(7)));
        assert_eq!(doc.testimonials[0].get("testimonial"), Some(&json!("x")));
    }
}
