use crate::error::{Result, SiteError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Named sections of the [`Document`]. All but `Settings` hold ordered lists of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Team,
    Services,
    Solutions,
    Contacts,
    Testimonials,
    News,
    Jobs,
    Applications,
    Projects,
    Settings,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Team,
        Collection::Services,
        Collection::Solutions,
        Collection::Contacts,
        Collection::Testimonials,
        Collection::News,
        Collection::Jobs,
        Collection::Applications,
        Collection::Projects,
        Collection::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Team => "team",
            Collection::Services => "services",
            Collection::Solutions => "solutions",
            Collection::Contacts => "contacts",
            Collection::Testimonials => "testimonials",
            Collection::News => "news",
            Collection::Jobs => "jobs",
            Collection::Applications => "applications",
            Collection::Projects => "projects",
            Collection::Settings => "settings",
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, Collection::Settings)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = SiteError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| SiteError::UnknownCollection(s.to_string()))
    }
}

/// One entry of a collection. Field set is open; only `id`, `email` and the
/// timestamps carry meaning for the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from a JSON value, rejecting anything that is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SiteError::Shape(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            ))),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// The record id, treating `null` as absent.
    pub fn id(&self) -> Option<&Value> {
        self.0.get("id").filter(|v| !v.is_null())
    }

    pub fn email(&self) -> Option<&str> {
        self.0
            .get("email")
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Stamps `updatedAt`, and `createdAt` when the record has none yet.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let stamp = Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true));
        if !self.0.contains_key(CREATED_AT) {
            self.0.insert(CREATED_AT.to_string(), stamp.clone());
        }
        self.0.insert(UPDATED_AT.to_string(), stamp);
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Site-wide configuration. Exactly one per document, conceptually `id = 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(pub Map<String, Value>);

impl Default for Settings {
    fn default() -> Self {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::from(1));
        Self(map)
    }
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// A key present with `null` reads as if it were missing.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The root persisted unit. Missing collections deserialize to their defaults
/// and unknown top-level keys are carried through in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    #[serde(deserialize_with = "null_as_default")]
    pub team: Vec<Record>,
    #[serde(deserialize_with = "null_as_default")]
    pub services: Vec<Record>,
    #[serde(deserialize_with = "null_as_default")]
    pub solutions: Vec<Record>,
    #[serde(deserialize_with = "null_as_default")]
    pub contacts: Vec<Record>,
    #[serde(deserialize_with = "null_as_default")]
    pub testimonials: Vec<Record>,
    #[serde(deserialize_with = "null_as_default")]
    pub news: Vec<Record>,
    #[serde(deserialize_with = "null_as_default")]
    pub jobs: Vec<Record>,
    #[serde(deserialize_with = "null_as_default")]
    pub applications: Vec<Record>,
    #[serde(deserialize_with = "null_as_default")]
    pub projects: Vec<Record>,
    #[serde(deserialize_with = "null_as_default")]
    pub settings: Settings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    pub fn records(&self, collection: Collection) -> Option<&Vec<Record>> {
        match collection {
            Collection::Team => Some(&self.team),
            Collection::Services => Some(&self.services),
            Collection::Solutions => Some(&self.solutions),
            Collection::Contacts => Some(&self.contacts),
            Collection::Testimonials => Some(&self.testimonials),
            Collection::News => Some(&self.news),
            Collection::Jobs => Some(&self.jobs),
            Collection::Applications => Some(&self.applications),
            Collection::Projects => Some(&self.projects),
            Collection::Settings => None,
        }
    }

    pub fn records_mut(&mut self, collection: Collection) -> Option<&mut Vec<Record>> {
        match collection {
            Collection::Team => Some(&mut self.team),
            Collection::Services => Some(&mut self.services),
            Collection::Solutions => Some(&mut self.solutions),
            Collection::Contacts => Some(&mut self.contacts),
            Collection::Testimonials => Some(&mut self.testimonials),
            Collection::News => Some(&mut self.news),
            Collection::Jobs => Some(&mut self.jobs),
            Collection::Applications => Some(&mut self.applications),
            Collection::Projects => Some(&mut self.projects),
            Collection::Settings => None,
        }
    }

    /// The collection as it appears on the wire: an array, or an object for settings.
    pub fn collection_value(&self, collection: Collection) -> Value {
        match self.records(collection) {
            Some(records) => Value::Array(records.iter().cloned().map(Record::into_value).collect()),
            None => self.settings.clone().into_value(),
        }
    }

    /// Replaces a whole collection from its wire representation.
    pub fn set_collection_value(&mut self, collection: Collection, value: Value) -> Result<()> {
        match self.records_mut(collection) {
            Some(slot) => {
                *slot = records_from_value(value)?;
            }
            None => match value {
                Value::Object(map) => self.settings = Settings(map),
                other => {
                    return Err(SiteError::Shape(format!(
                        "settings must be a JSON object, got {}",
                        type_name(&other)
                    )));
                }
            },
        }
        Ok(())
    }

    /// Number of records per list collection, in declaration order.
    pub fn counts(&self) -> Vec<(Collection, usize)> {
        Collection::ALL
            .into_iter()
            .filter_map(|c| self.records(c).map(|r| (c, r.len())))
            .collect()
    }
}

/// Parses a JSON array into records.
pub fn records_from_value(value: Value) -> Result<Vec<Record>> {
    match value {
        Value::Array(items) => items.into_iter().map(Record::from_value).collect(),
        other => Err(SiteError::Shape(format!(
            "expected a JSON array, got {}",
            type_name(&other)
        ))),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_keys_heal_to_defaults() {
        let doc: Document = serde_json::from_str(r#"{"team": [{"id": 1}]}"#).unwrap();
        assert_eq!(doc.team.len(), 1);
        assert!(doc.services.is_empty());
        assert_eq!(doc.settings, Settings::default());
    }

    #[test]
    fn empty_object_is_a_valid_document() {
        let doc: Document = serde_json::from_str("{}").unwrap();
        assert_eq!(doc, Document::default());
    }

    #[test]
    fn unknown_keys_survive_a_roundtrip() {
        let doc: Document =
            serde_json::from_str(r#"{"pages": [{"slug": "home"}], "jobs": []}"#).unwrap();
        assert_eq!(doc.extra.get("pages"), Some(&json!([{"slug": "home"}])));

        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["pages"], json!([{"slug": "home"}]));
    }

    #[test]
    fn collection_names_parse_case_insensitively() {
        assert_eq!("Team".parse::<Collection>().unwrap(), Collection::Team);
        assert_eq!(" settings ".parse::<Collection>().unwrap(), Collection::Settings);
        assert!(matches!(
            "blog".parse::<Collection>(),
            Err(SiteError::UnknownCollection(_))
        ));
    }

    #[test]
    fn set_collection_value_rejects_wrong_shapes() {
        let mut doc = Document::default();
        assert!(doc
            .set_collection_value(Collection::Team, json!({"id": 1}))
            .is_err());
        assert!(doc
            .set_collection_value(Collection::Settings, json!([]))
            .is_err());
        assert!(doc
            .set_collection_value(Collection::Team, json!([1, 2]))
            .is_err());

        doc.set_collection_value(Collection::Settings, json!({"id": 1, "title": "Acme"}))
            .unwrap();
        assert_eq!(doc.settings.get("title"), Some(&json!("Acme")));
    }

    #[test]
    fn null_id_counts_as_absent() {
        let record = Record::new().with("id", Value::Null).with("email", "a@b.c");
        assert!(record.id().is_none());
        assert_eq!(record.email(), Some("a@b.c"));
    }

    #[test]
    fn touch_keeps_created_at() {
        let mut record = Record::new().with(CREATED_AT, "2024-01-01T00:00:00.000Z");
        record.touch(Utc::now());
        assert_eq!(record.get(CREATED_AT), Some(&json!("2024-01-01T00:00:00.000Z")));
        assert!(record.get(UPDATED_AT).is_some());
    }

    #[test]
    fn null_collections_heal_to_defaults() {
        let doc: Document =
            serde_json::from_str(r#"{"team": null, "news": [{"id": 2}], "settings": null}"#).unwrap();
        assert!(doc.team.is_empty());
        assert_eq!(doc.news.len(), 1);
        assert_eq!(doc.settings, Settings::default());
    }
}
