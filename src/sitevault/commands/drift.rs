use crate::commands::put::persist;
use crate::commands::{CmdMessage, CmdResult};
use crate::drift::{self as reconcile, suggest, Difference, Resolution};
use crate::error::{Result, SiteError};
use crate::model::{records_from_value, Collection, Settings};
use crate::store::DocumentStore;
use crate::sync::remote::check_shape;
use crate::sync::RemoteApi;
use serde_json::Value;

fn describe(difference: &Difference) -> String {
    let key = difference
        .key()
        .map(Value::to_string)
        .unwrap_or_else(|| "(no id)".to_string());
    let advice = match suggest(difference) {
        Some(Resolution::PushToRemote) => "push to remote",
        Some(Resolution::PullFromRemote) => "pull from remote",
        None => "no action suggested",
    };
    match difference {
        Difference::Mismatch { fields, .. } => {
            let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
            format!("{} {}: {} [{}] -> {}", difference.label(), key, names.len(), names.join(", "), advice)
        }
        _ => format!("{} {} -> {}", difference.label(), key, advice),
    }
}

fn differences<S: DocumentStore, R: RemoteApi + ?Sized>(
    store: &S,
    collection: Collection,
    remote: &R,
) -> Result<Vec<Difference>> {
    let doc = store.read();
    let remote_value = check_shape(collection, remote.fetch_collection(collection)?)?;
    if collection.is_singleton() {
        let remote_settings = match remote_value {
            Value::Object(map) => Settings(map),
            other => return Err(SiteError::Shape(format!("settings must be an object, got {}", other))),
        };
        Ok(reconcile::diff_singleton(&doc.settings, &remote_settings)
            .into_iter()
            .collect())
    } else {
        let local = doc.records(collection).cloned().unwrap_or_default();
        let remote_records = records_from_value(remote_value)?;
        Ok(reconcile::diff(&local, &remote_records))
    }
}

/// Compares the local collection with the remote one. Read-only.
pub fn run<S: DocumentStore, R: RemoteApi + ?Sized>(
    store: &S,
    collection: Collection,
    remote: &R,
) -> Result<CmdResult> {
    let found = differences(store, collection, remote)?;
    let mut result = CmdResult::default();
    if found.is_empty() {
        result.add_message(CmdMessage::success(format!("{} is in sync", collection)));
    } else {
        result.add_message(CmdMessage::warning(format!(
            "{} difference(s) in {}",
            found.len(),
            collection
        )));
        for difference in &found {
            result.add_message(CmdMessage::info(format!("  - {}", describe(difference))));
        }
    }
    Ok(result.with_differences(found))
}

/// Applies every pull suggestion locally and persists the result.
pub fn pull<S: DocumentStore, R: RemoteApi + ?Sized>(
    store: &S,
    collection: Collection,
    remote: &R,
) -> Result<CmdResult> {
    let found = differences(store, collection, remote)?;
    let mut doc = store.read();

    let applied = match doc.records_mut(collection) {
        Some(records) => reconcile::apply_pull(records, &found),
        None => match found.first() {
            Some(Difference::Mismatch { remote, .. }) => {
                doc.settings = Settings(remote.0.clone());
                1
            }
            _ => 0,
        },
    };

    let mut result = CmdResult::default();
    if applied > 0 {
        persist(store, &doc)?;
        result.changed = true;
    }
    result.add_message(CmdMessage::success(format!(
        "Pulled {} record(s) into {}",
        applied, collection
    )));
    Ok(result.with_differences(found))
}

/// Sends local-only records to the remote API.
pub fn push<S: DocumentStore, R: RemoteApi + ?Sized>(
    store: &S,
    collection: Collection,
    remote: &R,
) -> Result<CmdResult> {
    let found = differences(store, collection, remote)?;
    let pending = reconcile::pending_pushes(&found);

    let mut result = CmdResult::default();
    for record in &pending {
        match remote.put_collection(collection, record.id(), &record.clone().into_value()) {
            Ok(()) => result.affected.push(record.clone()),
            Err(e) => result.add_message(CmdMessage::error(format!(
                "Failed to push {}: {}",
                record.id().map(Value::to_string).unwrap_or_default(),
                e
            ))),
        }
    }
    result.add_message(CmdMessage::success(format!(
        "Pushed {} of {} record(s) to remote {}",
        result.affected.len(),
        pending.len(),
        collection
    )));
    Ok(result.with_differences(found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SiteError;
    use crate::model::{Document, Record};
    use crate::store::memory::MemoryStore;
    use serde_json::json;
    use std::cell::RefCell;

    struct FakeRemote {
        value: Value,
        puts: RefCell<Vec<(Option<Value>, Value)>>,
    }

    impl FakeRemote {
        fn new(value: Value) -> Self {
            Self {
                value,
                puts: RefCell::new(Vec::new()),
            }
        }
    }

    impl RemoteApi for FakeRemote {
        fn fetch_collection(&self, _collection: Collection) -> Result<Value> {
            Ok(self.value.clone())
        }

        fn put_collection(&self, _collection: Collection, id: Option<&Value>, body: &Value) -> Result<()> {
            if body.get("reject").is_some() {
                return Err(SiteError::Sync("rejected".into()));
            }
            self.puts.borrow_mut().push((id.cloned(), body.clone()));
            Ok(())
        }
    }

    fn local() -> MemoryStore {
        let mut doc = Document::default();
        doc.services.push(Record::from_value(json!({"id": 1, "title": "Audit"})).unwrap());
        doc.services.push(Record::from_value(json!({"id": 2, "title": "Build"})).unwrap());
        MemoryStore::with_initial(doc)
    }

    #[test]
    fn reports_without_writing() {
        let store = local();
        let remote = FakeRemote::new(json!([{"id": 1, "title": "Audits"}]));
        let result = run(&store, Collection::Services, &remote).unwrap();
        assert_eq!(result.differences.len(), 2);
        assert!(!result.changed);
        assert_eq!(store.read().services[0].get("title"), Some(&json!("Audit")));
    }

    #[test]
    fn pull_takes_remote_values() {
        let store = local();
        let remote = FakeRemote::new(json!([{"id": 1, "title": "Audits"}, {"id": 2, "title": "Build"}]));
        let result = pull(&store, Collection::Services, &remote).unwrap();
        assert!(result.changed);
        assert_eq!(store.read().services[0].get("title"), Some(&json!("Audits")));
    }

    #[test]
    fn push_sends_local_only_records() {
        let store = local();
        let remote = FakeRemote::new(json!([{"id": 1, "title": "Audit"}]));
        let result = push(&store, Collection::Services, &remote).unwrap();
        assert_eq!(result.affected.len(), 1);
        let puts = remote.puts.borrow();
        assert_eq!(puts[0].0, Some(json!(2)));
    }

    #[test]
    fn settings_drift_and_pull() {
        let store = MemoryStore::new();
        let remote = FakeRemote::new(json!({"id": 1, "siteTitle": "Remote"}));
        let result = run(&store, Collection::Settings, &remote).unwrap();
        assert_eq!(result.differences.len(), 1);

        pull(&store, Collection::Settings, &remote).unwrap();
        assert_eq!(store.read().settings.get("siteTitle"), Some(&json!("Remote")));
    }

    #[test]
    fn describe_lists_changed_fields() {
        let d = Difference::Mismatch {
            local: Record::new().with("id", 3),
            remote: Record::new().with("id", 3),
            fields: vec![crate::drift::FieldDelta {
                field: "name".into(),
                local: None,
                remote: Some(json!("x")),
            }],
        };
        assert_eq!(describe(&d), "mismatch 3: 1 [name] -> pull from remote");
    }

    #[test]
    fn malformed_remote_settings_leave_local_intact() {
        let mut doc = Document::default();
        doc.settings.0.insert("siteTitle".into(), json!("Acme"));
        doc.settings.0.insert("phone".into(), json!("555"));
        let store = MemoryStore::with_initial(doc.clone());
        let remote = FakeRemote::new(json!([]));

        assert!(matches!(
            pull(&store, Collection::Settings, &remote),
            Err(SiteError::Shape(_))
        ));
        assert!(matches!(
            run(&store, Collection::Settings, &remote),
            Err(SiteError::Shape(_))
        ));
        assert_eq!(store.read().settings, doc.settings);
    }
}
