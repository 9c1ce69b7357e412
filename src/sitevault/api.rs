//! # API Facade
//!
//! The single entry point for content operations, whatever the caller is (the
//! CLI here, an HTTP handler elsewhere). It dispatches to `commands/*`,
//! turns loose inputs (id strings, preserve lists) into typed values, and
//! hands every persisted change to the sync queue when one is attached.
//!
//! `SiteApi<S: DocumentStore>` is generic over the store:
//! - Production: `SiteApi<DualModeStore>`, mode picked once at startup.
//! - Testing: `SiteApi<MemoryStore>`.
//!
//! No business logic lives here and nothing is printed.

use crate::bootstrap::{Bootstrap, BootstrapLoader};
use crate::commands::{self, CmdMessage, CmdResult};
use crate::error::Result;
use crate::merge::Preserve;
use crate::model::Collection;
use crate::store::{DocumentStore, DualModeStore};
use crate::sync::{RemoteApi, SyncQueue, SyncStatus};
use chrono::Utc;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

pub struct SiteApi<S: DocumentStore> {
    store: S,
    sync: Option<SyncQueue>,
}

impl<S: DocumentStore> SiteApi<S> {
    pub fn new(store: S) -> Self {
        Self { store, sync: None }
    }

    pub fn with_sync(mut self, queue: SyncQueue) -> Self {
        self.sync = Some(queue);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bootstrap(&self, loader: &BootstrapLoader) -> Bootstrap {
        loader.run(&self.store)
    }

    pub fn list(&self, collection: Collection) -> Result<CmdResult> {
        commands::get::run(&self.store, collection, None)
    }

    pub fn get(&self, collection: Collection, id: Option<&str>) -> Result<CmdResult> {
        let id = id.map(parse_id);
        commands::get::run(&self.store, collection, id.as_ref())
    }

    pub fn upsert<P: AsRef<str>>(
        &self,
        collection: Collection,
        incoming: Value,
        preserve: &[P],
    ) -> Result<CmdResult> {
        let preserve: Preserve = preserve.iter().map(|p| p.as_ref().to_string()).collect();
        let result = commands::put::upsert(&self.store, collection, incoming, &preserve, Utc::now())?;
        Ok(self.after_change(result, format!("content: update {}", collection)))
    }

    pub fn update_settings<P: AsRef<str>>(&self, partial: Value, preserve: &[P]) -> Result<CmdResult> {
        let preserve: Preserve = preserve.iter().map(|p| p.as_ref().to_string()).collect();
        let result = commands::put::update_settings(&self.store, partial, &preserve, Utc::now())?;
        Ok(self.after_change(result, "content: update settings".to_string()))
    }

    pub fn replace(&self, collection: Collection, value: Value) -> Result<CmdResult> {
        let result = commands::put::replace(&self.store, collection, value, Utc::now())?;
        Ok(self.after_change(result, format!("content: replace {}", collection)))
    }

    pub fn delete(&self, collection: Collection, id: &str) -> Result<CmdResult> {
        let id = parse_id(id);
        let result = commands::delete::run(&self.store, collection, &id)?;
        Ok(self.after_change(result, format!("content: delete {} {}", collection, id)))
    }

    pub fn drift<R: RemoteApi + ?Sized>(&self, collection: Collection, remote: &R) -> Result<CmdResult> {
        commands::drift::run(&self.store, collection, remote)
    }

    pub fn pull<R: RemoteApi + ?Sized>(&self, collection: Collection, remote: &R) -> Result<CmdResult> {
        let result = commands::drift::pull(&self.store, collection, remote)?;
        Ok(self.after_change(result, format!("content: pull {}", collection)))
    }

    pub fn push<R: RemoteApi + ?Sized>(&self, collection: Collection, remote: &R) -> Result<CmdResult> {
        commands::drift::push(&self.store, collection, remote)
    }

    /// Queues a snapshot of the current document regardless of changes.
    pub fn publish(&self, message: &str) -> Result<Option<Uuid>> {
        match &self.sync {
            Some(queue) => queue.enqueue(self.store.read(), message).map(Some),
            None => Ok(None),
        }
    }

    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.sync.as_ref().map(SyncQueue::status)
    }

    /// Waits for queued snapshots to finish and returns the final sync status.
    pub fn finish(mut self) -> Option<SyncStatus> {
        self.sync.take().map(SyncQueue::shutdown)
    }

    fn after_change(&self, mut result: CmdResult, message: String) -> CmdResult {
        if !result.changed {
            return result;
        }
        if let Some(queue) = &self.sync {
            if let Err(e) = queue.enqueue(self.store.read(), message) {
                warn!(error = %e, "change saved but not queued for sync");
                result.add_message(CmdMessage::warning(format!("Not queued for sync: {}", e)));
            }
        }
        result
    }
}

impl SiteApi<DualModeStore> {
    pub fn doctor(&self) -> Result<CmdResult> {
        match self.store.as_file() {
            Some(file) => commands::doctor::run(file),
            None => {
                let mut result = CmdResult::default();
                result.add_message(CmdMessage::info(
                    "Memory storage has no files to check.",
                ));
                Ok(result)
            }
        }
    }

    pub fn status(&self) -> Result<CmdResult> {
        commands::status::run(&self.store)
    }
}

/// Ids arrive as text from URLs and the command line; numeric ones are numbers.
pub fn parse_id(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::String(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SiteError;
    use crate::store::memory::MemoryStore;
    use crate::sync::{PublishOutcome, Publisher, RetryPolicy, SyncEvent};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Publisher for Recorder {
        fn publish(&mut self, event: &SyncEvent) -> Result<PublishOutcome> {
            self.0.lock().unwrap().push(event.message.clone());
            Ok(PublishOutcome::Published)
        }
    }

    fn api_with_recorder() -> (SiteApi<MemoryStore>, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = SyncQueue::start(
            Recorder(log.clone()),
            RetryPolicy {
                max_attempts: 1,
                delay: Duration::from_millis(1),
            },
        );
        (SiteApi::new(MemoryStore::new()).with_sync(queue), log)
    }

    #[test]
    fn parse_id_prefers_numbers() {
        assert_eq!(parse_id(" 12 "), json!(12));
        assert_eq!(parse_id("abc-1"), json!("abc-1"));
    }

    #[test]
    fn writes_are_queued_for_sync() {
        let (api, log) = api_with_recorder();
        api.upsert(Collection::Team, json!({"id": 1, "name": "Ada"}), &["image"])
            .unwrap();
        api.delete(Collection::Team, "1").unwrap();
        let status = api.finish().unwrap();

        assert_eq!(status.published, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["content: update team", "content: delete team 1"]
        );
    }

    #[test]
    fn reads_and_failures_are_not_queued() {
        let (api, log) = api_with_recorder();
        api.get(Collection::Team, None).unwrap();
        assert!(matches!(
            api.delete(Collection::Team, "9"),
            Err(SiteError::NotFound(_))
        ));
        api.finish();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn get_accepts_textual_ids() {
        let api = SiteApi::new(MemoryStore::new());
        api.upsert(Collection::Jobs, json!({"id": 5, "title": "Dev"}), &[] as &[&str])
            .unwrap();
        let result = api.get(Collection::Jobs, Some("5")).unwrap();
        assert_eq!(result.value.unwrap()["title"], json!("Dev"));
        assert!(api.publish("noop").unwrap().is_none());
    }

    #[test]
    fn settings_keep_preserved_fields() {
        let api = SiteApi::new(MemoryStore::new());
        api.update_settings(json!({"siteTitle": "Acme", "logo": "/a.png"}), &[] as &[&str])
            .unwrap();
        api.update_settings(json!({"siteTitle": "Acme Ltd", "logo": "/b.png"}), &["logo"])
            .unwrap();
        let settings = api.list(Collection::Settings).unwrap().value.unwrap();
        assert_eq!(settings["siteTitle"], json!("Acme Ltd"));
        assert_eq!(settings["logo"], json!("/a.png"));
        assert_eq!(settings["id"], json!(1));
    }

    #[test]
    fn doctor_in_memory_mode_is_informational() {
        let api = SiteApi::new(DualModeStore::memory(None));
        let result = api.doctor().unwrap();
        assert!(result.doctor.is_none());
        assert_eq!(result.messages.len(), 1);
    }
}
