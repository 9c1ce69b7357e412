use super::{DocumentStore, LocalState, StorageMode};
use crate::model::Document;
use std::cell::{Cell, RefCell};
use tracing::debug;

/// Process-local document store for serverless deployments and tests.
///
/// Uses `RefCell` since the store is owned by one thread. Every read hands out
/// a fresh clone and every write stores one, so callers never alias the held value.
#[derive(Default)]
pub struct MemoryStore {
    state: RefCell<Option<Document>>,
    simulate_write_error: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(doc: Document) -> Self {
        Self {
            state: RefCell::new(Some(doc)),
            simulate_write_error: Cell::new(false),
        }
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    pub fn is_set(&self) -> bool {
        self.state.borrow().is_some()
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self) -> Document {
        self.state.borrow().clone().unwrap_or_default()
    }

    fn write(&self, doc: &Document) -> bool {
        if self.simulate_write_error.get() {
            return false;
        }
        *self.state.borrow_mut() = Some(doc.clone());
        debug!("document stored in memory");
        true
    }

    fn clear(&self) {
        *self.state.borrow_mut() = None;
    }

    fn probe(&self) -> LocalState {
        match self.state.borrow().as_ref() {
            Some(doc) => LocalState::Present(doc.clone()),
            None => LocalState::Absent,
        }
    }

    fn mode(&self) -> StorageMode {
        StorageMode::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;
    use serde_json::json;

    #[test]
    fn unset_store_reads_defaults() {
        let store = MemoryStore::new();
        assert!(!store.is_set());
        assert_eq!(store.read(), Document::default());
    }

    #[test]
    fn mutating_a_read_does_not_leak_into_the_store() {
        let store = MemoryStore::new();
        let mut doc = Document::default();
        doc.team.push(Record::new().with("id", 1).with("skills", json!(["rust"])));
        assert!(store.write(&doc));

        let mut first = store.read();
        first.team[0].insert("skills", json!(["go"]));
        first.team.clear();

        assert_eq!(store.read(), doc);
    }

    #[test]
    fn mutating_the_written_value_does_not_leak_into_the_store() {
        let store = MemoryStore::new();
        let mut doc = Document::default();
        doc.jobs.push(Record::new().with("id", 3));
        assert!(store.write(&doc));

        doc.jobs.push(Record::new().with("id", 4));
        assert_eq!(store.read().jobs.len(), 1);
    }

    #[test]
    fn clear_resets_to_unset() {
        let store = MemoryStore::with_initial(Document::default());
        assert!(store.is_set());
        store.clear();
        assert!(!store.is_set());
        assert!(matches!(store.probe(), LocalState::Absent));
    }

    #[test]
    fn simulated_write_error_keeps_previous_state() {
        let store = MemoryStore::new();
        let mut doc = Document::default();
        doc.news.push(Record::new().with("id", 1));
        assert!(store.write(&doc));

        store.set_simulate_write_error(true);
        assert!(!store.write(&Document::default()));
        assert_eq!(store.read(), doc);
    }
}
