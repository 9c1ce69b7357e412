use crate::commands::put::{list_mut, persist};
use crate::commands::{CmdMessage, CmdResult};
use crate::error::{Result, SiteError};
use crate::merge::ids_equal;
use crate::model::Collection;
use crate::store::DocumentStore;
use serde_json::Value;

pub fn run<S: DocumentStore>(store: &S, collection: Collection, id: &Value) -> Result<CmdResult> {
    let mut doc = store.read();
    let records = list_mut(&mut doc, collection)?;

    let position = records
        .iter()
        .position(|r| r.id().is_some_and(|rid| ids_equal(rid, id)))
        .ok_or_else(|| SiteError::NotFound(format!("{} record {}", collection, id)))?;
    let removed = records.remove(position);

    persist(store, &doc)?;

    let mut result = CmdResult::default().with_affected(vec![removed]);
    result.changed = true;
    result.add_message(CmdMessage::success(format!(
        "Deleted {} record {}",
        collection, id
    )));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Record};
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    #[test]
    fn deletes_only_the_matching_record() {
        let mut doc = Document::default();
        doc.projects.push(Record::new().with("id", 1));
        doc.projects.push(Record::new().with("id", 2));
        let store = MemoryStore::with_initial(doc);

        let result = run(&store, Collection::Projects, &json!(1)).unwrap();
        assert_eq!(result.affected[0].id(), Some(&json!(1)));

        let projects = store.read().projects;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id(), Some(&json!(2)));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            run(&store, Collection::Projects, &json!(1)),
            Err(SiteError::NotFound(_))
        ));
    }

    #[test]
    fn settings_cannot_be_deleted() {
        let store = MemoryStore::new();
        assert!(matches!(
            run(&store, Collection::Settings, &json!(1)),
            Err(SiteError::Api(_))
        ));
    }
}
