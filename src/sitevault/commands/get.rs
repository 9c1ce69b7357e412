use crate::commands::CmdResult;
use crate::error::{Result, SiteError};
use crate::merge::ids_equal;
use crate::model::Collection;
use crate::store::DocumentStore;
use serde_json::Value;

/// Returns a whole collection, or one record of it when `id` is given.
pub fn run<S: DocumentStore>(store: &S, collection: Collection, id: Option<&Value>) -> Result<CmdResult> {
    let doc = store.read();

    let Some(id) = id else {
        return Ok(CmdResult::default().with_value(doc.collection_value(collection)));
    };

    let records = doc.records(collection).ok_or_else(|| {
        SiteError::Api(format!("{} is a singleton and has no record ids", collection))
    })?;
    let record = records
        .iter()
        .find(|r| r.id().is_some_and(|rid| ids_equal(rid, id)))
        .ok_or_else(|| SiteError::NotFound(format!("{} record {}", collection, id)))?;

    Ok(CmdResult::default()
        .with_value(record.clone().into_value())
        .with_affected(vec![record.clone()]))
}
