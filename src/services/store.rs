//! The record store seam. The consistency engines only talk to
//! `dyn RecordStore<T>`, so Redis and the in-memory backend are
//! interchangeable.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use crate::errors::StoreResult;
use crate::query::{Filter, FindOptions};

/// A document that can live in a [`RecordStore`].
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    fn assign_id(&mut self, id: String);

    /// Field name and value that must be unique across the collection.
    fn unique_key(&self) -> Option<(&'static str, &str)> {
        None
    }
}

/// Store-generated record id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn matches<T: Record>(record: &T, filter: &Filter) -> StoreResult<bool> {
    Ok(filter.matches(&serde_json::to_value(record)?))
}

// Field-level overwrite, the `$set` of a document store
pub fn apply_patch<T: Record>(record: &T, patch: &Map<String, Value>) -> StoreResult<T> {
    let mut document = serde_json::to_value(record)?;
    if let Value::Object(fields) = &mut document {
        for (field, value) in patch {
            fields.insert(field.clone(), value.clone());
        }
    }
    Ok(serde_json::from_value(document)?)
}

/// Each write touches exactly one record and is atomic on its own; nothing
/// spans records.
#[async_trait]
pub trait RecordStore<T: Record>: Send + Sync {
    /// Every record matching `filter`, in insertion order.
    async fn find_records(&self, filter: &Filter) -> StoreResult<Vec<T>>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<T>>;

    /// Assigns a fresh id and persists. Fails with `Duplicate` on a unique key clash.
    async fn insert(&self, record: T) -> StoreResult<T>;

    /// Replaces the stored record with the same id. `false` if there is none.
    async fn update_one(&self, record: &T) -> StoreResult<bool>;

    async fn delete_one(&self, id: &str) -> StoreResult<bool>;

    async fn find(&self, options: &FindOptions) -> StoreResult<Vec<Value>> {
        let records = self.find_records(&options.filter).await?;
        let documents = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(options.shape(documents))
    }

    async fn count(&self, options: &FindOptions) -> StoreResult<u64> {
        let matched = self.find_records(&options.filter).await?.len() as u64;
        Ok(options.window(matched))
    }

    async fn update_many(&self, filter: &Filter, patch: &Map<String, Value>) -> StoreResult<u64> {
        let mut updated = 0;
        for record in self.find_records(filter).await? {
            let patched = apply_patch(&record, patch)?;
            if self.update_one(&patched).await? {
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete_many(&self, filter: &Filter) -> StoreResult<u64> {
        let mut deleted = 0;
        for record in self.find_records(filter).await? {
            if self.delete_one(record.id()).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
