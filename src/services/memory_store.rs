use async_trait::async_trait;
use tokio::sync::RwLock;
use crate::errors::{StoreError, StoreResult};
use crate::query::Filter;
use super::store::{matches, new_id, Record, RecordStore};

/// Process-local backend, selected with `store.backend = "memory"` and used by the tests.
pub struct MemoryStore<T> {
    records: RwLock<Vec<T>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self { records: RwLock::new(Vec::new()) }
    }
}

fn unique_clash<T: Record>(records: &[T], candidate: &T) -> Option<StoreError> {
    let (field, value) = candidate.unique_key()?;
    records
        .iter()
        .filter(|existing| existing.id() != candidate.id())
        .any(|existing| existing.unique_key().map(|(_, v)| v) == Some(value))
        .then(|| StoreError::Duplicate { field, value: value.to_string() })
}

#[async_trait]
impl<T: Record> RecordStore<T> for MemoryStore<T> {
    async fn find_records(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        let records = self.records.read().await;
        let mut found = Vec::new();
        for record in records.iter() {
            if matches(record, filter)? {
                found.push(record.clone());
            }
        }
        Ok(found)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<T>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id() == id).cloned())
    }

    async fn insert(&self, mut record: T) -> StoreResult<T> {
        let mut records = self.records.write().await;
        record.assign_id(new_id());
        if let Some(clash) = unique_clash(&records, &record) {
            return Err(clash);
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn update_one(&self, record: &T) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        if let Some(clash) = unique_clash(&records, record) {
            return Err(clash);
        }
        match records.iter_mut().find(|r| r.id() == record.id()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, id: &str) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id() != id);
        Ok(records.len() != before)
    }
}
