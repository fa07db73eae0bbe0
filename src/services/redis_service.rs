use std::marker::PhantomData;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Pipeline, RedisResult};
use crate::errors::{StoreError, StoreResult};
use crate::query::Filter;
use super::store::{matches, new_id, Record, RecordStore};

/// One JSON string per record under `<collection>:<id>`, an id list for
/// insertion order and a hash per unique field mapping value to owner id.
pub struct RedisStore<T> {
    conn: ConnectionManager,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> RedisStore<T> {
    pub async fn connect(client: Client) -> Result<Self, redis::RedisError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, _record: PhantomData }
    }

    fn record_key(id: &str) -> String {
        format!("{}:{}", T::COLLECTION, id)
    }

    fn ids_key() -> String {
        format!("{}:ids", T::COLLECTION)
    }

    fn index_key(field: &str) -> String {
        format!("{}:unique:{}", T::COLLECTION, field)
    }

    // Claims `value` for `id` in the unique index; fails if another record holds it.
    // `true` when this call took the claim, `false` when `id` already held it.
    async fn claim_unique(&self, field: &'static str, value: &str, id: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let index = Self::index_key(field);
        let claimed: bool = conn.hset_nx(&index, value, id).await?;
        if claimed {
            return Ok(true);
        }
        let owner: Option<String> = conn.hget(&index, value).await?;
        if owner.as_deref() == Some(id) {
            return Ok(false);
        }
        Err(StoreError::Duplicate { field, value: value.to_string() })
    }

    async fn release_unique(&self, field: &'static str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.hdel::<_, _, ()>(Self::index_key(field), value).await?;
        Ok(())
    }

    // Gives back a claim whose record write failed, so the value stays usable
    async fn abandon_claim(&self, field: &'static str, value: &str) {
        if let Err(e) = self.release_unique(field, value).await {
            tracing::error!("Failed to release {} {} in {}: {}", field, value, T::COLLECTION, e);
        }
    }

    fn insert_pipeline(id: &str, payload: &str) -> Pipeline {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(Self::record_key(id), payload)
            .ignore()
            .rpush(Self::ids_key(), id)
            .ignore();
        pipe
    }
}

#[async_trait]
impl<T: Record> RecordStore<T> for RedisStore<T> {
    async fn find_records(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.lrange(Self::ids_key(), 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| Self::record_key(id)).collect();
        let raw: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        let mut found = Vec::new();
        for data in raw.into_iter().flatten() {
            let record: T = serde_json::from_str(&data)?;
            if matches(&record, filter)? {
                found.push(record);
            }
        }
        Ok(found)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<T>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(Self::record_key(id)).await?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, mut record: T) -> StoreResult<T> {
        record.assign_id(new_id());
        let payload = serde_json::to_string(&record)?;
        let unique = record.unique_key();
        if let Some((field, value)) = unique {
            self.claim_unique(field, value, record.id()).await?;
        }

        let mut conn = self.conn.clone();
        let written: RedisResult<()> = Self::insert_pipeline(record.id(), &payload)
            .query_async(&mut conn)
            .await;
        if let Err(e) = written {
            // MULTI does not roll back the SET when RPUSH fails
            let _: RedisResult<()> = conn.del(Self::record_key(record.id())).await;
            if let Some((field, value)) = unique {
                self.abandon_claim(field, value).await;
            }
            return Err(e.into());
        }
        tracing::debug!("Inserted {} record {}", T::COLLECTION, record.id());
        Ok(record)
    }

    async fn update_one(&self, record: &T) -> StoreResult<bool> {
        let Some(previous) = self.find_by_id(record.id()).await? else {
            return Ok(false);
        };
        let payload = serde_json::to_string(record)?;

        let old_key = previous.unique_key();
        let new_key = record.unique_key();
        let fresh_claim = match new_key {
            Some((field, value)) => self.claim_unique(field, value, record.id()).await?,
            None => false,
        };

        let mut conn = self.conn.clone();
        let written: RedisResult<()> = conn.set(Self::record_key(record.id()), payload).await;
        if let Err(e) = written {
            if let (true, Some((field, value))) = (fresh_claim, new_key) {
                self.abandon_claim(field, value).await;
            }
            return Err(e.into());
        }

        if let Some((field, old_value)) = old_key {
            if new_key.map(|(_, v)| v) != Some(old_value) {
                self.release_unique(field, old_value).await?;
            }
        }
        Ok(true)
    }

    async fn delete_one(&self, id: &str) -> StoreResult<bool> {
        let Some(previous) = self.find_by_id(id).await? else {
            return Ok(false);
        };

        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(Self::record_key(id)).await?;
        conn.lrem::<_, _, ()>(Self::ids_key(), 0, id).await?;
        if let Some((field, value)) = previous.unique_key() {
            self.release_unique(field, value).await?;
        }
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Badge {
        #[serde(rename = "_id", default)]
        id: String,
        code: String,
    }

    impl Record for Badge {
        const COLLECTION: &'static str = "roster_test_badges";

        fn id(&self) -> &str {
            &self.id
        }

        fn assign_id(&mut self, id: String) {
            self.id = id;
        }

        fn unique_key(&self) -> Option<(&'static str, &str)> {
            Some(("code", &self.code))
        }
    }

    fn badge(code: &str) -> Badge {
        Badge { id: String::new(), code: code.into() }
    }

    // Live tests run only when APP_TEST_REDIS_URL points at a scratch Redis
    async fn scratch_store() -> Option<(RedisStore<Badge>, ConnectionManager)> {
        let url = std::env::var("APP_TEST_REDIS_URL").ok()?;
        let client = Client::open(url.as_str()).unwrap();
        let mut conn = ConnectionManager::new(client).await.unwrap();
        let keys: Vec<String> = conn.keys("roster_test_badges:*").await.unwrap();
        if !keys.is_empty() {
            conn.del::<_, ()>(keys).await.unwrap();
        }
        Some((RedisStore::new(conn.clone()), conn))
    }

    #[test]
    fn keys_are_scoped_by_collection() {
        assert_eq!(RedisStore::<Badge>::record_key("a1"), "roster_test_badges:a1");
        assert_eq!(RedisStore::<Badge>::ids_key(), "roster_test_badges:ids");
        assert_eq!(RedisStore::<Badge>::index_key("code"), "roster_test_badges:unique:code");
    }

    #[test]
    fn record_and_id_list_are_written_in_one_transaction() {
        let packed = RedisStore::<Badge>::insert_pipeline("a1", "{}").get_packed_pipeline();
        let packed = String::from_utf8_lossy(&packed);

        let multi = packed.find("MULTI").unwrap();
        let set = packed.find("SET").unwrap();
        let rpush = packed.find("RPUSH").unwrap();
        let exec = packed.find("EXEC").unwrap();
        assert!(multi < set && set < rpush && rpush < exec);
        assert!(packed.contains("roster_test_badges:a1"));
    }

    #[tokio::test]
    async fn duplicate_unique_value_is_rejected() {
        let Some((store, _)) = scratch_store().await else { return };

        let first = store.insert(badge("gold")).await.unwrap();
        let clash = store.insert(badge("gold")).await.unwrap_err();
        assert!(matches!(clash, StoreError::Duplicate { field: "code", .. }));

        let mut renamed = first.clone();
        renamed.code = "silver".into();
        assert!(store.update_one(&renamed).await.unwrap());
        store.insert(badge("gold")).await.unwrap();
    }

    #[tokio::test]
    async fn failed_insert_gives_back_its_claim() {
        let Some((store, mut conn)) = scratch_store().await else { return };

        // A string where the id list should be makes RPUSH fail
        conn.set::<_, _, ()>(RedisStore::<Badge>::ids_key(), "not a list").await.unwrap();
        assert!(store.insert(badge("gold")).await.is_err());

        let owner: Option<String> = conn
            .hget(RedisStore::<Badge>::index_key("code"), "gold")
            .await
            .unwrap();
        assert_eq!(owner, None);
        let ids: Vec<String> = conn.keys("roster_test_badges:*").await.unwrap();
        assert_eq!(ids, vec![RedisStore::<Badge>::ids_key()]);

        conn.del::<_, ()>(RedisStore::<Badge>::ids_key()).await.unwrap();
        let saved = store.insert(badge("gold")).await.unwrap();
        assert_eq!(store.find_by_id(&saved.id).await.unwrap().unwrap().code, "gold");
    }
}
