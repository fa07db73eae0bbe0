//! Maintenance of `User.pendingTasks`: order-preserving de-duplication and
//! the set-semantics add/remove the consistency engines build on.

use std::collections::HashSet;
use std::sync::Arc;
use crate::errors::StoreResult;
use crate::models::User;
use super::store::RecordStore;

/// First occurrence of each id wins; relative order is kept.
pub fn dedup_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(id.as_str())).cloned().collect()
}

#[derive(Clone)]
pub struct PendingTasks {
    users: Arc<dyn RecordStore<User>>,
}

impl PendingTasks {
    pub fn new(users: Arc<dyn RecordStore<User>>) -> Self {
        Self { users }
    }

    /// Rewrites the user's pending list without duplicates. Writes only when
    /// something changed and returns whether it wrote. A missing user is a no-op.
    pub async fn normalize(&self, user_id: &str) -> StoreResult<bool> {
        let Some(mut user) = self.users.find_by_id(user_id).await? else {
            tracing::debug!("Skipping normalization for missing user {}", user_id);
            return Ok(false);
        };

        let deduped = dedup_preserving_order(&user.pending_tasks);
        if deduped == user.pending_tasks {
            return Ok(false);
        }

        tracing::debug!(
            "Normalizing pending tasks for user {}: {} -> {} entries",
            user_id,
            user.pending_tasks.len(),
            deduped.len()
        );
        user.pending_tasks = deduped;
        self.users.update_one(&user).await?;
        Ok(true)
    }

    pub async fn add(&self, user_id: &str, task_id: &str) -> StoreResult<()> {
        let Some(mut user) = self.users.find_by_id(user_id).await? else {
            tracing::warn!("Cannot add task {} to missing user {}", task_id, user_id);
            return Ok(());
        };
        if user.pending_tasks.iter().any(|id| id == task_id) {
            return Ok(());
        }
        user.pending_tasks.push(task_id.to_string());
        self.users.update_one(&user).await?;
        Ok(())
    }

    pub async fn remove(&self, user_id: &str, task_id: &str) -> StoreResult<()> {
        let Some(mut user) = self.users.find_by_id(user_id).await? else {
            return Ok(());
        };
        let before = user.pending_tasks.len();
        user.pending_tasks.retain(|id| id != task_id);
        if user.pending_tasks.len() != before {
            self.users.update_one(&user).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryStore;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    async fn seeded(pending: &[&str]) -> (Arc<MemoryStore<User>>, PendingTasks, String) {
        let users = Arc::new(MemoryStore::<User>::default());
        let mut user = User::new("Ada".into(), "ada@example.com".into());
        user.pending_tasks = ids(pending);
        let user = users.insert(user).await.unwrap();
        let pending = PendingTasks::new(users.clone());
        (users, pending, user.id)
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        assert_eq!(
            dedup_preserving_order(&ids(&["b", "a", "b", "c", "a"])),
            ids(&["b", "a", "c"])
        );
        assert!(dedup_preserving_order(&[]).is_empty());
    }

    #[tokio::test]
    async fn normalize_repairs_duplicates_once() {
        let (users, pending, id) = seeded(&["t1", "t2", "t1"]).await;

        assert!(pending.normalize(&id).await.unwrap());
        let user = users.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(user.pending_tasks, ids(&["t1", "t2"]));

        // Second pass finds nothing to do
        assert!(!pending.normalize(&id).await.unwrap());
    }

    #[tokio::test]
    async fn normalize_skips_clean_and_missing_users() {
        let (_, pending, id) = seeded(&["t1", "t2"]).await;
        assert!(!pending.normalize(&id).await.unwrap());
        assert!(!pending.normalize("no-such-user").await.unwrap());
    }

    #[tokio::test]
    async fn add_has_set_semantics() {
        let (users, pending, id) = seeded(&["t1"]).await;
        pending.add(&id, "t2").await.unwrap();
        pending.add(&id, "t1").await.unwrap();
        let user = users.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(user.pending_tasks, ids(&["t1", "t2"]));
    }

    #[tokio::test]
    async fn remove_drops_every_copy() {
        let (users, pending, id) = seeded(&["t1", "t2", "t1"]).await;
        pending.remove(&id, "t1").await.unwrap();
        pending.remove("no-such-user", "t1").await.unwrap();
        let user = users.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(user.pending_tasks, ids(&["t2"]));
    }
}
