mod store;
mod memory_store;
mod redis_service;
mod pending;
mod users;
mod tasks;

pub use store::{Record, RecordStore};
pub use memory_store::MemoryStore;
pub use redis_service::RedisStore;
pub use pending::PendingTasks;
pub use users::UserService;
pub use tasks::TaskService;

use std::sync::Arc;
use crate::models::{Task, User};

/// Both collections, shared by the handlers and the consistency engines.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn RecordStore<User>>,
    pub tasks: Arc<dyn RecordStore<Task>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryStore::<User>::default()),
            tasks: Arc::new(MemoryStore::<Task>::default()),
        }
    }

    pub async fn redis(client: redis::Client) -> Result<Self, redis::RedisError> {
        let users = RedisStore::<User>::connect(client.clone()).await?;
        let tasks = RedisStore::<Task>::connect(client).await?;
        Ok(Self {
            users: Arc::new(users),
            tasks: Arc::new(tasks),
        })
    }

    pub fn pending(&self) -> PendingTasks {
        PendingTasks::new(self.users.clone())
    }
}
