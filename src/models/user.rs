use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::services::Record;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub pending_tasks: Vec<String>,  // Task ids, deduplicated by the normalizer
    pub date_created: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String) -> Self {
        Self {
            id: String::new(),
            name,
            email,
            pending_tasks: Vec::new(),
            date_created: Utc::now(),
        }
    }
}

impl Record for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<(&'static str, &str)> {
        Some(("email", &self.email))
    }
}
