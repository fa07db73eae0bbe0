use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use chrono::{DateTime, Utc};
use super::User;
use crate::services::Record;

/// Wire value of `assignedUserName` for a task nobody owns.
pub const UNASSIGNED: &str = "unassigned";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub deadline: Value,
    #[serde(default)]
    pub completed: bool,
    // `None` travels as "" on the wire
    #[serde(default, with = "assigned_user")]
    pub assigned_user: Option<String>,
    #[serde(default = "unassigned_name")]
    pub assigned_user_name: String,
    pub date_created: DateTime<Utc>,
}

fn unassigned_name() -> String {
    UNASSIGNED.to_string()
}

impl Task {
    pub fn new(name: String, description: String, deadline: Value, completed: bool) -> Self {
        Self {
            id: String::new(),
            name,
            description,
            deadline,
            completed,
            assigned_user: None,
            assigned_user_name: unassigned_name(),
            date_created: Utc::now(),
        }
    }

    pub fn assign_to(&mut self, user: &User) {
        self.assigned_user = Some(user.id.clone());
        self.assigned_user_name = user.name.clone();
    }

    pub fn unassign(&mut self) {
        self.assigned_user = None;
        self.assigned_user_name = unassigned_name();
    }

    /// Store patch that detaches a task from its assignee.
    pub fn unassign_patch() -> Map<String, Value> {
        patch(json!({ "assignedUser": "", "assignedUserName": UNASSIGNED }))
    }

    /// Store patch that refreshes the denormalized assignee name.
    pub fn assignee_name_patch(name: &str) -> Map<String, Value> {
        patch(json!({ "assignedUserName": name }))
    }

    /// Whether this task belongs in its assignee's pending list.
    pub fn is_pending(&self) -> bool {
        self.assigned_user.is_some() && !self.completed
    }
}

fn patch(fields: Value) -> Map<String, Value> {
    match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Record for Task {
    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }
}

mod assigned_user {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|id| !id.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassigned_task_uses_empty_string_on_the_wire() {
        let task = Task::new("A".into(), String::new(), json!("2025-01-01"), false);
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["assignedUser"], json!(""));
        assert_eq!(value["assignedUserName"], json!("unassigned"));
        assert_eq!(value["completed"], json!(false));
    }

    #[test]
    fn empty_assigned_user_reads_back_as_none() {
        let value = json!({
            "_id": "t1",
            "name": "A",
            "deadline": "2025-01-01",
            "assignedUser": "",
            "dateCreated": "2025-01-01T00:00:00Z"
        });
        let task: Task = serde_json::from_value(value).unwrap();
        assert_eq!(task.assigned_user, None);
        assert_eq!(task.assigned_user_name, UNASSIGNED);
        assert!(!task.is_pending());
    }

    #[test]
    fn assign_to_copies_the_user_name() {
        let mut user = User::new("Ada".into(), "ada@example.com".into());
        user.id = "u1".into();
        let mut task = Task::new("A".into(), String::new(), json!(1), false);

        task.assign_to(&user);
        assert_eq!(task.assigned_user.as_deref(), Some("u1"));
        assert_eq!(task.assigned_user_name, "Ada");
        assert!(task.is_pending());

        task.unassign();
        assert_eq!(task.assigned_user, None);
        assert_eq!(task.assigned_user_name, UNASSIGNED);
    }
}
