use serde::Deserialize;
use serde_json::Value;

/// Body of POST /users and PUT /users/:id.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub pending_tasks: Option<Vec<String>>,
}

/// Body of POST /tasks and PUT /tasks/:id.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<Value>,
    pub completed: Option<Value>,
    pub assigned_user: Option<String>,
    pub assigned_user_name: Option<String>,
}

impl TaskForm {
    // Only boolean true or the string "true" complete a task
    pub fn completed_flag(&self) -> bool {
        match &self.completed {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(raw)) => raw == "true",
            _ => false,
        }
    }

    pub fn assignee(&self) -> Option<&str> {
        self.assigned_user.as_deref().filter(|id| !id.is_empty())
    }
}

/// Treats a missing or empty string as absent.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
