use serde_json::{json, Value};
use crate::errors::{AppError, AppResult};
use crate::models::{present, Task, TaskForm, User, UNASSIGNED};
use super::pending::PendingTasks;
use super::Stores;

/// Keeps the assignee's pending list in step with task create, update and
/// delete. Completed tasks are frozen.
#[derive(Clone)]
pub struct TaskService {
    stores: Stores,
    pending: PendingTasks,
}

fn validate_required(form: &TaskForm) -> AppResult<(String, Value)> {
    let name = present(&form.name);
    let deadline = form.deadline.as_ref().filter(|d| !d.is_null());
    match (name, deadline) {
        (Some(name), Some(deadline)) => Ok((name.to_string(), deadline.clone())),
        _ => Err(AppError::validation("Name and deadline are required")),
    }
}

impl TaskService {
    pub fn new(stores: Stores) -> Self {
        let pending = stores.pending();
        Self { stores, pending }
    }

    pub async fn get(&self, id: &str) -> AppResult<Task> {
        self.stores
            .tasks
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Task not found"))
    }

    /// Looks up the requested assignee and checks any claimed assignee name
    /// against the real one. On update a claimed name of "unassigned" is let through.
    async fn resolve_assignee(&self, form: &TaskForm, allow_unassigned_name: bool) -> AppResult<Option<User>> {
        let Some(user_id) = form.assignee() else {
            return Ok(None);
        };

        let user = self.stores.users.find_by_id(user_id).await?.ok_or_else(|| {
            tracing::warn!("Assigned user {} not found", user_id);
            AppError::NotFound {
                message: "Assigned user not found".into(),
                details: json!({ "missingUserId": user_id }),
            }
        })?;

        if let Some(claimed) = present(&form.assigned_user_name) {
            let exempt = allow_unassigned_name && claimed == UNASSIGNED;
            if !exempt && claimed != user.name {
                return Err(AppError::validation(
                    "assignedUserName does not match the assigned user's name",
                ));
            }
        }
        Ok(Some(user))
    }

    pub async fn create(&self, form: TaskForm) -> AppResult<Task> {
        let (name, deadline) = validate_required(&form)?;
        let assignee = self.resolve_assignee(&form, false).await?;

        let mut task = Task::new(
            name,
            form.description.clone().unwrap_or_default(),
            deadline,
            form.completed_flag(),
        );
        if let Some(user) = &assignee {
            task.assign_to(user);
        }

        let task = self.stores.tasks.insert(task).await?;
        tracing::info!("Created task {}", task.id);

        if task.is_pending() {
            if let Some(user_id) = task.assigned_user.as_deref() {
                self.pending.add(user_id, &task.id).await?;
                self.pending.normalize(user_id).await?;
            }
        }
        Ok(task)
    }

    /// Full replace of the task's fields, then the previous and current
    /// assignees' pending lists are brought in line.
    pub async fn update(&self, id: &str, form: TaskForm) -> AppResult<Task> {
        let (name, deadline) = validate_required(&form)?;
        let existing = self.get(id).await?;
        if existing.completed {
            return Err(AppError::validation("Cannot modify a completed task"));
        }
        let assignee = self.resolve_assignee(&form, true).await?;

        let mut task = existing.clone();
        task.name = name;
        task.description = form.description.clone().unwrap_or_default();
        task.deadline = deadline;
        task.completed = form.completed_flag();
        match &assignee {
            Some(user) => task.assign_to(user),
            None => task.unassign(),
        }
        self.stores.tasks.update_one(&task).await?;

        if let Some(previous) = existing.assigned_user.as_deref() {
            if task.assigned_user.as_deref() != Some(previous) {
                tracing::debug!("Task {} moved away from user {}", id, previous);
                self.pending.remove(previous, id).await?;
                self.pending.normalize(previous).await?;
            }
        }

        if let Some(current) = task.assigned_user.as_deref() {
            if task.completed {
                self.pending.remove(current, id).await?;
            } else {
                self.pending.add(current, id).await?;
            }
            self.pending.normalize(current).await?;
        }

        tracing::info!("Updated task {}", id);
        self.get(id).await
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let task = self.get(id).await?;

        if let Some(user_id) = task.assigned_user.as_deref() {
            self.pending.remove(user_id, id).await?;
            self.pending.normalize(user_id).await?;
        }

        self.stores.tasks.delete_one(id).await?;
        tracing::info!("Deleted task {}", id);
        Ok(())
    }
}
