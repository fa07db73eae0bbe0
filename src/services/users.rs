use serde_json::json;
use crate::errors::{AppError, AppResult};
use crate::models::{present, Task, User, UserForm};
use crate::query::Filter;
use super::pending::{dedup_preserving_order, PendingTasks};
use super::Stores;

/// Keeps `User.pendingTasks` and the tasks it names in agreement across
/// user create, update and delete.
#[derive(Clone)]
pub struct UserService {
    stores: Stores,
    pending: PendingTasks,
}

// Name and email are required on every write; the email needs an '@'
fn validate_identity(form: &UserForm) -> AppResult<(String, String)> {
    let (Some(name), Some(email)) = (present(&form.name), present(&form.email)) else {
        return Err(AppError::validation("Name and email are required"));
    };
    if !email.contains('@') {
        return Err(AppError::validation("Invalid email format"));
    }
    Ok((name.to_string(), email.to_string()))
}

impl UserService {
    pub fn new(stores: Stores) -> Self {
        let pending = stores.pending();
        Self { stores, pending }
    }

    pub async fn get(&self, id: &str) -> AppResult<User> {
        self.stores
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn create(&self, form: UserForm) -> AppResult<User> {
        let (name, email) = validate_identity(&form)?;
        if form.pending_tasks.as_ref().map_or(false, |ids| !ids.is_empty()) {
            return Err(AppError::validation(
                "pendingTasks cannot be set when creating a user",
            ));
        }

        let user = self.stores.users.insert(User::new(name, email)).await?;
        tracing::info!("Created user {}", user.id);

        self.pending.normalize(&user.id).await?;
        self.get(&user.id).await
    }

    /// Full replace of name, email and pending tasks, followed by the
    /// cascade that moves the named tasks onto this user.
    pub async fn update(&self, id: &str, form: UserForm) -> AppResult<User> {
        let (name, email) = validate_identity(&form)?;
        let mut user = self.get(id).await?;

        let requested = dedup_preserving_order(form.pending_tasks.as_deref().unwrap_or_default());
        self.check_assignable(&requested).await?;

        let previous_pending = std::mem::take(&mut user.pending_tasks);
        user.name = name;
        user.email = email;
        user.pending_tasks = requested.clone();
        self.stores.users.update_one(&user).await?;
        tracing::debug!("Saved user {} with {} requested tasks", id, requested.len());

        let referenced = if requested.is_empty() {
            Vec::new()
        } else {
            self.stores.tasks.find_records(&Filter::id_in(&requested)).await?
        };
        let (completed, open): (Vec<Task>, Vec<Task>) =
            referenced.into_iter().partition(|task| task.completed);
        if !completed.is_empty() {
            tracing::debug!("Dropping {} completed tasks from user {}", completed.len(), id);
        }

        // Take open tasks away from whoever held them before
        for task in &open {
            if let Some(owner) = task.assigned_user.as_deref().filter(|owner| *owner != id) {
                self.pending.remove(owner, &task.id).await?;
                self.pending.normalize(owner).await?;
            }
        }

        for task in &open {
            let mut task = task.clone();
            task.assign_to(&user);
            self.stores.tasks.update_one(&task).await?;
        }
        user.pending_tasks = requested
            .iter()
            .filter(|task_id| open.iter().any(|task| &task.id == *task_id))
            .cloned()
            .collect();
        self.stores.users.update_one(&user).await?;

        let dropped: Vec<String> = previous_pending
            .into_iter()
            .filter(|task_id| !requested.contains(task_id))
            .collect();
        if !dropped.is_empty() {
            let released = self
                .stores
                .tasks
                .update_many(&Filter::id_in(&dropped).and("completed", false), &Task::unassign_patch())
                .await?;
            tracing::debug!("Unassigned {} tasks dropped by user {}", released, id);
        }

        self.stores
            .tasks
            .update_many(&Filter::eq("assignedUser", id), &Task::assignee_name_patch(&user.name))
            .await?;

        self.pending.normalize(id).await?;
        tracing::info!("Updated user {}", id);
        self.get(id).await
    }

    // Every id must exist and none may already be completed
    async fn check_assignable(&self, requested: &[String]) -> AppResult<()> {
        if requested.is_empty() {
            return Ok(());
        }

        let found = self.stores.tasks.find_records(&Filter::id_in(requested)).await?;
        let missing: Vec<&String> = requested
            .iter()
            .filter(|task_id| !found.iter().any(|task| &task.id == *task_id))
            .collect();
        if !missing.is_empty() {
            tracing::warn!("Pending tasks not found: {:?}", missing);
            return Err(AppError::NotFound {
                message: "One or more tasks not found".into(),
                details: json!({ "missingTaskIds": missing }),
            });
        }

        let completed: Vec<&str> = found
            .iter()
            .filter(|task| task.completed)
            .map(|task| task.id.as_str())
            .collect();
        if !completed.is_empty() {
            return Err(AppError::validation(format!(
                "Completed tasks cannot be pending: {}",
                completed.join(", ")
            )));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let user = self.get(id).await?;

        if !user.pending_tasks.is_empty() {
            let released = self
                .stores
                .tasks
                .update_many(&Filter::id_in(&user.pending_tasks), &Task::unassign_patch())
                .await?;
            tracing::debug!("Unassigned {} tasks of deleted user {}", released, id);
        }

        self.stores.users.delete_one(id).await?;
        tracing::info!("Deleted user {}", id);
        Ok(())
    }
}
