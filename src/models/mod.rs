mod user;
mod forms;
mod task;

pub use user::User;
pub use forms::{present, TaskForm, UserForm};
pub use task::{Task, UNASSIGNED};
