//! Terminal client for a task-tracking web API: sign in, page through tasks,
//! and create, edit or delete them against the server.

pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod render;
pub mod session;
pub mod task;
pub mod task_list;
pub mod ui;

pub use api::ApiClient;
pub use error::ApiError;
pub use session::{Role, Session, SessionStore};
pub use task::{Task, TaskForm, TaskPriority, TaskStatus};
pub use task_list::{Flow, PageView, TaskListController, PAGE_SIZE};
