use tracing::debug;

use crate::{
    api::ApiClient,
    error::ApiError,
    task::{Task, TaskForm},
};

pub const PAGE_SIZE: usize = 50;

pub const DELETE_CONFIRMATION: &str = "Are you sure you want to delete this task?";

/// Asks the user a yes/no question before a destructive action.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Done,
    /// The user declined the confirmation; nothing was sent.
    Cancelled,
    /// The server rejected the session; it has been logged out.
    SignedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    NoTasks,
    NoMoreTasks,
}

impl EmptyState {
    pub fn message(&self) -> &'static str {
        match self {
            EmptyState::NoTasks => "No tasks yet. Create one to get started!",
            EmptyState::NoMoreTasks => "No more tasks to load.",
        }
    }
}

/// One fetched page, as last confirmed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub page: usize,
    pub tasks: Vec<Task>,
}

impl PageView {
    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    // A full page is taken to mean there may be more; this is wrong when the
    // collection is an exact multiple of PAGE_SIZE.
    pub fn has_next(&self) -> bool {
        self.tasks.len() == PAGE_SIZE
    }

    pub fn show_pagination(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn empty_state(&self) -> Option<EmptyState> {
        match (self.tasks.is_empty(), self.page) {
            (false, _) => None,
            (true, 0) => Some(EmptyState::NoTasks),
            (true, _) => Some(EmptyState::NoMoreTasks),
        }
    }
}

pub struct TaskListController<'a> {
    api: &'a ApiClient,
    current_page: usize,
    view: Option<PageView>,
}

impl<'a> TaskListController<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self {
            api,
            current_page: 0,
            view: None,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn view(&self) -> Option<&PageView> {
        self.view.as_ref()
    }

    pub async fn load_page(&mut self, page: usize) -> Result<Flow, ApiError> {
        let skip = page
            .checked_mul(PAGE_SIZE)
            .ok_or_else(|| ApiError::InvalidInput(format!("Page {page} is out of range")))?;
        self.current_page = page;
        let endpoint = format!("/tasks?skip={skip}&limit={PAGE_SIZE}");
        let Some(tasks) = self.api.get::<Vec<Task>>(&endpoint).await? else {
            return Ok(Flow::SignedOut);
        };
        debug!(page, count = tasks.len(), "loaded tasks");
        self.view = Some(PageView { page, tasks });
        Ok(Flow::Done)
    }

    pub async fn reload(&mut self) -> Result<Flow, ApiError> {
        self.load_page(self.current_page).await
    }

    pub async fn next_page(&mut self) -> Result<Flow, ApiError> {
        let page = self
            .current_page
            .checked_add(1)
            .ok_or_else(|| ApiError::InvalidInput("Already on the last page".to_string()))?;
        self.load_page(page).await
    }

    pub async fn previous_page(&mut self) -> Result<Flow, ApiError> {
        match self.current_page.checked_sub(1) {
            Some(page) => self.load_page(page).await,
            None => Ok(Flow::Done),
        }
    }

    pub async fn fetch_task(&self, id: i64) -> Result<Option<Task>, ApiError> {
        self.api.get(&format!("/tasks/{id}")).await
    }

    /// Submits the form and, once the server confirms, clears it and
    /// re-fetches the current page.
    pub async fn create_task(&mut self, form: &mut TaskForm) -> Result<Flow, ApiError> {
        let created: Option<Task> = self.api.post("/tasks", &form.payload()).await?;
        let Some(created) = created else {
            return Ok(Flow::SignedOut);
        };
        debug!(id = created.id, "created task");
        form.clear();
        self.reload().await
    }

    pub async fn update_task(&mut self, id: i64, form: &TaskForm) -> Result<Flow, ApiError> {
        let updated: Option<Task> = self
            .api
            .put(&format!("/tasks/{id}"), &form.payload())
            .await?;
        if updated.is_none() {
            return Ok(Flow::SignedOut);
        }
        debug!(id, "updated task");
        self.reload().await
    }

    pub async fn delete_task(
        &mut self,
        id: i64,
        confirm: &mut impl Confirm,
    ) -> Result<Flow, ApiError> {
        if !confirm.confirm(DELETE_CONFIRMATION) {
            return Ok(Flow::Cancelled);
        }
        if self.api.delete(&format!("/tasks/{id}")).await?.is_none() {
            return Ok(Flow::SignedOut);
        }
        debug!(id, "deleted task");
        self.reload().await
    }
}
