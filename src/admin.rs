use serde::Deserialize;
use tracing::debug;

use crate::{api::ApiClient, error::ApiError, session::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub struct AdminStats {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_tasks: u64,
    #[serde(default)]
    pub completed_tasks: u64,
}

impl AdminStats {
    /// Percentage of tasks completed, rounded. An empty system reads as 0%.
    pub fn completion_rate(&self) -> u64 {
        let total = self.total_tasks.max(1) as f64;
        (self.completed_tasks as f64 / total * 100.0).round() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminView {
    Stats(AdminStats),
    AccessDenied,
}

/// Fetches system-wide statistics for an admin.
///
/// Returns `AccessDenied` when the signed-in user isn't an admin or the server
/// answers 403. Other failures are errors, so an outage doesn't masquerade as
/// a permissions problem. `None` means the session was rejected.
pub async fn load_admin_stats(api: &ApiClient) -> Result<Option<AdminView>, ApiError> {
    let session = api.session().require_session()?;
    if session.role != Role::Admin {
        return Ok(Some(AdminView::AccessDenied));
    }

    match api.get::<AdminStats>("/tasks/admin/stats").await {
        Ok(Some(stats)) => Ok(Some(AdminView::Stats(stats))),
        Ok(None) => Ok(None),
        Err(ApiError::Forbidden { message }) => {
            debug!(%message, "stats refused");
            Ok(Some(AdminView::AccessDenied))
        }
        Err(err) => Err(err),
    }
}
