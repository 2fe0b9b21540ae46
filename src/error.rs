use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::session::SessionError;

/// Failures surfaced to the UI action that issued a request.
///
/// Message-bearing variants display the bare message so that a form can show
/// exactly what the server said.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 from an endpoint that doesn't carry a session (login).
    #[error("{message}")]
    Authentication { message: String },

    #[error("{message}")]
    Validation { status: u16, message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    Server { status: u16, message: String },

    /// Error body that wasn't JSON.
    #[error("{message}")]
    UnknownServer { status: u16, message: String },

    #[error("Network error: could not reach the server")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response from the server: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Authentication { .. } => Some(401),
            ApiError::Forbidden { .. } => Some(403),
            ApiError::Validation { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::UnknownServer { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Classifies a non-success response from its status and raw body.
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        let reason = status.canonical_reason().unwrap_or("Unknown status");
        let parsed: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => {
                let message = if body.trim().is_empty() {
                    reason.to_string()
                } else {
                    body.trim().to_string()
                };
                return ApiError::UnknownServer {
                    status: status.as_u16(),
                    message,
                };
            }
        };
        let message =
            error_detail(&parsed).unwrap_or_else(|| format!("API Error: {reason}"));

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Authentication { message },
            StatusCode::FORBIDDEN => ApiError::Forbidden { message },
            s if s.is_client_error() => ApiError::Validation {
                status: s.as_u16(),
                message,
            },
            s => ApiError::Server {
                status: s.as_u16(),
                message,
            },
        }
    }
}

/// Extracts a readable message from a `detail` field.
///
/// A string is used as is, a list of field errors is joined on each item's
/// `msg`, and anything else is rendered as JSON text.
pub fn error_detail(body: &Value) -> Option<String> {
    let detail = body.get("detail")?;
    let message = match detail {
        Value::Null => return None,
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item.get("msg").and_then(Value::as_str) {
                Some(msg) => msg.to_string(),
                None => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_detail_is_used_verbatim() {
        let body = json!({ "detail": "Task not found" });
        assert_eq!(error_detail(&body).as_deref(), Some("Task not found"));
    }

    #[test]
    fn list_detail_joins_field_messages() {
        let body = json!({ "detail": [
            { "loc": ["body", "title"], "msg": "field required", "type": "missing" },
            { "loc": ["body", "priority"], "type": "enum" }
        ]});
        assert_eq!(
            error_detail(&body).unwrap(),
            r#"field required; {"loc":["body","priority"],"type":"enum"}"#
        );
    }

    #[test]
    fn object_detail_is_stringified() {
        let body = json!({ "detail": { "code": 42 } });
        assert_eq!(error_detail(&body).unwrap(), r#"{"code":42}"#);
    }

    #[test]
    fn classifies_statuses() {
        let err = ApiError::from_response(StatusCode::NOT_FOUND, r#"{"detail":"Task not found"}"#);
        assert!(matches!(err, ApiError::Validation { status: 404, .. }));
        assert_eq!(err.to_string(), "Task not found");
        assert_eq!(err.status(), Some(404));

        let err = ApiError::from_response(StatusCode::FORBIDDEN, r#"{"detail":"Admin only"}"#);
        assert!(matches!(err, ApiError::Forbidden { .. }));

        let err = ApiError::from_response(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert!(matches!(err, ApiError::UnknownServer { status: 502, .. }));
        assert_eq!(err.to_string(), "<html>oops</html>");

        let err = ApiError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "{}");
        assert_eq!(err.to_string(), "API Error: Internal Server Error");
    }
}
