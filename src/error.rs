use std::time::Duration;

use thiserror::Error;

use crate::task::TaskStatus;

/// Errors returned by CanvasCloud operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or HTTP-layer failure. No envelope was available.
    #[error("{context}")]
    Transport {
        context: String,
        status: Option<u16>,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The server answered with an envelope whose `code` is not 0.
    #[error("Server rejected request (code {code}): {message}")]
    Domain { code: i64, message: String },

    /// The payload could not be flattened into a multipart body.
    #[error("Cannot serialize payload: {0}")]
    Serialization(String),

    /// The task was still running when the wait budget ran out.
    #[error("Task {task_id} still {last_status} after {elapsed:?}, gave up waiting")]
    PollTimeout {
        task_id: String,
        last_status: TaskStatus,
        elapsed: Duration,
    },

    /// The task reached the terminal `FAILED` status.
    #[error(
        "Task {task_id} failed ({}): {}",
        .code.as_deref().unwrap_or("no code"),
        .message.as_deref().unwrap_or("no message")
    )]
    TaskFailed {
        task_id: String,
        code: Option<String>,
        message: Option<String>,
    },

    /// The caller aborted the wait.
    #[error("Polling was cancelled")]
    Cancelled,

    /// A success envelope was missing a field the operation needs.
    #[error("{0}")]
    InvalidResponse(String),

    /// Local JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub(crate) fn network(context: impl Into<String>, source: reqwest::Error) -> Self {
        ClientError::Transport {
            context: context.into(),
            status: source.status().map(|s| s.as_u16()),
            source: Some(source),
        }
    }

    pub(crate) fn http(status: u16, body: &str) -> Self {
        ClientError::Transport {
            context: format!("Server returned HTTP {}: {}", status, body),
            status: Some(status),
            source: None,
        }
    }

    /// Whether a retry of the same read may succeed.
    ///
    /// Network failures qualify, as do 5xx, 408 and 429 replies. Other
    /// HTTP statuses (401, 403, 404) and domain errors mean the server
    /// understood and refused the request.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport { status: None, .. } => true,
            ClientError::Transport {
                status: Some(code), ..
            } => *code >= 500 || *code == 408 || *code == 429,
            _ => false,
        }
    }

    /// The server-side code, for domain failures.
    pub fn domain_code(&self) -> Option<i64> {
        match self {
            ClientError::Domain { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_transient() {
        assert!(ClientError::http(502, "bad gateway").is_transient());
        assert!(!ClientError::Domain {
            code: 40000,
            message: "bad params".into()
        }
        .is_transient());
        assert!(!ClientError::Cancelled.is_transient());
        assert!(!ClientError::Serialization("x".into()).is_transient());
    }

    #[test]
    fn test_client_side_http_errors_are_not_transient() {
        assert!(!ClientError::http(401, r#"{"error":"token expired"}"#).is_transient());
        assert!(!ClientError::http(403, "forbidden").is_transient());
        assert!(!ClientError::http(404, "not found").is_transient());
        assert!(ClientError::http(408, "timeout").is_transient());
        assert!(ClientError::http(429, "slow down").is_transient());
        assert!(ClientError::Transport {
            context: "connection reset".into(),
            status: None,
            source: None,
        }
        .is_transient());
    }

    #[test]
    fn test_http_error_keeps_status() {
        match ClientError::http(503, "unavailable") {
            ClientError::Transport { status, context, .. } => {
                assert_eq!(status, Some(503));
                assert!(context.contains("503"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_task_failed_display() {
        let err = ClientError::TaskFailed {
            task_id: "t-1".into(),
            code: Some("InvalidParameter".into()),
            message: None,
        };
        let text = err.to_string();
        assert!(text.contains("t-1"));
        assert!(text.contains("InvalidParameter"));
        assert!(text.contains("no message"));
    }

    #[test]
    fn test_domain_code() {
        let err = ClientError::Domain {
            code: 40100,
            message: "not logged in".into(),
        };
        assert_eq!(err.domain_code(), Some(40100));
        assert_eq!(ClientError::Cancelled.domain_code(), None);
    }
}
