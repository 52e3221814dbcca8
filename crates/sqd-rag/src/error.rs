//! Error types for the chat pipeline and its tooling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// External call the pipeline was making when something went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Embedding capability
    Embedding,
    /// Vector search capability
    Search,
    /// Completion capability (intent extraction, reply generation, judges)
    Completion,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Embedding => "embedding",
            Stage::Search => "search",
            Stage::Completion => "completion",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of an upstream service failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpstreamKind {
    /// Credentials missing, expired or not authorized
    AuthFailure,
    /// Service asked us to slow down
    RateLimited,
    /// Call did not complete within its deadline
    Timeout,
    /// Service unreachable or failing (5xx, connection errors)
    ServiceUnavailable,
    /// Response arrived but could not be understood
    MalformedResponse,
    /// Request refused as invalid (template, content policy, dimensions)
    Rejected,
}

impl UpstreamKind {
    /// Classify an HTTP status returned by an upstream service
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => UpstreamKind::AuthFailure,
            429 => UpstreamKind::RateLimited,
            408 | 504 => UpstreamKind::Timeout,
            s if s >= 500 => UpstreamKind::ServiceUnavailable,
            _ => UpstreamKind::Rejected,
        }
    }

    /// Classify a transport-level failure
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamKind::Timeout
        } else if err.is_decode() {
            UpstreamKind::MalformedResponse
        } else if let Some(status) = err.status() {
            Self::from_status(status)
        } else {
            UpstreamKind::ServiceUnavailable
        }
    }

    /// Whether a bounded retry may help
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamKind::RateLimited | UpstreamKind::ServiceUnavailable)
    }
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpstreamKind::AuthFailure => "auth failure",
            UpstreamKind::RateLimited => "rate limited",
            UpstreamKind::Timeout => "timeout",
            UpstreamKind::ServiceUnavailable => "service unavailable",
            UpstreamKind::MalformedResponse => "malformed response",
            UpstreamKind::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid caller input, detected before any network call
    #[error("Invalid input: {0}")]
    Input(String),

    /// Embedding, search or completion service failure
    #[error("{stage} call failed ({kind}): {message}")]
    Upstream {
        stage: Stage,
        kind: UpstreamKind,
        message: String,
    },

    /// Caller aborted the request
    #[error("{stage} call cancelled")]
    Cancelled { stage: Stage },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an input error
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    /// Create an upstream error
    pub fn upstream(stage: Stage, kind: UpstreamKind, message: impl Into<String>) -> Self {
        Self::Upstream {
            stage,
            kind,
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Re-tag upstream and cancellation errors with the stage the caller invoked
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            Error::Upstream { kind, message, .. } => Error::Upstream {
                stage,
                kind,
                message,
            },
            Error::Cancelled { .. } => Error::Cancelled { stage },
            other => other,
        }
    }

    /// Upstream failure kind, if this is an upstream error
    pub fn upstream_kind(&self) -> Option<UpstreamKind> {
        match self {
            Error::Upstream { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Stage context for upstream and cancellation errors
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Upstream { stage, .. } | Error::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let stage = self.stage();
        let (status, error_type) = match &self {
            Error::Input(_) => (StatusCode::BAD_REQUEST, "input_error"),
            Error::Upstream { kind, .. } => match kind {
                UpstreamKind::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
                UpstreamKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"),
                UpstreamKind::AuthFailure => (StatusCode::BAD_GATEWAY, "upstream_auth"),
                _ => (StatusCode::BAD_GATEWAY, "upstream_error"),
            },
            Error::Cancelled { .. } => (StatusCode::REQUEST_TIMEOUT, "cancelled"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Io(_) | Error::Toml(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "stage": stage,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;

        assert_eq!(UpstreamKind::from_status(StatusCode::UNAUTHORIZED), UpstreamKind::AuthFailure);
        assert_eq!(UpstreamKind::from_status(StatusCode::FORBIDDEN), UpstreamKind::AuthFailure);
        assert_eq!(UpstreamKind::from_status(StatusCode::TOO_MANY_REQUESTS), UpstreamKind::RateLimited);
        assert_eq!(UpstreamKind::from_status(StatusCode::GATEWAY_TIMEOUT), UpstreamKind::Timeout);
        assert_eq!(
            UpstreamKind::from_status(StatusCode::SERVICE_UNAVAILABLE),
            UpstreamKind::ServiceUnavailable
        );
        assert_eq!(UpstreamKind::from_status(StatusCode::BAD_REQUEST), UpstreamKind::Rejected);
    }

    #[test]
    fn test_at_stage_retags_upstream() {
        let err = Error::upstream(Stage::Search, UpstreamKind::Timeout, "slow").at_stage(Stage::Embedding);
        assert_eq!(err.stage(), Some(Stage::Embedding));
        assert_eq!(err.upstream_kind(), Some(UpstreamKind::Timeout));

        let err = Error::input("empty").at_stage(Stage::Completion);
        assert!(matches!(err, Error::Input(_)));
        assert_eq!(err.stage(), None);
    }

    #[test]
    fn test_display_carries_stage() {
        let err = Error::upstream(Stage::Embedding, UpstreamKind::AuthFailure, "401");
        assert_eq!(err.to_string(), "embedding call failed (auth failure): 401");
        assert_eq!(Error::Cancelled { stage: Stage::Completion }.to_string(), "completion call cancelled");
    }
}
