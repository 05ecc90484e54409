//! Error types for the management API and the engine collaborator.

use axum::http::StatusCode;
use thiserror::Error;

/// Failures reported by a [`QueueEngine`](crate::client::QueueEngine).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A dead-job key matched no row on delete.
    #[error("nothing deleted")]
    NotDeleted,

    /// A dead-job key matched no row on retry.
    #[error("nothing retried")]
    NotRetried,

    #[error("{0}")]
    Backend(String),
}

/// Everything a handler can fail with.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid page {value:?}: {reason}")]
    InvalidPage { value: String, reason: String },

    #[error("invalid died_at {value:?}: {source}")]
    InvalidDiedAt {
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("invalid query string: {0}")]
    InvalidQuery(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("server is shutting down")]
    ShuttingDown,

    #[error("render error: {0}")]
    Render(#[source] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// How failures map onto HTTP status codes.
///
/// `Legacy` keeps the original contract where every failure is a 500.
/// `Classified` separates client input errors from backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorStatusMode {
    #[default]
    Legacy,
    Classified,
}

impl ApiError {
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidPage { .. }
                | ApiError::InvalidDiedAt { .. }
                | ApiError::InvalidQuery(_)
                | ApiError::InvalidPath(_)
        )
    }

    pub fn status(&self, mode: ErrorStatusMode) -> StatusCode {
        if matches!(self, ApiError::Unauthorized) {
            return StatusCode::UNAUTHORIZED;
        }

        match mode {
            ErrorStatusMode::Legacy => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorStatusMode::Classified => match self {
                e if e.is_input_error() => StatusCode::BAD_REQUEST,
                ApiError::Engine(EngineError::NotDeleted | EngineError::NotRetried) => {
                    StatusCode::NOT_FOUND
                }
                ApiError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bad_page() -> ApiError {
        ApiError::InvalidPage {
            value: "abc".into(),
            reason: "not a base-10 unsigned integer".into(),
        }
    }

    #[test]
    fn legacy_mode_reports_everything_as_500() {
        let errs = [
            bad_page(),
            ApiError::InvalidQuery("bad".into()),
            ApiError::InvalidPath("bad utf-8".into()),
            ApiError::ShuttingDown,
            ApiError::Engine(EngineError::NotDeleted),
            ApiError::Engine(EngineError::Backend("redis down".into())),
        ];

        for e in errs {
            assert_eq!(e.status(ErrorStatusMode::Legacy), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn classified_mode_separates_client_errors() {
        let mode = ErrorStatusMode::Classified;
        assert_eq!(bad_page().status(mode), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidPath("bad utf-8".into()).status(mode),
            StatusCode::BAD_REQUEST
        );

        let died_at = "12x".parse::<i64>().unwrap_err();
        let e = ApiError::InvalidDiedAt {
            value: "12x".into(),
            source: died_at,
        };
        assert_eq!(e.status(mode), StatusCode::BAD_REQUEST);

        assert_eq!(
            ApiError::Engine(EngineError::NotRetried).status(mode),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::ShuttingDown.status(mode), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::Engine(EngineError::Backend("boom".into())).status(mode),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthorized_is_401_in_both_modes() {
        assert_eq!(
            ApiError::Unauthorized.status(ErrorStatusMode::Legacy),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Unauthorized.status(ErrorStatusMode::Classified),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn engine_messages_pass_through_untouched() {
        let e: ApiError = EngineError::Backend("connection refused".into()).into();
        assert_eq!(e.to_string(), "connection refused");
        assert_eq!(ApiError::from(EngineError::NotDeleted).to_string(), "nothing deleted");
    }
}
