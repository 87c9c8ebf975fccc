use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tally_catalog::CatalogError;
use tally_ledger::{ErrorKind, LedgerError};
use tally_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Ledger(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::BusinessRule => StatusCode::BAD_REQUEST,
                ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Catalog(CatalogError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Catalog(CatalogError::InvalidTitle { .. } | CatalogError::DuplicateSlug { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::Catalog(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::SERVICE_UNAVAILABLE => "unavailable",
            _ => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "request failed");
                "internal error".to_string()
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                tracing::warn!(error = %self, "request hit a transient failure");
                "temporarily unavailable, retry".to_string()
            }
            _ => self.to_string(),
        };
        let body = serde_json::json!({ "code": self.code(), "message": message });
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tally_ledger::Entity;

    #[test]
    fn ledger_kinds_map_to_status_classes() {
        let missing = ServerError::from(LedgerError::NotFound {
            entity: Entity::User,
            key: "ghost".into(),
        });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let rule = ServerError::from(LedgerError::BonusAlreadyCollected {
            username: "alice".into(),
        });
        assert_eq!(rule.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rule.to_string(), "daily bonus already collected by alice");

        let transient = ServerError::from(LedgerError::from(StoreError::Conflict {
            key: "points:1".into(),
        }));
        assert_eq!(transient.status(), StatusCode::SERVICE_UNAVAILABLE);

        let fatal = ServerError::from(LedgerError::ReferralCodeExhausted { attempts: 5 });
        assert_eq!(fatal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn catalog_errors() {
        let dup = ServerError::from(CatalogError::DuplicateSlug {
            slug: "follow-us".into(),
        });
        assert_eq!(dup.status(), StatusCode::BAD_REQUEST);
        let missing = ServerError::from(CatalogError::NotFound { slug: "x".into() });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_request_is_bad_request() {
        let err = ServerError::InvalidRequest("username must not be empty".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "bad_request");
    }
}
