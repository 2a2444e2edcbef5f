use spin_sdk::http::Response;

use crate::core::store::StoreError;

/// Failure taxonomy surfaced by every service. Each variant maps to one
/// HTTP status at the boundary; none are retried inside the core.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("incorrect credentials")]
    Auth,
    #[error("{0} not found")]
    NotFound(String),
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error("cannot follow yourself")]
    SelfFollow,
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Auth | ApiError::Forbidden => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Validation(_) | ApiError::SelfFollow => 400,
            ApiError::Conflict(_) => 409,
            ApiError::Storage(_) => 500,
        }
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        let message = match &err {
            // Store details stay in the log, not in the client body.
            ApiError::Storage(inner) => {
                tracing::error!(error = %inner, "storage failure");
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({ "error": message }).to_string();
        Response::builder()
            .status(err.status())
            .header("Content-Type", "application/json")
            .body(body.into_bytes())
            .build()
    }
}
