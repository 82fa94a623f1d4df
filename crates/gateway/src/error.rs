//! API error type: every failure leaves the gateway as `{"error": "..."}`
//! with a matching status code.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use contractlens_core::error::{Error, RetrievalError};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UnprocessableEntity(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    /// An upstream service (LLM, embeddings, vector store) failed
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "Request failed");
        } else {
            warn!(%status, error = %self, "Request rejected");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

impl From<RetrievalError> for ApiError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::InvalidQuery(_) => Self::BadRequest(e.to_string()),
            RetrievalError::EmptyDocument(_) => Self::UnprocessableEntity(e.to_string()),
            RetrievalError::NotFound(_) => Self::NotFound(e.to_string()),
            RetrievalError::Embedding(_) | RetrievalError::Store(_) => {
                Self::BadGateway(e.to_string())
            }
            RetrievalError::Config(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Provider(_) => Self::BadGateway(e.to_string()),
            Error::Retrieval(inner) => inner.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// A body cut off by the size limit surfaces as a buffering failure inside
/// the extractor; keep its 413 instead of reporting a malformed request.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(rejection.body_text())
        } else {
            Self::BadRequest(rejection.body_text())
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(e.body_text())
        } else {
            Self::BadRequest(format!("invalid multipart body: {}", e.body_text()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractlens_core::error::ProviderError;

    #[test]
    fn status_mapping() {
        let provider: ApiError = Error::Provider(ProviderError::Timeout("60s".into())).into();
        assert_eq!(provider.status(), StatusCode::BAD_GATEWAY);

        let empty: ApiError = RetrievalError::EmptyDocument("nda".into()).into();
        assert_eq!(empty.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let nested: ApiError = Error::Retrieval(RetrievalError::NotFound("nda".into())).into();
        assert_eq!(nested.status(), StatusCode::NOT_FOUND);

        let query: ApiError = RetrievalError::InvalidQuery("empty".into()).into();
        assert_eq!(query.status(), StatusCode::BAD_REQUEST);

        let too_large = ApiError::PayloadTooLarge("limit".into());
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
