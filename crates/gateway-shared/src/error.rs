//! Top-level error type. Per-crate errors (`gateway-llm`, `gateway-store`, ...)
//! convert into this one via `#[from]` so handlers only ever propagate a
//! single type with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("business rule violation: {0}")]
    BusinessRule(String),

    #[error("decomposition error: {0}")]
    DecompositionError(String),

    #[error("no suitable model: {0}")]
    NoSuitableModel(String),

    #[error("model scoring unavailable: {0}")]
    ModelScoringUnavailable(String),

    #[error("upstream llm failure: {0}")]
    UpstreamLlmFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Unsupported(_) => "unsupported",
            Self::BusinessRule(_) => "business_rule_violation",
            Self::DecompositionError(_) => "decomposition_error",
            Self::NoSuitableModel(_) => "no_suitable_model",
            Self::ModelScoringUnavailable(_) => "model_scoring_unavailable",
            Self::UpstreamLlmFailure(_) => "upstream_llm_failure",
            Self::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Unsupported(_) => StatusCode::BAD_REQUEST,
            Self::BusinessRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DecompositionError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NoSuitableModel(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ModelScoringUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamLlmFailure(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail { kind: self.kind(), message: self.to_string() },
        };
        (status, Json(body)).into_response()
    }
}
