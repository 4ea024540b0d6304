use crate::presentation::rest::dto::ErrorResponse;
use crate::proxy::ProxyError;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// API error type
#[derive(Debug)]
pub struct ApiError {
    pub code: i32,
    pub message: String,
    pub status: StatusCode,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            code: -1100,
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// Outcome unknown; the trade may or may not have happened
    pub fn timeout(message: impl Into<String>) -> Self {
        ApiError {
            code: -1007,
            message: message.into(),
            status: StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ApiError {
            code: -2010,
            message: message.into(),
            status: StatusCode::CONFLICT,
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError {
            code: -1000,
            message: message.into(),
            status: StatusCode::BAD_GATEWAY,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        ApiError {
            code: -1001,
            message: message.into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        let message = err.to_string();
        match err {
            ProxyError::InvalidRequest(_) => Self::bad_request(message),
            ProxyError::Timeout(_) => Self::timeout(message),
            ProxyError::Rejected { .. } => Self::rejected(message),
            ProxyError::Protocol(_) => Self::bad_gateway(message),
            ProxyError::Transport(_) => Self::unavailable(message),
        }
    }
}

/// Malformed, mistyped or non-JSON bodies
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse::new(self.code, self.message));
        (self.status, body).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
