use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("unauthorized gateway key")]
    Unauthorized,
    #[error("llm router not initialized, ensure models are added to the gateway")]
    RouterNotInitialized,
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },
    #[error("invalid request: {reason}")]
    InvalidRequest {
        reason: String,
        param: Option<String>,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        GatewayError::InvalidRequest {
            reason: reason.into(),
            param: None,
        }
    }

    pub fn missing_param(param: &str) -> Self {
        GatewayError::InvalidRequest {
            reason: format!("missing required field `{param}`"),
            param: Some(param.to_string()),
        }
    }

    /// Best-effort HTTP status. Backend errors keep the status the upstream
    /// already communicated; everything unexpected defaults to 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Backend { status, .. } => StatusCode::from_u16(*status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            GatewayError::Config(_)
            | GatewayError::RouterNotInitialized
            | GatewayError::InvalidResponse(_)
            | GatewayError::Http(_)
            | GatewayError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "config_error",
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::RouterNotInitialized => "router_not_initialized",
            GatewayError::Backend { .. } => "backend_error",
            GatewayError::InvalidRequest { .. } => "invalid_request",
            GatewayError::InvalidResponse(_) => "invalid_response",
            GatewayError::Http(_) => "http_error",
            GatewayError::Json(_) => "json_error",
        }
    }

    pub fn param(&self) -> Option<&str> {
        match self {
            GatewayError::InvalidRequest { param, .. } => param.as_deref(),
            _ => None,
        }
    }
}
