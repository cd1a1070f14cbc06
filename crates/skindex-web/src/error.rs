//! HTTP错误映射

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skindex_core::SkindexError;
use tracing::{error, warn};

/// 处理器返回的错误，包装核心错误并负责转换为HTTP响应
#[derive(Debug)]
pub struct ApiError(pub SkindexError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SkindexError::Validation(_) | SkindexError::Serialization(_) => StatusCode::BAD_REQUEST,
            SkindexError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            SkindexError::Forbidden(_) => StatusCode::FORBIDDEN,
            SkindexError::NotFound(_) => StatusCode::NOT_FOUND,
            SkindexError::Conflict(_) => StatusCode::CONFLICT,
            SkindexError::Config(_)
            | SkindexError::Database(_)
            | SkindexError::Storage(_)
            | SkindexError::Classification(_)
            | SkindexError::Internal(_)
            | SkindexError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError(SkindexError::Unauthorized(msg.into()))
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError(SkindexError::Validation(msg.into()))
    }
}

impl From<SkindexError> for ApiError {
    fn from(err: SkindexError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self.0);
        }

        let body = Json(json!({
            "error": self.0.message(),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}
