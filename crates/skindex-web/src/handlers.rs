//! HTTP处理器：服务状态

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::error::ApiResult;
use crate::state::AppState;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({ "message": "OK" }))
}

/// 健康检查处理器，同时验证数据存储可用
pub async fn health(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let user_count = state.repo.count_users().await?;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "data": { "userCount": user_count }
    })))
}
