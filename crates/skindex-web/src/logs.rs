//! 审计日志查询（仅管理员）

use axum::{extract::State, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use skindex_core::{access, LogEntry, Principal, SkindexError};

use crate::error::ApiResult;
use crate::extract::IdPath;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogView {
    pub id: i32,
    pub user_id: Option<i32>,
    pub action: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<LogEntry> for LogView {
    fn from(entry: LogEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id,
            action: entry.action,
            details: entry.details,
            timestamp: entry.timestamp,
        }
    }
}

/// GET /logs
pub async fn list_logs(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    access::require_admin(&principal)?;

    let logs: Vec<LogView> = state.repo.list_logs().await?.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "data": logs })))
}

/// GET /logs/{id}
pub async fn get_log(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    access::require_admin(&principal)?;

    let entry = state
        .repo
        .get_log(id)
        .await?
        .ok_or_else(|| SkindexError::not_found("Log not found"))?;
    Ok(Json(json!({ "data": LogView::from(entry) })))
}
