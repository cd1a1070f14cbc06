//! 审计日志写入

use skindex_database::NewLogEntry;
use tracing::warn;

use crate::state::AppState;

/// 追加一条审计记录；写入失败只告警，不影响业务响应
pub async fn record(state: &AppState, entry: NewLogEntry) {
    if let Err(e) = state.repo.append_log(&entry).await {
        warn!("Failed to write audit log '{}': {}", entry.action, e);
    }
}
