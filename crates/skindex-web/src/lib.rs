//! # SkinDex Web API
//!
//! 基于axum的REST服务：JWT认证、用户/患者/影像/诊断/日志接口以及运行指标。

pub mod audit;
pub mod auth;
pub mod diagnoses;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod images;
pub mod logs;
pub mod metrics;
pub mod server;
pub mod state;
pub mod users;

pub use auth::{AuthService, AuthSettings, Claims};
pub use error::{ApiError, ApiResult};
pub use server::{create_app, WebServer};
pub use state::AppState;
