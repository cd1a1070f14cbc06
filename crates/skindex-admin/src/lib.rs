//! # SkinDex管理模块
//!
//! 负责配置加载与校验，以及日志系统初始化。

pub mod config;
pub mod logging;

pub use crate::config::{ConfigValidator, LogFormat, SkindexConfig};
pub use logging::init_tracing;
