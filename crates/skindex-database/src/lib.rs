//! # SkinDex数据库模块
//!
//! 负责用户、影像、诊断和审计日志的持久化，提供PostgreSQL实现与内存实现。

pub mod connection;
pub mod memory;
pub mod models;
pub mod queries;
pub mod repository;

// 重新导出主要类型
pub use connection::DatabasePool;
pub use memory::MemoryRepository;
pub use models::*;
pub use queries::PgRepository;
pub use repository::Repository;
