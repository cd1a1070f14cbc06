//! # SkinDex Core
//!
//! SkinDex系统的核心模块，提供基础数据结构、错误定义、输入校验和访问控制规则。

pub mod access;
pub mod error;
pub mod models;
pub mod validation;

pub use error::{Result, SkindexError};
pub use models::*;
