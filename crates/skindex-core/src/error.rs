//! 错误定义模块

use thiserror::Error;

/// SkinDex系统统一错误类型
#[derive(Error, Debug)]
pub enum SkindexError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("分类推理错误: {0}")]
    Classification(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("认证失败: {0}")]
    Unauthorized(String),

    #[error("权限错误: {0}")]
    Forbidden(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("资源冲突: {0}")]
    Conflict(String),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SkindexError {
    /// 面向调用方的消息（不含分类前缀）
    pub fn message(&self) -> String {
        match self {
            SkindexError::Config(msg)
            | SkindexError::Database(msg)
            | SkindexError::Storage(msg)
            | SkindexError::Classification(msg)
            | SkindexError::Validation(msg)
            | SkindexError::Unauthorized(msg)
            | SkindexError::Forbidden(msg)
            | SkindexError::NotFound(msg)
            | SkindexError::Conflict(msg)
            | SkindexError::Internal(msg) => msg.clone(),
            SkindexError::Io(e) => e.to_string(),
            SkindexError::Serialization(e) => e.to_string(),
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        SkindexError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        SkindexError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        SkindexError::Validation(msg.into())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for SkindexError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                SkindexError::Conflict("Email already registered".to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                SkindexError::Validation(db_err.message().to_string())
            }
            _ => SkindexError::Database(err.to_string()),
        }
    }
}

/// SkinDex系统统一结果类型
pub type Result<T> = std::result::Result<T, SkindexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_strips_category() {
        let err = SkindexError::NotFound("Image not found".to_string());
        assert_eq!(err.message(), "Image not found");
        assert!(err.to_string().contains("Image not found"));
    }
}
