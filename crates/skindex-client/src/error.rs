//! 客户端错误类型

use skindex_core::SkindexError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// 服务端返回的非成功状态，携带其 `error` 字段
    #[error("服务端错误 ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("令牌无效: {0}")]
    Token(String),

    #[error("未登录")]
    NotLoggedIn,

    #[error("响应格式异常: {0}")]
    UnexpectedResponse(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Skindex(#[from] SkindexError),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
