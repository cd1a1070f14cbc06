//! 影像存储管理

use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use skindex_core::{Result, SkindexError};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 上传文件的统一前缀
pub const UPLOAD_PREFIX: &str = "uploads";

/// 影像文件存储
#[derive(Debug, Clone)]
pub struct ImageStore {
    store: Arc<dyn ObjectStore>,
}

impl ImageStore {
    /// 本地文件系统存储，根目录不存在时自动创建
    pub fn local(root: impl AsRef<std::path::Path>) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root).map_err(storage_error)?;
        info!("Image storage rooted at {}", root.display());
        Ok(Self {
            store: Arc::new(store),
        })
    }

    /// 内存存储，用于测试和开发模式
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
        }
    }

    pub fn from_store(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// 保存上传文件，返回存储键
    pub async fn store_upload(&self, original_name: &str, data: Bytes) -> Result<String> {
        let key = format!(
            "{}/{}-{}-{}",
            UPLOAD_PREFIX,
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            sanitize_file_name(original_name)
        );
        let location = parse_key(&key)?;
        let size = data.len();

        self.store.put(&location, data).await.map_err(storage_error)?;
        debug!("Stored upload {} ({} bytes)", key, size);
        Ok(key)
    }

    /// 读取文件内容
    pub async fn read(&self, key: &str) -> Result<Bytes> {
        let location = parse_key(key)?;
        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(SkindexError::not_found("Image file not found"))
            }
            Err(e) => return Err(storage_error(e)),
        };
        result.bytes().await.map_err(storage_error)
    }

    /// 删除文件，文件不存在时视为成功
    pub async fn delete(&self, key: &str) -> Result<()> {
        let location = parse_key(key)?;
        match self.store.delete(&location).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                warn!("Stored file {} was already missing", key);
                Ok(())
            }
            Err(e) => Err(storage_error(e)),
        }
    }

    /// 批量删除，单个失败只记录日志
    pub async fn delete_all(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.delete(key).await {
                warn!("Failed to delete stored file {}: {}", key, e);
            }
        }
    }
}

/// 只保留文件名部分，非 `[A-Za-z0-9._-]` 字符替换为下划线
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(&['/', '\\'][..]).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

fn parse_key(key: &str) -> Result<Path> {
    Path::parse(key).map_err(|e| SkindexError::Storage(format!("Invalid storage key {}: {}", key, e)))
}

fn storage_error(e: object_store::Error) -> SkindexError {
    SkindexError::Storage(e.to_string())
}
