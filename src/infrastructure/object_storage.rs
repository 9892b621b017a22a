//! 对象存储接口
//!
//! 上传的源工作簿和导出的工作簿都经由这里读写。

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> AppResult<Vec<u8>>;

    async fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> AppResult<()>;
}

/// 本地目录实现：`<root>/<bucket>/<key>`
pub struct LocalObjectStorage {
    root: PathBuf,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 对象路径；桶名与对象键只允许普通路径段，不能跳出根目录
    fn path_for(&self, bucket: &str, key: &str) -> AppResult<PathBuf> {
        for part in [bucket, key] {
            let escapes = part.is_empty()
                || Path::new(part)
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                return Err(AppError::object_storage(
                    format!("{}/{}", bucket, key),
                    "非法的对象路径",
                ));
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn get_object(&self, bucket: &str, key: &str) -> AppResult<Vec<u8>> {
        let path = self.path_for(bucket, key)?;
        debug!("读取对象: {}", path.display());
        fs::read(&path)
            .await
            .map_err(|e| AppError::object_storage(format!("{}/{}", bucket, key), e))
    }

    async fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> AppResult<()> {
        let path = self.path_for(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::object_storage(format!("{}/{}", bucket, key), e))?;
        }
        debug!("写入对象: {} ({} 字节)", path.display(), bytes.len());
        fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::object_storage(format!("{}/{}", bucket, key), e))
    }
}

/// 内存实现
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn get_object(&self, bucket: &str, key: &str) -> AppResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| AppError::object_storage(format!("{}/{}", bucket, key), "对象不存在"))
    }

    async fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> AppResult<()> {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }
}
