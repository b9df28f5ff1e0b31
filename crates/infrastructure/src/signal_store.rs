//! 停止信号存储
//!
//! Worker 在每批任务前后读取 `STOP_NEXT_TASK_KEY`，时间戳晚于 Worker 启动时间即停止。
//! 跨进程停止 Worker 需要 [`FileSignalStore`] 或共享缓存上的 [`CacheSignalStore`]。

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::RwLock;

use cadence_core::{
    traits::{CacheStore, SignalStore},
    SchedulerError, SchedulerResult,
};

use crate::lock_store::encode_file_key;

#[derive(Debug, Default)]
pub struct InMemorySignalStore {
    signals: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn get(&self, key: &str) -> SchedulerResult<Option<DateTime<Utc>>> {
        Ok(self.signals.read().await.get(key).copied())
    }

    async fn set(&self, key: &str, at: DateTime<Utc>) -> SchedulerResult<()> {
        self.signals.write().await.insert(key.to_string(), at);
        Ok(())
    }
}

/// 基于缓存的信号存储，时间戳以 RFC 3339 字符串保存，可在进程间共享
pub struct CacheSignalStore {
    cache: Arc<dyn CacheStore>,
}

impl CacheSignalStore {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl SignalStore for CacheSignalStore {
    async fn get(&self, key: &str) -> SchedulerResult<Option<DateTime<Utc>>> {
        let Some(bytes) = self.cache.get(key).await? else {
            return Ok(None);
        };
        let value = String::from_utf8(bytes)
            .map_err(|e| SchedulerError::Serialization(format!("信号 {key} 不是有效的 UTF-8: {e}")))?;
        let at = DateTime::parse_from_rfc3339(&value).map_err(|e| {
            SchedulerError::Serialization(format!("信号 {key} 的时间戳无效: {e}"))
        })?;
        Ok(Some(at.with_timezone(&Utc)))
    }

    async fn set(&self, key: &str, at: DateTime<Utc>) -> SchedulerResult<()> {
        self.cache.set(key, at.to_rfc3339().into_bytes()).await
    }
}

/// 基于文件的信号存储，每个键对应目录下的一个 `<key>.signal` 文件
///
/// 写入先落到临时文件再重命名，读取方不会看到写了一半的时间戳。
#[derive(Debug, Clone)]
pub struct FileSignalStore {
    directory: PathBuf,
}

impl FileSignalStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn signal_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.signal", encode_file_key(key)))
    }
}

#[async_trait]
impl SignalStore for FileSignalStore {
    async fn get(&self, key: &str) -> SchedulerResult<Option<DateTime<Utc>>> {
        let path = self.signal_path(key);
        let value = match fs::read_to_string(&path).await {
            Ok(value) => value,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SchedulerError::transport(format!(
                    "读取信号文件失败 ({}): {e}",
                    path.display()
                )))
            }
        };
        let at = DateTime::parse_from_rfc3339(value.trim()).map_err(|e| {
            SchedulerError::Serialization(format!("信号 {key} 的时间戳无效: {e}"))
        })?;
        Ok(Some(at.with_timezone(&Utc)))
    }

    async fn set(&self, key: &str, at: DateTime<Utc>) -> SchedulerResult<()> {
        let write_error = |e: std::io::Error| {
            SchedulerError::transport(format!(
                "写入信号文件失败 ({}): {e}",
                self.directory.display()
            ))
        };

        fs::create_dir_all(&self.directory).await.map_err(write_error)?;
        let path = self.signal_path(key);
        let staging = path.with_extension(format!("signal.{}", std::process::id()));
        fs::write(&staging, at.to_rfc3339()).await.map_err(write_error)?;
        fs::rename(&staging, &path).await.map_err(write_error)
    }
}
