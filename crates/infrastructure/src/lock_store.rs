//! 任务锁存储
//!
//! - [`InMemoryLockStore`]: 同一进程内的 Worker 共享
//! - [`FileLockStore`]: 以独占创建的锁文件实现，多个进程共享同一目录即可互斥

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use cadence_core::{traits::LockStore, SchedulerError, SchedulerResult};

#[derive(Debug, Default)]
pub struct InMemoryLockStore {
    held: Mutex<HashSet<String>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(key)
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn acquire(&self, key: &str) -> SchedulerResult<bool> {
        let acquired = self
            .held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string());
        Ok(acquired)
    }

    async fn release(&self, key: &str) -> SchedulerResult<()> {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
        Ok(())
    }
}

/// 文件锁存储
///
/// 每把锁对应目录下的 `<key>.lock` 文件，内容为持有者标识，键经过百分号编码。
/// 只会删除自己创建的锁文件；设置 `stale_after` 后，超时的锁文件会被接管，
/// 接管过程由 `<key>.lock.takeover` 互斥，同一把超时锁只会被一个 Worker 接管。
#[derive(Debug)]
pub struct FileLockStore {
    directory: PathBuf,
    owner: String,
    stale_after: Option<Duration>,
    tokens: Mutex<HashMap<String, String>>,
}

impl FileLockStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let host = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            directory: directory.into(),
            owner: format!("{host}:{}", std::process::id()),
            stale_after: None,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = Some(stale_after);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.lock", encode_file_key(key)))
    }

    async fn try_create(&self, path: &Path, token: &str) -> SchedulerResult<bool> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(lock_error("创建锁文件", path, e)),
        };
        file.write_all(token.as_bytes())
            .await
            .map_err(|e| lock_error("写入锁文件", path, e))?;
        Ok(true)
    }

    /// 持有接管文件期间重新确认锁已超时，再删除并重建
    async fn take_over(&self, key: &str, path: &Path, token: &str) -> SchedulerResult<bool> {
        let guard = path.with_extension("lock.takeover");
        if !self.try_create(&guard, token).await? {
            // 接管者在持有期间退出，留下的接管文件同样按超时清理
            if self.is_stale(&guard).await {
                remove_if_exists(&guard).await?;
            }
            return Ok(false);
        }

        let result = if self.is_stale(path).await {
            warn!("锁 {key} 已超时，由 {} 接管", self.owner);
            match remove_if_exists(path).await {
                Ok(()) => self.try_create(path, token).await,
                Err(e) => Err(e),
            }
        } else {
            Ok(false)
        };

        if let Err(e) = remove_if_exists(&guard).await {
            warn!("删除接管文件失败: {e}");
        }
        result
    }

    async fn is_stale(&self, path: &Path) -> bool {
        let Some(stale_after) = self.stale_after else {
            return false;
        };
        match fs::metadata(path).await.and_then(|meta| meta.modified()) {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .map(|age| age > stale_after)
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl LockStore for FileLockStore {
    async fn acquire(&self, key: &str) -> SchedulerResult<bool> {
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| lock_error("创建锁目录", &self.directory, e))?;

        let path = self.lock_path(key);
        let token = format!("{}:{}", self.owner, Uuid::new_v4());

        let mut acquired = self.try_create(&path, &token).await?;
        if !acquired && self.is_stale(&path).await {
            acquired = self.take_over(key, &path, &token).await?;
        }

        if acquired {
            debug!("已获取锁 {key}");
            self.tokens
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(key.to_string(), token);
        }
        Ok(acquired)
    }

    async fn release(&self, key: &str) -> SchedulerResult<()> {
        let token = self
            .tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
        let Some(token) = token else {
            return Ok(());
        };

        let path = self.lock_path(key);
        match fs::read_to_string(&path).await {
            Ok(content) if content == token => {}
            Ok(_) => {
                warn!("锁 {key} 已被其他 Worker 接管，跳过释放");
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(lock_error("读取锁文件", &path, e)),
        }

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(lock_error("删除锁文件", &path, e)),
        }
    }
}

/// 把任意键编码为文件名：字母、数字与 `-` `_` `.` 原样保留，其余字节写成 `%XX`
pub(crate) fn encode_file_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

async fn remove_if_exists(path: &Path) -> SchedulerResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(lock_error("删除锁文件", path, e)),
    }
}

fn lock_error(action: &str, path: &Path, error: std::io::Error) -> SchedulerError {
    SchedulerError::Lock(format!("{action}失败 ({}): {error}", path.display()))
}
