//! 共享存储接口
//!
//! - `LockStore`: 按任务加锁，防止同名任务在多个 Worker 上同时执行
//! - `SignalStore`: 跨进程的停止信号（时间戳），由 Worker 轮询
//! - `CacheStore`: 通用键值缓存，供缓存传输层与信号存储使用

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::SchedulerResult;

/// 请求 Worker 在当前任务结束后停止的信号键
pub const STOP_NEXT_TASK_KEY: &str = "worker.stop_next_task.timestamp";

/// 任务锁存储
#[async_trait]
pub trait LockStore: Send + Sync {
    /// 尝试获取锁，已被占用时返回 false
    async fn acquire(&self, key: &str) -> SchedulerResult<bool>;

    /// 释放锁，锁不存在时静默成功
    async fn release(&self, key: &str) -> SchedulerResult<()>;
}

/// 停止信号存储
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn get(&self, key: &str) -> SchedulerResult<Option<DateTime<Utc>>>;

    async fn set(&self, key: &str, at: DateTime<Utc>) -> SchedulerResult<()>;

    /// 请求正在运行的 Worker 在当前任务结束后停止
    async fn request_stop_next_task(&self, at: DateTime<Utc>) -> SchedulerResult<()> {
        self.set(STOP_NEXT_TASK_KEY, at).await
    }
}

/// 键值缓存
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> SchedulerResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> SchedulerResult<()>;

    async fn delete(&self, key: &str) -> SchedulerResult<()>;

    async fn has(&self, key: &str) -> SchedulerResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
