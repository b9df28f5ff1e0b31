//! 任务传输层接口定义
//!
//! 传输层负责任务定义的持久化与访问，是任务状态的唯一所有者。
//!
//! ## 实现分类
//!
//! ### 简单传输层
//! 直接操作存储后端，例如内存、文件系统或缓存。
//!
//! ### 组合传输层
//! 在一组传输层之上提供路由与容错（故障转移、轮询、长尾、延迟初始化），
//! 对外暴露与简单传输层相同的接口。
//!
//! ## 错误约定
//!
//! - `create` 名称重复时返回 `TaskAlreadyScheduled`
//! - `get`/`update`/`delete`/`pause`/`resume` 找不到任务时返回 `TaskNotFound`
//! - 重复暂停或恢复返回 `Logic`
//! - 后端故障统一转换为 `Transport`
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use cadence_core::traits::Transport;
//! use cadence_core::models::Task;
//!
//! async fn register(transport: &dyn Transport) -> SchedulerResult<()> {
//!     transport.create(Task::new("foo")?).await?;
//!     transport.pause("foo").await?;
//!     let tasks = transport.list().await?;
//!     println!("任务数量: {}", tasks.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;

use crate::models::{LazyTask, LazyTaskList, Task, TaskList};
use crate::SchedulerResult;

/// 任务传输层接口
#[async_trait]
pub trait Transport: Send + Sync {
    /// 获取任务
    async fn get(&self, name: &str) -> SchedulerResult<Task>;

    /// 获取延迟加载的任务
    ///
    /// 默认实现立即加载，能够真正延迟的传输层应当覆盖此方法。
    async fn get_lazy(&self, name: &str) -> SchedulerResult<LazyTask> {
        Ok(LazyTask::from_task(self.get(name).await?))
    }

    /// 列出全部任务
    async fn list(&self) -> SchedulerResult<TaskList>;

    /// 列出延迟加载的任务
    async fn list_lazy(&self) -> SchedulerResult<LazyTaskList> {
        Ok(self.list().await?.into())
    }

    /// 创建任务
    async fn create(&self, task: Task) -> SchedulerResult<()>;

    /// 更新任务
    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()>;

    /// 删除任务
    async fn delete(&self, name: &str) -> SchedulerResult<()>;

    /// 暂停任务
    async fn pause(&self, name: &str) -> SchedulerResult<()>;

    /// 恢复任务
    async fn resume(&self, name: &str) -> SchedulerResult<()>;

    /// 清空所有任务
    async fn clear(&self) -> SchedulerResult<()>;

    /// 当前任务数量
    async fn count(&self) -> SchedulerResult<usize> {
        Ok(self.list().await?.len())
    }

    /// 获取传输层名称
    fn name(&self) -> &str;
}
