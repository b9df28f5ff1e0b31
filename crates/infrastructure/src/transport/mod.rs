//! 任务传输层实现
//!
//! ## 简单传输层
//! - [`InMemoryTransport`]: 进程内存储，适合测试与嵌入式部署
//! - [`FilesystemTransport`]: 每个任务一个 JSON 文件
//! - [`CacheTransport`]: 基于 [`CacheStore`](cadence_core::traits::CacheStore) 的键值存储
//!
//! ## 组合传输层
//! - [`FailoverTransport`]: 按顺序尝试，第一个成功者胜出
//! - [`RoundRobinTransport`]: 在故障转移基础上轮换起始成员
//! - [`LongTailTransport`]: 优先使用任务最少的成员
//! - [`LazyTransport`]: 首次使用时才创建内部传输层
//!
//! 也可以通过 [`TransportFactory`] 从 DSN 字符串构造，例如
//! `failover://(memory://first_in_first_out || fs://idle?path=/var/lib/cadence)`。

mod cache;
mod composite;
mod dsn;
mod factory;
mod failover;
mod filesystem;
mod in_memory;
mod lazy;
mod long_tail;
mod round_robin;

pub use cache::CacheTransport;
pub use composite::{CompositeTransport, MemberSelection, ALL_TRANSPORTS_FAILED, NO_TRANSPORT_FOUND};
pub use dsn::Dsn;
pub use factory::TransportFactory;
pub use failover::{FailoverTransport, InOrder};
pub use filesystem::FilesystemTransport;
pub use in_memory::InMemoryTransport;
pub use lazy::{LazyTransport, TransportBuilder};
pub use long_tail::{FewestTasks, LongTailTransport};
pub use round_robin::{Rotation, RoundRobinTransport, DEFAULT_QUANTUM};

use std::sync::Arc;

use cadence_core::{models::Task, SchedulerError, SchedulerResult, TaskList, TaskState};
use cadence_dispatcher::SchedulePolicyOrchestrator;

/// 简单传输层的默认执行模式
pub const DEFAULT_EXECUTION_MODE: &str = cadence_dispatcher::FIRST_IN_FIRST_OUT;

/// 简单传输层共享的排序设置
///
/// `list` 的结果交给编排器按 `execution_mode` 排序；没有编排器时保持存储顺序。
#[derive(Clone)]
pub struct ListOrdering {
    execution_mode: String,
    orchestrator: Option<Arc<SchedulePolicyOrchestrator>>,
}

impl ListOrdering {
    pub fn new(
        execution_mode: impl Into<String>,
        orchestrator: Option<Arc<SchedulePolicyOrchestrator>>,
    ) -> SchedulerResult<Self> {
        let execution_mode = execution_mode.into();
        if let Some(orchestrator) = &orchestrator {
            if !orchestrator.support(&execution_mode) {
                return Err(SchedulerError::InvalidArgument(format!(
                    "不支持的执行模式: {execution_mode}"
                )));
            }
        }
        Ok(Self {
            execution_mode,
            orchestrator,
        })
    }

    /// 不排序，保持存储顺序
    pub fn unordered() -> Self {
        Self {
            execution_mode: DEFAULT_EXECUTION_MODE.to_string(),
            orchestrator: None,
        }
    }

    pub fn execution_mode(&self) -> &str {
        &self.execution_mode
    }

    pub fn is_sorting(&self) -> bool {
        self.orchestrator.is_some()
    }

    pub fn apply(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
        match &self.orchestrator {
            Some(orchestrator) => orchestrator.sort(&self.execution_mode, tasks),
            None => Ok(tasks),
        }
    }
}

impl Default for ListOrdering {
    fn default() -> Self {
        Self {
            execution_mode: DEFAULT_EXECUTION_MODE.to_string(),
            orchestrator: Some(Arc::new(SchedulePolicyOrchestrator::default())),
        }
    }
}

pub(crate) fn pause_task(task: &mut Task) -> SchedulerResult<()> {
    if task.is_paused() {
        return Err(SchedulerError::Logic(format!(
            "任务 {} 已经处于暂停状态 (already paused)",
            task.name()
        )));
    }
    task.state = TaskState::Paused;
    Ok(())
}

pub(crate) fn resume_task(task: &mut Task) -> SchedulerResult<()> {
    if task.is_enabled() {
        return Err(SchedulerError::Logic(format!(
            "任务 {} 已经处于启用状态 (already enabled)",
            task.name()
        )));
    }
    task.state = TaskState::Enabled;
    Ok(())
}

pub(crate) fn ensure_same_name(name: &str, task: &Task) -> SchedulerResult<()> {
    if task.name() != name {
        return Err(SchedulerError::InvalidArgument(format!(
            "任务名称不可修改: {} -> {}",
            name,
            task.name()
        )));
    }
    Ok(())
}
