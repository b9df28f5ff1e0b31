//! 任务执行器
//!
//! 每种 [`TaskKind`](cadence_core::TaskKind) 对应一个 Runner，
//! Worker 通过 [`RunnerRegistry`] 选择第一个支持该任务的 Runner。

mod chained;
mod command;
mod http;
mod messenger;
mod notification;
mod null;
mod probe;
mod shell;

pub use chained::ChainedRunner;
pub use command::{CommandHandler, CommandRunner};
pub use http::HttpRunner;
pub use messenger::MessengerRunner;
pub use notification::NotificationRunner;
pub use null::NullRunner;
pub use probe::ProbeRunner;
#[cfg(test)]
pub(crate) use probe::probe_state_is_valid;
pub use shell::ShellRunner;

use std::sync::Arc;
use std::time::Duration;

use cadence_core::{traits::Runner, SchedulerError, SchedulerResult, Task};

/// 未设置 `max_duration` 时网络类 Runner 的超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 任务的建议最长执行时间
pub(crate) fn max_duration(task: &Task) -> Option<Duration> {
    task.max_duration
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .map(Duration::from_secs_f64)
}

/// Runner 注册表
#[derive(Clone, Default)]
pub struct RunnerRegistry {
    runners: Vec<Arc<dyn Runner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置的无外部依赖 Runner：null、shell、http、probe 以及组合它们的 chained
    pub fn with_builtin_runners() -> Self {
        Self::new()
            .with_runner(Arc::new(NullRunner::new()))
            .with_runner(Arc::new(ShellRunner::new()))
            .with_runner(Arc::new(HttpRunner::new()))
            .with_runner(Arc::new(ProbeRunner::new()))
            .with_chained()
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.register(runner);
        self
    }

    /// 添加一个 chained Runner，子任务由当前已注册的 Runner 执行
    pub fn with_chained(self) -> Self {
        let chained = ChainedRunner::new(self.clone());
        self.with_runner(Arc::new(chained))
    }

    pub fn register(&mut self, runner: Arc<dyn Runner>) {
        self.runners.push(runner);
    }

    /// 第一个支持该任务的 Runner
    pub fn find(&self, task: &Task) -> SchedulerResult<Arc<dyn Runner>> {
        self.runners
            .iter()
            .find(|runner| runner.support(task))
            .cloned()
            .ok_or_else(|| {
                SchedulerError::UndefinedRunner(format!(
                    "No runner found for task {} ({})",
                    task.name(),
                    task.kind.name()
                ))
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.runners.iter().map(|r| r.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}
