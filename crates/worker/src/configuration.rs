use std::time::Duration;

use cadence_core::{Task, WorkerConfig};
use cadence_dispatcher::FIRST_IN_FIRST_OUT;

/// Worker 停止条件
///
/// 在每批任务开始前以及每个任务结束后检查，任一条件满足即停止。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopConditions {
    /// 成功执行的任务数达到上限
    pub task_limit: Option<usize>,
    /// 运行时间达到上限
    pub time_limit: Option<Duration>,
    /// 失败次数达到上限
    pub failure_limit: Option<usize>,
    /// 收到 SIGINT/SIGTERM 时停止
    pub stop_on_signal: bool,
    /// 信号存储中的停止时间戳晚于启动时间时停止
    pub stop_on_next_task_signal: bool,
}

/// 单次 `execute` 的运行参数
///
/// 通过 [`WorkerConfiguration::create`] 与 `with_*` 方法构造，
/// 运行期间只由 Worker 修改。
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfiguration {
    sleep_duration_delay: u64,
    sleep_until_next_minute: bool,
    should_retrieve_tasks_lazily: bool,
    is_strictly_checking_date: bool,
    execution_policy: String,
    concurrency: usize,
    stop_conditions: StopConditions,
    pub(crate) should_stop: bool,
    pub(crate) is_running: bool,
    pub(crate) forked_from: Option<String>,
    pub(crate) is_fork: bool,
    pub(crate) executed_tasks_count: usize,
    pub(crate) currently_executed_task: Option<Task>,
    pub(crate) last_executed_task: Option<Task>,
}

impl WorkerConfiguration {
    pub fn create() -> Self {
        Self {
            sleep_duration_delay: 1,
            sleep_until_next_minute: false,
            should_retrieve_tasks_lazily: false,
            is_strictly_checking_date: false,
            execution_policy: FIRST_IN_FIRST_OUT.to_string(),
            concurrency: 1,
            stop_conditions: StopConditions::default(),
            should_stop: false,
            is_running: false,
            forked_from: None,
            is_fork: false,
            executed_tasks_count: 0,
            currently_executed_task: None,
            last_executed_task: None,
        }
    }

    /// 由配置文件中的 `[worker]` 段构造
    pub fn from_config(config: &WorkerConfig, execution_policy: &str) -> Self {
        Self::create()
            .with_sleep_duration_delay(config.sleep_duration_delay)
            .with_sleep_until_next_minute(config.sleep_until_next_minute)
            .with_lazy_retrieval(config.retrieve_tasks_lazily)
            .with_strict_date_check(config.strict_date_check)
            .with_execution_policy(execution_policy)
            .with_concurrency(config.concurrency)
            .with_stop_conditions(StopConditions {
                task_limit: config.task_limit,
                time_limit: config.time_limit_seconds.map(Duration::from_secs),
                failure_limit: config.failure_limit,
                stop_on_signal: config.stop_on_signal,
                stop_on_next_task_signal: true,
            })
    }

    pub fn with_sleep_duration_delay(mut self, seconds: u64) -> Self {
        self.sleep_duration_delay = seconds;
        self
    }

    pub fn with_sleep_until_next_minute(mut self, enabled: bool) -> Self {
        self.sleep_until_next_minute = enabled;
        self
    }

    pub fn with_lazy_retrieval(mut self, enabled: bool) -> Self {
        self.should_retrieve_tasks_lazily = enabled;
        self
    }

    pub fn with_strict_date_check(mut self, enabled: bool) -> Self {
        self.is_strictly_checking_date = enabled;
        self
    }

    pub fn with_execution_policy(mut self, policy: impl Into<String>) -> Self {
        self.execution_policy = policy.into();
        self
    }

    /// 1 表示顺序执行
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_stop_conditions(mut self, stop_conditions: StopConditions) -> Self {
        self.stop_conditions = stop_conditions;
        self
    }

    pub fn with_task_limit(mut self, limit: usize) -> Self {
        self.stop_conditions.task_limit = Some(limit);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.stop_conditions.time_limit = Some(limit);
        self
    }

    pub fn with_failure_limit(mut self, limit: usize) -> Self {
        self.stop_conditions.failure_limit = Some(limit);
        self
    }

    pub fn sleep_duration_delay(&self) -> u64 {
        self.sleep_duration_delay
    }

    pub fn is_sleeping_until_next_minute(&self) -> bool {
        self.sleep_until_next_minute
    }

    pub fn should_retrieve_tasks_lazily(&self) -> bool {
        self.should_retrieve_tasks_lazily
    }

    pub fn is_strictly_checking_date(&self) -> bool {
        self.is_strictly_checking_date
    }

    pub fn execution_policy(&self) -> &str {
        &self.execution_policy
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn stop_conditions(&self) -> &StopConditions {
        &self.stop_conditions
    }

    pub fn should_stop(&self) -> bool {
        self.should_stop
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn forked_from(&self) -> Option<&str> {
        self.forked_from.as_deref()
    }

    pub fn is_fork(&self) -> bool {
        self.is_fork
    }

    pub fn executed_tasks_count(&self) -> usize {
        self.executed_tasks_count
    }

    pub fn currently_executed_task(&self) -> Option<&Task> {
        self.currently_executed_task.as_ref()
    }

    pub fn last_executed_task(&self) -> Option<&Task> {
        self.last_executed_task.as_ref()
    }
}

impl Default for WorkerConfiguration {
    fn default() -> Self {
        Self::create()
    }
}
