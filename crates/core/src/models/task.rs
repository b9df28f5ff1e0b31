use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SchedulerError, SchedulerResult};

pub const DEFAULT_EXPRESSION: &str = "* * * * *";
pub const REBOOT_EXPRESSION: &str = "@reboot";
pub const MIN_PRIORITY: i32 = -1000;
pub const MAX_PRIORITY: i32 = 1000;
pub const MIN_NICE: i32 = -20;
pub const MAX_NICE: i32 = 19;

/// 具有唯一名称的条目，`TaskList` 以名称为键
pub trait NamedTask {
    fn name(&self) -> &str;
}

/// 任务状态
///
/// - `Enabled`: 可以被调度和执行
/// - `Paused`: 暂停，Worker 会跳过
/// - `Disabled`: 禁用，Worker 会跳过
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Enabled,
    Paused,
    Disabled,
}

/// 任务执行状态
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    NotExecuted,
    Running,
    Succeed,
    Done,
    Incomplete,
    Errored,
    ToRetry,
}

impl ExecutionState {
    /// Runner 主动设置的状态，执行结束后不会被覆盖
    pub fn is_pending_retry(&self) -> bool {
        matches!(self, Self::Incomplete | Self::ToRetry)
    }
}

fn default_http_method() -> String {
    "GET".to_string()
}

/// 任务类型
///
/// 每种类型携带各自的执行参数，Runner 通过 `support` 判断能否执行。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Null,
    Shell {
        command: String,
        #[serde(default)]
        arguments: Vec<String>,
        #[serde(default)]
        working_dir: Option<String>,
        #[serde(default)]
        environment: BTreeMap<String, String>,
    },
    Command {
        command: String,
        #[serde(default)]
        arguments: Vec<String>,
        #[serde(default)]
        options: BTreeMap<String, String>,
    },
    Http {
        url: String,
        #[serde(default = "default_http_method")]
        method: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default)]
        body: Option<String>,
    },
    Messenger {
        message: serde_json::Value,
    },
    Notification {
        subject: String,
        #[serde(default)]
        recipients: Vec<String>,
    },
    Chained {
        tasks: Vec<Task>,
    },
    Probe {
        external_probe_path: String,
        #[serde(default)]
        error_on_failed_tasks: bool,
        /// 请求前等待的毫秒数
        #[serde(default)]
        delay: u64,
    },
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Null => "null",
            TaskKind::Shell { .. } => "shell",
            TaskKind::Command { .. } => "command",
            TaskKind::Http { .. } => "http",
            TaskKind::Messenger { .. } => "messenger",
            TaskKind::Notification { .. } => "notification",
            TaskKind::Chained { .. } => "chained",
            TaskKind::Probe { .. } => "probe",
        }
    }
}

fn default_expression() -> String {
    DEFAULT_EXPRESSION.to_string()
}

fn default_true() -> bool {
    true
}

/// 任务定义
///
/// 可调度执行的任务单元。`name` 在单个传输层内唯一，创建后不可修改。
///
/// # 使用示例
///
/// ```rust
/// use cadence_core::models::{Task, TaskKind};
///
/// let task = Task::with_kind(
///     "backup",
///     TaskKind::Shell {
///         command: "backup.sh".to_string(),
///         arguments: vec![],
///         working_dir: None,
///         environment: Default::default(),
///     },
/// )
/// .unwrap()
/// .with_expression("0 2 * * *"); // 每天凌晨2点
///
/// assert_eq!(task.name(), "backup");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    name: String,
    #[serde(default)]
    pub kind: TaskKind,
    #[serde(default = "default_expression")]
    pub expression: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: TaskState,
    #[serde(default)]
    pub execution_state: ExecutionState,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    nice: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_execution: Option<DateTime<Utc>>,
    #[serde(default)]
    pub arrival_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_end_date: Option<DateTime<Utc>>,
    /// 执行耗时（毫秒）
    #[serde(default)]
    pub execution_computation_time: Option<f64>,
    /// 执行期间的内存增量（字节）
    #[serde(default)]
    pub execution_memory_usage: Option<u64>,
    /// 建议的最长执行时间（秒），由 Runner 参考
    #[serde(default)]
    pub max_duration: Option<f64>,
    /// 调用 Runner 前的延迟（毫秒）
    #[serde(default)]
    pub execution_delay: Option<u64>,
    #[serde(default)]
    pub max_executions: Option<u32>,
    /// Runner 返回错误后的重试次数
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// 成功执行的累计次数，达到 `max_executions` 后不再执行
    #[serde(default)]
    pub execution_count: u32,
    #[serde(default)]
    pub access_lock_key: Option<String>,
    #[serde(default)]
    pub output: bool,
    #[serde(default)]
    pub store_output: bool,
    /// 开启 `store_output` 时保存的最近一次输出
    #[serde(default)]
    pub last_output: Option<String>,
    #[serde(default = "default_true")]
    pub tracked: bool,
    #[serde(default)]
    pub single_run: bool,
    #[serde(default)]
    pub delete_after_execute: bool,
}

impl Task {
    /// 创建空任务（`TaskKind::Null`）
    pub fn new(name: impl Into<String>) -> SchedulerResult<Self> {
        Self::with_kind(name, TaskKind::Null)
    }

    /// 创建指定类型的任务
    pub fn with_kind(name: impl Into<String>, kind: TaskKind) -> SchedulerResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SchedulerError::InvalidArgument(
                "任务名称不能为空".to_string(),
            ));
        }

        Ok(Self {
            name,
            kind,
            expression: default_expression(),
            timezone: None,
            description: None,
            state: TaskState::Enabled,
            execution_state: ExecutionState::NotExecuted,
            priority: 0,
            nice: None,
            tags: Vec::new(),
            scheduled_at: None,
            last_execution: None,
            arrival_time: None,
            execution_start_time: None,
            execution_end_time: None,
            execution_start_date: None,
            execution_end_date: None,
            execution_computation_time: None,
            execution_memory_usage: None,
            max_duration: None,
            execution_delay: None,
            max_executions: None,
            max_retries: None,
            execution_count: 0,
            access_lock_key: None,
            output: false,
            store_output: false,
            last_output: None,
            tracked: true,
            single_run: false,
            delete_after_execute: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否已达到最大执行次数
    pub fn has_reached_max_executions(&self) -> bool {
        self.max_executions
            .is_some_and(|max| self.execution_count >= max)
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.add_tag(tag);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> SchedulerResult<Self> {
        self.set_priority(priority)?;
        Ok(self)
    }

    pub fn with_nice(mut self, nice: i32) -> SchedulerResult<Self> {
        self.set_nice(nice)?;
        Ok(self)
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) -> SchedulerResult<()> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(SchedulerError::InvalidArgument(format!(
                "优先级必须在 {MIN_PRIORITY} 到 {MAX_PRIORITY} 之间，当前值: {priority}"
            )));
        }
        self.priority = priority;
        Ok(())
    }

    pub fn nice(&self) -> Option<i32> {
        self.nice
    }

    pub fn set_nice(&mut self, nice: i32) -> SchedulerResult<()> {
        if !(MIN_NICE..=MAX_NICE).contains(&nice) {
            return Err(SchedulerError::InvalidArgument(format!(
                "nice 值必须在 {MIN_NICE} 到 {MAX_NICE} 之间，当前值: {nice}"
            )));
        }
        self.nice = Some(nice);
        Ok(())
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn first_tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.state, TaskState::Enabled)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, TaskState::Paused)
    }

    pub fn is_reboot_task(&self) -> bool {
        self.expression.trim() == REBOOT_EXPRESSION
    }

    /// 执行锁的键，未显式设置时由任务名称派生
    pub fn lock_key(&self) -> String {
        self.access_lock_key
            .clone()
            .unwrap_or_else(|| format!("_cadence_task_{}", self.name))
    }

    /// `now` 是否落在 `execution_start_date`..=`execution_end_date` 之内
    pub fn is_within_execution_window(&self, now: DateTime<Utc>) -> bool {
        if let Some(start) = self.execution_start_date {
            if now < start {
                return false;
            }
        }
        if let Some(end) = self.execution_end_date {
            if now > end {
                return false;
            }
        }
        true
    }

    /// 检查反序列化得到的任务是否满足约束
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.name.trim().is_empty() {
            return Err(SchedulerError::InvalidArgument(
                "任务名称不能为空".to_string(),
            ));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(SchedulerError::InvalidArgument(format!(
                "任务 {} 的优先级超出范围: {}",
                self.name, self.priority
            )));
        }
        if let Some(nice) = self.nice {
            if !(MIN_NICE..=MAX_NICE).contains(&nice) {
                return Err(SchedulerError::InvalidArgument(format!(
                    "任务 {} 的 nice 值超出范围: {nice}",
                    self.name
                )));
            }
        }
        if let (Some(start), Some(end)) = (self.execution_start_date, self.execution_end_date) {
            if start > end {
                return Err(SchedulerError::InvalidArgument(format!(
                    "任务 {} 的执行开始日期晚于结束日期",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

impl NamedTask for Task {
    fn name(&self) -> &str {
        &self.name
    }
}
