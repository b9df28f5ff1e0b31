use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// 内置调度策略名称
pub const KNOWN_POLICIES: [&str; 9] = [
    "first_in_first_out",
    "first_in_last_out",
    "round_robin",
    "deadline",
    "idle",
    "nice",
    "memory_usage",
    "execution_duration",
    "batch",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub timezone: String,
    pub transport_dsn: String,
    pub execution_policy: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            transport_dsn: "memory://first_in_first_out".to_string(),
            execution_policy: "first_in_first_out".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timezone.parse::<Tz>().is_err() {
            return Err(anyhow::anyhow!("无效的时区: {}", self.timezone));
        }

        if self.transport_dsn.trim().is_empty() {
            return Err(anyhow::anyhow!("传输层DSN不能为空"));
        }

        if !KNOWN_POLICIES.contains(&self.execution_policy.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的调度策略: {}，支持的策略: {:?}",
                self.execution_policy,
                KNOWN_POLICIES
            ));
        }

        Ok(())
    }

    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(Tz::UTC)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// 每分钟边界之后额外等待的秒数
    pub sleep_duration_delay: u64,
    pub sleep_until_next_minute: bool,
    pub retrieve_tasks_lazily: bool,
    pub strict_date_check: bool,
    pub task_limit: Option<usize>,
    pub time_limit_seconds: Option<u64>,
    pub failure_limit: Option<usize>,
    pub concurrency: usize,
    pub stop_on_signal: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sleep_duration_delay: 1,
            sleep_until_next_minute: true,
            retrieve_tasks_lazily: false,
            strict_date_check: false,
            task_limit: None,
            time_limit_seconds: None,
            failure_limit: None,
            concurrency: 1,
            stop_on_signal: true,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency == 0 {
            return Err(anyhow::anyhow!("并发数必须大于0"));
        }

        if self.task_limit == Some(0) {
            return Err(anyhow::anyhow!("任务数量上限必须大于0"));
        }

        if self.time_limit_seconds == Some(0) {
            return Err(anyhow::anyhow!("运行时间上限必须大于0"));
        }

        if self.failure_limit == Some(0) {
            return Err(anyhow::anyhow!("失败次数上限必须大于0"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LockStoreKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LockConfig {
    pub store: LockStoreKind,
    pub path: Option<String>,
}

impl LockConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store == LockStoreKind::File
            && self.path.as_deref().map_or(true, |p| p.trim().is_empty())
        {
            return Err(anyhow::anyhow!("文件锁需要配置 lock.path"));
        }
        Ok(())
    }
}
