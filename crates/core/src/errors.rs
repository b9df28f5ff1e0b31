use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("任务未找到: {name}")]
    TaskNotFound { name: String },

    #[error("任务已被调度: {name}")]
    TaskAlreadyScheduled { name: String },

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("非法状态: {0}")]
    Logic(String),

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    UndefinedRunner(String),

    #[error("未找到调度策略: {policy}")]
    PolicyNotFound { policy: String },

    #[error("无效的调度表达式: {expr} - {message}")]
    InvalidExpression { expr: String, message: String },

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("锁错误: {0}")]
    Lock(String),
}

impl SchedulerError {
    pub fn task_not_found(name: impl Into<String>) -> Self {
        Self::TaskNotFound { name: name.into() }
    }

    pub fn already_scheduled(name: impl Into<String>) -> Self {
        Self::TaskAlreadyScheduled { name: name.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// 存储层错误统一转换为传输错误，保留原始信息
    pub fn from_backend(error: impl std::fmt::Display) -> Self {
        Self::Transport(error.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TaskNotFound { .. })
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
