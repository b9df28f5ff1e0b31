use serde::{Deserialize, Serialize};

use crate::models::task::Task;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    Success,
    Error,
}

/// Runner 的执行结果
///
/// `Error` 类型的输出只会把任务标记为 `Errored`，不会产生失败任务记录。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Output {
    pub task: Task,
    pub output: Option<String>,
    pub output_type: OutputType,
}

impl Output {
    pub fn success(task: Task, output: Option<String>) -> Self {
        Self {
            task,
            output,
            output_type: OutputType::Success,
        }
    }

    pub fn error(task: Task, output: Option<String>) -> Self {
        Self {
            task,
            output,
            output_type: OutputType::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.output_type, OutputType::Success)
    }
}
