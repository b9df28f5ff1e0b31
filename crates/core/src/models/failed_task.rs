use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::task::{NamedTask, Task};

/// 执行失败的任务记录，创建后不再修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedTask {
    name: String,
    task: Task,
    reason: String,
    failed_at: DateTime<Utc>,
}

impl FailedTask {
    pub fn new(task: Task, reason: impl Into<String>) -> Self {
        Self {
            name: format!("{}.failed", task.name()),
            task,
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn into_task(self) -> Task {
        self.task
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn failed_at(&self) -> DateTime<Utc> {
        self.failed_at
    }
}

impl NamedTask for FailedTask {
    fn name(&self) -> &str {
        &self.name
    }
}
