//! 生命周期事件
//!
//! 调度器与 Worker 在关键节点发布的事件，由外部监听者消费（日志、指标等）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FailedTask, Output, Task};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    TaskScheduled {
        task: Task,
        occurred_at: DateTime<Utc>,
    },
    TaskUnscheduled {
        task_name: String,
        occurred_at: DateTime<Utc>,
    },
    TaskExecuting {
        task: Task,
        occurred_at: DateTime<Utc>,
    },
    TaskExecuted {
        task: Task,
        output: Output,
        occurred_at: DateTime<Utc>,
    },
    TaskFailed {
        failed: FailedTask,
        occurred_at: DateTime<Utc>,
    },
    SchedulerRebooted {
        task_names: Vec<String>,
        occurred_at: DateTime<Utc>,
    },
    WorkerStarted {
        occurred_at: DateTime<Utc>,
    },
    WorkerRunning {
        idle: bool,
        occurred_at: DateTime<Utc>,
    },
    WorkerSleeping {
        sleep_seconds: u64,
        occurred_at: DateTime<Utc>,
    },
    WorkerForked {
        forked_from: String,
        occurred_at: DateTime<Utc>,
    },
    WorkerRestarted {
        occurred_at: DateTime<Utc>,
    },
    WorkerStopped {
        executed_tasks: usize,
        occurred_at: DateTime<Utc>,
    },
}

impl SchedulerEvent {
    pub fn task_scheduled(task: &Task) -> Self {
        Self::TaskScheduled {
            task: task.clone(),
            occurred_at: Utc::now(),
        }
    }

    pub fn task_unscheduled(task_name: &str) -> Self {
        Self::TaskUnscheduled {
            task_name: task_name.to_string(),
            occurred_at: Utc::now(),
        }
    }

    pub fn task_executing(task: &Task) -> Self {
        Self::TaskExecuting {
            task: task.clone(),
            occurred_at: Utc::now(),
        }
    }

    pub fn task_executed(task: &Task, output: &Output) -> Self {
        Self::TaskExecuted {
            task: task.clone(),
            output: output.clone(),
            occurred_at: Utc::now(),
        }
    }

    pub fn task_failed(failed: &FailedTask) -> Self {
        Self::TaskFailed {
            failed: failed.clone(),
            occurred_at: Utc::now(),
        }
    }

    pub fn worker_started() -> Self {
        Self::WorkerStarted {
            occurred_at: Utc::now(),
        }
    }

    pub fn worker_stopped(executed_tasks: usize) -> Self {
        Self::WorkerStopped {
            executed_tasks,
            occurred_at: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            SchedulerEvent::TaskScheduled { .. } => "TaskScheduled",
            SchedulerEvent::TaskUnscheduled { .. } => "TaskUnscheduled",
            SchedulerEvent::TaskExecuting { .. } => "TaskExecuting",
            SchedulerEvent::TaskExecuted { .. } => "TaskExecuted",
            SchedulerEvent::TaskFailed { .. } => "TaskFailed",
            SchedulerEvent::SchedulerRebooted { .. } => "SchedulerRebooted",
            SchedulerEvent::WorkerStarted { .. } => "WorkerStarted",
            SchedulerEvent::WorkerRunning { .. } => "WorkerRunning",
            SchedulerEvent::WorkerSleeping { .. } => "WorkerSleeping",
            SchedulerEvent::WorkerForked { .. } => "WorkerForked",
            SchedulerEvent::WorkerRestarted { .. } => "WorkerRestarted",
            SchedulerEvent::WorkerStopped { .. } => "WorkerStopped",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SchedulerEvent::TaskScheduled { occurred_at, .. }
            | SchedulerEvent::TaskUnscheduled { occurred_at, .. }
            | SchedulerEvent::TaskExecuting { occurred_at, .. }
            | SchedulerEvent::TaskExecuted { occurred_at, .. }
            | SchedulerEvent::TaskFailed { occurred_at, .. }
            | SchedulerEvent::SchedulerRebooted { occurred_at, .. }
            | SchedulerEvent::WorkerStarted { occurred_at }
            | SchedulerEvent::WorkerRunning { occurred_at, .. }
            | SchedulerEvent::WorkerSleeping { occurred_at, .. }
            | SchedulerEvent::WorkerForked { occurred_at, .. }
            | SchedulerEvent::WorkerRestarted { occurred_at }
            | SchedulerEvent::WorkerStopped { occurred_at, .. } => *occurred_at,
        }
    }

    /// 事件关联的任务名称（Worker 事件没有）
    pub fn task_name(&self) -> Option<&str> {
        match self {
            SchedulerEvent::TaskScheduled { task, .. }
            | SchedulerEvent::TaskExecuting { task, .. }
            | SchedulerEvent::TaskExecuted { task, .. } => Some(task.name()),
            SchedulerEvent::TaskUnscheduled { task_name, .. } => Some(task_name),
            SchedulerEvent::TaskFailed { failed, .. } => Some(failed.task().name()),
            _ => None,
        }
    }
}
