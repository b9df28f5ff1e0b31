use async_trait::async_trait;

use cadence_core::{traits::Runner, Output, SchedulerResult, Task, TaskKind};

/// 空任务执行器，不做任何事直接成功
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRunner;

impl NullRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Runner for NullRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Null)
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        Ok(Output::success(task.clone(), None))
    }

    fn name(&self) -> &str {
        "null"
    }
}
