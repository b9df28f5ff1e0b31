use async_trait::async_trait;
use tracing::{debug, warn};

use cadence_core::{traits::Runner, Output, SchedulerResult, Task, TaskKind};

use super::RunnerRegistry;

/// 依次执行子任务
///
/// 遇到第一个失败的子任务即停止，整体返回错误输出。
/// 子任务由构造时传入的注册表执行，之后注册的 Runner 对其不可见。
#[derive(Clone)]
pub struct ChainedRunner {
    registry: RunnerRegistry,
}

impl ChainedRunner {
    pub fn new(registry: RunnerRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Runner for ChainedRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Chained { .. })
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskKind::Chained { tasks } = &task.kind else {
            return Ok(Output::error(task.clone(), None));
        };

        let mut outputs = Vec::with_capacity(tasks.len());
        for sub_task in tasks {
            let result = match self.registry.find(sub_task) {
                Ok(runner) => runner.run(sub_task).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(output) if output.is_success() => {
                    debug!("子任务 {} 执行成功 (链: {})", sub_task.name(), task.name());
                    if let Some(text) = output.output {
                        outputs.push(text);
                    }
                }
                Ok(output) => {
                    warn!("子任务 {} 执行失败，链 {} 终止", sub_task.name(), task.name());
                    let reason = output.output.unwrap_or_default();
                    return Ok(Output::error(
                        task.clone(),
                        Some(format!("子任务 {} 失败: {}", sub_task.name(), reason)),
                    ));
                }
                Err(e) => {
                    warn!("子任务 {} 执行出错，链 {} 终止: {}", sub_task.name(), task.name(), e);
                    return Ok(Output::error(
                        task.clone(),
                        Some(format!("子任务 {} 失败: {}", sub_task.name(), e)),
                    ));
                }
            }
        }

        let output = (!outputs.is_empty()).then(|| outputs.join("\n"));
        Ok(Output::success(task.clone(), output))
    }

    fn name(&self) -> &str {
        "chained"
    }
}
