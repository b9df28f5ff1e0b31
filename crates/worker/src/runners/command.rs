use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use cadence_core::{traits::Runner, Output, SchedulerError, SchedulerResult, Task, TaskKind};

/// 应用内命令
///
/// 返回值为命令的输出，`Err` 会被转换为错误输出。
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(
        &self,
        arguments: &[String],
        options: &BTreeMap<String, String>,
    ) -> SchedulerResult<Option<String>>;
}

/// 按名称调用已注册的应用内命令
#[derive(Clone, Default)]
pub struct CommandRunner {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.register(handler);
        self
    }

    /// 同名命令后注册者覆盖先注册者
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

#[async_trait]
impl Runner for CommandRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Command { .. })
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskKind::Command {
            command,
            arguments,
            options,
        } = &task.kind
        else {
            return Ok(Output::error(task.clone(), None));
        };

        let handler = self.handlers.get(command).ok_or_else(|| {
            SchedulerError::InvalidArgument(format!("命令 {command} 未注册"))
        })?;

        info!("执行命令任务: task={}, command={}", task.name(), command);
        match handler.handle(arguments, options).await {
            Ok(output) => Ok(Output::success(task.clone(), output)),
            Err(e) => Ok(Output::error(task.clone(), Some(e.to_string()))),
        }
    }

    fn name(&self) -> &str {
        "command"
    }
}
