use std::sync::Arc;

use async_trait::async_trait;

use cadence_core::{
    traits::{MessageBus, Runner, SchedulerMessage},
    Output, SchedulerResult, Task, TaskKind,
};

/// 把任务携带的消息投递到消息总线
#[derive(Clone, Default)]
pub struct MessengerRunner {
    bus: Option<Arc<dyn MessageBus>>,
}

impl MessengerRunner {
    pub fn new(bus: Option<Arc<dyn MessageBus>>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Runner for MessengerRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Messenger { .. })
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskKind::Messenger { message } = &task.kind else {
            return Ok(Output::error(task.clone(), None));
        };
        let Some(bus) = &self.bus else {
            return Ok(Output::error(
                task.clone(),
                Some("The task cannot be handled as the bus is not defined".to_string()),
            ));
        };

        match bus
            .dispatch(SchedulerMessage::Payload {
                body: message.clone(),
            })
            .await
        {
            Ok(()) => Ok(Output::success(task.clone(), None)),
            Err(e) => Ok(Output::error(task.clone(), Some(e.to_string()))),
        }
    }

    fn name(&self) -> &str {
        "messenger"
    }
}
