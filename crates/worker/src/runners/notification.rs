use std::sync::Arc;

use async_trait::async_trait;

use cadence_core::{
    traits::{Notifier, Runner},
    Output, SchedulerResult, Task, TaskKind,
};

/// 通过 [`Notifier`] 发送通知
#[derive(Clone, Default)]
pub struct NotificationRunner {
    notifier: Option<Arc<dyn Notifier>>,
}

impl NotificationRunner {
    pub fn new(notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Runner for NotificationRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Notification { .. })
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskKind::Notification {
            subject,
            recipients,
        } = &task.kind
        else {
            return Ok(Output::error(task.clone(), None));
        };
        let Some(notifier) = &self.notifier else {
            return Ok(Output::error(
                task.clone(),
                Some("The task cannot be handled as the notifier is not defined".to_string()),
            ));
        };

        match notifier.send(subject, recipients).await {
            Ok(()) => Ok(Output::success(task.clone(), None)),
            Err(e) => Ok(Output::error(task.clone(), Some(e.to_string()))),
        }
    }

    fn name(&self) -> &str {
        "notification"
    }
}
