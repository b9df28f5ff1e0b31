use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::events::SchedulerEvent;
use crate::SchedulerResult;

/// 事件分发器，发布即忘
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, event: SchedulerEvent);
}

/// 通过消息总线投递的消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerMessage {
    /// 异步重新调度任务
    Yield { task_name: String },
    /// 任务携带的任意消息
    Payload { body: serde_json::Value },
}

/// 消息总线
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn dispatch(&self, message: SchedulerMessage) -> SchedulerResult<()>;
}

/// 通知发送接口
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, recipients: &[String]) -> SchedulerResult<()>;
}
