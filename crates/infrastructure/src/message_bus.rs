use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use cadence_core::{
    traits::{MessageBus, Notifier, SchedulerMessage},
    SchedulerError, SchedulerResult,
};

/// 内存消息总线
///
/// 使用 Tokio 无界通道，消费者通过 [`InMemoryMessageBus::receive`] 逐条取出消息，
/// 通常交给 `Scheduler::handle_message` 处理。
#[derive(Debug)]
pub struct InMemoryMessageBus {
    sender: mpsc::UnboundedSender<SchedulerMessage>,
    receiver: Mutex<mpsc::UnboundedReceiver<SchedulerMessage>>,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// 等待下一条消息
    pub async fn receive(&self) -> Option<SchedulerMessage> {
        self.receiver.lock().await.recv().await
    }

    /// 取出一条已到达的消息，不等待
    pub async fn try_receive(&self) -> Option<SchedulerMessage> {
        self.receiver.lock().await.try_recv().ok()
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn dispatch(&self, message: SchedulerMessage) -> SchedulerResult<()> {
        debug!("投递消息: {:?}", message);
        self.sender
            .send(message)
            .map_err(|e| SchedulerError::transport(format!("消息总线已关闭: {e}")))
    }
}

/// 只写日志的通知发送器
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, subject: &str, recipients: &[String]) -> SchedulerResult<()> {
        info!(subject, recipients = recipients.join(","), "发送通知");
        Ok(())
    }
}
