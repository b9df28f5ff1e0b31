use tokio::sync::broadcast;
use tracing::{debug, trace};

use cadence_core::{traits::EventDispatcher, SchedulerEvent};

/// 丢弃所有事件
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventDispatcher;

impl EventDispatcher for NullEventDispatcher {
    fn dispatch(&self, event: SchedulerEvent) {
        trace!("丢弃事件 {}", event.event_type());
    }
}

/// 基于 tokio broadcast 的事件分发器
///
/// 每个订阅者各自接收全部事件；没有订阅者时事件被丢弃，
/// 处理过慢的订阅者会丢失最早的事件。
#[derive(Debug, Clone)]
pub struct BroadcastEventDispatcher {
    sender: broadcast::Sender<SchedulerEvent>,
}

impl BroadcastEventDispatcher {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventDispatcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl EventDispatcher for BroadcastEventDispatcher {
    fn dispatch(&self, event: SchedulerEvent) {
        let event_type = event.event_type().to_string();
        if self.sender.send(event).is_err() {
            debug!("事件 {event_type} 没有订阅者");
        }
    }
}

/// 把事件写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventDispatcher;

impl EventDispatcher for TracingEventDispatcher {
    fn dispatch(&self, event: SchedulerEvent) {
        match event.task_name() {
            Some(task) => debug!(event = event.event_type(), task, "调度事件"),
            None => debug!(event = event.event_type(), "调度事件"),
        }
    }
}
