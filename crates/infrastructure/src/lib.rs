//! 基础设施实现
//!
//! 传输层、锁与信号存储、缓存、事件分发、消息总线以及任务序列化。

pub mod cache_store;
pub mod event_dispatcher;
pub mod lock_store;
pub mod message_bus;
pub mod resource_monitor;
pub mod serializer;
pub mod signal_store;
pub mod transport;

pub use cache_store::InMemoryCacheStore;
pub use event_dispatcher::{BroadcastEventDispatcher, NullEventDispatcher, TracingEventDispatcher};
pub use lock_store::{FileLockStore, InMemoryLockStore};
pub use message_bus::{InMemoryMessageBus, LoggingNotifier};
pub use serializer::JsonTaskSerializer;
pub use signal_store::{CacheSignalStore, FileSignalStore, InMemorySignalStore};
pub use transport::*;
