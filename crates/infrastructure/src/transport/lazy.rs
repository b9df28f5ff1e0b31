use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use cadence_core::{
    models::{LazyTask, LazyTaskList, Task, TaskList},
    traits::Transport,
    SchedulerError, SchedulerResult,
};

/// 创建内部传输层的工厂
pub type TransportBuilder = Arc<dyn Fn() -> SchedulerResult<Arc<dyn Transport>> + Send + Sync>;

/// 延迟初始化的传输层
///
/// 内部传输层在第一次调用任意操作时才创建，此后 `is_initialized` 始终为 true。
pub struct LazyTransport {
    builder: TransportBuilder,
    transport: OnceCell<Arc<dyn Transport>>,
}

impl LazyTransport {
    /// 包装已有的传输层
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::from_builder(Arc::new(move || -> SchedulerResult<Arc<dyn Transport>> {
            Ok(transport.clone())
        }))
    }

    pub fn from_builder(builder: TransportBuilder) -> Self {
        Self {
            builder,
            transport: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.transport.initialized()
    }

    async fn inner(&self) -> SchedulerResult<&Arc<dyn Transport>> {
        self.transport
            .get_or_try_init(|| async {
                let transport = (self.builder)()?;
                debug!("延迟传输层已初始化: {}", transport.name());
                Ok::<_, SchedulerError>(transport)
            })
            .await
    }
}

#[async_trait]
impl Transport for LazyTransport {
    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.inner().await?.get(name).await
    }

    async fn get_lazy(&self, name: &str) -> SchedulerResult<LazyTask> {
        self.inner().await?.get_lazy(name).await
    }

    async fn list(&self) -> SchedulerResult<TaskList> {
        self.inner().await?.list().await
    }

    async fn list_lazy(&self) -> SchedulerResult<LazyTaskList> {
        self.inner().await?.list_lazy().await
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        self.inner().await?.create(task).await
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        self.inner().await?.update(name, task).await
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        self.inner().await?.delete(name).await
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        self.inner().await?.pause(name).await
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        self.inner().await?.resume(name).await
    }

    async fn clear(&self) -> SchedulerResult<()> {
        self.inner().await?.clear().await
    }

    async fn count(&self) -> SchedulerResult<usize> {
        self.inner().await?.count().await
    }

    fn name(&self) -> &str {
        "lazy"
    }
}
