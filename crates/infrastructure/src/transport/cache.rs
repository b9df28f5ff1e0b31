use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use cadence_core::{
    models::{LazyTask, LazyTaskList, Task, TaskList},
    traits::{CacheStore, TaskSerializer, Transport},
    SchedulerError, SchedulerResult,
};

use super::{ensure_same_name, pause_task, resume_task, ListOrdering};
use crate::serializer::JsonTaskSerializer;

const INDEX_KEY: &str = "cadence.task_list";
const TASK_KEY_PREFIX: &str = "cadence.task.";

/// 缓存传输层
///
/// 任务序列化后保存在 `cadence.task.<name>` 键下，任务名称列表保存在索引键中。
/// 同一进程内的多步写操作串行执行；多个进程共享同一缓存时不保证原子性。
#[derive(Clone)]
pub struct CacheTransport {
    cache: Arc<dyn CacheStore>,
    serializer: Arc<dyn TaskSerializer>,
    ordering: ListOrdering,
    write_lock: Arc<Mutex<()>>,
}

impl CacheTransport {
    pub fn new(cache: Arc<dyn CacheStore>, ordering: ListOrdering) -> Self {
        Self {
            cache,
            serializer: Arc::new(JsonTaskSerializer::new()),
            ordering,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn TaskSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    async fn index(&self) -> SchedulerResult<Vec<String>> {
        match self.cache.get(INDEX_KEY).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    async fn store_index(&self, names: &[String]) -> SchedulerResult<()> {
        self.cache.set(INDEX_KEY, serde_json::to_vec(names)?).await
    }

    async fn store_task(&self, task: &Task) -> SchedulerResult<()> {
        let bytes = self.serializer.serialize(task)?;
        self.cache.set(&task_key(task.name()), bytes).await
    }

    async fn read_task(&self, name: &str) -> SchedulerResult<Task> {
        read_cached_task(self.cache.as_ref(), self.serializer.as_ref(), name).await
    }

    fn supplier(&self, name: &str) -> LazyTask {
        let cache = self.cache.clone();
        let serializer = self.serializer.clone();
        let key = name.to_string();
        LazyTask::new(
            name,
            Arc::new(move || -> BoxFuture<'static, SchedulerResult<Task>> {
                let cache = cache.clone();
                let serializer = serializer.clone();
                let key = key.clone();
                Box::pin(async move {
                    read_cached_task(cache.as_ref(), serializer.as_ref(), &key).await
                })
            }),
        )
    }
}

#[async_trait]
impl Transport for CacheTransport {
    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.read_task(name).await
    }

    async fn get_lazy(&self, name: &str) -> SchedulerResult<LazyTask> {
        if !self.cache.has(&task_key(name)).await? {
            return Err(SchedulerError::task_not_found(name));
        }
        Ok(self.supplier(name))
    }

    async fn list(&self) -> SchedulerResult<TaskList> {
        let mut tasks = TaskList::new();
        for name in self.index().await? {
            match self.read_task(&name).await {
                Ok(task) => tasks.add(task),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        self.ordering.apply(tasks)
    }

    async fn list_lazy(&self) -> SchedulerResult<LazyTaskList> {
        let names = if self.ordering.is_sorting() {
            self.list().await?.names()
        } else {
            self.index().await?
        };
        Ok(names.iter().map(|name| self.supplier(name)).collect())
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut names = self.index().await?;
        if names.iter().any(|name| name == task.name()) {
            return Err(SchedulerError::already_scheduled(task.name()));
        }

        self.store_task(&task).await?;
        names.push(task.name().to_string());
        self.store_index(&names).await
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        ensure_same_name(name, &task)?;
        let _guard = self.write_lock.lock().await;
        if !self.cache.has(&task_key(name)).await? {
            return Err(SchedulerError::task_not_found(name));
        }
        self.store_task(&task).await
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut names = self.index().await?;
        let before = names.len();
        names.retain(|existing| existing != name);
        if names.len() == before {
            return Err(SchedulerError::task_not_found(name));
        }

        self.cache.delete(&task_key(name)).await?;
        self.store_index(&names).await
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut task = self.read_task(name).await?;
        pause_task(&mut task)?;
        self.store_task(&task).await
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut task = self.read_task(name).await?;
        resume_task(&mut task)?;
        self.store_task(&task).await
    }

    async fn clear(&self) -> SchedulerResult<()> {
        let _guard = self.write_lock.lock().await;
        for name in self.index().await? {
            self.cache.delete(&task_key(&name)).await?;
        }
        self.cache.delete(INDEX_KEY).await
    }

    async fn count(&self) -> SchedulerResult<usize> {
        Ok(self.index().await?.len())
    }

    fn name(&self) -> &str {
        "cache"
    }
}

fn task_key(name: &str) -> String {
    format!("{TASK_KEY_PREFIX}{name}")
}

async fn read_cached_task(
    cache: &dyn CacheStore,
    serializer: &dyn TaskSerializer,
    name: &str,
) -> SchedulerResult<Task> {
    match cache.get(&task_key(name)).await? {
        Some(bytes) => serializer.deserialize(&bytes),
        None => Err(SchedulerError::task_not_found(name)),
    }
}
