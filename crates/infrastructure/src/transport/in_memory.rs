use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::debug;

use cadence_core::{
    models::{LazyTask, LazyTaskList, Task, TaskList},
    traits::Transport,
    SchedulerError, SchedulerResult,
};

use super::{ensure_same_name, pause_task, resume_task, ListOrdering};

/// 内存传输层
///
/// 任务保存在进程内，进程退出即丢失。
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    tasks: Arc<RwLock<TaskList>>,
    ordering: ListOrdering,
}

impl InMemoryTransport {
    pub fn new(ordering: ListOrdering) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(TaskList::new())),
            ordering,
        }
    }

    pub fn execution_mode(&self) -> &str {
        self.ordering.execution_mode()
    }

    fn supplier(&self, name: &str) -> LazyTask {
        let tasks = self.tasks.clone();
        let key = name.to_string();
        LazyTask::new(
            name,
            Arc::new(move || -> BoxFuture<'static, SchedulerResult<Task>> {
                let tasks = tasks.clone();
                let key = key.clone();
                Box::pin(async move {
                    tasks
                        .read()
                        .await
                        .get(&key)
                        .cloned()
                        .ok_or_else(|| SchedulerError::task_not_found(&key))
                })
            }),
        )
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.tasks
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::task_not_found(name))
    }

    async fn get_lazy(&self, name: &str) -> SchedulerResult<LazyTask> {
        if !self.tasks.read().await.has(name) {
            return Err(SchedulerError::task_not_found(name));
        }
        Ok(self.supplier(name))
    }

    async fn list(&self) -> SchedulerResult<TaskList> {
        let tasks = self.tasks.read().await.clone();
        self.ordering.apply(tasks)
    }

    async fn list_lazy(&self) -> SchedulerResult<LazyTaskList> {
        let names = self.list().await?.names();
        Ok(names.iter().map(|name| self.supplier(name)).collect())
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.has(task.name()) {
            return Err(SchedulerError::already_scheduled(task.name()));
        }
        debug!("内存传输层新增任务: {}", task.name());
        tasks.add(task);
        Ok(())
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        ensure_same_name(name, &task)?;
        let mut tasks = self.tasks.write().await;
        let existing = tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::task_not_found(name))?;
        *existing = task;
        Ok(())
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        self.tasks
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::task_not_found(name))
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::task_not_found(name))?;
        pause_task(task)
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::task_not_found(name))?;
        resume_task(task)
    }

    async fn clear(&self) -> SchedulerResult<()> {
        *self.tasks.write().await = TaskList::new();
        Ok(())
    }

    async fn count(&self) -> SchedulerResult<usize> {
        Ok(self.tasks.read().await.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
