use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::models::task::{NamedTask, Task};
use crate::models::task_list::TaskList;
use crate::SchedulerResult;

/// 延迟加载任务的提供者，通常捕获来源传输层的共享状态
pub type TaskSupplier = Arc<dyn Fn() -> BoxFuture<'static, SchedulerResult<Task>> + Send + Sync>;

/// 延迟加载的任务
///
/// 只保存名称与提供者，首次访问时才加载完整任务并缓存。
#[derive(Clone)]
pub struct LazyTask {
    name: String,
    supplier: TaskSupplier,
    task: Arc<OnceCell<Task>>,
}

impl LazyTask {
    pub fn new(name: impl Into<String>, supplier: TaskSupplier) -> Self {
        Self {
            name: name.into(),
            supplier,
            task: Arc::new(OnceCell::new()),
        }
    }

    /// 包装一个已加载的任务
    pub fn from_task(task: Task) -> Self {
        let name = task.name().to_string();
        let fallback = task.clone();
        let supplier: TaskSupplier = Arc::new(move || -> BoxFuture<'static, SchedulerResult<Task>> {
            let task = fallback.clone();
            Box::pin(async move { Ok(task) })
        });
        Self {
            name,
            supplier,
            task: Arc::new(OnceCell::new_with(Some(task))),
        }
    }

    pub async fn task(&self) -> SchedulerResult<&Task> {
        self.task.get_or_try_init(|| (self.supplier)()).await
    }

    pub async fn load(&self) -> SchedulerResult<Task> {
        self.task().await.cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.task.initialized()
    }
}

impl NamedTask for LazyTask {
    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for LazyTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyTask")
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl PartialEq for LazyTask {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// 延迟加载的任务列表
pub type LazyTaskList = TaskList<LazyTask>;

impl TaskList<LazyTask> {
    /// 所有条目都已加载
    pub fn is_initialized(&self) -> bool {
        self.iter().all(LazyTask::is_initialized)
    }

    /// 按顺序加载全部条目
    pub async fn hydrate(&self) -> SchedulerResult<TaskList> {
        let mut tasks = TaskList::new();
        for lazy in self.iter() {
            tasks.add(lazy.load().await?);
        }
        Ok(tasks)
    }
}

impl From<TaskList> for LazyTaskList {
    fn from(tasks: TaskList) -> Self {
        tasks.into_iter().map(LazyTask::from_task).collect()
    }
}
