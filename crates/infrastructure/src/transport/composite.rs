use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use cadence_core::{
    models::{LazyTask, LazyTaskList, Task, TaskList},
    traits::Transport,
    SchedulerError, SchedulerResult,
};

pub const NO_TRANSPORT_FOUND: &str = "No transport found";
pub const ALL_TRANSPORTS_FAILED: &str =
    "All the transports failed to execute the requested action";

/// 组合传输层选择成员的顺序
#[async_trait]
pub trait MemberSelection: Send + Sync {
    fn name(&self) -> &str;

    /// 本次调用尝试成员的顺序
    async fn order(&self, members: &[Arc<dyn Transport>]) -> Vec<Arc<dyn Transport>>;

    /// 某个成员成功完成一次调用
    fn record_success(&self, _members: usize) {}
}

/// 由一组传输层组成的传输层
///
/// 每次调用按 [`MemberSelection`] 给出的顺序尝试成员，第一个成功的结果被返回，
/// 之前成员的错误只记录日志。全部失败时返回汇总的 `Transport` 错误。
pub struct CompositeTransport<S> {
    members: Vec<Arc<dyn Transport>>,
    selection: S,
}

impl<S: MemberSelection> CompositeTransport<S> {
    pub(crate) fn from_parts(members: Vec<Arc<dyn Transport>>, selection: S) -> Self {
        Self { members, selection }
    }

    pub fn members(&self) -> &[Arc<dyn Transport>] {
        &self.members
    }

    pub(crate) fn selection(&self) -> &S {
        &self.selection
    }

    async fn execute<'a, T, F>(&self, action: &str, mut operation: F) -> SchedulerResult<T>
    where
        T: Send,
        F: FnMut(Arc<dyn Transport>) -> BoxFuture<'a, SchedulerResult<T>> + Send,
    {
        if self.members.is_empty() {
            return Err(SchedulerError::transport(NO_TRANSPORT_FOUND));
        }

        let mut errors = Vec::new();
        for member in self.selection.order(&self.members).await {
            let member_name = member.name().to_string();
            match operation(member).await {
                Ok(value) => {
                    debug!(
                        "{} 传输层通过成员 {} 完成 {}",
                        self.selection.name(),
                        member_name,
                        action
                    );
                    self.selection.record_success(self.members.len());
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        "{} 传输层成员 {} 执行 {} 失败: {}",
                        self.selection.name(),
                        member_name,
                        action,
                        e
                    );
                    errors.push(format!("{member_name}: {e}"));
                }
            }
        }

        Err(SchedulerError::transport(format!(
            "{ALL_TRANSPORTS_FAILED}: {}",
            errors.join(", ")
        )))
    }
}

#[async_trait]
impl<S: MemberSelection> Transport for CompositeTransport<S> {
    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.execute("get", |member| async move { member.get(name).await }.boxed())
            .await
    }

    async fn get_lazy(&self, name: &str) -> SchedulerResult<LazyTask> {
        self.execute("get_lazy", |member| {
            async move { member.get_lazy(name).await }.boxed()
        })
        .await
    }

    async fn list(&self) -> SchedulerResult<TaskList> {
        self.execute("list", |member| async move { member.list().await }.boxed())
            .await
    }

    async fn list_lazy(&self) -> SchedulerResult<LazyTaskList> {
        self.execute("list_lazy", |member| {
            async move { member.list_lazy().await }.boxed()
        })
        .await
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        self.execute("create", |member| {
            let task = task.clone();
            async move { member.create(task).await }.boxed()
        })
        .await
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        self.execute("update", |member| {
            let task = task.clone();
            async move { member.update(name, task).await }.boxed()
        })
        .await
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        self.execute("delete", |member| {
            async move { member.delete(name).await }.boxed()
        })
        .await
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        self.execute("pause", |member| async move { member.pause(name).await }.boxed())
            .await
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        self.execute("resume", |member| {
            async move { member.resume(name).await }.boxed()
        })
        .await
    }

    async fn clear(&self) -> SchedulerResult<()> {
        self.execute("clear", |member| async move { member.clear().await }.boxed())
            .await
    }

    async fn count(&self) -> SchedulerResult<usize> {
        self.execute("count", |member| async move { member.count().await }.boxed())
            .await
    }

    fn name(&self) -> &str {
        self.selection.name()
    }
}
