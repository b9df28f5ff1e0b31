use async_trait::async_trait;

use crate::models::{Output, Task};
use crate::SchedulerResult;

/// 任务执行器接口
///
/// Worker 会选择第一个 `support` 返回 true 的 Runner 执行任务。
/// 返回 `Err` 表示执行失败，Worker 会将任务记录为失败任务；
/// 返回 `Output::error` 只会把任务标记为 `Errored`。
#[async_trait]
pub trait Runner: Send + Sync {
    /// 是否能够执行该任务
    fn support(&self, task: &Task) -> bool;

    /// 执行任务
    ///
    /// 返回的 `Output` 中携带任务副本，Runner 可以在其上设置
    /// `Incomplete` 或 `ToRetry` 执行状态。
    async fn run(&self, task: &Task) -> SchedulerResult<Output>;

    /// 获取执行器名称
    fn name(&self) -> &str;
}
