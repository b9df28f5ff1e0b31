use crate::models::TaskList;
use crate::SchedulerResult;

/// 调度策略接口
///
/// 对一批任务排序，排序必须稳定：比较结果相等的任务保持输入顺序。
/// 空列表返回空列表。
pub trait SchedulePolicy: Send + Sync {
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList>;

    /// 是否支持该策略名称
    fn support(&self, policy: &str) -> bool {
        policy == self.name()
    }

    /// 获取策略名称
    fn name(&self) -> &str;
}
