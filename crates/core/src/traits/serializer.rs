use crate::models::Task;
use crate::SchedulerResult;

/// 任务序列化接口，供持久化传输层使用
pub trait TaskSerializer: Send + Sync {
    fn serialize(&self, task: &Task) -> SchedulerResult<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> SchedulerResult<Task>;
}
