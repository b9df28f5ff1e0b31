use cadence_core::{models::Task, traits::TaskSerializer, SchedulerResult};

/// JSON 任务序列化
///
/// 反序列化后会校验任务约束，损坏或被手工修改的任务文件不会进入调度。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTaskSerializer {
    pretty: bool,
}

impl JsonTaskSerializer {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl TaskSerializer for JsonTaskSerializer {
    fn serialize(&self, task: &Task) -> SchedulerResult<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(task)?
        } else {
            serde_json::to_vec(task)?
        };
        Ok(bytes)
    }

    fn deserialize(&self, bytes: &[u8]) -> SchedulerResult<Task> {
        let task: Task = serde_json::from_slice(bytes)?;
        task.validate()?;
        Ok(task)
    }
}
