use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use tracing::debug;

use cadence_core::{models::Task, traits::SchedulePolicy, SchedulerError, SchedulerResult, TaskList};

pub const FIRST_IN_FIRST_OUT: &str = "first_in_first_out";
pub const FIRST_IN_LAST_OUT: &str = "first_in_last_out";
pub const ROUND_ROBIN: &str = "round_robin";
pub const DEADLINE: &str = "deadline";
pub const IDLE: &str = "idle";
pub const NICE: &str = "nice";
pub const MEMORY_USAGE: &str = "memory_usage";
pub const EXECUTION_DURATION: &str = "execution_duration";
pub const BATCH: &str = "batch";

const UNTAGGED: &str = "untagged";

/// 空值排在最后的升序比较
fn ascending_none_last<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn descending_none_last<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (a, b) => ascending_none_last(a, b),
    }
}

fn sorted_by<F>(mut tasks: TaskList, compare: F) -> TaskList
where
    F: FnMut(&Task, &Task) -> Ordering,
{
    tasks.sort_by(compare);
    tasks
}

/// 先进先出：按 `scheduled_at` 升序
pub struct FirstInFirstOutPolicy;

/// 先进后出：按 `scheduled_at` 降序
pub struct FirstInLastOutPolicy;

/// 截止时间：按 `execution_end_date` 升序，没有截止时间的排最后
pub struct DeadlinePolicy;

/// 空闲：按优先级升序
pub struct IdlePolicy;

/// 按 nice 值升序，未设置视为 0
pub struct NicePolicy;

/// 按上次执行的内存占用升序
pub struct MemoryUsagePolicy;

/// 按上次执行耗时升序
pub struct ExecutionDurationPolicy;

macro_rules! simple_policy {
    ($policy:ident, $name:expr, |$a:ident, $b:ident| $compare:expr) => {
        impl $policy {
            pub fn new() -> Self {
                Self
            }
        }

        impl Default for $policy {
            fn default() -> Self {
                Self::new()
            }
        }

        impl SchedulePolicy for $policy {
            fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
                Ok(sorted_by(tasks, |$a: &Task, $b: &Task| $compare))
            }

            fn name(&self) -> &str {
                $name
            }
        }
    };
}

simple_policy!(FirstInFirstOutPolicy, FIRST_IN_FIRST_OUT, |a, b| {
    ascending_none_last(a.scheduled_at, b.scheduled_at)
});

simple_policy!(FirstInLastOutPolicy, FIRST_IN_LAST_OUT, |a, b| {
    descending_none_last(a.scheduled_at, b.scheduled_at)
});

simple_policy!(DeadlinePolicy, DEADLINE, |a, b| {
    ascending_none_last(a.execution_end_date, b.execution_end_date)
});

simple_policy!(IdlePolicy, IDLE, |a, b| a.priority().cmp(&b.priority()));

simple_policy!(NicePolicy, NICE, |a, b| {
    a.nice().unwrap_or(0).cmp(&b.nice().unwrap_or(0))
});

simple_policy!(MemoryUsagePolicy, MEMORY_USAGE, |a, b| {
    a.execution_memory_usage
        .unwrap_or(0)
        .cmp(&b.execution_memory_usage.unwrap_or(0))
});

simple_policy!(ExecutionDurationPolicy, EXECUTION_DURATION, |a, b| {
    a.execution_computation_time
        .unwrap_or(0.0)
        .partial_cmp(&b.execution_computation_time.unwrap_or(0.0))
        .unwrap_or(Ordering::Equal)
});

/// 轮询策略
///
/// 按第一个标签分组（无标签归入 `untagged`），依次从每组取一个任务交错排列。
/// 起始分组在每次排序后轮换，游标保存在实例上。
pub struct RoundRobinPolicy {
    cursor: Mutex<usize>,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self {
            cursor: Mutex::new(0),
        }
    }
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulePolicy for RoundRobinPolicy {
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
        if tasks.is_empty() {
            return Ok(tasks);
        }

        let mut groups: Vec<(String, Vec<Task>)> = Vec::new();
        for task in tasks {
            let key = task.first_tag().unwrap_or(UNTAGGED).to_string();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(task),
                None => groups.push((key, vec![task])),
            }
        }

        let start = {
            let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
            let start = *cursor % groups.len();
            *cursor = cursor.wrapping_add(1);
            start
        };
        groups.rotate_left(start);

        debug!(
            "轮询策略起始分组: {} (共 {} 组)",
            groups[0].0,
            groups.len()
        );

        let mut queues: Vec<std::vec::IntoIter<Task>> = groups
            .into_iter()
            .map(|(_, members)| members.into_iter())
            .collect();

        let mut sorted = TaskList::new();
        loop {
            let mut progressed = false;
            for queue in queues.iter_mut() {
                if let Some(task) = queue.next() {
                    sorted.add(task);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        Ok(sorted)
    }

    fn name(&self) -> &str {
        ROUND_ROBIN
    }
}

/// 批处理策略
///
/// 按固定窗口切分任务，窗口之间保持原有顺序，窗口内交给内部策略排序。
pub struct BatchPolicy {
    batch_size: usize,
    inner: Arc<dyn SchedulePolicy>,
}

impl BatchPolicy {
    pub const DEFAULT_BATCH_SIZE: usize = 10;

    pub fn new(batch_size: usize, inner: Arc<dyn SchedulePolicy>) -> SchedulerResult<Self> {
        if batch_size == 0 {
            return Err(SchedulerError::InvalidArgument(
                "批处理窗口大小必须大于0".to_string(),
            ));
        }
        Ok(Self { batch_size, inner })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
            inner: Arc::new(IdlePolicy::new()),
        }
    }
}

impl SchedulePolicy for BatchPolicy {
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
        if tasks.is_empty() {
            return Ok(tasks);
        }

        let mut sorted = TaskList::new();
        for window in tasks.chunk(self.batch_size)? {
            sorted.add_all(self.inner.sort(window)?);
        }
        Ok(sorted)
    }

    fn name(&self) -> &str {
        BATCH
    }
}
