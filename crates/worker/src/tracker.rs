use tokio::time::Instant;

use cadence_core::Task;
use cadence_infrastructure::resource_monitor;

/// 单次执行的起点
#[derive(Debug, Clone, Copy)]
pub struct Tracking {
    started_at: Instant,
    memory_before: u64,
}

/// 任务执行跟踪器
///
/// 记录执行耗时（毫秒）与执行前后常驻内存的差值（字节）。
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskExecutionTracker;

impl TaskExecutionTracker {
    pub fn new() -> Self {
        Self
    }

    pub fn start_tracking(&self, _task: &Task) -> Tracking {
        Tracking {
            started_at: Instant::now(),
            memory_before: resource_monitor::memory_usage(),
        }
    }

    pub fn end_tracking(&self, tracking: Tracking, task: &mut Task) {
        let elapsed = tracking.started_at.elapsed();
        task.execution_computation_time = Some(elapsed.as_secs_f64() * 1000.0);
        task.execution_memory_usage =
            Some(resource_monitor::memory_usage().saturating_sub(tracking.memory_before));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_records_duration_in_milliseconds() {
        let tracker = TaskExecutionTracker::new();
        let mut task = Task::new("foo").unwrap();

        let tracking = tracker.start_tracking(&task);
        tokio::time::sleep(Duration::from_millis(250)).await;
        tracker.end_tracking(tracking, &mut task);

        let duration = task.execution_computation_time.unwrap();
        assert!((250.0..260.0).contains(&duration), "耗时 {duration}");
        assert!(task.execution_memory_usage.is_some());
    }
}
