//! 调度核心
//!
//! - 调度策略与编排器：决定一批任务的执行顺序
//! - CRON 表达式求值
//! - `Scheduler`：任务注册、到期判断与重启

pub mod cron_utils;
pub mod orchestrator;
pub mod policies;
pub mod scheduler;


pub use cron_utils::{CronExpressionEvaluator, CronScheduler};
pub use orchestrator::SchedulePolicyOrchestrator;
pub use policies::*;
pub use scheduler::Scheduler;
