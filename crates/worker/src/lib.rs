//! 任务执行
//!
//! - [`Worker`]：取到期任务、加锁、交给 Runner 执行并记录结果
//! - [`WorkerConfiguration`]：单次执行的运行参数与停止条件
//! - [`runners`]：各任务类型的执行器

pub mod configuration;
pub mod runners;
pub mod signal;
pub mod tracker;
pub mod worker;

#[cfg(test)]
mod runners_test;

pub use configuration::{StopConditions, WorkerConfiguration};
pub use runners::{
    ChainedRunner, CommandHandler, CommandRunner, HttpRunner, MessengerRunner,
    NotificationRunner, NullRunner, ProbeRunner, RunnerRegistry, ShellRunner,
};
pub use tracker::{TaskExecutionTracker, Tracking};
pub use worker::{Worker, DEFAULT_WORKER_NAME};
