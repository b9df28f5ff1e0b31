//! # 数据模型
//!
//! 调度器的核心数据结构。
//!
//! ## 核心模型
//!
//! ### Task - 任务定义
//! 可调度的工作单元，名称唯一，执行参数由 [`TaskKind`] 携带。
//!
//! ### TaskList - 任务列表
//! 以名称为键、保持插入顺序的集合，同样用于存放 [`FailedTask`] 和 [`LazyTask`]。
//!
//! ### LazyTask - 延迟加载任务
//! 名称加提供者闭包，首次访问时才从来源传输层加载完整任务。
//!
//! ## 状态流转
//!
//! ```text
//! Enabled ⇄ Paused
//!    ↓
//! Disabled
//! ```
//!
//! 执行状态：
//!
//! ```text
//! NotExecuted → Running → Succeed | Errored | Incomplete | ToRetry
//! ```

pub mod failed_task;
pub mod lazy;
pub mod output;
pub mod task;
pub mod task_list;

pub use failed_task::*;
pub use lazy::*;
pub use output::*;
pub use task::*;
pub use task_list::*;
