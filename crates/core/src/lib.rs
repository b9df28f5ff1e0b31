pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::{AppConfig, LockConfig, LockStoreKind, SchedulerConfig, WorkerConfig};
pub use errors::*;
pub use events::SchedulerEvent;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use models::{
    ExecutionState, FailedTask, LazyTask, LazyTaskList, NamedTask, Output, OutputType, Task,
    TaskKind, TaskList, TaskState,
};
