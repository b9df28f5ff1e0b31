pub mod app_config;
pub mod scheduler_worker;

pub use app_config::AppConfig;
pub use scheduler_worker::{
    LockConfig, LockStoreKind, SchedulerConfig, WorkerConfig, KNOWN_POLICIES,
};
