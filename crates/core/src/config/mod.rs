//! 配置管理
//!
//! 配置按以下顺序加载，后者覆盖前者：
//!
//! 1. 内置默认值
//! 2. TOML 配置文件
//! 3. `CADENCE_` 前缀的环境变量，嵌套键以 `__` 分隔，例如 `CADENCE_WORKER__CONCURRENCY=4`
//!
//! 加载完成后会逐节校验，任何无效值都会在启动时报错。

pub mod models;


pub use models::*;
