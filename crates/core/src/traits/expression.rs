use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::SchedulerResult;

/// 调度表达式求值接口
pub trait ExpressionEvaluator: Send + Sync {
    /// 校验表达式
    fn validate(&self, expression: &str) -> SchedulerResult<()>;

    /// 任务在 `now` 是否到期
    ///
    /// `strict` 为 true 时只匹配当前分钟，否则允许补触发自上次执行以来错过的时间点。
    fn is_due(
        &self,
        expression: &str,
        timezone: Tz,
        last_execution: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        strict: bool,
    ) -> SchedulerResult<bool>;

    /// `from` 之后的下一次执行时间
    fn next_run(
        &self,
        expression: &str,
        timezone: Tz,
        from: DateTime<Utc>,
    ) -> SchedulerResult<Option<DateTime<Utc>>>;
}
