use chrono::{DateTime, Duration, DurationRound, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;
use tracing::{debug, warn};

use cadence_core::{
    models::REBOOT_EXPRESSION, traits::ExpressionEvaluator, SchedulerError, SchedulerResult,
};

/// CRON表达式解析和调度工具
///
/// 接受标准 5 段表达式（自动补秒字段）、6/7 段表达式以及
/// `@yearly`、`@monthly`、`@weekly`、`@daily`、`@hourly` 宏。
pub struct CronScheduler {
    schedule: Schedule,
}

impl CronScheduler {
    /// 创建新的CRON调度器
    pub fn new(cron_expr: &str) -> SchedulerResult<Self> {
        let normalized = normalize_expression(cron_expr)?;
        let schedule =
            Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidExpression {
                expr: cron_expr.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self { schedule })
    }

    /// 检查给定时间是否应该触发任务
    ///
    /// 从上次执行时间（从未执行则为一分钟前）开始查找下一个时间点，
    /// 该时间点不晚于 `now` 即触发。
    pub fn should_trigger(
        &self,
        last_run: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> bool {
        let check_from = last_run.unwrap_or(now - Duration::minutes(1));
        let now_tz = now.with_timezone(&tz);

        match self.schedule.after(&check_from.with_timezone(&tz)).next() {
            Some(next_time) => {
                let should_trigger = next_time <= now_tz;
                if should_trigger {
                    debug!(
                        "任务应该触发: 检查起点={}, 下次执行={}, 当前时间={}",
                        check_from.format("%Y-%m-%d %H:%M:%S UTC"),
                        next_time.format("%Y-%m-%d %H:%M:%S %Z"),
                        now_tz.format("%Y-%m-%d %H:%M:%S %Z")
                    );
                }
                should_trigger
            }
            None => {
                warn!(
                    "无法计算下一次执行时间，检查起点: {}",
                    check_from.format("%Y-%m-%d %H:%M:%S UTC")
                );
                false
            }
        }
    }

    /// 当前分钟是否恰好是一个执行时间点
    pub fn matches_minute(&self, now: DateTime<Utc>, tz: Tz) -> bool {
        let Ok(minute) = now.duration_trunc(Duration::minutes(1)) else {
            return false;
        };
        let from = (minute - Duration::seconds(1)).with_timezone(&tz);
        self.schedule
            .after(&from)
            .next()
            .is_some_and(|next| next.with_timezone(&Utc) == minute)
    }

    /// 获取下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&from.with_timezone(&tz))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, tz: Tz, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule
            .after(&from.with_timezone(&tz))
            .take(count)
            .map(|t| t.with_timezone(&Utc))
            .collect()
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> SchedulerResult<()> {
        Self::new(cron_expr).map(|_| ())
    }
}

/// 转换为 `cron` crate 的格式
fn normalize_expression(expression: &str) -> SchedulerResult<String> {
    let expression = expression.trim();
    let invalid = |message: &str| SchedulerError::InvalidExpression {
        expr: expression.to_string(),
        message: message.to_string(),
    };

    if expression.starts_with('@') {
        return match expression {
            "@yearly" | "@annually" => Ok("0 0 0 1 1 *".to_string()),
            "@monthly" => Ok("0 0 0 1 * *".to_string()),
            "@weekly" => Ok("0 0 0 * * Sun".to_string()),
            "@daily" | "@midnight" => Ok("0 0 0 * * *".to_string()),
            "@hourly" => Ok("0 0 * * * *".to_string()),
            _ => Err(invalid("不支持的宏")),
        };
    }

    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => {
            let day_of_week = translate_day_of_week(fields[4]);
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], day_of_week
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        _ => Err(invalid("表达式字段数量必须为 5、6 或 7")),
    }
}

/// 标准 cron 的星期字段 0-7（0 和 7 均为周日）转换为 1-7（1 为周日）
fn translate_day_of_week(field: &str) -> String {
    field
        .split(',')
        .map(|part| {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (part, None),
            };
            let range = range
                .split('-')
                .map(|bound| match bound.parse::<u8>() {
                    Ok(day) if day <= 7 => ((day % 7) + 1).to_string(),
                    _ => bound.to_string(),
                })
                .collect::<Vec<_>>()
                .join("-");
            match step {
                Some(step) => format!("{range}/{step}"),
                None => range,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// 基于 `cron` crate 的表达式求值器
#[derive(Debug, Clone, Copy, Default)]
pub struct CronExpressionEvaluator;

impl CronExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEvaluator for CronExpressionEvaluator {
    fn validate(&self, expression: &str) -> SchedulerResult<()> {
        if expression.trim() == REBOOT_EXPRESSION {
            return Ok(());
        }
        CronScheduler::validate_cron_expression(expression)
    }

    fn is_due(
        &self,
        expression: &str,
        timezone: Tz,
        last_execution: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        strict: bool,
    ) -> SchedulerResult<bool> {
        // @reboot 任务只在重启时注册，不参与到期判断
        if expression.trim() == REBOOT_EXPRESSION {
            return Ok(false);
        }

        let scheduler = CronScheduler::new(expression)?;
        if strict {
            return Ok(scheduler.matches_minute(now, timezone));
        }
        Ok(scheduler.should_trigger(last_execution, now, timezone))
    }

    fn next_run(
        &self,
        expression: &str,
        timezone: Tz,
        from: DateTime<Utc>,
    ) -> SchedulerResult<Option<DateTime<Utc>>> {
        if expression.trim() == REBOOT_EXPRESSION {
            return Ok(None);
        }
        Ok(CronScheduler::new(expression)?.next_execution_time(from, timezone))
    }
}
