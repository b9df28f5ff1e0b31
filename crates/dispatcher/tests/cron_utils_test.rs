#[cfg(test)]
mod cron_utils_tests {
    use cadence_dispatcher::cron_utils::*;

    use cadence_core::traits::ExpressionEvaluator;
    use chrono::{TimeZone, Timelike, Utc};
    use chrono_tz::Tz;

    #[test]
    fn test_cron_scheduler_creation() {
        assert!(CronScheduler::new("0 0 * * *").is_ok());
        assert!(CronScheduler::new("0 0 0 * * *").is_ok());
        assert!(CronScheduler::new("@daily").is_ok());
        assert!(CronScheduler::new("invalid").is_err());
        assert!(CronScheduler::new("@never").is_err());
    }

    #[test]
    fn test_should_trigger() {
        let scheduler = CronScheduler::new("* * * * *").unwrap();

        let base_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 5).unwrap();
        let next_minute_plus = Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 30).unwrap();
        assert!(scheduler.should_trigger(Some(base_time), next_minute_plus, Tz::UTC));

        let same_minute = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
        assert!(!scheduler.should_trigger(Some(base_time), same_minute, Tz::UTC));
    }

    #[test]
    fn test_should_trigger_first_run() {
        let every_minute = CronScheduler::new("* * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
        assert!(every_minute.should_trigger(None, now, Tz::UTC));

        let nightly = CronScheduler::new("0 2 * * *").unwrap();
        assert!(!nightly.should_trigger(None, now, Tz::UTC));
    }

    #[test]
    fn test_next_execution_time_in_timezone() {
        let scheduler = CronScheduler::new("0 9 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let next = scheduler
            .next_execution_time(now, "Asia/Shanghai".parse().unwrap())
            .unwrap();
        // 上海 09:00 即 UTC 01:00
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 2, 1, 0, 0).unwrap());
    }

    #[test]
    fn test_upcoming_times() {
        let scheduler = CronScheduler::new("0 * * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let upcoming = scheduler.upcoming_times(now, Tz::UTC, 3);

        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].hour(), 13);
        assert_eq!(upcoming[1].hour(), 14);
        assert_eq!(upcoming[2].hour(), 15);
    }

    #[test]
    fn test_day_of_week_uses_standard_numbering() {
        // 2024-01-07 是周日
        let scheduler = CronScheduler::new("0 0 * * 0").unwrap();
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let next = scheduler.next_execution_time(from, Tz::UTC).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).unwrap());

        let weekdays = CronScheduler::new("0 0 * * 1-5").unwrap();
        let saturday = Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap();
        let next = weekdays.next_execution_time(saturday, Tz::UTC).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_validate_cron_expression() {
        assert!(CronScheduler::validate_cron_expression("*/5 * * * *").is_ok());
        assert!(CronScheduler::validate_cron_expression("0 9-17 * * 1-5").is_ok());
        assert!(CronScheduler::validate_cron_expression("invalid").is_err());
        assert!(CronScheduler::validate_cron_expression("0 0 32 * *").is_err());
        assert!(CronScheduler::validate_cron_expression("").is_err());
    }

    #[test]
    fn test_evaluator_strict_mode() {
        let evaluator = CronExpressionEvaluator::new();
        let on_the_hour = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 40).unwrap();
        let past_the_hour = Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 10).unwrap();

        assert!(evaluator
            .is_due("0 * * * *", Tz::UTC, None, on_the_hour, true)
            .unwrap());
        assert!(!evaluator
            .is_due("0 * * * *", Tz::UTC, None, past_the_hour, true)
            .unwrap());
    }

    #[test]
    fn test_evaluator_reboot_expression() {
        let evaluator = CronExpressionEvaluator::new();
        let now = Utc::now();

        assert!(evaluator.validate("@reboot").is_ok());
        assert!(!evaluator.is_due("@reboot", Tz::UTC, None, now, false).unwrap());
        assert!(evaluator.next_run("@reboot", Tz::UTC, now).unwrap().is_none());
    }
}
