use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// 时间来源，测试时可替换
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 可手动设置的时钟
#[derive(Debug)]
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut current = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *current = now;
    }

    pub fn advance(&self, duration: Duration) {
        let mut current = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
