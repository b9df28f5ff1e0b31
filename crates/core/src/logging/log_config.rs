use serde::{Deserialize, Serialize};

pub const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Output format for log entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Human readable multi-line format
    #[default]
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = crate::errors::SchedulerError;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        match format.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            _ => Err(crate::errors::SchedulerError::Configuration(format!(
                "不支持的日志格式: {format}"
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum log level, or any `EnvFilter` directive
    pub level: String,
    /// Output format for logs
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// 用 `LOG_LEVEL` / `LOG_FORMAT` 环境变量覆盖，无效值忽略
    pub fn with_env_overrides(self) -> Self {
        let mut config = self;

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            if VALID_LEVELS.contains(&level.to_lowercase().as_str()) {
                config.level = level.to_lowercase();
            }
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                config.format = format;
            }
        }

        config
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.level.trim().is_empty() {
            return Err(anyhow::anyhow!("日志级别不能为空"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_empty_level_rejected() {
        let config = LogConfig {
            level: " ".to_string(),
            ..LogConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(LogConfig::default().validate().is_ok());
    }
}
