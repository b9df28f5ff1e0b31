use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use cadence_core::{traits::Runner, Output, SchedulerResult, Task, TaskKind};

use super::{max_duration, DEFAULT_TIMEOUT};

/// 探针任务执行器
///
/// 请求外部探针地址，响应体必须是包含 `failedTasks` 字段的 JSON 对象；
/// 启用 `error_on_failed_tasks` 时该字段必须为 0。
#[derive(Debug, Clone)]
pub struct ProbeRunner {
    client: reqwest::Client,
}

impl ProbeRunner {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn probe(&self, path: &str, timeout: Duration) -> Result<Value, String> {
        let response = self
            .client
            .get(path)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| format!("探针请求失败: {e}"))?;
        response
            .json::<Value>()
            .await
            .map_err(|e| format!("探针响应不是有效的 JSON: {e}"))
    }
}

impl Default for ProbeRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// 探针响应是否满足要求
pub(crate) fn probe_state_is_valid(body: &Value, error_on_failed_tasks: bool) -> bool {
    match body.get("failedTasks") {
        None => false,
        Some(failed) => !error_on_failed_tasks || failed.as_u64() == Some(0),
    }
}

#[async_trait]
impl Runner for ProbeRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Probe { .. })
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskKind::Probe {
            external_probe_path,
            error_on_failed_tasks,
            delay,
        } = &task.kind
        else {
            return Ok(Output::error(task.clone(), None));
        };

        if *delay > 0 {
            debug!("探针任务 {} 等待 {}ms", task.name(), delay);
            tokio::time::sleep(Duration::from_millis(*delay)).await;
        }

        let timeout = max_duration(task).unwrap_or(DEFAULT_TIMEOUT);
        match self.probe(external_probe_path, timeout).await {
            Ok(body) if probe_state_is_valid(&body, *error_on_failed_tasks) => Ok(Output::success(
                task.clone(),
                Some("The probe succeed".to_string()),
            )),
            Ok(_) => Ok(Output::error(
                task.clone(),
                Some("The probe state is invalid".to_string()),
            )),
            Err(message) => Ok(Output::error(task.clone(), Some(message))),
        }
    }

    fn name(&self) -> &str {
        "probe"
    }
}
