use async_trait::async_trait;
use tracing::{error, info};

use cadence_core::{traits::Runner, Output, SchedulerResult, Task, TaskKind};

use super::{max_duration, DEFAULT_TIMEOUT};

/// HTTP 任务执行器
///
/// 2xx 响应返回响应体，其它状态码或请求失败返回错误输出。
#[derive(Debug, Clone)]
pub struct HttpRunner {
    client: reqwest::Client,
}

impl HttpRunner {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for HttpRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Http { .. })
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskKind::Http {
            url,
            method,
            headers,
            body,
        } = &task.kind
        else {
            return Ok(Output::error(task.clone(), None));
        };

        info!("执行HTTP任务: task={}, method={}, url={}", task.name(), method, url);

        let mut request = match method.to_uppercase().as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            "PATCH" => self.client.patch(url),
            "HEAD" => self.client.head(url),
            _ => {
                return Ok(Output::error(
                    task.clone(),
                    Some(format!("不支持的HTTP方法: {method}")),
                ));
            }
        };

        request = request.timeout(max_duration(task).unwrap_or(DEFAULT_TIMEOUT));
        for (key, value) in headers {
            request = request.header(key, value);
        }
        if let Some(body) = body {
            request = request.body(body.clone());
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let content = response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("读取响应体失败: {e}"));
                if status.is_success() {
                    Ok(Output::success(task.clone(), Some(content)))
                } else {
                    Ok(Output::error(
                        task.clone(),
                        Some(format!("HTTP请求失败，状态码: {}", status.as_u16())),
                    ))
                }
            }
            Err(e) => {
                error!("HTTP任务执行失败: task={}, error={}", task.name(), e);
                Ok(Output::error(task.clone(), Some(format!("HTTP请求失败: {e}"))))
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
