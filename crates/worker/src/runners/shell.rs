use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use cadence_core::{traits::Runner, Output, SchedulerError, SchedulerResult, Task, TaskKind};

use super::max_duration;

/// Shell 任务执行器
///
/// 退出码非 0 时返回错误输出（标准错误）；进程无法启动时返回 `Err`。
/// 设置了 `max_duration` 的任务超时后进程会被终止。
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Runner for ShellRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Shell { .. })
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        let TaskKind::Shell {
            command,
            arguments,
            working_dir,
            environment,
        } = &task.kind
        else {
            return Ok(Output::error(task.clone(), None));
        };

        info!("执行Shell任务: task={}, command={}, args={:?}", task.name(), command, arguments);

        let mut cmd = Command::new(command);
        cmd.args(arguments)
            .envs(environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| SchedulerError::TaskExecution(format!("启动Shell命令失败: {e}")))?;

        let result = match max_duration(task) {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Shell任务 {} 超过 {:?} 未结束，已终止", task.name(), limit);
                    return Ok(Output::error(
                        task.clone(),
                        Some(format!("任务执行超时 ({}s)", limit.as_secs_f64())),
                    ));
                }
            },
            None => child.wait_with_output().await,
        };
        let output =
            result.map_err(|e| SchedulerError::TaskExecution(format!("等待进程结束失败: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("命令执行失败，退出码: {:?}", output.status.code())
            } else {
                stderr
            };
            return Ok(Output::error(task.clone(), Some(message)));
        }

        let stdout = task
            .output
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string());
        Ok(Output::success(task.clone(), stdout))
    }

    fn name(&self) -> &str {
        "shell"
    }
}
