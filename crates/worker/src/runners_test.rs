#[cfg(test)]
mod runners_tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::runners::*;
    use cadence_core::{
        traits::{Runner, SchedulerMessage},
        SchedulerError, SchedulerResult, Task, TaskKind,
    };
    use cadence_infrastructure::{InMemoryMessageBus, LoggingNotifier};

    fn task(name: &str, kind: TaskKind) -> Task {
        Task::with_kind(name, kind).unwrap()
    }

    fn shell(name: &str, command: &str, arguments: &[&str]) -> Task {
        task(
            name,
            TaskKind::Shell {
                command: command.to_string(),
                arguments: arguments.iter().map(|a| a.to_string()).collect(),
                working_dir: None,
                environment: BTreeMap::new(),
            },
        )
    }

    struct EchoCommand;

    #[async_trait]
    impl CommandHandler for EchoCommand {
        fn name(&self) -> &str {
            "app:echo"
        }

        async fn handle(
            &self,
            arguments: &[String],
            options: &BTreeMap<String, String>,
        ) -> SchedulerResult<Option<String>> {
            if options.contains_key("fail") {
                return Err(SchedulerError::TaskExecution("命令失败".to_string()));
            }
            Ok(Some(arguments.join(" ")))
        }
    }

    fn command(name: &str, options: &[(&str, &str)]) -> Task {
        task(
            name,
            TaskKind::Command {
                command: "app:echo".to_string(),
                arguments: vec!["hello".to_string(), "world".to_string()],
                options: options
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        )
    }

    #[test]
    fn test_registry_picks_first_supporting_runner() {
        let registry = RunnerRegistry::with_builtin_runners();
        assert_eq!(
            registry.names(),
            vec!["null", "shell", "http", "probe", "chained"]
        );

        let runner = registry.find(&Task::new("foo").unwrap()).unwrap();
        assert_eq!(runner.name(), "null");

        let missing = registry.find(&command("foo", &[]));
        assert!(matches!(missing, Err(SchedulerError::UndefinedRunner(_))));
        assert!(RunnerRegistry::new().is_empty());
    }

    #[tokio::test]
    async fn test_null_runner() {
        let output = NullRunner::new()
            .run(&Task::new("foo").unwrap())
            .await
            .unwrap();
        assert!(output.is_success());
        assert_eq!(output.output, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_runner_captures_output_when_requested() {
        let runner = ShellRunner::new();
        let mut task = shell("echo", "echo", &["hello"]);

        let output = runner.run(&task).await.unwrap();
        assert!(output.is_success());
        assert_eq!(output.output, None);

        task.output = true;
        let output = runner.run(&task).await.unwrap();
        assert_eq!(output.output.as_deref(), Some("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_runner_non_zero_exit_is_error_output() {
        let output = ShellRunner::new()
            .run(&shell("false", "false", &[]))
            .await
            .unwrap();
        assert!(!output.is_success());
    }

    #[tokio::test]
    async fn test_shell_runner_spawn_failure_is_err() {
        let result = ShellRunner::new()
            .run(&shell("missing", "cadence-command-that-does-not-exist", &[]))
            .await;
        assert!(matches!(result, Err(SchedulerError::TaskExecution(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_runner_honours_max_duration() {
        let mut task = shell("slow", "sleep", &["5"]);
        task.max_duration = Some(0.1);

        let output = ShellRunner::new().run(&task).await.unwrap();
        assert!(!output.is_success());
        assert!(output.output.unwrap().contains("超时"));
    }

    #[tokio::test]
    async fn test_command_runner() {
        let runner = CommandRunner::new().with_handler(Arc::new(EchoCommand));
        assert!(runner.has("app:echo"));

        let output = runner.run(&command("ok", &[])).await.unwrap();
        assert_eq!(output.output.as_deref(), Some("hello world"));

        let output = runner.run(&command("ko", &[("fail", "1")])).await.unwrap();
        assert!(!output.is_success());

        let unknown = CommandRunner::new().run(&command("unknown", &[])).await;
        assert!(matches!(unknown, Err(SchedulerError::InvalidArgument(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_chained_runner_stops_at_first_failure() {
        let registry = RunnerRegistry::with_builtin_runners();
        let runner = registry.find(&task("chain", TaskKind::Chained { tasks: vec![] })).unwrap();

        let mut first = shell("first", "echo", &["one"]);
        first.output = true;
        let chain = task(
            "chain",
            TaskKind::Chained {
                tasks: vec![first.clone(), Task::new("second").unwrap()],
            },
        );
        let output = runner.run(&chain).await.unwrap();
        assert!(output.is_success());
        assert_eq!(output.output.as_deref(), Some("one"));

        let broken = task(
            "broken",
            TaskKind::Chained {
                tasks: vec![shell("fails", "false", &[]), first],
            },
        );
        let output = runner.run(&broken).await.unwrap();
        assert!(!output.is_success());
        assert!(output.output.unwrap().contains("fails"));
    }

    #[tokio::test]
    async fn test_chained_runner_unknown_sub_task_is_error_output() {
        let runner = ChainedRunner::new(RunnerRegistry::new());
        let chain = task(
            "chain",
            TaskKind::Chained {
                tasks: vec![Task::new("orphan").unwrap()],
            },
        );
        assert!(!runner.run(&chain).await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_messenger_runner() {
        let message = task(
            "message",
            TaskKind::Messenger {
                message: json!({"id": 1}),
            },
        );

        let without_bus = MessengerRunner::new(None).run(&message).await.unwrap();
        assert!(!without_bus.is_success());

        let bus = Arc::new(InMemoryMessageBus::new());
        let output = MessengerRunner::new(Some(bus.clone()))
            .run(&message)
            .await
            .unwrap();
        assert!(output.is_success());
        assert_eq!(
            bus.try_receive().await,
            Some(SchedulerMessage::Payload {
                body: json!({"id": 1})
            })
        );
    }

    #[tokio::test]
    async fn test_notification_runner() {
        let notification = task(
            "notify",
            TaskKind::Notification {
                subject: "备份完成".to_string(),
                recipients: vec!["ops@example.com".to_string()],
            },
        );

        assert!(!NotificationRunner::new(None)
            .run(&notification)
            .await
            .unwrap()
            .is_success());
        assert!(NotificationRunner::new(Some(Arc::new(LoggingNotifier)))
            .run(&notification)
            .await
            .unwrap()
            .is_success());
    }

    #[tokio::test]
    async fn test_http_runner_rejects_unknown_method() {
        let request = task(
            "request",
            TaskKind::Http {
                url: "http://127.0.0.1:9".to_string(),
                method: "BREW".to_string(),
                headers: BTreeMap::new(),
                body: None,
            },
        );
        let output = HttpRunner::new().run(&request).await.unwrap();
        assert!(!output.is_success());
        assert!(output.output.unwrap().contains("BREW"));
    }

    #[tokio::test]
    async fn test_probe_unreachable_is_error_output() {
        let mut probe = task(
            "probe",
            TaskKind::Probe {
                external_probe_path: "http://127.0.0.1:9/probe".to_string(),
                error_on_failed_tasks: false,
                delay: 0,
            },
        );
        probe.max_duration = Some(1.0);

        let output = ProbeRunner::new().run(&probe).await.unwrap();
        assert!(!output.is_success());
    }

    #[test]
    fn test_probe_state_validation() {
        assert!(probe_state_is_valid(&json!({"failedTasks": 0}), true));
        assert!(probe_state_is_valid(&json!({"failedTasks": 3}), false));
        assert!(!probe_state_is_valid(&json!({"failedTasks": 3}), true));
        assert!(!probe_state_is_valid(&json!({"executedTasks": 3}), false));
    }
}
