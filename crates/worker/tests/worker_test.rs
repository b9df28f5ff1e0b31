use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

use cadence_core::{
    traits::{
        Clock, EventDispatcher, LockStore, MockClock, Runner, SignalStore, Transport,
        STOP_NEXT_TASK_KEY,
    },
    ExecutionState, Output, SchedulerError, SchedulerEvent, SchedulerResult, Task,
};
use cadence_dispatcher::Scheduler;
use cadence_infrastructure::{InMemoryLockStore, InMemorySignalStore, InMemoryTransport};
use cadence_worker::{RunnerRegistry, StopConditions, Worker, WorkerConfiguration};

// 记录调用顺序的 Runner，可按名称返回错误、错误输出或直接 panic
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    error_outputs: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingRunner {
    fn failing(names: &[&str]) -> Self {
        Self {
            failing: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
            ..Self::default()
        }
    }

    fn with_error_output(mut self, name: &str) -> Self {
        self.error_outputs.insert(name.to_string());
        self
    }

    fn with_panic(mut self, name: &str) -> Self {
        self.panicking.insert(name.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn recover(&self, name: &str) {
        self.failing.lock().unwrap().remove(name);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Runner for RecordingRunner {
    fn support(&self, _task: &Task) -> bool {
        true
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        self.calls.lock().unwrap().push(task.name().to_string());
        if self.panicking.contains(task.name()) {
            panic!("{} 崩溃", task.name());
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(task.name()) {
            return Err(SchedulerError::TaskExecution(format!("{} 执行出错", task.name())));
        }
        if self.error_outputs.contains(task.name()) {
            return Ok(Output::error(task.clone(), Some("错误输出".to_string())));
        }
        Ok(Output::success(task.clone(), None))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

// 执行期间暂停任务的 Runner
struct PausingRunner {
    scheduler: Arc<Scheduler>,
}

#[async_trait]
impl Runner for PausingRunner {
    fn support(&self, _task: &Task) -> bool {
        true
    }

    async fn run(&self, task: &Task) -> SchedulerResult<Output> {
        self.scheduler.pause(task.name()).await?;
        Ok(Output::success(task.clone(), None))
    }

    fn name(&self) -> &str {
        "pausing"
    }
}

// 随暂停的 tokio 时间前进的时钟
struct PausedClock {
    base: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl PausedClock {
    fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::from_std(self.started.elapsed()).unwrap()
    }
}

#[derive(Default)]
struct RecordingDispatcher {
    events: Mutex<Vec<String>>,
}

impl RecordingDispatcher {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn count(&self, event_type: &str) -> usize {
        self.events().iter().filter(|e| *e == event_type).count()
    }
}

impl EventDispatcher for RecordingDispatcher {
    fn dispatch(&self, event: SchedulerEvent) {
        self.events
            .lock()
            .unwrap()
            .push(event.event_type().to_string());
    }
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap()
}

struct Fixture {
    scheduler: Arc<Scheduler>,
    transport: Arc<InMemoryTransport>,
    runner: Arc<RecordingRunner>,
    events: Arc<RecordingDispatcher>,
    lock_store: Arc<InMemoryLockStore>,
    clock: Arc<MockClock>,
}

impl Fixture {
    fn new(runner: RecordingRunner) -> Self {
        let transport = Arc::new(InMemoryTransport::default());
        let clock = Arc::new(MockClock::new(noon()));
        let scheduler =
            Arc::new(Scheduler::new(transport.clone(), Tz::UTC).with_clock(clock.clone()));

        Self {
            scheduler,
            transport,
            runner: Arc::new(runner),
            events: Arc::new(RecordingDispatcher::default()),
            lock_store: Arc::new(InMemoryLockStore::new()),
            clock,
        }
    }

    fn worker(&self) -> Worker {
        Worker::new(
            self.scheduler.clone(),
            RunnerRegistry::new().with_runner(self.runner.clone()),
            self.lock_store.clone(),
        )
        .with_clock(self.clock.clone())
        .with_event_dispatcher(self.events.clone())
    }

    async fn schedule(&self, names: &[&str]) {
        for name in names {
            self.scheduler
                .schedule(Task::new(*name).unwrap())
                .await
                .unwrap();
        }
    }
}

#[tokio::test]
async fn test_empty_due_set_runs_nothing() {
    let fixture = Fixture::new(RecordingRunner::default());
    fixture
        .scheduler
        .schedule(Task::new("nightly").unwrap().with_expression("0 2 * * *"))
        .await
        .unwrap();

    let worker = fixture.worker();
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    assert!(fixture.runner.calls().is_empty());
    assert_eq!(fixture.events.events(), vec!["WorkerStarted", "WorkerStopped"]);
    assert!(!worker.is_running());
}

#[tokio::test]
async fn test_runner_error_records_failed_task_and_continues() {
    let fixture = Fixture::new(RecordingRunner::failing(&["foo"]));
    fixture.schedule(&["foo", "bar"]).await;

    let worker = fixture.worker();
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    assert_eq!(fixture.runner.calls(), vec!["foo", "bar"]);

    let failed = worker.failed_tasks();
    assert_eq!(failed.len(), 1);
    let foo = failed.get("foo.failed").unwrap();
    assert_eq!(foo.task().name(), "foo");
    assert!(foo.reason().contains("foo"));

    assert_eq!(worker.last_executed_task().unwrap().name(), "bar");
    assert_eq!(fixture.events.count("TaskFailed"), 1);
    assert_eq!(fixture.events.count("TaskExecuted"), 1);
}

#[tokio::test]
async fn test_no_runner_is_an_error() {
    let fixture = Fixture::new(RecordingRunner::default());
    let worker = Worker::new(
        fixture.scheduler.clone(),
        RunnerRegistry::new(),
        fixture.lock_store.clone(),
    );

    let result = worker.execute(WorkerConfiguration::create(), vec![]).await;
    assert!(matches!(result, Err(SchedulerError::UndefinedRunner(ref m)) if m == "No runner found"));
}

#[tokio::test]
async fn test_explicit_tasks_run_once() {
    let fixture = Fixture::new(RecordingRunner::default());
    fixture.schedule(&["scheduled"]).await;

    fixture
        .worker()
        .execute(
            WorkerConfiguration::create(),
            vec![Task::new("adhoc").unwrap()],
        )
        .await
        .unwrap();

    assert_eq!(fixture.runner.calls(), vec!["adhoc"]);
}

#[tokio::test]
async fn test_paused_tasks_are_skipped() {
    let fixture = Fixture::new(RecordingRunner::default());
    fixture.schedule(&["foo", "bar"]).await;
    fixture.scheduler.pause("bar").await.unwrap();

    fixture
        .worker()
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    assert_eq!(fixture.runner.calls(), vec!["foo"]);
}

#[tokio::test]
async fn test_locked_task_is_skipped_and_locks_are_released() {
    let fixture = Fixture::new(RecordingRunner::default());
    fixture.schedule(&["foo", "bar"]).await;
    assert!(fixture.lock_store.acquire("_cadence_task_foo").await.unwrap());

    fixture
        .worker()
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    assert_eq!(fixture.runner.calls(), vec!["bar"]);
    assert!(fixture.lock_store.is_locked("_cadence_task_foo"));
    assert!(!fixture.lock_store.is_locked("_cadence_task_bar"));
}

#[tokio::test]
async fn test_task_limit() {
    let fixture = Fixture::new(RecordingRunner::default());
    fixture.schedule(&["a", "b", "c"]).await;

    let worker = fixture.worker();
    worker
        .execute(WorkerConfiguration::create().with_task_limit(2), vec![])
        .await
        .unwrap();

    assert_eq!(fixture.runner.calls(), vec!["a", "b"]);
    assert_eq!(worker.configuration().executed_tasks_count(), 2);
}

#[tokio::test]
async fn test_failure_limit() {
    let fixture = Fixture::new(RecordingRunner::failing(&["a", "b", "c"]));
    fixture.schedule(&["a", "b", "c"]).await;

    let worker = fixture.worker();
    worker
        .execute(WorkerConfiguration::create().with_failure_limit(1), vec![])
        .await
        .unwrap();

    assert_eq!(fixture.runner.calls(), vec!["a"]);
    assert_eq!(worker.failed_tasks().len(), 1);
}

#[tokio::test]
async fn test_stop_next_task_signal() {
    let fixture = Fixture::new(RecordingRunner::default());
    fixture.schedule(&["a", "b"]).await;

    let signals = Arc::new(InMemorySignalStore::new());
    let worker = fixture.worker().with_signal_store(signals.clone());
    let configuration = || {
        WorkerConfiguration::create().with_stop_conditions(StopConditions {
            stop_on_next_task_signal: true,
            ..StopConditions::default()
        })
    };

    // 启动前的请求不生效
    signals
        .set(STOP_NEXT_TASK_KEY, noon() - chrono::Duration::minutes(1))
        .await
        .unwrap();
    worker.execute(configuration(), vec![]).await.unwrap();
    assert_eq!(fixture.runner.calls().len(), 2);

    fixture.clock.advance(chrono::Duration::minutes(1));
    signals
        .request_stop_next_task(fixture.clock.now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    worker.execute(configuration(), vec![]).await.unwrap();
    assert_eq!(fixture.runner.calls().len(), 2);
}

#[tokio::test]
async fn test_execution_metadata_is_written_back() {
    let fixture = Fixture::new(RecordingRunner::default().with_error_output("bar"));
    fixture.schedule(&["foo", "bar"]).await;

    let worker = fixture.worker();
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    let foo = fixture.transport.get("foo").await.unwrap();
    assert_eq!(foo.last_execution, Some(noon()));
    assert_eq!(foo.execution_state, ExecutionState::Succeed);
    assert!(foo.execution_computation_time.is_some());

    // 错误输出不会产生失败任务
    let bar = fixture.transport.get("bar").await.unwrap();
    assert_eq!(bar.execution_state, ExecutionState::Errored);
    assert!(worker.failed_tasks().is_empty());

    // 同一分钟内不再到期
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();
    assert_eq!(fixture.runner.calls().len(), 2);
}

#[tokio::test]
async fn test_single_run_and_delete_after_execute() {
    let fixture = Fixture::new(RecordingRunner::default());
    let mut once = Task::new("once").unwrap();
    once.single_run = true;
    let mut ephemeral = Task::new("ephemeral").unwrap();
    ephemeral.delete_after_execute = true;
    fixture.scheduler.schedule(once).await.unwrap();
    fixture.scheduler.schedule(ephemeral).await.unwrap();

    fixture
        .worker()
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    assert_eq!(fixture.runner.calls(), vec!["once", "ephemeral"]);
    assert!(fixture.transport.get("once").await.unwrap().is_paused());
    assert!(fixture
        .transport
        .get("ephemeral")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_is_bounded() {
    let fixture =
        Fixture::new(RecordingRunner::default().with_delay(Duration::from_millis(100)));
    fixture.schedule(&["a", "b", "c"]).await;

    let started = tokio::time::Instant::now();
    fixture
        .worker()
        .execute(WorkerConfiguration::create().with_concurrency(2), vec![])
        .await
        .unwrap();

    assert_eq!(fixture.runner.calls().len(), 3);
    assert_eq!(fixture.runner.max_in_flight.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() < Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_sleeps_until_next_minute_until_time_limit() {
    let fixture = Fixture::new(RecordingRunner::default());
    fixture.schedule(&["foo"]).await;

    // 休眠 31s、60s、60s 后运行时间超过 100s
    fixture
        .worker()
        .with_clock(Arc::new(PausedClock::new(noon())))
        .execute(
            WorkerConfiguration::create()
                .with_sleep_until_next_minute(true)
                .with_time_limit(Duration::from_secs(100)),
            vec![],
        )
        .await
        .unwrap();

    assert_eq!(fixture.runner.calls(), vec!["foo"]);
    assert_eq!(fixture.events.count("WorkerSleeping"), 3);
    assert_eq!(fixture.events.events().last().unwrap(), "WorkerStopped");
}

#[tokio::test(start_paused = true)]
async fn test_time_limit_follows_injected_clock() {
    let fixture = Fixture::new(RecordingRunner::default());
    let clock = Arc::new(MockClock::new(noon()));
    let worker = Arc::new(fixture.worker().with_clock(clock.clone()));

    let handle = tokio::spawn({
        let worker = worker.clone();
        async move {
            worker
                .execute(
                    WorkerConfiguration::create()
                        .with_sleep_until_next_minute(true)
                        .with_time_limit(Duration::from_secs(60)),
                    vec![],
                )
                .await
        }
    });

    // tokio 时间已过去数分钟，注入的时钟未前进，不会停止
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(worker.is_running());

    clock.advance(chrono::Duration::seconds(90));
    handle.await.unwrap().unwrap();
    assert!(!worker.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_idle_does_not_skip_next_sleep() {
    let fixture = Fixture::new(RecordingRunner::default());
    let worker = fixture
        .worker()
        .with_clock(Arc::new(PausedClock::new(noon())));

    worker.stop();

    let started = tokio::time::Instant::now();
    worker
        .execute(
            WorkerConfiguration::create()
                .with_sleep_until_next_minute(true)
                .with_time_limit(Duration::from_secs(30)),
            vec![],
        )
        .await
        .unwrap();

    assert_eq!(fixture.events.count("WorkerSleeping"), 1);
    assert!(started.elapsed() >= Duration::from_secs(31));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_execute_resets_running_state() {
    let fixture = Fixture::new(RecordingRunner::default());
    let worker = Arc::new(fixture.worker());

    let handle = tokio::spawn({
        let worker = worker.clone();
        async move {
            worker
                .execute(
                    WorkerConfiguration::create().with_sleep_until_next_minute(true),
                    vec![],
                )
                .await
        }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(worker.is_running());

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    assert!(!worker.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_stop_wakes_sleeping_worker() {
    let fixture = Fixture::new(RecordingRunner::default());
    let worker = Arc::new(fixture.worker());

    let started = tokio::time::Instant::now();
    let handle = tokio::spawn({
        let worker = worker.clone();
        async move {
            worker
                .execute(
                    WorkerConfiguration::create().with_sleep_until_next_minute(true),
                    vec![],
                )
                .await
        }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(worker.is_running());
    worker.stop();

    handle.await.unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_secs(31));
    assert!(!worker.is_running());
}

#[tokio::test]
async fn test_retry_and_remove_failed_tasks() {
    let fixture = Fixture::new(RecordingRunner::failing(&["foo"]));
    fixture.schedule(&["foo"]).await;

    let worker = fixture.worker();
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();
    assert_eq!(worker.failed_tasks().len(), 1);

    fixture.runner.recover("foo");
    worker.retry_failed_task("foo").await.unwrap();
    assert!(worker.failed_tasks().is_empty());
    assert_eq!(fixture.runner.calls(), vec!["foo", "foo"]);
    assert_eq!(worker.last_executed_task().unwrap().name(), "foo");

    assert!(worker.retry_failed_task("foo").await.unwrap_err().is_not_found());
    assert!(worker.remove_failed_task("missing").unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_fork_and_restart() {
    let fixture = Fixture::new(RecordingRunner::failing(&["foo"]));
    fixture.schedule(&["foo"]).await;

    let worker = fixture.worker();
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    let fork = worker.fork();
    assert!(fork.configuration().is_fork());
    assert_eq!(fork.configuration().forked_from(), Some("worker"));
    assert!(fork.failed_tasks().is_empty());
    assert_eq!(fixture.events.count("WorkerForked"), 1);

    worker.restart();
    assert!(worker.failed_tasks().is_empty());
    assert!(!worker.configuration().should_stop());
    assert_eq!(fixture.events.count("WorkerRestarted"), 1);
}

#[tokio::test]
async fn test_runner_panic_is_recorded_as_failure() {
    let fixture = Fixture::new(RecordingRunner::default().with_panic("foo"));
    fixture.schedule(&["foo", "bar"]).await;

    let worker = fixture.worker();
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    assert_eq!(fixture.runner.calls(), vec!["foo", "bar"]);
    let failed = worker.failed_tasks();
    assert_eq!(failed.len(), 1);
    assert!(failed.get("foo.failed").unwrap().reason().contains("foo 崩溃"));
    assert!(!fixture.lock_store.is_locked("_cadence_task_foo"));
    assert!(!worker.is_running());
    assert_eq!(fixture.events.events().last().unwrap(), "WorkerStopped");

    // 运行状态已复位，可以再次执行
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();
    assert_eq!(fixture.runner.calls(), vec!["foo", "bar", "foo"]);
}

#[tokio::test]
async fn test_max_executions_skips_exhausted_tasks() {
    let fixture = Fixture::new(RecordingRunner::default());
    let mut limited = Task::new("limited").unwrap();
    limited.max_executions = Some(1);
    fixture.scheduler.schedule(limited).await.unwrap();
    fixture.schedule(&["unlimited"]).await;

    let worker = fixture.worker();
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();
    assert_eq!(
        fixture.transport.get("limited").await.unwrap().execution_count,
        1
    );

    fixture.clock.advance(chrono::Duration::minutes(1));
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    assert_eq!(
        fixture.runner.calls(),
        vec!["limited", "unlimited", "unlimited"]
    );
    assert_eq!(
        fixture.transport.get("unlimited").await.unwrap().execution_count,
        2
    );
}

#[tokio::test]
async fn test_max_retries_before_recording_failure() {
    let fixture = Fixture::new(RecordingRunner::failing(&["foo"]));
    let mut foo = Task::new("foo").unwrap();
    foo.max_retries = Some(2);
    fixture.scheduler.schedule(foo).await.unwrap();

    let worker = fixture.worker();
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    assert_eq!(fixture.runner.calls(), vec!["foo", "foo", "foo"]);
    assert_eq!(worker.failed_tasks().len(), 1);
    assert_eq!(fixture.events.count("TaskFailed"), 1);
}

#[tokio::test]
async fn test_store_output_keeps_last_output() {
    let fixture = Fixture::new(
        RecordingRunner::default()
            .with_error_output("kept")
            .with_error_output("dropped"),
    );
    let mut kept = Task::new("kept").unwrap();
    kept.store_output = true;
    fixture.scheduler.schedule(kept).await.unwrap();
    fixture.schedule(&["dropped"]).await;

    fixture
        .worker()
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    let kept = fixture.transport.get("kept").await.unwrap();
    assert_eq!(kept.last_output.as_deref(), Some("错误输出"));
    let dropped = fixture.transport.get("dropped").await.unwrap();
    assert_eq!(dropped.last_output, None);
}

#[tokio::test]
async fn test_write_back_keeps_changes_made_during_execution() {
    let fixture = Fixture::new(RecordingRunner::default());
    fixture.schedule(&["foo"]).await;

    let worker = Worker::new(
        fixture.scheduler.clone(),
        RunnerRegistry::new().with_runner(Arc::new(PausingRunner {
            scheduler: fixture.scheduler.clone(),
        })),
        fixture.lock_store.clone(),
    )
    .with_clock(fixture.clock.clone());
    worker
        .execute(WorkerConfiguration::create(), vec![])
        .await
        .unwrap();

    let foo = fixture.transport.get("foo").await.unwrap();
    assert!(foo.is_paused());
    assert_eq!(foo.last_execution, Some(noon()));
    assert_eq!(foo.execution_state, ExecutionState::Succeed);
    assert_eq!(foo.execution_count, 1);
}
