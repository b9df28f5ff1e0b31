use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use cadence_core::{
    traits::{
        Clock, EventDispatcher, LockStore, Runner, SignalStore, SystemClock, STOP_NEXT_TASK_KEY,
    },
    ExecutionState, FailedTask, Output, SchedulerError, SchedulerEvent, SchedulerResult, Task,
    TaskList,
};
use cadence_dispatcher::{SchedulePolicyOrchestrator, Scheduler};

use crate::configuration::WorkerConfiguration;
use crate::runners::RunnerRegistry;
use crate::signal::wait_for_signal;
use crate::tracker::TaskExecutionTracker;

pub const DEFAULT_WORKER_NAME: &str = "worker";

struct WorkerState {
    configuration: WorkerConfiguration,
    failed_tasks: TaskList<FailedTask>,
    failure_count: usize,
    started_at: DateTime<Utc>,
}

impl WorkerState {
    fn new(configuration: WorkerConfiguration, started_at: DateTime<Utc>) -> Self {
        Self {
            configuration,
            failed_tasks: TaskList::new(),
            failure_count: 0,
            started_at,
        }
    }
}

/// 任务执行器
///
/// 每次 [`Worker::execute`] 取一批到期任务，按调度策略排序后逐个（或有界并发地）
/// 加锁执行，直到停止条件满足；开启 `sleep_until_next_minute` 时每批之间休眠到下一分钟。
///
/// 内部状态由短临界区的互斥锁保护，`Arc<Worker>` 可以在 `execute` 运行期间
/// 从其它任务调用 [`Worker::stop`]。
pub struct Worker {
    name: String,
    scheduler: Arc<Scheduler>,
    runners: RunnerRegistry,
    tracker: TaskExecutionTracker,
    orchestrator: Arc<SchedulePolicyOrchestrator>,
    lock_store: Arc<dyn LockStore>,
    signal_store: Option<Arc<dyn SignalStore>>,
    event_dispatcher: Option<Arc<dyn EventDispatcher>>,
    clock: Arc<dyn Clock>,
    state: Mutex<WorkerState>,
    signal_received: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl Worker {
    pub fn new(
        scheduler: Arc<Scheduler>,
        runners: RunnerRegistry,
        lock_store: Arc<dyn LockStore>,
    ) -> Self {
        Self {
            name: DEFAULT_WORKER_NAME.to_string(),
            scheduler,
            runners,
            tracker: TaskExecutionTracker::new(),
            orchestrator: Arc::new(SchedulePolicyOrchestrator::with_builtin_policies()),
            lock_store,
            signal_store: None,
            event_dispatcher: None,
            clock: Arc::new(SystemClock),
            state: Mutex::new(WorkerState::new(WorkerConfiguration::create(), Utc::now())),
            signal_received: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_orchestrator(mut self, orchestrator: Arc<SchedulePolicyOrchestrator>) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_signal_store(mut self, signal_store: Arc<dyn SignalStore>) -> Self {
        self.signal_store = Some(signal_store);
        self
    }

    pub fn with_event_dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.event_dispatcher = Some(dispatcher);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runners(&self) -> &RunnerRegistry {
        &self.runners
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// 执行任务直到停止条件满足
    ///
    /// `tasks` 非空时第一轮只执行这些任务，之后的每一轮都从调度器获取到期任务。
    /// 单个任务的失败不会中断执行，只有获取或排序任务出错时才返回 `Err`。
    pub async fn execute(
        &self,
        configuration: WorkerConfiguration,
        tasks: Vec<Task>,
    ) -> SchedulerResult<()> {
        if self.runners.is_empty() {
            return Err(SchedulerError::UndefinedRunner("No runner found".to_string()));
        }

        {
            let mut state = self.state();
            if state.configuration.is_running {
                return Err(SchedulerError::Logic(format!("Worker {} 已在运行", self.name)));
            }
            let forked_from = state.configuration.forked_from.take();
            let is_fork = state.configuration.is_fork;

            state.configuration = configuration;
            state.configuration.is_running = true;
            state.configuration.should_stop = false;
            state.configuration.executed_tasks_count = 0;
            state.configuration.forked_from = forked_from;
            state.configuration.is_fork = is_fork;
            state.failure_count = 0;
            state.started_at = self.clock.now();
        }
        self.signal_received.store(false, Ordering::SeqCst);

        let running = RunningGuard {
            worker: self,
            listener: self.spawn_signal_listener(),
        };
        info!("Worker {} 启动 (runners: {:?})", self.name, self.runners.names());
        self.dispatch(SchedulerEvent::worker_started());

        let result = self.run(tasks).await;
        drop(running);

        let executed_tasks = self.state().configuration.executed_tasks_count;

        match &result {
            Ok(()) => info!("Worker {} 已停止，共执行 {} 个任务", self.name, executed_tasks),
            Err(e) => error!("Worker {} 异常停止: {}", self.name, e),
        }
        self.dispatch(SchedulerEvent::worker_stopped(executed_tasks));
        result
    }

    /// 请求停止，当前任务结束后生效，休眠中的 Worker 会被立即唤醒
    pub fn stop(&self) {
        self.state().configuration.should_stop = true;
        // 只唤醒正在休眠的 Worker，不留下许可
        self.wake.notify_waiters();
        info!("Worker {} 收到停止请求", self.name);
    }

    /// 重置运行参数并清空失败任务
    pub fn restart(&self) {
        {
            let mut state = self.state();
            let mut configuration = WorkerConfiguration::create();
            configuration.is_running = state.configuration.is_running;
            configuration.is_fork = state.configuration.is_fork;
            configuration.forked_from = state.configuration.forked_from.clone();

            state.configuration = configuration;
            state.failed_tasks = TaskList::new();
            state.failure_count = 0;
        }
        self.signal_received.store(false, Ordering::SeqCst);

        info!("Worker {} 已重启", self.name);
        self.dispatch(SchedulerEvent::WorkerRestarted {
            occurred_at: self.clock.now(),
        });
    }

    /// 复制出一个共享依赖、状态独立的 Worker
    pub fn fork(&self) -> Worker {
        let mut configuration = self.configuration();
        configuration.is_fork = true;
        configuration.forked_from = Some(self.name.clone());
        configuration.is_running = false;
        configuration.should_stop = false;
        configuration.executed_tasks_count = 0;
        configuration.currently_executed_task = None;
        configuration.last_executed_task = None;

        let fork = Worker {
            name: format!("{}.fork", self.name),
            scheduler: Arc::clone(&self.scheduler),
            runners: self.runners.clone(),
            tracker: self.tracker,
            orchestrator: Arc::clone(&self.orchestrator),
            lock_store: Arc::clone(&self.lock_store),
            signal_store: self.signal_store.clone(),
            event_dispatcher: self.event_dispatcher.clone(),
            clock: Arc::clone(&self.clock),
            state: Mutex::new(WorkerState::new(configuration, self.clock.now())),
            signal_received: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        };

        debug!("Worker {} 派生出 {}", self.name, fork.name);
        self.dispatch(SchedulerEvent::WorkerForked {
            forked_from: self.name.clone(),
            occurred_at: self.clock.now(),
        });
        fork
    }

    /// 移出失败记录并重新执行该任务
    pub async fn retry_failed_task(&self, name: &str) -> SchedulerResult<()> {
        let failed = self.remove_failed_task(name)?;
        info!("重试失败任务: {} (上次失败原因: {})", name, failed.reason());
        self.handle_task(failed.into_task()).await;
        Ok(())
    }

    pub fn remove_failed_task(&self, name: &str) -> SchedulerResult<FailedTask> {
        self.state()
            .failed_tasks
            .remove(&failed_task_name(name))
            .ok_or_else(|| SchedulerError::task_not_found(name))
    }

    pub fn failed_tasks(&self) -> TaskList<FailedTask> {
        self.state().failed_tasks.clone()
    }

    pub fn last_executed_task(&self) -> Option<Task> {
        self.state().configuration.last_executed_task.clone()
    }

    pub fn configuration(&self) -> WorkerConfiguration {
        self.state().configuration.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state().configuration.is_running
    }

    async fn run(&self, tasks: Vec<Task>) -> SchedulerResult<()> {
        let mut explicit = Some(tasks).filter(|tasks| !tasks.is_empty());

        loop {
            if self.should_stop().await {
                break;
            }

            let configuration = self.configuration();
            let batch: TaskList = match explicit.take() {
                Some(tasks) => tasks.into(),
                None => {
                    self.scheduler
                        .get_due_tasks(
                            configuration.should_retrieve_tasks_lazily(),
                            configuration.is_strictly_checking_date(),
                        )
                        .await?
                }
            };

            if batch.is_empty() && !configuration.is_sleeping_until_next_minute() {
                debug!("没有到期任务，Worker {} 停止", self.name);
                break;
            }

            let batch = self
                .orchestrator
                .sort(configuration.execution_policy(), batch)?;
            let now = self.clock.now();
            let runnable: Vec<Task> = batch
                .into_iter()
                .filter(|task| self.is_runnable(task, now))
                .collect();
            debug!("Worker {} 本轮执行 {} 个任务", self.name, runnable.len());

            if configuration.concurrency() > 1 {
                stream::iter(runnable)
                    .for_each_concurrent(configuration.concurrency(), |task| async move {
                        if !self.should_stop().await {
                            self.handle_task(task).await;
                        }
                    })
                    .await;
            } else {
                for task in runnable {
                    if self.should_stop().await {
                        break;
                    }
                    self.handle_task(task).await;
                }
            }

            if !configuration.is_sleeping_until_next_minute() {
                break;
            }
            self.sleep_until_next_minute(configuration.sleep_duration_delay())
                .await;
        }

        Ok(())
    }

    fn is_runnable(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if !task.is_enabled() {
            info!("任务 {} 未启用 ({:?})，跳过", task.name(), task.state);
            return false;
        }
        if !task.is_within_execution_window(now) {
            info!("任务 {} 不在执行时间窗口内，跳过", task.name());
            return false;
        }
        if task.has_reached_max_executions() {
            info!(
                "任务 {} 已执行 {} 次，达到上限，跳过",
                task.name(),
                task.execution_count
            );
            return false;
        }
        true
    }

    async fn handle_task(&self, task: Task) {
        let lock_key = task.lock_key();
        match self.lock_store.acquire(&lock_key).await {
            Ok(true) => {}
            Ok(false) => {
                info!("任务 {} 的锁 {} 已被占用，本轮跳过", task.name(), lock_key);
                return;
            }
            Err(e) => {
                warn!("获取任务 {} 的锁失败，本轮跳过: {}", task.name(), e);
                return;
            }
        }

        self.dispatch(SchedulerEvent::WorkerRunning {
            idle: false,
            occurred_at: self.clock.now(),
        });

        self.run_task(task).await;

        if let Err(e) = self.lock_store.release(&lock_key).await {
            warn!("释放锁 {} 失败: {}", lock_key, e);
        }
        self.state().configuration.currently_executed_task = None;
        self.dispatch(SchedulerEvent::WorkerRunning {
            idle: true,
            occurred_at: self.clock.now(),
        });
    }

    async fn run_task(&self, mut task: Task) {
        let runner = match self.runners.find(&task) {
            Ok(runner) => runner,
            Err(e) => {
                self.record_failure(task, e);
                return;
            }
        };

        task.arrival_time = Some(self.clock.now());
        if let Some(delay) = task.execution_delay.filter(|delay| *delay > 0) {
            debug!("任务 {} 延迟 {}ms 执行", task.name(), delay);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        task.execution_start_time = Some(self.clock.now());
        task.execution_state = ExecutionState::Running;
        self.state().configuration.currently_executed_task = Some(task.clone());
        self.dispatch(SchedulerEvent::task_executing(&task));
        info!("开始执行任务: {} (runner: {})", task.name(), runner.name());

        let tracking = task.tracked.then(|| self.tracker.start_tracking(&task));
        let result = self.invoke(runner.as_ref(), &task).await;
        if let Some(tracking) = tracking {
            self.tracker.end_tracking(tracking, &mut task);
        }

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                self.record_failure(task, e);
                return;
            }
        };

        task.execution_state = if output.task.execution_state.is_pending_retry() {
            output.task.execution_state
        } else if output.is_success() {
            ExecutionState::Succeed
        } else {
            ExecutionState::Errored
        };
        let finished_at = self.clock.now();
        task.execution_end_time = Some(finished_at);
        task.last_execution = Some(finished_at);
        task.execution_count = task.execution_count.saturating_add(1);
        if task.store_output {
            task.last_output = output.output.clone();
        }

        if output.is_success() {
            info!("任务执行完成: {}", task.name());
        } else {
            warn!(
                "任务 {} 返回错误输出: {}",
                task.name(),
                output.output.as_deref().unwrap_or_default()
            );
        }

        self.after_execution(&task).await;
        self.dispatch(SchedulerEvent::task_executed(&task, &output));

        let mut state = self.state();
        state.configuration.executed_tasks_count += 1;
        state.configuration.last_executed_task = Some(task);
    }

    /// 调用 Runner，错误按 `max_retries` 重试，panic 视为执行错误
    async fn invoke(&self, runner: &dyn Runner, task: &Task) -> SchedulerResult<Output> {
        let retries = task.max_retries.unwrap_or(0);
        let mut attempt = 0;
        loop {
            let result = match AssertUnwindSafe(runner.run(task)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(SchedulerError::TaskExecution(format!(
                    "Runner {} 执行任务 {} 时 panic: {}",
                    runner.name(),
                    task.name(),
                    panic_message(panic.as_ref())
                ))),
            };
            match result {
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!(
                        "任务 {} 执行失败，第 {}/{} 次重试: {}",
                        task.name(),
                        attempt,
                        retries,
                        e
                    );
                }
                result => return result,
            }
        }
    }

    /// 把执行信息合并到存储中的最新任务上回写，失败只记录日志
    async fn after_execution(&self, task: &Task) {
        let name = task.name();

        if task.delete_after_execute {
            match self.scheduler.unschedule(name).await {
                Ok(()) => info!("任务 {} 执行后已删除", name),
                Err(e) if e.is_not_found() => debug!("任务 {} 未注册，无需删除", name),
                Err(e) => warn!("删除任务 {} 失败: {}", name, e),
            }
            return;
        }

        // 执行期间任务可能被暂停或修改，只覆盖执行信息
        let mut stored = match self.scheduler.get_task(name).await {
            Ok(stored) => stored,
            Err(e) if e.is_not_found() => {
                debug!("任务 {} 未注册，跳过执行信息回写", name);
                return;
            }
            Err(e) => {
                warn!("读取任务 {} 失败，跳过执行信息回写: {}", name, e);
                return;
            }
        };
        stored.execution_state = task.execution_state;
        stored.last_execution = task.last_execution;
        stored.arrival_time = task.arrival_time;
        stored.execution_start_time = task.execution_start_time;
        stored.execution_end_time = task.execution_end_time;
        stored.execution_computation_time = task.execution_computation_time;
        stored.execution_memory_usage = task.execution_memory_usage;
        stored.execution_count = stored.execution_count.saturating_add(1);
        if task.store_output {
            stored.last_output = task.last_output.clone();
        }
        let still_enabled = stored.is_enabled();

        match self.scheduler.update(name, stored).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!("任务 {} 未注册，跳过执行信息回写", name);
                return;
            }
            Err(e) => warn!("回写任务 {} 的执行信息失败: {}", name, e),
        }

        if task.single_run && still_enabled {
            match self.scheduler.pause(name).await {
                Ok(()) => info!("一次性任务 {} 已暂停", name),
                Err(e) => warn!("暂停一次性任务 {} 失败: {}", name, e),
            }
        }
    }

    fn record_failure(&self, mut task: Task, error: SchedulerError) {
        error!("任务 {} 执行失败: {}", task.name(), error);
        task.execution_state = ExecutionState::Errored;

        let failed = FailedTask::new(task, error.to_string());
        self.dispatch(SchedulerEvent::task_failed(&failed));

        let mut state = self.state();
        state.failure_count += 1;
        state.failed_tasks.add(failed);
    }

    async fn should_stop(&self) -> bool {
        let (conditions, started_at, executed, failures) = {
            let state = self.state();
            if state.configuration.should_stop {
                return true;
            }
            (
                state.configuration.stop_conditions().clone(),
                state.started_at,
                state.configuration.executed_tasks_count,
                state.failure_count,
            )
        };
        let elapsed = (self.clock.now() - started_at).to_std().unwrap_or_default();

        let reason = if self.signal_received.load(Ordering::SeqCst) {
            Some("收到进程信号".to_string())
        } else if let Some(limit) = conditions.task_limit.filter(|limit| executed >= *limit) {
            Some(format!("已执行 {executed} 个任务，达到上限 {limit}"))
        } else if let Some(limit) = conditions.failure_limit.filter(|limit| failures >= *limit) {
            Some(format!("已失败 {failures} 次，达到上限 {limit}"))
        } else if let Some(limit) = conditions.time_limit.filter(|limit| elapsed >= *limit) {
            Some(format!("运行时间达到上限 {limit:?}"))
        } else if conditions.stop_on_next_task_signal && self.stop_requested_since(started_at).await
        {
            Some("收到停止下一个任务的请求".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => {
                info!("Worker {} 停止: {}", self.name, reason);
                self.state().configuration.should_stop = true;
                true
            }
            None => false,
        }
    }

    async fn stop_requested_since(&self, started_at: DateTime<Utc>) -> bool {
        let Some(store) = &self.signal_store else {
            return false;
        };
        match store.get(STOP_NEXT_TASK_KEY).await {
            Ok(Some(requested_at)) => requested_at > started_at,
            Ok(None) => false,
            Err(e) => {
                warn!("读取停止信号失败: {}", e);
                false
            }
        }
    }

    async fn sleep_until_next_minute(&self, delay: u64) {
        let notified = self.wake.notified();
        tokio::pin!(notified);
        // 先登记等待，再检查停止条件，检查之后的 stop() 也能唤醒
        notified.as_mut().enable();
        if self.should_stop().await {
            return;
        }

        let now = self.clock.now();
        let sleep_seconds = 60 - u64::from(now.second()) + delay;

        info!("Worker {} 休眠 {} 秒", self.name, sleep_seconds);
        self.dispatch(SchedulerEvent::WorkerSleeping {
            sleep_seconds,
            occurred_at: now,
        });

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(sleep_seconds)) => {},
            _ = &mut notified => {
                debug!("Worker {} 被提前唤醒", self.name);
            },
        }
    }

    fn spawn_signal_listener(&self) -> Option<JoinHandle<()>> {
        if !self.state().configuration.stop_conditions().stop_on_signal {
            return None;
        }

        let received = Arc::clone(&self.signal_received);
        let wake = Arc::clone(&self.wake);
        Some(tokio::spawn(async move {
            wait_for_signal().await;
            received.store(true, Ordering::SeqCst);
            wake.notify_waiters();
        }))
    }

    fn state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, event: SchedulerEvent) {
        if let Some(dispatcher) = &self.event_dispatcher {
            dispatcher.dispatch(event);
        }
    }
}

/// `execute` 结束时复位运行状态，Runner panic 或 future 被取消时同样生效
struct RunningGuard<'a> {
    worker: &'a Worker,
    listener: Option<JoinHandle<()>>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        let mut state = self.worker.state();
        state.configuration.is_running = false;
        state.configuration.currently_executed_task = None;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知 panic".to_string()
    }
}

fn failed_task_name(name: &str) -> String {
    if name.ends_with(".failed") {
        name.to_string()
    } else {
        format!("{name}.failed")
    }
}
