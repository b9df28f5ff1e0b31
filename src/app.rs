use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use cadence_core::{
    traits::{LockStore, SchedulerMessage, SignalStore, STOP_NEXT_TASK_KEY},
    AppConfig, LockStoreKind,
};
use cadence_dispatcher::Scheduler;
use cadence_infrastructure::{
    FileLockStore, FileSignalStore, InMemoryLockStore, InMemoryMessageBus, InMemorySignalStore,
    LoggingNotifier, TracingEventDispatcher, TransportFactory,
};
use cadence_worker::{
    MessengerRunner, NotificationRunner, RunnerRegistry, Worker, WorkerConfiguration,
};

/// 主应用程序
///
/// 按配置组装传输层、调度器与 Worker。
pub struct Application {
    config: AppConfig,
    scheduler: Arc<Scheduler>,
    worker: Arc<Worker>,
    signal_store: Arc<dyn SignalStore>,
    message_bus: Arc<InMemoryMessageBus>,
}

impl Application {
    pub fn new(config: AppConfig) -> Result<Self> {
        let transport = TransportFactory::new()
            .create(&config.scheduler.transport_dsn)
            .with_context(|| format!("创建传输层失败: {}", config.scheduler.transport_dsn))?;

        let events = Arc::new(TracingEventDispatcher);
        let message_bus = Arc::new(InMemoryMessageBus::new());
        let scheduler = Arc::new(
            Scheduler::new(transport, config.scheduler.tz())
                .with_event_dispatcher(events.clone())
                .with_message_bus(message_bus.clone()),
        );

        let (lock_store, signal_store) = create_stores(&config)?;

        let runners = RunnerRegistry::with_builtin_runners()
            .with_runner(Arc::new(MessengerRunner::new(Some(message_bus.clone()))))
            .with_runner(Arc::new(NotificationRunner::new(Some(Arc::new(LoggingNotifier)))));

        let worker = Worker::new(scheduler.clone(), runners, lock_store)
            .with_name(worker_name())
            .with_signal_store(signal_store.clone())
            .with_event_dispatcher(events);

        Ok(Self {
            config,
            scheduler,
            worker: Arc::new(worker),
            signal_store,
            message_bus,
        })
    }

    /// 运行 Worker，收到关闭信号后等待当前任务结束再返回
    pub async fn run(&self, once: bool, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut configuration = WorkerConfiguration::from_config(
            &self.config.worker,
            &self.config.scheduler.execution_policy,
        );
        if once {
            configuration = configuration.with_sleep_until_next_minute(false);
        }

        info!(
            "Worker {} 启动，传输层: {}，调度策略: {}",
            self.worker.name(),
            self.scheduler.transport().name(),
            configuration.execution_policy()
        );

        let stopper = {
            let worker = Arc::clone(&self.worker);
            tokio::spawn(async move {
                if shutdown_rx.recv().await.is_ok() {
                    worker.stop();
                }
            })
        };
        let consumer = self.spawn_message_consumer();

        let result = self.worker.execute(configuration, vec![]).await;

        stopper.abort();
        consumer.abort();

        let failed = self.worker.failed_tasks();
        if !failed.is_empty() {
            warn!("本次运行有 {} 个任务失败: {:?}", failed.len(), failed.names());
        }
        result.context("Worker 执行失败")
    }

    /// 输出已调度的任务
    pub async fn list(&self) -> Result<()> {
        let tasks = self.scheduler.get_tasks().await.context("获取任务列表失败")?;
        if tasks.is_empty() {
            println!("没有已调度的任务");
            return Ok(());
        }

        println!(
            "{:<32} {:<16} {:<10} {:<10} {:<26} {:<26}",
            "名称", "表达式", "类型", "状态", "上次执行", "下次执行"
        );
        for task in tasks.iter() {
            let next = match self.scheduler.next_execution(task.name()).await {
                Ok(Some(next)) => next.to_rfc3339(),
                Ok(None) => "-".to_string(),
                Err(e) => {
                    debug!("计算任务 {} 的下次执行时间失败: {e}", task.name());
                    "?".to_string()
                }
            };
            println!(
                "{:<32} {:<16} {:<10} {:<10} {:<26} {:<26}",
                task.name(),
                task.expression,
                task.kind.name(),
                format!("{:?}", task.state),
                task.last_execution
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string()),
                next
            );
        }
        Ok(())
    }

    /// 写入停止信号，运行中的 Worker 在下一个任务前停止
    pub async fn stop_worker(&self) -> Result<()> {
        if self.config.lock.store == LockStoreKind::Memory {
            return Err(anyhow!(
                "内存信号存储无法跨进程生效，请将 lock.store 配置为 file"
            ));
        }

        let now = chrono::Utc::now();
        self.signal_store
            .request_stop_next_task(now)
            .await
            .context("写入停止信号失败")?;
        info!("已写入停止信号 {} = {}", STOP_NEXT_TASK_KEY, now.to_rfc3339());
        Ok(())
    }

    /// 消费消息总线：重新调度消息交给调度器，其余消息只记录日志
    fn spawn_message_consumer(&self) -> tokio::task::JoinHandle<()> {
        let bus = Arc::clone(&self.message_bus);
        let scheduler = Arc::clone(&self.scheduler);
        tokio::spawn(async move {
            while let Some(message) = bus.receive().await {
                match message {
                    SchedulerMessage::Payload { body } => info!("收到任务消息: {body}"),
                    message => {
                        if let Err(e) = scheduler.handle_message(message).await {
                            warn!("处理调度消息失败: {e}");
                        }
                    }
                }
            }
        })
    }
}

fn create_stores(config: &AppConfig) -> Result<(Arc<dyn LockStore>, Arc<dyn SignalStore>)> {
    let stores: (Arc<dyn LockStore>, Arc<dyn SignalStore>) = match config.lock.store {
        LockStoreKind::Memory => (
            Arc::new(InMemoryLockStore::new()),
            Arc::new(InMemorySignalStore::new()),
        ),
        LockStoreKind::File => {
            let directory = config
                .lock
                .path
                .as_deref()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("文件锁需要配置 lock.path"))?;
            info!("使用文件锁与信号存储: {}", directory.display());
            (
                Arc::new(FileLockStore::new(directory.join("locks"))),
                Arc::new(FileSignalStore::new(directory.join("signals"))),
            )
        }
    };
    Ok(stores)
}

fn worker_name() -> String {
    hostname::get()
        .map(|name| format!("{}-{}", name.to_string_lossy(), std::process::id()))
        .unwrap_or_else(|_| format!("worker-{}", std::process::id()))
}
