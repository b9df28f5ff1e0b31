use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use cadence_core::{
    models::{LazyTaskList, NamedTask, Task, TaskList},
    traits::{
        Clock, EventDispatcher, ExpressionEvaluator, MessageBus, SchedulerMessage, SystemClock,
        Transport,
    },
    SchedulerError, SchedulerEvent, SchedulerResult,
};

use crate::cron_utils::CronExpressionEvaluator;

/// 调度器
///
/// 任务注册与移除的唯一入口，存储委托给传输层。
pub struct Scheduler {
    transport: Arc<dyn Transport>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    event_dispatcher: Option<Arc<dyn EventDispatcher>>,
    message_bus: Option<Arc<dyn MessageBus>>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl Scheduler {
    pub fn new(transport: Arc<dyn Transport>, timezone: Tz) -> Self {
        Self {
            transport,
            evaluator: Arc::new(CronExpressionEvaluator::new()),
            event_dispatcher: None,
            message_bus: None,
            clock: Arc::new(SystemClock),
            timezone,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_event_dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.event_dispatcher = Some(dispatcher);
        self
    }

    pub fn with_message_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.message_bus = Some(bus);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// 调度任务
    ///
    /// 记录调度时间，未设置时区的任务使用调度器时区。
    pub async fn schedule(&self, mut task: Task) -> SchedulerResult<()> {
        self.prepare(&mut task)?;
        task.scheduled_at = Some(self.clock.now());

        self.transport.create(task.clone()).await?;
        info!(
            "任务已调度: {} (表达式: {}, 时区: {})",
            task.name(),
            task.expression,
            task.timezone.as_deref().unwrap_or_default()
        );

        self.dispatch(SchedulerEvent::task_scheduled(&task));
        Ok(())
    }

    /// 取消调度
    pub async fn unschedule(&self, name: &str) -> SchedulerResult<()> {
        self.transport.delete(name).await?;
        info!("任务已取消调度: {name}");

        self.dispatch(SchedulerEvent::task_unscheduled(name));
        Ok(())
    }

    /// 更新任务定义
    pub async fn update(&self, name: &str, mut task: Task) -> SchedulerResult<()> {
        if task.name() != name {
            return Err(SchedulerError::InvalidArgument(format!(
                "任务名称不可修改: {} -> {}",
                name,
                task.name()
            )));
        }
        self.prepare(&mut task)?;
        self.transport.update(name, task).await
    }

    pub async fn pause(&self, name: &str) -> SchedulerResult<()> {
        self.transport.pause(name).await?;
        info!("任务已暂停: {name}");
        Ok(())
    }

    pub async fn resume(&self, name: &str) -> SchedulerResult<()> {
        self.transport.resume(name).await?;
        info!("任务已恢复: {name}");
        Ok(())
    }

    /// 移除任务后以新的调度时间重新创建
    ///
    /// `is_async` 为 true 且配置了消息总线时，只投递消息，由消费者调用 [`Scheduler::handle_message`]。
    pub async fn yield_task(&self, name: &str, is_async: bool) -> SchedulerResult<()> {
        if is_async {
            match &self.message_bus {
                Some(bus) => {
                    bus.dispatch(SchedulerMessage::Yield {
                        task_name: name.to_string(),
                    })
                    .await?;
                    debug!("任务 {name} 的重新调度已投递到消息总线");
                    return Ok(());
                }
                None => warn!("未配置消息总线，任务 {name} 改为同步重新调度"),
            }
        }

        let task = self.transport.get(name).await?;
        self.unschedule(name).await?;
        self.schedule(task).await
    }

    /// 处理消息总线投递的调度消息
    pub async fn handle_message(&self, message: SchedulerMessage) -> SchedulerResult<()> {
        match message {
            SchedulerMessage::Yield { task_name } => self.yield_task(&task_name, false).await,
            SchedulerMessage::Payload { .. } => Err(SchedulerError::Logic(
                "调度器无法处理任务消息".to_string(),
            )),
        }
    }

    pub async fn get_task(&self, name: &str) -> SchedulerResult<Task> {
        self.transport.get(name).await
    }

    pub async fn get_tasks(&self) -> SchedulerResult<TaskList> {
        self.transport.list().await
    }

    pub async fn get_tasks_lazy(&self) -> SchedulerResult<LazyTaskList> {
        self.transport.list_lazy().await
    }

    /// 获取当前到期的任务
    ///
    /// `lazy` 为 true 时逐个加载任务再判断；`strict` 为 true 时只匹配当前分钟。
    /// 表达式无法解析的任务会被跳过并记录警告。
    pub async fn get_due_tasks(&self, lazy: bool, strict: bool) -> SchedulerResult<TaskList> {
        let now = self.clock.now();

        let tasks = if lazy {
            let mut tasks = TaskList::new();
            for entry in self.transport.list_lazy().await? {
                match entry.load().await {
                    Ok(task) => tasks.add(task),
                    // 列举之后被移除的任务
                    Err(e) if e.is_not_found() => {
                        debug!("任务 {} 已不存在，跳过", entry.name());
                    }
                    Err(e) => return Err(e),
                }
            }
            tasks
        } else {
            self.transport.list().await?
        };

        let due = tasks.filter(|task| self.is_due(task, now, strict));
        debug!("共 {} 个任务，其中 {} 个到期", tasks.len(), due.len());
        Ok(due)
    }

    /// 任务的下一次执行时间
    pub async fn next_execution(&self, name: &str) -> SchedulerResult<Option<DateTime<Utc>>> {
        let task = self.transport.get(name).await?;
        let tz = self.task_timezone(&task)?;
        self.evaluator
            .next_run(&task.expression, tz, self.clock.now())
    }

    /// 清空传输层，仅重新注册 `@reboot` 任务
    pub async fn reboot(&self) -> SchedulerResult<()> {
        let reboot_tasks = self.transport.list().await?.filter(Task::is_reboot_task);

        self.transport.clear().await?;
        for task in reboot_tasks.iter() {
            self.transport.create(task.clone()).await?;
        }

        info!("调度器已重启，重新注册 {} 个任务", reboot_tasks.len());
        self.dispatch(SchedulerEvent::SchedulerRebooted {
            task_names: reboot_tasks.names(),
            occurred_at: self.clock.now(),
        });
        Ok(())
    }

    fn is_due(&self, task: &Task, now: DateTime<Utc>, strict: bool) -> bool {
        let tz = match self.task_timezone(task) {
            Ok(tz) => tz,
            Err(e) => {
                warn!("跳过任务 {}: {e}", task.name());
                return false;
            }
        };

        match self
            .evaluator
            .is_due(&task.expression, tz, task.last_execution, now, strict)
        {
            Ok(due) => due && task.is_within_execution_window(now),
            Err(e) => {
                warn!("跳过任务 {}: {e}", task.name());
                false
            }
        }
    }

    fn task_timezone(&self, task: &Task) -> SchedulerResult<Tz> {
        match task.timezone.as_deref() {
            Some(name) => name.parse::<Tz>().map_err(|_| {
                SchedulerError::InvalidArgument(format!(
                    "任务 {} 的时区无效: {name}",
                    task.name()
                ))
            }),
            None => Ok(self.timezone),
        }
    }

    fn prepare(&self, task: &mut Task) -> SchedulerResult<()> {
        task.validate()?;
        self.evaluator.validate(&task.expression)?;
        if task.timezone.is_none() {
            task.timezone = Some(self.timezone.name().to_string());
        }
        self.task_timezone(task)?;
        Ok(())
    }

    fn dispatch(&self, event: SchedulerEvent) {
        if let Some(dispatcher) = &self.event_dispatcher {
            dispatcher.dispatch(event);
        }
    }
}
