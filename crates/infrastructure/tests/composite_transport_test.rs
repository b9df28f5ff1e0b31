use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use cadence_core::{
    traits::Transport, SchedulerError, SchedulerResult, Task, TaskList,
};
use cadence_infrastructure::{
    FailoverTransport, InMemoryTransport, LazyTransport, LongTailTransport, RoundRobinTransport,
    TransportBuilder, ALL_TRANSPORTS_FAILED, NO_TRANSPORT_FOUND,
};

/// 所有操作都失败的传输层
#[derive(Default)]
struct BrokenTransport {
    calls: AtomicUsize,
}

impl BrokenTransport {
    fn fail<T>(&self) -> SchedulerResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SchedulerError::transport("后端不可用"))
    }
}

#[async_trait]
impl Transport for BrokenTransport {
    async fn get(&self, _name: &str) -> SchedulerResult<Task> {
        self.fail()
    }

    async fn list(&self) -> SchedulerResult<TaskList> {
        self.fail()
    }

    async fn create(&self, _task: Task) -> SchedulerResult<()> {
        self.fail()
    }

    async fn update(&self, _name: &str, _task: Task) -> SchedulerResult<()> {
        self.fail()
    }

    async fn delete(&self, _name: &str) -> SchedulerResult<()> {
        self.fail()
    }

    async fn pause(&self, _name: &str) -> SchedulerResult<()> {
        self.fail()
    }

    async fn resume(&self, _name: &str) -> SchedulerResult<()> {
        self.fail()
    }

    async fn clear(&self) -> SchedulerResult<()> {
        self.fail()
    }

    fn name(&self) -> &str {
        "broken"
    }
}

fn create_test_task(name: &str) -> Task {
    Task::new(name).unwrap()
}

fn assert_transport_error(result: SchedulerResult<impl std::fmt::Debug>, expected: &str) {
    match result {
        Err(SchedulerError::Transport(message)) => assert!(
            message.starts_with(expected),
            "错误信息 {message} 应以 {expected} 开头"
        ),
        other => panic!("应返回传输错误，实际为 {other:?}"),
    }
}

#[tokio::test]
async fn test_failover_swallows_member_error() {
    let broken = Arc::new(BrokenTransport::default());
    let memory = Arc::new(InMemoryTransport::default());
    memory.create(create_test_task("foo")).await.unwrap();

    let failover = FailoverTransport::new(vec![broken.clone(), memory.clone()]);
    assert_eq!(failover.get("foo").await.unwrap().name(), "foo");
    assert_eq!(broken.calls.load(Ordering::SeqCst), 1);

    failover.create(create_test_task("bar")).await.unwrap();
    assert!(memory.get("bar").await.is_ok());
    assert_eq!(failover.name(), "failover");
}

#[tokio::test]
async fn test_failover_without_members() {
    let failover = FailoverTransport::new(vec![]);

    assert_transport_error(failover.get("foo").await, NO_TRANSPORT_FOUND);
    assert_transport_error(failover.list().await, NO_TRANSPORT_FOUND);
    assert_transport_error(failover.create(create_test_task("foo")).await, NO_TRANSPORT_FOUND);
    assert_transport_error(failover.update("foo", create_test_task("foo")).await, NO_TRANSPORT_FOUND);
    assert_transport_error(failover.delete("foo").await, NO_TRANSPORT_FOUND);
    assert_transport_error(failover.pause("foo").await, NO_TRANSPORT_FOUND);
    assert_transport_error(failover.resume("foo").await, NO_TRANSPORT_FOUND);
    assert_transport_error(failover.clear().await, NO_TRANSPORT_FOUND);
}

#[tokio::test]
async fn test_failover_all_members_failed() {
    let failover = FailoverTransport::new(vec![
        Arc::new(BrokenTransport::default()),
        Arc::new(BrokenTransport::default()),
    ]);
    assert_transport_error(failover.list().await, ALL_TRANSPORTS_FAILED);
}

#[tokio::test]
async fn test_round_robin_rotates_after_quantum() {
    let first = Arc::new(InMemoryTransport::default());
    let second = Arc::new(InMemoryTransport::default());
    let round_robin = RoundRobinTransport::new(vec![first.clone(), second.clone()], 2).unwrap();

    for name in ["a", "b", "c", "d", "e"] {
        round_robin.create(create_test_task(name)).await.unwrap();
    }

    assert_eq!(first.list().await.unwrap().names(), vec!["a", "b", "e"]);
    assert_eq!(second.list().await.unwrap().names(), vec!["c", "d"]);
    assert_eq!(round_robin.quantum(), 2);
}

#[tokio::test]
async fn test_round_robin_falls_through_failures() {
    let broken = Arc::new(BrokenTransport::default());
    let memory = Arc::new(InMemoryTransport::default());
    let round_robin = RoundRobinTransport::new(vec![broken.clone(), memory.clone()], 1).unwrap();

    round_robin.create(create_test_task("foo")).await.unwrap();
    assert_eq!(round_robin.current_start(), 1);
    round_robin.create(create_test_task("bar")).await.unwrap();

    assert_eq!(memory.count().await.unwrap(), 2);
}

#[test]
fn test_round_robin_rejects_zero_quantum() {
    assert!(matches!(
        RoundRobinTransport::new(vec![Arc::new(InMemoryTransport::default())], 0),
        Err(SchedulerError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_long_tail_prefers_fewest_tasks() {
    let busy = Arc::new(InMemoryTransport::default());
    busy.create(create_test_task("existing")).await.unwrap();
    let idle = Arc::new(InMemoryTransport::default());
    let broken = Arc::new(BrokenTransport::default());

    let long_tail = LongTailTransport::new(vec![broken, busy.clone(), idle.clone()]);
    long_tail.create(create_test_task("foo")).await.unwrap();
    assert!(idle.get("foo").await.is_ok());

    // 两个成员任务数相同时保持原顺序
    long_tail.create(create_test_task("bar")).await.unwrap();
    assert!(busy.get("bar").await.is_ok());
}

#[tokio::test]
async fn test_lazy_transport_initializes_on_first_use() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let builder: TransportBuilder = Arc::new(move || -> SchedulerResult<Arc<dyn Transport>> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(InMemoryTransport::default()))
    });

    let lazy = LazyTransport::from_builder(builder);
    assert!(!lazy.is_initialized());

    lazy.create(create_test_task("foo")).await.unwrap();
    assert!(lazy.is_initialized());
    assert_eq!(lazy.list().await.unwrap().len(), 1);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_lazy_transport_on_get() {
    let lazy = LazyTransport::new(Arc::new(InMemoryTransport::default()));
    assert!(!lazy.is_initialized());
    assert!(lazy.get("foo").await.unwrap_err().is_not_found());
    assert!(lazy.is_initialized());
}

#[tokio::test]
async fn test_nested_composites() {
    let inner = Arc::new(FailoverTransport::new(vec![
        Arc::new(BrokenTransport::default()),
        Arc::new(InMemoryTransport::default()),
    ]));
    let outer = LazyTransport::new(inner);

    outer.create(create_test_task("foo")).await.unwrap();
    outer.pause("foo").await.unwrap();
    assert!(outer.get("foo").await.unwrap().is_paused());
}
