use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cadence_core::models::{FailedTask, LazyTask, LazyTaskList, Task, TaskList, TaskSupplier};
use cadence_core::{SchedulerError, SchedulerResult};
use futures::future::BoxFuture;

fn create_test_task(name: &str) -> Task {
    Task::new(name).unwrap()
}

#[test]
fn test_add_preserves_insertion_order() {
    let mut list = TaskList::new();
    list.add(create_test_task("foo"));
    list.add(create_test_task("bar"));
    list.add(create_test_task("baz"));

    assert_eq!(list.names(), vec!["foo", "bar", "baz"]);
    assert_eq!(list.len(), 3);
    assert!(list.has("bar"));
    assert!(!list.has("qux"));
}

#[test]
fn test_add_existing_name_replaces_in_place() {
    let mut list = TaskList::new();
    list.add(create_test_task("foo"));
    list.add(create_test_task("bar"));
    list.add(create_test_task("foo").with_expression("0 * * * *"));

    assert_eq!(list.names(), vec!["foo", "bar"]);
    assert_eq!(list.get("foo").unwrap().expression, "0 * * * *");
}

#[test]
fn test_remove_and_last() {
    let mut list: TaskList = vec![create_test_task("foo"), create_test_task("bar")].into();
    assert_eq!(list.last().unwrap().name(), "bar");

    let removed = list.remove("bar").unwrap();
    assert_eq!(removed.name(), "bar");
    assert!(list.remove("bar").is_none());
    assert_eq!(list.last().unwrap().name(), "foo");
}

#[test]
fn test_filter_map_walk() {
    let mut list: TaskList = vec![
        create_test_task("foo").with_tag("app"),
        create_test_task("bar"),
        create_test_task("baz").with_tag("app"),
    ]
    .into();

    let tagged = list.filter(|task| task.tags.contains(&"app".to_string()));
    assert_eq!(tagged.names(), vec!["foo", "baz"]);

    let expressions = list.map(|task| task.expression.clone());
    assert_eq!(expressions.len(), 3);

    list.walk(|task| task.expression = "@reboot".to_string());
    assert!(list.iter().all(Task::is_reboot_task));
}

#[test]
fn test_slice_and_find_by_name() {
    let list: TaskList = vec![
        create_test_task("foo"),
        create_test_task("bar"),
        create_test_task("baz"),
    ]
    .into();

    let found = list.find_by_name(&["baz", "foo"]);
    assert_eq!(found.names(), vec!["foo", "baz"]);

    assert!(matches!(
        list.slice(&["missing"]),
        Err(SchedulerError::InvalidArgument(_))
    ));
    assert_eq!(list.slice(&["bar"]).unwrap().len(), 1);
}

#[test]
fn test_chunk() {
    let list: TaskList = (0..5).map(|i| create_test_task(&format!("task_{i}"))).collect();

    let chunks = list.chunk(2).unwrap();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[2].names(), vec!["task_4"]);
    assert!(list.chunk(0).is_err());
}

#[test]
fn test_failed_task_list() {
    let mut failed: TaskList<FailedTask> = TaskList::new();
    failed.add(FailedTask::new(create_test_task("foo"), "boom"));

    let entry = failed.get("foo.failed").unwrap();
    assert_eq!(entry.task().name(), "foo");
    assert_eq!(entry.reason(), "boom");
}

#[tokio::test]
async fn test_lazy_task_hydrates_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let supplier: TaskSupplier = Arc::new(move || -> BoxFuture<'static, SchedulerResult<Task>> {
        counter.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Task::new("foo") })
    });

    let lazy = LazyTask::new("foo", supplier);
    assert!(!lazy.is_initialized());

    assert_eq!(lazy.task().await.unwrap().name(), "foo");
    assert_eq!(lazy.task().await.unwrap().name(), "foo");
    assert!(lazy.is_initialized());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_lazy_task_list_hydrate() {
    let tasks: TaskList = vec![create_test_task("foo"), create_test_task("bar")].into();
    let lazy: LazyTaskList = tasks.clone().into();

    assert!(lazy.is_initialized());
    let hydrated = lazy.hydrate().await.unwrap();
    assert_eq!(hydrated, tasks);
}
