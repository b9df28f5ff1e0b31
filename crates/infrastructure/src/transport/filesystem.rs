use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use cadence_core::{
    models::{LazyTask, LazyTaskList, Task, TaskList},
    traits::{TaskSerializer, Transport},
    SchedulerError, SchedulerResult,
};

use super::{ensure_same_name, pause_task, resume_task, ListOrdering};
use crate::serializer::JsonTaskSerializer;

const TASK_FILE_EXTENSION: &str = "json";

/// 文件系统传输层
///
/// 每个任务保存为目录下的 `<name>.json`，目录在首次写入时创建。
/// 写入先落到临时文件再替换，其它进程不会读到写了一半的任务。
/// I/O 与解析错误统一转换为 `Transport` 错误。
#[derive(Clone)]
pub struct FilesystemTransport {
    directory: PathBuf,
    serializer: Arc<dyn TaskSerializer>,
    ordering: ListOrdering,
}

impl FilesystemTransport {
    pub fn new(directory: impl Into<PathBuf>, ordering: ListOrdering) -> Self {
        Self {
            directory: directory.into(),
            serializer: Arc::new(JsonTaskSerializer::new()),
            ordering,
        }
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn TaskSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn read_task(&self, name: &str) -> SchedulerResult<Task> {
        read_task_file(&self.directory, self.serializer.as_ref(), name).await
    }

    async fn write_task(&self, task: &Task) -> SchedulerResult<()> {
        let path = task_path(&self.directory, task.name())?;
        let staging = self.stage(task).await?;
        if let Err(e) = fs::rename(&staging, &path).await {
            discard(&staging).await;
            return Err(io_error("替换任务文件", &path, e));
        }
        Ok(())
    }

    /// 把序列化后的任务写入同目录下的临时文件
    async fn stage(&self, task: &Task) -> SchedulerResult<PathBuf> {
        let path = task_path(&self.directory, task.name())?;
        let bytes = self.serializer.serialize(task)?;
        let staging = path.with_extension(format!(
            "{TASK_FILE_EXTENSION}.{}.tmp",
            Uuid::new_v4().simple()
        ));
        if let Err(e) = fs::write(&staging, bytes).await {
            discard(&staging).await;
            return Err(io_error("写入临时任务文件", &staging, e));
        }
        Ok(staging)
    }

    async fn exists(&self, name: &str) -> SchedulerResult<bool> {
        let path = task_path(&self.directory, name)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| io_error("检查任务文件", &path, e))
    }

    /// 按文件名排序的任务名称，目录不存在时为空
    async fn task_names(&self) -> SchedulerResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("读取任务目录", &self.directory, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("读取任务目录", &self.directory, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(TASK_FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn supplier(&self, name: &str) -> LazyTask {
        let directory = self.directory.clone();
        let serializer = self.serializer.clone();
        let key = name.to_string();
        LazyTask::new(
            name,
            Arc::new(move || -> BoxFuture<'static, SchedulerResult<Task>> {
                let directory = directory.clone();
                let serializer = serializer.clone();
                let key = key.clone();
                Box::pin(async move { read_task_file(&directory, serializer.as_ref(), &key).await })
            }),
        )
    }
}

#[async_trait]
impl Transport for FilesystemTransport {
    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.read_task(name).await
    }

    async fn get_lazy(&self, name: &str) -> SchedulerResult<LazyTask> {
        if !self.exists(name).await? {
            return Err(SchedulerError::task_not_found(name));
        }
        Ok(self.supplier(name))
    }

    async fn list(&self) -> SchedulerResult<TaskList> {
        let mut tasks = TaskList::new();
        for name in self.task_names().await? {
            match self.read_task(&name).await {
                Ok(task) => tasks.add(task),
                // 文件在列举与读取之间被删除
                Err(e) if e.is_not_found() => continue,
                Err(e) => warn!("跳过无法读取的任务文件 {name}: {e}"),
            }
        }
        self.ordering.apply(tasks)
    }

    async fn list_lazy(&self) -> SchedulerResult<LazyTaskList> {
        // 排序需要读取完整任务
        let names = if self.ordering.is_sorting() {
            self.list().await?.names()
        } else {
            self.task_names().await?
        };
        Ok(names.iter().map(|name| self.supplier(name)).collect())
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        let path = task_path(&self.directory, task.name())?;
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| io_error("创建任务目录", &self.directory, e))?;

        // 硬链接在目标已存在时失败，创建与查重是同一个原子操作
        let staging = self.stage(&task).await?;
        let linked = fs::hard_link(&staging, &path).await;
        discard(&staging).await;
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SchedulerError::already_scheduled(task.name()));
            }
            Err(e) => return Err(io_error("创建任务文件", &path, e)),
        }

        debug!("任务 {} 已写入 {}", task.name(), path.display());
        Ok(())
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        ensure_same_name(name, &task)?;
        if !self.exists(name).await? {
            return Err(SchedulerError::task_not_found(name));
        }
        self.write_task(&task).await
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        let path = task_path(&self.directory, name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SchedulerError::task_not_found(name)),
            Err(e) => Err(io_error("删除任务文件", &path, e)),
        }
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        let mut task = self.read_task(name).await?;
        pause_task(&mut task)?;
        self.write_task(&task).await
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        let mut task = self.read_task(name).await?;
        resume_task(&mut task)?;
        self.write_task(&task).await
    }

    async fn clear(&self) -> SchedulerResult<()> {
        for name in self.task_names().await? {
            match self.delete(&name).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!("清空任务目录时删除 {name} 失败: {e}");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn count(&self) -> SchedulerResult<usize> {
        Ok(self.task_names().await?.len())
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}

fn task_path(directory: &Path, name: &str) -> SchedulerResult<PathBuf> {
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(SchedulerError::InvalidArgument(format!(
            "任务名称不能作为文件名: {name}"
        )));
    }
    Ok(directory.join(format!("{name}.{TASK_FILE_EXTENSION}")))
}

async fn read_task_file(
    directory: &Path,
    serializer: &dyn TaskSerializer,
    name: &str,
) -> SchedulerResult<Task> {
    let path = task_path(directory, name)?;
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(SchedulerError::task_not_found(name));
        }
        Err(e) => return Err(io_error("读取任务文件", &path, e)),
    };
    serializer.deserialize(&bytes).map_err(|e| {
        SchedulerError::from_backend(format!("解析任务文件失败 ({}): {e}", path.display()))
    })
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("删除临时任务文件 {} 失败: {e}", path.display());
        }
    }
}

fn io_error(action: &str, path: &Path, error: std::io::Error) -> SchedulerError {
    SchedulerError::transport(format!("{action}失败 ({}): {error}", path.display()))
}
