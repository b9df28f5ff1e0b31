use std::sync::Arc;

use tracing::info;

use cadence_core::{
    traits::{CacheStore, TaskSerializer, Transport},
    SchedulerError, SchedulerResult,
};
use cadence_dispatcher::SchedulePolicyOrchestrator;

use super::{
    CacheTransport, Dsn, FailoverTransport, FilesystemTransport, InMemoryTransport, LazyTransport,
    ListOrdering, LongTailTransport, RoundRobinTransport, DEFAULT_EXECUTION_MODE, DEFAULT_QUANTUM,
};
use crate::cache_store::InMemoryCacheStore;
use crate::serializer::JsonTaskSerializer;

/// 根据 DSN 创建传输层
///
/// | scheme | 传输层 |
/// |---|---|
/// | `memory` | [`InMemoryTransport`] |
/// | `fs` / `filesystem` | [`FilesystemTransport`]，需要 `path` 参数 |
/// | `cache` | [`CacheTransport`] |
/// | `failover` | [`FailoverTransport`] |
/// | `roundrobin` | [`RoundRobinTransport`]，可选 `quantum` 参数 |
/// | `longtail` | [`LongTailTransport`] |
/// | `lazy` | [`LazyTransport`]，只能包含一个成员 |
///
/// 简单传输层的 host 部分即执行模式，为空时使用 `first_in_first_out`。
#[derive(Clone)]
pub struct TransportFactory {
    orchestrator: Arc<SchedulePolicyOrchestrator>,
    serializer: Arc<dyn TaskSerializer>,
    cache: Arc<dyn CacheStore>,
}

impl TransportFactory {
    pub fn new() -> Self {
        Self {
            orchestrator: Arc::new(SchedulePolicyOrchestrator::default()),
            serializer: Arc::new(JsonTaskSerializer::new()),
            cache: Arc::new(InMemoryCacheStore::new()),
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: Arc<SchedulePolicyOrchestrator>) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn TaskSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// `cache://` 传输层使用的缓存
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn create(&self, dsn: &str) -> SchedulerResult<Arc<dyn Transport>> {
        let parsed = Dsn::parse(dsn)?;
        let transport = self.from_dsn(&parsed)?;
        info!("已创建传输层 {} ({})", transport.name(), parsed);
        Ok(transport)
    }

    pub fn from_dsn(&self, dsn: &Dsn) -> SchedulerResult<Arc<dyn Transport>> {
        match dsn.scheme() {
            "memory" | "in-memory" => Ok(Arc::new(InMemoryTransport::new(self.ordering(dsn)?))),
            "fs" | "file" | "filesystem" => {
                let path = dsn.option("path").filter(|path| !path.is_empty()).ok_or_else(|| {
                    SchedulerError::InvalidArgument(format!("文件系统传输层缺少 path 参数: {dsn}"))
                })?;
                Ok(Arc::new(
                    FilesystemTransport::new(path, self.ordering(dsn)?)
                        .with_serializer(self.serializer.clone()),
                ))
            }
            "cache" => Ok(Arc::new(
                CacheTransport::new(self.cache.clone(), self.ordering(dsn)?)
                    .with_serializer(self.serializer.clone()),
            )),
            "failover" => Ok(Arc::new(FailoverTransport::new(self.members(dsn)?))),
            "roundrobin" | "round_robin" => {
                let quantum = match dsn.option("quantum") {
                    Some(value) => value.parse::<usize>().map_err(|_| {
                        SchedulerError::InvalidArgument(format!("无效的 quantum: {value}"))
                    })?,
                    None => DEFAULT_QUANTUM,
                };
                Ok(Arc::new(RoundRobinTransport::new(self.members(dsn)?, quantum)?))
            }
            "longtail" | "long_tail" => Ok(Arc::new(LongTailTransport::new(self.members(dsn)?))),
            "lazy" => {
                let [member] = dsn.members() else {
                    return Err(SchedulerError::InvalidArgument(format!(
                        "延迟传输层只能包含一个成员: {dsn}"
                    )));
                };
                let factory = self.clone();
                let member = member.clone();
                Ok(Arc::new(LazyTransport::from_builder(Arc::new(
                    move || -> SchedulerResult<Arc<dyn Transport>> { factory.from_dsn(&member) },
                ))))
            }
            other => Err(SchedulerError::InvalidArgument(format!(
                "不支持的传输层类型: {other}"
            ))),
        }
    }

    fn ordering(&self, dsn: &Dsn) -> SchedulerResult<ListOrdering> {
        let mode = match dsn.host() {
            "" => DEFAULT_EXECUTION_MODE,
            mode => mode,
        };
        ListOrdering::new(mode, Some(self.orchestrator.clone()))
    }

    fn members(&self, dsn: &Dsn) -> SchedulerResult<Vec<Arc<dyn Transport>>> {
        dsn.members()
            .iter()
            .map(|member| self.from_dsn(member))
            .collect()
    }
}

impl Default for TransportFactory {
    fn default() -> Self {
        Self::new()
    }
}
