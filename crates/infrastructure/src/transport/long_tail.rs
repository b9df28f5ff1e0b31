use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use cadence_core::traits::Transport;

use super::composite::{CompositeTransport, MemberSelection};

/// 长尾：优先使用当前任务最少的成员，无法统计的成员排在最后
pub type LongTailTransport = CompositeTransport<FewestTasks>;

#[derive(Debug, Default, Clone, Copy)]
pub struct FewestTasks;

#[async_trait]
impl MemberSelection for FewestTasks {
    fn name(&self) -> &str {
        "longtail"
    }

    async fn order(&self, members: &[Arc<dyn Transport>]) -> Vec<Arc<dyn Transport>> {
        let counts = join_all(members.iter().map(|member| member.count())).await;

        let mut ranked: Vec<(usize, Arc<dyn Transport>)> = members
            .iter()
            .zip(counts)
            .map(|(member, count)| match count {
                Ok(count) => (count, member.clone()),
                Err(e) => {
                    warn!("长尾传输层无法统计成员 {} 的任务数: {}", member.name(), e);
                    (usize::MAX, member.clone())
                }
            })
            .collect();
        ranked.sort_by_key(|(count, _)| *count);
        ranked.into_iter().map(|(_, member)| member).collect()
    }
}

impl CompositeTransport<FewestTasks> {
    pub fn new(transports: Vec<Arc<dyn Transport>>) -> Self {
        Self::from_parts(transports, FewestTasks)
    }
}
