use std::sync::Arc;

use async_trait::async_trait;

use cadence_core::traits::Transport;

use super::composite::{CompositeTransport, MemberSelection};

/// 故障转移：每次调用都从第一个成员开始尝试，不保存状态
pub type FailoverTransport = CompositeTransport<InOrder>;

#[derive(Debug, Default, Clone, Copy)]
pub struct InOrder;

#[async_trait]
impl MemberSelection for InOrder {
    fn name(&self) -> &str {
        "failover"
    }

    async fn order(&self, members: &[Arc<dyn Transport>]) -> Vec<Arc<dyn Transport>> {
        members.to_vec()
    }
}

impl CompositeTransport<InOrder> {
    pub fn new(transports: Vec<Arc<dyn Transport>>) -> Self {
        Self::from_parts(transports, InOrder)
    }
}
