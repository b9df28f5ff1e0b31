use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use cadence_core::{traits::Transport, SchedulerError, SchedulerResult};

use super::composite::{CompositeTransport, MemberSelection};

/// 轮询：在故障转移的基础上，每完成 `quantum` 次成功调用就把起始成员后移一位
pub type RoundRobinTransport = CompositeTransport<Rotation>;

pub const DEFAULT_QUANTUM: usize = 2;

#[derive(Debug, Default, Clone, Copy)]
struct RotationState {
    start: usize,
    served: usize,
}

#[derive(Debug)]
pub struct Rotation {
    quantum: usize,
    state: Mutex<RotationState>,
}

impl Rotation {
    fn current(&self) -> RotationState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MemberSelection for Rotation {
    fn name(&self) -> &str {
        "roundrobin"
    }

    async fn order(&self, members: &[Arc<dyn Transport>]) -> Vec<Arc<dyn Transport>> {
        let mut ordered = members.to_vec();
        if !ordered.is_empty() {
            let start = self.current().start % ordered.len();
            ordered.rotate_left(start);
        }
        ordered
    }

    fn record_success(&self, members: usize) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.served += 1;
        if state.served >= self.quantum && members > 0 {
            state.start = (state.start + 1) % members;
            state.served = 0;
            debug!("轮询传输层起始成员切换为 #{}", state.start);
        }
    }
}

impl CompositeTransport<Rotation> {
    pub fn new(transports: Vec<Arc<dyn Transport>>, quantum: usize) -> SchedulerResult<Self> {
        if quantum == 0 {
            return Err(SchedulerError::InvalidArgument(
                "轮询传输层的 quantum 必须大于 0".to_string(),
            ));
        }
        Ok(Self::from_parts(
            transports,
            Rotation {
                quantum,
                state: Mutex::new(RotationState::default()),
            },
        ))
    }

    pub fn quantum(&self) -> usize {
        self.selection().quantum
    }

    /// 当前排在第一位的成员下标
    pub fn current_start(&self) -> usize {
        self.selection().current().start
    }
}
