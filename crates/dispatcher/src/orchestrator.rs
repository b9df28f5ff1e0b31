use std::sync::Arc;

use tracing::{debug, warn};

use cadence_core::{traits::SchedulePolicy, SchedulerError, SchedulerResult, TaskList};

use crate::policies::{
    BatchPolicy, DeadlinePolicy, ExecutionDurationPolicy, FirstInFirstOutPolicy,
    FirstInLastOutPolicy, IdlePolicy, MemoryUsagePolicy, NicePolicy, RoundRobinPolicy,
};

/// 调度策略编排器
///
/// 按注册顺序查找第一个支持该名称的策略。找不到时使用默认策略，
/// 未配置默认策略则返回 `PolicyNotFound`。
pub struct SchedulePolicyOrchestrator {
    policies: Vec<Arc<dyn SchedulePolicy>>,
    default_policy: Option<String>,
}

impl SchedulePolicyOrchestrator {
    pub fn new(policies: Vec<Arc<dyn SchedulePolicy>>) -> Self {
        Self {
            policies,
            default_policy: None,
        }
    }

    /// 包含全部内置策略的编排器
    pub fn with_builtin_policies() -> Self {
        Self::new(vec![
            Arc::new(FirstInFirstOutPolicy::new()),
            Arc::new(FirstInLastOutPolicy::new()),
            Arc::new(RoundRobinPolicy::new()),
            Arc::new(DeadlinePolicy::new()),
            Arc::new(IdlePolicy::new()),
            Arc::new(NicePolicy::new()),
            Arc::new(MemoryUsagePolicy::new()),
            Arc::new(ExecutionDurationPolicy::new()),
            Arc::new(BatchPolicy::default()),
        ])
    }

    pub fn with_default_policy(mut self, policy: impl Into<String>) -> Self {
        self.default_policy = Some(policy.into());
        self
    }

    pub fn add_policy(&mut self, policy: Arc<dyn SchedulePolicy>) {
        self.policies.push(policy);
    }

    pub fn policy_names(&self) -> Vec<String> {
        self.policies.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn support(&self, policy: &str) -> bool {
        self.find(policy).is_some()
    }

    /// 使用指定策略排序
    pub fn sort(&self, policy: &str, tasks: TaskList) -> SchedulerResult<TaskList> {
        if tasks.is_empty() {
            return Ok(tasks);
        }

        if let Some(found) = self.find(policy) {
            debug!("使用调度策略 {} 排序 {} 个任务", found.name(), tasks.len());
            return found.sort(tasks);
        }

        match self.default_policy.as_deref().and_then(|name| self.find(name)) {
            Some(fallback) => {
                warn!(
                    "未找到调度策略 {}，使用默认策略 {}",
                    policy,
                    fallback.name()
                );
                fallback.sort(tasks)
            }
            None => Err(SchedulerError::PolicyNotFound {
                policy: policy.to_string(),
            }),
        }
    }

    fn find(&self, policy: &str) -> Option<&Arc<dyn SchedulePolicy>> {
        self.policies.iter().find(|p| p.support(policy))
    }
}

impl Default for SchedulePolicyOrchestrator {
    fn default() -> Self {
        Self::with_builtin_policies()
    }
}
