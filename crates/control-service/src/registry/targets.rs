//! 目标注册表
//!
//! 维护当前在线目标的总体，是发现子系统与控制面其余组件的边界：
//! 发现侧只调用 `observe`/`lose`，其余组件只读快照或订阅发现事件。
//! 同一 `jvm_id` 的重复上报视为属性更新（别名、标签等），不产生新身份。

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use flightwatch_shared::events::{DiscoveryKind, EventBus, TargetDiscoveryEvent};
use flightwatch_shared::target::Target;
use match_engine::TargetLister;

/// 在线目标注册表
pub struct TargetRegistry {
    /// jvm_id -> 目标
    targets: DashMap<String, Target>,
    bus: Arc<EventBus<TargetDiscoveryEvent>>,
}

impl TargetRegistry {
    pub fn new(bus: Arc<EventBus<TargetDiscoveryEvent>>) -> Self {
        Self {
            targets: DashMap::new(),
            bus,
        }
    }

    /// 记录一个被发现（或属性变更）的目标
    #[instrument(skip(self, target), fields(jvm_id = %target.jvm_id))]
    pub fn observe(&self, target: Target) {
        let rediscovered = self
            .targets
            .insert(target.jvm_id.clone(), target.clone())
            .is_some();
        info!(rediscovered, "目标已登记");
        self.bus.publish(&TargetDiscoveryEvent {
            kind: DiscoveryKind::Found,
            target,
        });
    }

    /// 记录目标丢失，返回被移除的目标
    ///
    /// Lost 事件驱动所有以该目标为键的缓存清除；对未知 jvm_id 幂等。
    #[instrument(skip(self))]
    pub fn lose(&self, jvm_id: &str) -> Option<Target> {
        let (_, target) = self.targets.remove(jvm_id)?;
        info!("目标已丢失");
        self.bus.publish(&TargetDiscoveryEvent {
            kind: DiscoveryKind::Lost,
            target: target.clone(),
        });
        Some(target)
    }

    pub fn get(&self, jvm_id: &str) -> Option<Target> {
        self.targets.get(jvm_id).map(|t| t.clone())
    }

    /// 按连接地址查找目标
    ///
    /// 连接地址在发现谱系中可能短暂重复，返回任意一个命中项。
    pub fn find_by_connect_url(&self, connect_url: &str) -> Option<Target> {
        self.targets
            .iter()
            .find(|t| t.connect_url == connect_url)
            .map(|t| t.clone())
    }

    pub fn list(&self) -> Vec<Target> {
        self.targets.iter().map(|t| t.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl TargetLister for TargetRegistry {
    fn list_targets(&self) -> Vec<Target> {
        self.list()
    }
}
