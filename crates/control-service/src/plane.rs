//! 控制面装配
//!
//! 在启动阶段创建各组件并把生命周期事件接到缓存失效处理器上。
//! 事件总线是同步的：发布事件的变更调用返回时，所有订阅方的失效
//! 已经生效，后续查询不会观察到过期缓存值。
//!
//! 订阅关系：
//! - 规则 Deleted/Updated → 求值结果缓存按脚本失效（更新覆盖新旧脚本）
//! - 目标 Lost/Found → 求值结果缓存按目标清除 + 凭据缓存清除该目标
//!   （Found 也覆盖属性变更的再发现）
//! - 凭据 Deleted → 凭据缓存反向清除；凭据 Created → 清除负缓存

use std::sync::Arc;
use tracing::info;

use crate::credentials::{CredentialStore, CredentialTargetCache};
use crate::models::{CredentialEvent, RuleEvent};
use crate::registry::{RuleRegistry, TargetRegistry};
use flightwatch_shared::crypto::CredentialEncryptor;
use flightwatch_shared::events::{
    DiscoveryKind, EventBus, LifecycleCategory, TargetDiscoveryEvent,
};
use match_engine::{ExpressionResultCache, TargetMatcher};

/// 装配完成的控制面
pub struct ControlPlane {
    pub targets: Arc<TargetRegistry>,
    pub rules: Arc<RuleRegistry>,
    pub credentials: Arc<CredentialStore>,
    pub credential_cache: Arc<CredentialTargetCache>,
    pub result_cache: Arc<ExpressionResultCache>,
    pub matcher: TargetMatcher,
}

impl ControlPlane {
    /// 创建并装配控制面
    pub fn new(encryptor: CredentialEncryptor) -> Self {
        let rule_bus: Arc<EventBus<RuleEvent>> = Arc::new(EventBus::new());
        let credential_bus: Arc<EventBus<CredentialEvent>> = Arc::new(EventBus::new());
        let discovery_bus: Arc<EventBus<TargetDiscoveryEvent>> = Arc::new(EventBus::new());

        let result_cache = Arc::new(ExpressionResultCache::new());
        let targets = Arc::new(TargetRegistry::new(Arc::clone(&discovery_bus)));
        let rules = Arc::new(RuleRegistry::new(Arc::clone(&rule_bus)));
        let credentials = Arc::new(CredentialStore::new(encryptor, Arc::clone(&credential_bus)));
        let credential_cache = Arc::new(CredentialTargetCache::new(
            Arc::clone(&credentials),
            Arc::clone(&targets),
        ));
        let matcher = TargetMatcher::new(Arc::clone(&targets) as Arc<dyn match_engine::TargetLister>);

        // 规则删除/更新 → 按脚本失效求值缓存；更新同时失效旧脚本
        let cache = Arc::clone(&result_cache);
        rule_bus.subscribe(move |event: &RuleEvent| match event.category {
            LifecycleCategory::Deleted | LifecycleCategory::Updated => {
                cache.invalidate_all(&event.rule.match_expression);
                if let Some(previous) = &event.previous_expression {
                    cache.invalidate_all(previous);
                }
            }
            LifecycleCategory::Created => {}
        });

        // 目标事件 → 两级缓存都清除该目标。Lost 是下线清理；Found 覆盖
        // 属性变更的再发现（如别名修改），旧属性算出的结果不能留下
        let cache = Arc::clone(&result_cache);
        let cred_cache = Arc::clone(&credential_cache);
        discovery_bus.subscribe(move |event: &TargetDiscoveryEvent| match event.kind {
            DiscoveryKind::Lost | DiscoveryKind::Found => {
                cache.invalidate_target(&event.target.jvm_id);
                cred_cache.evict_target(&event.target.jvm_id);
            }
        });

        // 凭据删除 → 反向清除；凭据新增 → 清除负缓存
        let cred_cache = Arc::clone(&credential_cache);
        credential_bus.subscribe(move |event: &CredentialEvent| match event.category {
            LifecycleCategory::Deleted => cred_cache.evict_credential(event.credential_id),
            LifecycleCategory::Created => cred_cache.evict_unresolved(),
            LifecycleCategory::Updated => {}
        });

        info!(
            rule_handlers = rule_bus.handler_count(),
            discovery_handlers = discovery_bus.handler_count(),
            credential_handlers = credential_bus.handler_count(),
            "控制面装配完成"
        );

        Self {
            targets,
            rules,
            credentials,
            credential_cache,
            result_cache,
            matcher,
        }
    }
}
