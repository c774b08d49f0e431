//! 凭据-目标缓存
//!
//! 回答"连接这个目标该用哪个凭据"。首次查询对凭据清单做全量扫描
//! （按创建序号升序，首个命中者胜出），结果双向登记：
//! - `by_target`: jvm_id -> 解析结果（含"无凭据"的负缓存）
//! - `by_credential`: 凭据序号 -> 解析到它的目标集合
//!
//! 两张表在同一把互斥锁下一起更新，任何时刻要么都反映变更、要么都
//! 不反映，不存在半更新状态。失效由事件驱动：凭据删除按 `by_credential`
//! 反查清除，目标丢失清除该目标条目，凭据新增清除全部负缓存（新凭据
//! 可能覆盖此前无凭据的目标）。

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::models::Credential;
use crate::registry::TargetRegistry;
use flightwatch_shared::error::Result;
use flightwatch_shared::target::Target;

/// 双向解析表，单锁保护
#[derive(Default)]
struct ResolutionMaps {
    /// jvm_id -> Some(凭据序号) 或 None（确认无凭据）
    by_target: HashMap<String, Option<u64>>,
    /// 凭据序号 -> 解析到它的目标集合
    by_credential: HashMap<u64, HashSet<String>>,
}

impl ResolutionMaps {
    fn record(&mut self, jvm_id: &str, resolution: Option<u64>) {
        self.by_target.insert(jvm_id.to_string(), resolution);
        if let Some(id) = resolution {
            self.by_credential
                .entry(id)
                .or_default()
                .insert(jvm_id.to_string());
        }
    }

    fn remove_target(&mut self, jvm_id: &str) {
        if let Some(Some(id)) = self.by_target.remove(jvm_id)
            && let Some(targets) = self.by_credential.get_mut(&id)
        {
            targets.remove(jvm_id);
            if targets.is_empty() {
                self.by_credential.remove(&id);
            }
        }
    }

    fn remove_credential(&mut self, id: u64) -> usize {
        let Some(targets) = self.by_credential.remove(&id) else {
            return 0;
        };
        for jvm_id in &targets {
            self.by_target.remove(jvm_id);
        }
        targets.len()
    }
}

/// 凭据-目标缓存
pub struct CredentialTargetCache {
    store: Arc<super::CredentialStore>,
    targets: Arc<TargetRegistry>,
    maps: Mutex<ResolutionMaps>,
}

impl CredentialTargetCache {
    pub fn new(store: Arc<super::CredentialStore>, targets: Arc<TargetRegistry>) -> Self {
        Self {
            store,
            targets,
            maps: Mutex::new(ResolutionMaps::default()),
        }
    }

    /// 解析目标适用的凭据
    ///
    /// 命中缓存直接返回；未命中按创建序号升序扫描凭据，首个匹配者
    /// 胜出，结果（包括"无凭据"）回填缓存。单个凭据的表达式求值
    /// 失败记录告警并跳过，不中断扫描。
    ///
    /// 扫描在锁外进行，回填可能与失效竞争：并发删除的凭据可能在回填
    /// 后留下指向已删除凭据的条目。命中时对存储做存在性校验，指向
    /// 已删除凭据的条目就地剔除并重新扫描，过期结果不会对外可见。
    #[instrument(skip(self, target), fields(jvm_id = %target.jvm_id))]
    pub fn lookup_for_target(&self, target: &Target) -> Result<Option<Credential>> {
        let cached = self.maps.lock().by_target.get(&target.jvm_id).copied();
        if let Some(resolution) = cached {
            match resolution {
                Some(id) => {
                    if let Some(credential) = self.store.get(id) {
                        debug!(credential_id = id, "凭据解析缓存命中");
                        return Ok(Some(credential));
                    }
                    // 指向已删除凭据的过期条目（扫描与失效竞争的写回），
                    // 剔除后走重新扫描
                    warn!(credential_id = id, "凭据解析条目已过期，重新扫描");
                    self.maps.lock().remove_target(&target.jvm_id);
                }
                None => {
                    debug!("凭据解析缓存命中（无凭据）");
                    return Ok(None);
                }
            }
        }

        let resolved = self.scan(target);
        let resolution = resolved.as_ref().map(|c| c.id);
        self.maps.lock().record(&target.jvm_id, resolution);
        debug!(?resolution, "凭据解析已回填缓存");
        Ok(resolved)
    }

    /// 按连接地址解析凭据
    ///
    /// 先解析出目标再委托给 [`lookup_for_target`]；未知地址视为
    /// 无凭据。
    ///
    /// [`lookup_for_target`]: Self::lookup_for_target
    pub fn lookup_for_connect_url(&self, connect_url: &str) -> Result<Option<Credential>> {
        match self.targets.find_by_connect_url(connect_url) {
            Some(target) => self.lookup_for_target(&target),
            None => Ok(None),
        }
    }

    /// 全量扫描凭据清单，返回首个匹配的凭据
    fn scan(&self, target: &Target) -> Option<Credential> {
        for credential in self.store.list() {
            let compiled = match match_engine::compile(&credential.match_expression) {
                Ok(compiled) => compiled,
                Err(e) => {
                    // 入库前已编译校验过，正常不会走到这里
                    warn!(
                        credential_id = credential.id,
                        error = %e,
                        "凭据表达式编译失败，跳过"
                    );
                    continue;
                }
            };
            match match_engine::evaluate(&compiled, target) {
                Ok(true) => return Some(credential),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        credential_id = credential.id,
                        jvm_id = %target.jvm_id,
                        error = %e,
                        "凭据表达式求值失败，按不匹配处理"
                    );
                }
            }
        }
        None
    }

    /// 目标丢失：清除该目标的解析条目
    #[instrument(skip(self))]
    pub fn evict_target(&self, jvm_id: &str) {
        self.maps.lock().remove_target(jvm_id);
    }

    /// 凭据删除：按反向表清除所有解析到该凭据的条目
    #[instrument(skip(self))]
    pub fn evict_credential(&self, credential_id: u64) {
        let removed = self.maps.lock().remove_credential(credential_id);
        debug!(removed, "凭据删除引发缓存清除");
    }

    /// 凭据新增：清除全部负缓存条目，此前无凭据的目标下次查询重新扫描
    pub fn evict_unresolved(&self) {
        self.maps
            .lock()
            .by_target
            .retain(|_, resolution| resolution.is_some());
    }

    /// 当前缓存的目标条目数（含负缓存）
    pub fn cached_targets(&self) -> usize {
        self.maps.lock().by_target.len()
    }

    /// 解析到指定凭据的目标集合（反向表快照）
    pub fn targets_for(&self, credential_id: u64) -> Vec<String> {
        let maps = self.maps.lock();
        let mut targets: Vec<String> = maps
            .by_credential
            .get(&credential_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        targets.sort();
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use flightwatch_shared::crypto::CredentialEncryptor;
    use flightwatch_shared::events::EventBus;

    fn setup() -> (Arc<CredentialStore>, Arc<TargetRegistry>, CredentialTargetCache) {
        let store = Arc::new(CredentialStore::new(
            CredentialEncryptor::passthrough(),
            Arc::new(EventBus::new()),
        ));
        let targets = Arc::new(TargetRegistry::new(Arc::new(EventBus::new())));
        let cache = CredentialTargetCache::new(Arc::clone(&store), Arc::clone(&targets));
        (store, targets, cache)
    }

    fn prod_target(jvm_id: &str) -> Target {
        Target::new(jvm_id, format!("service:jmx:rmi://{jvm_id}:9091"))
            .with_alias(jvm_id)
            .with_label("env", "prod")
    }

    #[test]
    fn test_first_match_in_creation_order_wins() {
        let (store, _targets, cache) = setup();
        let first = store.add("u1", "p1", "target.labels.env == 'prod'").unwrap();
        let _second = store.add("u2", "p2", "true").unwrap();

        let resolved = cache.lookup_for_target(&prod_target("jvm-1")).unwrap();
        assert_eq!(resolved.unwrap().id, first);
    }

    #[test]
    fn test_negative_result_is_cached() {
        let (store, _targets, cache) = setup();
        store.add("u", "p", "target.labels.env == 'staging'").unwrap();

        let target = prod_target("jvm-1");
        assert!(cache.lookup_for_target(&target).unwrap().is_none());
        assert_eq!(cache.cached_targets(), 1);
        // 第二次直接命中负缓存
        assert!(cache.lookup_for_target(&target).unwrap().is_none());
    }

    #[test]
    fn test_bidirectional_maps_stay_consistent() {
        let (store, _targets, cache) = setup();
        let id = store.add("u", "p", "true").unwrap();

        cache.lookup_for_target(&prod_target("jvm-1")).unwrap();
        cache.lookup_for_target(&prod_target("jvm-2")).unwrap();
        assert_eq!(cache.targets_for(id), vec!["jvm-1", "jvm-2"]);

        cache.evict_credential(id);
        assert!(cache.targets_for(id).is_empty());
        assert_eq!(cache.cached_targets(), 0);
    }

    #[test]
    fn test_evict_target_cleans_reverse_entry() {
        let (store, _targets, cache) = setup();
        let id = store.add("u", "p", "true").unwrap();

        cache.lookup_for_target(&prod_target("jvm-1")).unwrap();
        cache.evict_target("jvm-1");

        assert_eq!(cache.cached_targets(), 0);
        assert!(cache.targets_for(id).is_empty());
    }

    #[test]
    fn test_evict_unresolved_clears_only_negative_entries() {
        let (store, _targets, cache) = setup();
        store.add("u", "p", "target.labels.env == 'prod'").unwrap();

        cache.lookup_for_target(&prod_target("jvm-1")).unwrap();
        let staging = Target::new("jvm-2", "http://b:8080").with_label("env", "staging");
        cache.lookup_for_target(&staging).unwrap();
        assert_eq!(cache.cached_targets(), 2);

        cache.evict_unresolved();
        assert_eq!(cache.cached_targets(), 1);
    }

    #[test]
    fn test_stale_resolution_self_heals_to_next_credential() {
        let (store, _targets, cache) = setup();
        let first = store.add("u1", "p1", "true").unwrap();
        let second = store.add("u2", "p2", "true").unwrap();

        let target = prod_target("jvm-1");
        assert_eq!(cache.lookup_for_target(&target).unwrap().unwrap().id, first);

        // 本测试未接事件处理器，删除不触发缓存失效——等价于扫描回填
        // 覆盖了并发删除的失效结果、留下指向已删除凭据的条目
        store.delete(first).unwrap();

        // 过期条目被剔除并重新扫描，解析到另一个匹配凭据而非 None
        let resolved = cache.lookup_for_target(&target).unwrap();
        assert_eq!(resolved.unwrap().id, second);
        assert_eq!(cache.targets_for(second), vec!["jvm-1"]);
        assert!(cache.targets_for(first).is_empty());
    }

    #[test]
    fn test_stale_resolution_self_heals_to_none() {
        let (store, _targets, cache) = setup();
        let only = store.add("u", "p", "true").unwrap();

        let target = prod_target("jvm-1");
        assert_eq!(cache.lookup_for_target(&target).unwrap().unwrap().id, only);

        store.delete(only).unwrap();

        assert!(cache.lookup_for_target(&target).unwrap().is_none());
        // 重新扫描的"无凭据"结果作为负缓存回填
        assert_eq!(cache.cached_targets(), 1);
    }

    #[test]
    fn test_evaluation_error_skips_credential() {
        let (store, _targets, cache) = setup();
        // 对无别名目标，第一个凭据的表达式会报空值错误
        store.add("u1", "p1", "target.alias startsWith 'pay'").unwrap();
        let second = store.add("u2", "p2", "true").unwrap();

        let bare = Target::new("jvm-1", "http://a:8080");
        let resolved = cache.lookup_for_target(&bare).unwrap();
        assert_eq!(resolved.unwrap().id, second);
    }

    #[test]
    fn test_lookup_for_connect_url() {
        let (store, targets, cache) = setup();
        let id = store.add("u", "p", "true").unwrap();
        targets.observe(prod_target("jvm-1"));

        let resolved = cache
            .lookup_for_connect_url("service:jmx:rmi://jvm-1:9091")
            .unwrap();
        assert_eq!(resolved.unwrap().id, id);

        assert!(
            cache
                .lookup_for_connect_url("service:jmx:rmi://ghost:9091")
                .unwrap()
                .is_none()
        );
    }
}
