//! 表达式求值结果缓存
//!
//! 以 (脚本文本, 目标 jvmId) 为键缓存布尔求值结果，并按脚本缓存编译
//! 产物。同一表达式对同一目标只求值一次，直到被失效；失效由规则与
//! 目标的生命周期事件驱动：
//! - 点失效：单个 (脚本, 目标) 组合
//! - 按脚本批量失效：规则删除/停用/更新
//! - 按目标批量失效：目标下线
//!
//! 命中/未命中/驱逐计数通过 [`CacheStats`] 暴露，未命中计数同时是
//! "是否发生重算"的观测点。

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::compiler::{self, CompiledExpression};
use crate::error::MatchError;
use crate::evaluator;
use flightwatch_shared::target::Target;

/// 缓存计数快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// 当前驻留的结果条目数
    pub entries: usize,
}

/// 求值结果缓存
///
/// 条目只缓存确定性的布尔结果；编译失败和求值错误不进入缓存，
/// 每次调用都会重新暴露给调用方。
pub struct ExpressionResultCache {
    /// (脚本, jvmId) -> 求值结果
    entries: DashMap<(String, String), bool>,
    /// 脚本 -> 编译产物，避免逐目标重复编译
    compiled: DashMap<String, Arc<CompiledExpression>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ExpressionResultCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            compiled: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// 查缓存，未命中则编译并求值后回填
    ///
    /// 编译错误与求值错误都不缓存，直接上抛。
    pub fn get_or_compute(&self, script: &str, target: &Target) -> Result<bool, MatchError> {
        let key = (script.to_string(), target.jvm_id.clone());

        if let Some(entry) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(*entry);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let compiled = self.compiled_for(script)?;
        let result = evaluator::evaluate(&compiled, target)?;
        self.entries.insert(key, result);
        Ok(result)
    }

    /// 获取脚本的编译产物，必要时编译并缓存
    fn compiled_for(&self, script: &str) -> Result<Arc<CompiledExpression>, MatchError> {
        if let Some(compiled) = self.compiled.get(script) {
            return Ok(Arc::clone(&compiled));
        }
        let compiled = Arc::new(compiler::compile(script)?);
        self.compiled
            .insert(script.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// 点失效：移除单个 (脚本, 目标) 条目
    pub fn invalidate(&self, script: &str, jvm_id: &str) {
        let key = (script.to_string(), jvm_id.to_string());
        if self.entries.remove(&key).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 按脚本批量失效：移除该脚本对所有目标的条目及编译产物
    pub fn invalidate_all(&self, script: &str) {
        let before = self.entries.len();
        self.entries.retain(|(s, _), _| s != script);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        }
        self.compiled.remove(script);
        tracing::debug!(script, removed, "按脚本失效缓存条目");
    }

    /// 按目标批量失效：移除该目标在所有脚本下的条目
    pub fn invalidate_target(&self, jvm_id: &str) {
        let before = self.entries.len();
        self.entries.retain(|(_, id), _| id != jvm_id);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        }
        tracing::debug!(jvm_id, removed, "按目标失效缓存条目");
    }

    /// 当前计数快照
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl Default for ExpressionResultCache {
    fn default() -> Self {
        Self::new()
    }
}
