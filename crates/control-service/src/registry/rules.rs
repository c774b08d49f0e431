//! 规则注册表与生命周期
//!
//! 规则以唯一名称为键。所有变更在返回前发布 [`RuleEvent`]，订阅方
//! （求值结果缓存）据此做脚本级失效：删除与更新都会触发失效，更新
//! 失效覆盖新旧两个脚本，避免"改了表达式但缓存还在按旧结果回答"的
//! 陈旧窗口。
//!
//! 匹配表达式在持久化前编译校验，编译失败映射为参数校验错误，
//! 格式错误的脚本不可能进入存储。

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::models::{Rule, RuleEvent, RuleUpdate};
use flightwatch_shared::error::{ControlPlaneError, Result};
use flightwatch_shared::events::{EventBus, LifecycleCategory};

/// 规则注册表
pub struct RuleRegistry {
    /// name -> 规则
    rules: DashMap<String, Rule>,
    bus: Arc<EventBus<RuleEvent>>,
}

impl RuleRegistry {
    pub fn new(bus: Arc<EventBus<RuleEvent>>) -> Self {
        Self {
            rules: DashMap::new(),
            bus,
        }
    }

    /// 创建规则
    ///
    /// 名称冲突返回 AlreadyExists；字段校验或表达式编译失败返回
    /// Validation。成功后发布 Created 事件。
    #[instrument(skip(self, rule), fields(rule_name = %rule.name))]
    pub fn create(&self, rule: Rule) -> Result<Rule> {
        rule.validate()?;
        compile_check(&rule.match_expression)?;

        match self.rules.entry(rule.name.clone()) {
            Entry::Occupied(_) => {
                warn!("规则名称冲突");
                Err(ControlPlaneError::already_exists(
                    "rule",
                    "name",
                    rule.name.clone(),
                ))
            }
            Entry::Vacant(slot) => {
                slot.insert(rule.clone());
                info!("规则已创建");
                self.bus.publish(&RuleEvent {
                    category: LifecycleCategory::Created,
                    rule: rule.clone(),
                    previous_expression: None,
                    clean: false,
                });
                Ok(rule)
            }
        }
    }

    /// 部分更新规则
    ///
    /// 返回前发布 Updated 事件；脚本被替换时事件携带旧脚本，
    /// 订阅方对新旧脚本都做失效。
    #[instrument(skip(self, patch))]
    pub fn update(&self, name: &str, patch: &RuleUpdate) -> Result<Rule> {
        let mut entry = self
            .rules
            .get_mut(name)
            .ok_or_else(|| ControlPlaneError::not_found("rule", name))?;

        let updated = patch.apply(&entry);
        updated.validate()?;
        if let Some(script) = &patch.match_expression {
            compile_check(script)?;
        }

        let previous_expression = (updated.match_expression != entry.match_expression)
            .then(|| entry.match_expression.clone());
        *entry = updated.clone();
        drop(entry);

        info!("规则已更新");
        self.bus.publish(&RuleEvent {
            category: LifecycleCategory::Updated,
            rule: updated.clone(),
            previous_expression,
            clean: false,
        });
        Ok(updated)
    }

    /// 删除规则
    ///
    /// `clean` 表示调用方希望同时停止该规则已发起的录制，仅透传到
    /// 事件载荷；返回前发布 Deleted 事件。
    #[instrument(skip(self))]
    pub fn delete(&self, name: &str, clean: bool) -> Result<Rule> {
        let (_, rule) = self
            .rules
            .remove(name)
            .ok_or_else(|| ControlPlaneError::not_found("rule", name))?;

        info!(clean, "规则已删除");
        self.bus.publish(&RuleEvent {
            category: LifecycleCategory::Deleted,
            rule: rule.clone(),
            previous_expression: None,
            clean,
        });
        Ok(rule)
    }

    pub fn get(&self, name: &str) -> Option<Rule> {
        self.rules.get(name).map(|r| r.clone())
    }

    pub fn list(&self) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self.rules.iter().map(|r| r.clone()).collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// 表达式编译校验，编译错误映射为参数校验错误
fn compile_check(script: &str) -> Result<()> {
    match_engine::compile(script)
        .map(|_| ())
        .map_err(|e| ControlPlaneError::Validation(format!("匹配表达式不合法: {e}")))
}
