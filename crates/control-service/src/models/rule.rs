//! 自动化规则模型
//!
//! 规则声明"对匹配表达式命中的每个目标执行何种采集动作"。`name` 是
//! 唯一键；匹配表达式在持久化前必须编译通过；归档策略的数值字段
//! 不允许为负。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use flightwatch_shared::error::{ControlPlaneError, Result};
use flightwatch_shared::events::LifecycleCategory;

/// 自动化规则
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// 唯一名称
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 目标匹配表达式脚本
    pub match_expression: String,
    /// 采集的事件模板标识
    pub event_specifier: String,
    /// 归档周期（秒），0 表示不做周期归档
    #[serde(default)]
    pub archival_period_seconds: i64,
    /// 首次归档前的延迟（秒）
    #[serde(default)]
    pub initial_delay_seconds: i64,
    /// 保留的归档份数
    #[serde(default)]
    pub preserved_archives: i64,
    /// 录制数据最大保留时长（秒），0 表示不限
    #[serde(default)]
    pub max_age_seconds: i64,
    /// 录制数据最大体积（字节），0 表示不限
    #[serde(default)]
    pub max_size_bytes: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 用户自定义元数据标签
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// 创建启用状态的最小规则
    pub fn new(
        name: impl Into<String>,
        match_expression: impl Into<String>,
        event_specifier: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            match_expression: match_expression.into(),
            event_specifier: event_specifier.into(),
            archival_period_seconds: 0,
            initial_delay_seconds: 0,
            preserved_archives: 0,
            max_age_seconds: 0,
            max_size_bytes: 0,
            enabled: true,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// 字段级校验（不含表达式编译，编译由注册表负责）
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ControlPlaneError::Validation(
                "规则名称不能为空".to_string(),
            ));
        }
        if self.event_specifier.trim().is_empty() {
            return Err(ControlPlaneError::Validation(
                "事件模板标识不能为空".to_string(),
            ));
        }
        if self.match_expression.trim().is_empty() {
            return Err(ControlPlaneError::Validation(
                "匹配表达式不能为空".to_string(),
            ));
        }

        for (field, value) in [
            ("archivalPeriodSeconds", self.archival_period_seconds),
            ("initialDelaySeconds", self.initial_delay_seconds),
            ("preservedArchives", self.preserved_archives),
            ("maxAgeSeconds", self.max_age_seconds),
            ("maxSizeBytes", self.max_size_bytes),
        ] {
            if value < 0 {
                return Err(ControlPlaneError::Validation(format!(
                    "{field} 不允许为负数: {value}"
                )));
            }
        }
        Ok(())
    }
}

/// 规则部分更新
///
/// `None` 字段保持原值。匹配表达式可被替换，替换后新旧脚本的缓存
/// 条目都会被失效。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub description: Option<String>,
    pub match_expression: Option<String>,
    pub event_specifier: Option<String>,
    pub archival_period_seconds: Option<i64>,
    pub initial_delay_seconds: Option<i64>,
    pub preserved_archives: Option<i64>,
    pub max_age_seconds: Option<i64>,
    pub max_size_bytes: Option<i64>,
    pub enabled: Option<bool>,
    pub metadata: Option<BTreeMap<String, String>>,
}

impl RuleUpdate {
    /// 应用到已有规则，返回更新后的副本
    pub fn apply(&self, rule: &Rule) -> Rule {
        let mut updated = rule.clone();
        if let Some(v) = &self.description {
            updated.description = v.clone();
        }
        if let Some(v) = &self.match_expression {
            updated.match_expression = v.clone();
        }
        if let Some(v) = &self.event_specifier {
            updated.event_specifier = v.clone();
        }
        if let Some(v) = self.archival_period_seconds {
            updated.archival_period_seconds = v;
        }
        if let Some(v) = self.initial_delay_seconds {
            updated.initial_delay_seconds = v;
        }
        if let Some(v) = self.preserved_archives {
            updated.preserved_archives = v;
        }
        if let Some(v) = self.max_age_seconds {
            updated.max_age_seconds = v;
        }
        if let Some(v) = self.max_size_bytes {
            updated.max_size_bytes = v;
        }
        if let Some(v) = self.enabled {
            updated.enabled = v;
        }
        if let Some(v) = &self.metadata {
            updated.metadata = v.clone();
        }
        updated.updated_at = Utc::now();
        updated
    }
}

/// 规则生命周期事件
#[derive(Debug, Clone)]
pub struct RuleEvent {
    pub category: LifecycleCategory,
    pub rule: Rule,
    /// 更新前的匹配表达式（仅 Updated 且脚本被替换时存在）
    pub previous_expression: Option<String>,
    /// 删除时是否同时停止既有录制（仅事件载荷透传，采集执行不在本仓库）
    pub clean: bool,
}
