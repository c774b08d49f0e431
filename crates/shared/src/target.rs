//! 目标（Target）领域模型
//!
//! Target 表示一个被监控的 JVM 进程。`jvm_id` 是从进程指纹派生的稳定标识，
//! 一旦分配不再变化，跨重连唯一标识同一个进程；所有缓存都以它为键。
//! `connect_url` 在发现谱系中可能重复，但 `jvm_id` 不会。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// 被监控的 JVM 目标
///
/// 生命周期：发现子系统探测到新 JVM（或用户手工定义自定义目标）时创建；
/// 别名变更时更新；发现子系统报告进程消失时标记为丢失（LOST），
/// 此时所有以该目标为键的缓存条目必须清除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// 稳定唯一标识，由进程指纹派生，分配后不可变
    pub jvm_id: String,
    /// JMX/Agent 连接地址
    pub connect_url: String,
    /// 可选的人类可读别名
    pub alias: Option<String>,
    /// 用户标签（key -> value）
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// 发现子系统附加的注解
    #[serde(default)]
    pub annotations: Annotations,
    /// 发现谱系引用（父节点名称），手工定义的目标没有
    pub parent: Option<String>,
    /// 首次发现时间
    #[serde(default = "Utc::now")]
    pub discovered_at: DateTime<Utc>,
}

/// 目标注解，按来源分为平台注解和控制面内部注解
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    /// 平台注解（来自 Kubernetes/容器平台等发现来源）
    #[serde(default)]
    pub platform: BTreeMap<String, String>,
    /// 控制面内部注解（端口、PID 等）
    #[serde(default)]
    pub internal: BTreeMap<String, String>,
}

impl Target {
    /// 创建最小目标（无别名、无标签）
    pub fn new(jvm_id: impl Into<String>, connect_url: impl Into<String>) -> Self {
        Self {
            jvm_id: jvm_id.into(),
            connect_url: connect_url.into(),
            alias: None,
            labels: BTreeMap::new(),
            annotations: Annotations::default(),
            parent: None,
            discovered_at: Utc::now(),
        }
    }

    /// 设置别名
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// 添加一个标签
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// 添加一个平台注解
    pub fn with_platform_annotation(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.annotations.platform.insert(key.into(), value.into());
        self
    }

    /// 添加一个内部注解
    pub fn with_internal_annotation(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.annotations.internal.insert(key.into(), value.into());
        self
    }

    /// 将目标属性渲染为表达式求值用的快照 JSON
    ///
    /// 匹配表达式通过 `target.` 前缀的点号路径访问字段，例如
    /// `target.alias` 或 `target.annotations.platform.namespace`。
    /// 缺失的别名渲染为 null，由求值器决定 null 的比较语义。
    pub fn to_match_context(&self) -> serde_json::Value {
        json!({
            "target": {
                "jvmId": self.jvm_id,
                "connectUrl": self.connect_url,
                "alias": self.alias,
                "labels": self.labels,
                "annotations": {
                    "platform": self.annotations.platform,
                    "internal": self.annotations.internal,
                },
            }
        })
    }
}
