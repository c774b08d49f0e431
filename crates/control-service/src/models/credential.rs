//! 凭据模型
//!
//! 凭据由匹配表达式声明适用范围，用户名/密码落库前加密。凭据对象
//! 不派生 Serialize：密文不对外序列化，明文只能通过存储层显式解密
//! 获取。

use chrono::{DateTime, Utc};
use std::fmt;

use flightwatch_shared::events::LifecycleCategory;

/// 存储态凭据（用户名/密码为密文）
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// 创建序号，单调递增，决定多凭据命中时的优先级（小者优先）
    pub id: u64,
    /// 目标匹配表达式脚本
    pub match_expression: String,
    pub(crate) username_enc: String,
    pub(crate) password_enc: String,
    pub created_at: DateTime<Utc>,
}

// Debug 不输出密文
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("match_expression", &self.match_expression)
            .field("username_enc", &"<redacted>")
            .field("password_enc", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// 解密后的明文凭据，仅在建立目标连接时短暂存在
#[derive(Clone, PartialEq, Eq)]
pub struct PlainCredential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for PlainCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainCredential")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// 凭据生命周期事件
#[derive(Debug, Clone)]
pub struct CredentialEvent {
    pub category: LifecycleCategory,
    pub credential_id: u64,
    pub match_expression: String,
}
