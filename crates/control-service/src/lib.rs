//! 控制面服务
//!
//! 装配目标注册表、规则注册表、凭据存储与各级缓存，并通过进程内
//! 事件总线把生命周期事件接到缓存失效处理器上：
//! - 规则删除/更新 → 按脚本失效求值结果缓存
//! - 目标丢失 → 清除该目标在求值缓存与凭据缓存中的全部条目
//! - 凭据删除 → 反向清除凭据缓存

pub mod credentials;
pub mod models;
pub mod plane;
pub mod registry;

pub use credentials::{CredentialStore, CredentialTargetCache, PlainCredential};
pub use models::{Credential, CredentialEvent, Rule, RuleEvent, RuleUpdate};
pub use plane::ControlPlane;
pub use registry::{RuleRegistry, TargetRegistry};
