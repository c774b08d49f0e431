//! 共享库
//!
//! 包含控制面各组件共用的配置、错误处理、凭据加密、生命周期事件总线
//! 以及目标（Target）领域模型。

pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod observability;
pub mod target;
