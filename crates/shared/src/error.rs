//! 统一错误处理模块
//!
//! 定义控制面共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 表达式编译/求值有独立的错误类型（见 match-engine crate），
//! 这里只承载注册表与基础设施层面的错误分类。

use thiserror::Error;

use crate::crypto::CryptoError;

/// 控制面共享错误类型
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    // ==================== 资源错误 ====================
    #[error("记录未找到: {entity} {id}")]
    NotFound { entity: String, id: String },

    #[error("记录已存在: {entity} {field}={value}")]
    AlreadyExists {
        entity: String,
        field: String,
        value: String,
    },

    #[error("参数校验失败: {0}")]
    Validation(String),

    // ==================== 基础设施错误 ====================
    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    #[error("凭据加密失败: {0}")]
    Crypto(#[from] CryptoError),
}

impl ControlPlaneError {
    /// 构造 NotFound 错误
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// 构造 AlreadyExists 错误（对应对外的 409 冲突语义）
    pub fn already_exists(
        entity: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// 是否为冲突类错误（调用方据此决定是否重试：冲突永不自动重试）
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

pub type Result<T> = std::result::Result<T, ControlPlaneError>;
