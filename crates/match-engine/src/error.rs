//! 匹配引擎错误类型
//!
//! 编译错误与求值错误分为两类：编译错误必须上抛给直接调用方（持久化
//! 校验、交互式表达式测试），求值错误在面向单个目标时上抛、在批量扫描
//! 中按"不匹配"降级处理。

use thiserror::Error;

/// 表达式编译错误：脚本在语法或语义上不合法
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("表达式语法错误: {0}")]
    Syntax(String),

    #[error("未知字段: {0}")]
    UnknownField(String),

    #[error("无效的正则表达式 '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("表达式类型错误: {0}")]
    Type(String),
}

/// 表达式求值错误：已编译的表达式在具体目标数据上执行失败
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("空值解引用: 字段 {0} 不存在")]
    NullField(String),
}

/// 匹配引擎统一错误类型
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

impl MatchError {
    /// 是否为编译类错误（调用方据此映射为客户端参数错误）
    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Compile(_))
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;
