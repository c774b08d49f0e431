//! 目标匹配引擎
//!
//! 提供可复用的匹配表达式评估能力，支持：
//! - 封闭文法的布尔表达式编译（比较、逻辑连接、字段访问）
//! - 编译结果与求值结果缓存，支持按脚本/按目标失效
//! - 对在线目标总体的全量匹配扫描
//!
//! 表达式以单一绑定变量 `target` 描述目标属性，例如：
//! `target.alias == 'payments' && target.labels.env == 'prod'`

pub mod ast;
pub mod cache;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod matcher;
pub mod parser;

pub use cache::{CacheStats, ExpressionResultCache};
pub use compiler::{CompiledExpression, compile};
pub use error::{CompileError, EvaluationError, MatchError, Result};
pub use evaluator::evaluate;
pub use matcher::{TargetLister, TargetMatcher};
