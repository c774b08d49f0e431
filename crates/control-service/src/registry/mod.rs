//! 目标与规则注册表

mod rules;
mod targets;

pub use rules::RuleRegistry;
pub use targets::TargetRegistry;
