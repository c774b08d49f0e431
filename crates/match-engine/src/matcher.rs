//! 目标匹配索引
//!
//! 回答"这个表达式当前匹配哪些目标"：编译一次表达式，然后全量扫描
//! 已知目标逐个求值。没有倒排索引，目标总体规模有界（数百级），
//! 线性扫描足够。
//!
//! 单个目标的求值错误按"不匹配"降级并记录告警，不影响其余目标；
//! 编译错误则整体失败。

use std::sync::Arc;

use crate::compiler::{self, CompiledExpression};
use crate::error::CompileError;
use crate::evaluator;
use flightwatch_shared::target::Target;

/// 目标清单提供方
///
/// 由目标注册表实现，匹配索引通过它取当前目标快照。
#[cfg_attr(test, mockall::automock)]
pub trait TargetLister: Send + Sync {
    /// 当前已知目标的快照
    fn list_targets(&self) -> Vec<Target>;
}

/// 目标匹配索引
pub struct TargetMatcher {
    lister: Arc<dyn TargetLister>,
}

impl TargetMatcher {
    pub fn new(lister: Arc<dyn TargetLister>) -> Self {
        Self { lister }
    }

    /// 返回表达式匹配的所有目标
    pub fn match_all(&self, script: &str) -> Result<Vec<Target>, CompileError> {
        let targets = self.lister.list_targets();
        self.match_targets(script, &targets)
    }

    /// 在给定目标集合上执行匹配
    pub fn match_targets(
        &self,
        script: &str,
        targets: &[Target],
    ) -> Result<Vec<Target>, CompileError> {
        let compiled = compiler::compile(script)?;
        Ok(targets
            .iter()
            .filter(|t| Self::matches(&compiled, t))
            .cloned()
            .collect())
    }

    /// 单目标求值，错误降级为不匹配
    fn matches(compiled: &CompiledExpression, target: &Target) -> bool {
        match evaluator::evaluate(compiled, target) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(
                    jvm_id = %target.jvm_id,
                    script = compiled.script(),
                    error = %e,
                    "目标求值失败，按不匹配处理"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet() -> Vec<Target> {
        vec![
            Target::new("jvm-1", "service:jmx:rmi://payments:9091")
                .with_alias("payments")
                .with_label("env", "prod"),
            Target::new("jvm-2", "service:jmx:rmi://orders:9091")
                .with_alias("orders")
                .with_label("env", "prod"),
            Target::new("jvm-3", "service:jmx:rmi://staging:9091")
                .with_alias("payments-staging")
                .with_label("env", "staging"),
        ]
    }

    fn matcher_with(targets: Vec<Target>) -> TargetMatcher {
        let mut lister = MockTargetLister::new();
        lister.expect_list_targets().return_const(targets);
        TargetMatcher::new(Arc::new(lister))
    }

    #[test]
    fn test_match_all_filters_fleet() {
        let matcher = matcher_with(fleet());
        let matched = matcher.match_all("target.labels.env == 'prod'").unwrap();
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|t| t.labels["env"] == "prod"));
    }

    #[test]
    fn test_match_all_empty_fleet() {
        let matcher = matcher_with(Vec::new());
        assert!(matcher.match_all("true").unwrap().is_empty());
    }

    #[test]
    fn test_true_matches_everything() {
        let matcher = matcher_with(fleet());
        assert_eq!(matcher.match_all("true").unwrap().len(), 3);
        assert!(matcher.match_all("false").unwrap().is_empty());
    }

    #[test]
    fn test_compile_error_fails_whole_match() {
        let matcher = matcher_with(fleet());
        assert!(matcher.match_all("not a valid expression").is_err());
    }

    #[test]
    fn test_evaluation_error_degrades_to_non_match() {
        // jvm-4 没有别名，startsWith 对它报空值错误，其余目标正常匹配
        let mut targets = fleet();
        targets.push(Target::new("jvm-4", "service:jmx:rmi://bare:9091"));

        let matcher = matcher_with(targets);
        let matched = matcher.match_all("target.alias startsWith 'pay'").unwrap();
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|t| t.jvm_id != "jvm-4"));
    }

    #[test]
    fn test_match_targets_on_explicit_slice() {
        let matcher = matcher_with(Vec::new());
        let targets = fleet();
        let matched = matcher
            .match_targets("target.alias == 'orders'", &targets)
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].jvm_id, "jvm-2");
    }
}
