//! 匹配表达式编译器
//!
//! 将脚本文本编译为可复用的执行树：词法分析 → 语法分析 → 语义校验。
//! 校验失败即编译失败，持久化路径必须在写入前编译通过——这让格式错误
//! 的规则/凭据表达式在创建时被拒绝，而编译产物可在不断增长的目标总体
//! 上反复求值。
//!
//! 语义校验内容：
//! - 字段路径必须落在 `target` 的封闭属性模式内（标签/注解键除外）
//! - `matches` 的正则模式预编译校验，求值期不再可能失败
//! - 根表达式必须产出布尔值

use regex::Regex;
use std::collections::HashMap;

use crate::ast::{BinaryOp, Expr, FieldPath, Literal};
use crate::error::CompileError;
use crate::lexer;
use crate::parser;

/// 目标属性模式中的标量字段
const SCALAR_FIELDS: &[&str] = &["jvmId", "connectUrl", "alias"];

/// 注解的两个来源分组
const ANNOTATION_GROUPS: &[&str] = &["platform", "internal"];

/// 编译后的匹配表达式
///
/// 持有原始脚本文本（缓存键）、执行树以及预编译的正则模式。
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    script: String,
    root: Expr,
    /// 模式文本 -> 预编译正则，编译期填充
    regexes: HashMap<String, Regex>,
}

impl CompiledExpression {
    /// 原始脚本文本
    pub fn script(&self) -> &str {
        &self.script
    }

    /// 执行树根节点
    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// 查找预编译的正则模式
    pub fn regex(&self, pattern: &str) -> Option<&Regex> {
        self.regexes.get(pattern)
    }
}

/// 编译脚本
pub fn compile(script: &str) -> Result<CompiledExpression, CompileError> {
    let tokens = lexer::tokenize(script)?;
    let root = parser::parse(&tokens)?;

    let mut regexes = HashMap::new();
    validate_expr(&root, &mut regexes)?;

    if !root.is_boolean() {
        return Err(CompileError::Type(
            "匹配表达式必须产出布尔值".to_string(),
        ));
    }

    Ok(CompiledExpression {
        script: script.to_string(),
        root,
        regexes,
    })
}

/// 递归校验表达式节点
fn validate_expr(
    expr: &Expr,
    regexes: &mut HashMap<String, Regex>,
) -> Result<(), CompileError> {
    match expr {
        Expr::Literal(_) => Ok(()),
        Expr::Field(path) => validate_field_path(path),
        Expr::Not(inner) => {
            validate_expr(inner, regexes)?;
            if !inner.is_boolean() {
                return Err(CompileError::Type(format!(
                    "'!' 的操作数必须是布尔表达式，实际为 {inner:?}"
                )));
            }
            Ok(())
        }
        Expr::Binary { op, lhs, rhs } => {
            validate_expr(lhs, regexes)?;
            validate_expr(rhs, regexes)?;
            validate_operator(*op, lhs, rhs, regexes)
        }
    }
}

/// 校验操作符与操作数的兼容性
fn validate_operator(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    regexes: &mut HashMap<String, Regex>,
) -> Result<(), CompileError> {
    if op.is_logical() {
        if !lhs.is_boolean() || !rhs.is_boolean() {
            return Err(CompileError::Type(format!(
                "'{op}' 的两侧必须都是布尔表达式"
            )));
        }
        return Ok(());
    }

    // 数值比较与字符串操作的操作数必须是值表达式，不接受布尔子表达式
    if (op.is_ordering() || op.is_string_op()) && (lhs.is_boolean() || rhs.is_boolean()) {
        return Err(CompileError::Type(format!(
            "'{op}' 的操作数必须是字段或字面量"
        )));
    }

    if op == BinaryOp::Matches {
        // 模式必须是字符串字面量，编译期预校验并缓存
        let Expr::Literal(Literal::String(pattern)) = rhs else {
            return Err(CompileError::Type(
                "'matches' 右侧必须是字符串字面量".to_string(),
            ));
        };
        if !regexes.contains_key(pattern) {
            let regex = Regex::new(pattern).map_err(|e| CompileError::InvalidRegex {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            regexes.insert(pattern.clone(), regex);
        }
    }

    Ok(())
}

/// 校验字段路径落在目标属性模式内
///
/// 模式是封闭的：`target.jvmId` / `target.connectUrl` / `target.alias`
/// 为标量字段；`target.labels.<key>` 与
/// `target.annotations.{platform|internal}.<key>` 的键是开放的。
fn validate_field_path(path: &FieldPath) -> Result<(), CompileError> {
    let segments = &path.segments;

    if segments[0] != "target" {
        return Err(CompileError::UnknownField(format!(
            "{}（唯一绑定变量为 'target'）",
            path.dotted()
        )));
    }

    match segments.get(1).map(String::as_str) {
        Some(field) if SCALAR_FIELDS.contains(&field) => {
            if segments.len() != 2 {
                return Err(CompileError::UnknownField(format!(
                    "{}（'{field}' 是标量字段，不能继续访问）",
                    path.dotted()
                )));
            }
            Ok(())
        }
        Some("labels") => {
            if segments.len() != 3 {
                return Err(CompileError::UnknownField(format!(
                    "{}（标签访问需要具体键，如 target.labels.env）",
                    path.dotted()
                )));
            }
            Ok(())
        }
        Some("annotations") => {
            let group = segments.get(2).map(String::as_str);
            match group {
                Some(g) if ANNOTATION_GROUPS.contains(&g) => {
                    if segments.len() != 4 {
                        return Err(CompileError::UnknownField(format!(
                            "{}（注解访问需要具体键，如 target.annotations.platform.namespace）",
                            path.dotted()
                        )));
                    }
                    Ok(())
                }
                _ => Err(CompileError::UnknownField(format!(
                    "{}（注解分组只有 platform 和 internal）",
                    path.dotted()
                ))),
            }
        }
        _ => Err(CompileError::UnknownField(path.dotted())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_valid_expressions() {
        for script in [
            "true",
            "false",
            "target.alias == 'payments'",
            "target.jvmId != 'abc' && target.labels.env == 'prod'",
            "target.annotations.platform.namespace == 'default' || !(target.alias == 'x')",
            "target.labels['app.name'] contains 'cart'",
            "target.annotations.internal.port == 9091",
            "target.connectUrl matches '^service:jmx:'",
        ] {
            let compiled = compile(script);
            assert!(compiled.is_ok(), "编译失败: {script}: {compiled:?}");
            assert_eq!(compiled.unwrap().script(), script);
        }
    }

    #[test]
    fn test_garbage_is_compile_error() {
        assert!(compile("this is garbage").is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = compile("target.hostname == 'x'").unwrap_err();
        assert!(matches!(err, CompileError::UnknownField(_)));
        assert!(err.to_string().contains("target.hostname"));
    }

    #[test]
    fn test_unknown_root_variable_rejected() {
        let err = compile("server.alias == 'x'").unwrap_err();
        assert!(matches!(err, CompileError::UnknownField(_)));
    }

    #[test]
    fn test_scalar_field_subaccess_rejected() {
        assert!(compile("target.alias.length == 3").is_err());
    }

    #[test]
    fn test_labels_without_key_rejected() {
        assert!(compile("target.labels == 'x'").is_err());
    }

    #[test]
    fn test_unknown_annotation_group_rejected() {
        assert!(compile("target.annotations.custom.key == 'x'").is_err());
    }

    #[test]
    fn test_non_boolean_root_rejected() {
        let err = compile("target.alias").unwrap_err();
        assert!(matches!(err, CompileError::Type(_)));

        assert!(compile("'just a string'").is_err());
        assert!(compile("42").is_err());
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = compile("target.alias matches '[invalid'").unwrap_err();
        assert!(matches!(err, CompileError::InvalidRegex { .. }));
    }

    #[test]
    fn test_matches_requires_literal_pattern() {
        let err = compile("target.alias matches target.jvmId").unwrap_err();
        assert!(matches!(err, CompileError::Type(_)));
    }

    #[test]
    fn test_regex_precompiled() {
        let compiled = compile("target.alias matches '^pay.*'").unwrap();
        assert!(compiled.regex("^pay.*").is_some());
        assert!(compiled.regex("other").is_none());
    }

    #[test]
    fn test_logical_operand_must_be_boolean() {
        let err = compile("target.alias && true").unwrap_err();
        assert!(matches!(err, CompileError::Type(_)));
    }

    #[test]
    fn test_ordering_operand_must_be_value() {
        assert!(compile("(true && false) > 3").is_err());
    }
}
