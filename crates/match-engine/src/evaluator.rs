//! 匹配表达式求值器
//!
//! 在单个目标的属性快照上执行编译后的表达式，实现短路求值。
//! 求值是无副作用的确定性计算：对固定的目标快照，结果恒定；
//! 不做任何网络或磁盘 I/O。
//!
//! null 语义：缺失的可选属性（如未设置的别名、不存在的标签键）取值
//! 为 null。`==`/`!=` 把 null 当作普通值参与比较；其余操作符遇到
//! null 即返回求值错误，由调用方决定是上抛还是按"不匹配"降级。

use serde_json::Value;

use crate::ast::{BinaryOp, Expr, FieldPath, Literal};
use crate::compiler::CompiledExpression;
use crate::error::EvaluationError;
use flightwatch_shared::target::Target;

/// 在目标上求值编译后的表达式
pub fn evaluate(compiled: &CompiledExpression, target: &Target) -> Result<bool, EvaluationError> {
    let ctx = target.to_match_context();
    eval_bool(compiled.root(), &ctx, compiled)
}

/// 求值布尔表达式节点（短路）
fn eval_bool(
    expr: &Expr,
    ctx: &Value,
    compiled: &CompiledExpression,
) -> Result<bool, EvaluationError> {
    match expr {
        Expr::Literal(Literal::Bool(b)) => Ok(*b),
        Expr::Not(inner) => Ok(!eval_bool(inner, ctx, compiled)?),
        Expr::Binary { op, lhs, rhs } => match op {
            // AND: 左侧为 false 时右侧不再求值
            BinaryOp::And => Ok(eval_bool(lhs, ctx, compiled)? && eval_bool(rhs, ctx, compiled)?),
            // OR: 左侧为 true 时右侧不再求值
            BinaryOp::Or => Ok(eval_bool(lhs, ctx, compiled)? || eval_bool(rhs, ctx, compiled)?),
            _ => eval_comparison(*op, lhs, rhs, ctx, compiled),
        },
        // 编译器已拒绝非布尔节点，这里兜底处理直接构造的 AST
        Expr::Literal(lit) => Err(EvaluationError::TypeMismatch {
            expected: "boolean".to_string(),
            actual: lit.to_string(),
        }),
        Expr::Field(path) => Err(EvaluationError::TypeMismatch {
            expected: "boolean".to_string(),
            actual: path.dotted(),
        }),
    }
}

/// 求值比较/字符串操作
fn eval_comparison(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &Value,
    compiled: &CompiledExpression,
) -> Result<bool, EvaluationError> {
    let (left, left_path) = eval_operand(lhs, ctx, compiled)?;
    let (right, right_path) = eval_operand(rhs, ctx, compiled)?;

    match op {
        BinaryOp::Eq => Ok(values_equal(&left, &right)),
        BinaryOp::Neq => Ok(!values_equal(&left, &right)),
        BinaryOp::Gt => compare_numbers(&left, left_path, &right, right_path, |a, b| a > b),
        BinaryOp::Gte => compare_numbers(&left, left_path, &right, right_path, |a, b| a >= b),
        BinaryOp::Lt => compare_numbers(&left, left_path, &right, right_path, |a, b| a < b),
        BinaryOp::Lte => compare_numbers(&left, left_path, &right, right_path, |a, b| a <= b),
        BinaryOp::Contains => {
            let (l, r) = string_operands(&left, left_path, &right, right_path)?;
            Ok(l.contains(r))
        }
        BinaryOp::StartsWith => {
            let (l, r) = string_operands(&left, left_path, &right, right_path)?;
            Ok(l.starts_with(r))
        }
        BinaryOp::EndsWith => {
            let (l, r) = string_operands(&left, left_path, &right, right_path)?;
            Ok(l.ends_with(r))
        }
        BinaryOp::Matches => {
            let (l, pattern) = string_operands(&left, left_path, &right, right_path)?;
            match compiled.regex(pattern) {
                Some(regex) => Ok(regex.is_match(l)),
                // 编译器保证模式已预编译，这里兜底处理直接构造的 AST
                None => {
                    let regex = regex::Regex::new(pattern).map_err(|e| {
                        EvaluationError::TypeMismatch {
                            expected: "有效的正则模式".to_string(),
                            actual: format!("'{pattern}': {e}"),
                        }
                    })?;
                    Ok(regex.is_match(l))
                }
            }
        }
        BinaryOp::And | BinaryOp::Or => Err(EvaluationError::TypeMismatch {
            expected: "比较操作符".to_string(),
            actual: op.to_string(),
        }),
    }
}

/// 求值操作数，返回值与来源字段路径（用于空值错误定位）
fn eval_operand(
    expr: &Expr,
    ctx: &Value,
    compiled: &CompiledExpression,
) -> Result<(Value, Option<String>), EvaluationError> {
    match expr {
        Expr::Literal(Literal::Null) => Ok((Value::Null, None)),
        Expr::Literal(Literal::Bool(b)) => Ok((Value::Bool(*b), None)),
        Expr::Literal(Literal::Number(n)) => Ok((serde_json::json!(n), None)),
        Expr::Literal(Literal::String(s)) => Ok((Value::String(s.clone()), None)),
        Expr::Field(path) => Ok((
            lookup_field(ctx, path).cloned().unwrap_or(Value::Null),
            Some(path.dotted()),
        )),
        // 括号包裹的布尔子表达式可以作为 ==/!= 的操作数
        other => Ok((Value::Bool(eval_bool(other, ctx, compiled)?), None)),
    }
}

/// 按路径段查找快照字段
fn lookup_field<'a>(ctx: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut current = ctx;
    for segment in &path.segments {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

/// 相等比较
///
/// 数值比较统一转为浮点数，避免整数和浮点数比较失败（如 100 == 100.0），
/// 数字内容的字符串也参与数值比较（注解值都是字符串）。
/// null 与 null 相等，与其他任何值不等。
fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
        return (l - r).abs() < f64::EPSILON;
    }
    left == right
}

/// 数值比较，null 字段报空值解引用错误
fn compare_numbers<F>(
    left: &Value,
    left_path: Option<String>,
    right: &Value,
    right_path: Option<String>,
    cmp: F,
) -> Result<bool, EvaluationError>
where
    F: Fn(f64, f64) -> bool,
{
    let l = require_number(left, left_path)?;
    let r = require_number(right, right_path)?;
    Ok(cmp(l, r))
}

fn require_number(value: &Value, path: Option<String>) -> Result<f64, EvaluationError> {
    if value.is_null()
        && let Some(path) = path
    {
        return Err(EvaluationError::NullField(path));
    }
    as_f64(value).ok_or_else(|| EvaluationError::TypeMismatch {
        expected: "number".to_string(),
        actual: type_name(value).to_string(),
    })
}

/// 字符串操作的两侧都必须是字符串，null 字段报空值解引用错误
fn string_operands<'a>(
    left: &'a Value,
    left_path: Option<String>,
    right: &'a Value,
    right_path: Option<String>,
) -> Result<(&'a str, &'a str), EvaluationError> {
    let l = require_string(left, left_path)?;
    let r = require_string(right, right_path)?;
    Ok((l, r))
}

fn require_string(value: &Value, path: Option<String>) -> Result<&str, EvaluationError> {
    if value.is_null()
        && let Some(path) = path
    {
        return Err(EvaluationError::NullField(path));
    }
    value.as_str().ok_or_else(|| EvaluationError::TypeMismatch {
        expected: "string".to_string(),
        actual: type_name(value).to_string(),
    })
}

/// 尝试将 Value 转换为 f64
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// 获取值的类型名称
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
