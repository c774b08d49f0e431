//! 匹配表达式抽象语法树
//!
//! 文法是封闭的：字段访问、字面量、比较操作、字符串操作和布尔连接，
//! 没有函数调用，也没有外部脚本宿主，保证求值是纯内存、有界的计算。

use std::fmt;

/// 表达式节点
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// 字面量
    Literal(Literal),
    /// 目标属性访问，如 `target.alias`
    Field(FieldPath),
    /// 逻辑非
    Not(Box<Expr>),
    /// 二元操作
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// 字面量值
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "'{s}'"),
        }
    }
}

/// 字段访问路径
///
/// 首段固定为绑定变量 `target`，后续为属性段。支持点号访问
/// （`target.labels.env`）和括号字符串索引（`target.labels['app.name']`），
/// 二者在 AST 中统一为段序列。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub segments: Vec<String>,
}

impl FieldPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// 点号拼接的完整路径，用于错误信息与快照查找
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

/// 二元操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // 布尔连接
    And,
    Or,

    // 通用比较
    Eq,
    Neq,

    // 数值比较
    Gt,
    Gte,
    Lt,
    Lte,

    // 字符串操作
    Contains,
    StartsWith,
    EndsWith,
    /// 正则匹配，模式在编译期预校验
    Matches,
}

impl BinaryOp {
    /// 是否为布尔连接（操作数必须是布尔表达式）
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// 是否为字符串操作（操作数必须是字符串值）
    pub fn is_string_op(&self) -> bool {
        matches!(
            self,
            Self::Contains | Self::StartsWith | Self::EndsWith | Self::Matches
        )
    }

    /// 是否为数值比较
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Matches => "matches",
        };
        write!(f, "{s}")
    }
}

impl Expr {
    /// 表达式是否产出布尔值
    ///
    /// 编译器用它拒绝非布尔根表达式（如裸字符串字面量）。
    pub fn is_boolean(&self) -> bool {
        match self {
            Self::Literal(Literal::Bool(_)) => true,
            Self::Literal(_) | Self::Field(_) => false,
            Self::Not(_) => true,
            Self::Binary { .. } => true,
        }
    }
}
