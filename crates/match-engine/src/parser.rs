//! 匹配表达式语法分析
//!
//! 递归下降解析器。优先级从低到高：`||`、`&&`、比较/字符串操作、
//! 一元 `!`、括号与原子。比较操作不可结合（`a == b == c` 是语法错误，
//! 需要显式括号）。

use crate::ast::{BinaryOp, Expr, FieldPath, Literal};
use crate::error::CompileError;
use crate::lexer::Token;

/// 将记号流解析为表达式树
pub fn parse(tokens: &[Token]) -> Result<Expr, CompileError> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;

    if let Some(tok) = parser.peek() {
        return Err(CompileError::Syntax(format!(
            "表达式结尾存在多余的记号 '{tok}'"
        )));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), CompileError> {
        match self.advance() {
            Some(tok) if tok == expected => Ok(()),
            Some(tok) => Err(CompileError::Syntax(format!(
                "期望 '{expected}'，实际 '{tok}'"
            ))),
            None => Err(CompileError::Syntax(format!(
                "期望 '{expected}'，但表达式已结束"
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_comparison()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    /// 比较层：最多一个比较操作符，不可链式
    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.parse_unary()?;

        let op = match self.peek() {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::Neq,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Gte) => BinaryOp::Gte,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Lte) => BinaryOp::Lte,
            Some(Token::Contains) => BinaryOp::Contains,
            Some(Token::StartsWith) => BinaryOp::StartsWith,
            Some(Token::EndsWith) => BinaryOp::EndsWith,
            Some(Token::Matches) => BinaryOp::Matches,
            _ => return Ok(lhs),
        };
        self.advance();

        let rhs = self.parse_unary()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.peek() == Some(&Token::Bang) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.advance() {
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::True) => Ok(Expr::Literal(Literal::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Literal::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Literal::Null)),
            Some(Token::Number(n)) => Ok(Expr::Literal(Literal::Number(*n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Literal::String(s.clone()))),
            Some(Token::Ident(first)) => self.parse_field_path(first.clone()),
            Some(tok) => Err(CompileError::Syntax(format!("意外的记号 '{tok}'"))),
            None => Err(CompileError::Syntax("表达式为空或意外结束".to_string())),
        }
    }

    /// 字段路径：`ident ('.' ident | '[' string ']')*`
    fn parse_field_path(&mut self, first: String) -> Result<Expr, CompileError> {
        let mut segments = vec![first];

        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    match self.advance() {
                        Some(Token::Ident(seg)) => segments.push(seg.clone()),
                        Some(tok) => {
                            return Err(CompileError::Syntax(format!(
                                "'.' 后期望字段名，实际 '{tok}'"
                            )));
                        }
                        None => {
                            return Err(CompileError::Syntax(
                                "'.' 后期望字段名，但表达式已结束".to_string(),
                            ));
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.advance();
                    match self.advance() {
                        Some(Token::Str(key)) => segments.push(key.clone()),
                        Some(tok) => {
                            return Err(CompileError::Syntax(format!(
                                "'[' 内期望字符串键，实际 '{tok}'"
                            )));
                        }
                        None => {
                            return Err(CompileError::Syntax(
                                "'[' 内期望字符串键，但表达式已结束".to_string(),
                            ));
                        }
                    }
                    self.expect(&Token::RBracket)?;
                }
                _ => break,
            }
        }

        Ok(Expr::Field(FieldPath::new(segments)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_script(script: &str) -> Result<Expr, CompileError> {
        parse(&tokenize(script).unwrap())
    }

    #[test]
    fn test_parse_simple_comparison() {
        let expr = parse_script("target.alias == 'payments'").unwrap();
        match expr {
            Expr::Binary { op, lhs, rhs } => {
                assert_eq!(op, BinaryOp::Eq);
                assert_eq!(
                    *lhs,
                    Expr::Field(FieldPath::new(vec![
                        "target".to_string(),
                        "alias".to_string()
                    ]))
                );
                assert_eq!(*rhs, Expr::Literal(Literal::String("payments".to_string())));
            }
            other => panic!("期望二元表达式，实际 {other:?}"),
        }
    }

    #[test]
    fn test_precedence_and_over_or() {
        // a || b && c 应解析为 a || (b && c)
        let expr = parse_script("true || false && false").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Or,
                rhs,
                ..
            } => match *rhs {
                Expr::Binary {
                    op: BinaryOp::And, ..
                } => {}
                other => panic!("期望 && 子树，实际 {other:?}"),
            },
            other => panic!("期望 || 根节点，实际 {other:?}"),
        }
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let expr = parse_script("(true || false) && false").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::And,
                lhs,
                ..
            } => match *lhs {
                Expr::Binary {
                    op: BinaryOp::Or, ..
                } => {}
                other => panic!("期望 || 子树，实际 {other:?}"),
            },
            other => panic!("期望 && 根节点，实际 {other:?}"),
        }
    }

    #[test]
    fn test_not_binds_tighter_than_and() {
        let expr = parse_script("!true && false").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::And,
                lhs,
                ..
            } => match *lhs {
                Expr::Not(_) => {}
                other => panic!("期望 ! 子树，实际 {other:?}"),
            },
            other => panic!("期望 && 根节点，实际 {other:?}"),
        }
    }

    #[test]
    fn test_bracket_index_path() {
        let expr = parse_script("target.labels['app.name'] == 'cart'").unwrap();
        match expr {
            Expr::Binary { lhs, .. } => {
                assert_eq!(
                    *lhs,
                    Expr::Field(FieldPath::new(vec![
                        "target".to_string(),
                        "labels".to_string(),
                        "app.name".to_string(),
                    ]))
                );
            }
            other => panic!("期望二元表达式，实际 {other:?}"),
        }
    }

    #[test]
    fn test_chained_comparison_rejected() {
        let result = parse_script("1 == 1 == 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_expression_rejected() {
        let result = parse_script("");
        assert!(result.is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_script("this is garbage").is_err());
        assert!(parse_script("(true").is_err());
        assert!(parse_script("&& true").is_err());
    }

    #[test]
    fn test_string_operators() {
        for script in [
            "target.connectUrl contains 'jmxrmi'",
            "target.alias startsWith 'pay'",
            "target.alias endsWith 'svc'",
            "target.alias matches '^pay.*'",
        ] {
            assert!(parse_script(script).is_ok(), "解析失败: {script}");
        }
    }
}
