//! 匹配表达式词法分析
//!
//! 将脚本文本切分为记号流。字符串字面量支持单双引号与反斜杠转义；
//! 标识符区分关键字（true/false/null 与字符串操作符）。

use crate::error::CompileError;

/// 词法记号
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Number(f64),

    True,
    False,
    Null,

    // 字符串操作符关键字
    Contains,
    StartsWith,
    EndsWith,
    Matches,

    // 标点
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Bang,

    // 连接与比较
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ident(s) => write!(f, "{s}"),
            Self::Str(s) => write!(f, "'{s}'"),
            Self::Number(n) => write!(f, "{n}"),
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Null => write!(f, "null"),
            Self::Contains => write!(f, "contains"),
            Self::StartsWith => write!(f, "startsWith"),
            Self::EndsWith => write!(f, "endsWith"),
            Self::Matches => write!(f, "matches"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::LBracket => write!(f, "["),
            Self::RBracket => write!(f, "]"),
            Self::Dot => write!(f, "."),
            Self::Bang => write!(f, "!"),
            Self::AndAnd => write!(f, "&&"),
            Self::OrOr => write!(f, "||"),
            Self::EqEq => write!(f, "=="),
            Self::NotEq => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
        }
    }
}

/// 将脚本切分为记号流
pub fn tokenize(script: &str) -> Result<Vec<Token>, CompileError> {
    let chars: Vec<char> = script.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            c if c.is_whitespace() => pos += 1,
            '(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                pos += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                pos += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                pos += 1;
            }
            '&' => {
                if chars.get(pos + 1) == Some(&'&') {
                    tokens.push(Token::AndAnd);
                    pos += 2;
                } else {
                    return Err(syntax(pos, "单个 '&'，是否想写 '&&'"));
                }
            }
            '|' => {
                if chars.get(pos + 1) == Some(&'|') {
                    tokens.push(Token::OrOr);
                    pos += 2;
                } else {
                    return Err(syntax(pos, "单个 '|'，是否想写 '||'"));
                }
            }
            '=' => {
                if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    pos += 2;
                } else {
                    return Err(syntax(pos, "单个 '='，是否想写 '=='"));
                }
            }
            '!' => {
                if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    pos += 2;
                } else {
                    tokens.push(Token::Bang);
                    pos += 1;
                }
            }
            '<' => {
                if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(Token::Lte);
                    pos += 2;
                } else {
                    tokens.push(Token::Lt);
                    pos += 1;
                }
            }
            '>' => {
                if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(Token::Gte);
                    pos += 2;
                } else {
                    tokens.push(Token::Gt);
                    pos += 1;
                }
            }
            '\'' | '"' => {
                let (s, next) = lex_string(&chars, pos)?;
                tokens.push(Token::Str(s));
                pos = next;
            }
            c if c.is_ascii_digit() || c == '-' => {
                let (n, next) = lex_number(&chars, pos)?;
                tokens.push(Token::Number(n));
                pos = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let (word, next) = lex_ident(&chars, pos);
                tokens.push(keyword_or_ident(word));
                pos = next;
            }
            other => return Err(syntax(pos, format!("无法识别的字符 '{other}'"))),
        }
    }

    Ok(tokens)
}

fn syntax(pos: usize, message: impl std::fmt::Display) -> CompileError {
    CompileError::Syntax(format!("位置 {pos}: {message}"))
}

/// 读取引号字符串，返回 (内容, 结束后的下标)
fn lex_string(chars: &[char], start: usize) -> Result<(String, usize), CompileError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut pos = start + 1;

    while pos < chars.len() {
        match chars[pos] {
            '\\' => {
                // 仅支持引号与反斜杠转义，其余原样保留
                match chars.get(pos + 1) {
                    Some(&next) if next == quote || next == '\\' => {
                        out.push(next);
                        pos += 2;
                    }
                    Some(&next) => {
                        out.push('\\');
                        out.push(next);
                        pos += 2;
                    }
                    None => return Err(syntax(pos, "字符串在转义符后中断")),
                }
            }
            c if c == quote => return Ok((out, pos + 1)),
            c => {
                out.push(c);
                pos += 1;
            }
        }
    }

    Err(syntax(start, "字符串缺少结束引号"))
}

/// 读取数字字面量（可带负号与小数部分）
fn lex_number(chars: &[char], start: usize) -> Result<(f64, usize), CompileError> {
    let mut pos = start;
    if chars[pos] == '-' {
        pos += 1;
    }
    let digits_start = pos;
    while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
        pos += 1;
    }
    if pos == digits_start {
        return Err(syntax(start, "'-' 后缺少数字"));
    }

    let text: String = chars[start..pos].iter().collect();
    let value = text
        .parse::<f64>()
        .map_err(|_| syntax(start, format!("无效的数字 '{text}'")))?;
    Ok((value, pos))
}

fn lex_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut pos = start;
    while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
        pos += 1;
    }
    (chars[start..pos].iter().collect(), pos)
}

fn keyword_or_ident(word: String) -> Token {
    match word.as_str() {
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        "contains" => Token::Contains,
        "startsWith" => Token::StartsWith,
        "endsWith" => Token::EndsWith,
        "matches" => Token::Matches,
        _ => Token::Ident(word),
    }
}
