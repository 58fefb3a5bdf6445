// Formula parser - converts formula strings into AST
// Supports: numbers, cell refs (A1), header-named refs, SUM(a:b) as a
// whole formula, basic math (+, -, *, /), parentheses.

use crate::addressing::{parse_cell_ref, parse_named_ref, CellRef, HeaderMap};

/// Expression AST for the grid formula language.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Cell reference; `row: None` means the current row.
    Ref(CellRef),
    /// Inclusive rectangular sum between two reference endpoints.
    /// Endpoints may be given in either order.
    Sum(CellRef, CellRef),
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

/// Parse a formula string (must start with `=`) into an AST.
///
/// SUM is only recognized as the entire formula body. Anything outside
/// the arithmetic grammar — other identifiers, comparisons, quotes,
/// semicolons — is a parse error, and the caller falls back to showing
/// the original text. That rejection is the security boundary for
/// user-editable cells.
pub fn parse(formula: &str, headers: &HeaderMap) -> Result<Expr, String> {
    let formula = formula.trim();
    let input = formula
        .strip_prefix('=')
        .ok_or_else(|| "Formula must start with =".to_string())?;

    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("Empty formula".to_string());
    }

    if let Some(sum) = try_parse_sum(&tokens, headers) {
        return sum;
    }

    let (expr, pos) = parse_add_sub(&tokens, 0)?;
    if pos != tokens.len() {
        return Err(format!("Unexpected token at position {}", pos));
    }
    Ok(expr)
}

#[derive(Debug, Clone)]
enum Token {
    Number(f64),
    /// Classic LETTERS+DIGITS reference (row already 0-based)
    CellRef { row: usize, col: usize },
    /// Identifier: SUM, a header name, or a header name with row digits
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Colon,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                tokens.push(Token::Plus);
                chars.next();
            }
            '-' => {
                tokens.push(Token::Minus);
                chars.next();
            }
            '*' => {
                tokens.push(Token::Star);
                chars.next();
            }
            '/' => {
                tokens.push(Token::Slash);
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            ':' => {
                tokens.push(Token::Colon);
                chars.next();
            }
            'A'..='Z' | 'a'..='z' | '_' => {
                // Cell reference (A1), SUM, or a header name
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Some(CellRef { row: Some(row), col }) = parse_cell_ref(&ident, None) {
                    tokens.push(Token::CellRef { row, col });
                } else {
                    tokens.push(Token::Ident(ident));
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("Unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

/// Recognize `SUM ( ref : ref )` spanning the whole token stream.
/// Returns None when the stream is not shaped like a SUM call at all,
/// so the arithmetic grammar gets its turn.
fn try_parse_sum(tokens: &[Token], headers: &HeaderMap) -> Option<Result<Expr, String>> {
    match tokens.first() {
        Some(Token::Ident(name)) if name.eq_ignore_ascii_case("SUM") => {}
        _ => return None,
    }
    if tokens.len() != 6 {
        return Some(Err("SUM expects a single range: SUM(a:b)".to_string()));
    }
    if !matches!(tokens[1], Token::LParen)
        || !matches!(tokens[3], Token::Colon)
        || !matches!(tokens[5], Token::RParen)
    {
        return Some(Err("SUM expects a single range: SUM(a:b)".to_string()));
    }
    let start = match range_endpoint(&tokens[2], headers) {
        Ok(r) => r,
        Err(e) => return Some(Err(e)),
    };
    let end = match range_endpoint(&tokens[4], headers) {
        Ok(r) => r,
        Err(e) => return Some(Err(e)),
    };
    Some(Ok(Expr::Sum(start, end)))
}

/// Resolve one SUM range endpoint: a classic ref, a bare header name,
/// or a header name with a 1-based row suffix.
fn range_endpoint(token: &Token, headers: &HeaderMap) -> Result<CellRef, String> {
    match token {
        Token::CellRef { row, col } => Ok(CellRef {
            row: Some(*row),
            col: *col,
        }),
        Token::Ident(name) => parse_cell_ref(name, Some(headers))
            .or_else(|| parse_named_ref(name, headers))
            .ok_or_else(|| format!("Unknown range endpoint: {}", name)),
        _ => Err("Expected cell reference in range".to_string()),
    }
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_primary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_primary(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    if pos >= tokens.len() {
        return Err("Unexpected end of expression".to_string());
    }

    match &tokens[pos] {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::CellRef { row, col } => Ok((
            Expr::Ref(CellRef {
                row: Some(*row),
                col: *col,
            }),
            pos + 1,
        )),
        Token::LParen => {
            let (expr, pos) = parse_add_sub(tokens, pos + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((expr, pos + 1)),
                _ => Err("Missing closing parenthesis".to_string()),
            }
        }
        Token::Plus => {
            // Unary plus (no-op)
            parse_primary(tokens, pos + 1)
        }
        Token::Minus => {
            // Unary minus
            let (expr, pos) = parse_primary(tokens, pos + 1)?;
            Ok((
                Expr::BinaryOp {
                    op: Op::Sub,
                    left: Box::new(Expr::Number(0.0)),
                    right: Box::new(expr),
                },
                pos,
            ))
        }
        Token::Ident(name) => Err(format!("Unknown identifier: {}", name)),
        _ => Err(format!("Unexpected token at position {}", pos)),
    }
}
