//! Row-condition language for conditional rules.
//!
//! A condition is a small column-comparison expression evaluated per row,
//! in the style of a pandas query:
//!
//! ```text
//! expr    := or_expr
//! or_expr := and_expr ("or" and_expr)*
//! and_expr:= not_expr ("and" not_expr)*
//! not_expr:= "not"? cmp
//! cmp     := term (("==" | "!=" | "<" | "<=" | ">" | ">=") term)?
//! term    := ident | number | string | "(" expr ")"
//! ```
//!
//! Identifiers name dataset columns; strings are single- or double-quoted.
//! Comparisons against a null cell are false, so a `NotNull` rule gated on
//! `SecurityType == 'Bond'` skips rows where `SecurityType` itself is null.

use polars::prelude::DataFrame;
use std::collections::HashMap;

use super::{extract_cells, Cell, CellKind, ColumnCells};
use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Ident(String),
    Number(f64),
    Str(String),
    Group(Box<ConditionExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionExpr {
    Or(Box<ConditionExpr>, Box<ConditionExpr>),
    And(Box<ConditionExpr>, Box<ConditionExpr>),
    Not(Box<ConditionExpr>),
    Cmp(Term, CmpOp, Term),
    Term(Term),
}

impl ConditionExpr {
    pub fn parse(input: &str) -> DomainResult<Self> {
        let tokens = lex(input)?;
        let mut parser = Parser { tokens, pos: 0, input };
        let expr = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    /// Column names referenced anywhere in the expression.
    pub fn columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            ConditionExpr::Or(l, r) | ConditionExpr::And(l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            ConditionExpr::Not(inner) => inner.collect_columns(out),
            ConditionExpr::Cmp(l, _, r) => {
                collect_term_columns(l, out);
                collect_term_columns(r, out);
            }
            ConditionExpr::Term(t) => collect_term_columns(t, out),
        }
    }

    /// Evaluate the predicate over every row of the dataset.
    pub fn eval_mask(&self, df: &DataFrame) -> DomainResult<Vec<bool>> {
        let mut columns: HashMap<String, ColumnCells> = HashMap::new();
        for name in self.columns() {
            let cells = extract_cells(df, &name).map_err(|_| {
                DomainError::InvalidRule(format!(
                    "condition references unknown column '{name}'"
                ))
            })?;
            columns.insert(name, cells);
        }

        let height = df.height();
        let mut mask = Vec::with_capacity(height);
        for row in 0..height {
            mask.push(truthy(&eval_expr(self, row, &columns)));
        }
        Ok(mask)
    }
}

fn collect_term_columns(term: &Term, out: &mut Vec<String>) {
    match term {
        Term::Ident(name) => out.push(name.clone()),
        Term::Group(inner) => inner.collect_columns(out),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Op(CmpOp),
    And,
    Or,
    Not,
    Minus,
    LParen,
    RParen,
}

fn lex(input: &str) -> DomainResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CmpOp::Eq));
                    i += 2;
                } else {
                    return Err(lex_error(input, i, "expected '=='"));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CmpOp::Ne));
                    i += 2;
                } else {
                    return Err(lex_error(input, i, "expected '!='"));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CmpOp::Le));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CmpOp::Lt));
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CmpOp::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CmpOp::Gt));
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                        None => return Err(lex_error(input, i, "unterminated string")),
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| lex_error(input, start, "invalid number"))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            _ => return Err(lex_error(input, i, "unexpected character")),
        }
    }
    Ok(tokens)
}

fn lex_error(input: &str, pos: usize, message: &str) -> DomainError {
    DomainError::InvalidRule(format!("condition '{input}': {message} at offset {pos}"))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: &str) -> DomainError {
        DomainError::InvalidRule(format!("condition '{}': {message}", self.input))
    }

    fn expr(&mut self) -> DomainResult<ConditionExpr> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.and_expr()?;
            left = ConditionExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> DomainResult<ConditionExpr> {
        let mut left = self.not_expr()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.not_expr()?;
            left = ConditionExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> DomainResult<ConditionExpr> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            let inner = self.not_expr()?;
            return Ok(ConditionExpr::Not(Box::new(inner)));
        }
        self.cmp()
    }

    fn cmp(&mut self) -> DomainResult<ConditionExpr> {
        let left = self.term()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.next();
            let right = self.term()?;
            return Ok(ConditionExpr::Cmp(left, op, right));
        }
        Ok(ConditionExpr::Term(left))
    }

    fn term(&mut self) -> DomainResult<Term> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Term::Ident(name)),
            Some(Token::Number(n)) => Ok(Term::Number(n)),
            Some(Token::Minus) => match self.next() {
                Some(Token::Number(n)) => Ok(Term::Number(-n)),
                _ => Err(self.error("expected a number after '-'")),
            },
            Some(Token::Str(s)) => Ok(Term::Str(s)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(Term::Group(Box::new(inner))),
                    _ => Err(self.error("expected ')'")),
                }
            }
            _ => Err(self.error("expected a column, literal, or '('")),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum RowValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
}

fn eval_expr(expr: &ConditionExpr, row: usize, columns: &HashMap<String, ColumnCells>) -> RowValue {
    match expr {
        ConditionExpr::Or(l, r) => {
            if truthy(&eval_expr(l, row, columns)) {
                RowValue::Bool(true)
            } else {
                RowValue::Bool(truthy(&eval_expr(r, row, columns)))
            }
        }
        ConditionExpr::And(l, r) => {
            if !truthy(&eval_expr(l, row, columns)) {
                RowValue::Bool(false)
            } else {
                RowValue::Bool(truthy(&eval_expr(r, row, columns)))
            }
        }
        ConditionExpr::Not(inner) => RowValue::Bool(!truthy(&eval_expr(inner, row, columns))),
        ConditionExpr::Cmp(l, op, r) => {
            let lhs = eval_term(l, row, columns);
            let rhs = eval_term(r, row, columns);
            RowValue::Bool(compare(&lhs, *op, &rhs))
        }
        ConditionExpr::Term(t) => eval_term(t, row, columns),
    }
}

fn eval_term(term: &Term, row: usize, columns: &HashMap<String, ColumnCells>) -> RowValue {
    match term {
        Term::Number(n) => RowValue::Num(*n),
        Term::Str(s) => RowValue::Str(s.clone()),
        Term::Group(inner) => eval_expr(inner, row, columns),
        Term::Ident(name) => {
            let column = match columns.get(name) {
                Some(c) => c,
                None => return RowValue::Null,
            };
            let cell: &Cell = match column.cells.get(row) {
                Some(c) => c,
                None => return RowValue::Null,
            };
            if cell.text.is_none() {
                return RowValue::Null;
            }
            match column.kind {
                CellKind::Numeric => cell.number.map(RowValue::Num).unwrap_or(RowValue::Null),
                CellKind::Boolean => {
                    RowValue::Bool(cell.number.map(|n| n != 0.0).unwrap_or(false))
                }
                CellKind::Text => RowValue::Str(cell.text.clone().unwrap_or_default()),
            }
        }
    }
}

/// Null never compares equal to anything, matching pandas filter semantics.
fn compare(lhs: &RowValue, op: CmpOp, rhs: &RowValue) -> bool {
    use RowValue::*;
    match (lhs, rhs) {
        (Null, _) | (_, Null) => false,
        (Num(a), Num(b)) => compare_f64(*a, op, *b),
        (Str(a), Str(b)) => compare_ord(a.as_str(), op, b.as_str()),
        (Bool(a), Bool(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            _ => false,
        },
        (Bool(a), Num(b)) => compare_f64(if *a { 1.0 } else { 0.0 }, op, *b),
        (Num(a), Bool(b)) => compare_f64(*a, op, if *b { 1.0 } else { 0.0 }),
        (Num(a), Str(b)) => match b.trim().parse::<f64>() {
            Ok(parsed) => compare_f64(*a, op, parsed),
            Err(_) => op == CmpOp::Ne,
        },
        (Str(a), Num(b)) => match a.trim().parse::<f64>() {
            Ok(parsed) => compare_f64(parsed, op, *b),
            Err(_) => op == CmpOp::Ne,
        },
        (Bool(_), Str(_)) | (Str(_), Bool(_)) => op == CmpOp::Ne,
    }
}

fn compare_f64(a: f64, op: CmpOp, b: f64) -> bool {
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }
}

fn compare_ord<T: PartialOrd + PartialEq>(a: T, op: CmpOp, b: T) -> bool {
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }
}

fn truthy(value: &RowValue) -> bool {
    match value {
        RowValue::Null => false,
        RowValue::Bool(b) => *b,
        RowValue::Num(n) => *n != 0.0,
        RowValue::Str(s) => !s.is_empty(),
    }
}
