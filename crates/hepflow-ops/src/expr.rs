//! Column-wise predicate expressions for `filter`.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | "(" expr ")" | compare
//! compare := operand [ op literal ]
//! operand := ident | "len" "(" ident ")"
//! op      := "==" | "!=" | "<" | "<=" | ">" | ">="
//! literal := number | true | false | null | 'string' | "string"
//! ```
//!
//! A bare operand is true where a boolean column holds `true`. Comparisons
//! against null values are false, except `col == null` / `col != null`.

use std::fmt;

use hepflow_core::schema::{DataType, Schema};
use hepflow_core::types::{RecordBatch, Scalar};

use crate::traits::OpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    fn test(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Eq => ord == Equal,
            CmpOp::Ne => ord != Equal,
            CmpOp::Lt => ord == Less,
            CmpOp::Le => ord != Greater,
            CmpOp::Gt => ord == Greater,
            CmpOp::Ge => ord != Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Null => f.write_str("null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Column(String),
    /// Per-row length of a list column.
    Len(String),
}

impl Operand {
    pub fn column(&self) -> &str {
        match self {
            Operand::Column(c) | Operand::Len(c) => c,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(c) => f.write_str(c),
            Operand::Len(c) => write!(f, "len({c})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        operand: Operand,
        op: CmpOp,
        literal: Literal,
    },
    Truthy(Operand),
}

impl Expr {
    pub fn parse(src: &str) -> Result<Expr, OpError> {
        let tokens = tokenize(src)?;
        let mut p = Parser { tokens, pos: 0 };
        let expr = p.or()?;
        match p.peek() {
            None => Ok(expr),
            Some(t) => Err(OpError::Expr(format!("unexpected {t} in '{src}'"))),
        }
    }

    pub fn and(a: Expr, b: Expr) -> Expr {
        Expr::And(Box::new(a), Box::new(b))
    }

    /// Columns referenced, in first-use order.
    pub fn columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Expr::Or(a, b) | Expr::And(a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
            Expr::Not(e) => e.collect_columns(out),
            Expr::Compare { operand, .. } | Expr::Truthy(operand) => {
                let c = operand.column();
                if !out.iter().any(|o| o == c) {
                    out.push(c.to_string());
                }
            }
        }
    }

    /// Type-check against a schema.
    pub fn check(&self, schema: &Schema) -> Result<(), OpError> {
        match self {
            Expr::Or(a, b) | Expr::And(a, b) => {
                a.check(schema)?;
                b.check(schema)
            }
            Expr::Not(e) => e.check(schema),
            Expr::Truthy(operand) => match operand_type(operand, schema)? {
                DataType::Boolean => Ok(()),
                dt => Err(OpError::Expr(format!(
                    "'{operand}' is {dt}; a bare operand must be Boolean"
                ))),
            },
            Expr::Compare {
                operand,
                op,
                literal,
            } => {
                let dt = operand_type(operand, schema)?;
                let ok = match literal {
                    Literal::Null => matches!(op, CmpOp::Eq | CmpOp::Ne),
                    Literal::Int(_) | Literal::Float(_) => dt.is_numeric(),
                    Literal::Bool(_) => {
                        dt == DataType::Boolean && matches!(op, CmpOp::Eq | CmpOp::Ne)
                    }
                    Literal::Str(_) => dt == DataType::Utf8,
                };
                if ok {
                    Ok(())
                } else {
                    Err(OpError::Expr(format!(
                        "cannot compare '{operand}' ({dt}) {} {literal}",
                        op.symbol()
                    )))
                }
            }
        }
    }

    /// Evaluate to a row mask.
    pub fn eval(&self, batch: &RecordBatch) -> Result<Vec<bool>, OpError> {
        match self {
            Expr::Or(a, b) => {
                let mut m = a.eval(batch)?;
                for (x, y) in m.iter_mut().zip(b.eval(batch)?) {
                    *x = *x || y;
                }
                Ok(m)
            }
            Expr::And(a, b) => {
                let mut m = a.eval(batch)?;
                for (x, y) in m.iter_mut().zip(b.eval(batch)?) {
                    *x = *x && y;
                }
                Ok(m)
            }
            Expr::Not(e) => Ok(e.eval(batch)?.into_iter().map(|x| !x).collect()),
            Expr::Truthy(operand) => operand_values(operand, batch)?
                .iter()
                .map(|v| match v {
                    Scalar::Bool(b) => Ok(*b),
                    Scalar::Null => Ok(false),
                    other => Err(OpError::Expr(format!(
                        "'{operand}' holds non-boolean {other:?}"
                    ))),
                })
                .collect(),
            Expr::Compare {
                operand,
                op,
                literal,
            } => operand_values(operand, batch)?
                .iter()
                .map(|v| compare(v, *op, literal))
                .collect(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Or(a, b) => write!(f, "({a} || {b})"),
            Expr::And(a, b) => write!(f, "({a} && {b})"),
            Expr::Not(e) => write!(f, "!{e}"),
            Expr::Compare {
                operand,
                op,
                literal,
            } => write!(f, "{operand} {} {literal}", op.symbol()),
            Expr::Truthy(operand) => write!(f, "{operand}"),
        }
    }
}

fn operand_type(operand: &Operand, schema: &Schema) -> Result<DataType, OpError> {
    let field = schema.require(operand.column(), "filter expression")?;
    match operand {
        Operand::Column(_) if field.data_type.is_list() => Err(OpError::Expr(format!(
            "'{}' is a list column; compare len({}) instead",
            field.name, field.name
        ))),
        Operand::Column(_) => Ok(field.data_type.clone()),
        Operand::Len(_) if field.data_type.is_list() => Ok(DataType::Int64),
        Operand::Len(c) => Err(OpError::Expr(format!(
            "len() needs a list column, '{c}' is {}",
            field.data_type
        ))),
    }
}

fn operand_values(operand: &Operand, batch: &RecordBatch) -> Result<Vec<Scalar>, OpError> {
    let col = batch.require_column(operand.column())?;
    Ok(match operand {
        Operand::Column(_) => col.values.clone(),
        Operand::Len(name) => col
            .values
            .iter()
            .map(|v| match v {
                Scalar::List(items) => Ok(Scalar::I64(items.len() as i64)),
                Scalar::Null => Ok(Scalar::Null),
                other => Err(OpError::Expr(format!(
                    "len({name}) on non-list value {other:?}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
    })
}

fn compare(v: &Scalar, op: CmpOp, lit: &Literal) -> Result<bool, OpError> {
    if let Literal::Null = lit {
        return Ok(match op {
            CmpOp::Eq => v.is_null(),
            CmpOp::Ne => !v.is_null(),
            _ => return Err(OpError::Expr("null only supports == and !=".into())),
        });
    }
    let ord = match (v, lit) {
        (Scalar::Null, _) => return Ok(false),
        (Scalar::Bool(a), Literal::Bool(b)) => a.cmp(b),
        (Scalar::Str(a), Literal::Str(b)) => a.as_str().cmp(b.as_str()),
        (v, Literal::Int(b)) if v.as_i64().is_some() => v.as_i64().unwrap_or_default().cmp(b),
        (v, Literal::Int(b)) if v.as_f64().is_some() => {
            match v.as_f64().and_then(|a| a.partial_cmp(&(*b as f64))) {
                Some(o) => o,
                None => return Ok(false),
            }
        }
        (v, Literal::Float(b)) if v.as_f64().is_some() => {
            match v.as_f64().and_then(|a| a.partial_cmp(b)) {
                Some(o) => o,
                None => return Ok(false),
            }
        }
        (v, lit) => {
            return Err(OpError::Expr(format!(
                "cannot compare {v:?} with {lit}"
            )))
        }
    };
    Ok(op.test(ord))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(CmpOp),
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier '{s}'"),
            Token::Int(i) => write!(f, "number {i}"),
            Token::Float(x) => write!(f, "number {x}"),
            Token::Str(s) => write!(f, "string {s:?}"),
            Token::Op(op) => write!(f, "'{}'", op.symbol()),
            Token::AndAnd => f.write_str("'&&'"),
            Token::OrOr => f.write_str("'||'"),
            Token::Bang => f.write_str("'!'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, OpError> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    let err = |msg: String| OpError::Expr(format!("{msg} in '{src}'"));
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                out.push(Token::LParen);
                i += 1;
            }
            ')' => {
                out.push(Token::RParen);
                i += 1;
            }
            '&' if next == Some('&') => {
                out.push(Token::AndAnd);
                i += 2;
            }
            '|' if next == Some('|') => {
                out.push(Token::OrOr);
                i += 2;
            }
            '=' if next == Some('=') => {
                out.push(Token::Op(CmpOp::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                out.push(Token::Op(CmpOp::Ne));
                i += 2;
            }
            '!' => {
                out.push(Token::Bang);
                i += 1;
            }
            '<' | '>' => {
                let eq = next == Some('=');
                out.push(Token::Op(match (c, eq) {
                    ('<', true) => CmpOp::Le,
                    ('<', false) => CmpOp::Lt,
                    (_, true) => CmpOp::Ge,
                    (_, false) => CmpOp::Gt,
                }));
                i += if eq { 2 } else { 1 };
            }
            '\'' | '"' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&d| d == c)
                    .ok_or_else(|| err("unterminated string".into()))?;
                out.push(Token::Str(chars[i + 1..i + 1 + close].iter().collect()));
                i += close + 2;
            }
            c if c.is_ascii_digit()
                || c == '.'
                || (c == '-' && next.is_some_and(|n| n.is_ascii_digit() || n == '.')) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let d = chars[i];
                    let exp_sign =
                        (d == '-' || d == '+') && matches!(chars[i - 1], 'e' | 'E');
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exp_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let tok = match text.parse::<i64>() {
                    Ok(v) => Token::Int(v),
                    Err(_) => Token::Float(
                        text.parse::<f64>()
                            .map_err(|_| err(format!("bad number '{text}'")))?,
                    ),
                };
                out.push(tok);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                out.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(err(format!("unexpected character '{other}'"))),
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn eat(&mut self, t: &Token) -> bool {
        if self.peek() == Some(t) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, t: &Token) -> Result<(), OpError> {
        if self.eat(t) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {t}")))
        }
    }

    fn unexpected(&self, what: &str) -> OpError {
        match self.peek() {
            Some(t) => OpError::Expr(format!("{what}, found {t}")),
            None => OpError::Expr(format!("{what}, found end of expression")),
        }
    }

    fn or(&mut self) -> Result<Expr, OpError> {
        let mut lhs = self.and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, OpError> {
        let mut lhs = self.unary()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, OpError> {
        if self.eat(&Token::Bang) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.eat(&Token::LParen) {
            let e = self.or()?;
            self.expect(&Token::RParen)?;
            return Ok(e);
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, OpError> {
        let operand = match self.next() {
            Some(Token::Ident(name)) if name == "len" && self.peek() == Some(&Token::LParen) => {
                self.expect(&Token::LParen)?;
                let inner = match self.next() {
                    Some(Token::Ident(c)) => c,
                    _ => {
                        self.pos -= 1;
                        return Err(self.unexpected("expected column name inside len()"));
                    }
                };
                self.expect(&Token::RParen)?;
                Operand::Len(inner)
            }
            Some(Token::Ident(name)) => Operand::Column(name),
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("expected column or len(column)"));
            }
        };
        let op = match self.peek() {
            Some(Token::Op(op)) => *op,
            _ => return Ok(Expr::Truthy(operand)),
        };
        self.pos += 1;
        let literal = match self.next() {
            Some(Token::Int(i)) => Literal::Int(i),
            Some(Token::Float(x)) => Literal::Float(x),
            Some(Token::Str(s)) => Literal::Str(s),
            Some(Token::Ident(w)) if w == "true" => Literal::Bool(true),
            Some(Token::Ident(w)) if w == "false" => Literal::Bool(false),
            Some(Token::Ident(w)) if w == "null" => Literal::Null,
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("expected a literal"));
            }
        };
        Ok(Expr::Compare {
            operand,
            op,
            literal,
        })
    }
}
