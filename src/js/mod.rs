//! A small JavaScript syntax tree.
//!
//! Script bodies arrive here already parsed (lexing and parsing JavaScript
//! happen upstream), and the compiler synthesizes glue code with the same
//! types. [`render_stmts`] turns trees back into source text.

mod render;

pub use render::{render_expr, render_stmt, render_stmts};

/// Source offsets of a node in its input, used to keep spans across folding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const UNKNOWN: Span = Span { start: 0, end: 0 };

    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }

    /// The smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        if self.is_unknown() {
            return other;
        }
        if other.is_unknown() {
            return self;
        }
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StringLit {
    pub value: String,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Void,
    TypeOf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
    Comma,
}

/// A function literal or declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

impl Function {
    /// Create a function expression with no name.
    pub fn anonymous(params: &[&str], body: Vec<Stmt>) -> Self {
        Self {
            name: None,
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Str(StringLit),
    Num(f64),
    Bool(bool),
    Null,
    This,
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(Box<Expr>, Box<Expr>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Function(Box<Function>),
}

impl Expr {
    /// A string literal with no source position.
    pub fn string(value: impl Into<String>) -> Self {
        Self::string_at(value, Span::UNKNOWN)
    }

    pub fn string_at(value: impl Into<String>, span: Span) -> Self {
        Expr::Str(StringLit {
            value: value.into(),
            span,
        })
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn member(object: Expr, property: impl Into<String>) -> Self {
        Expr::Member(Box::new(object), property.into())
    }

    /// `callee(args...)`
    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call(Box::new(callee), args)
    }

    /// `object.method(args...)`
    pub fn method(object: Expr, method: &str, args: Vec<Expr>) -> Self {
        Self::call(Self::member(object, method), args)
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary(op, Box::new(left), Box::new(right))
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Add, left, right)
    }

    /// `left, right`: evaluates both, yields `right`.
    pub fn comma(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Comma, left, right)
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign(Box::new(target), Box::new(value))
    }

    pub fn conditional(test: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Conditional(Box::new(test), Box::new(then), Box::new(otherwise))
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary(op, Box::new(operand))
    }

    pub fn function(function: Function) -> Self {
        Expr::Function(Box::new(function))
    }

    pub fn is_binary(&self, op: BinaryOp) -> bool {
        matches!(self, Expr::Binary(o, _, _) if *o == op)
    }

    /// True for string, number, boolean and null literals.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Str(_) | Expr::Num(_) | Expr::Bool(_) | Expr::Null
        )
    }

    /// The string a literal (or a negated number literal) evaluates to when
    /// coerced to a string.
    pub fn as_string_literal(&self) -> Option<StringLit> {
        let value = match self {
            Expr::Str(s) => return Some(s.clone()),
            Expr::Num(n) => number_to_string(*n),
            Expr::Bool(b) => b.to_string(),
            Expr::Null => "null".to_string(),
            Expr::Unary(UnaryOp::Neg, operand) => match operand.as_ref() {
                Expr::Num(n) => format!("-{}", number_to_string(*n)),
                _ => return None,
            },
            _ => return None,
        };
        Some(StringLit {
            value,
            span: Span::UNKNOWN,
        })
    }

    /// Strip parts of the expression that have no observable effect.
    ///
    /// Returns `None` when nothing is left to evaluate.
    pub fn simplify_for_side_effect(self) -> Option<Expr> {
        match self {
            Expr::Str(_)
            | Expr::Num(_)
            | Expr::Bool(_)
            | Expr::Null
            | Expr::This
            | Expr::Function(_) => None,
            Expr::Binary(BinaryOp::Comma, left, right) => {
                match (left.simplify_for_side_effect(), right.simplify_for_side_effect()) {
                    (None, None) => None,
                    (Some(e), None) | (None, Some(e)) => Some(e),
                    (Some(l), Some(r)) => Some(Expr::comma(l, r)),
                }
            }
            other => Some(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Var(String, Option<Expr>),
    Return(Option<Expr>),
    If(Expr, Vec<Stmt>, Option<Vec<Stmt>>),
    Block(Vec<Stmt>),
    Try {
        body: Vec<Stmt>,
        param: String,
        handler: Vec<Stmt>,
    },
    Function(Function),
}

impl Stmt {
    pub fn expr(e: Expr) -> Self {
        Stmt::Expr(e)
    }

    pub fn var(name: impl Into<String>, init: Option<Expr>) -> Self {
        Stmt::Var(name.into(), init)
    }
}

/// JavaScript's `Number.prototype.toString()`: the shortest digits that
/// round-trip, laid out in fixed or exponent form by the decimal exponent.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let mut buffer = ryu::Buffer::new();
    let (digits, point) = decimal_digits(buffer.format_finite(n.abs()));
    let sign = if n < 0.0 { "-" } else { "" };
    format!("{sign}{}", layout(&digits, point))
}

/// Split ryu output into significant digits and the position of the decimal
/// point relative to them, so the value is `0.digits * 10^point`.
fn decimal_digits(formatted: &str) -> (String, i32) {
    let (mantissa, exponent) = match formatted.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (formatted, 0),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mut point = int.len() as i32 + exponent;
    let all = format!("{int}{frac}");
    let trimmed = all.trim_start_matches('0');
    point -= (all.len() - trimmed.len()) as i32;
    (trimmed.trim_end_matches('0').to_string(), point)
}

fn layout(digits: &str, point: i32) -> String {
    let k = digits.len() as i32;
    if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat(-point as usize))
    } else {
        let exponent = point - 1;
        let sign = if exponent < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{sign}{}", exponent.abs())
        } else {
            format!("{first}.{rest}e{sign}{}", exponent.abs())
        }
    }
}
