use crate::environment::EnvRef;
use crate::{evaluator::EvalResult, source::Span};
use std::cmp::Ordering;
use std::fmt; // For custom display formatting
use std::ops::{Add, Mul, Sub};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Sexpr, // The actual S-expression data
    pub span: Span,  // The source span it covers
}

impl Node {
    pub fn new(kind: Sexpr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_symbol(name: impl Into<String>, span: Span) -> Self {
        Node::new(Sexpr::Symbol(name.into()), span)
    }

    pub fn new_int(n: i64, span: Span) -> Self {
        Node::new(Sexpr::Number(Number::Int(n)), span)
    }

    pub fn new_float(n: f64, span: Span) -> Self {
        Node::new(Sexpr::Number(Number::Float(n)), span)
    }

    pub fn new_string(s: impl Into<String>, span: Span) -> Self {
        Node::new(Sexpr::String(s.into()), span)
    }

    pub fn new_bool(b: bool, span: Span) -> Self {
        Node::new(Sexpr::Boolean(b), span)
    }

    pub fn new_list(elements: Vec<Node>, span: Span) -> Self {
        Node::new(Sexpr::List(elements), span)
    }

    pub fn new_void(span: Span) -> Self {
        Node::new(Sexpr::Void, span)
    }

    /// Builds `(quote <quoted>)`; `quote_span` is where the quote mark was.
    pub fn new_quote(quoted: Node, quote_span: Span) -> Self {
        let span = quote_span.merge(quoted.span);
        Node::new_list(vec![Node::new_symbol("quote", quote_span), quoted], span)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate to Sexpr's Display implementation
        write!(f, "{}", self.kind)
    }
}

/// The two numeric kinds: exact integers and floats.
#[derive(Debug, Copy, Clone)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    /// Division that stays exact when the integers divide evenly.
    /// `None` on division by zero.
    pub fn checked_div(self, other: Number) -> Option<Number> {
        if other.is_zero() {
            return None;
        }
        Some(match (self, other) {
            (Number::Int(a), Number::Int(b)) if a.checked_rem(b) == Some(0) => a
                .checked_div(b)
                .map(Number::Int)
                .unwrap_or(Number::Float(a as f64 / b as f64)),
            _ => Number::Float(self.as_f64() / other.as_f64()),
        })
    }

    /// Parses a numeric literal: integer first, then float.
    pub fn parse(text: &str) -> Option<Number> {
        text.parse::<i64>()
            .map(Number::Int)
            .or_else(|_| text.parse::<f64>().map(Number::Float))
            .ok()
    }
}

// Integer operations promote to float instead of overflowing.
macro_rules! number_op {
    ($trait:ident, $method:ident, $checked:ident, $op:tt) => {
        impl $trait for Number {
            type Output = Number;

            fn $method(self, other: Number) -> Number {
                match (self, other) {
                    (Number::Int(a), Number::Int(b)) => a
                        .$checked(b)
                        .map(Number::Int)
                        .unwrap_or(Number::Float(a as f64 $op b as f64)),
                    _ => Number::Float(self.as_f64() $op other.as_f64()),
                }
            }
        }
    };
}

number_op!(Add, add, checked_add, +);
number_op!(Sub, sub, checked_sub, -);
number_op!(Mul, mul, checked_mul, *);

// Numbers compare by value across kinds: 1 equals 1.0.
impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.partial_cmp(b),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            // Debug keeps the trailing ".0" that marks a float
            Number::Float(n) => write!(f, "{:?}", n),
        }
    }
}

/// Represents an S-expression (Symbolic Expression).
/// The same enum is the syntax tree and the runtime value domain.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexpr {
    Symbol(String),  // e.g., +, variable-name, quote
    Number(Number),  // 42, 4.2
    Boolean(bool),   // #t or #f, only produced at runtime
    String(String),  // "hello", only reachable through quote
    List(Vec<Node>), // e.g., (+ 1 2), (define x 10), ()
    Procedure(Procedure),
    Void, // Result of define, set! and friends
}

impl Sexpr {
    pub fn type_name(&self) -> &'static str {
        match self {
            Sexpr::Number(Number::Int(_)) => "integer",
            Sexpr::Number(Number::Float(_)) => "float",
            Sexpr::Symbol(_) => "symbol",
            Sexpr::Boolean(_) => "boolean",
            Sexpr::String(_) => "string",
            Sexpr::List(_) => "list",
            Sexpr::Procedure(_) => "procedure",
            Sexpr::Void => "void",
        }
    }

    /// Only `#f` and void are false; every other value, including `0` and
    /// `()`, is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Sexpr::Boolean(false) | Sexpr::Void)
    }

    /// Structural equality that ignores source spans. Numbers compare by
    /// value across kinds.
    pub fn same_value(&self, other: &Sexpr) -> bool {
        match (self, other) {
            (Sexpr::List(a), Sexpr::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.kind.same_value(&y.kind))
            }
            _ => self == other,
        }
    }

    /// Text as printed by `display`: strings without quotes, everything else
    /// as written.
    pub fn display_text(&self) -> String {
        match self {
            Sexpr::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

// Implement Display trait for pretty printing the Sexpr values
impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Symbol(s) => write!(f, "{}", s),
            Sexpr::Number(n) => write!(f, "{}", n),
            Sexpr::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Sexpr::List(list) => {
                write!(f, "(")?;
                let mut first = true;
                for expr in list {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", expr)?;
                    first = false;
                }
                write!(f, ")")
            }
            Sexpr::String(str) => write!(f, "\"{}\"", str),
            Sexpr::Procedure(procedure) => write!(f, "{}", procedure),
            Sexpr::Void => write!(f, "#<void>"),
        }
    }
}

/// Signature of every host function: evaluated arguments plus the span of
/// the call, for error reporting.
pub type HostFn = dyn Fn(Vec<Node>, Span) -> EvalResult;

/// A named Rust callable exposed to programs.
#[derive(Clone)]
pub struct HostFunction {
    pub name: String,
    pub func: Rc<HostFn>,
}

impl HostFunction {
    pub fn new(name: impl Into<String>, func: impl Fn(Vec<Node>, Span) -> EvalResult + 'static) -> Self {
        HostFunction {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn call(&self, args: Vec<Node>, span: Span) -> EvalResult {
        (self.func)(args, span)
    }
}

/// A user-defined procedure: parameters, a single body expression and the
/// environment it was created in.
pub struct Lambda {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Node,
    pub env: EnvRef,
}

// The captured environment usually contains the closure itself, so it is
// left out of Debug output.
impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lambda")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub enum Procedure {
    Lambda(Rc<Lambda>),
    Host(HostFunction),
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Lambda(lambda) => write!(f, "{:?}", lambda),
            Procedure::Host(host) => write!(f, "Host({})", host.name),
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Lambda(lambda) => match &lambda.name {
                Some(name) => write!(f, "#<lambda:{}>", name),
                None => write!(f, "#<lambda>"),
            },
            Procedure::Host(host) => write!(f, "#<host:{}>", host.name),
        }
    }
}

// Procedures are equal only when they are the same object.
impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Procedure::Lambda(l1), Procedure::Lambda(l2)) => Rc::ptr_eq(l1, l2),
            (Procedure::Host(h1), Procedure::Host(h2)) => {
                h1.name == h2.name && Rc::ptr_eq(&h1.func, &h2.func)
            }
            _ => false,
        }
    }
}
