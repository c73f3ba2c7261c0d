//! Bindings beyond the core primitives: default I/O procedures and the
//! `builtins` and `math` host modules.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use crate::environment::EnvRef;
use crate::evaluator::{EvalError, EvalResult};
use crate::host::HostModule;
use crate::primitives::{check_arity, expect_number};
use crate::source::Span;
use crate::types::{HostFunction, Node, Number, Procedure, Sexpr};

pub type Output = Rc<RefCell<dyn Write>>;
pub type Input = Rc<RefCell<dyn LineInput>>;

/// Where `read` takes its lines from.
pub trait LineInput {
    /// Appends the next line, newline included, to `buf`. Returns the number
    /// of bytes read, zero at end of input.
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize>;
}

// Goes through stdin's shared buffer, so no input is held back from other
// readers such as the line editor.
impl LineInput for io::Stdin {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        io::Stdin::read_line(self, buf)
    }
}

impl<T: AsRef<[u8]>> LineInput for io::Cursor<T> {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        BufRead::read_line(self, buf)
    }
}

impl<R: io::Read> LineInput for io::BufReader<R> {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        BufRead::read_line(self, buf)
    }
}

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

fn io_error(name: &str, err: io::Error, span: Span) -> EvalError {
    EvalError::InvalidArguments(format!("{}: I/O error: {}", name, err), span)
}

/// Binds `display`, `newline`, `read` and `clear` in `env` without
/// overriding existing bindings.
pub fn install_io(env: &EnvRef, output: Output, input: Input) {
    let mut env = env.borrow_mut();
    let mut bind = |function: HostFunction| {
        let name = function.name.clone();
        let node = Node::new(Sexpr::Procedure(Procedure::Host(function)), Span::default());
        env.define_with(name, node, false);
    };

    let out = output.clone();
    bind(HostFunction::new("display", move |args: Vec<Node>, span| {
        let text: Vec<String> = args.iter().map(|arg| arg.kind.display_text()).collect();
        writeln!(out.borrow_mut(), "{}", text.join(" ")).map_err(|e| io_error("display", e, span))?;
        Ok(Node::new_void(span))
    }));

    let out = output.clone();
    bind(HostFunction::new("newline", move |args: Vec<Node>, span| {
        check_arity!(args, 0, span, "newline");
        writeln!(out.borrow_mut()).map_err(|e| io_error("newline", e, span))?;
        Ok(Node::new_void(span))
    }));

    let out = output.clone();
    bind(HostFunction::new("read", move |args: Vec<Node>, span| {
        check_arity!(args, 0, 1, span, "read");
        if let Some(prompt) = args.first() {
            let mut out = out.borrow_mut();
            write!(out, "{}", prompt.kind.display_text())
                .and_then(|()| out.flush())
                .map_err(|e| io_error("read", e, span))?;
        }
        let mut line = String::new();
        let bytes = input
            .borrow_mut()
            .read_line(&mut line)
            .map_err(|e| io_error("read", e, span))?;
        if bytes == 0 {
            return Err(EvalError::InvalidArguments(
                "read: end of input".to_string(),
                span,
            ));
        }
        let line = line.strip_suffix('\n').unwrap_or(&line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        Ok(Node::new_string(line, span))
    }));

    let out = output;
    bind(HostFunction::new("clear", move |args: Vec<Node>, span| {
        check_arity!(args, 0, span, "clear");
        let mut out = out.borrow_mut();
        write!(out, "{}", CLEAR_SCREEN)
            .and_then(|()| out.flush())
            .map_err(|e| io_error("clear", e, span))?;
        Ok(Node::new_void(span))
    }));
}

// --- builtins ---

/// General purpose procedures, imported without a prefix by default.
pub fn builtins_module() -> HostModule {
    HostModule::new("builtins")
        .with_function("abs", builtin_abs)
        .with_function("min", builtin_min)
        .with_function("max", builtin_max)
        .with_function("round", builtin_round)
        .with_function("int", builtin_int)
        .with_function("float", builtin_float)
        .with_function("str", builtin_str)
        .with_function("len", builtin_len)
        .with_function("range", builtin_range)
        .with_function("sum", builtin_sum)
        .with_function("not", builtin_not)
        .with_function("in", builtin_in)
        .with_function("type", builtin_type)
}

/// A whole float as an integer when it fits, otherwise as a float.
fn integral(value: f64) -> Number {
    if value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Number::Int(value as i64)
    } else {
        Number::Float(value)
    }
}

fn number_node(number: Number, span: Span) -> EvalResult {
    Ok(Node::new(Sexpr::Number(number), span))
}

fn builtin_abs(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 1, span, "abs");
    let number = expect_number!(&args[0], span, "abs", 1);
    let result = match number {
        Number::Int(n) => n
            .checked_abs()
            .map(Number::Int)
            .unwrap_or(Number::Float((n as f64).abs())),
        Number::Float(n) => Number::Float(n.abs()),
    };
    number_node(result, span)
}

// (min 3 1 2) or (min '(3 1 2))
fn extreme(args: Vec<Node>, span: Span, name: &str, pick_new: fn(Number, Number) -> bool) -> EvalResult {
    check_arity!(args, min 1, span, name);
    let candidates = match args.as_slice() {
        [Node {
            kind: Sexpr::List(elements),
            ..
        }] => elements.clone(),
        _ => args.clone(),
    };
    let mut best: Option<Number> = None;
    for (i, node) in candidates.iter().enumerate() {
        let number = expect_number!(node, span, name, i + 1);
        best = match best {
            Some(current) if !pick_new(number, current) => Some(current),
            _ => Some(number),
        };
    }
    match best {
        Some(number) => number_node(number, span),
        None => Err(EvalError::InvalidArguments(
            format!("{}: empty sequence", name),
            span,
        )),
    }
}

fn builtin_min(args: Vec<Node>, span: Span) -> EvalResult {
    extreme(args, span, "min", |new, current| new < current)
}

fn builtin_max(args: Vec<Node>, span: Span) -> EvalResult {
    extreme(args, span, "max", |new, current| new > current)
}

// Halves round to the nearest even value.
fn builtin_round(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 1, 2, span, "round");
    let number = expect_number!(&args[0], span, "round", 1);
    let digits = match args.get(1) {
        None => None,
        Some(node) => match node.kind {
            Sexpr::Number(Number::Int(d)) => Some(d),
            _ => {
                return Err(EvalError::InvalidArguments(
                    "round: digits must be an integer".to_string(),
                    node.span,
                ));
            }
        },
    };
    let result = match (number, digits) {
        (Number::Int(_), _) => number,
        (Number::Float(f), None) => integral(f.round_ties_even()),
        (Number::Float(f), Some(d)) => {
            let scale = 10f64.powi(d.clamp(-308, 308) as i32);
            Number::Float((f * scale).round_ties_even() / scale)
        }
    };
    number_node(result, span)
}

// Strings go through float parsing first, so "2.7" converts to 2.
fn builtin_int(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 1, span, "int");
    let value = match &args[0].kind {
        Sexpr::Number(Number::Int(n)) => return number_node(Number::Int(*n), span),
        Sexpr::Number(Number::Float(f)) => *f,
        Sexpr::String(s) => parse_float(s, "int", args[0].span)?,
        other => return Err(conversion_error("int", other, args[0].span)),
    };
    if !value.is_finite() {
        return Err(EvalError::InvalidArguments(
            format!("int: cannot convert {} to an integer", value),
            args[0].span,
        ));
    }
    number_node(integral(value.trunc()), span)
}

fn builtin_float(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 1, span, "float");
    let value = match &args[0].kind {
        Sexpr::Number(number) => number.as_f64(),
        Sexpr::String(s) => parse_float(s, "float", args[0].span)?,
        other => return Err(conversion_error("float", other, args[0].span)),
    };
    number_node(Number::Float(value), span)
}

fn parse_float(text: &str, name: &str, span: Span) -> EvalResult<f64> {
    text.trim().parse::<f64>().map_err(|_| {
        EvalError::InvalidArguments(format!("{}: invalid numeric string \"{}\"", name, text), span)
    })
}

fn conversion_error(name: &str, value: &Sexpr, span: Span) -> EvalError {
    EvalError::InvalidArguments(
        format!("{}: cannot convert {} to a number", name, value.type_name()),
        span,
    )
}

fn builtin_str(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 1, span, "str");
    Ok(Node::new_string(args[0].kind.display_text(), span))
}

fn builtin_len(args: Vec<Node>, span: Span) -> EvalResult {
    crate::primitives::prim_length(args, span)
}

fn expect_int(node: &Node, name: &str) -> EvalResult<i64> {
    match node.kind {
        Sexpr::Number(Number::Int(n)) => Ok(n),
        ref other => Err(EvalError::InvalidArguments(
            format!("{}: expected an integer, got {}", name, other.type_name()),
            node.span,
        )),
    }
}

const MAX_RANGE_LEN: usize = 10_000_000;

// (range stop), (range start stop) or (range start stop step)
fn builtin_range(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 1, 3, span, "range");
    let ints = args
        .iter()
        .map(|node| expect_int(node, "range"))
        .collect::<EvalResult<Vec<i64>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => (0, 0, 1),
    };
    if step == 0 {
        return Err(EvalError::InvalidArguments(
            "range: step must not be zero".to_string(),
            args[2].span,
        ));
    }
    let (start, stop, step) = (start as i128, stop as i128, step as i128);
    let len = if step > 0 {
        (stop - start + step - 1).div_euclid(step)
    } else {
        (start - stop - step - 1).div_euclid(-step)
    }
    .max(0);
    if len > MAX_RANGE_LEN as i128 {
        return Err(EvalError::InvalidArguments(
            format!("range: {} elements exceeds the limit of {}", len, MAX_RANGE_LEN),
            span,
        ));
    }
    let elements = (0..len)
        .map(|i| Node::new_int((start + i * step) as i64, span))
        .collect();
    Ok(Node::new_list(elements, span))
}

// (sum '(1 2 3)) or (sum '(1 2 3) 10)
fn builtin_sum(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 1, 2, span, "sum");
    let elements = match &args[0].kind {
        Sexpr::List(elements) => elements,
        other => {
            return Err(EvalError::InvalidArguments(
                format!("sum: expected a list, got {}", other.type_name()),
                args[0].span,
            ));
        }
    };
    let mut total = match args.get(1) {
        Some(start) => expect_number!(start, span, "sum", 2),
        None => Number::Int(0),
    };
    for node in elements {
        match node.kind {
            Sexpr::Number(n) => total = total + n,
            ref other => {
                return Err(EvalError::InvalidArguments(
                    format!("sum: expected numbers, got {}", other.type_name()),
                    args[0].span,
                ));
            }
        }
    }
    number_node(total, span)
}

fn builtin_not(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 1, span, "not");
    Ok(Node::new_bool(!args[0].kind.is_truthy(), span))
}

// (in element list) or (in substring string)
fn builtin_in(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 2, span, "in");
    let (element, container) = (&args[0], &args[1]);
    let found = match (&element.kind, &container.kind) {
        (item, Sexpr::List(elements)) => elements.iter().any(|e| e.kind.same_value(item)),
        (Sexpr::String(needle), Sexpr::String(haystack)) => haystack.contains(needle.as_str()),
        (item, Sexpr::String(_)) => {
            return Err(EvalError::InvalidArguments(
                format!("in: expected a string to search for, got {}", item.type_name()),
                element.span,
            ));
        }
        (_, other) => {
            return Err(EvalError::InvalidArguments(
                format!("in: expected a list or string, got {}", other.type_name()),
                container.span,
            ));
        }
    };
    Ok(Node::new_bool(found, span))
}

fn builtin_type(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 1, span, "type");
    Ok(Node::new_symbol(args[0].kind.type_name(), span))
}

// --- math ---

/// Floating point functions and constants, registered for `(import 'math)`.
pub fn math_module() -> HostModule {
    HostModule::new("math")
        .with_function("sqrt", |args, span| {
            unary_math(args, span, "sqrt", |x| (x >= 0.0).then(|| x.sqrt()))
        })
        .with_function("pow", math_pow)
        .with_function("floor", |args, span| rounding(args, span, "floor", f64::floor))
        .with_function("ceil", |args, span| rounding(args, span, "ceil", f64::ceil))
        .with_function("sin", |args, span| unary_math(args, span, "sin", |x| Some(x.sin())))
        .with_function("cos", |args, span| unary_math(args, span, "cos", |x| Some(x.cos())))
        .with_function("exp", |args, span| unary_math(args, span, "exp", |x| Some(x.exp())))
        .with_function("log", math_log)
        .with_value("pi", Sexpr::Number(Number::Float(std::f64::consts::PI)))
        .with_value("e", Sexpr::Number(Number::Float(std::f64::consts::E)))
}

fn domain_error(name: &str, span: Span) -> EvalError {
    EvalError::InvalidArguments(format!("{}: math domain error", name), span)
}

fn unary_math(args: Vec<Node>, span: Span, name: &str, func: fn(f64) -> Option<f64>) -> EvalResult {
    check_arity!(args, 1, span, name);
    let x = expect_number!(&args[0], span, name, 1).as_f64();
    let result = func(x).ok_or_else(|| domain_error(name, args[0].span))?;
    number_node(Number::Float(result), span)
}

fn rounding(args: Vec<Node>, span: Span, name: &str, func: fn(f64) -> f64) -> EvalResult {
    check_arity!(args, 1, span, name);
    match expect_number!(&args[0], span, name, 1) {
        Number::Int(n) => number_node(Number::Int(n), span),
        Number::Float(f) => number_node(integral(func(f)), span),
    }
}

fn math_pow(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 2, span, "pow");
    let base = expect_number!(&args[0], span, "pow", 1).as_f64();
    let exponent = expect_number!(&args[1], span, "pow", 2).as_f64();
    number_node(Number::Float(base.powf(exponent)), span)
}

// (log x) is the natural logarithm, (log x base) any other base
fn math_log(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 1, 2, span, "log");
    let x = expect_number!(&args[0], span, "log", 1).as_f64();
    if x <= 0.0 {
        return Err(domain_error("log", args[0].span));
    }
    let result = match args.get(1) {
        None => x.ln(),
        Some(base_node) => {
            let base = expect_number!(base_node, span, "log", 2).as_f64();
            if base <= 0.0 || base == 1.0 {
                return Err(domain_error("log", base_node.span));
            }
            x.ln() / base.ln()
        }
    };
    number_node(Number::Float(result), span)
}
