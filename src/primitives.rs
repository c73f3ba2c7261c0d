use crate::evaluator::{EvalError, EvalResult};
use crate::source::Span;
use crate::types::{Node, Number, Sexpr};

// Checks the number of arguments
macro_rules! check_arity {
    ($args:expr, $expected:expr, $span:expr, $name:expr) => {
        if $args.len() != $expected {
            return Err(EvalError::InvalidArguments(
                format!(
                    "Primitive '{}' expects exactly {} arguments, got {}",
                    $name,
                    $expected,
                    $args.len()
                ),
                $span,
            ));
        }
    };
    // Variant for minimum number of args
    ($args:expr, min $expected:expr, $span:expr, $name:expr) => {
        if $args.len() < $expected {
            return Err(EvalError::InvalidArguments(
                format!(
                    "Primitive '{}' expects at least {} arguments, got {}",
                    $name,
                    $expected,
                    $args.len()
                ),
                $span,
            ));
        }
    };
    // Variant for range of args (inclusive)
    ($args:expr, $min:expr, $max:expr, $span:expr, $name:expr) => {
        if !($min..=$max).contains(&$args.len()) {
            return Err(EvalError::InvalidArguments(
                format!(
                    "Primitive '{}' expects between {} and {} arguments, got {}",
                    $name,
                    $min,
                    $max,
                    $args.len()
                ),
                $span,
            ));
        }
    };
}

// Extracts a number from a Node or returns an InvalidArguments error
macro_rules! expect_number {
    ($node:expr, $span:expr, $name:expr, $arg_pos:expr) => {
        match $node.kind {
            Sexpr::Number(n) => n,
            _ => {
                return Err(EvalError::InvalidArguments(
                    format!(
                        "Primitive '{}' expects a number for argument {}, got {}",
                        $name,
                        $arg_pos,
                        $node.kind.type_name()
                    ),
                    $span, // Use call span for arg type errors
                ));
            }
        }
    };
}

pub(crate) use check_arity;
pub(crate) use expect_number;

fn division_by_zero(span: Span) -> EvalError {
    EvalError::InvalidArguments("Division by zero".to_string(), span)
}

fn fold_numbers<F: Fn(Number, Number) -> Number>(
    args: &[Node],
    span: Span,
    start: Number,
    func: F,
    operator: &str,
) -> EvalResult {
    let mut acc = start;
    for (i, node) in args.iter().enumerate() {
        let num = expect_number!(node, span, operator, i + 1);
        acc = func(acc, num);
    }
    Ok(Node::new(Sexpr::Number(acc), span))
}

pub fn prim_add(args: Vec<Node>, span: Span) -> EvalResult {
    // (+) -> 0
    // (+ 1 2 3) -> 6
    fold_numbers(&args, span, Number::Int(0), |acc, val| acc + val, "+")
}

pub fn prim_sub(args: Vec<Node>, span: Span) -> EvalResult {
    // (- x) -> x
    // (- x y z) -> x - y - z
    check_arity!(args, min 1, span, "-");
    let mut result = expect_number!(&args[0], span, "-", 1);
    for (i, node) in args.iter().enumerate().skip(1) {
        let num = expect_number!(node, span, "-", i + 1);
        result = result - num;
    }
    Ok(Node::new(Sexpr::Number(result), span))
}

pub fn prim_mul(args: Vec<Node>, span: Span) -> EvalResult {
    // (* 1 2 3) -> 6
    check_arity!(args, min 1, span, "*");
    fold_numbers(&args, span, Number::Int(1), |acc, val| acc * val, "*")
}

pub fn prim_div(args: Vec<Node>, span: Span) -> EvalResult {
    // (/ x y z) -> x / y / z
    check_arity!(args, min 2, span, "/");
    let mut result = expect_number!(&args[0], span, "/", 1);
    for (i, node) in args.iter().enumerate().skip(1) {
        let num = expect_number!(node, span, "/", i + 1);
        result = result
            .checked_div(num)
            .ok_or_else(|| division_by_zero(node.span))?;
    }
    Ok(Node::new(Sexpr::Number(result), span))
}

fn compare_numbers<F: Fn(Number, Number) -> bool>(
    args: Vec<Node>,
    span: Span,
    compare: F,
    operator: &str,
) -> EvalResult {
    // (= n1 n2 ...) -> boolean
    check_arity!(args, min 2, span, operator);
    let mut last_val = expect_number!(&args[0], span, operator, 1);
    let mut result = true;
    for (index, arg) in args.iter().enumerate().skip(1) {
        let val = expect_number!(arg, span, operator, index + 1);
        result = result && compare(last_val, val);
        last_val = val;
    }
    Ok(Node::new_bool(result, span))
}

pub fn prim_equals(args: Vec<Node>, span: Span) -> EvalResult {
    compare_numbers(args, span, |left, right| left == right, "=")
}

pub fn prim_less_than(args: Vec<Node>, span: Span) -> EvalResult {
    compare_numbers(args, span, |left, right| left < right, "<")
}

pub fn prim_less_than_or_equals(args: Vec<Node>, span: Span) -> EvalResult {
    compare_numbers(args, span, |left, right| left <= right, "<=")
}

pub fn prim_greater_than(args: Vec<Node>, span: Span) -> EvalResult {
    compare_numbers(args, span, |left, right| left > right, ">")
}

pub fn prim_greater_than_or_equals(args: Vec<Node>, span: Span) -> EvalResult {
    compare_numbers(args, span, |left, right| left >= right, ">=")
}

// --- List Primitives ---

fn sequence_error(name: &str, node: &Node) -> EvalError {
    EvalError::InvalidArguments(
        format!(
            "{}: Expected a list or string, got {}",
            name,
            node.kind.type_name()
        ),
        node.span, // Span of the incorrect argument
    )
}

pub fn prim_cons(args: Vec<Node>, span: Span) -> EvalResult {
    // (cons item list) -> [item, ..list]
    check_arity!(args, 2, span, "cons");
    let (head, tail) = (&args[0], &args[1]);
    match &tail.kind {
        Sexpr::List(elements) => {
            let mut list = Vec::with_capacity(elements.len() + 1);
            list.push(head.clone());
            list.extend(elements.iter().cloned());
            Ok(Node::new_list(list, span))
        }
        other => Err(EvalError::InvalidArguments(
            format!(
                "cons: Expected a list as argument 2, got {}",
                other.type_name()
            ),
            tail.span,
        )),
    }
}

pub fn prim_car(args: Vec<Node>, span: Span) -> EvalResult {
    // (car list) -> first item
    check_arity!(args, 1, span, "car");
    let arg = &args[0];
    match &arg.kind {
        Sexpr::List(elements) => elements.first().cloned().ok_or_else(|| {
            EvalError::InvalidArguments("car: Cannot take car of empty list".to_string(), arg.span)
        }),
        Sexpr::String(s) => s
            .chars()
            .next()
            .map(|c| Node::new_string(c.to_string(), span))
            .ok_or_else(|| {
                EvalError::InvalidArguments(
                    "car: Cannot take car of empty string".to_string(),
                    arg.span,
                )
            }),
        _ => Err(sequence_error("car", arg)),
    }
}

pub fn prim_cdr(args: Vec<Node>, span: Span) -> EvalResult {
    // (cdr list) -> rest of list, () for an empty list
    check_arity!(args, 1, span, "cdr");
    let arg = &args[0];
    match &arg.kind {
        // Create a new Vec containing elements from the second onwards
        Sexpr::List(elements) => Ok(Node::new_list(
            elements.iter().skip(1).cloned().collect(),
            span,
        )),
        Sexpr::String(s) => Ok(Node::new_string(s.chars().skip(1).collect::<String>(), span)),
        _ => Err(sequence_error("cdr", arg)),
    }
}

pub fn prim_list(args: Vec<Node>, span: Span) -> EvalResult {
    // (list item1 item2 ...) -> new list containing items
    Ok(Node::new_list(args, span))
}

pub fn prim_length(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 1, span, "length");
    let arg = &args[0];
    let length = match &arg.kind {
        Sexpr::List(elements) => elements.len(),
        Sexpr::String(s) => s.chars().count(),
        _ => return Err(sequence_error("length", arg)),
    };
    Ok(Node::new_int(length as i64, span))
}

pub fn prim_is_eq(args: Vec<Node>, span: Span) -> EvalResult {
    check_arity!(args, 2, span, "eq?");
    Ok(Node::new_bool(args[0].kind.same_value(&args[1].kind), span))
}

// --- Type Predicates ---

macro_rules! is_type {
    ($args:expr, $type:pat, $name:expr, $span:expr) => {{
        check_arity!($args, 1, $span, $name);
        Ok(Node::new_bool(matches!($args[0].kind, $type), $span))
    }};
}

pub fn prim_is_null(args: Vec<Node>, span: Span) -> EvalResult {
    // (null? obj) -> boolean
    check_arity!(args, 1, span, "null?");
    let is_null = matches!(&args[0].kind, Sexpr::List(elements) if elements.is_empty());
    Ok(Node::new_bool(is_null, span))
}

pub fn prim_is_list(args: Vec<Node>, span: Span) -> EvalResult {
    is_type!(args, Sexpr::List(_), "list?", span)
}

pub fn prim_is_number(args: Vec<Node>, span: Span) -> EvalResult {
    is_type!(args, Sexpr::Number(_), "number?", span)
}

pub fn prim_is_boolean(args: Vec<Node>, span: Span) -> EvalResult {
    is_type!(args, Sexpr::Boolean(_), "boolean?", span)
}

pub fn prim_is_symbol(args: Vec<Node>, span: Span) -> EvalResult {
    is_type!(args, Sexpr::Symbol(_), "symbol?", span)
}

pub fn prim_is_string(args: Vec<Node>, span: Span) -> EvalResult {
    is_type!(args, Sexpr::String(_), "string?", span)
}

pub fn prim_is_procedure(args: Vec<Node>, span: Span) -> EvalResult {
    is_type!(args, Sexpr::Procedure(_), "procedure?", span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::evaluator::evaluate;
    use crate::parser::parse_str;

    fn int(n: i64) -> Sexpr {
        Sexpr::Number(Number::Int(n))
    }

    fn eval(input: &str) -> EvalResult {
        let env = Environment::new_global_populated();
        match parse_str(input) {
            Ok(Some(node)) => evaluate(&node, &env),
            other => panic!("Parsing failed for input '{}': {:?}", input, other),
        }
    }

    fn assert_eval_kind(input: &str, expected_kind: Sexpr) {
        match eval(input) {
            Ok(result) => assert!(
                result.kind.same_value(&expected_kind),
                "Input: '{}', expected {}, got {}",
                input,
                expected_kind,
                result.kind
            ),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    fn assert_eval_display(input: &str, expected: &str) {
        match eval(input) {
            Ok(result) => assert_eq!(result.to_string(), expected, "Input: '{}'", input),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    fn assert_invalid_arguments(input: &str) {
        assert!(
            matches!(eval(input), Err(EvalError::InvalidArguments(_, _))),
            "Input: '{}'",
            input
        );
    }

    #[test]
    fn test_arithmetic() {
        assert_eval_kind("(+)", int(0));
        assert_eval_kind("(+ 10 20 30 40)", int(100));
        assert_eval_kind("(- 5)", int(5));
        assert_eval_kind("(* 7)", int(7));
        assert_eval_kind("(- 10 3 2)", int(5));
        assert_eval_kind("(/ 20 2 5)", int(2));
        assert_eval_display("(/ 10 4)", "2.5");
        assert_eval_display("(+ 1 2.5)", "3.5");
        assert_eval_display("(* 2 3.0)", "6.0");
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_invalid_arguments("(-)");
        assert_invalid_arguments("(/)");
        assert_invalid_arguments("(/ 1 0)");
        assert_invalid_arguments("(*)");
        assert_invalid_arguments("(/ 5)");
        assert_invalid_arguments("(/ 1 0.0)");
        assert_invalid_arguments("(+ 1 #t)");
        assert_invalid_arguments("(/ 1 \"hello\")");
    }

    #[test]
    fn test_division_by_zero_points_at_divisor() {
        let err = eval("(/ 1 0)").unwrap_err();
        assert_eq!(err.span(), Span::new(5, 6));
    }

    #[test]
    fn test_comparison() {
        assert_eval_kind("(= 5 5)", Sexpr::Boolean(true));
        assert_eval_kind("(= 5 5.0)", Sexpr::Boolean(true));
        assert_eval_kind("(= 5 5 6)", Sexpr::Boolean(false));
        assert_eval_kind("(< 4 5 6)", Sexpr::Boolean(true));
        assert_eval_kind("(< 5 5 6)", Sexpr::Boolean(false));
        assert_eval_kind("(<= 5 5 6)", Sexpr::Boolean(true));
        assert_eval_kind("(>= 5 5 4 4 4 3)", Sexpr::Boolean(true));
        assert_eval_kind("(> 6 5 5)", Sexpr::Boolean(false));
        assert_eval_kind("(> 6 5 4)", Sexpr::Boolean(true));
        assert_invalid_arguments("(=)");
        assert_invalid_arguments("(= 1)");
        assert_invalid_arguments("(= 1 #f)");
    }

    #[test]
    fn test_list_primitives() {
        assert_eval_display("(list 1 2 3)", "(1 2 3)");
        assert_eval_display("(list)", "()");
        assert_eval_display("(car '(1 2 3))", "1");
        assert_eval_display("(cdr '(1 2 3))", "(2 3)");
        assert_eval_display("(cdr '(1))", "()");
        assert_eval_display("(cdr '())", "()");
        assert_eval_display("(cons 1 '(2 3))", "(1 2 3)");
        assert_eval_display("(cons '(a) '())", "((a))");
        assert_eval_display("(length '(1 2 3))", "3");
        assert_eval_display("(length nil)", "0");
    }

    #[test]
    fn test_list_primitive_errors() {
        assert_invalid_arguments("(car '())");
        assert_invalid_arguments("(car 1)");
        assert_invalid_arguments("(cdr 1)");
        assert_invalid_arguments("(cons 1 2)");
        assert_invalid_arguments("(cons 1)");
        assert_invalid_arguments("(length 5)");
        assert_invalid_arguments("(car '(1) '(2))");
    }

    #[test]
    fn test_string_sequences() {
        assert_eval_display("(car \"abc\")", "\"a\"");
        assert_eval_display("(cdr \"abc\")", "\"bc\"");
        assert_eval_display("(cdr \"\")", "\"\"");
        assert_eval_display("(length \"héllo\")", "5");
        assert_invalid_arguments("(car \"\")");
    }

    #[test]
    fn test_eq() {
        assert_eval_kind("(eq? 'a 'a)", Sexpr::Boolean(true));
        assert_eval_kind("(eq? 'a 'b)", Sexpr::Boolean(false));
        assert_eval_kind("(eq? 1 1.0)", Sexpr::Boolean(true));
        assert_eval_kind("(eq? '(1 (2)) (list 1 (list 2)))", Sexpr::Boolean(true));
        assert_eval_kind("(eq? \"a\" 'a)", Sexpr::Boolean(false));
        assert_eval_kind("(eq? car car)", Sexpr::Boolean(true));
    }

    #[test]
    fn test_predicates() {
        assert_eval_kind("(null? '())", Sexpr::Boolean(true));
        assert_eval_kind("(null? nil)", Sexpr::Boolean(true));
        assert_eval_kind("(null? '(1))", Sexpr::Boolean(false));
        assert_eval_kind("(null? 0)", Sexpr::Boolean(false));
        assert_eval_kind("(list? '())", Sexpr::Boolean(true));
        assert_eval_kind("(list? 'a)", Sexpr::Boolean(false));
        assert_eval_kind("(number? 1.5)", Sexpr::Boolean(true));
        assert_eval_kind("(number? 'a)", Sexpr::Boolean(false));
        assert_eval_kind("(symbol? 'a)", Sexpr::Boolean(true));
        assert_eval_kind("(string? \"a\")", Sexpr::Boolean(true));
        assert_eval_kind("(string? 'a)", Sexpr::Boolean(false));
        assert_eval_kind("(boolean? #f)", Sexpr::Boolean(true));
        assert_eval_kind("(procedure? car)", Sexpr::Boolean(true));
        assert_eval_kind("(procedure? (lambda (x) x))", Sexpr::Boolean(true));
        assert_eval_kind("(procedure? 'car)", Sexpr::Boolean(false));
        assert_invalid_arguments("(number?)");
        assert_invalid_arguments("(null? 1 2)");
    }
}
