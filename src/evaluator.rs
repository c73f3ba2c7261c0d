use crate::environment::{EnvError, EnvRef, Environment};
use crate::source::Span;
use crate::types::{Lambda, Node, Procedure, Sexpr};
use std::rc::Rc;
use thiserror::Error;

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError), // Errors from environment lookup
    #[error("Expected a procedure, but got: {0}")]
    NotAProcedure(Sexpr, Span), // Tried to call something that isn't a procedure
    #[error("Invalid expression: {0}")]
    InvalidExpression(Sexpr, Span), // Empty list, or a value that is not code
    #[error("Invalid arguments - {0}")]
    InvalidArguments(String, Span), // Mismatched arity or wrong type of args
    #[error("Expected a symbol, but got: {0}")]
    NotASymbol(Sexpr, Span), // Expected a symbol (e.g., for define/set!)
    #[error("Invalid special form - {0}")]
    InvalidSpecialForm(String, Span), // Malformed special form (e.g., (if cond))
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::EnvError(EnvError::UnboundVariable(_, span))
            | EvalError::NotAProcedure(_, span)
            | EvalError::InvalidExpression(_, span)
            | EvalError::InvalidArguments(_, span)
            | EvalError::NotASymbol(_, span)
            | EvalError::InvalidSpecialForm(_, span) => *span,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Node> = Result<T, EvalError>;

/// Heads with evaluator-intrinsic meaning. They are matched by name before
/// any environment lookup.
pub const SPECIAL_FORMS: [&str; 5] = ["quote", "if", "lambda", "define", "set!"];

pub fn special_form_identifiers() -> impl Iterator<Item = &'static str> {
    SPECIAL_FORMS.iter().copied()
}

// --- Evaluate Function ---

/// Evaluates a given AST Node within the specified environment.
///
/// There is no tail-call elimination: every nested call recurses on the
/// Rust stack.
pub fn evaluate(node: &Node, env: &EnvRef) -> EvalResult {
    match &node.kind {
        Sexpr::Number(_) => Ok(node.clone()),

        // Symbols: Look up in the environment. The value takes the span of the
        // reference, since its own may belong to an earlier input.
        Sexpr::Symbol(name) => {
            let value = env.borrow().get(name, node.span)?;
            Ok(Node::new(value.kind, node.span))
        }

        // Lists: Could be special forms or procedure calls
        Sexpr::List(elements) => match elements.as_slice() {
            [] => Err(EvalError::InvalidExpression(node.kind.clone(), node.span)),
            [first, rest @ ..] => match &first.kind {
                Sexpr::Symbol(sym_name) => match sym_name.as_str() {
                    "quote" => evaluate_quote(rest, node.span),
                    "if" => evaluate_if(rest, env, node.span),
                    "lambda" => evaluate_lambda(rest, env, node.span),
                    "define" => evaluate_define(rest, env, node.span),
                    "set!" => evaluate_set(rest, env, node.span),
                    _ => evaluate_procedure(first, rest, env, node.span),
                },
                _ => evaluate_procedure(first, rest, env, node.span),
            },
        },

        // Strings only exist inside quote, and the rest are runtime values
        Sexpr::String(_) | Sexpr::Boolean(_) | Sexpr::Procedure(_) | Sexpr::Void => {
            Err(EvalError::InvalidExpression(node.kind.clone(), node.span))
        }
    }
}

fn evaluate_procedure(operator: &Node, operands: &[Node], env: &EnvRef, span: Span) -> EvalResult {
    let procedure = evaluate(operator, env)?;

    // Operands are evaluated left to right before the callee is checked
    let mut evaluated_args: Vec<Node> = Vec::with_capacity(operands.len());
    for operand_node in operands {
        evaluated_args.push(evaluate(operand_node, env)?);
    }

    apply(&procedure, evaluated_args, span)
}

/// Invokes an already evaluated procedure value with evaluated arguments.
/// `span` is the span of the whole call, used by host functions for errors.
pub fn apply(procedure: &Node, args: Vec<Node>, span: Span) -> EvalResult {
    match &procedure.kind {
        Sexpr::Procedure(Procedure::Host(host)) => host.call(args, span),
        Sexpr::Procedure(Procedure::Lambda(lambda)) => {
            let frame = Environment::extend(&lambda.env, &lambda.params, args);
            evaluate(&lambda.body, &frame)
        }
        other => Err(EvalError::NotAProcedure(other.clone(), procedure.span)),
    }
}

fn evaluate_quote(operands: &[Node], span: Span) -> EvalResult {
    if let [node] = operands {
        // Quote returns the operand unevaluated.
        Ok(node.clone())
    } else {
        Err(EvalError::InvalidSpecialForm(
            "quote expects exactly one argument".to_string(),
            span, // Use the span of the whole (quote ...) form
        ))
    }
}

fn evaluate_if(operands: &[Node], env: &EnvRef, span: Span) -> EvalResult {
    if let [condition, consequent, maybe_alternate @ ..] = operands
        && maybe_alternate.len() <= 1
    {
        // Evaluate the condition first
        let condition_result = evaluate(condition, env)?;

        if condition_result.kind.is_truthy() {
            evaluate(consequent, env)
        } else if let [alternate] = maybe_alternate {
            evaluate(alternate, env)
        } else {
            Ok(Node::new_void(span))
        }
    } else {
        Err(EvalError::InvalidSpecialForm(
            "if expects condition, consequent, and optional alternate".to_string(),
            span, // Span of the whole (if ...) form
        ))
    }
}

fn evaluate_lambda(operands: &[Node], env: &EnvRef, span: Span) -> EvalResult {
    match operands {
        [params, body] => make_closure(None, params, body, env, span),
        _ => Err(EvalError::InvalidSpecialForm(
            "lambda expects a parameter list and a single body expression".to_string(),
            span,
        )),
    }
}

fn make_closure(
    name: Option<String>,
    params: &Node,
    body: &Node,
    env: &EnvRef,
    span: Span,
) -> EvalResult {
    let params = match &params.kind {
        Sexpr::List(elements) => elements
            .iter()
            .map(expect_symbol)
            .collect::<EvalResult<Vec<String>>>()?,
        other => {
            return Err(EvalError::InvalidSpecialForm(
                format!("expected a parameter list, got {}", other.type_name()),
                params.span,
            ));
        }
    };
    let lambda = Lambda {
        name,
        params,
        body: body.clone(),
        env: env.clone(),
    };
    Ok(Node::new(
        Sexpr::Procedure(Procedure::Lambda(Rc::new(lambda))),
        span,
    ))
}

fn expect_symbol(node: &Node) -> EvalResult<String> {
    match &node.kind {
        Sexpr::Symbol(name) => Ok(name.clone()),
        other => Err(EvalError::NotASymbol(other.clone(), node.span)),
    }
}

fn evaluate_define(operands: &[Node], env: &EnvRef, span: Span) -> EvalResult {
    match operands {
        // (define (name params...) body)
        [
            Node {
                kind: Sexpr::List(signature),
                span: signature_span,
            },
            body,
        ] => {
            let [name_node, params @ ..] = signature.as_slice() else {
                return Err(EvalError::InvalidSpecialForm(
                    "define expects a procedure name".to_string(),
                    *signature_span,
                ));
            };
            let name = expect_symbol(name_node)?;
            let params = Node::new_list(params.to_vec(), *signature_span);
            let closure = make_closure(Some(name.clone()), &params, body, env, span)?;
            env.borrow_mut().define(name, closure);
            Ok(Node::new_void(span))
        }
        // (define name expr)
        [target, value_expr] => {
            let name = expect_symbol(target)?;
            let value = evaluate(value_expr, env)?;
            env.borrow_mut().define(name, value);
            Ok(Node::new_void(span))
        }
        _ => Err(EvalError::InvalidSpecialForm(
            "define expects a name and a value".to_string(),
            span,
        )),
    }
}

fn evaluate_set(operands: &[Node], env: &EnvRef, span: Span) -> EvalResult {
    if let [target, value_expr] = operands {
        let name = expect_symbol(target)?;
        let value = evaluate(value_expr, env)?;
        env.borrow_mut().set(&name, value, span)?;
        Ok(Node::new_void(span))
    } else {
        Err(EvalError::InvalidSpecialForm(
            "set! expects a name and a value".to_string(),
            span,
        ))
    }
}
