use std::io::{self, Write};
use std::ops::Range;

use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};

use crate::environment::EnvError;
use crate::evaluator::EvalError;
use crate::interpreter::{Error, ErrorKind};
use crate::parser::ParseError;
use crate::source::Span;

type SourceSpan<'a> = (&'a str, Range<usize>);
type ReportBuilder<'a> = ariadne::ReportBuilder<'a, SourceSpan<'a>>;

// Zero-width spans (end of input) still need a character to point at.
fn label_range(span: Span, input: &str) -> Range<usize> {
    let range = span.to_range();
    if !range.is_empty() {
        range
    } else if range.start < input.len() {
        range.start..range.start + 1
    } else {
        input.len().saturating_sub(1)..input.len()
    }
}

fn build<'a>(
    source_id: &'a str,
    range: Range<usize>,
    kind: ErrorKind,
    message: String,
    label: String,
) -> ReportBuilder<'a> {
    Report::build(ReportKind::Error, (source_id, range.clone()))
        .with_message(format!("{}: {}", kind, message))
        .with_label(Label::new((source_id, range)).with_message(label))
}

impl ParseError {
    fn report<'a>(&self, source_id: &'a str, input: &str) -> ReportBuilder<'a> {
        let range = label_range(self.span(), input);
        let (message, label) = match self {
            ParseError::UnexpectedToken { found, expected } => (
                format!("Unexpected token: {}", found.kind),
                format!("Expected {expected}"),
            ),
            ParseError::UnexpectedEof { expected, .. } => (
                "Unexpected end of input".to_string(),
                format!("Expected {expected}"),
            ),
            ParseError::UnexpectedCloseParen(_) => (
                "Unexpected ')'".to_string(),
                "This parenthesis closes nothing".to_string(),
            ),
            ParseError::UnterminatedString(_) => (
                "Unterminated string literal".to_string(),
                "This string is never closed".to_string(),
            ),
            ParseError::InvalidLambda { message, .. } => {
                ("Invalid lambda".to_string(), message.clone())
            }
        };
        build(source_id, range, ErrorKind::SyntaxError, message, label)
    }
}

impl EvalError {
    fn report<'a>(&self, source_id: &'a str, input: &str) -> ReportBuilder<'a> {
        let range = label_range(self.span(), input);
        let (kind, message, label) = match self {
            EvalError::EnvError(EnvError::UnboundVariable(symbol, _)) => (
                ErrorKind::NameError,
                format!("Unbound symbol `{}`", symbol),
                "This symbol is not defined in the current scope".to_string(),
            ),
            EvalError::NotAProcedure(sexpr, _) => (
                ErrorKind::TypeError,
                format!("Not a procedure: {}", sexpr),
                "This expression cannot be called as a procedure".to_string(),
            ),
            EvalError::InvalidExpression(sexpr, _) => (
                ErrorKind::TypeError,
                format!("Invalid expression: {}", sexpr),
                "This cannot be evaluated".to_string(),
            ),
            EvalError::InvalidArguments(message, _) => (
                ErrorKind::TypeError,
                "Invalid arguments".to_string(),
                message.clone(),
            ),
            EvalError::NotASymbol(sexpr, _) => (
                ErrorKind::TypeError,
                format!("Not a symbol: {}", sexpr),
                format!("Expected a symbol but found a {}", sexpr.type_name()),
            ),
            EvalError::InvalidSpecialForm(message, _) => (
                ErrorKind::TypeError,
                format!("Invalid special form: {}", message),
                "This special form is malformed or incomplete".to_string(),
            ),
        };
        build(source_id, range, kind, message, label)
    }
}

impl Error {
    /// Renders a source-annotated report of the error into `writer`.
    /// `source_id` names the input in the report header (a file name or
    /// `REPL`).
    pub fn write_report<W: Write>(
        &self,
        source_id: &str,
        input: &str,
        color: bool,
        writer: W,
    ) -> io::Result<()> {
        let report = match self {
            Error::Parse(err) => err.report(source_id, input),
            Error::Eval(err) => err.report(source_id, input),
        };
        report
            .with_config(
                // Spans are byte offsets
                Config::default()
                    .with_color(color)
                    .with_index_type(IndexType::Byte),
            )
            .finish()
            .write((source_id, Source::from(input)), writer)
    }

    /// Prints the report to stderr, falling back to the plain message when
    /// the report cannot be written.
    pub fn pretty_print(&self, source_id: &str, input: &str) {
        if self.write_report(source_id, input, true, io::stderr()).is_err() {
            eprintln!("{}: {}", self.kind(), self);
        }
    }
}
