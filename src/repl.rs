use std::borrow::Cow;

use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

use crate::environment::EnvRef;
use crate::evaluator::special_form_identifiers;
use crate::interpreter::Interpreter;
use crate::lexer::{Token, TokenKind, tokenize};
use crate::source::{Balance, balance};
use crate::types::Sexpr;

pub const PROMPT: &str = "tinylisp> ";
pub const HISTORY_FILE: &str = "tinylisp_history.txt";

const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const BOLD_BLUE: &str = "\x1b[1;34m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

struct LispCompleter {
    env: EnvRef,
}

impl LispCompleter {
    fn new(env: EnvRef) -> Self {
        LispCompleter { env }
    }

    /// Visible identifiers and special forms starting with `prefix`, sorted.
    fn candidates(&self, prefix: &str) -> Vec<String> {
        let mut candidates: Vec<String> = self
            .env
            .borrow()
            .get_identifiers()
            .into_iter()
            .chain(special_form_identifiers().map(str::to_string))
            .filter(|id| id.starts_with(prefix))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates
    }
}

impl rustyline::completion::Completer for LispCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        match tokenize(&line[..pos]).last() {
            // Only complete a word the cursor is touching
            Some(Token {
                kind: TokenKind::Bareword(prefix),
                span,
                ..
            }) if span.end == pos => Ok((span.start, self.candidates(prefix))),
            _ => Ok((pos, vec![])),
        }
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct ReplHelper {
    #[rustyline(Validator)]
    validator: LispValidator,
    #[rustyline(Highlighter)]
    highlighter: LispHighlighter,
    #[rustyline(Completer)]
    completer: LispCompleter,
}

struct LispValidator;

impl Validator for LispValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        Ok(match balance(ctx.input()) {
            Balance::Complete => ValidationResult::Valid(None),
            Balance::Incomplete => ValidationResult::Incomplete,
            Balance::Unmatched(i) => ValidationResult::Invalid(Some(format!(
                "  - Unmatched ')' at position {}",
                i
            ))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Style {
    Plain,
    String,
    Comment,
    MatchingParen,
    UnmatchedParen,
}

impl Style {
    fn color(self) -> Option<&'static str> {
        match self {
            Style::Plain => None,
            Style::String => Some(GREEN),
            Style::Comment => Some(DIM),
            Style::MatchingParen => Some(BOLD_BLUE),
            Style::UnmatchedParen => Some(RED),
        }
    }
}

// Styles each token the way the parser will read it. Parens next to the
// cursor are highlighted together with their partner.
fn token_styles(tokens: &[Token], pos: usize) -> Vec<Style> {
    let mut styles = vec![Style::Plain; tokens.len()];
    let mut open: Vec<usize> = Vec::new();
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    let mut in_comment = false;
    let mut in_string = false;

    for (index, token) in tokens.iter().enumerate() {
        if in_comment && !token.newline_before {
            styles[index] = Style::Comment;
            continue;
        }
        in_comment = false;
        if in_string {
            styles[index] = Style::String;
            in_string = !token.text().ends_with('"');
            continue;
        }
        match &token.kind {
            TokenKind::Comment(_) => {
                in_comment = true;
                styles[index] = Style::Comment;
            }
            TokenKind::Bareword(text) if text.starts_with('"') => {
                styles[index] = Style::String;
                in_string = text.len() < 2 || !text.ends_with('"');
            }
            TokenKind::LParen => open.push(index),
            TokenKind::RParen => match open.pop() {
                Some(opening) => pairs.push((opening, index)),
                None => styles[index] = Style::UnmatchedParen,
            },
            _ => {}
        }
    }

    let touches_cursor = |index: usize| {
        let span = tokens[index].span;
        span.start == pos || span.end == pos
    };
    for (opening, closing) in pairs {
        if touches_cursor(opening) || touches_cursor(closing) {
            styles[opening] = Style::MatchingParen;
            styles[closing] = Style::MatchingParen;
        }
    }
    styles
}

struct LispHighlighter;

impl Highlighter for LispHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let tokens = tokenize(line);
        let styles = token_styles(&tokens, pos);
        let mut highlighted = String::with_capacity(line.len());
        let mut last = 0;
        for (token, style) in tokens.iter().zip(styles) {
            highlighted.push_str(&line[last..token.span.start]);
            let text = &line[token.span.to_range()];
            match style.color() {
                Some(color) => {
                    highlighted.push_str(color);
                    highlighted.push_str(text);
                    highlighted.push_str(RESET);
                }
                None => highlighted.push_str(text),
            }
            last = token.span.end;
        }
        highlighted.push_str(&line[last..]);
        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

/// Evaluates every expression in `chunk`, printing values other than void
/// to stdout and reporting errors on stderr. Returns whether all succeeded.
pub fn eval_chunk(interpreter: &Interpreter, source_id: &str, chunk: &str) -> bool {
    let mut ok = true;
    for outcome in interpreter.run_source(chunk) {
        match outcome {
            Ok(value) => {
                if !matches!(value.kind, Sexpr::Void) {
                    println!("{}", value);
                }
            }
            Err(err) => {
                ok = false;
                err.pretty_print(source_id, chunk);
            }
        }
    }
    ok
}

/// Runs the interactive prompt against `interpreter` until `exit` or Ctrl-D.
pub fn run(interpreter: &Interpreter) -> rustyline::Result<()> {
    println!("tinylisp REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let helper = ReplHelper {
        highlighter: LispHighlighter,
        validator: LispValidator,
        completer: LispCompleter::new(interpreter.global_env().clone()),
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Vi)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("exit") {
                    break;
                }
                eval_chunk(interpreter, "REPL", input);
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}
