// Declare modules publicly so they are part of the library interface
pub mod environment;
pub mod evaluator;
pub mod host;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod repl;
pub mod source;
pub mod stdlib;
pub mod types;

pub use environment::{EnvError, EnvRef, Environment};
pub use evaluator::{EvalError, EvalResult, evaluate};
pub use host::{HostModule, ModuleRegistry};
pub use interpreter::{Error, ErrorKind, Interpreter, InterpreterConfig};
pub use lexer::{Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse_program, parse_str};
pub use source::{Balance, Span, balance};
pub use types::{HostFunction, Node, Number, Procedure, Sexpr};
