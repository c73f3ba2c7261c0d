//! The embedding boundary: an [`Interpreter`] owns one root environment and
//! the host modules programs can import.

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::rc::Rc;

use thiserror::Error;

use crate::environment::{EnvError, EnvRef, Environment};
use crate::evaluator::{EvalError, EvalResult, evaluate};
use crate::host::{HostModule, ModuleRegistry};
use crate::parser::{ParseError, parse_program, parse_str};
use crate::primitives::check_arity;
use crate::source::Span;
use crate::stdlib::{self, Input, Output};
use crate::types::{HostFunction, Node, Procedure, Sexpr};

/// Environment variable that turns on evaluation tracing when set to `1`.
pub const TRACE_VAR: &str = "TINYLISP_TRACE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    NameError,
    TypeError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::SyntaxError => write!(f, "SyntaxError"),
            ErrorKind::NameError => write!(f, "NameError"),
            ErrorKind::TypeError => write!(f, "TypeError"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(_) => ErrorKind::SyntaxError,
            Error::Eval(EvalError::EnvError(_)) => ErrorKind::NameError,
            Error::Eval(_) => ErrorKind::TypeError,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Error::Parse(err) => err.span(),
            Error::Eval(err) => err.span(),
        }
    }
}

impl From<EnvError> for Error {
    fn from(err: EnvError) -> Self {
        Error::Eval(EvalError::EnvError(err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Install `display`, `newline`, `read` and `clear`.
    pub default_io: bool,
    /// Import the `builtins` module without a prefix.
    pub host_builtins: bool,
    /// Write `[eval]`, `[value]` and `[import]` lines to stderr.
    pub trace: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            default_io: true,
            host_builtins: true,
            trace: false,
        }
    }
}

impl InterpreterConfig {
    /// The default configuration with tracing taken from `TINYLISP_TRACE`.
    pub fn from_env() -> Self {
        InterpreterConfig {
            trace: std::env::var(TRACE_VAR).is_ok_and(|value| value == "1"),
            ..InterpreterConfig::default()
        }
    }
}

pub struct Interpreter {
    global_env: EnvRef,
    modules: Rc<RefCell<ModuleRegistry>>,
    config: InterpreterConfig,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_config(InterpreterConfig::default())
    }

    /// An interpreter whose I/O procedures use the process's stdout and stdin.
    pub fn with_config(config: InterpreterConfig) -> Self {
        let output: Output = Rc::new(RefCell::new(io::stdout()));
        let input: Input = Rc::new(RefCell::new(io::stdin()));
        Interpreter::with_io(config, output, input)
    }

    /// An interpreter whose I/O procedures use the given streams.
    pub fn with_io(config: InterpreterConfig, output: Output, input: Input) -> Self {
        let mut registry = ModuleRegistry::new();
        registry.register(stdlib::builtins_module());
        registry.register(stdlib::math_module());

        let interpreter = Interpreter {
            global_env: Environment::new_global_populated(),
            modules: Rc::new(RefCell::new(registry)),
            config,
        };
        interpreter.install_import();
        if config.default_io {
            stdlib::install_io(&interpreter.global_env, output, input);
        }
        if config.host_builtins {
            let builtins = stdlib::builtins_module();
            import_into(&interpreter.global_env, &builtins, None, true, config.trace);
        }
        interpreter
    }

    fn install_import(&self) {
        // The root frame owns this function, so it only holds a weak handle back
        let env = Rc::downgrade(&self.global_env);
        let modules = Rc::clone(&self.modules);
        let trace = self.config.trace;
        self.define_host_function("import", move |args, span| {
            check_arity!(args, 1, 3, span, "import");
            let name = name_argument(&args[0])?;
            let prefix = args.get(1).map(name_argument).transpose()?;
            let no_prefix = args.get(2).is_some_and(|flag| flag.kind.is_truthy());
            let env = env.upgrade().ok_or_else(|| {
                EvalError::InvalidArguments("import: interpreter is gone".to_string(), span)
            })?;
            let modules = modules.borrow();
            let module = modules.get(&name).ok_or_else(|| unknown_module(&name, args[0].span))?;
            import_into(&env, module, prefix.as_deref(), no_prefix, trace);
            Ok(Node::new_void(span))
        });
    }

    pub fn global_env(&self) -> &EnvRef {
        &self.global_env
    }

    pub fn config(&self) -> InterpreterConfig {
        self.config
    }

    /// Makes `module` available to `import`. Nothing is bound until it is
    /// imported.
    pub fn register_module(&self, module: HostModule) {
        self.modules.borrow_mut().register(module);
    }

    /// Imports a registered module into the root environment, as
    /// `(import name prefix no-prefix)` would.
    pub fn import_module(
        &self,
        name: &str,
        prefix: Option<&str>,
        no_prefix: bool,
    ) -> Result<(), Error> {
        let modules = self.modules.borrow();
        let module = modules
            .get(name)
            .ok_or_else(|| unknown_module(name, Span::default()))?;
        import_into(&self.global_env, module, prefix, no_prefix, self.config.trace);
        Ok(())
    }

    /// Binds a single host function in the root environment. An existing
    /// binding of the same name is kept; returns whether `func` was bound.
    pub fn define_host_function(
        &self,
        name: &str,
        func: impl Fn(Vec<Node>, Span) -> EvalResult + 'static,
    ) -> bool {
        let function = Procedure::Host(HostFunction::new(name, func));
        self.global_env.borrow_mut().define_with(
            name.to_string(),
            Node::new(Sexpr::Procedure(function), Span::default()),
            false,
        )
    }

    /// Evaluates one parsed expression in the root environment.
    pub fn eval(&self, node: &Node) -> Result<Node, Error> {
        if self.config.trace {
            eprintln!("[eval] {}", node);
        }
        let value = evaluate(node, &self.global_env)?;
        if self.config.trace {
            eprintln!("[value] {}", value);
        }
        Ok(value)
    }

    /// Parses and evaluates exactly one expression. Comment-only text gives
    /// `None`.
    pub fn eval_str(&self, text: &str) -> Result<Option<Node>, Error> {
        match parse_str(text)? {
            Some(node) => self.eval(&node).map(Some),
            None => Ok(None),
        }
    }

    /// Evaluates every expression of a chunk in order, one outcome per
    /// expression. A failing expression does not stop the ones after it; a
    /// chunk that fails to parse gives a single error.
    pub fn run_source(&self, text: &str) -> Vec<Result<Node, Error>> {
        match parse_program(text) {
            Ok(program) => program.iter().map(|node| self.eval(node)).collect(),
            Err(err) => vec![Err(err.into())],
        }
    }
}

fn import_into(
    env: &EnvRef,
    module: &HostModule,
    prefix: Option<&str>,
    no_prefix: bool,
    trace: bool,
) {
    if trace {
        match prefix {
            Some(prefix) => eprintln!("[import] {} as {}", module.name(), prefix),
            None => eprintln!("[import] {}", module.name()),
        }
    }
    env.borrow_mut().import_module(module, prefix, no_prefix);
}

fn name_argument(node: &Node) -> EvalResult<String> {
    match &node.kind {
        Sexpr::Symbol(name) | Sexpr::String(name) => Ok(name.clone()),
        other => Err(EvalError::InvalidArguments(
            format!("import: expected a module name, got {}", other.type_name()),
            node.span,
        )),
    }
}

fn unknown_module(name: &str, span: Span) -> EvalError {
    EvalError::InvalidArguments(format!("import: unknown module '{}'", name), span)
}
