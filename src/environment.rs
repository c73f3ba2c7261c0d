use crate::host::HostModule;
use crate::primitives;
use crate::source::Span;
use crate::evaluator::EvalResult;
use crate::types::{HostFunction, Node, Procedure, Sexpr};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Unbound variable: '{0}'")]
    UnboundVariable(String, Span), // Symbol name, span where lookup happened
}

/// Shared handle to a frame. Closures and child frames keep their parent
/// alive through it.
pub type EnvRef = Rc<RefCell<Environment>>;

// --- Environment Definition ---

#[derive(Debug, Default)]
pub struct Environment {
    outer: Option<EnvRef>,
    bindings: HashMap<String, Node>, // Maps variable names to Nodes
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// A root environment holding the core primitives: arithmetic,
    /// comparison, list operations and predicates.
    pub fn new_global_populated() -> EnvRef {
        let env_ptr = Environment::new(); // Create empty global env
        {
            // Borrow mutably only inside this scope
            let mut env = env_ptr.borrow_mut();
            env.add_primitive("+", primitives::prim_add);
            env.add_primitive("-", primitives::prim_sub);
            env.add_primitive("*", primitives::prim_mul);
            env.add_primitive("/", primitives::prim_div);
            env.add_primitive("=", primitives::prim_equals);
            env.add_primitive("<", primitives::prim_less_than);
            env.add_primitive("<=", primitives::prim_less_than_or_equals);
            env.add_primitive(">", primitives::prim_greater_than);
            env.add_primitive(">=", primitives::prim_greater_than_or_equals);

            // --- List Primitives ---
            env.add_primitive("car", primitives::prim_car);
            env.add_primitive("cdr", primitives::prim_cdr);
            env.add_primitive("cons", primitives::prim_cons);
            env.add_primitive("list", primitives::prim_list);
            env.add_primitive("length", primitives::prim_length);
            env.add_primitive("eq?", primitives::prim_is_eq);

            // --- Type Predicates ---
            env.add_primitive("null?", primitives::prim_is_null);
            env.add_primitive("list?", primitives::prim_is_list);
            env.add_primitive("number?", primitives::prim_is_number);
            env.add_primitive("boolean?", primitives::prim_is_boolean);
            env.add_primitive("symbol?", primitives::prim_is_symbol);
            env.add_primitive("string?", primitives::prim_is_string);
            env.add_primitive("procedure?", primitives::prim_is_procedure);

            // --- Constants ---
            env.define("#t".to_string(), Node::new_bool(true, Span::default()));
            env.define("#f".to_string(), Node::new_bool(false, Span::default()));
            env.define("nil".to_string(), Node::new_list(vec![], Span::default()));
        }
        env_ptr
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// A child frame of `parent` binding `names[i]` to `values[i]`.
    /// Surplus names or values beyond the shorter list are dropped.
    pub fn extend(parent: &EnvRef, names: &[String], values: Vec<Node>) -> EnvRef {
        let frame = Environment::new_enclosed(parent.clone());
        {
            let mut env = frame.borrow_mut();
            for (name, value) in names.iter().zip(values) {
                env.define(name.clone(), value);
            }
        }
        frame
    }

    /// Defines a variable in the *current* environment frame.
    /// Replaces the value if the variable already exists in this frame.
    pub fn define(&mut self, name: String, value_node: Node) {
        self.bindings.insert(name, value_node);
    }

    /// Like [`Environment::define`], but when `overridable` is false an
    /// existing binding in this frame wins. Returns whether `value_node` was
    /// bound.
    pub fn define_with(&mut self, name: String, value_node: Node, overridable: bool) -> bool {
        if !overridable && self.bindings.contains_key(&name) {
            return false;
        }
        self.define(name, value_node);
        true
    }

    /// Looks up a variable's value.
    /// Checks the current environment first, then walks up the outer environment chain.
    /// `lookup_span` is the location where the variable was referenced, used for error reporting.
    pub fn get(&self, name: &str, lookup_span: Span) -> Result<Node, EnvError> {
        if let Some(value_node) = self.bindings.get(name) {
            Ok(value_node.clone())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow().get(name, lookup_span),
                None => Err(EnvError::UnboundVariable(name.to_string(), lookup_span)),
            }
        }
    }

    /// Sets the value of an *existing* variable in the environment chain.
    /// Searches outward from the current environment and updates the first frame
    /// where the variable is found. Errors if the variable is not defined.
    /// `set_span` is the location of the `set!` expression.
    pub fn set(&mut self, name: &str, value_node: Node, set_span: Span) -> Result<(), EnvError> {
        if let Some(value_mut) = self.bindings.get_mut(name) {
            *value_mut = value_node;
            Ok(())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow_mut().set(name, value_node, set_span),
                None => Err(EnvError::UnboundVariable(name.to_string(), set_span)),
            }
        }
    }

    /// Binds a host module and its members, none of them overriding existing
    /// bindings. The module itself goes under `prefix` (default: the module
    /// name) and each member under `prefix-member`, or under its bare name
    /// when `no_prefix` is set.
    pub fn import_module(&mut self, module: &HostModule, prefix: Option<&str>, no_prefix: bool) {
        let prefix = prefix.unwrap_or(module.name());
        self.define_with(
            prefix.to_string(),
            Node::new(module.as_value(), Span::default()),
            false,
        );
        for (member, value) in module.members() {
            let name = if no_prefix {
                member.to_string()
            } else {
                format!("{}-{}", prefix, member)
            };
            self.define_with(name, Node::new(value.clone(), Span::default()), false);
        }
    }

    /// Helper to add a primitive procedure to the environment.
    fn add_primitive(&mut self, name: &str, func: fn(Vec<Node>, Span) -> EvalResult) {
        let procedure = Procedure::Host(HostFunction::new(name, func));
        self.define(
            name.to_string(),
            Node::new(Sexpr::Procedure(procedure), Span::default()),
        );
    }

    fn add_identifiers(&self, mut identifiers: HashSet<String>) -> HashSet<String> {
        for identifier in self.bindings.keys() {
            identifiers.insert(identifier.to_string());
        }
        match self.outer {
            Some(ref outer_env_ptr) => outer_env_ptr.borrow().add_identifiers(identifiers),
            None => identifiers,
        }
    }

    /// Gets every identifier visible from this environment
    pub fn get_identifiers(&self) -> HashSet<String> {
        self.add_identifiers(HashSet::new())
    }
}
