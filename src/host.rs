//! Host modules: named groups of Rust functions and values that an embedding
//! application registers explicitly and programs import by name.

use std::collections::HashMap;

use crate::evaluator::{EvalError, EvalResult};
use crate::source::Span;
use crate::types::{HostFunction, Node, Procedure, Sexpr};

#[derive(Clone)]
pub struct HostModule {
    name: String,
    members: Vec<(String, Sexpr)>,
}

impl HostModule {
    pub fn new(name: impl Into<String>) -> Self {
        HostModule {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Adds a host function member.
    pub fn with_function(
        self,
        name: &str,
        func: impl Fn(Vec<Node>, Span) -> EvalResult + 'static,
    ) -> Self {
        let function = HostFunction::new(name, func);
        self.with_value(name, Sexpr::Procedure(Procedure::Host(function)))
    }

    /// Adds a plain data member.
    pub fn with_value(mut self, name: &str, value: Sexpr) -> Self {
        self.members.push((name.to_string(), value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &Sexpr)> {
        self.members
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn get(&self, member: &str) -> Option<&Sexpr> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, value)| value)
    }

    /// The module itself as a value. Calling it with a member name (symbol
    /// or string) returns that member; calling it with no arguments lists
    /// the member names.
    pub fn as_value(&self) -> Sexpr {
        let module = self.clone();
        let accessor = HostFunction::new(self.name.clone(), move |args, span| {
            match args.as_slice() {
                [] => Ok(Node::new_list(
                    module
                        .members()
                        .map(|(name, _)| Node::new_symbol(name, span))
                        .collect(),
                    span,
                )),
                [member] => {
                    let name = match &member.kind {
                        Sexpr::Symbol(name) | Sexpr::String(name) => name,
                        other => {
                            return Err(EvalError::InvalidArguments(
                                format!(
                                    "module '{}' expects a member name, got {}",
                                    module.name,
                                    other.type_name()
                                ),
                                member.span,
                            ));
                        }
                    };
                    module
                        .get(name)
                        .map(|value| Node::new(value.clone(), span))
                        .ok_or_else(|| {
                            EvalError::InvalidArguments(
                                format!("module '{}' has no member '{}'", module.name, name),
                                member.span,
                            )
                        })
                }
                _ => Err(EvalError::InvalidArguments(
                    format!(
                        "module '{}' expects at most 1 argument, got {}",
                        module.name,
                        args.len()
                    ),
                    span,
                )),
            }
        });
        Sexpr::Procedure(Procedure::Host(accessor))
    }
}

/// Modules available to the `import` procedure.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, HostModule>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        ModuleRegistry::default()
    }

    /// Registers a module, replacing any earlier module of the same name.
    pub fn register(&mut self, module: HostModule) {
        self.modules.insert(module.name.clone(), module);
    }

    pub fn get(&self, name: &str) -> Option<&HostModule> {
        self.modules.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
