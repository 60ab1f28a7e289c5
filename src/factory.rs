//! Prototype registry for named function shapes.
//!
//! The factory is explicit, caller-owned state with ordinary construction
//! and drop semantics, not a process-wide singleton. Clients register the
//! prototypes they care about and create independent clones by name.

use std::collections::HashMap;

use crate::error::{FuncOptError, Result};
use crate::function::Function;

/// A registry of function prototypes keyed by name.
#[derive(Default)]
pub struct FunctionFactory {
    prototypes: HashMap<String, Box<dyn Function>>,
}

impl FunctionFactory {
    /// An empty registry; clients are responsible for adding prototypes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prototype under `name`.
    ///
    /// Fails with `DuplicatePrototype` if the name is taken.
    pub fn add_func(&mut self, name: &str, func: Box<dyn Function>) -> Result<()> {
        if self.prototypes.contains_key(name) {
            return Err(FuncOptError::DuplicatePrototype {
                name: name.to_string(),
            });
        }
        self.prototypes.insert(name.to_string(), func);
        Ok(())
    }

    /// Create an independent deep copy of the named prototype.
    pub fn create(&self, name: &str) -> Result<Box<dyn Function>> {
        match self.prototypes.get(name) {
            Some(proto) => Ok(proto.clone_box()),
            None => Err(FuncOptError::PrototypeNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// The registered prototype names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prototypes.keys().cloned().collect();
        names.sort();
        names
    }
}
