//! Indexed destructor entries.
//!
//! Closures name their destructor by index into the module's function table.
//! This is that table for modules implemented on the host side.

use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Destructor dispatch failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No entry at the index
    #[error("no destructor at table index {0}")]
    UnknownIndex(u32),
}

type Destructor = Rc<dyn Fn(u32, u32)>;

/// Table of `(context, env)` destructors.
#[derive(Default, Clone)]
pub struct DestructorTable {
    entries: Vec<Destructor>,
}

impl fmt::Debug for DestructorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestructorTable")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl DestructorTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a destructor and returns its index.
    pub fn register<F>(&mut self, destructor: F) -> u32
    where
        F: Fn(u32, u32) + 'static,
    {
        self.entries.push(Rc::new(destructor));
        (self.entries.len() - 1) as u32
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the destructor at `index`.
    pub fn call(&self, index: u32, context: u32, env: u32) -> Result<(), DispatchError> {
        let entry = self
            .entries
            .get(index as usize)
            .cloned()
            .ok_or(DispatchError::UnknownIndex(index))?;
        entry(context, env);
        Ok(())
    }
}
