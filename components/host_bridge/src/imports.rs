//! Named import registry and the guarded call wrapper.
//!
//! Every host function the module links against lives here under a name.
//! A guarded import converts a thrown host value into the exception-slot
//! protocol: the value is captured as a handle, stored in the bridge's single
//! exception slot, and the call yields no result.

use crate::abi::{Args, WasmValue};
use crate::bridge::Bridge;
use crate::error::{BridgeError, CallError};
use core_types::HostFunction;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Result of an import call: the scalar result, if any.
pub type ImportResult = Result<Option<WasmValue>, CallError>;

type ImportFn = dyn Fn(&Bridge, Args<'_>) -> ImportResult;

/// How host exceptions leave an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// Thrown values unwind through the module as [`CallError::Thrown`]
    Plain,
    /// Thrown values are captured into the exception slot
    Guarded,
}

/// One registered import.
#[derive(Clone)]
pub struct Import {
    name: Rc<str>,
    kind: ImportKind,
    func: Rc<ImportFn>,
}

impl Import {
    /// Import name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exception behavior.
    pub fn kind(&self) -> ImportKind {
        self.kind
    }

    /// Runs the import on behalf of the module.
    pub(crate) fn dispatch(&self, bridge: &Bridge, args: &[WasmValue]) -> ImportResult {
        let result = (self.func)(bridge, Args::new(&self.name, args));
        match (self.kind, result) {
            (ImportKind::Guarded, Err(CallError::Thrown(value))) => {
                bridge.store_exception(value);
                Ok(None)
            }
            (_, result) => result,
        }
    }
}

impl fmt::Debug for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Import")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// The table of host-provided functions.
#[derive(Debug, Default)]
pub struct ImportTable {
    entries: Vec<Import>,
    by_name: HashMap<String, usize>,
}

impl ImportTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an import under a new name.
    pub fn register<F>(&mut self, name: &str, kind: ImportKind, func: F) -> Result<(), BridgeError>
    where
        F: Fn(&Bridge, Args<'_>) -> ImportResult + 'static,
    {
        if self.contains(name) {
            return Err(BridgeError::DuplicateImport(name.to_string()));
        }
        self.define(name, kind, func);
        Ok(())
    }

    /// Registers or replaces an import.
    pub(crate) fn define<F>(&mut self, name: &str, kind: ImportKind, func: F)
    where
        F: Fn(&Bridge, Args<'_>) -> ImportResult + 'static,
    {
        let import = Import {
            name: Rc::from(name),
            kind,
            func: Rc::new(func),
        };
        match self.by_name.get(name) {
            Some(&index) => self.entries[index] = import,
            None => {
                self.by_name.insert(name.to_string(), self.entries.len());
                self.entries.push(import);
            }
        }
    }

    /// Registers a host function behind the handle convention: every
    /// argument is a handle that is dereferenced, and the result is handed
    /// back as a handle.
    pub fn register_host_function(
        &mut self,
        name: &str,
        kind: ImportKind,
        function: HostFunction,
    ) -> Result<(), BridgeError> {
        self.register(name, kind, move |bridge, args| {
            let values = (0..args.len())
                .map(|i| args.handle(i).map(|handle| bridge.get(handle)))
                .collect::<Result<Vec<_>, _>>()?;
            let result = function.call(&values).map_err(CallError::Thrown)?;
            Ok(Some(WasmValue::from_handle(bridge.to_handle(result))))
        })
    }

    /// Looks up an import by name.
    pub fn get(&self, name: &str) -> Option<&Import> {
        self.by_name.get(name).map(|&index| &self.entries[index])
    }

    /// Whether an import of this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|import| import.name())
    }

    /// Number of imports.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The import object handed to a module at instantiation.
#[derive(Debug, Clone)]
pub struct Imports {
    bridge: Weak<Bridge>,
}

impl Imports {
    pub(crate) fn new(bridge: Weak<Bridge>) -> Self {
        Imports { bridge }
    }

    /// The bridge these imports call into, while it is alive.
    pub fn bridge(&self) -> Option<Rc<Bridge>> {
        self.bridge.upgrade()
    }

    /// Calls an import by name.
    pub fn call(&self, name: &str, args: &[WasmValue]) -> ImportResult {
        let bridge = self.bridge().ok_or(BridgeError::NotInitialized)?;
        bridge.call_import(name, args)
    }

    /// Calls an import that returns a handle.
    pub fn call_handle(&self, name: &str, args: &[WasmValue]) -> Result<Option<u32>, CallError> {
        Ok(self.call(name, args)?.and_then(|value| value.as_u32()))
    }
}
