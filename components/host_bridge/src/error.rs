//! Error types for the bridge.

use core_types::{debug_string, HostValue};
use linear_memory::{EncodingError, MarshalError, MemoryError};
use object_heap::HeapError;
use thiserror::Error;

/// Failures of the bridge itself, as opposed to values thrown by host code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// Memory access failed
    #[error(transparent)]
    Memory(#[from] MemoryError),
    /// Text encoding failed
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// Handle table failure
    #[error(transparent)]
    Heap(#[from] HeapError),
    /// An operation needs a module instance that does not exist yet
    #[error("module is not initialized")]
    NotInitialized,
    /// Linking found no import of this name
    #[error("unresolved import: {0}")]
    UnresolvedImport(String),
    /// Call to an import that was never registered
    #[error("unknown import: {0}")]
    UnknownImport(String),
    /// An import was registered twice
    #[error("duplicate import: {0}")]
    DuplicateImport(String),
    /// An import received an argument of the wrong type
    #[error("bad argument {index} to {import}: expected {expected}")]
    BadArgument {
        /// Import name
        import: String,
        /// Position of the argument
        index: usize,
        /// Expected value type
        expected: &'static str,
    },
    /// The engine rejected the module bytes
    #[error("compile error: {0}")]
    Compile(String),
    /// The module resource could not be fetched
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// The configuration could not be parsed or is out of range
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<MarshalError> for BridgeError {
    fn from(err: MarshalError) -> Self {
        match err {
            MarshalError::Memory(e) => BridgeError::Memory(e),
            MarshalError::Encoding(e) => BridgeError::Encoding(e),
        }
    }
}

/// Outcome of a failed call across the boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// A host value was thrown and not caught by a guarded import
    #[error("uncaught exception: {}", debug_string(.0))]
    Thrown(HostValue),
    /// The bridge failed
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl CallError {
    /// The thrown value, if this is a host exception.
    pub fn thrown(&self) -> Option<&HostValue> {
        match self {
            CallError::Thrown(value) => Some(value),
            CallError::Bridge(_) => None,
        }
    }

    /// Converts into the value a host caller sees thrown. Bridge failures
    /// become `InternalError` objects.
    pub fn into_thrown(self) -> HostValue {
        match self {
            CallError::Thrown(value) => value,
            CallError::Bridge(err) => {
                HostValue::error(core_types::ErrorKind::InternalError, &err.to_string())
            }
        }
    }
}

impl From<MemoryError> for CallError {
    fn from(err: MemoryError) -> Self {
        CallError::Bridge(err.into())
    }
}

impl From<MarshalError> for CallError {
    fn from(err: MarshalError) -> Self {
        CallError::Bridge(err.into())
    }
}

impl From<HeapError> for CallError {
    fn from(err: HeapError) -> Self {
        CallError::Bridge(err.into())
    }
}

/// A host exception retrieved from the exception slot, re-raised on the
/// module side as a typed error carrying the captured value.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("host exception: {}", debug_string(.0))]
pub struct HostException(pub HostValue);

impl HostException {
    /// The captured value.
    pub fn value(&self) -> &HostValue {
        &self.0
    }

    /// Unwraps the captured value.
    pub fn into_value(self) -> HostValue {
        self.0
    }
}

impl From<HostException> for CallError {
    fn from(exception: HostException) -> Self {
        CallError::Thrown(exception.0)
    }
}
