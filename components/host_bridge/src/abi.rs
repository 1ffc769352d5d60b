//! The module side of the boundary.
//!
//! Values cross as untyped wasm scalars; everything else is a handle or a
//! (pointer, length) pair in linear memory.

use crate::error::{BridgeError, CallError};
use linear_memory::{LinearMemory, ModuleAllocator};
use object_heap::Handle;

/// Dynamic wasm value for untyped import and export calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WasmValue {
    /// 32-bit integer; handles, pointers, lengths and booleans
    I32(i32),
    /// 64-bit integer
    I64(i64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
}

impl WasmValue {
    /// An `i32` carrying a `u32` bit pattern.
    pub fn from_u32(value: u32) -> Self {
        WasmValue::I32(value as i32)
    }

    /// An `i32` carrying a handle.
    pub fn from_handle(handle: Handle) -> Self {
        Self::from_u32(handle.raw())
    }

    /// An `i32` carrying 0 or 1.
    pub fn from_bool(value: bool) -> Self {
        WasmValue::I32(value as i32)
    }

    /// Reinterprets an `i32` as `u32`.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            WasmValue::I32(v) => Some(*v as u32),
            _ => None,
        }
    }

    /// The payload of an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WasmValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Name of the value type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            WasmValue::I32(_) => "i32",
            WasmValue::I64(_) => "i64",
            WasmValue::F32(_) => "f32",
            WasmValue::F64(_) => "f64",
        }
    }
}

/// Typed access to import arguments.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    import: &'a str,
    values: &'a [WasmValue],
}

impl<'a> Args<'a> {
    pub(crate) fn new(import: &'a str, values: &'a [WasmValue]) -> Self {
        Args { import, values }
    }

    /// Name of the import being called.
    pub fn import(&self) -> &str {
        self.import
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Argument `index` as a `u32`.
    pub fn u32(&self, index: usize) -> Result<u32, BridgeError> {
        self.values
            .get(index)
            .and_then(WasmValue::as_u32)
            .ok_or_else(|| self.bad(index, "i32"))
    }

    /// Argument `index` as a handle.
    pub fn handle(&self, index: usize) -> Result<Handle, BridgeError> {
        self.u32(index).map(Handle::from_raw)
    }

    /// Argument `index` as an `f64`.
    pub fn f64(&self, index: usize) -> Result<f64, BridgeError> {
        self.values
            .get(index)
            .and_then(WasmValue::as_f64)
            .ok_or_else(|| self.bad(index, "f64"))
    }

    fn bad(&self, index: usize, expected: &'static str) -> BridgeError {
        BridgeError::BadArgument {
            import: self.import.to_string(),
            index,
            expected,
        }
    }
}

/// Exports of an instantiated module, as the bridge consumes them.
///
/// The allocator entry points come from [`ModuleAllocator`].
pub trait ModuleExports: ModuleAllocator {
    /// The module's linear memory.
    fn memory(&self) -> LinearMemory;

    /// Frees an allocation made through the allocator.
    fn free(&self, ptr: u32, size: u32, align: u32);

    /// Runs the destructor at `destructor` in the module's function table.
    fn destroy_closure(&self, destructor: u32, context: u32, env: u32);

    /// Runs the closure body behind the invoke entry `entry`.
    fn invoke_closure(
        &self,
        entry: u32,
        context: u32,
        env: u32,
        args: &[Handle],
    ) -> Result<(), CallError>;

    /// The one-time start routine.
    fn start(&self) -> Result<(), CallError>;
}

/// Borrows the allocator entry points of an instance.
pub(crate) struct ExportedAllocator<'a>(pub(crate) &'a dyn ModuleExports);

impl ModuleAllocator for ExportedAllocator<'_> {
    fn malloc(&self, size: u32, align: u32) -> u32 {
        self.0.malloc(size, align)
    }

    fn realloc(&self, ptr: u32, old_size: u32, new_size: u32, align: u32) -> u32 {
        self.0.realloc(ptr, old_size, new_size, align)
    }

    fn has_realloc(&self) -> bool {
        self.0.has_realloc()
    }
}
