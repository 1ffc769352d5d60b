//! The bridge context.
//!
//! One [`Bridge`] owns everything a module instance shares with the host:
//! the handle table and borrow stack, the exception slot, the import table,
//! the memory views and the finalizer queue. Interior state sits behind
//! `RefCell`s that are only borrowed for the duration of a single operation,
//! because almost every operation can re-enter the bridge (module calls host,
//! host calls a module closure, which calls the host again).

use crate::abi::{ExportedAllocator, ModuleExports, WasmValue};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, HostException};
use crate::imports::{ImportKind, ImportResult, ImportTable};
use crate::instantiate::CompiledModule;
use async_runtime::EventLoop;
use closure_adapter::FinalizationRegistry;
use core_types::{HostFunction, HostResult, HostValue};
use linear_memory::{MemoryViews, ModuleSlice};
use object_heap::{Constant, Handle, HeapError, HeapStats, ObjectHeap};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub(crate) struct Instance {
    pub(crate) exports: Rc<dyn ModuleExports>,
    pub(crate) views: Rc<MemoryViews>,
    pub(crate) module: Rc<dyn CompiledModule>,
}

/// Bridge between one module instance and the host.
///
/// # Examples
///
/// ```
/// use core_types::HostValue;
/// use host_bridge::{Bridge, BridgeConfig};
///
/// let bridge = Bridge::new(BridgeConfig::default());
/// let handle = bridge.acquire(HostValue::string("hello"));
/// assert_eq!(handle.raw(), 132);
/// assert_eq!(bridge.take(handle), HostValue::string("hello"));
/// assert_eq!(bridge.heap_stats().live, 0);
/// ```
pub struct Bridge {
    config: BridgeConfig,
    heap: RefCell<ObjectHeap>,
    exception: Cell<Option<Handle>>,
    imports: RefCell<ImportTable>,
    instance: RefCell<Option<Instance>>,
    finalizers: Rc<FinalizationRegistry>,
    event_loop: Rc<EventLoop>,
    self_ref: Weak<Bridge>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("heap", &self.heap_stats())
            .field("imports", &self.imports.borrow().len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Bridge {
    /// Creates a bridge with the built-in imports registered.
    ///
    /// # Panics
    ///
    /// Panics if the configuration does not pass
    /// [`BridgeConfig::validate`]; use [`Bridge::try_new`] for configurations
    /// from outside the program.
    pub fn new(config: BridgeConfig) -> Rc<Self> {
        match Self::try_new(config) {
            Ok(bridge) => bridge,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates a bridge, rejecting an invalid configuration.
    pub fn try_new(config: BridgeConfig) -> Result<Rc<Self>, BridgeError> {
        config.validate()?;
        let mut heap = ObjectHeap::with_layout(config.layout());
        heap.reserve(config.heap_reserve);
        let mut imports = ImportTable::new();
        crate::intrinsics::install(&mut imports);

        Ok(Rc::new_cyclic(|self_ref| Bridge {
            finalizers: Rc::new(FinalizationRegistry::new(config.finalizers)),
            config,
            heap: RefCell::new(heap),
            exception: Cell::new(None),
            imports: RefCell::new(imports),
            instance: RefCell::new(None),
            event_loop: Rc::new(EventLoop::new()),
            self_ref: self_ref.clone(),
        }))
    }

    /// The configuration the bridge was created with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The host event loop callbacks are delivered on.
    pub fn event_loop(&self) -> &Rc<EventLoop> {
        &self.event_loop
    }

    /// The finalizer safety net for wrapped closures.
    pub fn finalizers(&self) -> &Rc<FinalizationRegistry> {
        &self.finalizers
    }

    pub(crate) fn weak(&self) -> Weak<Bridge> {
        self.self_ref.clone()
    }

    // ---- handle table ----

    /// Stores a value and returns a new owned handle.
    pub fn acquire(&self, value: HostValue) -> Handle {
        self.heap.borrow_mut().acquire(value)
    }

    /// Hands out a handle for `value`, using the reserved constant for
    /// `undefined`, `null`, `true` and `false`.
    pub fn to_handle(&self, value: HostValue) -> Handle {
        let constant = match value {
            HostValue::Undefined => Constant::Undefined,
            HostValue::Null => Constant::Null,
            HostValue::Boolean(true) => Constant::True,
            HostValue::Boolean(false) => Constant::False,
            other => return self.acquire(other),
        };
        self.constant(constant)
    }

    /// The value behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn get(&self, handle: Handle) -> HostValue {
        self.heap.borrow().get(handle)
    }

    /// Releases an owned handle. Constants and borrows are ignored.
    pub fn release(&self, handle: Handle) {
        // the released value is dropped outside the heap borrow
        let value = {
            let mut heap = self.heap.borrow_mut();
            let value = heap.is_live(handle).then(|| heap.get(handle));
            heap.release(handle);
            value
        };
        drop(value);
    }

    /// Dereferences and releases in one step.
    pub fn take(&self, handle: Handle) -> HostValue {
        self.heap.borrow_mut().take(handle)
    }

    /// A second, independently releasable handle to the same value.
    pub fn clone_handle(&self, handle: Handle) -> Handle {
        self.heap.borrow_mut().clone_handle(handle)
    }

    /// Handle of a reserved constant.
    pub fn constant(&self, constant: Constant) -> Handle {
        self.heap.borrow().constant(constant)
    }

    /// Handle table counters.
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.borrow().stats()
    }

    /// Current borrow stack pointer.
    pub fn stack_pointer(&self) -> u32 {
        self.heap.borrow().stack_pointer()
    }

    /// Pushes a call-scoped borrow. Prefer [`Bridge::borrow_scope`], which
    /// pops on every exit path.
    pub fn push_borrow(&self, value: HostValue) -> Result<Handle, HeapError> {
        self.heap.borrow_mut().push_borrow(value)
    }

    /// Pops the most recent borrow.
    pub fn pop_borrow(&self) {
        self.heap.borrow_mut().pop_borrow();
    }

    /// Opens a scope whose borrows are popped when it is dropped.
    pub fn borrow_scope(&self) -> BorrowScope<'_> {
        BorrowScope {
            bridge: self,
            pushed: 0,
        }
    }

    // ---- exception slot ----

    /// Captures a thrown value into the exception slot.
    ///
    /// There is a single slot: an exception that was never retrieved is
    /// overwritten, and its handle released.
    pub fn store_exception(&self, value: HostValue) -> Handle {
        let handle = self.acquire(value);
        if let Some(previous) = self.exception.replace(Some(handle)) {
            tracing::warn!(
                previous = previous.raw(),
                current = handle.raw(),
                "unretrieved host exception overwritten"
            );
            self.release(previous);
        }
        handle
    }

    /// Retrieves the captured exception handle; `None` on every later call
    /// until another exception is stored.
    pub fn take_exception(&self) -> Option<Handle> {
        self.exception.take()
    }

    /// Retrieves and releases the captured exception.
    pub fn take_host_exception(&self) -> Option<HostException> {
        self.take_exception()
            .map(|handle| HostException(self.take(handle)))
    }

    /// Whether an exception is waiting in the slot.
    pub fn has_pending_exception(&self) -> bool {
        self.exception.get().is_some()
    }

    // ---- imports ----

    /// Registers an import the module can link against.
    pub fn register_import<F>(&self, name: &str, kind: ImportKind, func: F) -> Result<(), BridgeError>
    where
        F: Fn(&Bridge, crate::abi::Args<'_>) -> ImportResult + 'static,
    {
        self.imports.borrow_mut().register(name, kind, func)
    }

    /// Registers a host function under the handle convention. See
    /// [`ImportTable::register_host_function`].
    pub fn register_host_function(
        &self,
        name: &str,
        kind: ImportKind,
        function: HostFunction,
    ) -> Result<(), BridgeError> {
        self.imports
            .borrow_mut()
            .register_host_function(name, kind, function)
    }

    /// Whether an import of this name exists.
    pub fn has_import(&self, name: &str) -> bool {
        self.imports.borrow().contains(name)
    }

    /// Names of all registered imports.
    pub fn import_names(&self) -> Vec<String> {
        self.imports.borrow().names().map(str::to_string).collect()
    }

    /// Calls an import on behalf of the module.
    pub fn call_import(&self, name: &str, args: &[WasmValue]) -> ImportResult {
        let import = self
            .imports
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownImport(name.to_string()))?;
        import.dispatch(self, args)
    }

    // ---- instance and memory ----

    /// Whether a module instance is installed.
    pub fn is_initialized(&self) -> bool {
        self.instance.borrow().is_some()
    }

    /// Exports of the installed instance.
    pub fn exports(&self) -> Result<Rc<dyn ModuleExports>, BridgeError> {
        self.instance
            .borrow()
            .as_ref()
            .map(|instance| Rc::clone(&instance.exports))
            .ok_or(BridgeError::NotInitialized)
    }

    /// The compiled module the instance was created from.
    pub fn module(&self) -> Option<Rc<dyn CompiledModule>> {
        self.instance
            .borrow()
            .as_ref()
            .map(|instance| Rc::clone(&instance.module))
    }

    /// Memory views of the installed instance.
    pub fn views(&self) -> Result<Rc<MemoryViews>, BridgeError> {
        self.instance
            .borrow()
            .as_ref()
            .map(|instance| Rc::clone(&instance.views))
            .ok_or(BridgeError::NotInitialized)
    }

    pub(crate) fn install(&self, instance: Instance) {
        *self.instance.borrow_mut() = Some(instance);
    }

    /// Decodes a UTF-8 string from module memory.
    pub fn read_string(&self, ptr: u32, len: u32) -> Result<String, BridgeError> {
        Ok(self.views()?.read_string(ptr, len)?)
    }

    /// Copies a string into memory allocated by the module.
    pub fn pass_string(&self, text: &str) -> Result<ModuleSlice, BridgeError> {
        let exports = self.exports()?;
        let views = self.views()?;
        Ok(views.write_string(text, &ExportedAllocator(exports.as_ref()))?)
    }

    /// Reads `len` handles starting at `ptr` and takes each one.
    pub fn take_handle_array(&self, ptr: u32, len: u32) -> Result<Vec<HostValue>, BridgeError> {
        let raw = self.views()?.read_handles(ptr, len)?;
        Ok(raw
            .into_iter()
            .map(|handle| self.take(Handle::from_raw(handle)))
            .collect())
    }

    // ---- callbacks ----

    /// Schedules a host function on the event loop.
    pub fn queue_microtask(&self, function: HostFunction) {
        self.event_loop.queue_microtask(function);
    }

    /// Runs the destructors queued by the finalizer safety net. Returns how
    /// many ran.
    pub fn run_finalizers(&self) -> usize {
        let records = self.finalizers.drain();
        if records.is_empty() {
            return 0;
        }
        let Ok(exports) = self.exports() else {
            tracing::debug!(count = records.len(), "no instance, finalizers dropped");
            return 0;
        };
        for record in &records {
            tracing::debug!(
                destructor = record.destructor,
                env = record.env,
                "running closure finalizer"
            );
            exports.destroy_closure(record.destructor, record.context, record.env);
        }
        records.len()
    }

    /// Drives the event loop until no callbacks or finalizers are left.
    /// Finalizers run between loop turns, never inside a callback.
    pub fn run_event_loop(&self) -> HostResult<()> {
        loop {
            self.event_loop.run_until_done()?;
            if self.run_finalizers() == 0 {
                return Ok(());
            }
        }
    }
}

/// Borrows pushed for the duration of one call.
///
/// Dropping the scope pops everything it pushed, in LIFO order, including
/// when the call unwinds.
#[derive(Debug)]
pub struct BorrowScope<'a> {
    bridge: &'a Bridge,
    pushed: u32,
}

impl BorrowScope<'_> {
    /// Pushes a borrow that lives until the scope ends.
    pub fn push(&mut self, value: HostValue) -> Result<Handle, HeapError> {
        let handle = self.bridge.push_borrow(value)?;
        self.pushed += 1;
        Ok(handle)
    }
}

impl Drop for BorrowScope<'_> {
    fn drop(&mut self) {
        for _ in 0..self.pushed {
            self.bridge.pop_borrow();
        }
    }
}
