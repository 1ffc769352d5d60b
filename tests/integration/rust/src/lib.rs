//! Integration test harness for the host bridge
//!
//! [`TestModule`] stands in for a compiled module. Its closure bodies are
//! Rust closures, it allocates with a bump allocator over its own linear
//! memory, and it reaches the host only through the bridge's import table,
//! the way generated bindings do.

use core_types::HostValue;
use host_bridge::{
    Bridge, BridgeConfig, BridgeError, CallError, CompiledModule, Engine, Imports, ModuleExports,
    ModuleSource, WasmValue,
};
use linear_memory::{LinearMemory, ModuleAllocator, PAGE_SIZE};
use object_heap::Handle;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Re-export components for test convenience
pub mod components {
    pub use async_runtime;
    pub use closure_adapter;
    pub use core_types;
    pub use host_bridge;
    pub use linear_memory;
    pub use object_heap;
}

/// Imports the test module links against.
pub const REQUIRED_IMPORTS: &[&str] = &[
    "object_drop_ref",
    "object_clone_ref",
    "cb_drop",
    "string_new",
    "string_get",
    "queue_microtask",
];

/// Module bytes accepted by [`TestEngine`].
pub const MODULE_BYTES: &[u8] = b"\0asm\x01\0\0\0";

/// Something the module observed.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A closure body ran
    Invoked {
        /// Invoke entry
        entry: u32,
        /// Environment pointer
        env: u32,
    },
    /// A closure environment was freed
    Destroyed {
        /// Destructor index
        destructor: u32,
        /// Environment pointer
        env: u32,
    },
    /// A host allocation was freed
    Freed {
        /// Pointer
        ptr: u32,
        /// Size in bytes
        len: u32,
    },
}

type ClosureBody = dyn Fn(&TestModule, &[Handle]) -> Result<(), CallError>;

/// A module instance driven from Rust.
pub struct TestModule {
    memory: LinearMemory,
    heap_top: Cell<u32>,
    started: Cell<u32>,
    events: RefCell<Vec<Event>>,
    bodies: RefCell<HashMap<u32, Rc<ClosureBody>>>,
    imports: RefCell<Option<Imports>>,
}

impl TestModule {
    /// A module with one page of memory, growable to `max_pages`.
    pub fn new(max_pages: u32) -> Rc<Self> {
        Rc::new(TestModule {
            memory: LinearMemory::new(1, Some(max_pages)),
            heap_top: Cell::new(1024),
            started: Cell::new(0),
            events: RefCell::new(Vec::new()),
            bodies: RefCell::new(HashMap::new()),
            imports: RefCell::new(None),
        })
    }

    /// Creates a bridge and instantiates a fresh module in it.
    pub fn instantiate(config: BridgeConfig) -> (Rc<Bridge>, Rc<TestModule>) {
        let bridge = Bridge::new(config);
        let module = TestModule::new(64);
        let engine = TestEngine::new(&module);
        bridge
            .init_sync(ModuleSource::Bytes(MODULE_BYTES.to_vec()), &engine)
            .expect("instantiation");
        (bridge, module)
    }

    /// How many times the start routine ran.
    pub fn start_count(&self) -> u32 {
        self.started.get()
    }

    /// The module's memory.
    pub fn linear_memory(&self) -> &LinearMemory {
        &self.memory
    }

    /// Everything observed so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Destructions of the environment at `env`.
    pub fn destroyed(&self, env: u32) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, Event::Destroyed { env: e, .. } if *e == env))
            .count()
    }

    /// Invocations of the entry `entry`.
    pub fn invoked(&self, entry: u32) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, Event::Invoked { entry: e, .. } if *e == entry))
            .count()
    }

    /// Sets the body that runs for invoke entry `entry`.
    pub fn on_invoke<F>(&self, entry: u32, body: F)
    where
        F: Fn(&TestModule, &[Handle]) -> Result<(), CallError> + 'static,
    {
        self.bodies.borrow_mut().insert(entry, Rc::new(body));
    }

    /// The import object the bridge linked the module with.
    pub fn imports(&self) -> Imports {
        self.imports
            .borrow()
            .clone()
            .expect("module not instantiated")
    }

    /// Calls an import, expecting a handle back.
    pub fn call_handle(&self, name: &str, args: &[WasmValue]) -> Result<Handle, CallError> {
        let raw = self.imports().call_handle(name, args)?;
        Ok(Handle::from_raw(raw.expect("import returned no handle")))
    }

    /// Copies `text` into module memory.
    pub fn pass_str(&self, text: &str) -> (u32, u32) {
        let len = text.len() as u32;
        let ptr = self.malloc(len, 1);
        self.memory
            .write(ptr, text.as_bytes())
            .expect("write into fresh allocation");
        (ptr, len)
    }

    /// Hands a string to the host and returns its handle.
    pub fn string_new(&self, text: &str) -> Handle {
        let (ptr, len) = self.pass_str(text);
        self.call_handle("string_new", &[WasmValue::from_u32(ptr), WasmValue::from_u32(len)])
            .expect("string_new")
    }

    /// Reads the host string behind `handle`, or `None` for other values.
    pub fn string_get(&self, handle: Handle) -> Option<String> {
        let ret = self.malloc(8, 4);
        self.imports()
            .call("string_get", &[WasmValue::from_u32(ret), WasmValue::from_handle(handle)])
            .expect("string_get");
        let word = |offset: u32| {
            let bytes = self.memory.read(offset, 4).expect("return slot");
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
        };
        let (ptr, len) = (word(ret), word(ret + 4));
        if ptr == 0 {
            return None;
        }
        let bytes = self.memory.read(ptr, len).expect("string bytes");
        String::from_utf8(bytes).ok()
    }

    /// Releases a handle the module owns.
    pub fn drop_ref(&self, handle: Handle) {
        self.imports()
            .call("object_drop_ref", &[WasmValue::from_handle(handle)])
            .expect("object_drop_ref");
    }

    /// Creates a host callback for `(context, env)` through a closure
    /// wrapper import.
    pub fn make_closure(&self, wrapper: &str, context: u32, env: u32) -> Handle {
        self.call_handle(
            wrapper,
            &[
                WasmValue::from_u32(context),
                WasmValue::from_u32(env),
                WasmValue::I32(0),
            ],
        )
        .expect("closure wrapper")
    }

    /// Drops the module's reference to a callback. When it was the last
    /// one, the module frees the environment itself.
    pub fn drop_closure(&self, handle: Handle, destructor: u32, env: u32) -> Result<bool, CallError> {
        let last = self
            .imports()
            .call("cb_drop", &[WasmValue::from_handle(handle)])?
            .and_then(|value| value.as_u32())
            == Some(1);
        if last {
            self.events
                .borrow_mut()
                .push(Event::Destroyed { destructor, env });
        }
        Ok(last)
    }
}

impl ModuleAllocator for TestModule {
    fn malloc(&self, size: u32, align: u32) -> u32 {
        let align = align.max(1);
        let ptr = self.heap_top.get().div_ceil(align) * align;
        let end = ptr + size;
        let capacity = self.memory.size_pages() * PAGE_SIZE as u32;
        if end > capacity {
            let pages = (end - capacity).div_ceil(PAGE_SIZE as u32);
            self.memory.grow(pages).expect("module out of memory");
        }
        self.heap_top.set(end);
        ptr
    }

    fn realloc(&self, ptr: u32, old_size: u32, new_size: u32, align: u32) -> u32 {
        if ptr + old_size == self.heap_top.get() {
            let end = ptr + new_size;
            let capacity = self.memory.size_pages() * PAGE_SIZE as u32;
            if end > capacity {
                let pages = (end - capacity).div_ceil(PAGE_SIZE as u32);
                self.memory.grow(pages).expect("module out of memory");
            }
            self.heap_top.set(end);
            return ptr;
        }
        let moved = self.malloc(new_size, align);
        let bytes = self
            .memory
            .read(ptr, old_size.min(new_size))
            .expect("realloc source");
        self.memory.write(moved, &bytes).expect("realloc target");
        moved
    }
}

impl ModuleExports for TestModule {
    fn memory(&self) -> LinearMemory {
        self.memory.clone()
    }

    fn free(&self, ptr: u32, size: u32, _align: u32) {
        self.events
            .borrow_mut()
            .push(Event::Freed { ptr, len: size });
    }

    fn destroy_closure(&self, destructor: u32, _context: u32, env: u32) {
        self.events
            .borrow_mut()
            .push(Event::Destroyed { destructor, env });
    }

    fn invoke_closure(
        &self,
        entry: u32,
        _context: u32,
        env: u32,
        args: &[Handle],
    ) -> Result<(), CallError> {
        self.events.borrow_mut().push(Event::Invoked { entry, env });
        let body = self.bodies.borrow().get(&entry).cloned();
        match body {
            Some(body) => body(self, args),
            None => Ok(()),
        }
    }

    fn start(&self) -> Result<(), CallError> {
        self.started.set(self.started.get() + 1);
        Ok(())
    }
}

struct TestCompiled {
    module: Rc<TestModule>,
}

impl CompiledModule for TestCompiled {
    fn imports(&self) -> Vec<String> {
        REQUIRED_IMPORTS.iter().map(|name| name.to_string()).collect()
    }

    fn instantiate(&self, imports: Imports) -> Result<Rc<dyn ModuleExports>, BridgeError> {
        *self.module.imports.borrow_mut() = Some(imports);
        Ok(self.module.clone())
    }
}

/// Compiles [`MODULE_BYTES`] into a given [`TestModule`].
pub struct TestEngine {
    module: Rc<TestModule>,
}

impl TestEngine {
    /// An engine that always produces `module`.
    pub fn new(module: &Rc<TestModule>) -> Self {
        TestEngine {
            module: Rc::clone(module),
        }
    }
}

impl Engine for TestEngine {
    fn compile(&self, bytes: &[u8]) -> Result<Rc<dyn CompiledModule>, BridgeError> {
        if bytes != MODULE_BYTES {
            return Err(BridgeError::Compile("unexpected module bytes".into()));
        }
        Ok(Rc::new(TestCompiled {
            module: Rc::clone(&self.module),
        }))
    }
}

/// The host value behind a function handle, for calling it from the host.
pub fn host_function(bridge: &Bridge, handle: Handle) -> HostValue {
    let value = bridge.get(handle);
    assert_eq!(value.type_of(), "function", "handle {handle} is not a function");
    value
}
