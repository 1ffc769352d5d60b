//! Shared closure state.

use std::cell::Cell;

/// How the closure may be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureFlavor {
    /// Multi-shot callback (event listeners, intervals). The context pointer
    /// is taken for the duration of a call, so re-entering the closure while
    /// it runs is rejected.
    Reusable,
    /// One-time continuation (promise reactions). The context pointer stays
    /// in place during a call; the host drops the callback explicitly if it
    /// never fires.
    SingleShot,
}

/// How host arguments reach the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgPassing {
    /// Through the borrow stack, valid only for the duration of the call
    Borrowed,
    /// As owned heap handles the module must release
    Owned,
}

/// Shape of one kind of module closure: where to invoke and destroy it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterSpec {
    /// Module entry that runs the closure body
    pub invoke: u32,
    /// Index into the module's destructor table
    pub destructor: u32,
    /// Reentrancy behavior
    pub flavor: ClosureFlavor,
    /// Argument marshalling
    pub args: ArgPassing,
}

impl AdapterSpec {
    /// A reusable closure taking borrowed arguments.
    pub fn reusable(invoke: u32, destructor: u32) -> Self {
        AdapterSpec {
            invoke,
            destructor,
            flavor: ClosureFlavor::Reusable,
            args: ArgPassing::Borrowed,
        }
    }

    /// A single-shot closure taking borrowed arguments.
    pub fn single_shot(invoke: u32, destructor: u32) -> Self {
        AdapterSpec {
            invoke,
            destructor,
            flavor: ClosureFlavor::SingleShot,
            args: ArgPassing::Borrowed,
        }
    }

    /// Switches argument passing to owned handles.
    pub fn with_owned_args(mut self) -> Self {
        self.args = ArgPassing::Owned;
        self
    }
}

/// Reference-counted state of one wrapped closure.
///
/// Owned jointly by the module (one reference until it drops the callback)
/// and by every invocation in flight.
#[derive(Debug)]
pub struct ClosureState {
    pub(crate) spec: AdapterSpec,
    pub(crate) context: Cell<u32>,
    pub(crate) env: u32,
    pub(crate) ref_count: Cell<u32>,
    pub(crate) registered: Cell<bool>,
    pub(crate) destroyed: Cell<bool>,
}

impl ClosureState {
    /// New state with a reference count of one, held by the module.
    pub fn new(spec: AdapterSpec, context: u32, env: u32) -> Self {
        ClosureState {
            spec,
            context: Cell::new(context),
            env,
            ref_count: Cell::new(1),
            registered: Cell::new(false),
            destroyed: Cell::new(false),
        }
    }

    /// The adapter this closure was created with.
    pub fn spec(&self) -> AdapterSpec {
        self.spec
    }

    /// Module context pointer; zero while a reusable call runs or after
    /// destruction.
    pub fn context(&self) -> u32 {
        self.context.get()
    }

    /// Module environment pointer.
    pub fn env(&self) -> u32 {
        self.env
    }

    /// Current reference count.
    pub fn ref_count(&self) -> u32 {
        self.ref_count.get()
    }

    /// Whether the closure has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Whether the finalizer safety net still covers this closure.
    pub fn is_registered(&self) -> bool {
        self.registered.get()
    }

    /// Drops the module's reference (the host discarded the callback).
    ///
    /// Returns true when this was the last reference: the closure is then
    /// dead and the module is responsible for freeing its environment. When
    /// an invocation is still running, the invocation destroys it on exit.
    ///
    /// # Panics
    ///
    /// Panics if the closure was already destroyed.
    pub fn drop_ref(&self) -> bool {
        let count = self.ref_count.get();
        assert!(
            count > 0 && !self.destroyed.get(),
            "closure dropped after destruction"
        );
        self.ref_count.set(count - 1);
        if count == 1 {
            self.context.set(0);
            self.destroyed.set(true);
            tracing::debug!(env = self.env, "closure released by module");
            return true;
        }
        false
    }
}
