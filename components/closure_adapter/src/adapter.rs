//! Invocation of wrapped closures.

use crate::finalization::FinalizationRegistry;
use crate::state::{AdapterSpec, ClosureFlavor, ClosureState};
use core_types::{ErrorKind, HostFunction, HostResult, HostValue};
use std::rc::{Rc, Weak};

/// Message thrown when a closure is entered while unavailable.
pub const INVALID_CLOSURE_MESSAGE: &str = "closure invoked recursively or after being dropped";

/// The module side of a closure call.
///
/// Implemented by the bridge: it marshals the arguments into handles, calls
/// the module's invoke entry, and unwinds any borrows it pushed.
pub trait ClosureTarget {
    /// Runs the closure body.
    fn call(
        &self,
        spec: &AdapterSpec,
        context: u32,
        env: u32,
        args: &[HostValue],
    ) -> HostResult<HostValue>;

    /// Runs the module destructor for a dead closure.
    fn destroy(&self, destructor: u32, context: u32, env: u32);
}

/// The object behind a wrapped closure's host function.
///
/// Dropping the last reference to the host function drops this value; if the
/// closure is still covered by the safety net at that point, its destructor
/// is queued on the registry.
#[derive(Debug)]
pub struct WrappedClosure {
    state: Rc<ClosureState>,
    registry: Option<Weak<FinalizationRegistry>>,
}

impl WrappedClosure {
    /// The shared state.
    pub fn state(&self) -> &Rc<ClosureState> {
        &self.state
    }

    /// Drops the module's reference, taking the closure off the safety net
    /// when it was the last one. See [`ClosureState::drop_ref`].
    pub fn drop_ref(&self) -> bool {
        let last = self.state.drop_ref();
        if last {
            self.unregister();
        }
        last
    }

    fn unregister(&self) {
        match self.registry.as_ref().and_then(Weak::upgrade) {
            Some(registry) => registry.unregister(&self.state),
            None => self.state.registered.set(false),
        }
    }
}

impl Drop for WrappedClosure {
    fn drop(&mut self) {
        if !self.state.registered.get() {
            return;
        }
        if self.state.destroyed.get() {
            self.unregister();
        } else if let Some(registry) = self.registry.as_ref().and_then(Weak::upgrade) {
            registry.enqueue(&self.state);
        }
    }
}

/// Restores the reference count when an invocation ends, however it ends.
struct InvocationGuard<'a, T: ClosureTarget + ?Sized> {
    state: &'a ClosureState,
    target: &'a T,
    registry: Option<&'a Weak<FinalizationRegistry>>,
    context: u32,
}

impl<T: ClosureTarget + ?Sized> Drop for InvocationGuard<'_, T> {
    fn drop(&mut self) {
        let state = self.state;
        let count = state.ref_count.get() - 1;
        state.ref_count.set(count);
        if count == 0 {
            state.destroyed.set(true);
            state.context.set(0);
            match self.registry.and_then(Weak::upgrade) {
                Some(registry) => registry.unregister(state),
                None => state.registered.set(false),
            }
            tracing::debug!(
                destructor = state.spec.destructor,
                env = state.env,
                "closure destroyed after last invocation"
            );
            self.target
                .destroy(state.spec.destructor, self.context, state.env);
        } else if state.spec.flavor == ClosureFlavor::Reusable {
            state.context.set(self.context);
        }
    }
}

/// Invokes a closure through `target`.
///
/// Holds one reference for the duration of the call. A reusable closure gives
/// up its context pointer while running, so re-entering it (or entering it
/// after destruction) throws instead of reaching the module.
pub fn invoke<T: ClosureTarget + ?Sized>(
    closure: &WrappedClosure,
    target: &T,
    args: &[HostValue],
) -> HostResult<HostValue> {
    let state = closure.state.as_ref();
    let context = state.context.get();
    if state.destroyed.get() || context == 0 {
        return Err(HostValue::error(ErrorKind::Error, INVALID_CLOSURE_MESSAGE));
    }

    state.ref_count.set(state.ref_count.get() + 1);
    if state.spec.flavor == ClosureFlavor::Reusable {
        state.context.set(0);
    }
    let _guard = InvocationGuard {
        state,
        target,
        registry: closure.registry.as_ref(),
        context,
    };
    target.call(&state.spec, context, state.env, args)
}

/// Wraps a closure as a host function.
///
/// `make_target` is consulted on every call; returning `None` (the bridge is
/// gone) makes the call throw. The returned function carries the
/// [`WrappedClosure`] as its attachment.
pub fn wrap<T, F>(
    state: ClosureState,
    registry: Option<&Rc<FinalizationRegistry>>,
    make_target: F,
) -> HostFunction
where
    T: ClosureTarget + 'static,
    F: Fn() -> Option<Rc<T>> + 'static,
{
    let state = Rc::new(state);
    if let Some(registry) = registry {
        registry.register(&state);
    }
    let closure = Rc::new(WrappedClosure {
        state,
        registry: registry.map(Rc::downgrade),
    });

    let callee = Rc::clone(&closure);
    HostFunction::new("", move |args| match make_target() {
        Some(target) => invoke(&callee, target.as_ref(), args),
        None => Err(HostValue::error(
            ErrorKind::InternalError,
            "module instance is no longer available",
        )),
    })
    .with_attachment(closure)
}
