//! Host promises.
//!
//! Asynchronous host operations hand the module a promise handle. The module
//! subscribes with `then`, usually passing a single-shot closure, and the
//! reaction runs as a microtask once the host settles the promise.

use crate::event_loop::EventLoop;
use crate::task_queue::MicroTask;
use core_types::{ErrorKind, HostFunction, HostValue};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// The state of a Promise.
///
/// Once settled (Fulfilled or Rejected), a Promise cannot change state.
#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    /// Neither fulfilled nor rejected yet
    Pending,
    /// Resolved with a value
    Fulfilled(HostValue),
    /// Rejected with a reason
    Rejected(HostValue),
}

/// Handlers registered through [`Promise::then`].
#[derive(Debug)]
pub struct PromiseReaction {
    /// Promise settled with the handler's outcome
    pub derived: Promise,
    /// Handler for fulfilled state
    pub on_fulfilled: Option<HostFunction>,
    /// Handler for rejected state
    pub on_rejected: Option<HostFunction>,
}

impl PromiseReaction {
    fn run(self, settled: PromiseState) {
        let (handler, value, fulfilled) = match settled {
            PromiseState::Fulfilled(value) => (self.on_fulfilled, value, true),
            PromiseState::Rejected(reason) => (self.on_rejected, reason, false),
            PromiseState::Pending => return,
        };
        match handler {
            Some(handler) => match handler.call(&[value]) {
                Ok(result) => self.derived.resolve(result),
                Err(thrown) => self.derived.reject(thrown),
            },
            None if fulfilled => self.derived.resolve(value),
            None => self.derived.reject(value),
        }
    }
}

#[derive(Debug)]
struct PromiseInner {
    state: PromiseState,
    // set once resolve was called, even while adopting another promise
    resolved: bool,
    reactions: Vec<PromiseReaction>,
    event_loop: Weak<EventLoop>,
}

/// A host Promise.
///
/// Cloning aliases the same promise.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Promise, PromiseState};
/// use core_types::{HostFunction, HostValue};
/// use std::rc::Rc;
///
/// let event_loop = Rc::new(EventLoop::new());
/// let promise = Promise::new(&event_loop);
/// let doubled = promise.then(
///     Some(HostFunction::new("double", |args| {
///         Ok(HostValue::Number(args[0].as_f64().unwrap_or(0.0) * 2.0))
///     })),
///     None,
/// );
///
/// promise.resolve(HostValue::Number(21.0));
/// event_loop.run_until_done().unwrap();
/// assert_eq!(doubled.state(), PromiseState::Fulfilled(HostValue::Number(42.0)));
/// ```
#[derive(Debug, Clone)]
pub struct Promise {
    inner: Rc<RefCell<PromiseInner>>,
}

impl Promise {
    /// Creates a pending promise whose reactions run on `event_loop`.
    pub fn new(event_loop: &Rc<EventLoop>) -> Self {
        Self::with_loop(Rc::downgrade(event_loop))
    }

    fn with_loop(event_loop: Weak<EventLoop>) -> Self {
        Promise {
            inner: Rc::new(RefCell::new(PromiseInner {
                state: PromiseState::Pending,
                resolved: false,
                reactions: Vec::new(),
                event_loop,
            })),
        }
    }

    /// Current state.
    pub fn state(&self) -> PromiseState {
        self.inner.borrow().state.clone()
    }

    /// Whether the promise has not settled yet.
    pub fn is_pending(&self) -> bool {
        matches!(self.inner.borrow().state, PromiseState::Pending)
    }

    /// Number of reactions waiting for settlement.
    pub fn pending_reactions(&self) -> usize {
        self.inner.borrow().reactions.len()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resolves the promise. Resolving with another promise adopts its
    /// eventual state. Ignored once resolved.
    pub fn resolve(&self, value: HostValue) {
        if self.inner.borrow().resolved {
            return;
        }
        self.inner.borrow_mut().resolved = true;

        if let Some(other) = Promise::from_host_value(&value) {
            if other.ptr_eq(self) {
                self.settle(PromiseState::Rejected(HostValue::error(
                    ErrorKind::TypeError,
                    "Chaining cycle detected for promise",
                )));
                return;
            }
            let (on_fulfilled, on_rejected) = self.settling_functions();
            other.then(Some(on_fulfilled), Some(on_rejected));
            return;
        }
        self.settle(PromiseState::Fulfilled(value));
    }

    /// Rejects the promise. Ignored once resolved.
    pub fn reject(&self, reason: HostValue) {
        if self.inner.borrow().resolved {
            return;
        }
        self.inner.borrow_mut().resolved = true;
        self.settle(PromiseState::Rejected(reason));
    }

    /// Registers handlers and returns the promise settled with their outcome.
    pub fn then(
        &self,
        on_fulfilled: Option<HostFunction>,
        on_rejected: Option<HostFunction>,
    ) -> Promise {
        let derived = Promise::with_loop(self.inner.borrow().event_loop.clone());
        let reaction = PromiseReaction {
            derived: derived.clone(),
            on_fulfilled,
            on_rejected,
        };

        let state = self.state();
        match state {
            PromiseState::Pending => self.inner.borrow_mut().reactions.push(reaction),
            settled => self.schedule(reaction, settled),
        }
        derived
    }

    /// Wraps the promise as a host value.
    pub fn to_host_value(&self) -> HostValue {
        HostValue::native("Promise", Rc::clone(&self.inner))
    }

    /// Recovers a promise from a host value created by
    /// [`Promise::to_host_value`].
    pub fn from_host_value(value: &HostValue) -> Option<Promise> {
        match value {
            HostValue::Native(native) if native.class_name == "Promise" => native
                .data
                .clone()
                .downcast::<RefCell<PromiseInner>>()
                .ok()
                .map(|inner| Promise { inner }),
            _ => None,
        }
    }

    fn settle(&self, state: PromiseState) {
        let reactions = {
            let mut inner = self.inner.borrow_mut();
            inner.state = state.clone();
            std::mem::take(&mut inner.reactions)
        };
        for reaction in reactions {
            self.schedule(reaction, state.clone());
        }
    }

    fn settling_functions(&self) -> (HostFunction, HostFunction) {
        let target = self.clone();
        let fulfill = HostFunction::new("", move |args| {
            let value = args.first().cloned().unwrap_or(HostValue::Undefined);
            target.settle(PromiseState::Fulfilled(value));
            Ok(HostValue::Undefined)
        });
        let target = self.clone();
        let reject = HostFunction::new("", move |args| {
            let reason = args.first().cloned().unwrap_or(HostValue::Undefined);
            target.settle(PromiseState::Rejected(reason));
            Ok(HostValue::Undefined)
        });
        (fulfill, reject)
    }

    fn schedule(&self, reaction: PromiseReaction, settled: PromiseState) {
        let event_loop = self.inner.borrow().event_loop.upgrade();
        match event_loop {
            Some(event_loop) => event_loop.enqueue_microtask(MicroTask::new(move || {
                reaction.run(settled);
                Ok(HostValue::Undefined)
            })),
            None => tracing::debug!("event loop gone, promise reaction dropped"),
        }
    }
}
