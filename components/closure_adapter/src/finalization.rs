//! Finalizer safety net for closures the module never released.
//!
//! Follows the cleanup-queue model: dropping a wrapper only records what has
//! to be destroyed, and the owner drains the queue at a point where running
//! module code is safe.

use crate::state::ClosureState;
use std::cell::{Cell, RefCell};

/// A pending destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizerRecord {
    /// Index into the module's destructor table
    pub destructor: u32,
    /// Context pointer at the time the wrapper was dropped
    pub context: u32,
    /// Environment pointer
    pub env: u32,
}

/// Tracks registered closures and queues destructions for dropped wrappers.
#[derive(Debug)]
pub struct FinalizationRegistry {
    enabled: bool,
    registered: Cell<usize>,
    cleanup_queue: RefCell<Vec<FinalizerRecord>>,
}

impl FinalizationRegistry {
    /// Creates a registry. A disabled registry accepts registrations but never
    /// queues anything.
    pub fn new(enabled: bool) -> Self {
        FinalizationRegistry {
            enabled,
            registered: Cell::new(0),
            cleanup_queue: RefCell::new(Vec::new()),
        }
    }

    /// Whether the safety net is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of closures currently covered.
    pub fn registered(&self) -> usize {
        self.registered.get()
    }

    /// Number of queued destructions.
    pub fn pending(&self) -> usize {
        self.cleanup_queue.borrow().len()
    }

    pub(crate) fn register(&self, state: &ClosureState) {
        if !self.enabled || state.registered.get() {
            return;
        }
        state.registered.set(true);
        self.registered.set(self.registered.get() + 1);
    }

    pub(crate) fn unregister(&self, state: &ClosureState) {
        if state.registered.replace(false) {
            self.registered.set(self.registered.get() - 1);
        }
    }

    /// Queues the destruction of a closure whose wrapper was dropped while
    /// still live. The closure counts as destroyed from here on.
    pub(crate) fn enqueue(&self, state: &ClosureState) {
        if !state.registered.get() || state.destroyed.get() {
            return;
        }
        self.unregister(state);
        state.destroyed.set(true);
        let record = FinalizerRecord {
            destructor: state.spec.destructor,
            context: state.context.replace(0),
            env: state.env,
        };
        tracing::debug!(
            destructor = record.destructor,
            env = record.env,
            "closure finalizer queued"
        );
        self.cleanup_queue.borrow_mut().push(record);
    }

    /// Takes every queued record, oldest first.
    pub fn drain(&self) -> Vec<FinalizerRecord> {
        std::mem::take(&mut *self.cleanup_queue.borrow_mut())
    }
}

impl Default for FinalizationRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}
