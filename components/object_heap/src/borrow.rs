//! Borrow stack.
//!
//! Call-scoped references live in the window below the constants and are
//! pushed downward from `stack_size`. A borrow must be popped, in LIFO order,
//! before the call that pushed it returns, on the error path too.

use crate::error::HeapError;
use crate::handle::Handle;
use crate::heap::{ObjectHeap, Slot};
use core_types::HostValue;

impl ObjectHeap {
    /// Pushes a borrowed reference and returns its handle.
    ///
    /// Fails once the window is full; slot 0 is never used.
    pub fn push_borrow(&mut self, value: HostValue) -> Result<Handle, HeapError> {
        if self.stack_pointer <= 1 {
            return Err(HeapError::BorrowStackExhausted {
                depth: self.layout.stack_size() - self.stack_pointer,
            });
        }
        self.stack_pointer -= 1;
        self.slots[self.stack_pointer as usize] = Slot::Occupied(value);
        tracing::trace!(handle = self.stack_pointer, "borrow pushed");
        Ok(Handle::from_raw(self.stack_pointer))
    }

    /// Pops the most recent borrow and clears its slot.
    ///
    /// # Panics
    ///
    /// Panics if no borrow is outstanding.
    pub fn pop_borrow(&mut self) {
        assert!(
            self.stack_pointer < self.layout.stack_size(),
            "borrow stack underflow"
        );
        let old = std::mem::replace(&mut self.slots[self.stack_pointer as usize], Slot::Vacant);
        tracing::trace!(handle = self.stack_pointer, "borrow popped");
        self.stack_pointer += 1;
        drop(old);
    }

    /// Current borrow stack pointer; equals the window size when empty.
    pub fn stack_pointer(&self) -> u32 {
        self.stack_pointer
    }

    /// Whether `handle` lies in the borrow window.
    pub fn is_borrowed(&self, handle: Handle) -> bool {
        handle.raw() < self.layout.stack_size()
    }
}
