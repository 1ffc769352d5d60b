//! Slot table with an intrusive free list.
//!
//! Freed slots store the index of the next free slot. The list ends in a
//! sentinel equal to the current slot count, which means "append a new slot".
//! Acquire always pops the free list before growing the table.

use crate::handle::{Constant, Handle, HeapLayout};
use core_types::HostValue;

#[derive(Debug, Clone)]
pub(crate) enum Slot {
    /// Unused borrow-stack slot
    Vacant,
    /// Free heap slot linking to the next free index
    Free(u32),
    /// Live value
    Occupied(HostValue),
}

/// Counters describing the heap, for tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Releasable handles currently live
    pub live: usize,
    /// Slots on the free list
    pub free: usize,
    /// Total slot count, including the borrow window and constants
    pub slots: usize,
    /// Borrows currently pushed
    pub borrowed: u32,
}

/// The handle table.
///
/// # Examples
///
/// ```
/// use core_types::HostValue;
/// use object_heap::ObjectHeap;
///
/// let mut heap = ObjectHeap::new();
/// let handle = heap.acquire(HostValue::string("hi"));
/// assert_eq!(heap.get(handle), HostValue::string("hi"));
///
/// heap.release(handle);
/// assert_eq!(heap.stats().live, 0);
/// ```
#[derive(Debug)]
pub struct ObjectHeap {
    pub(crate) layout: HeapLayout,
    pub(crate) slots: Vec<Slot>,
    next_free: u32,
    live: usize,
    pub(crate) stack_pointer: u32,
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectHeap {
    /// Creates a heap with the default layout (128-slot borrow window).
    pub fn new() -> Self {
        Self::with_layout(HeapLayout::default())
    }

    /// Creates a heap with the given layout.
    pub fn with_layout(layout: HeapLayout) -> Self {
        let mut slots = vec![Slot::Vacant; layout.stack_size() as usize];
        slots.extend([
            Slot::Occupied(HostValue::Undefined),
            Slot::Occupied(HostValue::Null),
            Slot::Occupied(HostValue::Boolean(true)),
            Slot::Occupied(HostValue::Boolean(false)),
        ]);
        let next_free = slots.len() as u32;
        ObjectHeap {
            layout,
            slots,
            next_free,
            live: 0,
            stack_pointer: layout.stack_size(),
        }
    }

    /// The layout of the handle space.
    pub fn layout(&self) -> HeapLayout {
        self.layout
    }

    /// Reserves capacity for at least `additional` more handles.
    pub fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
    }

    /// Handle of a reserved constant.
    pub fn constant(&self, constant: Constant) -> Handle {
        self.layout.constant(constant)
    }

    /// Stores `value` and returns a new handle to it.
    pub fn acquire(&mut self, value: HostValue) -> Handle {
        if self.next_free as usize == self.slots.len() {
            self.slots.push(Slot::Free(self.next_free + 1));
        }
        let index = self.next_free;
        self.next_free = match self.slots[index as usize] {
            Slot::Free(next) => next,
            ref other => panic!("free list corrupted: slot {} is {:?}", index, other),
        };
        self.slots[index as usize] = Slot::Occupied(value);
        self.live += 1;
        tracing::trace!(handle = index, "handle acquired");
        Handle::from_raw(index)
    }

    /// The value behind `handle`.
    ///
    /// # Panics
    ///
    /// Panics if the handle is not live (already released, never issued, or
    /// an unused borrow slot).
    pub fn get(&self, handle: Handle) -> HostValue {
        match self.slots.get(handle.index()) {
            Some(Slot::Occupied(value)) => value.clone(),
            _ => panic!("use of stale handle {}", handle),
        }
    }

    /// Whether `handle` currently refers to a value.
    pub fn is_live(&self, handle: Handle) -> bool {
        matches!(self.slots.get(handle.index()), Some(Slot::Occupied(_)))
    }

    /// Returns the slot behind `handle` to the free list.
    ///
    /// Constants and borrow-window handles are ignored: they are never owned
    /// by the caller.
    ///
    /// # Panics
    ///
    /// Panics on double release.
    pub fn release(&mut self, handle: Handle) {
        if handle.raw() < self.layout.first_dynamic() {
            return;
        }
        let index = handle.index();
        match self.slots.get(index) {
            Some(Slot::Occupied(_)) => {}
            _ => panic!("release of stale handle {}", handle),
        }
        // Dropping the value may run host code; keep it alive until the slot
        // is consistent again.
        let old = std::mem::replace(&mut self.slots[index], Slot::Free(self.next_free));
        self.next_free = handle.raw();
        self.live -= 1;
        tracing::trace!(handle = handle.raw(), "handle released");
        drop(old);
    }

    /// Reads and releases in one step.
    pub fn take(&mut self, handle: Handle) -> HostValue {
        let value = self.get(handle);
        self.release(handle);
        value
    }

    /// Issues a second, independently releasable handle to the same value.
    pub fn clone_handle(&mut self, handle: Handle) -> Handle {
        let value = self.get(handle);
        self.acquire(value)
    }

    /// Current counters.
    pub fn stats(&self) -> HeapStats {
        let mut free = 0;
        let mut cursor = self.next_free as usize;
        while let Some(Slot::Free(next)) = self.slots.get(cursor) {
            free += 1;
            cursor = *next as usize;
        }
        HeapStats {
            live: self.live,
            free,
            slots: self.slots.len(),
            borrowed: self.layout.stack_size() - self.stack_pointer,
        }
    }
}
