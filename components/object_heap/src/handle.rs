//! Handles and the layout of the handle space.

use std::fmt;

/// Index of a host value in the [`ObjectHeap`](crate::ObjectHeap).
///
/// Crosses the module boundary as a plain `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Wraps a raw handle received from the module.
    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    /// The raw value passed to the module.
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Values with a permanent handle that is never released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// `true`
    True,
    /// `false`
    False,
}

impl Constant {
    pub(crate) const ALL: [Constant; 4] =
        [Constant::Undefined, Constant::Null, Constant::True, Constant::False];

    fn offset(self) -> u32 {
        match self {
            Constant::Undefined => 0,
            Constant::Null => 1,
            Constant::True => 2,
            Constant::False => 3,
        }
    }
}

/// Shape of the handle space.
///
/// # Examples
///
/// ```
/// use object_heap::{Constant, HeapLayout};
///
/// let layout = HeapLayout::default();
/// assert_eq!(layout.constant(Constant::Undefined).raw(), 128);
/// assert_eq!(layout.first_dynamic(), 132);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapLayout {
    stack_size: u32,
}

impl Default for HeapLayout {
    fn default() -> Self {
        HeapLayout { stack_size: 128 }
    }
}

impl HeapLayout {
    /// Largest borrow window a layout accepts.
    pub const MAX_STACK_SIZE: u32 = 1 << 16;

    /// A layout with a borrow window of `stack_size` slots.
    ///
    /// Slot 0 is never handed out, so the window holds `stack_size - 1`
    /// borrows.
    ///
    /// # Panics
    ///
    /// Panics if `stack_size` is zero or above [`HeapLayout::MAX_STACK_SIZE`].
    pub fn new(stack_size: u32) -> Self {
        assert!(
            Self::accepts(stack_size),
            "borrow stack window must hold 1..={} slots, got {stack_size}",
            Self::MAX_STACK_SIZE
        );
        HeapLayout { stack_size }
    }

    /// Whether [`HeapLayout::new`] accepts a window of `stack_size` slots.
    pub fn accepts(stack_size: u32) -> bool {
        (1..=Self::MAX_STACK_SIZE).contains(&stack_size)
    }

    /// Size of the borrow window.
    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }

    /// Handle of a reserved constant.
    pub fn constant(&self, constant: Constant) -> Handle {
        Handle(self.stack_size + constant.offset())
    }

    /// First handle that refers to a releasable heap slot.
    pub fn first_dynamic(&self) -> u32 {
        self.stack_size + Constant::ALL.len() as u32
    }
}
