//! Object heap - handle table for host values
//!
//! The module cannot hold host values directly; it holds small integer
//! handles into this table instead. The handle space is laid out as:
//!
//! ```text
//! 0 .. stack_size            borrow stack window (grows downward)
//! stack_size .. +4           constants: undefined, null, true, false
//! stack_size + 4 ..          heap slots, recycled through a free list
//! ```
//!
//! This component provides:
//! - [`ObjectHeap`] - the slot table with `acquire`/`get`/`release`/`clone`
//! - The borrow stack (`push_borrow`/`pop_borrow`) for call-scoped references
//! - [`Handle`] and [`Constant`] - the handle type and the reserved constants

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod borrow;
mod error;
mod handle;
mod heap;

pub use error::HeapError;
pub use handle::{Constant, Handle, HeapLayout};
pub use heap::{HeapStats, ObjectHeap};
