//! Closure adapter - module closures as host-callable functions
//!
//! A module closure is a (context pointer, environment pointer) pair plus an
//! invoke entry and a destructor entry in the module. This component wraps
//! such a pair as a [`HostFunction`](core_types::HostFunction) whose lifetime
//! is reference counted across both sides of the boundary:
//!
//! - every invocation holds one reference for its duration
//! - the module holds one reference until it drops the callback
//! - the destructor runs exactly once, when the count reaches zero
//!
//! A [`FinalizationRegistry`] provides a best-effort safety net: when the
//! host lets go of a wrapper that was never dropped, its destructor is queued.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod adapter;
mod dispatch;
mod finalization;
mod state;

pub use adapter::{invoke, wrap, ClosureTarget, WrappedClosure, INVALID_CLOSURE_MESSAGE};
pub use dispatch::{DestructorTable, DispatchError};
pub use finalization::{FinalizationRegistry, FinalizerRecord};
pub use state::{AdapterSpec, ArgPassing, ClosureFlavor, ClosureState};
