//! Error types for the object heap.

use thiserror::Error;

/// Recoverable-by-unwinding heap failures.
///
/// Misuse of handles (stale dereference, double release, unbalanced pops)
/// is not represented here: it panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    /// Too many nested borrows; the current call chain cannot continue
    #[error("out of borrow stack: {depth} nested borrows")]
    BorrowStackExhausted {
        /// Number of borrows outstanding when the push failed
        depth: u32,
    },
}
