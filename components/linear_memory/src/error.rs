//! Error types for memory access and text encoding.

use thiserror::Error;

/// Errors raised by views over linear memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Access outside the current buffer
    #[error("memory access out of bounds: offset {offset} + {len} exceeds {size} bytes")]
    OutOfBounds {
        /// Start of the access
        offset: u32,
        /// Length of the access
        len: u32,
        /// Size of the buffer at the time of the access
        size: usize,
    },
    /// Growth past the declared maximum
    #[error("cannot grow memory by {delta} pages: maximum is {maximum} pages")]
    GrowFailed {
        /// Requested additional pages
        delta: u32,
        /// Declared maximum page count
        maximum: u32,
    },
}

/// Errors raised by the text codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The host provides no codec of this kind
    #[error("{0} not available")]
    Unavailable(&'static str),
    /// Bytes are not valid UTF-8 (the decoder is fatal)
    #[error("The encoded data was not valid for encoding utf-8 at byte {valid_up_to}")]
    InvalidUtf8 {
        /// Length of the valid prefix
        valid_up_to: usize,
    },
}

/// Errors raised while marshalling values through memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    /// Memory access failed
    #[error(transparent)]
    Memory(#[from] MemoryError),
    /// Encoding or decoding failed
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}
