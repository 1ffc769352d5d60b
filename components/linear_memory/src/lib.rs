//! Linear memory access for the module bridge.
//!
//! This component provides:
//! - A growable linear memory whose backing buffer is replaced (and the old
//!   one detached) on every growth
//! - Byte and data views over the current buffer, cached and revalidated
//!   lazily by buffer identity
//! - A UTF-8 text codec that may be missing in a degraded host
//! - String and handle-array marshalling between host and module memory

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod marshal;
pub mod memory;
pub mod view;

pub use codec::{EncodeResult, TextCodec};
pub use error::{EncodingError, MarshalError, MemoryError};
pub use marshal::{MemoryViews, ModuleAllocator, ModuleSlice};
pub use memory::{LinearMemory, MemoryBuffer, PAGE_SIZE};
pub use view::{ByteView, DataView, ViewCache, ViewStats};
