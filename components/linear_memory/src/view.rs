//! Typed views over linear memory and their cache.
//!
//! A view is bound to the buffer that was current when it was created. The
//! cache hands out the same view until that buffer is detached or replaced,
//! and only then builds a new one. Validity is checked on access, so a growth
//! that nobody announced is still picked up.

use crate::error::MemoryError;
use crate::memory::{checked_range, LinearMemory, MemoryBuffer};

/// Byte-addressed view (`Uint8Array` over the whole buffer).
#[derive(Clone, Debug)]
pub struct ByteView {
    buffer: MemoryBuffer,
}

impl ByteView {
    /// Creates a view over `buffer`.
    pub fn new(buffer: MemoryBuffer) -> Self {
        ByteView { buffer }
    }

    /// Length of the underlying buffer; zero once detached.
    pub fn byte_length(&self) -> usize {
        self.buffer.byte_length()
    }

    /// The buffer this view is bound to.
    pub fn buffer(&self) -> &MemoryBuffer {
        &self.buffer
    }

    /// Reads one byte.
    pub fn get(&self, offset: u32) -> Result<u8, MemoryError> {
        let bytes = self.buffer.bytes();
        let range = checked_range(offset, 1, bytes.len())?;
        Ok(bytes[range.start])
    }

    /// Copies a range out of the view.
    pub fn read(&self, offset: u32, len: u32) -> Result<Vec<u8>, MemoryError> {
        let bytes = self.buffer.bytes();
        let range = checked_range(offset, len, bytes.len())?;
        Ok(bytes[range].to_vec())
    }

    /// Copies `data` into the view at `offset`.
    pub fn write(&self, offset: u32, data: &[u8]) -> Result<(), MemoryError> {
        let mut bytes = self.buffer.bytes_mut();
        let range = checked_range(offset, data.len() as u32, bytes.len())?;
        bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Runs `f` over a mutable subrange (`subarray(offset, offset + len)`).
    pub fn with_subarray<R>(
        &self,
        offset: u32,
        len: u32,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, MemoryError> {
        let mut bytes = self.buffer.bytes_mut();
        let range = checked_range(offset, len, bytes.len())?;
        Ok(f(&mut bytes[range]))
    }
}

/// Word-addressed view (`DataView`), little endian.
#[derive(Clone, Debug)]
pub struct DataView {
    buffer: MemoryBuffer,
}

macro_rules! data_view_accessors {
    ($($get:ident, $set:ident, $ty:ty;)*) => {
        $(
            #[doc = concat!("Reads a little-endian `", stringify!($ty), "`.")]
            pub fn $get(&self, offset: u32) -> Result<$ty, MemoryError> {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                let bytes = self.buffer.bytes();
                let range = checked_range(offset, raw.len() as u32, bytes.len())?;
                raw.copy_from_slice(&bytes[range]);
                Ok(<$ty>::from_le_bytes(raw))
            }

            #[doc = concat!("Writes a little-endian `", stringify!($ty), "`.")]
            pub fn $set(&self, offset: u32, value: $ty) -> Result<(), MemoryError> {
                let raw = value.to_le_bytes();
                let mut bytes = self.buffer.bytes_mut();
                let range = checked_range(offset, raw.len() as u32, bytes.len())?;
                bytes[range].copy_from_slice(&raw);
                Ok(())
            }
        )*
    };
}

impl DataView {
    /// Creates a view over `buffer`.
    pub fn new(buffer: MemoryBuffer) -> Self {
        DataView { buffer }
    }

    /// The buffer this view is bound to.
    pub fn buffer(&self) -> &MemoryBuffer {
        &self.buffer
    }

    /// Offset of a field `delta` bytes past `base`; out of bounds when the
    /// sum leaves the 32-bit address space.
    pub fn field_offset(&self, base: u32, delta: u32) -> Result<u32, MemoryError> {
        base.checked_add(delta).ok_or_else(|| MemoryError::OutOfBounds {
            offset: base,
            len: delta,
            size: self.buffer.byte_length(),
        })
    }

    data_view_accessors! {
        get_u32, set_u32, u32;
        get_i32, set_i32, i32;
        get_u64, set_u64, u64;
        get_f64, set_f64, f64;
    }
}

/// How many views the cache has built, for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewStats {
    /// Byte views created
    pub byte_views: u32,
    /// Data views created
    pub data_views: u32,
}

/// Lazily created, lazily revalidated views.
#[derive(Debug, Default)]
pub struct ViewCache {
    bytes: Option<ByteView>,
    data: Option<DataView>,
    stats: ViewStats,
}

impl ViewCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached byte view, rebuilt if its buffer has become zero-length.
    pub fn byte_view(&mut self, memory: &LinearMemory) -> ByteView {
        match &self.bytes {
            Some(view) if view.byte_length() != 0 => view.clone(),
            _ => {
                let view = ByteView::new(memory.buffer());
                self.stats.byte_views += 1;
                tracing::trace!(byte_length = view.byte_length(), "byte view created");
                self.bytes = Some(view.clone());
                view
            }
        }
    }

    /// The cached data view, rebuilt if its buffer was detached or replaced.
    pub fn data_view(&mut self, memory: &LinearMemory) -> DataView {
        match &self.data {
            Some(view)
                if !view.buffer().is_detached() && view.buffer().same_buffer(&memory.buffer()) =>
            {
                view.clone()
            }
            _ => {
                let view = DataView::new(memory.buffer());
                self.stats.data_views += 1;
                tracing::trace!("data view created");
                self.data = Some(view.clone());
                view
            }
        }
    }

    /// Forgets both views.
    pub fn reset(&mut self) {
        self.bytes = None;
        self.data = None;
    }

    /// Creation counters.
    pub fn stats(&self) -> ViewStats {
        self.stats
    }
}
