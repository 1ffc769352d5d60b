//! Moving strings and handle arrays through module memory.
//!
//! Strings cross as a (pointer, length) pair of plain integers, never as a
//! handle. Host to module writes go through the module's allocator; every
//! allocator call may grow memory, so views are fetched again after each one.

use crate::codec::TextCodec;
use crate::error::{MarshalError, MemoryError};
use crate::memory::LinearMemory;
use crate::view::{ByteView, DataView, ViewCache, ViewStats};
use std::cell::RefCell;

/// Allocation entry points exported by the module.
pub trait ModuleAllocator {
    /// Allocates `size` bytes with the given alignment.
    fn malloc(&self, size: u32, align: u32) -> u32;

    /// Resizes an allocation, possibly moving it.
    fn realloc(&self, ptr: u32, old_size: u32, new_size: u32, align: u32) -> u32;

    /// Whether [`ModuleAllocator::realloc`] may be used. Without it strings
    /// are encoded up front and allocated at their exact size.
    fn has_realloc(&self) -> bool {
        true
    }
}

/// A (pointer, length) pair in module memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleSlice {
    /// Start of the data
    pub ptr: u32,
    /// Length in bytes
    pub len: u32,
}

/// Memory of one module instance together with its view cache and codec.
///
/// Methods borrow the cache only for the duration of a single view lookup,
/// so module code running in between (allocators, callbacks) never observes
/// an outstanding borrow.
#[derive(Debug)]
pub struct MemoryViews {
    memory: LinearMemory,
    cache: RefCell<ViewCache>,
    codec: TextCodec,
}

impl MemoryViews {
    /// Binds a memory with an empty cache.
    pub fn new(memory: LinearMemory, codec: TextCodec) -> Self {
        MemoryViews {
            memory,
            cache: RefCell::new(ViewCache::new()),
            codec,
        }
    }

    /// The bound memory.
    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    /// The codec used for strings.
    pub fn codec(&self) -> TextCodec {
        self.codec
    }

    /// Current byte view, revalidated against the memory.
    pub fn bytes(&self) -> ByteView {
        self.cache.borrow_mut().byte_view(&self.memory)
    }

    /// Current data view, revalidated against the memory.
    pub fn data(&self) -> DataView {
        self.cache.borrow_mut().data_view(&self.memory)
    }

    /// Drops both cached views.
    pub fn reset(&self) {
        self.cache.borrow_mut().reset();
    }

    /// How many views have been built so far.
    pub fn stats(&self) -> ViewStats {
        self.cache.borrow().stats()
    }

    /// Decodes the UTF-8 string at `ptr..ptr + len`.
    pub fn read_string(&self, ptr: u32, len: u32) -> Result<String, MarshalError> {
        let bytes = self.bytes().read(ptr, len)?;
        Ok(self.codec.decode(&bytes)?)
    }

    /// Reads `len` little-endian u32 handles starting at `ptr`.
    pub fn read_handles(&self, ptr: u32, len: u32) -> Result<Vec<u32>, MemoryError> {
        let view = self.data();
        (0..len)
            .map(|i| {
                let delta = i.checked_mul(4).unwrap_or(u32::MAX);
                view.get_u32(view.field_offset(ptr, delta)?)
            })
            .collect()
    }

    /// Copies `text` into freshly allocated module memory.
    ///
    /// With a reallocator the ASCII prefix is stored byte by byte into an
    /// allocation sized for the all-ASCII case; the first non-ASCII character
    /// grows the allocation to the worst case for the remainder, the rest is
    /// encoded in one go, and the allocation is shrunk to what was written.
    ///
    /// # Examples
    ///
    /// ```
    /// use linear_memory::{LinearMemory, MemoryViews, ModuleAllocator, TextCodec};
    /// use std::cell::Cell;
    ///
    /// struct Bump(Cell<u32>);
    /// impl ModuleAllocator for Bump {
    ///     fn malloc(&self, size: u32, _align: u32) -> u32 {
    ///         let ptr = self.0.get();
    ///         self.0.set(ptr + size);
    ///         ptr
    ///     }
    ///     fn realloc(&self, ptr: u32, _old: u32, new: u32, _align: u32) -> u32 {
    ///         self.0.set(ptr + new);
    ///         ptr
    ///     }
    /// }
    ///
    /// let views = MemoryViews::new(LinearMemory::new(1, None), TextCodec::utf8());
    /// let slice = views.write_string("héllo", &Bump(Cell::new(8))).unwrap();
    /// assert_eq!(slice.len, 6);
    /// assert_eq!(views.read_string(slice.ptr, slice.len).unwrap(), "héllo");
    /// ```
    pub fn write_string(
        &self,
        text: &str,
        alloc: &dyn ModuleAllocator,
    ) -> Result<ModuleSlice, MarshalError> {
        if !alloc.has_realloc() {
            let encoded = self.codec.encode(text)?;
            let len = encoded.len() as u32;
            let ptr = alloc.malloc(len, 1);
            self.bytes().write(ptr, &encoded)?;
            return Ok(ModuleSlice { ptr, len });
        }

        let mut len = text.encode_utf16().count() as u32;
        let mut ptr = alloc.malloc(len, 1);

        let ascii = text.bytes().take_while(|b| *b <= 0x7f).count();
        self.bytes().write(ptr, &text.as_bytes()[..ascii])?;
        let mut offset = ascii as u32;

        if offset != len {
            let rest = &text[ascii..];
            let new_len = offset + rest.encode_utf16().count() as u32 * 3;
            ptr = alloc.realloc(ptr, len, new_len, 1);
            len = new_len;

            let codec = self.codec;
            let result = self
                .bytes()
                .with_subarray(ptr + offset, len - offset, |dest| codec.encode_into(rest, dest))??;
            offset += result.written as u32;
            ptr = alloc.realloc(ptr, len, offset, 1);
        }

        Ok(ModuleSlice { ptr, len: offset })
    }
}
