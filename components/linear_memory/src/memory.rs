//! Growable linear memory.
//!
//! The memory owns one backing buffer at a time. Growing allocates a new,
//! larger buffer, copies the contents and detaches the old one: any view
//! still referring to the old buffer then sees a zero-length, detached buffer.

use crate::error::MemoryError;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

/// Size of one memory page in bytes.
pub const PAGE_SIZE: usize = 64 * 1024;

struct BufferData {
    bytes: RefCell<Vec<u8>>,
    detached: Cell<bool>,
}

/// One backing buffer of a [`LinearMemory`].
///
/// Cloning shares the buffer; [`MemoryBuffer::same_buffer`] compares identity.
#[derive(Clone)]
pub struct MemoryBuffer {
    data: Rc<BufferData>,
}

impl MemoryBuffer {
    fn new(size: usize) -> Self {
        MemoryBuffer {
            data: Rc::new(BufferData {
                bytes: RefCell::new(vec![0; size]),
                detached: Cell::new(false),
            }),
        }
    }

    /// Current length; zero once detached.
    pub fn byte_length(&self) -> usize {
        self.data.bytes.borrow().len()
    }

    /// Whether the memory has moved on to a newer buffer.
    pub fn is_detached(&self) -> bool {
        self.data.detached.get()
    }

    /// Identity comparison.
    pub fn same_buffer(&self, other: &MemoryBuffer) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    pub(crate) fn bytes(&self) -> Ref<'_, Vec<u8>> {
        self.data.bytes.borrow()
    }

    pub(crate) fn bytes_mut(&self) -> RefMut<'_, Vec<u8>> {
        self.data.bytes.borrow_mut()
    }

    fn detach(&self) -> Vec<u8> {
        self.data.detached.set(true);
        std::mem::take(&mut *self.data.bytes.borrow_mut())
    }
}

impl std::fmt::Debug for MemoryBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBuffer")
            .field("byte_length", &self.byte_length())
            .field("detached", &self.is_detached())
            .finish()
    }
}

struct MemoryInner {
    buffer: RefCell<MemoryBuffer>,
    maximum_pages: Option<u32>,
    grow_count: Cell<u32>,
}

/// The module's growable memory block.
///
/// Shared between the module (which reads and writes it directly) and the
/// bridge (which accesses it through cached views).
///
/// # Examples
///
/// ```
/// use linear_memory::{LinearMemory, PAGE_SIZE};
///
/// let memory = LinearMemory::new(1, None);
/// let before = memory.buffer();
/// memory.grow(1).unwrap();
///
/// assert!(before.is_detached());
/// assert_eq!(memory.buffer().byte_length(), 2 * PAGE_SIZE);
/// ```
#[derive(Clone)]
pub struct LinearMemory {
    inner: Rc<MemoryInner>,
}

impl LinearMemory {
    /// Creates a memory with `initial_pages` zeroed pages.
    pub fn new(initial_pages: u32, maximum_pages: Option<u32>) -> Self {
        LinearMemory {
            inner: Rc::new(MemoryInner {
                buffer: RefCell::new(MemoryBuffer::new(initial_pages as usize * PAGE_SIZE)),
                maximum_pages,
                grow_count: Cell::new(0),
            }),
        }
    }

    /// The current backing buffer.
    pub fn buffer(&self) -> MemoryBuffer {
        self.inner.buffer.borrow().clone()
    }

    /// Current size in pages.
    pub fn size_pages(&self) -> u32 {
        (self.inner.buffer.borrow().byte_length() / PAGE_SIZE) as u32
    }

    /// Number of successful grow operations so far.
    pub fn grow_count(&self) -> u32 {
        self.inner.grow_count.get()
    }

    /// Grows the memory by `delta` pages and returns the previous page count.
    ///
    /// Always replaces the backing buffer, even for a zero delta.
    pub fn grow(&self, delta: u32) -> Result<u32, MemoryError> {
        let old_pages = self.size_pages();
        let new_pages = old_pages.saturating_add(delta);
        if let Some(maximum) = self.inner.maximum_pages {
            if new_pages > maximum {
                return Err(MemoryError::GrowFailed { delta, maximum });
            }
        }

        let old = self.buffer();
        let mut bytes = old.detach();
        bytes.resize(new_pages as usize * PAGE_SIZE, 0);
        let replacement = MemoryBuffer::new(0);
        *replacement.bytes_mut() = bytes;
        *self.inner.buffer.borrow_mut() = replacement;
        self.inner.grow_count.set(self.inner.grow_count.get() + 1);

        tracing::debug!(old_pages, new_pages, "linear memory grown");
        Ok(old_pages)
    }

    /// Copies `len` bytes starting at `offset` out of memory.
    pub fn read(&self, offset: u32, len: u32) -> Result<Vec<u8>, MemoryError> {
        let buffer = self.buffer();
        let bytes = buffer.bytes();
        let range = checked_range(offset, len, bytes.len())?;
        Ok(bytes[range].to_vec())
    }

    /// Copies `data` into memory at `offset`.
    pub fn write(&self, offset: u32, data: &[u8]) -> Result<(), MemoryError> {
        let buffer = self.buffer();
        let mut bytes = buffer.bytes_mut();
        let range = checked_range(offset, data.len() as u32, bytes.len())?;
        bytes[range].copy_from_slice(data);
        Ok(())
    }
}

impl std::fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearMemory")
            .field("pages", &self.size_pages())
            .field("maximum_pages", &self.inner.maximum_pages)
            .finish()
    }
}

pub(crate) fn checked_range(
    offset: u32,
    len: u32,
    size: usize,
) -> Result<std::ops::Range<usize>, MemoryError> {
    let start = offset as usize;
    let end = start + len as usize;
    if end > size {
        return Err(MemoryError::OutOfBounds { offset, len, size });
    }
    Ok(start..end)
}
