// Licensed under the Apache-2.0 license

//! Page-granular programming buffer.
//!
//! Flash is programmed a page at a time, while the host streams single
//! bytes. [`PageBuffer`] keeps one page in RAM: selecting an address loads the
//! page that contains it, bytes are read and written in the working copy, and
//! the page is written back on `flush()` or when the position runs off the end
//! of the page. The store behind it only has to move whole pages.

use core::fmt::Debug;

use super::ProgrammingBuffer;

/// Whole-page access to the memory being programmed.
pub trait PageStore {
    type Error: Debug;

    /// Fill `page` with the contents starting at byte address `base`.
    fn read_page(&mut self, base: u16, page: &mut [u8]) -> Result<(), Self::Error>;

    /// Program `page` at byte address `base`, erasing first if needed.
    fn write_page(&mut self, base: u16, page: &[u8]) -> Result<(), Self::Error>;
}

/// An adapter that exposes a [`PageStore`] as a byte-streaming
/// [`ProgrammingBuffer`].
pub struct PageBuffer<S: PageStore, const PAGE: usize> {
    /// The underlying page store.
    store: S,
    /// Working copy of the current page.
    page: [u8; PAGE],
    /// Byte address of `page[0]`.
    base: u16,
    /// Offset of the next byte within `page`.
    offset: usize,
    loaded: bool,
    dirty: bool,
    /// The stream ran past the top of the address space.
    exhausted: bool,
    /// Pages reaching this address or beyond are never written.
    protected_from: Option<u16>,
    rejected_writes: u16,
    store_errors: u16,
    last_error: Option<S::Error>,
}

impl<S: PageStore, const PAGE: usize> PageBuffer<S, PAGE> {
    /// Creates a new `PageBuffer` over `store`. Nothing is loaded until the
    /// first access.
    pub fn new(store: S) -> Self {
        const { assert!(PAGE > 0 && PAGE <= 0x1_0000) };
        Self {
            store,
            page: [0xFF; PAGE],
            base: 0,
            offset: 0,
            loaded: false,
            dirty: false,
            exhausted: false,
            protected_from: None,
            rejected_writes: 0,
            store_errors: 0,
            last_error: None,
        }
    }

    /// Refuse writes to any page that reaches `boundary` or beyond, such as
    /// the section the bootloader itself runs from.
    #[must_use]
    pub fn with_protected_from(mut self, boundary: u16) -> Self {
        self.protected_from = Some(boundary);
        self
    }

    /// Byte address the next `get_byte`/`set_byte` operates on.
    pub fn position(&self) -> u16 {
        let offset = u16::try_from(self.offset).unwrap_or(u16::MAX);
        self.base.wrapping_add(offset)
    }

    pub fn page_base(&self) -> u16 {
        self.base
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True once the position has run off the last page. Writes are then
    /// rejected and reads return `0xFF` until the next `set_address`.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Bytes dropped because they targeted a protected page.
    pub fn rejected_writes(&self) -> u16 {
        self.rejected_writes
    }

    /// Failed page reads and writes.
    pub fn store_errors(&self) -> u16 {
        self.store_errors
    }

    pub fn last_error(&self) -> Option<&S::Error> {
        self.last_error.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn page_base_of(address: u16) -> u16 {
        let address = usize::from(address);
        u16::try_from(address - address % PAGE).unwrap_or(0)
    }

    fn is_protected(&self) -> bool {
        self.protected_from
            .is_some_and(|boundary| usize::from(self.base) + PAGE > usize::from(boundary))
    }

    fn record_error(&mut self, err: S::Error) {
        self.store_errors = self.store_errors.saturating_add(1);
        self.last_error = Some(err);
    }

    fn load(&mut self, base: u16) {
        self.base = base;
        self.loaded = true;
        self.dirty = false;
        self.exhausted = false;
        if let Err(err) = self.store.read_page(base, &mut self.page) {
            // Present an erased page rather than stale contents.
            self.page.fill(0xFF);
            self.record_error(err);
        }
    }

    fn ensure_loaded(&mut self) {
        if !self.loaded {
            self.load(self.base);
        }
    }

    fn commit(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        if let Err(err) = self.store.write_page(self.base, &self.page) {
            self.record_error(err);
        }
    }

    fn advance(&mut self) {
        self.offset += 1;
        if self.offset >= PAGE {
            self.commit();
            match u16::try_from(usize::from(self.base) + PAGE) {
                Ok(next) => {
                    self.load(next);
                    self.offset = 0;
                }
                // No page follows the top one.
                Err(_) => self.exhausted = true,
            }
        }
    }
}

impl<S: PageStore, const PAGE: usize> ProgrammingBuffer for PageBuffer<S, PAGE> {
    fn set_address(&mut self, address: u16) {
        let base = Self::page_base_of(address);
        if !self.loaded || self.exhausted || base != self.base {
            self.commit();
            self.load(base);
        }
        self.offset = usize::from(address - base);
    }

    fn set_byte(&mut self, value: u8) {
        self.ensure_loaded();
        if self.exhausted {
            self.rejected_writes = self.rejected_writes.saturating_add(1);
            return;
        }
        if self.is_protected() {
            self.rejected_writes = self.rejected_writes.saturating_add(1);
        } else if let Some(slot) = self.page.get_mut(self.offset) {
            *slot = value;
            self.dirty = true;
        }
        self.advance();
    }

    fn get_byte(&mut self) -> u8 {
        self.ensure_loaded();
        if self.exhausted {
            return 0xFF;
        }
        let value = self.page.get(self.offset).copied().unwrap_or(0xFF);
        self.advance();
        value
    }

    fn flush(&mut self) {
        self.commit();
    }
}

/// Errors reported by [`MemoryPageStore`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryStoreError {
    /// The page does not lie entirely inside the store.
    OutOfBounds,
}

/// RAM-backed [`PageStore`] standing in for flash during host simulation.
pub struct MemoryPageStore<const SIZE: usize> {
    memory: [u8; SIZE],
    pages_written: usize,
}

impl<const SIZE: usize> Default for MemoryPageStore<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> MemoryPageStore<SIZE> {
    /// An erased store (all bytes `0xFF`).
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: [0xFF; SIZE],
            pages_written: 0,
        }
    }

    /// A store whose first bytes hold `image`; the remainder is erased.
    #[must_use]
    pub fn with_image(image: &[u8]) -> Self {
        let mut store = Self::new();
        for (dst, src) in store.memory.iter_mut().zip(image) {
            *dst = *src;
        }
        store
    }

    pub fn contents(&self) -> &[u8] {
        &self.memory
    }

    pub fn pages_written(&self) -> usize {
        self.pages_written
    }

    fn span(base: u16, len: usize) -> Result<core::ops::Range<usize>, MemoryStoreError> {
        let start = usize::from(base);
        let end = start + len;
        if end > SIZE {
            return Err(MemoryStoreError::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl<const SIZE: usize> PageStore for MemoryPageStore<SIZE> {
    type Error = MemoryStoreError;

    fn read_page(&mut self, base: u16, page: &mut [u8]) -> Result<(), Self::Error> {
        let src = self
            .memory
            .get(Self::span(base, page.len())?)
            .ok_or(MemoryStoreError::OutOfBounds)?;
        page.copy_from_slice(src);
        Ok(())
    }

    fn write_page(&mut self, base: u16, page: &[u8]) -> Result<(), Self::Error> {
        let dst = self
            .memory
            .get_mut(Self::span(base, page.len())?)
            .ok_or(MemoryStoreError::OutOfBounds)?;
        dst.copy_from_slice(page);
        self.pages_written += 1;
        Ok(())
    }
}
