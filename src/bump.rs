use std::{cell::Cell, ptr::NonNull};

use crate::{
  align::{AlignmentStrategy, alignment_offset},
  descriptor::MemoryBlockDescriptor,
};

/// Bump-pointer allocation out of a single contiguous buffer.
///
/// ```text
///   buffer.address()                                   buffer.size()
///   │                                                             │
///   ▼                                                             ▼
///   ┌─────┬──┬─────────┬───┬──────┬─────────────────────────────────┐
///   │ A1  │░░│   A2    │░░░│  A3  │           free space            │
///   └─────┴──┴─────────┴───┴──────┴─────────────────────────────────┘
///                                 ▲
///                               cursor          ░ = alignment padding
/// ```
///
/// The manager never owns its buffer; installing and freeing buffers is the
/// caller's business.
pub struct BufferManager {
  buffer: Cell<MemoryBlockDescriptor>,
  cursor: Cell<usize>,
  strategy: AlignmentStrategy,
}

impl BufferManager {
  pub fn new(strategy: AlignmentStrategy) -> Self {
    Self::with_buffer(MemoryBlockDescriptor::null(), strategy)
  }

  pub fn with_buffer(
    buffer: MemoryBlockDescriptor,
    strategy: AlignmentStrategy,
  ) -> Self {
    Self {
      buffer: Cell::new(buffer),
      cursor: Cell::new(0),
      strategy,
    }
  }

  #[inline]
  pub fn buffer(&self) -> MemoryBlockDescriptor {
    self.buffer.get()
  }

  #[inline]
  pub fn cursor(&self) -> usize {
    self.cursor.get()
  }

  #[inline]
  pub fn alignment_strategy(&self) -> AlignmentStrategy {
    self.strategy
  }

  #[inline]
  pub fn remaining(&self) -> usize {
    self.buffer.get().size() - self.cursor.get()
  }

  /// Padding needed before a `size`-byte allocation at the cursor.
  #[inline]
  fn padding_for(
    &self,
    size: usize,
  ) -> usize {
    let next = self.buffer.get().address() as usize + self.cursor.get();
    alignment_offset(next, self.strategy.alignment_for(size))
  }

  /// Whether `allocate_raw(size)` would succeed.
  pub fn has_sufficient_capacity(
    &self,
    size: usize,
  ) -> bool {
    if self.buffer.get().is_null() {
      return false;
    }
    self
      .padding_for(size)
      .checked_add(size)
      .is_some_and(|needed| needed <= self.remaining())
  }

  /// Carves `size` bytes, aligned per the strategy, out of the buffer.
  /// Returns `None` when the remaining space cannot hold the request.
  #[inline]
  pub fn allocate_raw(
    &self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    debug_assert!(size > 0, "zero-sized requests never reach the buffer");

    let buffer = self.buffer.get();
    if buffer.is_null() {
      return None;
    }

    let start = self.cursor.get() + self.padding_for(size);
    let end = start.checked_add(size)?;
    if end > buffer.size() {
      return None;
    }

    self.cursor.set(end);
    NonNull::new(unsafe { buffer.address().add(start) })
  }

  /// Installs `buffer` with the cursor at its start and returns the previous
  /// buffer.
  pub fn replace_buffer(
    &self,
    buffer: MemoryBlockDescriptor,
  ) -> MemoryBlockDescriptor {
    self.cursor.set(0);
    self.buffer.replace(buffer)
  }

  /// Rewinds the cursor to the start of the current buffer.
  pub fn reset(&self) {
    self.cursor.set(0);
  }

  /// Grows the allocation of `size` bytes at `address` to the end of the
  /// buffer if it is the most recent allocation, and returns its new size.
  /// Any other allocation keeps its size.
  pub fn expand(
    &self,
    address: *mut u8,
    size: usize,
  ) -> usize {
    if !self.is_last_allocation(address, size) {
      return size;
    }

    let buffer = self.buffer.get();
    let start = address as usize - buffer.address() as usize;
    self.cursor.set(buffer.size());
    buffer.size() - start
  }

  /// Shrinks the most recent allocation, at `address` with `original_size`
  /// bytes, to `new_size` bytes. Returns `false`, changing nothing, if it is
  /// not the most recent allocation.
  pub fn truncate(
    &self,
    address: *mut u8,
    original_size: usize,
    new_size: usize,
  ) -> bool {
    debug_assert!(new_size <= original_size, "truncate cannot grow an allocation");

    if !self.is_last_allocation(address, original_size) {
      return false;
    }

    self.cursor.set(self.cursor.get() - (original_size - new_size));
    true
  }

  fn is_last_allocation(
    &self,
    address: *mut u8,
    size: usize,
  ) -> bool {
    let buffer = self.buffer.get();
    !buffer.is_null()
      && buffer.contains(address)
      && address as usize + size == buffer.address() as usize + self.cursor.get()
  }
}
