use std::{cell::Cell, mem, ptr};

use crate::{
  align::is_aligned,
  allocator::{Allocator, ManagedAllocator},
  block::Block,
  descriptor::MemoryBlockDescriptor,
  error::{AllocError, AllocResult},
  logging,
};

/// A list of upstream blocks that can only be freed all together.
///
/// Each block carries its link to the next one in a header at its front, so
/// obtaining a block costs exactly one upstream request. Blocks are
/// prepended; the head is always the most recently allocated block.
///
/// ```text
///   head
///    │
///    ▼
///   ┌──────┬───────────┐    ┌──────┬─────────────────┐    ┌──────┬──────┐
///   │ next ├─ body ────┤ ─▶ │ next ├─ body ──────────┤ ─▶ │ null ├─body─┤
///   └──────┴───────────┘    └──────┴─────────────────┘    └──────┴──────┘
/// ```
pub struct InfrequentDeleteBlockList<'a> {
  head: Cell<*mut Block>,
  allocator: &'a dyn Allocator,
}

impl<'a> InfrequentDeleteBlockList<'a> {
  pub fn new(allocator: &'a dyn Allocator) -> Self {
    Self {
      head: Cell::new(ptr::null_mut()),
      allocator,
    }
  }

  /// Obtains a block whose body holds at least `size` bytes and returns the
  /// body's address, which is maximally aligned. A zero `size` returns null
  /// without going upstream.
  pub fn allocate(
    &self,
    size: usize,
  ) -> AllocResult<*mut u8> {
    if size == 0 {
      return Ok(ptr::null_mut());
    }

    let total = Block::total_size(size).ok_or(AllocError::SizeOverflow { size })?;
    let block = self.allocator.allocate(total)? as *mut Block;
    if block.is_null() {
      return Err(AllocError::OutOfMemory { size: total });
    }
    if !is_aligned(block as usize, mem::align_of::<Block>()) {
      unsafe { self.allocator.deallocate(block as *mut u8) };
      return Err(AllocError::Misaligned {
        alignment: mem::align_of::<Block>(),
      });
    }

    unsafe {
      block.write(Block::new(total, self.head.get()));
      self.head.set(block);
      let body = Block::body(block);
      logging::log_block_allocated(total, body);
      Ok(body)
    }
  }

  /// Blocks are never freed one at a time; memory comes back on `release`.
  #[inline]
  pub fn deallocate(
    &self,
    _address: *mut u8,
  ) {
  }

  /// Returns every block to the upstream allocator.
  pub fn release(&mut self) {
    let head = self.head.replace(ptr::null_mut());
    unsafe { self.release_chain(head) };
  }

  /// Returns every block except the most recently allocated one.
  pub fn release_all_but_last_block(&mut self) {
    let head = self.head.get();
    if head.is_null() {
      return;
    }

    unsafe {
      let rest = (*head).next;
      (*head).next = ptr::null_mut();
      self.release_chain(rest);
    }
  }

  /// Body of the most recently allocated block, or the null descriptor.
  pub fn last_block(&self) -> MemoryBlockDescriptor {
    let head = self.head.get();
    if head.is_null() {
      return MemoryBlockDescriptor::null();
    }
    unsafe { MemoryBlockDescriptor::new(Block::body(head), (*head).body_size()) }
  }

  pub fn len(&self) -> usize {
    let mut count = 0;
    let mut current = self.head.get();
    while !current.is_null() {
      count += 1;
      current = unsafe { (*current).next };
    }
    count
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.head.get().is_null()
  }

  pub fn allocator(&self) -> &'a dyn Allocator {
    self.allocator
  }

  unsafe fn release_chain(
    &self,
    mut current: *mut Block,
  ) {
    let mut blocks = 0;
    let mut bytes = 0;

    unsafe {
      while !current.is_null() {
        let next = (*current).next;
        bytes += (*current).size;
        blocks += 1;
        self.allocator.deallocate(current as *mut u8);
        current = next;
      }
    }

    logging::log_blocks_released(blocks, bytes);
  }
}

impl Allocator for InfrequentDeleteBlockList<'_> {
  fn allocate(
    &self,
    size: usize,
  ) -> AllocResult<*mut u8> {
    InfrequentDeleteBlockList::allocate(self, size)
  }

  unsafe fn deallocate(
    &self,
    address: *mut u8,
  ) {
    InfrequentDeleteBlockList::deallocate(self, address);
  }
}

impl ManagedAllocator for InfrequentDeleteBlockList<'_> {
  fn release(&mut self) {
    InfrequentDeleteBlockList::release(self);
  }
}

impl Drop for InfrequentDeleteBlockList<'_> {
  fn drop(&mut self) {
    self.release();
  }
}
