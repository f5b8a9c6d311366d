use std::{cell::Cell, fmt, marker::PhantomData, ptr};

use crate::{
  align::AlignmentStrategy,
  allocator::{Allocator, ManagedAllocator},
  block_list::InfrequentDeleteBlockList,
  bump::BufferManager,
  descriptor::MemoryBlockDescriptor,
  error::{AllocError, AllocResult},
  logging,
  options::{GrowthStrategy, PoolOptions},
};

/// A sequential allocator that serves requests from a caller-supplied buffer
/// first, and from blocks obtained through an upstream allocator once that
/// buffer is exhausted.
///
/// ```text
///   initial buffer (borrowed)      block list (owned)
///   ┌──────────────────────┐       ┌─────────────────────────┐
///   │ A1 │ A2 │ A3 │ ░░░░░ │  ──▶  │ A4 │ A5 │    free       │  ◀── current
///   └──────────────────────┘       └─────────────────────────┘
///        never freed               ┌─────────────┐
///                                  │     A6      │  dedicated block
///                                  └─────────────┘
/// ```
///
/// Individual deallocation is a no-op; memory comes back all at once through
/// `release`, `rewind`, or dropping the pool. The initial buffer is never
/// freed or cleared by the pool.
///
/// Not thread-safe: a pool is meant to be used by one thread at a time.
pub struct BufferedSequentialPool<'a> {
  buffer_manager: BufferManager,
  initial_buffer: MemoryBlockDescriptor,
  block_list: InfrequentDeleteBlockList<'a>,
  growth_strategy: GrowthStrategy,
  max_buffer_size: usize,
  initial_block_size: usize,
  next_block_size: Cell<usize>,
  _buffer: PhantomData<&'a mut [u8]>,
}

impl<'a> BufferedSequentialPool<'a> {
  /// Creates a pool with geometric growth, natural alignment and no maximum
  /// buffer size.
  pub fn new(
    buffer: &'a mut [u8],
    allocator: &'a dyn Allocator,
  ) -> Self {
    Self::with_options(buffer, PoolOptions::default(), allocator)
  }

  /// Creates a pool over `buffer`, which must not be empty. When set,
  /// `options.max_buffer_size` must be at least `buffer.len()`.
  pub fn with_options(
    buffer: &'a mut [u8],
    options: PoolOptions,
    allocator: &'a dyn Allocator,
  ) -> Self {
    debug_assert!(!buffer.is_empty(), "the initial buffer must not be empty");

    let max_buffer_size = options.max_buffer_size.unwrap_or(usize::MAX);
    debug_assert!(
      max_buffer_size >= buffer.len(),
      "the maximum buffer size must not be smaller than the initial buffer"
    );

    let initial_block_size = match options.growth_strategy {
      GrowthStrategy::Geometric => buffer.len().saturating_mul(2),
      GrowthStrategy::Constant => buffer.len(),
    }
    .min(max_buffer_size)
    .max(1);

    let initial_buffer = MemoryBlockDescriptor::new(buffer.as_mut_ptr(), buffer.len());

    Self {
      buffer_manager: BufferManager::with_buffer(initial_buffer, options.alignment_strategy),
      initial_buffer,
      block_list: InfrequentDeleteBlockList::new(allocator),
      growth_strategy: options.growth_strategy,
      max_buffer_size,
      initial_block_size,
      next_block_size: Cell::new(initial_block_size),
      _buffer: PhantomData,
    }
  }

  /// Returns `size` bytes aligned per the pool's alignment strategy, or null
  /// if `size` is zero.
  #[inline]
  pub fn allocate(
    &self,
    size: usize,
  ) -> AllocResult<*mut u8> {
    if size == 0 {
      return Ok(ptr::null_mut());
    }

    if let Some(address) = self.buffer_manager.allocate_raw(size) {
      return Ok(address.as_ptr());
    }

    self.allocate_non_fast_path(size)
  }

  /// Allocates at least `*size` bytes. If the allocation ends up at the tail
  /// of the current buffer, it is extended to the end of that buffer and
  /// `*size` is updated to the usable size.
  pub fn allocate_and_expand(
    &self,
    size: &mut usize,
  ) -> AllocResult<*mut u8> {
    let address = self.allocate(*size)?;
    if !address.is_null() {
      *size = self.buffer_manager.expand(address, *size);
    }
    Ok(address)
  }

  /// Makes sure the next `num_bytes` bytes of requests can be served from the
  /// current buffer without going upstream. Allocates nothing itself.
  pub fn reserve_capacity(
    &self,
    num_bytes: usize,
  ) -> AllocResult<()> {
    if num_bytes == 0 || self.buffer_manager.has_sufficient_capacity(num_bytes) {
      return Ok(());
    }

    let block_size = self.growth_block_size(num_bytes).unwrap_or(num_bytes);
    self.install_block(block_size)
  }

  /// Shrinks the most recent allocation in place. Returns `false` if
  /// `address` is not the most recent allocation from the current buffer.
  pub fn truncate(
    &self,
    address: *mut u8,
    original_size: usize,
    new_size: usize,
  ) -> bool {
    self.buffer_manager.truncate(address, original_size, new_size)
  }

  /// No-op; memory is reclaimed by `release`, `rewind` or drop.
  #[inline]
  pub fn deallocate(
    &self,
    _address: *mut u8,
  ) {
  }

  /// Returns every dynamically obtained block upstream and makes the initial
  /// buffer current again with nothing allocated from it. Block growth
  /// starts over from its initial size.
  pub fn release(&mut self) {
    self.block_list.release();
    self.buffer_manager.replace_buffer(self.initial_buffer);
    self.next_block_size.set(self.initial_block_size);
    logging::log_pool_released(false);
  }

  /// Like `release`, but if the current buffer is the most recently obtained
  /// block, that block is kept as the current buffer with nothing allocated
  /// from it, and growth continues from where it was.
  pub fn rewind(&mut self) {
    let current = self.buffer_manager.buffer();
    let keeps_current = current != self.initial_buffer
      && self.block_list.last_block().address() == current.address();

    if !keeps_current {
      self.release();
      return;
    }

    self.block_list.release_all_but_last_block();
    self.buffer_manager.reset();
    logging::log_pool_released(true);
  }

  #[inline]
  pub fn growth_strategy(&self) -> GrowthStrategy {
    self.growth_strategy
  }

  #[inline]
  pub fn alignment_strategy(&self) -> AlignmentStrategy {
    self.buffer_manager.alignment_strategy()
  }

  pub fn max_buffer_size(&self) -> Option<usize> {
    (self.max_buffer_size != usize::MAX).then_some(self.max_buffer_size)
  }

  /// Size of the block the pool will request next time it grows.
  pub fn next_block_size(&self) -> usize {
    self.next_block_size.get()
  }

  /// The buffer requests are currently carved from.
  pub fn current_buffer(&self) -> MemoryBlockDescriptor {
    self.buffer_manager.buffer()
  }

  pub fn allocator(&self) -> &'a dyn Allocator {
    self.block_list.allocator()
  }

  fn allocate_non_fast_path(
    &self,
    size: usize,
  ) -> AllocResult<*mut u8> {
    let Some(block_size) = self.growth_block_size(size) else {
      logging::log_dedicated_block(size);
      return self.block_list.allocate(size);
    };

    self.install_block(block_size)?;
    self
      .buffer_manager
      .allocate_raw(size)
      .map(|address| address.as_ptr())
      .ok_or(AllocError::OutOfMemory { size })
  }

  /// Size of the next growth block able to hold `size` bytes, or `None` when
  /// growth cannot reach `size`.
  fn growth_block_size(
    &self,
    size: usize,
  ) -> Option<usize> {
    let mut block_size = self.next_block_size.get();

    if self.growth_strategy == GrowthStrategy::Geometric {
      while block_size < size && block_size < self.max_buffer_size {
        block_size = block_size.saturating_mul(2).min(self.max_buffer_size);
      }
    }

    (block_size >= size).then_some(block_size)
  }

  fn install_block(
    &self,
    block_size: usize,
  ) -> AllocResult<()> {
    let block = self.block_list.allocate(block_size)?;
    self
      .buffer_manager
      .replace_buffer(MemoryBlockDescriptor::new(block, block_size));

    if self.growth_strategy == GrowthStrategy::Geometric {
      let next = block_size.saturating_mul(2).min(self.max_buffer_size);
      self.next_block_size.set(next.max(self.next_block_size.get()));
    }

    logging::log_pool_grown(block_size, self.next_block_size.get());
    Ok(())
  }
}

impl Allocator for BufferedSequentialPool<'_> {
  fn allocate(
    &self,
    size: usize,
  ) -> AllocResult<*mut u8> {
    BufferedSequentialPool::allocate(self, size)
  }

  unsafe fn deallocate(
    &self,
    address: *mut u8,
  ) {
    BufferedSequentialPool::deallocate(self, address);
  }
}

impl ManagedAllocator for BufferedSequentialPool<'_> {
  fn release(&mut self) {
    BufferedSequentialPool::release(self);
  }
}

impl fmt::Debug for BufferedSequentialPool<'_> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("BufferedSequentialPool")
      .field("current_buffer", &self.buffer_manager.buffer())
      .field("cursor", &self.buffer_manager.cursor())
      .field("growth_strategy", &self.growth_strategy)
      .field("alignment_strategy", &self.alignment_strategy())
      .field("next_block_size", &self.next_block_size.get())
      .field("blocks", &self.block_list.len())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use std::mem;

  use super::*;
  use crate::{
    align::{MAX_ALIGNMENT, MaxAlignedType, is_aligned, natural_alignment},
    allocator::new_object,
    block::Block,
    factory::{AllocatorFactory, Factory},
    test_allocator::TestAllocator,
  };

  fn packed() -> PoolOptions {
    PoolOptions::new().alignment_strategy(AlignmentStrategy::ByteAligned)
  }

  fn total(body_size: usize) -> usize {
    Block::total_size(body_size).unwrap()
  }

  #[test]
  fn test_zero_size() {
    let upstream = TestAllocator::new("zero");
    let mut buffer = [0u8; 16];
    let pool = BufferedSequentialPool::new(&mut buffer, &upstream);

    assert!(pool.allocate(0).unwrap().is_null());
    let mut size = 0;
    assert!(pool.allocate_and_expand(&mut size).unwrap().is_null());
    assert_eq!(size, 0);
    pool.reserve_capacity(0).unwrap();

    assert_eq!(upstream.num_allocations(), 0);
    assert_eq!(pool.current_buffer().size(), 16);
  }

  #[test]
  fn test_requests_within_buffer_stay_local() {
    let upstream = TestAllocator::new("local");
    let mut buffer = [0u8; 256];
    let base = buffer.as_mut_ptr();
    let pool = BufferedSequentialPool::with_options(&mut buffer, packed(), &upstream);

    let mut previous = None;
    for size in [1usize, 3, 8, 20, 100, 124] {
      let address = pool.allocate(size).unwrap();
      if let Some((last, last_size)) = previous {
        assert_eq!(address as usize, last as usize + last_size);
      } else {
        assert_eq!(address, base);
      }
      previous = Some((address, size));
    }

    assert_eq!(upstream.num_allocations(), 0);
    assert_eq!(pool.current_buffer().address(), base);
  }

  #[test]
  fn test_geometric_growth() {
    let upstream = TestAllocator::new("geometric");
    let mut buffer = [0u8; 64];
    let pool = BufferedSequentialPool::with_options(&mut buffer, packed(), &upstream);
    assert_eq!(pool.next_block_size(), 128);

    pool.allocate(64).unwrap();
    assert_eq!(upstream.num_allocations(), 0);

    pool.allocate(64).unwrap();
    pool.allocate(64).unwrap();
    assert_eq!(upstream.allocation_sizes(), vec![total(128)]);
    assert_eq!(pool.next_block_size(), 256);

    pool.allocate(64).unwrap();
    pool.allocate(200).unwrap();
    pool.allocate(1500).unwrap();

    assert_eq!(
      upstream.allocation_sizes(),
      vec![total(128), total(256), total(512), total(2048)]
    );
    assert_eq!(pool.next_block_size(), 4096);
    assert_eq!(pool.current_buffer().size(), 2048);
  }

  #[test]
  fn test_geometric_growth_is_capped() {
    let upstream = TestAllocator::new("capped");
    let mut buffer = [0u8; 64];
    let options = packed().max_buffer_size(300);
    let pool = BufferedSequentialPool::with_options(&mut buffer, options, &upstream);
    assert_eq!(pool.max_buffer_size(), Some(300));

    for _ in 0..4 {
      pool.allocate(64).unwrap();
    }
    pool.allocate(200).unwrap();
    assert_eq!(
      upstream.allocation_sizes(),
      vec![total(128), total(256), total(300)]
    );
    assert_eq!(pool.next_block_size(), 300);

    let current = pool.current_buffer();
    let dedicated = pool.allocate(400).unwrap();
    assert_eq!(upstream.last_allocated_size(), Some(total(400)));
    assert!(!current.contains(dedicated));
    assert_eq!(pool.current_buffer(), current);
    assert_eq!(pool.next_block_size(), 300);

    let address = pool.allocate(100).unwrap();
    assert!(current.contains(address));
    assert_eq!(upstream.num_allocations(), 4);
  }

  #[test]
  fn test_constant_growth() {
    let upstream = TestAllocator::new("constant");
    let mut buffer = [0u8; 64];
    let options = packed().growth_strategy(GrowthStrategy::Constant);
    let pool = BufferedSequentialPool::with_options(&mut buffer, options, &upstream);

    pool.allocate(40).unwrap();
    pool.allocate(40).unwrap();
    pool.allocate(40).unwrap();
    pool.allocate(40).unwrap();
    assert_eq!(upstream.allocation_sizes(), vec![total(64), total(64), total(64)]);
    assert_eq!(pool.next_block_size(), 64);

    let current = pool.current_buffer();
    pool.allocate(100).unwrap();
    assert_eq!(pool.current_buffer(), current);
    pool.allocate(20).unwrap();

    assert_eq!(
      upstream.allocation_sizes(),
      vec![total(64), total(64), total(64), total(100)]
    );
  }

  #[test]
  fn test_alignment_strategies() {
    let upstream = TestAllocator::new("alignment");
    let mut storage = [0u8; 301];

    for strategy in [
      AlignmentStrategy::Natural,
      AlignmentStrategy::Maximum,
      AlignmentStrategy::ByteAligned,
    ] {
      let buffer = &mut storage[1..];
      let options = PoolOptions::new().alignment_strategy(strategy);
      let pool = BufferedSequentialPool::with_options(buffer, options, &upstream);
      assert_eq!(pool.alignment_strategy(), strategy);

      for size in 1..=64usize {
        let address = pool.allocate(size).unwrap() as usize;
        let expected = match strategy {
          AlignmentStrategy::Natural => natural_alignment(size),
          AlignmentStrategy::Maximum => MAX_ALIGNMENT,
          AlignmentStrategy::ByteAligned => 1,
        };
        assert!(is_aligned(address, expected), "{strategy:?} size {size}");
      }
    }
  }

  #[test]
  fn test_release_restores_initial_buffer() {
    let upstream = TestAllocator::new("release");
    let mut buffer = [0u8; 64];
    let base = buffer.as_mut_ptr();
    let mut pool = BufferedSequentialPool::with_options(&mut buffer, packed(), &upstream);

    pool.allocate(60).unwrap();
    pool.allocate(100).unwrap();
    pool.allocate(300).unwrap();
    assert_eq!(upstream.num_blocks_in_use(), 2);
    assert_eq!(pool.next_block_size(), 1024);

    pool.release();
    assert_eq!(upstream.num_blocks_in_use(), 0);
    assert_eq!(pool.current_buffer(), MemoryBlockDescriptor::new(base, 64));
    assert_eq!(pool.next_block_size(), 128);

    assert_eq!(pool.allocate(10).unwrap(), base);
    pool.allocate(60).unwrap();
    assert_eq!(upstream.last_allocated_size(), Some(total(128)));
  }

  #[test]
  fn test_rewind_keeps_current_block() {
    let upstream = TestAllocator::new("rewind");
    let mut buffer = [0u8; 32];
    let mut pool = BufferedSequentialPool::with_options(&mut buffer, packed(), &upstream);

    pool.allocate(32).unwrap();
    pool.allocate(64).unwrap();
    pool.allocate(100).unwrap();
    assert_eq!(upstream.num_blocks_in_use(), 2);
    let current = pool.current_buffer();

    pool.rewind();
    assert_eq!(upstream.num_blocks_in_use(), 1);
    assert_eq!(pool.current_buffer(), current);
    assert_eq!(pool.next_block_size(), 256);
    assert_eq!(pool.allocate(8).unwrap(), current.address());

    pool.release();
    pool.rewind();
    assert_eq!(upstream.num_blocks_in_use(), 0);
  }

  #[test]
  fn test_rewind_after_dedicated_block_releases_everything() {
    let upstream = TestAllocator::new("rewind-dedicated");
    let mut buffer = [0u8; 32];
    let base = buffer.as_mut_ptr();
    let options = packed().max_buffer_size(64);
    let mut pool = BufferedSequentialPool::with_options(&mut buffer, options, &upstream);

    pool.allocate(500).unwrap();
    assert_eq!(pool.current_buffer().address(), base);

    pool.rewind();
    assert_eq!(upstream.num_blocks_in_use(), 0);
    assert_eq!(pool.current_buffer().address(), base);
  }

  #[test]
  fn test_allocate_and_expand() {
    let upstream = TestAllocator::new("expand");
    let mut buffer = [0u8; 64];
    let base = buffer.as_mut_ptr();
    let pool = BufferedSequentialPool::with_options(&mut buffer, packed(), &upstream);

    let mut size = 10;
    let address = pool.allocate_and_expand(&mut size).unwrap();
    assert_eq!(address, base);
    assert_eq!(size, 64);
    assert_eq!(upstream.num_allocations(), 0);

    let mut size = 16;
    let address = pool.allocate_and_expand(&mut size).unwrap();
    assert_eq!(size, 128);
    assert_eq!(pool.current_buffer().address(), address);
  }

  #[test]
  fn test_reserve_capacity() {
    let upstream = TestAllocator::new("reserve");
    let mut buffer = [0u8; 64];
    let pool = BufferedSequentialPool::with_options(&mut buffer, packed(), &upstream);

    pool.reserve_capacity(64).unwrap();
    assert_eq!(upstream.num_allocations(), 0);

    pool.allocate(10).unwrap();
    pool.reserve_capacity(100).unwrap();
    assert_eq!(upstream.allocation_sizes(), vec![total(128)]);

    let block = pool.current_buffer();
    for _ in 0..10 {
      let address = pool.allocate(10).unwrap();
      assert!(block.contains(address));
    }
    assert_eq!(upstream.num_allocations(), 1);
  }

  #[test]
  fn test_reserve_capacity_beyond_cap() {
    let upstream = TestAllocator::new("reserve-cap");
    let mut buffer = [0u8; 16];
    let options = packed().max_buffer_size(32);
    let pool = BufferedSequentialPool::with_options(&mut buffer, options, &upstream);

    pool.reserve_capacity(1000).unwrap();
    assert_eq!(upstream.allocation_sizes(), vec![total(1000)]);
    assert_eq!(pool.current_buffer().size(), 1000);
    assert_eq!(pool.next_block_size(), 32);
  }

  #[test]
  fn test_truncate() {
    let upstream = TestAllocator::new("truncate");
    let mut buffer = [0u8; 64];
    let base = buffer.as_mut_ptr();
    let pool = BufferedSequentialPool::with_options(&mut buffer, packed(), &upstream);

    let first = pool.allocate(16).unwrap();
    let second = pool.allocate(16).unwrap();

    assert!(!pool.truncate(first, 16, 8));
    assert!(pool.truncate(second, 16, 4));
    assert_eq!(pool.allocate(1).unwrap() as usize, base as usize + 20);
  }

  #[test]
  fn test_upstream_failure_propagates() {
    let upstream = TestAllocator::new("failing");
    upstream.set_allocation_limit(Some(0));
    let mut buffer = [0u8; 16];
    let pool = BufferedSequentialPool::with_options(&mut buffer, packed(), &upstream);

    pool.allocate(16).unwrap();
    assert!(matches!(pool.allocate(1), Err(AllocError::OutOfMemory { .. })));
    assert!(pool.reserve_capacity(8).is_err());
    assert_eq!(pool.next_block_size(), 32);
  }

  #[test]
  fn test_drop_returns_blocks_but_not_buffer() {
    let upstream = TestAllocator::new("drop");
    let mut buffer = [0u8; 8];
    {
      let pool = BufferedSequentialPool::with_options(&mut buffer, packed(), &upstream);
      let address = pool.allocate(4).unwrap();
      unsafe { ptr::write_bytes(address, 0xEE, 4) };
      pool.allocate(100).unwrap();
      pool.deallocate(address);
      assert_eq!(upstream.num_blocks_in_use(), 1);
    }
    assert_eq!(upstream.num_blocks_in_use(), 0);
    assert_eq!(buffer[..4], [0xEE; 4]);
  }

  #[test]
  fn test_byte_aligned_pool_as_upstream() {
    let upstream = TestAllocator::new("byte-aligned-upstream");
    let mut storage = [MaxAlignedType::ZEROED; 8];
    let len = mem::size_of_val(&storage);
    let buffer = unsafe { std::slice::from_raw_parts_mut(storage.as_mut_ptr() as *mut u8, len) };
    let base = buffer.as_mut_ptr();
    let pool = BufferedSequentialPool::with_options(buffer, packed(), &upstream);

    assert_eq!(pool.allocate(1).unwrap(), base);

    assert_eq!(
      new_object(&pool, 0x1122_3344_5566_7788u64).unwrap_err(),
      AllocError::Misaligned {
        alignment: mem::align_of::<u64>()
      }
    );

    let factory = AllocatorFactory::<u32>::new(&pool);
    assert_eq!(
      factory.create_object().unwrap_err(),
      AllocError::Misaligned {
        alignment: mem::align_of::<u32>()
      }
    );

    let list = InfrequentDeleteBlockList::new(&pool);
    assert_eq!(
      list.allocate(8).unwrap_err(),
      AllocError::Misaligned {
        alignment: MAX_ALIGNMENT
      }
    );
    assert!(list.is_empty());

    let byte = new_object(&pool, 0xA5u8).unwrap();
    assert_eq!(unsafe { *byte }, 0xA5);
    assert_eq!(upstream.num_allocations(), 0);
  }

  #[test]
  fn test_as_managed_allocator() {
    let upstream = TestAllocator::new("managed");
    let mut buffer = [0u8; 8];
    let mut pool = BufferedSequentialPool::new(&mut buffer, &upstream);

    {
      let managed: &mut dyn ManagedAllocator = &mut pool;
      managed.allocate(64).unwrap();
      managed.release();
    }

    assert_eq!(upstream.num_allocations(), 1);
    assert_eq!(upstream.num_blocks_in_use(), 0);
    assert!(format!("{pool:?}").contains("BufferedSequentialPool"));
  }
}
