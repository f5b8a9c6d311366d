use std::ptr;

use seqalloc::{
  BufferedSequentialPool, GrowthStrategy, PoolOptions, TestAllocator, logging::init_logging,
};

/// Prints where an allocation landed relative to the pool's current buffer.
fn print_alloc(
  pool: &BufferedSequentialPool<'_>,
  label: &str,
  size: usize,
  address: *mut u8,
) {
  let current = pool.current_buffer();
  println!(
    "[{}] {} bytes at {:?} ({}), next block size = {}",
    label,
    size,
    address,
    if current.contains(address) {
      "current buffer"
    } else {
      "dedicated block"
    },
    pool.next_block_size(),
  );
}

fn main() -> Result<(), seqalloc::AllocError> {
  // SEQALLOC_LOG=seqalloc=trace shows every upstream block.
  init_logging();

  let upstream = TestAllocator::new("demo");
  let mut buffer = [0u8; 64];
  let options = PoolOptions::new()
    .growth_strategy(GrowthStrategy::Geometric)
    .max_buffer_size(1024);
  let mut pool = BufferedSequentialPool::with_options(&mut buffer, options, &upstream);

  // --------------------------------------------------------------------
  // 1) Small requests come out of the 64-byte buffer.
  // --------------------------------------------------------------------
  let first = pool.allocate(40)?;
  unsafe { ptr::write_bytes(first, 0xAB, 40) };
  print_alloc(&pool, "1", 40, first);
  println!("[1] upstream allocations so far: {}", upstream.num_allocations());

  // --------------------------------------------------------------------
  // 2) The buffer cannot hold another 40 bytes: the pool grows.
  // --------------------------------------------------------------------
  let second = pool.allocate(40)?;
  print_alloc(&pool, "2", 40, second);
  println!("[2] upstream requests: {:?}", upstream.allocation_sizes());

  // --------------------------------------------------------------------
  // 3) Grab whatever is left of the current block.
  // --------------------------------------------------------------------
  let mut size = 16;
  let third = pool.allocate_and_expand(&mut size)?;
  print_alloc(&pool, "3", size, third);

  // --------------------------------------------------------------------
  // 4) Larger than the maximum buffer size: served by its own block.
  // --------------------------------------------------------------------
  let big = pool.allocate(4096)?;
  print_alloc(&pool, "4", 4096, big);
  println!("[4] blocks in use: {}", upstream.num_blocks_in_use());

  // --------------------------------------------------------------------
  // 5) Release everything and start over from the caller's buffer.
  // --------------------------------------------------------------------
  pool.release();
  println!("\n[5] released, blocks in use: {}", upstream.num_blocks_in_use());

  let again = pool.allocate(10)?;
  print_alloc(&pool, "5", 10, again);
  println!("[5] {:?}", pool);

  Ok(())
}
