//! An instrumented upstream allocator.
//!
//! `TestAllocator` forwards to `malloc`/`free` and records every request, so
//! tests can assert exactly how many times, and with which sizes, an arena
//! went upstream.

use std::{
  collections::HashMap,
  sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use tracing::error;

use crate::{
  allocator::{Allocator, MallocFreeAllocator},
  error::{AllocError, AllocResult},
};

pub struct TestAllocator {
  name: &'static str,
  num_allocations: AtomicUsize,
  num_deallocations: AtomicUsize,
  bytes_in_use: AtomicUsize,
  allocation_limit: Mutex<Option<usize>>,
  outstanding: Mutex<HashMap<usize, usize>>,
  history: Mutex<Vec<usize>>,
}

impl TestAllocator {
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      num_allocations: AtomicUsize::new(0),
      num_deallocations: AtomicUsize::new(0),
      bytes_in_use: AtomicUsize::new(0),
      allocation_limit: Mutex::new(None),
      outstanding: Mutex::new(HashMap::new()),
      history: Mutex::new(Vec::new()),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Number of successful non-zero allocations.
  pub fn num_allocations(&self) -> usize {
    self.num_allocations.load(Ordering::Relaxed)
  }

  /// Number of non-null deallocations.
  pub fn num_deallocations(&self) -> usize {
    self.num_deallocations.load(Ordering::Relaxed)
  }

  pub fn num_blocks_in_use(&self) -> usize {
    self.outstanding.lock().len()
  }

  pub fn num_bytes_in_use(&self) -> usize {
    self.bytes_in_use.load(Ordering::Relaxed)
  }

  /// Sizes of all successful requests, in order.
  pub fn allocation_sizes(&self) -> Vec<usize> {
    self.history.lock().clone()
  }

  pub fn last_allocated_size(&self) -> Option<usize> {
    self.history.lock().last().copied()
  }

  /// After `limit` more successful allocations every request fails with
  /// `AllocError::OutOfMemory`. `None` removes the limit.
  pub fn set_allocation_limit(
    &self,
    limit: Option<usize>,
  ) {
    *self.allocation_limit.lock() = limit;
  }
}

impl Allocator for TestAllocator {
  fn allocate(
    &self,
    size: usize,
  ) -> AllocResult<*mut u8> {
    if size == 0 {
      return Ok(std::ptr::null_mut());
    }

    {
      let mut limit = self.allocation_limit.lock();
      match limit.as_mut() {
        Some(0) => return Err(AllocError::OutOfMemory { size }),
        Some(remaining) => *remaining -= 1,
        None => {}
      }
    }

    let address = MallocFreeAllocator.allocate(size)?;

    self.outstanding.lock().insert(address as usize, size);
    self.history.lock().push(size);
    self.num_allocations.fetch_add(1, Ordering::Relaxed);
    self.bytes_in_use.fetch_add(size, Ordering::Relaxed);

    Ok(address)
  }

  unsafe fn deallocate(
    &self,
    address: *mut u8,
  ) {
    if address.is_null() {
      return;
    }

    let size = self.outstanding.lock().remove(&(address as usize));
    let Some(size) = size else {
      panic!(
        "{}: deallocating {:?}, which was not allocated here",
        self.name, address
      );
    };

    self.num_deallocations.fetch_add(1, Ordering::Relaxed);
    self.bytes_in_use.fetch_sub(size, Ordering::Relaxed);

    unsafe { MallocFreeAllocator.deallocate(address) };
  }
}

impl Drop for TestAllocator {
  fn drop(&mut self) {
    let outstanding = self.outstanding.get_mut();
    if outstanding.is_empty() {
      return;
    }

    error!(
      allocator = self.name,
      blocks = outstanding.len(),
      bytes = self.bytes_in_use.load(Ordering::Relaxed),
      "memory leaked from test allocator"
    );
    for (&address, _) in outstanding.iter() {
      unsafe { MallocFreeAllocator.deallocate(address as *mut u8) };
    }
  }
}
