use std::{mem, ptr};

use libc::{c_void, free, malloc};
use once_cell::sync::OnceCell;

use crate::{
  align::is_aligned,
  error::{AllocError, AllocResult, DefaultAllocatorError},
};

/// A source of raw memory.
///
/// `allocate(0)` returns a null pointer and has no other effect. Any other
/// request either fails with an [`AllocError`] or returns a non-null address.
///
/// Alignment is up to the allocator: `MallocFreeAllocator` and
/// `TestAllocator` return maximally aligned memory, while a pool using
/// `AlignmentStrategy::ByteAligned` may return any address. Code placing
/// typed values in allocator memory, such as [`new_object`], checks the
/// address before writing.
pub trait Allocator {
  fn allocate(
    &self,
    size: usize,
  ) -> AllocResult<*mut u8>;

  /// Returns `address` to this allocator. A null `address` is ignored.
  ///
  /// # Safety
  ///
  /// `address` must be null or have been returned by `allocate` on this
  /// allocator and not deallocated since.
  unsafe fn deallocate(
    &self,
    address: *mut u8,
  );
}

/// An allocator able to release, at once, everything allocated through it.
pub trait ManagedAllocator: Allocator {
  /// Returns all outstanding memory to the upstream supplier. Every address
  /// previously obtained from this allocator becomes invalid.
  fn release(&mut self);
}

/// Upstream allocator backed by the C library `malloc` and `free`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MallocFreeAllocator;

impl Allocator for MallocFreeAllocator {
  fn allocate(
    &self,
    size: usize,
  ) -> AllocResult<*mut u8> {
    if size == 0 {
      return Ok(ptr::null_mut());
    }

    let address = unsafe { malloc(size) } as *mut u8;
    if address.is_null() {
      return Err(AllocError::OutOfMemory { size });
    }
    Ok(address)
  }

  unsafe fn deallocate(
    &self,
    address: *mut u8,
  ) {
    if !address.is_null() {
      unsafe { free(address as *mut c_void) };
    }
  }
}

static MALLOC_FREE_ALLOCATOR: MallocFreeAllocator = MallocFreeAllocator;

static DEFAULT_ALLOCATOR: OnceCell<&'static (dyn Allocator + Sync)> = OnceCell::new();

/// The process-wide default allocator.
///
/// The first call fixes the default: if none was installed with
/// [`set_default_allocator`], `MallocFreeAllocator` is used from then on.
pub fn default_allocator() -> &'static (dyn Allocator + Sync) {
  *DEFAULT_ALLOCATOR.get_or_init(|| &MALLOC_FREE_ALLOCATOR)
}

/// Installs `allocator` as the process-wide default.
///
/// Fails once the default has been installed or looked up.
pub fn set_default_allocator(
  allocator: &'static (dyn Allocator + Sync),
) -> Result<(), DefaultAllocatorError> {
  DEFAULT_ALLOCATOR
    .set(allocator)
    .map_err(|_| DefaultAllocatorError::AlreadyInstalled)
}

/// Moves `value` into memory obtained from `allocator`.
///
/// Zero-sized values take no memory from the allocator. Fails with
/// `AllocError::Misaligned`, returning the memory, if the allocator hands
/// out an address unsuitable for `T`.
pub fn new_object<T>(
  allocator: &dyn Allocator,
  value: T,
) -> AllocResult<*mut T> {
  let size = mem::size_of::<T>();
  let object = if size == 0 {
    ptr::NonNull::<T>::dangling().as_ptr()
  } else {
    let address = allocator.allocate(size)?;
    if !is_aligned(address as usize, mem::align_of::<T>()) {
      unsafe { allocator.deallocate(address) };
      return Err(AllocError::Misaligned {
        alignment: mem::align_of::<T>(),
      });
    }
    address as *mut T
  };

  unsafe { object.write(value) };
  Ok(object)
}

/// Drops `*object` in place and returns its footprint to `allocator`.
/// A null `object` is ignored.
///
/// # Safety
///
/// `object` must be null or have been produced by [`new_object`] with the
/// same allocator, and not deleted since.
pub unsafe fn delete_object<T>(
  allocator: &dyn Allocator,
  object: *mut T,
) {
  if object.is_null() {
    return;
  }

  unsafe {
    ptr::drop_in_place(object);
    if mem::size_of::<T>() != 0 {
      allocator.deallocate(object as *mut u8);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::Cell, rc::Rc};

  use super::*;
  use crate::test_allocator::TestAllocator;

  #[test]
  fn test_malloc_free() {
    let allocator = MallocFreeAllocator;

    assert!(allocator.allocate(0).unwrap().is_null());

    unsafe {
      let address = allocator.allocate(100).unwrap();
      assert!(!address.is_null());
      assert!(is_aligned(address as usize, mem::align_of::<u64>()));
      ptr::write_bytes(address, 0x5A, 100);
      assert_eq!(*address.add(99), 0x5A);
      allocator.deallocate(address);
      allocator.deallocate(ptr::null_mut());
    }
  }

  #[test]
  fn test_new_and_delete_object() {
    struct Tracked(Rc<Cell<u32>>, u64);

    impl Drop for Tracked {
      fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
      }
    }

    let allocator = TestAllocator::new("objects");
    let drops = Rc::new(Cell::new(0));

    let object = new_object(&allocator, Tracked(drops.clone(), 7)).unwrap();
    assert_eq!(allocator.num_blocks_in_use(), 1);
    assert_eq!(unsafe { (*object).1 }, 7);

    unsafe { delete_object(&allocator, object) };
    assert_eq!(drops.get(), 1);
    assert_eq!(allocator.num_blocks_in_use(), 0);

    unsafe { delete_object::<Tracked>(&allocator, ptr::null_mut()) };
    assert_eq!(allocator.num_deallocations(), 1);
  }

  #[test]
  fn test_zero_sized_object() {
    let allocator = TestAllocator::new("zst");

    let object = new_object(&allocator, ()).unwrap();
    assert!(!object.is_null());
    unsafe { delete_object(&allocator, object) };

    assert_eq!(allocator.num_allocations(), 0);
    assert_eq!(allocator.num_deallocations(), 0);
  }

  #[test]
  fn test_new_object_propagates_exhaustion() {
    let allocator = TestAllocator::new("exhausted");
    allocator.set_allocation_limit(Some(0));

    let result = new_object(&allocator, 5u32);
    assert_eq!(result.unwrap_err(), AllocError::OutOfMemory { size: 4 });
  }
}
