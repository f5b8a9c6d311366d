use std::{fmt, ptr};

/// The address and size of a contiguous block of memory.
///
/// A descriptor is either null (`address` null and `size` zero) or describes
/// a non-empty block; a non-null address with a zero size is not a valid
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryBlockDescriptor {
  address: *mut u8,
  size: usize,
}

impl MemoryBlockDescriptor {
  pub const fn null() -> Self {
    Self {
      address: ptr::null_mut(),
      size: 0,
    }
  }

  pub fn new(
    address: *mut u8,
    size: usize,
  ) -> Self {
    debug_assert!(
      address.is_null() == (size == 0),
      "a descriptor has a zero size if and only if its address is null"
    );
    Self { address, size }
  }

  #[inline]
  pub fn address(&self) -> *mut u8 {
    self.address
  }

  #[inline]
  pub fn size(&self) -> usize {
    self.size
  }

  #[inline]
  pub fn is_null(&self) -> bool {
    self.address.is_null()
  }

  pub fn set_address_and_size(
    &mut self,
    address: *mut u8,
    size: usize,
  ) {
    *self = Self::new(address, size);
  }

  /// Whether `address` lies inside the described block.
  pub fn contains(
    &self,
    address: *const u8,
  ) -> bool {
    let start = self.address as usize;
    let address = address as usize;
    !self.is_null() && address >= start && address < start + self.size
  }
}

impl Default for MemoryBlockDescriptor {
  fn default() -> Self {
    Self::null()
  }
}

impl fmt::Display for MemoryBlockDescriptor {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "[{:?}, {}]", self.address, self.size)
  }
}
