use std::mem;

use crate::{align::MaxAlignedType, align_to};

/// Header placed at the front of every block obtained from upstream. The
/// body handed to callers starts right after it and is maximally aligned.
#[repr(C)]
pub struct Block {
  pub next: *mut Block,
  pub size: usize,
  _body: [MaxAlignedType; 0],
}

/// Bytes occupied by the header, padded to maximum alignment.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

impl Block {
  pub fn new(
    size: usize,
    next: *mut Block,
  ) -> Self {
    Self {
      next,
      size,
      _body: [],
    }
  }

  /// Upstream request size for a block whose body holds `body_size` bytes.
  pub fn total_size(body_size: usize) -> Option<usize> {
    let total = HEADER_SIZE.checked_add(body_size)?;
    total.checked_add(mem::align_of::<Block>() - 1)?;
    Some(align_to!(total, mem::align_of::<Block>()))
  }

  /// # Safety
  ///
  /// `block` must point to a live, initialized header.
  #[inline]
  pub unsafe fn body(block: *mut Block) -> *mut u8 {
    unsafe { (block as *mut u8).add(HEADER_SIZE) }
  }

  /// Usable bytes after the header.
  #[inline]
  pub fn body_size(&self) -> usize {
    self.size - HEADER_SIZE
  }
}
