use std::mem;

/// Rounds `value` up to the next multiple of `alignment`, which must be a
/// power of two.
///
/// # Examples
///
/// ```rust
/// use seqalloc::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(16, 16), 16);
/// assert_eq!(align_to!(0, 4), 0);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $alignment:expr) => {
    ($value + $alignment - 1) & !($alignment - 1)
  };
}

/// A type whose alignment is the strictest of any fundamental type on the
/// platform.
#[repr(C)]
#[derive(Clone, Copy)]
pub union MaxAlignedType {
  _u128: u128,
  _f64: f64,
  _u64: u64,
  _usize: usize,
  _ptr: *const u8,
}

impl MaxAlignedType {
  /// All-zero value, handy for declaring maximally aligned storage.
  pub const ZEROED: Self = Self { _u128: 0 };
}

/// Alignment guaranteed for block bodies and for `AlignmentStrategy::Maximum`.
pub const MAX_ALIGNMENT: usize = mem::align_of::<MaxAlignedType>();

/// How a sequential allocator aligns the addresses it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlignmentStrategy {
  /// Align to the largest power of two dividing the request size, up to
  /// `MAX_ALIGNMENT`.
  #[default]
  Natural,
  /// Align every allocation to `MAX_ALIGNMENT`.
  Maximum,
  /// No alignment; allocations are packed back to back.
  ByteAligned,
}

impl AlignmentStrategy {
  /// Alignment required for a request of `size` bytes under this strategy.
  #[inline]
  pub fn alignment_for(
    self,
    size: usize,
  ) -> usize {
    match self {
      AlignmentStrategy::Natural => natural_alignment(size),
      AlignmentStrategy::Maximum => MAX_ALIGNMENT,
      AlignmentStrategy::ByteAligned => 1,
    }
  }
}

/// The lowest set bit of `size`, capped at `MAX_ALIGNMENT`.
///
/// An object of `size` bytes cannot require an alignment stricter than the
/// largest power of two that divides its size.
#[inline]
pub const fn natural_alignment(size: usize) -> usize {
  if size == 0 {
    return 1;
  }
  let lowest_bit = size & size.wrapping_neg();
  if lowest_bit > MAX_ALIGNMENT {
    MAX_ALIGNMENT
  } else {
    lowest_bit
  }
}

/// Bytes of padding needed to move `address` up to a multiple of `alignment`.
#[inline]
pub fn alignment_offset(
  address: usize,
  alignment: usize,
) -> usize {
  debug_assert!(alignment.is_power_of_two(), "alignment must be a power of two");
  align_to!(address, alignment) - address
}

#[inline]
pub fn is_aligned(
  address: usize,
  alignment: usize,
) -> bool {
  address & (alignment - 1) == 0
}
