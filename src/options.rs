use crate::align::AlignmentStrategy;

/// How a pool sizes the blocks it requests once its current buffer runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GrowthStrategy {
  /// Each new block is twice the size of the previous one, up to the
  /// maximum buffer size.
  #[default]
  Geometric,
  /// Every block has the size of the initial buffer.
  Constant,
}

/// Construction options for a `BufferedSequentialPool`.
///
/// ```rust
/// use seqalloc::{AlignmentStrategy, GrowthStrategy, PoolOptions};
///
/// let options = PoolOptions::new()
///   .growth_strategy(GrowthStrategy::Constant)
///   .alignment_strategy(AlignmentStrategy::Maximum)
///   .max_buffer_size(4096);
///
/// assert_eq!(options.max_buffer_size, Some(4096));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolOptions {
  pub growth_strategy: GrowthStrategy,
  pub alignment_strategy: AlignmentStrategy,
  /// Upper bound on the size of blocks obtained through growth. Requests
  /// larger than this get a block of their own. `None` means unbounded.
  pub max_buffer_size: Option<usize>,
}

impl PoolOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn growth_strategy(
    mut self,
    strategy: GrowthStrategy,
  ) -> Self {
    self.growth_strategy = strategy;
    self
  }

  pub fn alignment_strategy(
    mut self,
    strategy: AlignmentStrategy,
  ) -> Self {
    self.alignment_strategy = strategy;
    self
  }

  pub fn max_buffer_size(
    mut self,
    size: usize,
  ) -> Self {
    self.max_buffer_size = Some(size);
    self
  }
}
