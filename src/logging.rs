//! Structured logging for block and pool events.
//!
//! Events go through `tracing`; nothing is printed unless the application
//! installs a subscriber, for instance with [`init_logging`].

use tracing::{debug, trace};

/// Environment variable holding the `EnvFilter` directives.
pub const LOG_ENV_VAR: &str = "SEQALLOC_LOG";

/// Installs a compact fmt subscriber filtered by `SEQALLOC_LOG`.
///
/// Without the variable, debug builds log `seqalloc=debug` and release builds
/// `seqalloc=info`. Does nothing if a global subscriber is already set.
pub fn init_logging() {
  use tracing_subscriber::{EnvFilter, fmt};

  let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| {
    if cfg!(debug_assertions) {
      EnvFilter::new("seqalloc=debug")
    } else {
      EnvFilter::new("seqalloc=info")
    }
  });

  fmt().with_env_filter(filter).compact().try_init().ok();
}

#[inline]
pub fn log_block_allocated(
  size: usize,
  address: *const u8,
) {
  trace!(
    target: "seqalloc::block_list",
    size,
    address = ?address,
    "obtained block from upstream"
  );
}

#[inline]
pub fn log_blocks_released(
  blocks: usize,
  bytes: usize,
) {
  if blocks == 0 {
    return;
  }
  trace!(
    target: "seqalloc::block_list",
    blocks,
    bytes,
    "returned blocks to upstream"
  );
}

#[inline]
pub fn log_pool_grown(
  block_size: usize,
  next_block_size: usize,
) {
  debug!(
    target: "seqalloc::pool",
    block_size,
    next_block_size,
    "installed new buffer"
  );
}

#[inline]
pub fn log_dedicated_block(size: usize) {
  debug!(
    target: "seqalloc::pool",
    size,
    "request served by a dedicated block"
  );
}

#[inline]
pub fn log_pool_released(kept_block: bool) {
  debug!(
    target: "seqalloc::pool",
    kept_block,
    "pool memory released"
  );
}
