use thiserror::Error;

pub type AllocResult<T> = Result<T, AllocError>;

/// Failure to obtain memory from an upstream allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum AllocError {
  #[error("upstream allocator could not supply {size} bytes")]
  OutOfMemory { size: usize },

  #[error("allocation request of {size} bytes overflows the address space")]
  SizeOverflow { size: usize },

  #[error("allocator returned memory not aligned to {alignment} bytes")]
  Misaligned { alignment: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DefaultAllocatorError {
  #[error("the default allocator is already installed and in use")]
  AlreadyInstalled,
}
