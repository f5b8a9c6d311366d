//! # seqalloc - Sequential and Buffered Memory Allocators
//!
//! This crate provides region-based (arena) allocators built around a
//! **buffered sequential pool**: a bump allocator that first consumes a
//! buffer supplied by the caller and then grows through blocks obtained from
//! an upstream allocator.
//!
//! ## Overview
//!
//! ```text
//!   Buffered Sequential Pool:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │  caller's buffer (stack, static, ...)                                │
//!   │   ┌─────┬─────┬─────┬─────────┐                                      │
//!   │   │ A1  │ A2  │ A3  │ A4      │  exhausted                           │
//!   │   └─────┴─────┴─────┴─────────┘                                      │
//!   │                                                                      │
//!   │  blocks from the upstream allocator (owned by the pool)              │
//!   │   ┌──────┬─────┬─────┬─────────────┐                                 │
//!   │   │ hdr  │ A5  │ A6  │    free     │   block N   (size 2 * M)        │
//!   │   └──────┴─────┴─────┴─────────────┘           ▲                     │
//!   │   ┌──────┬──────────────┐                      │ bump pointer        │
//!   │   │ hdr  │ A4'          │                 block N-1 (size M)         │
//!   │   └──────┴──────────────┘                                            │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Allocation bumps a cursor: O(1). Deallocation is a no-op.
//!   Everything is returned at once by release(), rewind() or drop.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   seqalloc
//!   ├── align          - align_to!, alignment strategies, MAX_ALIGNMENT
//!   ├── allocator      - Allocator / ManagedAllocator protocols, malloc/free,
//!   │                    process default allocator
//!   ├── block          - block header (internal)
//!   ├── block_list     - InfrequentDeleteBlockList
//!   ├── bump           - BufferManager, the bump-pointer fast path
//!   ├── descriptor     - MemoryBlockDescriptor
//!   ├── error          - AllocError
//!   ├── factory        - Deleter / Factory protocols, DefaultDeleter
//!   ├── guard          - DestructorGuard, AutoScalarDestructor, DeleterGuard
//!   ├── logging        - tracing events and subscriber setup
//!   ├── options        - PoolOptions, GrowthStrategy
//!   ├── pool           - BufferedSequentialPool
//!   ├── reservation    - RateController, ReservationGuard
//!   └── test_allocator - instrumented upstream allocator
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use seqalloc::{BufferedSequentialPool, MallocFreeAllocator};
//!
//! let upstream = MallocFreeAllocator;
//! let mut buffer = [0u8; 256];
//! let mut pool = BufferedSequentialPool::new(&mut buffer, &upstream);
//!
//! let address = pool.allocate(std::mem::size_of::<u64>()).unwrap() as *mut u64;
//! unsafe {
//!   address.write(42);
//!   assert_eq!(address.read(), 42);
//! }
//!
//! // Goes upstream once the 256 bytes are used up.
//! let large = pool.allocate(1024).unwrap();
//! assert!(!large.is_null());
//!
//! // Frees every upstream block; the buffer is ready for reuse.
//! pool.release();
//! ```
//!
//! ## Blocks
//!
//! Each upstream request carries its own list link:
//!
//! ```text
//!   Single Block:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         Body                   │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ next: ptr/null  │  │  ┌──────────────────────────┐  │
//!   │  │ size: N         │  │  │  maximally aligned,      │  │
//!   │  └─────────────────┘  │  │  >= requested bytes      │  │
//!   │  MAX_ALIGNMENT padded │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to the pool
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: pools and block lists are not `Sync`
//! - **Bulk deallocation only**: individual `deallocate` calls are no-ops
//! - **Raw memory**: allocations are untyped pointers; placing and dropping
//!   values in them is the caller's job (see `new_object` and the guards)
//!
//! ## Safety
//!
//! Addresses handed out by a pool are valid until the pool is released,
//! rewound or dropped. Using them afterwards is undefined behavior.

pub mod align;
mod allocator;
mod block;
mod block_list;
mod bump;
mod descriptor;
mod error;
mod factory;
mod guard;
pub mod logging;
mod options;
mod pool;
mod reservation;
pub mod test_allocator;

pub use align::{AlignmentStrategy, MAX_ALIGNMENT, MaxAlignedType};
pub use allocator::{
  Allocator, MallocFreeAllocator, ManagedAllocator, default_allocator, delete_object, new_object,
  set_default_allocator,
};
pub use block_list::InfrequentDeleteBlockList;
pub use bump::BufferManager;
pub use descriptor::MemoryBlockDescriptor;
pub use error::{AllocError, AllocResult, DefaultAllocatorError};
pub use factory::{AllocatorFactory, DefaultDeleter, Deleter, Factory};
pub use guard::{AutoScalarDestructor, DeleterGuard, DestructorGuard};
pub use options::{GrowthStrategy, PoolOptions};
pub use pool::BufferedSequentialPool;
pub use reservation::{RateController, ReservationGuard};
pub use test_allocator::TestAllocator;
