//! A slab pool allocator for fixed-size segments and buckets.
//!
//! The pool keeps two independent chains of arena blocks, one for
//! [`Segment`]s and one for [`Bucket`]s. Each arena block is a single
//! anonymous mapping holding 512 items, an occupancy bitmap of eight 64-bit
//! words (bit `i % 64` of word `i / 64` for item `i`), a cached free count
//! and a link to the next block.
//!
//! Allocation walks the chain from the head, skips blocks whose free count
//! is zero, and claims the lowest clear bit of the first block that has one.
//! When no block has a free item, a freshly mapped block is appended to the
//! tail. Release locates the block whose items contain the pointer, checks
//! that it sits on an item boundary and clears its bit. Blocks are never
//! handed back to the operating system while the pool is alive.
//!
//! The bitmap words, free counts and chain links are all atomics, and every
//! update is a compare-and-swap or a fetch-and-modify, so the pool can be
//! used from many threads without any locking, just like the
//! [lock-free table](crate::lfht).

pub(crate) mod allocator;
pub(crate) mod arena;
pub(crate) mod stats;

pub use allocator::PoolAllocator;
pub use stats::{BlockStats, ChainStats, PoolStats};

use crate::common::constants::SEGMENT_LENGTH;

/// A fixed-length array of bucket chain heads, used as one slice of a
/// directory.
#[repr(C)]
#[derive(Debug)]
pub struct Segment {
    pub slots: [*mut Bucket; SEGMENT_LENGTH],
}

/// A hash chain node.
#[repr(C)]
#[derive(Debug)]
pub struct Bucket {
    pub key: usize,
    pub value: usize,
    pub next: *mut Bucket,
}
