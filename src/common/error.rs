use std::{alloc::LayoutError, io};

use crate::memcxt::MemType;

/// The error type for creating, destroying and mutating a
/// [`Table`](crate::lfht::Table).
#[derive(thiserror::Error, Debug)]
pub enum TableError {
    /// A table must hold at least one entry.
    #[error("table capacity must be non-zero")]
    ZeroCapacity,

    /// The requested capacity cannot be rounded up to a power of two, or the
    /// table would not fit in the address space.
    #[error("table capacity {capacity} is too large")]
    CapacityOverflow { capacity: usize },

    /// Zero marks a never-used slot, so it cannot be stored as a key.
    #[error("zero is not a valid table key")]
    ZeroKey,

    /// Every slot was probed without finding the key or an empty slot.
    #[error("table of capacity {capacity} is full")]
    TableFull { capacity: usize },

    /// `update` was asked to change a key that is not in the table.
    #[error("key is not present in the table")]
    KeyNotFound,

    #[error("failed to map table storage")]
    Map(#[source] io::Error),

    #[error("failed to unmap table storage")]
    Unmap(#[source] io::Error),
}

/// The error type for [`MemoryContext`](crate::memcxt::MemoryContext)
/// providers.
#[derive(thiserror::Error, Debug)]
pub enum MemError {
    #[error("failed to map {size} bytes")]
    Map {
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to unmap {size} bytes")]
    Unmap {
        size: usize,
        #[source]
        source: io::Error,
    },

    /// The system allocator could not satisfy the request.
    #[error("out of memory allocating {size} bytes")]
    OutOfMemory { size: usize },

    #[error("invalid layout")]
    Layout(#[from] LayoutError),

    #[error("cannot allocate a zero-sized {tag}")]
    ZeroSize { tag: MemType },

    /// A pooled item was requested or released with a size larger than the
    /// pool's item size.
    #[error("{tag} size {size} exceeds the pooled item size {max}")]
    SizeMismatch {
        tag: MemType,
        size: usize,
        max: usize,
    },

    /// No arena block in the chain contains the released pointer.
    #[error("{tag} at {addr:#x} is not owned by this pool")]
    NotOwned { tag: MemType, addr: usize },

    /// The pointer lies inside an arena block but not on an item boundary.
    #[error("{tag} at {addr:#x} is not aligned to an item boundary")]
    Misaligned { tag: MemType, addr: usize },

    /// The item's occupancy bit was already clear (double release).
    #[error("{tag} at {addr:#x} is not currently allocated")]
    NotAllocated { tag: MemType, addr: usize },
}
