/// Number of 64-bit bitmask words per arena block.
pub(crate) const ARENA_SCALE: usize = 8;

/// Items per arena block; one for every bit in the bitmask.
pub const ARENA_LENGTH: usize = ARENA_SCALE * 64;

/// Pointer-sized slots in a [`Segment`](crate::pool::Segment).
pub const SEGMENT_LENGTH: usize = 256;

/// Pointer-sized slots in a default-sized directory.
pub const DIRECTORY_LENGTH: usize = 1024;

/// Fraction of a table's capacity reported as its resize threshold.
pub const RESIZE_RATIO: f64 = 0.75;

// The key value of a slot that has never been claimed.
pub(crate) const EMPTY_KEY: usize = 0;
