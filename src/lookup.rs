//! The contract of an arena-pointer lookup service.
//!
//! An allocator that replaces a general-purpose one must be able to tell,
//! for any pointer it is asked to free or resize, which of its arenas owns
//! it. Nothing in this crate implements [`ArenaLookup`]; the trait pins down
//! what the pool and table expect from such a service when they are used
//! underneath a replacement allocator.
//!
//! Secondary heaps are aligned to [`HEAP_MAX_SIZE`], which must be a power
//! of two, so the heap that may own a pointer is found by masking the
//! pointer ([`heap_for_ptr`]).

/// Smallest mapped secondary heap.
pub const HEAP_MIN_SIZE: usize = 32 * 1024;

/// Size and alignment of every secondary heap.
pub const HEAP_MAX_SIZE: usize = 1024 * 1024;

/// The arena that owns a pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArenaIndex {
    /// A large, standalone mapped region of the main arena.
    Mapped,
    /// The main arena's growable region.
    Main,
    /// A numbered secondary arena. Numbers start at 2.
    Secondary(usize),
}

impl ArenaIndex {
    /// The numeric encoding: 0 for [`Mapped`](Self::Mapped), 1 for
    /// [`Main`](Self::Main), `n > 1` for secondary arena `n`.
    pub fn as_usize(self) -> usize {
        match self {
            Self::Mapped => 0,
            Self::Main => 1,
            Self::Secondary(n) => n,
        }
    }

    pub fn from_usize(n: usize) -> Self {
        match n {
            0 => Self::Mapped,
            1 => Self::Main,
            n => Self::Secondary(n),
        }
    }
}

/// Base address of the secondary heap that would contain `ptr`.
pub fn heap_for_ptr(ptr: *const u8) -> usize {
    ptr as usize & !(HEAP_MAX_SIZE - 1)
}

/// Tracks the regions of each arena and maps pointers back to them.
///
/// Registration methods return `false` when the request is inconsistent
/// with what is already tracked, such as removing an unknown region.
pub trait ArenaLookup: Send + Sync {
    /// The arena owning `ptr`, or `None` if no tracked region contains it.
    fn arena_index(&self, ptr: *const u8) -> Option<ArenaIndex>;

    /// Records the low end of the main arena's growable region.
    fn set_main_low(&self, ptr: *const u8) -> bool;

    /// Moves the high end of the main growable region up by `incr` bytes.
    fn grow_main(&self, incr: usize) -> bool;

    /// Moves the high end of the main growable region down by `decr` bytes.
    fn shrink_main(&self, decr: usize) -> bool;

    /// Adds a discontiguous `[lo, hi)` region to the main arena.
    fn add_main_region(&self, lo: *const u8, hi: *const u8) -> bool;

    /// Registers the secondary heap at `heap` as belonging to arena `index`.
    fn add_heap(&self, heap: *const u8, index: usize) -> bool;

    fn remove_heap(&self, heap: *const u8) -> bool;

    /// Registers a standalone mapping of `size` bytes at `ptr`.
    fn add_mapping(&self, ptr: *const u8, size: usize) -> bool;

    fn remove_mapping(&self, ptr: *const u8) -> bool;
}
