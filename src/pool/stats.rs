use crate::{
    common::{constants::ARENA_LENGTH, mmap},
    memcxt::MemType,
};

use std::fmt;

use smallvec::SmallVec;

/// Occupancy of one arena block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockStats {
    /// The block's cached free-item count.
    pub free_count: usize,
    /// Number of set bits in the block's bitmasks.
    pub used: usize,
}

/// Occupancy of one arena chain, block by block from the head.
#[derive(Clone, Debug)]
pub struct ChainStats {
    pub tag: MemType,
    pub item_size: usize,
    /// Byte size of one arena block's mapping.
    pub block_size: usize,
    pub blocks: SmallVec<[BlockStats; 4]>,
}

impl ChainStats {
    /// Items the chain can hold without growing.
    pub fn capacity(&self) -> usize {
        self.blocks.len() * ARENA_LENGTH
    }

    pub fn used_items(&self) -> usize {
        self.blocks.iter().map(|b| b.used).sum()
    }

    /// Free items according to the bitmasks.
    pub fn free_items(&self) -> usize {
        self.capacity() - self.used_items()
    }
}

/// A snapshot of a [`PoolAllocator`](super::PoolAllocator). Taken without
/// stopping concurrent allocations, so it may mix before and after states.
#[derive(Clone, Debug)]
pub struct PoolStats {
    pub segments: ChainStats,
    pub buckets: ChainStats,
}

impl fmt::Display for ChainStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pages = self.block_size as f64 / mmap::page_size() as f64;
        writeln!(
            f,
            "{}: {} byte items, {} byte blocks ({pages:.2} pages)",
            self.tag, self.item_size, self.block_size
        )?;
        for (i, block) in self.blocks.iter().enumerate() {
            writeln!(
                f,
                "  block {i}: {} used, {} free",
                block.used, block.free_count
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.segments, self.buckets)
    }
}
