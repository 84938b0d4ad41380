use super::stats::{BlockStats, ChainStats};
use crate::{
    common::{
        constants::{ARENA_LENGTH, ARENA_SCALE},
        error::MemError,
        mmap,
    },
    memcxt::MemType,
};

#[cfg(feature = "unstable-debug-counters")]
use crate::common::debug_counters::InternalGlobalDebugCounters as Counters;

use std::{
    cell::UnsafeCell,
    iter,
    mem::{self, MaybeUninit},
    ptr::{self, NonNull},
    sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering},
};

use smallvec::SmallVec;

/// A slab of `ARENA_LENGTH` items of type `T` with one occupancy bit per
/// item. Always lives in its own anonymous mapping.
#[repr(C)]
pub(crate) struct ArenaBlock<T> {
    /// Cached number of clear bits. May briefly lag behind the bitmasks
    /// while an allocation or release is in flight.
    free_count: AtomicUsize,
    next: AtomicPtr<ArenaBlock<T>>,
    /// Zero means free; one means in use.
    bitmasks: [AtomicU64; ARENA_SCALE],
    pool: UnsafeCell<[MaybeUninit<T>; ARENA_LENGTH]>,
}

impl<T> ArenaBlock<T> {
    pub(crate) const SIZE: usize = mem::size_of::<Self>();

    fn map() -> Result<NonNull<Self>, MemError> {
        let block = mmap::map_anonymous(Self::SIZE)
            .map_err(|source| MemError::Map {
                size: Self::SIZE,
                source,
            })?
            .cast::<Self>();

        // A zero-filled block already has a null `next` and clear bitmasks.
        unsafe { block.as_ref() }
            .free_count
            .store(ARENA_LENGTH, Ordering::Relaxed);

        #[cfg(feature = "unstable-debug-counters")]
        Counters::arena_block_created(Self::SIZE as u64);

        Ok(block)
    }

    // Safety: `block` must come from `map` and must not be reachable from any
    // chain.
    unsafe fn unmap(block: NonNull<Self>) -> Result<(), MemError> {
        #[cfg(feature = "unstable-debug-counters")]
        Counters::arena_block_dropped();

        mmap::unmap(block.cast(), Self::SIZE).map_err(|source| MemError::Unmap {
            size: Self::SIZE,
            source,
        })
    }

    /// Claims the lowest free item, if any.
    fn claim(&self) -> Option<NonNull<T>> {
        if self.free_count.load(Ordering::Relaxed) == 0 {
            return None;
        }

        for (word_index, word) in self.bitmasks.iter().enumerate() {
            let mut bits = word.load(Ordering::Relaxed);

            while bits != u64::MAX {
                let bit = (!bits).trailing_zeros() as usize;

                match word.compare_exchange_weak(
                    bits,
                    bits | (1 << bit),
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        self.free_count.fetch_sub(1, Ordering::Relaxed);
                        return Some(self.item(word_index * 64 + bit));
                    }
                    // Someone else changed this word. Look again.
                    Err(actual) => bits = actual,
                }
            }
        }

        None
    }

    /// Clears the occupancy bit of the item at `index`. Returns `false` if the
    /// bit was already clear.
    fn release(&self, index: usize) -> bool {
        let mask = 1_u64 << (index % 64);

        // Count first so that `free_count` never drops below the number of
        // items a concurrent `claim` can still take.
        self.free_count.fetch_add(1, Ordering::Relaxed);
        let previous = self.bitmasks[index / 64].fetch_and(!mask, Ordering::Release);

        if previous & mask == 0 {
            self.free_count.fetch_sub(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    fn item(&self, index: usize) -> NonNull<T> {
        debug_assert!(index < ARENA_LENGTH);
        unsafe { NonNull::new_unchecked(self.pool.get().cast::<T>().add(index)) }
    }

    /// Byte offset of `addr` from the first item, if `addr` falls inside this
    /// block's items.
    fn offset_of(&self, addr: usize) -> Option<usize> {
        let base = self.pool.get() as usize;
        let end = base + ARENA_LENGTH * mem::size_of::<T>();
        (base..end).contains(&addr).then(|| addr - base)
    }

    fn stats(&self) -> BlockStats {
        let used = self
            .bitmasks
            .iter()
            .map(|word| word.load(Ordering::Relaxed).count_ones() as usize)
            .sum();

        BlockStats {
            free_count: self.free_count.load(Ordering::Relaxed),
            used,
        }
    }
}

/// A grow-only chain of arena blocks handing out items of type `T`.
///
/// Allocation and release never lock. Items are claimed with a CAS on a
/// bitmask word and released with a `fetch_and`. When every block is full
/// a new block is appended by a CAS on the tail's `next` pointer. Blocks are
/// never unmapped while the chain is alive.
pub(crate) struct ArenaChain<T> {
    tag: MemType,
    head: NonNull<ArenaBlock<T>>,
    len: AtomicUsize,
}

// Blocks are only reached through atomics or through the items handed out,
// which belong to their callers.
unsafe impl<T> Send for ArenaChain<T> {}
unsafe impl<T> Sync for ArenaChain<T> {}

impl<T> ArenaChain<T> {
    pub(crate) fn new(tag: MemType) -> Result<Self, MemError> {
        debug_assert!(mem::size_of::<T>() > 0);

        Ok(Self {
            tag,
            head: ArenaBlock::map()?,
            len: AtomicUsize::new(1),
        })
    }

    fn blocks(&self) -> impl Iterator<Item = &ArenaBlock<T>> + '_ {
        iter::successors(Some(unsafe { self.head.as_ref() }), |block| unsafe {
            block.next.load(Ordering::Acquire).as_ref()
        })
    }

    pub(crate) fn block_count(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub(crate) fn allocate(&self) -> Result<NonNull<T>, MemError> {
        let mut spare: Option<NonNull<ArenaBlock<T>>> = None;
        let mut current = unsafe { self.head.as_ref() };

        let result = loop {
            if let Some(item) = current.claim() {
                break Ok(item);
            }

            let next = current.next.load(Ordering::Acquire);
            if let Some(next_ref) = unsafe { next.as_ref() } {
                current = next_ref;
                continue;
            }

            // Every block is full. Append a new one to the tail.
            let new_block = match spare.take() {
                Some(block) => block,
                None => match ArenaBlock::map() {
                    Ok(block) => block,
                    Err(e) => break Err(e),
                },
            };

            match current.next.compare_exchange(
                ptr::null_mut(),
                new_block.as_ptr(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let _len = self.len.fetch_add(1, Ordering::Relaxed) + 1;

                    #[cfg(feature = "logging")]
                    log::debug!("{} pool grew to {_len} arena blocks", self.tag);

                    current = unsafe { new_block.as_ref() };
                }
                Err(appended) => {
                    // Another thread appended first. Keep ours in case that
                    // block fills up too.
                    spare = Some(new_block);
                    current = unsafe { &*appended };
                }
            }
        };

        if let Some(block) = spare {
            let _ = unsafe { ArenaBlock::unmap(block) };
        }

        result
    }

    pub(crate) fn release(&self, item: NonNull<T>) -> Result<(), MemError> {
        let addr = item.as_ptr() as usize;

        for block in self.blocks() {
            let Some(offset) = block.offset_of(addr) else {
                continue;
            };

            if offset % mem::size_of::<T>() != 0 {
                return Err(MemError::Misaligned {
                    tag: self.tag,
                    addr,
                });
            }

            return if block.release(offset / mem::size_of::<T>()) {
                Ok(())
            } else {
                Err(MemError::NotAllocated {
                    tag: self.tag,
                    addr,
                })
            };
        }

        Err(MemError::NotOwned {
            tag: self.tag,
            addr,
        })
    }

    pub(crate) fn stats(&self) -> ChainStats {
        ChainStats {
            tag: self.tag,
            item_size: mem::size_of::<T>(),
            block_size: ArenaBlock::<T>::SIZE,
            blocks: self.blocks().map(ArenaBlock::stats).collect::<SmallVec<_>>(),
        }
    }
}

impl<T> Drop for ArenaChain<T> {
    fn drop(&mut self) {
        let mut block = Some(self.head);
        while let Some(this) = block {
            block = NonNull::new(unsafe { this.as_ref() }.next.load(Ordering::Acquire));
            let _ = unsafe { ArenaBlock::unmap(this) };
        }
    }
}
