use super::{arena::ArenaChain, stats::PoolStats, Bucket, Segment};
use crate::{
    common::{constants::DIRECTORY_LENGTH, error::MemError, mmap},
    memcxt::{MemType, MemoryContext},
};

#[cfg(feature = "unstable-debug-counters")]
use crate::common::debug_counters::InternalGlobalDebugCounters as Counters;

use std::{
    fmt, mem,
    ptr::{self, NonNull},
    sync::atomic::{AtomicPtr, Ordering},
};

use once_cell::sync::OnceCell;

static GLOBAL: OnceCell<PoolAllocator> = OnceCell::new();

/// Hands out [`Segment`]s and [`Bucket`]s from two grow-only arena chains and
/// maps directories directly.
///
/// All methods take `&self` and are lock-free; a `PoolAllocator` can be
/// shared between threads without external locking.
///
/// Every pool starts with a default directory of
/// [`DEFAULT_DIRECTORY_SIZE`](Self::DEFAULT_DIRECTORY_SIZE) bytes.
pub struct PoolAllocator {
    /// The most recently mapped directory, if it has not been released.
    directory: AtomicPtr<u8>,
    /// The directory mapped by `new`, until someone releases it.
    default_directory: AtomicPtr<u8>,
    segments: ArenaChain<Segment>,
    buckets: ArenaChain<Bucket>,
}

impl PoolAllocator {
    /// Byte size of the directory every pool maps at creation: one segment
    /// pointer per directory slot.
    pub const DEFAULT_DIRECTORY_SIZE: usize = DIRECTORY_LENGTH * mem::size_of::<*mut Segment>();

    /// Creates a private pool with one empty arena block per chain and a
    /// default directory.
    ///
    /// Dropping the pool unmaps all of its arena blocks and, unless it was
    /// released earlier, the default directory, so everything it handed out
    /// must be dead by then. Other directories are not tracked for dropping;
    /// release them through the pool.
    pub fn new() -> Result<Self, MemError> {
        let pool = Self {
            directory: AtomicPtr::new(ptr::null_mut()),
            default_directory: AtomicPtr::new(ptr::null_mut()),
            segments: ArenaChain::new(MemType::Segment)?,
            buckets: ArenaChain::new(MemType::Bucket)?,
        };
        let directory = pool.allocate_directory(Self::DEFAULT_DIRECTORY_SIZE)?;
        pool.default_directory.store(directory.as_ptr(), Ordering::Release);
        Ok(pool)
    }

    /// The process-wide pool, created on first use. Its arenas live for the
    /// rest of the process.
    pub fn global() -> Result<&'static Self, MemError> {
        GLOBAL.get_or_try_init(|| {
            #[cfg(feature = "logging")]
            log::debug!("initializing the global pool allocator");

            Self::new()
        })
    }

    pub fn allocate_segment(&self) -> Result<NonNull<Segment>, MemError> {
        self.segments.allocate()
    }

    /// Returns a segment to its arena. Fails without side effects if the
    /// pointer was not handed out by this pool or is already free.
    pub fn release_segment(&self, segment: NonNull<Segment>) -> Result<(), MemError> {
        let result = self.segments.release(segment);
        log_misuse(&result);
        result
    }

    pub fn allocate_bucket(&self) -> Result<NonNull<Bucket>, MemError> {
        self.buckets.allocate()
    }

    /// Returns a bucket to its arena. Fails without side effects if the
    /// pointer was not handed out by this pool or is already free.
    pub fn release_bucket(&self, bucket: NonNull<Bucket>) -> Result<(), MemError> {
        let result = self.buckets.release(bucket);
        log_misuse(&result);
        result
    }

    /// Maps a zero-filled directory of `size` bytes and remembers it as the
    /// pool's current directory.
    pub fn allocate_directory(&self, size: usize) -> Result<NonNull<u8>, MemError> {
        if size == 0 {
            return Err(MemError::ZeroSize {
                tag: MemType::Directory,
            });
        }

        let directory =
            mmap::map_anonymous(size).map_err(|source| MemError::Map { size, source })?;
        self.directory.store(directory.as_ptr(), Ordering::Release);

        #[cfg(feature = "unstable-debug-counters")]
        Counters::directory_created();

        #[cfg(feature = "logging")]
        log::trace!("mapped a {size} byte directory at {directory:p}");

        Ok(directory)
    }

    /// Unmaps a directory.
    ///
    /// # Safety
    ///
    /// `directory` must have been returned by `allocate_directory` with the
    /// same `size`, must not have been released already, and must not be
    /// accessed afterwards.
    pub unsafe fn release_directory(
        &self,
        directory: NonNull<u8>,
        size: usize,
    ) -> Result<(), MemError> {
        // Forget it only if it is still the current one.
        let _ = self.directory.compare_exchange(
            directory.as_ptr(),
            ptr::null_mut(),
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
        let _ = self.default_directory.compare_exchange(
            directory.as_ptr(),
            ptr::null_mut(),
            Ordering::AcqRel,
            Ordering::Relaxed,
        );

        unmap_directory(directory, size)
    }

    /// The most recently allocated directory that has not been released.
    pub fn directory(&self) -> Option<NonNull<u8>> {
        NonNull::new(self.directory.load(Ordering::Acquire))
    }

    pub fn segment_block_count(&self) -> usize {
        self.segments.block_count()
    }

    pub fn bucket_block_count(&self) -> usize {
        self.buckets.block_count()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            segments: self.segments.stats(),
            buckets: self.buckets.stats(),
        }
    }
}

impl Drop for PoolAllocator {
    fn drop(&mut self) {
        if let Some(directory) = NonNull::new(*self.default_directory.get_mut()) {
            let _ = unsafe { unmap_directory(directory, Self::DEFAULT_DIRECTORY_SIZE) };
        }
    }
}

// Safety: `directory` must be a live mapping of `size` bytes that nothing
// accesses afterwards.
unsafe fn unmap_directory(directory: NonNull<u8>, size: usize) -> Result<(), MemError> {
    #[cfg(feature = "unstable-debug-counters")]
    Counters::directory_dropped();

    #[cfg(feature = "logging")]
    log::trace!("unmapping the {size} byte directory at {directory:p}");

    mmap::unmap(directory, size).map_err(|source| MemError::Unmap { size, source })
}

fn log_misuse(_result: &Result<(), MemError>) {
    #[cfg(feature = "logging")]
    if let Err(e) = _result {
        log::warn!("rejected pool release: {e}");
    }
}

fn check_item_size(tag: MemType, size: usize, max: usize) -> Result<(), MemError> {
    if size == 0 {
        return Err(MemError::ZeroSize { tag });
    }
    if size > max {
        return Err(MemError::SizeMismatch { tag, size, max });
    }
    Ok(())
}

impl MemoryContext for PoolAllocator {
    fn allocate(&self, tag: MemType, size: usize) -> Result<NonNull<u8>, MemError> {
        match tag {
            MemType::Directory => self.allocate_directory(size),
            MemType::Segment => {
                check_item_size(tag, size, mem::size_of::<Segment>())?;
                self.allocate_segment().map(NonNull::cast)
            }
            MemType::Bucket => {
                check_item_size(tag, size, mem::size_of::<Bucket>())?;
                self.allocate_bucket().map(NonNull::cast)
            }
        }
    }

    unsafe fn release(&self, tag: MemType, block: NonNull<u8>, size: usize) -> Result<(), MemError> {
        match tag {
            MemType::Directory => self.release_directory(block, size),
            MemType::Segment => {
                check_item_size(tag, size, mem::size_of::<Segment>())?;
                self.release_segment(block.cast())
            }
            MemType::Bucket => {
                check_item_size(tag, size, mem::size_of::<Bucket>())?;
                self.release_bucket(block.cast())
            }
        }
    }
}

impl fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("directory", &self.directory())
            .field("segment_blocks", &self.segment_block_count())
            .field("bucket_blocks", &self.bucket_block_count())
            .finish()
    }
}
