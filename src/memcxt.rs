//! Pluggable memory contexts.
//!
//! A [`MemoryContext`] bundles an `allocate` and a `release` operation keyed
//! by a [`MemType`] tag. Code written against the trait can switch between
//! the pooled context and the system allocator without touching its call
//! sites.
//!
//! # Examples
//!
//! ```rust
//! use lfpool::memcxt::{pool_memcxt, sys_memcxt, MemType, MemoryContext};
//! use lfpool::pool::Bucket;
//!
//! fn roundtrip(cxt: &dyn MemoryContext) {
//!     let size = std::mem::size_of::<Bucket>();
//!     let bucket = cxt.allocate(MemType::Bucket, size).unwrap();
//!     unsafe { cxt.release(MemType::Bucket, bucket, size) }.unwrap();
//! }
//!
//! roundtrip(pool_memcxt());
//! roundtrip(sys_memcxt());
//! ```

use crate::{common::error::MemError, pool::PoolAllocator};

use std::{
    alloc::{self, Layout},
    fmt, mem,
    ptr::NonNull,
};

/// The kind of block requested from a [`MemoryContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemType {
    /// The top-level table of segment pointers. Allocated rarely and in
    /// caller-chosen sizes.
    Directory,
    /// A [`Segment`](crate::pool::Segment).
    Segment,
    /// A [`Bucket`](crate::pool::Bucket).
    Bucket,
}

impl MemType {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Segment => "segment",
            Self::Bucket => "bucket",
        }
    }
}

impl fmt::Display for MemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An allocation strategy for directories, segments and buckets.
///
/// Implementations must be safe to share between threads; callers may use
/// one context from any number of threads at once.
pub trait MemoryContext: Send + Sync {
    /// Allocates a block of at least `size` bytes. A `size` of zero is an
    /// error for every tag.
    ///
    /// Only fresh memory is zero-filled. A pooled `Segment` or
    /// `Bucket` that was released and handed out again keeps whatever its
    /// previous owner wrote.
    fn allocate(&self, tag: MemType, size: usize) -> Result<NonNull<u8>, MemError>;

    /// Releases a block obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `block` must have been returned by `allocate` on this same context
    /// with the same `tag` and `size`, must not have been released already,
    /// and must not be accessed afterwards. Pooled providers detect some
    /// violations and report them as errors, but are not required to.
    unsafe fn release(&self, tag: MemType, block: NonNull<u8>, size: usize) -> Result<(), MemError>;
}

/// Serves segments and buckets from the global [`PoolAllocator`] and maps
/// directories directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoolContext;

/// Serves every tag from the global allocator of the process.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemContext;

pub static POOL_MEMCXT: PoolContext = PoolContext;

pub static SYS_MEMCXT: SystemContext = SystemContext;

pub fn pool_memcxt() -> &'static dyn MemoryContext {
    &POOL_MEMCXT
}

pub fn sys_memcxt() -> &'static dyn MemoryContext {
    &SYS_MEMCXT
}

impl MemoryContext for PoolContext {
    fn allocate(&self, tag: MemType, size: usize) -> Result<NonNull<u8>, MemError> {
        PoolAllocator::global()?.allocate(tag, size)
    }

    unsafe fn release(&self, tag: MemType, block: NonNull<u8>, size: usize) -> Result<(), MemError> {
        PoolAllocator::global()?.release(tag, block, size)
    }
}

const SYSTEM_ALIGN: usize = mem::align_of::<usize>();

fn system_layout(tag: MemType, size: usize) -> Result<Layout, MemError> {
    if size == 0 {
        return Err(MemError::ZeroSize { tag });
    }
    Ok(Layout::from_size_align(size, SYSTEM_ALIGN)?)
}

impl MemoryContext for SystemContext {
    fn allocate(&self, tag: MemType, size: usize) -> Result<NonNull<u8>, MemError> {
        let layout = system_layout(tag, size)?;
        NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).ok_or(MemError::OutOfMemory { size })
    }

    unsafe fn release(&self, tag: MemType, block: NonNull<u8>, size: usize) -> Result<(), MemError> {
        let layout = system_layout(tag, size)?;
        alloc::dealloc(block.as_ptr(), layout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{pool_memcxt, sys_memcxt, MemType, MemoryContext};
    use crate::{
        common::{constants::DIRECTORY_LENGTH, error::MemError},
        pool::{Bucket, Segment},
    };

    use std::mem;

    fn sizes() -> [(MemType, usize); 3] {
        [
            (
                MemType::Directory,
                DIRECTORY_LENGTH * mem::size_of::<*mut Segment>(),
            ),
            (MemType::Segment, mem::size_of::<Segment>()),
            (MemType::Bucket, mem::size_of::<Bucket>()),
        ]
    }

    fn exercise(cxt: &dyn MemoryContext) {
        for (tag, size) in sizes() {
            let block = cxt.allocate(tag, size).unwrap();
            assert_eq!(block.as_ptr() as usize % mem::align_of::<usize>(), 0);

            let words =
                unsafe { std::slice::from_raw_parts_mut(block.as_ptr().cast::<usize>(), size / mem::size_of::<usize>()) };
            words[0] = 0xdead_beef;
            assert_eq!(words[0], 0xdead_beef);

            unsafe { cxt.release(tag, block, size) }.unwrap();
        }
    }

    #[test]
    fn pooled_context() {
        exercise(pool_memcxt());
    }

    #[test]
    fn system_context() {
        exercise(sys_memcxt());
    }

    #[test]
    fn both_contexts_reject_zero_size() {
        for cxt in [pool_memcxt(), sys_memcxt()] {
            for (tag, _) in sizes() {
                assert!(matches!(
                    cxt.allocate(tag, 0),
                    Err(MemError::ZeroSize { tag: t }) if t == tag
                ));
            }
        }
    }

    #[test]
    fn tag_names() {
        assert_eq!(MemType::Directory.to_string(), "directory");
        assert_eq!(MemType::Segment.to_string(), "segment");
        assert_eq!(MemType::Bucket.to_string(), "bucket");
    }
}
