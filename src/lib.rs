#![warn(clippy::all)]
#![warn(rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Building blocks for concurrent key/value stores.
//!
//! - [`lfht::Table`]: a fixed-capacity, lock-free, open-addressed hash table
//!   from non-zero machine words to machine words. Insert, update and lookup
//!   never block; a full table reports failure instead of growing.
//! - [`pool::PoolAllocator`]: a lock-free slab allocator that hands out
//!   fixed-size [`Segment`](pool::Segment)s and [`Bucket`](pool::Bucket)s
//!   from grow-only chains of memory-mapped arena blocks, tracking occupancy
//!   with bitmaps.
//! - [`memcxt::MemoryContext`]: an allocate/release capability keyed by a
//!   [`MemType`](memcxt::MemType), with a pooled and a system-allocator
//!   provider, so that structures built on top can swap allocation strategy
//!   without changing call sites.
//!
//! Storage for both the table and the pool comes straight from anonymous
//! memory mappings, so this crate only supports Unix-like targets.
//!
//! # Example
//!
//! ```rust
//! use lfpool::lfht::Table;
//! use std::{sync::Arc, thread};
//!
//! let table = Arc::new(Table::with_capacity(1024).unwrap());
//!
//! let threads: Vec<_> = (0..4_usize)
//!     .map(|i| {
//!         let table = Arc::clone(&table);
//!         thread::spawn(move || {
//!             for key in (1..=100).map(|k| k + i * 100) {
//!                 assert!(table.insert(key, key * 2));
//!             }
//!         })
//!     })
//!     .collect();
//!
//! threads.into_iter().for_each(|t| t.join().unwrap());
//!
//! assert_eq!(table.find(250), Some(500));
//! assert_eq!(table.find(1000), None);
//! assert!(table.update(250, 1));
//! assert_eq!(table.find(250), Some(1));
//! ```
//!
//! # Crate features
//!
//! - `logging`: emit `log` records on table and arena lifecycle events and on
//!   rejected releases.
//! - `unstable-debug-counters`: adds [`GlobalDebugCounters`], which counts
//!   mappings made by the crate. Intended for debugging.

pub mod lfht;
pub mod lookup;
pub mod memcxt;
pub mod pool;

pub(crate) mod common;

pub use common::constants::{ARENA_LENGTH, DIRECTORY_LENGTH, RESIZE_RATIO, SEGMENT_LENGTH};
pub use common::error::{MemError, TableError};

#[cfg(feature = "unstable-debug-counters")]
#[cfg_attr(docsrs, doc(cfg(feature = "unstable-debug-counters")))]
pub use common::debug_counters::GlobalDebugCounters;
