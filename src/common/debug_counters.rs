#![cfg(feature = "unstable-debug-counters")]

use crossbeam_utils::atomic::AtomicCell;
use once_cell::sync::Lazy;

#[derive(Clone, Debug)]
pub struct GlobalDebugCounters {
    pub table_creation_count: u64,
    pub table_allocation_bytes: u64,
    pub table_drop_count: u64,
    pub table_release_bytes: u64,
    pub arena_block_creation_count: u64,
    pub arena_block_allocation_bytes: u64,
    pub arena_block_drop_count: u64,
    pub directory_creation_count: u64,
    pub directory_drop_count: u64,
}

impl GlobalDebugCounters {
    pub fn current() -> Self {
        InternalGlobalDebugCounters::current()
    }
}

static COUNTERS: Lazy<InternalGlobalDebugCounters> =
    Lazy::new(InternalGlobalDebugCounters::default);

#[derive(Default)]
pub(crate) struct InternalGlobalDebugCounters {
    table_creation_count: AtomicCell<u64>,
    table_allocation_bytes: AtomicCell<u64>,
    table_drop_count: AtomicCell<u64>,
    table_release_bytes: AtomicCell<u64>,
    arena_block_creation_count: AtomicCell<u64>,
    arena_block_allocation_bytes: AtomicCell<u64>,
    arena_block_drop_count: AtomicCell<u64>,
    directory_creation_count: AtomicCell<u64>,
    directory_drop_count: AtomicCell<u64>,
}

impl InternalGlobalDebugCounters {
    fn current() -> GlobalDebugCounters {
        let c = &COUNTERS;
        GlobalDebugCounters {
            table_creation_count: c.table_creation_count.load(),
            table_allocation_bytes: c.table_allocation_bytes.load(),
            table_drop_count: c.table_drop_count.load(),
            table_release_bytes: c.table_release_bytes.load(),
            arena_block_creation_count: c.arena_block_creation_count.load(),
            arena_block_allocation_bytes: c.arena_block_allocation_bytes.load(),
            arena_block_drop_count: c.arena_block_drop_count.load(),
            directory_creation_count: c.directory_creation_count.load(),
            directory_drop_count: c.directory_drop_count.load(),
        }
    }

    pub(crate) fn table_created(byte_size: u64) {
        COUNTERS.table_creation_count.fetch_add(1);
        COUNTERS.table_allocation_bytes.fetch_add(byte_size);
    }

    pub(crate) fn table_dropped(byte_size: u64) {
        COUNTERS.table_drop_count.fetch_add(1);
        COUNTERS.table_release_bytes.fetch_add(byte_size);
    }

    pub(crate) fn arena_block_created(byte_size: u64) {
        COUNTERS.arena_block_creation_count.fetch_add(1);
        COUNTERS.arena_block_allocation_bytes.fetch_add(byte_size);
    }

    pub(crate) fn arena_block_dropped() {
        COUNTERS.arena_block_drop_count.fetch_add(1);
    }

    pub(crate) fn directory_created() {
        COUNTERS.directory_creation_count.fetch_add(1);
    }

    pub(crate) fn directory_dropped() {
        COUNTERS.directory_drop_count.fetch_add(1);
    }
}
