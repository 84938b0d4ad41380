use super::{builder::TableBuilder, probe::Probe};
use crate::common::{constants::EMPTY_KEY, error::TableError, hash::hash_word, mmap};

#[cfg(feature = "unstable-debug-counters")]
use crate::common::debug_counters::InternalGlobalDebugCounters as Counters;

use std::{
    fmt, io,
    mem::{self, ManuallyDrop},
    ptr::{self, NonNull},
    slice,
    sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering},
};

use crossbeam_utils::CachePadded;

/// Lives at the start of a table's mapping, followed by the entry array.
#[repr(C)]
pub(crate) struct TableHeader {
    /// Byte size of the whole mapping.
    size: usize,
    /// Number of entries. Always a power of two.
    max: usize,
    threshold: usize,
    /// Set by a growth layer once this table has been superseded.
    assimilated: AtomicBool,
    next: AtomicPtr<TableHeader>,
    count: CachePadded<AtomicUsize>,
}

#[repr(C)]
pub(crate) struct Entry {
    pub(crate) key: AtomicUsize,
    pub(crate) val: AtomicUsize,
}

#[cfg(test)]
impl Entry {
    pub(crate) fn with_key(key: usize) -> Self {
        Self {
            key: AtomicUsize::new(key),
            val: AtomicUsize::new(0),
        }
    }
}

const ENTRIES_OFFSET: usize = {
    let align = mem::align_of::<Entry>();
    (mem::size_of::<TableHeader>() + align - 1) & !(align - 1)
};

/// Outcome of a successful [`Table::try_insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insertion {
    /// A new slot was claimed for the key.
    Inserted,
    /// The key already had a slot; its value was left untouched.
    AlreadyPresent,
}

/// Opaque identity of a table, used to link a table to its successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TableId(usize);

/// A fixed-capacity, lock-free, open-addressed map from non-zero machine
/// words to machine words.
///
/// The table owns a single anonymous memory mapping holding its header and
/// entries. All operations take `&self` and may be called from any number of
/// threads at once.
pub struct Table {
    header: NonNull<TableHeader>,
}

// The mapping is owned exclusively by this handle and every shared field in
// it is atomic.
unsafe impl Send for Table {}
unsafe impl Sync for Table {}

impl Table {
    /// Creates a table with room for `capacity` entries, rounded up to the
    /// next power of two.
    pub fn with_capacity(capacity: usize) -> Result<Self, TableError> {
        TableBuilder::new(capacity).build()
    }

    pub fn builder(capacity: usize) -> TableBuilder {
        TableBuilder::new(capacity)
    }

    pub(crate) fn with_everything(capacity: usize, resize_ratio: f64) -> Result<Self, TableError> {
        if capacity == 0 {
            return Err(TableError::ZeroCapacity);
        }

        let max = capacity
            .checked_next_power_of_two()
            .ok_or(TableError::CapacityOverflow { capacity })?;
        let size = max
            .checked_mul(mem::size_of::<Entry>())
            .and_then(|n| n.checked_add(ENTRIES_OFFSET))
            .ok_or(TableError::CapacityOverflow { capacity })?;

        let header = mmap::map_anonymous(size)
            .map_err(TableError::Map)?
            .cast::<TableHeader>();

        // The entries need no initialization: a zero-filled entry is an
        // empty slot.
        unsafe {
            ptr::write(
                header.as_ptr(),
                TableHeader {
                    size,
                    max,
                    threshold: ((max as f64 * resize_ratio) as usize).max(1),
                    assimilated: AtomicBool::new(false),
                    next: AtomicPtr::new(ptr::null_mut()),
                    count: CachePadded::new(AtomicUsize::new(0)),
                },
            );
        }

        #[cfg(feature = "unstable-debug-counters")]
        Counters::table_created(size as u64);

        #[cfg(feature = "logging")]
        log::debug!("created table at {header:p}: capacity {max}, {size} bytes mapped");

        Ok(Self { header })
    }

    /// Unmaps the table's storage, reporting whether the operating system
    /// accepted the release.
    pub fn destroy(self) -> Result<(), TableError> {
        let this = ManuallyDrop::new(self);
        unsafe { this.unmap() }.map_err(TableError::Unmap)
    }

    // Safety: must be called at most once, and the table must not be used
    // afterwards.
    unsafe fn unmap(&self) -> io::Result<()> {
        let size = self.header().size;

        #[cfg(feature = "unstable-debug-counters")]
        Counters::table_dropped(size as u64);

        #[cfg(feature = "logging")]
        log::debug!("destroying table at {:p}", self.header);

        mmap::unmap(self.header.cast(), size)
    }

    fn header(&self) -> &TableHeader {
        unsafe { self.header.as_ref() }
    }

    fn entries(&self) -> &[Entry] {
        unsafe {
            let first = self
                .header
                .as_ptr()
                .cast::<u8>()
                .add(ENTRIES_OFFSET)
                .cast::<Entry>();
            slice::from_raw_parts(first, self.header().max)
        }
    }

    fn probe(&self, key: usize) -> Probe<'_> {
        Probe::new(self.entries(), hash_word(key))
    }
}

// Accessors.
impl Table {
    /// The maximum number of distinct keys. Always a power of two.
    pub fn capacity(&self) -> usize {
        self.header().max
    }

    /// `capacity() * resize_ratio`, rounded down but never below one, so an
    /// empty table never needs a resize. Informational; the table never acts
    /// on it.
    pub fn threshold(&self) -> usize {
        self.header().threshold
    }

    /// Number of slots claimed so far. Keys are never removed, so this only
    /// grows.
    pub fn len(&self) -> usize {
        self.header().count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the live-entry count has reached the resize threshold.
    pub fn needs_resize(&self) -> bool {
        self.len() >= self.threshold()
    }

    /// Byte size of the table's mapping, header included.
    pub fn mapped_size(&self) -> usize {
        self.header().size
    }

    pub fn id(&self) -> TableId {
        TableId(self.header.as_ptr() as usize)
    }

    pub fn is_assimilated(&self) -> bool {
        self.header().assimilated.load(Ordering::Acquire)
    }

    /// Flags this table as superseded. Only a growth layer sets this.
    pub fn mark_assimilated(&self) {
        self.header().assimilated.store(true, Ordering::Release);
    }

    /// Links `successor` as the table that supersedes this one. Returns
    /// `false` if a successor was already linked.
    pub fn link_successor(&self, successor: &Table) -> bool {
        self.header()
            .next
            .compare_exchange(
                ptr::null_mut(),
                successor.header.as_ptr(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn successor(&self) -> Option<TableId> {
        let next = self.header().next.load(Ordering::Acquire);
        (!next.is_null()).then(|| TableId(next as usize))
    }
}

// Operations.
impl Table {
    /// Claims a slot for `key` and stores `val` in it. If `key` is already
    /// present the stored value is left untouched and the call still
    /// succeeds.
    pub fn try_insert(&self, key: usize, val: usize) -> Result<Insertion, TableError> {
        if key == EMPTY_KEY {
            return Err(TableError::ZeroKey);
        }

        let mut probe = self.probe(key);
        while let Some((this_entry, this_key)) = probe.next() {
            if this_key == key {
                return Ok(Insertion::AlreadyPresent);
            }

            if this_key != EMPTY_KEY {
                // Different key. Try next slot.
                continue;
            }

            if self.claim(this_entry, key, val) {
                return Ok(Insertion::Inserted);
            }
            // Lost the race for this slot. It now holds some key, possibly
            // ours; look at it again.
            probe.reload();
        }

        Err(TableError::TableFull {
            capacity: self.capacity(),
        })
    }

    /// Returns `false` if `key` is zero or the table is full. Inserting a key
    /// that is already present returns `true` and does not change its value.
    pub fn insert(&self, key: usize, val: usize) -> bool {
        self.try_insert(key, val).is_ok()
    }

    /// Replaces the value of a key that is already present, returning the
    /// previous value.
    pub fn try_update(&self, key: usize, val: usize) -> Result<usize, TableError> {
        if key == EMPTY_KEY {
            return Err(TableError::ZeroKey);
        }

        let mut probe = self.probe(key);
        while let Some((this_entry, this_key)) = probe.next() {
            if this_key == EMPTY_KEY {
                // Keys are never removed, so the key would have been here.
                return Err(TableError::KeyNotFound);
            }

            if this_key != key {
                continue;
            }

            match Self::swap_value(this_entry, val) {
                Ok(previous) => return Ok(previous),
                Err(()) => probe.reload(),
            }
        }

        Err(TableError::KeyNotFound)
    }

    /// Returns `false` if `key` is zero or not present.
    ///
    /// An update racing with the insertion of the same key can see the key
    /// before the inserter has stored its value. The update then succeeds,
    /// and the inserter's value store, landing after it, overwrites it. See
    /// [`find`](Self::find) for the publication order.
    pub fn update(&self, key: usize, val: usize) -> bool {
        self.try_update(key, val).is_ok()
    }

    /// Stores `val` for `key`, claiming a slot if needed. Returns the
    /// previous value when the key was already present.
    pub fn try_insert_or_update(&self, key: usize, val: usize) -> Result<Option<usize>, TableError> {
        if key == EMPTY_KEY {
            return Err(TableError::ZeroKey);
        }

        let mut probe = self.probe(key);
        while let Some((this_entry, this_key)) = probe.next() {
            if this_key == EMPTY_KEY {
                if self.claim(this_entry, key, val) {
                    return Ok(None);
                }
                probe.reload();
                continue;
            }

            if this_key != key {
                continue;
            }

            match Self::swap_value(this_entry, val) {
                Ok(previous) => return Ok(Some(previous)),
                Err(()) => probe.reload(),
            }
        }

        Err(TableError::TableFull {
            capacity: self.capacity(),
        })
    }

    pub fn insert_or_update(&self, key: usize, val: usize) -> bool {
        self.try_insert_or_update(key, val).is_ok()
    }

    /// Returns the value stored for `key`.
    ///
    /// A slot's key and value are published separately: the key by a
    /// compare-and-swap, the value by a release store right after it. A
    /// `find` racing with the insertion of the same key can therefore see
    /// the key before its value and return the slot's initial value, zero.
    /// Once the value store is visible, everything the inserting thread
    /// wrote before it is visible too.
    pub fn find(&self, key: usize) -> Option<usize> {
        if key == EMPTY_KEY {
            return None;
        }

        for (this_entry, this_key) in self.probe(key) {
            if this_key == EMPTY_KEY {
                return None;
            }
            if this_key == key {
                return Some(this_entry.val.load(Ordering::Acquire));
            }
        }

        None
    }

    fn claim(&self, entry: &Entry, key: usize, val: usize) -> bool {
        if entry
            .key
            .compare_exchange_weak(EMPTY_KEY, key, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        entry.val.store(val, Ordering::Release);
        self.header().count.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn swap_value(entry: &Entry, val: usize) -> Result<usize, ()> {
        let current = entry.val.load(Ordering::Acquire);
        entry
            .val
            .compare_exchange_weak(current, val, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ())
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        // Nothing useful can be done with an unmap failure here. Use
        // `destroy` to observe it.
        let _ = unsafe { self.unmap() };
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("threshold", &self.threshold())
            .field("assimilated", &self.is_assimilated())
            .finish()
    }
}
