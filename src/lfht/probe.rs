use super::table::Entry;

use std::sync::atomic::Ordering;

/// Linear probe over a table's entries, starting at the slot selected by a
/// hash and visiting every slot exactly once unless asked to reload.
pub(crate) struct Probe<'t> {
    entries: &'t [Entry],
    this_entry: &'t Entry,
    offset: usize,

    i: usize,
    reload: bool,
}

impl<'t> Probe<'t> {
    pub(crate) fn new(entries: &'t [Entry], hash: u64) -> Self {
        let offset = hash as usize & (entries.len() - 1);
        // SAFETY: `entries.len()` is a non-zero power of two, so `offset` is
        // always in bounds.
        let this_entry = &entries[offset];
        Self {
            entries,
            this_entry,
            offset,

            i: 0,
            reload: true,
        }
    }

    /// Makes the next call to `next` re-examine the current slot instead of
    /// advancing. Used after a lost compare-and-swap.
    pub(crate) fn reload(&mut self) {
        self.reload = true;
    }
}

impl<'t> Iterator for Probe<'t> {
    /// The slot and the key it held when it was loaded.
    type Item = (&'t Entry, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.reload {
            let max = self.entries.len() - 1;
            if self.i >= max {
                return None;
            }
            self.i += 1;
            let i = self.i.wrapping_add(self.offset) & max;
            self.this_entry = &self.entries[i];
        }
        self.reload = false;

        let this_key = self.this_entry.key.load(Ordering::Acquire);
        Some((self.this_entry, this_key))
    }
}

#[cfg(test)]
mod tests {
    use super::Probe;
    use crate::lfht::table::Entry;

    use std::sync::atomic::Ordering;

    fn entries(len: usize) -> Vec<Entry> {
        (0..len).map(|i| Entry::with_key(i + 100)).collect()
    }

    #[test]
    fn visits_every_slot_once_and_wraps() {
        let entries = entries(8);
        let keys: Vec<_> = Probe::new(&entries, 5).map(|(_, k)| k).collect();
        assert_eq!(keys, vec![105, 106, 107, 100, 101, 102, 103, 104]);
    }

    #[test]
    fn reload_revisits_the_same_slot() {
        let entries = entries(4);
        let mut probe = Probe::new(&entries, 2);

        let (first, key) = probe.next().unwrap();
        assert_eq!(key, 102);

        first.key.store(999, Ordering::Release);
        probe.reload();
        assert_eq!(probe.next().map(|(_, k)| k), Some(999));

        // Reloading does not shorten the probe sequence.
        assert_eq!(probe.count(), 3);
    }

    #[test]
    fn single_slot_table() {
        let entries = entries(1);
        assert_eq!(Probe::new(&entries, u64::MAX).count(), 1);
    }
}
