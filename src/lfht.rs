//! A fixed-capacity lock-free hash table.
//!
//! The table is a single flat array of entries, each a key and a value of
//! one machine word, preceded by a small header in the same anonymous
//! memory mapping. Collisions are resolved by linear probing from the slot
//! selected by a mixing hash of the key.
//!
//! A key of zero marks a slot that has never been used, so zero cannot be
//! stored as a key. A slot changes state exactly once, from empty to
//! occupied, by a compare-and-swap (CAS) on its key field. From then on only
//! its value changes. There is no deletion and no tombstone state, which is
//! what allows lookups to stop at the first empty slot: a key is always
//! found before any empty slot on its probe sequence.
//!
//! Insertions CAS the key of the first empty slot on the probe sequence.
//! A thread that loses that race looks at the same slot again, since the
//! winner may have claimed it for the very same key; two threads inserting
//! one key therefore end up sharing a single slot. Updates CAS the value of
//! the slot holding the key and retry the same slot when they lose.
//! Lookups only load.
//!
//! Every operation visits at most `capacity` slots. A full table reports
//! the failure to the caller, who may set up a larger table and link it as
//! the successor through the header's [`link_successor`][link] and
//! [`mark_assimilated`][mark]; the table itself never acts on those fields
//! or on its [`threshold`][threshold].
//!
//! The value of a newly claimed slot is stored after the key is published.
//! A concurrent [`find`][find] can observe that window and read zero. An
//! `update` that lands in the same window may be overwritten by the
//! inserting thread's value store.
//!
//! [link]: Table::link_successor
//! [mark]: Table::mark_assimilated
//! [threshold]: Table::threshold
//! [find]: Table::find

pub(crate) mod builder;
pub(crate) mod probe;
pub(crate) mod table;

pub use builder::TableBuilder;
pub use table::{Insertion, Table, TableId};
