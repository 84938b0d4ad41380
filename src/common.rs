pub(crate) mod constants;
pub(crate) mod error;
pub(crate) mod hash;
pub(crate) mod mmap;

#[cfg(feature = "unstable-debug-counters")]
pub(crate) mod debug_counters;
