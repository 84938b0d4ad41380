use super::Table;
use crate::common::{constants::RESIZE_RATIO, error::TableError};

/// Builds a [`Table`] with a non-default configuration.
///
/// # Examples
///
/// ```rust
/// use lfpool::lfht::Table;
///
/// let table = Table::builder(1000).resize_ratio(0.5).build().unwrap();
/// assert_eq!(table.capacity(), 1024);
/// assert_eq!(table.threshold(), 512);
/// ```
#[derive(Clone, Debug)]
pub struct TableBuilder {
    capacity: usize,
    resize_ratio: f64,
}

impl TableBuilder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            resize_ratio: RESIZE_RATIO,
        }
    }

    /// Sets the fraction of the capacity reported by [`Table::threshold`].
    ///
    /// Ratios above one are clamped to one. Zero, negative and NaN ratios
    /// fall back to the default of `0.75`.
    pub fn resize_ratio(self, ratio: f64) -> Self {
        Self {
            resize_ratio: ratio,
            ..self
        }
    }

    pub fn build(self) -> Result<Table, TableError> {
        Table::with_everything(self.capacity, effective_ratio(self.resize_ratio))
    }
}

fn effective_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() || ratio <= 0.0 {
        RESIZE_RATIO
    } else {
        ratio.min(1.0)
    }
}
