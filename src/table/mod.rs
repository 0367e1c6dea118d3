//! Deduplicating tables and their bit-packed encodings
//!
//! Every table is append only. Rows get stable indices in first-seen order and the finished
//! table is written as a single block of fixed-width columns, where the width of each column is
//! just large enough for the biggest value present.

mod bit_table;
mod bitmap_table;

pub use bit_table::*;
pub use bitmap_table::*;

use std::hash::Hash;

/// Marker for "no index" / "no value" in any column
///
/// Columns are stored with a bias of one, so this encodes as zero and a column that is entirely
/// absent takes no bits at all.
pub const NO_VALUE: u32 = u32::MAX;

/// Fixed-shape record stored in a [`BitTable`]
///
/// A row is a fixed number of `u32` columns, always in the same order. `column` and
/// `from_columns` must agree with each other on that order.
pub trait BitTableRow: Clone + Eq + Hash {
    /// Column names, in storage order
    const COLUMN_NAMES: &'static [&'static str];

    /// Number of columns
    const NUM_COLUMNS: usize = Self::COLUMN_NAMES.len();

    /// Value of the column at `index` (`index < NUM_COLUMNS`)
    fn column(&self, index: usize) -> u32;

    /// Rebuild a row from exactly `NUM_COLUMNS` values
    fn from_columns(columns: &[u32]) -> Self;
}
