use super::{BitTableRow, NO_VALUE};
use crate::util::{minimum_bits_to_store, BitMemoryReader, BitMemoryWriter};
use crate::Error;
use std::collections::HashMap;

/// Table of fixed-shape rows
///
/// Rows can be either added unconditionally (with [`BitTable::add`]) or deduplicated (with
/// [`BitTable::dedup`] and [`BitTable::dedup_sequence`]). Deduplication is structural: a row (or
/// run of rows) equal to one inserted earlier gets the earlier index back.
pub struct BitTable<R: BitTableRow> {
    rows: Vec<R>,

    /// Index of the first row of every run inserted through deduplication
    dedup: HashMap<Vec<R>, u32>,
}

impl<R: BitTableRow> BitTable<R> {
    pub fn new() -> BitTable<R> {
        BitTable {
            rows: vec![],
            dedup: HashMap::new(),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn get(&self, index: u32) -> &R {
        &self.rows[index as usize]
    }

    pub(crate) fn get_mut(&mut self, index: u32) -> &mut R {
        &mut self.rows[index as usize]
    }

    /// Append a row without looking for duplicates
    pub fn add(&mut self, row: R) -> u32 {
        let index = self.rows.len() as u32;
        self.rows.push(row);
        index
    }

    /// Get or insert a single row
    pub fn dedup(&mut self, row: &R) -> u32 {
        self.dedup_sequence(std::slice::from_ref(row))
    }

    /// Get or insert a run of rows, returning the index of its first row
    ///
    /// The empty run has no index.
    pub fn dedup_sequence(&mut self, rows: &[R]) -> u32 {
        if rows.is_empty() {
            return NO_VALUE;
        }
        if let Some(index) = self.dedup.get(rows) {
            return *index;
        }

        let index = self.rows.len() as u32;
        self.rows.extend_from_slice(rows);
        self.dedup.insert(rows.to_vec(), index);
        index
    }

    /// Bit width of every column, enough for the largest (biased) value present
    pub fn column_bits(&self) -> Vec<u32> {
        (0..R::NUM_COLUMNS)
            .map(|column| {
                self.rows
                    .iter()
                    .map(|row| minimum_bits_to_store(bias(row.column(column))))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Write out the table at the writer's current bit offset
    pub fn encode(&self, writer: &mut BitMemoryWriter) {
        writer.write_varint(self.rows.len() as u32);
        if self.rows.is_empty() {
            return;
        }

        let column_bits = self.column_bits();
        for bits in &column_bits {
            writer.write_varint(*bits);
        }
        for row in &self.rows {
            for (column, bits) in column_bits.iter().enumerate() {
                writer.write_bits(bias(row.column(column)), *bits);
            }
        }
    }
}

impl<R: BitTableRow> Default for BitTable<R> {
    fn default() -> Self {
        BitTable::new()
    }
}

/// Read a table written by [`BitTable::encode`]
pub fn decode_bit_table<R: BitTableRow>(reader: &mut BitMemoryReader) -> Result<Vec<R>, Error> {
    let num_rows = reader.read_varint()?;
    if num_rows == 0 {
        return Ok(vec![]);
    }

    let mut column_bits = Vec::with_capacity(R::NUM_COLUMNS);
    for _ in 0..R::NUM_COLUMNS {
        let bits = reader.read_varint()?;
        if bits > 32 {
            return Err(Error::ColumnTooWide(bits));
        }
        column_bits.push(bits);
    }

    let mut rows = vec![];
    let mut columns = vec![0; R::NUM_COLUMNS];
    for _ in 0..num_rows {
        for (column, bits) in column_bits.iter().enumerate() {
            columns[column] = unbias(reader.read_bits(*bits)?);
        }
        rows.push(R::from_columns(&columns));
    }
    Ok(rows)
}

fn bias(value: u32) -> u32 {
    value.wrapping_add(1)
}

fn unbias(value: u32) -> u32 {
    value.wrapping_sub(1)
}
