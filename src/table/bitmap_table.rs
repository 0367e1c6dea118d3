use crate::util::{BitMemoryReader, BitMemoryWriter, BitVector};
use crate::Error;
use std::collections::HashMap;

/// Deduplicating table of bitmaps
///
/// Every bitmap is stored padded out to the width of the widest one.
pub struct BitmapTable {
    rows: Vec<BitVector>,
    dedup: HashMap<BitVector, u32>,
    max_num_bits: usize,
}

impl BitmapTable {
    pub fn new() -> BitmapTable {
        BitmapTable {
            rows: vec![],
            dedup: HashMap::new(),
            max_num_bits: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width every row gets in the encoding
    pub fn max_num_bits(&self) -> usize {
        self.max_num_bits
    }

    /// Get or insert a bitmap
    pub fn dedup(&mut self, bits: &BitVector) -> u32 {
        if let Some(index) = self.dedup.get(bits) {
            return *index;
        }

        let index = self.rows.len() as u32;
        self.max_num_bits = self.max_num_bits.max(bits.number_of_bits());
        self.rows.push(bits.clone());
        self.dedup.insert(bits.clone(), index);
        index
    }

    /// Write out the table at the writer's current bit offset
    pub fn encode(&self, writer: &mut BitMemoryWriter) {
        writer.write_varint(self.rows.len() as u32);
        if self.rows.is_empty() {
            return;
        }

        writer.write_varint(self.max_num_bits as u32);
        for row in &self.rows {
            let mut remaining = self.max_num_bits;
            let mut words = row.words().iter();
            while remaining > 0 {
                let chunk = remaining.min(32);
                let word = words.next().copied().unwrap_or(0);
                writer.write_bits(word, chunk as u32);
                remaining -= chunk;
            }
        }
    }
}

impl Default for BitmapTable {
    fn default() -> Self {
        BitmapTable::new()
    }
}

/// Read a table written by [`BitmapTable::encode`]
///
/// Returns the rows along with the width they were padded to.
pub fn decode_bitmap_table(reader: &mut BitMemoryReader) -> Result<(Vec<BitVector>, usize), Error> {
    let num_rows = reader.read_varint()?;
    if num_rows == 0 {
        return Ok((vec![], 0));
    }

    let num_bits = reader.read_varint()? as usize;
    let mut rows = vec![];
    for _ in 0..num_rows {
        let mut row = BitVector::new();
        let mut base = 0;
        while base < num_bits {
            let chunk = (num_bits - base).min(32);
            let word = reader.read_bits(chunk as u32)?;
            for bit in 0..chunk {
                if word & (1 << bit) != 0 {
                    row.set_bit(base + bit);
                }
            }
            base += chunk;
        }
        rows.push(row);
    }
    Ok((rows, num_bits))
}
