use crate::Error;

/// Values up to this fit directly in the 4-bit varint header
const VARINT_MAX_INLINE: u32 = 11;
const VARINT_HEADER_BITS: usize = 4;

/// Number of bits needed to represent `value` (zero needs none)
pub fn minimum_bits_to_store(value: u32) -> u32 {
    32 - value.leading_zeros()
}

/// Append-only bit stream over a byte buffer
///
/// Bits are written least significant first, filling each byte from its low bit up. The
/// cursor is a bit offset, so consecutive tables do not need to start on a byte boundary.
pub struct BitMemoryWriter<'a> {
    out: &'a mut Vec<u8>,
    bit_offset: usize,
}

impl<'a> BitMemoryWriter<'a> {
    /// Writer appending to `out`, starting at bit `bit_offset`
    pub fn new(out: &'a mut Vec<u8>, bit_offset: usize) -> BitMemoryWriter<'a> {
        BitMemoryWriter { out, bit_offset }
    }

    /// Current write position, in bits
    pub fn bit_offset(&self) -> usize {
        self.bit_offset
    }

    /// Write the lowest `bit_count` bits of `value`
    pub fn write_bits(&mut self, value: u32, bit_count: u32) {
        assert!(bit_count <= 32, "cannot write {} bits at once", bit_count);
        debug_assert!(
            bit_count == 32 || value >> bit_count == 0,
            "value {} does not fit in {} bits",
            value,
            bit_count
        );

        let end = self.bit_offset + bit_count as usize;
        let needed_bytes = (end + 7) / 8;
        if self.out.len() < needed_bytes {
            self.out.resize(needed_bytes, 0);
        }

        for bit in 0..bit_count {
            if value & (1 << bit) != 0 {
                let position = self.bit_offset + bit as usize;
                self.out[position / 8] |= 1 << (position % 8);
            }
        }
        self.bit_offset = end;
    }

    /// Write a variable length integer: small values take 4 bits, larger values a 4-bit byte
    /// count header followed by that many bytes
    pub fn write_varint(&mut self, value: u32) {
        if value <= VARINT_MAX_INLINE {
            self.write_bits(value, VARINT_HEADER_BITS as u32);
        } else {
            let byte_count = (minimum_bits_to_store(value) + 7) / 8;
            self.write_bits(VARINT_MAX_INLINE + byte_count, VARINT_HEADER_BITS as u32);
            self.write_bits(value, byte_count * 8);
        }
    }
}

/// Reading counterpart to [`BitMemoryWriter`]
pub struct BitMemoryReader<'a> {
    data: &'a [u8],
    bit_offset: usize,
}

impl<'a> BitMemoryReader<'a> {
    pub fn new(data: &'a [u8]) -> BitMemoryReader<'a> {
        BitMemoryReader {
            data,
            bit_offset: 0,
        }
    }

    pub fn bit_offset(&self) -> usize {
        self.bit_offset
    }

    pub fn read_bits(&mut self, bit_count: u32) -> Result<u32, Error> {
        if bit_count > 32 {
            return Err(Error::ColumnTooWide(bit_count));
        }
        let end = self.bit_offset + bit_count as usize;
        if end > self.data.len() * 8 {
            return Err(Error::UnexpectedEnd {
                bit_offset: self.bit_offset,
                bits: bit_count as usize,
            });
        }

        let mut value: u32 = 0;
        for bit in 0..bit_count {
            let position = self.bit_offset + bit as usize;
            if self.data[position / 8] & (1 << (position % 8)) != 0 {
                value |= 1 << bit;
            }
        }
        self.bit_offset = end;
        Ok(value)
    }

    pub fn read_varint(&mut self) -> Result<u32, Error> {
        let header = self.read_bits(VARINT_HEADER_BITS as u32)?;
        if header <= VARINT_MAX_INLINE {
            return Ok(header);
        }
        let byte_count = header - VARINT_MAX_INLINE;
        if byte_count > 4 {
            return Err(Error::VarintOverflow { byte_count });
        }
        self.read_bits(byte_count * 8)
    }
}
