use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing the byte-aligned side regions of a method's metadata
///
/// The main code info region is bit-packed (see [`crate::util::BitMemoryWriter`]), but the
/// method-reference region is read by the runtime with plain word loads, so it gets the usual
/// treatment:
///
///   - integers are little endian
///   - when serializing a sequence, the length of the sequence is a `u32`
///
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;

    /// Number of bytes `serialize` will write
    fn serialized_size(&self) -> usize;
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(*self)
    }

    fn serialized_size(&self) -> usize {
        4
    }
}

/// Size in `u32` is the first thing serialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u32).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        4 + self.iter().map(Serialize::serialized_size).sum::<usize>()
    }
}
