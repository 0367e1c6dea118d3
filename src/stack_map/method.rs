use crate::binary_format::Serialize;
use crate::Error;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::ErrorKind;

/// Opaque identity of a dex file
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct DexFileId(pub u32);

/// A method that got inlined at some native position
///
/// The stream never looks into methods beyond these queries.
pub trait InlinedMethod {
    /// Index of the method in its dex file
    fn method_index(&self) -> u32;

    /// Wide identifier the runtime can resolve the method from directly
    fn identifier(&self) -> u64;

    fn dex_file(&self) -> DexFileId;

    /// Whether [`InlinedMethod::identifier`] will still be valid when the metadata is decoded
    ///
    /// When it isn't, the method is recorded by index through the method-reference table.
    fn encodes_identifier(&self) -> bool;
}

/// How an inline frame refers to its method
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum MethodReference {
    /// Direct wide identifier
    Identifier(u64),

    /// Index into the method-reference table
    MethodInfo(u32),
}

/// Serialize the method-reference table (method indices, in table order)
pub fn encode_method_info<W: std::io::Write>(
    method_indices: &[u32],
    writer: &mut W,
) -> Result<(), Error> {
    (method_indices.len() as u32).serialize(writer)?;
    for method_index in method_indices {
        method_index.serialize(writer)?;
    }
    Ok(())
}

/// Size of the region [`encode_method_info`] writes
pub fn method_info_size(num_methods: usize) -> usize {
    (0u32).serialized_size() * (num_methods + 1)
}

/// Read back a region written by [`encode_method_info`]
pub fn decode_method_info(mut region: &[u8]) -> Result<Vec<u32>, Error> {
    let count = region.read_u32::<LittleEndian>()?;
    if region.len() / 4 < count as usize {
        return Err(Error::IoError(ErrorKind::UnexpectedEof.into()));
    }
    let mut method_indices = Vec::with_capacity(count as usize);
    for _ in 0..count {
        method_indices.push(region.read_u32::<LittleEndian>()?);
    }
    Ok(method_indices)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn method_info_region() {
        let indices = vec![7, 0, 65536];
        let mut region = vec![];
        encode_method_info(&indices, &mut region).unwrap();
        assert_eq!(region.len(), method_info_size(indices.len()));
        assert_eq!(decode_method_info(&region).unwrap(), indices);
    }

    #[test]
    fn method_info_region_layout() {
        let mut region = vec![];
        encode_method_info(&[0x0102_0304, 5], &mut region).unwrap();
        assert_eq!(region, vec![2, 0, 0, 0, 4, 3, 2, 1, 5, 0, 0, 0]);

        let mut empty = vec![];
        encode_method_info(&[], &mut empty).unwrap();
        assert_eq!(empty, vec![0, 0, 0, 0]);
    }

    #[test]
    fn truncated_method_info_region() {
        let region = [2, 0, 0, 0, 1, 0, 0, 0];
        assert!(matches!(
            decode_method_info(&region),
            Err(Error::IoError(_))
        ));
    }
}
