/// Errors that arise while reading back or copying out encoded stack maps
///
/// Misuse of the builder protocol is never reported through this type: those are bugs in the
/// calling compiler pass and they panic on the spot.
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// The length prefix of a region could not be read
    Leb128Error(leb128::read::Error),

    /// Ran out of data while reading `bits` bits at `bit_offset`
    UnexpectedEnd { bit_offset: usize, bits: usize },

    /// Length prefix claims more bytes than the region holds
    PayloadTooLong { declared: u64, available: usize },

    /// A bit varint announced a payload wider than 32 bits
    VarintOverflow { byte_count: u32 },

    /// A column is declared wider than 32 bits
    ColumnTooWide(u32),

    /// Unknown register location kind tag
    BadLocationKind(u32),

    /// Unknown invoke type tag
    BadInvokeType(u32),

    /// A table index (or a run starting at it) does not fit in its table
    IndexOutOfBounds { table: &'static str, index: u32 },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<leb128::read::Error> for Error {
    fn from(err: leb128::read::Error) -> Error {
        match err {
            leb128::read::Error::IoError(err) => Error::IoError(err),
            other => Error::Leb128Error(other),
        }
    }
}
