//! Stack maps of compiled methods
//!
//! [`StackMapStream`] collects, for every native position the compiler reports, the bytecode pc
//! it maps back to, the registers and stack slots holding live references, the locations of the
//! virtual registers and the chain of inlined frames. Everything repeated across positions is
//! deduplicated into side tables, and the whole lot is bit-packed into one region that
//! [`CodeInfo`] can read back.

mod code_info;
mod entries;
mod inline_info;
mod location;
mod method;
mod settings;
mod stream;
mod verify;

pub use code_info::*;
pub use entries::*;
pub use inline_info::*;
pub use location::*;
pub use method::*;
pub use settings::*;
pub use stream::*;
