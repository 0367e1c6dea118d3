mod bit_memory;
mod bit_vector;

pub use bit_memory::*;
pub use bit_vector::*;
