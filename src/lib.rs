//! Build the stack map metadata of a compiled method
//!
//! A runtime walking the stack of compiled code needs to know, for a given native pc, which
//! bytecode pc it corresponds to, which registers and stack slots hold references, where every
//! virtual register lives and which frames were inlined there. This crate builds that metadata
//! incrementally while the compiler emits code and packs it into a compact bit-level encoding.
//!
//! ### Simple example
//!
//! ```
//! use stack_map_stream::stack_map::*;
//! use stack_map_stream::util::BitVector;
//! use std::cell::RefCell;
//!
//! # fn build() -> Result<(), stack_map_stream::Error> {
//! let stack_mask = RefCell::new(BitVector::from_bits(vec![1, 2]));
//! let mut stream = StackMapStream::new(StackMapStreamSettings::new(InstructionSet::Arm64));
//!
//! // A call at native offset 0x10, for bytecode pc 5
//! stream.begin_stack_map_entry(5, 0x10, 0b101_0000, Some(&stack_mask), 2, 0);
//! stream.add_dex_register_entry(LocationKind::InRegister, 3);
//! stream.add_dex_register_entry(LocationKind::InStack, 8);
//! stream.add_invoke(InvokeType::Static, 42);
//! stream.end_stack_map_entry();
//!
//! // The mask is only read now, so this update still makes it in
//! stack_mask.borrow_mut().clear_bit(2);
//!
//! let mut region = vec![0; stream.prepare_for_fill_in()];
//! stream.fill_in_code_info(&mut region)?;
//!
//! let code_info = CodeInfo::decode(&region)?;
//! let stack_map = code_info.stack_map_at(0);
//! assert_eq!(stack_map.dex_pc, 5);
//! assert_eq!(code_info.register_mask_of(stack_map), 0b101_0000);
//! assert_eq!(code_info.stack_mask_of(stack_map), BitVector::from_bits(vec![1]));
//! assert_eq!(
//!     code_info.dex_register_map_of(stack_map, 2),
//!     vec![
//!         DexRegisterLocation::new(LocationKind::InRegister, 3),
//!         DexRegisterLocation::new(LocationKind::InStack, 8),
//!     ]
//! );
//! # Ok(())
//! # }
//! # build().unwrap();
//! ```

pub mod binary_format;
mod errors;
pub mod stack_map;
pub mod table;
pub mod util;

pub use errors::*;
