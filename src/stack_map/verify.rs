use super::{CodeInfo, DexRegisterLocation, InstructionSet, InvokeType, MethodReference};
use crate::util::BitVector;
use std::cell::RefCell;

/// Value recorded while building, to be compared against the decoded region once it is written
///
/// Each variant holds exactly the inputs of one builder call along with the index it was given.
#[derive(Debug)]
pub(crate) enum Expectation<'m> {
    StackMap {
        stack_map_index: usize,
        native_pc_offset: u32,
        dex_pc: u32,
        register_mask: u32,
        /// Read at check time, so this sees the final mask
        stack_mask: Option<&'m RefCell<BitVector>>,
        inlining_depth: u8,
        num_dex_registers: u32,
    },
    InvokeInfo {
        invoke_info_index: usize,
        native_pc_offset: u32,
        invoke_type: InvokeType,
        method_index: u32,
    },
    InlineInfo {
        stack_map_index: usize,
        depth: usize,
        dex_pc: u32,
        method: ExpectedMethod,
        num_dex_registers: u32,
    },
    DexRegisterMap {
        stack_map_index: usize,
        /// `None` for the top-level frame
        depth: Option<usize>,
        registers: Vec<DexRegisterLocation>,
    },
}

/// Identity an inlined method was recorded with
#[derive(Copy, Clone, Debug)]
pub(crate) enum ExpectedMethod {
    Identifier(u64),
    MethodIndex(u32),
}

impl<'m> Expectation<'m> {
    /// Panics on the first decoded value that differs from what was recorded
    pub(crate) fn check(
        &self,
        code_info: &CodeInfo,
        method_infos: &[u32],
        instruction_set: InstructionSet,
    ) {
        match self {
            Expectation::StackMap {
                stack_map_index,
                native_pc_offset,
                dex_pc,
                register_mask,
                stack_mask,
                inlining_depth,
                num_dex_registers,
            } => {
                let stack_map = code_info.stack_map_at(*stack_map_index);
                let at = stack_map_index;
                assert_eq!(
                    stack_map.native_pc_offset(instruction_set),
                    *native_pc_offset,
                    "Native pc mismatch at stack map {}",
                    at
                );
                assert_eq!(stack_map.dex_pc, *dex_pc, "Dex pc mismatch at stack map {}", at);
                assert_eq!(
                    code_info.register_mask_of(stack_map),
                    *register_mask,
                    "Register mask mismatch at stack map {}",
                    at
                );

                let seen_stack_mask = code_info.stack_mask_of(stack_map);
                let expected_stack_mask = match stack_mask {
                    Some(stack_mask) => stack_mask.borrow().clone(),
                    None => BitVector::new(),
                };
                assert_eq!(
                    seen_stack_mask, expected_stack_mask,
                    "Stack mask mismatch at stack map {}",
                    at
                );

                assert_eq!(
                    code_info.inline_depth_of(stack_map),
                    *inlining_depth as usize,
                    "Inline depth mismatch at stack map {}",
                    at
                );
                if *num_dex_registers == 0 {
                    assert!(
                        !stack_map.has_dex_register_map(),
                        "Dex register map without dex registers at stack map {}",
                        at
                    );
                }
            }

            Expectation::InvokeInfo {
                invoke_info_index,
                native_pc_offset,
                invoke_type,
                method_index,
            } => {
                let invoke_info = code_info.invoke_info(*invoke_info_index);
                let at = invoke_info_index;
                assert_eq!(
                    invoke_info.native_pc_offset(instruction_set),
                    *native_pc_offset,
                    "Native pc mismatch at invoke info {}",
                    at
                );
                assert_eq!(
                    invoke_info.invoke_type,
                    invoke_type.tag(),
                    "Invoke type mismatch at invoke info {}",
                    at
                );
                assert_eq!(
                    method_infos[invoke_info.method_info_index as usize],
                    *method_index,
                    "Method index mismatch at invoke info {}",
                    at
                );
            }

            Expectation::InlineInfo {
                stack_map_index,
                depth,
                dex_pc,
                method,
                num_dex_registers,
            } => {
                let stack_map = code_info.stack_map_at(*stack_map_index);
                let inline_info = code_info.inline_info_at_depth(stack_map, *depth);
                assert_eq!(
                    inline_info.dex_pc, *dex_pc,
                    "Dex pc mismatch at stack map {} depth {}",
                    stack_map_index, depth
                );
                match (method, inline_info.method) {
                    (ExpectedMethod::Identifier(expected), MethodReference::Identifier(seen)) => {
                        assert_eq!(seen, *expected, "Inlined method identifier mismatch");
                    }
                    (ExpectedMethod::MethodIndex(expected), MethodReference::MethodInfo(seen)) => {
                        assert_eq!(
                            method_infos[seen as usize], *expected,
                            "Inlined method index mismatch"
                        );
                    }
                    (expected, seen) => {
                        panic!("Inlined method {:?} decoded as {:?}", expected, seen)
                    }
                }
                if *num_dex_registers == 0 {
                    assert!(
                        !inline_info.has_dex_register_map(),
                        "Dex register map without dex registers at stack map {} depth {}",
                        stack_map_index,
                        depth
                    );
                }
            }

            Expectation::DexRegisterMap {
                stack_map_index,
                depth,
                registers,
            } => {
                let stack_map = code_info.stack_map_at(*stack_map_index);
                let (has_map, seen) = match depth {
                    None => (
                        stack_map.has_dex_register_map(),
                        code_info.dex_register_map_of(stack_map, registers.len()),
                    ),
                    Some(depth) => (
                        code_info
                            .inline_info_at_depth(stack_map, *depth)
                            .has_dex_register_map(),
                        code_info.dex_register_map_at_depth(*depth, stack_map, registers.len()),
                    ),
                };

                // Frames where every register is dead have no map at all
                let any_live = registers.iter().any(DexRegisterLocation::is_live);
                assert_eq!(
                    has_map, any_live,
                    "Dex register map presence mismatch at stack map {} depth {:?}",
                    stack_map_index, depth
                );
                assert_eq!(
                    &seen, registers,
                    "Dex register map mismatch at stack map {} depth {:?}",
                    stack_map_index, depth
                );
            }
        }
    }
}
