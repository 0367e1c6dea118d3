use super::verify::{ExpectedMethod, Expectation};
use super::{
    DexFileId, InlineInfoEntry, InlinedMethod, MethodInfoEntry, MethodReference, StackMapStream,
};
use crate::table::NO_VALUE;

/// Dex pc of frames that do not correspond to a real instruction
pub const NO_DEX_PC: u32 = u32::MAX;

impl<'m> StackMapStream<'m> {
    /// Open an inlined frame at the current stack map
    ///
    /// Frames are reported outermost first. Registers added after this call belong to this frame
    /// until the next one begins. `outer_dex_file` is the dex file of the method being compiled:
    /// methods referenced by index must come from the same file.
    pub fn begin_inline_info_entry<M: InlinedMethod + ?Sized>(
        &mut self,
        method: &M,
        dex_pc: u32,
        num_dex_registers: u32,
        outer_dex_file: DexFileId,
    ) {
        assert!(self.in_stack_map, "Inline frame outside of a stack map");
        assert!(!self.in_inline_info, "Mismatched Begin/End calls");
        self.in_inline_info = true;
        assert_eq!(
            self.expected_num_dex_registers,
            self.current_dex_registers.len() as u32,
            "Dex register count mismatch"
        );

        let (method_reference, expected_method) = if method.encodes_identifier() {
            let identifier = method.identifier();
            (
                MethodReference::Identifier(identifier),
                ExpectedMethod::Identifier(identifier),
            )
        } else {
            if self.verifying() && dex_pc != NO_DEX_PC {
                assert_eq!(
                    method.dex_file(),
                    outer_dex_file,
                    "Inlined method referenced by index must be in the outer dex file"
                );
            }
            let method_index = method.method_index();
            let method_info_index = self.method_infos.dedup(&MethodInfoEntry { method_index });
            (
                MethodReference::MethodInfo(method_info_index),
                ExpectedMethod::MethodIndex(method_index),
            )
        };

        self.current_inline_infos.push(InlineInfoEntry {
            is_last: false,
            dex_pc,
            method: method_reference,
            dex_register_mask_index: NO_VALUE,
            dex_register_map_index: NO_VALUE,
        });

        self.current_dex_registers.clear();
        self.expected_num_dex_registers = num_dex_registers;

        if self.verifying() {
            self.expectations.push(Expectation::InlineInfo {
                stack_map_index: self.number_of_stack_maps(),
                depth: self.current_inline_infos.len() - 1,
                dex_pc,
                method: expected_method,
                num_dex_registers,
            });
        }
    }

    /// Close the innermost inlined frame
    pub fn end_inline_info_entry(&mut self) {
        assert!(self.in_inline_info, "Mismatched Begin/End calls");
        self.in_inline_info = false;
        assert_eq!(
            self.expected_num_dex_registers,
            self.current_dex_registers.len() as u32,
            "Dex register count mismatch"
        );
    }
}
