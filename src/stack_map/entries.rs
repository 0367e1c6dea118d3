use super::{InstructionSet, MethodReference};
use crate::table::{BitTableRow, NO_VALUE};

/// One reported native position (the stack map proper)
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct StackMapEntry {
    pub packed_native_pc: u32,
    pub dex_pc: u32,
    pub register_mask_index: u32,
    pub stack_mask_index: u32,
    pub inline_info_index: u32,
    pub dex_register_mask_index: u32,
    pub dex_register_map_index: u32,
}

impl StackMapEntry {
    pub fn new(packed_native_pc: u32, dex_pc: u32) -> StackMapEntry {
        StackMapEntry {
            packed_native_pc,
            dex_pc,
            register_mask_index: NO_VALUE,
            stack_mask_index: NO_VALUE,
            inline_info_index: NO_VALUE,
            dex_register_mask_index: NO_VALUE,
            dex_register_map_index: NO_VALUE,
        }
    }

    pub fn native_pc_offset(&self, instruction_set: InstructionSet) -> u32 {
        instruction_set.unpack_native_pc(self.packed_native_pc)
    }

    pub fn has_inline_info(&self) -> bool {
        self.inline_info_index != NO_VALUE
    }

    pub fn has_dex_register_map(&self) -> bool {
        self.dex_register_map_index != NO_VALUE
    }
}

impl BitTableRow for StackMapEntry {
    const COLUMN_NAMES: &'static [&'static str] = &[
        "packed_native_pc",
        "dex_pc",
        "register_mask_index",
        "stack_mask_index",
        "inline_info_index",
        "dex_register_mask_index",
        "dex_register_map_index",
    ];

    fn column(&self, index: usize) -> u32 {
        match index {
            0 => self.packed_native_pc,
            1 => self.dex_pc,
            2 => self.register_mask_index,
            3 => self.stack_mask_index,
            4 => self.inline_info_index,
            5 => self.dex_register_mask_index,
            6 => self.dex_register_map_index,
            _ => panic!("StackMapEntry has no column {}", index),
        }
    }

    fn from_columns(columns: &[u32]) -> Self {
        StackMapEntry {
            packed_native_pc: columns[0],
            dex_pc: columns[1],
            register_mask_index: columns[2],
            stack_mask_index: columns[3],
            inline_info_index: columns[4],
            dex_register_mask_index: columns[5],
            dex_register_map_index: columns[6],
        }
    }
}

/// Register mask, shifted down so its lowest set bit is bit 0
///
/// Masks tend to have the same shape at different offsets (callee-saves are contiguous), so
/// normalising the shift away lets more of them share an entry.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct RegisterMaskEntry {
    pub value: u32,
    pub shift: u32,
}

impl RegisterMaskEntry {
    /// Canonical form of a mask (the empty mask has none)
    pub fn from_mask(mask: u32) -> Option<RegisterMaskEntry> {
        if mask == 0 {
            return None;
        }
        let shift = mask.trailing_zeros();
        Some(RegisterMaskEntry {
            value: mask >> shift,
            shift,
        })
    }

    pub fn mask(&self) -> u32 {
        self.value << self.shift
    }
}

impl BitTableRow for RegisterMaskEntry {
    const COLUMN_NAMES: &'static [&'static str] = &["value", "shift"];

    fn column(&self, index: usize) -> u32 {
        match index {
            0 => self.value,
            1 => self.shift,
            _ => panic!("RegisterMaskEntry has no column {}", index),
        }
    }

    fn from_columns(columns: &[u32]) -> Self {
        RegisterMaskEntry {
            value: columns[0],
            shift: columns[1],
        }
    }
}

/// Call site
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct InvokeInfoEntry {
    pub packed_native_pc: u32,
    pub invoke_type: u32,
    pub method_info_index: u32,
}

impl InvokeInfoEntry {
    pub fn native_pc_offset(&self, instruction_set: InstructionSet) -> u32 {
        instruction_set.unpack_native_pc(self.packed_native_pc)
    }
}

impl BitTableRow for InvokeInfoEntry {
    const COLUMN_NAMES: &'static [&'static str] =
        &["packed_native_pc", "invoke_type", "method_info_index"];

    fn column(&self, index: usize) -> u32 {
        match index {
            0 => self.packed_native_pc,
            1 => self.invoke_type,
            2 => self.method_info_index,
            _ => panic!("InvokeInfoEntry has no column {}", index),
        }
    }

    fn from_columns(columns: &[u32]) -> Self {
        InvokeInfoEntry {
            packed_native_pc: columns[0],
            invoke_type: columns[1],
            method_info_index: columns[2],
        }
    }
}

/// One inlined frame
///
/// All frames at a position are stored as a consecutive run, innermost last, and only the last
/// one has `is_last` set.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct InlineInfoEntry {
    pub is_last: bool,
    pub dex_pc: u32,
    pub method: MethodReference,
    pub dex_register_mask_index: u32,
    pub dex_register_map_index: u32,
}

impl InlineInfoEntry {
    pub fn has_dex_register_map(&self) -> bool {
        self.dex_register_map_index != NO_VALUE
    }
}

impl BitTableRow for InlineInfoEntry {
    const COLUMN_NAMES: &'static [&'static str] = &[
        "is_last",
        "dex_pc",
        "method_info_index",
        "identifier_hi",
        "identifier_lo",
        "dex_register_mask_index",
        "dex_register_map_index",
    ];

    fn column(&self, index: usize) -> u32 {
        match (index, self.method) {
            (0, _) => self.is_last as u32,
            (1, _) => self.dex_pc,
            (2, MethodReference::MethodInfo(method_info_index)) => method_info_index,
            (2, MethodReference::Identifier(_)) => NO_VALUE,
            (3, MethodReference::Identifier(identifier)) => (identifier >> 32) as u32,
            (4, MethodReference::Identifier(identifier)) => identifier as u32,
            (3, MethodReference::MethodInfo(_)) | (4, MethodReference::MethodInfo(_)) => NO_VALUE,
            (5, _) => self.dex_register_mask_index,
            (6, _) => self.dex_register_map_index,
            _ => panic!("InlineInfoEntry has no column {}", index),
        }
    }

    fn from_columns(columns: &[u32]) -> Self {
        let method = if columns[2] != NO_VALUE {
            MethodReference::MethodInfo(columns[2])
        } else {
            MethodReference::Identifier(((columns[3] as u64) << 32) | columns[4] as u64)
        };
        InlineInfoEntry {
            is_last: columns[0] != 0,
            dex_pc: columns[1],
            method,
            dex_register_mask_index: columns[5],
            dex_register_map_index: columns[6],
        }
    }
}

/// Register location catalogue entry
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct DexRegisterEntry {
    pub kind: u32,
    pub packed_value: u32,
}

impl BitTableRow for DexRegisterEntry {
    const COLUMN_NAMES: &'static [&'static str] = &["kind", "packed_value"];

    fn column(&self, index: usize) -> u32 {
        match index {
            0 => self.kind,
            1 => self.packed_value,
            _ => panic!("DexRegisterEntry has no column {}", index),
        }
    }

    fn from_columns(columns: &[u32]) -> Self {
        DexRegisterEntry {
            kind: columns[0],
            packed_value: columns[1],
        }
    }
}

/// Element of a dex register map: an index into the register location catalogue
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct DexRegisterMapEntry {
    pub catalogue_index: u32,
}

impl BitTableRow for DexRegisterMapEntry {
    const COLUMN_NAMES: &'static [&'static str] = &["catalogue_index"];

    fn column(&self, index: usize) -> u32 {
        match index {
            0 => self.catalogue_index,
            _ => panic!("DexRegisterMapEntry has no column {}", index),
        }
    }

    fn from_columns(columns: &[u32]) -> Self {
        DexRegisterMapEntry {
            catalogue_index: columns[0],
        }
    }
}

/// Method-reference table entry
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct MethodInfoEntry {
    pub method_index: u32,
}

impl BitTableRow for MethodInfoEntry {
    const COLUMN_NAMES: &'static [&'static str] = &["method_index"];

    fn column(&self, index: usize) -> u32 {
        match index {
            0 => self.method_index,
            _ => panic!("MethodInfoEntry has no column {}", index),
        }
    }

    fn from_columns(columns: &[u32]) -> Self {
        MethodInfoEntry {
            method_index: columns[0],
        }
    }
}
