use crate::Error;

/// Size of a stack slot, in bytes. Stack locations are stored in units of slots.
pub const FRAME_SLOT_SIZE: i32 = 4;

/// Where a virtual (dex) register lives at a given native position
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum LocationKind {
    /// Register is dead (or its value does not matter)
    None,

    /// Stack slot, value is the byte offset from the stack pointer
    InStack,

    /// Value is the constant itself
    Constant,

    /// Core register
    InRegister,

    /// High half of a core register pair
    InRegisterHigh,

    /// Floating point register
    InFpuRegister,

    /// High half of a floating point register pair
    InFpuRegisterHigh,
}

impl LocationKind {
    /// Tag stored in the register location catalogue (`None` is never stored)
    pub fn tag(self) -> Option<u32> {
        match self {
            LocationKind::None => None,
            LocationKind::InStack => Some(0),
            LocationKind::Constant => Some(1),
            LocationKind::InRegister => Some(2),
            LocationKind::InRegisterHigh => Some(3),
            LocationKind::InFpuRegister => Some(4),
            LocationKind::InFpuRegisterHigh => Some(5),
        }
    }

    pub fn from_tag(tag: u32) -> Result<LocationKind, Error> {
        match tag {
            0 => Ok(LocationKind::InStack),
            1 => Ok(LocationKind::Constant),
            2 => Ok(LocationKind::InRegister),
            3 => Ok(LocationKind::InRegisterHigh),
            4 => Ok(LocationKind::InFpuRegister),
            5 => Ok(LocationKind::InFpuRegisterHigh),
            other => Err(Error::BadLocationKind(other)),
        }
    }
}

/// Location of one virtual register
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct DexRegisterLocation {
    pub kind: LocationKind,
    pub value: i32,
}

impl DexRegisterLocation {
    pub const NONE: DexRegisterLocation = DexRegisterLocation {
        kind: LocationKind::None,
        value: 0,
    };

    /// Dead registers carry no value, so theirs is dropped
    pub fn new(kind: LocationKind, value: i32) -> DexRegisterLocation {
        match kind {
            LocationKind::None => DexRegisterLocation::NONE,
            kind => DexRegisterLocation { kind, value },
        }
    }

    pub fn is_live(&self) -> bool {
        self.kind != LocationKind::None
    }

    /// Catalogue form of a live location: kind tag and packed value
    ///
    /// Stack offsets are stored in slots rather than bytes.
    pub fn pack(&self) -> (u32, u32) {
        let tag = match self.kind.tag() {
            Some(tag) => tag,
            None => panic!("Dead registers have no catalogue entry"),
        };
        let packed_value = match self.kind {
            LocationKind::InStack => {
                assert!(
                    self.value % FRAME_SLOT_SIZE == 0,
                    "Stack offset {} is not slot aligned",
                    self.value
                );
                (self.value / FRAME_SLOT_SIZE) as u32
            }
            _ => self.value as u32,
        };
        (tag, packed_value)
    }

    /// Inverse of [`DexRegisterLocation::pack`]
    pub fn unpack(tag: u32, packed_value: u32) -> Result<DexRegisterLocation, Error> {
        let kind = LocationKind::from_tag(tag)?;
        let value = match kind {
            LocationKind::InStack => (packed_value as i32).wrapping_mul(FRAME_SLOT_SIZE),
            _ => packed_value as i32,
        };
        Ok(DexRegisterLocation { kind, value })
    }
}

/// Kind of call made at a call site
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum InvokeType {
    Static,
    Direct,
    Virtual,
    Super,
    Interface,
    Polymorphic,
    Custom,
}

impl InvokeType {
    pub fn tag(self) -> u32 {
        match self {
            InvokeType::Static => 0,
            InvokeType::Direct => 1,
            InvokeType::Virtual => 2,
            InvokeType::Super => 3,
            InvokeType::Interface => 4,
            InvokeType::Polymorphic => 5,
            InvokeType::Custom => 6,
        }
    }

    pub fn from_tag(tag: u32) -> Result<InvokeType, Error> {
        match tag {
            0 => Ok(InvokeType::Static),
            1 => Ok(InvokeType::Direct),
            2 => Ok(InvokeType::Virtual),
            3 => Ok(InvokeType::Super),
            4 => Ok(InvokeType::Interface),
            5 => Ok(InvokeType::Polymorphic),
            6 => Ok(InvokeType::Custom),
            other => Err(Error::BadInvokeType(other)),
        }
    }
}

/// Target instruction set, which decides how native offsets get packed
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum InstructionSet {
    Arm,
    Thumb2,
    Arm64,
    X86,
    X86_64,
    Riscv64,
}

impl InstructionSet {
    /// Every instruction starts at a multiple of this many bytes
    pub fn instruction_alignment(self) -> u32 {
        match self {
            InstructionSet::Arm | InstructionSet::Thumb2 => 2,
            InstructionSet::Arm64 => 4,
            InstructionSet::X86 | InstructionSet::X86_64 => 1,
            InstructionSet::Riscv64 => 2,
        }
    }

    /// Drop the low bits that alignment guarantees are zero
    pub fn pack_native_pc(self, native_pc_offset: u32) -> u32 {
        let alignment = self.instruction_alignment();
        assert!(
            native_pc_offset % alignment == 0,
            "Native pc offset {:#x} is not aligned to {} for {:?}",
            native_pc_offset,
            alignment,
            self
        );
        native_pc_offset / alignment
    }

    pub fn unpack_native_pc(self, packed_native_pc: u32) -> u32 {
        packed_native_pc * self.instruction_alignment()
    }
}
