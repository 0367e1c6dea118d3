use super::verify::Expectation;
use super::{
    decode_method_info, encode_method_info, method_info_size, CodeInfo, DexRegisterEntry,
    DexRegisterLocation, DexRegisterMapEntry, InlineInfoEntry, InvokeInfoEntry, InvokeType,
    LocationKind, MethodInfoEntry, RegisterMaskEntry, StackMapEntry, StackMapStreamSettings,
};
use crate::table::{BitTable, BitmapTable, NO_VALUE};
use crate::util::{BitMemoryWriter, BitVector};
use crate::Error;
use std::cell::RefCell;
use std::io::Write;

/// Builder for the stack maps of one compiled method
///
/// The compiler drives this while it emits native code, following this call protocol for every
/// native position it reports:
///
/// ```text
/// begin_stack_map_entry
///   add_dex_register_entry*
///   add_invoke*
///   (begin_inline_info_entry add_dex_register_entry* end_inline_info_entry)*
/// end_stack_map_entry
/// ```
///
/// followed by exactly one [`StackMapStream::prepare_for_fill_in`] and one
/// [`StackMapStream::fill_in_code_info`] (and optionally [`StackMapStream::fill_in_method_info`]).
/// Calls outside of that grammar are bugs in the compiler and panic.
///
/// ### Deferred stack masks
///
/// The stack mask of a position is handed over by reference and only read in
/// `prepare_for_fill_in`. Code generation sometimes clears spill slots from masks of positions
/// it already reported, and those late updates have to make it into the output.
pub struct StackMapStream<'m> {
    settings: StackMapStreamSettings,

    stack_maps: BitTable<StackMapEntry>,
    register_masks: BitTable<RegisterMaskEntry>,
    stack_masks: BitmapTable,
    invoke_infos: BitTable<InvokeInfoEntry>,
    inline_infos: BitTable<InlineInfoEntry>,
    dex_register_masks: BitmapTable,
    dex_register_maps: BitTable<DexRegisterMapEntry>,
    dex_register_catalog: BitTable<DexRegisterEntry>,
    pub(super) method_infos: BitTable<MethodInfoEntry>,

    /// Stack mask of every stack map, in stack map order (read in `prepare_for_fill_in`)
    lazy_stack_masks: Vec<Option<&'m RefCell<BitVector>>>,

    /// Encoded tables, filled in by `prepare_for_fill_in`
    out: Vec<u8>,
    prepared: bool,

    pub(super) in_stack_map: bool,
    pub(super) in_inline_info: bool,

    pub(super) current_stack_map: StackMapEntry,
    pub(super) current_inline_infos: Vec<InlineInfoEntry>,
    pub(super) current_dex_registers: Vec<DexRegisterLocation>,
    pub(super) expected_num_dex_registers: u32,

    /// Checks to replay after `fill_in_code_info` (only collected when verifying)
    pub(super) expectations: Vec<Expectation<'m>>,
}

impl<'m> StackMapStream<'m> {
    pub fn new(settings: StackMapStreamSettings) -> StackMapStream<'m> {
        StackMapStream {
            settings,
            stack_maps: BitTable::new(),
            register_masks: BitTable::new(),
            stack_masks: BitmapTable::new(),
            invoke_infos: BitTable::new(),
            inline_infos: BitTable::new(),
            dex_register_masks: BitmapTable::new(),
            dex_register_maps: BitTable::new(),
            dex_register_catalog: BitTable::new(),
            method_infos: BitTable::new(),
            lazy_stack_masks: vec![],
            out: vec![],
            prepared: false,
            in_stack_map: false,
            in_inline_info: false,
            current_stack_map: StackMapEntry::new(0, 0),
            current_inline_infos: vec![],
            current_dex_registers: vec![],
            expected_num_dex_registers: 0,
            expectations: vec![],
        }
    }

    pub fn settings(&self) -> &StackMapStreamSettings {
        &self.settings
    }

    pub(super) fn verifying(&self) -> bool {
        self.settings.verify
    }

    /// Number of stack maps closed so far
    pub fn number_of_stack_maps(&self) -> usize {
        self.stack_maps.len()
    }

    /// Open a stack map for a native position
    ///
    /// `stack_mask` is not read until [`StackMapStream::prepare_for_fill_in`], so the caller may
    /// keep updating it until then. `num_dex_registers` is the number of registers the top-level
    /// frame will report, and `inlining_depth` the number of inline frames that will follow.
    pub fn begin_stack_map_entry(
        &mut self,
        dex_pc: u32,
        native_pc_offset: u32,
        register_mask: u32,
        stack_mask: Option<&'m RefCell<BitVector>>,
        num_dex_registers: u32,
        inlining_depth: u8,
    ) {
        assert!(!self.in_stack_map, "Mismatched Begin/End calls");
        self.in_stack_map = true;

        let packed_native_pc = self.settings.instruction_set.pack_native_pc(native_pc_offset);
        self.current_stack_map = StackMapEntry::new(packed_native_pc, dex_pc);
        if let Some(entry) = RegisterMaskEntry::from_mask(register_mask) {
            self.current_stack_map.register_mask_index = self.register_masks.dedup(&entry);
        }

        self.lazy_stack_masks.push(stack_mask);
        self.current_inline_infos.clear();
        self.current_dex_registers.clear();
        self.expected_num_dex_registers = num_dex_registers;

        if self.verifying() {
            self.expectations.push(Expectation::StackMap {
                stack_map_index: self.stack_maps.len(),
                native_pc_offset,
                dex_pc,
                register_mask,
                stack_mask,
                inlining_depth,
                num_dex_registers,
            });
        }
    }

    /// Close the open stack map, along with its run of inline frames
    pub fn end_stack_map_entry(&mut self) {
        assert!(self.in_stack_map, "Mismatched Begin/End calls");
        assert!(
            !self.in_inline_info,
            "Inline frame still open at end of stack map"
        );
        self.in_stack_map = false;
        assert_eq!(
            self.expected_num_dex_registers,
            self.current_dex_registers.len() as u32,
            "Dex register count mismatch"
        );

        if let Some(last) = self.current_inline_infos.last_mut() {
            last.is_last = true;
            self.current_stack_map.inline_info_index =
                self.inline_infos.dedup_sequence(&self.current_inline_infos);
        }

        self.stack_maps.add(self.current_stack_map);
    }

    /// Record the location of the next virtual register of the innermost open frame
    ///
    /// Once the frame has all the registers it declared, its dex register map is built.
    pub fn add_dex_register_entry(&mut self, kind: LocationKind, value: i32) {
        assert!(self.in_stack_map, "Dex register outside of a stack map");
        assert!(
            (self.current_dex_registers.len() as u32) < self.expected_num_dex_registers,
            "More dex registers than the {} declared",
            self.expected_num_dex_registers
        );
        self.current_dex_registers
            .push(DexRegisterLocation::new(kind, value));

        if self.current_dex_registers.len() as u32 == self.expected_num_dex_registers {
            self.create_dex_register_map();
        }
    }

    /// Record a call site at the open stack map's native position
    pub fn add_invoke(&mut self, invoke_type: InvokeType, dex_method_index: u32) {
        assert!(self.in_stack_map, "Invoke outside of a stack map");
        let packed_native_pc = self.current_stack_map.packed_native_pc;
        let method_info_index = self.method_infos.dedup(&MethodInfoEntry {
            method_index: dex_method_index,
        });
        let invoke_info_index = self.invoke_infos.add(InvokeInfoEntry {
            packed_native_pc,
            invoke_type: invoke_type.tag(),
            method_info_index,
        });

        if self.verifying() {
            self.expectations.push(Expectation::InvokeInfo {
                invoke_info_index: invoke_info_index as usize,
                native_pc_offset: self.settings.instruction_set.unpack_native_pc(packed_native_pc),
                invoke_type,
                method_index: dex_method_index,
            });
        }
    }

    /// Build the liveness mask and location map of the registers collected so far and attach
    /// them to the innermost frame
    fn create_dex_register_map(&mut self) {
        let mut mask = BitVector::new();
        let mut map = vec![];
        for (register, location) in self.current_dex_registers.iter().enumerate() {
            if location.is_live() {
                let (kind, packed_value) = location.pack();
                mask.set_bit(register);
                map.push(DexRegisterMapEntry {
                    catalogue_index: self.dex_register_catalog.dedup(&DexRegisterEntry {
                        kind,
                        packed_value,
                    }),
                });
            }
        }

        let mask_index = if mask.is_empty() {
            NO_VALUE
        } else {
            self.dex_register_masks.dedup(&mask)
        };
        let map_index = self.dex_register_maps.dedup_sequence(&map);
        match self.current_inline_infos.last_mut() {
            Some(inline_info) => {
                inline_info.dex_register_mask_index = mask_index;
                inline_info.dex_register_map_index = map_index;
            }
            None => {
                self.current_stack_map.dex_register_mask_index = mask_index;
                self.current_stack_map.dex_register_map_index = map_index;
            }
        }

        if self.verifying() {
            self.expectations.push(Expectation::DexRegisterMap {
                stack_map_index: self.stack_maps.len(),
                depth: self.current_inline_infos.len().checked_sub(1),
                registers: self.current_dex_registers.clone(),
            });
        }
    }

    /// Native offset of an already closed stack map
    pub fn stack_map_native_pc_offset(&self, index: usize) -> u32 {
        self.stack_maps
            .get(index as u32)
            .native_pc_offset(self.settings.instruction_set)
    }

    /// Move an already closed stack map to another native offset
    ///
    /// Only valid before [`StackMapStream::prepare_for_fill_in`]. Invoke infos recorded at the
    /// old offset are left alone.
    pub fn set_stack_map_native_pc_offset(&mut self, index: usize, native_pc_offset: u32) {
        assert!(!self.prepared, "Stack maps are already encoded");
        let packed_native_pc = self.settings.instruction_set.pack_native_pc(native_pc_offset);
        self.stack_maps.get_mut(index as u32).packed_native_pc = packed_native_pc;

        for expectation in &mut self.expectations {
            if let Expectation::StackMap {
                stack_map_index,
                native_pc_offset: expected,
                ..
            } = expectation
            {
                if *stack_map_index == index {
                    *expected = native_pc_offset;
                }
            }
        }
    }

    /// Resolve the deferred stack masks and encode every table
    ///
    /// Returns the size of the region [`StackMapStream::fill_in_code_info`] needs.
    pub fn prepare_for_fill_in(&mut self) -> usize {
        assert!(!self.prepared, "prepare_for_fill_in called twice");
        assert!(
            !self.in_stack_map && !self.in_inline_info,
            "Mismatched Begin/End calls"
        );

        // Read the stack masks now, the compiler may have updated them since
        for (index, stack_mask) in self.lazy_stack_masks.iter().enumerate() {
            if let Some(stack_mask) = stack_mask {
                let stack_mask = stack_mask.borrow();
                if !stack_mask.is_empty() {
                    let stack_mask_index = self.stack_masks.dedup(&stack_mask);
                    self.stack_maps.get_mut(index as u32).stack_mask_index = stack_mask_index;
                }
            }
        }

        let mut out = vec![];
        let mut writer = BitMemoryWriter::new(&mut out, 0);
        let mut start = 0;
        let mut trace_table = |name: &str, rows: usize, writer: &BitMemoryWriter<'_>| {
            log::trace!(
                "{}: {} rows in {} bits",
                name,
                rows,
                writer.bit_offset() - start
            );
            start = writer.bit_offset();
        };

        self.stack_maps.encode(&mut writer);
        trace_table("stack maps", self.stack_maps.len(), &writer);
        self.register_masks.encode(&mut writer);
        trace_table("register masks", self.register_masks.len(), &writer);
        self.stack_masks.encode(&mut writer);
        trace_table("stack masks", self.stack_masks.len(), &writer);
        self.invoke_infos.encode(&mut writer);
        trace_table("invoke infos", self.invoke_infos.len(), &writer);
        self.inline_infos.encode(&mut writer);
        trace_table("inline infos", self.inline_infos.len(), &writer);
        self.dex_register_masks.encode(&mut writer);
        trace_table("dex register masks", self.dex_register_masks.len(), &writer);
        self.dex_register_maps.encode(&mut writer);
        trace_table("dex register maps", self.dex_register_maps.len(), &writer);
        self.dex_register_catalog.encode(&mut writer);
        trace_table("dex register catalogue", self.dex_register_catalog.len(), &writer);

        self.out = out;
        self.prepared = true;
        log::debug!(
            "Encoded {} stack maps into {} bytes",
            self.stack_maps.len(),
            self.out.len()
        );
        self.code_info_size()
    }

    fn code_info_size(&self) -> usize {
        unsigned_leb128_size(self.out.len() as u64) + self.out.len()
    }

    /// Copy the encoded tables, length prefixed, into `region`
    ///
    /// `region` must be exactly the size returned by [`StackMapStream::prepare_for_fill_in`].
    /// When verifying, the region is decoded again and every recorded value is checked.
    pub fn fill_in_code_info(&self, region: &mut [u8]) -> Result<(), Error> {
        assert!(
            !self.in_stack_map && !self.in_inline_info,
            "Mismatched Begin/End calls"
        );
        assert!(
            self.prepared,
            "prepare_for_fill_in not called before fill_in_code_info"
        );
        assert_eq!(
            region.len(),
            self.code_info_size(),
            "Region size does not match prepare_for_fill_in"
        );

        let mut cursor = &mut region[..];
        leb128::write::unsigned(&mut cursor, self.out.len() as u64)?;
        cursor.write_all(&self.out)?;

        if self.verifying() {
            self.verify(region);
        }
        Ok(())
    }

    fn verify(&self, region: &[u8]) {
        let code_info = match CodeInfo::decode(region) {
            Ok(code_info) => code_info,
            Err(err) => panic!("Cannot decode freshly written stack maps: {:?}", err),
        };
        assert_eq!(code_info.number_of_stack_maps(), self.stack_maps.len());

        let method_infos = self.method_indices();
        for expectation in &self.expectations {
            expectation.check(&code_info, &method_infos, self.settings.instruction_set);
        }
        log::trace!("Verified {} stack map expectations", self.expectations.len());
    }

    fn method_indices(&self) -> Vec<u32> {
        self.method_infos
            .rows()
            .iter()
            .map(|entry| entry.method_index)
            .collect()
    }

    /// Size of the method-reference region
    pub fn compute_method_info_size(&self) -> usize {
        assert!(
            self.prepared,
            "prepare_for_fill_in not called before compute_method_info_size"
        );
        method_info_size(self.method_infos.len())
    }

    /// Write the method-reference region (independent of the code info region)
    pub fn fill_in_method_info(&self, region: &mut [u8]) -> Result<(), Error> {
        assert_eq!(
            region.len(),
            self.compute_method_info_size(),
            "Region size does not match compute_method_info_size"
        );
        let method_indices = self.method_indices();
        let mut cursor = &mut region[..];
        encode_method_info(&method_indices, &mut cursor)?;

        if self.verifying() {
            match decode_method_info(region) {
                Ok(decoded) => assert_eq!(decoded, method_indices),
                Err(err) => panic!("Cannot decode freshly written method infos: {:?}", err),
            }
        }
        Ok(())
    }
}

fn unsigned_leb128_size(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    ((bits + 6) / 7).max(1)
}
