use super::{
    DexRegisterEntry, DexRegisterLocation, DexRegisterMapEntry, InlineInfoEntry, InvokeInfoEntry,
    RegisterMaskEntry, StackMapEntry,
};
use crate::table::{decode_bit_table, decode_bitmap_table, NO_VALUE};
use crate::util::{BitMemoryReader, BitVector};
use crate::Error;

/// Decoded view of a code info region
///
/// Every cross-table index is checked while decoding, so the accessors below can index freely.
#[derive(Debug)]
pub struct CodeInfo {
    stack_maps: Vec<StackMapEntry>,
    register_masks: Vec<RegisterMaskEntry>,
    stack_masks: Vec<BitVector>,
    invoke_infos: Vec<InvokeInfoEntry>,
    inline_infos: Vec<InlineInfoEntry>,
    dex_register_masks: Vec<BitVector>,
    dex_register_maps: Vec<DexRegisterMapEntry>,
    dex_register_catalog: Vec<DexRegisterLocation>,
}

impl CodeInfo {
    /// Decode a length prefixed region, as written by
    /// [`StackMapStream::fill_in_code_info`](super::StackMapStream::fill_in_code_info)
    pub fn decode(region: &[u8]) -> Result<CodeInfo, Error> {
        let mut rest = region;
        let declared = leb128::read::unsigned(&mut rest)?;
        if declared > rest.len() as u64 {
            return Err(Error::PayloadTooLong {
                declared,
                available: rest.len(),
            });
        }
        let payload = &rest[..declared as usize];

        let mut reader = BitMemoryReader::new(payload);
        let stack_maps = decode_bit_table::<StackMapEntry>(&mut reader)?;
        let register_masks = decode_bit_table::<RegisterMaskEntry>(&mut reader)?;
        let (stack_masks, _) = decode_bitmap_table(&mut reader)?;
        let invoke_infos = decode_bit_table::<InvokeInfoEntry>(&mut reader)?;
        let inline_infos = decode_bit_table::<InlineInfoEntry>(&mut reader)?;
        let (dex_register_masks, _) = decode_bitmap_table(&mut reader)?;
        let dex_register_maps = decode_bit_table::<DexRegisterMapEntry>(&mut reader)?;
        let dex_register_catalog = decode_bit_table::<DexRegisterEntry>(&mut reader)?
            .into_iter()
            .map(|entry| DexRegisterLocation::unpack(entry.kind, entry.packed_value))
            .collect::<Result<Vec<_>, Error>>()?;

        let code_info = CodeInfo {
            stack_maps,
            register_masks,
            stack_masks,
            invoke_infos,
            inline_infos,
            dex_register_masks,
            dex_register_maps,
            dex_register_catalog,
        };
        code_info.check_indices()?;
        Ok(code_info)
    }

    fn check_indices(&self) -> Result<(), Error> {
        fn check(table: &'static str, index: u32, len: usize) -> Result<(), Error> {
            if index != NO_VALUE && index as usize >= len {
                Err(Error::IndexOutOfBounds { table, index })
            } else {
                Ok(())
            }
        }

        for stack_map in &self.stack_maps {
            check("register masks", stack_map.register_mask_index, self.register_masks.len())?;
            check("stack masks", stack_map.stack_mask_index, self.stack_masks.len())?;
            check("inline infos", stack_map.inline_info_index, self.inline_infos.len())?;
            self.check_dex_register_map(
                stack_map.dex_register_mask_index,
                stack_map.dex_register_map_index,
            )?;

            // The inline run has to be terminated before the end of the table
            if stack_map.has_inline_info() {
                let start = stack_map.inline_info_index as usize;
                if !self.inline_infos[start..].iter().any(|info| info.is_last) {
                    return Err(Error::IndexOutOfBounds {
                        table: "inline infos",
                        index: stack_map.inline_info_index,
                    });
                }
            }
        }
        for inline_info in &self.inline_infos {
            self.check_dex_register_map(
                inline_info.dex_register_mask_index,
                inline_info.dex_register_map_index,
            )?;
        }
        for map_entry in &self.dex_register_maps {
            check(
                "dex register catalogue",
                map_entry.catalogue_index,
                self.dex_register_catalog.len(),
            )?;
        }
        Ok(())
    }

    fn check_dex_register_map(&self, mask_index: u32, map_index: u32) -> Result<(), Error> {
        if mask_index == NO_VALUE {
            return Ok(());
        }
        if mask_index as usize >= self.dex_register_masks.len() {
            return Err(Error::IndexOutOfBounds {
                table: "dex register masks",
                index: mask_index,
            });
        }
        let live = self.dex_register_masks[mask_index as usize].count_ones();
        if map_index == NO_VALUE || map_index as usize + live > self.dex_register_maps.len() {
            return Err(Error::IndexOutOfBounds {
                table: "dex register maps",
                index: map_index,
            });
        }
        Ok(())
    }

    pub fn number_of_stack_maps(&self) -> usize {
        self.stack_maps.len()
    }

    pub fn stack_map_at(&self, index: usize) -> &StackMapEntry {
        &self.stack_maps[index]
    }

    pub fn stack_maps(&self) -> &[StackMapEntry] {
        &self.stack_maps
    }

    pub fn number_of_register_masks(&self) -> usize {
        self.register_masks.len()
    }

    pub fn number_of_stack_masks(&self) -> usize {
        self.stack_masks.len()
    }

    pub fn number_of_inline_infos(&self) -> usize {
        self.inline_infos.len()
    }

    pub fn number_of_dex_register_masks(&self) -> usize {
        self.dex_register_masks.len()
    }

    pub fn number_of_dex_register_map_entries(&self) -> usize {
        self.dex_register_maps.len()
    }

    pub fn number_of_catalogue_entries(&self) -> usize {
        self.dex_register_catalog.len()
    }

    pub fn number_of_invoke_infos(&self) -> usize {
        self.invoke_infos.len()
    }

    pub fn invoke_info(&self, index: usize) -> &InvokeInfoEntry {
        &self.invoke_infos[index]
    }

    /// Full (unshifted) register mask, zero if there is none
    pub fn register_mask_of(&self, stack_map: &StackMapEntry) -> u32 {
        if stack_map.register_mask_index == NO_VALUE {
            0
        } else {
            self.register_masks[stack_map.register_mask_index as usize].mask()
        }
    }

    /// Stack mask, empty if there is none
    pub fn stack_mask_of(&self, stack_map: &StackMapEntry) -> BitVector {
        if stack_map.stack_mask_index == NO_VALUE {
            BitVector::new()
        } else {
            self.stack_masks[stack_map.stack_mask_index as usize].clone()
        }
    }

    /// Number of inlined frames at a stack map
    pub fn inline_depth_of(&self, stack_map: &StackMapEntry) -> usize {
        if !stack_map.has_inline_info() {
            return 0;
        }
        let start = stack_map.inline_info_index as usize;
        let mut depth = 0;
        for info in &self.inline_infos[start..] {
            depth += 1;
            if info.is_last {
                break;
            }
        }
        depth
    }

    /// Inlined frame at `depth` (0 being the outermost inlined callee)
    pub fn inline_info_at_depth(&self, stack_map: &StackMapEntry, depth: usize) -> &InlineInfoEntry {
        assert!(
            depth < self.inline_depth_of(stack_map),
            "No inline info at depth {}",
            depth
        );
        &self.inline_infos[stack_map.inline_info_index as usize + depth]
    }

    /// Locations of the top-level frame's `num_dex_registers` registers
    pub fn dex_register_map_of(
        &self,
        stack_map: &StackMapEntry,
        num_dex_registers: usize,
    ) -> Vec<DexRegisterLocation> {
        self.dex_register_map(
            stack_map.dex_register_mask_index,
            stack_map.dex_register_map_index,
            num_dex_registers,
        )
    }

    /// Locations of the registers of the inlined frame at `depth`
    pub fn dex_register_map_at_depth(
        &self,
        depth: usize,
        stack_map: &StackMapEntry,
        num_dex_registers: usize,
    ) -> Vec<DexRegisterLocation> {
        let inline_info = self.inline_info_at_depth(stack_map, depth);
        self.dex_register_map(
            inline_info.dex_register_mask_index,
            inline_info.dex_register_map_index,
            num_dex_registers,
        )
    }

    fn dex_register_map(
        &self,
        mask_index: u32,
        map_index: u32,
        num_dex_registers: usize,
    ) -> Vec<DexRegisterLocation> {
        let mut locations = vec![DexRegisterLocation::NONE; num_dex_registers];
        if mask_index == NO_VALUE {
            return locations;
        }

        let mask = &self.dex_register_masks[mask_index as usize];
        let mut map_entries = self.dex_register_maps[map_index as usize..].iter();
        for register in mask.iter_set_bits() {
            let entry = match map_entries.next() {
                Some(entry) => entry,
                None => break,
            };
            if register < num_dex_registers {
                locations[register] = self.dex_register_catalog[entry.catalogue_index as usize];
            }
        }
        locations
    }
}
