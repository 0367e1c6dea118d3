use stack_map_stream::stack_map::*;
use stack_map_stream::util::BitVector;
use std::cell::RefCell;

const DEX_FILE: DexFileId = DexFileId(1);

struct TestMethod {
    method_index: u32,
    identifier: u64,
    dex_file: DexFileId,
    in_boot_image: bool,
}

impl TestMethod {
    fn by_index(method_index: u32) -> TestMethod {
        TestMethod {
            method_index,
            identifier: 0x7f00_0000_0000 + method_index as u64,
            dex_file: DEX_FILE,
            in_boot_image: false,
        }
    }

    fn by_identifier(identifier: u64) -> TestMethod {
        TestMethod {
            method_index: 0,
            identifier,
            dex_file: DexFileId(99),
            in_boot_image: true,
        }
    }
}

impl InlinedMethod for TestMethod {
    fn method_index(&self) -> u32 {
        self.method_index
    }

    fn identifier(&self) -> u64 {
        self.identifier
    }

    fn dex_file(&self) -> DexFileId {
        self.dex_file
    }

    fn encodes_identifier(&self) -> bool {
        self.in_boot_image
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn new_stream<'m>() -> StackMapStream<'m> {
    init_logging();
    let mut settings = StackMapStreamSettings::new(InstructionSet::X86_64);
    settings.verify = true;
    StackMapStream::new(settings)
}

/// Run both phases of encoding and decode the result
fn finish(stream: &mut StackMapStream) -> CodeInfo {
    let size = stream.prepare_for_fill_in();
    let mut region = vec![0; size];
    stream.fill_in_code_info(&mut region).unwrap();
    CodeInfo::decode(&region).unwrap()
}

fn in_register(register: i32) -> DexRegisterLocation {
    DexRegisterLocation::new(LocationKind::InRegister, register)
}

#[test]
fn single_stack_map() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(5, 0x10, 0b101_0000, None, 2, 0);
    stream.add_dex_register_entry(LocationKind::InRegister, 3);
    stream.add_dex_register_entry(LocationKind::InRegister, 7);
    stream.end_stack_map_entry();

    let code_info = finish(&mut stream);
    assert_eq!(code_info.number_of_stack_maps(), 1);

    let stack_map = code_info.stack_map_at(0);
    assert_eq!(stack_map.dex_pc, 5);
    assert_eq!(stack_map.native_pc_offset(InstructionSet::X86_64), 0x10);
    assert_eq!(code_info.register_mask_of(stack_map), 0b101_0000);
    assert_eq!(code_info.inline_depth_of(stack_map), 0);
    assert!(!stack_map.has_inline_info());
    assert!(stack_map.has_dex_register_map());
    assert_eq!(
        code_info.dex_register_map_of(stack_map, 2),
        vec![in_register(3), in_register(7)]
    );
    assert_eq!(code_info.number_of_register_masks(), 1);
    assert_eq!(code_info.number_of_catalogue_entries(), 2);
    assert!(code_info.stack_mask_of(stack_map).is_empty());
}

#[test]
fn identical_register_masks_share_an_entry() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0x4, 0b1100, None, 0, 0);
    stream.end_stack_map_entry();
    stream.begin_stack_map_entry(1, 0x8, 0b1100, None, 0, 0);
    stream.end_stack_map_entry();

    let code_info = finish(&mut stream);
    assert_eq!(code_info.number_of_stack_maps(), 2);
    assert_eq!(code_info.number_of_register_masks(), 1);
    assert_eq!(code_info.stack_map_at(0).register_mask_index, 0);
    assert_eq!(code_info.stack_map_at(1).register_mask_index, 0);
}

#[test]
fn shifted_register_masks() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0x4, 0b11 << 2, None, 0, 0);
    stream.end_stack_map_entry();
    stream.begin_stack_map_entry(1, 0x8, 0b11 << 9, None, 0, 0);
    stream.end_stack_map_entry();
    stream.begin_stack_map_entry(2, 0xc, 0, None, 0, 0);
    stream.end_stack_map_entry();

    let code_info = finish(&mut stream);
    assert_eq!(code_info.number_of_register_masks(), 2);
    assert_eq!(code_info.register_mask_of(code_info.stack_map_at(0)), 0b11 << 2);
    assert_eq!(code_info.register_mask_of(code_info.stack_map_at(1)), 0b11 << 9);
    assert_eq!(code_info.register_mask_of(code_info.stack_map_at(2)), 0);
}

#[test]
fn inline_frame_without_outer_registers() {
    let mut stream = new_stream();
    let callee = TestMethod::by_index(3);
    stream.begin_stack_map_entry(9, 0x20, 0, None, 0, 1);
    stream.begin_inline_info_entry(&callee, 2, 0, DEX_FILE);
    stream.end_inline_info_entry();
    stream.end_stack_map_entry();

    let code_info = finish(&mut stream);
    let stack_map = code_info.stack_map_at(0);
    assert_eq!(code_info.inline_depth_of(stack_map), 1);
    assert!(!stack_map.has_dex_register_map());
    assert!(code_info.dex_register_map_of(stack_map, 0).is_empty());

    let inline_info = code_info.inline_info_at_depth(stack_map, 0);
    assert_eq!(inline_info.dex_pc, 2);
    assert!(inline_info.is_last);
    assert_eq!(inline_info.method, MethodReference::MethodInfo(0));
}

#[test]
fn only_the_innermost_frame_is_terminal() {
    let mut stream = new_stream();
    let methods = [
        TestMethod::by_index(10),
        TestMethod::by_index(11),
        TestMethod::by_index(12),
    ];
    stream.begin_stack_map_entry(1, 0x30, 0, None, 1, 3);
    stream.add_dex_register_entry(LocationKind::Constant, -1);
    for (depth, method) in methods.iter().enumerate() {
        stream.begin_inline_info_entry(method, depth as u32, 1, DEX_FILE);
        stream.add_dex_register_entry(LocationKind::InStack, 4 * depth as i32);
        stream.end_inline_info_entry();
    }
    stream.end_stack_map_entry();

    let code_info = finish(&mut stream);
    let stack_map = code_info.stack_map_at(0);
    assert_eq!(code_info.inline_depth_of(stack_map), 3);
    let terminal: Vec<bool> = (0..3)
        .map(|depth| code_info.inline_info_at_depth(stack_map, depth).is_last)
        .collect();
    assert_eq!(terminal, vec![false, false, true]);

    assert_eq!(
        code_info.dex_register_map_of(stack_map, 1),
        vec![DexRegisterLocation::new(LocationKind::Constant, -1)]
    );
    for depth in 0..3 {
        assert_eq!(
            code_info.dex_register_map_at_depth(depth, stack_map, 1),
            vec![DexRegisterLocation::new(LocationKind::InStack, 4 * depth as i32)]
        );
    }
}

#[test]
fn inlined_method_encodings() {
    let mut stream = new_stream();
    let boot = TestMethod::by_identifier(0xdead_beef_0000_1000);
    let app = TestMethod::by_index(77);
    stream.begin_stack_map_entry(0, 0x40, 0, None, 0, 2);
    stream.begin_inline_info_entry(&boot, 4, 0, DEX_FILE);
    stream.end_inline_info_entry();
    stream.begin_inline_info_entry(&app, 6, 0, DEX_FILE);
    stream.end_inline_info_entry();
    stream.end_stack_map_entry();

    let code_info = finish(&mut stream);
    let stack_map = code_info.stack_map_at(0);
    assert_eq!(
        code_info.inline_info_at_depth(stack_map, 0).method,
        MethodReference::Identifier(0xdead_beef_0000_1000)
    );
    assert_eq!(
        code_info.inline_info_at_depth(stack_map, 1).method,
        MethodReference::MethodInfo(0)
    );

    let mut method_region = vec![0; stream.compute_method_info_size()];
    stream.fill_in_method_info(&mut method_region).unwrap();
    assert_eq!(decode_method_info(&method_region).unwrap(), vec![77]);
}

#[test]
fn repeated_inline_chains_are_shared() {
    let mut stream = new_stream();
    let callee = TestMethod::by_index(5);
    for native_pc in [0x10, 0x20] {
        stream.begin_stack_map_entry(3, native_pc, 0, None, 0, 1);
        stream.begin_inline_info_entry(&callee, 8, 1, DEX_FILE);
        stream.add_dex_register_entry(LocationKind::InRegister, 1);
        stream.end_inline_info_entry();
        stream.end_stack_map_entry();
    }

    let code_info = finish(&mut stream);
    assert_eq!(code_info.number_of_inline_infos(), 1);
    assert_eq!(
        code_info.stack_map_at(0).inline_info_index,
        code_info.stack_map_at(1).inline_info_index
    );
}

#[test]
fn stack_mask_is_read_at_prepare_time() {
    let stack_mask = RefCell::new(BitVector::from_bits(vec![0, 3]));
    let cleared_mask = RefCell::new(BitVector::from_bits(vec![1]));
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0x4, 0, Some(&stack_mask), 0, 0);
    stream.end_stack_map_entry();
    stream.begin_stack_map_entry(1, 0x8, 0, Some(&cleared_mask), 0, 0);
    stream.end_stack_map_entry();

    stack_mask.borrow_mut().clear_bit(0);
    stack_mask.borrow_mut().set_bit(5);
    cleared_mask.borrow_mut().clear_all_bits();

    let code_info = finish(&mut stream);
    assert_eq!(
        code_info.stack_mask_of(code_info.stack_map_at(0)),
        BitVector::from_bits(vec![3, 5])
    );
    assert!(code_info.stack_mask_of(code_info.stack_map_at(1)).is_empty());
    assert_eq!(code_info.number_of_stack_masks(), 1);
}

#[test]
fn dead_registers_are_left_out_of_the_map() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0x4, 0, None, 4, 0);
    stream.add_dex_register_entry(LocationKind::None, 0);
    stream.add_dex_register_entry(LocationKind::InFpuRegister, 2);
    stream.add_dex_register_entry(LocationKind::None, 0);
    stream.add_dex_register_entry(LocationKind::InRegister, 3);
    stream.end_stack_map_entry();

    stream.begin_stack_map_entry(1, 0x8, 0, None, 2, 0);
    stream.add_dex_register_entry(LocationKind::None, 0);
    stream.add_dex_register_entry(LocationKind::None, 0);
    stream.end_stack_map_entry();

    let code_info = finish(&mut stream);
    let first = code_info.stack_map_at(0);
    assert_eq!(
        code_info.dex_register_map_of(first, 4),
        vec![
            DexRegisterLocation::NONE,
            DexRegisterLocation::new(LocationKind::InFpuRegister, 2),
            DexRegisterLocation::NONE,
            in_register(3),
        ]
    );
    assert_eq!(code_info.number_of_dex_register_map_entries(), 2);

    let second = code_info.stack_map_at(1);
    assert!(!second.has_dex_register_map());
    assert_eq!(
        code_info.dex_register_map_of(second, 2),
        vec![DexRegisterLocation::NONE; 2]
    );
}

#[test]
fn register_maps_are_shared_between_positions() {
    let mut stream = new_stream();
    for native_pc in [0x4, 0x8, 0xc] {
        stream.begin_stack_map_entry(native_pc, native_pc, 0, None, 2, 0);
        stream.add_dex_register_entry(LocationKind::InRegister, 1);
        stream.add_dex_register_entry(LocationKind::InStack, 16);
        stream.end_stack_map_entry();
    }

    let code_info = finish(&mut stream);
    assert_eq!(code_info.number_of_dex_register_masks(), 1);
    assert_eq!(code_info.number_of_dex_register_map_entries(), 2);
    assert_eq!(code_info.number_of_catalogue_entries(), 2);
}

#[test]
fn invokes_carry_the_stack_map_position() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0x18, 0, None, 0, 0);
    stream.add_invoke(InvokeType::Virtual, 1000);
    stream.end_stack_map_entry();
    stream.begin_stack_map_entry(1, 0x28, 0, None, 0, 0);
    stream.add_invoke(InvokeType::Interface, 2000);
    stream.add_invoke(InvokeType::Static, 1000);
    stream.end_stack_map_entry();

    let code_info = finish(&mut stream);
    assert_eq!(code_info.number_of_invoke_infos(), 3);

    let first = code_info.invoke_info(0);
    assert_eq!(first.native_pc_offset(InstructionSet::X86_64), 0x18);
    assert_eq!(first.invoke_type, InvokeType::Virtual.tag());
    assert_eq!(first.method_info_index, 0);

    let last = code_info.invoke_info(2);
    assert_eq!(last.native_pc_offset(InstructionSet::X86_64), 0x28);
    assert_eq!(last.method_info_index, 0);

    let mut method_region = vec![0; stream.compute_method_info_size()];
    stream.fill_in_method_info(&mut method_region).unwrap();
    assert_eq!(decode_method_info(&method_region).unwrap(), vec![1000, 2000]);
}

#[test]
fn native_pcs_are_packed_per_instruction_set() {
    init_logging();
    let mut stream = StackMapStream::new(StackMapStreamSettings::new(InstructionSet::Arm64));
    let instruction_set = stream.settings().instruction_set;
    assert_eq!(instruction_set.instruction_alignment(), 4);
    stream.begin_stack_map_entry(0, 0x40, 0, None, 0, 0);
    stream.end_stack_map_entry();

    let code_info = finish(&mut stream);
    assert_eq!(code_info.stack_map_at(0).packed_native_pc, 0x10);
    assert_eq!(
        code_info.stack_map_at(0).native_pc_offset(instruction_set),
        0x40
    );
}

#[test]
fn patched_native_pc() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0x10, 0, None, 0, 0);
    stream.end_stack_map_entry();
    stream.begin_stack_map_entry(1, 0x20, 0, None, 0, 0);
    stream.end_stack_map_entry();
    assert_eq!(stream.number_of_stack_maps(), 2);
    assert_eq!(stream.stack_map_native_pc_offset(1), 0x20);

    stream.set_stack_map_native_pc_offset(1, 0x24);
    assert_eq!(stream.stack_map_native_pc_offset(1), 0x24);

    let code_info = finish(&mut stream);
    assert_eq!(
        code_info
            .stack_map_at(1)
            .native_pc_offset(InstructionSet::X86_64),
        0x24
    );
}

#[test]
fn empty_stream() {
    let mut stream = new_stream();
    let code_info = finish(&mut stream);
    assert_eq!(code_info.number_of_stack_maps(), 0);
    assert_eq!(stream.compute_method_info_size(), 4);
}

#[test]
fn encoding_without_verification() {
    init_logging();
    let mut settings = StackMapStreamSettings::new(InstructionSet::X86);
    settings.verify = false;
    let mut stream = StackMapStream::new(settings);
    stream.begin_stack_map_entry(7, 0x3, 0b1, None, 1, 0);
    stream.add_dex_register_entry(LocationKind::InRegisterHigh, 2);
    stream.end_stack_map_entry();

    let code_info = finish(&mut stream);
    assert_eq!(code_info.stack_map_at(0).dex_pc, 7);
    assert_eq!(
        code_info.dex_register_map_of(code_info.stack_map_at(0), 1),
        vec![DexRegisterLocation::new(LocationKind::InRegisterHigh, 2)]
    );
}

#[test]
fn truncated_region_is_an_error() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(5, 0x10, 0b1, None, 1, 0);
    stream.add_dex_register_entry(LocationKind::InRegister, 1);
    stream.end_stack_map_entry();
    let mut region = vec![0; stream.prepare_for_fill_in()];
    stream.fill_in_code_info(&mut region).unwrap();

    region.pop();
    assert!(CodeInfo::decode(&region).is_err());
}

#[test]
#[should_panic(expected = "Mismatched Begin/End calls")]
fn end_without_begin() {
    let mut stream = new_stream();
    stream.end_stack_map_entry();
}

#[test]
#[should_panic(expected = "Mismatched Begin/End calls")]
fn begin_twice() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0, 0, None, 0, 0);
    stream.begin_stack_map_entry(1, 4, 0, None, 0, 0);
}

#[test]
#[should_panic(expected = "Dex register count mismatch")]
fn too_few_dex_registers() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0, 0, None, 2, 0);
    stream.add_dex_register_entry(LocationKind::InRegister, 1);
    stream.end_stack_map_entry();
}

#[test]
#[should_panic(expected = "More dex registers than the 1 declared")]
fn too_many_dex_registers() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0, 0, None, 1, 0);
    stream.add_dex_register_entry(LocationKind::InRegister, 1);
    stream.add_dex_register_entry(LocationKind::InRegister, 2);
}

#[test]
#[should_panic(expected = "Dex register count mismatch")]
fn inline_frame_before_outer_registers() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0, 0, None, 1, 1);
    stream.begin_inline_info_entry(&TestMethod::by_index(1), 0, 0, DEX_FILE);
}

#[test]
#[should_panic(expected = "Mismatched Begin/End calls")]
fn inline_end_without_begin() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0, 0, None, 0, 0);
    stream.end_inline_info_entry();
}

#[test]
#[should_panic(expected = "Inline frame still open at end of stack map")]
fn inline_frame_left_open() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0, 0, None, 0, 1);
    stream.begin_inline_info_entry(&TestMethod::by_index(1), 0, 0, DEX_FILE);
    stream.end_stack_map_entry();
}

#[test]
#[should_panic(expected = "Inline frame outside of a stack map")]
fn inline_frame_outside_stack_map() {
    let mut stream = new_stream();
    stream.begin_inline_info_entry(&TestMethod::by_index(1), 0, 0, DEX_FILE);
}

#[test]
#[should_panic(expected = "Invoke outside of a stack map")]
fn invoke_outside_stack_map() {
    let mut stream = new_stream();
    stream.add_invoke(InvokeType::Static, 1);
}

#[test]
#[should_panic(expected = "must be in the outer dex file")]
fn indexed_method_from_another_dex_file() {
    let mut stream = new_stream();
    let foreign = TestMethod {
        dex_file: DexFileId(2),
        ..TestMethod::by_index(1)
    };
    stream.begin_stack_map_entry(0, 0, 0, None, 0, 1);
    stream.begin_inline_info_entry(&foreign, 0, 0, DEX_FILE);
}

#[test]
#[should_panic(expected = "Mismatched Begin/End calls")]
fn prepare_with_open_stack_map() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0, 0, None, 0, 0);
    stream.prepare_for_fill_in();
}

#[test]
#[should_panic(expected = "prepare_for_fill_in called twice")]
fn prepare_twice() {
    let mut stream = new_stream();
    stream.prepare_for_fill_in();
    stream.prepare_for_fill_in();
}

#[test]
#[should_panic(expected = "prepare_for_fill_in not called before fill_in_code_info")]
fn fill_before_prepare() {
    let stream = new_stream();
    let mut region = vec![0; 16];
    let _ = stream.fill_in_code_info(&mut region);
}

#[test]
#[should_panic(expected = "Region size does not match prepare_for_fill_in")]
fn fill_with_wrong_region_size() {
    let mut stream = new_stream();
    let size = stream.prepare_for_fill_in();
    let mut region = vec![0; size + 1];
    let _ = stream.fill_in_code_info(&mut region);
}

#[test]
#[should_panic(expected = "Stack mask mismatch at stack map 0")]
fn stack_mask_changed_after_prepare() {
    let stack_mask = RefCell::new(BitVector::from_bits(vec![2]));
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0x4, 0, Some(&stack_mask), 0, 0);
    stream.end_stack_map_entry();

    let mut region = vec![0; stream.prepare_for_fill_in()];
    stack_mask.borrow_mut().set_bit(7);
    let _ = stream.fill_in_code_info(&mut region);
}

#[test]
fn stack_mask_changed_after_prepare_without_verification() {
    init_logging();
    let stack_mask = RefCell::new(BitVector::from_bits(vec![2]));
    let mut settings = StackMapStreamSettings::new(InstructionSet::X86_64);
    settings.verify = false;
    let mut stream = StackMapStream::new(settings);
    stream.begin_stack_map_entry(0, 0x4, 0, Some(&stack_mask), 0, 0);
    stream.end_stack_map_entry();

    let mut region = vec![0; stream.prepare_for_fill_in()];
    stack_mask.borrow_mut().set_bit(7);
    stream.fill_in_code_info(&mut region).unwrap();
    let code_info = CodeInfo::decode(&region).unwrap();
    assert_eq!(
        code_info.stack_mask_of(code_info.stack_map_at(0)),
        BitVector::from_bits(vec![2])
    );
}

#[test]
fn all_dead_inline_frame_has_no_map() {
    let mut stream = new_stream();
    stream.begin_stack_map_entry(0, 0x8, 0, None, 1, 1);
    stream.add_dex_register_entry(LocationKind::InRegister, 0);
    stream.begin_inline_info_entry(&TestMethod::by_index(2), 1, 2, DEX_FILE);
    stream.add_dex_register_entry(LocationKind::None, 0);
    stream.add_dex_register_entry(LocationKind::None, 0);
    stream.end_inline_info_entry();
    stream.end_stack_map_entry();

    let code_info = finish(&mut stream);
    let stack_map = code_info.stack_map_at(0);
    assert!(stack_map.has_dex_register_map());
    assert!(!code_info
        .inline_info_at_depth(stack_map, 0)
        .has_dex_register_map());
}
