//! Byte-exact encoding checks against the interpreter contract.

use apf_asm::{ApfGenerator, Register, Target};

fn generator(version: u32) -> ApfGenerator {
    ApfGenerator::new(version).expect("supported version")
}

#[test]
fn empty_program_emits_zero_bytes() {
    let gen = generator(2);
    assert_eq!(gen.generate().unwrap(), Vec::<u8>::new());
}

#[test]
fn single_pass() {
    let mut gen = generator(2);
    gen.add_pass();
    assert_eq!(gen.generate().unwrap(), [0x00]);
}

#[test]
fn single_drop() {
    let mut gen = generator(2);
    gen.add_drop();
    assert_eq!(gen.generate().unwrap(), [0x01]);
}

#[test]
fn load_immediate_fits_one_byte() {
    let mut gen = generator(2);
    gen.add_load_immediate(Register::R0, 5);
    // (13 << 3) | (1 << 1) | 0
    assert_eq!(gen.generate().unwrap(), [0x6a, 0x05]);
}

#[test]
fn negative_one_encodes_as_ff() {
    let mut gen = generator(2);
    gen.add_load_immediate(Register::R0, -1);
    assert_eq!(gen.generate().unwrap(), [0x6a, 0xff]);
}

#[test]
fn value_128_needs_two_bytes_signed() {
    let mut gen = generator(2);
    gen.add_load_immediate(Register::R0, 128);
    assert_eq!(gen.generate().unwrap(), [0x6c, 0x00, 0x80]);
}

#[test]
fn value_256_needs_two_bytes_unsigned() {
    let mut gen = generator(2);
    gen.add_add(256);
    assert_eq!(gen.generate().unwrap(), [0x3c, 0x01, 0x00]);
}

#[test]
fn zero_immediate_collapses_to_zero_width() {
    let mut gen = generator(2);
    gen.add_add(0);
    assert_eq!(gen.generate().unwrap(), [0x38]);
}

#[test]
fn jump_forward_over_one_pass() {
    let mut gen = generator(2);
    gen.add_jump("target").add_pass();
    gen.define_label("target").unwrap();
    // (14 << 3) | (1 << 1) | 0, one-byte offset past the PASS.
    assert_eq!(gen.generate().unwrap(), [0x72, 0x01, 0x00]);
}

#[test]
fn jump_to_next_instruction_has_zero_width_offset() {
    let mut gen = generator(2);
    gen.add_jump("next");
    gen.define_label("next").unwrap();
    gen.add_pass();
    assert_eq!(gen.generate().unwrap(), [0x70, 0x00]);
}

#[test]
fn backward_jump_keeps_four_byte_offset() {
    let mut gen = generator(2);
    gen.define_label("top").unwrap();
    gen.add_pass().add_jump("top");
    // Distance is -6 from the end of the five-byte JMP.
    assert_eq!(
        gen.generate().unwrap(),
        [0x00, 0x76, 0xff, 0xff, 0xff, 0xfa]
    );
}

#[test]
fn packet_loads() {
    let mut gen = generator(2);
    gen.add_load8(Register::R0, 1)
        .add_load16(Register::R1, 12)
        .add_load32_indexed(Register::R0, 0);
    assert_eq!(
        gen.generate().unwrap(),
        [
            0x0a, 0x01, // LDB R0, [1]
            0x13, 0x0c, // LDH R1, [12]
            0x30, // LDWX R0, [R1 + 0]
        ]
    );
}

#[test]
fn register_arithmetic_forms_carry_no_immediate() {
    let mut gen = generator(2);
    gen.add_add_r1().add_left_shift_r1();
    assert_eq!(gen.generate().unwrap(), [0x39, 0x61]);
}

#[test]
fn shifts_negate_for_right_shift() {
    let mut gen = generator(2);
    gen.add_left_shift(3).add_right_shift(8);
    assert_eq!(gen.generate().unwrap(), [0x62, 0x03, 0x62, 0xf8]);
}

#[test]
fn memory_slot_accesses() {
    let mut gen = generator(2);
    gen.add_load_from_memory(Register::R0, 15)
        .unwrap()
        .add_load_from_memory(Register::R1, 0)
        .unwrap()
        .add_store_to_memory(Register::R0, 2)
        .unwrap();
    assert_eq!(
        gen.generate().unwrap(),
        [
            0xaa, 0x0f, // EXT LDM+15, R0
            0xa9, // EXT LDM+0, R1: a zero extended code takes zero bytes
            0xaa, 0x12, // EXT STM+2, R0
        ]
    );
}

#[test]
fn register_only_extended_ops() {
    let mut gen = generator(2);
    gen.add_swap()
        .add_not(Register::R1)
        .add_neg(Register::R0)
        .add_move(Register::R1);
    assert_eq!(
        gen.generate().unwrap(),
        [0xaa, 0x22, 0xab, 0x20, 0xaa, 0x21, 0xab, 0x23]
    );
}

#[test]
fn counted_terminations() {
    let mut gen = generator(5);
    gen.add_count_and_pass(20).unwrap();
    assert_eq!(gen.generate().unwrap(), [0x02, 0x14]);

    let mut gen = generator(5);
    gen.add_count_and_drop(1000).unwrap();
    assert_eq!(gen.generate().unwrap(), [0x05, 0x03, 0xe8]);
}

#[test]
fn allocate_transmit_discard() {
    let mut gen = generator(5);
    gen.add_allocate_r0()
        .unwrap()
        .add_allocate(1500)
        .unwrap()
        .add_transmit()
        .unwrap()
        .add_discard()
        .unwrap();
    assert_eq!(
        gen.generate().unwrap(),
        [
            0xaa, 0x24, // EXT ALLOCATE, size in R0
            0xab, 0x24, 0x05, 0xdc, // EXT ALLOCATE, fixed 16-bit size
            0xaa, 0x25, // EXT TRANSMIT
            0xab, 0x25, // EXT DISCARD
        ]
    );
}

#[test]
fn write_uses_the_width_field_for_its_length() {
    let mut gen = generator(4);
    gen.add_write(0xab)
        .unwrap()
        .add_write(0x1234)
        .unwrap()
        .add_write(0xdead_beef)
        .unwrap();
    assert_eq!(
        gen.generate().unwrap(),
        [
            0xc2, 0xab, // WRITE, one byte
            0xc4, 0x12, 0x34, // WRITE, two bytes
            0xc6, 0xde, 0xad, 0xbe, 0xef, // WRITE, four bytes
        ]
    );
}

#[test]
fn register_writes() {
    let mut gen = generator(4);
    gen.add_write_u8_from(Register::R0)
        .unwrap()
        .add_write_u16_from(Register::R1)
        .unwrap()
        .add_write_u32_from(Register::R0)
        .unwrap();
    assert_eq!(
        gen.generate().unwrap(),
        [0xaa, 0x26, 0xab, 0x27, 0xaa, 0x28]
    );
}

#[test]
fn memory_copies() {
    let mut gen = generator(4);
    gen.add_packet_copy(14, 20)
        .unwrap()
        .add_data_copy(0, 8)
        .unwrap()
        .add_packet_copy_from_r0(16)
        .unwrap()
        .add_data_copy_from_r0(4)
        .unwrap();
    assert_eq!(
        gen.generate().unwrap(),
        [
            0xca, 0x0e, 0x14, // MEMCOPY packet, src 14, len 20
            0xc9, 0x08, // MEMCOPY data, src 0 collapses, len 8
            0xaa, 0x29, 0x10, // EXT EPKTCOPY, len 16
            0xaa, 0x2a, 0x04, // EXT EDATACOPY, len 4
        ]
    );
}

#[test]
fn data_region_is_a_register_one_jump() {
    let mut gen = generator(5);
    gen.add_data(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
    gen.add_pass();
    assert_eq!(
        gen.generate().unwrap(),
        [0x73, 0x04, 0xde, 0xad, 0xbe, 0xef, 0x00]
    );
}

#[test]
fn data_memory_accesses() {
    let mut gen = generator(4);
    gen.add_load_data(Register::R0, -8)
        .unwrap()
        .add_store_data(Register::R1, 0)
        .unwrap();
    assert_eq!(gen.generate().unwrap(), [0xb2, 0xf8, 0xb9]);
}

#[test]
fn bytes_compare_jump_carries_length_and_payload() {
    let mut gen = generator(2);
    gen.add_jump_if_bytes_not_equal(&[0xaa, 0xbb], Target::Drop);
    gen.add_pass();
    assert_eq!(
        gen.generate().unwrap(),
        [0xa2, 0x02, 0x02, 0xaa, 0xbb, 0x00]
    );
}

#[test]
fn register_compare_jump() {
    let mut gen = generator(2);
    gen.add_jump_if_r0_equals_r1(Target::Drop);
    gen.add_pass();
    assert_eq!(gen.generate().unwrap(), [0x7b, 0x02, 0x00]);
}

#[test]
fn sentinel_targets_resolve_past_the_end() {
    let mut gen = generator(2);
    gen.add_jump_if_r0_equals(1, Target::Pass)
        .add_jump_if_r0_equals(2, Target::Drop);
    let bytecode = gen.generate().unwrap();
    // Two three-byte JEQs; PASS lands on the end, DROP one byte past it.
    assert_eq!(bytecode, [0x7a, 0x03, 0x01, 0x7a, 0x01, 0x02]);
}

#[cfg(feature = "serde")]
#[test]
fn vocabulary_types_round_trip_through_serde() {
    use apf_asm::Opcode;
    use strum::IntoEnumIterator;

    for op in Opcode::iter() {
        let bytes = bincode::serialize(&op).expect("serialize opcode");
        let back: Opcode = bincode::deserialize(&bytes).expect("deserialize opcode");
        assert_eq!(op, back);
    }
    for register in [Register::R0, Register::R1] {
        let bytes = bincode::serialize(&register).expect("serialize register");
        let back: Register = bincode::deserialize(&bytes).expect("deserialize register");
        assert_eq!(register, back);
    }
}
