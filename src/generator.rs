//! The program builder: an append-only accumulator of instructions, a
//! label table and the size-minimizing layout fixed point.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::consts::{
    APF_VERSION_4, MAX_COPY_LEN, MAX_COPY_OFFSET, MAX_COUNTER, MAX_DATA_LEN, MEMORY_SLOTS,
    MIN_APF_VERSION, MIN_APF_VERSION_IN_DEV, MIN_COUNTER,
};
use crate::error::AssembleError;
use crate::imm::Imm;
use crate::instruction::{Instruction, Target};
use crate::opcode::{ExtOpcode, Opcode, Register};

/// Upper bound on layout passes. Convergence takes two or three passes in
/// practice since a shrink can only move later instructions closer.
const MAX_LAYOUT_PASSES: u32 = 10;

fn check_range(what: &'static str, value: i64, min: i64, max: i64) -> Result<(), AssembleError> {
    if value < min || value > max {
        return Err(AssembleError::ValueOutOfRange {
            what,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Generator of APF bytecode programs.
///
/// Instructions are appended in program order through the typed `add_*`
/// methods, each of which validates its operands against the interpreter
/// version the generator targets. [`generate`](Self::generate) then lays
/// the program out, iteratively shrinking variable-width branch offsets
/// until the encoding reaches its fixed point, and emits the bytecode.
///
/// A failed append reports the violated precondition and leaves the
/// program as it was.
#[derive(Debug)]
pub struct ApfGenerator {
    version: u32,
    instructions: Vec<Instruction>,
    /// Label name to the index of its anchor instruction.
    labels: HashMap<String, usize>,
}

impl ApfGenerator {
    /// Creates a generator targeting the given interpreter version.
    pub fn new(version: u32) -> Result<Self, AssembleError> {
        if version < MIN_APF_VERSION {
            return Err(AssembleError::UnsupportedVersion(version));
        }
        Ok(Self {
            version,
            instructions: Vec::new(),
            labels: HashMap::new(),
        })
    }

    /// Interpreter version this generator targets.
    pub const fn version(&self) -> u32 {
        self.version
    }

    fn require_version(&self, required: u32) -> Result<(), AssembleError> {
        if self.version < required {
            return Err(AssembleError::VersionMismatch {
                required,
                actual: self.version,
            });
        }
        Ok(())
    }

    fn append(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    /* LABELS */

    /// Defines `name` at the current end of the program by appending a
    /// zero-size anchor.
    pub fn define_label(&mut self, name: impl Into<String>) -> Result<&mut Self, AssembleError> {
        let name = name.into();
        if self.labels.contains_key(&name) {
            return Err(AssembleError::DuplicateLabel(name));
        }
        self.labels.insert(name, self.instructions.len());
        Ok(self.append(Instruction::anchor()))
    }

    /* PACKET LOADS */

    fn add_packet_load(&mut self, opcode: Opcode, register: Register, offset: u32) -> &mut Self {
        self.append(Instruction::new(opcode, register).imm(Imm::unsigned(offset)))
    }

    /// Loads one byte of the packet at `offset` into `register`.
    pub fn add_load8(&mut self, register: Register, offset: u32) -> &mut Self {
        self.add_packet_load(Opcode::LDB, register, offset)
    }

    /// Loads two bytes of the packet at `offset` into `register`.
    pub fn add_load16(&mut self, register: Register, offset: u32) -> &mut Self {
        self.add_packet_load(Opcode::LDH, register, offset)
    }

    /// Loads four bytes of the packet at `offset` into `register`.
    pub fn add_load32(&mut self, register: Register, offset: u32) -> &mut Self {
        self.add_packet_load(Opcode::LDW, register, offset)
    }

    /// Loads one byte of the packet at `offset + R1` into `register`.
    pub fn add_load8_indexed(&mut self, register: Register, offset: u32) -> &mut Self {
        self.add_packet_load(Opcode::LDBX, register, offset)
    }

    /// Loads two bytes of the packet at `offset + R1` into `register`.
    pub fn add_load16_indexed(&mut self, register: Register, offset: u32) -> &mut Self {
        self.add_packet_load(Opcode::LDHX, register, offset)
    }

    /// Loads four bytes of the packet at `offset + R1` into `register`.
    pub fn add_load32_indexed(&mut self, register: Register, offset: u32) -> &mut Self {
        self.add_packet_load(Opcode::LDWX, register, offset)
    }

    /* ARITHMETIC */

    fn add_arith(&mut self, opcode: Opcode, value: u32) -> &mut Self {
        self.append(Instruction::new(opcode, Register::R0).imm(Imm::unsigned(value)))
    }

    fn add_arith_r1(&mut self, opcode: Opcode) -> &mut Self {
        self.append(Instruction::new(opcode, Register::R1))
    }

    /// Adds `value` to R0.
    pub fn add_add(&mut self, value: u32) -> &mut Self {
        self.add_arith(Opcode::ADD, value)
    }

    /// Multiplies R0 by `value`.
    pub fn add_mul(&mut self, value: u32) -> &mut Self {
        self.add_arith(Opcode::MUL, value)
    }

    /// Divides R0 by `value`.
    pub fn add_div(&mut self, value: u32) -> &mut Self {
        self.add_arith(Opcode::DIV, value)
    }

    /// Bitwise ANDs R0 with `value`.
    pub fn add_and(&mut self, value: u32) -> &mut Self {
        self.add_arith(Opcode::AND, value)
    }

    /// Bitwise ORs R0 with `value`.
    pub fn add_or(&mut self, value: u32) -> &mut Self {
        self.add_arith(Opcode::OR, value)
    }

    /// Shifts R0 left by `value` bits.
    pub fn add_left_shift(&mut self, value: i32) -> &mut Self {
        self.append(Instruction::new(Opcode::SH, Register::R0).imm(Imm::signed(value)))
    }

    /// Shifts R0 right by `value` bits.
    pub fn add_right_shift(&mut self, value: i32) -> &mut Self {
        self.append(Instruction::new(Opcode::SH, Register::R0).imm(Imm::signed(-value)))
    }

    /// Loads the signed immediate `value` into `register`.
    pub fn add_load_immediate(&mut self, register: Register, value: i32) -> &mut Self {
        self.append(Instruction::new(Opcode::LI, register).imm(Imm::signed(value)))
    }

    /// Adds R1 to R0.
    pub fn add_add_r1(&mut self) -> &mut Self {
        self.add_arith_r1(Opcode::ADD)
    }

    /// Multiplies R0 by R1.
    pub fn add_mul_r1(&mut self) -> &mut Self {
        self.add_arith_r1(Opcode::MUL)
    }

    /// Divides R0 by R1.
    pub fn add_div_r1(&mut self) -> &mut Self {
        self.add_arith_r1(Opcode::DIV)
    }

    /// Bitwise ANDs R0 with R1.
    pub fn add_and_r1(&mut self) -> &mut Self {
        self.add_arith_r1(Opcode::AND)
    }

    /// Bitwise ORs R0 with R1.
    pub fn add_or_r1(&mut self) -> &mut Self {
        self.add_arith_r1(Opcode::OR)
    }

    /// Shifts R0 left by R1 bits.
    pub fn add_left_shift_r1(&mut self) -> &mut Self {
        self.add_arith_r1(Opcode::SH)
    }

    /* BRANCHES */

    /// Unconditionally jumps to `target`.
    pub fn add_jump(&mut self, target: impl Into<Target>) -> &mut Self {
        self.append(Instruction::new(Opcode::JMP, Register::R0).branch(target.into()))
    }

    fn add_compare(&mut self, opcode: Opcode, value: u32, target: Target) -> &mut Self {
        self.append(
            Instruction::new(opcode, Register::R0)
                .branch(target)
                .imm(Imm::unsigned(value)),
        )
    }

    fn add_compare_r1(&mut self, opcode: Opcode, target: Target) -> &mut Self {
        self.append(Instruction::new(opcode, Register::R1).branch(target))
    }

    /// Jumps to `target` if R0 equals `value`.
    pub fn add_jump_if_r0_equals(&mut self, value: u32, target: impl Into<Target>) -> &mut Self {
        self.add_compare(Opcode::JEQ, value, target.into())
    }

    /// Jumps to `target` if R0 does not equal `value`.
    pub fn add_jump_if_r0_not_equals(
        &mut self,
        value: u32,
        target: impl Into<Target>,
    ) -> &mut Self {
        self.add_compare(Opcode::JNE, value, target.into())
    }

    /// Jumps to `target` if R0 is greater than `value`.
    pub fn add_jump_if_r0_greater_than(
        &mut self,
        value: u32,
        target: impl Into<Target>,
    ) -> &mut Self {
        self.add_compare(Opcode::JGT, value, target.into())
    }

    /// Jumps to `target` if R0 is less than `value`.
    pub fn add_jump_if_r0_less_than(
        &mut self,
        value: u32,
        target: impl Into<Target>,
    ) -> &mut Self {
        self.add_compare(Opcode::JLT, value, target.into())
    }

    /// Jumps to `target` if R0 has any of the bits of `value` set.
    pub fn add_jump_if_r0_any_bits_set(
        &mut self,
        value: u32,
        target: impl Into<Target>,
    ) -> &mut Self {
        self.add_compare(Opcode::JSET, value, target.into())
    }

    /// Jumps to `target` if R0 equals R1.
    pub fn add_jump_if_r0_equals_r1(&mut self, target: impl Into<Target>) -> &mut Self {
        self.add_compare_r1(Opcode::JEQ, target.into())
    }

    /// Jumps to `target` if R0 does not equal R1.
    pub fn add_jump_if_r0_not_equals_r1(&mut self, target: impl Into<Target>) -> &mut Self {
        self.add_compare_r1(Opcode::JNE, target.into())
    }

    /// Jumps to `target` if R0 is greater than R1.
    pub fn add_jump_if_r0_greater_than_r1(&mut self, target: impl Into<Target>) -> &mut Self {
        self.add_compare_r1(Opcode::JGT, target.into())
    }

    /// Jumps to `target` if R0 is less than R1.
    pub fn add_jump_if_r0_less_than_r1(&mut self, target: impl Into<Target>) -> &mut Self {
        self.add_compare_r1(Opcode::JLT, target.into())
    }

    /// Jumps to `target` if R0 has any of R1's bits set.
    pub fn add_jump_if_r0_any_bits_set_r1(&mut self, target: impl Into<Target>) -> &mut Self {
        self.add_compare_r1(Opcode::JSET, target.into())
    }

    /// Jumps to `target` if the packet bytes starting at the offset in R0
    /// differ from `bytes`.
    pub fn add_jump_if_bytes_not_equal(
        &mut self,
        bytes: &[u8],
        target: impl Into<Target>,
    ) -> &mut Self {
        self.append(
            Instruction::new(Opcode::JNEBS, Register::R0)
                .branch(target.into())
                .imm(Imm::unsigned(bytes.len() as u32))
                .payload(bytes.to_vec()),
        )
    }

    /* MEMORY SLOTS */

    fn add_slot_access(
        &mut self,
        base: ExtOpcode,
        register: Register,
        slot: u32,
    ) -> Result<&mut Self, AssembleError> {
        check_range("memory slot", slot as i64, 0, MEMORY_SLOTS as i64 - 1)?;
        Ok(self.append(
            Instruction::new(Opcode::EXT, register).imm(Imm::unsigned(base.code() as u32 + slot)),
        ))
    }

    /// Loads memory slot `slot` into `register`.
    pub fn add_load_from_memory(
        &mut self,
        register: Register,
        slot: u32,
    ) -> Result<&mut Self, AssembleError> {
        self.add_slot_access(ExtOpcode::LDM, register, slot)
    }

    /// Stores `register` into memory slot `slot`.
    pub fn add_store_to_memory(
        &mut self,
        register: Register,
        slot: u32,
    ) -> Result<&mut Self, AssembleError> {
        self.add_slot_access(ExtOpcode::STM, register, slot)
    }

    /* REGISTER-ONLY OPERATIONS */

    fn add_ext(&mut self, ext: ExtOpcode, register: Register) -> &mut Self {
        self.append(Instruction::new(Opcode::EXT, register).imm(Imm::unsigned(ext.code() as u32)))
    }

    /// Bitwise NOTs `register`.
    pub fn add_not(&mut self, register: Register) -> &mut Self {
        self.add_ext(ExtOpcode::NOT, register)
    }

    /// Negates `register`.
    pub fn add_neg(&mut self, register: Register) -> &mut Self {
        self.add_ext(ExtOpcode::NEG, register)
    }

    /// Swaps R0 and R1.
    pub fn add_swap(&mut self) -> &mut Self {
        self.add_ext(ExtOpcode::SWAP, Register::R0)
    }

    /// Moves the value of the other register into `register`.
    pub fn add_move(&mut self, register: Register) -> &mut Self {
        self.add_ext(ExtOpcode::MOVE, register)
    }

    /* TERMINATION */

    /// Accepts the packet.
    pub fn add_pass(&mut self) -> &mut Self {
        self.append(Instruction::new(Opcode::PASSDROP, Register::R0))
    }

    /// Rejects the packet.
    pub fn add_drop(&mut self) -> &mut Self {
        self.append(Instruction::new(Opcode::PASSDROP, Register::R1))
    }

    fn add_counted(
        &mut self,
        register: Register,
        counter: u32,
    ) -> Result<&mut Self, AssembleError> {
        self.require_version(MIN_APF_VERSION_IN_DEV)?;
        check_range("counter", counter as i64, MIN_COUNTER as i64, MAX_COUNTER as i64)?;
        Ok(self.append(Instruction::new(Opcode::PASSDROP, register).imm(Imm::unsigned(counter))))
    }

    /// Increments counter `counter` and accepts the packet.
    pub fn add_count_and_pass(&mut self, counter: u32) -> Result<&mut Self, AssembleError> {
        self.add_counted(Register::R0, counter)
    }

    /// Increments counter `counter` and rejects the packet.
    pub fn add_count_and_drop(&mut self, counter: u32) -> Result<&mut Self, AssembleError> {
        self.add_counted(Register::R1, counter)
    }

    /* OUTPUT BUFFER */

    /// Allocates an output buffer of the size held in R0.
    pub fn add_allocate_r0(&mut self) -> Result<&mut Self, AssembleError> {
        self.require_version(MIN_APF_VERSION_IN_DEV)?;
        Ok(self.add_ext(ExtOpcode::ALLOCATE, Register::R0))
    }

    /// Allocates an output buffer of `size` bytes.
    pub fn add_allocate(&mut self, size: u16) -> Result<&mut Self, AssembleError> {
        self.require_version(MIN_APF_VERSION_IN_DEV)?;
        Ok(self.append(
            Instruction::new(Opcode::EXT, Register::R1)
                .imm(Imm::unsigned(ExtOpcode::ALLOCATE.code() as u32))
                .imm(Imm::be16(size)),
        ))
    }

    /// Transmits the output buffer.
    pub fn add_transmit(&mut self) -> Result<&mut Self, AssembleError> {
        self.require_version(MIN_APF_VERSION_IN_DEV)?;
        Ok(self.add_ext(ExtOpcode::TRANSMIT, Register::R0))
    }

    /// Discards the output buffer.
    pub fn add_discard(&mut self) -> Result<&mut Self, AssembleError> {
        self.require_version(MIN_APF_VERSION_IN_DEV)?;
        Ok(self.add_ext(ExtOpcode::TRANSMIT, Register::R1))
    }

    /* OUTPUT WRITES */

    /// Writes `value` to the output buffer at its minimum big-endian
    /// width; the width field of the instruction tells the interpreter
    /// how many bytes to write. Zero is rejected since it would encode a
    /// zero-length write.
    pub fn add_write(&mut self, value: u32) -> Result<&mut Self, AssembleError> {
        self.require_version(APF_VERSION_4)?;
        check_range("write value", value as i64, 1, u32::MAX as i64)?;
        Ok(self.append(Instruction::new(Opcode::WRITE, Register::R0).imm(Imm::unsigned(value))))
    }

    /// Writes the low byte of `register` to the output buffer.
    pub fn add_write_u8_from(&mut self, register: Register) -> Result<&mut Self, AssembleError> {
        self.require_version(APF_VERSION_4)?;
        Ok(self.add_ext(ExtOpcode::EWRITE1, register))
    }

    /// Writes the low two bytes of `register` to the output buffer.
    pub fn add_write_u16_from(&mut self, register: Register) -> Result<&mut Self, AssembleError> {
        self.require_version(APF_VERSION_4)?;
        Ok(self.add_ext(ExtOpcode::EWRITE2, register))
    }

    /// Writes all four bytes of `register` to the output buffer.
    pub fn add_write_u32_from(&mut self, register: Register) -> Result<&mut Self, AssembleError> {
        self.require_version(APF_VERSION_4)?;
        Ok(self.add_ext(ExtOpcode::EWRITE4, register))
    }

    /* MEMORY COPIES */

    fn add_copy(
        &mut self,
        register: Register,
        src: u32,
        len: u32,
    ) -> Result<&mut Self, AssembleError> {
        self.require_version(APF_VERSION_4)?;
        check_range("copy source offset", src as i64, 0, MAX_COPY_OFFSET as i64)?;
        check_range("copy length", len as i64, 0, MAX_COPY_LEN as i64)?;
        Ok(self.append(
            Instruction::new(Opcode::MEMCOPY, register)
                .imm(Imm::unsigned(src))
                .imm(Imm::u8(len as u8)),
        ))
    }

    /// Copies `len` packet bytes starting at `src` into the output buffer.
    pub fn add_packet_copy(&mut self, src: u32, len: u32) -> Result<&mut Self, AssembleError> {
        self.add_copy(Register::R0, src, len)
    }

    /// Copies `len` data-region bytes starting at `src` into the output
    /// buffer.
    pub fn add_data_copy(&mut self, src: u32, len: u32) -> Result<&mut Self, AssembleError> {
        self.add_copy(Register::R1, src, len)
    }

    fn add_copy_from_r0(
        &mut self,
        ext: ExtOpcode,
        len: u32,
    ) -> Result<&mut Self, AssembleError> {
        self.require_version(APF_VERSION_4)?;
        check_range("copy length", len as i64, 0, MAX_COPY_LEN as i64)?;
        Ok(self.append(
            Instruction::new(Opcode::EXT, Register::R0)
                .imm(Imm::unsigned(ext.code() as u32))
                .imm(Imm::u8(len as u8)),
        ))
    }

    /// Copies `len` packet bytes, source offset in R0, into the output
    /// buffer.
    pub fn add_packet_copy_from_r0(&mut self, len: u32) -> Result<&mut Self, AssembleError> {
        self.add_copy_from_r0(ExtOpcode::EPKTCOPY, len)
    }

    /// Copies `len` data-region bytes, source offset in R0, into the
    /// output buffer.
    pub fn add_data_copy_from_r0(&mut self, len: u32) -> Result<&mut Self, AssembleError> {
        self.add_copy_from_r0(ExtOpcode::EDATACOPY, len)
    }

    /* DATA */

    /// Declares the leading data region: a jump the interpreter takes
    /// over `bytes`. Must be the first instruction of the program.
    pub fn add_data(&mut self, bytes: &[u8]) -> Result<&mut Self, AssembleError> {
        self.require_version(MIN_APF_VERSION_IN_DEV)?;
        if !self.instructions.is_empty() {
            return Err(AssembleError::DataNotFirst);
        }
        check_range("data length", bytes.len() as i64, 0, MAX_DATA_LEN as i64)?;
        Ok(self.append(
            Instruction::new(Opcode::JMP, Register::R1)
                .imm(Imm::unsigned(bytes.len() as u32))
                .payload(bytes.to_vec()),
        ))
    }

    /// Loads 32 bits of data memory at the signed `offset` plus R1 into
    /// `register`.
    pub fn add_load_data(
        &mut self,
        register: Register,
        offset: i32,
    ) -> Result<&mut Self, AssembleError> {
        self.require_version(APF_VERSION_4)?;
        Ok(self.append(Instruction::new(Opcode::LDDW, register).imm(Imm::signed(offset))))
    }

    /// Stores `register` into 32 bits of data memory at the signed
    /// `offset` plus R1.
    pub fn add_store_data(
        &mut self,
        register: Register,
        offset: i32,
    ) -> Result<&mut Self, AssembleError> {
        self.require_version(APF_VERSION_4)?;
        Ok(self.append(Instruction::new(Opcode::STDW, register).imm(Imm::signed(offset))))
    }

    /* LAYOUT & EMISSION */

    /// Assigns every instruction its offset and returns the total size.
    fn update_offsets(&mut self) -> u32 {
        let mut offset = 0u32;
        for instruction in &mut self.instructions {
            instruction.set_offset(offset);
            offset += instruction.size();
        }
        offset
    }

    /// Resolves a branch target to its absolute byte offset. The PASS and
    /// DROP sentinels anchor to the end of the program and one byte past
    /// it; that is how the interpreter tells the two outcomes apart.
    fn target_offset(&self, target: &Target, total: u32) -> Result<u32, AssembleError> {
        match target {
            Target::Pass => Ok(total),
            Target::Drop => Ok(total + 1),
            Target::Label(name) => self
                .labels
                .get(name)
                .map(|&index| self.instructions[index].offset())
                .ok_or_else(|| AssembleError::UndefinedLabel(name.clone())),
        }
    }

    /// Runs a single layout pass and returns the total program size.
    ///
    /// Branch offsets still carry their widest-case reservations, so this
    /// never underestimates the final size. The program is not finalized.
    pub fn program_length_overestimate(&mut self) -> u32 {
        self.update_offsets()
    }

    /// Lays the program out and emits its bytecode.
    ///
    /// Layout repeats until no branch offset can shrink any further: each
    /// pass recomputes instruction offsets, re-anchors the PASS/DROP
    /// sentinels past the program end and lets every branch re-measure
    /// the distance to its target. Widths only ever shrink, so the pass
    /// count is small and bounded.
    ///
    /// Consuming the generator makes emission terminal: appending to, or
    /// re-emitting, an already generated program cannot be expressed.
    pub fn generate(mut self) -> Result<Vec<u8>, AssembleError> {
        let mut total = self.update_offsets();
        for pass in 1..=MAX_LAYOUT_PASSES {
            let mut shrunk = false;
            for index in 0..self.instructions.len() {
                let target = match self.instructions[index].branch_target() {
                    Some(target) => target.clone(),
                    None => continue,
                };
                let target_offset = self.target_offset(&target, total)?;
                shrunk |= self.instructions[index].shrink(target_offset);
            }
            trace!("layout pass {pass}: {total} bytes, shrunk={shrunk}");
            if !shrunk {
                break;
            }
            total = self.update_offsets();
        }

        let mut bytecode = Vec::with_capacity(total as usize);
        for index in 0..self.instructions.len() {
            let instruction = &self.instructions[index];
            let branch_offset = match instruction.branch_target() {
                Some(target) => {
                    let target_offset = self.target_offset(target, total)?;
                    let end = instruction.offset() + instruction.size();
                    Some(target_offset.wrapping_sub(end))
                }
                None => None,
            };
            let start = bytecode.len() as u32;
            assert_eq!(
                start,
                instruction.offset(),
                "instruction offset diverged from the emitted stream",
            );
            instruction.encode(&mut bytecode, branch_offset);
            assert_eq!(
                bytecode.len() as u32 - start,
                instruction.size(),
                "instruction wrote a different number of bytes than it claimed",
            );
        }
        assert_eq!(bytecode.len() as u32, total);
        debug!("generated {total} byte program");
        Ok(bytecode)
    }
}
