//! Opcode tables of the APF instruction set.

use crate::error::InvalidOpcode;

/// Primary 5-bit opcodes.
///
/// The opcode occupies the top five bits of an instruction's leading byte;
/// the remaining bits carry the shared immediate width and the register
/// bit. Some operations share a code and are disambiguated by the register
/// bit (PASS/DROP on [`Opcode::PASSDROP`], TRANSMIT/DISCARD on
/// [`ExtOpcode::TRANSMIT`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Opcode {
    /// Terminate the program, accepting (R0) or rejecting (R1) the packet.
    /// An optional immediate names a counter to increment.
    PASSDROP = 0,
    /// Load one byte of the packet into the register.
    LDB = 1,
    /// Load two bytes of the packet into the register, big-endian.
    LDH = 2,
    /// Load four bytes of the packet into the register, big-endian.
    LDW = 3,
    /// Load one byte of the packet at an R1-relative offset.
    LDBX = 4,
    /// Load two bytes of the packet at an R1-relative offset.
    LDHX = 5,
    /// Load four bytes of the packet at an R1-relative offset.
    LDWX = 6,
    /// Add the immediate (or R1) to R0.
    ADD = 7,
    /// Multiply R0 by the immediate (or R1).
    MUL = 8,
    /// Divide R0 by the immediate (or R1).
    DIV = 9,
    /// Bitwise AND R0 with the immediate (or R1).
    AND = 10,
    /// Bitwise OR R0 with the immediate (or R1).
    OR = 11,
    /// Shift R0 by the signed immediate (or R1); positive is left.
    SH = 12,
    /// Load the signed immediate into the register.
    LI = 13,
    /// Unconditional jump. With the register bit set this instead
    /// declares the leading data region, which the interpreter skips.
    JMP = 14,
    /// Jump if R0 equals the immediate (or R1).
    JEQ = 15,
    /// Jump if R0 does not equal the immediate (or R1).
    JNE = 16,
    /// Jump if R0 is greater than the immediate (or R1).
    JGT = 17,
    /// Jump if R0 is less than the immediate (or R1).
    JLT = 18,
    /// Jump if R0 has any of the immediate's (or R1's) bits set.
    JSET = 19,
    /// Jump if the packet bytes at [R0] differ from the byte payload.
    JNEBS = 20,
    /// Prefix for the extended opcodes; the operation is carried in the
    /// first unsigned immediate.
    EXT = 21,
    /// Load 32 bits from data memory at an R1-relative signed offset.
    LDDW = 22,
    /// Store 32 bits to data memory at an R1-relative signed offset.
    STDW = 23,
    /// Write an immediate to the output buffer.
    WRITE = 24,
    /// Copy bytes from the packet (R0) or data region (R1) into the
    /// output buffer.
    MEMCOPY = 25,
}

impl Opcode {
    /// Byte representation of the opcode.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = InvalidOpcode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Opcode::*;
        Ok(match value {
            0 => PASSDROP,
            1 => LDB,
            2 => LDH,
            3 => LDW,
            4 => LDBX,
            5 => LDHX,
            6 => LDWX,
            7 => ADD,
            8 => MUL,
            9 => DIV,
            10 => AND,
            11 => OR,
            12 => SH,
            13 => LI,
            14 => JMP,
            15 => JEQ,
            16 => JNE,
            17 => JGT,
            18 => JLT,
            19 => JSET,
            20 => JNEBS,
            21 => EXT,
            22 => LDDW,
            23 => STDW,
            24 => WRITE,
            25 => MEMCOPY,
            _ => return Err(InvalidOpcode),
        })
    }
}

/// Extended opcodes, carried as the first unsigned immediate after
/// [`Opcode::EXT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ExtOpcode {
    /// Load a memory slot into the register. Base value; the slot index
    /// is added to it.
    LDM = 0,
    /// Store the register into a memory slot. Base value; the slot index
    /// is added to it.
    STM = 16,
    /// Bitwise NOT of the register.
    NOT = 32,
    /// Negate the register.
    NEG = 33,
    /// Swap R0 and R1.
    SWAP = 34,
    /// Move the value of the other register into the register.
    MOVE = 35,
    /// Allocate the output buffer, sized by R0 or by a 16-bit immediate.
    ALLOCATE = 36,
    /// Transmit (R0) or discard (R1) the output buffer.
    TRANSMIT = 37,
    /// Write the low byte of the register to the output buffer.
    EWRITE1 = 38,
    /// Write the low two bytes of the register to the output buffer.
    EWRITE2 = 39,
    /// Write all four bytes of the register to the output buffer.
    EWRITE4 = 40,
    /// Copy packet bytes into the output buffer, source offset in R0.
    EPKTCOPY = 41,
    /// Copy data-region bytes into the output buffer, source offset in R0.
    EDATACOPY = 42,
}

impl ExtOpcode {
    /// Value carried in the immediate after the EXT prefix.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ExtOpcode {
    type Error = InvalidOpcode;

    /// Accepts the base values only; an LDM/STM value with a slot index
    /// already added does not name an extended opcode.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ExtOpcode::*;
        Ok(match value {
            0 => LDM,
            16 => STM,
            32 => NOT,
            33 => NEG,
            34 => SWAP,
            35 => MOVE,
            36 => ALLOCATE,
            37 => TRANSMIT,
            38 => EWRITE1,
            39 => EWRITE2,
            40 => EWRITE4,
            41 => EPKTCOPY,
            42 => EDATACOPY,
            _ => return Err(InvalidOpcode),
        })
    }
}

/// One of the interpreter's two registers. Every emitted instruction
/// carries exactly one register bit in its leading byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Register {
    /// The accumulator register.
    R0 = 0,
    /// The index register.
    R1 = 1,
}

impl TryFrom<u8> for Register {
    type Error = InvalidOpcode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Register::R0),
            1 => Ok(Register::R1),
            _ => Err(InvalidOpcode),
        }
    }
}
