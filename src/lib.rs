//! Bytecode generator for the Android Packet Filter (APF) interpreter.
//!
//! APF is a small bytecode language executed in-kernel (or on low-power
//! network hardware) to decide whether incoming packets are dropped or
//! passed to the host without waking the main CPU. This crate is the
//! assembler side of that contract: programs are composed by appending
//! typed instructions to an [`ApfGenerator`], which validates operands
//! against the targeted interpreter version, resolves symbolic labels to
//! byte offsets and emits interpreter-compatible bytecode.
//!
//! Branch offsets are encoded as variable-width immediates, so shrinking
//! one instruction can let others shrink in turn; emission drives that
//! to a fixed point and produces the minimum-size encoding.
//!
//! ## Example
//!
//! ```
//! use apf_asm::{ApfGenerator, Register, Target};
//!
//! # fn main() -> Result<(), apf_asm::AssembleError> {
//! let mut gen = ApfGenerator::new(2)?;
//! // Accept anything that is not IPv4, reject IPv4 broadcast.
//! gen.add_load16(Register::R0, 12)
//!     .add_jump_if_r0_not_equals(0x0800, Target::Pass)
//!     .add_load32(Register::R0, 30)
//!     .add_jump_if_r0_equals(0xffff_ffff, Target::Drop);
//! let bytecode = gen.generate()?;
//! assert!(!bytecode.is_empty());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod consts;
mod error;
mod generator;
mod imm;
mod instruction;
mod opcode;

pub use error::{AssembleError, InvalidOpcode};
pub use generator::ApfGenerator;
pub use imm::{Imm, ImmKind};
pub use instruction::Target;
pub use opcode::{ExtOpcode, Opcode, Register};

/// Crate prelude.
pub mod prelude {
    pub use crate::consts::*;
    pub use crate::error::{AssembleError, InvalidOpcode};
    pub use crate::generator::ApfGenerator;
    pub use crate::imm::{Imm, ImmKind};
    pub use crate::instruction::Target;
    pub use crate::opcode::{ExtOpcode, Opcode, Register};
}
