//! Generator error implementation.

use thiserror::Error;

/// The byte does not name a defined opcode, extended opcode or register.
///
/// Returned by the `TryFrom<u8>` conversions of the vocabulary enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("invalid opcode byte")]
pub struct InvalidOpcode;

/// Errors raised while composing or emitting a filter program.
///
/// A failed append never commits the offending instruction; the generator
/// stays usable for further appends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AssembleError {
    /// An operand falls outside the domain its opcode declares.
    #[error("{what} {value} is out of range [{min}, {max}]")]
    ValueOutOfRange {
        /// What the operand is, e.g. `"counter"` or `"memory slot"`.
        what: &'static str,
        /// The rejected value.
        value: i64,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// The operation needs a newer interpreter than the one targeted.
    #[error("operation requires interpreter version {required}, generator targets {actual}")]
    VersionMismatch {
        /// Version floor of the rejected operation.
        required: u32,
        /// Version the generator was constructed with.
        actual: u32,
    },
    /// The targeted interpreter version predates the oldest supported one.
    #[error("unsupported interpreter version {0}, minimum supported is 2")]
    UnsupportedVersion(u32),
    /// A label name was defined more than once. The first definition
    /// remains valid.
    #[error("duplicate label {0:?}")]
    DuplicateLabel(String),
    /// A branch references a label with no defining anchor. Detected
    /// during emission.
    #[error("undefined label {0:?}")]
    UndefinedLabel(String),
    /// The data region must precede every other instruction.
    #[error("data region must be the first instruction")]
    DataNotFirst,
}
