//! Interpreter parameters shared between the generator and the APF
//! interpreter it targets.

/* INTERPRETER VERSIONS */

/// Oldest interpreter version a generator can target.
pub const MIN_APF_VERSION: u32 = 2;

/// Version that introduced the output buffer write and copy opcodes
/// (WRITE, MEMCOPY and their extended register forms) as well as the
/// data-memory opcodes LDDW/STDW.
pub const APF_VERSION_4: u32 = 4;

/// In-development version gating counters on PASS/DROP, the output
/// buffer lifecycle (ALLOCATE, TRANSMIT, DISCARD) and the leading data
/// region.
pub const MIN_APF_VERSION_IN_DEV: u32 = 5;

/* MEMORY SLOTS */

/// Number of 32-bit scratch memory slots managed by the interpreter.
pub const MEMORY_SLOTS: u32 = 16;

/// Slot prefilled by the interpreter with the IPv4 header length of the
/// current packet. Writable like any other slot.
pub const IPV4_HEADER_SIZE_SLOT: u32 = 13;

/// Slot prefilled by the interpreter with the size of the current packet.
pub const PACKET_SIZE_SLOT: u32 = 14;

/// Slot prefilled by the interpreter with the age of the filter program,
/// in seconds.
pub const FILTER_AGE_SLOT: u32 = 15;

/* OPERAND DOMAINS */

/// Smallest valid counter number for counted PASS/DROP instructions.
pub const MIN_COUNTER: u32 = 1;

/// Largest valid counter number for counted PASS/DROP instructions.
pub const MAX_COUNTER: u32 = 1000;

/// Largest copy length accepted by the MEMCOPY families.
pub const MAX_COPY_LEN: u32 = 255;

/// Largest source offset accepted by the MEMCOPY families.
pub const MAX_COPY_OFFSET: u32 = 65535;

/// Largest byte length of the leading data region.
pub const MAX_DATA_LEN: usize = 65535;
