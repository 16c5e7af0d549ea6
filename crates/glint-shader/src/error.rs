use thiserror::Error;

use crate::disasm::MalformedInstruction;
use crate::program::{Opcode, Predicate};
use crate::target::Target;

/// Failure to assemble a program. Assembly is all-or-nothing: no blob is produced on error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("instruction {index}: opcode `{opcode}` has no encoding on the {target} target")]
    UnsupportedOpcode {
        index: usize,
        opcode: Opcode,
        target: Target,
    },
    #[error("instruction {index}, operand {position}: {reason}")]
    InvalidOperand {
        index: usize,
        position: usize,
        reason: String,
    },
    #[error("instruction {index}: `{opcode}` takes {expected} operands, found {found}")]
    OperandCount {
        index: usize,
        opcode: Opcode,
        expected: usize,
        found: usize,
    },
    #[error("instruction {index}: predicate {predicate} is not supported on the {target} target")]
    UnsupportedPredicate {
        index: usize,
        predicate: Predicate,
        target: Target,
    },
    #[error(
        "instruction {index}{}: value {value} does not fit in a {width}-bit field",
        .position.map(|p| format!(", operand {p}")).unwrap_or_default()
    )]
    FieldOverflow {
        index: usize,
        position: Option<usize>,
        width: u32,
        value: i128,
    },
    #[error("{resource} count {count} exceeds the {target} target limit of {max}")]
    ResourceLimit {
        resource: &'static str,
        count: usize,
        max: usize,
        target: Target,
    },
    #[error("invalid program header: {0}")]
    InvalidHeader(String),
    #[error("program has {count} instructions, exceeding the maximum of {max}")]
    ProgramTooLarge { count: usize, max: usize },
    #[error("assembled blob is {len} bytes, exceeding the maximum of {max}")]
    BlobTooLarge { len: usize, max: usize },
}

/// Failure to disassemble a blob.
///
/// Header problems abort before any instruction is decoded. Problems inside the code section are
/// reported through [`crate::Listing::malformed`] instead, and only surface as
/// [`DisassembleError::MalformedInstruction`] through the strict [`crate::Listing::into_program`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisassembleError {
    #[error("blob length {len} exceeds maximum {max} bytes")]
    BlobTooLarge { len: usize, max: usize },
    #[error("bad blob magic {found:02x?}")]
    BadMagic { found: [u8; 4] },
    #[error("unsupported blob version {0}")]
    UnsupportedVersion(u16),
    #[error("blob was assembled for target id {found}, expected {expected}")]
    TargetMismatch { expected: Target, found: u8 },
    #[error("malformed blob header: {0}")]
    MalformedHeader(String),
    #[error(transparent)]
    MalformedInstruction(#[from] MalformedInstruction),
}
