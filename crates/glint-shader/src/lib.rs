//! Shader translation for glint targets.
//!
//! This crate assembles a hardware-neutral shader program ([`ShaderProgram`]) into a
//! target-specific binary [`Blob`], and disassembles blobs back into a [`Listing`] for inspection.
//!
//! Three targets are supported (see [`Target`]):
//!
//! - `generic`: variable-width instructions built from 32-bit tokens.
//! - `legacy`: fixed 64-bit instruction words with a small register file.
//! - `tile`: 160-bit bundles carrying up to two 72-bit micro-operations.
//!
//! Every operation is a pure function over immutable inputs and `static` instruction tables, so
//! programs can be assembled and disassembled concurrently without any locking. Blobs are treated
//! as **untrusted** on the decode path: malformed data is reported, never panicked on.

#![forbid(unsafe_code)]

pub mod asm;
pub mod bits;
pub mod blob;
pub mod cache;
pub mod disasm;
mod error;
pub mod limits;
pub mod model;
pub mod program;
pub mod target;

pub use crate::asm::assemble;
pub use crate::blob::{Blob, BlobHeader, BLOB_MAGIC, BLOB_VERSION};
pub use crate::cache::{BlobCache, CacheLookup, CacheLookupSource, ProgramKey};
pub use crate::disasm::{disassemble, DecodedInstruction, Listing, MalformedInstruction};
pub use crate::error::{AssembleError, DisassembleError};
pub use crate::model::{EncodingRule, InstructionModel, InstructionWidth, UnsupportedOpcode};
pub use crate::program::{
    Attribute, Component, ImmType, Immediate, Instruction, Opcode, Operand, Predicate,
    ProgramHeader, Register, RegisterClass, ResourceKind, ResourceSlot, Semantic, ShaderProgram,
    Swizzle, WriteMask,
};
pub use crate::target::{for_target, Backend, Target};
