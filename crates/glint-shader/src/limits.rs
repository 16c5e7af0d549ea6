//! Centralized limits for shader assembly and blob decoding.
//!
//! Blobs reaching the disassembler are treated as untrusted input (they may come from disk, a
//! capture, or a network peer). These limits bound memory usage and prevent pathological headers
//! from triggering large allocations during decoding.

/// Maximum accepted blob length in bytes, header included.
///
/// Real-world programs for every target are a few KiB; keep this generous while still bounding
/// the instruction vector the disassembler allocates up front.
pub const MAX_BLOB_BYTES: usize = 1024 * 1024; // 1 MiB

/// Maximum number of instructions in a program (and declared by a blob header).
pub const MAX_INSTRUCTIONS: usize = 64 * 1024;
