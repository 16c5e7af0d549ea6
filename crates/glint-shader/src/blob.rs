//! Blob container: a versioned header followed by the packed code section.
//!
//! ```text
//! 0   magic "GLSB"
//! 4   u16 version
//! 6   u8  target id
//! 7   u8  flags (must be 0)
//! 8   u32 instruction count
//! 12  u32 word count (opcode tokens / words / bundles)
//! 16  u32 code size in bytes
//! 20  u8 sampler count, u8 constant-buffer count, u8 input count, u8 output count
//! 24  u16 element count per constant buffer
//! ..  4 bytes per input attribute, then per output attribute: semantic, index, components, 0
//! ..  zero padding to a multiple of 4, then code bytes
//! ```
//!
//! All integers are little-endian. Headers are parsed strictly: blobs are untrusted input.

use crate::error::{AssembleError, DisassembleError};
use crate::limits::{MAX_BLOB_BYTES, MAX_INSTRUCTIONS};
use crate::program::{Attribute, ProgramHeader, Semantic};
use crate::target::Target;

pub const BLOB_MAGIC: [u8; 4] = *b"GLSB";
pub const BLOB_VERSION: u16 = 1;

const FIXED_HEADER_LEN: usize = 24;
const ATTRIBUTE_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    pub version: u16,
    pub target_id: u8,
    pub flags: u8,
    pub instruction_count: u32,
    pub word_count: u32,
    pub code_size: u32,
    pub program: ProgramHeader,
}

impl BlobHeader {
    /// Length of the encoded header including padding, i.e. the byte offset of the code section.
    pub fn encoded_len(&self) -> usize {
        let raw = FIXED_HEADER_LEN
            + 2 * self.program.constant_buffers.len()
            + ATTRIBUTE_LEN * (self.program.inputs.len() + self.program.outputs.len());
        raw.next_multiple_of(4)
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<(), AssembleError> {
        let program = &self.program;
        out.extend_from_slice(&BLOB_MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.push(self.target_id);
        out.push(self.flags);
        out.extend_from_slice(&self.instruction_count.to_le_bytes());
        out.extend_from_slice(&self.word_count.to_le_bytes());
        out.extend_from_slice(&self.code_size.to_le_bytes());
        out.push(program.sampler_count);
        out.push(count_u8(program.constant_buffers.len(), "constant buffer")?);
        out.push(count_u8(program.inputs.len(), "input attribute")?);
        out.push(count_u8(program.outputs.len(), "output attribute")?);
        for elements in &program.constant_buffers {
            out.extend_from_slice(&elements.to_le_bytes());
        }
        for attr in program.inputs.iter().chain(&program.outputs) {
            out.extend_from_slice(&[attr.semantic.raw(), attr.index, attr.components, 0]);
        }
        out.resize(out.len().next_multiple_of(4), 0);
        Ok(())
    }

    /// Parses and validates a blob header.
    ///
    /// The version is checked before any version-specific field is interpreted.
    pub fn parse(bytes: &[u8]) -> Result<Self, DisassembleError> {
        if bytes.len() > MAX_BLOB_BYTES {
            return Err(DisassembleError::BlobTooLarge {
                len: bytes.len(),
                max: MAX_BLOB_BYTES,
            });
        }

        let magic = bytes.get(0..4).ok_or_else(|| {
            malformed_header(format!(
                "blob is {} bytes, too short to hold the magic",
                bytes.len()
            ))
        })?;
        if magic != BLOB_MAGIC {
            return Err(DisassembleError::BadMagic {
                found: [magic[0], magic[1], magic[2], magic[3]],
            });
        }

        let version = read_u16_le(bytes, 4)?;
        if version != BLOB_VERSION {
            return Err(DisassembleError::UnsupportedVersion(version));
        }

        if bytes.len() < FIXED_HEADER_LEN {
            return Err(malformed_header(format!(
                "blob is {} bytes, shorter than the {FIXED_HEADER_LEN}-byte header",
                bytes.len()
            )));
        }
        let target_id = bytes[6];
        let flags = bytes[7];
        if flags != 0 {
            return Err(malformed_header(format!("unknown header flags 0x{flags:02x}")));
        }

        let instruction_count = read_u32_le(bytes, 8)?;
        let word_count = read_u32_le(bytes, 12)?;
        let code_size = read_u32_le(bytes, 16)?;
        if instruction_count as usize > MAX_INSTRUCTIONS {
            return Err(malformed_header(format!(
                "instruction count {instruction_count} exceeds maximum {MAX_INSTRUCTIONS}"
            )));
        }
        if word_count > instruction_count {
            return Err(malformed_header(format!(
                "word count {word_count} exceeds instruction count {instruction_count}"
            )));
        }

        let sampler_count = bytes[20];
        let cb_count = bytes[21];
        let input_count = bytes[22];
        let output_count = bytes[23];

        let mut offset = FIXED_HEADER_LEN;
        let mut constant_buffers = Vec::with_capacity(usize::from(cb_count));
        for _ in 0..cb_count {
            constant_buffers.push(read_u16_le(bytes, offset)?);
            offset += 2;
        }
        let inputs = read_attributes(bytes, &mut offset, input_count)?;
        let outputs = read_attributes(bytes, &mut offset, output_count)?;

        let code_offset = offset.next_multiple_of(4);
        let padding = bytes.get(offset..code_offset).ok_or_else(|| {
            malformed_header(format!(
                "header padding at {offset}..{code_offset} is out of bounds (blob length {})",
                bytes.len()
            ))
        })?;
        if padding.iter().any(|&b| b != 0) {
            return Err(malformed_header("non-zero header padding"));
        }

        Ok(Self {
            version,
            target_id,
            flags,
            instruction_count,
            word_count,
            code_size,
            program: ProgramHeader {
                sampler_count,
                constant_buffers,
                inputs,
                outputs,
            },
        })
    }
}

/// An assembled program for one target. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Blob {
    target: Target,
    bytes: Vec<u8>,
}

impl Blob {
    pub(crate) fn new(target: Target, bytes: Vec<u8>) -> Self {
        Self { target, bytes }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn header(&self) -> Result<BlobHeader, DisassembleError> {
        BlobHeader::parse(&self.bytes)
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

fn count_u8(count: usize, what: &str) -> Result<u8, AssembleError> {
    u8::try_from(count).map_err(|_| {
        AssembleError::InvalidHeader(format!("{count} {what}s do not fit the blob header"))
    })
}

fn read_attributes(
    bytes: &[u8],
    offset: &mut usize,
    count: u8,
) -> Result<Vec<Attribute>, DisassembleError> {
    let mut out = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let start = *offset;
        let raw = bytes.get(start..start + ATTRIBUTE_LEN).ok_or_else(|| {
            malformed_header(format!(
                "attribute at {start}..{} is out of bounds (blob length {})",
                start + ATTRIBUTE_LEN,
                bytes.len()
            ))
        })?;
        let [semantic, index, components, pad] = [raw[0], raw[1], raw[2], raw[3]];
        if !(1..=4).contains(&components) || pad != 0 {
            return Err(malformed_header(format!(
                "invalid attribute record at byte {start}"
            )));
        }
        out.push(Attribute::new(Semantic::from_raw(semantic), index, components));
        *offset += ATTRIBUTE_LEN;
    }
    Ok(out)
}

fn malformed_header(reason: impl Into<String>) -> DisassembleError {
    DisassembleError::MalformedHeader(reason.into())
}

fn read_u16_le(bytes: &[u8], offset: usize) -> Result<u16, DisassembleError> {
    let slice = bytes.get(offset..offset + 2).ok_or_else(|| {
        malformed_header(format!(
            "need 2 bytes at {offset}..{}, but blob length is {}",
            offset + 2,
            bytes.len()
        ))
    })?;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, DisassembleError> {
    let slice = bytes.get(offset..offset + 4).ok_or_else(|| {
        malformed_header(format!(
            "need 4 bytes at {offset}..{}, but blob length is {}",
            offset + 4,
            bytes.len()
        ))
    })?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header() -> BlobHeader {
        BlobHeader {
            version: BLOB_VERSION,
            target_id: Target::Tile.id(),
            flags: 0,
            instruction_count: 3,
            word_count: 2,
            code_size: 40,
            program: ProgramHeader {
                sampler_count: 2,
                constant_buffers: vec![16],
                inputs: vec![Attribute::new(Semantic::Position, 0, 4)],
                outputs: vec![
                    Attribute::new(Semantic::Color, 0, 4),
                    Attribute::new(Semantic::Unknown(0x40), 1, 2),
                ],
            },
        }
    }

    #[test]
    fn header_roundtrip_with_padding() {
        let header = header();
        let mut out = Vec::new();
        header.write(&mut out).unwrap();
        // 24 fixed + 2 cbuffer + 12 attribute bytes, padded to 40.
        assert_eq!(out.len(), 40);
        assert_eq!(header.encoded_len(), 40);
        assert_eq!(&out[0..4], b"GLSB");
        assert_eq!(BlobHeader::parse(&out).unwrap(), header);
    }

    #[test]
    fn version_is_checked_before_anything_else() {
        let mut out = Vec::new();
        header().write(&mut out).unwrap();
        out[4] = 2;
        // Truncate the rest of the header too: the version error wins.
        out.truncate(6);
        assert_eq!(
            BlobHeader::parse(&out),
            Err(DisassembleError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn rejects_bad_magic_and_short_blobs() {
        assert_eq!(
            BlobHeader::parse(b"DXBC\x01\x00"),
            Err(DisassembleError::BadMagic { found: *b"DXBC" })
        );
        assert!(matches!(
            BlobHeader::parse(b"GL"),
            Err(DisassembleError::MalformedHeader(_))
        ));

        let mut out = Vec::new();
        header().write(&mut out).unwrap();
        out.truncate(30);
        assert!(matches!(
            BlobHeader::parse(&out),
            Err(DisassembleError::MalformedHeader(_))
        ));
    }

    #[test]
    fn rejects_invalid_attribute_and_flags() {
        let mut out = Vec::new();
        header().write(&mut out).unwrap();
        let mut bad_flags = out.clone();
        bad_flags[7] = 1;
        assert!(matches!(
            BlobHeader::parse(&bad_flags),
            Err(DisassembleError::MalformedHeader(_))
        ));

        // First input attribute starts after the 2-byte cbuffer table; zero components is invalid.
        out[26 + 2] = 0;
        assert!(matches!(
            BlobHeader::parse(&out),
            Err(DisassembleError::MalformedHeader(_))
        ));
    }

    #[test]
    fn rejects_oversized_blob() {
        let bytes = vec![0u8; MAX_BLOB_BYTES + 1];
        assert_eq!(
            BlobHeader::parse(&bytes),
            Err(DisassembleError::BlobTooLarge {
                len: MAX_BLOB_BYTES + 1,
                max: MAX_BLOB_BYTES
            })
        );
    }
}
