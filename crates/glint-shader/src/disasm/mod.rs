//! Disassembler core.
//!
//! The header is parsed first and fixes the iteration bounds. The shared loop then walks the
//! code section with a [`BitCursor`]: it sizes the next word (fixed, or from the embedded length
//! field), hands the bounded word to the target's word decoder, and advances. Target
//! specializations ([`legacy`], [`tile`]) only replace the word decoder.
//!
//! Decoding never guesses. The first undecodable word ends the listing, which then carries the
//! instructions decoded so far plus a [`MalformedInstruction`] pointing at that word.

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::bits::{BitCursor, BitsError, Field};
use crate::blob::BlobHeader;
use crate::error::DisassembleError;
use crate::model::generic::{self as layout, GENERIC};
use crate::model::{EncodingRule, Implicit, InstructionModel, InstructionWidth};
use crate::program::{
    ImmType, Immediate, Instruction, Operand, Predicate, ProgramHeader, Register, ResourceKind,
    ResourceSlot, ShaderProgram, Swizzle, WriteMask,
};
use crate::target::{for_target, Target};

pub mod legacy;
pub mod tile;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed instruction {instruction_index} at byte offset {byte_offset}: {reason}")]
pub struct MalformedInstruction {
    /// Absolute offset (from the start of the blob) of the word that failed to decode.
    pub byte_offset: usize,
    /// Number of instructions successfully decoded before the failure.
    pub instruction_index: usize,
    pub reason: String,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Absolute offset of the word carrying this instruction. Micro-ops of one tile bundle share
    /// their bundle's offset.
    pub byte_offset: usize,
    pub instruction: Instruction,
}

/// Result of disassembling a blob: the decoded instructions and, if decoding stopped early, why.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub target: Target,
    pub header: ProgramHeader,
    pub instructions: Vec<DecodedInstruction>,
    pub malformed: Option<MalformedInstruction>,
}

impl Listing {
    pub fn is_complete(&self) -> bool {
        self.malformed.is_none()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.instructions.iter().map(|d| &d.instruction)
    }

    /// Strict form: a listing that stopped early is an error.
    pub fn into_program(self) -> Result<ShaderProgram, DisassembleError> {
        if let Some(malformed) = self.malformed {
            return Err(DisassembleError::MalformedInstruction(malformed));
        }
        Ok(ShaderProgram::new(
            self.header,
            self.instructions
                .into_iter()
                .map(|d| d.instruction)
                .collect(),
        ))
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "; {} shader, {} instructions",
            self.target,
            self.instructions.len()
        )?;
        let header = &self.header;
        if header.sampler_count > 0 {
            writeln!(f, "; samplers: {}", header.sampler_count)?;
        }
        for (slot, elements) in header.constant_buffers.iter().enumerate() {
            writeln!(f, "; cb{slot}: {elements} elements")?;
        }
        for attr in &header.inputs {
            writeln!(f, "; input {attr}")?;
        }
        for attr in &header.outputs {
            writeln!(f, "; output {attr}")?;
        }
        for decoded in &self.instructions {
            writeln!(f, "{:04x}: {}", decoded.byte_offset, decoded.instruction)?;
        }
        if let Some(m) = &self.malformed {
            writeln!(
                f,
                "; malformed at byte 0x{:04x} (instruction {}): {}",
                m.byte_offset, m.instruction_index, m.reason
            )?;
        }
        Ok(())
    }
}

/// Disassembles `bytes` as a blob for `target`.
///
/// Header problems (size, magic, version, target, layout) are errors. Problems in the code
/// section are reported through [`Listing::malformed`].
pub fn disassemble(bytes: &[u8], target: Target) -> Result<Listing, DisassembleError> {
    (for_target(target).disassemble)(bytes)
}

pub(crate) fn disassemble_generic(bytes: &[u8]) -> Result<Listing, DisassembleError> {
    disassemble_with(&GENERIC, bytes, decode_generic_word)
}

/// Why a word failed to decode.
#[derive(Debug)]
pub(crate) struct Malformed(pub(crate) String);

impl From<BitsError> for Malformed {
    fn from(err: BitsError) -> Self {
        Self(err.to_string())
    }
}

pub(crate) fn malformed(reason: impl Into<String>) -> Malformed {
    Malformed(reason.into())
}

/// Decodes the single word bounded by the cursor, appending the instruction(s) it carries.
pub(crate) type WordDecoder =
    fn(&InstructionModel, &[u8], BitCursor, &mut Vec<Instruction>) -> Result<(), Malformed>;

pub(crate) fn disassemble_with(
    model: &InstructionModel,
    bytes: &[u8],
    decode: WordDecoder,
) -> Result<Listing, DisassembleError> {
    let header = BlobHeader::parse(bytes)?;
    if header.target_id != model.target.id() {
        return Err(DisassembleError::TargetMismatch {
            expected: model.target,
            found: header.target_id,
        });
    }

    let code_offset = header.encoded_len();
    let code = bytes.get(code_offset..).unwrap_or_default();
    let expected = header.instruction_count as usize;

    let mut listing = Listing {
        target: model.target,
        header: header.program.clone(),
        instructions: Vec::with_capacity(expected.min(code.len())),
        malformed: None,
    };
    let fail = |at: BitCursor, decoded: usize, reason: String| {
        Some(MalformedInstruction {
            byte_offset: code_offset + at.byte_offset(),
            instruction_index: decoded,
            reason,
        })
    };

    let mut cursor = BitCursor::over(code);
    let mut words = 0u32;
    let mut scratch = Vec::with_capacity(2);
    while listing.instructions.len() < expected {
        scratch.clear();
        let decoded = listing.instructions.len();
        match decode_next(model, code, cursor, decode, &mut scratch) {
            Ok(_) if decoded + scratch.len() > expected => {
                listing.malformed = fail(
                    cursor,
                    decoded,
                    format!("word carries more than the {expected} declared instructions"),
                );
                break;
            }
            Ok(rest) => {
                let byte_offset = code_offset + cursor.byte_offset();
                listing
                    .instructions
                    .extend(scratch.drain(..).map(|instruction| DecodedInstruction {
                        byte_offset,
                        instruction,
                    }));
                cursor = rest;
                words += 1;
            }
            // A word is all or nothing: micro-ops already decoded from a failing bundle are
            // dropped along with it, and the diagnostic points at the bundle.
            Err(Malformed(reason)) => {
                listing.malformed = fail(cursor, decoded, reason);
                break;
            }
        }
    }

    if listing.malformed.is_none() {
        let decoded = listing.instructions.len();
        if !cursor.is_empty() {
            listing.malformed = fail(
                cursor,
                decoded,
                format!("{} trailing code bytes", cursor.remaining().div_ceil(8)),
            );
        } else if words != header.word_count {
            listing.malformed = fail(
                cursor,
                decoded,
                format!(
                    "header declares {} words, code holds {words}",
                    header.word_count
                ),
            );
        } else if code.len() != header.code_size as usize {
            listing.malformed = fail(
                cursor,
                decoded,
                format!(
                    "header declares {} code bytes, blob holds {}",
                    header.code_size,
                    code.len()
                ),
            );
        }
    }

    if let Some(m) = &listing.malformed {
        warn!(
            backend = %model.target,
            byte_offset = m.byte_offset,
            decoded = m.instruction_index,
            reason = %m.reason,
            "malformed shader blob"
        );
    }
    debug!(
        backend = %model.target,
        instructions = listing.instructions.len(),
        words,
        complete = listing.is_complete(),
        "disassembled shader blob"
    );
    Ok(listing)
}

/// Sizes and decodes the word at `cursor`; returns the cursor just past it.
fn decode_next(
    model: &InstructionModel,
    code: &[u8],
    cursor: BitCursor,
    decode: WordDecoder,
    out: &mut Vec<Instruction>,
) -> Result<BitCursor, Malformed> {
    let bits = match (model.bundle, model.width) {
        (None, InstructionWidth::Variable { unit_bits, length }) => {
            let units = cursor
                .read(code, length)
                .map_err(|_| truncated(cursor, u64::from(length.end())))?;
            if units == 0 {
                return Err(malformed("instruction length field is zero"));
            }
            units * u64::from(unit_bits)
        }
        _ => u64::from(model.word_bits()),
    };
    let (word, rest) = cursor
        .split(bits as usize)
        .map_err(|_| truncated(cursor, bits))?;
    decode(model, code, word, out)?;
    Ok(rest)
}

fn truncated(cursor: BitCursor, bits: u64) -> Malformed {
    malformed(format!(
        "truncated instruction: needs {} bytes, {} remain",
        bits.div_ceil(8),
        cursor.remaining() / 8
    ))
}

/// Reads the opcode field at the start of `word` and resolves it against the model.
pub(crate) fn rule_at<'m>(
    model: &'m InstructionModel,
    code: &[u8],
    word: BitCursor,
) -> Result<&'m EncodingRule, Malformed> {
    let raw = word.read(code, model.opcode)?;
    u8::try_from(raw)
        .ok()
        .and_then(|c| model.lookup_code(c))
        .ok_or_else(|| malformed(format!("unknown opcode code 0x{raw:02x}")))
}

pub(crate) fn decode_write_mask(raw: u64) -> Option<WriteMask> {
    (raw != 0).then(|| WriteMask::from_bits_truncate(raw as u8))
}

/// Rejects a write mask on an opcode without a destination.
pub(crate) fn check_write_mask(
    rule: &EncodingRule,
    write_mask: Option<WriteMask>,
) -> Result<(), Malformed> {
    if write_mask.is_some() && !rule.opcode.writes_destination() {
        return Err(malformed(format!(
            "`{}` has no destination but a write mask is set",
            rule.opcode
        )));
    }
    Ok(())
}

/// Rejects an operand the rule does not allow at `position`.
pub(crate) fn check_slot(
    rule: &EncodingRule,
    position: usize,
    operand: &Operand,
) -> Result<(), Malformed> {
    match rule.slots.get(position) {
        Some(slot) if slot.accepts(operand) => Ok(()),
        _ => Err(malformed(format!(
            "operand {position} of `{}` cannot be {operand}",
            rule.opcode
        ))),
    }
}

/// Re-creates the operand a target leaves out of the bitstream.
pub(crate) fn implicit_operand(
    implicit: Implicit,
    operands: &[Operand],
) -> Result<Operand, Malformed> {
    let Some(Operand::Register(dst)) = operands.first() else {
        return Err(malformed("implicit operand without a destination register"));
    };
    Ok(match implicit {
        Implicit::SamplerFromDst => ResourceSlot::sampler(dst.index).into(),
        Implicit::AccumulatorFromDst => Register::new(dst.class, dst.index).into(),
    })
}

/// True if every bit under the cursor is zero.
pub(crate) fn is_blank(code: &[u8], at: BitCursor) -> Result<bool, Malformed> {
    let mut at = at;
    while !at.is_empty() {
        let width = at.remaining().min(64);
        if at.read(code, Field::new(0, width as u32))? != 0 {
            return Ok(false);
        }
        at = at.advance(width)?;
    }
    Ok(true)
}

fn decode_generic_word(
    model: &InstructionModel,
    code: &[u8],
    word: BitCursor,
    out: &mut Vec<Instruction>,
) -> Result<(), Malformed> {
    let rule = rule_at(model, code, word)?;
    if word.read(code, layout::RESERVED)? != 0 {
        return Err(malformed("reserved opcode token bits are set"));
    }

    let write_mask = decode_write_mask(word.read(code, layout::WRITE_MASK)?);
    check_write_mask(rule, write_mask)?;
    let index = word.read(code, layout::PREDICATE_INDEX)?;
    let negate = word.read(code, layout::PREDICATE_NEGATE)? == 1;
    let predicate = if word.read(code, layout::PREDICATED)? == 1 {
        Some(Predicate {
            index: index as u8,
            negate,
        })
    } else if index != 0 || negate {
        return Err(malformed("predicate bits are set on an unpredicated instruction"));
    } else {
        None
    };

    let (_, mut at) = word.split(layout::TOKEN_BITS as usize)?;
    let mut operands = Vec::with_capacity(rule.slots.len());
    for position in 0..rule.slots.len() {
        let (operand, rest) = decode_generic_operand(code, at)?;
        check_slot(rule, position, &operand)?;
        operands.push(operand);
        at = rest;
    }
    if !at.is_empty() {
        return Err(malformed(format!(
            "length field declares {} more bits than `{}` uses",
            at.remaining(),
            rule.opcode
        )));
    }

    out.push(Instruction {
        opcode: rule.opcode,
        operands,
        predicate,
        write_mask,
    });
    Ok(())
}

fn decode_generic_operand(code: &[u8], at: BitCursor) -> Result<(Operand, BitCursor), Malformed> {
    let token_bits = layout::TOKEN_BITS as usize;
    let (token, rest) = at
        .split(token_bits)
        .map_err(|_| malformed("operand runs past the instruction length"))?;

    let operand = match token.read(code, layout::OPERAND_TAG)? {
        layout::TAG_REGISTER => {
            if token.read(code, layout::REG_RESERVED)? != 0 {
                return Err(malformed("reserved register token bits are set"));
            }
            let raw_class = token.read(code, layout::REG_CLASS)?;
            let class = layout::class_from_code(raw_class)
                .ok_or_else(|| malformed(format!("invalid register class {raw_class}")))?;
            Operand::Register(Register {
                class,
                index: token.read(code, layout::REG_INDEX)? as u16,
                swizzle: Swizzle::from_byte(token.read(code, layout::REG_SWIZZLE)? as u8),
                negate: token.read(code, layout::REG_NEGATE)? == 1,
            })
        }
        layout::TAG_IMMEDIATE => {
            if token.read(code, layout::IMM_RESERVED)? != 0 {
                return Err(malformed("reserved immediate token bits are set"));
            }
            let raw_ty = token.read(code, layout::IMM_TYPE)?;
            let ty = layout::imm_type_from_code(raw_ty)
                .ok_or_else(|| malformed(format!("invalid immediate type {raw_ty}")))?;
            let (value_token, rest) = rest
                .split(token_bits)
                .map_err(|_| malformed("immediate value runs past the instruction length"))?;
            let whole = Field::new(0, layout::TOKEN_BITS);
            let value = match ty {
                ImmType::I32 => value_token.read_signed(code, whole)?,
                ImmType::F32 | ImmType::U32 => value_token.read(code, whole)? as i64,
            };
            return Ok((Operand::Immediate(Immediate { ty, value }), rest));
        }
        layout::TAG_RESOURCE => {
            if token.read(code, layout::RES_RESERVED)? != 0 {
                return Err(malformed("reserved resource token bits are set"));
            }
            let raw_kind = token.read(code, layout::RES_KIND)?;
            let kind = layout::resource_kind_from_code(raw_kind)
                .ok_or_else(|| malformed(format!("invalid resource kind {raw_kind}")))?;
            let slot = token.read(code, layout::RES_SLOT)? as u16;
            let element = token.read(code, layout::RES_ELEMENT)? as u16;
            Operand::Resource(match kind {
                ResourceKind::Sampler if element != 0 => {
                    return Err(malformed(format!("sampler s{slot} carries element {element}")));
                }
                ResourceKind::Sampler => ResourceSlot::sampler(slot),
                ResourceKind::ConstantBuffer => ResourceSlot::constant_buffer(slot, element),
            })
        }
        tag => return Err(malformed(format!("invalid operand tag {tag}"))),
    };
    Ok((operand, rest))
}
