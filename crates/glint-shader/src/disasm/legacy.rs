//! Legacy word decoder.
//!
//! The only difference from a plain field-table decode is `tex`, whose sampler is re-created from
//! the destination register index.

use crate::bits::{BitCursor, Field};
use crate::error::DisassembleError;
use crate::model::legacy::{self as layout, LEGACY};
use crate::model::{InstructionModel, Role};
use crate::program::{Instruction, Operand, Register, Swizzle};

use super::{
    check_slot, decode_write_mask, disassemble_with, implicit_operand, malformed, rule_at,
    Listing, Malformed,
};

const SRC_SLOT_BITS: u32 = 16;

pub(crate) fn disassemble(bytes: &[u8]) -> Result<Listing, DisassembleError> {
    disassemble_with(&LEGACY, bytes, decode_word)
}

fn decode_word(
    model: &InstructionModel,
    code: &[u8],
    word: BitCursor,
    out: &mut Vec<Instruction>,
) -> Result<(), Malformed> {
    let rule = rule_at(model, code, word)?;
    if word.read(code, layout::RESERVED)? != 0 {
        return Err(malformed("reserved word bits are set"));
    }

    let has_dst = rule.slots.first().is_some_and(|s| s.role == Role::Dst);
    let write_mask = decode_write_mask(word.read(code, layout::WRITE_MASK)?);
    if !has_dst {
        let start = layout::DST_CLASS.offset;
        let dst_bits = Field::new(start, layout::WRITE_MASK.end() - start);
        if word.read(code, dst_bits)? != 0 {
            return Err(malformed(format!(
                "`{}` has no destination but destination bits are set",
                rule.opcode
            )));
        }
    }

    let mut operands = Vec::with_capacity(rule.slots.len());
    let mut sources = layout::SRC_SLOTS.iter();
    for (position, slot) in rule.slots.iter().take(rule.encoded_operands()).enumerate() {
        let reg = match slot.role {
            Role::Dst => Register::new(
                layout::dst_class_from_code(word.read(code, layout::DST_CLASS)?),
                word.read(code, layout::DST_INDEX)? as u16,
            ),
            Role::Src => {
                let Some(&start) = sources.next() else {
                    return Err(malformed(format!("`{}` has too many sources", rule.opcode)));
                };
                decode_source(code, word, start, position)?
            }
        };
        let operand = Operand::Register(reg);
        check_slot(rule, position, &operand)?;
        operands.push(operand);
    }

    for &start in sources {
        if word.read(code, Field::new(start, SRC_SLOT_BITS))? != 0 {
            return Err(malformed(format!(
                "unused source slot at bit {start} of `{}` is not empty",
                rule.opcode
            )));
        }
    }

    if let Some(implicit) = rule.implicit {
        operands.push(implicit_operand(implicit, &operands)?);
    }

    out.push(Instruction {
        opcode: rule.opcode,
        operands,
        predicate: None,
        write_mask,
    });
    Ok(())
}

fn decode_source(
    code: &[u8],
    word: BitCursor,
    start: u32,
    position: usize,
) -> Result<Register, Malformed> {
    if word.read(code, layout::SRC_PRESENT.within(start))? == 0 {
        return Err(malformed(format!("source operand {position} is missing")));
    }
    let raw_class = word.read(code, layout::SRC_CLASS.within(start))?;
    let class = layout::src_class_from_code(raw_class)
        .ok_or_else(|| malformed(format!("invalid source register class {raw_class}")))?;
    Ok(Register {
        class,
        index: word.read(code, layout::SRC_INDEX.within(start))? as u16,
        swizzle: Swizzle::from_byte(word.read(code, layout::SRC_SWIZZLE.within(start))? as u8),
        negate: word.read(code, layout::SRC_NEGATE.within(start))? == 1,
    })
}
