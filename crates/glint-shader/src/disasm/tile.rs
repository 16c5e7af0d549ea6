//! Tile bundle decoder: expands a 160-bit bundle into its micro-ops and re-creates the implicit
//! accumulator of `mad`.

use half::f16;

use crate::bits::{BitCursor, Field};
use crate::error::DisassembleError;
use crate::model::generic::class_from_code;
use crate::model::tile::{self as layout, TILE};
use crate::model::InstructionModel;
use crate::program::{Immediate, Instruction, Operand, Predicate, Register, ResourceSlot, Swizzle};

use super::{
    check_slot, check_write_mask, decode_write_mask, disassemble_with, implicit_operand, is_blank,
    malformed, rule_at, Listing, Malformed,
};

const SLOT_BITS: u32 = layout::SLOT_TAG.width + layout::SLOT_PAYLOAD.width;

pub(crate) fn disassemble(bytes: &[u8]) -> Result<Listing, DisassembleError> {
    disassemble_with(&TILE, bytes, decode_bundle)
}

fn decode_bundle(
    model: &InstructionModel,
    code: &[u8],
    bundle: BitCursor,
    out: &mut Vec<Instruction>,
) -> Result<(), Malformed> {
    let count = bundle.read(code, layout::BUNDLE_COUNT)? as usize;
    if !(1..=layout::BUNDLE_SLOTS.len()).contains(&count) {
        return Err(malformed(format!("invalid micro-op count {count}")));
    }
    if bundle.read(code, layout::BUNDLE_RESERVED)? != 0 {
        return Err(malformed("reserved bundle bits are set"));
    }

    for (i, &start) in layout::BUNDLE_SLOTS.iter().enumerate() {
        let (_, rest) = bundle.split(start as usize)?;
        let (op, _) = rest.split(layout::MICRO_OP_BITS as usize)?;
        if i < count {
            decode_micro_op(model, code, op, out)?;
        } else if !is_blank(code, op)? {
            return Err(malformed(format!("unused micro-op slot {i} is not empty")));
        }
    }
    Ok(())
}

fn decode_micro_op(
    model: &InstructionModel,
    code: &[u8],
    op: BitCursor,
    out: &mut Vec<Instruction>,
) -> Result<(), Malformed> {
    let rule = rule_at(model, code, op)?;
    let write_mask = decode_write_mask(op.read(code, layout::WRITE_MASK)?);
    check_write_mask(rule, write_mask)?;
    let negate = op.read(code, layout::PREDICATE_NEGATE)? == 1;
    let predicate = if op.read(code, layout::PREDICATED)? == 1 {
        Some(Predicate { index: 0, negate })
    } else if negate {
        return Err(malformed("predicate negate is set on an unpredicated micro-op"));
    } else {
        None
    };

    let encoded = rule.encoded_operands();
    let mut operands = Vec::with_capacity(rule.slots.len());
    for (position, &start) in layout::OPERAND_SLOTS.iter().enumerate() {
        let (_, slot) = op.split(start as usize)?;
        let (slot, _) = slot.split(SLOT_BITS as usize)?;
        let negate = op.read(code, Field::new(layout::SLOT_NEGATE + position as u32, 1))? == 1;

        if position >= encoded {
            if negate || slot.read(code, layout::SLOT_TAG)? != layout::TAG_NONE {
                return Err(malformed(format!(
                    "`{}` uses operand slot {position}",
                    rule.opcode
                )));
            }
            continue;
        }
        let operand = decode_slot(code, slot, negate)?;
        check_slot(rule, position, &operand)?;
        operands.push(operand);
    }

    if let Some(implicit) = rule.implicit {
        operands.push(implicit_operand(implicit, &operands)?);
    }

    out.push(Instruction {
        opcode: rule.opcode,
        operands,
        predicate,
        write_mask,
    });
    Ok(())
}

fn decode_slot(code: &[u8], slot: BitCursor, negate: bool) -> Result<Operand, Malformed> {
    let tag = slot.read(code, layout::SLOT_TAG)?;
    if negate && tag != layout::TAG_REGISTER {
        return Err(malformed("negate flag on a non-register operand"));
    }
    let payload = slot.read(code, layout::SLOT_PAYLOAD)?;

    Ok(match tag {
        layout::TAG_REGISTER => {
            let raw_class = slot.read(code, layout::REG_CLASS)?;
            let class = class_from_code(raw_class)
                .ok_or_else(|| malformed(format!("invalid register class {raw_class}")))?;
            Operand::Register(Register {
                class,
                index: slot.read(code, layout::REG_INDEX)? as u16,
                swizzle: Swizzle::from_byte(slot.read(code, layout::REG_SWIZZLE)? as u8),
                negate,
            })
        }
        layout::TAG_F16 => Immediate::f32(f16::from_bits(payload as u16).to_f32()).into(),
        layout::TAG_I16 => Immediate::i32(i64::from(payload as u16 as i16)).into(),
        layout::TAG_U16 => Immediate::u32(payload as i64).into(),
        layout::TAG_SAMPLER => ResourceSlot::sampler(payload as u16).into(),
        layout::TAG_CONSTANT_BUFFER => ResourceSlot::constant_buffer(
            slot.read(code, layout::CB_SLOT)? as u16,
            slot.read(code, layout::CB_ELEMENT)? as u16,
        )
        .into(),
        layout::TAG_NONE => return Err(malformed("missing operand")),
        tag => return Err(malformed(format!("invalid operand tag {tag}"))),
    })
}
