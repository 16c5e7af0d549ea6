//! Tile packer: groups micro-ops into 160-bit bundles.
//!
//! Adjacent bundleable ALU ops share a bundle when the second neither reads nor writes the
//! register written by the first. Pairing is greedy and in program order, so bundling never
//! reorders instructions.

use half::f16;
use tracing::trace;

use crate::blob::Blob;
use crate::error::AssembleError;
use crate::model::generic::class_code;
use crate::model::tile::{self as layout, TILE};
use crate::model::{EncodingRule, InstructionModel};
use crate::program::{ImmType, Immediate, Instruction, Operand, ResourceKind, ShaderProgram};

use super::{alloc, assemble_with, overflow, rule_for, unencodable};

pub(crate) fn assemble(program: &ShaderProgram) -> Result<Blob, AssembleError> {
    assemble_with(&TILE, program, pack)
}

fn pack(
    model: &InstructionModel,
    instructions: &[Instruction],
    code: &mut Vec<u8>,
) -> Result<u32, AssembleError> {
    let mut bundles = 0u32;
    let mut index = 0;
    while let Some(first) = instructions.get(index) {
        let first_rule = rule_for(model, index, first)?;
        let mut ops = vec![(index, first_rule, first)];
        if let Some(second) = instructions.get(index + 1) {
            let second_rule = rule_for(model, index + 1, second)?;
            if can_pair(first_rule, first, second_rule, second) {
                ops.push((index + 1, second_rule, second));
            }
        }

        let base = alloc(code, layout::BUNDLE_BITS);
        layout::BUNDLE_COUNT
            .write(code, base, ops.len() as u64)
            .map_err(overflow(index, None))?;
        for (&slot, &(op_index, rule, inst)) in layout::BUNDLE_SLOTS.iter().zip(&ops) {
            pack_micro_op(code, base + slot as usize, op_index, rule, inst)?;
        }

        trace!(bundle = bundles, first = index, micro_ops = ops.len(), "packed tile bundle");
        bundles += 1;
        index += ops.len();
    }
    Ok(bundles)
}

fn can_pair(
    first_rule: &EncodingRule,
    first: &Instruction,
    second_rule: &EncodingRule,
    second: &Instruction,
) -> bool {
    if !(first_rule.bundleable && second_rule.bundleable) {
        return false;
    }
    let Some(dst) = first.destination() else {
        return false;
    };
    !second
        .operands
        .iter()
        .any(|op| matches!(op, Operand::Register(reg) if reg.same_register(dst)))
}

fn pack_micro_op(
    code: &mut Vec<u8>,
    base: usize,
    index: usize,
    rule: &EncodingRule,
    inst: &Instruction,
) -> Result<(), AssembleError> {
    let at = overflow(index, None);
    layout::CODE.write(code, base, u64::from(rule.code)).map_err(&at)?;
    if let Some(mask) = inst.write_mask {
        layout::WRITE_MASK
            .write(code, base, u64::from(mask.bits()))
            .map_err(&at)?;
    }
    if let Some(pred) = inst.predicate {
        layout::PREDICATED.write(code, base, 1).map_err(&at)?;
        layout::PREDICATE_NEGATE
            .write(code, base, u64::from(pred.negate))
            .map_err(&at)?;
    }

    for (position, operand) in inst.operands.iter().take(rule.encoded_operands()).enumerate() {
        let Some(&start) = layout::OPERAND_SLOTS.get(position) else {
            return Err(unencodable(index, position, operand));
        };
        let slot_base = base + start as usize;
        let at = overflow(index, Some(position));
        let tag = match operand {
            Operand::Register(reg) => {
                if reg.negate {
                    crate::bits::write_field(
                        code,
                        base + (layout::SLOT_NEGATE as usize) + position,
                        1,
                        1,
                    )
                    .map_err(&at)?;
                }
                layout::REG_CLASS
                    .write(code, slot_base, class_code(reg.class))
                    .map_err(&at)?;
                layout::REG_INDEX
                    .write(code, slot_base, u64::from(reg.index))
                    .map_err(&at)?;
                layout::REG_SWIZZLE
                    .write(code, slot_base, u64::from(reg.swizzle.to_byte()))
                    .map_err(&at)?;
                layout::TAG_REGISTER
            }
            Operand::Immediate(imm) => {
                let (tag, payload) = immediate_payload(imm).map_err(|width| {
                    AssembleError::FieldOverflow {
                        index,
                        position: Some(position),
                        width,
                        value: i128::from(imm.value),
                    }
                })?;
                layout::SLOT_PAYLOAD
                    .write(code, slot_base, payload)
                    .map_err(&at)?;
                tag
            }
            Operand::Resource(res) => match res.kind {
                ResourceKind::Sampler => {
                    layout::SLOT_PAYLOAD
                        .write(code, slot_base, u64::from(res.slot))
                        .map_err(&at)?;
                    layout::TAG_SAMPLER
                }
                ResourceKind::ConstantBuffer => {
                    layout::CB_SLOT
                        .write(code, slot_base, u64::from(res.slot))
                        .map_err(&at)?;
                    layout::CB_ELEMENT
                        .write(code, slot_base, u64::from(res.element))
                        .map_err(&at)?;
                    layout::TAG_CONSTANT_BUFFER
                }
            },
        };
        layout::SLOT_TAG.write(code, slot_base, tag).map_err(&at)?;
    }
    Ok(())
}

/// Tag and 16-bit payload for an immediate, or the width it failed to fit.
///
/// `f32` values are narrowed to binary16 (rounded to nearest); finite values beyond the half range
/// overflow rather than becoming infinities.
fn immediate_payload(imm: &Immediate) -> Result<(u64, u64), u32> {
    match imm.ty {
        ImmType::F32 => {
            let bits = u32::try_from(imm.value).map_err(|_| 32u32)?;
            let value = f32::from_bits(bits);
            let half = f16::from_f32(value);
            if value.is_finite() && half.is_infinite() {
                return Err(16);
            }
            Ok((layout::TAG_F16, u64::from(half.to_bits())))
        }
        ImmType::I32 => {
            let value = i16::try_from(imm.value).map_err(|_| 16u32)?;
            Ok((layout::TAG_I16, u64::from(value as u16)))
        }
        ImmType::U32 => {
            let value = u16::try_from(imm.value).map_err(|_| 16u32)?;
            Ok((layout::TAG_U16, u64::from(value)))
        }
    }
}
