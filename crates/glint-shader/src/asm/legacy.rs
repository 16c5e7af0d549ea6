//! Legacy packer: one 64-bit word per instruction.
//!
//! Uses the shared bit primitives with the legacy field table. Instructions are emitted in program
//! order, one word each; there is no reordering or pairing on this target.

use crate::blob::Blob;
use crate::error::AssembleError;
use crate::model::legacy::{self as layout, LEGACY};
use crate::model::{InstructionModel, Role};
use crate::program::{Instruction, Operand, ShaderProgram};

use super::{alloc, assemble_with, overflow, rule_for, unencodable};

pub(crate) fn assemble(program: &ShaderProgram) -> Result<Blob, AssembleError> {
    assemble_with(&LEGACY, program, pack)
}

fn pack(
    model: &InstructionModel,
    instructions: &[Instruction],
    code: &mut Vec<u8>,
) -> Result<u32, AssembleError> {
    for (index, inst) in instructions.iter().enumerate() {
        let rule = rule_for(model, index, inst)?;
        let base = alloc(code, layout::WORD_BITS);
        let at = overflow(index, None);

        layout::CODE.write(code, base, u64::from(rule.code)).map_err(&at)?;
        if let Some(mask) = inst.write_mask {
            layout::WRITE_MASK
                .write(code, base, u64::from(mask.bits()))
                .map_err(&at)?;
        }

        let mut sources = layout::SRC_SLOTS.iter();
        let encoded = inst.operands.iter().zip(rule.slots).take(rule.encoded_operands());
        for (position, (operand, slot)) in encoded.enumerate() {
            let Operand::Register(reg) = operand else {
                return Err(unencodable(index, position, operand));
            };
            let at = overflow(index, Some(position));
            match slot.role {
                Role::Dst => {
                    let class = layout::dst_class_code(reg.class)
                        .ok_or_else(|| unencodable(index, position, operand))?;
                    layout::DST_CLASS.write(code, base, class).map_err(&at)?;
                    layout::DST_INDEX
                        .write(code, base, u64::from(reg.index))
                        .map_err(&at)?;
                }
                Role::Src => {
                    let (Some(&start), Some(class)) =
                        (sources.next(), layout::src_class_code(reg.class))
                    else {
                        return Err(unencodable(index, position, operand));
                    };
                    let slot_base = base + start as usize;
                    layout::SRC_PRESENT.write(code, slot_base, 1).map_err(&at)?;
                    layout::SRC_CLASS.write(code, slot_base, class).map_err(&at)?;
                    layout::SRC_INDEX
                        .write(code, slot_base, u64::from(reg.index))
                        .map_err(&at)?;
                    layout::SRC_SWIZZLE
                        .write(code, slot_base, u64::from(reg.swizzle.to_byte()))
                        .map_err(&at)?;
                    layout::SRC_NEGATE
                        .write(code, slot_base, u64::from(reg.negate))
                        .map_err(&at)?;
                }
            }
        }
    }
    Ok(instructions.len() as u32)
}
