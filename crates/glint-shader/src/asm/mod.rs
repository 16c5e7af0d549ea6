//! Assembler core.
//!
//! Assembly runs in two passes over the program. The first validates every instruction against
//! the target's [`InstructionModel`] (opcode support, operand count, operand kinds and classes,
//! register cardinalities, resource bindings, predicates, implicit operands). The second packs
//! the validated instructions with the target's packer. Any failure aborts the whole program, so
//! a caller never sees a partial blob.
//!
//! The baseline (generic) packer lives here; [`legacy`] and [`tile`] supply their own.

use tracing::{debug, trace};

use crate::bits::{write_field, write_signed_field, FieldOverflow};
use crate::blob::{Blob, BlobHeader, BLOB_VERSION};
use crate::error::AssembleError;
use crate::limits::{MAX_BLOB_BYTES, MAX_INSTRUCTIONS};
use crate::model::generic::{self as layout, GENERIC};
use crate::model::{
    EncodingRule, Implicit, InstructionModel, OperandKinds, OperandSlot, RegisterClasses, Role,
};
use crate::program::{
    ImmType, Immediate, Instruction, Operand, ProgramHeader, Register, ResourceKind, Semantic,
    ShaderProgram,
};
use crate::target::{for_target, Target};

pub mod legacy;
pub mod tile;

/// Assembles `program` for `target`.
///
/// Deterministic: the same program and target always produce byte-identical blobs.
pub fn assemble(program: &ShaderProgram, target: Target) -> Result<Blob, AssembleError> {
    (for_target(target).assemble)(program)
}

pub(crate) fn assemble_generic(program: &ShaderProgram) -> Result<Blob, AssembleError> {
    assemble_with(&GENERIC, program, pack_generic)
}

/// Appends the code for already-validated instructions; returns the number of words written.
pub(crate) type Packer =
    fn(&InstructionModel, &[Instruction], &mut Vec<u8>) -> Result<u32, AssembleError>;

pub(crate) fn assemble_with(
    model: &InstructionModel,
    program: &ShaderProgram,
    pack: Packer,
) -> Result<Blob, AssembleError> {
    let count = program.instructions.len();
    if count > MAX_INSTRUCTIONS {
        return Err(AssembleError::ProgramTooLarge {
            count,
            max: MAX_INSTRUCTIONS,
        });
    }

    validate_header(model, &program.header)?;
    for (index, inst) in program.instructions.iter().enumerate() {
        validate_instruction(model, &program.header, index, inst)?;
    }

    let mut code = Vec::new();
    let word_count = pack(model, &program.instructions, &mut code)?;

    let header = BlobHeader {
        version: BLOB_VERSION,
        target_id: model.target.id(),
        flags: 0,
        instruction_count: count as u32,
        word_count,
        code_size: code.len() as u32,
        program: program.header.clone(),
    };
    let len = header.encoded_len() + code.len();
    if len > MAX_BLOB_BYTES {
        return Err(AssembleError::BlobTooLarge {
            len,
            max: MAX_BLOB_BYTES,
        });
    }

    let mut bytes = Vec::with_capacity(len);
    header.write(&mut bytes)?;
    bytes.extend_from_slice(&code);

    debug!(
        backend = %model.target,
        instructions = count,
        words = word_count,
        bytes = bytes.len(),
        "assembled shader program"
    );
    Ok(Blob::new(model.target, bytes))
}

fn validate_header(model: &InstructionModel, header: &ProgramHeader) -> Result<(), AssembleError> {
    let limits = &model.limits;
    let checks: [(&'static str, usize, u16); 4] = [
        ("sampler", usize::from(header.sampler_count), limits.sampler),
        (
            "constant buffer",
            header.constant_buffers.len(),
            limits.constant_buffer,
        ),
        ("input attribute", header.inputs.len(), limits.input),
        ("output attribute", header.outputs.len(), limits.output),
    ];
    for (resource, count, max) in checks {
        if count > usize::from(max) {
            return Err(AssembleError::ResourceLimit {
                resource,
                count,
                max: usize::from(max),
                target: model.target,
            });
        }
    }

    for attr in header.inputs.iter().chain(&header.outputs) {
        if !(1..=4).contains(&attr.components) {
            return Err(AssembleError::InvalidHeader(format!(
                "attribute {attr} must have 1 to 4 components"
            )));
        }
        // Raw values with a name would decode as that name.
        if let Semantic::Unknown(raw) = attr.semantic {
            if Semantic::from_raw(raw) != attr.semantic {
                return Err(AssembleError::InvalidHeader(format!(
                    "attribute {attr} uses raw semantic {raw}, which is `{}`",
                    Semantic::from_raw(raw).name()
                )));
            }
        }
    }
    Ok(())
}

fn validate_instruction(
    model: &InstructionModel,
    header: &ProgramHeader,
    index: usize,
    inst: &Instruction,
) -> Result<(), AssembleError> {
    let rule = rule_for(model, index, inst)?;

    if inst.operands.len() != rule.slots.len() {
        return Err(AssembleError::OperandCount {
            index,
            opcode: inst.opcode,
            expected: rule.slots.len(),
            found: inst.operands.len(),
        });
    }
    for (position, (operand, slot)) in inst.operands.iter().zip(rule.slots).enumerate() {
        validate_operand(model, header, slot, operand).map_err(|reason| {
            AssembleError::InvalidOperand {
                index,
                position,
                reason,
            }
        })?;
    }

    if let Some(mask) = inst.write_mask {
        let reason = if !inst.opcode.writes_destination() {
            Some(format!("`{}` has no destination to mask", inst.opcode))
        } else if mask.is_empty() {
            Some("empty write mask".to_owned())
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(AssembleError::InvalidOperand {
                index,
                position: 0,
                reason,
            });
        }
    }

    if let Some(predicate) = inst.predicate {
        if predicate.index >= model.limits.predicate {
            return Err(AssembleError::UnsupportedPredicate {
                index,
                predicate,
                target: model.target,
            });
        }
    }

    if let Some(implicit) = rule.implicit {
        validate_implicit(implicit, inst).map_err(|reason| AssembleError::InvalidOperand {
            index,
            position: rule.slots.len() - 1,
            reason,
        })?;
    }
    Ok(())
}

fn validate_operand(
    model: &InstructionModel,
    header: &ProgramHeader,
    slot: &OperandSlot,
    operand: &Operand,
) -> Result<(), String> {
    if !slot.kinds.contains(OperandKinds::of(operand)) {
        return Err(format!("{} operand is not allowed here", describe(operand)));
    }

    match operand {
        Operand::Register(reg) => {
            if !slot.classes.contains(RegisterClasses::of(reg.class)) {
                let role = match slot.role {
                    Role::Dst => "destination",
                    Role::Src => "source",
                };
                return Err(format!("{reg} cannot be used as a {role}"));
            }
            let count = model.limits.count(reg.class);
            if reg.index >= count {
                return Err(format!(
                    "register {}{} is out of range ({} has {count})",
                    reg.class.prefix(),
                    reg.index,
                    model.target
                ));
            }
            if slot.role == Role::Dst && (reg.negate || !reg.swizzle.is_identity()) {
                return Err(format!(
                    "destination {reg} cannot carry a swizzle or negate"
                ));
            }
        }
        Operand::Immediate(imm) => {
            if !model.immediates.contains(&imm.ty) {
                return Err(format!(
                    "{:?} immediates are not encodable on {}",
                    imm.ty, model.target
                ));
            }
        }
        Operand::Resource(res) => match res.kind {
            ResourceKind::Sampler => {
                if res.element != 0 {
                    return Err(format!("sampler {res} cannot have an element index"));
                }
                if res.slot >= u16::from(header.sampler_count) {
                    return Err(format!(
                        "sampler {res} is not bound (program declares {})",
                        header.sampler_count
                    ));
                }
            }
            ResourceKind::ConstantBuffer => {
                let Some(&elements) = header.constant_buffers.get(usize::from(res.slot)) else {
                    return Err(format!("constant buffer cb{} is not bound", res.slot));
                };
                if res.element >= elements {
                    return Err(format!(
                        "{res} is out of range (cb{} has {elements} elements)",
                        res.slot
                    ));
                }
            }
        },
    }
    Ok(())
}

fn validate_implicit(implicit: Implicit, inst: &Instruction) -> Result<(), String> {
    let (Some(Operand::Register(dst)), Some(last)) = (inst.operands.first(), inst.operands.last())
    else {
        return Err("implicit operand requires a destination register".to_owned());
    };
    match (implicit, last) {
        (Implicit::SamplerFromDst, Operand::Resource(res)) if res.slot == dst.index => Ok(()),
        (Implicit::SamplerFromDst, _) => Err(format!(
            "sampler must be s{} to match destination {dst}",
            dst.index
        )),
        (Implicit::AccumulatorFromDst, Operand::Register(acc))
            if acc.same_register(dst) && acc.swizzle.is_identity() && !acc.negate =>
        {
            Ok(())
        }
        (Implicit::AccumulatorFromDst, _) => Err(format!(
            "accumulator must be the destination register {dst}"
        )),
    }
}

fn describe(operand: &Operand) -> &'static str {
    match operand {
        Operand::Register(_) => "register",
        Operand::Immediate(_) => "immediate",
        Operand::Resource(res) => match res.kind {
            ResourceKind::Sampler => "sampler",
            ResourceKind::ConstantBuffer => "constant buffer",
        },
    }
}

pub(crate) fn rule_for<'m>(
    model: &'m InstructionModel,
    index: usize,
    inst: &Instruction,
) -> Result<&'m EncodingRule, AssembleError> {
    model
        .lookup(inst.opcode)
        .map_err(|err| AssembleError::UnsupportedOpcode {
            index,
            opcode: err.opcode,
            target: err.target,
        })
}

/// Appends `bits` (rounded up to whole bytes) of zeroed code and returns its starting bit.
pub(crate) fn alloc(code: &mut Vec<u8>, bits: u32) -> usize {
    let base = code.len() * 8;
    code.resize(code.len() + (bits as usize).div_ceil(8), 0);
    base
}

pub(crate) fn overflow(
    index: usize,
    position: Option<usize>,
) -> impl Fn(FieldOverflow) -> AssembleError {
    move |err| AssembleError::FieldOverflow {
        index,
        position,
        width: err.width,
        value: err.value,
    }
}

/// An operand kind that passed validation but that the packer has no encoding for.
pub(crate) fn unencodable(index: usize, position: usize, operand: &Operand) -> AssembleError {
    AssembleError::InvalidOperand {
        index,
        position,
        reason: format!("{operand} has no encoding in this position"),
    }
}

fn operand_tokens(operand: &Operand) -> usize {
    match operand {
        Operand::Immediate(_) => 2,
        Operand::Register(_) | Operand::Resource(_) => 1,
    }
}

fn pack_generic(
    model: &InstructionModel,
    instructions: &[Instruction],
    code: &mut Vec<u8>,
) -> Result<u32, AssembleError> {
    for (index, inst) in instructions.iter().enumerate() {
        let rule = rule_for(model, index, inst)?;
        let length = 1 + inst.operands.iter().map(operand_tokens).sum::<usize>();
        let at = overflow(index, None);

        // The length field leads the opcode token so the decoder can bound the instruction.
        let base = alloc(code, layout::TOKEN_BITS);
        layout::LENGTH.write(code, base, length as u64).map_err(&at)?;
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
            layout::PREDICATE_INDEX
                .write(code, base, u64::from(pred.index))
                .map_err(&at)?;
        }

        for (position, operand) in inst.operands.iter().enumerate() {
            pack_generic_operand(code, operand).map_err(overflow(index, Some(position)))?;
        }
        trace!(index, opcode = %inst.opcode, tokens = length, "encoded instruction");
    }
    Ok(instructions.len() as u32)
}

fn pack_generic_operand(code: &mut Vec<u8>, operand: &Operand) -> Result<(), FieldOverflow> {
    let base = alloc(code, layout::TOKEN_BITS);
    match operand {
        Operand::Register(reg) => pack_generic_register(code, base, reg),
        Operand::Immediate(imm) => {
            layout::OPERAND_TAG.write(code, base, layout::TAG_IMMEDIATE)?;
            layout::IMM_TYPE.write(code, base, layout::imm_type_code(imm.ty))?;
            let value_base = alloc(code, layout::TOKEN_BITS);
            pack_immediate_value(code, value_base, imm)
        }
        Operand::Resource(res) => {
            layout::OPERAND_TAG.write(code, base, layout::TAG_RESOURCE)?;
            layout::RES_KIND.write(code, base, layout::resource_kind_code(res.kind))?;
            layout::RES_SLOT.write(code, base, u64::from(res.slot))?;
            layout::RES_ELEMENT.write(code, base, u64::from(res.element))
        }
    }
}

fn pack_generic_register(
    code: &mut Vec<u8>,
    base: usize,
    reg: &Register,
) -> Result<(), FieldOverflow> {
    layout::OPERAND_TAG.write(code, base, layout::TAG_REGISTER)?;
    layout::REG_CLASS.write(code, base, layout::class_code(reg.class))?;
    layout::REG_INDEX.write(code, base, u64::from(reg.index))?;
    layout::REG_SWIZZLE.write(code, base, u64::from(reg.swizzle.to_byte()))?;
    layout::REG_NEGATE.write(code, base, u64::from(reg.negate))
}

/// 32-bit immediate value token. `f32` values are raw bit patterns, so they share the `u32` range.
fn pack_immediate_value(
    code: &mut Vec<u8>,
    base: usize,
    imm: &Immediate,
) -> Result<(), FieldOverflow> {
    match imm.ty {
        ImmType::I32 => write_signed_field(code, base, 32, imm.value),
        ImmType::F32 | ImmType::U32 => {
            let value = u64::try_from(imm.value).map_err(|_| FieldOverflow {
                offset: base,
                width: 32,
                value: i128::from(imm.value),
            })?;
            write_field(code, base, 32, value)
        }
    }
}
