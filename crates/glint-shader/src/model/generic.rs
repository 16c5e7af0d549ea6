//! Baseline target: variable-length instructions made of 32-bit tokens.
//!
//! ```text
//! opcode token   [0,8) code  [8,12) length  [12,16) write mask  [16] predicated
//!                [17] predicate negate  [18,21) predicate index  [21,32) reserved
//! register       [0,2) tag=0  [2,5) class  [5,16) index  [16,24) swizzle  [24] negate
//!                [25,32) reserved
//! immediate      [0,2) tag=1  [2,4) type   [4,32) reserved  + one value token
//! resource       [0,2) tag=2  [2,4) kind   [4,12) slot  [12,28) element  [28,32) reserved
//! ```
//!
//! The length field counts tokens, including the opcode token. A write mask of 0 means the
//! instruction has none. Reserved bits, the predicate fields of an unpredicated instruction and the
//! element of a sampler are always zero.

use super::shapes;
use super::{
    EncodingRule, Field, InstructionModel, InstructionWidth, OperandSlot, RegisterLimits,
};
use crate::program::{ImmType, Opcode, RegisterClass, ResourceKind};
use crate::target::Target;

pub const TOKEN_BITS: u32 = 32;

pub const CODE: Field = Field::new(0, 8);
pub const LENGTH: Field = Field::new(8, 4);
pub const WRITE_MASK: Field = Field::new(12, 4);
pub const PREDICATED: Field = Field::new(16, 1);
pub const PREDICATE_NEGATE: Field = Field::new(17, 1);
pub const PREDICATE_INDEX: Field = Field::new(18, 3);
pub const RESERVED: Field = Field::new(21, 11);

pub const OPERAND_TAG: Field = Field::new(0, 2);
pub const REG_CLASS: Field = Field::new(2, 3);
pub const REG_INDEX: Field = Field::new(5, 11);
pub const REG_SWIZZLE: Field = Field::new(16, 8);
pub const REG_NEGATE: Field = Field::new(24, 1);
pub const REG_RESERVED: Field = Field::new(25, 7);
pub const IMM_TYPE: Field = Field::new(2, 2);
pub const IMM_RESERVED: Field = Field::new(4, 28);
pub const RES_KIND: Field = Field::new(2, 2);
pub const RES_SLOT: Field = Field::new(4, 8);
pub const RES_ELEMENT: Field = Field::new(12, 16);
pub const RES_RESERVED: Field = Field::new(28, 4);

pub const TAG_REGISTER: u64 = 0;
pub const TAG_IMMEDIATE: u64 = 1;
pub const TAG_RESOURCE: u64 = 2;

pub fn class_code(class: RegisterClass) -> u64 {
    match class {
        RegisterClass::Temp => 0,
        RegisterClass::Input => 1,
        RegisterClass::Output => 2,
        RegisterClass::Const => 3,
    }
}

pub fn class_from_code(code: u64) -> Option<RegisterClass> {
    Some(match code {
        0 => RegisterClass::Temp,
        1 => RegisterClass::Input,
        2 => RegisterClass::Output,
        3 => RegisterClass::Const,
        _ => return None,
    })
}

pub fn imm_type_code(ty: ImmType) -> u64 {
    match ty {
        ImmType::F32 => 0,
        ImmType::I32 => 1,
        ImmType::U32 => 2,
    }
}

pub fn imm_type_from_code(code: u64) -> Option<ImmType> {
    Some(match code {
        0 => ImmType::F32,
        1 => ImmType::I32,
        2 => ImmType::U32,
        _ => return None,
    })
}

pub fn resource_kind_code(kind: ResourceKind) -> u64 {
    match kind {
        ResourceKind::Sampler => 0,
        ResourceKind::ConstantBuffer => 1,
    }
}

pub fn resource_kind_from_code(code: u64) -> Option<ResourceKind> {
    Some(match code {
        0 => ResourceKind::Sampler,
        1 => ResourceKind::ConstantBuffer,
        _ => return None,
    })
}

const DST: OperandSlot = shapes::dst();
const SRC: OperandSlot = shapes::any_src();
const SAMPLER: OperandSlot = shapes::sampler();

const NONE: &[OperandSlot] = &[];
const COND: &[OperandSlot] = &[SRC];
const UNARY: &[OperandSlot] = &[DST, SRC];
const BINARY: &[OperandSlot] = &[DST, SRC, SRC];
const TERNARY: &[OperandSlot] = &[DST, SRC, SRC, SRC];
const TEX: &[OperandSlot] = &[DST, SRC, SAMPLER];

const fn rule(opcode: Opcode, code: u8, slots: &'static [OperandSlot]) -> EncodingRule {
    EncodingRule {
        opcode,
        code,
        slots,
        implicit: None,
        bundleable: false,
    }
}

static RULES: [EncodingRule; 27] = [
    rule(Opcode::Nop, 0, NONE),
    rule(Opcode::Mov, 1, UNARY),
    rule(Opcode::Add, 2, BINARY),
    rule(Opcode::Sub, 3, BINARY),
    rule(Opcode::Mul, 4, BINARY),
    rule(Opcode::Mad, 5, TERNARY),
    rule(Opcode::Dp3, 6, BINARY),
    rule(Opcode::Dp4, 7, BINARY),
    rule(Opcode::Min, 8, BINARY),
    rule(Opcode::Max, 9, BINARY),
    rule(Opcode::Rcp, 10, UNARY),
    rule(Opcode::Rsq, 11, UNARY),
    rule(Opcode::Exp, 12, UNARY),
    rule(Opcode::Log, 13, UNARY),
    rule(Opcode::Frc, 14, UNARY),
    rule(Opcode::Lrp, 15, TERNARY),
    rule(Opcode::Cmp, 16, TERNARY),
    rule(Opcode::Slt, 17, BINARY),
    rule(Opcode::Sge, 18, BINARY),
    rule(Opcode::Tex, 32, TEX),
    rule(Opcode::Kill, 33, COND),
    rule(Opcode::If, 48, COND),
    rule(Opcode::Else, 49, NONE),
    rule(Opcode::EndIf, 50, NONE),
    rule(Opcode::Loop, 51, COND),
    rule(Opcode::EndLoop, 52, NONE),
    rule(Opcode::Ret, 53, NONE),
];

pub static GENERIC: InstructionModel = InstructionModel {
    target: Target::Generic,
    width: InstructionWidth::Variable {
        unit_bits: TOKEN_BITS,
        length: LENGTH,
    },
    opcode: CODE,
    bundle: None,
    limits: RegisterLimits {
        temp: 32,
        input: 16,
        output: 8,
        constant: 256,
        sampler: 16,
        constant_buffer: 14,
        predicate: 8,
    },
    max_operands: 4,
    immediates: &[ImmType::F32, ImmType::I32, ImmType::U32],
    rules: &RULES,
};
