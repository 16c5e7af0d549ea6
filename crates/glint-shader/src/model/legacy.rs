//! R200-style target: one fixed 64-bit word per instruction and a tiny register file.
//!
//! ```text
//! [0,6) code  [6] dst class (0 temp, 1 output)  [7,10) dst index  [10,14) write mask
//! [14,16) reserved  source slots at 16, 32, 48 (16 bits each):
//!     [0] present  [1,3) class (0 temp, 1 const, 2 input)  [3,7) index  [7,15) swizzle
//!     [15] negate
//! ```
//!
//! There are no immediates, constant buffers or predicates. `tex` samples the sampler whose index
//! equals its destination temp, so the sampler never appears in the word.

use super::shapes;
use super::{
    EncodingRule, Field, Implicit, InstructionModel, InstructionWidth, OperandSlot,
    RegisterClasses, RegisterLimits,
};
use crate::program::{Opcode, RegisterClass};
use crate::target::Target;

pub const WORD_BITS: u32 = 64;

pub const CODE: Field = Field::new(0, 6);
pub const DST_CLASS: Field = Field::new(6, 1);
pub const DST_INDEX: Field = Field::new(7, 3);
pub const WRITE_MASK: Field = Field::new(10, 4);
pub const RESERVED: Field = Field::new(14, 2);

/// Start of each source slot within the word.
pub const SRC_SLOTS: [u32; 3] = [16, 32, 48];
pub const SRC_PRESENT: Field = Field::new(0, 1);
pub const SRC_CLASS: Field = Field::new(1, 2);
pub const SRC_INDEX: Field = Field::new(3, 4);
pub const SRC_SWIZZLE: Field = Field::new(7, 8);
pub const SRC_NEGATE: Field = Field::new(15, 1);

pub fn dst_class_code(class: RegisterClass) -> Option<u64> {
    match class {
        RegisterClass::Temp => Some(0),
        RegisterClass::Output => Some(1),
        RegisterClass::Input | RegisterClass::Const => None,
    }
}

pub fn dst_class_from_code(code: u64) -> RegisterClass {
    if code == 0 {
        RegisterClass::Temp
    } else {
        RegisterClass::Output
    }
}

pub fn src_class_code(class: RegisterClass) -> Option<u64> {
    match class {
        RegisterClass::Temp => Some(0),
        RegisterClass::Const => Some(1),
        RegisterClass::Input => Some(2),
        RegisterClass::Output => None,
    }
}

pub fn src_class_from_code(code: u64) -> Option<RegisterClass> {
    match code {
        0 => Some(RegisterClass::Temp),
        1 => Some(RegisterClass::Const),
        2 => Some(RegisterClass::Input),
        _ => None,
    }
}

const DST: OperandSlot = shapes::dst();
const TEX_DST: OperandSlot = OperandSlot::dst(RegisterClasses::TEMP);
const SRC: OperandSlot = shapes::reg_src();
const SAMPLER: OperandSlot = shapes::sampler();

const fn rule(opcode: Opcode, code: u8, slots: &'static [OperandSlot]) -> EncodingRule {
    EncodingRule {
        opcode,
        code,
        slots,
        implicit: None,
        bundleable: false,
    }
}

static RULES: [EncodingRule; 12] = [
    rule(Opcode::Nop, 0, &[]),
    rule(Opcode::Mov, 1, &[DST, SRC]),
    rule(Opcode::Add, 2, &[DST, SRC, SRC]),
    rule(Opcode::Sub, 3, &[DST, SRC, SRC]),
    rule(Opcode::Mul, 4, &[DST, SRC, SRC]),
    rule(Opcode::Mad, 5, &[DST, SRC, SRC, SRC]),
    rule(Opcode::Lrp, 6, &[DST, SRC, SRC, SRC]),
    rule(Opcode::Cmp, 7, &[DST, SRC, SRC, SRC]),
    rule(Opcode::Dp3, 8, &[DST, SRC, SRC]),
    rule(Opcode::Dp4, 9, &[DST, SRC, SRC]),
    EncodingRule {
        implicit: Some(Implicit::SamplerFromDst),
        ..rule(Opcode::Tex, 16, &[TEX_DST, SRC, SAMPLER])
    },
    rule(Opcode::Kill, 17, &[SRC]),
];

pub static LEGACY: InstructionModel = InstructionModel {
    target: Target::Legacy,
    width: InstructionWidth::Fixed { bits: WORD_BITS },
    opcode: CODE,
    bundle: None,
    limits: RegisterLimits {
        temp: 6,
        input: 8,
        output: 1,
        constant: 8,
        sampler: 6,
        constant_buffer: 0,
        predicate: 0,
    },
    max_operands: 4,
    immediates: &[],
    rules: &RULES,
};
