//! Tile-based mobile target: 160-bit bundles carrying one or two 72-bit micro-ops.
//!
//! ```text
//! bundle    [0,2) micro-op count (1 or 2)  [2,16) reserved  [16,88) op 0  [88,160) op 1
//! micro-op  [0,6) code  [6,10) write mask  [10] predicated  [11] predicate negate
//!           [12,15) per-slot negate  operand slots at 15, 34, 53 (19 bits each)
//! slot      [0,3) tag  [3,19) payload
//!           register:        class (2 bits), index (6 bits), swizzle (8 bits)
//!           f16 / i16 / u16: the 16-bit value
//!           sampler:         slot
//!           constant buffer: slot (4 bits), element (12 bits)
//! ```
//!
//! The destination occupies slot 0, so at most two sources fit. `mad` accumulates into its
//! destination: the addend is implicit and must be the destination register itself.
//!
//! Float immediates are stored as IEEE binary16 and come back rounded to the nearest half value.

use super::shapes;
use super::{
    BundleLayout, EncodingRule, Field, Implicit, InstructionModel, InstructionWidth,
    OperandKinds, OperandSlot, RegisterClasses, RegisterLimits,
};
use crate::program::{ImmType, Opcode};
use crate::target::Target;

pub const MICRO_OP_BITS: u32 = 72;
pub const BUNDLE_BITS: u32 = 160;

pub const BUNDLE_COUNT: Field = Field::new(0, 2);
pub const BUNDLE_RESERVED: Field = Field::new(2, 14);
pub const BUNDLE_SLOTS: [u32; 2] = [16, 88];

pub const CODE: Field = Field::new(0, 6);
pub const WRITE_MASK: Field = Field::new(6, 4);
pub const PREDICATED: Field = Field::new(10, 1);
pub const PREDICATE_NEGATE: Field = Field::new(11, 1);

/// Negate flag of operand slot `i` is at bit `SLOT_NEGATE + i`.
pub const SLOT_NEGATE: u32 = 12;
pub const OPERAND_SLOTS: [u32; 3] = [15, 34, 53];

pub const SLOT_TAG: Field = Field::new(0, 3);
pub const SLOT_PAYLOAD: Field = Field::new(3, 16);
pub const REG_CLASS: Field = Field::new(3, 2);
pub const REG_INDEX: Field = Field::new(5, 6);
pub const REG_SWIZZLE: Field = Field::new(11, 8);
pub const CB_SLOT: Field = Field::new(3, 4);
pub const CB_ELEMENT: Field = Field::new(7, 12);

pub const TAG_NONE: u64 = 0;
pub const TAG_REGISTER: u64 = 1;
pub const TAG_F16: u64 = 2;
pub const TAG_I16: u64 = 3;
pub const TAG_U16: u64 = 4;
pub const TAG_SAMPLER: u64 = 5;
pub const TAG_CONSTANT_BUFFER: u64 = 6;

const DST: OperandSlot = shapes::dst();
const SRC: OperandSlot = shapes::any_src();
const SAMPLER: OperandSlot = shapes::sampler();
const ACCUMULATOR: OperandSlot =
    OperandSlot::src(OperandKinds::REGISTER, RegisterClasses::TEMP.union(RegisterClasses::OUTPUT));

const fn alu(opcode: Opcode, code: u8, slots: &'static [OperandSlot]) -> EncodingRule {
    EncodingRule {
        opcode,
        code,
        slots,
        implicit: None,
        bundleable: true,
    }
}

const fn ctl(opcode: Opcode, code: u8, slots: &'static [OperandSlot]) -> EncodingRule {
    EncodingRule {
        bundleable: false,
        ..alu(opcode, code, slots)
    }
}

static RULES: [EncodingRule; 23] = [
    ctl(Opcode::Nop, 0, &[]),
    alu(Opcode::Mov, 1, &[DST, SRC]),
    alu(Opcode::Add, 2, &[DST, SRC, SRC]),
    alu(Opcode::Sub, 3, &[DST, SRC, SRC]),
    alu(Opcode::Mul, 4, &[DST, SRC, SRC]),
    EncodingRule {
        implicit: Some(Implicit::AccumulatorFromDst),
        ..alu(Opcode::Mad, 5, &[DST, SRC, SRC, ACCUMULATOR])
    },
    alu(Opcode::Dp3, 6, &[DST, SRC, SRC]),
    alu(Opcode::Dp4, 7, &[DST, SRC, SRC]),
    alu(Opcode::Min, 8, &[DST, SRC, SRC]),
    alu(Opcode::Max, 9, &[DST, SRC, SRC]),
    alu(Opcode::Rcp, 10, &[DST, SRC]),
    alu(Opcode::Rsq, 11, &[DST, SRC]),
    alu(Opcode::Exp, 12, &[DST, SRC]),
    alu(Opcode::Log, 13, &[DST, SRC]),
    alu(Opcode::Frc, 14, &[DST, SRC]),
    alu(Opcode::Slt, 15, &[DST, SRC, SRC]),
    alu(Opcode::Sge, 16, &[DST, SRC, SRC]),
    ctl(Opcode::Tex, 32, &[DST, SRC, SAMPLER]),
    ctl(Opcode::Kill, 33, &[SRC]),
    ctl(Opcode::If, 48, &[SRC]),
    ctl(Opcode::Else, 49, &[]),
    ctl(Opcode::EndIf, 50, &[]),
    ctl(Opcode::Ret, 51, &[]),
];

pub static TILE: InstructionModel = InstructionModel {
    target: Target::Tile,
    width: InstructionWidth::Fixed {
        bits: MICRO_OP_BITS,
    },
    opcode: CODE,
    bundle: Some(BundleLayout {
        bits: BUNDLE_BITS,
        count: BUNDLE_COUNT,
        slots: &BUNDLE_SLOTS,
    }),
    limits: RegisterLimits {
        temp: 64,
        input: 16,
        output: 8,
        constant: 64,
        sampler: 16,
        constant_buffer: 16,
        predicate: 1,
    },
    max_operands: 4,
    immediates: &[ImmType::F32, ImmType::I32, ImmType::U32],
    rules: &RULES,
};
