//! Per-target instruction models.
//!
//! A model is pure data: which opcodes a target encodes (and with what code), which operand kinds
//! each operand position accepts, how many registers of each class exist, and where the fields of
//! an instruction word live. All three models are `static` tables; nothing here is built at
//! runtime.

use bitflags::bitflags;
use thiserror::Error;

use crate::program::{ImmType, Opcode, Operand, RegisterClass, ResourceKind};
use crate::target::Target;

pub use crate::bits::Field;

pub mod generic;
pub mod legacy;
pub mod tile;

pub use generic::GENERIC;
pub use legacy::LEGACY;
pub use tile::TILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("opcode `{opcode}` has no encoding on the {target} target")]
pub struct UnsupportedOpcode {
    pub opcode: Opcode,
    pub target: Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionWidth {
    /// Every instruction occupies exactly `bits`.
    Fixed { bits: u32 },
    /// Instructions are a whole number of `unit_bits` units; the count (including the opcode unit)
    /// is stored in `length`, relative to the start of the instruction.
    Variable { unit_bits: u32, length: Field },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Dst,
    Src,
}

bitflags! {
    /// Operand kinds accepted at one operand position.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OperandKinds: u8 {
        const REGISTER = 1 << 0;
        const IMMEDIATE = 1 << 1;
        const SAMPLER = 1 << 2;
        const CONSTANT_BUFFER = 1 << 3;
    }
}

impl OperandKinds {
    pub fn of(operand: &Operand) -> Self {
        match operand {
            Operand::Register(_) => Self::REGISTER,
            Operand::Immediate(_) => Self::IMMEDIATE,
            Operand::Resource(slot) => match slot.kind {
                ResourceKind::Sampler => Self::SAMPLER,
                ResourceKind::ConstantBuffer => Self::CONSTANT_BUFFER,
            },
        }
    }
}

bitflags! {
    /// Register classes accepted at one operand position.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RegisterClasses: u8 {
        const TEMP = 1 << 0;
        const INPUT = 1 << 1;
        const OUTPUT = 1 << 2;
        const CONST = 1 << 3;
    }
}

impl RegisterClasses {
    pub fn of(class: RegisterClass) -> Self {
        match class {
            RegisterClass::Temp => Self::TEMP,
            RegisterClass::Input => Self::INPUT,
            RegisterClass::Output => Self::OUTPUT,
            RegisterClass::Const => Self::CONST,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandSlot {
    pub role: Role,
    pub kinds: OperandKinds,
    /// Only meaningful when `kinds` contains [`OperandKinds::REGISTER`].
    pub classes: RegisterClasses,
}

impl OperandSlot {
    pub const fn dst(classes: RegisterClasses) -> Self {
        Self {
            role: Role::Dst,
            kinds: OperandKinds::REGISTER,
            classes,
        }
    }

    pub const fn src(kinds: OperandKinds, classes: RegisterClasses) -> Self {
        Self {
            role: Role::Src,
            kinds,
            classes,
        }
    }

    pub fn accepts(&self, operand: &Operand) -> bool {
        if !self.kinds.contains(OperandKinds::of(operand)) {
            return false;
        }
        match operand {
            Operand::Register(reg) => self.classes.contains(RegisterClasses::of(reg.class)),
            Operand::Immediate(_) | Operand::Resource(_) => true,
        }
    }
}

/// An operand that is part of the IR but not of the bitstream. The implicit operand is always the
/// rule's last slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implicit {
    /// The sampler slot equals the destination register index.
    SamplerFromDst,
    /// The addend is the destination register itself (no swizzle, no negate).
    AccumulatorFromDst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingRule {
    pub opcode: Opcode,
    /// Target-specific opcode value.
    pub code: u8,
    /// Operand positions in IR order, destination first.
    pub slots: &'static [OperandSlot],
    pub implicit: Option<Implicit>,
    /// Whether the op may share a bundle with a neighbour (bundling targets only).
    pub bundleable: bool,
}

impl EncodingRule {
    /// Number of operands actually present in the bitstream.
    pub fn encoded_operands(&self) -> usize {
        self.slots.len() - usize::from(self.implicit.is_some())
    }
}

/// Register-file cardinalities. A count of 0 means the class is absent on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterLimits {
    pub temp: u16,
    pub input: u16,
    pub output: u16,
    pub constant: u16,
    pub sampler: u16,
    pub constant_buffer: u16,
    pub predicate: u8,
}

impl RegisterLimits {
    pub fn count(&self, class: RegisterClass) -> u16 {
        match class {
            RegisterClass::Temp => self.temp,
            RegisterClass::Input => self.input,
            RegisterClass::Output => self.output,
            RegisterClass::Const => self.constant,
        }
    }
}

/// Layout of a word that packs several instructions (micro-ops).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleLayout {
    pub bits: u32,
    /// Number of micro-ops present.
    pub count: Field,
    /// Bit offset of each micro-op slot within the bundle.
    pub slots: &'static [u32],
}

#[derive(Debug)]
pub struct InstructionModel {
    pub target: Target,
    pub width: InstructionWidth,
    /// Opcode field, relative to the start of an instruction.
    pub opcode: Field,
    pub bundle: Option<BundleLayout>,
    pub limits: RegisterLimits,
    pub max_operands: usize,
    /// Immediate types the target can encode.
    pub immediates: &'static [ImmType],
    pub rules: &'static [EncodingRule],
}

impl InstructionModel {
    pub fn lookup(&self, opcode: Opcode) -> Result<&EncodingRule, UnsupportedOpcode> {
        self.rules
            .iter()
            .find(|rule| rule.opcode == opcode)
            .ok_or(UnsupportedOpcode {
                opcode,
                target: self.target,
            })
    }

    pub fn lookup_code(&self, code: u8) -> Option<&EncodingRule> {
        self.rules.iter().find(|rule| rule.code == code)
    }

    pub fn supports(&self, opcode: Opcode) -> bool {
        self.lookup(opcode).is_ok()
    }

    pub fn instruction_width(&self, opcode: Opcode) -> Result<InstructionWidth, UnsupportedOpcode> {
        self.lookup(opcode).map(|_| self.width)
    }

    /// Width in bits of one unit the decoder steps over: a bundle if the target bundles, a fixed
    /// instruction word, or the length unit of a variable-width encoding.
    pub fn word_bits(&self) -> u32 {
        match (self.bundle, self.width) {
            (Some(bundle), _) => bundle.bits,
            (None, InstructionWidth::Fixed { bits }) => bits,
            (None, InstructionWidth::Variable { unit_bits, .. }) => unit_bits,
        }
    }
}

/// Shared operand-slot shapes used to build the per-target tables.
pub(crate) mod shapes {
    use super::{OperandKinds as K, OperandSlot, RegisterClasses as C};

    pub const fn dst() -> OperandSlot {
        OperandSlot::dst(C::TEMP.union(C::OUTPUT))
    }

    pub const fn reg_src() -> OperandSlot {
        OperandSlot::src(K::REGISTER, C::TEMP.union(C::INPUT).union(C::CONST))
    }

    /// Register, immediate or constant-buffer element.
    pub const fn any_src() -> OperandSlot {
        OperandSlot::src(
            K::REGISTER.union(K::IMMEDIATE).union(K::CONSTANT_BUFFER),
            C::TEMP.union(C::INPUT).union(C::CONST),
        )
    }

    pub const fn sampler() -> OperandSlot {
        OperandSlot::src(K::SAMPLER, C::empty())
    }
}
