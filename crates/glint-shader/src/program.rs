//! Hardware-neutral shader program model.
//!
//! These types are what the upstream IR producer hands to the assembler and what the disassembler
//! hands back. Everything here is plain immutable data: the translation subsystem never mutates a
//! program after construction.

use std::fmt;

use bitflags::bitflags;

/// Target-independent opcode.
///
/// The per-target opcode value ("code") is not part of the IR; it lives in the target's
/// [`crate::InstructionModel`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    Nop,
    Mov,
    Add,
    Sub,
    Mul,
    /// `mad dst, a, b, c`: `dst = a * b + c`.
    Mad,
    Dp3,
    Dp4,
    Min,
    Max,
    Rcp,
    Rsq,
    Exp,
    Log,
    Frc,
    /// `lrp dst, t, a, b`: `dst = t * a + (1 - t) * b`.
    Lrp,
    /// `cmp dst, c, a, b`: per-component `dst = (c >= 0) ? a : b`.
    Cmp,
    Slt,
    Sge,
    /// `tex dst, coord, sampler`.
    Tex,
    Kill,
    If,
    Else,
    EndIf,
    Loop,
    EndLoop,
    Ret,
}

impl Opcode {
    pub const ALL: [Opcode; 27] = [
        Opcode::Nop,
        Opcode::Mov,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Mad,
        Opcode::Dp3,
        Opcode::Dp4,
        Opcode::Min,
        Opcode::Max,
        Opcode::Rcp,
        Opcode::Rsq,
        Opcode::Exp,
        Opcode::Log,
        Opcode::Frc,
        Opcode::Lrp,
        Opcode::Cmp,
        Opcode::Slt,
        Opcode::Sge,
        Opcode::Tex,
        Opcode::Kill,
        Opcode::If,
        Opcode::Else,
        Opcode::EndIf,
        Opcode::Loop,
        Opcode::EndLoop,
        Opcode::Ret,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Mov => "mov",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Mad => "mad",
            Self::Dp3 => "dp3",
            Self::Dp4 => "dp4",
            Self::Min => "min",
            Self::Max => "max",
            Self::Rcp => "rcp",
            Self::Rsq => "rsq",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Frc => "frc",
            Self::Lrp => "lrp",
            Self::Cmp => "cmp",
            Self::Slt => "slt",
            Self::Sge => "sge",
            Self::Tex => "tex",
            Self::Kill => "kill",
            Self::If => "if",
            Self::Else => "else",
            Self::EndIf => "endif",
            Self::Loop => "loop",
            Self::EndLoop => "endloop",
            Self::Ret => "ret",
        }
    }

    /// Whether the first operand of this opcode is a destination register.
    pub fn writes_destination(&self) -> bool {
        !matches!(
            self,
            Self::Nop
                | Self::Kill
                | Self::If
                | Self::Else
                | Self::EndIf
                | Self::Loop
                | Self::EndLoop
                | Self::Ret
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterClass {
    /// General-purpose temporaries (`r#`).
    Temp,
    /// Interpolated/vertex inputs (`v#`).
    Input,
    /// Stage outputs (`o#`).
    Output,
    /// Constant registers (`c#`).
    Const,
}

impl RegisterClass {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Temp => "r",
            Self::Input => "v",
            Self::Output => "o",
            Self::Const => "c",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    X,
    Y,
    Z,
    W,
}

impl Component {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::X,
            1 => Self::Y,
            2 => Self::Z,
            _ => Self::W,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
            Self::W => 3,
        }
    }

    fn letter(self) -> char {
        match self {
            Self::X => 'x',
            Self::Y => 'y',
            Self::Z => 'z',
            Self::W => 'w',
        }
    }
}

/// Source component selection, 2 bits per lane (x in bits 0..1, y in 2..3, z in 4..5, w in 6..7).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle(pub [Component; 4]);

impl Swizzle {
    pub const IDENTITY: Swizzle = Swizzle([Component::X, Component::Y, Component::Z, Component::W]);

    pub fn replicate(component: Component) -> Self {
        Self([component; 4])
    }

    pub fn from_byte(swz: u8) -> Self {
        let comp = |shift: u32| Component::from_bits(swz >> shift);
        Self([comp(0), comp(2), comp(4), comp(6)])
    }

    pub fn to_byte(self) -> u8 {
        self.0
            .iter()
            .enumerate()
            .fold(0u8, |acc, (lane, c)| acc | (c.bits() << (lane * 2)))
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Swizzle {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            return Ok(());
        }
        f.write_str(".")?;
        for c in self.0 {
            write!(f, "{}", c.letter())?;
        }
        Ok(())
    }
}

bitflags! {
    /// Destination write mask.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WriteMask: u8 {
        const X = 0b0001;
        const Y = 0b0010;
        const Z = 0b0100;
        const W = 0b1000;
        const XYZW = 0b1111;
    }
}

impl fmt::Display for WriteMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(".")?;
        for (flag, letter) in [
            (WriteMask::X, 'x'),
            (WriteMask::Y, 'y'),
            (WriteMask::Z, 'z'),
            (WriteMask::W, 'w'),
        ] {
            if self.contains(flag) {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    pub class: RegisterClass,
    pub index: u16,
    #[cfg_attr(feature = "serde", serde(default))]
    pub swizzle: Swizzle,
    #[cfg_attr(feature = "serde", serde(default))]
    pub negate: bool,
}

impl Register {
    pub fn new(class: RegisterClass, index: u16) -> Self {
        Self {
            class,
            index,
            swizzle: Swizzle::IDENTITY,
            negate: false,
        }
    }

    pub fn temp(index: u16) -> Self {
        Self::new(RegisterClass::Temp, index)
    }

    pub fn input(index: u16) -> Self {
        Self::new(RegisterClass::Input, index)
    }

    pub fn output(index: u16) -> Self {
        Self::new(RegisterClass::Output, index)
    }

    pub fn constant(index: u16) -> Self {
        Self::new(RegisterClass::Const, index)
    }

    pub fn swizzled(self, swizzle: Swizzle) -> Self {
        Self { swizzle, ..self }
    }

    pub fn negated(self) -> Self {
        Self {
            negate: !self.negate,
            ..self
        }
    }

    /// True when both refer to the same register, regardless of swizzle/modifiers.
    pub fn same_register(&self, other: &Register) -> bool {
        self.class == other.class && self.index == other.index
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            f.write_str("-")?;
        }
        write!(f, "{}{}{}", self.class.prefix(), self.index, self.swizzle)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmType {
    F32,
    I32,
    U32,
}

/// Immediate constant.
///
/// `value` holds the integer value for `i32`/`u32` and the IEEE-754 bit pattern for `f32`, which
/// keeps immediates `Eq + Hash`. Integer values are stored wider than their declared type so an
/// out-of-range value reaches the encoder and is rejected there instead of being truncated by the
/// constructor.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Immediate {
    pub ty: ImmType,
    pub value: i64,
}

impl Immediate {
    pub fn f32(value: f32) -> Self {
        Self {
            ty: ImmType::F32,
            value: i64::from(value.to_bits()),
        }
    }

    pub fn i32(value: i64) -> Self {
        Self {
            ty: ImmType::I32,
            value,
        }
    }

    pub fn u32(value: i64) -> Self {
        Self {
            ty: ImmType::U32,
            value,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self.ty {
            ImmType::F32 => Some(f32::from_bits(self.value as u32)),
            ImmType::I32 | ImmType::U32 => None,
        }
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            ImmType::F32 => write!(f, "{:?}", f32::from_bits(self.value as u32)),
            ImmType::I32 => write!(f, "{}i", self.value),
            ImmType::U32 => write!(f, "{}u", self.value),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Sampler,
    ConstantBuffer,
}

/// Reference to a bound resource: a sampler slot, or an element of a constant buffer.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceSlot {
    pub kind: ResourceKind,
    pub slot: u16,
    /// Element (vec4) index for constant buffers; always 0 for samplers.
    #[cfg_attr(feature = "serde", serde(default))]
    pub element: u16,
}

impl ResourceSlot {
    pub fn sampler(slot: u16) -> Self {
        Self {
            kind: ResourceKind::Sampler,
            slot,
            element: 0,
        }
    }

    pub fn constant_buffer(slot: u16, element: u16) -> Self {
        Self {
            kind: ResourceKind::ConstantBuffer,
            slot,
            element,
        }
    }
}

impl fmt::Display for ResourceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ResourceKind::Sampler => write!(f, "s{}", self.slot),
            ResourceKind::ConstantBuffer => write!(f, "cb{}[{}]", self.slot, self.element),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Register(Register),
    Immediate(Immediate),
    Resource(ResourceSlot),
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Self::Register(reg)
    }
}

impl From<Immediate> for Operand {
    fn from(imm: Immediate) -> Self {
        Self::Immediate(imm)
    }
}

impl From<ResourceSlot> for Operand {
    fn from(slot: ResourceSlot) -> Self {
        Self::Resource(slot)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(reg) => reg.fmt(f),
            Self::Immediate(imm) => imm.fmt(f),
            Self::Resource(slot) => slot.fmt(f),
        }
    }
}

/// Per-instruction predicate: the instruction only executes when `p<index>` (or its negation) is
/// set.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub index: u8,
    #[cfg_attr(feature = "serde", serde(default))]
    pub negate: bool,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            write!(f, "(!p{})", self.index)
        } else {
            write!(f, "(p{})", self.index)
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Destination first (for opcodes that write one), then sources in order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub operands: Vec<Operand>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub predicate: Option<Predicate>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub write_mask: Option<WriteMask>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: impl IntoIterator<Item = Operand>) -> Self {
        Self {
            opcode,
            operands: operands.into_iter().collect(),
            predicate: None,
            write_mask: None,
        }
    }

    pub fn with_predicate(self, predicate: Predicate) -> Self {
        Self {
            predicate: Some(predicate),
            ..self
        }
    }

    pub fn with_write_mask(self, mask: WriteMask) -> Self {
        Self {
            write_mask: Some(mask),
            ..self
        }
    }

    /// The destination register, if this opcode writes one and it is present.
    pub fn destination(&self) -> Option<&Register> {
        if !self.opcode.writes_destination() {
            return None;
        }
        match self.operands.first() {
            Some(Operand::Register(reg)) => Some(reg),
            _ => None,
        }
    }

    /// Source operands (everything after the destination, if any).
    pub fn sources(&self) -> &[Operand] {
        if self.opcode.writes_destination() && !self.operands.is_empty() {
            &self.operands[1..]
        } else {
            &self.operands
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pred) = &self.predicate {
            write!(f, "{pred} ")?;
        }
        f.write_str(self.opcode.name())?;
        for (i, op) in self.operands.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            op.fmt(f)?;
            if i == 0 && self.opcode.writes_destination() {
                if let Some(mask) = self.write_mask {
                    mask.fmt(f)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Normal,
    Color,
    TexCoord,
    Tangent,
    Fog,
    Unknown(u8),
}

impl Semantic {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Position,
            1 => Self::Normal,
            2 => Self::Color,
            3 => Self::TexCoord,
            4 => Self::Tangent,
            5 => Self::Fog,
            other => Self::Unknown(other),
        }
    }

    pub fn raw(&self) -> u8 {
        match self {
            Self::Position => 0,
            Self::Normal => 1,
            Self::Color => 2,
            Self::TexCoord => 3,
            Self::Tangent => 4,
            Self::Fog => 5,
            Self::Unknown(raw) => *raw,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Normal => "normal",
            Self::Color => "color",
            Self::TexCoord => "texcoord",
            Self::Tangent => "tangent",
            Self::Fog => "fog",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// One input or output attribute binding.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub semantic: Semantic,
    pub index: u8,
    /// Component count, 1..=4.
    pub components: u8,
}

impl Attribute {
    pub fn new(semantic: Semantic, index: u8, components: u8) -> Self {
        Self {
            semantic,
            index,
            components,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.semantic.name(), self.index)?;
        if let Semantic::Unknown(raw) = self.semantic {
            write!(f, "(0x{raw:02x})")?;
        }
        write!(f, " x{}", self.components)
    }
}

/// Resource-binding header of a program.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProgramHeader {
    #[cfg_attr(feature = "serde", serde(default))]
    pub sampler_count: u8,
    /// Element (vec4) count of each bound constant buffer, indexed by slot.
    #[cfg_attr(feature = "serde", serde(default))]
    pub constant_buffers: Vec<u16>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub inputs: Vec<Attribute>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub outputs: Vec<Attribute>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderProgram {
    #[cfg_attr(feature = "serde", serde(default))]
    pub header: ProgramHeader,
    pub instructions: Vec<Instruction>,
}

impl ShaderProgram {
    pub fn new(header: ProgramHeader, instructions: Vec<Instruction>) -> Self {
        Self {
            header,
            instructions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swizzle_byte_roundtrip() {
        let swz = Swizzle([Component::W, Component::Z, Component::Y, Component::X]);
        assert_eq!(swz.to_byte(), 0b00_01_10_11);
        assert_eq!(Swizzle::from_byte(swz.to_byte()), swz);
        assert_eq!(Swizzle::IDENTITY.to_byte(), 0xE4);
    }

    #[test]
    fn instruction_display() {
        let inst = Instruction::new(
            Opcode::Mad,
            [
                Register::temp(0).into(),
                Register::input(1)
                    .swizzled(Swizzle::replicate(Component::X))
                    .into(),
                Register::constant(2).negated().into(),
                Immediate::f32(0.5).into(),
            ],
        )
        .with_write_mask(WriteMask::X | WriteMask::Y)
        .with_predicate(Predicate {
            index: 1,
            negate: true,
        });
        assert_eq!(inst.to_string(), "(!p1) mad r0.xy, v1.xxxx, -c2, 0.5");
    }

    #[test]
    fn destination_and_sources() {
        let mov = Instruction::new(Opcode::Mov, [Register::temp(3).into(), Register::constant(0).into()]);
        assert_eq!(mov.destination(), Some(&Register::temp(3)));
        assert_eq!(mov.sources(), &[Operand::Register(Register::constant(0))]);

        let kill = Instruction::new(Opcode::Kill, [Register::temp(0).into()]);
        assert_eq!(kill.destination(), None);
        assert_eq!(kill.sources().len(), 1);
    }

    #[test]
    fn resource_and_immediate_display() {
        assert_eq!(ResourceSlot::sampler(2).to_string(), "s2");
        assert_eq!(ResourceSlot::constant_buffer(1, 7).to_string(), "cb1[7]");
        assert_eq!(Immediate::i32(-4).to_string(), "-4i");
        assert_eq!(Immediate::u32(9).to_string(), "9u");
        assert_eq!(Immediate::f32(1.0).to_string(), "1.0");
        assert_eq!(Immediate::f32(2.5).as_f32(), Some(2.5));
    }
}
