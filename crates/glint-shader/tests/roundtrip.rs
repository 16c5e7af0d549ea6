use glint_shader::{
    assemble, disassemble, AssembleError, Attribute, Component, Immediate, Instruction, Opcode,
    Predicate, ProgramHeader, Register, ResourceSlot, Semantic, ShaderProgram, Swizzle, Target,
    WriteMask,
};
use pretty_assertions::assert_eq;

fn header() -> ProgramHeader {
    ProgramHeader {
        sampler_count: 2,
        constant_buffers: vec![],
        inputs: vec![
            Attribute::new(Semantic::Position, 0, 4),
            Attribute::new(Semantic::TexCoord, 0, 2),
        ],
        outputs: vec![Attribute::new(Semantic::Color, 0, 4)],
    }
}

/// The `[mov r0, c0; mul r1, r0, r0; mov o0, r1]` program every target must handle.
fn square() -> ShaderProgram {
    ShaderProgram::new(
        ProgramHeader::default(),
        vec![
            Instruction::new(
                Opcode::Mov,
                [Register::temp(0).into(), Register::constant(0).into()],
            ),
            Instruction::new(
                Opcode::Mul,
                [
                    Register::temp(1).into(),
                    Register::temp(0).into(),
                    Register::temp(0).into(),
                ],
            ),
            Instruction::new(
                Opcode::Mov,
                [Register::output(0).into(), Register::temp(1).into()],
            ),
        ],
    )
}

/// Uses only what the legacy target can express, so it is valid everywhere.
fn portable() -> ShaderProgram {
    ShaderProgram::new(
        header(),
        vec![
            Instruction::new(
                Opcode::Tex,
                [
                    Register::temp(1).into(),
                    Register::input(1).into(),
                    ResourceSlot::sampler(1).into(),
                ],
            ),
            Instruction::new(
                Opcode::Dp4,
                [
                    Register::temp(2).into(),
                    Register::input(0).into(),
                    Register::constant(3)
                        .swizzled(Swizzle([
                            Component::W,
                            Component::Z,
                            Component::Y,
                            Component::X,
                        ]))
                        .into(),
                ],
            )
            .with_write_mask(WriteMask::X),
            Instruction::new(
                Opcode::Mad,
                [
                    Register::temp(0).into(),
                    Register::temp(1).negated().into(),
                    Register::temp(2)
                        .swizzled(Swizzle::replicate(Component::X))
                        .into(),
                    // The tile target only accumulates into the destination.
                    Register::temp(0).into(),
                ],
            ),
            Instruction::new(Opcode::Kill, [Register::temp(0).into()]),
            Instruction::new(
                Opcode::Mov,
                [Register::output(0).into(), Register::temp(0).into()],
            ),
        ],
    )
}

fn generic_only() -> ShaderProgram {
    ShaderProgram::new(
        ProgramHeader {
            constant_buffers: vec![16, 256],
            ..header()
        },
        vec![
            Instruction::new(
                Opcode::Mov,
                [
                    Register::temp(31).into(),
                    ResourceSlot::constant_buffer(1, 255).into(),
                ],
            ),
            Instruction::new(Opcode::Loop, [Immediate::u32(4).into()]),
            Instruction::new(
                Opcode::Add,
                [
                    Register::temp(31).into(),
                    Register::temp(31).into(),
                    Immediate::f32(-0.25).into(),
                ],
            )
            .with_predicate(Predicate {
                index: 7,
                negate: true,
            }),
            Instruction::new(Opcode::EndLoop, []),
            Instruction::new(
                Opcode::Cmp,
                [
                    Register::output(7).into(),
                    Register::temp(31).into(),
                    Immediate::i32(i64::from(i32::MIN)).into(),
                    Immediate::u32(i64::from(u32::MAX)).into(),
                ],
            ),
            Instruction::new(Opcode::Ret, []),
        ],
    )
}

fn roundtrip(program: &ShaderProgram, target: Target) {
    let blob = assemble(program, target).unwrap();
    assert_eq!(blob.target(), target);
    let listing = disassemble(blob.as_bytes(), target).unwrap();
    assert!(listing.is_complete(), "{target}: {listing}");
    assert_eq!(&listing.into_program().unwrap(), program, "{target}");
}

#[test]
fn square_roundtrips_on_every_target() {
    let program = square();
    for target in Target::ALL {
        let blob = assemble(&program, target).unwrap();
        let header = blob.header().unwrap();
        assert_eq!(header.instruction_count, 3, "{target}");
        assert_eq!(header.target_id, target.id());
        roundtrip(&program, target);
    }
}

#[test]
fn square_word_counts() {
    let program = square();
    let words = |target| {
        assemble(&program, target)
            .unwrap()
            .header()
            .unwrap()
            .word_count
    };
    assert_eq!(words(Target::Generic), 3);
    assert_eq!(words(Target::Legacy), 3);
    // Every instruction reads the previous destination, so nothing pairs.
    assert_eq!(words(Target::Tile), 3);
}

#[test]
fn portable_program_roundtrips_on_every_target() {
    let program = portable();
    for target in Target::ALL {
        roundtrip(&program, target);
    }
}

#[test]
fn generic_program_roundtrips() {
    roundtrip(&generic_only(), Target::Generic);
}

#[test]
fn empty_program_roundtrips() {
    let program = ShaderProgram::new(ProgramHeader::default(), vec![]);
    for target in Target::ALL {
        let blob = assemble(&program, target).unwrap();
        assert_eq!(blob.len(), 24);
        roundtrip(&program, target);
    }
}

#[test]
fn assembly_is_deterministic() {
    for target in Target::ALL {
        let a = assemble(&portable(), target).unwrap();
        let b = assemble(&portable(), target).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes(), "{target}");
    }
}

#[test]
fn targets_produce_distinct_encodings() {
    let generic = assemble(&portable(), Target::Generic).unwrap();
    let legacy = assemble(&portable(), Target::Legacy).unwrap();
    let tile = assemble(&portable(), Target::Tile).unwrap();
    assert_ne!(generic.as_bytes(), legacy.as_bytes());
    assert_ne!(legacy.as_bytes(), tile.as_bytes());
}

#[test]
fn unsupported_opcodes_are_rejected() {
    let program = generic_only();
    for target in [Target::Legacy, Target::Tile] {
        let err = assemble(&program, target).unwrap_err();
        assert!(
            matches!(
                err,
                AssembleError::UnsupportedOpcode { .. } | AssembleError::ResourceLimit { .. }
            ),
            "{target}: {err}"
        );
    }

    let looped = ShaderProgram::new(
        ProgramHeader::default(),
        vec![Instruction::new(Opcode::Loop, [Register::constant(0).into()])],
    );
    assert_eq!(
        assemble(&looped, Target::Tile),
        Err(AssembleError::UnsupportedOpcode {
            index: 0,
            opcode: Opcode::Loop,
            target: Target::Tile,
        })
    );
}

#[test]
fn oversized_immediate_is_rejected() {
    let program = ShaderProgram::new(
        ProgramHeader::default(),
        vec![Instruction::new(
            Opcode::Mov,
            [Register::temp(0).into(), Immediate::u32(1 << 32).into()],
        )],
    );
    assert_eq!(
        assemble(&program, Target::Generic),
        Err(AssembleError::FieldOverflow {
            index: 0,
            position: Some(1),
            width: 32,
            value: 1 << 32,
        })
    );
}

#[test]
fn failed_assembly_names_the_instruction() {
    let mut program = square();
    program.instructions.push(Instruction::new(
        Opcode::Mov,
        [Register::temp(0).into(), Register::temp(99).into()],
    ));
    let err = assemble(&program, Target::Legacy).unwrap_err();
    assert!(matches!(
        err,
        AssembleError::InvalidOperand {
            index: 3,
            position: 1,
            ..
        }
    ));
}
