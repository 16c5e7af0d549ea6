use glint_shader::{
    assemble, disassemble, Attribute, Component, Immediate, Instruction, Opcode, Predicate,
    ProgramHeader, Register, ResourceSlot, Semantic, ShaderProgram, Swizzle, Target, WriteMask,
};

fn textured() -> ShaderProgram {
    ShaderProgram::new(
        ProgramHeader {
            sampler_count: 1,
            constant_buffers: vec![4],
            inputs: vec![Attribute::new(Semantic::Position, 0, 4)],
            outputs: vec![Attribute::new(Semantic::Color, 0, 4)],
        },
        vec![
            Instruction::new(
                Opcode::Mov,
                [Register::temp(0).into(), Register::input(0).into()],
            ),
            Instruction::new(
                Opcode::Mad,
                [
                    Register::temp(1).into(),
                    Register::temp(0).into(),
                    Register::constant(2)
                        .swizzled(Swizzle::replicate(Component::X))
                        .negated()
                        .into(),
                    Immediate::f32(0.5).into(),
                ],
            )
            .with_write_mask(WriteMask::X | WriteMask::Y)
            .with_predicate(Predicate {
                index: 1,
                negate: true,
            }),
            Instruction::new(
                Opcode::Tex,
                [
                    Register::temp(2).into(),
                    Register::temp(1).into(),
                    ResourceSlot::sampler(0).into(),
                ],
            ),
            Instruction::new(
                Opcode::Mov,
                [Register::output(0).into(), Register::temp(2).into()],
            ),
        ],
    )
}

#[test]
fn generic_listing() {
    let blob = assemble(&textured(), Target::Generic).unwrap();
    let listing = disassemble(blob.as_bytes(), Target::Generic).unwrap();
    insta::assert_snapshot!(listing.to_string().trim_end(), @r"
    ; generic shader, 4 instructions
    ; samplers: 1
    ; cb0: 4 elements
    ; input position0 x4
    ; output color0 x4
    0024: mov r0, v0
    0030: (!p1) mad r1.xy, r0, -c2.xxxx, 0.5
    0048: tex r2, r1, s0
    0058: mov o0, r2
    ");
}

#[test]
fn truncated_listing_keeps_prefix() {
    let mut bytes = assemble(&textured(), Target::Generic).unwrap().into_bytes();
    bytes.truncate(0x58 + 8);
    let listing = disassemble(&bytes, Target::Generic).unwrap();
    insta::assert_snapshot!(listing.to_string().trim_end(), @r"
    ; generic shader, 3 instructions
    ; samplers: 1
    ; cb0: 4 elements
    ; input position0 x4
    ; output color0 x4
    0024: mov r0, v0
    0030: (!p1) mad r1.xy, r0, -c2.xxxx, 0.5
    0048: tex r2, r1, s0
    ; malformed at byte 0x0058 (instruction 3): truncated instruction: needs 12 bytes, 8 remain
    ");
}

#[test]
fn tile_listing_shows_bundles() {
    let program = ShaderProgram::new(
        ProgramHeader {
            sampler_count: 1,
            ..ProgramHeader::default()
        },
        vec![
            Instruction::new(
                Opcode::Mov,
                [Register::temp(0).into(), Register::constant(0).into()],
            ),
            Instruction::new(
                Opcode::Mov,
                [Register::temp(1).into(), Register::constant(1).into()],
            ),
            Instruction::new(
                Opcode::Tex,
                [
                    Register::temp(2).into(),
                    Register::temp(0).into(),
                    ResourceSlot::sampler(0).into(),
                ],
            ),
            Instruction::new(
                Opcode::Mad,
                [
                    Register::temp(3).into(),
                    Register::temp(2).into(),
                    Immediate::f32(1.5).into(),
                    Register::temp(3).into(),
                ],
            )
            .with_write_mask(WriteMask::W)
            .with_predicate(Predicate {
                index: 0,
                negate: false,
            }),
        ],
    );
    let blob = assemble(&program, Target::Tile).unwrap();
    let listing = disassemble(blob.as_bytes(), Target::Tile).unwrap();
    insta::assert_snapshot!(listing.to_string().trim_end(), @r"
    ; tile shader, 4 instructions
    ; samplers: 1
    0018: mov r0, c0
    0018: mov r1, c1
    002c: tex r2, r0, s0
    0040: (p0) mad r3.w, r2, 1.5, r3
    ");
}
