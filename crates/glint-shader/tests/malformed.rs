use glint_shader::{
    assemble, disassemble, BlobHeader, DisassembleError, Instruction, Opcode, ProgramHeader,
    Register, ShaderProgram, Target, BLOB_VERSION,
};
use pretty_assertions::assert_eq;

fn movs(n: u16) -> ShaderProgram {
    ShaderProgram::new(
        ProgramHeader::default(),
        (0..n)
            .map(|i| {
                Instruction::new(
                    Opcode::Mov,
                    [Register::temp(i).into(), Register::constant(i).into()],
                )
            })
            .collect(),
    )
}

#[test]
fn truncated_code_yields_prefix_and_offset() {
    // Generic movs are 12 bytes each after the 24-byte header.
    let mut bytes = assemble(&movs(3), Target::Generic).unwrap().into_bytes();
    bytes.truncate(24 + 12 + 12 + 5);

    let listing = disassemble(&bytes, Target::Generic).unwrap();
    assert_eq!(listing.instructions.len(), 2);
    let m = listing.malformed.clone().unwrap();
    assert_eq!(m.byte_offset, 48);
    assert_eq!(m.instruction_index, 2);
    assert_eq!(m.reason, "truncated instruction: needs 12 bytes, 5 remain");

    let err = listing.into_program().unwrap_err();
    assert_eq!(
        err.to_string(),
        "malformed instruction 2 at byte offset 48: truncated instruction: needs 12 bytes, 5 remain"
    );
}

#[test]
fn truncation_points_at_the_word_on_every_target() {
    for (target, word) in [(Target::Generic, 12), (Target::Legacy, 8), (Target::Tile, 20)] {
        let program = movs(4);
        let blob = assemble(&program, target).unwrap();
        let header = blob.header().unwrap();
        let mut bytes = blob.into_bytes();
        bytes.pop();

        let listing = disassemble(&bytes, target).unwrap();
        let m = listing.malformed.unwrap();
        let last_word = header.encoded_len() + (header.word_count as usize - 1) * word;
        assert_eq!(m.byte_offset, last_word, "{target}");
        assert!(m.reason.starts_with("truncated instruction"), "{target}: {}", m.reason);
        // Tile pairs the movs two per bundle, so the truncated bundle loses two instructions.
        let expected = if target == Target::Tile { 2 } else { 3 };
        assert_eq!(listing.instructions.len(), expected, "{target}");
    }
}

#[test]
fn version_gate() {
    let mut bytes = assemble(&movs(1), Target::Legacy).unwrap().into_bytes();
    let next = BLOB_VERSION + 1;
    bytes[4..6].copy_from_slice(&next.to_le_bytes());
    for target in Target::ALL {
        assert_eq!(
            disassemble(&bytes, target),
            Err(DisassembleError::UnsupportedVersion(next))
        );
    }
}

#[test]
fn header_errors_are_not_partial_listings() {
    let blob = assemble(&movs(2), Target::Tile).unwrap();

    let mut bad_magic = blob.as_bytes().to_vec();
    bad_magic[0] = b'X';
    assert!(matches!(
        disassemble(&bad_magic, Target::Tile),
        Err(DisassembleError::BadMagic { .. })
    ));

    assert!(matches!(
        disassemble(&blob.as_bytes()[..10], Target::Tile),
        Err(DisassembleError::MalformedHeader(_))
    ));

    assert_eq!(
        disassemble(blob.as_bytes(), Target::Legacy),
        Err(DisassembleError::TargetMismatch {
            expected: Target::Legacy,
            found: Target::Tile.id(),
        })
    );
}

#[test]
fn inflated_instruction_count() {
    let mut bytes = assemble(&movs(2), Target::Legacy).unwrap().into_bytes();
    bytes[8..12].copy_from_slice(&3u32.to_le_bytes());
    let listing = disassemble(&bytes, Target::Legacy).unwrap();
    assert_eq!(listing.instructions.len(), 2);
    let m = listing.malformed.unwrap();
    assert_eq!(m.byte_offset, 24 + 16);
    assert_eq!(m.reason, "truncated instruction: needs 8 bytes, 0 remain");
}

#[test]
fn code_size_must_match() {
    let mut bytes = assemble(&movs(2), Target::Generic).unwrap().into_bytes();
    bytes[16..20].copy_from_slice(&100u32.to_le_bytes());
    let listing = disassemble(&bytes, Target::Generic).unwrap();
    assert_eq!(listing.instructions.len(), 2);
    assert_eq!(
        listing.malformed.unwrap().reason,
        "header declares 100 code bytes, blob holds 24"
    );
}

#[test]
fn arbitrary_bytes_never_panic() {
    let blob = assemble(&movs(4), Target::Tile).unwrap();
    let header_len = blob.header().unwrap().encoded_len();
    let mut bytes = blob.into_bytes();
    for i in header_len..bytes.len() {
        for flip in [0x01u8, 0x80, 0xFF] {
            bytes[i] ^= flip;
            let _ = disassemble(&bytes, Target::Tile).unwrap();
            bytes[i] ^= flip;
        }
    }
    assert!(BlobHeader::parse(&bytes).is_ok());
}
