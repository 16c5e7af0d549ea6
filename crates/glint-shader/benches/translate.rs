#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
#[cfg(not(target_arch = "wasm32"))]
use glint_shader::{
    assemble, disassemble, Instruction, Opcode, ProgramHeader, Register, ShaderProgram, Target,
};

/// A straight-line program that every target accepts: alternating independent and dependent
/// arithmetic, so the tile packer sees both pairable and unpairable neighbours.
#[cfg(not(target_arch = "wasm32"))]
fn synthetic_program(len: usize) -> ShaderProgram {
    let instructions = (0..len)
        .map(|i| {
            let dst = Register::temp((i % 6) as u16);
            let src = Register::constant((i % 8) as u16);
            if i % 2 == 0 {
                Instruction::new(Opcode::Mov, [dst.into(), src.into()])
            } else {
                let prev = Register::temp(((i - 1) % 6) as u16);
                Instruction::new(Opcode::Mul, [dst.into(), prev.into(), src.into()])
            }
        })
        .collect();
    ShaderProgram::new(ProgramHeader::default(), instructions)
}

#[cfg(not(target_arch = "wasm32"))]
fn bench_translate(c: &mut Criterion) {
    let program = synthetic_program(512);

    let mut group = c.benchmark_group("shader_translate");
    group.throughput(Throughput::Elements(program.instructions.len() as u64));

    for target in Target::ALL {
        group.bench_with_input(BenchmarkId::new("assemble", target), &program, |b, program| {
            b.iter(|| {
                let blob = assemble(black_box(program), target).unwrap();
                black_box(blob.len());
            })
        });

        let blob = assemble(&program, target).unwrap();
        group.bench_with_input(
            BenchmarkId::new("disassemble", target),
            blob.as_bytes(),
            |b, bytes| {
                b.iter(|| {
                    let listing = disassemble(black_box(bytes), target).unwrap();
                    black_box(listing.instructions.len());
                })
            },
        );
    }

    group.finish();
}

#[cfg(not(target_arch = "wasm32"))]
criterion_group!(benches, bench_translate);
#[cfg(not(target_arch = "wasm32"))]
criterion_main!(benches);
