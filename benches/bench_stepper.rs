use criterion::{black_box, criterion_group, criterion_main, Criterion};

use riscv_iss::{Hart, Memory, SimpleMemory};

/// A tight count-down loop (lui/addi/bne); the runs below bound it with an
/// instruction-count limit or a fixed number of steps.
fn build_hart() -> Hart<u32> {
    let mem = SimpleMemory::with_size(0, 0x10000);
    let mut hart = Hart::new(0, Box::new(mem));
    hart.poke_pc(0);

    let program: [u32; 6] = [
        0x000F_42B7, // lui   t0, 0xF4      (t0 = 1_000_000 >> 12 approx base)
        0x2402_8293, // addi  t0, t0, 0x240 (t0 = 1_000_000)
        0x0010_0113, // addi  sp, zero, 1
        0xFFF2_8293, // addi  t0, t0, -1
        0xFE02_9EE3, // bne   t0, zero, -4
        0x0030_2023, // sw    gp, 0(x0) -> never reached without tohost
    ];
    for (i, inst) in program.iter().enumerate() {
        hart.memory().poke(i as u64 * 4, *inst as u64, 4);
    }
    hart
}

fn bench_stepper(c: &mut Criterion) {
    let mut group = c.benchmark_group("stepper");
    group.sample_size(20);

    group.bench_function("count_down_loop", |b| {
        b.iter(|| {
            let mut hart = build_hart();
            hart.set_instruction_count_limit(100_000);
            black_box(hart.run(None));
        })
    });

    group.bench_function("single_steps", |b| {
        b.iter(|| {
            let mut hart = build_hart();
            for _ in 0..10_000 {
                hart.single_step(None);
            }
            black_box(hart.retired_insts());
        })
    });

    group.finish();
}

criterion_group!(benches, bench_stepper);
criterion_main!(benches);
