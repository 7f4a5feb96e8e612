//! End-to-end scenarios driven through the public API: a hart over a flat
//! memory, programs hand-assembled as raw instruction words.

use riscv_iss::{csr_index, Hart, Memory, SimpleMemory};

fn flat_hart(program: &[u32]) -> Hart<u32> {
    // RAM at address zero so program counters match the scenario text.
    let mem = SimpleMemory::with_size(0, 0x10000);
    let mut hart = Hart::new(0, Box::new(mem));
    hart.poke_pc(0);
    for (i, inst) in program.iter().enumerate() {
        hart.memory().poke(i as u64 * 4, *inst as u64, 4);
    }
    hart
}

#[test]
fn addi_retires_one_instruction() {
    // addi x1, x0, 5
    let mut hart = flat_hart(&[0x0050_0093]);
    hart.single_step(None);
    assert_eq!(hart.peek_int_reg(1), Some(5));
    assert_eq!(hart.peek_pc(), 4);
    assert_eq!(hart.retired_insts(), 1);
}

#[test]
fn branch_taken_lands_on_target() {
    // beq x1, x2, +8 with x1 == x2 == 0
    let mut hart = flat_hart(&[0x0020_8463]);
    hart.single_step(None);
    assert_eq!(hart.peek_pc(), 8);
    assert!(hart.last_branch_taken());
}

#[test]
fn misaligned_load_into_io_region_traps() {
    // Memory-mapped register region at 0x1000_0000; lw x3, 1(x10) with
    // x10 = 0x1000_0000 raises load-address-misaligned.
    let mut mem = SimpleMemory::with_size(0, 0x10000);
    mem.define_mmio(0x1000_0000, 0x1000);
    let mut hart: Hart<u32> = Hart::new(0, Box::new(mem));
    hart.poke_pc(0);
    hart.memory().poke(0, 0x0015_2183, 4); // lw x3, 1(x10)
    hart.poke_int_reg(10, 0x1000_0000);
    // Mark region 1 as having side effects.
    hart.poke_csr(csr_index::mrac, 1 << 3);

    hart.single_step(None);

    assert_eq!(hart.peek_csr(csr_index::mcause), Some(4));
    assert_eq!(hart.peek_csr(csr_index::mtval), Some(0x1000_0001));
    assert_eq!(hart.peek_csr(csr_index::mepc), Some(0));
}

#[test]
fn lr_sc_pair_succeeds() {
    // lr.w x5, (x10); sc.w x6, x7, (x10)
    let mut hart = flat_hart(&[0x1005_22AF, 0x1875_232F]);
    hart.poke_int_reg(10, 0x100);
    hart.poke_int_reg(7, 42);
    hart.poke_memory(0x100, 7, 4);

    hart.single_step(None);
    hart.single_step(None);

    assert_eq!(hart.peek_int_reg(5), Some(7));
    assert_eq!(hart.peek_int_reg(6), Some(0)); // success
    assert_eq!(hart.peek_memory(0x100, 4), Some(42));
}

#[test]
fn sc_fails_after_intervening_store() {
    let mut hart = flat_hart(&[
        0x1005_22AF, // lr.w x5, (x10)
        0x00B5_2023, // sw x11, 0(x10)
        0x1875_232F, // sc.w x6, x7, (x10)
    ]);
    hart.poke_int_reg(10, 0x100);
    hart.poke_int_reg(7, 42);
    hart.poke_int_reg(11, 9);
    hart.poke_memory(0x100, 7, 4);

    for _ in 0..3 {
        hart.single_step(None);
    }

    assert_eq!(hart.peek_int_reg(6), Some(1)); // failure
    assert_eq!(hart.peek_memory(0x100, 4), Some(9)); // SC did not write
}

#[test]
fn poke_into_reserved_range_kills_reservation() {
    let mut hart = flat_hart(&[
        0x1005_22AF, // lr.w x5, (x10)
        0x1875_232F, // sc.w x6, x7, (x10)
    ]);
    hart.poke_int_reg(10, 0x100);
    hart.poke_int_reg(7, 42);
    hart.poke_memory(0x100, 7, 4);

    hart.single_step(None);
    hart.poke_memory(0x102, 0, 1); // inside [lr_addr, lr_addr + 4)
    hart.single_step(None);

    assert_eq!(hart.peek_int_reg(6), Some(1));
    assert_eq!(hart.peek_memory(0x100, 4), Some(7));
}

#[test]
fn store_to_tohost_stops_with_success() {
    // sw x1, 0(x2) with x2 = tohost and x1 = 1.
    let mut hart = flat_hart(&[0x0011_2023]);
    hart.poke_int_reg(1, 1);
    hart.poke_int_reg(2, 0x1000);
    hart.set_to_host_address(0x1000);

    let success = hart.run(None);

    assert!(success);
    assert!(hart.target_program_finished());
}

#[test]
fn store_of_failure_code_to_tohost_fails() {
    let mut hart = flat_hart(&[0x0011_2023]);
    hart.poke_int_reg(1, 3);
    hart.poke_int_reg(2, 0x1000);
    hart.set_to_host_address(0x1000);

    let success = hart.run(None);

    assert!(!success);
    assert!(hart.target_program_finished());
}

#[test]
fn rv64_word_forms_sign_extend() {
    let mem = SimpleMemory::with_size(0, 0x10000);
    let mut hart: Hart<u64> = Hart::new(0, Box::new(mem));
    hart.poke_pc(0);
    // addw x1, x2, x3
    hart.memory().poke(0, 0x0031_00BB, 4);
    hart.poke_int_reg(2, 0x7FFF_FFFF);
    hart.poke_int_reg(3, 1);

    hart.single_step(None);

    assert_eq!(hart.peek_int_reg(1), Some(0xFFFF_FFFF_8000_0000));
}

#[test]
fn rv64_ld_sd_roundtrip() {
    let mem = SimpleMemory::with_size(0, 0x10000);
    let mut hart: Hart<u64> = Hart::new(0, Box::new(mem));
    hart.poke_pc(0);
    // sd x2, 0(x1); ld x3, 0(x1)
    hart.memory().poke(0, 0x0020_B023, 4);
    hart.memory().poke(4, 0x0000_B183, 4);
    hart.poke_int_reg(1, 0x200);
    hart.poke_int_reg(2, 0x1122_3344_5566_7788);

    hart.single_step(None);
    hart.single_step(None);

    assert_eq!(hart.peek_int_reg(3), Some(0x1122_3344_5566_7788));
}

#[test]
fn load_queue_rollback_on_bus_error() {
    let mut hart = flat_hart(&[0x0005_2283]); // lw x5, 0(x10)
    hart.enable_load_queue(true);
    hart.poke_int_reg(10, 0x100);
    hart.poke_int_reg(5, 111);
    hart.poke_memory(0x100, 222, 4);

    hart.single_step(None);
    assert_eq!(hart.peek_int_reg(5), Some(222));

    // The bench reports a bus error for that load: the register reverts
    // and the NMI is posted with MDSEAC latched.
    let (ok, matches) = hart.apply_load_exception(0x100);
    assert!(ok);
    assert_eq!(matches, 1);
    assert_eq!(hart.peek_int_reg(5), Some(111));
    assert_eq!(hart.peek_csr(csr_index::mdseac), Some(0x100));
    // DCSR.nmip mirrors the pending NMI.
    assert_eq!(hart.peek_csr(csr_index::dcsr).map(|v| (v >> 3) & 1), Some(1));
}

#[test]
fn store_queue_rollback_on_bus_error() {
    let mut hart = flat_hart(&[0x00B5_2023]); // sw x11, 0(x10)
    hart.poke_int_reg(10, 0x100);
    hart.poke_int_reg(11, 0xBEEF);
    hart.poke_memory(0x100, 0x1234, 4);

    hart.single_step(None);
    assert_eq!(hart.peek_memory(0x100, 4), Some(0xBEEF));

    let (ok, matches) = hart.apply_store_exception(0x100);
    assert!(ok);
    assert_eq!(matches, 1);
    assert_eq!(hart.peek_memory(0x100, 4), Some(0x1234));
}

#[test]
fn trace_records_match_contract() {
    let mut hart = flat_hart(&[0x0050_0093]); // addi x1, x0, 5
    let mut out: Vec<u8> = Vec::new();
    hart.single_step(Some(&mut out));
    let line = String::from_utf8(out).unwrap();
    assert_eq!(line, "#1 0 00000000 00500093 r 01 00000005  addi\n");
}

#[test]
fn trace_memory_record() {
    let mut hart = flat_hart(&[0x00B5_2023]); // sw x11, 0(x10)
    hart.poke_int_reg(10, 0x100);
    hart.poke_int_reg(11, 0xAB);
    let mut out: Vec<u8> = Vec::new();
    hart.single_step(Some(&mut out));
    let line = String::from_utf8(out).unwrap();
    assert_eq!(line, "#1 0 00000000 00b52023 m 100 000000ab  sw\n");
}

#[test]
fn instruction_frequency_statistics() {
    let mut hart = flat_hart(&[0x0050_0093, 0x0050_0093, 0x0000_0013]);
    hart.enable_instruction_frequency(true);
    for _ in 0..3 {
        hart.single_step(None);
    }
    let mut report = Vec::new();
    hart.stats().report(&mut report).unwrap();
    let text = String::from_utf8(report).unwrap();
    assert!(text.starts_with("addi 3"));
}

#[test]
fn performance_counters_count_alu_ops() {
    // csrrw x0, mhpmevent3, x2 wires counter 3 to the Alu event; the
    // following addi is the only Alu op that retires afterwards.
    let mut hart = flat_hart(&[0x3231_1073, 0x0050_0093]);
    hart.enable_performance_counters(true);
    hart.poke_int_reg(2, 6); // Alu event number
    hart.single_step(None);
    hart.single_step(None);
    assert_eq!(hart.peek_csr(csr_index::mhpmcounter3), Some(1));
}

#[test]
fn consecutive_illegal_instructions_stop_the_run() {
    // mtvec at 0 loops straight back into the illegal instruction.
    let mut hart = flat_hart(&[0xFFFF_FFFF]);
    let success = hart.run(None);
    assert!(!success);
    assert!(hart.target_program_finished());
}

#[test]
fn run_honors_instruction_count_limit() {
    // An infinite loop, limited to 10 instructions.
    let mut hart = flat_hart(&[0x0000_0013, 0xFFDF_F06F]); // nop; jal x0, -4
    hart.set_instruction_count_limit(10);
    let success = hart.run(None);
    assert!(success);
    assert!(hart.retired_insts() <= 10);
}

#[test]
fn reset_is_idempotent() {
    let mut hart = flat_hart(&[0x0050_0093]);
    hart.single_step(None);
    hart.reset(true);
    let pc1 = hart.peek_pc();
    let minstret1 = hart.peek_csr(csr_index::minstret);
    let misa1 = hart.peek_csr(csr_index::misa);
    hart.reset(true);
    assert_eq!(hart.peek_pc(), pc1);
    assert_eq!(hart.peek_csr(csr_index::minstret), minstret1);
    assert_eq!(hart.peek_csr(csr_index::misa), misa1);
}

#[test]
fn compressed_execution_path() {
    // c.li a0, 5 ; c.addi a0, 1
    let mut hart = flat_hart(&[]);
    hart.memory().poke(0, 0x4515, 2);
    hart.memory().poke(2, 0x0505, 2);
    hart.single_step(None);
    hart.single_step(None);
    assert_eq!(hart.peek_int_reg(10), Some(6));
    assert_eq!(hart.peek_pc(), 4);
}
