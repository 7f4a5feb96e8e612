//! Builder/checker helpers for hart unit tests.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

use crate::isa::riscv::decoder;
use crate::isa::riscv::hart::Hart;
use crate::isa::riscv::instruction::{exec_mapping, DecodedInst, InstrId, Operands};
use crate::mem::{Memory, SimpleMemory, DEFAULT_BASE_ADDR};
use crate::utils::Word;

pub(crate) const BASE: u64 = DEFAULT_BASE_ADDR;

pub(crate) struct TestHartBuilder<W: Word> {
    hart: Hart<W>,
}

impl<W: Word> TestHartBuilder<W> {
    pub(crate) fn new() -> Self {
        let mut mem = SimpleMemory::new();
        mem.define_mmio(0x1000_0000, 0x1000);
        let mut hart = Hart::with_extensions(0, Box::new(mem), "acdfimsux");
        hart.pc = W::from_u64(BASE);
        Self { hart }
    }

    pub(crate) fn reg(mut self, ix: u8, value: u64) -> Self {
        self.hart.int_regs.poke(ix, W::from_u64(value));
        self
    }

    pub(crate) fn reg_f32(mut self, ix: u8, value: f32) -> Self {
        self.hart.fp_regs.write_single(ix, value.to_bits());
        self.hart.fp_regs.clear_last_written();
        self
    }

    pub(crate) fn reg_f64(mut self, ix: u8, value: f64) -> Self {
        self.hart.fp_regs.write_double(ix, value.to_bits());
        self.hart.fp_regs.clear_last_written();
        self
    }

    pub(crate) fn pc(mut self, value: u64) -> Self {
        self.hart.pc = W::from_u64(value);
        self
    }

    pub(crate) fn mem(mut self, addr: u64, value: u64, size: u32) -> Self {
        self.hart.mem.poke(addr, value, size);
        self
    }

    pub(crate) fn mem_base(self, offset: u64, value: u64, size: u32) -> Self {
        self.mem(BASE + offset, value, size)
    }

    pub(crate) fn csr(mut self, number: u16, value: u64) -> Self {
        self.hart.poke_csr(number, value);
        self
    }

    pub(crate) fn program(mut self, instrs: &[u32]) -> Self {
        let mut addr = BASE;
        for inst in instrs {
            self.hart.mem.poke(addr, *inst as u64, 4);
            addr += 4;
        }
        self
    }

    pub(crate) fn configure(mut self, f: impl FnOnce(&mut Hart<W>)) -> Self {
        f(&mut self.hart);
        self
    }

    pub(crate) fn build(self) -> Hart<W> {
        self.hart
    }
}

pub(crate) struct HartChecker<'a, W: Word> {
    pub(crate) hart: &'a mut Hart<W>,
}

impl<'a, W: Word> HartChecker<'a, W> {
    pub(crate) fn new(hart: &'a mut Hart<W>) -> Self {
        Self { hart }.reg(0, 0) // x0 is always 0
    }

    pub(crate) fn reg(self, ix: u8, value: u64) -> Self {
        assert_eq!(
            self.hart.int_regs.read(ix).to_u64(),
            value,
            "Register x{} incorrect",
            ix,
        );
        self
    }

    pub(crate) fn reg_f32(self, ix: u8, value: f32) -> Self {
        assert_eq!(
            self.hart.fp_regs.read_single(ix),
            value.to_bits(),
            "FP register f{} incorrect",
            ix,
        );
        self
    }

    pub(crate) fn reg_f64(self, ix: u8, value: f64) -> Self {
        assert_eq!(
            self.hart.fp_regs.read_double(ix),
            value.to_bits(),
            "FP register f{} incorrect",
            ix,
        );
        self
    }

    pub(crate) fn pc(self, value: u64) -> Self {
        assert_eq!(self.hart.pc.to_u64(), value, "PC incorrect");
        self
    }

    pub(crate) fn mem(self, addr: u64, value: u64, size: u32) -> Self {
        assert_eq!(
            self.hart.peek_memory(addr, size),
            Some(value),
            "Memory value incorrect at {:#x}",
            addr
        );
        self
    }

    pub(crate) fn mem_base(self, offset: u64, value: u64, size: u32) -> Self {
        self.mem(BASE + offset, value, size)
    }

    pub(crate) fn csr(self, number: u16, value: u64) -> Self {
        assert_eq!(
            self.hart.peek_csr(number),
            Some(value),
            "CSR {:#x} incorrect",
            number
        );
        self
    }

    pub(crate) fn customized<F>(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        f(self)
    }
}

/// Execute one pre-decoded instruction, mimicking the run loop's
/// pc-advance-then-execute protocol.
pub(crate) fn run_test_exec<W, F, G>(id: InstrId, ops: Operands, build: F, check: G)
where
    W: Word,
    F: FnOnce(TestHartBuilder<W>) -> TestHartBuilder<W>,
    G: FnOnce(HartChecker<W>) -> HartChecker<W>,
{
    let mut hart = build(TestHartBuilder::new()).build();
    hart.current_pc = hart.pc;
    hart.pc = hart.pc.wrapping_add(W::from_u64(4));
    exec_mapping::execute(&mut hart, &DecodedInst { id, ops }).unwrap();
    check(HartChecker::new(&mut hart));
}

/// Decode a raw 32-bit word and execute it.
pub(crate) fn run_test_exec_decode<W, F, G>(raw_inst: u32, build: F, check: G)
where
    W: Word,
    F: FnOnce(TestHartBuilder<W>) -> TestHartBuilder<W>,
    G: FnOnce(HartChecker<W>) -> HartChecker<W>,
{
    let mut hart = build(TestHartBuilder::new()).build();
    let decoded = decoder::decode::<W>(raw_inst, &hart.isa);
    assert_ne!(decoded.id, InstrId::ILLEGAL, "test encoding does not decode");
    hart.current_pc = hart.pc;
    hart.pc = hart.pc.wrapping_add(W::from_u64(4));
    exec_mapping::execute(&mut hart, &decoded).unwrap();
    check(HartChecker::new(&mut hart));
}

/// Load a program at the RAM base and step the full run loop over it.
pub(crate) fn run_test_hart_step<W, F, G>(instrs: &[u32], build: F, check: G)
where
    W: Word,
    F: FnOnce(TestHartBuilder<W>) -> TestHartBuilder<W>,
    G: FnOnce(HartChecker<W>) -> HartChecker<W>,
{
    let mut hart = build(TestHartBuilder::new().program(instrs)).build();
    for _ in 0..instrs.len() {
        hart.single_step(None);
    }
    check(HartChecker::new(&mut hart));
}

/// Randomized operator tests with a fixed seed.
pub(crate) struct ExecTester {
    rng: ChaCha12Rng,
}

impl ExecTester {
    pub(crate) fn new() -> Self {
        Self {
            rng: ChaCha12Rng::seed_from_u64(0x0721),
        }
    }

    pub(crate) fn rand_imm12(&mut self) -> i32 {
        self.rng.random_range(-2048..=2047)
    }

    pub(crate) fn rand_word(&mut self) -> u32 {
        self.rng.random()
    }

    pub(crate) fn rand_reg_ix(&mut self) -> u8 {
        self.rng.random_range(1..32) as u8
    }

    fn rand_unique_reg_ix2(&mut self) -> (u8, u8) {
        let a = self.rand_reg_ix();
        let mut b = self.rand_reg_ix();
        while a == b {
            b = self.rand_reg_ix();
        }
        (a, b)
    }

    pub(crate) fn test_rand_r<F>(&mut self, id: InstrId, calc: F)
    where
        F: FnOnce(u32, u32) -> u32,
    {
        let (lhs, rhs) = (self.rand_word(), self.rand_word());
        let rd = self.rand_reg_ix();
        let (rs1, rs2) = self.rand_unique_reg_ix2();
        run_test_exec::<u32, _, _>(
            id,
            Operands::R { rd, rs1, rs2 },
            |b| b.reg(rs1, lhs as u64).reg(rs2, rhs as u64).pc(0x1000),
            |c| c.reg(rd, calc(lhs, rhs) as u64).pc(0x1004),
        );
    }

    pub(crate) fn test_rand_i<F>(&mut self, id: InstrId, calc: F)
    where
        F: FnOnce(u32, i32) -> u32,
    {
        let lhs = self.rand_word();
        let imm = self.rand_imm12();
        let rd = self.rand_reg_ix();
        let rs1 = self.rand_reg_ix();
        run_test_exec::<u32, _, _>(
            id,
            Operands::I { rd, rs1, imm },
            |b| b.reg(rs1, lhs as u64).pc(0x1000),
            |c| c.reg(rd, calc(lhs, imm) as u64).pc(0x1004),
        );
    }
}
