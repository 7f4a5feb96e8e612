use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cpu::{CstRegFile, FloatRegFile, RegFile};
use crate::isa::riscv::csr_reg::perf::PerfRegs;
use crate::isa::riscv::csr_reg::{csr_index, CsrRegFile, PrivilegeMode};
use crate::isa::riscv::queues::{LoadEntry, StoreEntry};
use crate::isa::riscv::trap::NmiCause;
use crate::isa::riscv::triggers::{NullTriggers, TriggerUnit};
use crate::mem::Memory;
use crate::stats::InstrStats;
use crate::utils::Word;

/// Extensions supported by this implementation. `x` is the experimental
/// minor bit-manip set.
const SUPPORTED_EXTENSIONS: &str = "acdfimsux";
const DEFAULT_EXTENSIONS: &str = "acdfimsu";

pub const DEFAULT_RESET_PC: u64 = 0x8000_0000;
pub const DEFAULT_NMI_PC: u64 = 0x8000_0100;

/// Extension set derived from MISA at reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsaFlags {
    pub rva: bool,
    pub rvc: bool,
    pub rvd: bool,
    pub rvf: bool,
    pub rvm: bool,
    pub rvs: bool,
    pub rvu: bool,
    pub zbmini: bool,
}

/// Cause field written into DCSR when entering debug mode.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DebugModeCause {
    Ebreak = 1,
    Trigger = 2,
    Debugger = 3,
    Step = 4,
}

/// One hardware thread: the complete architectural state plus the
/// simulation bookkeeping the run loop needs.
pub struct Hart<W: Word> {
    pub(crate) hart_id: u32,
    pub(crate) int_regs: RegFile<W>,
    pub(crate) fp_regs: FloatRegFile,
    pub(crate) cst_regs: CstRegFile<W>,
    pub(crate) csr: CsrRegFile<W>,
    pub(crate) mem: Box<dyn Memory>,
    pub(crate) perf: PerfRegs,
    pub(crate) triggers: Box<dyn TriggerUnit>,

    pub(crate) pc: W,
    pub(crate) current_pc: W,
    pub(crate) reset_pc: W,
    pub(crate) nmi_pc: W,
    pub(crate) priv_mode: PrivilegeMode,
    pub(crate) debug_mode: bool,
    pub(crate) debug_step_mode: bool,
    pub(crate) ebreak_inst_debug: bool,

    pub(crate) retired_insts: Arc<AtomicU64>,
    pub(crate) cycle_count: Arc<AtomicU64>,
    /// Fetch tag: counts fetched (not necessarily retired) instructions.
    pub(crate) counter: u64,
    pub(crate) inst_count_limit: u64,

    pub(crate) isa: IsaFlags,

    // Load reservation.
    pub(crate) has_lr: bool,
    pub(crate) lr_addr: u64,
    pub(crate) lr_size: u32,

    // Speculation queues.
    pub(crate) load_queue: Vec<LoadEntry<W>>,
    pub(crate) store_queue: Vec<StoreEntry>,
    pub(crate) max_load_queue_size: usize,
    pub(crate) max_store_queue_size: usize,
    pub(crate) load_queue_enabled: bool,
    pub(crate) load_error_rollback: bool,
    pub(crate) store_error_rollback: bool,

    // Per-step flags.
    pub(crate) has_exception: bool,
    pub(crate) trigger_tripped: bool,
    pub(crate) load_addr: u64,
    pub(crate) load_addr_valid: bool,
    pub(crate) misaligned_ld_st: bool,
    pub(crate) last_branch_taken: bool,

    // Test-bench failure injection.
    pub(crate) force_access_fail: bool,
    pub(crate) force_fetch_fail: bool,
    pub(crate) force_fetch_fail_offset: u64,

    // NMI.
    pub(crate) nmi_pending: bool,
    pub(crate) nmi_cause: NmiCause,

    // Special addresses and consoles.
    pub(crate) to_host: Option<u64>,
    pub(crate) con_io: Option<u64>,
    pub(crate) console_out: Option<Box<dyn Write + Send>>,
    pub(crate) console_in: Option<Box<dyn Read + Send>>,
    pub(crate) stop_addr: Option<u64>,

    // Cached CSR-derived execution flags.
    pub(crate) dcsr_step: bool,
    pub(crate) dcsr_step_ie: bool,
    pub(crate) counters_on: bool,
    pub(crate) prev_counters_on: bool,

    // Feature toggles.
    pub(crate) enable_counters: bool,
    pub(crate) enable_triggers: bool,
    pub(crate) instr_freq_enabled: bool,
    pub(crate) trace_load: bool,
    pub(crate) newlib: bool,
    pub(crate) ea_compat_with_base: bool,
    pub(crate) amo_illegal_outside_dccm: bool,

    pub(crate) stats: InstrStats,

    // Illegal-instruction watchdog.
    pub(crate) consecutive_illegal_count: u32,
    pub(crate) counter_at_last_illegal: u64,

    pub(crate) exception_count: u64,
    pub(crate) interrupt_count: u64,

    pub(crate) program_break: u64,
    pub(crate) target_program_finished: bool,
}

impl<W: Word> Hart<W> {
    pub fn new(hart_id: u32, mem: Box<dyn Memory>) -> Self {
        Self::with_extensions(hart_id, mem, DEFAULT_EXTENSIONS)
    }

    /// Build a hart supporting the given extension letters (e.g. "acfimu").
    /// Unsupported letters are diagnosed and dropped.
    pub fn with_extensions(hart_id: u32, mem: Box<dyn Memory>, extensions: &str) -> Self {
        let mut misa: u64 = 1 << (b'i' - b'a'); // I is mandatory.
        for c in extensions.chars() {
            if !c.is_ascii_lowercase() {
                log::warn!("Invalid extension letter '{}' -- ignored", c);
                continue;
            }
            if SUPPORTED_EXTENSIONS.contains(c) {
                misa |= 1 << (c as u8 - b'a');
            } else {
                log::warn!("Extension '{}' is not supported -- ignored", c);
            }
        }
        let mxl: u64 = if W::XLEN == 32 { 1 } else { 2 };
        misa |= mxl << (W::XLEN - 2);

        let mut hart = Self {
            hart_id,
            int_regs: RegFile::new(),
            fp_regs: FloatRegFile::new(),
            cst_regs: CstRegFile::new(),
            csr: CsrRegFile::new(),
            mem,
            perf: PerfRegs::new(),
            triggers: Box::new(NullTriggers),
            pc: W::from_u64(DEFAULT_RESET_PC),
            current_pc: W::from_u64(DEFAULT_RESET_PC),
            reset_pc: W::from_u64(DEFAULT_RESET_PC),
            nmi_pc: W::from_u64(DEFAULT_NMI_PC),
            priv_mode: PrivilegeMode::Machine,
            debug_mode: false,
            debug_step_mode: false,
            ebreak_inst_debug: false,
            retired_insts: Arc::new(AtomicU64::new(0)),
            cycle_count: Arc::new(AtomicU64::new(0)),
            counter: 0,
            inst_count_limit: u64::MAX,
            isa: IsaFlags::default(),
            has_lr: false,
            lr_addr: 0,
            lr_size: 0,
            load_queue: Vec::new(),
            store_queue: Vec::new(),
            max_load_queue_size: 16,
            max_store_queue_size: 16,
            load_queue_enabled: false,
            load_error_rollback: true,
            store_error_rollback: true,
            has_exception: false,
            trigger_tripped: false,
            load_addr: 0,
            load_addr_valid: false,
            misaligned_ld_st: false,
            last_branch_taken: false,
            force_access_fail: false,
            force_fetch_fail: false,
            force_fetch_fail_offset: 0,
            nmi_pending: false,
            nmi_cause: NmiCause::Unknown,
            to_host: None,
            con_io: None,
            console_out: None,
            console_in: None,
            stop_addr: None,
            dcsr_step: false,
            dcsr_step_ie: false,
            counters_on: true,
            prev_counters_on: true,
            enable_counters: false,
            enable_triggers: false,
            instr_freq_enabled: false,
            trace_load: true,
            newlib: false,
            ea_compat_with_base: false,
            amo_illegal_outside_dccm: false,
            stats: InstrStats::new(),
            consecutive_illegal_count: 0,
            counter_at_last_illegal: 0,
            exception_count: 0,
            interrupt_count: 0,
            program_break: 0,
            target_program_finished: false,
        };

        hart.csr.set_reset_value(csr_index::misa, W::from_u64(misa));
        hart.csr
            .set_reset_value(csr_index::mhartid, W::from_u64(hart_id as u64));
        hart.tie_counters();
        hart.reset(true);
        hart
    }

    fn tie_counters(&mut self) {
        use csr_index::*;
        let cycles = self.cycle_count.clone();
        let retired = self.retired_insts.clone();

        self.csr.tie_counter(mcycle, cycles.clone(), false);
        self.csr.tie_counter(minstret, retired.clone(), false);
        self.csr.tie_counter(cycle, cycles.clone(), false);
        self.csr.tie_counter(instret, retired.clone(), false);
        if W::XLEN == 32 {
            self.csr.tie_counter(mcycleh, cycles.clone(), true);
            self.csr.tie_counter(minstreth, retired.clone(), true);
            self.csr.tie_counter(cycleh, cycles, true);
            self.csr.tie_counter(instreth, retired, true);
        }
        for i in 0..crate::isa::riscv::csr_reg::perf::PERF_COUNTER_COUNT {
            let cell = self.perf.counter_cell(i);
            self.csr.tie_counter(mhpmcounter3 + i as u16, cell.clone(), false);
            if W::XLEN == 32 {
                self.csr.tie_counter(mhpmcounter3h + i as u16, cell, true);
            }
        }
    }

    /// Reset the hart. Memory-mapped register resets can be suppressed so
    /// that initial test-bench resets do not obliterate loaded data.
    pub fn reset(&mut self, _reset_memory_mapped_regs: bool) {
        self.int_regs.reset();
        self.fp_regs.reset();
        self.cst_regs.reset();
        self.csr.reset();

        self.clear_trace_data();
        self.clear_pending_nmi();

        self.store_queue.clear();
        self.load_queue.clear();
        self.has_lr = false;

        self.pc = self.reset_pc;
        self.current_pc = self.reset_pc;
        self.priv_mode = PrivilegeMode::Machine;
        self.consecutive_illegal_count = 0;
        self.target_program_finished = false;

        self.derive_extensions_from_misa();

        self.prev_counters_on = true;
        self.counters_on = true;
        if let Some(v) = self.csr.peek(csr_index::mgpmc) {
            self.counters_on = v.to_u64() & 1 == 1;
            self.prev_counters_on = self.counters_on;
        }

        self.debug_mode = false;
        self.debug_step_mode = false;
        self.dcsr_step = false;
        self.dcsr_step_ie = false;
        if let Some(v) = self.csr.peek(csr_index::dcsr) {
            self.dcsr_step = (v.to_u64() >> 2) & 1 == 1;
            self.dcsr_step_ie = (v.to_u64() >> 11) & 1 == 1;
        }
    }

    fn derive_extensions_from_misa(&mut self) {
        let misa = self
            .csr
            .peek(csr_index::misa)
            .map(|v| v.to_u64())
            .unwrap_or(0);
        let bit = |c: u8| misa & (1 << (c - b'a')) != 0;

        self.isa = IsaFlags {
            rva: bit(b'a'),
            rvc: bit(b'c'),
            rvd: false,
            rvf: bit(b'f'),
            rvm: bit(b'm'),
            rvs: bit(b's'),
            rvu: bit(b'u'),
            zbmini: bit(b'x'),
        };

        if bit(b'd') {
            if self.isa.rvf {
                self.isa.rvd = true;
            } else {
                log::warn!(
                    "Bit 3 (d) set in MISA but f extension (bit 5) is not enabled -- ignored"
                );
            }
        }
        if !bit(b'i') {
            log::warn!("Bit 8 (i) cleared in MISA but the extension is mandatory -- assuming set");
        }
    }

    // ------------------------------------------------------------------
    // Counters.
    // ------------------------------------------------------------------

    pub fn retired_insts(&self) -> u64 {
        self.retired_insts.load(Ordering::Relaxed)
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.load(Ordering::Relaxed)
    }

    pub(crate) fn bump_retired(&self, delta: i64) {
        if delta >= 0 {
            self.retired_insts.fetch_add(delta as u64, Ordering::Relaxed);
        } else {
            self.retired_insts
                .fetch_sub((-delta) as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn bump_cycles(&self, delta: i64) {
        if delta >= 0 {
            self.cycle_count.fetch_add(delta as u64, Ordering::Relaxed);
        } else {
            self.cycle_count.fetch_sub((-delta) as u64, Ordering::Relaxed);
        }
    }

    // ------------------------------------------------------------------
    // Configuration surface (driven by the external front-end).
    // ------------------------------------------------------------------

    pub fn hart_id(&self) -> u32 {
        self.hart_id
    }

    pub fn set_reset_pc(&mut self, pc: u64) {
        self.reset_pc = W::from_u64(pc) & !W::ONE;
    }

    pub fn set_nmi_pc(&mut self, pc: u64) {
        self.nmi_pc = W::from_u64(pc) & !W::ONE;
    }

    pub fn set_to_host_address(&mut self, addr: u64) {
        self.to_host = Some(addr);
    }

    pub fn clear_to_host_address(&mut self) {
        self.to_host = None;
    }

    pub fn set_console_io_address(&mut self, addr: u64) {
        self.con_io = Some(addr);
    }

    pub fn set_console_output(&mut self, out: Box<dyn Write + Send>) {
        self.console_out = Some(out);
    }

    pub fn set_console_input(&mut self, input: Box<dyn Read + Send>) {
        self.console_in = Some(input);
    }

    pub fn set_stop_address(&mut self, addr: u64) {
        self.stop_addr = Some(addr);
    }

    pub fn set_instruction_count_limit(&mut self, limit: u64) {
        self.inst_count_limit = limit;
    }

    pub fn enable_newlib(&mut self, flag: bool, program_break: u64) {
        self.newlib = flag;
        self.program_break = program_break;
    }

    pub fn enable_performance_counters(&mut self, flag: bool) {
        self.enable_counters = flag;
    }

    pub fn enable_instruction_frequency(&mut self, flag: bool) {
        self.instr_freq_enabled = flag;
    }

    pub fn enable_triggers(&mut self, flag: bool) {
        self.enable_triggers = flag;
    }

    pub fn set_trigger_unit(&mut self, unit: Box<dyn TriggerUnit>) {
        self.triggers = unit;
    }

    pub fn enable_load_queue(&mut self, flag: bool) {
        self.load_queue_enabled = flag;
    }

    pub fn set_load_queue_size(&mut self, size: usize) {
        self.max_load_queue_size = size;
    }

    pub fn set_store_queue_size(&mut self, size: usize) {
        self.max_store_queue_size = size;
    }

    pub fn set_load_error_rollback(&mut self, flag: bool) {
        self.load_error_rollback = flag;
    }

    pub fn set_store_error_rollback(&mut self, flag: bool) {
        self.store_error_rollback = flag;
    }

    pub fn set_ea_compatible_with_base(&mut self, flag: bool) {
        self.ea_compat_with_base = flag;
    }

    pub fn set_amo_illegal_outside_dccm(&mut self, flag: bool) {
        self.amo_illegal_outside_dccm = flag;
    }

    /// Make the next fetch fail with an access fault; `offset` lands in
    /// MTVAL relative to the faulting pc.
    pub fn force_fetch_fail(&mut self, offset: u64) {
        self.force_fetch_fail = true;
        self.force_fetch_fail_offset = offset;
    }

    /// Make the next data access fail with an access fault.
    pub fn force_access_fail(&mut self) {
        self.force_access_fail = true;
    }

    pub fn target_program_finished(&self) -> bool {
        self.target_program_finished
    }

    pub fn last_branch_taken(&self) -> bool {
        self.last_branch_taken
    }

    pub fn stats(&self) -> &InstrStats {
        &self.stats
    }

    // ------------------------------------------------------------------
    // Debugger peek/poke surface.
    // ------------------------------------------------------------------

    pub fn peek_pc(&self) -> u64 {
        self.pc.to_u64()
    }

    pub fn poke_pc(&mut self, pc: u64) {
        self.pc = W::from_u64(pc) & !W::ONE;
    }

    pub fn peek_int_reg(&self, ix: u8) -> Option<u64> {
        (ix < 32).then(|| self.int_regs.read(ix).to_u64())
    }

    pub fn poke_int_reg(&mut self, ix: u8, value: u64) -> bool {
        if ix >= 32 {
            return false;
        }
        self.int_regs.poke(ix, W::from_u64(value));
        true
    }

    pub fn peek_fp_reg(&self, ix: u8) -> Option<u64> {
        (self.isa.rvf && ix < 32).then(|| self.fp_regs.read_bits(ix))
    }

    pub fn poke_fp_reg(&mut self, ix: u8, value: u64) -> bool {
        if !self.isa.rvf || ix >= 32 {
            return false;
        }
        self.fp_regs.poke_bits(ix, value);
        true
    }

    pub fn peek_cst_reg(&self, ix: u8) -> Option<u64> {
        (ix < 4).then(|| self.cst_regs.read(ix).to_u64())
    }

    pub fn peek_csr(&self, number: u16) -> Option<u64> {
        self.csr.peek(number).map(|v| v.to_u64())
    }

    /// Test-bench/debugger CSR write; modifies fields that are read-only to
    /// CSR instructions and refreshes the CSR-derived execution caches.
    pub fn poke_csr(&mut self, number: u16, value: u64) -> bool {
        let ok = self.csr.poke(number, W::from_u64(value));
        if !ok {
            return false;
        }
        match number {
            csr_index::dcsr => {
                if let Some(v) = self.csr.peek(csr_index::dcsr) {
                    self.dcsr_step = (v.to_u64() >> 2) & 1 == 1;
                    self.dcsr_step_ie = (v.to_u64() >> 11) & 1 == 1;
                }
            }
            csr_index::mgpmc => {
                if let Some(v) = self.csr.peek(csr_index::mgpmc) {
                    self.counters_on = v.to_u64() & 1 == 1;
                    self.prev_counters_on = self.counters_on;
                }
            }
            csr_index::misa => self.derive_extensions_from_misa(),
            _ => {}
        }
        true
    }

    /// Read memory without side effects, trying the data space first and
    /// the instruction space second. Returns None when both fail.
    pub fn peek_memory(&mut self, addr: u64, size: u32) -> Option<u64> {
        if let Ok(v) = self.mem.read(addr, size) {
            return Some(v);
        }
        match size {
            4 => self.mem.read_inst_word(addr).map(|v| v as u64),
            2 => self.mem.read_inst_half(addr).map(|v| v as u64),
            _ => None,
        }
    }

    /// Write memory without side effects. A poke landing inside the
    /// reserved range kills the LR reservation.
    pub fn poke_memory(&mut self, addr: u64, value: u64, size: u32) -> bool {
        if self.has_lr
            && addr < self.lr_addr + self.lr_size as u64
            && addr + size as u64 > self.lr_addr
        {
            self.has_lr = false;
        }
        self.mem.poke(addr, value, size)
    }

    pub fn memory(&mut self) -> &mut dyn Memory {
        &mut *self.mem
    }

    // ------------------------------------------------------------------
    // NMI plumbing.
    // ------------------------------------------------------------------

    pub fn set_pending_nmi(&mut self, cause: NmiCause) {
        // The first NMI latches the cause; it is sticky until acknowledged.
        if !self.nmi_pending {
            self.nmi_cause = cause;
        }
        self.nmi_pending = true;

        if let Some(v) = self.csr.peek(csr_index::dcsr) {
            self.csr
                .poke(csr_index::dcsr, v | W::from_u64(1 << 3)); // nmip
            self.csr.record_write(csr_index::dcsr);
        }
    }

    pub fn clear_pending_nmi(&mut self) {
        self.nmi_pending = false;
        self.nmi_cause = NmiCause::Unknown;
        // Acknowledging the NMI unlocks MDSEAC.
        self.csr.lock_mdseac(false);

        if let Some(v) = self.csr.peek(csr_index::dcsr) {
            self.csr
                .poke(csr_index::dcsr, v & !W::from_u64(1 << 3));
            self.csr.record_write(csr_index::dcsr);
        }
    }

    // ------------------------------------------------------------------
    // Debug mode.
    // ------------------------------------------------------------------

    pub(crate) fn enter_debug_mode(&mut self, cause: DebugModeCause, pc: W) {
        // Entering debug mode loses the LR reservation.
        self.has_lr = false;

        if self.debug_mode {
            if self.debug_step_mode {
                self.debug_step_mode = false;
            } else {
                log::error!("Entering debug-halt while in debug-halt");
            }
        } else {
            self.debug_mode = true;
            if self.debug_step_mode {
                log::error!("Entering debug-halt with debug-step set");
            }
            self.debug_step_mode = false;
        }

        if let Some(v) = self.csr.peek(csr_index::dcsr) {
            let mut v = v.to_u64();
            v &= !(7 << 6);
            v |= (cause as u64) << 6;
            if self.nmi_pending {
                v |= 1 << 3;
            }
            self.csr.poke(csr_index::dcsr, W::from_u64(v));
            self.csr.poke(csr_index::dpc, pc);
        }
    }

    pub fn exit_debug_mode(&mut self) {
        if !self.debug_mode {
            log::error!("Exit-debug received while not in debug mode");
            return;
        }
        if self.debug_step_mode {
            self.debug_step_mode = false;
        } else {
            self.debug_mode = false;
        }
    }

    pub fn in_debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn privilege_mode(&self) -> PrivilegeMode {
        self.priv_mode
    }

    // ------------------------------------------------------------------
    // Region attributes.
    // ------------------------------------------------------------------

    /// A region is idempotent (no read/write side effects) unless the MRAC
    /// side-effect bit for it is set and it has no closely-coupled memory.
    pub(crate) fn is_idempotent_region(&self, addr: u64) -> bool {
        let region = self.mem.region_index(addr);
        if let Some(mrac) = self.csr.peek(csr_index::mrac) {
            let bit = (mrac.to_u64() >> (region * 2 + 1)) & 1;
            return bit == 0 || self.mem.region_has_local_mem(region);
        }
        true
    }

    /// Misaligned accesses raise an address-misaligned exception when they
    /// cross a region boundary or touch a non-idempotent region.
    pub(crate) fn misaligned_access_causes_exception(&self, addr: u64, size: u32) -> bool {
        let addr2 = addr + size as u64 - 1;
        if self.mem.region_index(addr) != self.mem.region_index(addr2) {
            return true;
        }
        !self.is_idempotent_region(addr) || !self.is_idempotent_region(addr2)
    }

    /// Effective address and base register disagree on local-memory-ness.
    pub(crate) fn effective_and_base_addr_mismatch(&self, base: u64, addr: u64) -> bool {
        let base_region = self.mem.region_index(base);
        let addr_region = self.mem.region_index(addr);
        if base_region == addr_region {
            return false;
        }
        self.mem.region_has_local_data_mem(base_region)
            != self.mem.region_has_local_data_mem(addr_region)
    }

    // ------------------------------------------------------------------
    // CSR helpers for the trap unit and executor.
    // ------------------------------------------------------------------

    pub(crate) fn read_csr_m(&self, number: u16) -> W {
        self.csr
            .read(number, PrivilegeMode::Machine, self.debug_mode)
            .unwrap_or_else(|| panic!("Mandatory CSR {:#x} not readable", number))
    }

    pub(crate) fn write_csr_m(&mut self, number: u16, value: W) {
        if !self
            .csr
            .write(number, PrivilegeMode::Machine, self.debug_mode, value)
        {
            panic!("Failed to write mandatory CSR {:#x}", number);
        }
    }

    pub(crate) fn clear_trace_data(&mut self) {
        self.int_regs.clear_last_written();
        self.fp_regs.clear_last_written();
        self.cst_regs.clear_last_written();
        self.csr.clear_last_written();
        self.mem.clear_last_write();
    }

    // ------------------------------------------------------------------
    // Console.
    // ------------------------------------------------------------------

    pub(crate) fn console_put_byte(&mut self, byte: u8) {
        match &mut self.console_out {
            Some(out) => {
                let _ = out.write_all(&[byte]);
            }
            None => {
                let _ = std::io::stdout().write_all(&[byte]);
            }
        }
    }

    pub(crate) fn console_get_byte(&mut self) -> i64 {
        let mut buf = [0u8; 1];
        let got = match &mut self.console_in {
            Some(input) => input.read(&mut buf),
            None => std::io::stdin().read(&mut buf),
        };
        match got {
            Ok(1) => buf[0] as i64,
            _ => -1, // EOF
        }
    }

    pub(crate) fn console_read(&mut self, buf: &mut [u8]) -> usize {
        let got = match &mut self.console_in {
            Some(input) => input.read(buf),
            None => std::io::stdin().read(buf),
        };
        got.unwrap_or(0)
    }

    pub(crate) fn console_write(&mut self, buf: &[u8]) -> usize {
        let ok = match &mut self.console_out {
            Some(out) => out.write_all(buf).is_ok(),
            None => std::io::stdout().write_all(buf).is_ok(),
        };
        if ok {
            buf.len()
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::SimpleMemory;

    fn new_hart() -> Hart<u32> {
        Hart::new(0, Box::new(SimpleMemory::new()))
    }

    #[test]
    fn test_misa_reset_value() {
        let hart = new_hart();
        let misa = hart.peek_csr(csr_index::misa).unwrap();
        // a, c, d, f, i, m, s, u bits plus mxl=1.
        assert_eq!(misa & 1, 1); // a
        assert_eq!((misa >> 2) & 1, 1); // c
        assert_eq!((misa >> 3) & 1, 1); // d
        assert_eq!((misa >> 5) & 1, 1); // f
        assert_eq!((misa >> 8) & 1, 1); // i
        assert_eq!((misa >> 12) & 1, 1); // m
        assert_eq!((misa >> 18) & 1, 1); // s
        assert_eq!((misa >> 20) & 1, 1); // u
        assert_eq!(misa >> 30, 1); // mxl
        assert!(hart.isa.rvf && hart.isa.rvd && hart.isa.rva && hart.isa.rvc);
        assert!(!hart.isa.zbmini);
    }

    #[test]
    fn test_d_requires_f() {
        let hart: Hart<u32> = Hart::with_extensions(0, Box::new(SimpleMemory::new()), "d");
        assert!(!hart.isa.rvd);
        assert!(!hart.isa.rvf);
    }

    #[test]
    fn test_mhartid_constant() {
        let mut hart: Hart<u32> = Hart::with_extensions(7, Box::new(SimpleMemory::new()), "imc");
        assert_eq!(hart.peek_csr(csr_index::mhartid), Some(7));
        // Read-only to CSR instructions; a forced write changes nothing.
        assert!(!hart
            .csr
            .is_writeable(csr_index::mhartid, PrivilegeMode::Machine, false));
        hart.csr
            .write(csr_index::mhartid, PrivilegeMode::Machine, false, 99);
        assert_eq!(hart.peek_csr(csr_index::mhartid), Some(7));
    }

    #[test]
    fn test_tied_counters_follow_increments() {
        let mut hart = new_hart();
        hart.bump_retired(3);
        hart.bump_cycles(5);
        assert_eq!(hart.peek_csr(csr_index::minstret), Some(3));
        assert_eq!(hart.peek_csr(csr_index::mcycle), Some(5));
        assert_eq!(hart.peek_csr(csr_index::instret), Some(3));
        // Writing the CSR writes through to the live counter.
        hart.poke_csr(csr_index::minstret, 100);
        assert_eq!(hart.retired_insts(), 100);
    }

    #[test]
    fn test_nmi_latch_is_sticky() {
        let mut hart = new_hart();
        hart.set_pending_nmi(NmiCause::StoreException);
        hart.set_pending_nmi(NmiCause::LoadException);
        assert_eq!(hart.nmi_cause, NmiCause::StoreException);
        // DCSR.nmip mirrors the pending flag.
        assert_eq!(hart.peek_csr(csr_index::dcsr).unwrap() >> 3 & 1, 1);
        hart.clear_pending_nmi();
        assert_eq!(hart.peek_csr(csr_index::dcsr).unwrap() >> 3 & 1, 0);
        assert_eq!(hart.nmi_cause, NmiCause::Unknown);
    }

    #[test]
    fn test_poke_memory_kills_reservation() {
        let mut hart = new_hart();
        hart.has_lr = true;
        hart.lr_addr = 0x8000_0100;
        hart.lr_size = 4;
        // Poke outside the reserved range keeps it.
        hart.poke_memory(0x8000_0104, 1, 4);
        assert!(hart.has_lr);
        // Overlapping byte kills it.
        hart.poke_memory(0x8000_0103, 1, 1);
        assert!(!hart.has_lr);
    }

    #[test]
    fn test_peek_memory_fails_when_unmapped() {
        let mut hart = new_hart();
        assert_eq!(hart.peek_memory(0x1000, 4), None);
        hart.poke_memory(0x8000_0000, 0xAB, 1);
        assert_eq!(hart.peek_memory(0x8000_0000, 1), Some(0xAB));
    }

    #[test]
    fn test_reset_twice_identical() {
        let mut hart = new_hart();
        hart.poke_int_reg(5, 77);
        hart.bump_retired(9);
        hart.reset(true);
        let pc1 = hart.peek_pc();
        let minstret1 = hart.peek_csr(csr_index::minstret);
        hart.reset(true);
        assert_eq!(hart.peek_pc(), pc1);
        assert_eq!(hart.peek_csr(csr_index::minstret), minstret1);
        assert_eq!(hart.peek_int_reg(5), Some(0));
    }
}
