//! The fetch/decode/execute stepper and its run loops.

use std::io::Write;
use std::time::Instant;

use crate::isa::riscv::csr_reg::csr_index;
use crate::isa::riscv::csr_reg::perf::EventNumber;
use crate::isa::riscv::decoder::{self, is_compressed};
use crate::isa::riscv::hart::{DebugModeCause, Hart};
use crate::isa::riscv::instruction::{
    exec_mapping, DecodedInst, InstrCategory, InstrId, OperandKind,
};
use crate::isa::riscv::trap::trap_controller::TrapController;
use crate::isa::riscv::trap::{ExceptionCause, InterruptCause, StopReason};
use crate::isa::riscv::triggers::TriggerTiming;
use crate::trace::{write_trace_records, TraceRecord, TraceRecords, OUTPUT_MUTEX};
use crate::utils::Word;

impl<W: Word> Hart<W> {
    /// Read the instruction at `addr` without architectural side effects.
    pub(crate) fn read_inst(&mut self, addr: u64) -> Option<u32> {
        if let Some(word) = self.mem.read_inst_word(addr) {
            return Some(word);
        }
        self.mem.read_inst_half(addr).map(|half| half as u32)
    }

    /// Fetch the instruction at `addr`, initiating the architectural
    /// exception on failure.
    fn fetch_inst(&mut self, addr: W) -> Option<u32> {
        if self.force_fetch_fail {
            self.force_fetch_fail = false;
            let info = self.pc.to_u64().wrapping_add(self.force_fetch_fail_offset);
            let pc = self.pc;
            TrapController::initiate_exception(
                self,
                ExceptionCause::InstAccessFault,
                pc,
                W::from_u64(info),
            );
            return None;
        }

        if addr.to_u64() & 1 != 0 {
            TrapController::initiate_exception(
                self,
                ExceptionCause::InstAddrMisaligned,
                addr,
                addr,
            );
            return None;
        }

        if let Some(word) = self.mem.read_inst_word(addr.to_u64()) {
            return Some(word);
        }

        let Some(half) = self.mem.read_inst_half(addr.to_u64()) else {
            TrapController::initiate_exception(self, ExceptionCause::InstAccessFault, addr, addr);
            return None;
        };

        if is_compressed(half as u32) {
            return Some(half as u32);
        }

        // A full-size instruction whose first parcel reads but whose second
        // does not: the fault is in the second half.
        TrapController::initiate_exception(
            self,
            ExceptionCause::InstAccessFault,
            addr,
            addr.wrapping_add(W::from_u64(2)),
        );
        None
    }

    /// Fetch with a pre-execute trigger already tripped: a fetch failure
    /// takes the pending trigger action instead of a fetch exception.
    fn fetch_inst_post_trigger(
        &mut self,
        addr: W,
        trace: &mut Option<&mut dyn Write>,
    ) -> Option<u32> {
        if !self.force_fetch_fail && addr.to_u64() & 1 == 0 {
            if let Some(word) = self.mem.read_inst_word(addr.to_u64()) {
                return Some(word);
            }
            if let Some(half) = self.mem.read_inst_half(addr.to_u64()) {
                if is_compressed(half as u32) {
                    return Some(half as u32);
                }
            }
        }

        self.take_trigger_action(trace, addr, addr, true);
        self.force_fetch_fail = false;
        None
    }

    /// Illegal-instruction entry: watchdog plus the architectural trap. The
    /// faulting encoding goes into MTVAL.
    pub(crate) fn illegal_inst(&mut self) -> Result<(), StopReason> {
        if self.trigger_tripped {
            return Ok(());
        }

        // A program stuck without an illegal-instruction handler spins
        // here; stop after 64 illegal ops with no retirement in between.
        if self.counter_at_last_illegal == self.retired_insts() {
            self.consecutive_illegal_count += 1;
        } else {
            self.consecutive_illegal_count = 0;
        }
        if self.consecutive_illegal_count > 64 {
            return Err(StopReason::IllegalStall);
        }
        self.counter_at_last_illegal = self.retired_insts();

        let inst = self.read_inst(self.current_pc.to_u64()).unwrap_or(0);
        let pc = self.current_pc;
        TrapController::initiate_exception(
            self,
            ExceptionCause::IllegalInst,
            pc,
            W::from_u64(inst as u64),
        );
        Ok(())
    }

    pub(crate) fn debug_stop_count(&self) -> bool {
        if !self.debug_mode {
            return false;
        }
        match self.peek_csr(csr_index::dcsr) {
            Some(v) => (v >> 10) & 1 == 1,
            None => false,
        }
    }

    /// Undo the speculative register write of an instruction whose trigger
    /// tripped, and restore the pc.
    fn undo_for_trigger(&mut self) {
        if let Some((ix, prev)) = self.int_regs.last_written_with_prev() {
            self.int_regs.poke(ix, prev);
        }
        self.int_regs.clear_last_written();
        self.pc = self.current_pc;
    }

    /// Act on a tripped trigger: enter debug mode or take a breakpoint
    /// exception. Returns true when debug mode was entered.
    fn take_trigger_action(
        &mut self,
        trace: &mut Option<&mut dyn Write>,
        pc: W,
        info: W,
        before_timing: bool,
    ) -> bool {
        let entered_debug = if self.triggers.has_enter_debug_mode_tripped() {
            self.enter_debug_mode(DebugModeCause::Trigger, pc);
            true
        } else {
            TrapController::initiate_exception(self, ExceptionCause::Breakpoint, pc, info);
            if self.dcsr_step {
                let new_pc = self.pc;
                self.enter_debug_mode(DebugModeCause::Trigger, new_pc);
            }
            false
        };

        if before_timing {
            if let Some(out) = trace.as_deref_mut() {
                let inst = self.read_inst(self.current_pc.to_u64()).unwrap_or(0);
                self.print_inst_trace(inst, out, false);
            }
            self.clear_trace_data();
        }

        entered_debug
    }

    // ------------------------------------------------------------------
    // Interrupt polling.
    // ------------------------------------------------------------------

    /// Highest-priority pending-and-enabled interrupt, if any may be taken.
    fn is_interrupt_possible(&self) -> Option<InterruptCause> {
        if self.debug_mode && !self.debug_step_mode {
            return None;
        }
        if !self.is_interrupt_enabled() {
            return None;
        }

        let mip = self.peek_csr(csr_index::mip)?;
        let mie = self.peek_csr(csr_index::mie)?;
        let pending = mip & mie;
        if pending == 0 {
            return None;
        }

        // Priority: external, local, software, timer, internal timers.
        for cause in [
            InterruptCause::MachineExternal,
            InterruptCause::MachineLocal,
            InterruptCause::MachineSoftware,
            InterruptCause::MachineTimer,
            InterruptCause::MachineIntTimer0,
            InterruptCause::MachineIntTimer1,
        ] {
            if pending & (1 << u32::from(cause)) != 0 {
                return Some(cause);
            }
        }
        None
    }

    /// Take a pending NMI (highest precedence) or maskable interrupt.
    /// Returns true when one was taken; the interrupted instruction gets a
    /// trace line marked `(interrupted)`.
    fn process_external_interrupt(&mut self, trace: &mut Option<&mut dyn Write>) -> bool {
        if self.debug_step_mode && !self.dcsr_step_ie {
            return false;
        }

        if self.nmi_pending {
            let cause = self.nmi_cause;
            let pc = self.pc;
            TrapController::initiate_nmi(self, u32::from(cause) as u64, pc);
            self.nmi_pending = false;
            self.nmi_cause = crate::isa::riscv::trap::NmiCause::Unknown;

            if let Some(out) = trace.as_deref_mut() {
                let inst = self.read_inst(self.current_pc.to_u64()).unwrap_or(0);
                self.print_inst_trace(inst, out, true);
            }
            self.clear_trace_data();
            return true;
        }

        if let Some(cause) = self.is_interrupt_possible() {
            let pc = self.pc;
            TrapController::initiate_interrupt(self, cause, pc);
            if let Some(out) = trace.as_deref_mut() {
                let inst = self.read_inst(self.current_pc.to_u64()).unwrap_or(0);
                self.print_inst_trace(inst, out, true);
            }
            self.clear_trace_data();
            self.bump_cycles(1);
            return true;
        }

        false
    }

    // ------------------------------------------------------------------
    // Statistics and performance counters.
    // ------------------------------------------------------------------

    fn update_performance_counters(&mut self, inst: u32, decoded: &DecodedInst) {
        if !(self.enable_counters && self.prev_counters_on) {
            return;
        }

        // Trapping instructions do not count, except ecall/ebreak.
        if self.has_exception
            && !matches!(decoded.id, InstrId::ECALL | InstrId::EBREAK)
        {
            return;
        }

        self.perf.update_counters(EventNumber::InstCommitted);
        if is_compressed(inst) {
            self.perf.update_counters(EventNumber::Inst16Committed);
        } else {
            self.perf.update_counters(EventNumber::Inst32Committed);
        }
        if self.current_pc.to_u64() & 3 == 0 {
            self.perf.update_counters(EventNumber::InstAligned);
        }

        match decoded.id {
            InstrId::EBREAK => self.perf.update_counters(EventNumber::Ebreak),
            InstrId::ECALL => self.perf.update_counters(EventNumber::Ecall),
            InstrId::FENCE => self.perf.update_counters(EventNumber::Fence),
            InstrId::FENCE_I => self.perf.update_counters(EventNumber::Fencei),
            InstrId::MRET => self.perf.update_counters(EventNumber::Mret),
            InstrId::LR_W | InstrId::LR_D => self.perf.update_counters(EventNumber::Lr),
            InstrId::SC_W | InstrId::SC_D => self.perf.update_counters(EventNumber::Sc),
            _ => match decoded.info().category {
                InstrCategory::Int => self.perf.update_counters(EventNumber::Alu),
                InstrCategory::Mul => self.perf.update_counters(EventNumber::Mul),
                InstrCategory::Div => self.perf.update_counters(EventNumber::Div),
                InstrCategory::Load => {
                    self.perf.update_counters(EventNumber::Load);
                    if self.misaligned_ld_st {
                        self.perf.update_counters(EventNumber::MisalignLoad);
                    }
                }
                InstrCategory::Store => {
                    self.perf.update_counters(EventNumber::Store);
                    if self.misaligned_ld_st {
                        self.perf.update_counters(EventNumber::MisalignStore);
                    }
                }
                InstrCategory::Atomic => self.perf.update_counters(EventNumber::Atomic),
                InstrCategory::Branch => {
                    self.perf.update_counters(EventNumber::Branch);
                    if self.last_branch_taken {
                        self.perf.update_counters(EventNumber::BranchTaken);
                    }
                }
                InstrCategory::Csr => {
                    let (read, write) = match decoded.id {
                        InstrId::CSRRW | InstrId::CSRRWI => {
                            (decoded.ops.slot(0) != 0, true)
                        }
                        _ => (true, decoded.ops.slot(1) != 0),
                    };
                    match (read, write) {
                        (true, true) => self.perf.update_counters(EventNumber::CsrReadWrite),
                        (true, false) => self.perf.update_counters(EventNumber::CsrRead),
                        (false, true) => self.perf.update_counters(EventNumber::CsrWrite),
                        (false, false) => {}
                    }
                }
                _ => {}
            },
        }
    }

    fn accumulate_instruction_stats(&mut self, inst: u32, decoded: &DecodedInst) {
        self.update_performance_counters(inst, decoded);
        // The MGPMC counter-enable takes effect one instruction late.
        self.prev_counters_on = self.counters_on;

        if !self.instr_freq_enabled {
            return;
        }

        let info = decoded.info();
        let mut vals = [None, None];
        let mut n = 0;
        for i in 1..4 {
            if n >= 2 {
                break;
            }
            match info.operands[i].kind {
                OperandKind::IntReg if info.operands[i].mode.is_read() => {
                    vals[n] = Some(self.int_regs.read(decoded.ops.slot(i) as u8).to_u64());
                    n += 1;
                }
                OperandKind::FpReg if info.operands[i].mode.is_read() => {
                    vals[n] = Some(self.fp_regs.read_bits(decoded.ops.slot(i) as u8));
                    n += 1;
                }
                OperandKind::Imm => {
                    vals[n] = Some(decoded.ops.slot(i) as u64);
                    n += 1;
                }
                _ => {}
            }
        }
        self.stats.record(decoded.id, vals[0], vals[1]);
    }

    // ------------------------------------------------------------------
    // Trace emission.
    // ------------------------------------------------------------------

    fn print_inst_trace(&mut self, inst: u32, out: &mut dyn Write, interrupted: bool) {
        let decoded = decoder::decode::<W>(inst, &self.isa);
        let mut disasm = decoded.id.name().to_string();
        if interrupted {
            disasm += " (interrupted)";
        }
        if self.trace_load && self.load_addr_valid {
            disasm += &format!(" [{:#x}]", self.load_addr);
        }

        let mut records = TraceRecords::new();

        if let Some(reg) = self.int_regs.last_written() {
            records.push(TraceRecord {
                resource: 'r',
                addr: reg as u64,
                value: self.int_regs.read(reg).to_u64(),
            });
        }

        if let Some(reg) = self.fp_regs.last_written() {
            records.push(TraceRecord {
                resource: 'f',
                addr: reg as u64,
                value: self.fp_regs.read_bits(reg),
            });
        }

        // CSR diffs; trigger words are encoded as (trigger << 16) | csr.
        let (csrs, triggers) = {
            let (a, b) = self.csr.last_written_regs();
            (a.to_vec(), b.to_vec())
        };
        let mut csr_records: Vec<(u64, u64)> = Vec::new();
        for num in csrs {
            if (csr_index::tdata1..=csr_index::tdata3).contains(&num) {
                continue; // Reported through the trigger encoding below.
            }
            if let Some(value) = self.peek_csr(num) {
                csr_records.push((num as u64, value));
            }
        }
        for (trigger_ix, num) in triggers {
            let which = num - csr_index::tdata1 + 1;
            if let Some(value) = self.triggers.read_tdata(trigger_ix, which as u32) {
                let encoded = ((trigger_ix as u64) << 16) | num as u64;
                csr_records.push((encoded, value));
            }
        }
        csr_records.sort_unstable();
        for (addr, value) in csr_records {
            records.push(TraceRecord {
                resource: 'c',
                addr,
                value,
            });
        }

        if let Some((addr, value, _size)) = self.mem.last_write_new_value() {
            records.push(TraceRecord {
                resource: 'm',
                addr,
                value,
            });
        }

        write_trace_records(
            out,
            self.counter,
            self.hart_id,
            self.current_pc.to_u64(),
            inst,
            W::XLEN,
            &records,
            &disasm,
        );
    }

    // ------------------------------------------------------------------
    // The stepper.
    // ------------------------------------------------------------------

    /// One full-featured step. Returns whether debug mode was entered;
    /// stop/exit conditions propagate as errors.
    fn step_full(&mut self, trace: &mut Option<&mut dyn Write>) -> Result<bool, StopReason> {
        self.current_pc = self.pc;
        self.load_addr_valid = false;
        self.trigger_tripped = false;
        self.has_exception = false;
        self.ebreak_inst_debug = false;
        self.last_branch_taken = false;
        self.misaligned_ld_st = false;
        self.mem.clear_last_write();

        self.counter += 1;

        if self.process_external_interrupt(trace) {
            return Ok(false); // Next instruction runs in the handler.
        }

        // Pre-execute address trigger, then fetch.
        let has_trig = self.enable_triggers && self.triggers.has_active_inst_trigger();
        if has_trig {
            let ie = self.is_interrupt_enabled();
            let pc = self.pc.to_u64();
            if self
                .triggers
                .inst_addr_trigger_hit(pc, TriggerTiming::Before, ie)
            {
                self.trigger_tripped = true;
            }
        }

        let inst = if self.trigger_tripped {
            let pc = self.pc;
            match self.fetch_inst_post_trigger(pc, trace) {
                Some(inst) => inst,
                None => {
                    self.bump_cycles(1);
                    return Ok(self.debug_mode);
                }
            }
        } else {
            let pc = self.pc;
            match self.fetch_inst(pc) {
                Some(inst) => inst,
                None => {
                    self.bump_cycles(1);
                    if let Some(out) = trace.as_deref_mut() {
                        self.print_inst_trace(0, out, false);
                    }
                    self.clear_trace_data();
                    if self.dcsr_step {
                        let pc = self.pc;
                        self.enter_debug_mode(DebugModeCause::Step, pc);
                        return Ok(true);
                    }
                    return Ok(false); // Next instruction in trap handler.
                }
            }
        };

        // Pre-execute opcode trigger.
        if has_trig {
            let ie = self.is_interrupt_enabled();
            if self
                .triggers
                .inst_opcode_trigger_hit(inst, TriggerTiming::Before, ie)
            {
                self.trigger_tripped = true;
            }
        }

        // Advance the pc past the instruction and execute.
        let step = if inst & 3 == 3 { 4 } else { 2 };
        self.pc = self.pc.wrapping_add(W::from_u64(step));
        let decoded = decoder::decode::<W>(inst, &self.isa);

        let exec_result = exec_mapping::execute(self, &decoded);
        self.bump_cycles(1);

        if let Err(stop) = exec_result {
            if let Some(out) = trace.as_deref_mut() {
                self.print_inst_trace(inst, out, false);
            }
            self.clear_trace_data();
            return Err(stop);
        }

        let do_stats = self.instr_freq_enabled || self.enable_counters;

        if self.has_exception {
            if do_stats {
                self.accumulate_instruction_stats(inst, &decoded);
            }
            if let Some(out) = trace.as_deref_mut() {
                self.print_inst_trace(inst, out, false);
            }
            self.clear_trace_data();
            if self.dcsr_step && !self.ebreak_inst_debug {
                let pc = self.pc;
                self.enter_debug_mode(DebugModeCause::Step, pc);
                return Ok(true);
            }
            return Ok(false);
        }

        if self.trigger_tripped {
            self.undo_for_trigger();
            let pc = self.current_pc;
            let entered = self.take_trigger_action(trace, pc, pc, true);
            return Ok(entered);
        }

        if !self.debug_stop_count() {
            self.bump_retired(1);
        }

        if do_stats {
            self.accumulate_instruction_stats(inst, &decoded);
        }

        // Retirement-time load-queue maintenance: a consumed source operand
        // implies the hardware waited for the matching load; a written
        // register invalidates older in-flight loads of it.
        if self.load_queue_enabled && !decoded.info().is_load() {
            let info = decoded.info();
            for reg in decoded.ops.int_reg_sources(info) {
                self.remove_from_load_queue(reg);
            }
            if let Some(reg) = self.int_regs.last_written() {
                if reg != 0 {
                    self.invalidate_in_load_queue(reg);
                }
            }
        }

        if let Some(out) = trace.as_deref_mut() {
            self.print_inst_trace(inst, out, false);
        }
        self.clear_trace_data();

        // Post-execute instruction-count trigger.
        if self.enable_triggers && self.is_interrupt_enabled() && self.triggers.icount_trigger_hit()
        {
            let pc = self.pc;
            let entered = self.take_trigger_action(trace, pc, pc, false);
            return Ok(entered);
        }

        if self.dcsr_step && !self.ebreak_inst_debug {
            let pc = self.pc;
            self.enter_debug_mode(DebugModeCause::Step, pc);
            return Ok(true);
        }

        Ok(false)
    }

    /// Single-step once (follow-me/debug mode). Stop conditions are
    /// reported and latched rather than returned.
    pub fn single_step(&mut self, mut trace: Option<&mut dyn Write>) {
        if let Err(stop) = self.step_full(&mut trace) {
            self.report_stop(&stop);
        }
    }

    fn report_stop(&mut self, stop: &StopReason) -> bool {
        let _guard = OUTPUT_MUTEX.lock().unwrap();
        self.target_program_finished = true;
        match stop {
            StopReason::ToHost(value) => {
                let success = *value == 1;
                eprintln!(
                    "{}stop: write to to-host: {}",
                    if success { "Successful " } else { "Error: Failed " },
                    value
                );
                success
            }
            StopReason::Exit(code) => {
                eprintln!("Target program exited with code {}", code);
                *code == 0
            }
            StopReason::IllegalStall => {
                eprintln!("Error: Failed stop: 64 consecutive illegal instructions");
                false
            }
        }
    }

    /// Step until the pc reaches `address`, the instruction-count limit is
    /// hit, the user interrupts, or the program stops.
    pub fn until_address(&mut self, address: u64, mut trace: Option<&mut dyn Write>) -> bool {
        self.clear_trace_data();

        while self.pc.to_u64() != address && self.counter < self.inst_count_limit && crate::user_ok()
        {
            match self.step_full(&mut trace) {
                Ok(entered_debug) => {
                    if entered_debug {
                        return true;
                    }
                }
                Err(stop) => {
                    if let Some(out) = trace.as_deref_mut() {
                        let inst = self.read_inst(self.current_pc.to_u64()).unwrap_or(0);
                        self.print_inst_trace(inst, out, false);
                        self.clear_trace_data();
                    }
                    return self.report_stop(&stop);
                }
            }
        }
        true
    }

    /// [`Hart::until_address`] plus the instructions-per-second report.
    pub fn run_until_address(&mut self, address: u64, trace: Option<&mut dyn Write>) -> bool {
        crate::set_user_ok(true);
        let start = Instant::now();
        let retired0 = self.retired_insts();

        let success = self.until_address(address, trace);

        if self.counter >= self.inst_count_limit {
            eprintln!("Stopped -- Reached instruction limit");
        } else if self.pc.to_u64() == address {
            eprintln!("Stopped -- Reached end address");
        }

        report_insts_per_sec(
            self.retired_insts() - retired0,
            start.elapsed().as_secs_f64(),
            !crate::user_ok(),
        );
        success
    }

    /// Fast path: fetch/execute/retire only. No triggers, counters, trace
    /// or limit checks.
    fn simple_run(&mut self) -> bool {
        while crate::user_ok() {
            self.current_pc = self.pc;
            self.bump_cycles(1);
            self.has_exception = false;
            self.mem.clear_last_write();

            let pc = self.pc;
            let Some(inst) = self.fetch_inst(pc) else {
                continue; // Next instruction in trap handler.
            };

            let step = if inst & 3 == 3 { 4 } else { 2 };
            self.pc = self.pc.wrapping_add(W::from_u64(step));

            let decoded = decoder::decode::<W>(inst, &self.isa);
            match exec_mapping::execute(self, &decoded) {
                Ok(()) => {
                    if !self.has_exception {
                        self.bump_retired(1);
                    }
                }
                Err(stop) => {
                    if matches!(stop, StopReason::ToHost(_)) {
                        self.bump_retired(1);
                    }
                    return self.report_stop(&stop);
                }
            }
        }
        true
    }

    /// Run indefinitely. With a to-host address defined a write there stops
    /// the run; otherwise the stop address (if any) does. Feature toggles
    /// route to the slower full-featured loop.
    pub fn run(&mut self, trace: Option<&mut dyn Write>) -> bool {
        if let (Some(stop_addr), None) = (self.stop_addr, self.to_host) {
            return self.run_until_address(stop_addr, trace);
        }

        let featured = trace.is_some()
            || self.inst_count_limit != u64::MAX
            || self.instr_freq_enabled
            || self.enable_triggers
            || self.enable_counters;
        if featured {
            // An odd stop pc is unreachable: pc bit zero is always clear.
            return self.run_until_address(W::MAX.to_u64(), trace);
        }

        crate::set_user_ok(true);
        let start = Instant::now();
        let retired0 = self.retired_insts();
        let success = self.simple_run();
        report_insts_per_sec(
            self.retired_insts() - retired0,
            start.elapsed().as_secs_f64(),
            !crate::user_ok(),
        );
        success
    }
}

/// Report the retired-instruction count and simulation rate.
fn report_insts_per_sec(count: u64, elapsed: f64, interrupted: bool) {
    let _guard = OUTPUT_MUTEX.lock().unwrap();
    if interrupted {
        eprintln!("Keyboard interrupt");
    }
    if elapsed > 0.0 {
        eprintln!(
            "Retired {} instruction{} in {:.2}s  {} inst/s",
            count,
            if count == 1 { "" } else { "s" },
            elapsed,
            (count as f64 / elapsed) as u64
        );
    } else {
        eprintln!(
            "Retired {} instruction{}",
            count,
            if count == 1 { "" } else { "s" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::riscv::cpu_tester::*;
    use crate::isa::riscv::csr_reg::PrivilegeMode;
    use crate::isa::riscv::instruction::Operands;

    const IRQ_HANDLER_ADDR: u64 = 0x8000_2000;

    #[test]
    fn test_exec_arith() {
        let mut tester = ExecTester::new();

        run_test_exec::<u32, _, _>(
            InstrId::ADDI,
            Operands::I { rd: 2, rs1: 3, imm: -5 },
            |builder| builder.reg(3, 10).pc(0x2000),
            |checker| checker.reg(2, 5).pc(0x2004),
        );

        for _ in 1..=100 {
            tester.test_rand_r(InstrId::ADD, |lhs, rhs| lhs.wrapping_add(rhs));
            tester.test_rand_r(InstrId::SUB, |lhs, rhs| lhs.wrapping_sub(rhs));
            tester.test_rand_i(InstrId::ADDI, |lhs, imm| lhs.wrapping_add(imm as u32));
            tester.test_rand_r(InstrId::XOR, |lhs, rhs| lhs ^ rhs);
            tester.test_rand_r(InstrId::SLT, |lhs, rhs| ((lhs as i32) < (rhs as i32)) as u32);
            tester.test_rand_r(InstrId::SLTU, |lhs, rhs| (lhs < rhs) as u32);
            tester.test_rand_r(InstrId::SLL, |lhs, rhs| lhs.wrapping_shl(rhs & 0x1F));
            tester.test_rand_r(InstrId::SRA, |lhs, rhs| {
                ((lhs as i32) >> (rhs & 0x1F)) as u32
            });
        }

        run_test_exec_decode::<u32, _, _>(
            0x02520333, // mul x6, x4, x5
            |builder| builder.reg(4, 5).reg(5, 10).pc(0x1000),
            |checker| checker.reg(6, 50).pc(0x1004),
        );
    }

    #[test]
    fn test_div_boundaries() {
        // INT_MIN / -1 wraps; division by zero gives all-ones/-1.
        run_test_exec::<u32, _, _>(
            InstrId::DIV,
            Operands::R { rd: 1, rs1: 2, rs2: 3 },
            |b| b.reg(2, 0x8000_0000).reg(3, 0xFFFF_FFFF),
            |c| c.reg(1, 0x8000_0000),
        );
        run_test_exec::<u32, _, _>(
            InstrId::REM,
            Operands::R { rd: 1, rs1: 2, rs2: 3 },
            |b| b.reg(2, 0x8000_0000).reg(3, 0xFFFF_FFFF),
            |c| c.reg(1, 0),
        );
        run_test_exec::<u32, _, _>(
            InstrId::DIVU,
            Operands::R { rd: 1, rs1: 2, rs2: 3 },
            |b| b.reg(2, 77).reg(3, 0),
            |c| c.reg(1, 0xFFFF_FFFF),
        );
        run_test_exec::<u32, _, _>(
            InstrId::REMU,
            Operands::R { rd: 1, rs1: 2, rs2: 3 },
            |b| b.reg(2, 77).reg(3, 0),
            |c| c.reg(1, 77),
        );
    }

    #[test]
    fn test_w_form_sign_extends() {
        // ADDW 0x7FFF_FFFF + 1 -> 0xFFFF_FFFF_8000_0000 on a 64-bit hart.
        run_test_exec::<u64, _, _>(
            InstrId::ADDW,
            Operands::R { rd: 1, rs1: 2, rs2: 3 },
            |b| b.reg(2, 0x7FFF_FFFF).reg(3, 1),
            |c| c.reg(1, 0xFFFF_FFFF_8000_0000),
        );
    }

    #[test]
    fn test_load_store_decode() {
        run_test_exec_decode::<u32, _, _>(
            0x00812183, // lw x3, 8(x2)
            |builder| builder.reg(2, BASE).mem_base(8, 123, 4).pc(0x1000),
            |checker| checker.reg(3, 123).pc(0x1004),
        );

        run_test_exec_decode::<u32, _, _>(
            0xFE112C23, // sw x1, -8(x2)
            |builder| builder.reg(2, BASE + 16).reg(1, 123),
            |checker| checker.mem_base(8, 123, 4),
        );

        // Sign extension of lb.
        run_test_exec_decode::<u32, _, _>(
            0x00010083, // lb x1, 0(x2)
            |builder| builder.reg(2, BASE).mem_base(0, 0x80, 1),
            |checker| checker.reg(1, 0xFFFF_FF80),
        );
    }

    #[test]
    fn test_branch_and_jump() {
        run_test_exec_decode::<u32, _, _>(
            0xF8C318E3, // bne x6, x12, -112
            |builder| builder.reg(6, 5).reg(12, 10).pc(0x2000),
            |checker| checker.pc(0x2000 - 112),
        );

        run_test_exec_decode::<u32, _, _>(
            0xF8C318E3, // bne x6, x12, -112 (not taken)
            |builder| builder.reg(6, 5).reg(12, 5).pc(0x2000),
            |checker| checker.pc(0x2004),
        );

        run_test_exec_decode::<u32, _, _>(
            0xF81FF06F, // jal x0, -128
            |builder| builder.pc(0x1234),
            |checker| checker.pc(0x1234 - 128),
        );

        run_test_exec_decode::<u32, _, _>(
            0x00078067, // jr a5
            |builder| builder.reg(15, 0x2468).pc(0x1234),
            |checker| checker.pc(0x2468),
        );
    }

    #[test]
    fn test_csr_ops() {
        // CSRRS x12, mtvec, x6
        run_test_exec_decode::<u32, _, _>(
            0x30532673,
            |builder| builder.reg(6, 0x00F0).csr(csr_index::mtvec, 0x0F00).pc(0x1000),
            |checker| checker.reg(12, 0x0F00).csr(csr_index::mtvec, 0x0FF0).pc(0x1004),
        );

        // CSRRC x13, mepc, x7
        run_test_exec_decode::<u32, _, _>(
            0x3413B6F3,
            |builder| builder.reg(7, 0x0FF0).csr(csr_index::mepc, 0x0FFE).pc(0x1000),
            |checker| checker.reg(13, 0x0FFE).csr(csr_index::mepc, 0x000E).pc(0x1004),
        );

        // CSRRWI x11, mcause, 5
        run_test_exec_decode::<u32, _, _>(
            0x3422D5F3,
            |builder| builder.csr(csr_index::mcause, 0xABCD).pc(0x1000),
            |checker| checker.reg(11, 0xABCD).csr(csr_index::mcause, 5).pc(0x1004),
        );

        // CSRRSI/CSRRCI with a zero immediate suppress the write.
        run_test_exec::<u32, _, _>(
            InstrId::CSRRSI,
            Operands::I { rd: 5, rs1: 0, imm: csr_index::mscratch as i32 },
            |builder| builder.csr(csr_index::mscratch, 0xAA),
            |checker| checker.reg(5, 0xAA).csr(csr_index::mscratch, 0xAA),
        );
    }

    #[test]
    fn test_csr_swap() {
        run_test_hart_step::<u32, _, _>(
            &[0x34011173], // csrrw sp, mscratch, sp
            |builder| builder.csr(csr_index::mscratch, 0x114514).reg(2, 0x0721),
            |checker| checker.csr(csr_index::mscratch, 0x0721).reg(2, 0x114514),
        );
    }

    #[test]
    fn test_minstret_write_compensation() {
        // Writing minstret takes effect in spite of the auto-increment:
        // after the write retires, minstret holds the written value + 1.
        run_test_hart_step::<u32, _, _>(
            &[0xB0209073], // csrrw x0, minstret, x1
            |builder| builder.reg(1, 100),
            |checker| checker.customized(|c| {
                assert_eq!(c.hart.retired_insts(), 100);
                c
            }),
        );
    }

    #[test]
    fn test_rv_f() {
        run_test_exec_decode::<u32, _, _>(
            0xE0068553, // fmv.x.w a0, fa3
            |builder| builder.reg_f32(13, 3.5),
            |checker| checker.reg(10, 0x40600000),
        );

        run_test_exec_decode::<u32, _, _>(
            0x00B576D3, // fadd.s fa3, fa0, fa1
            |builder| builder.reg_f32(10, 1.5).reg_f32(11, 2.25),
            |checker| checker.reg_f32(13, 3.75),
        );

        // inf - inf raises invalid and accrues NV into fcsr.
        run_test_exec_decode::<u32, _, _>(
            0x08B576D3, // fsub.s fa3, fa0, fa1
            |builder| builder.reg_f32(10, f32::INFINITY).reg_f32(11, f32::INFINITY),
            |checker| checker.csr(csr_index::fcsr, 0b10000),
        );

        run_test_exec_decode::<u32, _, _>(
            0xD0057553, // fcvt.s.w fa0, a0 (dynamic rounding)
            |builder| builder.reg(10, (-2i32) as u32 as u64),
            |checker| checker.reg_f32(10, -2.0),
        );

        run_test_exec_decode::<u32, _, _>(
            0xC0051553, // fcvt.w.s a0, fa0, rtz
            |builder| builder.reg_f32(10, -1.1),
            |checker| checker.reg(10, (-1i32) as u32 as u64).csr(csr_index::fflags, 1),
        );

        // Out of range saturates with NV.
        run_test_exec_decode::<u32, _, _>(
            0xC0051553, // fcvt.w.s a0, fa0, rtz
            |builder| builder.reg_f32(10, -3e9),
            |checker| checker.reg(10, 0x8000_0000).csr(csr_index::fflags, 0x10),
        );

        // fmv.w.x then fmv.x.w is the identity on bit patterns.
        run_test_exec::<u32, _, _>(
            InstrId::FMV_W_X,
            Operands::RRm { rd: 2, rs1: 9, rs2: 0, rm: 0 },
            |builder| builder.reg(9, 0xDEAD_BEEF),
            |checker| checker.customized(|c| {
                assert_eq!(c.hart.fp_regs.read_single(2), 0xDEAD_BEEF);
                c
            }),
        );
    }

    #[test]
    fn test_fp_reserved_rounding_is_illegal() {
        // fadd.s with rm=5 raises illegal instruction.
        let mut hart = TestHartBuilder::<u32>::new().build();
        hart.current_pc = hart.pc;
        let decoded = DecodedInst {
            id: InstrId::FADD_S,
            ops: Operands::RRm { rd: 1, rs1: 2, rs2: 3, rm: 5 },
        };
        exec_mapping::execute(&mut hart, &decoded).unwrap();
        assert!(hart.has_exception);
        assert_eq!(hart.peek_csr(csr_index::mcause), Some(2));
    }

    #[test]
    fn test_load_fault_traps() {
        run_test_hart_step::<u32, _, _>(
            &[0x00002503], // lw a0, 0(zero)
            |builder| builder.csr(csr_index::mtvec, IRQ_HANDLER_ADDR),
            |checker| {
                checker
                    .pc(IRQ_HANDLER_ADDR)
                    .csr(csr_index::mepc, BASE)
                    .csr(csr_index::mcause, 5)
            },
        );
    }

    #[test]
    fn test_misaligned_io_load_traps() {
        // Memory-mapped region at 0x1000_0000 marked non-idempotent via
        // MRAC; a misaligned word load there raises load-address-misaligned.
        run_test_hart_step::<u32, _, _>(
            &[0x00152183], // lw x3, 1(x10)
            |builder| {
                builder
                    .csr(csr_index::mtvec, IRQ_HANDLER_ADDR)
                    .csr(csr_index::mrac, 1 << 3)
                    .reg(10, 0x1000_0000)
            },
            |checker| {
                checker
                    .pc(IRQ_HANDLER_ADDR)
                    .csr(csr_index::mcause, 4)
                    .csr(csr_index::mtval, 0x1000_0001)
            },
        );
    }

    #[test]
    fn test_lr_sc_success_and_fail() {
        // lr.w x5,(x10); sc.w x6,x7,(x10)
        run_test_hart_step::<u32, _, _>(
            &[0x100522AF, 0x18752A2F],
            |builder| builder.reg(10, BASE + 0x100).reg(7, 42).mem_base(0x100, 7, 4),
            |checker| checker.reg(5, 7).reg(20, 0).mem_base(0x100, 42, 4),
        );

        // An intervening store to the reserved bytes makes the SC fail.
        run_test_hart_step::<u32, _, _>(
            &[
                0x100522AF, // lr.w x5, (x10)
                0x00B52023, // sw x11, 0(x10)
                0x18752A2F, // sc.w x20, x7, (x10)
            ],
            |builder| {
                builder
                    .reg(10, BASE + 0x100)
                    .reg(7, 42)
                    .reg(11, 9)
                    .mem_base(0x100, 7, 4)
            },
            |checker| checker.reg(20, 1).mem_base(0x100, 9, 4),
        );
    }

    #[test]
    fn test_trap_state_machine_and_mret_roundtrip() {
        use crate::isa::riscv::trap::trap_controller::StatusFields;

        run_test_hart_step::<u32, _, _>(
            &[0x00000073], // ecall
            |builder| builder
                .csr(csr_index::mtvec, IRQ_HANDLER_ADDR)
                .csr(csr_index::mstatus, 0x8),
            |checker| checker.pc(IRQ_HANDLER_ADDR).customized(|c| {
                let status = StatusFields(c.hart.peek_csr(csr_index::mstatus).unwrap());
                assert_eq!(status.mie(), 0);
                assert_eq!(status.mpie(), 1);
                assert_eq!(status.mpp(), PrivilegeMode::Machine as u64);
                assert_eq!(c.hart.peek_csr(csr_index::mcause), Some(11));
                assert_eq!(c.hart.peek_csr(csr_index::mepc), Some(BASE));
                c
            }),
        );
    }

    #[test]
    fn test_interrupt_taken_by_priority() {
        // Timer and external both pending: external (cause 11) wins.
        let mut hart = TestHartBuilder::<u32>::new()
            .csr(csr_index::mtvec, IRQ_HANDLER_ADDR)
            .csr(csr_index::mstatus, 0x8) // MIE
            .csr(csr_index::mie, (1 << 7) | (1 << 11))
            .csr(csr_index::mip, (1 << 7) | (1 << 11))
            .program(&[0x00000013]) // nop
            .build();
        hart.single_step(None);
        assert_eq!(hart.peek_csr(csr_index::mcause), Some(0x8000_000B));
        assert_eq!(hart.peek_pc(), IRQ_HANDLER_ADDR);
    }

    #[test]
    fn test_nmi_has_precedence_and_latches_cause() {
        use crate::isa::riscv::trap::NmiCause;

        let mut hart = TestHartBuilder::<u32>::new()
            .csr(csr_index::mstatus, 0x8)
            .csr(csr_index::mie, 1 << 7)
            .csr(csr_index::mip, 1 << 7)
            .program(&[0x00000013])
            .build();
        hart.set_nmi_pc(BASE + 0x300);
        hart.set_pending_nmi(NmiCause::LoadException);
        hart.single_step(None);
        assert_eq!(hart.peek_pc(), BASE + 0x300);
        assert_eq!(hart.peek_csr(csr_index::mcause), Some(0xF000_0001));
    }

    #[test]
    fn test_compressed_step_advances_by_two() {
        run_test_hart_step::<u32, _, _>(
            &[0x4515_4515], // two c.li a0, 5 parcels
            |builder| builder,
            |checker| checker.reg(10, 5).pc(BASE + 4),
        );
    }

    #[test]
    fn test_tohost_write_stops_run() {
        let tohost = BASE + 0x2000;
        let mut hart = TestHartBuilder::<u32>::new()
            .reg(1, 1)
            .reg(2, tohost)
            .program(&[0x00112023]) // sw x1, 0(x2)
            .build();
        hart.set_to_host_address(tohost);
        let success = hart.until_address(u64::MAX, None);
        assert!(success);
        assert!(hart.target_program_finished());
        assert_eq!(hart.retired_insts(), 0); // the stopping store does not retire
    }

    #[test]
    fn test_newlib_exit_stops_run() {
        let mut hart = TestHartBuilder::<u32>::new()
            .reg(17, 93) // a7 = exit
            .reg(10, 0) // code 0
            .program(&[0x00000073]) // ecall
            .build();
        hart.enable_newlib(true, BASE + 0x4000);
        let success = hart.until_address(u64::MAX, None);
        assert!(success);
        assert!(hart.target_program_finished());
    }

    #[test]
    fn test_illegal_watchdog_stops_run() {
        let mut hart = TestHartBuilder::<u32>::new()
            .csr(csr_index::mtvec, BASE) // handler loops back to the illegal op
            .program(&[0xFFFF_FFFF])
            .build();
        let success = hart.until_address(u64::MAX, None);
        assert!(!success);
        assert!(hart.target_program_finished());
    }

    #[test]
    fn test_addi_scenario_counts() {
        // addi x1, x0, 5: one retired instruction, pc advanced by 4.
        run_test_hart_step::<u32, _, _>(
            &[0x00500093],
            |builder| builder,
            |checker| checker.reg(1, 5).pc(BASE + 4).customized(|c| {
                assert_eq!(c.hart.retired_insts(), 1);
                assert_eq!(c.hart.cycle_count(), 1);
                c
            }),
        );
    }

    #[test]
    fn test_branch_taken_scenario() {
        run_test_hart_step::<u32, _, _>(
            &[0x00208463], // beq x1, x2, +8
            |builder| builder,
            |checker| checker.pc(BASE + 8).customized(|c| {
                assert!(c.hart.last_branch_taken());
                c
            }),
        );
    }

    #[test]
    fn test_trace_emission() {
        let mut hart = TestHartBuilder::<u32>::new()
            .program(&[0x00500093]) // addi x1, x0, 5
            .build();
        let mut out: Vec<u8> = Vec::new();
        hart.single_step(Some(&mut out));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, format!("#1 0 {:08x} 00500093 r 01 00000005  addi\n", BASE));
    }

    #[test]
    fn test_ebreak_enters_debug_with_dcsr_ebreakm() {
        let mut hart = TestHartBuilder::<u32>::new()
            .csr(csr_index::dcsr, 0x8000)
            .program(&[0x00100073]) // ebreak
            .build();
        hart.single_step(None);
        assert!(hart.in_debug_mode());
        assert_eq!(hart.peek_csr(csr_index::dpc), Some(BASE));
        // DCSR cause field holds the ebreak cause.
        let dcsr = hart.peek_csr(csr_index::dcsr).unwrap();
        assert_eq!((dcsr >> 6) & 7, 1);
    }

    #[test]
    fn test_mcycle_and_minstret_tied() {
        run_test_hart_step::<u32, _, _>(
            &[0x00000013, 0x00000013], // nop; nop
            |builder| builder,
            |checker| checker
                .csr(csr_index::minstret, 2)
                .csr(csr_index::mcycle, 2),
        );
    }
}
