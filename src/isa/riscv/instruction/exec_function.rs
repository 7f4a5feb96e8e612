//! Semantic routines for the integer, control-transfer, load/store, CSR and
//! system instructions. Each routine runs after the pc has been advanced
//! past the instruction; `current_pc` still points at it.

use crate::isa::riscv::csr_reg::{csr_index, PrivilegeMode};
use crate::isa::riscv::hart::{DebugModeCause, Hart};
use crate::isa::riscv::instruction::Operands;
use crate::isa::riscv::trap::trap_controller::TrapController;
use crate::isa::riscv::trap::{ExceptionCause, ExecResult, StopReason};
use crate::isa::riscv::triggers::TriggerTiming;
use crate::utils::Word;

/// Pure two-operand integer operation.
pub(super) trait ArithOp<W: Word> {
    fn exec(a: W, b: W) -> W;
}

/// Two-operand comparison, for conditional branches.
pub(super) trait CmpOp<W: Word> {
    fn exec(a: W, b: W) -> bool;
}

/// Arithmetic/logical instructions in R or I form. The I form arrives with
/// its immediate already sign-extended (shift forms carry the shamt).
pub(super) fn exec_arith<W: Word, F: ArithOp<W>>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let (rd, rst) = match ops {
        Operands::R { rd, rs1, rs2 } => {
            let a = hart.int_regs.read(rs1);
            let b = hart.int_regs.read(rs2);
            (rd, F::exec(a, b))
        }
        Operands::I { rd, rs1, imm } => {
            let a = hart.int_regs.read(rs1);
            (rd, F::exec(a, W::from_i64(imm as i64)))
        }
        _ => unreachable!(),
    };
    hart.int_regs.write(rd, rst);
    Ok(())
}

pub(super) fn exec_branch<W: Word, F: CmpOp<W>>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let Operands::B { rs1, rs2, imm } = ops else {
        unreachable!()
    };
    let a = hart.int_regs.read(rs1);
    let b = hart.int_regs.read(rs2);
    if F::exec(a, b) {
        hart.pc = hart.current_pc.wrapping_add(W::from_i64(imm as i64)) & !W::ONE;
        hart.last_branch_taken = true;
    }
    Ok(())
}

pub(super) fn exec_jal<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let Operands::J { rd, imm } = ops else {
        unreachable!()
    };
    // pc has already been advanced: it is the link value.
    hart.int_regs.write(rd, hart.pc);
    hart.pc = hart.current_pc.wrapping_add(W::from_i64(imm as i64)) & !W::ONE;
    Ok(())
}

pub(super) fn exec_jalr<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let Operands::I { rd, rs1, imm } = ops else {
        unreachable!()
    };
    let link = hart.pc;
    let target = hart.int_regs.read(rs1).wrapping_add(W::from_i64(imm as i64));
    hart.pc = target & !W::ONE;
    hart.int_regs.write(rd, link);
    Ok(())
}

pub(super) fn exec_lui<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let Operands::U { rd, imm } = ops else {
        unreachable!()
    };
    hart.int_regs.write(rd, W::from_i64(imm as i64));
    Ok(())
}

pub(super) fn exec_auipc<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let Operands::U { rd, imm } = ops else {
        unreachable!()
    };
    hart.int_regs
        .write(rd, hart.current_pc.wrapping_add(W::from_i64(imm as i64)));
    Ok(())
}

// ------------------------------------------------------------------
// Loads and stores.
// ------------------------------------------------------------------

impl<W: Word> Hart<W> {
    pub(crate) fn initiate_load_exception(&mut self, cause: ExceptionCause, addr: u64, size: u32) {
        // The bench sends a load-finished even for faulting loads;
        // compensate with a placeholder queue entry.
        if self.load_queue_enabled && !self.force_access_fail {
            self.put_in_load_queue(size, addr, 0, W::ZERO);
        }
        self.force_access_fail = false;
        let pc = self.current_pc;
        TrapController::initiate_exception(self, cause, pc, W::from_u64(addr));
    }

    pub(crate) fn initiate_store_exception(&mut self, cause: ExceptionCause, addr: u64) {
        self.force_access_fail = false;
        let pc = self.current_pc;
        TrapController::initiate_exception(self, cause, pc, W::from_u64(addr));
    }

    pub(crate) fn is_interrupt_enabled(&self) -> bool {
        use crate::isa::riscv::trap::trap_controller::StatusFields;
        StatusFields(self.read_csr_m(csr_index::mstatus).to_u64()).mie() == 1
    }

    /// Common store path: triggers, alignment, to-host/console magic, the
    /// actual write, and store-queue capture. Returns whether the store
    /// landed.
    pub(crate) fn store_common(
        &mut self,
        base: u64,
        addr: u64,
        value: u64,
        size: u32,
    ) -> Result<bool, StopReason> {
        let has_trig = self.enable_triggers && self.triggers.has_active_trigger();
        let ie = self.is_interrupt_enabled();
        if has_trig
            && self
                .triggers
                .ld_st_addr_trigger_hit(addr, TriggerTiming::Before, false, ie)
        {
            self.trigger_tripped = true;
        }

        if self.ea_compat_with_base {
            self.force_access_fail =
                self.force_access_fail || self.effective_and_base_addr_mismatch(base, addr);
        }

        let misal = addr & (size as u64 - 1) != 0;
        self.misaligned_ld_st = misal;
        if misal && self.misaligned_access_causes_exception(addr, size) {
            if self.trigger_tripped {
                return Ok(false); // Trigger has priority over the exception.
            }
            self.initiate_store_exception(ExceptionCause::StoreAddrMisaligned, addr);
            return Ok(false);
        }

        if has_trig && !self.force_access_fail {
            if let Some(masked) = self.mem.check_write(addr, value, size) {
                if self
                    .triggers
                    .ld_st_data_trigger_hit(masked, TriggerTiming::Before, false, ie)
                {
                    self.trigger_tripped = true;
                }
            }
        }
        if self.trigger_tripped {
            return Ok(false);
        }

        if !self.force_access_fail && self.mem.write(addr, value, size).is_ok() {
            // A store that overlaps the reserved range kills the
            // reservation.
            if self.has_lr
                && addr < self.lr_addr + self.lr_size as u64
                && addr + size as u64 > self.lr_addr
            {
                self.has_lr = false;
            }

            // Writing a non-zero value to the to-host address ends the run.
            if let Some(to_host) = self.to_host {
                if addr == to_host && value != 0 {
                    return Err(StopReason::ToHost(value));
                }
            }

            // One-byte store to the console address goes to the console.
            if size == 1 && self.con_io == Some(addr) {
                self.console_put_byte(value as u8);
                return Ok(true);
            }

            if self.max_store_queue_size > 0 {
                let prev = self.mem.last_write_old_value();
                self.put_in_store_queue(size, addr, value, prev);
            }
            return Ok(true);
        }

        self.initiate_store_exception(ExceptionCause::StoreAccessFault, addr);
        Ok(false)
    }
}

pub(super) fn exec_load<W: Word, const SIZE: u32, const SEXT: bool>(
    hart: &mut Hart<W>,
    ops: Operands,
) -> ExecResult {
    let Operands::I { rd, rs1, imm } = ops else {
        unreachable!()
    };
    let base = hart.int_regs.read(rs1).to_u64();
    let addr = base.wrapping_add(imm as i64 as u64);

    hart.load_addr = addr;
    hart.load_addr_valid = true;

    if hart.load_queue_enabled {
        hart.remove_from_load_queue(rs1);
    }

    if hart.enable_triggers && hart.triggers.has_active_trigger() {
        let ie = hart.is_interrupt_enabled();
        if hart
            .triggers
            .ld_st_addr_trigger_hit(addr, TriggerTiming::Before, true, ie)
        {
            hart.trigger_tripped = true;
            return Ok(());
        }
    }

    // A byte load from the console address reads standard input.
    if SIZE == 1 && hart.con_io == Some(addr) {
        let byte = hart.console_get_byte();
        hart.int_regs.write(rd, W::from_i64(byte));
        return Ok(());
    }

    if hart.ea_compat_with_base {
        hart.force_access_fail =
            hart.force_access_fail || hart.effective_and_base_addr_mismatch(base, addr);
    }

    let misal = addr & (SIZE as u64 - 1) != 0;
    hart.misaligned_ld_st = misal;
    if misal && hart.misaligned_access_causes_exception(addr, SIZE) {
        hart.initiate_load_exception(ExceptionCause::LoadAddrMisaligned, addr, SIZE);
        return Ok(());
    }

    if !hart.force_access_fail {
        if let Ok(raw) = hart.mem.read(addr, SIZE) {
            let value = if SEXT {
                W::from_i64(crate::utils::sign_extend(raw, SIZE * 8))
            } else {
                W::from_u64(raw)
            };
            let prev = hart.int_regs.read(rd);
            if hart.load_queue_enabled {
                hart.put_in_load_queue(SIZE, addr, rd, prev);
            }
            hart.int_regs.write(rd, value);
            return Ok(());
        }
    }

    hart.initiate_load_exception(ExceptionCause::LoadAccessFault, addr, SIZE);
    Ok(())
}

pub(super) fn exec_store<W: Word, const SIZE: u32>(
    hart: &mut Hart<W>,
    ops: Operands,
) -> ExecResult {
    let Operands::S { rs1, rs2, imm } = ops else {
        unreachable!()
    };
    let base = hart.int_regs.read(rs1).to_u64();
    let addr = base.wrapping_add(imm as i64 as u64);
    let value = hart.int_regs.read(rs2).to_u64() & mask_of(SIZE);
    hart.store_common(base, addr, value, SIZE)?;
    Ok(())
}

pub(super) fn mask_of(size: u32) -> u64 {
    if size == 8 {
        u64::MAX
    } else {
        (1u64 << (size * 8)) - 1
    }
}

// ------------------------------------------------------------------
// CSR instructions.
// ------------------------------------------------------------------

impl<W: Word> Hart<W> {
    fn do_csr_read(&mut self, csr: u16) -> Option<W> {
        self.csr.read(csr, self.priv_mode, self.debug_mode)
    }

    /// CSR write plus its side effects. The retired/cycle counters
    /// auto-increment after every instruction, so writes to them are
    /// pre-incremented and then compensated.
    fn do_csr_write(&mut self, csr: u16, value: W, rd: u8, rd_value: W) -> ExecResult {
        if !self.csr.is_writeable(csr, self.priv_mode, self.debug_mode) {
            return self.illegal_inst();
        }

        let counter_csr = matches!(
            csr,
            csr_index::minstret | csr_index::minstreth | csr_index::mcycle | csr_index::mcycleh
        );
        if matches!(csr, csr_index::minstret | csr_index::minstreth) {
            self.bump_retired(1);
        }
        if matches!(csr, csr_index::mcycle | csr_index::mcycleh) {
            self.bump_cycles(1);
        }

        self.csr.write(csr, self.priv_mode, self.debug_mode, value);
        self.int_regs.write(rd, rd_value);

        match csr {
            csr_index::dcsr => {
                self.dcsr_step = (value.to_u64() >> 2) & 1 == 1;
                self.dcsr_step_ie = (value.to_u64() >> 11) & 1 == 1;
            }
            csr_index::mgpmc => {
                // Counter-enable takes effect starting with the next
                // instruction; the current one counts under the old state.
                self.prev_counters_on = self.counters_on;
                self.counters_on = value.to_u64() & 1 == 1;
            }
            _ => {}
        }

        // Performance-counter event rewiring.
        if (csr_index::mhpmevent3..csr_index::mhpmevent3 + 29).contains(&csr) {
            let ix = (csr - csr_index::mhpmevent3) as usize;
            let event = self
                .csr
                .peek(csr)
                .map(|v| v.to_u64() as u32)
                .unwrap_or(0);
            self.perf.assign_event_to_counter(event, ix);
        }

        // Trigger CSR traffic is forwarded to the trigger unit and recorded
        // under the trigger encoding.
        if (csr_index::tdata1..=csr_index::tdata3).contains(&csr) {
            let sel = self
                .csr
                .peek(csr_index::tselect)
                .map(|v| v.to_u64() as u32)
                .unwrap_or(0);
            let which = (csr - csr_index::tdata1 + 1) as u32;
            self.triggers.write_tdata(sel, which, value.to_u64());
            self.csr.record_trigger_write(sel, csr);
        }

        // Compensate for the run loop's auto-increment.
        if counter_csr {
            if matches!(csr, csr_index::minstret | csr_index::minstreth) {
                self.bump_retired(-1);
            } else {
                self.bump_cycles(-1);
            }
        }
        Ok(())
    }
}

pub(super) fn exec_csrrw<W: Word, const UIMM: bool>(
    hart: &mut Hart<W>,
    ops: Operands,
) -> ExecResult {
    if hart.trigger_tripped {
        return Ok(());
    }
    let Operands::I { rd, rs1, imm } = ops else {
        unreachable!()
    };
    let csr = imm as u16;
    let next = if UIMM {
        W::from_u64(rs1 as u64)
    } else {
        hart.int_regs.read(rs1)
    };

    // rd == x0 skips the read (and its side effects).
    let mut prev = W::ZERO;
    if rd != 0 {
        match hart.do_csr_read(csr) {
            Some(v) => prev = v,
            None => return hart.illegal_inst(),
        }
    }
    hart.do_csr_write(csr, next, rd, prev)
}

pub(super) fn exec_csr_bit<W: Word, const SET: bool, const UIMM: bool>(
    hart: &mut Hart<W>,
    ops: Operands,
) -> ExecResult {
    if hart.trigger_tripped {
        return Ok(());
    }
    let Operands::I { rd, rs1, imm } = ops else {
        unreachable!()
    };
    let csr = imm as u16;
    let rhs = if UIMM {
        W::from_u64(rs1 as u64)
    } else {
        hart.int_regs.read(rs1)
    };

    let Some(prev) = hart.do_csr_read(csr) else {
        return hart.illegal_inst();
    };

    // rs1 == x0 (or a zero immediate) suppresses the write entirely.
    if rs1 == 0 {
        hart.int_regs.write(rd, prev);
        return Ok(());
    }

    let next = if SET { prev | rhs } else { prev & !rhs };
    hart.do_csr_write(csr, next, rd, prev)
}

// ------------------------------------------------------------------
// System instructions.
// ------------------------------------------------------------------

pub(super) fn exec_ecall<W: Word>(hart: &mut Hart<W>, _ops: Operands) -> ExecResult {
    if hart.trigger_tripped {
        return Ok(());
    }

    // Exceptions do not retire, but an ecall should; compensate.
    if !hart.debug_stop_count() {
        hart.bump_retired(1);
    }

    if hart.newlib {
        let a0 = hart.emulate_newlib()?;
        hart.int_regs.write(10, a0);
        return Ok(());
    }

    let cause = match hart.priv_mode {
        PrivilegeMode::Machine => ExceptionCause::MachineEnvCall,
        PrivilegeMode::Supervisor => ExceptionCause::SupervisorEnvCall,
        PrivilegeMode::User => ExceptionCause::UserEnvCall,
    };
    let pc = hart.current_pc;
    TrapController::initiate_exception(hart, cause, pc, W::ZERO);
    Ok(())
}

pub(super) fn exec_ebreak<W: Word>(hart: &mut Hart<W>, _ops: Operands) -> ExecResult {
    if hart.trigger_tripped {
        return Ok(());
    }

    // In machine mode with DCSR.ebreakm set, ebreak enters debug mode
    // instead of trapping.
    if hart.priv_mode == PrivilegeMode::Machine {
        if let Some(dcsr) = hart.peek_csr(csr_index::dcsr) {
            if dcsr & (1 << 15) != 0 {
                let pc = hart.current_pc;
                hart.enter_debug_mode(DebugModeCause::Ebreak, pc);
                hart.ebreak_inst_debug = true;
                hart.csr.record_write(csr_index::dcsr);
                return Ok(());
            }
        }
    }

    if !hart.debug_stop_count() {
        hart.bump_retired(1);
    }

    let pc = hart.current_pc;
    TrapController::initiate_exception(hart, ExceptionCause::Breakpoint, pc, pc);
    Ok(())
}

pub(super) fn exec_mret<W: Word>(hart: &mut Hart<W>, _ops: Operands) -> ExecResult {
    if hart.priv_mode < PrivilegeMode::Machine {
        return hart.illegal_inst();
    }
    if hart.trigger_tripped {
        return Ok(());
    }
    TrapController::mret(hart);
    Ok(())
}

pub(super) fn exec_sret<W: Word>(hart: &mut Hart<W>, _ops: Operands) -> ExecResult {
    if !hart.isa.rvs || hart.priv_mode < PrivilegeMode::Supervisor {
        return hart.illegal_inst();
    }
    if hart.trigger_tripped {
        return Ok(());
    }
    TrapController::sret(hart);
    Ok(())
}

pub(super) fn exec_uret<W: Word>(hart: &mut Hart<W>, _ops: Operands) -> ExecResult {
    if !hart.isa.rvu || hart.priv_mode != PrivilegeMode::User {
        return hart.illegal_inst();
    }
    if hart.trigger_tripped {
        return Ok(());
    }
    TrapController::uret(hart);
    Ok(())
}

pub(super) fn exec_wfi<W: Word>(_hart: &mut Hart<W>, _ops: Operands) -> ExecResult {
    Ok(()) // Implemented as a no-op.
}

pub(super) fn exec_fence<W: Word>(hart: &mut Hart<W>, _ops: Operands) -> ExecResult {
    // A fence discards in-flight speculation state and the reservation.
    hart.load_queue.clear();
    hart.store_queue.clear();
    hart.has_lr = false;
    Ok(())
}

pub(super) fn exec_fence_i<W: Word>(_hart: &mut Hart<W>, _ops: Operands) -> ExecResult {
    Ok(()) // Implemented as a no-op.
}

// ------------------------------------------------------------------
// Custom q-register moves.
// ------------------------------------------------------------------

pub(super) fn exec_getq<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let Operands::R { rd, rs1, .. } = ops else {
        unreachable!()
    };
    let v = hart.cst_regs.read(rs1 & 3);
    hart.int_regs.write(rd, v);
    Ok(())
}

pub(super) fn exec_setq<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let Operands::R { rd, rs1, .. } = ops else {
        unreachable!()
    };
    let v = hart.int_regs.read(rs1);
    hart.cst_regs.write(rd & 3, v);
    Ok(())
}

// ------------------------------------------------------------------
// Newlib ECALL emulation.
// ------------------------------------------------------------------

impl<W: Word> Hart<W> {
    /// Minimal newlib syscall shim: enough for bare-metal test programs
    /// built against newlib to exit, print, and allocate.
    pub(crate) fn emulate_newlib(&mut self) -> Result<W, StopReason> {
        let num = self.int_regs.read(17).to_u64(); // a7
        let a0 = self.int_regs.read(10).to_u64();
        let a1 = self.int_regs.read(11).to_u64();
        let a2 = self.int_regs.read(12).to_u64();

        match num {
            57 => Ok(W::ZERO), // close
            63 => {
                // read(fd, buf, len)
                if a0 != 0 {
                    return Ok(W::MAX);
                }
                let mut buf = vec![0u8; a2 as usize];
                let got = self.console_read(&mut buf);
                for (i, b) in buf[..got].iter().enumerate() {
                    self.mem.poke(a1 + i as u64, *b as u64, 1);
                }
                Ok(W::from_u64(got as u64))
            }
            64 => {
                // write(fd, buf, len)
                if a0 != 1 && a0 != 2 {
                    return Ok(W::MAX);
                }
                let mut buf = Vec::with_capacity(a2 as usize);
                for i in 0..a2 {
                    match self.mem.read(a1 + i, 1) {
                        Ok(b) => buf.push(b as u8),
                        Err(_) => return Ok(W::MAX),
                    }
                }
                let put = self.console_write(&buf);
                Ok(W::from_u64(put as u64))
            }
            93 => Err(StopReason::Exit(a0)), // exit
            214 => {
                // brk
                if a0 != 0 {
                    self.program_break = a0;
                }
                Ok(W::from_u64(self.program_break))
            }
            _ => {
                log::warn!("Unimplemented syscall number {}", num);
                Ok(W::MAX) // -1
            }
        }
    }
}

// ------------------------------------------------------------------
// Operation types.
// ------------------------------------------------------------------

macro_rules! arith_op {
    ($name:ident, |$a:ident, $b:ident| $body:expr) => {
        pub(super) struct $name;
        impl<W: Word> ArithOp<W> for $name {
            fn exec($a: W, $b: W) -> W {
                $body
            }
        }
    };
}

arith_op!(ExecAdd, |a, b| a.wrapping_add(b));
arith_op!(ExecSub, |a, b| a.wrapping_sub(b));
arith_op!(ExecAnd, |a, b| a & b);
arith_op!(ExecOr, |a, b| a | b);
arith_op!(ExecXor, |a, b| a ^ b);
arith_op!(ExecSll, |a, b| a.shl(b.to_u64() as u32 & W::shift_mask()));
arith_op!(ExecSrl, |a, b| a.shr(b.to_u64() as u32 & W::shift_mask()));
arith_op!(ExecSra, |a, b| a.sra(b.to_u64() as u32 & W::shift_mask()));
arith_op!(ExecSlt, |a, b| if a.signed_lt(b) { W::ONE } else { W::ZERO });
arith_op!(ExecSltu, |a, b| if a < b { W::ONE } else { W::ZERO });

arith_op!(ExecMul, |a, b| a.wrapping_mul(b));
arith_op!(ExecMulh, |a, b| a.mulh(b));
arith_op!(ExecMulhu, |a, b| a.mulhu(b));
arith_op!(ExecMulhsu, |a, b| a.mulhsu(b));
arith_op!(ExecDiv, |a, b| if b == W::ZERO {
    W::MAX
} else {
    a.div_signed(b)
});
arith_op!(ExecDivu, |a, b| if b == W::ZERO {
    W::MAX
} else {
    a.div_unsigned(b)
});
arith_op!(ExecRem, |a, b| if b == W::ZERO {
    a
} else {
    a.rem_signed(b)
});
arith_op!(ExecRemu, |a, b| if b == W::ZERO {
    a
} else {
    a.rem_unsigned(b)
});

// W-forms: operate on the low 32 bits, sign-extend the 32-bit result.
arith_op!(ExecAddw, |a, b| W::sext32(
    (a.to_u64() as u32).wrapping_add(b.to_u64() as u32)
));
arith_op!(ExecSubw, |a, b| W::sext32(
    (a.to_u64() as u32).wrapping_sub(b.to_u64() as u32)
));
arith_op!(ExecMulw, |a, b| W::sext32(
    (a.to_u64() as u32).wrapping_mul(b.to_u64() as u32)
));
arith_op!(ExecSllw, |a, b| W::sext32(
    (a.to_u64() as u32).wrapping_shl(b.to_u64() as u32 & 0x1F)
));
arith_op!(ExecSrlw, |a, b| W::sext32(
    (a.to_u64() as u32).wrapping_shr(b.to_u64() as u32 & 0x1F)
));
arith_op!(ExecSraw, |a, b| W::sext32(
    (a.to_u64() as u32 as i32).wrapping_shr(b.to_u64() as u32 & 0x1F) as u32
));
arith_op!(ExecDivw, |a, b| {
    let sa = a.to_u64() as u32 as i32;
    let sb = b.to_u64() as u32 as i32;
    if sb == 0 {
        W::MAX
    } else {
        W::sext32(sa.wrapping_div(sb) as u32)
    }
});
arith_op!(ExecDivuw, |a, b| {
    let ua = a.to_u64() as u32;
    let ub = b.to_u64() as u32;
    if ub == 0 {
        W::MAX
    } else {
        W::sext32(ua / ub)
    }
});
arith_op!(ExecRemw, |a, b| {
    let sa = a.to_u64() as u32 as i32;
    let sb = b.to_u64() as u32 as i32;
    if sb == 0 {
        W::sext32(sa as u32)
    } else {
        W::sext32(sa.wrapping_rem(sb) as u32)
    }
});
arith_op!(ExecRemuw, |a, b| {
    let ua = a.to_u64() as u32;
    let ub = b.to_u64() as u32;
    if ub == 0 {
        W::sext32(ua)
    } else {
        W::sext32(ua % ub)
    }
});

macro_rules! cmp_op {
    ($name:ident, |$a:ident, $b:ident| $body:expr) => {
        pub(super) struct $name;
        impl<W: Word> CmpOp<W> for $name {
            fn exec($a: W, $b: W) -> bool {
                $body
            }
        }
    };
}

cmp_op!(ExecEq, |a, b| a == b);
cmp_op!(ExecNe, |a, b| a != b);
cmp_op!(ExecLt, |a, b| a.signed_lt(b));
cmp_op!(ExecGe, |a, b| !a.signed_lt(b));
cmp_op!(ExecLtu, |a, b| a < b);
cmp_op!(ExecGeu, |a, b| a >= b);

