use crate::isa::riscv::csr_reg::{csr_index, PrivilegeMode};
use crate::isa::riscv::csr_reg::perf::EventNumber;
use crate::isa::riscv::hart::Hart;
use crate::isa::riscv::trap::{ExceptionCause, InterruptCause};
use crate::utils::Word;

/// MSTATUS/SSTATUS/USTATUS field plumbing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StatusFields(pub u64);

impl StatusFields {
    pub fn bit(&self, ix: u32) -> u64 {
        (self.0 >> ix) & 1
    }

    pub fn set_bit(&mut self, ix: u32, val: u64) {
        self.0 = (self.0 & !(1 << ix)) | ((val & 1) << ix);
    }

    pub fn uie(&self) -> u64 {
        self.bit(0)
    }
    pub fn sie(&self) -> u64 {
        self.bit(1)
    }
    pub fn mie(&self) -> u64 {
        self.bit(3)
    }
    pub fn upie(&self) -> u64 {
        self.bit(4)
    }
    pub fn spie(&self) -> u64 {
        self.bit(5)
    }
    pub fn mpie(&self) -> u64 {
        self.bit(7)
    }
    pub fn spp(&self) -> u64 {
        self.bit(8)
    }
    pub fn mpp(&self) -> u64 {
        (self.0 >> 11) & 3
    }

    pub fn set_uie(&mut self, v: u64) {
        self.set_bit(0, v)
    }
    pub fn set_sie(&mut self, v: u64) {
        self.set_bit(1, v)
    }
    pub fn set_mie(&mut self, v: u64) {
        self.set_bit(3, v)
    }
    pub fn set_upie(&mut self, v: u64) {
        self.set_bit(4, v)
    }
    pub fn set_spie(&mut self, v: u64) {
        self.set_bit(5, v)
    }
    pub fn set_mpie(&mut self, v: u64) {
        self.set_bit(7, v)
    }
    pub fn set_spp(&mut self, v: u64) {
        self.set_bit(8, v)
    }
    pub fn set_mpp(&mut self, v: u64) {
        self.0 = (self.0 & !(3 << 11)) | ((v & 3) << 11);
    }
}

/// Synchronous-exception, interrupt and NMI entry plus the xRET returns.
/// All traps enter through [`TrapController::take_trap`].
pub struct TrapController;

impl TrapController {
    /// Delegation hook. The default configuration delegates nothing:
    /// everything is taken in machine mode.
    fn delegated_mode<W: Word>(_hart: &Hart<W>, _interrupt: bool) -> PrivilegeMode {
        PrivilegeMode::Machine
    }

    pub fn initiate_exception<W: Word>(hart: &mut Hart<W>, cause: ExceptionCause, pc: W, info: W) {
        hart.exception_count += 1;
        hart.has_exception = true;
        Self::take_trap(hart, false, u32::from(cause) as u64, pc, info);

        if hart.enable_counters && hart.counters_on {
            hart.perf.update_counters(EventNumber::Exception);
        }
    }

    pub fn initiate_interrupt<W: Word>(hart: &mut Hart<W>, cause: InterruptCause, pc: W) {
        hart.interrupt_count += 1;
        Self::take_trap(hart, true, u32::from(cause) as u64, pc, W::ZERO);

        if hart.enable_counters && hart.counters_on {
            match cause {
                InterruptCause::MachineExternal => {
                    hart.perf.update_counters(EventNumber::ExternalInterrupt)
                }
                InterruptCause::MachineTimer => {
                    hart.perf.update_counters(EventNumber::TimerInterrupt)
                }
                _ => {}
            }
        }
    }

    /// The single trap entry point.
    fn take_trap<W: Word>(hart: &mut Hart<W>, interrupt: bool, cause: u64, pc_to_save: W, info: W) {
        // A trap loses the load reservation.
        hart.has_lr = false;

        let origin = hart.priv_mode;

        // Traps are taken in machine mode; delegation to S/U is a hook that
        // the default configuration leaves unimplemented.
        hart.priv_mode = PrivilegeMode::Machine;
        let next_mode = Self::delegated_mode(hart, interrupt);

        let (epc_num, cause_num, tval_num, tvec_num) = match next_mode {
            PrivilegeMode::Machine => (
                csr_index::mepc,
                csr_index::mcause,
                csr_index::mtval,
                csr_index::mtvec,
            ),
            PrivilegeMode::Supervisor => (
                csr_index::sepc,
                csr_index::scause,
                csr_index::stval,
                csr_index::stvec,
            ),
            PrivilegeMode::User => (
                csr_index::uepc,
                csr_index::ucause,
                csr_index::utval,
                csr_index::utvec,
            ),
        };

        // Save the interrupted/faulting pc, the cause and the trap info.
        hart.write_csr_m(epc_num, pc_to_save & !W::ONE);

        let mut cause_val = W::from_u64(cause);
        if interrupt {
            cause_val = cause_val | W::ONE.shl(W::XLEN - 1);
        }
        hart.write_csr_m(cause_num, cause_val);
        hart.write_csr_m(tval_num, info);

        // Save xIE into xPIE, clear xIE, save the origin mode into xPP.
        let mut status = StatusFields(hart.read_csr_m(csr_index::mstatus).to_u64());
        match next_mode {
            PrivilegeMode::Machine => {
                status.set_mpp(origin as u64);
                status.set_mpie(status.mie());
                status.set_mie(0);
            }
            PrivilegeMode::Supervisor => {
                status.set_spp(origin as u64 & 1);
                status.set_spie(status.sie());
                status.set_sie(0);
            }
            PrivilegeMode::User => {
                status.set_upie(status.uie());
                status.set_uie(0);
            }
        }
        hart.write_csr_m(csr_index::mstatus, W::from_u64(status.0));

        // Vector to the handler.
        let tvec = hart.read_csr_m(tvec_num).to_u64();
        let mut base = (tvec >> 2) << 2;
        let tvec_mode = tvec & 3;
        if tvec_mode == 1 && interrupt {
            base += 4 * cause;
        }
        hart.pc = W::from_u64(base) & !W::ONE;

        hart.priv_mode = next_mode;
    }

    /// Non-maskable-interrupt entry: like a machine trap but MCAUSE takes
    /// the raw NMI cause, MTVAL is cleared, and control transfers to the
    /// fixed NMI handler address.
    pub fn initiate_nmi<W: Word>(hart: &mut Hart<W>, cause: u64, pc_to_save: W) {
        hart.has_lr = false;

        let origin = hart.priv_mode;
        hart.priv_mode = PrivilegeMode::Machine;

        hart.write_csr_m(csr_index::mepc, pc_to_save & !W::ONE);
        hart.write_csr_m(csr_index::mcause, W::from_u64(cause));
        hart.write_csr_m(csr_index::mtval, W::ZERO);

        let mut status = StatusFields(hart.read_csr_m(csr_index::mstatus).to_u64());
        status.set_mpp(origin as u64);
        status.set_mpie(status.mie());
        status.set_mie(0);
        hart.write_csr_m(csr_index::mstatus, W::from_u64(status.0));

        // Clear the pending bit in DCSR.
        if let Some(v) = hart.peek_csr(csr_index::dcsr) {
            hart.poke_csr(csr_index::dcsr, v & !(1 << 3));
            hart.csr.record_write(csr_index::dcsr);
        }

        hart.pc = hart.nmi_pc & !W::ONE;
    }

    /// Return from a machine-mode trap: the inverse of trap entry.
    pub fn mret<W: Word>(hart: &mut Hart<W>) {
        hart.has_lr = false;

        let mut status = StatusFields(hart.read_csr_m(csr_index::mstatus).to_u64());
        let saved_mode = PrivilegeMode::from(status.mpp() as u8);
        status.set_mie(status.mpie());
        status.set_mpp(0);
        status.set_mpie(1);
        hart.write_csr_m(csr_index::mstatus, W::from_u64(status.0));

        let epc = hart.read_csr_m(csr_index::mepc);
        hart.pc = epc & !W::ONE;
        hart.priv_mode = saved_mode;
    }

    pub fn sret<W: Word>(hart: &mut Hart<W>) {
        let mut status = StatusFields(hart.read_csr_m(csr_index::sstatus).to_u64());
        let saved_mode = if status.spp() == 1 {
            PrivilegeMode::Supervisor
        } else {
            PrivilegeMode::User
        };
        status.set_sie(status.spie());
        status.set_spp(0);
        status.set_spie(1);
        hart.write_csr_m(csr_index::sstatus, W::from_u64(status.0));

        let epc = hart.read_csr_m(csr_index::sepc);
        hart.pc = epc & !W::ONE;
        hart.priv_mode = saved_mode;
    }

    pub fn uret<W: Word>(hart: &mut Hart<W>) {
        let mut status = StatusFields(hart.read_csr_m(csr_index::ustatus).to_u64());
        status.set_uie(status.upie());
        status.set_upie(1);
        hart.write_csr_m(csr_index::ustatus, W::from_u64(status.0));

        let epc = hart.read_csr_m(csr_index::uepc);
        hart.pc = epc & !W::ONE;
        hart.priv_mode = PrivilegeMode::User;
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
    fn test_exception_entry_updates_state() {
        let mut hart = new_hart();
        hart.write_csr_m(csr_index::mtvec, 0x8000_2000);
        let mut status = StatusFields(hart.read_csr_m(csr_index::mstatus).to_u64());
        status.set_mie(1);
        hart.write_csr_m(csr_index::mstatus, status.0 as u32);

        hart.pc = 0x8000_0004;
        TrapController::initiate_exception(
            &mut hart,
            ExceptionCause::LoadAddrMisaligned,
            0x8000_0004,
            0x1000_0001,
        );

        assert_eq!(hart.priv_mode, PrivilegeMode::Machine);
        assert_eq!(hart.peek_csr(csr_index::mepc), Some(0x8000_0004));
        assert_eq!(hart.peek_csr(csr_index::mcause), Some(4));
        assert_eq!(hart.peek_csr(csr_index::mtval), Some(0x1000_0001));
        assert_eq!(hart.pc, 0x8000_2000);

        let status = StatusFields(hart.peek_csr(csr_index::mstatus).unwrap());
        assert_eq!(status.mie(), 0);
        assert_eq!(status.mpie(), 1);
        assert_eq!(status.mpp(), PrivilegeMode::Machine as u64);
        assert!(hart.has_exception);
    }

    #[test]
    fn test_vectored_interrupt_entry() {
        let mut hart = new_hart();
        hart.write_csr_m(csr_index::mtvec, 0x8000_2000 | 1); // vectored
        hart.pc = 0x8000_0010;
        TrapController::initiate_interrupt(
            &mut hart,
            InterruptCause::MachineTimer,
            0x8000_0010,
        );
        assert_eq!(hart.pc, 0x8000_2000 + 4 * 7);
        assert_eq!(hart.peek_csr(csr_index::mcause), Some(0x8000_0007));
        // Interrupts clear mtval.
        assert_eq!(hart.peek_csr(csr_index::mtval), Some(0));
    }

    #[test]
    fn test_mret_inverts_trap_entry() {
        let mut hart = new_hart();
        hart.write_csr_m(csr_index::mtvec, 0x8000_2000);
        let mut status = StatusFields(hart.read_csr_m(csr_index::mstatus).to_u64());
        status.set_mie(1);
        hart.write_csr_m(csr_index::mstatus, status.0 as u32);

        TrapController::initiate_exception(
            &mut hart,
            ExceptionCause::MachineEnvCall,
            0x8000_0008,
            0,
        );
        TrapController::mret(&mut hart);

        assert_eq!(hart.pc, 0x8000_0008);
        assert_eq!(hart.priv_mode, PrivilegeMode::Machine);
        let status = StatusFields(hart.peek_csr(csr_index::mstatus).unwrap());
        assert_eq!(status.mie(), 1);
        assert_eq!(status.mpie(), 1);
        assert_eq!(status.mpp(), 0);
    }

    #[test]
    fn test_trap_loses_reservation() {
        let mut hart = new_hart();
        hart.has_lr = true;
        TrapController::initiate_exception(&mut hart, ExceptionCause::Breakpoint, 0x8000_0000, 0);
        assert!(!hart.has_lr);
    }

    #[test]
    fn test_nmi_entry() {
        let mut hart = new_hart();
        hart.set_nmi_pc(0x8000_0100);
        hart.set_pending_nmi(crate::isa::riscv::trap::NmiCause::LoadException);
        TrapController::initiate_nmi(&mut hart, 0xF000_0001, 0x8000_0040);

        assert_eq!(hart.pc, 0x8000_0100);
        assert_eq!(hart.peek_csr(csr_index::mcause), Some(0xF000_0001));
        assert_eq!(hart.peek_csr(csr_index::mepc), Some(0x8000_0040));
        assert_eq!(hart.peek_csr(csr_index::mtval), Some(0));
        // nmip cleared in DCSR.
        assert_eq!(hart.peek_csr(csr_index::dcsr).unwrap() >> 3 & 1, 0);
    }
}
