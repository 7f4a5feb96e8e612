pub mod perf;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::utils::Word;

#[rustfmt::skip]
#[allow(non_upper_case_globals)]
pub mod csr_index {
    // User floating-point
    pub const fflags      : u16 = 0x001;
    pub const frm         : u16 = 0x002;
    pub const fcsr        : u16 = 0x003;

    // User trap setup/handling
    pub const ustatus     : u16 = 0x000;
    pub const uie         : u16 = 0x004;
    pub const utvec       : u16 = 0x005;
    pub const uscratch    : u16 = 0x040;
    pub const uepc        : u16 = 0x041;
    pub const ucause      : u16 = 0x042;
    pub const utval       : u16 = 0x043;
    pub const uip         : u16 = 0x044;

    // User counters
    pub const cycle       : u16 = 0xC00;
    pub const time        : u16 = 0xC01;
    pub const instret     : u16 = 0xC02;
    pub const cycleh      : u16 = 0xC80;
    pub const timeh       : u16 = 0xC81;
    pub const instreth    : u16 = 0xC82;

    // Supervisor
    pub const sstatus     : u16 = 0x100;
    pub const sedeleg     : u16 = 0x102;
    pub const sideleg     : u16 = 0x103;
    pub const sie         : u16 = 0x104;
    pub const stvec       : u16 = 0x105;
    pub const scounteren  : u16 = 0x106;
    pub const sscratch    : u16 = 0x140;
    pub const sepc        : u16 = 0x141;
    pub const scause      : u16 = 0x142;
    pub const stval       : u16 = 0x143;
    pub const sip         : u16 = 0x144;
    pub const satp        : u16 = 0x180;

    // Machine information
    pub const mvendorid   : u16 = 0xF11;
    pub const marchid     : u16 = 0xF12;
    pub const mimpid      : u16 = 0xF13;
    pub const mhartid     : u16 = 0xF14;

    // Machine trap setup/handling
    pub const mstatus     : u16 = 0x300;
    pub const misa        : u16 = 0x301;
    pub const medeleg     : u16 = 0x302;
    pub const mideleg     : u16 = 0x303;
    pub const mie         : u16 = 0x304;
    pub const mtvec       : u16 = 0x305;
    pub const mcounteren  : u16 = 0x306;
    pub const mscratch    : u16 = 0x340;
    pub const mepc        : u16 = 0x341;
    pub const mcause      : u16 = 0x342;
    pub const mtval       : u16 = 0x343;
    pub const mip         : u16 = 0x344;

    // Machine protection
    pub const pmpcfg0     : u16 = 0x3A0;
    pub const pmpaddr0    : u16 = 0x3B0;

    // Machine counters
    pub const mcycle      : u16 = 0xB00;
    pub const minstret    : u16 = 0xB02;
    pub const mhpmcounter3: u16 = 0xB03;   // ..0xB1F
    pub const mcycleh     : u16 = 0xB80;
    pub const minstreth   : u16 = 0xB82;
    pub const mhpmcounter3h: u16 = 0xB83;  // ..0xB9F
    pub const mhpmevent3  : u16 = 0x323;   // ..0x33F

    // Debug/trigger
    pub const tselect     : u16 = 0x7A0;
    pub const tdata1      : u16 = 0x7A1;
    pub const tdata2      : u16 = 0x7A2;
    pub const tdata3      : u16 = 0x7A3;
    pub const dcsr        : u16 = 0x7B0;
    pub const dpc         : u16 = 0x7B1;
    pub const dscratch    : u16 = 0x7B2;

    // Implementation defined
    pub const mrac        : u16 = 0x7C0;
    pub const mgpmc       : u16 = 0x7D0;
    pub const mdseac      : u16 = 0xFC0;
    pub const meihap      : u16 = 0xFC8;
}

/// Privilege level of a hart. The numeric values are the MPP/SPP encodings.
#[repr(u8)]
#[derive(Debug, PartialEq, PartialOrd, Ord, Eq, Clone, Copy)]
pub enum PrivilegeMode {
    User = 0,
    Supervisor = 1,
    Machine = 3,
}

impl From<u8> for PrivilegeMode {
    fn from(value: u8) -> PrivilegeMode {
        match value {
            0 => PrivilegeMode::User,
            1 => PrivilegeMode::Supervisor,
            3 => PrivilegeMode::Machine,
            _ => {
                log::warn!("Invalid privilege encoding {}, treating as user", value);
                PrivilegeMode::User
            }
        }
    }
}

/// Minimum privilege required to access a CSR, from address bits 9:8.
pub fn min_privilege(number: u16) -> PrivilegeMode {
    match (number >> 8) & 3 {
        0 => PrivilegeMode::User,
        1 => PrivilegeMode::Supervisor,
        _ => PrivilegeMode::Machine,
    }
}

/// Is the CSR read-only to CSR instructions (address bits 11:10 == 0b11)?
pub fn is_read_only(number: u16) -> bool {
    (number >> 10) & 3 == 3
}

/// CSR backing storage: a word owned by the descriptor, or a live 64-bit
/// counter owned by the hart (tied). A tied CSR observes counter increments
/// with no explicit synchronization; on RV32 `high` selects the upper half.
enum CsrStorage<W: Word> {
    Owned(W),
    Tied { cell: Arc<AtomicU64>, high: bool },
}

impl<W: Word> CsrStorage<W> {
    fn load(&self) -> W {
        match self {
            CsrStorage::Owned(v) => *v,
            CsrStorage::Tied { cell, high } => {
                let v = cell.load(Ordering::Relaxed);
                W::from_u64(if *high { v >> 32 } else { v })
            }
        }
    }

    fn store(&mut self, value: W) {
        match self {
            CsrStorage::Owned(v) => *v = value,
            CsrStorage::Tied { cell, high } => {
                if W::XLEN == 64 {
                    cell.store(value.to_u64(), Ordering::Relaxed);
                } else {
                    let old = cell.load(Ordering::Relaxed);
                    let v = if *high {
                        (old & 0xFFFF_FFFF) | (value.to_u64() << 32)
                    } else {
                        (old & !0xFFFF_FFFF) | value.to_u64()
                    };
                    cell.store(v, Ordering::Relaxed);
                }
            }
        }
    }
}

/// One control-and-status register.
pub struct Csr<W: Word> {
    pub name: &'static str,
    pub number: u16,
    pub implemented: bool,
    pub debug_only: bool,
    pub reset_value: W,
    pub write_mask: W,
    pub poke_mask: W,
    storage: CsrStorage<W>,
    prev_value: W,
}

impl<W: Word> Csr<W> {
    fn new(
        name: &'static str,
        number: u16,
        reset_value: W,
        write_mask: W,
        poke_mask: W,
    ) -> Self {
        Self {
            name,
            number,
            implemented: true,
            debug_only: false,
            reset_value,
            write_mask,
            poke_mask,
            storage: CsrStorage::Owned(reset_value),
            prev_value: reset_value,
        }
    }

    pub fn read(&self) -> W {
        self.storage.load()
    }

    /// Masked write, recording the previous value for rollback.
    fn write(&mut self, value: W) {
        let old = self.storage.load();
        self.prev_value = old;
        let new = (old & !self.write_mask) | (value & self.write_mask);
        self.storage.store(new);
    }

    /// Masked write that does not record.
    fn poke(&mut self, value: W) {
        let old = self.storage.load();
        let new = (old & !self.poke_mask) | (value & self.poke_mask);
        self.storage.store(new);
    }

    pub fn prev_value(&self) -> W {
        self.prev_value
    }

    fn reset(&mut self) {
        self.storage.store(self.reset_value);
        self.prev_value = self.reset_value;
    }
}

const FFLAGS_MASK: u64 = 0x1F;
const FRM_SHIFT: u32 = 5;
const FRM_MASK: u64 = 0x7;

/// Sparse CSR file of one hart.
pub struct CsrRegFile<W: Word> {
    regs: HashMap<u16, Csr<W>>,
    /// CSR numbers written since the last trace flush.
    last_written: Vec<u16>,
    /// `(trigger index, tdata CSR number)` writes since the last flush.
    last_written_triggers: Vec<(u32, u16)>,
    mdseac_locked: bool,
}

impl<W: Word> CsrRegFile<W> {
    pub fn new() -> Self {
        let mut file = Self {
            regs: HashMap::new(),
            last_written: Vec::new(),
            last_written_triggers: Vec::new(),
            mdseac_locked: false,
        };
        file.define_all();
        file
    }

    fn define(&mut self, name: &'static str, number: u16, reset: u64, write_mask: u64, poke_mask: u64) {
        let csr = Csr::new(
            name,
            number,
            W::from_u64(reset),
            W::from_u64(write_mask),
            W::from_u64(poke_mask),
        );
        self.regs.insert(number, csr);
    }

    fn define_all(&mut self) {
        use csr_index::*;

        let all = u64::MAX;

        // Machine information.
        self.define("mvendorid", mvendorid, 0, 0, 0);
        self.define("marchid", marchid, 0, 0, 0);
        self.define("mimpid", mimpid, 0, 0, 0);
        self.define("mhartid", mhartid, 0, 0, 0); // Constant; reset set at build.

        // Machine trap setup.
        self.define("mstatus", mstatus, 0, 0x007E_79BB, 0x007E_79BB);
        self.define("misa", misa, 0, 0, all);
        self.define("medeleg", medeleg, 0, all, all);
        self.define("mideleg", mideleg, 0, all, all);
        self.define("mie", mie, 0, 0x7000_0AAA, 0x7000_0AAA);
        self.define("mtvec", mtvec, 0, !2u64, !2u64);
        self.define("mcounteren", mcounteren, 0, all, all);

        // Machine trap handling.
        self.define("mscratch", mscratch, 0, all, all);
        self.define("mepc", mepc, 0, !1u64, !1u64);
        self.define("mcause", mcause, 0, all, all);
        self.define("mtval", mtval, 0, all, all);
        // Interrupt-pending bits are owned by the platform: read-only to
        // CSR instructions, settable by poke.
        self.define("mip", mip, 0, 0, 0x7000_0AAA);

        // Machine protection.
        for i in 0..4u16 {
            self.define(pmp_cfg_name(i), pmpcfg0 + i, 0, all, all);
        }
        for i in 0..16u16 {
            self.define(pmp_addr_name(i), pmpaddr0 + i, 0, all, all);
        }

        // Machine counters (storage tied at hart construction).
        self.define("mcycle", mcycle, 0, all, all);
        self.define("minstret", minstret, 0, all, all);
        for i in 0..29u16 {
            self.define(hpm_counter_name(i), mhpmcounter3 + i, 0, all, all);
            self.define(hpm_event_name(i), mhpmevent3 + i, 0, all, all);
        }
        if W::XLEN == 32 {
            self.define("mcycleh", mcycleh, 0, all, all);
            self.define("minstreth", minstreth, 0, all, all);
            for i in 0..29u16 {
                self.define(hpm_counter_h_name(i), mhpmcounter3h + i, 0, all, all);
            }
        }

        // Supervisor.
        self.define("sstatus", sstatus, 0, 0x000C_6122, 0x000C_6122);
        self.define("sedeleg", sedeleg, 0, all, all);
        self.define("sideleg", sideleg, 0, all, all);
        self.define("sie", sie, 0, 0x0222, 0x0222);
        self.define("stvec", stvec, 0, !2u64, !2u64);
        self.define("scounteren", scounteren, 0, all, all);
        self.define("sscratch", sscratch, 0, all, all);
        self.define("sepc", sepc, 0, !1u64, !1u64);
        self.define("scause", scause, 0, all, all);
        self.define("stval", stval, 0, all, all);
        self.define("sip", sip, 0, 0, 0x0222);
        self.define("satp", satp, 0, all, all);

        // User trap setup/handling.
        self.define("ustatus", ustatus, 0, 0x0011, 0x0011);
        self.define("uie", uie, 0, 0x0111, 0x0111);
        self.define("utvec", utvec, 0, !2u64, !2u64);
        self.define("uscratch", uscratch, 0, all, all);
        self.define("uepc", uepc, 0, !1u64, !1u64);
        self.define("ucause", ucause, 0, all, all);
        self.define("utval", utval, 0, all, all);
        self.define("uip", uip, 0, 0, 0x0111);

        // User FP (enabled at reset when F is on).
        self.define("fflags", fflags, 0, 0x1F, 0x1F);
        self.define("frm", frm, 0, 0x7, 0x7);
        self.define("fcsr", fcsr, 0, 0xFF, 0xFF);

        // User counters (read-only shadows; tied at hart construction).
        self.define("cycle", cycle, 0, 0, all);
        self.define("time", time, 0, 0, all);
        self.define("instret", instret, 0, 0, all);
        if W::XLEN == 32 {
            self.define("cycleh", cycleh, 0, 0, all);
            self.define("timeh", timeh, 0, 0, all);
            self.define("instreth", instreth, 0, 0, all);
        }

        // Debug and triggers.
        self.define("tselect", tselect, 0, all, all);
        self.define("tdata1", tdata1, 0, all, all);
        self.define("tdata2", tdata2, 0, all, all);
        self.define("tdata3", tdata3, 0, all, all);
        self.define("dcsr", dcsr, 0x4000_0003, 0x8C04, 0x8DCC);
        self.define("dpc", dpc, 0, !1u64, !1u64);
        self.define("dscratch", dscratch, 0, all, all);
        for num in [dcsr, dpc, dscratch] {
            self.regs.get_mut(&num).unwrap().debug_only = true;
        }

        // Implementation defined.
        self.define("mrac", mrac, 0, all, all);
        self.define("mgpmc", mgpmc, 1, 1, 1);
        self.define("mdseac", mdseac, 0, 0, all);
        // Direct writes preserve the claim-id field (bits 9:2); pokes affect
        // only the claim-id field.
        self.define("meihap", meihap, 0, !0x3FCu64, 0x3FC);
    }

    fn get(&self, number: u16) -> Option<&Csr<W>> {
        self.regs.get(&number).filter(|c| c.implemented)
    }

    fn get_mut(&mut self, number: u16) -> Option<&mut Csr<W>> {
        self.regs.get_mut(&number).filter(|c| c.implemented)
    }

    /// Read for a CSR instruction: fails on unimplemented CSRs, insufficient
    /// privilege, or a debug-only CSR outside debug mode.
    pub fn read(&self, number: u16, priv_mode: PrivilegeMode, debug_mode: bool) -> Option<W> {
        let csr = self.get(number)?;
        if priv_mode < min_privilege(number) {
            return None;
        }
        if csr.debug_only && !debug_mode {
            return None;
        }
        Some(self.read_with_aliases(number, csr))
    }

    fn read_with_aliases(&self, number: u16, csr: &Csr<W>) -> W {
        // fflags and frm are views into fcsr.
        match number {
            csr_index::fflags => {
                let v = self.regs[&csr_index::fcsr].read().to_u64();
                W::from_u64(v & FFLAGS_MASK)
            }
            csr_index::frm => {
                let v = self.regs[&csr_index::fcsr].read().to_u64();
                W::from_u64((v >> FRM_SHIFT) & FRM_MASK)
            }
            _ => csr.read(),
        }
    }

    pub fn is_writeable(&self, number: u16, priv_mode: PrivilegeMode, debug_mode: bool) -> bool {
        if is_read_only(number) {
            return false;
        }
        match self.get(number) {
            Some(csr) => priv_mode >= min_privilege(number) && (!csr.debug_only || debug_mode),
            None => false,
        }
    }

    /// Write for a CSR instruction or the trap unit. Applies the write mask
    /// and records the CSR as changed for tracing.
    pub fn write(
        &mut self,
        number: u16,
        priv_mode: PrivilegeMode,
        debug_mode: bool,
        value: W,
    ) -> bool {
        let Some(csr) = self.get(number) else {
            return false;
        };
        if priv_mode < min_privilege(number) || (csr.debug_only && !debug_mode) {
            return false;
        }

        match number {
            csr_index::fflags => {
                let fcsr = self.regs.get_mut(&csr_index::fcsr).unwrap();
                let old = fcsr.read().to_u64();
                fcsr.write(W::from_u64((old & !FFLAGS_MASK) | (value.to_u64() & FFLAGS_MASK)));
            }
            csr_index::frm => {
                let fcsr = self.regs.get_mut(&csr_index::fcsr).unwrap();
                let old = fcsr.read().to_u64();
                fcsr.write(W::from_u64(
                    (old & !(FRM_MASK << FRM_SHIFT)) | ((value.to_u64() & FRM_MASK) << FRM_SHIFT),
                ));
            }
            _ => self.regs.get_mut(&number).unwrap().write(value),
        }
        self.record_write(number);
        true
    }

    /// Debugger/test-bench write: applies the poke mask, does not record.
    /// A locked MDSEAC ignores pokes until the NMI acknowledgement unlocks
    /// it.
    pub fn poke(&mut self, number: u16, value: W) -> bool {
        if number == csr_index::mdseac && self.mdseac_locked {
            return true;
        }
        match number {
            csr_index::fflags | csr_index::frm => {
                // Route through the fcsr view with the poke mask semantics
                // of the subfield.
                let fcsr = self.regs.get_mut(&csr_index::fcsr).unwrap();
                let old = fcsr.read().to_u64();
                let new = if number == csr_index::fflags {
                    (old & !FFLAGS_MASK) | (value.to_u64() & FFLAGS_MASK)
                } else {
                    (old & !(FRM_MASK << FRM_SHIFT)) | ((value.to_u64() & FRM_MASK) << FRM_SHIFT)
                };
                fcsr.poke(W::from_u64(new));
                true
            }
            _ => match self.get_mut(number) {
                Some(csr) => {
                    csr.poke(value);
                    true
                }
                None => false,
            },
        }
    }

    /// Read without privilege/debug checks (debugger surface).
    pub fn peek(&self, number: u16) -> Option<W> {
        let csr = self.get(number)?;
        Some(self.read_with_aliases(number, csr))
    }

    pub fn prev_value(&self, number: u16) -> Option<W> {
        self.get(number).map(|c| c.prev_value())
    }

    pub fn name_of(&self, number: u16) -> Option<&'static str> {
        self.get(number).map(|c| c.name)
    }

    pub fn find_by_name(&self, name: &str) -> Option<u16> {
        self.regs
            .values()
            .find(|c| c.implemented && c.name == name)
            .map(|c| c.number)
    }

    /// Numbers of all implemented CSRs, ascending.
    pub fn implemented_csrs(&self) -> Vec<u16> {
        let mut nums: Vec<u16> = self
            .regs
            .values()
            .filter(|c| c.implemented)
            .map(|c| c.number)
            .collect();
        nums.sort_unstable();
        nums
    }

    /// Reconfigure a CSR (bench/config surface).
    pub fn config_csr(
        &mut self,
        number: u16,
        implemented: bool,
        reset: W,
        write_mask: W,
        poke_mask: W,
        debug_only: bool,
    ) -> bool {
        match self.regs.get_mut(&number) {
            Some(csr) => {
                csr.implemented = implemented;
                csr.reset_value = reset;
                csr.write_mask = write_mask;
                csr.poke_mask = poke_mask;
                csr.debug_only = debug_only;
                csr.reset();
                true
            }
            None => false,
        }
    }

    pub fn set_reset_value(&mut self, number: u16, reset: W) {
        if let Some(csr) = self.regs.get_mut(&number) {
            csr.reset_value = reset;
        }
    }

    /// Bind a CSR's storage to an externally owned 64-bit counter word.
    pub fn tie_counter(&mut self, number: u16, cell: Arc<AtomicU64>, high: bool) {
        if let Some(csr) = self.regs.get_mut(&number) {
            csr.storage = CsrStorage::Tied { cell, high };
        }
    }

    pub fn record_write(&mut self, number: u16) {
        if !self.last_written.contains(&number) {
            self.last_written.push(number);
        }
    }

    pub fn record_trigger_write(&mut self, trigger_ix: u32, tdata_number: u16) {
        if !self.last_written_triggers.contains(&(trigger_ix, tdata_number)) {
            self.last_written_triggers.push((trigger_ix, tdata_number));
        }
    }

    /// CSRs (and trigger words) written since the last clear.
    pub fn last_written_regs(&self) -> (&[u16], &[(u32, u16)]) {
        (&self.last_written, &self.last_written_triggers)
    }

    pub fn clear_last_written(&mut self) {
        self.last_written.clear();
        self.last_written_triggers.clear();
    }

    pub fn lock_mdseac(&mut self, lock: bool) {
        self.mdseac_locked = lock;
    }

    pub fn mdseac_locked(&self) -> bool {
        self.mdseac_locked
    }

    pub fn reset(&mut self) {
        for csr in self.regs.values_mut() {
            csr.reset();
        }
        self.clear_last_written();
        self.mdseac_locked = false;
    }
}

impl<W: Word> Default for CsrRegFile<W> {
    fn default() -> Self {
        Self::new()
    }
}

fn pmp_cfg_name(i: u16) -> &'static str {
    seq_macro::seq!(N in 0..4 {
        const NAMES: [&str; 4] = [ #(concat!("pmpcfg", stringify!(N)),)* ];
    });
    NAMES[i as usize]
}

fn pmp_addr_name(i: u16) -> &'static str {
    seq_macro::seq!(N in 0..16 {
        const NAMES: [&str; 16] = [ #(concat!("pmpaddr", stringify!(N)),)* ];
    });
    NAMES[i as usize]
}

fn hpm_counter_name(i: u16) -> &'static str {
    seq_macro::seq!(N in 3..=31 {
        const NAMES: [&str; 29] = [ #(concat!("mhpmcounter", stringify!(N)),)* ];
    });
    NAMES[i as usize]
}

fn hpm_counter_h_name(i: u16) -> &'static str {
    seq_macro::seq!(N in 3..=31 {
        const NAMES: [&str; 29] = [ #(concat!("mhpmcounter", stringify!(N), "h"),)* ];
    });
    NAMES[i as usize]
}

fn hpm_event_name(i: u16) -> &'static str {
    seq_macro::seq!(N in 3..=31 {
        const NAMES: [&str; 29] = [ #(concat!("mhpmevent", stringify!(N)),)* ];
    });
    NAMES[i as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_after_write_masked() {
        let mut file = CsrRegFile::<u32>::new();
        assert!(file.write(csr_index::mepc, PrivilegeMode::Machine, false, 0x1235));
        // Bit zero is not writable.
        assert_eq!(
            file.read(csr_index::mepc, PrivilegeMode::Machine, false),
            Some(0x1234)
        );
    }

    #[test]
    fn test_privilege_gating() {
        let mut file = CsrRegFile::<u32>::new();
        assert_eq!(file.read(csr_index::mstatus, PrivilegeMode::User, false), None);
        assert!(!file.write(csr_index::mstatus, PrivilegeMode::Supervisor, false, 1));
        assert!(file.read(csr_index::sstatus, PrivilegeMode::Supervisor, false).is_some());
        assert!(file.read(csr_index::fcsr, PrivilegeMode::User, false).is_some());
    }

    #[test]
    fn test_read_only_csrs() {
        let file = CsrRegFile::<u32>::new();
        assert!(!file.is_writeable(csr_index::mdseac, PrivilegeMode::Machine, false));
        assert!(!file.is_writeable(csr_index::mhartid, PrivilegeMode::Machine, false));
        assert!(!file.is_writeable(csr_index::cycle, PrivilegeMode::Machine, false));
        assert!(file.is_writeable(csr_index::mcycle, PrivilegeMode::Machine, false));
    }

    #[test]
    fn test_debug_only() {
        let mut file = CsrRegFile::<u32>::new();
        assert_eq!(file.read(csr_index::dcsr, PrivilegeMode::Machine, false), None);
        assert_eq!(
            file.read(csr_index::dcsr, PrivilegeMode::Machine, true),
            Some(0x4000_0003)
        );
        assert!(!file.write(csr_index::dcsr, PrivilegeMode::Machine, false, 4));
        assert!(file.write(csr_index::dcsr, PrivilegeMode::Machine, true, 4));
    }

    #[test]
    fn test_fflags_frm_are_fcsr_views() {
        let mut file = CsrRegFile::<u32>::new();
        assert!(file.write(csr_index::fcsr, PrivilegeMode::Machine, false, 0b110_11011));
        assert_eq!(
            file.read(csr_index::fflags, PrivilegeMode::Machine, false),
            Some(0b11011)
        );
        assert_eq!(
            file.read(csr_index::frm, PrivilegeMode::Machine, false),
            Some(0b110)
        );

        assert!(file.write(csr_index::frm, PrivilegeMode::Machine, false, 0b001));
        assert_eq!(
            file.read(csr_index::fcsr, PrivilegeMode::Machine, false),
            Some(0b001_11011)
        );

        assert!(file.write(csr_index::fflags, PrivilegeMode::Machine, false, 0));
        assert_eq!(
            file.read(csr_index::fcsr, PrivilegeMode::Machine, false),
            Some(0b001_00000)
        );
    }

    #[test]
    fn test_tied_counter() {
        let mut file = CsrRegFile::<u32>::new();
        let cell = Arc::new(AtomicU64::new(0));
        file.tie_counter(csr_index::mcycle, cell.clone(), false);
        file.tie_counter(csr_index::mcycleh, cell.clone(), true);

        cell.store(0x1_0000_0005, Ordering::Relaxed);
        assert_eq!(file.peek(csr_index::mcycle), Some(5));
        assert_eq!(file.peek(csr_index::mcycleh), Some(1));

        // Writing the low half keeps the high half.
        assert!(file.write(csr_index::mcycle, PrivilegeMode::Machine, false, 7));
        assert_eq!(cell.load(Ordering::Relaxed), 0x1_0000_0007);
    }

    #[test]
    fn test_meihap_masks() {
        let mut file = CsrRegFile::<u32>::new();
        // Internal write updates the base, leaves claim-id alone.
        file.poke(csr_index::meihap, 0x0000_0154); // claim-id only
        assert_eq!(file.peek(csr_index::meihap), Some(0x154));
        assert!(file.write(csr_index::meihap, PrivilegeMode::Machine, false, 0xABCD_F000));
        assert_eq!(file.peek(csr_index::meihap), Some(0xABCD_F154));
        // Poke only moves claim-id bits.
        file.poke(csr_index::meihap, 0x0000_00A8);
        assert_eq!(file.peek(csr_index::meihap), Some(0xABCD_F0A8));
    }

    #[test]
    fn test_mdseac_lock() {
        let mut file = CsrRegFile::<u32>::new();
        file.poke(csr_index::mdseac, 0x100);
        file.lock_mdseac(true);
        file.poke(csr_index::mdseac, 0x200);
        assert_eq!(file.peek(csr_index::mdseac), Some(0x100));
        file.lock_mdseac(false);
        file.poke(csr_index::mdseac, 0x200);
        assert_eq!(file.peek(csr_index::mdseac), Some(0x200));
    }

    #[test]
    fn test_last_written_recording() {
        let mut file = CsrRegFile::<u32>::new();
        file.write(csr_index::mscratch, PrivilegeMode::Machine, false, 1);
        file.write(csr_index::mscratch, PrivilegeMode::Machine, false, 2);
        file.write(csr_index::mepc, PrivilegeMode::Machine, false, 4);
        let (csrs, triggers) = file.last_written_regs();
        assert_eq!(csrs, &[csr_index::mscratch, csr_index::mepc]);
        assert!(triggers.is_empty());
        file.clear_last_written();
        assert!(file.last_written_regs().0.is_empty());
    }

    #[test]
    fn test_reset_idempotent() {
        let mut file = CsrRegFile::<u64>::new();
        file.write(csr_index::mscratch, PrivilegeMode::Machine, false, 0x123);
        file.reset();
        let snapshot: Vec<(u16, u64)> = file
            .implemented_csrs()
            .iter()
            .map(|n| (*n, file.peek(*n).unwrap()))
            .collect();
        file.reset();
        for (n, v) in snapshot {
            assert_eq!(file.peek(n), Some(v));
        }
        assert_eq!(file.peek(csr_index::mscratch), Some(0));
    }
}
