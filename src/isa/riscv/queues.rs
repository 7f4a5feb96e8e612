//! Load and store speculation queues.
//!
//! Loads and stores to addresses outside the DCCM are recorded in bounded
//! FIFOs so that architectural state can be rolled back (or replayed) when
//! the memory subsystem later reports an asynchronous bus error, and trimmed
//! as the test bench reports non-faulting completions.

use crate::isa::riscv::csr_reg::csr_index;
use crate::isa::riscv::hart::Hart;
use crate::isa::riscv::trap::NmiCause;
use crate::utils::Word;

/// An in-flight store: the written bytes and the bytes they replaced.
#[derive(Debug, Clone, Copy)]
pub struct StoreEntry {
    pub size: u32,
    pub addr: u64,
    pub new_data: u64,
    pub prev_data: u64,
}

impl StoreEntry {
    fn new(size: u32, addr: u64, new_data: u64, prev_data: u64) -> Self {
        Self {
            size,
            addr,
            new_data,
            prev_data,
        }
    }

    fn contains(&self, addr: u64) -> bool {
        addr >= self.addr && addr < self.addr + self.size as u64
    }
}

/// An in-flight load: target register and its pre-load value.
#[derive(Debug, Clone, Copy)]
pub struct LoadEntry<W> {
    pub size: u32,
    pub addr: u64,
    pub reg_ix: u8,
    pub prev_data: W,
    pub valid: bool,
}

impl<W: Word> LoadEntry<W> {
    fn new(size: u32, addr: u64, reg_ix: u8, prev_data: W) -> Self {
        Self {
            size,
            addr,
            reg_ix,
            prev_data,
            valid: true,
        }
    }

    fn contains(&self, addr: u64) -> bool {
        addr >= self.addr && addr < self.addr + self.size as u64
    }

    fn make_invalid(&mut self) {
        self.valid = false;
    }
}

impl<W: Word> Hart<W> {
    /// Append a store record. DCCM stores are never enqueued; the queue is a
    /// FIFO that drops its oldest entry when full.
    pub(crate) fn put_in_store_queue(&mut self, size: u32, addr: u64, data: u64, prev_data: u64) {
        if self.max_store_queue_size == 0 || self.mem.is_last_write_to_dccm() {
            return;
        }

        if self.store_queue.len() >= self.max_store_queue_size {
            self.store_queue.remove(0);
        }
        self.store_queue
            .push(StoreEntry::new(size, addr, data, prev_data));
    }

    /// Append a load record. A DCCM load completes immediately (blocking):
    /// its target register must no longer be revertible.
    pub(crate) fn put_in_load_queue(&mut self, size: u32, addr: u64, reg_ix: u8, prev: W) {
        if !self.load_queue_enabled {
            return;
        }

        if self.mem.is_addr_in_dccm(addr) {
            self.invalidate_in_load_queue(reg_ix);
            return;
        }

        if self.load_queue.len() >= self.max_load_queue_size {
            self.load_queue.remove(0);
        }
        self.load_queue.push(LoadEntry::new(size, addr, reg_ix, prev));
    }

    /// Mark every entry targeting `reg_ix` invalid so a later load exception
    /// will not revert the register.
    pub(crate) fn invalidate_in_load_queue(&mut self, reg_ix: u8) {
        for entry in &mut self.load_queue {
            if entry.reg_ix == reg_ix {
                entry.make_invalid();
            }
        }
    }

    /// A register consumed as a source has necessarily waited for its
    /// pending load: drop the youngest matching entry, invalidate the rest.
    pub(crate) fn remove_from_load_queue(&mut self, reg_ix: u8) {
        if reg_ix == 0 {
            return;
        }

        let mut last = true;
        let mut remove_ix = None;
        for i in (0..self.load_queue.len()).rev() {
            let entry = &mut self.load_queue[i];
            if !entry.valid {
                continue;
            }
            if entry.reg_ix == reg_ix {
                if last {
                    remove_ix = Some(i);
                    last = false;
                } else {
                    entry.make_invalid();
                }
            }
        }

        if let Some(ix) = remove_ix {
            self.load_queue.remove(ix);
        }
    }

    /// The test bench reports a bus error on a store to `addr`. Latch
    /// MDSEAC, post the NMI, and undo/replay the store queue. Returns false
    /// when the queue does not contain exactly one matching entry.
    pub fn apply_store_exception(&mut self, addr: u64) -> (bool, u32) {
        if !self.csr.mdseac_locked() {
            self.csr.poke(csr_index::mdseac, W::from_u64(addr));
            self.csr.lock_mdseac(true);
            self.set_pending_nmi(NmiCause::StoreException);
        }
        // Always record the (possibly suppressed) change; the bench contract
        // wants the CSR-write log entry either way.
        self.csr.record_write(csr_index::mdseac);

        if !self.store_error_rollback {
            return (true, 1);
        }

        let matches = self
            .store_queue
            .iter()
            .filter(|e| e.contains(addr))
            .count() as u32;

        if matches != 1 {
            if matches == 0 {
                log::error!(
                    "Store exception at {:#x} does not match any address in the store queue",
                    addr
                );
            } else {
                log::error!(
                    "Store exception at {:#x} matches {} entries in the store queue",
                    addr,
                    matches
                );
            }
            return (false, matches);
        }

        // Undo the matching store up to the next double-word boundary, then
        // replay the covered bytes of every younger store.
        let mut hit = false;
        let undo_begin = addr;
        let mut undo_end = 0u64;
        let mut remove_ix = self.store_queue.len();

        for ix in 0..self.store_queue.len() {
            let entry = self.store_queue[ix];
            let entry_end = entry.addr + entry.size as u64;
            if hit {
                // Replay portions of younger transactions covering the
                // undone bytes.
                let mut data = entry.new_data;
                let mut ba = entry.addr;
                while ba < entry_end {
                    if ba >= undo_begin && ba < undo_end {
                        self.poke_memory(ba, data & 0xFF, 1);
                    }
                    ba += 1;
                    data >>= 8;
                }
            } else if entry.contains(addr) {
                hit = true;
                remove_ix = ix;
                let offset = addr - entry.addr;
                let mut prev_data = entry.prev_data >> (offset * 8);
                let mut new_data = entry.new_data >> (offset * 8);
                let mut at = addr;
                let mut i = offset as u32;
                while i < entry.size {
                    self.poke_memory(at, prev_data & 0xFF, 1);
                    at += 1;
                    prev_data >>= 8;
                    new_data >>= 8;
                    undo_end = at;
                    if at & 7 != 0 {
                        i += 1;
                        continue;
                    }
                    // Reached a double word boundary: trim and keep the rest
                    // of the store record.
                    if i + 1 < entry.size {
                        self.store_queue[ix] =
                            StoreEntry::new(entry.size - i - 1, at, new_data, prev_data);
                        remove_ix = self.store_queue.len(); // Squash removal.
                    }
                    break;
                }
            }
        }

        if remove_ix < self.store_queue.len() {
            self.store_queue.remove(remove_ix);
        }

        (true, matches)
    }

    /// The test bench reports a bus error on a load from `addr`. Latch
    /// MDSEAC, post the NMI, and revert the target register unless a younger
    /// load overwrote it. Returns false unless exactly one entry matches
    /// (invalid entries count toward the match total).
    pub fn apply_load_exception(&mut self, addr: u64) -> (bool, u32) {
        if !self.csr.mdseac_locked() {
            self.csr.poke(csr_index::mdseac, W::from_u64(addr));
            self.csr.lock_mdseac(true);
            self.set_pending_nmi(NmiCause::LoadException);
        }
        self.csr.record_write(csr_index::mdseac);

        if !self.load_error_rollback {
            return (true, 1);
        }

        // Count matching entries; find whether a younger entry targets the
        // same register as the first (valid) match.
        let mut has_younger = false;
        let mut target_reg = 0u8;
        let mut matches = 0u32;
        let mut invalid_matches = 0u32;
        for entry in &self.load_queue {
            if matches != 0 && entry.valid && entry.reg_ix == target_reg {
                has_younger = true;
            }
            if entry.contains(addr) {
                if entry.valid {
                    target_reg = entry.reg_ix;
                    matches += 1;
                } else {
                    invalid_matches += 1;
                }
            }
        }

        matches += invalid_matches;
        if matches != 1 {
            if matches == 0 {
                log::error!(
                    "Load exception at {:#x} does not match any entry in the load queue",
                    addr
                );
            } else {
                log::error!(
                    "Load exception at {:#x} matches {} entries in the load queue",
                    addr,
                    matches
                );
            }
            return (false, matches);
        }

        let mut remove_ix = self.load_queue.len();
        for ix in 0..self.load_queue.len() {
            if !self.load_queue[ix].contains(addr) {
                continue;
            }
            remove_ix = ix;
            if !self.load_queue[ix].valid {
                continue;
            }

            let entry = self.load_queue[ix];
            let mut prev = entry.prev_data;

            // Revert to the oldest prior value for this target register,
            // invalidating older entries with the same target.
            for ix2 in (0..ix).rev() {
                let entry2 = &mut self.load_queue[ix2];
                if entry2.valid && entry2.reg_ix == entry.reg_ix {
                    prev = entry2.prev_data;
                    entry2.make_invalid();
                }
            }

            if !has_younger {
                self.int_regs.poke(entry.reg_ix, prev);
            }

            // Update the prev-data of the nearest younger entry with the
            // same target register.
            for ix2 in ix + 1..self.load_queue.len() {
                let entry2 = &mut self.load_queue[ix2];
                if entry2.valid && entry2.reg_ix == entry.reg_ix {
                    entry2.prev_data = prev;
                    break;
                }
            }
            break;
        }

        if remove_ix < self.load_queue.len() {
            self.load_queue.remove(remove_ix);
        }

        (true, matches)
    }

    /// The test bench reports a non-faulting load completion. Drop the
    /// matching entry (oldest or newest per `match_oldest`) and fix up the
    /// prev-values of its neighbors so later exceptions still roll back to
    /// the right value.
    pub fn apply_load_finished(&mut self, addr: u64, match_oldest: bool) -> (bool, u32) {
        if !self.load_error_rollback {
            return (true, 1);
        }

        let mut matches = 0u32;
        let mut match_ix = 0usize;
        for (i, entry) in self.load_queue.iter().enumerate() {
            if entry.addr == addr {
                if !match_oldest || matches == 0 {
                    match_ix = i;
                }
                matches += 1;
            }
        }

        if matches == 0 {
            log::warn!(
                "Load finished at {:#x} does not match any entry in the load queue",
                addr
            );
            return (true, 0);
        }

        let entry = self.load_queue[match_ix];

        // Invalidate all earlier entries with the same target register and
        // find the earliest previous value of that register.
        let target_reg = entry.reg_ix;
        let mut prev = entry.prev_data;
        let mut prev_ix = match_ix;
        for j in 0..match_ix {
            let li = &mut self.load_queue[j];
            if !li.valid || li.reg_ix != target_reg {
                continue;
            }
            li.make_invalid();
            if j < prev_ix {
                prev_ix = j;
                prev = li.prev_data;
            }
        }

        // Update the prev-data of the first subsequent entry with the same
        // target.
        if entry.valid {
            for j in match_ix + 1..self.load_queue.len() {
                let li = &mut self.load_queue[j];
                if li.valid && li.reg_ix == target_reg {
                    li.prev_data = prev;
                    break;
                }
            }
        }

        self.load_queue.remove(match_ix);
        (true, matches)
    }
}

#[cfg(test)]
mod tests {
    use crate::isa::riscv::csr_reg::csr_index;
    use crate::isa::riscv::hart::Hart;
    use crate::mem::{Memory, SimpleMemory};

    const BASE: u64 = 0x8000_0000;

    fn hart_with_queues() -> Hart<u32> {
        let mut hart = Hart::new(0, Box::new(SimpleMemory::new()));
        hart.enable_load_queue(true);
        hart
    }

    #[test]
    fn test_store_queue_is_bounded() {
        let mut hart = hart_with_queues();
        hart.set_store_queue_size(2);
        hart.mem.write(BASE, 1, 4).unwrap();
        hart.put_in_store_queue(4, BASE, 1, 0);
        hart.mem.write(BASE + 4, 2, 4).unwrap();
        hart.put_in_store_queue(4, BASE + 4, 2, 0);
        hart.mem.write(BASE + 8, 3, 4).unwrap();
        hart.put_in_store_queue(4, BASE + 8, 3, 0);
        assert_eq!(hart.store_queue.len(), 2);
        assert_eq!(hart.store_queue[0].addr, BASE + 4);
    }

    #[test]
    fn test_dccm_stores_not_enqueued() {
        let mut mem = SimpleMemory::new();
        mem.define_dccm(BASE + 0x1000, 0x1000);
        let mut hart: Hart<u32> = Hart::new(0, Box::new(mem));
        hart.enable_load_queue(true);
        hart.mem.write(BASE + 0x1000, 9, 4).unwrap();
        hart.put_in_store_queue(4, BASE + 0x1000, 9, 0);
        assert!(hart.store_queue.is_empty());
    }

    #[test]
    fn test_apply_store_exception_rolls_back() {
        let mut hart = hart_with_queues();
        // Two stores to the same word; fault the second.
        hart.mem.write(BASE, 0x1111_1111, 4).unwrap();
        hart.put_in_store_queue(4, BASE, 0x1111_1111, 0);
        hart.mem.write(BASE, 0x2222_2222, 4).unwrap();
        hart.put_in_store_queue(4, BASE, 0x2222_2222, 0x1111_1111);

        // Two matches: error reported.
        let (ok, matches) = hart.apply_store_exception(BASE);
        assert!(!ok);
        assert_eq!(matches, 2);

        // MDSEAC latched and locked, NMI pending.
        assert_eq!(hart.peek_csr(csr_index::mdseac), Some(BASE));
        assert!(hart.nmi_pending);
        assert!(hart.csr.mdseac_locked());

        // With a single entry the store is undone.
        hart.store_queue.remove(0);
        let (ok, matches) = hart.apply_store_exception(BASE);
        assert!(ok);
        assert_eq!(matches, 1);
        assert_eq!(hart.mem.read(BASE, 4).unwrap(), 0x1111_1111);
        assert!(hart.store_queue.is_empty());
    }

    #[test]
    fn test_apply_store_exception_replays_younger_stores() {
        let mut hart = hart_with_queues();
        // Store A writes bytes 0..4, store B overlaps byte 2.
        hart.mem.write(BASE, 0xAAAA_AAAA, 4).unwrap();
        hart.put_in_store_queue(4, BASE, 0xAAAA_AAAA, 0x0000_0000);
        hart.mem.write(BASE + 2, 0xBB, 1).unwrap();
        hart.put_in_store_queue(1, BASE + 2, 0xBB, 0xAA);

        // Fault store A at its base address: its bytes are restored, then
        // store B's byte is replayed on top.
        let (ok, _) = hart.apply_store_exception(BASE);
        assert!(ok);
        assert_eq!(hart.mem.read(BASE, 4).unwrap(), 0x00BB_0000);
        // Only store B remains.
        assert_eq!(hart.store_queue.len(), 1);
        assert_eq!(hart.store_queue[0].size, 1);
    }

    #[test]
    fn test_apply_load_exception_reverts_register() {
        let mut hart = hart_with_queues();
        hart.poke_int_reg(5, 111);
        hart.put_in_load_queue(4, BASE + 0x10, 5, 111);
        hart.poke_int_reg(5, 222); // value produced by the load

        let (ok, matches) = hart.apply_load_exception(BASE + 0x10);
        assert!(ok);
        assert_eq!(matches, 1);
        assert_eq!(hart.peek_int_reg(5), Some(111));
        assert!(hart.load_queue.is_empty());
        assert!(hart.nmi_pending);
    }

    #[test]
    fn test_apply_load_exception_skips_revert_with_younger_load() {
        let mut hart = hart_with_queues();
        hart.poke_int_reg(5, 111);
        hart.put_in_load_queue(4, BASE + 0x10, 5, 111);
        hart.poke_int_reg(5, 222);
        hart.put_in_load_queue(4, BASE + 0x20, 5, 222);
        hart.poke_int_reg(5, 333);

        // Fault the older load: the younger one owns the register now, so
        // no revert; the younger entry's prev-value becomes the older's.
        let (ok, _) = hart.apply_load_exception(BASE + 0x10);
        assert!(ok);
        assert_eq!(hart.peek_int_reg(5), Some(333));
        assert_eq!(hart.load_queue.len(), 1);
        assert_eq!(hart.load_queue[0].prev_data, 111);
    }

    #[test]
    fn test_remove_from_load_queue_drops_youngest() {
        let mut hart = hart_with_queues();
        hart.put_in_load_queue(4, BASE, 5, 1);
        hart.put_in_load_queue(4, BASE + 4, 5, 2);
        hart.remove_from_load_queue(5);
        // Youngest removed; the older entry is invalidated.
        assert_eq!(hart.load_queue.len(), 1);
        assert!(!hart.load_queue[0].valid);
    }

    #[test]
    fn test_apply_load_finished_fixes_prev_values() {
        let mut hart = hart_with_queues();
        hart.put_in_load_queue(4, BASE, 7, 10);
        hart.put_in_load_queue(4, BASE + 4, 7, 20);
        // Oldest load completes cleanly: younger entry must now roll back
        // all the way to the oldest prev-value.
        let (ok, matches) = hart.apply_load_finished(BASE, true);
        assert!(ok);
        assert_eq!(matches, 1);
        assert_eq!(hart.load_queue.len(), 1);
        assert_eq!(hart.load_queue[0].prev_data, 10);
    }
}
