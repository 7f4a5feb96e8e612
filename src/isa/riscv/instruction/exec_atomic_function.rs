//! LR/SC and AMO semantic routines. AMO sequences serialize through the
//! memory subsystem's mutex so they appear atomic across harts.

use crate::isa::riscv::hart::Hart;
use crate::isa::riscv::instruction::exec_function::mask_of;
use crate::isa::riscv::instruction::Operands;
use crate::isa::riscv::trap::{ExceptionCause, ExecResult, StopReason};
use crate::isa::riscv::triggers::TriggerTiming;
use crate::utils::{sign_extend, Word};

/// AMO operator applied between the loaded value and rs2.
pub(super) trait AmoOp {
    fn apply32(loaded: i32, rs2: i32) -> i32;
    fn apply64(loaded: i64, rs2: i64) -> i64;
}

macro_rules! amo_op {
    ($name:ident, |$a:ident, $b:ident| $body32:expr, $body64:expr) => {
        pub(super) struct $name;
        impl AmoOp for $name {
            fn apply32($a: i32, $b: i32) -> i32 {
                $body32
            }
            fn apply64($a: i64, $b: i64) -> i64 {
                $body64
            }
        }
    };
}

amo_op!(AmoAdd, |a, b| a.wrapping_add(b), a.wrapping_add(b));
amo_op!(AmoSwap, |a, b| { let _ = a; b }, { let _ = a; b });
amo_op!(AmoXor, |a, b| a ^ b, a ^ b);
amo_op!(AmoOr, |a, b| a | b, a | b);
amo_op!(AmoAnd, |a, b| a & b, a & b);
amo_op!(AmoMin, |a, b| a.min(b), a.min(b));
amo_op!(AmoMax, |a, b| a.max(b), a.max(b));
amo_op!(AmoMinu, |a, b| ((a as u32).min(b as u32)) as i32, ((a as u64).min(b as u64)) as i64);
amo_op!(AmoMaxu, |a, b| ((a as u32).max(b as u32)) as i32, ((a as u64).max(b as u64)) as i64);

impl<W: Word> Hart<W> {
    /// Word/double-word aligned AMO address, optionally restricted to the
    /// DCCM. Misaligned AMOs raise store-access-fault per the A extension.
    fn validate_amo_addr(&mut self, addr: u64, size: u32) -> bool {
        if addr & (size as u64 - 1) != 0 {
            if !self.trigger_tripped {
                self.initiate_store_exception(ExceptionCause::StoreAccessFault, addr);
            }
            return false;
        }
        if self.amo_illegal_outside_dccm && !self.mem.is_addr_in_dccm(addr) {
            if !self.trigger_tripped {
                self.initiate_store_exception(ExceptionCause::StoreAccessFault, addr);
            }
            return false;
        }
        true
    }

    /// Load half of an AMO; failures raise store-access-fault.
    fn amo_load(&mut self, rs1: u8, size: u32) -> Option<W> {
        let addr = self.int_regs.read(rs1).to_u64();

        self.load_addr = addr;
        self.load_addr_valid = true;

        if self.load_queue_enabled {
            self.remove_from_load_queue(rs1);
        }

        if !self.validate_amo_addr(addr, size) {
            self.force_access_fail = false;
            return None;
        }

        if !self.force_access_fail {
            if let Ok(raw) = self.mem.read(addr, size) {
                return Some(W::from_i64(sign_extend(raw, size * 8)));
            }
        }

        self.initiate_load_exception(ExceptionCause::StoreAccessFault, addr, size);
        None
    }
}

pub(super) fn exec_lr<W: Word, const SIZE: u32>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let Operands::A { rd, rs1, .. } = ops else {
        unreachable!()
    };
    let addr = hart.int_regs.read(rs1).to_u64();

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

    // A misaligned reservation raises access-fault, not misaligned.
    if addr & (SIZE as u64 - 1) != 0 {
        hart.initiate_load_exception(ExceptionCause::LoadAccessFault, addr, SIZE);
        return Ok(());
    }

    let mut force_fail = hart.force_access_fail;
    if hart.amo_illegal_outside_dccm && !hart.mem.is_addr_in_dccm(addr) {
        force_fail = true;
    }

    if !force_fail {
        if let Ok(raw) = hart.mem.read(addr, SIZE) {
            let value = W::from_i64(sign_extend(raw, SIZE * 8));
            let prev = hart.int_regs.read(rd);
            if hart.load_queue_enabled {
                hart.put_in_load_queue(SIZE, addr, rd, prev);
            }
            hart.int_regs.write(rd, value);

            hart.has_lr = true;
            hart.lr_addr = addr;
            hart.lr_size = SIZE;
            return Ok(());
        }
    }

    hart.initiate_load_exception(ExceptionCause::LoadAccessFault, addr, SIZE);
    Ok(())
}

pub(super) fn exec_sc<W: Word, const SIZE: u32>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let Operands::A { rd, rs1, rs2, .. } = ops else {
        unreachable!()
    };
    let addr = hart.int_regs.read(rs1).to_u64();
    let value = hart.int_regs.read(rs2).to_u64() & mask_of(SIZE);

    let stored = store_conditional(hart, addr, value, SIZE)?;
    if stored {
        hart.has_lr = false;
        hart.int_regs.write(rd, W::ZERO); // success
        return Ok(());
    }

    hart.has_lr = false;
    if hart.has_exception || hart.trigger_tripped {
        return Ok(());
    }
    hart.int_regs.write(rd, W::ONE); // failure
    Ok(())
}

fn store_conditional<W: Word>(
    hart: &mut Hart<W>,
    addr: u64,
    value: u64,
    size: u32,
) -> Result<bool, StopReason> {
    let has_trig = hart.enable_triggers && hart.triggers.has_active_trigger();
    let ie = hart.is_interrupt_enabled();
    if has_trig
        && hart
            .triggers
            .ld_st_addr_trigger_hit(addr, TriggerTiming::Before, false, ie)
    {
        hart.trigger_tripped = true;
    }

    // Misaligned SC raises access-fault.
    let misal = addr & (size as u64 - 1) != 0;
    hart.misaligned_ld_st = misal;
    if misal {
        if hart.trigger_tripped {
            return Ok(false);
        }
        hart.initiate_store_exception(ExceptionCause::StoreAccessFault, addr);
        return Ok(false);
    }

    if hart.amo_illegal_outside_dccm && !hart.mem.is_addr_in_dccm(addr) {
        if hart.trigger_tripped {
            return Ok(false);
        }
        hart.initiate_store_exception(ExceptionCause::StoreAccessFault, addr);
        return Ok(false);
    }

    if has_trig && !hart.force_access_fail {
        if let Some(masked) = hart.mem.check_write(addr, value, size) {
            if hart
                .triggers
                .ld_st_data_trigger_hit(masked, TriggerTiming::Before, false, ie)
            {
                hart.trigger_tripped = true;
            }
        }
    }
    if hart.trigger_tripped {
        return Ok(false);
    }

    // The store commits only while the reservation is intact.
    if !hart.has_lr || addr != hart.lr_addr {
        return Ok(false);
    }

    if !hart.force_access_fail && hart.mem.write(addr, value, size).is_ok() {
        if let Some(to_host) = hart.to_host {
            if addr == to_host && value != 0 {
                return Err(StopReason::ToHost(value));
            }
        }
        if hart.max_store_queue_size > 0 {
            let prev = hart.mem.last_write_old_value();
            hart.put_in_store_queue(size, addr, value, prev);
        }
        return Ok(true);
    }

    hart.initiate_store_exception(ExceptionCause::StoreAccessFault, addr);
    Ok(false)
}

pub(super) fn exec_amo<W: Word, const SIZE: u32, F: AmoOp>(
    hart: &mut Hart<W>,
    ops: Operands,
) -> ExecResult {
    let Operands::A { rd, rs1, rs2, .. } = ops else {
        unreachable!()
    };

    // Serialize the load-modify-store against other harts.
    let mutex = hart.mem.amo_mutex();
    let _guard = mutex.lock().unwrap();

    let Some(loaded) = hart.amo_load(rs1, SIZE) else {
        return Ok(());
    };

    let addr = hart.int_regs.read(rs1).to_u64();
    let rs2_val = hart.int_regs.read(rs2);

    let result = if SIZE == 4 {
        F::apply32(loaded.to_u64() as u32 as i32, rs2_val.to_u64() as u32 as i32) as u32 as u64
    } else {
        F::apply64(loaded.to_i64(), rs2_val.to_i64()) as u64
    };

    let store_ok = hart.store_common(addr, addr, result & mask_of(SIZE), SIZE)?;
    if store_ok && !hart.trigger_tripped {
        hart.int_regs.write(rd, loaded);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amo_ops() {
        assert_eq!(AmoAdd::apply32(3, 4), 7);
        assert_eq!(AmoSwap::apply32(3, 4), 4);
        assert_eq!(AmoMin::apply32(-5, 3), -5);
        assert_eq!(AmoMinu::apply32(-5, 3), 3); // unsigned compare
        assert_eq!(AmoMax::apply64(-5, 3), 3);
        assert_eq!(AmoMaxu::apply64(-5, 3), -5); // 0xFF..FB > 3 unsigned
    }
}
