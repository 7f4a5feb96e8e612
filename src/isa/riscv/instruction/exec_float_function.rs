//! F and D extension semantic routines.
//!
//! Protocol per FP operation: resolve the effective rounding mode (the
//! instruction's rm field, or FCSR.FRM when dynamic; reserved encodings are
//! illegal), run the soft-float op, then OR the raised status flags into
//! FCSR's accrued-flags field.

use rustc_apfloat::ieee::{Double, Single};
use rustc_apfloat::{Float, Status};

use crate::fpu::soft_float::{
    classify, convert, fmax, fmin, from_signed, from_unsigned, sign_inject, sign_inject_neg,
    sign_inject_xor, status_to_flags, to_signed, to_unsigned, BinaryOpR, CmpOp, HostSqrt,
    TernaryOpR,
};
use crate::fpu::Round;
use crate::isa::riscv::csr_reg::csr_index;
use crate::isa::riscv::hart::{Hart, IsaFlags};
use crate::isa::riscv::instruction::Operands;
use crate::isa::riscv::trap::{ExceptionCause, ExecResult};
use crate::isa::riscv::triggers::TriggerTiming;
use crate::utils::Word;

/// Single vs double precision plumbing into the register file.
pub(super) trait FpWidth {
    type F: Float;
    fn enabled(isa: &IsaFlags) -> bool;
    fn read<W: Word>(hart: &Hart<W>, ix: u8) -> Self::F;
    fn write<W: Word>(hart: &mut Hart<W>, ix: u8, f: Self::F);
}

pub(super) struct Sp;
pub(super) struct Dp;

impl FpWidth for Sp {
    type F = Single;

    fn enabled(isa: &IsaFlags) -> bool {
        isa.rvf
    }

    fn read<W: Word>(hart: &Hart<W>, ix: u8) -> Single {
        Single::from_bits(hart.fp_regs.read_single(ix) as u128)
    }

    fn write<W: Word>(hart: &mut Hart<W>, ix: u8, f: Single) {
        hart.fp_regs.write_single(ix, f.to_bits() as u32);
    }
}

impl FpWidth for Dp {
    type F = Double;

    fn enabled(isa: &IsaFlags) -> bool {
        isa.rvd
    }

    fn read<W: Word>(hart: &Hart<W>, ix: u8) -> Double {
        Double::from_bits(hart.fp_regs.read_double(ix) as u128)
    }

    fn write<W: Word>(hart: &mut Hart<W>, ix: u8, f: Double) {
        hart.fp_regs.write_double(ix, f.to_bits() as u64);
    }
}

impl<W: Word> Hart<W> {
    /// Effective rounding mode of an FP instruction, None when the encoding
    /// is reserved (the caller raises illegal-instruction).
    pub(crate) fn effective_rounding_mode(&self, rm: u8) -> Option<Round> {
        let mode = Round::try_from(rm).ok()?;
        let mode = if mode == Round::Dynamic {
            let frm = (self.read_csr_m(csr_index::fcsr).to_u64() >> 5) & 7;
            Round::try_from(frm as u8).ok()?
        } else {
            mode
        };
        match mode {
            Round::Invalid1 | Round::Invalid2 | Round::Dynamic => None,
            _ => Some(mode),
        }
    }

    /// OR the op's raised flags into FCSR's accrued-flags field.
    pub(crate) fn update_accrued_fp_bits(&mut self, status: Status) {
        let flags = status_to_flags(status);
        if flags.is_empty() {
            return;
        }
        let fcsr = self.read_csr_m(csr_index::fcsr).to_u64();
        let new = fcsr | flags.bits() as u64;
        if new != fcsr {
            self.write_csr_m(csr_index::fcsr, W::from_u64(new));
        }
    }
}

fn rrm(ops: Operands) -> (u8, u8, u8, u8) {
    let Operands::RRm { rd, rs1, rs2, rm } = ops else {
        unreachable!()
    };
    (rd, rs1, rs2, rm)
}

pub(super) fn exec_fp_binary<W, P, Op>(hart: &mut Hart<W>, ops: Operands) -> ExecResult
where
    W: Word,
    P: FpWidth,
    Op: BinaryOpR<P::F>,
{
    let (rd, rs1, rs2, rm) = rrm(ops);
    if !P::enabled(&hart.isa) {
        return hart.illegal_inst();
    }
    let Some(round) = hart.effective_rounding_mode(rm) else {
        return hart.illegal_inst();
    };

    let a = P::read(hart, rs1);
    let b = P::read(hart, rs2);
    let result = Op::apply(a, b, round);
    P::write(hart, rd, result.value);
    hart.update_accrued_fp_bits(result.status);
    Ok(())
}

pub(super) fn exec_fp_ternary<W, P, Op>(hart: &mut Hart<W>, ops: Operands) -> ExecResult
where
    W: Word,
    P: FpWidth,
    Op: TernaryOpR<P::F>,
{
    let Operands::R4Rm { rd, rs1, rs2, rs3, rm } = ops else {
        unreachable!()
    };
    if !P::enabled(&hart.isa) {
        return hart.illegal_inst();
    }
    let Some(round) = hart.effective_rounding_mode(rm) else {
        return hart.illegal_inst();
    };

    let a = P::read(hart, rs1);
    let b = P::read(hart, rs2);
    let c = P::read(hart, rs3);
    let result = Op::apply(a, b, c, round);
    P::write(hart, rd, result.value);
    hart.update_accrued_fp_bits(result.status);
    Ok(())
}

pub(super) fn exec_fsqrt<W, P>(hart: &mut Hart<W>, ops: Operands) -> ExecResult
where
    W: Word,
    P: FpWidth,
    P::F: HostSqrt,
{
    let (rd, rs1, _rs2, rm) = rrm(ops);
    if !P::enabled(&hart.isa) {
        return hart.illegal_inst();
    }
    if hart.effective_rounding_mode(rm).is_none() {
        return hart.illegal_inst();
    }

    let result = P::read(hart, rs1).sqrt();
    P::write(hart, rd, result.value);
    hart.update_accrued_fp_bits(result.status);
    Ok(())
}

/// Sign injection; MODE 0 copies, 1 negates, 2 xors the sign of rs2.
pub(super) fn exec_fsgnj<W, P, const MODE: u8>(hart: &mut Hart<W>, ops: Operands) -> ExecResult
where
    W: Word,
    P: FpWidth,
{
    let (rd, rs1, rs2, _) = rrm(ops);
    if !P::enabled(&hart.isa) {
        return hart.illegal_inst();
    }
    let a = P::read(hart, rs1);
    let b = P::read(hart, rs2);
    let result = match MODE {
        0 => sign_inject(a, b),
        1 => sign_inject_neg(a, b),
        _ => sign_inject_xor(a, b),
    };
    P::write(hart, rd, result);
    Ok(())
}

pub(super) fn exec_fmin_fmax<W, P, const MAX: bool>(
    hart: &mut Hart<W>,
    ops: Operands,
) -> ExecResult
where
    W: Word,
    P: FpWidth,
{
    let (rd, rs1, rs2, _) = rrm(ops);
    if !P::enabled(&hart.isa) {
        return hart.illegal_inst();
    }
    let a = P::read(hart, rs1);
    let b = P::read(hart, rs2);
    let result = if MAX { fmax(a, b) } else { fmin(a, b) };
    P::write(hart, rd, result.value);
    hart.update_accrued_fp_bits(result.status);
    Ok(())
}

pub(super) fn exec_fp_cmp<W, P, Op>(hart: &mut Hart<W>, ops: Operands) -> ExecResult
where
    W: Word,
    P: FpWidth,
    Op: CmpOp<P::F>,
{
    let (rd, rs1, rs2, _) = rrm(ops);
    if !P::enabled(&hart.isa) {
        return hart.illegal_inst();
    }
    let a = P::read(hart, rs1);
    let b = P::read(hart, rs2);
    let result = Op::apply(a, b);
    hart.int_regs
        .write(rd, if result.value { W::ONE } else { W::ZERO });
    hart.update_accrued_fp_bits(result.status);
    Ok(())
}

pub(super) fn exec_fclass<W, P>(hart: &mut Hart<W>, ops: Operands) -> ExecResult
where
    W: Word,
    P: FpWidth,
{
    let (rd, rs1, _, _) = rrm(ops);
    if !P::enabled(&hart.isa) {
        return hart.illegal_inst();
    }
    let mask = classify(P::read(hart, rs1)).to_mask();
    hart.int_regs.write(rd, W::from_u64(mask as u64));
    Ok(())
}

/// FP to integer conversion, saturating per the F tables. 32-bit results
/// are sign-extended to the register width.
pub(super) fn exec_fcvt_to_int<W, P, const WIDTH: usize, const SIGNED: bool>(
    hart: &mut Hart<W>,
    ops: Operands,
) -> ExecResult
where
    W: Word,
    P: FpWidth,
{
    let (rd, rs1, _, rm) = rrm(ops);
    if !P::enabled(&hart.isa) {
        return hart.illegal_inst();
    }
    let Some(round) = hart.effective_rounding_mode(rm) else {
        return hart.illegal_inst();
    };

    let f = P::read(hart, rs1);
    let (value, status) = if SIGNED {
        let r = to_signed(f, WIDTH, round);
        (r.value as u64, r.status)
    } else {
        let r = to_unsigned(f, WIDTH, round);
        (r.value as u64, r.status)
    };

    let result = if WIDTH == 32 {
        W::sext32(value as u32)
    } else {
        W::from_u64(value)
    };
    hart.int_regs.write(rd, result);
    hart.update_accrued_fp_bits(status);
    Ok(())
}

/// Integer to FP conversion.
pub(super) fn exec_fcvt_from_int<W, P, const WIDTH: usize, const SIGNED: bool>(
    hart: &mut Hart<W>,
    ops: Operands,
) -> ExecResult
where
    W: Word,
    P: FpWidth,
{
    let (rd, rs1, _, rm) = rrm(ops);
    if !P::enabled(&hart.isa) {
        return hart.illegal_inst();
    }
    let Some(round) = hart.effective_rounding_mode(rm) else {
        return hart.illegal_inst();
    };

    let raw = hart.int_regs.read(rs1);
    let result = if SIGNED {
        let v: i128 = if WIDTH == 32 {
            raw.to_u64() as u32 as i32 as i128
        } else {
            raw.to_i64() as i128
        };
        from_signed::<P::F>(v, round)
    } else {
        let v: u128 = if WIDTH == 32 {
            raw.to_u64() as u32 as u128
        } else {
            raw.to_u64() as u128
        };
        from_unsigned::<P::F>(v, round)
    };
    P::write(hart, rd, result.value);
    hart.update_accrued_fp_bits(result.status);
    Ok(())
}

/// Precision conversion: fcvt.s.d (narrowing) and fcvt.d.s (widening).
pub(super) fn exec_fcvt_s_d<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let (rd, rs1, _, rm) = rrm(ops);
    if !hart.isa.rvd {
        return hart.illegal_inst();
    }
    let Some(round) = hart.effective_rounding_mode(rm) else {
        return hart.illegal_inst();
    };
    let d = Dp::read(hart, rs1);
    let result = convert::<Double, Single>(d, round);
    Sp::write(hart, rd, result.value);
    hart.update_accrued_fp_bits(result.status);
    Ok(())
}

pub(super) fn exec_fcvt_d_s<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let (rd, rs1, _, rm) = rrm(ops);
    if !hart.isa.rvd {
        return hart.illegal_inst();
    }
    let Some(round) = hart.effective_rounding_mode(rm) else {
        return hart.illegal_inst();
    };
    let s = Sp::read(hart, rs1);
    let result = convert::<Single, Double>(s, round);
    Dp::write(hart, rd, result.value);
    hart.update_accrued_fp_bits(result.status);
    Ok(())
}

// Bit moves between the register files.

pub(super) fn exec_fmv_x_w<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let (rd, rs1, _, _) = rrm(ops);
    if !hart.isa.rvf {
        return hart.illegal_inst();
    }
    let bits = hart.fp_regs.read_single(rs1);
    hart.int_regs.write(rd, W::sext32(bits));
    Ok(())
}

pub(super) fn exec_fmv_w_x<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let (rd, rs1, _, _) = rrm(ops);
    if !hart.isa.rvf {
        return hart.illegal_inst();
    }
    let bits = hart.int_regs.read(rs1).to_u64() as u32;
    hart.fp_regs.write_single(rd, bits);
    Ok(())
}

pub(super) fn exec_fmv_x_d<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let (rd, rs1, _, _) = rrm(ops);
    if !hart.isa.rvd || W::XLEN != 64 {
        return hart.illegal_inst();
    }
    let bits = hart.fp_regs.read_double(rs1);
    hart.int_regs.write(rd, W::from_u64(bits));
    Ok(())
}

pub(super) fn exec_fmv_d_x<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let (rd, rs1, _, _) = rrm(ops);
    if !hart.isa.rvd || W::XLEN != 64 {
        return hart.illegal_inst();
    }
    let bits = hart.int_regs.read(rs1).to_u64();
    hart.fp_regs.write_double(rd, bits);
    Ok(())
}

// FP loads and stores. The address protocol matches the integer forms, but
// the data lands in (or comes from) the FP file and no load-queue entry is
// made for the FP destination.

pub(super) fn exec_fp_load<W: Word, const SIZE: u32>(
    hart: &mut Hart<W>,
    ops: Operands,
) -> ExecResult {
    let Operands::I { rd, rs1, imm } = ops else {
        unreachable!()
    };
    let enabled = if SIZE == 4 { hart.isa.rvf } else { hart.isa.rvd };
    if !enabled {
        return hart.illegal_inst();
    }

    let base = hart.int_regs.read(rs1).to_u64();
    let addr = base.wrapping_add(imm as i64 as u64);

    hart.load_addr = addr;
    hart.load_addr_valid = true;

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
            if SIZE == 4 {
                hart.fp_regs.write_single(rd, raw as u32);
            } else {
                hart.fp_regs.write_double(rd, raw);
            }
            return Ok(());
        }
    }
    hart.initiate_load_exception(ExceptionCause::LoadAccessFault, addr, SIZE);
    Ok(())
}

pub(super) fn exec_fp_store<W: Word, const SIZE: u32>(
    hart: &mut Hart<W>,
    ops: Operands,
) -> ExecResult {
    let Operands::S { rs1, rs2, imm } = ops else {
        unreachable!()
    };
    let enabled = if SIZE == 4 { hart.isa.rvf } else { hart.isa.rvd };
    if !enabled {
        return hart.illegal_inst();
    }

    let base = hart.int_regs.read(rs1).to_u64();
    let addr = base.wrapping_add(imm as i64 as u64);
    // Stores move raw register bits; boxing is only interpreted on reads.
    let value = if SIZE == 4 {
        hart.fp_regs.read_bits(rs2) & 0xFFFF_FFFF
    } else {
        hart.fp_regs.read_bits(rs2)
    };
    hart.store_common(base, addr, value, SIZE)?;
    Ok(())
}
