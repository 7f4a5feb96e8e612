//! Minor bit-manipulation extension: count, shift-ones, rotate, min/max,
//! and-complement and pack.

use crate::isa::riscv::instruction::exec_function::ArithOp;
use crate::isa::riscv::instruction::Operands;
use crate::isa::riscv::hart::Hart;
use crate::isa::riscv::trap::ExecResult;
use crate::utils::Word;

macro_rules! bit_op {
    ($name:ident, |$a:ident, $b:ident| $body:expr) => {
        pub(super) struct $name;
        impl<W: Word> ArithOp<W> for $name {
            fn exec($a: W, $b: W) -> W {
                $body
            }
        }
    };
}

bit_op!(ExecClz, |a, _b| W::from_u64(a.leading_zeros() as u64));
bit_op!(ExecCtz, |a, _b| W::from_u64(a.trailing_zeros() as u64));
bit_op!(ExecPcnt, |a, _b| W::from_u64(a.count_ones() as u64));
bit_op!(ExecAndc, |a, b| a & !b);
// Shift-ones: shift in one bits instead of zeros.
bit_op!(ExecSlo, |a, b| {
    let n = b.to_u64() as u32 & W::shift_mask();
    !((!a).shl(n))
});
bit_op!(ExecSro, |a, b| {
    let n = b.to_u64() as u32 & W::shift_mask();
    !((!a).shr(n))
});
bit_op!(ExecMin, |a, b| if a.signed_lt(b) { a } else { b });
bit_op!(ExecMax, |a, b| if a.signed_lt(b) { b } else { a });
bit_op!(ExecMinu, |a, b| if a < b { a } else { b });
bit_op!(ExecMaxu, |a, b| if a < b { b } else { a });
bit_op!(ExecRol, |a, b| a.rotate_left(b.to_u64() as u32 & W::shift_mask()));
bit_op!(ExecRor, |a, b| a.rotate_right(b.to_u64() as u32 & W::shift_mask()));
// Pack the lower halves of both operands.
bit_op!(ExecPack, |a, b| {
    let half = W::XLEN / 2;
    a.shl(half).shr(half) | b.shl(half)
});

pub(super) fn exec_clz<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    exec_unary::<W, ExecClz>(hart, ops)
}

pub(super) fn exec_ctz<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    exec_unary::<W, ExecCtz>(hart, ops)
}

pub(super) fn exec_pcnt<W: Word>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    exec_unary::<W, ExecPcnt>(hart, ops)
}

/// Unary forms arrive as I-forms whose immediate is part of the opcode.
fn exec_unary<W: Word, F: ArithOp<W>>(hart: &mut Hart<W>, ops: Operands) -> ExecResult {
    let Operands::I { rd, rs1, .. } = ops else {
        unreachable!()
    };
    let a = hart.int_regs.read(rs1);
    hart.int_regs.write(rd, F::exec(a, W::ZERO));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_ones() {
        assert_eq!(<ExecSlo as ArithOp<u32>>::exec(0x8000_0001, 4), 0x0000_001F);
        assert_eq!(<ExecSro as ArithOp<u32>>::exec(0x8000_0001, 4), 0xF800_0000);
    }

    #[test]
    fn test_counts() {
        assert_eq!(<ExecClz as ArithOp<u32>>::exec(0x0000_0001, 0), 31);
        assert_eq!(<ExecClz as ArithOp<u64>>::exec(0, 0), 64);
        assert_eq!(<ExecCtz as ArithOp<u32>>::exec(0x8000_0000, 0), 31);
        assert_eq!(<ExecPcnt as ArithOp<u32>>::exec(0xF0F0, 0), 8);
    }

    #[test]
    fn test_pack() {
        assert_eq!(
            <ExecPack as ArithOp<u32>>::exec(0xAAAA_1111, 0xBBBB_2222),
            0x2222_1111
        );
        assert_eq!(
            <ExecPack as ArithOp<u64>>::exec(0x1111_2222_3333_4444, 0x5555_6666_7777_8888),
            0x7777_8888_3333_4444
        );
    }

    #[test]
    fn test_min_max() {
        assert_eq!(<ExecMin as ArithOp<u32>>::exec(u32::MAX, 1), u32::MAX); // -1 < 1
        assert_eq!(<ExecMinu as ArithOp<u32>>::exec(u32::MAX, 1), 1);
        assert_eq!(<ExecMaxu as ArithOp<u32>>::exec(u32::MAX, 1), u32::MAX);
    }
}
