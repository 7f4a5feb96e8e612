//! Dispatch from a decoded instruction to its semantic routine.

use crate::fpu::soft_float::{AddOp, DivOp, EqOp, LeOp, LtOp, MulAddOp, MulOp, MulSubOp,
    NegMulAddOp, NegMulSubOp, SubOp};
use crate::isa::riscv::hart::Hart;
use crate::isa::riscv::instruction::exec_atomic_function::*;
use crate::isa::riscv::instruction::exec_bitmanip_function::*;
use crate::isa::riscv::instruction::exec_float_function::*;
use crate::isa::riscv::instruction::exec_function::*;
use crate::isa::riscv::instruction::{DecodedInst, InstrId};
use crate::isa::riscv::trap::ExecResult;
use crate::utils::Word;

pub(crate) fn dispatch<W: Word>(hart: &mut Hart<W>, decoded: &DecodedInst) -> ExecResult {
    let ops = decoded.ops;
    match decoded.id {
        InstrId::ILLEGAL => hart.illegal_inst(),

        // RV32I / RV64I integer.
        InstrId::LUI => exec_lui(hart, ops),
        InstrId::AUIPC => exec_auipc(hart, ops),
        InstrId::JAL => exec_jal(hart, ops),
        InstrId::JALR => exec_jalr(hart, ops),
        InstrId::BEQ => exec_branch::<W, ExecEq>(hart, ops),
        InstrId::BNE => exec_branch::<W, ExecNe>(hart, ops),
        InstrId::BLT => exec_branch::<W, ExecLt>(hart, ops),
        InstrId::BGE => exec_branch::<W, ExecGe>(hart, ops),
        InstrId::BLTU => exec_branch::<W, ExecLtu>(hart, ops),
        InstrId::BGEU => exec_branch::<W, ExecGeu>(hart, ops),
        InstrId::LB => exec_load::<W, 1, true>(hart, ops),
        InstrId::LH => exec_load::<W, 2, true>(hart, ops),
        InstrId::LW => exec_load::<W, 4, true>(hart, ops),
        InstrId::LBU => exec_load::<W, 1, false>(hart, ops),
        InstrId::LHU => exec_load::<W, 2, false>(hart, ops),
        InstrId::LWU => exec_load::<W, 4, false>(hart, ops),
        InstrId::LD => exec_load::<W, 8, false>(hart, ops),
        InstrId::SB => exec_store::<W, 1>(hart, ops),
        InstrId::SH => exec_store::<W, 2>(hart, ops),
        InstrId::SW => exec_store::<W, 4>(hart, ops),
        InstrId::SD => exec_store::<W, 8>(hart, ops),
        InstrId::ADDI | InstrId::ADD => exec_arith::<W, ExecAdd>(hart, ops),
        InstrId::SUB => exec_arith::<W, ExecSub>(hart, ops),
        InstrId::SLTI | InstrId::SLT => exec_arith::<W, ExecSlt>(hart, ops),
        InstrId::SLTIU | InstrId::SLTU => exec_arith::<W, ExecSltu>(hart, ops),
        InstrId::XORI | InstrId::XOR => exec_arith::<W, ExecXor>(hart, ops),
        InstrId::ORI | InstrId::OR => exec_arith::<W, ExecOr>(hart, ops),
        InstrId::ANDI | InstrId::AND => exec_arith::<W, ExecAnd>(hart, ops),
        InstrId::SLLI | InstrId::SLL => exec_arith::<W, ExecSll>(hart, ops),
        InstrId::SRLI | InstrId::SRL => exec_arith::<W, ExecSrl>(hart, ops),
        InstrId::SRAI | InstrId::SRA => exec_arith::<W, ExecSra>(hart, ops),
        InstrId::ADDIW | InstrId::ADDW => exec_arith::<W, ExecAddw>(hart, ops),
        InstrId::SUBW => exec_arith::<W, ExecSubw>(hart, ops),
        InstrId::SLLIW | InstrId::SLLW => exec_arith::<W, ExecSllw>(hart, ops),
        InstrId::SRLIW | InstrId::SRLW => exec_arith::<W, ExecSrlw>(hart, ops),
        InstrId::SRAIW | InstrId::SRAW => exec_arith::<W, ExecSraw>(hart, ops),
        InstrId::FENCE => exec_fence(hart, ops),
        InstrId::FENCE_I => exec_fence_i(hart, ops),
        InstrId::ECALL => exec_ecall(hart, ops),
        InstrId::EBREAK => exec_ebreak(hart, ops),

        // Zicsr.
        InstrId::CSRRW => exec_csrrw::<W, false>(hart, ops),
        InstrId::CSRRWI => exec_csrrw::<W, true>(hart, ops),
        InstrId::CSRRS => exec_csr_bit::<W, true, false>(hart, ops),
        InstrId::CSRRSI => exec_csr_bit::<W, true, true>(hart, ops),
        InstrId::CSRRC => exec_csr_bit::<W, false, false>(hart, ops),
        InstrId::CSRRCI => exec_csr_bit::<W, false, true>(hart, ops),

        // Privileged returns.
        InstrId::MRET => exec_mret(hart, ops),
        InstrId::SRET => exec_sret(hart, ops),
        InstrId::URET => exec_uret(hart, ops),
        InstrId::WFI => exec_wfi(hart, ops),

        // M.
        InstrId::MUL => exec_arith::<W, ExecMul>(hart, ops),
        InstrId::MULH => exec_arith::<W, ExecMulh>(hart, ops),
        InstrId::MULHSU => exec_arith::<W, ExecMulhsu>(hart, ops),
        InstrId::MULHU => exec_arith::<W, ExecMulhu>(hart, ops),
        InstrId::DIV => exec_arith::<W, ExecDiv>(hart, ops),
        InstrId::DIVU => exec_arith::<W, ExecDivu>(hart, ops),
        InstrId::REM => exec_arith::<W, ExecRem>(hart, ops),
        InstrId::REMU => exec_arith::<W, ExecRemu>(hart, ops),
        InstrId::MULW => exec_arith::<W, ExecMulw>(hart, ops),
        InstrId::DIVW => exec_arith::<W, ExecDivw>(hart, ops),
        InstrId::DIVUW => exec_arith::<W, ExecDivuw>(hart, ops),
        InstrId::REMW => exec_arith::<W, ExecRemw>(hart, ops),
        InstrId::REMUW => exec_arith::<W, ExecRemuw>(hart, ops),

        // A.
        InstrId::LR_W => exec_lr::<W, 4>(hart, ops),
        InstrId::LR_D => exec_lr::<W, 8>(hart, ops),
        InstrId::SC_W => exec_sc::<W, 4>(hart, ops),
        InstrId::SC_D => exec_sc::<W, 8>(hart, ops),
        InstrId::AMOADD_W => exec_amo::<W, 4, AmoAdd>(hart, ops),
        InstrId::AMOSWAP_W => exec_amo::<W, 4, AmoSwap>(hart, ops),
        InstrId::AMOXOR_W => exec_amo::<W, 4, AmoXor>(hart, ops),
        InstrId::AMOOR_W => exec_amo::<W, 4, AmoOr>(hart, ops),
        InstrId::AMOAND_W => exec_amo::<W, 4, AmoAnd>(hart, ops),
        InstrId::AMOMIN_W => exec_amo::<W, 4, AmoMin>(hart, ops),
        InstrId::AMOMAX_W => exec_amo::<W, 4, AmoMax>(hart, ops),
        InstrId::AMOMINU_W => exec_amo::<W, 4, AmoMinu>(hart, ops),
        InstrId::AMOMAXU_W => exec_amo::<W, 4, AmoMaxu>(hart, ops),
        InstrId::AMOADD_D => exec_amo::<W, 8, AmoAdd>(hart, ops),
        InstrId::AMOSWAP_D => exec_amo::<W, 8, AmoSwap>(hart, ops),
        InstrId::AMOXOR_D => exec_amo::<W, 8, AmoXor>(hart, ops),
        InstrId::AMOOR_D => exec_amo::<W, 8, AmoOr>(hart, ops),
        InstrId::AMOAND_D => exec_amo::<W, 8, AmoAnd>(hart, ops),
        InstrId::AMOMIN_D => exec_amo::<W, 8, AmoMin>(hart, ops),
        InstrId::AMOMAX_D => exec_amo::<W, 8, AmoMax>(hart, ops),
        InstrId::AMOMINU_D => exec_amo::<W, 8, AmoMinu>(hart, ops),
        InstrId::AMOMAXU_D => exec_amo::<W, 8, AmoMaxu>(hart, ops),

        // F.
        InstrId::FLW => exec_fp_load::<W, 4>(hart, ops),
        InstrId::FSW => exec_fp_store::<W, 4>(hart, ops),
        InstrId::FMADD_S => exec_fp_ternary::<W, Sp, MulAddOp>(hart, ops),
        InstrId::FMSUB_S => exec_fp_ternary::<W, Sp, MulSubOp>(hart, ops),
        InstrId::FNMSUB_S => exec_fp_ternary::<W, Sp, NegMulAddOp>(hart, ops),
        InstrId::FNMADD_S => exec_fp_ternary::<W, Sp, NegMulSubOp>(hart, ops),
        InstrId::FADD_S => exec_fp_binary::<W, Sp, AddOp>(hart, ops),
        InstrId::FSUB_S => exec_fp_binary::<W, Sp, SubOp>(hart, ops),
        InstrId::FMUL_S => exec_fp_binary::<W, Sp, MulOp>(hart, ops),
        InstrId::FDIV_S => exec_fp_binary::<W, Sp, DivOp>(hart, ops),
        InstrId::FSQRT_S => exec_fsqrt::<W, Sp>(hart, ops),
        InstrId::FSGNJ_S => exec_fsgnj::<W, Sp, 0>(hart, ops),
        InstrId::FSGNJN_S => exec_fsgnj::<W, Sp, 1>(hart, ops),
        InstrId::FSGNJX_S => exec_fsgnj::<W, Sp, 2>(hart, ops),
        InstrId::FMIN_S => exec_fmin_fmax::<W, Sp, false>(hart, ops),
        InstrId::FMAX_S => exec_fmin_fmax::<W, Sp, true>(hart, ops),
        InstrId::FCVT_W_S => exec_fcvt_to_int::<W, Sp, 32, true>(hart, ops),
        InstrId::FCVT_WU_S => exec_fcvt_to_int::<W, Sp, 32, false>(hart, ops),
        InstrId::FCVT_L_S => exec_fcvt_to_int::<W, Sp, 64, true>(hart, ops),
        InstrId::FCVT_LU_S => exec_fcvt_to_int::<W, Sp, 64, false>(hart, ops),
        InstrId::FMV_X_W => exec_fmv_x_w(hart, ops),
        InstrId::FEQ_S => exec_fp_cmp::<W, Sp, EqOp>(hart, ops),
        InstrId::FLT_S => exec_fp_cmp::<W, Sp, LtOp>(hart, ops),
        InstrId::FLE_S => exec_fp_cmp::<W, Sp, LeOp>(hart, ops),
        InstrId::FCLASS_S => exec_fclass::<W, Sp>(hart, ops),
        InstrId::FCVT_S_W => exec_fcvt_from_int::<W, Sp, 32, true>(hart, ops),
        InstrId::FCVT_S_WU => exec_fcvt_from_int::<W, Sp, 32, false>(hart, ops),
        InstrId::FCVT_S_L => exec_fcvt_from_int::<W, Sp, 64, true>(hart, ops),
        InstrId::FCVT_S_LU => exec_fcvt_from_int::<W, Sp, 64, false>(hart, ops),
        InstrId::FMV_W_X => exec_fmv_w_x(hart, ops),

        // D.
        InstrId::FLD => exec_fp_load::<W, 8>(hart, ops),
        InstrId::FSD => exec_fp_store::<W, 8>(hart, ops),
        InstrId::FMADD_D => exec_fp_ternary::<W, Dp, MulAddOp>(hart, ops),
        InstrId::FMSUB_D => exec_fp_ternary::<W, Dp, MulSubOp>(hart, ops),
        InstrId::FNMSUB_D => exec_fp_ternary::<W, Dp, NegMulAddOp>(hart, ops),
        InstrId::FNMADD_D => exec_fp_ternary::<W, Dp, NegMulSubOp>(hart, ops),
        InstrId::FADD_D => exec_fp_binary::<W, Dp, AddOp>(hart, ops),
        InstrId::FSUB_D => exec_fp_binary::<W, Dp, SubOp>(hart, ops),
        InstrId::FMUL_D => exec_fp_binary::<W, Dp, MulOp>(hart, ops),
        InstrId::FDIV_D => exec_fp_binary::<W, Dp, DivOp>(hart, ops),
        InstrId::FSQRT_D => exec_fsqrt::<W, Dp>(hart, ops),
        InstrId::FSGNJ_D => exec_fsgnj::<W, Dp, 0>(hart, ops),
        InstrId::FSGNJN_D => exec_fsgnj::<W, Dp, 1>(hart, ops),
        InstrId::FSGNJX_D => exec_fsgnj::<W, Dp, 2>(hart, ops),
        InstrId::FMIN_D => exec_fmin_fmax::<W, Dp, false>(hart, ops),
        InstrId::FMAX_D => exec_fmin_fmax::<W, Dp, true>(hart, ops),
        InstrId::FCVT_S_D => exec_fcvt_s_d(hart, ops),
        InstrId::FCVT_D_S => exec_fcvt_d_s(hart, ops),
        InstrId::FEQ_D => exec_fp_cmp::<W, Dp, EqOp>(hart, ops),
        InstrId::FLT_D => exec_fp_cmp::<W, Dp, LtOp>(hart, ops),
        InstrId::FLE_D => exec_fp_cmp::<W, Dp, LeOp>(hart, ops),
        InstrId::FCLASS_D => exec_fclass::<W, Dp>(hart, ops),
        InstrId::FCVT_W_D => exec_fcvt_to_int::<W, Dp, 32, true>(hart, ops),
        InstrId::FCVT_WU_D => exec_fcvt_to_int::<W, Dp, 32, false>(hart, ops),
        InstrId::FCVT_L_D => exec_fcvt_to_int::<W, Dp, 64, true>(hart, ops),
        InstrId::FCVT_LU_D => exec_fcvt_to_int::<W, Dp, 64, false>(hart, ops),
        InstrId::FCVT_D_W => exec_fcvt_from_int::<W, Dp, 32, true>(hart, ops),
        InstrId::FCVT_D_WU => exec_fcvt_from_int::<W, Dp, 32, false>(hart, ops),
        InstrId::FCVT_D_L => exec_fcvt_from_int::<W, Dp, 64, true>(hart, ops),
        InstrId::FCVT_D_LU => exec_fcvt_from_int::<W, Dp, 64, false>(hart, ops),
        InstrId::FMV_X_D => exec_fmv_x_d(hart, ops),
        InstrId::FMV_D_X => exec_fmv_d_x(hart, ops),

        // Minor bit-manip.
        InstrId::CLZ => exec_clz(hart, ops),
        InstrId::CTZ => exec_ctz(hart, ops),
        InstrId::PCNT => exec_pcnt(hart, ops),
        InstrId::ANDC => exec_arith::<W, ExecAndc>(hart, ops),
        InstrId::SLO | InstrId::SLOI => exec_arith::<W, ExecSlo>(hart, ops),
        InstrId::SRO | InstrId::SROI => exec_arith::<W, ExecSro>(hart, ops),
        InstrId::MIN => exec_arith::<W, ExecMin>(hart, ops),
        InstrId::MINU => exec_arith::<W, ExecMinu>(hart, ops),
        InstrId::MAX => exec_arith::<W, ExecMax>(hart, ops),
        InstrId::MAXU => exec_arith::<W, ExecMaxu>(hart, ops),
        InstrId::ROL => exec_arith::<W, ExecRol>(hart, ops),
        InstrId::ROR | InstrId::RORI => exec_arith::<W, ExecRor>(hart, ops),
        InstrId::PACK => exec_arith::<W, ExecPack>(hart, ops),

        // Custom q moves.
        InstrId::GETQ => exec_getq(hart, ops),
        InstrId::SETQ => exec_setq(hart, ops),
    }
}

/// Entry point used by the run loops: execute an already-decoded
/// instruction against the hart.
pub(crate) fn execute<W: Word>(hart: &mut Hart<W>, decoded: &DecodedInst) -> ExecResult {
    let result = dispatch(hart, decoded);
    debug_assert_eq!(hart.int_regs.read(0), W::ZERO);
    result
}
