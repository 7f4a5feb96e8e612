//! Instruction decode: a direct dispatch on the primary opcode (bits 6:2)
//! and sub-fields. Illegal encodings, encodings of disabled extensions, and
//! 64-bit-only forms on a 32-bit hart all decode to [`InstrId::ILLEGAL`].

pub mod compressed;

use crate::isa::riscv::hart::IsaFlags;
use crate::isa::riscv::instruction::{DecodedInst, InstrId, Operands};
use crate::utils::{sign_extend, Word};

pub fn is_compressed(inst: u32) -> bool {
    inst & 3 != 3
}

/// Decode a 32-bit word, or a 16-bit parcel in the low half.
pub fn decode<W: Word>(inst: u32, isa: &IsaFlags) -> DecodedInst {
    if is_compressed(inst) {
        compressed::decode16::<W>(inst as u16, isa)
    } else {
        decode32::<W>(inst, isa)
    }
}

fn rd(inst: u32) -> u8 {
    ((inst >> 7) & 0x1F) as u8
}

fn rs1(inst: u32) -> u8 {
    ((inst >> 15) & 0x1F) as u8
}

fn rs2(inst: u32) -> u8 {
    ((inst >> 20) & 0x1F) as u8
}

fn funct3(inst: u32) -> u32 {
    (inst >> 12) & 7
}

fn funct7(inst: u32) -> u32 {
    inst >> 25
}

fn i_imm(inst: u32) -> i32 {
    sign_extend((inst >> 20) as u64, 12) as i32
}

fn s_imm(inst: u32) -> i32 {
    let raw = ((inst >> 25) << 5) | ((inst >> 7) & 0x1F);
    sign_extend(raw as u64, 12) as i32
}

fn b_imm(inst: u32) -> i32 {
    let raw = (((inst >> 31) & 1) << 12)
        | (((inst >> 7) & 1) << 11)
        | (((inst >> 25) & 0x3F) << 5)
        | (((inst >> 8) & 0xF) << 1);
    sign_extend(raw as u64, 13) as i32
}

fn u_imm(inst: u32) -> i32 {
    (inst & 0xFFFF_F000) as i32
}

fn j_imm(inst: u32) -> i32 {
    let raw = (((inst >> 31) & 1) << 20)
        | (((inst >> 12) & 0xFF) << 12)
        | (((inst >> 20) & 1) << 11)
        | (((inst >> 21) & 0x3FF) << 1);
    sign_extend(raw as u64, 21) as i32
}

fn di(id: InstrId, ops: Operands) -> DecodedInst {
    DecodedInst { id, ops }
}

fn r_ops(inst: u32) -> Operands {
    Operands::R {
        rd: rd(inst),
        rs1: rs1(inst),
        rs2: rs2(inst),
    }
}

fn i_ops(inst: u32) -> Operands {
    Operands::I {
        rd: rd(inst),
        rs1: rs1(inst),
        imm: i_imm(inst),
    }
}

/// Shift-immediate split: shamt plus the remaining top bits of the I-form
/// immediate. The shamt is 6 bits on RV64, 5 on RV32.
fn shift_fields<W: Word>(inst: u32) -> (u32, u32) {
    let imm = (inst >> 20) & 0xFFF;
    if W::XLEN == 64 {
        (imm & 0x3F, imm >> 6)
    } else {
        (imm & 0x1F, imm >> 5)
    }
}

fn shamt_ops(inst: u32, shamt: u32) -> Operands {
    Operands::I {
        rd: rd(inst),
        rs1: rs1(inst),
        imm: shamt as i32,
    }
}

pub fn decode32<W: Word>(inst: u32, isa: &IsaFlags) -> DecodedInst {
    match (inst >> 2) & 0x1F {
        0x00 => decode_load::<W>(inst),
        0x01 => decode_load_fp(inst, isa),
        0x02 => decode_custom(inst),
        0x03 => decode_misc_mem(inst),
        0x04 => decode_op_imm::<W>(inst, isa),
        0x05 => di(InstrId::AUIPC, Operands::U { rd: rd(inst), imm: u_imm(inst) }),
        0x06 => decode_op_imm32::<W>(inst),
        0x08 => decode_store::<W>(inst),
        0x09 => decode_store_fp(inst, isa),
        0x0B => decode_amo::<W>(inst, isa),
        0x0C => decode_op(inst, isa),
        0x0D => di(InstrId::LUI, Operands::U { rd: rd(inst), imm: u_imm(inst) }),
        0x0E => decode_op32::<W>(inst, isa),
        0x10 => decode_fused(inst, isa, InstrId::FMADD_S, InstrId::FMADD_D),
        0x11 => decode_fused(inst, isa, InstrId::FMSUB_S, InstrId::FMSUB_D),
        0x12 => decode_fused(inst, isa, InstrId::FNMSUB_S, InstrId::FNMSUB_D),
        0x13 => decode_fused(inst, isa, InstrId::FNMADD_S, InstrId::FNMADD_D),
        0x14 => decode_op_fp::<W>(inst, isa),
        0x18 => decode_branch(inst),
        0x19 => match funct3(inst) {
            0 => di(InstrId::JALR, i_ops(inst)),
            _ => DecodedInst::illegal(),
        },
        0x1B => di(InstrId::JAL, Operands::J { rd: rd(inst), imm: j_imm(inst) }),
        0x1C => decode_system(inst, isa),
        _ => DecodedInst::illegal(),
    }
}

fn decode_load<W: Word>(inst: u32) -> DecodedInst {
    let id = match funct3(inst) {
        0 => InstrId::LB,
        1 => InstrId::LH,
        2 => InstrId::LW,
        3 if W::XLEN == 64 => InstrId::LD,
        4 => InstrId::LBU,
        5 => InstrId::LHU,
        6 if W::XLEN == 64 => InstrId::LWU,
        _ => return DecodedInst::illegal(),
    };
    di(id, i_ops(inst))
}

fn decode_load_fp(inst: u32, isa: &IsaFlags) -> DecodedInst {
    let id = match funct3(inst) {
        2 if isa.rvf => InstrId::FLW,
        3 if isa.rvd => InstrId::FLD,
        _ => return DecodedInst::illegal(),
    };
    di(id, i_ops(inst))
}

fn decode_custom(inst: u32) -> DecodedInst {
    // Custom q-register moves. The remaining custom slots (retirq, maskirq,
    // waitirq, timer) have no externally defined semantics and stay illegal.
    match funct7(inst) {
        0 => di(InstrId::GETQ, r_ops(inst)),
        1 => di(InstrId::SETQ, r_ops(inst)),
        _ => DecodedInst::illegal(),
    }
}

fn decode_misc_mem(inst: u32) -> DecodedInst {
    if rd(inst) != 0 || rs1(inst) != 0 {
        return DecodedInst::illegal();
    }
    match funct3(inst) {
        0 if (inst >> 28) == 0 => di(InstrId::FENCE, Operands::None),
        1 if (inst >> 20) == 0 => di(InstrId::FENCE_I, Operands::None),
        _ => DecodedInst::illegal(),
    }
}

fn decode_op_imm<W: Word>(inst: u32, isa: &IsaFlags) -> DecodedInst {
    let top12 = (inst >> 20) & 0xFFF;
    match funct3(inst) {
        0 => di(InstrId::ADDI, i_ops(inst)),
        1 => {
            let (shamt, top) = shift_fields::<W>(inst);
            if top == 0 {
                di(InstrId::SLLI, shamt_ops(inst, shamt))
            } else if top >> 1 == 4 && isa.zbmini {
                di(InstrId::SLOI, shamt_ops(inst, shamt))
            } else if top12 == 0x600 && isa.zbmini {
                di(InstrId::CLZ, i_ops(inst))
            } else if top12 == 0x601 && isa.zbmini {
                di(InstrId::CTZ, i_ops(inst))
            } else if top12 == 0x602 && isa.zbmini {
                di(InstrId::PCNT, i_ops(inst))
            } else {
                DecodedInst::illegal()
            }
        }
        2 => di(InstrId::SLTI, i_ops(inst)),
        3 => di(InstrId::SLTIU, i_ops(inst)),
        4 => di(InstrId::XORI, i_ops(inst)),
        5 => {
            let (shamt, mut top) = shift_fields::<W>(inst);
            if top == 0 {
                di(InstrId::SRLI, shamt_ops(inst, shamt))
            } else if top >> 1 == 4 && isa.zbmini {
                di(InstrId::SROI, shamt_ops(inst, shamt))
            } else if top >> 1 == 0xC && isa.zbmini {
                di(InstrId::RORI, shamt_ops(inst, shamt))
            } else {
                if W::XLEN == 64 {
                    top <<= 1;
                }
                if top == 0x20 {
                    di(InstrId::SRAI, shamt_ops(inst, shamt))
                } else {
                    DecodedInst::illegal()
                }
            }
        }
        6 => di(InstrId::ORI, i_ops(inst)),
        7 => di(InstrId::ANDI, i_ops(inst)),
        _ => unreachable!(),
    }
}

fn decode_op_imm32<W: Word>(inst: u32) -> DecodedInst {
    if W::XLEN != 64 {
        return DecodedInst::illegal();
    }
    let shamt = (inst >> 20) & 0x1F;
    let top7 = funct7(inst);
    match funct3(inst) {
        0 => di(InstrId::ADDIW, i_ops(inst)),
        1 if top7 == 0 => di(InstrId::SLLIW, shamt_ops(inst, shamt)),
        5 if top7 == 0 => di(InstrId::SRLIW, shamt_ops(inst, shamt)),
        5 if top7 == 0x20 => di(InstrId::SRAIW, shamt_ops(inst, shamt)),
        _ => DecodedInst::illegal(),
    }
}

fn decode_store<W: Word>(inst: u32) -> DecodedInst {
    let id = match funct3(inst) {
        0 => InstrId::SB,
        1 => InstrId::SH,
        2 => InstrId::SW,
        3 if W::XLEN == 64 => InstrId::SD,
        _ => return DecodedInst::illegal(),
    };
    di(
        id,
        Operands::S {
            rs1: rs1(inst),
            rs2: rs2(inst),
            imm: s_imm(inst),
        },
    )
}

fn decode_store_fp(inst: u32, isa: &IsaFlags) -> DecodedInst {
    let id = match funct3(inst) {
        2 if isa.rvf => InstrId::FSW,
        3 if isa.rvd => InstrId::FSD,
        _ => return DecodedInst::illegal(),
    };
    di(
        id,
        Operands::S {
            rs1: rs1(inst),
            rs2: rs2(inst),
            imm: s_imm(inst),
        },
    )
}

fn decode_amo<W: Word>(inst: u32, isa: &IsaFlags) -> DecodedInst {
    if !isa.rva {
        return DecodedInst::illegal();
    }
    let f3 = funct3(inst);
    let double = match f3 {
        2 => false,
        3 if W::XLEN == 64 => true,
        _ => return DecodedInst::illegal(),
    };
    let top5 = funct7(inst) >> 2;
    let id = match (top5, double) {
        (0x00, false) => InstrId::AMOADD_W,
        (0x01, false) => InstrId::AMOSWAP_W,
        (0x02, false) => InstrId::LR_W,
        (0x03, false) => InstrId::SC_W,
        (0x04, false) => InstrId::AMOXOR_W,
        (0x08, false) => InstrId::AMOOR_W,
        (0x0C, false) => InstrId::AMOAND_W,
        (0x10, false) => InstrId::AMOMIN_W,
        (0x14, false) => InstrId::AMOMAX_W,
        (0x18, false) => InstrId::AMOMINU_W,
        (0x1C, false) => InstrId::AMOMAXU_W,
        (0x00, true) => InstrId::AMOADD_D,
        (0x01, true) => InstrId::AMOSWAP_D,
        (0x02, true) => InstrId::LR_D,
        (0x03, true) => InstrId::SC_D,
        (0x04, true) => InstrId::AMOXOR_D,
        (0x08, true) => InstrId::AMOOR_D,
        (0x0C, true) => InstrId::AMOAND_D,
        (0x10, true) => InstrId::AMOMIN_D,
        (0x14, true) => InstrId::AMOMAX_D,
        (0x18, true) => InstrId::AMOMINU_D,
        (0x1C, true) => InstrId::AMOMAXU_D,
        _ => return DecodedInst::illegal(),
    };
    if matches!(id, InstrId::LR_W | InstrId::LR_D) && rs2(inst) != 0 {
        return DecodedInst::illegal();
    }
    di(
        id,
        Operands::A {
            rd: rd(inst),
            rs1: rs1(inst),
            rs2: rs2(inst),
            aq: (inst >> 26) & 1 != 0,
            rl: (inst >> 25) & 1 != 0,
        },
    )
}

fn decode_op(inst: u32, isa: &IsaFlags) -> DecodedInst {
    let f3 = funct3(inst);
    let id = match funct7(inst) {
        0 => match f3 {
            0 => InstrId::ADD,
            1 => InstrId::SLL,
            2 => InstrId::SLT,
            3 => InstrId::SLTU,
            4 => InstrId::XOR,
            5 => InstrId::SRL,
            6 => InstrId::OR,
            7 => InstrId::AND,
            _ => unreachable!(),
        },
        1 => {
            if !isa.rvm {
                return DecodedInst::illegal();
            }
            match f3 {
                0 => InstrId::MUL,
                1 => InstrId::MULH,
                2 => InstrId::MULHSU,
                3 => InstrId::MULHU,
                4 => InstrId::DIV,
                5 => InstrId::DIVU,
                6 => InstrId::REM,
                7 => InstrId::REMU,
                _ => unreachable!(),
            }
        }
        4 if isa.zbmini && f3 == 0 => InstrId::PACK,
        5 if isa.zbmini => match f3 {
            2 => InstrId::MIN,
            3 => InstrId::MINU,
            6 => InstrId::MAX,
            7 => InstrId::MAXU,
            _ => return DecodedInst::illegal(),
        },
        0x10 if isa.zbmini => match f3 {
            1 => InstrId::SLO,
            5 => InstrId::SRO,
            _ => return DecodedInst::illegal(),
        },
        0x20 => match f3 {
            0 => InstrId::SUB,
            5 => InstrId::SRA,
            7 if isa.zbmini => InstrId::ANDC,
            _ => return DecodedInst::illegal(),
        },
        0x30 if isa.zbmini => match f3 {
            1 => InstrId::ROL,
            5 => InstrId::ROR,
            _ => return DecodedInst::illegal(),
        },
        _ => return DecodedInst::illegal(),
    };
    di(id, r_ops(inst))
}

fn decode_op32<W: Word>(inst: u32, isa: &IsaFlags) -> DecodedInst {
    if W::XLEN != 64 {
        return DecodedInst::illegal();
    }
    let f3 = funct3(inst);
    let id = match funct7(inst) {
        0 => match f3 {
            0 => InstrId::ADDW,
            1 => InstrId::SLLW,
            5 => InstrId::SRLW,
            _ => return DecodedInst::illegal(),
        },
        1 => {
            if !isa.rvm {
                return DecodedInst::illegal();
            }
            match f3 {
                0 => InstrId::MULW,
                4 => InstrId::DIVW,
                5 => InstrId::DIVUW,
                6 => InstrId::REMW,
                7 => InstrId::REMUW,
                _ => return DecodedInst::illegal(),
            }
        }
        0x20 => match f3 {
            0 => InstrId::SUBW,
            5 => InstrId::SRAW,
            _ => return DecodedInst::illegal(),
        },
        _ => return DecodedInst::illegal(),
    };
    di(id, r_ops(inst))
}

fn decode_fused(inst: u32, isa: &IsaFlags, single: InstrId, double: InstrId) -> DecodedInst {
    let f7 = funct7(inst);
    let id = match f7 & 3 {
        0 if isa.rvf => single,
        1 if isa.rvd => double,
        _ => return DecodedInst::illegal(),
    };
    di(
        id,
        Operands::R4Rm {
            rd: rd(inst),
            rs1: rs1(inst),
            rs2: rs2(inst),
            rs3: (f7 >> 2) as u8,
            rm: funct3(inst) as u8,
        },
    )
}

fn decode_branch(inst: u32) -> DecodedInst {
    let id = match funct3(inst) {
        0 => InstrId::BEQ,
        1 => InstrId::BNE,
        4 => InstrId::BLT,
        5 => InstrId::BGE,
        6 => InstrId::BLTU,
        7 => InstrId::BGEU,
        _ => return DecodedInst::illegal(),
    };
    di(
        id,
        Operands::B {
            rs1: rs1(inst),
            rs2: rs2(inst),
            imm: b_imm(inst),
        },
    )
}

fn decode_op_fp<W: Word>(inst: u32, isa: &IsaFlags) -> DecodedInst {
    let f7 = funct7(inst);
    let f3 = funct3(inst);
    let r2 = rs2(inst);
    let rm_ops = Operands::RRm {
        rd: rd(inst),
        rs1: rs1(inst),
        rs2: r2,
        rm: f3 as u8,
    };

    if f7 & 1 == 1 {
        // Double-precision space.
        if !isa.rvd {
            return DecodedInst::illegal();
        }
        let id = match f7 {
            0x01 => InstrId::FADD_D,
            0x05 => InstrId::FSUB_D,
            0x09 => InstrId::FMUL_D,
            0x0D => InstrId::FDIV_D,
            0x11 => match f3 {
                0 => InstrId::FSGNJ_D,
                1 => InstrId::FSGNJN_D,
                2 => InstrId::FSGNJX_D,
                _ => return DecodedInst::illegal(),
            },
            0x15 => match f3 {
                0 => InstrId::FMIN_D,
                1 => InstrId::FMAX_D,
                _ => return DecodedInst::illegal(),
            },
            0x21 if r2 == 0 => InstrId::FCVT_D_S,
            0x2D => InstrId::FSQRT_D,
            0x51 => match f3 {
                0 => InstrId::FLE_D,
                1 => InstrId::FLT_D,
                2 => InstrId::FEQ_D,
                _ => return DecodedInst::illegal(),
            },
            0x61 => match r2 {
                0 => InstrId::FCVT_W_D,
                1 => InstrId::FCVT_WU_D,
                2 if W::XLEN == 64 => InstrId::FCVT_L_D,
                3 if W::XLEN == 64 => InstrId::FCVT_LU_D,
                _ => return DecodedInst::illegal(),
            },
            0x69 => match r2 {
                0 => InstrId::FCVT_D_W,
                1 => InstrId::FCVT_D_WU,
                2 if W::XLEN == 64 => InstrId::FCVT_D_L,
                3 if W::XLEN == 64 => InstrId::FCVT_D_LU,
                _ => return DecodedInst::illegal(),
            },
            0x71 => match (r2, f3) {
                (0, 0) if W::XLEN == 64 => InstrId::FMV_X_D,
                (0, 1) => InstrId::FCLASS_D,
                _ => return DecodedInst::illegal(),
            },
            0x79 if r2 == 0 && f3 == 0 && W::XLEN == 64 => InstrId::FMV_D_X,
            _ => return DecodedInst::illegal(),
        };
        return di(id, rm_ops);
    }

    if !isa.rvf {
        return DecodedInst::illegal();
    }
    let id = match f7 {
        0x00 => InstrId::FADD_S,
        0x04 => InstrId::FSUB_S,
        0x08 => InstrId::FMUL_S,
        0x0C => InstrId::FDIV_S,
        0x10 => match f3 {
            0 => InstrId::FSGNJ_S,
            1 => InstrId::FSGNJN_S,
            2 => InstrId::FSGNJX_S,
            _ => return DecodedInst::illegal(),
        },
        0x14 => match f3 {
            0 => InstrId::FMIN_S,
            1 => InstrId::FMAX_S,
            _ => return DecodedInst::illegal(),
        },
        0x20 if r2 == 1 && isa.rvd => InstrId::FCVT_S_D,
        0x2C => InstrId::FSQRT_S,
        0x50 => match f3 {
            0 => InstrId::FLE_S,
            1 => InstrId::FLT_S,
            2 => InstrId::FEQ_S,
            _ => return DecodedInst::illegal(),
        },
        0x60 => match r2 {
            0 => InstrId::FCVT_W_S,
            1 => InstrId::FCVT_WU_S,
            2 if W::XLEN == 64 => InstrId::FCVT_L_S,
            3 if W::XLEN == 64 => InstrId::FCVT_LU_S,
            _ => return DecodedInst::illegal(),
        },
        0x68 => match r2 {
            0 => InstrId::FCVT_S_W,
            1 => InstrId::FCVT_S_WU,
            2 if W::XLEN == 64 => InstrId::FCVT_S_L,
            3 if W::XLEN == 64 => InstrId::FCVT_S_LU,
            _ => return DecodedInst::illegal(),
        },
        0x70 => match (r2, f3) {
            (0, 0) => InstrId::FMV_X_W,
            (0, 1) => InstrId::FCLASS_S,
            _ => return DecodedInst::illegal(),
        },
        0x78 if r2 == 0 && f3 == 0 => InstrId::FMV_W_X,
        _ => return DecodedInst::illegal(),
    };
    di(id, rm_ops)
}

fn decode_system(inst: u32, isa: &IsaFlags) -> DecodedInst {
    let f3 = funct3(inst);
    let csr = ((inst >> 20) & 0xFFF) as i32;
    let csr_ops = Operands::I {
        rd: rd(inst),
        rs1: rs1(inst),
        imm: csr,
    };
    match f3 {
        0 => {
            if rd(inst) != 0 || rs1(inst) != 0 {
                return DecodedInst::illegal();
            }
            match csr {
                0x000 => di(InstrId::ECALL, Operands::None),
                0x001 => di(InstrId::EBREAK, Operands::None),
                0x002 if isa.rvu => di(InstrId::URET, Operands::None),
                0x102 if isa.rvs => di(InstrId::SRET, Operands::None),
                0x302 => di(InstrId::MRET, Operands::None),
                0x105 => di(InstrId::WFI, Operands::None),
                _ => DecodedInst::illegal(),
            }
        }
        1 => di(InstrId::CSRRW, csr_ops),
        2 => di(InstrId::CSRRS, csr_ops),
        3 => di(InstrId::CSRRC, csr_ops),
        5 => di(InstrId::CSRRWI, csr_ops),
        6 => di(InstrId::CSRRSI, csr_ops),
        7 => di(InstrId::CSRRCI, csr_ops),
        _ => DecodedInst::illegal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isa_all() -> IsaFlags {
        IsaFlags {
            rva: true,
            rvc: true,
            rvd: true,
            rvf: true,
            rvm: true,
            rvs: true,
            rvu: true,
            zbmini: true,
        }
    }

    fn check32(inst: u32, id: InstrId, ops: Operands) {
        let decoded = decode::<u32>(inst, &isa_all());
        assert_eq!(decoded, DecodedInst { id, ops }, "inst {:#010x}", inst);
    }

    fn check64(inst: u32, id: InstrId, ops: Operands) {
        let decoded = decode::<u64>(inst, &isa_all());
        assert_eq!(decoded, DecodedInst { id, ops }, "inst {:#010x}", inst);
    }

    #[test]
    fn test_decode_rv32i() {
        check32(0x123450B7, InstrId::LUI, Operands::U { rd: 1, imm: 0x12345000 });
        check32(0x12233097, InstrId::AUIPC, Operands::U { rd: 1, imm: 0x12233000 });
        check32(0x00500093, InstrId::ADDI, Operands::I { rd: 1, rs1: 0, imm: 5 });
        check32(0xFFB18113, InstrId::ADDI, Operands::I { rd: 2, rs1: 3, imm: -5 });
        check32(0x00210083, InstrId::LB, Operands::I { rd: 1, rs1: 2, imm: 2 });
        check32(0xF8C318E3, InstrId::BNE, Operands::B { rs1: 6, rs2: 12, imm: -112 });
        check32(0x00208463, InstrId::BEQ, Operands::B { rs1: 1, rs2: 2, imm: 8 });
        check32(0xFE112C23, InstrId::SW, Operands::S { rs1: 2, rs2: 1, imm: -8 });
        check32(0xF81FF06F, InstrId::JAL, Operands::J { rd: 0, imm: -128 });
        check32(0x00078067, InstrId::JALR, Operands::I { rd: 0, rs1: 15, imm: 0 });
        check32(0x00100073, InstrId::EBREAK, Operands::None);
        check32(0x00000073, InstrId::ECALL, Operands::None);
        check32(0x30200073, InstrId::MRET, Operands::None);
        check32(0x0000100F, InstrId::FENCE_I, Operands::None);
    }

    #[test]
    fn test_decode_shift_imm_bit5_on_rv32() {
        // slli x1, x1, 0x20 is illegal on a 32-bit hart, legal on 64.
        let inst = 0x02009093;
        assert_eq!(decode::<u32>(inst, &isa_all()).id, InstrId::ILLEGAL);
        check64(inst, InstrId::SLLI, Operands::I { rd: 1, rs1: 1, imm: 0x20 });
    }

    #[test]
    fn test_decode_rv64_only_on_rv32() {
        assert_eq!(decode::<u32>(0x00003503, &isa_all()).id, InstrId::ILLEGAL); // ld
        check64(0x00003503, InstrId::LD, Operands::I { rd: 10, rs1: 0, imm: 0 });
        assert_eq!(decode::<u32>(0x00A7B023, &isa_all()).id, InstrId::ILLEGAL); // sd
        // addw
        assert_eq!(decode::<u32>(0x00B5053B, &isa_all()).id, InstrId::ILLEGAL);
        check64(0x00B5053B, InstrId::ADDW, Operands::R { rd: 10, rs1: 10, rs2: 11 });
    }

    #[test]
    fn test_decode_m_extension() {
        check32(0x02520333, InstrId::MUL, Operands::R { rd: 6, rs1: 4, rs2: 5 });
        check32(0x02C59733, InstrId::MULH, Operands::R { rd: 14, rs1: 11, rs2: 12 });
        let mut isa = isa_all();
        isa.rvm = false;
        assert_eq!(decode::<u32>(0x02520333, &isa).id, InstrId::ILLEGAL);
    }

    #[test]
    fn test_decode_csr() {
        check32(
            0x001015F3,
            InstrId::CSRRW,
            Operands::I { rd: 11, rs1: 0, imm: 1 },
        );
        check32(
            0x3422D5F3,
            InstrId::CSRRWI,
            Operands::I { rd: 11, rs1: 5, imm: 0x342 },
        );
        // High CSR numbers stay unsigned.
        check32(
            0xFC002573,
            InstrId::CSRRS,
            Operands::I { rd: 10, rs1: 0, imm: 0xFC0 },
        );
    }

    #[test]
    fn test_decode_atomic() {
        check32(
            0x1005272F,
            InstrId::LR_W,
            Operands::A { rd: 14, rs1: 10, rs2: 0, aq: false, rl: false },
        );
        check32(
            0x18E5272F,
            InstrId::SC_W,
            Operands::A { rd: 14, rs1: 10, rs2: 14, aq: false, rl: false },
        );
        check32(
            0x0C55232F,
            InstrId::AMOSWAP_W,
            Operands::A { rd: 6, rs1: 10, rs2: 5, aq: true, rl: false },
        );
        let mut isa = isa_all();
        isa.rva = false;
        assert_eq!(decode::<u32>(0x1005272F, &isa).id, InstrId::ILLEGAL);
    }

    #[test]
    fn test_decode_fp() {
        check32(
            0x00B576D3,
            InstrId::FADD_S,
            Operands::RRm { rd: 13, rs1: 10, rs2: 11, rm: 7 },
        );
        check32(
            0xE0068553,
            InstrId::FMV_X_W,
            Operands::RRm { rd: 10, rs1: 13, rs2: 0, rm: 0 },
        );
        check32(
            0xC0051553,
            InstrId::FCVT_W_S,
            Operands::RRm { rd: 10, rs1: 10, rs2: 0, rm: 1 },
        );
        // fmadd.s f1, f2, f3, f4
        check32(
            0x203100C3,
            InstrId::FMADD_S,
            Operands::R4Rm { rd: 1, rs1: 2, rs2: 3, rs3: 4, rm: 0 },
        );
        let mut isa = isa_all();
        isa.rvf = false;
        isa.rvd = false;
        assert_eq!(decode::<u32>(0x00B576D3, &isa).id, InstrId::ILLEGAL);
    }

    #[test]
    fn test_decode_bitmanip_gated() {
        // clz x5, x6 (imm 0x600, funct3 1)
        let clz = (0x600 << 20) | (6 << 15) | (1 << 12) | (5 << 7) | 0x13;
        let decoded = decode::<u32>(clz, &isa_all());
        assert_eq!(decoded.id, InstrId::CLZ);
        let mut isa = isa_all();
        isa.zbmini = false;
        assert_eq!(decode::<u32>(clz, &isa).id, InstrId::ILLEGAL);

        // min x1, x2, x3: funct7=5, funct3=2
        let min = (5 << 25) | (3 << 20) | (2 << 15) | (2 << 12) | (1 << 7) | 0x33;
        assert_eq!(decode::<u32>(min, &isa_all()).id, InstrId::MIN);
        assert_eq!(decode::<u32>(min, &isa).id, InstrId::ILLEGAL);
    }

    #[test]
    fn test_decode_custom_q_moves() {
        // getq x5, q1: custom-0 opcode 0x0B, funct7 0
        let getq = (0 << 25) | (1 << 15) | (5 << 7) | 0x0B;
        assert_eq!(decode::<u32>(getq, &isa_all()).id, InstrId::GETQ);
        let setq = (1 << 25) | (2 << 15) | (1 << 7) | 0x0B;
        assert_eq!(decode::<u32>(setq, &isa_all()).id, InstrId::SETQ);
        // Unimplemented custom slots decode as illegal.
        let retirq = (2 << 25) | 0x0B;
        assert_eq!(decode::<u32>(retirq, &isa_all()).id, InstrId::ILLEGAL);
    }
}
