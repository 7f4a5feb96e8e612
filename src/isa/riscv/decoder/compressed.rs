//! Compressed (C extension) instruction handling.
//!
//! Two paths: [`decode16`] expands a 16-bit parcel straight to the decoded
//! operands the executor runs on, and [`expand16`] produces the equivalent
//! 32-bit encoding for disassembly. The two must agree bit-for-bit; the
//! exhaustive round-trip test at the bottom holds them to that.

use crate::isa::riscv::hart::IsaFlags;
use crate::isa::riscv::instruction::{DecodedInst, InstrId, Operands};
use crate::utils::{sign_extend, Word};

const REG_RA: u8 = 1;
const REG_SP: u8 = 2;

fn rdp(inst: u16) -> u8 {
    8 + ((inst >> 2) & 7) as u8
}

fn rs1p(inst: u16) -> u8 {
    8 + ((inst >> 7) & 7) as u8
}

fn rd_full(inst: u16) -> u8 {
    ((inst >> 7) & 0x1F) as u8
}

fn rs2_full(inst: u16) -> u8 {
    ((inst >> 2) & 0x1F) as u8
}

fn bit(inst: u16, ix: u32) -> u32 {
    ((inst >> ix) & 1) as u32
}

fn bits(inst: u16, hi: u32, lo: u32) -> u32 {
    ((inst as u32) >> lo) & ((1 << (hi - lo + 1)) - 1)
}

// Immediate extraction, one function per compressed form.

fn ciw_imm(inst: u16) -> u32 {
    (bits(inst, 12, 11) << 4) | (bits(inst, 10, 7) << 6) | (bit(inst, 6) << 2) | (bit(inst, 5) << 3)
}

fn cl_lw_imm(inst: u16) -> u32 {
    (bits(inst, 12, 10) << 3) | (bit(inst, 6) << 2) | (bit(inst, 5) << 6)
}

fn cl_ld_imm(inst: u16) -> u32 {
    (bits(inst, 12, 10) << 3) | (bits(inst, 6, 5) << 6)
}

fn ci_imm(inst: u16) -> i32 {
    let raw = (bit(inst, 12) << 5) | bits(inst, 6, 2);
    sign_extend(raw as u64, 6) as i32
}

fn ci_addi16sp_imm(inst: u16) -> i32 {
    let raw = (bit(inst, 12) << 9)
        | (bit(inst, 6) << 4)
        | (bit(inst, 5) << 6)
        | (bits(inst, 4, 3) << 7)
        | (bit(inst, 2) << 5);
    sign_extend(raw as u64, 10) as i32
}

fn ci_shamt(inst: u16) -> u32 {
    (bit(inst, 12) << 5) | bits(inst, 6, 2)
}

fn ci_lwsp_imm(inst: u16) -> u32 {
    (bit(inst, 12) << 5) | (bits(inst, 6, 4) << 2) | (bits(inst, 3, 2) << 6)
}

fn ci_ldsp_imm(inst: u16) -> u32 {
    (bit(inst, 12) << 5) | (bits(inst, 6, 5) << 3) | (bits(inst, 4, 2) << 6)
}

fn css_swsp_imm(inst: u16) -> u32 {
    (bits(inst, 12, 9) << 2) | (bits(inst, 8, 7) << 6)
}

fn css_sdsp_imm(inst: u16) -> u32 {
    (bits(inst, 12, 10) << 3) | (bits(inst, 9, 7) << 6)
}

fn cj_imm(inst: u16) -> i32 {
    let raw = (bit(inst, 12) << 11)
        | (bit(inst, 11) << 4)
        | (bits(inst, 10, 9) << 8)
        | (bit(inst, 8) << 10)
        | (bit(inst, 7) << 6)
        | (bit(inst, 6) << 7)
        | (bits(inst, 5, 3) << 1)
        | (bit(inst, 2) << 5);
    sign_extend(raw as u64, 12) as i32
}

fn cb_imm(inst: u16) -> i32 {
    let raw = (bit(inst, 12) << 8)
        | (bits(inst, 11, 10) << 3)
        | (bits(inst, 6, 5) << 6)
        | (bits(inst, 4, 3) << 1)
        | (bit(inst, 2) << 5);
    sign_extend(raw as u64, 9) as i32
}

fn di(id: InstrId, ops: Operands) -> DecodedInst {
    DecodedInst { id, ops }
}

fn i_ops(rd: u8, rs1: u8, imm: i32) -> Operands {
    Operands::I { rd, rs1, imm }
}

fn s_ops(rs1: u8, rs2: u8, imm: i32) -> Operands {
    Operands::S { rs1, rs2, imm }
}

fn r_ops(rd: u8, rs1: u8, rs2: u8) -> Operands {
    Operands::R { rd, rs1, rs2 }
}

/// Expand a compressed parcel to the decoded instruction the executor runs.
pub fn decode16<W: Word>(inst: u16, isa: &IsaFlags) -> DecodedInst {
    if !isa.rvc {
        return DecodedInst::illegal();
    }

    let f3 = (inst >> 13) & 7;
    match inst & 3 {
        0 => decode16_q0::<W>(inst, f3, isa),
        1 => decode16_q1::<W>(inst, f3),
        2 => decode16_q2::<W>(inst, f3, isa),
        _ => unreachable!(),
    }
}

fn decode16_q0<W: Word>(inst: u16, f3: u16, isa: &IsaFlags) -> DecodedInst {
    match f3 {
        0 => {
            // c.addi4spn
            if inst == 0 {
                return DecodedInst::illegal();
            }
            let imm = ciw_imm(inst);
            if imm == 0 {
                return DecodedInst::illegal();
            }
            di(InstrId::ADDI, i_ops(rdp(inst), REG_SP, imm as i32))
        }
        1 => {
            // c.fld
            if !isa.rvd {
                return DecodedInst::illegal();
            }
            di(InstrId::FLD, i_ops(rdp(inst), rs1p(inst), cl_ld_imm(inst) as i32))
        }
        2 => di(InstrId::LW, i_ops(rdp(inst), rs1p(inst), cl_lw_imm(inst) as i32)),
        3 => {
            // c.flw on RV32, c.ld on RV64.
            if W::XLEN == 64 {
                di(InstrId::LD, i_ops(rdp(inst), rs1p(inst), cl_ld_imm(inst) as i32))
            } else if isa.rvf {
                di(InstrId::FLW, i_ops(rdp(inst), rs1p(inst), cl_lw_imm(inst) as i32))
            } else {
                DecodedInst::illegal()
            }
        }
        5 => {
            // c.fsd
            if !isa.rvd {
                return DecodedInst::illegal();
            }
            di(InstrId::FSD, s_ops(rs1p(inst), rdp(inst), cl_ld_imm(inst) as i32))
        }
        6 => di(InstrId::SW, s_ops(rs1p(inst), rdp(inst), cl_lw_imm(inst) as i32)),
        7 => {
            // c.fsw on RV32, c.sd on RV64.
            if W::XLEN == 64 {
                di(InstrId::SD, s_ops(rs1p(inst), rdp(inst), cl_ld_imm(inst) as i32))
            } else if isa.rvf {
                di(InstrId::FSW, s_ops(rs1p(inst), rdp(inst), cl_lw_imm(inst) as i32))
            } else {
                DecodedInst::illegal()
            }
        }
        _ => DecodedInst::illegal(), // funct3 == 4 is reserved.
    }
}

fn decode16_q1<W: Word>(inst: u16, f3: u16) -> DecodedInst {
    match f3 {
        0 => {
            // c.nop / c.addi
            let r = rd_full(inst);
            di(InstrId::ADDI, i_ops(r, r, ci_imm(inst)))
        }
        1 => {
            if W::XLEN == 64 {
                // c.addiw
                let r = rd_full(inst);
                if r == 0 {
                    return DecodedInst::illegal();
                }
                di(InstrId::ADDIW, i_ops(r, r, ci_imm(inst)))
            } else {
                // c.jal
                di(InstrId::JAL, Operands::J { rd: REG_RA, imm: cj_imm(inst) })
            }
        }
        2 => di(InstrId::ADDI, i_ops(rd_full(inst), 0, ci_imm(inst))), // c.li
        3 => {
            let r = rd_full(inst);
            if r == REG_SP {
                // c.addi16sp
                let imm = ci_addi16sp_imm(inst);
                if imm == 0 {
                    return DecodedInst::illegal();
                }
                di(InstrId::ADDI, i_ops(REG_SP, REG_SP, imm))
            } else {
                // c.lui
                let imm = ci_imm(inst);
                if imm == 0 {
                    return DecodedInst::illegal();
                }
                di(InstrId::LUI, Operands::U { rd: r, imm: imm << 12 })
            }
        }
        4 => decode16_q1_alu::<W>(inst),
        5 => di(InstrId::JAL, Operands::J { rd: 0, imm: cj_imm(inst) }), // c.j
        6 => di(InstrId::BEQ, Operands::B { rs1: rs1p(inst), rs2: 0, imm: cb_imm(inst) }),
        7 => di(InstrId::BNE, Operands::B { rs1: rs1p(inst), rs2: 0, imm: cb_imm(inst) }),
        _ => unreachable!(),
    }
}

fn decode16_q1_alu<W: Word>(inst: u16) -> DecodedInst {
    let r = rs1p(inst);
    match bits(inst, 11, 10) {
        0 | 1 => {
            // c.srli / c.srai
            let shamt = ci_shamt(inst);
            if W::XLEN == 32 && shamt > 31 {
                return DecodedInst::illegal();
            }
            let id = if bits(inst, 11, 10) == 0 {
                InstrId::SRLI
            } else {
                InstrId::SRAI
            };
            di(id, i_ops(r, r, shamt as i32))
        }
        2 => di(InstrId::ANDI, i_ops(r, r, ci_imm(inst))), // c.andi
        3 => {
            let rs2 = rdp(inst);
            if bit(inst, 12) == 0 {
                let id = match bits(inst, 6, 5) {
                    0 => InstrId::SUB,
                    1 => InstrId::XOR,
                    2 => InstrId::OR,
                    3 => InstrId::AND,
                    _ => unreachable!(),
                };
                di(id, r_ops(r, r, rs2))
            } else {
                if W::XLEN != 64 {
                    return DecodedInst::illegal();
                }
                match bits(inst, 6, 5) {
                    0 => di(InstrId::SUBW, r_ops(r, r, rs2)),
                    1 => di(InstrId::ADDW, r_ops(r, r, rs2)),
                    _ => DecodedInst::illegal(),
                }
            }
        }
        _ => unreachable!(),
    }
}

fn decode16_q2<W: Word>(inst: u16, f3: u16, isa: &IsaFlags) -> DecodedInst {
    let r = rd_full(inst);
    let rs2 = rs2_full(inst);
    match f3 {
        0 => {
            // c.slli
            let shamt = ci_shamt(inst);
            if W::XLEN == 32 && shamt > 31 {
                return DecodedInst::illegal();
            }
            di(InstrId::SLLI, i_ops(r, r, shamt as i32))
        }
        1 => {
            // c.fldsp
            if !isa.rvd {
                return DecodedInst::illegal();
            }
            di(InstrId::FLD, i_ops(r, REG_SP, ci_ldsp_imm(inst) as i32))
        }
        2 => {
            // c.lwsp
            if r == 0 {
                return DecodedInst::illegal();
            }
            di(InstrId::LW, i_ops(r, REG_SP, ci_lwsp_imm(inst) as i32))
        }
        3 => {
            // c.flwsp on RV32, c.ldsp on RV64.
            if W::XLEN == 64 {
                if r == 0 {
                    return DecodedInst::illegal();
                }
                di(InstrId::LD, i_ops(r, REG_SP, ci_ldsp_imm(inst) as i32))
            } else if isa.rvf {
                di(InstrId::FLW, i_ops(r, REG_SP, ci_lwsp_imm(inst) as i32))
            } else {
                DecodedInst::illegal()
            }
        }
        4 => {
            if bit(inst, 12) == 0 {
                if rs2 == 0 {
                    // c.jr
                    if r == 0 {
                        return DecodedInst::illegal();
                    }
                    di(InstrId::JALR, i_ops(0, r, 0))
                } else {
                    // c.mv
                    di(InstrId::ADD, r_ops(r, 0, rs2))
                }
            } else if rs2 == 0 {
                if r == 0 {
                    di(InstrId::EBREAK, Operands::None) // c.ebreak
                } else {
                    di(InstrId::JALR, i_ops(REG_RA, r, 0)) // c.jalr
                }
            } else {
                di(InstrId::ADD, r_ops(r, r, rs2)) // c.add
            }
        }
        5 => {
            // c.fsdsp
            if !isa.rvd {
                return DecodedInst::illegal();
            }
            di(InstrId::FSD, s_ops(REG_SP, rs2, css_sdsp_imm(inst) as i32))
        }
        6 => di(InstrId::SW, s_ops(REG_SP, rs2, css_swsp_imm(inst) as i32)), // c.swsp
        7 => {
            // c.fswsp on RV32, c.sdsp on RV64.
            if W::XLEN == 64 {
                di(InstrId::SD, s_ops(REG_SP, rs2, css_sdsp_imm(inst) as i32))
            } else if isa.rvf {
                di(InstrId::FSW, s_ops(REG_SP, rs2, css_swsp_imm(inst) as i32))
            } else {
                DecodedInst::illegal()
            }
        }
        _ => unreachable!(),
    }
}

// ------------------------------------------------------------------
// Encoding path: 16-bit parcel to the equivalent 32-bit word.
// ------------------------------------------------------------------

fn encode_r(opcode: u32, f3: u32, f7: u32, rd: u8, rs1: u8, rs2: u8) -> u32 {
    opcode
        | ((rd as u32) << 7)
        | (f3 << 12)
        | ((rs1 as u32) << 15)
        | ((rs2 as u32) << 20)
        | (f7 << 25)
}

fn encode_i(opcode: u32, f3: u32, rd: u8, rs1: u8, imm: i32) -> u32 {
    opcode
        | ((rd as u32) << 7)
        | (f3 << 12)
        | ((rs1 as u32) << 15)
        | (((imm as u32) & 0xFFF) << 20)
}

fn encode_s(opcode: u32, f3: u32, rs1: u8, rs2: u8, imm: i32) -> u32 {
    let imm = imm as u32;
    opcode
        | ((imm & 0x1F) << 7)
        | (f3 << 12)
        | ((rs1 as u32) << 15)
        | ((rs2 as u32) << 20)
        | (((imm >> 5) & 0x7F) << 25)
}

fn encode_b(opcode: u32, f3: u32, rs1: u8, rs2: u8, imm: i32) -> u32 {
    let imm = imm as u32;
    opcode
        | (((imm >> 11) & 1) << 7)
        | (((imm >> 1) & 0xF) << 8)
        | (f3 << 12)
        | ((rs1 as u32) << 15)
        | ((rs2 as u32) << 20)
        | (((imm >> 5) & 0x3F) << 25)
        | (((imm >> 12) & 1) << 31)
}

fn encode_u(opcode: u32, rd: u8, imm: i32) -> u32 {
    opcode | ((rd as u32) << 7) | ((imm as u32) & 0xFFFF_F000)
}

fn encode_j(opcode: u32, rd: u8, imm: i32) -> u32 {
    let imm = imm as u32;
    opcode
        | ((rd as u32) << 7)
        | (((imm >> 12) & 0xFF) << 12)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 1) & 0x3FF) << 21)
        | (((imm >> 20) & 1) << 31)
}

const OP_LOAD: u32 = 0x03;
const OP_LOAD_FP: u32 = 0x07;
const OP_OP_IMM: u32 = 0x13;
const OP_STORE: u32 = 0x23;
const OP_STORE_FP: u32 = 0x27;
const OP_OP: u32 = 0x33;
const OP_LUI: u32 = 0x37;
const OP_OP_IMM32: u32 = 0x1B;
const OP_OP_32: u32 = 0x3B;
const OP_BRANCH: u32 = 0x63;
const OP_JALR: u32 = 0x67;
const OP_JAL: u32 = 0x6F;
const OP_SYSTEM: u32 = 0x73;

/// Produce the 32-bit encoding equivalent to a compressed parcel, for
/// disassembly. Returns None for illegal/reserved parcels.
pub fn expand16<W: Word>(inst: u16, isa: &IsaFlags) -> Option<u32> {
    if !isa.rvc {
        return None;
    }
    let decoded = decode16::<W>(inst, isa);
    if decoded.id == InstrId::ILLEGAL {
        return None;
    }

    let code32 = match (decoded.id, decoded.ops) {
        (InstrId::ADDI, Operands::I { rd, rs1, imm }) => encode_i(OP_OP_IMM, 0, rd, rs1, imm),
        (InstrId::ADDIW, Operands::I { rd, rs1, imm }) => encode_i(OP_OP_IMM32, 0, rd, rs1, imm),
        (InstrId::ANDI, Operands::I { rd, rs1, imm }) => encode_i(OP_OP_IMM, 7, rd, rs1, imm),
        (InstrId::SLLI, Operands::I { rd, rs1, imm }) => encode_i(OP_OP_IMM, 1, rd, rs1, imm),
        (InstrId::SRLI, Operands::I { rd, rs1, imm }) => encode_i(OP_OP_IMM, 5, rd, rs1, imm),
        (InstrId::SRAI, Operands::I { rd, rs1, imm }) => {
            encode_i(OP_OP_IMM, 5, rd, rs1, imm | 0x400)
        }
        (InstrId::LUI, Operands::U { rd, imm }) => encode_u(OP_LUI, rd, imm),
        (InstrId::LW, Operands::I { rd, rs1, imm }) => encode_i(OP_LOAD, 2, rd, rs1, imm),
        (InstrId::LD, Operands::I { rd, rs1, imm }) => encode_i(OP_LOAD, 3, rd, rs1, imm),
        (InstrId::FLW, Operands::I { rd, rs1, imm }) => encode_i(OP_LOAD_FP, 2, rd, rs1, imm),
        (InstrId::FLD, Operands::I { rd, rs1, imm }) => encode_i(OP_LOAD_FP, 3, rd, rs1, imm),
        (InstrId::SW, Operands::S { rs1, rs2, imm }) => encode_s(OP_STORE, 2, rs1, rs2, imm),
        (InstrId::SD, Operands::S { rs1, rs2, imm }) => encode_s(OP_STORE, 3, rs1, rs2, imm),
        (InstrId::FSW, Operands::S { rs1, rs2, imm }) => encode_s(OP_STORE_FP, 2, rs1, rs2, imm),
        (InstrId::FSD, Operands::S { rs1, rs2, imm }) => encode_s(OP_STORE_FP, 3, rs1, rs2, imm),
        (InstrId::JAL, Operands::J { rd, imm }) => encode_j(OP_JAL, rd, imm),
        (InstrId::JALR, Operands::I { rd, rs1, imm }) => encode_i(OP_JALR, 0, rd, rs1, imm),
        (InstrId::BEQ, Operands::B { rs1, rs2, imm }) => encode_b(OP_BRANCH, 0, rs1, rs2, imm),
        (InstrId::BNE, Operands::B { rs1, rs2, imm }) => encode_b(OP_BRANCH, 1, rs1, rs2, imm),
        (InstrId::ADD, Operands::R { rd, rs1, rs2 }) => encode_r(OP_OP, 0, 0, rd, rs1, rs2),
        (InstrId::SUB, Operands::R { rd, rs1, rs2 }) => encode_r(OP_OP, 0, 0x20, rd, rs1, rs2),
        (InstrId::XOR, Operands::R { rd, rs1, rs2 }) => encode_r(OP_OP, 4, 0, rd, rs1, rs2),
        (InstrId::OR, Operands::R { rd, rs1, rs2 }) => encode_r(OP_OP, 6, 0, rd, rs1, rs2),
        (InstrId::AND, Operands::R { rd, rs1, rs2 }) => encode_r(OP_OP, 7, 0, rd, rs1, rs2),
        (InstrId::ADDW, Operands::R { rd, rs1, rs2 }) => encode_r(OP_OP_32, 0, 0, rd, rs1, rs2),
        (InstrId::SUBW, Operands::R { rd, rs1, rs2 }) => encode_r(OP_OP_32, 0, 0x20, rd, rs1, rs2),
        (InstrId::EBREAK, _) => encode_i(OP_SYSTEM, 0, 0, 0, 1),
        _ => return None,
    };
    Some(code32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::riscv::decoder::decode32;

    fn isa_all() -> IsaFlags {
        IsaFlags {
            rva: true,
            rvc: true,
            rvd: true,
            rvf: true,
            rvm: true,
            rvs: true,
            rvu: true,
            zbmini: false,
        }
    }

    #[test]
    fn test_known_expansions() {
        let isa = isa_all();
        // c.addi4spn x8, sp, 16  (ciw imm=16)
        let d = decode16::<u32>(0x0800, &isa);
        assert_eq!(d.id, InstrId::ADDI);
        assert_eq!(d.ops, Operands::I { rd: 8, rs1: 2, imm: 16 });

        // c.nop
        let d = decode16::<u32>(0x0001, &isa);
        assert_eq!(d.id, InstrId::ADDI);
        assert_eq!(d.ops, Operands::I { rd: 0, rs1: 0, imm: 0 });

        // c.addi x1, x1, -1: 0x1FFD  (rd=1 imm=-1)
        let d = decode16::<u32>(0x10FD, &isa);
        assert_eq!(d.id, InstrId::ADDI);
        assert_eq!(d.ops, Operands::I { rd: 1, rs1: 1, imm: -1 });

        // c.li a0, 5 -> addi a0, x0, 5
        let d = decode16::<u32>(0x4515, &isa);
        assert_eq!(d.id, InstrId::ADDI);
        assert_eq!(d.ops, Operands::I { rd: 10, rs1: 0, imm: 5 });

        // c.lwsp a0, 0(sp)
        let d = decode16::<u32>(0x4502, &isa);
        assert_eq!(d.id, InstrId::LW);
        assert_eq!(d.ops, Operands::I { rd: 10, rs1: 2, imm: 0 });

        // c.swsp a0, 0(sp)
        let d = decode16::<u32>(0xC02A, &isa);
        assert_eq!(d.id, InstrId::SW);
        assert_eq!(d.ops, Operands::S { rs1: 2, rs2: 10, imm: 0 });

        // c.mv a0, a1
        let d = decode16::<u32>(0x852E, &isa);
        assert_eq!(d.id, InstrId::ADD);
        assert_eq!(d.ops, Operands::R { rd: 10, rs1: 0, rs2: 11 });

        // c.ebreak
        let d = decode16::<u32>(0x9002, &isa);
        assert_eq!(d.id, InstrId::EBREAK);

        // c.jr ra
        let d = decode16::<u32>(0x8082, &isa);
        assert_eq!(d.id, InstrId::JALR);
        assert_eq!(d.ops, Operands::I { rd: 0, rs1: 1, imm: 0 });
    }

    #[test]
    fn test_reserved_encodings_illegal() {
        let isa = isa_all();
        assert_eq!(decode16::<u32>(0x0000, &isa).id, InstrId::ILLEGAL);
        // c.addi4spn with zero immediate.
        assert_eq!(decode16::<u32>(0x0008, &isa).id, InstrId::ILLEGAL);
        // c.lwsp with rd == 0.
        assert_eq!(decode16::<u32>(0x4002, &isa).id, InstrId::ILLEGAL);
        // c.jr with rs1 == 0.
        assert_eq!(decode16::<u32>(0x8002, &isa).id, InstrId::ILLEGAL);
    }

    #[test]
    fn test_c_disabled() {
        let mut isa = isa_all();
        isa.rvc = false;
        assert_eq!(decode16::<u32>(0x4502, &isa).id, InstrId::ILLEGAL);
        assert_eq!(expand16::<u32>(0x4502, &isa), None);
    }

    /// The executing path and the encoding path must agree on every legal
    /// 16-bit parcel, on both widths.
    #[test]
    fn test_exhaustive_roundtrip() {
        let isa = isa_all();
        for raw in 0..=u16::MAX {
            if raw & 3 == 3 {
                continue; // not compressed
            }
            for rv64 in [false, true] {
                let (direct, expanded) = if rv64 {
                    (
                        decode16::<u64>(raw, &isa),
                        expand16::<u64>(raw, &isa).map(|w| decode32::<u64>(w, &isa)),
                    )
                } else {
                    (
                        decode16::<u32>(raw, &isa),
                        expand16::<u32>(raw, &isa).map(|w| decode32::<u32>(w, &isa)),
                    )
                };
                match expanded {
                    Some(via32) => assert_eq!(
                        direct, via32,
                        "mismatch for parcel {:#06x} (rv64={})",
                        raw, rv64
                    ),
                    None => assert_eq!(
                        direct.id,
                        InstrId::ILLEGAL,
                        "parcel {:#06x} (rv64={}) decodes but does not encode",
                        raw,
                        rv64
                    ),
                }
            }
        }
    }
}
