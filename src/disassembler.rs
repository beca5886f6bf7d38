//! The Owl-2820 disassembler.
//!
//! [`Disassembler`] implements [`InstructionHandler`] by formatting each
//! instruction with symbolic register names. A few common shapes are
//! prettified to their conventional pseudo-instructions: `jalr zero, 0(ra)`
//! prints as `ret`, `addi rd, zero, imm` as `li`, and `addi rd, rs, 0` as
//! `mv`.

use crate::cpu::registers::{abi, NAMES};
use crate::isa::InstructionHandler;

/// Formats decoded instructions as human-readable assembly.
pub struct Disassembler;

impl Disassembler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Disassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Name of register `r`.
fn reg(r: u32) -> &'static str {
    NAMES[(r & 0x1f) as usize]
}

impl InstructionHandler for Disassembler {
    type Output = String;

    fn illegal(&mut self, ins: u32) -> String {
        format!("illegal {:08x}", ins)
    }

    // System instructions.

    fn ecall(&mut self) -> String {
        "ecall".to_string()
    }

    fn ebreak(&mut self) -> String {
        "ebreak".to_string()
    }

    // Register-register instructions.

    fn add(&mut self, rd: u32, rs1: u32, rs2: u32) -> String {
        format!("add {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
    }

    fn sub(&mut self, rd: u32, rs1: u32, rs2: u32) -> String {
        format!("sub {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
    }

    fn sll(&mut self, rd: u32, rs1: u32, rs2: u32) -> String {
        format!("sll {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
    }

    fn slt(&mut self, rd: u32, rs1: u32, rs2: u32) -> String {
        format!("slt {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
    }

    fn sltu(&mut self, rd: u32, rs1: u32, rs2: u32) -> String {
        format!("sltu {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
    }

    fn xor(&mut self, rd: u32, rs1: u32, rs2: u32) -> String {
        format!("xor {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
    }

    fn srl(&mut self, rd: u32, rs1: u32, rs2: u32) -> String {
        format!("srl {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
    }

    fn sra(&mut self, rd: u32, rs1: u32, rs2: u32) -> String {
        format!("sra {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
    }

    fn or(&mut self, rd: u32, rs1: u32, rs2: u32) -> String {
        format!("or {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
    }

    fn and(&mut self, rd: u32, rs1: u32, rs2: u32) -> String {
        format!("and {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
    }

    // Immediate shift instructions.

    fn slli(&mut self, rd: u32, rs1: u32, shamt: u32) -> String {
        format!("slli {}, {}, {}", reg(rd), reg(rs1), shamt)
    }

    fn srli(&mut self, rd: u32, rs1: u32, shamt: u32) -> String {
        format!("srli {}, {}, {}", reg(rd), reg(rs1), shamt)
    }

    fn srai(&mut self, rd: u32, rs1: u32, shamt: u32) -> String {
        format!("srai {}, {}, {}", reg(rd), reg(rs1), shamt)
    }

    // Branch instructions.

    fn beq(&mut self, rs1: u32, rs2: u32, offset: i32) -> String {
        format!("beq {}, {}, {}", reg(rs1), reg(rs2), offset)
    }

    fn bne(&mut self, rs1: u32, rs2: u32, offset: i32) -> String {
        format!("bne {}, {}, {}", reg(rs1), reg(rs2), offset)
    }

    fn blt(&mut self, rs1: u32, rs2: u32, offset: i32) -> String {
        format!("blt {}, {}, {}", reg(rs1), reg(rs2), offset)
    }

    fn bge(&mut self, rs1: u32, rs2: u32, offset: i32) -> String {
        format!("bge {}, {}, {}", reg(rs1), reg(rs2), offset)
    }

    fn bltu(&mut self, rs1: u32, rs2: u32, offset: i32) -> String {
        format!("bltu {}, {}, {}", reg(rs1), reg(rs2), offset)
    }

    fn bgeu(&mut self, rs1: u32, rs2: u32, offset: i32) -> String {
        format!("bgeu {}, {}, {}", reg(rs1), reg(rs2), offset)
    }

    // Register-immediate instructions.

    fn addi(&mut self, rd: u32, rs1: u32, imm: i32) -> String {
        if rs1 == abi::ZERO {
            format!("li {}, {}", reg(rd), imm)
        } else if imm == 0 {
            format!("mv {}, {}", reg(rd), reg(rs1))
        } else {
            format!("addi {}, {}, {}", reg(rd), reg(rs1), imm)
        }
    }

    fn slti(&mut self, rd: u32, rs1: u32, imm: i32) -> String {
        format!("slti {}, {}, {}", reg(rd), reg(rs1), imm)
    }

    fn sltiu(&mut self, rd: u32, rs1: u32, imm: i32) -> String {
        format!("sltiu {}, {}, {}", reg(rd), reg(rs1), imm)
    }

    fn xori(&mut self, rd: u32, rs1: u32, imm: i32) -> String {
        format!("xori {}, {}, {}", reg(rd), reg(rs1), imm)
    }

    fn ori(&mut self, rd: u32, rs1: u32, imm: i32) -> String {
        format!("ori {}, {}, {}", reg(rd), reg(rs1), imm)
    }

    fn andi(&mut self, rd: u32, rs1: u32, imm: i32) -> String {
        format!("andi {}, {}, {}", reg(rd), reg(rs1), imm)
    }

    // Load instructions.

    fn lb(&mut self, rd: u32, offset: i32, base: u32) -> String {
        format!("lb {}, {}({})", reg(rd), offset, reg(base))
    }

    fn lbu(&mut self, rd: u32, offset: i32, base: u32) -> String {
        format!("lbu {}, {}({})", reg(rd), offset, reg(base))
    }

    fn lh(&mut self, rd: u32, offset: i32, base: u32) -> String {
        format!("lh {}, {}({})", reg(rd), offset, reg(base))
    }

    fn lhu(&mut self, rd: u32, offset: i32, base: u32) -> String {
        format!("lhu {}, {}({})", reg(rd), offset, reg(base))
    }

    fn lw(&mut self, rd: u32, offset: i32, base: u32) -> String {
        format!("lw {}, {}({})", reg(rd), offset, reg(base))
    }

    // Store instructions.

    fn sb(&mut self, rs: u32, offset: i32, base: u32) -> String {
        format!("sb {}, {}({})", reg(rs), offset, reg(base))
    }

    fn sh(&mut self, rs: u32, offset: i32, base: u32) -> String {
        format!("sh {}, {}({})", reg(rs), offset, reg(base))
    }

    fn sw(&mut self, rs: u32, offset: i32, base: u32) -> String {
        format!("sw {}, {}({})", reg(rs), offset, reg(base))
    }

    // Memory ordering instructions.

    fn fence(&mut self) -> String {
        "fence".to_string()
    }

    // Subroutine call instructions.

    fn jalr(&mut self, rd: u32, offset: i32, base: u32) -> String {
        if rd == abi::ZERO && base == abi::RA && offset == 0 {
            "ret".to_string()
        } else {
            format!("jalr {}, {}({})", reg(rd), offset, reg(base))
        }
    }

    fn jal(&mut self, rd: u32, offset: i32) -> String {
        if rd == abi::RA {
            format!("jal {}", offset)
        } else {
            format!("jal {}, {}", reg(rd), offset)
        }
    }

    // Upper immediate instructions.

    fn lui(&mut self, rd: u32, uimm: u32) -> String {
        format!("lui {}, {}", reg(rd), uimm)
    }

    fn auipc(&mut self, rd: u32, uimm: u32) -> String {
        format!("auipc {}, {}", reg(rd), uimm)
    }

    // Owl-2820 only instructions.

    fn j(&mut self, offset: i32) -> String {
        format!("j {}", offset)
    }

    fn call(&mut self, offset: i32) -> String {
        format!("call {}", offset)
    }

    fn ret(&mut self) -> String {
        "ret".to_string()
    }

    fn li(&mut self, rd: u32, imm: i32) -> String {
        format!("li {}, {}", reg(rd), imm)
    }

    fn mv(&mut self, rd: u32, rs: u32) -> String {
        format!("mv {}, {}", reg(rd), reg(rs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Assembler;
    use crate::cpu::registers::abi::*;
    use crate::isa::dispatch_owl;
    use crate::rv32i::dispatch_rv32i;

    fn disassemble_owl(words: &[u32]) -> Vec<String> {
        let mut d = Disassembler::new();
        words.iter().map(|&w| dispatch_owl(&mut d, w)).collect()
    }

    #[test]
    fn formats_register_register_forms() {
        let mut asm = Assembler::new();
        asm.add(A2, A0, A1);
        asm.sra(T0, S0, S1);
        let lines = disassemble_owl(asm.code().unwrap());
        assert_eq!(lines, ["add a2, a0, a1", "sra t0, s0, s1"]);
    }

    #[test]
    fn formats_loads_and_stores_with_base_offset() {
        let mut asm = Assembler::new();
        asm.lw(A1, 64, SP);
        asm.sb(A0, -1, S0);
        let lines = disassemble_owl(asm.code().unwrap());
        assert_eq!(lines, ["lw a1, 64(sp)", "sb a0, -1(s0)"]);
    }

    #[test]
    fn prettifies_pseudo_instructions() {
        let mut d = Disassembler::new();
        assert_eq!(d.jalr(ZERO, 0, RA), "ret");
        assert_eq!(d.addi(A0, ZERO, 42), "li a0, 42");
        assert_eq!(d.addi(A0, A1, 0), "mv a0, a1");
        assert_eq!(d.jal(RA, 16), "jal 16");
        assert_eq!(d.jal(ZERO, 16), "jal zero, 16");
    }

    #[test]
    fn unprettified_forms_survive() {
        let mut d = Disassembler::new();
        assert_eq!(d.jalr(RA, 0, T0), "jalr ra, 0(t0)");
        assert_eq!(d.addi(A0, A1, -3), "addi a0, a1, -3");
    }

    #[test]
    fn illegal_word_prints_its_bits() {
        let lines = disassemble_owl(&[0x0000_007F]);
        assert_eq!(lines, ["illegal 0000007f"]);
    }

    #[test]
    fn rv32i_and_owl_encodings_disassemble_alike() {
        // addi a1, a2, 0 both ways; the shared handler prettifies both to mv.
        let mut d = Disassembler::new();
        let from_rv32i = dispatch_rv32i(&mut d, 0x0006_0593);
        assert_eq!(from_rv32i, "mv a1, a2");

        let mut asm = Assembler::new();
        asm.addi(A1, A2, 0);
        let owl_word = asm.code().unwrap()[0];
        assert_eq!(dispatch_owl(&mut d, owl_word), "mv a1, a2");
    }

    #[test]
    fn owl_only_mnemonics() {
        let mut asm = Assembler::new();
        asm.j(-4);
        asm.call(8);
        asm.ret();
        asm.li(A0, -1);
        asm.mv(T3, T4);
        let lines = disassemble_owl(asm.code().unwrap());
        assert_eq!(lines, ["j -4", "call 8", "ret", "li a0, -1", "mv t3, t4"]);
    }
}
