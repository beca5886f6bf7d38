//! RV32I front end.
//!
//! Decodes the RISC-V 32-bit base integer encoding and drives the same
//! [`InstructionHandler`] trait as the Owl dispatcher, so an RV32I image can
//! be executed directly, disassembled, or re-emitted through the assembler
//! as Owl-2820 ([`transcode`]).
//!
//! RV32I scatters its immediates across the word to keep register fields in
//! fixed positions; [`Rv32Decoder`] reassembles them. Dispatch is a layered
//! match: exact words first (`ecall`, `ebreak`), then the funct7+funct3 mask
//! for register-register arithmetic, then the funct3 mask, then the bare
//! opcode mask. Anything that falls through every layer is illegal.

use crate::assembler::Assembler;
use crate::errors::VmError;
use crate::isa::InstructionHandler;

/// Field extraction from one RV32I instruction word.
pub struct Rv32Decoder {
    ins: u32,
}

impl Rv32Decoder {
    pub fn new(ins: u32) -> Self {
        Self { ins }
    }

    /// Destination register, bits 11:7.
    pub fn rd(&self) -> u32 {
        (self.ins >> 7) & 0x1f
    }

    /// First source register, bits 19:15.
    pub fn rs1(&self) -> u32 {
        (self.ins >> 15) & 0x1f
    }

    /// Second source register, bits 24:20.
    pub fn rs2(&self) -> u32 {
        (self.ins >> 20) & 0x1f
    }

    /// Shift amount for immediate shifts, bits 24:20.
    pub fn shamt(&self) -> u32 {
        (self.ins >> 20) & 0x1f
    }

    /// I-type immediate: sign-extended bits 31:20.
    pub fn imm_i(&self) -> i32 {
        (self.ins as i32) >> 20
    }

    /// S-type immediate: sign-extended bits 31:25 over bits 11:7.
    pub fn imm_s(&self) -> i32 {
        let imm11_5 = ((self.ins & 0xfe00_0000) as i32) >> 20; // ins[31:25] -> sext(imm[11:5])
        let imm4_0 = ((self.ins & 0x0000_0f80) >> 7) as i32; // ins[11:7]  -> imm[4:0]
        imm11_5 | imm4_0
    }

    /// B-type immediate: a 13-bit even branch offset reassembled from
    /// bits 31, 7, 30:25, and 11:8.
    pub fn imm_b(&self) -> i32 {
        let imm12 = ((self.ins & 0x8000_0000) as i32) >> 19; // ins[31] -> sext(imm[12])
        let imm11 = ((self.ins & 0x0000_0080) << 4) as i32; // ins[7] -> imm[11]
        let imm10_5 = ((self.ins & 0x7e00_0000) >> 20) as i32; // ins[30:25] -> imm[10:5]
        let imm4_1 = ((self.ins & 0x0000_0f00) >> 7) as i32; // ins[11:8] -> imm[4:1]
        imm12 | imm11 | imm10_5 | imm4_1
    }

    /// J-type immediate: a 21-bit even jump offset reassembled from
    /// bits 31, 19:12, 20, and 30:21.
    pub fn imm_j(&self) -> i32 {
        let imm20 = ((self.ins & 0x8000_0000) as i32) >> 11; // ins[31] -> sext(imm[20])
        let imm19_12 = (self.ins & 0x000f_f000) as i32; // ins[19:12] -> imm[19:12]
        let imm11 = ((self.ins & 0x0010_0000) >> 9) as i32; // ins[20] -> imm[11]
        let imm10_1 = ((self.ins & 0x7fe0_0000) >> 20) as i32; // ins[30:21] -> imm[10:1]
        imm20 | imm19_12 | imm11 | imm10_1
    }

    /// U-type immediate: bits 31:12 in place.
    pub fn imm_u(&self) -> u32 {
        self.ins & 0xffff_f000
    }
}

/// Decodes an RV32I word and invokes the matching handler method.
///
/// Branches pass `(rs1, rs2, offset)`; loads and `jalr` pass
/// `(rd, imm, rs1)`; stores pass `(rs1, imm, rs2)` into the handler's
/// `(src, offset, base)` slots. Offsets are byte offsets relative to the
/// instruction, exactly as the Owl dispatcher delivers them.
pub fn dispatch_rv32i<H: InstructionHandler>(handler: &mut H, ins: u32) -> H::Output {
    let rv = Rv32Decoder::new(ins);

    match ins {
        0x0000_0073 => return handler.ecall(),
        0x0010_0073 => return handler.ebreak(),
        _ => {}
    }
    match ins & 0xfe00_707f {
        0x0000_0033 => return handler.add(rv.rd(), rv.rs1(), rv.rs2()),
        0x4000_0033 => return handler.sub(rv.rd(), rv.rs1(), rv.rs2()),
        0x0000_1033 => return handler.sll(rv.rd(), rv.rs1(), rv.rs2()),
        0x0000_2033 => return handler.slt(rv.rd(), rv.rs1(), rv.rs2()),
        0x0000_3033 => return handler.sltu(rv.rd(), rv.rs1(), rv.rs2()),
        0x0000_4033 => return handler.xor(rv.rd(), rv.rs1(), rv.rs2()),
        0x0000_5033 => return handler.srl(rv.rd(), rv.rs1(), rv.rs2()),
        0x4000_5033 => return handler.sra(rv.rd(), rv.rs1(), rv.rs2()),
        0x0000_6033 => return handler.or(rv.rd(), rv.rs1(), rv.rs2()),
        0x0000_7033 => return handler.and(rv.rd(), rv.rs1(), rv.rs2()),
        0x0000_1013 => return handler.slli(rv.rd(), rv.rs1(), rv.shamt()),
        0x0000_5013 => return handler.srli(rv.rd(), rv.rs1(), rv.shamt()),
        0x4000_5013 => return handler.srai(rv.rd(), rv.rs1(), rv.shamt()),
        _ => {}
    }
    match ins & 0x0000_707f {
        0x0000_0063 => return handler.beq(rv.rs1(), rv.rs2(), rv.imm_b()),
        0x0000_1063 => return handler.bne(rv.rs1(), rv.rs2(), rv.imm_b()),
        0x0000_4063 => return handler.blt(rv.rs1(), rv.rs2(), rv.imm_b()),
        0x0000_5063 => return handler.bge(rv.rs1(), rv.rs2(), rv.imm_b()),
        0x0000_6063 => return handler.bltu(rv.rs1(), rv.rs2(), rv.imm_b()),
        0x0000_7063 => return handler.bgeu(rv.rs1(), rv.rs2(), rv.imm_b()),
        0x0000_0067 => return handler.jalr(rv.rd(), rv.imm_i(), rv.rs1()),
        0x0000_0013 => return handler.addi(rv.rd(), rv.rs1(), rv.imm_i()),
        0x0000_2013 => return handler.slti(rv.rd(), rv.rs1(), rv.imm_i()),
        0x0000_3013 => return handler.sltiu(rv.rd(), rv.rs1(), rv.imm_i()),
        0x0000_4013 => return handler.xori(rv.rd(), rv.rs1(), rv.imm_i()),
        0x0000_6013 => return handler.ori(rv.rd(), rv.rs1(), rv.imm_i()),
        0x0000_7013 => return handler.andi(rv.rd(), rv.rs1(), rv.imm_i()),
        0x0000_0003 => return handler.lb(rv.rd(), rv.imm_i(), rv.rs1()),
        0x0000_1003 => return handler.lh(rv.rd(), rv.imm_i(), rv.rs1()),
        0x0000_2003 => return handler.lw(rv.rd(), rv.imm_i(), rv.rs1()),
        0x0000_4003 => return handler.lbu(rv.rd(), rv.imm_i(), rv.rs1()),
        0x0000_5003 => return handler.lhu(rv.rd(), rv.imm_i(), rv.rs1()),
        0x0000_0023 => return handler.sb(rv.rs1(), rv.imm_s(), rv.rs2()),
        0x0000_1023 => return handler.sh(rv.rs1(), rv.imm_s(), rv.rs2()),
        0x0000_2023 => return handler.sw(rv.rs1(), rv.imm_s(), rv.rs2()),
        0x0000_000f => return handler.fence(),
        _ => {}
    }
    match ins & 0x0000_007f {
        0x0000_006f => return handler.jal(rv.rd(), rv.imm_j()),
        0x0000_0037 => return handler.lui(rv.rd(), rv.imm_u()),
        0x0000_0017 => return handler.auipc(rv.rd(), rv.imm_u()),
        _ => {}
    }
    handler.illegal(ins)
}

/// Re-emits an RV32I image as Owl-2820 through the assembler.
///
/// Every input word produces exactly one output word, so addresses (and
/// therefore branch targets) carry over unchanged. Words that match no RV32I
/// pattern - zero padding included - become `Illegal` words, which halt the
/// machine if ever fetched.
pub fn transcode(image: &[u32]) -> Result<Vec<u32>, VmError> {
    let mut asm = Assembler::new();
    for &word in image {
        dispatch_rv32i(&mut asm, word);
    }
    Ok(asm.code()?.to_vec())
}
