//! Instruction Set Architecture (ISA) definitions for Owl-2820.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical instruction definitions and invokes a callback macro for code
//! generation. This enables multiple modules to generate instruction-related
//! code without duplicating definitions.
//!
//! This module generates:
//! - The [`Opcode`] enum with tag values and mnemonics
//! - The [`InstructionHandler`] trait - one method per instruction, with the
//!   operand signature implied by the instruction's format kind
//! - [`dispatch_owl`] - decodes an Owl word and calls the matching handler
//!   method
//!
//! See [`assembler`](crate::assembler) for the generated encoding back end
//! and [`rv32i`](crate::rv32i) for the RISC-V front end that drives the same
//! handler trait.
//!
//! # Instruction word layout
//!
//! Instructions are fixed-width 32-bit words:
//! - Bits 6:0 - opcode tag
//! - Bits 11:7 - `r0` (destination / first operand register)
//! - Bits 16:12 - `r1` (second operand register)
//! - Bits 21:17 - `r2` or shift amount
//! - Bits 31:20 - 12-bit signed immediate, or a 12-bit branch offset
//!   pre-shifted so the (always zero) low bit is not stored
//! - Bits 31:12 - 20-bit jump offset (same low-bit treatment) or an upper-20
//!   immediate
//!
//! The [`encode`] and [`decode`] modules are the only code that knows these
//! positions. Encoders mask their argument to the field width; decoders
//! sign-extend signed fields by shifting the field to the top of the word
//! first and arithmetic-shifting back down.

use crate::errors::VmError;

/// Bit mask selecting the opcode tag of an instruction word.
pub const OPCODE_MASK: u32 = 0x7f;

/// Invokes a callback macro with the complete instruction definition list.
///
/// Each entry is `Name = tag, "mnemonic", handler_method => FormatKind`.
/// The format kind fixes the operand tuple the instruction carries:
///
/// | Kind       | Operands                  | Fields used                |
/// |------------|---------------------------|----------------------------|
/// | `Illegal`  | raw word                  | -                          |
/// | `Nullary`  | -                         | -                          |
/// | `Reg3`     | `rd, rs1, rs2`            | r0, r1, r2                 |
/// | `Shift`    | `rd, rs1, shamt`          | r0, r1, shift              |
/// | `Branch`   | `rs1, rs2, offset`        | r0, r1, offs12             |
/// | `RegImm`   | `rd, rs1, imm`            | r0, r1, imm12              |
/// | `Load`     | `rd, offset, base`        | r0, imm12, r1              |
/// | `Store`    | `rs, offset, base`        | r0, imm12, r1              |
/// | `JumpReg`  | `rd, offset, base`        | r0, offs12, r1             |
/// | `JumpLink` | `rd, offset`              | r0, offs20                 |
/// | `Upper`    | `rd, uimm`                | r0, uimm20                 |
/// | `Jump`     | `offset`                  | offs20                     |
/// | `LoadImm`  | `rd, imm`                 | r0, imm12                  |
/// | `RegReg`   | `rd, rs`                  | r0, r1                     |
///
/// The tag values are part of the binary image format and must never change;
/// `isa_check` pins them.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            /// Unrecognized word; executing one halts the machine.
            Illegal = 0x00, "illegal", illegal => Illegal,
            // =========================
            // System
            // =========================
            /// ecall ; request a service from the host, selector in a7
            Ecall = 0x01, "ecall", ecall => Nullary,
            /// ebreak ; halt
            Ebreak = 0x02, "ebreak", ebreak => Nullary,
            // =========================
            // Register-register
            // =========================
            /// add rd, rs1, rs2 ; rd = rs1 + rs2
            Add = 0x03, "add", add => Reg3,
            /// sub rd, rs1, rs2 ; rd = rs1 - rs2
            Sub = 0x04, "sub", sub => Reg3,
            /// sll rd, rs1, rs2 ; rd = rs1 << (rs2 % 32)
            Sll = 0x05, "sll", sll => Reg3,
            /// slt rd, rs1, rs2 ; rd = (rs1 < rs2) signed
            Slt = 0x06, "slt", slt => Reg3,
            /// sltu rd, rs1, rs2 ; rd = (rs1 < rs2) unsigned
            Sltu = 0x07, "sltu", sltu => Reg3,
            /// xor rd, rs1, rs2 ; rd = rs1 ^ rs2
            Xor = 0x08, "xor", xor => Reg3,
            /// srl rd, rs1, rs2 ; rd = rs1 >> (rs2 % 32) logical
            Srl = 0x09, "srl", srl => Reg3,
            /// sra rd, rs1, rs2 ; rd = rs1 >> (rs2 % 32) arithmetic
            Sra = 0x0A, "sra", sra => Reg3,
            /// or rd, rs1, rs2 ; rd = rs1 | rs2
            Or = 0x0B, "or", or => Reg3,
            /// and rd, rs1, rs2 ; rd = rs1 & rs2
            And = 0x0C, "and", and => Reg3,
            // =========================
            // Immediate shifts
            // =========================
            /// slli rd, rs1, shamt ; rd = rs1 << shamt
            Slli = 0x0D, "slli", slli => Shift,
            /// srli rd, rs1, shamt ; rd = rs1 >> shamt logical
            Srli = 0x0E, "srli", srli => Shift,
            /// srai rd, rs1, shamt ; rd = rs1 >> shamt arithmetic
            Srai = 0x0F, "srai", srai => Shift,
            // =========================
            // Branches
            // =========================
            /// beq rs1, rs2, offset ; if rs1 == rs2 then pc += offset
            Beq = 0x10, "beq", beq => Branch,
            /// bne rs1, rs2, offset ; if rs1 != rs2 then pc += offset
            Bne = 0x11, "bne", bne => Branch,
            /// blt rs1, rs2, offset ; if rs1 < rs2 (signed) then pc += offset
            Blt = 0x12, "blt", blt => Branch,
            /// bge rs1, rs2, offset ; if rs1 >= rs2 (signed) then pc += offset
            Bge = 0x13, "bge", bge => Branch,
            /// bltu rs1, rs2, offset ; if rs1 < rs2 (unsigned) then pc += offset
            Bltu = 0x14, "bltu", bltu => Branch,
            /// bgeu rs1, rs2, offset ; if rs1 >= rs2 (unsigned) then pc += offset
            Bgeu = 0x15, "bgeu", bgeu => Branch,
            // =========================
            // Register-immediate
            // =========================
            /// addi rd, rs1, imm ; rd = rs1 + imm
            Addi = 0x16, "addi", addi => RegImm,
            /// slti rd, rs1, imm ; rd = (rs1 < imm) signed
            Slti = 0x17, "slti", slti => RegImm,
            /// sltiu rd, rs1, imm ; rd = (rs1 < imm) unsigned
            Sltiu = 0x18, "sltiu", sltiu => RegImm,
            /// xori rd, rs1, imm ; rd = rs1 ^ imm
            Xori = 0x19, "xori", xori => RegImm,
            /// ori rd, rs1, imm ; rd = rs1 | imm
            Ori = 0x1A, "ori", ori => RegImm,
            /// andi rd, rs1, imm ; rd = rs1 & imm
            Andi = 0x1B, "andi", andi => RegImm,
            // =========================
            // Loads
            // =========================
            /// lb rd, offset(base) ; rd = sext(memory8(base + offset))
            Lb = 0x1C, "lb", lb => Load,
            /// lbu rd, offset(base) ; rd = zext(memory8(base + offset))
            Lbu = 0x1D, "lbu", lbu => Load,
            /// lh rd, offset(base) ; rd = sext(memory16(base + offset))
            Lh = 0x1E, "lh", lh => Load,
            /// lhu rd, offset(base) ; rd = zext(memory16(base + offset))
            Lhu = 0x1F, "lhu", lhu => Load,
            /// lw rd, offset(base) ; rd = memory32(base + offset)
            Lw = 0x20, "lw", lw => Load,
            // =========================
            // Stores
            // =========================
            /// sb rs, offset(base) ; memory8(base + offset) = rs[7:0]
            Sb = 0x21, "sb", sb => Store,
            /// sh rs, offset(base) ; memory16(base + offset) = rs[15:0]
            Sh = 0x22, "sh", sh => Store,
            /// sw rs, offset(base) ; memory32(base + offset) = rs
            Sw = 0x23, "sw", sw => Store,
            // =========================
            // Memory ordering
            // =========================
            /// fence ; no-op on a single-agent machine
            Fence = 0x24, "fence", fence => Nullary,
            // =========================
            // Subroutine calls
            // =========================
            /// jalr rd, offset(base) ; rd = pc + 4, pc = base + offset
            Jalr = 0x25, "jalr", jalr => JumpReg,
            /// jal rd, offset ; rd = pc + 4, pc += offset
            Jal = 0x26, "jal", jal => JumpLink,
            // =========================
            // Upper immediates
            // =========================
            /// lui rd, uimm ; rd = uimm, the pre-shifted upper-20 immediate
            Lui = 0x27, "lui", lui => Upper,
            /// auipc rd, uimm ; rd = pc + uimm, the pre-shifted upper-20 immediate
            Auipc = 0x28, "auipc", auipc => Upper,
            // =========================
            // Owl-2820 only
            // =========================
            /// j offset ; pc += offset
            J = 0x29, "j", j => Jump,
            /// call offset ; ra = pc + 4, pc += offset
            Call = 0x2A, "call", call => Jump,
            /// ret ; pc = ra
            Ret = 0x2B, "ret", ret => Nullary,
            /// li rd, imm ; rd = imm
            Li = 0x2C, "li", li => LoadImm,
            /// mv rd, rs ; rd = rs
            Mv = 0x2D, "mv", mv => RegReg,
        }
    };
}

macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal, $method:ident => $format:ident
        ),* $(,)?
    ) => {
        /// Opcode tags of the Owl-2820 instruction set.
        ///
        /// The tag occupies the low seven bits of an instruction word. Any
        /// word whose tag is not listed here decodes as [`Opcode::Illegal`].
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u32)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u32> for Opcode {
            type Error = VmError;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Opcode::$name), )*
                    _ => Err(VmError::IllegalInstruction { word: value }),
                }
            }
        }

        impl Opcode {
            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }
        }
    };
}

macro_rules! define_handler_trait {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal, $method:ident => $format:ident
        ),* $(,)?
    ) => {
        /// One method per Owl-2820 instruction.
        ///
        /// Anything that consumes decoded instructions implements this trait:
        /// the executor mutates machine state and returns nothing, the
        /// assembler appends an encoded word, the disassembler returns a
        /// string. The dispatchers never inspect [`Output`](Self::Output) -
        /// they decode operands and call the matching method, which is what
        /// lets a single pass over an image be retargeted to any back end.
        ///
        /// Register operands are register *indices* (0..=31), not values.
        /// Branch and jump offsets are byte offsets relative to the
        /// instruction's own address and are always even.
        pub trait InstructionHandler {
            /// Result of handling one instruction.
            type Output;

            $( define_handler_trait!(@method $(#[$doc])* $method $format); )*
        }
    };

    (@method $(#[$doc:meta])* $method:ident Illegal) => {
        $(#[$doc])*
        fn $method(&mut self, ins: u32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident Nullary) => {
        $(#[$doc])*
        fn $method(&mut self) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident Reg3) => {
        $(#[$doc])*
        fn $method(&mut self, rd: u32, rs1: u32, rs2: u32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident Shift) => {
        $(#[$doc])*
        fn $method(&mut self, rd: u32, rs1: u32, shamt: u32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident Branch) => {
        $(#[$doc])*
        fn $method(&mut self, rs1: u32, rs2: u32, offset: i32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident RegImm) => {
        $(#[$doc])*
        fn $method(&mut self, rd: u32, rs1: u32, imm: i32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident Load) => {
        $(#[$doc])*
        fn $method(&mut self, rd: u32, offset: i32, base: u32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident Store) => {
        $(#[$doc])*
        fn $method(&mut self, rs: u32, offset: i32, base: u32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident JumpReg) => {
        $(#[$doc])*
        fn $method(&mut self, rd: u32, offset: i32, base: u32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident JumpLink) => {
        $(#[$doc])*
        fn $method(&mut self, rd: u32, offset: i32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident Upper) => {
        $(#[$doc])*
        fn $method(&mut self, rd: u32, uimm: u32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident Jump) => {
        $(#[$doc])*
        fn $method(&mut self, offset: i32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident LoadImm) => {
        $(#[$doc])*
        fn $method(&mut self, rd: u32, imm: i32) -> Self::Output;
    };
    (@method $(#[$doc:meta])* $method:ident RegReg) => {
        $(#[$doc])*
        fn $method(&mut self, rd: u32, rs: u32) -> Self::Output;
    };
}

macro_rules! define_owl_dispatch {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal, $method:ident => $format:ident
        ),* $(,)?
    ) => {
        /// Decodes an Owl-2820 word and invokes the matching handler method.
        ///
        /// The tag is extracted from the low seven bits; operands come out of
        /// the [`decode`] codecs. Words with an unknown tag route to
        /// [`InstructionHandler::illegal`].
        pub fn dispatch_owl<H: InstructionHandler>(handler: &mut H, ins: u32) -> H::Output {
            match Opcode::try_from(ins & OPCODE_MASK) {
                $(
                    Ok(Opcode::$name) => define_owl_dispatch!(@call handler, ins, $method $format),
                )*
                Err(_) => handler.illegal(ins),
            }
        }
    };

    (@call $h:ident, $ins:ident, $method:ident Illegal) => {
        $h.$method($ins)
    };
    (@call $h:ident, $ins:ident, $method:ident Nullary) => {
        $h.$method()
    };
    (@call $h:ident, $ins:ident, $method:ident Reg3) => {
        $h.$method(decode::r0($ins), decode::r1($ins), decode::r2($ins))
    };
    (@call $h:ident, $ins:ident, $method:ident Shift) => {
        $h.$method(decode::r0($ins), decode::r1($ins), decode::shift($ins))
    };
    (@call $h:ident, $ins:ident, $method:ident Branch) => {
        $h.$method(decode::r0($ins), decode::r1($ins), decode::offs12($ins))
    };
    (@call $h:ident, $ins:ident, $method:ident RegImm) => {
        $h.$method(decode::r0($ins), decode::r1($ins), decode::imm12($ins))
    };
    (@call $h:ident, $ins:ident, $method:ident Load) => {
        $h.$method(decode::r0($ins), decode::imm12($ins), decode::r1($ins))
    };
    (@call $h:ident, $ins:ident, $method:ident Store) => {
        $h.$method(decode::r0($ins), decode::imm12($ins), decode::r1($ins))
    };
    (@call $h:ident, $ins:ident, $method:ident JumpReg) => {
        $h.$method(decode::r0($ins), decode::offs12($ins), decode::r1($ins))
    };
    (@call $h:ident, $ins:ident, $method:ident JumpLink) => {
        $h.$method(decode::r0($ins), decode::offs20($ins))
    };
    (@call $h:ident, $ins:ident, $method:ident Upper) => {
        $h.$method(decode::r0($ins), decode::uimm20($ins))
    };
    (@call $h:ident, $ins:ident, $method:ident Jump) => {
        $h.$method(decode::offs20($ins))
    };
    (@call $h:ident, $ins:ident, $method:ident LoadImm) => {
        $h.$method(decode::r0($ins), decode::imm12($ins))
    };
    (@call $h:ident, $ins:ident, $method:ident RegReg) => {
        $h.$method(decode::r0($ins), decode::r1($ins))
    };
}

for_each_instruction!(define_opcodes);
for_each_instruction!(define_handler_trait);
for_each_instruction!(define_owl_dispatch);

/// Field extraction from an encoded Owl-2820 instruction word.
///
/// All functions are pure and total on 32-bit inputs. Signed fields are
/// sign-extended by shifting the field flush against bit 31 on encode and
/// arithmetic-shifting it back down here.
pub mod decode {
    /// Destination / first operand register, bits 11:7.
    pub fn r0(ins: u32) -> u32 {
        (ins >> 7) & 0x1f
    }

    /// Second operand register, bits 16:12.
    pub fn r1(ins: u32) -> u32 {
        (ins >> 12) & 0x1f
    }

    /// Third operand register, bits 21:17.
    pub fn r2(ins: u32) -> u32 {
        (ins >> 17) & 0x1f
    }

    /// Shift amount, bits 21:17 (same field as `r2`).
    pub fn shift(ins: u32) -> u32 {
        (ins >> 17) & 0x1f
    }

    /// Sign-extended 12-bit immediate from bits 31:20.
    pub fn imm12(ins: u32) -> i32 {
        ((ins & 0xfff0_0000) as i32) >> 20
    }

    /// Sign-extended 12-bit branch offset from bits 31:20, restored to a
    /// byte offset. Always even.
    pub fn offs12(ins: u32) -> i32 {
        ((ins & 0xfff0_0000) as i32) >> 19
    }

    /// Sign-extended 20-bit jump offset from bits 31:12, restored to a byte
    /// offset. Always even.
    pub fn offs20(ins: u32) -> i32 {
        ((ins & 0xffff_f000) as i32) >> 11
    }

    /// Upper-20 immediate: bits 31:12 in place, low 12 bits cleared.
    pub fn uimm20(ins: u32) -> u32 {
        ins & 0xffff_f000
    }
}

/// Field construction for an Owl-2820 instruction word.
///
/// Encoders accept a wider value and mask it to the field width; OR the
/// results together with [`encode::opc`] to build a word.
pub mod encode {
    use super::Opcode;

    /// The opcode tag, bits 6:0.
    pub fn opc(opcode: Opcode) -> u32 {
        opcode as u32
    }

    /// Destination / first operand register, bits 11:7.
    pub fn r0(r: u32) -> u32 {
        (r & 0x1f) << 7
    }

    /// Second operand register, bits 16:12.
    pub fn r1(r: u32) -> u32 {
        (r & 0x1f) << 12
    }

    /// Third operand register, bits 21:17.
    pub fn r2(r: u32) -> u32 {
        (r & 0x1f) << 17
    }

    /// Shift amount, bits 21:17.
    pub fn shift(uimm5: u32) -> u32 {
        (uimm5 & 0x1f) << 17
    }

    /// 12-bit signed immediate into bits 31:20.
    pub fn imm12(imm: i32) -> u32 {
        ((imm as u32) << 20) & 0xfff0_0000
    }

    /// 12-bit branch offset into bits 31:20. `offset` is a byte offset; the
    /// low bit is discarded.
    pub fn offs12(offset: i32) -> u32 {
        ((offset as u32) << 19) & 0xfff0_0000
    }

    /// 20-bit jump offset into bits 31:12. `offset` is a byte offset; the
    /// low bit is discarded.
    pub fn offs20(offset: i32) -> u32 {
        ((offset as u32) << 11) & 0xffff_f000
    }

    /// Upper-20 immediate into bits 31:12.
    pub fn uimm20(uimm: u32) -> u32 {
        (uimm << 12) & 0xffff_f000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_try_from_known_tags() {
        assert_eq!(Opcode::try_from(0x00).unwrap(), Opcode::Illegal);
        assert_eq!(Opcode::try_from(0x03).unwrap(), Opcode::Add);
        assert_eq!(Opcode::try_from(0x2D).unwrap(), Opcode::Mv);
    }

    #[test]
    fn opcode_try_from_unknown_tag() {
        assert!(matches!(
            Opcode::try_from(0x2E),
            Err(VmError::IllegalInstruction { word: 0x2E })
        ));
        assert!(matches!(
            Opcode::try_from(0x7F),
            Err(VmError::IllegalInstruction { word: 0x7F })
        ));
    }

    #[test]
    fn register_fields_survive_encoding() {
        let word = encode::r0(31) | encode::r1(17) | encode::r2(5);
        assert_eq!(decode::r0(word), 31);
        assert_eq!(decode::r1(word), 17);
        assert_eq!(decode::r2(word), 5);
    }

    #[test]
    fn register_encoders_mask_to_five_bits() {
        assert_eq!(decode::r0(encode::r0(32)), 0);
        assert_eq!(decode::shift(encode::shift(0xff)), 0x1f);
    }

    #[test]
    fn imm12_sign_extends() {
        assert_eq!(decode::imm12(encode::imm12(0)), 0);
        assert_eq!(decode::imm12(encode::imm12(2047)), 2047);
        assert_eq!(decode::imm12(encode::imm12(-1)), -1);
        assert_eq!(decode::imm12(encode::imm12(-2048)), -2048);
    }

    #[test]
    fn offs12_covers_branch_range() {
        // The extremes named by the branch boundary behavior.
        assert_eq!(decode::offs12(encode::offs12(0x7FE)), 0x7FE);
        assert_eq!(decode::offs12(encode::offs12(-0x800)), -0x800);
    }

    #[test]
    fn offs12_drops_the_low_bit() {
        assert_eq!(decode::offs12(encode::offs12(3)), 2);
    }

    #[test]
    fn offs20_sign_extends_and_stays_even() {
        assert_eq!(decode::offs20(encode::offs20(0xFFFFE)), 0xFFFFE);
        assert_eq!(decode::offs20(encode::offs20(-0x100000)), -0x100000);
        assert_eq!(decode::offs20(encode::offs20(7)), 6);
    }

    #[test]
    fn uimm20_shifts_into_the_upper_bits() {
        assert_eq!(encode::uimm20(0xFFFFF), 0xFFFF_F000);
        assert_eq!(decode::uimm20(0xFFFF_F000), 0xFFFF_F000);
        assert_eq!(decode::uimm20(0xFFFF_FFFF), 0xFFFF_F000);
    }

    #[test]
    fn encoded_fields_do_not_overlap() {
        let word = encode::opc(Opcode::Add)
            | encode::r0(0x1f)
            | encode::r1(0x1f)
            | encode::r2(0x1f);
        assert_eq!(word & OPCODE_MASK, Opcode::Add as u32);
        assert_eq!(decode::r0(word), 0x1f);
        assert_eq!(decode::r1(word), 0x1f);
        assert_eq!(decode::r2(word), 0x1f);
        // Bits 31:22 stay clear for the register-register layout.
        assert_eq!(word >> 22, 0);
    }
}
