//! The Owl-2820 assembler.
//!
//! [`Assembler`] implements [`InstructionHandler`] by encoding each
//! instruction and appending it to a growing code buffer, so anything that
//! drives the handler trait - including the RV32I dispatcher - can emit
//! Owl-2820 code.
//!
//! Control flow targets may be given as [`Label`]s instead of numeric
//! offsets. Referencing a label before it is bound emits a placeholder word
//! and records a fixup; [`Assembler::bind_label`] patches every pending
//! placeholder in place once the label's address is known. Finalization via
//! [`Assembler::code`] refuses to hand out a buffer while fixups are still
//! outstanding.

use std::collections::HashMap;

use crate::errors::VmError;
use crate::for_each_instruction;
use crate::isa::{encode, InstructionHandler, Opcode};
use crate::memory::WORD_SIZE;

/// Address value marking a label that has not been bound yet.
const BAD_ADDRESS: u32 = u32::MAX;

/// An opaque code location handed out by [`Assembler::make_label`].
///
/// A label starts unbound; instructions may refer to it immediately, and
/// [`Assembler::bind_label`] later fixes its address.
#[derive(Copy, Clone, Debug)]
pub struct Label(usize);

impl Label {
    fn id(self) -> usize {
        self.0
    }
}

/// Which encoded field of the placeholder word a fixup rewrites.
#[derive(Copy, Clone, Debug)]
enum FixupKind {
    /// 12-bit branch offset, relative to the patched instruction.
    Offs12,
    /// 20-bit jump offset, relative to the patched instruction.
    Offs20,
    /// Upper 20 bits of the label's absolute address.
    Hi20,
    /// Lower 12 bits of the label's absolute address, as an imm12.
    Lo12,
}

/// A deferred patch: rewrite one field of the word at `target` once the
/// label binds.
#[derive(Copy, Clone, Debug)]
struct Fixup {
    /// Byte address of the word containing the field to patch.
    target: u32,
    kind: FixupKind,
}

/// Emits encoded Owl-2820 words, resolving labels via deferred fixups.
pub struct Assembler {
    /// Encoded instruction words, in emission order.
    code: Vec<u32>,
    /// Byte offset where the next word will be emitted. Always `4 * code.len()`.
    current: u32,
    /// Label addresses by id; [`BAD_ADDRESS`] while unbound.
    labels: Vec<u32>,
    /// Pending fixups by label id. A label may accumulate many before it
    /// binds; each targets a distinct instruction address.
    fixups: HashMap<usize, Vec<Fixup>>,
}

impl Assembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            current: 0,
            labels: Vec::new(),
            fixups: HashMap::new(),
        }
    }

    /// Byte offset of the next instruction to be emitted.
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Creates a new, unbound label.
    pub fn make_label(&mut self) -> Label {
        let id = self.labels.len();
        self.labels.push(BAD_ADDRESS);
        Label(id)
    }

    /// Binds `label` to the current position and resolves every fixup that
    /// was waiting for it.
    pub fn bind_label(&mut self, label: Label) {
        let address = self.current;
        self.labels[label.id()] = address;

        if let Some(pending) = self.fixups.remove(&label.id()) {
            for fixup in pending {
                self.resolve_fixup(fixup, address);
            }
        }
    }

    /// Returns the finished code, or [`VmError::UnboundLabels`] while any
    /// referenced label remains unbound.
    ///
    /// Words are in host order; serialize with [`Assembler::code_bytes`] or
    /// [`crate::memory::load_words`] to get the little-endian image form.
    pub fn code(&self) -> Result<&[u32], VmError> {
        if self.fixups.is_empty() {
            Ok(&self.code)
        } else {
            Err(VmError::UnboundLabels {
                count: self.fixups.len(),
            })
        }
    }

    /// Returns the finished code serialized as a little-endian byte image.
    pub fn code_bytes(&self) -> Result<Vec<u8>, VmError> {
        let code = self.code()?;
        let mut bytes = Vec::with_capacity(code.len() * WORD_SIZE as usize);
        for &word in code {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        Ok(bytes)
    }

    // Label-taking variants of the control flow instructions. Each falls
    // back to a placeholder plus fixup when the label is still unbound.

    /// `beq rs1, rs2, label`
    pub fn beq_to(&mut self, rs1: u32, rs2: u32, label: Label) {
        self.branch_to(Opcode::Beq, rs1, rs2, label);
    }

    /// `bne rs1, rs2, label`
    pub fn bne_to(&mut self, rs1: u32, rs2: u32, label: Label) {
        self.branch_to(Opcode::Bne, rs1, rs2, label);
    }

    /// `blt rs1, rs2, label`
    pub fn blt_to(&mut self, rs1: u32, rs2: u32, label: Label) {
        self.branch_to(Opcode::Blt, rs1, rs2, label);
    }

    /// `bge rs1, rs2, label`
    pub fn bge_to(&mut self, rs1: u32, rs2: u32, label: Label) {
        self.branch_to(Opcode::Bge, rs1, rs2, label);
    }

    /// `bltu rs1, rs2, label`
    pub fn bltu_to(&mut self, rs1: u32, rs2: u32, label: Label) {
        self.branch_to(Opcode::Bltu, rs1, rs2, label);
    }

    /// `bgeu rs1, rs2, label`
    pub fn bgeu_to(&mut self, rs1: u32, rs2: u32, label: Label) {
        self.branch_to(Opcode::Bgeu, rs1, rs2, label);
    }

    /// `j label`
    pub fn j_to(&mut self, label: Label) {
        self.jump_to(Opcode::J, label);
    }

    /// `call label`
    pub fn call_to(&mut self, label: Label) {
        self.jump_to(Opcode::Call, label);
    }

    /// `%hi(label)`: the upper 20 bits of the label's address, ready to feed
    /// to `lui`.
    ///
    /// If the label is unbound this returns 0 and records a fixup against
    /// the word about to be emitted, so call it in the operand position of
    /// the `lui` it feeds.
    pub fn hi(&mut self, label: Label) -> u32 {
        match self.address_of(label) {
            Some(address) => address >> 12,
            None => {
                self.add_fixup(label, FixupKind::Hi20);
                0
            }
        }
    }

    /// `%lo(label)`: the lower 12 bits of the label's address, for the
    /// instruction completing an absolute address after `lui`.
    ///
    /// Same fixup discipline as [`Assembler::hi`].
    pub fn lo(&mut self, label: Label) -> i32 {
        match self.address_of(label) {
            Some(address) => (address & 0xfff) as i32,
            None => {
                self.add_fixup(label, FixupKind::Lo12);
                0
            }
        }
    }

    /// `.word`: emits a raw 32-bit datum, e.g. for lookup tables.
    pub fn word(&mut self, value: u32) {
        self.emit(value);
    }

    /// Appends one encoded word and advances the emission offset.
    fn emit(&mut self, word: u32) {
        self.code.push(word);
        self.current += WORD_SIZE;
    }

    /// The label's address, or `None` while unbound.
    fn address_of(&self, label: Label) -> Option<u32> {
        match self.labels[label.id()] {
            BAD_ADDRESS => None,
            address => Some(address),
        }
    }

    fn add_fixup(&mut self, label: Label, kind: FixupKind) {
        self.fixups.entry(label.id()).or_default().push(Fixup {
            target: self.current,
            kind,
        });
    }

    fn branch_to(&mut self, opcode: Opcode, rs1: u32, rs2: u32, label: Label) {
        let base = encode::opc(opcode) | encode::r0(rs1) | encode::r1(rs2);
        match self.address_of(label) {
            Some(address) => {
                let offset = address.wrapping_sub(self.current) as i32;
                self.emit(base | encode::offs12(offset));
            }
            None => {
                self.add_fixup(label, FixupKind::Offs12);
                self.emit(base);
            }
        }
    }

    fn jump_to(&mut self, opcode: Opcode, label: Label) {
        let base = encode::opc(opcode);
        match self.address_of(label) {
            Some(address) => {
                let offset = address.wrapping_sub(self.current) as i32;
                self.emit(base | encode::offs20(offset));
            }
            None => {
                self.add_fixup(label, FixupKind::Offs20);
                self.emit(base);
            }
        }
    }

    /// Rewrites the fixed-up field of the placeholder word, preserving every
    /// other bit.
    fn resolve_fixup(&mut self, fixup: Fixup, address: u32) {
        let slot = &mut self.code[(fixup.target / WORD_SIZE) as usize];
        match fixup.kind {
            FixupKind::Offs12 => {
                let offset = address.wrapping_sub(fixup.target) as i32;
                *slot = (*slot & 0x000f_ffff) | encode::offs12(offset);
            }
            FixupKind::Offs20 => {
                let offset = address.wrapping_sub(fixup.target) as i32;
                *slot = (*slot & 0x0000_0fff) | encode::offs20(offset);
            }
            FixupKind::Hi20 => {
                *slot = (*slot & 0x0000_0fff) | (address & 0xffff_f000);
            }
            FixupKind::Lo12 => {
                *slot = (*slot & 0x000f_ffff) | encode::imm12((address & 0xfff) as i32);
            }
        }
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! define_assembler_ops {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal, $method:ident => $format:ident
        ),* $(,)?
    ) => {
        impl InstructionHandler for Assembler {
            type Output = ();

            $( define_assembler_ops!(@method $method $name $format); )*
        }
    };

    (@method $method:ident $name:ident Illegal) => {
        fn $method(&mut self, _ins: u32) {
            self.emit(encode::opc(Opcode::$name));
        }
    };
    (@method $method:ident $name:ident Nullary) => {
        fn $method(&mut self) {
            self.emit(encode::opc(Opcode::$name));
        }
    };
    (@method $method:ident $name:ident Reg3) => {
        fn $method(&mut self, rd: u32, rs1: u32, rs2: u32) {
            self.emit(
                encode::opc(Opcode::$name) | encode::r0(rd) | encode::r1(rs1) | encode::r2(rs2),
            );
        }
    };
    (@method $method:ident $name:ident Shift) => {
        fn $method(&mut self, rd: u32, rs1: u32, shamt: u32) {
            self.emit(
                encode::opc(Opcode::$name)
                    | encode::r0(rd)
                    | encode::r1(rs1)
                    | encode::shift(shamt),
            );
        }
    };
    (@method $method:ident $name:ident Branch) => {
        fn $method(&mut self, rs1: u32, rs2: u32, offset: i32) {
            self.emit(
                encode::opc(Opcode::$name)
                    | encode::r0(rs1)
                    | encode::r1(rs2)
                    | encode::offs12(offset),
            );
        }
    };
    (@method $method:ident $name:ident RegImm) => {
        fn $method(&mut self, rd: u32, rs1: u32, imm: i32) {
            self.emit(
                encode::opc(Opcode::$name)
                    | encode::r0(rd)
                    | encode::r1(rs1)
                    | encode::imm12(imm),
            );
        }
    };
    (@method $method:ident $name:ident Load) => {
        fn $method(&mut self, rd: u32, offset: i32, base: u32) {
            self.emit(
                encode::opc(Opcode::$name)
                    | encode::r0(rd)
                    | encode::imm12(offset)
                    | encode::r1(base),
            );
        }
    };
    (@method $method:ident $name:ident Store) => {
        fn $method(&mut self, rs: u32, offset: i32, base: u32) {
            self.emit(
                encode::opc(Opcode::$name)
                    | encode::r0(rs)
                    | encode::imm12(offset)
                    | encode::r1(base),
            );
        }
    };
    (@method $method:ident $name:ident JumpReg) => {
        fn $method(&mut self, rd: u32, offset: i32, base: u32) {
            self.emit(
                encode::opc(Opcode::$name)
                    | encode::r0(rd)
                    | encode::offs12(offset)
                    | encode::r1(base),
            );
        }
    };
    (@method $method:ident $name:ident JumpLink) => {
        fn $method(&mut self, rd: u32, offset: i32) {
            self.emit(encode::opc(Opcode::$name) | encode::r0(rd) | encode::offs20(offset));
        }
    };
    (@method $method:ident $name:ident Upper) => {
        fn $method(&mut self, rd: u32, uimm: u32) {
            self.emit(encode::opc(Opcode::$name) | encode::r0(rd) | encode::uimm20(uimm));
        }
    };
    (@method $method:ident $name:ident Jump) => {
        fn $method(&mut self, offset: i32) {
            self.emit(encode::opc(Opcode::$name) | encode::offs20(offset));
        }
    };
    (@method $method:ident $name:ident LoadImm) => {
        fn $method(&mut self, rd: u32, imm: i32) {
            self.emit(encode::opc(Opcode::$name) | encode::r0(rd) | encode::imm12(imm));
        }
    };
    (@method $method:ident $name:ident RegReg) => {
        fn $method(&mut self, rd: u32, rs: u32) {
            self.emit(encode::opc(Opcode::$name) | encode::r0(rd) | encode::r1(rs));
        }
    };
}

for_each_instruction!(define_assembler_ops);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::abi::*;
    use crate::isa::decode;

    #[test]
    fn emits_words_in_order() {
        let mut asm = Assembler::new();
        asm.li(A0, 3);
        asm.li(A1, 4);
        asm.add(A2, A0, A1);
        asm.ebreak();

        let code = asm.code().unwrap();
        assert_eq!(code.len(), 4);
        assert_eq!(code[0] & 0x7f, Opcode::Li as u32);
        assert_eq!(decode::r0(code[0]), A0);
        assert_eq!(decode::imm12(code[0]), 3);
        assert_eq!(code[3], Opcode::Ebreak as u32);
    }

    #[test]
    fn backward_branch_to_label_matches_numeric_offset() {
        // bltu s0, s1, <label bound 8 bytes earlier>
        let mut labelled = Assembler::new();
        let top = labelled.make_label();
        labelled.bind_label(top);
        labelled.addi(S0, S0, 1);
        labelled.addi(S1, S1, 1);
        labelled.bltu_to(S0, S1, top);

        let mut numeric = Assembler::new();
        numeric.addi(S0, S0, 1);
        numeric.addi(S1, S1, 1);
        numeric.bltu(S0, S1, -8);

        assert_eq!(labelled.code().unwrap(), numeric.code().unwrap());
    }

    #[test]
    fn forward_branch_is_patched_on_bind() {
        let mut labelled = Assembler::new();
        let out = labelled.make_label();
        labelled.beq_to(A0, A1, out);
        labelled.addi(A2, A2, 1);
        labelled.bind_label(out);
        labelled.ebreak();

        let mut numeric = Assembler::new();
        numeric.beq(A0, A1, 8);
        numeric.addi(A2, A2, 1);
        numeric.ebreak();

        assert_eq!(labelled.code().unwrap(), numeric.code().unwrap());
    }

    #[test]
    fn forward_call_and_jump_are_patched_on_bind() {
        let mut asm = Assembler::new();
        let func = asm.make_label();
        asm.call_to(func);
        asm.ebreak();
        asm.bind_label(func);
        asm.j_to(func); // backward, already bound

        let code = asm.code().unwrap();
        assert_eq!(code[0] & 0x7f, Opcode::Call as u32);
        assert_eq!(decode::offs20(code[0]), 8);
        assert_eq!(code[2] & 0x7f, Opcode::J as u32);
        assert_eq!(decode::offs20(code[2]), 0);
    }

    #[test]
    fn one_label_can_hold_many_fixups() {
        let mut asm = Assembler::new();
        let out = asm.make_label();
        asm.beq_to(A0, A1, out);
        asm.bne_to(A0, A1, out);
        asm.j_to(out);
        asm.bind_label(out);
        asm.ebreak();

        let code = asm.code().unwrap();
        assert_eq!(decode::offs12(code[0]), 12);
        assert_eq!(decode::offs12(code[1]), 8);
        assert_eq!(decode::offs20(code[2]), 4);
    }

    #[test]
    fn fixup_patching_preserves_register_fields() {
        let mut asm = Assembler::new();
        let out = asm.make_label();
        asm.bgeu_to(T3, T6, out);
        asm.bind_label(out);
        asm.ebreak();

        let code = asm.code().unwrap();
        assert_eq!(code[0] & 0x7f, Opcode::Bgeu as u32);
        assert_eq!(decode::r0(code[0]), T3);
        assert_eq!(decode::r1(code[0]), T6);
        assert_eq!(decode::offs12(code[0]), 4);
    }

    #[test]
    fn code_with_unbound_labels_is_refused() {
        let mut asm = Assembler::new();
        let never = asm.make_label();
        asm.j_to(never);

        assert_eq!(asm.code(), Err(VmError::UnboundLabels { count: 1 }));

        // Binding late makes the buffer retrievable.
        asm.bind_label(never);
        assert!(asm.code().is_ok());
    }

    #[test]
    fn hi_lo_build_an_absolute_address() {
        let mut asm = Assembler::new();
        let table = asm.make_label();

        // Forward reference: both halves are fixed up when the label binds.
        let hi = asm.hi(table);
        asm.lui(A0, hi);
        let lo = asm.lo(table);
        asm.addi(A0, A0, lo);
        asm.ebreak();

        // Push the label past 0x1000 so the upper half is non-trivial.
        for _ in 0..0x400 {
            asm.word(0);
        }
        asm.bind_label(table);
        asm.word(0xFEED_FACE);

        let address = 3 * 4 + 0x400 * 4;
        let code = asm.code().unwrap();
        assert_eq!(decode::uimm20(code[0]), (address as u32) & 0xffff_f000);
        assert_eq!(decode::imm12(code[1]), (address & 0xfff) as i32);
        assert_eq!(decode::r0(code[1]), A0);
        assert_eq!(code[3 + 0x400], 0xFEED_FACE);
    }

    #[test]
    fn hi_lo_of_a_bound_label_need_no_fixup() {
        let mut asm = Assembler::new();
        let here = asm.make_label();
        asm.bind_label(here);
        asm.ebreak();

        assert_eq!(asm.hi(here), 0);
        assert_eq!(asm.lo(here), 0);
        assert!(asm.code().is_ok());
    }

    #[test]
    fn code_bytes_serializes_little_endian() {
        let mut asm = Assembler::new();
        asm.word(0x1234_5678);
        assert_eq!(asm.code_bytes().unwrap(), vec![0x78, 0x56, 0x34, 0x12]);
    }
}
