use owl_vm_derive::Error;

/// Errors that can occur during execution or assembly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VmError {
    /// Word whose opcode tag is not in the instruction table (Owl), or that
    /// matches no encoding pattern (RV32I).
    #[error("illegal instruction {word:#010x}")]
    IllegalInstruction { word: u32 },
    /// Instruction fetch from a program counter that is not 4-byte aligned.
    #[error("misaligned instruction fetch at {pc:#010x}")]
    MisalignedFetch { pc: u32 },
    /// Load, store, or fetch whose effective address falls outside the
    /// memory buffer.
    #[error("memory access out of range: {len} byte(s) at {addr:#010x}")]
    OutOfRangeAccess { addr: u32, len: u32 },
    /// `ecall` with a selector in `a7` that no defined syscall matches.
    #[error("unknown syscall selector {selector}")]
    UnknownSyscall { selector: u32 },
    /// Code was requested from the assembler while labels still had
    /// outstanding fixups.
    #[error("{count} label(s) referenced but never bound")]
    UnboundLabels { count: usize },
}
