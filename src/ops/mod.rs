//! Static dispatch tables keyed by MIPS opcode (§4.A). These collapse the
//! instruction set into three small tables the driver and both generators
//! share: binary ops, unary ops, and stores; conditional branches reuse the
//! binary-op comparison set with a link/likely pair of flags.
//!
//! Each descriptor carries a `mnemonic`, mirrored from the reference
//! implementation's per-opcode debug strings, so the source generator can
//! annotate emitted code without a disassembler alongside it.

mod binary;
mod branch;
mod store;
mod unary;

pub use binary::{binary_op_for_instruction, BinaryOpDescriptor, BinaryOpType};
pub use branch::{branch_op_for_instruction, BranchDescriptor};
pub use store::{store_op_for_instruction, StoreOpDescriptor, StoreOpType};
pub use unary::{unary_op_for_instruction, UnaryOpDescriptor, UnaryOpType};

/// One float value can be read/written through any of four bit-level views;
/// the generators pick the view the target op actually needs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FloatView {
    Single,
    Double,
    RawLo32,
    RawU64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GprSlot {
    Rd,
    Rs,
    Rt,
    /// `Base=Rs`: the same bit field as `Rs`, used when an instruction's
    /// register-role name differs from its decode position (loads/stores).
    Base,
    Zero,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FprSlot {
    Fd,
    Fs,
    Ft,
}

/// An operand position referenced by an op descriptor. Immediates and the
/// HI/LO multiply-result registers are named slots rather than decoded
/// fields so the same descriptor works across the source and JIT
/// generators.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OperandSlot {
    Gpr(GprSlot),
    Fpr(FprSlot, FloatView),
    ImmU16,
    ImmS16,
    Sa,
    /// `sa+32`, used by the doubleword shift-by-32-64 family.
    SaPlus32,
    Cop1Cs,
    Hi,
    Lo,
}

/// An optional transform applied to an operand before the op body runs,
/// e.g. sign-extending a 32-bit GPR half before a 64-bit add.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PreOp {
    None,
    SignExtend32,
    ZeroExtend32,
}
