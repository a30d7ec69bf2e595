//! Unary-operation table (§4.A): width casts, `lui`, the HI/LO movers, and
//! the MIPS float conversion/rounding operators. Shifts (both immediate and
//! register forms) are binary ops over `(Rt, Sa)`/`(Rt, Rs)` — see
//! `ops::binary` — since the shift amount is itself an operand, not a mode.

use super::{FloatView, FprSlot, GprSlot, OperandSlot};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOpType {
    CastS32,
    CastU32,
    CastS64,
    CastU64,

    Lui,

    CvtSW,
    CvtDW,
    CvtSL,
    CvtDL,
    CvtWS,
    CvtWD,
    CvtLS,
    CvtLD,
    CvtSD,
    CvtDS,

    RoundWS,
    RoundWD,
    TruncWS,
    TruncWD,
    CeilWS,
    CeilWD,
    FloorWS,
    FloorWD,

    NegFloat,
    NegDouble,
    AbsFloat,
    AbsDouble,
    SqrtFloat,
    SqrtDouble,

    MoveFromHi,
    MoveFromLo,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UnaryOpDescriptor {
    pub op: UnaryOpType,
    pub dest: OperandSlot,
    pub src: OperandSlot,
    pub check_fr: bool,
    pub check_nan: bool,
    pub mnemonic: &'static str,
}

mod funct {
    pub const MFHI: u32 = 0x10;
    pub const MFLO: u32 = 0x12;
}

mod cop1_funct {
    pub const CVT_S: u32 = 0x20;
    pub const CVT_D: u32 = 0x21;
    pub const CVT_W: u32 = 0x24;
    pub const CVT_L: u32 = 0x25;
    pub const ROUND_W: u32 = 0x0C;
    pub const TRUNC_W: u32 = 0x0D;
    pub const CEIL_W: u32 = 0x0E;
    pub const FLOOR_W: u32 = 0x0F;
    pub const NEG: u32 = 0x07;
    pub const ABS: u32 = 0x05;
    pub const SQRT: u32 = 0x04;
}

mod fmt {
    pub const SINGLE: u32 = 0x10;
    pub const DOUBLE: u32 = 0x11;
    pub const WORD: u32 = 0x14;
    pub const LONG: u32 = 0x15;
}

const RD: OperandSlot = OperandSlot::Gpr(GprSlot::Rd);
const RT: OperandSlot = OperandSlot::Gpr(GprSlot::Rt);

fn unary(op: UnaryOpType, dest: OperandSlot, src: OperandSlot, mnemonic: &'static str) -> UnaryOpDescriptor {
    UnaryOpDescriptor { op, dest, src, check_fr: false, check_nan: false, mnemonic }
}

fn float_unary(op: UnaryOpType, dest: FloatView, src: FloatView, mnemonic: &'static str) -> UnaryOpDescriptor {
    UnaryOpDescriptor {
        op,
        dest: OperandSlot::Fpr(FprSlot::Fd, dest),
        src: OperandSlot::Fpr(FprSlot::Fs, src),
        check_fr: true,
        check_nan: true,
        mnemonic,
    }
}

/// `opcode == 0xF` is `lui`; `opcode == 0` SPECIAL funct codes cover the
/// HI/LO movers (shifts live in `ops::binary`); `cop1_fmt` selects the
/// conversion/rounding table.
pub fn unary_op_for_instruction(opcode: u32, funct: u32, cop1_fmt: Option<u32>) -> Option<UnaryOpDescriptor> {
    use FloatView::{Double, Single};

    if opcode == 0xF {
        return Some(unary(UnaryOpType::Lui, RT, OperandSlot::ImmU16, "lui"));
    }

    if let Some(f) = cop1_fmt {
        let src = match f {
            fmt::SINGLE => Single,
            fmt::DOUBLE => Double,
            fmt::WORD | fmt::LONG => Single,
            _ => return None,
        };
        return Some(match funct {
            cop1_funct::CVT_S if f == fmt::WORD => float_unary(UnaryOpType::CvtSW, Single, src, "cvt.s.w"),
            cop1_funct::CVT_S if f == fmt::LONG => float_unary(UnaryOpType::CvtSL, Single, src, "cvt.s.l"),
            cop1_funct::CVT_S => float_unary(UnaryOpType::CvtSD, Single, Double, "cvt.s.d"),
            cop1_funct::CVT_D if f == fmt::WORD => float_unary(UnaryOpType::CvtDW, Double, src, "cvt.d.w"),
            cop1_funct::CVT_D if f == fmt::LONG => float_unary(UnaryOpType::CvtDL, Double, src, "cvt.d.l"),
            cop1_funct::CVT_D => float_unary(UnaryOpType::CvtDS, Double, Single, "cvt.d.s"),
            cop1_funct::CVT_W if f == fmt::SINGLE => float_unary(UnaryOpType::CvtWS, Single, Single, "cvt.w.s"),
            cop1_funct::CVT_W => float_unary(UnaryOpType::CvtWD, Single, Double, "cvt.w.d"),
            cop1_funct::CVT_L if f == fmt::SINGLE => float_unary(UnaryOpType::CvtLS, Double, Single, "cvt.l.s"),
            cop1_funct::CVT_L => float_unary(UnaryOpType::CvtLD, Double, Double, "cvt.l.d"),
            cop1_funct::ROUND_W if f == fmt::SINGLE => float_unary(UnaryOpType::RoundWS, Single, Single, "round.w.s"),
            cop1_funct::ROUND_W => float_unary(UnaryOpType::RoundWD, Single, Double, "round.w.d"),
            cop1_funct::TRUNC_W if f == fmt::SINGLE => float_unary(UnaryOpType::TruncWS, Single, Single, "trunc.w.s"),
            cop1_funct::TRUNC_W => float_unary(UnaryOpType::TruncWD, Single, Double, "trunc.w.d"),
            cop1_funct::CEIL_W if f == fmt::SINGLE => float_unary(UnaryOpType::CeilWS, Single, Single, "ceil.w.s"),
            cop1_funct::CEIL_W => float_unary(UnaryOpType::CeilWD, Single, Double, "ceil.w.d"),
            cop1_funct::FLOOR_W if f == fmt::SINGLE => float_unary(UnaryOpType::FloorWS, Single, Single, "floor.w.s"),
            cop1_funct::FLOOR_W => float_unary(UnaryOpType::FloorWD, Single, Double, "floor.w.d"),
            cop1_funct::NEG if f == fmt::SINGLE => float_unary(UnaryOpType::NegFloat, Single, Single, "neg.s"),
            cop1_funct::NEG => float_unary(UnaryOpType::NegDouble, Double, Double, "neg.d"),
            cop1_funct::ABS if f == fmt::SINGLE => float_unary(UnaryOpType::AbsFloat, Single, Single, "abs.s"),
            cop1_funct::ABS => float_unary(UnaryOpType::AbsDouble, Double, Double, "abs.d"),
            cop1_funct::SQRT if f == fmt::SINGLE => float_unary(UnaryOpType::SqrtFloat, Single, Single, "sqrt.s"),
            cop1_funct::SQRT => float_unary(UnaryOpType::SqrtDouble, Double, Double, "sqrt.d"),
            _ => return None,
        });
    }

    if opcode == 0 {
        return Some(match funct {
            funct::MFHI => unary(UnaryOpType::MoveFromHi, RD, OperandSlot::Hi, "mfhi"),
            funct::MFLO => unary(UnaryOpType::MoveFromLo, RD, OperandSlot::Lo, "mflo"),
            _ => return None,
        });
    }

    None
}
