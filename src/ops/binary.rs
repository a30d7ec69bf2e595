//! Binary-operation table (§4.A): two-input ops keyed by MIPS SPECIAL/COP1
//! funct codes and a handful of immediate-form major opcodes.

use super::{FloatView, FprSlot, GprSlot, OperandSlot, PreOp};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOpType {
    Add32,
    Sub32,
    Add64,
    Sub64,

    AddFloat,
    SubFloat,
    MulFloat,
    DivFloat,
    AddDouble,
    SubDouble,
    MulDouble,
    DivDouble,

    And64,
    Or64,
    Nor64,
    Xor64,

    Sll32,
    Srl32,
    Sra32,
    Sll64,
    Srl64,
    Sra64,

    Eq,
    Ne,
    Lt,
    Ltu,
    Le,
    Gt,
    Ge,

    EqFloat,
    NeFloat,
    LtFloat,
    LeFloat,
    GtFloat,
    GeFloat,
    EqDouble,
    NeDouble,
    LtDouble,
    LeDouble,
    GtDouble,
    GeDouble,

    Ld,
    Lw,
    Lwu,
    Lh,
    Lhu,
    Lb,
    Lbu,
    Ldl,
    Ldr,
    Lwl,
    Lwr,

    True,
    False,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BinaryOpDescriptor {
    pub op: BinaryOpType,
    pub dest: OperandSlot,
    pub lhs: (OperandSlot, PreOp),
    pub rhs: (OperandSlot, PreOp),
    pub check_fr: bool,
    pub check_nan: bool,
    pub mnemonic: &'static str,
}

const fn gpr(slot: GprSlot) -> OperandSlot {
    OperandSlot::Gpr(slot)
}

const fn fpr(slot: FprSlot, view: FloatView) -> OperandSlot {
    OperandSlot::Fpr(slot, view)
}

const RD: OperandSlot = gpr(GprSlot::Rd);
const RS: OperandSlot = gpr(GprSlot::Rs);
const RT: OperandSlot = gpr(GprSlot::Rt);
const BASE: OperandSlot = gpr(GprSlot::Base);

macro_rules! int_op {
    ($op:expr, $mnemonic:expr) => {
        BinaryOpDescriptor {
            op: $op,
            dest: RD,
            lhs: (RS, PreOp::None),
            rhs: (RT, PreOp::None),
            check_fr: false,
            check_nan: false,
            mnemonic: $mnemonic,
        }
    };
}

macro_rules! float_op {
    ($op:expr, $mnemonic:expr, $view:expr) => {
        BinaryOpDescriptor {
            op: $op,
            dest: fpr(FprSlot::Fd, $view),
            lhs: (fpr(FprSlot::Fs, $view), PreOp::None),
            rhs: (fpr(FprSlot::Ft, $view), PreOp::None),
            check_fr: true,
            check_nan: true,
            mnemonic: $mnemonic,
        }
    };
}

/// MIPS SPECIAL (opcode 0) funct codes for the two-input integer ops.
mod funct {
    pub const ADDU: u32 = 0x21;
    pub const SUBU: u32 = 0x23;
    pub const DADDU: u32 = 0x2D;
    pub const DSUBU: u32 = 0x2F;
    pub const AND: u32 = 0x24;
    pub const OR: u32 = 0x25;
    pub const XOR: u32 = 0x26;
    pub const NOR: u32 = 0x27;
    pub const SLL: u32 = 0x00;
    pub const SRL: u32 = 0x02;
    pub const SRA: u32 = 0x03;
    pub const SLLV: u32 = 0x04;
    pub const SRLV: u32 = 0x06;
    pub const SRAV: u32 = 0x07;
    pub const DSLLV: u32 = 0x14;
    pub const DSRLV: u32 = 0x16;
    pub const DSRAV: u32 = 0x17;
    pub const DSLL: u32 = 0x38;
    pub const DSRL: u32 = 0x3A;
    pub const DSRA: u32 = 0x3B;
    pub const DSLL32: u32 = 0x3C;
    pub const DSRL32: u32 = 0x3E;
    pub const DSRA32: u32 = 0x3F;
    pub const SLT: u32 = 0x2A;
    pub const SLTU: u32 = 0x2B;
}

/// COP1 (opcode 0x11) funct codes, shared across the `fmt` field (single
/// `0x10` / double `0x11`).
mod cop1_funct {
    pub const ADD: u32 = 0x00;
    pub const SUB: u32 = 0x01;
    pub const MUL: u32 = 0x02;
    pub const DIV: u32 = 0x03;
    pub const C_EQ: u32 = 0x32;
    pub const C_LT: u32 = 0x3C;
    pub const C_LE: u32 = 0x3E;
}

/// Major opcodes for the load family (field name matches the spec).
mod opcode {
    pub const LB: u32 = 0x20;
    pub const LH: u32 = 0x21;
    pub const LWL: u32 = 0x22;
    pub const LW: u32 = 0x23;
    pub const LBU: u32 = 0x24;
    pub const LHU: u32 = 0x25;
    pub const LWR: u32 = 0x26;
    pub const LWU: u32 = 0x27;
    pub const LD: u32 = 0x37;
    pub const LDL: u32 = 0x1A;
    pub const LDR: u32 = 0x1B;
}

/// Looks up the binary-op descriptor for a decoded instruction. `opcode` is
/// the major 6-bit field; `funct`/`fmt` select within SPECIAL/COP1 groups.
/// Returns `None` for opcodes this table does not cover (the driver
/// dispatches those inline, e.g. `jal`/`jr`/`syscall`).
pub fn binary_op_for_instruction(opcode: u32, funct: u32, cop1_fmt: Option<u32>) -> Option<BinaryOpDescriptor> {
    if let Some(fmt) = cop1_fmt {
        let double = fmt == 0x11;
        let view = if double { FloatView::Double } else { FloatView::Single };
        return Some(match funct {
            cop1_funct::ADD if !double => float_op!(BinaryOpType::AddFloat, "add.s", view),
            cop1_funct::ADD => float_op!(BinaryOpType::AddDouble, "add.d", view),
            cop1_funct::SUB if !double => float_op!(BinaryOpType::SubFloat, "sub.s", view),
            cop1_funct::SUB => float_op!(BinaryOpType::SubDouble, "sub.d", view),
            cop1_funct::MUL if !double => float_op!(BinaryOpType::MulFloat, "mul.s", view),
            cop1_funct::MUL => float_op!(BinaryOpType::MulDouble, "mul.d", view),
            cop1_funct::DIV if !double => float_op!(BinaryOpType::DivFloat, "div.s", view),
            cop1_funct::DIV => float_op!(BinaryOpType::DivDouble, "div.d", view),
            cop1_funct::C_EQ if !double => float_op!(BinaryOpType::EqFloat, "c.eq.s", view),
            cop1_funct::C_EQ => float_op!(BinaryOpType::EqDouble, "c.eq.d", view),
            cop1_funct::C_LT if !double => float_op!(BinaryOpType::LtFloat, "c.lt.s", view),
            cop1_funct::C_LT => float_op!(BinaryOpType::LtDouble, "c.lt.d", view),
            cop1_funct::C_LE if !double => float_op!(BinaryOpType::LeFloat, "c.le.s", view),
            cop1_funct::C_LE => float_op!(BinaryOpType::LeDouble, "c.le.d", view),
            _ => return None,
        });
    }

    if opcode == 0 {
        let shift_imm = |op, sa, mnemonic| BinaryOpDescriptor {
            op,
            dest: RD,
            lhs: (RT, PreOp::None),
            rhs: (sa, PreOp::None),
            check_fr: false,
            check_nan: false,
            mnemonic,
        };
        return Some(match funct {
            funct::ADDU => int_op!(BinaryOpType::Add32, "addu"),
            funct::SUBU => int_op!(BinaryOpType::Sub32, "subu"),
            funct::DADDU => int_op!(BinaryOpType::Add64, "daddu"),
            funct::DSUBU => int_op!(BinaryOpType::Sub64, "dsubu"),
            funct::AND => int_op!(BinaryOpType::And64, "and"),
            funct::OR => int_op!(BinaryOpType::Or64, "or"),
            funct::XOR => int_op!(BinaryOpType::Xor64, "xor"),
            funct::NOR => int_op!(BinaryOpType::Nor64, "nor"),
            funct::SLL => shift_imm(BinaryOpType::Sll32, OperandSlot::Sa, "sll"),
            funct::SRL => shift_imm(BinaryOpType::Srl32, OperandSlot::Sa, "srl"),
            funct::SRA => shift_imm(BinaryOpType::Sra32, OperandSlot::Sa, "sra"),
            funct::SLLV => BinaryOpDescriptor { dest: RD, lhs: (RT, PreOp::None), rhs: (RS, PreOp::None), ..int_op!(BinaryOpType::Sll32, "sllv") },
            funct::SRLV => BinaryOpDescriptor { dest: RD, lhs: (RT, PreOp::None), rhs: (RS, PreOp::None), ..int_op!(BinaryOpType::Srl32, "srlv") },
            funct::SRAV => BinaryOpDescriptor { dest: RD, lhs: (RT, PreOp::None), rhs: (RS, PreOp::None), ..int_op!(BinaryOpType::Sra32, "srav") },
            funct::DSLL => shift_imm(BinaryOpType::Sll64, OperandSlot::Sa, "dsll"),
            funct::DSRL => shift_imm(BinaryOpType::Srl64, OperandSlot::Sa, "dsrl"),
            funct::DSRA => shift_imm(BinaryOpType::Sra64, OperandSlot::Sa, "dsra"),
            funct::DSLL32 => shift_imm(BinaryOpType::Sll64, OperandSlot::SaPlus32, "dsll32"),
            funct::DSRL32 => shift_imm(BinaryOpType::Srl64, OperandSlot::SaPlus32, "dsrl32"),
            funct::DSRA32 => shift_imm(BinaryOpType::Sra64, OperandSlot::SaPlus32, "dsra32"),
            funct::DSLLV => BinaryOpDescriptor { dest: RD, lhs: (RT, PreOp::None), rhs: (RS, PreOp::None), ..int_op!(BinaryOpType::Sll64, "dsllv") },
            funct::DSRLV => BinaryOpDescriptor { dest: RD, lhs: (RT, PreOp::None), rhs: (RS, PreOp::None), ..int_op!(BinaryOpType::Srl64, "dsrlv") },
            funct::DSRAV => BinaryOpDescriptor { dest: RD, lhs: (RT, PreOp::None), rhs: (RS, PreOp::None), ..int_op!(BinaryOpType::Sra64, "dsrav") },
            funct::SLT => int_op!(BinaryOpType::Lt, "slt"),
            funct::SLTU => int_op!(BinaryOpType::Ltu, "sltu"),
            _ => return None,
        });
    }

    let load = |op, mnemonic| BinaryOpDescriptor {
        op,
        dest: RT,
        lhs: (BASE, PreOp::None),
        rhs: (OperandSlot::ImmS16, PreOp::None),
        check_fr: false,
        check_nan: false,
        mnemonic,
    };
    match opcode {
        opcode::LB => Some(load(BinaryOpType::Lb, "lb")),
        opcode::LBU => Some(load(BinaryOpType::Lbu, "lbu")),
        opcode::LH => Some(load(BinaryOpType::Lh, "lh")),
        opcode::LHU => Some(load(BinaryOpType::Lhu, "lhu")),
        opcode::LW => Some(load(BinaryOpType::Lw, "lw")),
        opcode::LWU => Some(load(BinaryOpType::Lwu, "lwu")),
        opcode::LWL => Some(load(BinaryOpType::Lwl, "lwl")),
        opcode::LWR => Some(load(BinaryOpType::Lwr, "lwr")),
        opcode::LD => Some(load(BinaryOpType::Ld, "ld")),
        opcode::LDL => Some(load(BinaryOpType::Ldl, "ldl")),
        opcode::LDR => Some(load(BinaryOpType::Ldr, "ldr")),
        _ => None,
    }
}
