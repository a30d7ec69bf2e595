//! Conditional-branch table (§4.A): reuses the binary-op comparison set as
//! the branch condition, plus a `link` flag for JAL-like link-and-branch
//! forms and a `likely` flag for the branch-likely family.

use super::{binary::BinaryOpType, GprSlot, OperandSlot};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BranchDescriptor {
    pub condition: BinaryOpType,
    pub lhs: OperandSlot,
    pub rhs: OperandSlot,
    pub link: bool,
    pub likely: bool,
    pub mnemonic: &'static str,
}

mod opcode {
    pub const BEQ: u32 = 0x04;
    pub const BNE: u32 = 0x05;
    pub const BLEZ: u32 = 0x06;
    pub const BGTZ: u32 = 0x07;
    pub const BEQL: u32 = 0x14;
    pub const BNEL: u32 = 0x15;
    pub const BLEZL: u32 = 0x16;
    pub const BGTZL: u32 = 0x17;
    pub const REGIMM: u32 = 0x01;
}

/// `rt` field values under the REGIMM (opcode 1) major opcode.
mod regimm {
    pub const BLTZ: u32 = 0x00;
    pub const BGEZ: u32 = 0x01;
    pub const BLTZL: u32 = 0x02;
    pub const BGEZL: u32 = 0x03;
    pub const BLTZAL: u32 = 0x10;
    pub const BGEZAL: u32 = 0x11;
}

const RS: OperandSlot = OperandSlot::Gpr(GprSlot::Rs);
const RT: OperandSlot = OperandSlot::Gpr(GprSlot::Rt);
const ZERO: OperandSlot = OperandSlot::Gpr(GprSlot::Zero);

pub fn branch_op_for_instruction(opcode: u32, regimm_rt: Option<u32>) -> Option<BranchDescriptor> {
    let branch = |condition, lhs, rhs, link, likely, mnemonic| BranchDescriptor { condition, lhs, rhs, link, likely, mnemonic };

    if opcode == opcode::REGIMM {
        return Some(match regimm_rt? {
            regimm::BLTZ => branch(BinaryOpType::Lt, RS, ZERO, false, false, "bltz"),
            regimm::BGEZ => branch(BinaryOpType::Ge, RS, ZERO, false, false, "bgez"),
            regimm::BLTZL => branch(BinaryOpType::Lt, RS, ZERO, false, true, "bltzl"),
            regimm::BGEZL => branch(BinaryOpType::Ge, RS, ZERO, false, true, "bgezl"),
            regimm::BLTZAL => branch(BinaryOpType::Lt, RS, ZERO, true, false, "bltzal"),
            regimm::BGEZAL => branch(BinaryOpType::Ge, RS, ZERO, true, false, "bgezal"),
            _ => return None,
        });
    }

    match opcode {
        opcode::BEQ => Some(branch(BinaryOpType::Eq, RS, RT, false, false, "beq")),
        opcode::BNE => Some(branch(BinaryOpType::Ne, RS, RT, false, false, "bne")),
        opcode::BLEZ => Some(branch(BinaryOpType::Le, RS, ZERO, false, false, "blez")),
        opcode::BGTZ => Some(branch(BinaryOpType::Gt, RS, ZERO, false, false, "bgtz")),
        opcode::BEQL => Some(branch(BinaryOpType::Eq, RS, RT, false, true, "beql")),
        opcode::BNEL => Some(branch(BinaryOpType::Ne, RS, RT, false, true, "bnel")),
        opcode::BLEZL => Some(branch(BinaryOpType::Le, RS, ZERO, false, true, "blezl")),
        opcode::BGTZL => Some(branch(BinaryOpType::Gt, RS, ZERO, false, true, "bgtzl")),
        _ => None,
    }
}
