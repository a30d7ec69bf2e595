//! Store-operation table (§4.A).

use super::{FloatView, FprSlot, GprSlot, OperandSlot};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreOpType {
    Sd,
    Sdl,
    Sdr,
    Sw,
    Swl,
    Swr,
    Sh,
    Sb,
    Sdc1,
    Swc1,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StoreOpDescriptor {
    pub op: StoreOpType,
    pub base: OperandSlot,
    pub offset: OperandSlot,
    pub value: OperandSlot,
    pub mnemonic: &'static str,
}

mod opcode {
    pub const SB: u32 = 0x28;
    pub const SH: u32 = 0x29;
    pub const SWL: u32 = 0x2A;
    pub const SW: u32 = 0x2B;
    pub const SDL: u32 = 0x2C;
    pub const SDR: u32 = 0x2D;
    pub const SWR: u32 = 0x2E;
    pub const SWC1: u32 = 0x39;
    pub const SD: u32 = 0x3F;
    pub const SDC1: u32 = 0x3D;
}

const BASE: OperandSlot = OperandSlot::Gpr(GprSlot::Base);

pub fn store_op_for_instruction(opcode: u32) -> Option<StoreOpDescriptor> {
    let gpr = |op, mnemonic| StoreOpDescriptor {
        op,
        base: BASE,
        offset: OperandSlot::ImmS16,
        value: OperandSlot::Gpr(GprSlot::Rt),
        mnemonic,
    };
    let fpr = |op, mnemonic, view| StoreOpDescriptor {
        op,
        base: BASE,
        offset: OperandSlot::ImmS16,
        value: OperandSlot::Fpr(FprSlot::Ft, view),
        mnemonic,
    };
    match opcode {
        opcode::SB => Some(gpr(StoreOpType::Sb, "sb")),
        opcode::SH => Some(gpr(StoreOpType::Sh, "sh")),
        opcode::SW => Some(gpr(StoreOpType::Sw, "sw")),
        opcode::SWL => Some(gpr(StoreOpType::Swl, "swl")),
        opcode::SWR => Some(gpr(StoreOpType::Swr, "swr")),
        opcode::SD => Some(gpr(StoreOpType::Sd, "sd")),
        opcode::SDL => Some(gpr(StoreOpType::Sdl, "sdl")),
        opcode::SDR => Some(gpr(StoreOpType::Sdr, "sdr")),
        opcode::SWC1 => Some(fpr(StoreOpType::Swc1, "swc1", FloatView::RawLo32)),
        opcode::SDC1 => Some(fpr(StoreOpType::Sdc1, "sdc1", FloatView::RawU64)),
        _ => None,
    }
}
