//! Function records (§3): a vram, a ROM offset, an instruction stream, and
//! the three status flags the driver and generators consult.

use std::collections::HashMap;

use super::ids::SectionId;

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct FunctionFlags: u8 {
        const IGNORED      = 1 << 0;
        const REIMPLEMENTED = 1 << 1;
        const STUBBED      = 1 << 2;
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub vram: u32,
    pub rom: u32,
    /// Instruction words, already byteswapped to host endianness by the
    /// driver's first pass (§4.F.1). Stored big-endian-decoded here; the
    /// owning `Section`/`Context` know nothing about byte order.
    pub words: Vec<u32>,
    pub section: SectionId,
    pub flags: FunctionFlags,
    /// Instruction index -> literal text injected verbatim by the source
    /// generator at that point in the function body.
    pub hooks: HashMap<usize, String>,
    /// True for a `Function` synthesized during statics discovery
    /// (§4.F.6) rather than present in the original symbol table.
    pub is_static: bool,
}

impl Function {
    pub fn end_vram(&self) -> u32 {
        self.vram + (self.words.len() as u32) * 4
    }

    pub fn contains_vram(&self, vram: u32) -> bool {
        vram >= self.vram && vram < self.end_vram()
    }

    pub fn ignored(&self) -> bool {
        self.flags.contains(FunctionFlags::IGNORED)
    }

    pub fn reimplemented(&self) -> bool {
        self.flags.contains(FunctionFlags::REIMPLEMENTED)
    }

    pub fn stubbed(&self) -> bool {
        self.flags.contains(FunctionFlags::STUBBED)
    }

    pub fn static_name(section_name: &str, vram: u32) -> String {
        format!("static_{section_name}_{vram:08X}")
    }
}
