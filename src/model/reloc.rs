//! Relocation records (§3) and the MIPS ELF reloc type subset the core honors.

use super::ids::{ReferenceSymbolId, SectionTarget};

/// The MIPS ELF relocation types the core recognizes. Only `_NONE`, `_26`,
/// `_32`, `_HI16`, `_LO16` are ever acted on by the driver; other values may
/// appear in an input object but are rejected with
/// [`crate::error::RecompileError::ForbiddenRelocType`] if the driver is
/// asked to resolve one against an instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u32)]
pub enum RelocType {
    None = 0,
    Addr32 = 2,
    Addr26 = 4,
    Hi16 = 5,
    Lo16 = 6,
}

impl RelocType {
    pub fn is_honored(self) -> bool {
        matches!(
            self,
            RelocType::None | RelocType::Addr26 | RelocType::Addr32 | RelocType::Hi16 | RelocType::Lo16
        )
    }
}

/// A single relocation entry, owned by the [`crate::model::section::Section`]
/// whose instruction it patches.
#[derive(Debug, Clone)]
pub struct Reloc {
    /// vram of the patched instruction.
    pub address: u32,
    pub target: SectionTarget,
    /// Offset within the target section, or the full 32-bit addend once
    /// an HI16/LO16 pair has been resolved by [`super::context::Context::validate`].
    pub target_section_offset: u32,
    /// Populated when `target` resolves through a reference/import/event
    /// symbol rather than directly through a section offset.
    pub symbol_index: Option<ReferenceSymbolId>,
    pub reloc_type: RelocType,
    pub reference_symbol: bool,
}

impl Reloc {
    pub fn is_hi16(&self) -> bool {
        self.reloc_type == RelocType::Hi16
    }

    pub fn is_lo16(&self) -> bool {
        self.reloc_type == RelocType::Lo16
    }
}
