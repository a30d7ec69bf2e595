//! Section records (§3): a contiguous range of the original program.

use super::ids::SectionId;
use super::reloc::Reloc;

bitflags::bitflags! {
    /// The four section predicates from §3, plus a fifth internal bit used
    /// to mark sections synthesized for statics discovery (§4.F.6) so the
    /// driver can tell a real input section from one it invented.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        const EXECUTABLE       = 1 << 0;
        const RELOCATABLE      = 1 << 1;
        const HAS_MIPS32_RELOCS = 1 << 2;
    }
}

pub const ROM_NOT_PRESENT: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub rom_offset: u32,
    pub ram_addr: u32,
    pub size: u32,
    pub bss_size: Option<u32>,
    pub flags: SectionFlags,
    /// Index of a companion BSS section sharing this section's address
    /// space, if any.
    pub bss_section: Option<SectionId>,
    pub relocs: Vec<Reloc>,
    /// vrams of known function starts, in ascending order.
    pub function_starts: Vec<u32>,
    /// Global offset table base for PIC code in this section, consulted by
    /// the analyzer's GOT-relative jump table recognition (§4.D).
    pub gp_ram_addr: Option<u32>,
}

impl Section {
    pub fn executable(&self) -> bool {
        self.flags.contains(SectionFlags::EXECUTABLE)
    }

    pub fn relocatable(&self) -> bool {
        self.flags.contains(SectionFlags::RELOCATABLE)
    }

    pub fn has_mips32_relocs(&self) -> bool {
        self.flags.contains(SectionFlags::HAS_MIPS32_RELOCS)
    }

    pub fn rom_present(&self) -> bool {
        self.rom_offset != ROM_NOT_PRESENT
    }

    pub fn contains_vram(&self, vram: u32) -> bool {
        vram >= self.ram_addr && vram < self.ram_addr + self.size
    }

    /// Returns the reloc at or immediately following `vram`, used by the
    /// driver to advance a per-section reloc cursor in program order.
    pub fn reloc_at_or_after(&self, vram: u32, from_index: usize) -> Option<(usize, &Reloc)> {
        self.relocs[from_index..]
            .iter()
            .enumerate()
            .map(|(i, r)| (i + from_index, r))
            .find(|(_, r)| r.address >= vram)
    }
}
