//! The overlay/section table writer (§6 Output 2): describes which
//! sections are resident, their relocs, and (when exports are enabled)
//! the export/event/manual-patch tables a loader consults to wire a
//! recompiled build together at runtime.

use serde::Serialize;

use crate::model::{Context, SectionTarget};

#[derive(Debug, Clone, Serialize)]
pub struct OverlaySection {
    pub name: String,
    pub ram_addr: u32,
    pub size: u32,
    pub relocatable: bool,
    pub functions: Vec<OverlayFunction>,
    pub relocs: Vec<OverlayReloc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayFunction {
    pub name: String,
    pub vram: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayReloc {
    pub vram: u32,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub target: OverlayRelocTarget,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum OverlayRelocTarget {
    Section { index: u32, offset: u32 },
    Reference { symbol: String },
    Import { symbol: String },
    Event { symbol: String },
    Absolute { value: u32 },
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayDocument {
    pub section_table: Vec<OverlaySection>,
    /// Load order for relocatable sections, indices into `section_table`.
    pub overlay_sections_by_index: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_table: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_patch_symbols: Option<Vec<String>>,
}

/// Builds the overlay document for a validated `Context`. Only
/// MIPS_HI16/LO16/26 relocs are listed per section (§6); `export_table`,
/// `event_names`, and `manual_patch_symbols` are populated only when
/// `with_exports` is set, matching "when exports are enabled".
pub fn build_overlay(ctx: &Context, with_exports: bool) -> OverlayDocument {
    let mut section_table: Vec<OverlaySection> = Vec::with_capacity(ctx.sections.len());

    for (idx, section) in ctx.sections.iter().enumerate() {
        let functions = ctx
            .functions_in_section(crate::model::SectionId(idx as u32))
            .iter()
            .filter_map(|&id| ctx.function(id))
            .filter(|f| !f.is_static)
            .map(|f| OverlayFunction { name: f.name.clone(), vram: f.vram })
            .collect();

        let relocs = section
            .relocs
            .iter()
            .filter(|r| r.reloc_type.is_honored())
            .map(|r| OverlayReloc { vram: r.address, kind: reloc_type_name(r.reloc_type), target: overlay_target(ctx, r.target, r.reference_symbol, r.symbol_index, r.target_section_offset) })
            .collect();

        section_table.push(OverlaySection {
            name: section.name.clone(),
            ram_addr: section.ram_addr,
            size: section.size,
            relocatable: section.relocatable(),
            functions,
            relocs,
        });
    }

    let mut overlay_sections_by_index: Vec<u32> =
        section_table.iter().enumerate().filter(|(_, s)| s.relocatable).map(|(i, _)| i as u32).collect();
    overlay_sections_by_index.sort_by_key(|&i| section_table[i as usize].ram_addr);

    let (export_table, event_names, manual_patch_symbols) = if with_exports {
        let exports = ctx.functions.iter().filter(|f| !f.is_static).map(|f| f.name.clone()).collect();
        let events = ctx.events.iter().map(|e| e.name.clone()).collect();
        let patches = ctx.replacements.iter().filter_map(|r| ctx.function(r.function)).map(|f| f.name.clone()).collect();
        (Some(exports), Some(events), Some(patches))
    } else {
        (None, None, None)
    };

    OverlayDocument { section_table, overlay_sections_by_index, export_table, event_names, manual_patch_symbols }
}

fn reloc_type_name(kind: crate::model::RelocType) -> &'static str {
    match kind {
        crate::model::RelocType::None => "none",
        crate::model::RelocType::Addr32 => "R_MIPS_32",
        crate::model::RelocType::Addr26 => "R_MIPS_26",
        crate::model::RelocType::Hi16 => "R_MIPS_HI16",
        crate::model::RelocType::Lo16 => "R_MIPS_LO16",
    }
}

fn overlay_target(
    ctx: &Context,
    target: SectionTarget,
    reference_symbol: bool,
    symbol_index: Option<crate::model::ReferenceSymbolId>,
    offset: u32,
) -> OverlayRelocTarget {
    match target {
        SectionTarget::Absolute => OverlayRelocTarget::Absolute { value: offset },
        SectionTarget::Import => {
            let name = symbol_index.and_then(|id| ctx.reference_symbols.get(id.index())).map(|s| s.name.clone()).unwrap_or_default();
            OverlayRelocTarget::Import { symbol: name }
        }
        SectionTarget::Event => {
            let name = symbol_index.and_then(|id| ctx.reference_symbols.get(id.index())).map(|s| s.name.clone()).unwrap_or_default();
            OverlayRelocTarget::Event { symbol: name }
        }
        SectionTarget::Section(id) if reference_symbol => {
            let name = symbol_index.and_then(|i| ctx.reference_symbols.get(i.index())).map(|s| s.name.clone()).unwrap_or_default();
            let _ = id;
            OverlayRelocTarget::Reference { symbol: name }
        }
        SectionTarget::Section(id) => OverlayRelocTarget::Section { index: id.0, offset },
    }
}

pub fn to_toml_string(doc: &OverlayDocument) -> String {
    toml::to_string_pretty(doc).expect("OverlayDocument always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Function, FunctionFlags, Section, SectionFlags};

    #[test]
    fn orders_relocatable_sections_by_ram_addr() {
        let mut ctx = Context::new();
        ctx.add_section(Section {
            name: "hi".into(),
            rom_offset: 0,
            ram_addr: 0x2000,
            size: 0x10,
            bss_size: None,
            flags: SectionFlags::EXECUTABLE | SectionFlags::RELOCATABLE,
            bss_section: None,
            relocs: Vec::new(),
            function_starts: Vec::new(),
            gp_ram_addr: None,
        });
        ctx.add_section(Section {
            name: "lo".into(),
            rom_offset: 0,
            ram_addr: 0x1000,
            size: 0x10,
            bss_size: None,
            flags: SectionFlags::EXECUTABLE | SectionFlags::RELOCATABLE,
            bss_section: None,
            relocs: Vec::new(),
            function_starts: Vec::new(),
            gp_ram_addr: None,
        });

        let doc = build_overlay(&ctx, false);
        assert_eq!(doc.overlay_sections_by_index, vec![1, 0]);
    }

    #[test]
    fn excludes_static_functions_from_export_table() {
        let mut ctx = Context::new();
        let section_id = ctx.add_section(Section {
            name: "code".into(),
            rom_offset: 0,
            ram_addr: 0x1000,
            size: 0x100,
            bss_size: None,
            flags: SectionFlags::EXECUTABLE,
            bss_section: None,
            relocs: Vec::new(),
            function_starts: Vec::new(),
            gp_ram_addr: None,
        });
        ctx.add_function(Function {
            name: "public_fn".into(),
            vram: 0x1000,
            rom: 0,
            words: vec![0u32; 1],
            section: section_id,
            flags: FunctionFlags::empty(),
            hooks: Default::default(),
            is_static: false,
        });
        ctx.add_static_function(Function {
            name: "static_code_1004".into(),
            vram: 0x1004,
            rom: 4,
            words: vec![0u32; 1],
            section: section_id,
            flags: FunctionFlags::empty(),
            hooks: Default::default(),
            is_static: true,
        });

        let doc = build_overlay(&ctx, true);
        assert_eq!(doc.export_table.unwrap(), vec!["public_fn".to_string()]);
        assert_eq!(doc.section_table[0].functions.len(), 1);
    }
}
