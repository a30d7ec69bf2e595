//! `--dump-context` support (§6): renders a populated [`Context`] back out
//! as a `dump.toml` / `data_dump.toml` pair describing the input object,
//! for inspecting what a symbol file or ELF reader actually produced
//! before a build is attempted.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::Context;

#[derive(Debug, Clone, Serialize)]
pub struct DumpSection {
    pub name: String,
    pub rom_offset: u32,
    pub ram_addr: u32,
    pub size: u32,
    pub executable: bool,
    pub relocatable: bool,
    pub function_count: usize,
    pub reloc_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DumpFunction {
    pub name: String,
    pub vram: u32,
    pub rom: u32,
    pub size_bytes: u32,
    pub section: String,
    pub is_static: bool,
    pub stubbed: bool,
    pub ignored: bool,
}

/// `dump.toml`: the structural summary — sections, functions, dependency
/// graph sizes — with no raw bytes.
#[derive(Debug, Clone, Serialize)]
pub struct ContextDump {
    pub mod_id: Option<String>,
    pub sections: Vec<DumpSection>,
    pub functions: Vec<DumpFunction>,
    pub dependency_count: usize,
    pub import_count: usize,
    pub event_count: usize,
}

pub fn dump_context(ctx: &Context) -> ContextDump {
    let sections = ctx
        .sections
        .iter()
        .enumerate()
        .map(|(idx, s)| DumpSection {
            name: s.name.clone(),
            rom_offset: s.rom_offset,
            ram_addr: s.ram_addr,
            size: s.size,
            executable: s.executable(),
            relocatable: s.relocatable(),
            function_count: ctx.functions_in_section(crate::model::SectionId(idx as u32)).len(),
            reloc_count: s.relocs.len(),
        })
        .collect();

    let functions = ctx
        .functions
        .iter()
        .map(|f| DumpFunction {
            name: f.name.clone(),
            vram: f.vram,
            rom: f.rom,
            size_bytes: f.words.len() as u32 * 4,
            section: ctx.section(f.section).map(|s| s.name.clone()).unwrap_or_default(),
            is_static: f.is_static,
            stubbed: f.stubbed(),
            ignored: f.ignored(),
        })
        .collect();

    ContextDump {
        mod_id: ctx.mod_id.clone(),
        sections,
        functions,
        dependency_count: ctx.dependencies.len(),
        import_count: ctx.imports.len(),
        event_count: ctx.events.len(),
    }
}

/// `data_dump.toml`: the raw bytes backing every non-executable,
/// ROM-present section, hex-encoded per section so a modder can diff a
/// data segment without a hex editor.
#[derive(Debug, Clone, Serialize)]
pub struct DataDump {
    pub sections: BTreeMap<String, String>,
}

pub fn dump_data(ctx: &Context) -> DataDump {
    let mut sections = BTreeMap::new();
    for section in &ctx.sections {
        if section.executable() || !section.rom_present() {
            continue;
        }
        let start = section.rom_offset as usize;
        let end = start + section.size as usize;
        let Some(bytes) = ctx.rom.get(start..end) else { continue };
        sections.insert(section.name.clone(), hex_encode(bytes));
    }
    DataDump { sections }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

pub fn to_toml_string<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).expect("dump document always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Function, FunctionFlags, Section, SectionFlags};

    fn sample_context() -> Context {
        let mut ctx = Context::new();
        let section_id = ctx.add_section(Section {
            name: "code".into(),
            rom_offset: 0,
            ram_addr: 0x1000,
            size: 0x10,
            bss_size: None,
            flags: SectionFlags::EXECUTABLE,
            bss_section: None,
            relocs: Vec::new(),
            function_starts: Vec::new(),
            gp_ram_addr: None,
        });
        ctx.add_function(Function {
            name: "my_func".into(),
            vram: 0x1000,
            rom: 0,
            words: vec![0u32; 4],
            section: section_id,
            flags: FunctionFlags::empty(),
            hooks: Default::default(),
            is_static: false,
        });
        ctx
    }

    #[test]
    fn dumps_section_and_function_summaries() {
        let ctx = sample_context();
        let dump = dump_context(&ctx);
        assert_eq!(dump.sections.len(), 1);
        assert_eq!(dump.functions[0].name, "my_func");
        assert_eq!(dump.functions[0].size_bytes, 16);
    }

    #[test]
    fn data_dump_skips_executable_sections() {
        let ctx = sample_context();
        let dump = dump_data(&ctx);
        assert!(dump.sections.is_empty());
    }

    #[test]
    fn data_dump_hex_encodes_data_sections() {
        let mut ctx = Context::new();
        ctx.rom = vec![0xDE, 0xAD, 0xBE, 0xEF];
        ctx.add_section(Section {
            name: "data".into(),
            rom_offset: 0,
            ram_addr: 0x2000,
            size: 4,
            bss_size: None,
            flags: SectionFlags::empty(),
            bss_section: None,
            relocs: Vec::new(),
            function_starts: Vec::new(),
            gp_ram_addr: None,
        });
        let dump = dump_data(&ctx);
        assert_eq!(dump.sections.get("data"), Some(&"deadbeef".to_string()));
    }
}
