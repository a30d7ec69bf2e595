//! Input 2 (symbol-file TOML) and Input 3 (build-config TOML) readers
//! (§6). Both are plain `serde`-deserialized documents; the only logic
//! here is the alignment/consistency validation described in §6 and the
//! translation from the TOML DTOs into [`crate::model::Context`] types.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{
    Context, Function, FunctionFlags, Reloc, RelocType, Section, SectionFlags, SectionId, SectionTarget,
};

fn read_to_string(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })
}

fn parse_toml<T: for<'de> Deserialize<'de>>(path: &Path, text: &str) -> Result<T, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Toml { path: path.display().to_string(), source })
}

// ---- Input 2: symbol file -------------------------------------------------

#[derive(Debug, Deserialize)]
struct SymbolFileDoc {
    #[serde(default)]
    rom: Option<String>,
    #[serde(default)]
    section: Vec<SymbolSection>,
}

#[derive(Debug, Deserialize)]
struct SymbolSection {
    name: String,
    rom: u32,
    vram: u32,
    size: u32,
    #[serde(default)]
    gp_ram_addr: Option<u32>,
    #[serde(default)]
    relocatable: bool,
    #[serde(default)]
    function: Vec<SymbolFunction>,
    #[serde(default)]
    reloc: Vec<SymbolReloc>,
}

#[derive(Debug, Deserialize)]
struct SymbolFunction {
    name: String,
    vram: u32,
    size: u32,
}

#[derive(Debug, Deserialize)]
struct SymbolReloc {
    vram: u32,
    target_vram: u32,
    #[serde(rename = "type")]
    kind: SymbolRelocType,
}

#[derive(Debug, Deserialize)]
enum SymbolRelocType {
    #[serde(rename = "R_MIPS_HI16")]
    RMipsHi16,
    #[serde(rename = "R_MIPS_LO16")]
    RMipsLo16,
}

impl From<SymbolRelocType> for RelocType {
    fn from(value: SymbolRelocType) -> Self {
        match value {
            SymbolRelocType::RMipsHi16 => RelocType::Hi16,
            SymbolRelocType::RMipsLo16 => RelocType::Lo16,
        }
    }
}

/// Parses Input 2 (§6): a textual symbol table plus an optional raw ROM
/// image path, into a validated [`Context`]. Toml errors are surfaced
/// verbatim via [`ConfigError::Toml`]; unaligned vrams are rejected before
/// a `Context` is handed back.
pub fn load_symbol_toml(symbol_path: &Path) -> Result<Context, ConfigError> {
    let text = read_to_string(symbol_path)?;
    let doc: SymbolFileDoc = parse_toml(symbol_path, &text)?;

    let rom = match &doc.rom {
        Some(rom_path) => {
            let resolved = symbol_path.parent().map(|dir| dir.join(rom_path)).unwrap_or_else(|| rom_path.into());
            std::fs::read(&resolved).map_err(|source| ConfigError::Io { path: resolved.display().to_string(), source })?
        }
        None => Vec::new(),
    };

    let mut ctx = Context::new();
    ctx.rom = rom;

    for section_doc in doc.section {
        if section_doc.vram % 4 != 0 {
            return Err(ConfigError::UnalignedVram { vram: section_doc.vram });
        }
        if section_doc.rom % 4 != 0 {
            return Err(ConfigError::UnalignedRom { rom: section_doc.rom });
        }

        let mut flags = SectionFlags::EXECUTABLE;
        if section_doc.relocatable {
            flags |= SectionFlags::RELOCATABLE;
        }

        let mut relocs: Vec<Reloc> = section_doc
            .reloc
            .iter()
            .map(|r| Reloc {
                address: r.vram,
                target: SectionTarget::Absolute,
                target_section_offset: r.target_vram,
                symbol_index: None,
                reloc_type: r.kind.into(),
                reference_symbol: false,
            })
            .collect();
        relocs.sort_by_key(|r| r.address);

        let section = Section {
            name: section_doc.name.clone(),
            rom_offset: section_doc.rom,
            ram_addr: section_doc.vram,
            size: section_doc.size,
            bss_size: None,
            flags,
            bss_section: None,
            relocs,
            function_starts: section_doc.function.iter().map(|f| f.vram).collect(),
            gp_ram_addr: section_doc.gp_ram_addr,
        };
        let section_id = ctx.add_section(section);

        for func in section_doc.function {
            if func.vram % 4 != 0 {
                return Err(ConfigError::UnalignedVram { vram: func.vram });
            }
            let rom_offset = section_doc.rom + (func.vram - section_doc.vram);
            let words = read_function_words(&ctx.rom, rom_offset, func.size);
            ctx.add_function(Function {
                name: func.name,
                vram: func.vram,
                rom: rom_offset,
                words,
                section: section_id,
                flags: FunctionFlags::empty(),
                hooks: Default::default(),
                is_static: false,
            });
        }
    }

    Ok(ctx)
}

fn read_function_words(rom: &[u8], rom_offset: u32, byte_size: u32) -> Vec<u32> {
    let word_count = (byte_size / 4) as usize;
    let mut words = Vec::with_capacity(word_count);
    for i in 0..word_count {
        let start = rom_offset as usize + i * 4;
        let word = rom.get(start..start + 4).map(|b| u32::from_be_bytes(b.try_into().unwrap())).unwrap_or(0);
        words.push(word);
    }
    words
}

// ---- Input 3: build configuration -----------------------------------------

/// A single-instruction patch: overwrite the raw word at `vram` inside
/// `func_name` with `value` before recompilation sees it.
#[derive(Debug, Clone, Deserialize)]
pub struct InstructionPatch {
    pub func_name: String,
    pub vram: u32,
    pub value: u32,
}

/// A function the build declares to exist without a symbol-table entry
/// (e.g. a stripped static the modder located by hand).
#[derive(Debug, Clone, Deserialize)]
pub struct ManualFunction {
    pub name: String,
    pub section: String,
    pub vram: u32,
    pub size: u32,
}

/// Input 3 (§6): paths, the relocatable section allowlist, and the
/// per-function overrides (stub/rename/patch/manual-function/manual-size)
/// a build applies on top of the symbol table before recompiling.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    pub input_binary: String,
    #[serde(default)]
    pub symbol_file: Option<String>,
    pub output_dir: String,
    #[serde(default)]
    pub output_symbol_file: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub relocatable_sections: Vec<String>,
    #[serde(default)]
    pub stub_functions: Vec<String>,
    #[serde(default)]
    pub ignored_functions: Vec<String>,
    #[serde(default)]
    pub renamed_functions: BTreeMap<String, String>,
    #[serde(default)]
    pub patches: Vec<InstructionPatch>,
    #[serde(default)]
    pub manual_functions: Vec<ManualFunction>,
    #[serde(default)]
    pub manual_function_sizes: BTreeMap<String, u32>,
}

impl BuildConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read_to_string(path)?;
        parse_toml(path, &text)
    }

    /// Applies every override this config carries to an already-loaded
    /// `Context`: stubs, renames, single-instruction patches, manual
    /// functions, and manual size overrides, in that order.
    pub fn apply(&self, ctx: &mut Context) -> Result<(), ConfigError> {
        for name in &self.stub_functions {
            if let Some(id) = ctx.function_by_name(name) {
                ctx.functions[id.index()].flags |= FunctionFlags::STUBBED;
            }
        }
        for name in &self.ignored_functions {
            if let Some(id) = ctx.function_by_name(name) {
                ctx.functions[id.index()].flags |= FunctionFlags::IGNORED;
            }
        }
        for (old, new) in &self.renamed_functions {
            if let Some(id) = ctx.function_by_name(old) {
                ctx.functions[id.index()].name = new.clone();
            }
        }
        for patch in &self.patches {
            if let Some(id) = ctx.function_by_name(&patch.func_name) {
                let func = &mut ctx.functions[id.index()];
                if patch.vram % 4 == 0 && patch.vram >= func.vram {
                    let slot = ((patch.vram - func.vram) / 4) as usize;
                    if let Some(word) = func.words.get_mut(slot) {
                        *word = patch.value;
                    }
                }
            }
        }
        for manual in &self.manual_functions {
            let Some(section_id) = find_section(ctx, &manual.section) else { continue };
            let section = &ctx.sections[section_id.index()];
            let rom_offset = if section.rom_present() { section.rom_offset + (manual.vram - section.ram_addr) } else { crate::model::ROM_NOT_PRESENT };
            let words = read_function_words(&ctx.rom, rom_offset, manual.size);
            ctx.add_function(Function {
                name: manual.name.clone(),
                vram: manual.vram,
                rom: rom_offset,
                words,
                section: section_id,
                flags: FunctionFlags::empty(),
                hooks: Default::default(),
                is_static: false,
            });
        }
        for (name, size) in &self.manual_function_sizes {
            if let Some(id) = ctx.function_by_name(name) {
                let func = &mut ctx.functions[id.index()];
                let rom_offset = func.rom;
                func.words = read_function_words(&ctx.rom, rom_offset, *size);
            }
        }
        Ok(())
    }
}

fn find_section(ctx: &Context, name: &str) -> Option<SectionId> {
    ctx.sections.iter().position(|s| s.name == name).map(|i| SectionId(i as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unaligned_section_vram() {
        let toml = r#"
            [[section]]
            name = "code"
            rom = 0
            vram = 0x1002
            size = 0x100
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbols.toml");
        std::fs::write(&path, toml).unwrap();
        let err = load_symbol_toml(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnalignedVram { vram: 0x1002 }));
    }

    #[test]
    fn loads_a_minimal_symbol_file() {
        let toml = r#"
            [[section]]
            name = "code"
            rom = 0
            vram = 0x1000
            size = 0x100

            [[section.function]]
            name = "my_func"
            vram = 0x1000
            size = 16
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbols.toml");
        std::fs::write(&path, toml).unwrap();
        let ctx = load_symbol_toml(&path).unwrap();
        assert_eq!(ctx.sections.len(), 1);
        assert_eq!(ctx.functions.len(), 1);
        assert_eq!(ctx.functions[0].name, "my_func");
        assert_eq!(ctx.functions[0].words.len(), 4);
    }

    #[test]
    fn build_config_applies_stub_and_rename() {
        let mut ctx = Context::new();
        let section = Section {
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
        };
        let section_id = ctx.add_section(section);
        ctx.add_function(Function {
            name: "old_name".into(),
            vram: 0x1000,
            rom: 0,
            words: vec![0u32; 2],
            section: section_id,
            flags: FunctionFlags::empty(),
            hooks: Default::default(),
            is_static: false,
        });

        let mut config = BuildConfig { input_binary: "a".into(), output_dir: "b".into(), ..Default::default() };
        config.stub_functions.push("old_name".into());
        config.renamed_functions.insert("old_name".into(), "new_name".into());
        config.apply(&mut ctx).unwrap();

        assert!(ctx.functions[0].stubbed());
        assert_eq!(ctx.functions[0].name, "new_name");
    }
}
