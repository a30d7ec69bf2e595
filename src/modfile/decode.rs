//! Decodes the binary mod symbol format (§4.C) back into a [`Context`].

use crate::error::SymbolFileError;
use crate::model::{
    Context, Dependency, Function, FunctionFlags, FunctionReplacement, ReplacementMode, Reloc, RelocType, Section,
    SectionFlags, SectionId, SectionTarget, SemVer,
};

use super::{LOCAL_SECTION_FLAG, MAGIC, TARGET_SENTINEL_EVENT, TARGET_SENTINEL_IMPORT, VERSION};

const NONE_U32: u32 = 0xFFFF_FFFF;

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn u32(&mut self) -> Result<u32, SymbolFileError> {
        let end = self.pos + 4;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| SymbolFileError::CorruptSymbolFile("unexpected end of file".into()))?;
        self.pos = end;
        Ok(u32::from_le_bytes(slice.try_into().unwrap()))
    }

    fn opt_u32(&mut self) -> Result<Option<u32>, SymbolFileError> {
        let v = self.u32()?;
        Ok(if v == NONE_U32 { None } else { Some(v) })
    }

    fn string(&mut self, string_data: &[u8]) -> Result<String, SymbolFileError> {
        let start = self.u32()? as usize;
        let len = self.u32()? as usize;
        let slice = string_data
            .get(start..start + len)
            .ok_or_else(|| SymbolFileError::CorruptSymbolFile("string ref out of bounds".into()))?;
        String::from_utf8(slice.to_vec()).map_err(|_| SymbolFileError::CorruptSymbolFile("non-utf8 string".into()))
    }
}

pub fn decode(bytes: &[u8]) -> Result<Context, SymbolFileError> {
    if bytes.len() < 8 || &bytes[0..8] != MAGIC {
        return Err(SymbolFileError::NotASymbolFile);
    }
    let mut r = Reader::new(bytes);
    r.pos = 8;
    let version = r.u32()?;
    if version != VERSION {
        return Err(SymbolFileError::UnknownSymbolFileVersion(version));
    }

    let num_sections = r.u32()? as usize;
    let num_deps = r.u32()? as usize;
    let num_imports = r.u32()? as usize;
    let num_dep_events = r.u32()? as usize;
    let num_replacements = r.u32()? as usize;
    let num_exports = r.u32()? as usize;
    let num_callbacks = r.u32()? as usize;
    let num_provided_events = r.u32()? as usize;
    let string_data_size = r.u32()? as usize;

    let string_data = r
        .bytes
        .get(r.pos..r.pos + string_data_size)
        .ok_or_else(|| SymbolFileError::CorruptSymbolFile("string data truncated".into()))?
        .to_vec();
    r.pos += string_data_size;

    let mut ctx = Context::new();
    let mut section_ids = Vec::with_capacity(num_sections);

    for _ in 0..num_sections {
        let name = r.string(&string_data)?;
        let flags_bits = r.u32()?;
        let rom_offset = r.u32()?;
        let ram_addr = r.u32()?;
        let size = r.u32()?;
        let bss_size = r.opt_u32()?;
        let gp_ram_addr = r.opt_u32()?;
        let num_funcs = r.u32()? as usize;
        let num_relocs = r.u32()? as usize;

        if ram_addr % 4 != 0 {
            return Err(SymbolFileError::CorruptSymbolFile(format!("section {name} vram not aligned")));
        }

        struct PendingFunc {
            name: String,
            section_offset: u32,
            byte_size: u32,
            flags: u32,
        }
        let mut pending_funcs = Vec::with_capacity(num_funcs);
        for _ in 0..num_funcs {
            let fname = r.string(&string_data)?;
            let section_offset = r.u32()?;
            let byte_size = r.u32()?;
            let fflags = r.u32()?;
            if section_offset + byte_size > size {
                return Err(SymbolFileError::FunctionOutOfBounds { section_offset, size: byte_size });
            }
            pending_funcs.push(PendingFunc { name: fname, section_offset, byte_size, flags: fflags });
        }

        let mut relocs = Vec::with_capacity(num_relocs);
        for _ in 0..num_relocs {
            let section_offset = r.u32()?;
            let reloc_type_raw = r.u32()?;
            let offset_or_index = r.u32()?;
            let target_vrom = r.u32()?;

            let reloc_type = RelocType::try_from(reloc_type_raw)
                .map_err(|_| SymbolFileError::CorruptSymbolFile(format!("unknown reloc type {reloc_type_raw}")))?;

            let (target, reference_symbol, target_section_offset, symbol_index) = if target_vrom == TARGET_SENTINEL_IMPORT
            {
                (SectionTarget::Import, true, 0, Some(crate::model::ReferenceSymbolId(offset_or_index)))
            } else if target_vrom == TARGET_SENTINEL_EVENT {
                (SectionTarget::Event, true, 0, Some(crate::model::ReferenceSymbolId(offset_or_index)))
            } else if target_vrom & LOCAL_SECTION_FLAG != 0 {
                let local_idx = target_vrom & !LOCAL_SECTION_FLAG;
                (SectionTarget::Section(SectionId(local_idx)), false, offset_or_index, None)
            } else {
                // Host section identified by ROM offset; resolved against
                // `ctx.reference_sections` once all sections are known.
                (SectionTarget::Section(SectionId(target_vrom)), true, offset_or_index, None)
            };

            relocs.push(Reloc {
                address: ram_addr + section_offset,
                target,
                target_section_offset,
                symbol_index,
                reloc_type,
                reference_symbol,
            });
        }

        let section = Section {
            name,
            rom_offset,
            ram_addr,
            size,
            bss_size,
            flags: SectionFlags::from_bits_truncate(flags_bits as u8),
            bss_section: None,
            relocs,
            function_starts: Vec::new(),
            gp_ram_addr,
        };
        let section_id = ctx.add_section(section);
        section_ids.push(section_id);

        for pf in pending_funcs {
            let words = vec![0u32; (pf.byte_size / 4) as usize];
            let function = Function {
                name: pf.name,
                vram: ram_addr + pf.section_offset,
                rom: if rom_offset == crate::model::ROM_NOT_PRESENT {
                    crate::model::ROM_NOT_PRESENT
                } else {
                    rom_offset + pf.section_offset
                },
                words,
                section: section_id,
                flags: FunctionFlags::from_bits_truncate(pf.flags as u8),
                hooks: std::collections::HashMap::new(),
                is_static: false,
            };
            ctx.add_function(function);
        }
    }

    for _ in 0..num_deps {
        let id = r.string(&string_data)?;
        let major = r.u32()?;
        let minor = r.u32()?;
        let patch = r.u32()?;
        ctx.add_dependency(Dependency { id, version: SemVer { major, minor, patch } })
            .map_err(|e| SymbolFileError::CorruptSymbolFile(e.to_string()))?;
    }

    for _ in 0..num_imports {
        let name = r.string(&string_data)?;
        let dep_index = r.u32()?;
        ctx.add_import(name, crate::model::DependencyId(dep_index))
            .map_err(|e| SymbolFileError::CorruptSymbolFile(e.to_string()))?;
    }

    for _ in 0..num_dep_events {
        let name = r.string(&string_data)?;
        let dep_index = r.u32()?;
        ctx.add_dependency_event(crate::model::DependencyId(dep_index), name)
            .map_err(|e| SymbolFileError::CorruptSymbolFile(e.to_string()))?;
    }

    for _ in 0..num_replacements {
        let function_index = r.u32()?;
        let original_vrom = r.u32()?;
        let original_vram = r.u32()?;
        let mode_raw = r.u32()?;
        let mode = if mode_raw == 0 { ReplacementMode::Normal } else { ReplacementMode::Force };
        ctx.replacements.push(FunctionReplacement {
            function: crate::model::FunctionId(function_index),
            original_vrom,
            original_vram,
            mode,
        });
    }

    // Exports: a flat array of function indices, already implied by
    // `Function::is_static`; consumed here only to advance the cursor.
    for _ in 0..num_exports {
        r.u32()?;
    }

    for _ in 0..num_callbacks {
        let dep_event_index = r.u32()?;
        let function_index = r.u32()?;
        ctx.add_callback(crate::model::DependencyEventId(dep_event_index), crate::model::FunctionId(function_index));
    }

    for _ in 0..num_provided_events {
        let name = r.string(&string_data)?;
        ctx.add_event_symbol(name);
    }

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::super::encode::encode;
    use super::*;

    #[test]
    fn round_trips_mod_with_one_imported_call() {
        let mut ctx = Context::new();
        let dep_id = ctx
            .add_dependency(Dependency { id: "modA".into(), version: SemVer { major: 1, minor: 2, patch: 3 } })
            .unwrap();
        let import_id = ctx.add_import("fn".into(), dep_id).unwrap();

        let section = Section {
            name: "code".into(),
            rom_offset: 0,
            ram_addr: 0x1000,
            size: 0x100,
            bss_size: None,
            flags: SectionFlags::EXECUTABLE,
            bss_section: None,
            relocs: vec![Reloc {
                address: 0x1000,
                target: SectionTarget::Import,
                target_section_offset: 0,
                symbol_index: Some(crate::model::ReferenceSymbolId(import_id.0)),
                reloc_type: RelocType::Addr26,
                reference_symbol: true,
            }],
            function_starts: Vec::new(),
            gp_ram_addr: None,
        };
        let section_id = ctx.add_section(section);
        ctx.add_function(Function {
            name: "my_func".into(),
            vram: 0x1000,
            rom: 0,
            words: vec![0u32; 4],
            section: section_id,
            flags: FunctionFlags::empty(),
            hooks: std::collections::HashMap::new(),
            is_static: false,
        });

        let bytes = encode(&ctx);
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.sections.len(), 1);
        assert_eq!(decoded.functions.len(), 1);
        assert_eq!(decoded.functions[0].name, "my_func");
        assert_eq!(decoded.dependencies.len(), 1);
        assert_eq!(decoded.dependencies[0].id, "modA");
        assert_eq!(decoded.imports.len(), 1);
        assert_eq!(decoded.imports[0].name, "fn");

        let reloc = &decoded.sections[0].relocs[0];
        assert_eq!(reloc.target, SectionTarget::Import);
        assert_eq!(reloc.symbol_index.unwrap().index(), import_id.index());
    }

    #[test]
    fn rejects_bad_magic() {
        let err = decode(b"NOTREALLY").unwrap_err();
        assert_eq!(err, SymbolFileError::NotASymbolFile);
    }
}
