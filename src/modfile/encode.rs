//! Encodes a [`Context`] to the binary mod symbol format (§4.C).
//!
//! Layout: magic, version, a 9-field subheader of counts, the string data
//! blob, then the section table (each followed by its function and reloc
//! arrays), then the dependency/import/event/replacement/callback arrays.

use crate::model::{Context, SectionTarget};

use super::{LOCAL_SECTION_FLAG, MAGIC, TARGET_SENTINEL_EVENT, TARGET_SENTINEL_IMPORT, VERSION};

#[derive(Default)]
struct StringTable {
    blob: Vec<u8>,
}

impl StringTable {
    fn intern(&mut self, s: &str) -> (u32, u32) {
        let start = self.blob.len() as u32;
        self.blob.extend_from_slice(s.as_bytes());
        (start, s.len() as u32)
    }
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

const NONE_U32: u32 = 0xFFFF_FFFF;

pub fn encode(ctx: &Context) -> Vec<u8> {
    let mut strings = StringTable::default();
    let mut section_blobs = Vec::with_capacity(ctx.sections.len());

    for (idx, section) in ctx.sections.iter().enumerate() {
        let (name_start, name_len) = strings.intern(&section.name);
        let mut header = Vec::new();
        push_u32(&mut header, name_start);
        push_u32(&mut header, name_len);
        push_u32(&mut header, section.flags.bits() as u32);
        push_u32(&mut header, section.rom_offset);
        push_u32(&mut header, section.ram_addr);
        push_u32(&mut header, section.size);
        push_u32(&mut header, section.bss_size.unwrap_or(NONE_U32));
        push_u32(&mut header, section.gp_ram_addr.unwrap_or(NONE_U32));

        let funcs: Vec<_> = ctx.functions.iter().filter(|f| f.section.index() == idx).collect();
        push_u32(&mut header, funcs.len() as u32);
        push_u32(&mut header, section.relocs.len() as u32);

        let mut body = Vec::new();
        for function in &funcs {
            let (fname_start, fname_len) = strings.intern(&function.name);
            push_u32(&mut body, fname_start);
            push_u32(&mut body, fname_len);
            push_u32(&mut body, function.vram - section.ram_addr);
            push_u32(&mut body, function.words.len() as u32 * 4);
            push_u32(&mut body, function.flags.bits() as u32);
        }
        for reloc in &section.relocs {
            push_u32(&mut body, reloc.address - section.ram_addr);
            push_u32(&mut body, u32::from(reloc.reloc_type));
            let offset_or_index = if reloc.reference_symbol {
                reloc.symbol_index.map(|id| id.index() as u32).unwrap_or(0)
            } else {
                reloc.target_section_offset
            };
            push_u32(&mut body, offset_or_index);
            push_u32(&mut body, encode_target_vrom(ctx, reloc.target, reloc.reference_symbol));
        }

        header.extend(body);
        section_blobs.push(header);
    }

    let mut deps = Vec::new();
    for dep in &ctx.dependencies {
        let (start, len) = strings.intern(&dep.id);
        push_u32(&mut deps, start);
        push_u32(&mut deps, len);
        push_u32(&mut deps, dep.version.major);
        push_u32(&mut deps, dep.version.minor);
        push_u32(&mut deps, dep.version.patch);
    }

    let mut imports = Vec::new();
    for import in &ctx.imports {
        let (start, len) = strings.intern(&import.name);
        push_u32(&mut imports, start);
        push_u32(&mut imports, len);
        push_u32(&mut imports, import.dependency.index() as u32);
    }

    let mut dep_events = Vec::new();
    for event in &ctx.dependency_events {
        let (start, len) = strings.intern(&event.name);
        push_u32(&mut dep_events, start);
        push_u32(&mut dep_events, len);
        push_u32(&mut dep_events, event.dependency.index() as u32);
    }

    let mut replacements = Vec::new();
    for replacement in &ctx.replacements {
        push_u32(&mut replacements, replacement.function.index() as u32);
        push_u32(&mut replacements, replacement.original_vrom);
        push_u32(&mut replacements, replacement.original_vram);
        push_u32(&mut replacements, replacement.mode as u32);
    }

    // "exports" are every non-static, non-replacement function, addressed
    // by function index; kept as a flat array of indices so the loader
    // doesn't have to re-derive it.
    let exports: Vec<u32> = ctx
        .functions
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.is_static)
        .map(|(i, _)| i as u32)
        .collect();
    let mut export_bytes = Vec::new();
    for idx in &exports {
        push_u32(&mut export_bytes, *idx);
    }

    let mut callbacks = Vec::new();
    for callback in &ctx.callbacks {
        push_u32(&mut callbacks, callback.dependency_event.index() as u32);
        push_u32(&mut callbacks, callback.function.index() as u32);
    }

    let mut provided_events = Vec::new();
    for event in &ctx.events {
        let (start, len) = strings.intern(&event.name);
        push_u32(&mut provided_events, start);
        push_u32(&mut provided_events, len);
    }

    let mut string_data = strings.blob;
    while string_data.len() % 4 != 0 {
        string_data.push(0);
    }

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    push_u32(&mut out, VERSION);
    push_u32(&mut out, ctx.sections.len() as u32);
    push_u32(&mut out, ctx.dependencies.len() as u32);
    push_u32(&mut out, ctx.imports.len() as u32);
    push_u32(&mut out, ctx.dependency_events.len() as u32);
    push_u32(&mut out, ctx.replacements.len() as u32);
    push_u32(&mut out, exports.len() as u32);
    push_u32(&mut out, ctx.callbacks.len() as u32);
    push_u32(&mut out, ctx.events.len() as u32);
    push_u32(&mut out, string_data.len() as u32);

    out.extend(string_data);
    for blob in section_blobs {
        out.extend(blob);
    }
    out.extend(deps);
    out.extend(imports);
    out.extend(dep_events);
    out.extend(replacements);
    out.extend(export_bytes);
    out.extend(callbacks);
    out.extend(provided_events);
    out
}

fn encode_target_vrom(ctx: &Context, target: SectionTarget, reference_symbol: bool) -> u32 {
    match target {
        SectionTarget::Import => TARGET_SENTINEL_IMPORT,
        SectionTarget::Event => TARGET_SENTINEL_EVENT,
        SectionTarget::Absolute => NONE_U32,
        SectionTarget::Section(id) => {
            if reference_symbol {
                ctx.reference_sections.get(id.index()).map(|s| s.rom_offset).unwrap_or(NONE_U32)
            } else {
                LOCAL_SECTION_FLAG | id.0
            }
        }
    }
}
