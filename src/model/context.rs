//! The aggregate data model (§3/§4.B): sections, functions, relocations,
//! reference symbols, and mod/patch metadata, plus the query and mutation
//! methods the rest of the core drives. `Context` owns no file I/O; a
//! collaborator (an ELF reader, or [`crate::config::load_symbol_toml`])
//! populates one, [`Context::validate`] checks it, and the driver consumes
//! it read-only save for the statics it appends during recompilation.

use std::collections::HashMap;

use crate::error::ContextError;

use super::function::Function;
use super::ids::{
    DependencyEventId, DependencyId, EventId, FunctionId, ImportId, ReferenceSymbolId, SectionId,
    SectionTarget,
};
use super::reloc::RelocType;
use super::section::Section;
use super::symbol::{
    Callback, Dependency, DependencyEvent, EventSymbol, FunctionReplacement, ImportSymbol,
    ReferenceSymbol,
};

#[derive(Debug, Default)]
pub struct Context {
    pub sections: Vec<Section>,
    pub functions: Vec<Function>,
    pub rom: Vec<u8>,

    /// section -> indices into `functions`
    section_functions: HashMap<u32, Vec<FunctionId>>,
    /// vram -> indices into `functions` (can have more than one candidate,
    /// e.g. when the same address appears in more than one non-relocatable
    /// section of a mod's reference view).
    vram_functions: HashMap<u32, Vec<FunctionId>>,
    name_function: HashMap<String, FunctionId>,

    pub reference_sections: Vec<Section>,
    pub reference_symbols: Vec<ReferenceSymbol>,
    name_reference_symbol: HashMap<String, ReferenceSymbolId>,

    /// BSS section index -> owning (non-BSS) section index.
    bss_to_section: HashMap<u32, SectionId>,

    pub dependencies: Vec<Dependency>,
    name_dependency: HashMap<String, DependencyId>,

    pub imports: Vec<ImportSymbol>,
    pub dependency_events: Vec<DependencyEvent>,
    dependency_event_index: HashMap<(DependencyId, String), DependencyEventId>,
    pub callbacks: Vec<Callback>,
    pub events: Vec<EventSymbol>,
    pub replacements: Vec<FunctionReplacement>,

    pub mod_id: Option<String>,
    pub trace_mode: bool,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- construction -----------------------------------------------

    pub fn add_section(&mut self, section: Section) -> SectionId {
        let id = SectionId(self.sections.len() as u32);
        if let Some(bss) = section.bss_section {
            self.bss_to_section.insert(bss.0, id);
        }
        self.sections.push(section);
        id
    }

    pub fn add_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.section_functions.entry(function.section.0).or_default().push(id);
        self.vram_functions.entry(function.vram).or_default().push(id);
        self.name_function.insert(function.name.clone(), id);
        self.functions.push(function);
        id
    }

    // ---- queries ------------------------------------------------------

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.index())
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.name_function.get(name).copied()
    }

    pub fn functions_in_section(&self, section: SectionId) -> &[FunctionId] {
        self.section_functions.get(&section.0).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn functions_at_vram(&self, vram: u32) -> &[FunctionId] {
        self.vram_functions.get(&vram).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Finds the function that contains `vram` within the given section,
    /// if any. Used by the driver's JAL-target ranking (§4.F.4): an exact
    /// match in the current section is always preferred.
    pub fn function_containing(&self, section: SectionId, vram: u32) -> Option<FunctionId> {
        self.functions_in_section(section)
            .iter()
            .copied()
            .find(|&id| self.functions[id.index()].contains_vram(vram))
    }

    pub fn reference_symbol_by_name(&self, name: &str) -> Option<(SectionId, ReferenceSymbolId)> {
        let id = *self.name_reference_symbol.get(name)?;
        let sym = &self.reference_symbols[id.index()];
        sym.target.section().map(|section| (section, id))
    }

    pub fn dependency_by_name(&self, name: &str) -> Option<DependencyId> {
        self.name_dependency.get(name).copied()
    }

    pub fn owning_section_of_bss(&self, bss: SectionId) -> Option<SectionId> {
        self.bss_to_section.get(&bss.0).copied()
    }

    // ---- mutation (§4.B) ----------------------------------------------

    pub fn add_reference_symbol(
        &mut self,
        name: String,
        target: SectionTarget,
        section_offset: u32,
        is_function: bool,
    ) -> Result<ReferenceSymbolId, ContextError> {
        if self.name_reference_symbol.contains_key(&name) {
            return Err(ContextError::DuplicateReferenceSymbol(name));
        }
        if let SectionTarget::Section(section) = target {
            if self.reference_sections.get(section.index()).is_none() {
                return Err(ContextError::UnknownReferenceSection(section.0));
            }
        }
        let id = ReferenceSymbolId(self.reference_symbols.len() as u32);
        self.reference_symbols.push(ReferenceSymbol {
            name: name.clone(),
            target,
            section_offset,
            is_function,
        });
        self.name_reference_symbol.insert(name, id);
        Ok(id)
    }

    pub fn add_dependency(&mut self, dependency: Dependency) -> Result<DependencyId, ContextError> {
        if self.name_dependency.contains_key(&dependency.id) {
            return Err(ContextError::DuplicateDependency(dependency.id));
        }
        let id = DependencyId(self.dependencies.len() as u32);
        self.name_dependency.insert(dependency.id.clone(), id);
        self.dependencies.push(dependency);
        Ok(id)
    }

    pub fn add_import(&mut self, name: String, dependency: DependencyId) -> Result<ImportId, ContextError> {
        if self.dependencies.get(dependency.index()).is_none() {
            return Err(ContextError::UnknownDependency(dependency.0));
        }
        let id = ImportId(self.imports.len() as u32);
        self.imports.push(ImportSymbol { name, dependency });
        Ok(id)
    }

    pub fn add_event_symbol(&mut self, name: String) -> EventId {
        let id = EventId(self.events.len() as u32);
        self.events.push(EventSymbol { name });
        id
    }

    /// Idempotent: adding the same `(dependency, event)` pair twice returns
    /// the index created the first time, per §4.B.
    pub fn add_dependency_event(
        &mut self,
        dependency: DependencyId,
        name: String,
    ) -> Result<DependencyEventId, ContextError> {
        if self.dependencies.get(dependency.index()).is_none() {
            return Err(ContextError::UnknownDependency(dependency.0));
        }
        let key = (dependency, name.clone());
        if let Some(&existing) = self.dependency_event_index.get(&key) {
            return Ok(existing);
        }
        let id = DependencyEventId(self.dependency_events.len() as u32);
        self.dependency_events.push(DependencyEvent { dependency, name });
        self.dependency_event_index.insert(key, id);
        Ok(id)
    }

    /// Non-idempotent sibling of [`Context::add_dependency_event`]: fails if
    /// the exact `(dependency, event)` pair already exists, for callers that
    /// need to distinguish "first declaration" from "re-declaration".
    pub fn declare_dependency_event(
        &mut self,
        dependency: DependencyId,
        name: String,
    ) -> Result<DependencyEventId, ContextError> {
        let key = (dependency, name.clone());
        if self.dependency_event_index.contains_key(&key) {
            return Err(ContextError::DuplicateDependencyEvent {
                dependency: self.dependencies[dependency.index()].id.clone(),
                event: name,
            });
        }
        self.add_dependency_event(dependency, name)
    }

    pub fn add_callback(&mut self, dependency_event: DependencyEventId, function: FunctionId) {
        self.callbacks.push(Callback { dependency_event, function });
    }

    pub fn set_mod_id(&mut self, id: String) -> Result<(), ContextError> {
        if self.mod_id.as_deref() == Some(id.as_str()) {
            return Err(ContextError::DuplicateModId(id));
        }
        self.mod_id = Some(id);
        Ok(())
    }

    /// Imports another context's reference sections/symbols into this
    /// context's reference view, for patch/mod builds that refer to a host
    /// image's symbols (§4.B).
    pub fn import_reference_view(&mut self, other: &Context) -> Result<(), ContextError> {
        let section_offset = self.reference_sections.len() as u32;
        self.reference_sections.extend(other.reference_sections.iter().cloned());
        for sym in &other.reference_symbols {
            let retargeted = match sym.target {
                SectionTarget::Section(s) => SectionTarget::Section(SectionId(s.0 + section_offset)),
                other => other,
            };
            self.add_reference_symbol(sym.name.clone(), retargeted, sym.section_offset, sym.is_function)?;
        }
        Ok(())
    }

    /// Registers a new [`Function`] discovered indirectly through a JAL
    /// target with no symbol (§4.F.6 statics discovery), returning its id.
    pub fn add_static_function(&mut self, mut function: Function) -> FunctionId {
        function.is_static = true;
        self.add_function(function)
    }

    // ---- validation -----------------------------------------------------

    /// Checks the cross-cutting invariants from §3 after a `Context` has
    /// been fully populated: section alignment, function alignment and
    /// containment, reloc ordering, and HI16/LO16 pairing. This also
    /// rewrites each paired HI16/LO16 so both relocs carry the full 32-bit
    /// addend in `target_section_offset`, per Testable Property 1.
    pub fn validate(&mut self) -> Result<(), ContextError> {
        for (idx, section) in self.sections.iter().enumerate() {
            if section.executable() && section.ram_addr % 4 != 0 {
                return Err(ContextError::MisalignedSection { section: idx as u32, vram: section.ram_addr });
            }
            let mut last = None;
            for reloc in &section.relocs {
                if let Some(prev) = last {
                    if reloc.address < prev {
                        return Err(ContextError::UnsortedRelocs(idx as u32));
                    }
                }
                last = Some(reloc.address);
            }
        }
        for function in &self.functions {
            if function.vram % 4 != 0 || function.rom % 4 != 0 {
                return Err(ContextError::MisalignedFunction(function.vram));
            }
            let section = self
                .sections
                .get(function.section.index())
                .ok_or(ContextError::UnknownSection(function.section.0))?;
            let func_end = function.vram + function.words.len() as u32 * 4;
            if function.vram < section.ram_addr || func_end > section.ram_addr + section.size {
                return Err(ContextError::FunctionOutOfSection { name: function.name.clone() });
            }
        }
        self.pair_hi_lo_relocs()?;
        Ok(())
    }

    fn pair_hi_lo_relocs(&mut self) -> Result<(), ContextError> {
        for section in &mut self.sections {
            if !section.relocatable() {
                continue;
            }
            let mut pending_hi: Option<usize> = None;
            let indices: Vec<usize> = (0..section.relocs.len()).collect();
            for i in indices {
                let is_hi = section.relocs[i].reloc_type == RelocType::Hi16;
                let is_lo = section.relocs[i].reloc_type == RelocType::Lo16;
                if is_hi {
                    pending_hi = Some(i);
                } else if is_lo {
                    match pending_hi.take() {
                        Some(hi_idx) if section.relocs[hi_idx].symbol_index == section.relocs[i].symbol_index => {
                            let lo_addend = section.relocs[i].target_section_offset as i16 as i32;
                            let hi_addend = (section.relocs[hi_idx].target_section_offset as i32) << 16;
                            let full = hi_addend.wrapping_add(lo_addend) as u32;
                            section.relocs[hi_idx].target_section_offset = full;
                            section.relocs[i].target_section_offset = full;
                        }
                        Some(hi_idx) => {
                            log::warn!(
                                "orphaned R_MIPS_LO16 at {:#x} does not match preceding R_MIPS_HI16 at {:#x}; propagating prior addend",
                                section.relocs[i].address,
                                section.relocs[hi_idx].address
                            );
                            section.relocs[i].target_section_offset = section.relocs[hi_idx].target_section_offset;
                        }
                        None => {
                            log::warn!("orphaned R_MIPS_LO16 at {:#x} with no preceding HI16", section.relocs[i].address);
                        }
                    }
                } else {
                    pending_hi = None;
                }
            }
        }
        Ok(())
    }
}
