//! Typed error surfaces for the recompiler core, split along the lines of §7
//! of the design: context/model validation, the mod symbol codec, build
//! configuration parsing, and the per-function recompilation pass.

use thiserror::Error;

/// Errors raised while mutating or validating a [`crate::model::Context`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("duplicate reference symbol name: {0}")]
    DuplicateReferenceSymbol(String),
    #[error("duplicate dependency id: {0}")]
    DuplicateDependency(String),
    #[error("duplicate dependency event {event} for dependency {dependency}")]
    DuplicateDependencyEvent { dependency: String, event: String },
    #[error("unknown reference section index: {0}")]
    UnknownReferenceSection(u32),
    #[error("unknown dependency index: {0}")]
    UnknownDependency(u32),
    #[error("duplicate mod id: {0}")]
    DuplicateModId(String),
    #[error("function index {0} out of bounds")]
    UnknownFunction(u32),
    #[error("section index {0} out of bounds")]
    UnknownSection(u32),
    #[error("section {section} is not 4-byte aligned at vram {vram:#x}")]
    MisalignedSection { section: u32, vram: u32 },
    #[error("function {0:#x} is not 4-byte aligned")]
    MisalignedFunction(u32),
    #[error("function {name} words do not fit inside owning section")]
    FunctionOutOfSection { name: String },
    #[error("relocs in section {0} are not sorted by address")]
    UnsortedRelocs(u32),
    #[error("R_MIPS_HI16 at {0:#x} has no matching R_MIPS_LO16")]
    UnpairedHi16(u32),
}

/// Errors raised while reading the binary mod symbol file format (§4.C, §7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolFileError {
    #[error("not a mod symbol file (bad magic)")]
    NotASymbolFile,
    #[error("unknown mod symbol file version: {0}")]
    UnknownSymbolFileVersion(u32),
    #[error("corrupt mod symbol file: {0}")]
    CorruptSymbolFile(String),
    #[error("function at section offset {section_offset:#x} (size {size:#x}) extends past its section's code blob")]
    FunctionOutOfBounds { section_offset: u32, size: u32 },
}

/// Errors raised while parsing Input 2 / Input 3 TOML documents (§6).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to parse TOML in {path}: {source}")]
    Toml { path: String, #[source] source: toml::de::Error },
    #[error("symbol file vram {vram:#x} is not 4-byte aligned")]
    UnalignedVram { vram: u32 },
    #[error("symbol file rom {rom:#x} is not 4-byte aligned")]
    UnalignedRom { rom: u32 },
    #[error("strict patch mode requires an original image, none configured")]
    PatchWithoutOriginal,
}

/// Failure classification for a single function recompilation attempt (§7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecompileError {
    #[error("unknown opcode {opcode:#x} at {vram:#x}")]
    UnknownOpcode { vram: u32, opcode: u32 },
    #[error("unsupported relocation type {reloc_type} on instruction at {vram:#x}")]
    UnsupportedRelocType { vram: u32, reloc_type: u32 },
    #[error("R_MIPS_HI16 at {0:#x} is unpaired")]
    UnpairedHi16(u32),
    #[error("analyzer failed to classify jr at {0:#x}")]
    AnalysisFailed(u32),
    #[error("jal target {target:#x} at {vram:#x} not found and outside current section")]
    UnresolvedJal { vram: u32, target: u32 },
    #[error("duplicate hook at instruction index {0}")]
    DuplicateHook(usize),
    #[error("function {0} is marked stubbed but has no stub implementation registered")]
    UnknownStub(String),
    #[error("forbidden relocation type {0} may not appear on an instruction")]
    ForbiddenRelocType(u32),
}
