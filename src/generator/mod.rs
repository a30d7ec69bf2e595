//! The generator interface (§4.E): a capability set the driver calls into.
//! Source, JIT, and Lua generators all fulfill the same contract so the
//! driver stays generic over which one is in play.

pub mod jit;
pub mod lua;
pub mod overlay;
pub mod source;

pub use jit::JitGenerator;
pub use lua::LuaGenerator;
pub use source::SourceGenerator;

use crate::model::{FunctionId, ReferenceSymbolId, RelocType, SectionId, SectionTarget};
use crate::ops::{BinaryOpDescriptor, BranchDescriptor, StoreOpDescriptor, UnaryOpDescriptor};

/// The reloc, if any, carried by the instruction currently being emitted.
/// Relocs to non-relocatable reference sections are folded by the driver
/// before this point and never appear here; only relocatable-section and
/// reference/import/event relocs survive to reach a generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocDescriptor {
    pub reloc_type: RelocType,
    pub target: SectionTarget,
    pub target_section_offset: u32,
    pub symbol_index: Option<ReferenceSymbolId>,
}

/// Decoded operand fields for the instruction currently being emitted, plus
/// its reloc descriptor, passed to every `process_*`/`emit_branch_condition`
/// call.
#[derive(Debug, Clone, Default)]
pub struct InstructionContext {
    pub vram: u32,
    pub rd: u32,
    pub rs: u32,
    pub rt: u32,
    pub sa: u32,
    pub imm_u16: u16,
    pub imm_s16: i16,
    pub reloc: Option<RelocDescriptor>,
}

/// A jump-table entry resolved by the analyzer, ready for
/// `Generator::emit_case`.
#[derive(Debug, Clone, Copy)]
pub struct SwitchCase {
    pub index: usize,
    pub target_vram: u32,
}

/// The capability set the driver drives per function. Implementors may
/// track internal "errored" state and surface it through
/// [`Generator::good`]; the driver keeps compiling but will not ask a
/// caller to use an errored generator's output.
pub trait Generator {
    // --- structural -----------------------------------------------------
    fn emit_function_start(&mut self, name: &str, index: FunctionId);
    fn emit_function_end(&mut self);
    fn emit_label(&mut self, name: &str);
    fn emit_goto(&mut self, target: &str);
    fn emit_comment(&mut self, text: &str);

    // --- instruction emission --------------------------------------------
    fn process_binary_op(&mut self, op: &BinaryOpDescriptor, ctx: &InstructionContext);
    fn process_unary_op(&mut self, op: &UnaryOpDescriptor, ctx: &InstructionContext);
    fn process_store_op(&mut self, op: &StoreOpDescriptor, ctx: &InstructionContext);

    // --- call / return ----------------------------------------------------
    fn emit_function_call(&mut self, ctx: &InstructionContext, function: FunctionId, name: &str);
    fn emit_function_call_by_register(&mut self, reg: u32);
    fn emit_function_call_lookup(&mut self, vram: u32);
    fn emit_function_call_reference_symbol(
        &mut self,
        ctx: &InstructionContext,
        section: SectionId,
        symbol_index: ReferenceSymbolId,
        target_offset: u32,
    );
    fn emit_return(&mut self, ctx: &InstructionContext, function: FunctionId);

    // --- control flow -----------------------------------------------------
    fn emit_branch_condition(&mut self, op: &BranchDescriptor, ctx: &InstructionContext);
    fn emit_branch_close(&mut self);
    fn emit_jtbl_addend_declaration(&mut self, reg: u32);
    fn emit_switch(&mut self, ctx: &InstructionContext, table_vram: u32, reg: u32);
    fn emit_case(&mut self, case: SwitchCase);
    fn emit_switch_error(&mut self, vram: u32, jtbl_vram: u32);
    fn emit_switch_close(&mut self);

    // --- special ---------------------------------------------------------
    fn emit_cop0_status_read(&mut self, reg: u32);
    fn emit_cop0_status_write(&mut self, reg: u32);
    fn emit_cop1_cs_read(&mut self, reg: u32);
    fn emit_cop1_cs_write(&mut self, reg: u32);
    fn emit_muldiv(&mut self, mnemonic: &str, reg1: u32, reg2: u32);
    fn emit_syscall(&mut self, vram: u32);
    fn emit_do_break(&mut self, vram: u32);
    fn emit_pause_self(&mut self);
    fn emit_trigger_event(&mut self, event_index: u32);
    fn emit_check_fr(&mut self, fpr: u32);
    fn emit_check_nan(&mut self, fpr: u32, is_double: bool);

    /// False once this generator has hit an operation it cannot support;
    /// the driver may keep calling into it to collect further diagnostics,
    /// but the output must not be used.
    fn good(&self) -> bool;
}
