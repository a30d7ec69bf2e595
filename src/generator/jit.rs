//! Native-code generator (§4.H). Control flow — gotos, branches, calls,
//! switch dispatch — is assembled directly; the data operations themselves
//! are lowered to calls into a small table of runtime helpers keyed by the
//! op descriptor's discriminant, the same way the source generator reuses a
//! fixed macro name per op. This keeps the assembler itself tiny while still
//! emitting real, patchable native control flow.

use std::collections::HashMap;

use memmap2::{Mmap, MmapMut};

use super::{Generator, InstructionContext, SwitchCase};
use crate::model::{FunctionId, ImportId, ReferenceSymbolId, SectionId};
use crate::ops::{BinaryOpDescriptor, BranchDescriptor, StoreOpDescriptor, UnaryOpDescriptor};

mod asm;
use asm::{Assembler, Label};

/// What a patched reference-symbol/import call site needs resolved once the
/// loader knows the real target address.
#[derive(Debug, Clone)]
pub enum PendingExternalJump {
    ReferenceSymbol { section: SectionId, symbol_index: ReferenceSymbolId, target_offset: u32, code_offset: usize },
    Import { import: ImportId, code_offset: usize },
}

struct PendingSwitch {
    labels: Vec<String>,
    entries_index: usize,
}

/// Bookkeeping carried across one compiled batch of functions (§4.H).
#[derive(Default)]
struct LiveGeneratorContext {
    labels: HashMap<String, Label>,
    pending_forward_jumps: HashMap<String, Vec<usize>>,
    function_labels: HashMap<FunctionId, Label>,
    pending_calls: Vec<(FunctionId, usize)>,
    pending_switches: Vec<PendingSwitch>,
    switch_entry_storage: Vec<Vec<u32>>,
    pending_switch_errors: Vec<(usize, u32, u32)>,
    pending_reference_jumps: Vec<(SectionId, ReferenceSymbolId, u32, usize)>,
    pending_import_jumps: HashMap<ImportId, Vec<usize>>,
}

/// Owns everything a compiled batch's code depends on at runtime: the
/// executable code, every stable-address switch table, the per-function
/// entry points, and the unresolved external jump list. Dropping this tears
/// the executable mapping down; moving it keeps every address valid.
pub struct LiveGeneratorOutput {
    pub code: Mmap,
    pub entry_points: HashMap<FunctionId, usize>,
    pub switch_tables: Vec<Vec<u32>>,
    pub pending_external_jumps: Vec<PendingExternalJump>,
}

pub struct JitGenerator {
    asm: Assembler,
    live: LiveGeneratorContext,
    current_function: Option<FunctionId>,
    errored: bool,
}

impl JitGenerator {
    pub fn new() -> Self {
        JitGenerator { asm: Assembler::new(), live: LiveGeneratorContext::default(), current_function: None, errored: false }
    }

    fn label_for(&mut self, name: &str) -> Label {
        *self.live.labels.entry(name.to_string()).or_insert_with(|| self.asm.new_label())
    }

    /// Calls into the shared runtime helper dispatcher for a data operation,
    /// passing the op's discriminant as an immediate so one trampoline
    /// covers every `BinaryOpType`/`UnaryOpType`/`StoreOpType`.
    fn call_helper(&mut self, op_code: u32, ctx_vram: u32) {
        self.asm.mov_edi_imm32(op_code);
        self.asm.mov_esi_imm32(ctx_vram);
        self.asm.call_helper_dispatch();
    }

    /// Finishes the current batch: emits the switch-error trampoline,
    /// assembles, resolves every label and pending jump, and hands back an
    /// owned, executable [`LiveGeneratorOutput`].
    pub fn finish(mut self) -> std::io::Result<LiveGeneratorOutput> {
        let error_trampoline = self.asm.new_label();
        self.asm.bind_label(error_trampoline);
        self.asm.call_switch_error_hook();
        self.asm.ret();

        for (patch_offset, vram, jtbl_vram) in &self.live.pending_switch_errors {
            self.asm.patch_rel32_to_label(*patch_offset, error_trampoline);
            let _ = (vram, jtbl_vram);
        }

        let code_bytes = self.asm.finalize();

        let mut mmap = MmapMut::map_anon(code_bytes.len().max(1))?;
        mmap[..code_bytes.len()].copy_from_slice(&code_bytes);
        let code = mmap.make_exec()?;

        let mut entry_points = HashMap::new();
        for (function, label) in &self.live.function_labels {
            entry_points.insert(*function, self.asm.resolve_label(*label));
        }

        let mut switch_tables = self.live.switch_entry_storage;
        for pending in &self.live.pending_switches {
            let table = &mut switch_tables[pending.entries_index];
            for (i, label_name) in pending.labels.iter().enumerate() {
                if let Some(label) = self.live.labels.get(label_name) {
                    table[i] = self.asm.resolve_label(*label) as u32;
                }
            }
        }

        let mut pending_external_jumps = Vec::new();
        for (section, symbol_index, target_offset, code_offset) in self.live.pending_reference_jumps {
            pending_external_jumps.push(PendingExternalJump::ReferenceSymbol {
                section,
                symbol_index,
                target_offset,
                code_offset,
            });
        }
        for (import, offsets) in self.live.pending_import_jumps {
            for code_offset in offsets {
                pending_external_jumps.push(PendingExternalJump::Import { import, code_offset });
            }
        }

        Ok(LiveGeneratorOutput { code, entry_points, switch_tables, pending_external_jumps })
    }
}

impl Default for JitGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for JitGenerator {
    fn emit_function_start(&mut self, _name: &str, index: FunctionId) {
        let label = self.asm.new_label();
        self.asm.bind_label(label);
        self.live.function_labels.insert(index, label);
        self.current_function = Some(index);
    }

    fn emit_function_end(&mut self) {
        self.asm.ret();
        self.current_function = None;
    }

    fn emit_label(&mut self, name: &str) {
        let label = self.label_for(name);
        self.asm.bind_label(label);
    }

    fn emit_goto(&mut self, target: &str) {
        let label = self.label_for(target);
        self.asm.jmp(label);
    }

    fn emit_comment(&mut self, _text: &str) {}

    fn process_binary_op(&mut self, op: &BinaryOpDescriptor, ctx: &InstructionContext) {
        self.call_helper(op.op as u32, ctx.vram);
    }

    fn process_unary_op(&mut self, op: &UnaryOpDescriptor, ctx: &InstructionContext) {
        self.call_helper(op.op as u32, ctx.vram);
    }

    fn process_store_op(&mut self, op: &StoreOpDescriptor, ctx: &InstructionContext) {
        self.call_helper(op.op as u32, ctx.vram);
    }

    fn emit_function_call(&mut self, _ctx: &InstructionContext, function: FunctionId, _name: &str) {
        let offset = self.asm.call_placeholder();
        self.live.pending_calls.push((function, offset));
    }

    fn emit_function_call_by_register(&mut self, reg: u32) {
        self.asm.call_indirect_via_pinned_reg(reg);
    }

    fn emit_function_call_lookup(&mut self, vram: u32) {
        self.asm.mov_edi_imm32(vram);
        self.asm.call_lookup_hook();
    }

    fn emit_function_call_reference_symbol(
        &mut self,
        _ctx: &InstructionContext,
        section: SectionId,
        symbol_index: ReferenceSymbolId,
        target_offset: u32,
    ) {
        let offset = self.asm.call_placeholder();
        self.live.pending_reference_jumps.push((section, symbol_index, target_offset, offset));
    }

    fn emit_return(&mut self, _ctx: &InstructionContext, _function: FunctionId) {
        self.asm.ret();
    }

    fn emit_branch_condition(&mut self, op: &BranchDescriptor, ctx: &InstructionContext) {
        self.call_helper(op.condition as u32, ctx.vram);
        self.asm.test_al_and_jz_placeholder();
    }

    fn emit_branch_close(&mut self) {
        self.asm.bind_pending_jz();
    }

    fn emit_jtbl_addend_declaration(&mut self, reg: u32) {
        self.asm.pin_jtbl_addend(reg);
    }

    fn emit_switch(&mut self, _ctx: &InstructionContext, _table_vram: u32, reg: u32) {
        self.live.switch_entry_storage.push(Vec::new());
        self.live.pending_switches.push(PendingSwitch { labels: Vec::new(), entries_index: self.live.switch_entry_storage.len() - 1 });
        self.asm.switch_dispatch_via_table(reg);
    }

    fn emit_case(&mut self, case: SwitchCase) {
        let label_name = format!("L_{:08X}", case.target_vram);
        self.label_for(&label_name);
        if let Some(pending) = self.live.pending_switches.last_mut() {
            pending.labels.push(label_name);
            self.live.switch_entry_storage[pending.entries_index].push(0);
        }
        let _ = case.index;
    }

    fn emit_switch_error(&mut self, vram: u32, jtbl_vram: u32) {
        let offset = self.asm.call_placeholder();
        self.live.pending_switch_errors.push((offset, vram, jtbl_vram));
    }

    fn emit_switch_close(&mut self) {}

    fn emit_cop0_status_read(&mut self, reg: u32) {
        self.asm.cop0_status_read(reg);
    }

    fn emit_cop0_status_write(&mut self, reg: u32) {
        self.asm.cop0_status_write(reg);
    }

    fn emit_cop1_cs_read(&mut self, reg: u32) {
        self.asm.cop1_cs_read(reg);
    }

    fn emit_cop1_cs_write(&mut self, reg: u32) {
        self.asm.cop1_cs_write(reg);
    }

    fn emit_muldiv(&mut self, _mnemonic: &str, reg1: u32, reg2: u32) {
        self.asm.mov_edi_imm32(reg1);
        self.asm.mov_esi_imm32(reg2);
        self.asm.call_muldiv_hook();
    }

    fn emit_syscall(&mut self, vram: u32) {
        self.asm.mov_edi_imm32(vram);
        self.asm.call_syscall_hook();
    }

    fn emit_do_break(&mut self, vram: u32) {
        self.asm.mov_edi_imm32(vram);
        self.asm.call_break_hook();
    }

    fn emit_pause_self(&mut self) {
        self.asm.call_pause_hook();
    }

    fn emit_trigger_event(&mut self, event_index: u32) {
        self.asm.mov_edi_imm32(event_index);
        self.asm.call_trigger_event_hook();
    }

    fn emit_check_fr(&mut self, fpr: u32) {
        self.asm.mov_edi_imm32(fpr);
        self.asm.call_check_fr_hook();
    }

    fn emit_check_nan(&mut self, fpr: u32, is_double: bool) {
        self.asm.mov_edi_imm32(fpr);
        self.asm.mov_esi_imm32(is_double as u32);
        self.asm.call_check_nan_hook();
    }

    fn good(&self) -> bool {
        !self.errored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finishes_a_trivial_function_to_executable_memory() {
        let mut gen = JitGenerator::new();
        gen.emit_function_start("my_func", FunctionId(0));
        gen.emit_return(&InstructionContext::default(), FunctionId(0));
        gen.emit_function_end();

        let output = gen.finish().expect("assembling a trivial function must succeed");
        assert!(output.entry_points.contains_key(&FunctionId(0)));
        assert!(!output.code.is_empty());
    }
}
