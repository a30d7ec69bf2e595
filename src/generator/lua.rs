//! A minimal scripting-target generator, demonstrating that the interface
//! in §4.E does not presuppose a C-like output: this one emits Lua table
//! assignments instead of `ctx->rN` expressions. Used by modders who want a
//! readable, re-editable dump rather than compiled output.

use super::{Generator, InstructionContext, SwitchCase};
use crate::model::{FunctionId, ReferenceSymbolId, SectionId};
use crate::ops::{BinaryOpDescriptor, BranchDescriptor, StoreOpDescriptor, UnaryOpDescriptor};

pub struct LuaGenerator {
    out: String,
    indent: usize,
}

impl LuaGenerator {
    pub fn new() -> Self {
        LuaGenerator { out: String::new(), indent: 0 }
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

impl Default for LuaGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for LuaGenerator {
    fn emit_function_start(&mut self, name: &str, index: FunctionId) {
        self.line(&format!("function {name}(ctx) -- #{}", index.0));
        self.indent += 1;
    }

    fn emit_function_end(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("end");
    }

    fn emit_label(&mut self, name: &str) {
        self.line(&format!("::{name}::"));
    }

    fn emit_goto(&mut self, target: &str) {
        self.line(&format!("goto {target}"));
    }

    fn emit_comment(&mut self, text: &str) {
        self.line(&format!("-- {text}"));
    }

    fn process_binary_op(&mut self, op: &BinaryOpDescriptor, ctx: &InstructionContext) {
        self.line(&format!("ctx.r[{}] = {:?}(ctx, {})", ctx.rd, op.op, ctx.vram));
    }

    fn process_unary_op(&mut self, op: &UnaryOpDescriptor, ctx: &InstructionContext) {
        self.line(&format!("ctx.r[{}] = {:?}(ctx, {})", ctx.rd, op.op, ctx.vram));
    }

    fn process_store_op(&mut self, op: &StoreOpDescriptor, ctx: &InstructionContext) {
        self.line(&format!("store({:?}, ctx, {})", op.op, ctx.vram));
    }

    fn emit_function_call(&mut self, _ctx: &InstructionContext, function: FunctionId, _name: &str) {
        self.line(&format!("call({})", function.0));
    }

    fn emit_function_call_by_register(&mut self, reg: u32) {
        self.line(&format!("call_register(ctx.r[{reg}])"));
    }

    fn emit_function_call_lookup(&mut self, vram: u32) {
        self.line(&format!("call_lookup(0x{vram:08X})"));
    }

    fn emit_function_call_reference_symbol(
        &mut self,
        _ctx: &InstructionContext,
        section: SectionId,
        symbol_index: ReferenceSymbolId,
        target_offset: u32,
    ) {
        self.line(&format!("call_reference({}, {}, {target_offset})", section.0, symbol_index.0));
    }

    fn emit_return(&mut self, _ctx: &InstructionContext, _function: FunctionId) {
        self.line("return");
    }

    fn emit_branch_condition(&mut self, op: &BranchDescriptor, _ctx: &InstructionContext) {
        self.line(&format!("if {:?}(ctx) then", op.condition));
        self.indent += 1;
    }

    fn emit_branch_close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("end");
    }

    fn emit_jtbl_addend_declaration(&mut self, reg: u32) {
        self.line(&format!("local jtbl_addend = ctx.r[{reg}]"));
    }

    fn emit_switch(&mut self, _ctx: &InstructionContext, table_vram: u32, reg: u32) {
        self.line(&format!("-- switch on ctx.r[{reg}], table 0x{table_vram:08X}"));
    }

    fn emit_case(&mut self, case: SwitchCase) {
        self.line(&format!("if idx == {} then goto L_{:08X} end", case.index, case.target_vram));
    }

    fn emit_switch_error(&mut self, vram: u32, jtbl_vram: u32) {
        self.line(&format!("error(\"bad jump table index at 0x{vram:08X} (table 0x{jtbl_vram:08X})\")"));
    }

    fn emit_switch_close(&mut self) {}

    fn emit_cop0_status_read(&mut self, reg: u32) {
        self.line(&format!("ctx.r[{reg}] = cop0_status()"));
    }

    fn emit_cop0_status_write(&mut self, reg: u32) {
        self.line(&format!("set_cop0_status(ctx.r[{reg}])"));
    }

    fn emit_cop1_cs_read(&mut self, reg: u32) {
        self.line(&format!("ctx.r[{reg}] = cop1_cs()"));
    }

    fn emit_cop1_cs_write(&mut self, reg: u32) {
        self.line(&format!("set_cop1_cs(ctx.r[{reg}])"));
    }

    fn emit_muldiv(&mut self, mnemonic: &str, reg1: u32, reg2: u32) {
        self.line(&format!("{mnemonic}(ctx.r[{reg1}], ctx.r[{reg2}])"));
    }

    fn emit_syscall(&mut self, vram: u32) {
        self.line(&format!("syscall(0x{vram:08X})"));
    }

    fn emit_do_break(&mut self, vram: u32) {
        self.line(&format!("do_break(0x{vram:08X})"));
    }

    fn emit_pause_self(&mut self) {
        self.line("pause_self()");
    }

    fn emit_trigger_event(&mut self, event_index: u32) {
        self.line(&format!("trigger_event({event_index})"));
    }

    fn emit_check_fr(&mut self, fpr: u32) {
        self.line(&format!("check_fr({fpr})"));
    }

    fn emit_check_nan(&mut self, fpr: u32, is_double: bool) {
        self.line(&format!("check_nan({fpr}, {is_double})"));
    }

    fn good(&self) -> bool {
        true
    }
}
