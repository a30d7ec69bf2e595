//! Text-emitting generator (§4.G): produces a C-like source function body
//! operating on a `ctx.rN` / `ctx.fN.{fl,d,u32l,u64}` register file, mirroring
//! the reference runtime's macro names (`ADD32`, `MUL_S`, `do_lwl`, ...) so the
//! emitted text reads like hand-written glue rather than a disassembly dump.

use std::fmt::Write as _;

use super::{Generator, InstructionContext, RelocDescriptor, SwitchCase};
use crate::model::{FunctionId, ReferenceSymbolId, RelocType, SectionId, SectionTarget};
use crate::ops::{
    BinaryOpDescriptor, BinaryOpType, BranchDescriptor, FloatView, FprSlot, GprSlot, OperandSlot, PreOp,
    StoreOpDescriptor, StoreOpType, UnaryOpDescriptor, UnaryOpType,
};

pub struct SourceGenerator {
    out: String,
    indent: usize,
    errored: bool,
}

impl SourceGenerator {
    pub fn new() -> Self {
        SourceGenerator { out: String::new(), indent: 0, errored: false }
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn gpr(&self, slot: GprSlot, ctx: &InstructionContext) -> String {
        match slot {
            GprSlot::Rd => format!("ctx->r{}", ctx.rd),
            GprSlot::Rs => format!("ctx->r{}", ctx.rs),
            GprSlot::Rt => format!("ctx->r{}", ctx.rt),
            GprSlot::Base => format!("ctx->r{}", ctx.rs),
            GprSlot::Zero => "0".to_string(),
        }
    }

    fn fpr(&self, slot: FprSlot, view: FloatView, ctx: &InstructionContext) -> String {
        let idx = match slot {
            FprSlot::Fd => ctx.rd,
            FprSlot::Fs => ctx.rs,
            FprSlot::Ft => ctx.rt,
        };
        match view {
            FloatView::Single => format!("ctx->f{idx}.fl"),
            FloatView::Double => format!("ctx->f{idx}.d"),
            FloatView::RawLo32 => format!("ctx->f{idx}.u32l"),
            FloatView::RawU64 => format!("ctx->f{idx}.u64"),
        }
    }

    fn operand(&self, slot: OperandSlot, ctx: &InstructionContext) -> String {
        match slot {
            OperandSlot::Gpr(g) => self.gpr(g, ctx),
            OperandSlot::Fpr(f, view) => self.fpr(f, view, ctx),
            OperandSlot::ImmU16 | OperandSlot::ImmS16 => self.reloc_operand(ctx).unwrap_or_else(|| match slot {
                OperandSlot::ImmU16 => format!("{}", ctx.imm_u16),
                OperandSlot::ImmS16 => format!("{}", ctx.imm_s16),
                _ => unreachable!(),
            }),
            OperandSlot::Sa => format!("{}", ctx.sa),
            OperandSlot::SaPlus32 => format!("{}", ctx.sa + 32),
            OperandSlot::Cop1Cs => "cop1_cs".to_string(),
            OperandSlot::Hi => "ctx->hi".to_string(),
            OperandSlot::Lo => "ctx->lo".to_string(),
        }
    }

    /// When the instruction carries an unfolded reloc (its target lives in a
    /// relocatable section, so the driver could not inline a concrete
    /// immediate), render a relocated address computation in place of the
    /// raw 16-bit field.
    fn reloc_operand(&self, ctx: &InstructionContext) -> Option<String> {
        let reloc = ctx.reloc.as_ref()?;
        let addend = self.reloc_addend(&ctx.reloc)?;
        Some(match reloc.reloc_type {
            RelocType::Hi16 => format!("RELOC_HI16({addend})"),
            RelocType::Lo16 => format!("RELOC_LO16({addend})"),
            RelocType::None | RelocType::Addr32 | RelocType::Addr26 => addend,
        })
    }

    fn preop(&self, expr: String, pre: PreOp) -> String {
        match pre {
            PreOp::None => expr,
            PreOp::SignExtend32 => format!("(int64_t)(int32_t){expr}"),
            PreOp::ZeroExtend32 => format!("(uint64_t)(uint32_t){expr}"),
        }
    }

    fn set_dest(&mut self, dest: OperandSlot, ctx: &InstructionContext, rhs: String) {
        let dest_text = self.operand(dest, ctx);
        self.line(&format!("{dest_text} = {rhs};"));
    }

    fn reloc_addend(&self, reloc: &Option<RelocDescriptor>) -> Option<String> {
        reloc.as_ref().map(|r| match r.target {
            SectionTarget::Import => format!("IMPORT({})", r.symbol_index.map(|i| i.index()).unwrap_or(0)),
            SectionTarget::Event => format!("EVENT({})", r.symbol_index.map(|i| i.index()).unwrap_or(0)),
            SectionTarget::Absolute => format!("{}", r.target_section_offset),
            SectionTarget::Section(id) => format!("SECTION_{}_BASE + {}", id.0, r.target_section_offset),
        })
    }
}

impl Default for SourceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for SourceGenerator {
    fn emit_function_start(&mut self, name: &str, index: FunctionId) {
        self.line(&format!("RECOMP_FUNC void {name}(uint8_t* rdram, recomp_context* ctx) {{ // {}", index.0));
        self.indent += 1;
    }

    fn emit_function_end(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
        self.line("");
    }

    fn emit_label(&mut self, name: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(&format!("{name}:"));
        self.indent += 1;
    }

    fn emit_goto(&mut self, target: &str) {
        self.line(&format!("goto {target};"));
    }

    fn emit_comment(&mut self, text: &str) {
        self.line(&format!("// {text}"));
    }

    fn process_binary_op(&mut self, op: &BinaryOpDescriptor, ctx: &InstructionContext) {
        if op.check_fr {
            self.emit_check_fr(ctx.rd);
        }
        let lhs = self.preop(self.operand(op.lhs.0, ctx), op.lhs.1);
        let rhs = self.preop(self.operand(op.rhs.0, ctx), op.rhs.1);

        let rhs_expr = match op.op {
            BinaryOpType::Add32 => format!("ADD32({lhs}, {rhs})"),
            BinaryOpType::Sub32 => format!("SUB32({lhs}, {rhs})"),
            BinaryOpType::Add64 => format!("({lhs} + {rhs})"),
            BinaryOpType::Sub64 => format!("({lhs} - {rhs})"),
            BinaryOpType::AddFloat => format!("ADD_S({lhs}, {rhs})"),
            BinaryOpType::SubFloat => format!("SUB_S({lhs}, {rhs})"),
            BinaryOpType::MulFloat => format!("MUL_S({lhs}, {rhs})"),
            BinaryOpType::DivFloat => format!("DIV_S({lhs}, {rhs})"),
            BinaryOpType::AddDouble => format!("ADD_D({lhs}, {rhs})"),
            BinaryOpType::SubDouble => format!("SUB_D({lhs}, {rhs})"),
            BinaryOpType::MulDouble => format!("MUL_D({lhs}, {rhs})"),
            BinaryOpType::DivDouble => format!("DIV_D({lhs}, {rhs})"),
            BinaryOpType::And64 => format!("({lhs} & {rhs})"),
            BinaryOpType::Or64 => format!("({lhs} | {rhs})"),
            BinaryOpType::Nor64 => format!("(~({lhs} | {rhs}))"),
            BinaryOpType::Xor64 => format!("({lhs} ^ {rhs})"),
            BinaryOpType::Sll32 => format!("S32({lhs} << ({rhs} & 31))"),
            BinaryOpType::Srl32 => format!("S32((uint32_t){lhs} >> ({rhs} & 31))"),
            BinaryOpType::Sra32 => format!("S32({lhs} >> ({rhs} & 31))"),
            BinaryOpType::Sll64 => format!("({lhs} << ({rhs} & 63))"),
            BinaryOpType::Srl64 => format!("((uint64_t){lhs} >> ({rhs} & 63))"),
            BinaryOpType::Sra64 => format!("({lhs} >> ({rhs} & 63))"),
            BinaryOpType::Eq => format!("({lhs} == {rhs}) ? 1 : 0"),
            BinaryOpType::Ne => format!("({lhs} != {rhs}) ? 1 : 0"),
            BinaryOpType::Lt => format!("({lhs} < {rhs}) ? 1 : 0"),
            BinaryOpType::Ltu => format!("((uint64_t){lhs} < (uint64_t){rhs}) ? 1 : 0"),
            BinaryOpType::Le => format!("({lhs} <= {rhs}) ? 1 : 0"),
            BinaryOpType::Gt => format!("({lhs} > {rhs}) ? 1 : 0"),
            BinaryOpType::Ge => format!("({lhs} >= {rhs}) ? 1 : 0"),
            BinaryOpType::EqFloat | BinaryOpType::EqDouble => format!("({lhs} == {rhs}) ? 1 : 0"),
            BinaryOpType::NeFloat | BinaryOpType::NeDouble => format!("({lhs} != {rhs}) ? 1 : 0"),
            BinaryOpType::LtFloat | BinaryOpType::LtDouble => format!("({lhs} < {rhs}) ? 1 : 0"),
            BinaryOpType::LeFloat | BinaryOpType::LeDouble => format!("({lhs} <= {rhs}) ? 1 : 0"),
            BinaryOpType::GtFloat | BinaryOpType::GtDouble => format!("({lhs} > {rhs}) ? 1 : 0"),
            BinaryOpType::GeFloat | BinaryOpType::GeDouble => format!("({lhs} >= {rhs}) ? 1 : 0"),
            BinaryOpType::Ld => format!("MEM_D({rhs}, {lhs})"),
            BinaryOpType::Lw => format!("MEM_W({rhs}, {lhs})"),
            BinaryOpType::Lwu => format!("MEM_WU({rhs}, {lhs})"),
            BinaryOpType::Lh => format!("MEM_H({rhs}, {lhs})"),
            BinaryOpType::Lhu => format!("MEM_HU({rhs}, {lhs})"),
            BinaryOpType::Lb => format!("MEM_B({rhs}, {lhs})"),
            BinaryOpType::Lbu => format!("MEM_BU({rhs}, {lhs})"),
            BinaryOpType::Ldl => format!("do_ldl({rhs}, {lhs}, {lhs})"),
            BinaryOpType::Ldr => format!("do_ldr({rhs}, {lhs}, {lhs})"),
            BinaryOpType::Lwl => format!("do_lwl({rhs}, {lhs}, (uint32_t){lhs})"),
            BinaryOpType::Lwr => format!("do_lwr({rhs}, {lhs}, (uint32_t){lhs})"),
            BinaryOpType::True => "1".to_string(),
            BinaryOpType::False => "0".to_string(),
        };
        self.set_dest(op.dest, ctx, rhs_expr);
        if op.check_nan {
            self.emit_check_nan(ctx.rd, matches!(op.op, BinaryOpType::AddDouble | BinaryOpType::SubDouble | BinaryOpType::MulDouble | BinaryOpType::DivDouble));
        }
    }

    fn process_unary_op(&mut self, op: &UnaryOpDescriptor, ctx: &InstructionContext) {
        if op.check_fr {
            self.emit_check_fr(ctx.rs);
        }
        let src = self.operand(op.src, ctx);
        let expr = match op.op {
            UnaryOpType::CastS32 => format!("(int32_t){src}"),
            UnaryOpType::CastU32 => format!("(uint32_t){src}"),
            UnaryOpType::CastS64 => format!("(int64_t){src}"),
            UnaryOpType::CastU64 => format!("(uint64_t){src}"),
            UnaryOpType::Lui => format!("S32({src} << 16)"),
            UnaryOpType::CvtSW => format!("CVT_S_W({src})"),
            UnaryOpType::CvtDW => format!("CVT_D_W({src})"),
            UnaryOpType::CvtSL => format!("CVT_S_L({src})"),
            UnaryOpType::CvtDL => format!("CVT_D_L({src})"),
            UnaryOpType::CvtWS => format!("CVT_W_S({src})"),
            UnaryOpType::CvtWD => format!("CVT_W_D({src})"),
            UnaryOpType::CvtLS => format!("CVT_L_S({src})"),
            UnaryOpType::CvtLD => format!("CVT_L_D({src})"),
            UnaryOpType::CvtSD => format!("CVT_S_D({src})"),
            UnaryOpType::CvtDS => format!("CVT_D_S({src})"),
            UnaryOpType::RoundWS => format!("lround({src})"),
            UnaryOpType::RoundWD => format!("lround({src})"),
            UnaryOpType::TruncWS => format!("(int32_t)trunc_s({src})"),
            UnaryOpType::TruncWD => format!("(int32_t)trunc_d({src})"),
            UnaryOpType::CeilWS => format!("(int32_t)ceil({src})"),
            UnaryOpType::CeilWD => format!("(int32_t)ceil({src})"),
            UnaryOpType::FloorWS => format!("(int32_t)floor({src})"),
            UnaryOpType::FloorWD => format!("(int32_t)floor({src})"),
            UnaryOpType::NegFloat | UnaryOpType::NegDouble => format!("-{src}"),
            UnaryOpType::AbsFloat | UnaryOpType::AbsDouble => format!("fabs({src})"),
            UnaryOpType::SqrtFloat | UnaryOpType::SqrtDouble => format!("sqrt({src})"),
            UnaryOpType::MoveFromHi | UnaryOpType::MoveFromLo => src,
        };
        self.set_dest(op.dest, ctx, expr);
        if op.check_nan {
            self.emit_check_nan(ctx.rd, matches!(op.op, UnaryOpType::CvtDW | UnaryOpType::CvtDL | UnaryOpType::CvtDS | UnaryOpType::NegDouble | UnaryOpType::AbsDouble | UnaryOpType::SqrtDouble));
        }
    }

    fn process_store_op(&mut self, op: &StoreOpDescriptor, ctx: &InstructionContext) {
        let base = self.operand(op.base, ctx);
        let offset = self.operand(op.offset, ctx);
        let value = self.operand(op.value, ctx);
        let call = match op.op {
            StoreOpType::Sd => format!("MEM_D({base}, {offset}) = {value};"),
            StoreOpType::Sdl => format!("do_sdl({base}, {offset}, {value});"),
            StoreOpType::Sdr => format!("do_sdr({base}, {offset}, {value});"),
            StoreOpType::Sw => format!("MEM_W({base}, {offset}) = (uint32_t){value};"),
            StoreOpType::Swl => format!("do_swl({base}, {offset}, (uint32_t){value});"),
            StoreOpType::Swr => format!("do_swr({base}, {offset}, (uint32_t){value});"),
            StoreOpType::Sh => format!("MEM_H({base}, {offset}) = (uint16_t){value};"),
            StoreOpType::Sb => format!("MEM_B({base}, {offset}) = (uint8_t){value};"),
            StoreOpType::Sdc1 => format!("MEM_D({base}, {offset}) = {value};"),
            StoreOpType::Swc1 => format!("MEM_W({base}, {offset}) = {value};"),
        };
        self.line(&call);
    }

    fn emit_function_call(&mut self, _ctx: &InstructionContext, _function: FunctionId, name: &str) {
        self.line(&format!("{name}(rdram, ctx);"));
    }

    fn emit_function_call_by_register(&mut self, reg: u32) {
        self.line(&format!("LOOKUP_FUNC(ctx->r{reg})(rdram, ctx);"));
    }

    fn emit_function_call_lookup(&mut self, vram: u32) {
        self.line(&format!("LOOKUP_FUNC(0x{vram:08X})(rdram, ctx);"));
    }

    fn emit_function_call_reference_symbol(
        &mut self,
        _ctx: &InstructionContext,
        section: SectionId,
        symbol_index: ReferenceSymbolId,
        target_offset: u32,
    ) {
        self.line(&format!("REFERENCE_SYMBOL_FUNC({}, {}, {target_offset})(rdram, ctx);", section.0, symbol_index.0));
    }

    fn emit_return(&mut self, _ctx: &InstructionContext, _function: FunctionId) {
        self.line("return;");
    }

    fn emit_branch_condition(&mut self, op: &BranchDescriptor, ctx: &InstructionContext) {
        let lhs = self.operand(op.lhs, ctx);
        let rhs = self.operand(op.rhs, ctx);
        let cmp = match op.condition {
            BinaryOpType::Eq => "==",
            BinaryOpType::Ne => "!=",
            BinaryOpType::Lt => "<",
            BinaryOpType::Le => "<=",
            BinaryOpType::Gt => ">",
            BinaryOpType::Ge => ">=",
            _ => "==",
        };
        self.line(&format!("if ({lhs} {cmp} {rhs}) {{"));
        self.indent += 1;
    }

    fn emit_branch_close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }

    fn emit_jtbl_addend_declaration(&mut self, reg: u32) {
        self.line(&format!("int32_t jtbl_addend = (int32_t)ctx->r{reg};"));
    }

    fn emit_switch(&mut self, _ctx: &InstructionContext, table_vram: u32, reg: u32) {
        self.line(&format!("switch (ctx->r{reg}) {{ // jtbl_0x{table_vram:08X}"));
        self.indent += 1;
    }

    fn emit_case(&mut self, case: SwitchCase) {
        self.line(&format!("case {}: goto L_{:08X};", case.index, case.target_vram));
    }

    fn emit_switch_error(&mut self, vram: u32, jtbl_vram: u32) {
        self.line(&format!("default: RECOMP_UNREACHABLE(\"jump table at 0x{jtbl_vram:08X} indexed out of range at 0x{vram:08X}\");"));
    }

    fn emit_switch_close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }

    fn emit_cop0_status_read(&mut self, reg: u32) {
        self.line(&format!("ctx->r{reg} = cop0_status_read();"));
    }

    fn emit_cop0_status_write(&mut self, reg: u32) {
        self.line(&format!("cop0_status_write(ctx->r{reg});"));
    }

    fn emit_cop1_cs_read(&mut self, reg: u32) {
        self.line(&format!("ctx->r{reg} = rdram_read32(rdram, cop1_cs_address());"));
    }

    fn emit_cop1_cs_write(&mut self, reg: u32) {
        self.line(&format!("cop1_cs_write(ctx->r{reg});"));
    }

    fn emit_muldiv(&mut self, mnemonic: &str, reg1: u32, reg2: u32) {
        self.line(&format!("{}(ctx->r{reg1}, ctx->r{reg2}, &ctx->lo, &ctx->hi);", mnemonic.to_uppercase()));
    }

    fn emit_syscall(&mut self, vram: u32) {
        self.line(&format!("do_syscall(rdram, ctx, 0x{vram:08X});"));
    }

    fn emit_do_break(&mut self, vram: u32) {
        self.line(&format!("do_break(0x{vram:08X});"));
    }

    fn emit_pause_self(&mut self) {
        self.line("pause_self(rdram);");
    }

    fn emit_trigger_event(&mut self, event_index: u32) {
        self.line(&format!("recomp_trigger_event(rdram, ctx, {event_index});"));
    }

    fn emit_check_fr(&mut self, fpr: u32) {
        self.line(&format!("CHECK_FR(ctx, {fpr});"));
    }

    fn emit_check_nan(&mut self, fpr: u32, is_double: bool) {
        let suffix = if is_double { "D" } else { "S" };
        self.line(&format!("NAN_CHECK_{suffix}(ctx->f{fpr});"));
    }

    fn good(&self) -> bool {
        !self.errored
    }
}

/// Helper for tests and the driver to quickly render a single formatted line
/// without going through the whole `Generator` state machine, mirroring how
/// the reference source backend stitches a preamble above the function body.
pub fn render_preamble(recomp_include: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "#include \"{recomp_include}\"");
    out
}
