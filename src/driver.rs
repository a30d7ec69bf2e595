//! The recompiler driver (§4.F): walks each function twice — once through
//! the analyzer to recover jump tables and label addresses, once to emit —
//! and discovers + recompiles "static" functions the analyzer's JAL
//! resolution uncovers along the way.

use std::collections::{BTreeSet, HashSet};

use log::warn;

use crate::analysis::{self, AnalysisResult};
use crate::decode::{cop_funct, opcode, special_funct, Instruction};
use crate::error::RecompileError;
use crate::generator::{Generator, InstructionContext, RelocDescriptor, SwitchCase};
use crate::model::{Context, Function, FunctionId, Reloc, RelocType, SectionId, SectionTarget};
use crate::ops::{binary_op_for_instruction, branch_op_for_instruction, store_op_for_instruction, unary_op_for_instruction, BinaryOpDescriptor, BinaryOpType, GprSlot, OperandSlot, PreOp};

#[derive(Debug, Default)]
pub struct RecompileReport {
    pub compiled: Vec<FunctionId>,
    pub failures: Vec<(FunctionId, RecompileError)>,
}

impl RecompileReport {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives a full batch: every existing function, then every static function
/// the batch discovers, until the worklist empties.
pub fn recompile_context<G: Generator>(ctx: &mut Context, mut new_generator: impl FnMut() -> G) -> (RecompileReport, Vec<(FunctionId, G)>) {
    let mut report = RecompileReport::default();
    let mut outputs = Vec::new();
    let mut statics_worklist: Vec<(SectionId, u32)> = Vec::new();

    let mut pending: Vec<FunctionId> = (0..ctx.functions.len() as u32).map(FunctionId).collect();
    let mut processed: HashSet<FunctionId> = HashSet::new();

    loop {
        while let Some(function_id) = pending.pop() {
            if !processed.insert(function_id) {
                continue;
            }
            let mut generator = new_generator();
            match recompile_function(ctx, function_id, &mut generator, &mut statics_worklist) {
                Ok(()) => report.compiled.push(function_id),
                Err(e) => report.failures.push((function_id, e)),
            }
            outputs.push((function_id, generator));
        }

        let Some((section_id, vram)) = statics_worklist.pop() else { break };
        let new_id = synthesize_static_function(ctx, section_id, vram);
        pending.push(new_id);
    }

    (report, outputs)
}

fn synthesize_static_function(ctx: &mut Context, section_id: SectionId, vram: u32) -> FunctionId {
    let section = ctx.section(section_id).expect("static target section must exist");
    let section_end = section.ram_addr + section.size;

    let mut next_boundaries: Vec<u32> = ctx
        .functions_in_section(section_id)
        .iter()
        .map(|f| ctx.function(*f).expect("function id from section index must be valid").vram)
        .filter(|&v| v > vram)
        .collect();
    next_boundaries.push(section_end);
    let end = next_boundaries.into_iter().min().unwrap_or(section_end);
    let len_words = ((end.saturating_sub(vram)) / 4) as usize;

    let rom = if section.rom_present() { section.rom_offset + (vram - section.ram_addr) } else { crate::model::ROM_NOT_PRESENT };
    let words = read_words_from_rom(&ctx.rom, rom, len_words);

    let name = Function::static_name(&section.name, vram);
    ctx.add_static_function(Function {
        name,
        vram,
        rom,
        words,
        section: section_id,
        flags: Default::default(),
        hooks: Default::default(),
        is_static: true,
    })
}

fn read_words_from_rom(rom: &[u8], rom_offset: u32, len_words: usize) -> Vec<u32> {
    let mut words = Vec::with_capacity(len_words);
    for i in 0..len_words {
        let start = rom_offset as usize + i * 4;
        let word = rom.get(start..start + 4).map(|b| u32::from_be_bytes(b.try_into().unwrap())).unwrap_or(0);
        words.push(word);
    }
    words
}

enum JalResolution {
    Direct(FunctionId),
    CallByLookup,
    CreateStatic,
    HardError,
}

fn resolve_jal_target(ctx: &Context, current_section: SectionId, target: u32) -> JalResolution {
    let matches = ctx.functions_at_vram(target);
    if matches.is_empty() {
        let section = ctx.section(current_section).expect("current section must exist");
        return if section.contains_vram(target) { JalResolution::CreateStatic } else { JalResolution::HardError };
    }
    let same_section: Vec<FunctionId> = matches.iter().copied().filter(|f| ctx.function(*f).unwrap().section == current_section).collect();
    if same_section.len() == 1 {
        return JalResolution::Direct(same_section[0]);
    }
    if matches.len() == 1 {
        return JalResolution::Direct(matches[0]);
    }
    let non_relocatable: Vec<FunctionId> = matches
        .iter()
        .copied()
        .filter(|f| {
            let func = ctx.function(*f).unwrap();
            !ctx.section(func.section).map(|s| s.relocatable()).unwrap_or(true)
        })
        .collect();
    if non_relocatable.len() == 1 {
        JalResolution::Direct(non_relocatable[0])
    } else {
        JalResolution::CallByLookup
    }
}

/// Resolves a reloc against a known, non-relocatable target address so the
/// driver can fold it into the instruction's immediate instead of passing a
/// descriptor through to the generator (§4.F.5).
fn resolve_foldable_reloc_addr(ctx: &Context, reloc: &Reloc) -> Option<u32> {
    match reloc.target {
        SectionTarget::Absolute => Some(reloc.target_section_offset),
        SectionTarget::Section(id) => {
            let section = if reloc.reference_symbol { ctx.reference_sections.get(id.index())? } else { ctx.sections.get(id.index())? };
            if section.relocatable() {
                None
            } else {
                Some(section.ram_addr + reloc.target_section_offset)
            }
        }
        SectionTarget::Import | SectionTarget::Event => None,
    }
}

fn immediate_descriptor(opc: u32) -> Option<BinaryOpDescriptor> {
    let rt = OperandSlot::Gpr(GprSlot::Rt);
    let rs = OperandSlot::Gpr(GprSlot::Rs);
    let desc = |op, rhs, mnemonic| BinaryOpDescriptor {
        op,
        dest: rt,
        lhs: (rs, PreOp::None),
        rhs: (rhs, PreOp::None),
        check_fr: false,
        check_nan: false,
        mnemonic,
    };
    match opc {
        opcode::ADDIU => Some(desc(BinaryOpType::Add32, OperandSlot::ImmS16, "addiu")),
        opcode::ADDI => Some(desc(BinaryOpType::Add32, OperandSlot::ImmS16, "addi")),
        opcode::ANDI => Some(desc(BinaryOpType::And64, OperandSlot::ImmU16, "andi")),
        opcode::ORI => Some(desc(BinaryOpType::Or64, OperandSlot::ImmU16, "ori")),
        opcode::XORI => Some(desc(BinaryOpType::Xor64, OperandSlot::ImmU16, "xori")),
        opcode::SLTI => Some(desc(BinaryOpType::Lt, OperandSlot::ImmS16, "slti")),
        // sltiu sign-extends the immediate like slti, but compares unsigned.
        opcode::SLTIU => Some(desc(BinaryOpType::Ltu, OperandSlot::ImmS16, "sltiu")),
        _ => None,
    }
}

/// Rewrites the `lw` at a jump table's `lw_vram` into an `addiu` with the
/// same `rt`/`rs`/immediate fields (§4.F.3), so the later `addu` combining
/// it with the base produces the entry address rather than the loaded word.
fn rewrite_lw_to_addiu(word: u32) -> u32 {
    let instr = Instruction(word);
    (opcode::ADDIU << 26) | (instr.rs() << 21) | (instr.rt() << 16) | instr.imm_u16()
}

fn collect_label_addresses(words: &[u32], base_vram: u32, analysis: &AnalysisResult, ctx: &Context, section: SectionId) -> BTreeSet<u32> {
    let mut labels = BTreeSet::new();
    for (i, &word) in words.iter().enumerate() {
        let vram = base_vram + (i as u32) * 4;
        let delay_slot_vram = vram + 4;
        let instr = Instruction(word);
        let opc = instr.opcode();
        if opc == opcode::J {
            labels.insert(instr.jump_target(delay_slot_vram));
        } else if let Some(regimm_rt) = if opc == opcode::REGIMM { Some(instr.rt()) } else { None } {
            if branch_op_for_instruction(opc, Some(regimm_rt)).is_some() {
                labels.insert(instr.branch_target(delay_slot_vram));
            }
        } else if branch_op_for_instruction(opc, None).is_some() {
            labels.insert(instr.branch_target(delay_slot_vram));
        }
    }
    for table in &analysis.jump_tables {
        if let Some(section) = ctx.section(section) {
            let entries = analysis::size_jump_table(table, section, &ctx.rom, base_vram, words.len());
            labels.extend(entries);
        }
    }
    labels
}

pub fn recompile_function<G: Generator>(
    ctx: &Context,
    function_id: FunctionId,
    generator: &mut G,
    statics_worklist: &mut Vec<(SectionId, u32)>,
) -> Result<(), RecompileError> {
    let function = ctx.function(function_id).expect("function id must be valid");
    let section_id = function.section;
    let section = ctx.section(section_id).expect("function's section must exist");

    // Step 1: the words stored on `Function` are already decoded to their
    // correct numeric value by the object reader; no further byteswap is
    // needed here.
    let words = function.words.clone();
    let base_vram = function.vram;

    let mut analysis = analysis::analyze_function(&words, base_vram).map_err(RecompileError::AnalysisFailed)?;

    let lw_rewrite_vrams: HashSet<u32> = analysis.jump_tables.iter().map(|t| t.lw_vram).collect();
    let label_addrs = collect_label_addresses(&words, base_vram, &analysis, ctx, section_id);

    // A table with zero successfully resolved entries is an analyzer
    // failure (§4.D), not a valid empty switch; surface it as the
    // designated diagnostic and abort the function rather than emit a
    // switch with nothing but a default case.
    let mut failed_table_vram = None;
    for table in &analysis.jump_tables {
        let entries = analysis::size_jump_table(table, section, &ctx.rom, base_vram, words.len());
        if entries.is_empty() {
            failed_table_vram.get_or_insert(table.jr_vram);
            analysis.diagnostics.push(analysis::AnalysisDiagnostic::EmptyJumpTable { jr_vram: table.jr_vram });
        }
    }

    for diag in &analysis.diagnostics {
        match diag {
            analysis::AnalysisDiagnostic::ToleratedTailCall { vram } => {
                warn!("tolerated tail-call jr at {vram:#x} in function {}", function.name);
            }
            analysis::AnalysisDiagnostic::EmptyJumpTable { jr_vram } => {
                warn!("jump table at jr {jr_vram:#x} in function {} resolved to zero entries", function.name);
            }
        }
    }

    if let Some(jr_vram) = failed_table_vram {
        return Err(RecompileError::AnalysisFailed(jr_vram));
    }

    generator.emit_function_start(&function.name, function_id);

    let mut reloc_cursor = 0usize;
    let mut i = 0usize;
    while i < words.len() {
        let vram = base_vram + (i as u32) * 4;
        if label_addrs.contains(&vram) {
            generator.emit_label(&format!("L_{vram:08X}"));
        }
        if let Some(hook) = function.hooks.get(&i) {
            generator.emit_comment(hook);
        }

        while let Some(r) = section.relocs.get(reloc_cursor) {
            if r.address < vram {
                reloc_cursor += 1;
            } else {
                break;
            }
        }
        let current_reloc = section.relocs.get(reloc_cursor).filter(|r| r.address == vram);

        let raw_word = if lw_rewrite_vrams.contains(&vram) { rewrite_lw_to_addiu(words[i]) } else { words[i] };
        let (effective_word, reloc_descriptor) = fold_or_pass_reloc(ctx, raw_word, current_reloc);

        let instr = Instruction(effective_word);
        let opc = instr.opcode();
        let funct = instr.funct();

        let ictx = InstructionContext {
            vram,
            rd: instr.rd(),
            rs: instr.rs(),
            rt: instr.rt(),
            sa: instr.sa(),
            imm_u16: instr.imm_u16(),
            imm_s16: instr.imm_s16(),
            reloc: reloc_descriptor,
        };

        let consumed_delay_slot = dispatch_instruction(ctx, function_id, section_id, &words, base_vram, i, opc, funct, &instr, &ictx, &analysis, generator, statics_worklist)?;

        i += if consumed_delay_slot { 2 } else { 1 };
    }

    generator.emit_function_end();
    Ok(())
}

fn fold_or_pass_reloc(ctx: &Context, word: u32, reloc: Option<&Reloc>) -> (u32, Option<RelocDescriptor>) {
    let Some(reloc) = reloc else { return (word, None) };

    if (reloc.is_hi16() || reloc.is_lo16()) && reloc.reloc_type.is_honored() {
        if let Some(full) = resolve_foldable_reloc_addr(ctx, reloc) {
            let imm = if reloc.is_hi16() { ((full.wrapping_add(0x8000)) >> 16) as u16 } else { (full & 0xFFFF) as u16 };
            let patched = (word & 0xFFFF_0000) | imm as u32;
            return (patched, None);
        }
    }

    (
        word,
        Some(RelocDescriptor {
            reloc_type: reloc.reloc_type,
            target: reloc.target,
            target_section_offset: reloc.target_section_offset,
            symbol_index: reloc.symbol_index,
        }),
    )
}

#[allow(clippy::too_many_arguments)]
fn dispatch_instruction<G: Generator>(
    ctx: &Context,
    function_id: FunctionId,
    section_id: SectionId,
    words: &[u32],
    base_vram: u32,
    index: usize,
    opc: u32,
    funct: u32,
    instr: &Instruction,
    ictx: &InstructionContext,
    analysis: &AnalysisResult,
    generator: &mut G,
    statics_worklist: &mut Vec<(SectionId, u32)>,
) -> Result<bool, RecompileError> {
    // jal / j: direct control transfer with a delay slot.
    if opc == opcode::JAL || opc == opcode::J {
        let target = instr.jump_target(ictx.vram + 4);
        emit_delay_slot(ctx, function_id, section_id, words, base_vram, index, generator, statics_worklist)?;

        if opc == opcode::JAL {
            if let Some(reloc) = &ictx.reloc {
                if reloc.reloc_type == RelocType::Addr26 && matches!(reloc.target, SectionTarget::Import | SectionTarget::Event) {
                    if let (SectionTarget::Import, Some(symbol_index)) = (reloc.target, reloc.symbol_index) {
                        generator.emit_function_call_reference_symbol(ictx, section_id, symbol_index, reloc.target_section_offset);
                        return Ok(true);
                    }
                }
            }
            match resolve_jal_target(ctx, section_id, target) {
                JalResolution::Direct(callee) => {
                    let name = ctx.function(callee).map(|f| f.name.as_str()).unwrap_or("");
                    generator.emit_function_call(ictx, callee, name);
                }
                JalResolution::CallByLookup => generator.emit_function_call_lookup(target),
                JalResolution::CreateStatic => {
                    statics_worklist.push((section_id, target));
                    generator.emit_function_call_lookup(target);
                }
                JalResolution::HardError => return Err(RecompileError::UnresolvedJal { vram: ictx.vram, target }),
            }
        }
        return Ok(true);
    }

    if opc == opcode::SPECIAL && funct == special_funct::JR {
        if ictx.rs == 31 {
            emit_delay_slot(ctx, function_id, section_id, words, base_vram, index, generator, statics_worklist)?;
            generator.emit_return(ictx, function_id);
            return Ok(true);
        }

        let table = analysis
            .jump_tables
            .iter()
            .find(|t| t.jr_vram == ictx.vram)
            .ok_or(RecompileError::AnalysisFailed(ictx.vram))?;

        emit_delay_slot(ctx, function_id, section_id, words, base_vram, index, generator, statics_worklist)?;
        generator.emit_jtbl_addend_declaration(table.addend_register as u32);

        let section = ctx.section(section_id).expect("section must exist");
        let entries = analysis::size_jump_table(table, section, &ctx.rom, base_vram, words.len());
        generator.emit_switch(ictx, table.jr_vram, table.addend_register as u32);
        for (idx, &target) in entries.iter().enumerate() {
            generator.emit_case(SwitchCase { index: idx, target_vram: target });
        }
        generator.emit_switch_error(ictx.vram, table.jr_vram);
        generator.emit_switch_close();
        return Ok(true);
    }

    if opc == opcode::SPECIAL && funct == special_funct::JALR {
        emit_delay_slot(ctx, function_id, section_id, words, base_vram, index, generator, statics_worklist)?;
        generator.emit_function_call_by_register(ictx.rs);
        return Ok(true);
    }

    if opc == opcode::SPECIAL && funct == special_funct::SYSCALL {
        generator.emit_syscall(ictx.vram);
        return Ok(false);
    }
    if opc == opcode::SPECIAL && funct == special_funct::BREAK {
        generator.emit_do_break(ictx.vram);
        return Ok(false);
    }
    if opc == opcode::SPECIAL && matches!(funct, special_funct::MULT | special_funct::MULTU | special_funct::DIV | special_funct::DIVU | special_funct::DMULT | special_funct::DMULTU | special_funct::DDIV | special_funct::DDIVU) {
        let mnemonic = match funct {
            special_funct::MULT => "mult",
            special_funct::MULTU => "multu",
            special_funct::DIV => "div",
            special_funct::DIVU => "divu",
            special_funct::DMULT => "dmult",
            special_funct::DMULTU => "dmultu",
            special_funct::DDIV => "ddiv",
            _ => "ddivu",
        };
        generator.emit_muldiv(mnemonic, ictx.rs, ictx.rt);
        return Ok(false);
    }

    if opc == opcode::COP0 {
        if funct == cop_funct::MFC {
            generator.emit_cop0_status_read(ictx.rt);
            return Ok(false);
        }
        if funct == cop_funct::MTC {
            generator.emit_cop0_status_write(ictx.rt);
            return Ok(false);
        }
    }
    if opc == opcode::COP1 {
        if funct == cop_funct::CFC {
            generator.emit_cop1_cs_read(ictx.rt);
            return Ok(false);
        }
        if funct == cop_funct::CTC {
            generator.emit_cop1_cs_write(ictx.rt);
            return Ok(false);
        }
    }

    let regimm_rt = if opc == opcode::REGIMM { Some(ictx.rt) } else { None };
    if let Some(branch) = branch_op_for_instruction(opc, regimm_rt) {
        emit_delay_slot(ctx, function_id, section_id, words, base_vram, index, generator, statics_worklist)?;
        let target = instr.branch_target(ictx.vram + 4);
        generator.emit_branch_condition(&branch, ictx);
        generator.emit_goto(&format!("L_{target:08X}"));
        generator.emit_branch_close();
        if branch.likely {
            generator.emit_label(&format!("skip_{index}"));
        }
        return Ok(true);
    }

    let cop1_fmt = if opc == opcode::COP1 { Some(instr.cop1_fmt()) } else { None };

    if let Some(op) = binary_op_for_instruction(opc, funct, cop1_fmt) {
        generator.process_binary_op(&op, ictx);
        return Ok(false);
    }
    if let Some(op) = unary_op_for_instruction(opc, funct, cop1_fmt) {
        generator.process_unary_op(&op, ictx);
        return Ok(false);
    }
    if let Some(op) = store_op_for_instruction(opc) {
        generator.process_store_op(&op, ictx);
        return Ok(false);
    }
    if let Some(op) = immediate_descriptor(opc) {
        generator.process_binary_op(&op, ictx);
        return Ok(false);
    }
    if instr.is_nop() {
        return Ok(false);
    }

    Err(RecompileError::UnknownOpcode { vram: ictx.vram, opcode: opc })
}

#[allow(clippy::too_many_arguments)]
fn emit_delay_slot<G: Generator>(
    ctx: &Context,
    function_id: FunctionId,
    section_id: SectionId,
    words: &[u32],
    base_vram: u32,
    index: usize,
    generator: &mut G,
    statics_worklist: &mut Vec<(SectionId, u32)>,
) -> Result<(), RecompileError> {
    let Some(&delay_word) = words.get(index + 1) else { return Ok(()) };
    let delay_vram = base_vram + ((index + 1) as u32) * 4;
    let instr = Instruction(delay_word);
    let ictx = InstructionContext {
        vram: delay_vram,
        rd: instr.rd(),
        rs: instr.rs(),
        rt: instr.rt(),
        sa: instr.sa(),
        imm_u16: instr.imm_u16(),
        imm_s16: instr.imm_s16(),
        reloc: None,
    };
    let opc = instr.opcode();
    let funct = instr.funct();
    let cop1_fmt = if opc == opcode::COP1 { Some(instr.cop1_fmt()) } else { None };

    if instr.is_nop() {
        return Ok(());
    }
    if let Some(op) = binary_op_for_instruction(opc, funct, cop1_fmt) {
        generator.process_binary_op(&op, &ictx);
    } else if let Some(op) = unary_op_for_instruction(opc, funct, cop1_fmt) {
        generator.process_unary_op(&op, &ictx);
    } else if let Some(op) = store_op_for_instruction(opc) {
        generator.process_store_op(&op, &ictx);
    } else if let Some(op) = immediate_descriptor(opc) {
        generator.process_binary_op(&op, &ictx);
    } else {
        let _ = (ctx, function_id, section_id, statics_worklist);
    }
    Ok(())
}
