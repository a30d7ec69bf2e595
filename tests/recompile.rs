//! End-to-end coverage of the driver + source generator against the
//! concrete scenarios a recompile pass is expected to handle: plain
//! arithmetic, a HI16/LO16 pair into a relocatable section, a recovered
//! jump table, both branches of JAL resolution, and a mod-file round trip.

use std::collections::HashMap;

use recomp_core::driver::{recompile_context, recompile_function};
use recomp_core::generator::SourceGenerator;
use recomp_core::model::{
    Dependency, Function, FunctionFlags, Reloc, RelocType, SectionTarget, SemVer, Section, SectionFlags,
};
use recomp_core::modfile;
use recomp_core::Context;

const ZERO: u32 = 0;
const V0: u32 = 2;
const A0: u32 = 4;
const RA: u32 = 31;

fn jr(rs: u32) -> u32 {
    (rs << 21) | 0x08
}

fn addiu(rt: u32, rs: u32, imm: u16) -> u32 {
    (0x09 << 26) | (rs << 21) | (rt << 16) | imm as u32
}

fn lui(rt: u32, imm: u16) -> u32 {
    (0x0F << 26) | (rt << 16) | imm as u32
}

fn addu(rs: u32, rt: u32, rd: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | 0x21
}

fn lw(rt: u32, rs: u32, imm: u16) -> u32 {
    (0x23 << 26) | (rs << 21) | (rt << 16) | imm as u32
}

fn jal(target: u32) -> u32 {
    (0x03 << 26) | ((target >> 2) & 0x03FF_FFFF)
}

fn shift_imm(funct: u32, rd: u32, rt: u32, sa: u32) -> u32 {
    (rt << 16) | (rd << 11) | (sa << 6) | funct
}

fn bare_function(name: &str, vram: u32, words: Vec<u32>, section: recomp_core::model::SectionId) -> Function {
    Function { name: name.into(), vram, rom: 0, words, section, flags: FunctionFlags::empty(), hooks: HashMap::new(), is_static: false }
}

#[test]
fn scenario_a_minimal_arithmetic_function() {
    let mut ctx = Context::new();
    let section = ctx.add_section(Section {
        name: "code".into(),
        rom_offset: 0,
        ram_addr: 0,
        size: 0x10,
        bss_size: None,
        flags: SectionFlags::EXECUTABLE,
        bss_section: None,
        relocs: Vec::new(),
        function_starts: Vec::new(),
        gp_ram_addr: None,
    });
    // addiu $v0, $zero, 0x2A ; jr $ra ; nop -- literal words per spec.
    let words = vec![0x2402002A, 0x03E00008, 0x00000000];
    assert_eq!(words[0], addiu(V0, ZERO, 0x2A));
    assert_eq!(words[1], jr(RA));
    let function_id = ctx.add_function(bare_function("my_func", 0, words, section));

    let mut generator = SourceGenerator::new();
    let mut statics_worklist = Vec::new();
    recompile_function(&ctx, function_id, &mut generator, &mut statics_worklist).unwrap();
    assert!(statics_worklist.is_empty());

    let out = generator.finish();
    assert!(out.contains("ctx->r2 = ADD32(ctx->r0, 42);"), "{out}");
    assert!(out.contains("return;"), "{out}");
    assert!(!out.contains("switch"), "{out}");
    assert!(!out.contains("goto L_"), "{out}");
    assert!(!out.contains("RELOC_"), "{out}");
}

#[test]
fn scenario_b_hi16_lo16_pair_to_relocatable_section() {
    let mut ctx = Context::new();
    let code = ctx.add_section(Section {
        name: "code".into(),
        rom_offset: 0,
        ram_addr: 0,
        size: 0x10,
        bss_size: None,
        flags: SectionFlags::EXECUTABLE | SectionFlags::RELOCATABLE,
        bss_section: None,
        relocs: vec![
            Reloc { address: 0, target: SectionTarget::Section(recomp_core::model::SectionId(1)), target_section_offset: 0, symbol_index: None, reloc_type: RelocType::Hi16, reference_symbol: false },
            Reloc { address: 4, target: SectionTarget::Section(recomp_core::model::SectionId(1)), target_section_offset: 0x1234, symbol_index: None, reloc_type: RelocType::Lo16, reference_symbol: false },
        ],
        function_starts: Vec::new(),
        gp_ram_addr: None,
    });
    ctx.add_section(Section {
        name: "data".into(),
        rom_offset: 0,
        ram_addr: 0x2000,
        size: 0x10,
        bss_size: None,
        flags: SectionFlags::RELOCATABLE,
        bss_section: None,
        relocs: Vec::new(),
        function_starts: Vec::new(),
        gp_ram_addr: None,
    });

    // lui $a0, %hi(sym) ; addiu $a0, $a0, %lo(sym)
    let words = vec![lui(A0, 0), addiu(A0, A0, 0)];
    let function_id = ctx.add_function(bare_function("my_func", 0, words, code));

    ctx.validate().unwrap();
    for reloc in &ctx.sections[0].relocs {
        assert_eq!(reloc.target_section_offset, 0x1234);
    }

    let mut generator = SourceGenerator::new();
    let mut statics_worklist = Vec::new();
    recompile_function(&ctx, function_id, &mut generator, &mut statics_worklist).unwrap();

    let out = generator.finish();
    assert!(out.contains("S32(RELOC_HI16(SECTION_1_BASE + 4660) << 16)"), "{out}");
    assert!(out.contains("ctx->r4 = ADD32(ctx->r4, RELOC_LO16(SECTION_1_BASE + 4660));"), "{out}");
}

#[test]
fn immediate_shifts_emit_an_actual_shift_not_a_bitmask() {
    const V1: u32 = 3;
    let mut ctx = Context::new();
    let section = ctx.add_section(Section {
        name: "code".into(),
        rom_offset: 0,
        ram_addr: 0,
        size: 0x20,
        bss_size: None,
        flags: SectionFlags::EXECUTABLE,
        bss_section: None,
        relocs: Vec::new(),
        function_starts: Vec::new(),
        gp_ram_addr: None,
    });

    // sll $v0, $a0, 4 ; srl $v0, $a0, 4 ; sra $v0, $a0, 4 ; dsll32 $v1, $a0, 3 ; jr $ra ; nop
    let words = vec![
        shift_imm(0x00, V0, A0, 4),
        shift_imm(0x02, V0, A0, 4),
        shift_imm(0x03, V0, A0, 4),
        shift_imm(0x3C, V1, A0, 3),
        jr(RA),
        0,
    ];
    let function_id = ctx.add_function(bare_function("shifts", 0, words, section));

    let mut generator = SourceGenerator::new();
    let mut statics_worklist = Vec::new();
    recompile_function(&ctx, function_id, &mut generator, &mut statics_worklist).unwrap();

    let out = generator.finish();
    assert!(out.contains("ctx->r2 = S32(ctx->r4 << (4 & 31));"), "{out}");
    assert!(out.contains("ctx->r2 = S32((uint32_t)ctx->r4 >> (4 & 31));"), "{out}");
    assert!(out.contains("ctx->r2 = S32(ctx->r4 >> (4 & 31));"), "{out}");
    assert!(out.contains("ctx->r3 = (ctx->r4 << (35 & 63));"), "{out}");
    assert!(!out.contains("& 0x1F"), "{out}");
    assert!(!out.contains("& 0x3F"), "{out}");
}

#[test]
fn scenario_c_jump_table_of_three_entries() {
    let mut ctx = Context::new();
    let mut rom = vec![0u8; 0x50];
    rom[0x40..0x44].copy_from_slice(&0u32.to_be_bytes());
    rom[0x44..0x48].copy_from_slice(&4u32.to_be_bytes());
    rom[0x48..0x4C].copy_from_slice(&8u32.to_be_bytes());
    rom[0x4C..0x50].copy_from_slice(&0xFFFF_FFFFu32.to_be_bytes());
    ctx.rom = rom;

    let section = ctx.add_section(Section {
        name: "code".into(),
        rom_offset: 0,
        ram_addr: 0,
        size: 0x1000,
        bss_size: None,
        flags: SectionFlags::EXECUTABLE,
        bss_section: None,
        relocs: Vec::new(),
        function_starts: Vec::new(),
        gp_ram_addr: None,
    });

    const AT: u32 = 1;
    // lui $at, 0 ; addu $v0, $at, $at ; lw $at, 0x40($at) ; jr $at ; nop
    let words = vec![lui(AT, 0), addu(AT, V0, AT), lw(AT, AT, 0x40), jr(AT), 0];
    let function_id = ctx.add_function(bare_function("dispatch", 0, words, section));

    let mut generator = SourceGenerator::new();
    let mut statics_worklist = Vec::new();
    recompile_function(&ctx, function_id, &mut generator, &mut statics_worklist).unwrap();

    let out = generator.finish();
    assert!(out.contains("switch (ctx->r2) { // jtbl_0x0000000C"), "{out}");
    assert!(out.contains("case 0: goto L_00000000;"), "{out}");
    assert!(out.contains("case 1: goto L_00000004;"), "{out}");
    assert!(out.contains("case 2: goto L_00000008;"), "{out}");
    assert!(out.contains("default: RECOMP_UNREACHABLE(\"jump table at 0x0000000C indexed out of range at 0x0000000C\");"), "{out}");
}

#[test]
fn jump_table_with_zero_resolved_entries_aborts_the_function() {
    use recomp_core::error::RecompileError;

    let mut ctx = Context::new();
    let mut rom = vec![0u8; 0x50];
    // first table entry is already out of the function's vram range, so
    // size_jump_table stops immediately and returns no entries at all.
    rom[0x40..0x44].copy_from_slice(&0xFFFF_FFFFu32.to_be_bytes());
    ctx.rom = rom;

    let section = ctx.add_section(Section {
        name: "code".into(),
        rom_offset: 0,
        ram_addr: 0,
        size: 0x1000,
        bss_size: None,
        flags: SectionFlags::EXECUTABLE,
        bss_section: None,
        relocs: Vec::new(),
        function_starts: Vec::new(),
        gp_ram_addr: None,
    });

    const AT: u32 = 1;
    let words = vec![lui(AT, 0), addu(AT, V0, AT), lw(AT, AT, 0x40), jr(AT), 0];
    let function_id = ctx.add_function(bare_function("dispatch", 0, words, section));

    let mut generator = SourceGenerator::new();
    let mut statics_worklist = Vec::new();
    let result = recompile_function(&ctx, function_id, &mut generator, &mut statics_worklist);
    assert!(matches!(result, Err(RecompileError::AnalysisFailed(_))), "{result:?}");
}

#[test]
fn scenario_d_jal_to_single_candidate_is_a_direct_call() {
    let mut ctx = Context::new();
    let section = ctx.add_section(Section {
        name: "code".into(),
        rom_offset: 0,
        ram_addr: 0,
        size: 0x200,
        bss_size: None,
        flags: SectionFlags::EXECUTABLE,
        bss_section: None,
        relocs: Vec::new(),
        function_starts: Vec::new(),
        gp_ram_addr: None,
    });
    ctx.add_function(bare_function("caller", 0, vec![jal(0x100), 0], section));
    ctx.add_function(bare_function("target_func", 0x100, vec![jr(RA), 0], section));

    let (report, outputs) = recompile_context(&mut ctx, SourceGenerator::new);
    assert!(report.ok(), "{:?}", report.failures);

    let caller_id = ctx.function_by_name("caller").unwrap();
    let (_, caller_out) = outputs.into_iter().find(|(id, _)| *id == caller_id).unwrap();
    let out = caller_out.finish();
    assert!(out.contains("target_func(rdram, ctx);"), "{out}");
    assert!(!out.contains("LOOKUP_FUNC"), "{out}");
}

#[test]
fn scenario_e_jal_to_missing_target_registers_a_static() {
    let mut ctx = Context::new();
    let section = ctx.add_section(Section {
        name: "code".into(),
        rom_offset: 0,
        ram_addr: 0,
        size: 0x18,
        bss_size: None,
        flags: SectionFlags::EXECUTABLE,
        bss_section: None,
        relocs: Vec::new(),
        function_starts: Vec::new(),
        gp_ram_addr: None,
    });
    ctx.rom = vec![0u8; 0x18];
    ctx.add_function(bare_function("caller", 0, vec![jal(0x10), 0], section));

    let (report, outputs) = recompile_context(&mut ctx, SourceGenerator::new);
    assert!(report.ok(), "{:?}", report.failures);

    let static_name = Function::static_name("code", 0x10);
    let static_id = ctx.function_by_name(&static_name).expect("static function must be registered");
    assert!(ctx.function(static_id).unwrap().is_static);
    assert_eq!(ctx.function(static_id).unwrap().section, section);

    let caller_id = ctx.function_by_name("caller").unwrap();
    let (_, caller_out) = outputs.into_iter().find(|(id, _)| *id == caller_id).unwrap();
    let out = caller_out.finish();
    assert!(out.contains("LOOKUP_FUNC(0x00000010)(rdram, ctx);"), "{out}");
}

#[test]
fn scenario_f_mod_file_with_one_imported_call_round_trips() {
    let mut ctx = Context::new();
    let dep_id = ctx.add_dependency(Dependency { id: "modA".into(), version: SemVer { major: 1, minor: 2, patch: 3 } }).unwrap();
    let import_id = ctx.add_import("fn".into(), dep_id).unwrap();

    let section = ctx.add_section(Section {
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
            symbol_index: Some(recomp_core::model::ReferenceSymbolId(import_id.0)),
            reloc_type: RelocType::Addr26,
            reference_symbol: true,
        }],
        function_starts: Vec::new(),
        gp_ram_addr: None,
    });
    ctx.add_function(bare_function("my_func", 0x1000, vec![0u32; 4], section));

    let bytes = modfile::encode(&ctx);
    let decoded = modfile::decode(&bytes).unwrap();

    assert_eq!(decoded.dependencies.len(), 1);
    assert_eq!(decoded.dependencies[0].id, "modA");
    assert_eq!(decoded.imports.len(), 1);
    assert_eq!(decoded.imports[0].name, "fn");

    let reloc = &decoded.sections[0].relocs[0];
    assert_eq!(reloc.target, SectionTarget::Import);
    assert_eq!(reloc.symbol_index.unwrap().index(), import_id.index());
}
