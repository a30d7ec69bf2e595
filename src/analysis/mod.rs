//! Function analyzer (§4.D): a linear abstract-interpretation pass that
//! recovers jump tables and validated absolute-jump targets from idiomatic
//! MIPS instruction sequences, so the driver never has to trust an
//! indirect `jr` blindly.

mod state;

pub use state::{AddressState, InterpreterState, LoadedState, RegState};

use crate::decode::{opcode, special_funct, Instruction};
use crate::model::Section;

const RA: u32 = 31;
const SP: u32 = 29;
const GP: u32 = 28;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTable {
    /// vram of the `jr` that this table services.
    pub jr_vram: u32,
    /// vram of the `lw` the driver must rewrite to `addiu` at emit time.
    pub lw_vram: u32,
    /// Table base vram, or GP-relative offset when `pic` is set.
    pub base: u32,
    pub pic: bool,
    pub addend_register: u8,
    /// Resolved entry vrams, in table order, populated by
    /// [`size_jump_table`] once the owning section's ROM bytes are known.
    pub entries: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsoluteJump {
    pub jr_vram: u32,
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisDiagnostic {
    /// A `jr` at this vram was tolerated as a tail call under the
    /// penultimate-instruction heuristic.
    ToleratedTailCall { vram: u32 },
    /// A jump table resolved to zero entries; treated as analyzer failure
    /// by the caller, but reported distinctly for diagnostics.
    EmptyJumpTable { jr_vram: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    pub jump_tables: Vec<JumpTable>,
    pub absolute_jumps: Vec<AbsoluteJump>,
    pub diagnostics: Vec<AnalysisDiagnostic>,
}

/// Runs the abstract interpreter over `words` (already byteswapped to host
/// endianness), whose first word sits at `base_vram`. Returns `Err(vram)`
/// naming the `jr` that could not be classified, per §4.D.
pub fn analyze_function(words: &[u32], base_vram: u32) -> Result<AnalysisResult, u32> {
    let mut state = InterpreterState::default();
    let mut result = AnalysisResult::default();

    for (i, &word) in words.iter().enumerate() {
        let vram = base_vram + (i as u32) * 4;
        let instr = Instruction(word);
        step(&mut state, instr, vram, words.len(), i, &mut result)?;
    }

    Ok(result)
}

fn step(
    state: &mut InterpreterState,
    instr: Instruction,
    vram: u32,
    word_count: usize,
    index: usize,
    result: &mut AnalysisResult,
) -> Result<(), u32> {
    match instr.opcode() {
        opcode::LUI => {
            let mut s = RegState::default();
            s.address.lui_value = Some((instr.imm_u16() as u32) << 16);
            state.set_reg(instr.rt(), s);
            return Ok(());
        }
        opcode::ADDIU | opcode::ADDI => {
            let src = state.reg(instr.rs());
            let mut dest = RegState::default();
            if src.address.lui_value.is_some() && src.address.addiu_offset.is_none() {
                dest.address.lui_value = src.address.lui_value;
                dest.address.addiu_offset = Some(instr.imm_s16() as i32);
                dest.address.addend_register = src.address.addend_register;
            } else {
                // Either no chain to extend, or a second addiu on the same
                // chain (invalidates per §4.D).
            }
            state.set_reg(instr.rt(), dest);
            return Ok(());
        }
        opcode::SPECIAL => {
            let funct = instr.funct();
            if funct == special_funct::JR {
                return classify_jr(state, instr.rs(), vram, word_count, index, result);
            }
            if matches!(funct, 0x21 | 0x2D) {
                // addu / daddu
                propagate_addu(state, instr.rd(), instr.rs(), instr.rt());
                return Ok(());
            }
            // Any other SPECIAL op invalidates its destination.
            state.invalidate_reg(instr.rd());
            return Ok(());
        }
        _ => {}
    }

    // lw / sw against a base register.
    if instr.opcode() == 0x23 {
        handle_lw(state, instr, vram);
        return Ok(());
    }
    if instr.opcode() == 0x2B {
        handle_sw(state, instr);
        return Ok(());
    }

    // Anything else invalidates whatever register it writes. We don't
    // decode every format here; treating `rt` as the conservative
    // destination covers I-type ops, and SPECIAL/COP1 ops were already
    // handled above or don't write a GPR the analyzer tracks.
    if instr.opcode() != opcode::COP1 {
        state.invalidate_reg(instr.rt());
    }
    Ok(())
}

fn propagate_addu(state: &mut InterpreterState, rd: u32, ra: u32, rb: u32) {
    let a = state.reg(ra);
    let b = state.reg(rb);

    if a.address.lui_value.is_some() && a.address.addend_register.is_none() {
        let mut dest = RegState::default();
        dest.address.lui_value = a.address.lui_value;
        dest.address.addiu_offset = a.address.addiu_offset;
        dest.address.addend_register = Some(rb as u8);
        state.set_reg(rd, dest);
        return;
    }
    if b.address.lui_value.is_some() && b.address.addend_register.is_none() {
        let mut dest = RegState::default();
        dest.address.lui_value = b.address.lui_value;
        dest.address.addiu_offset = b.address.addiu_offset;
        dest.address.addend_register = Some(ra as u8);
        state.set_reg(rd, dest);
        return;
    }
    if a.address.got_offset.is_some() && a.address.addend_register.is_none() {
        let mut dest = RegState::default();
        dest.address.got_offset = a.address.got_offset;
        dest.address.addend_register = Some(rb as u8);
        state.set_reg(rd, dest);
        return;
    }
    if b.address.got_offset.is_some() && b.address.addend_register.is_none() {
        let mut dest = RegState::default();
        dest.address.got_offset = b.address.got_offset;
        dest.address.addend_register = Some(ra as u8);
        state.set_reg(rd, dest);
        return;
    }
    if a.loaded.table_base.is_some() && rb == GP {
        state.set_reg(rd, a);
        return;
    }
    if b.loaded.table_base.is_some() && ra == GP {
        state.set_reg(rd, b);
        return;
    }
    if ra == 0 {
        state.set_reg(rd, b);
        return;
    }
    if rb == 0 {
        state.set_reg(rd, a);
        return;
    }
    state.invalidate_reg(rd);
}

fn handle_lw(state: &mut InterpreterState, instr: Instruction, vram: u32) {
    let base_reg = instr.rs();
    let imm = instr.imm_s16() as i32;

    if base_reg == SP && imm >= 0 && imm % 4 == 0 {
        let slot = (imm / 4) as u32;
        let restored = state.stack_slots.get(&slot).copied().unwrap_or_default();
        state.set_reg(instr.rt(), restored);
        return;
    }

    let base = state.reg(base_reg);
    if base.address.lui_value.is_some() && base.address.addend_register.is_some() {
        let table_base = (base.address.lui_value.unwrap() as i64 + imm as i64) as u32;
        let mut dest = RegState::default();
        dest.loaded.table_base = Some(table_base);
        dest.loaded.lw_vram = Some(vram);
        dest.loaded.addend_register = base.address.addend_register;
        dest.loaded.pic = false;
        state.set_reg(instr.rt(), dest);
        return;
    }
    if base.address.got_offset.is_some() && base.address.addend_register.is_some() {
        let table_base = (base.address.got_offset.unwrap() + imm) as u32;
        let mut dest = RegState::default();
        dest.loaded.table_base = Some(table_base);
        dest.loaded.lw_vram = Some(vram);
        dest.loaded.addend_register = base.address.addend_register;
        dest.loaded.pic = true;
        state.set_reg(instr.rt(), dest);
        return;
    }
    if base_reg == GP {
        let mut dest = RegState::default();
        dest.address.got_offset = Some(imm);
        state.set_reg(instr.rt(), dest);
        return;
    }
    state.invalidate_reg(instr.rt());
}

fn handle_sw(state: &mut InterpreterState, instr: Instruction) {
    let base_reg = instr.rs();
    let imm = instr.imm_s16() as i32;
    if base_reg == SP && imm >= 0 && imm % 4 == 0 {
        let slot = (imm / 4) as u32;
        state.stack_slots.insert(slot, state.reg(instr.rt()));
    }
}

fn classify_jr(
    state: &mut InterpreterState,
    rs: u32,
    vram: u32,
    word_count: usize,
    index: usize,
    result: &mut AnalysisResult,
) -> Result<(), u32> {
    if rs == RA {
        return Ok(());
    }
    let reg = state.reg(rs);
    if let Some(base) = reg.loaded.table_base {
        result.jump_tables.push(JumpTable {
            jr_vram: vram,
            lw_vram: reg.loaded.lw_vram.unwrap_or(vram),
            base,
            pic: reg.loaded.pic,
            addend_register: reg.loaded.addend_register.unwrap_or(0),
            entries: Vec::new(),
        });
        return Ok(());
    }
    if reg.address.lui_value.is_some() && reg.address.addend_register.is_none() {
        let target = (reg.address.lui_value.unwrap() as i64 + reg.address.addiu_offset.unwrap_or(0) as i64) as u32;
        result.absolute_jumps.push(AbsoluteJump { jr_vram: vram, target });
        return Ok(());
    }
    // Tail call heuristic: tolerated exactly at the penultimate instruction.
    if index + 2 == word_count {
        result.diagnostics.push(AnalysisDiagnostic::ToleratedTailCall { vram });
        return Ok(());
    }
    Err(vram)
}

/// Sizes a jump table by scanning `rom` (the whole input image) starting at
/// the table's base, one big-endian word at a time: each word that names a
/// vram inside `[func_vram, func_vram + 4*func_len)` is an entry; the first
/// word that does not terminates the table. PIC tables add the section's
/// `gp_ram_addr` to the stored base before bounds-checking. Returns the
/// resolved entry vrams.
pub fn size_jump_table(table: &JumpTable, section: &Section, rom: &[u8], func_vram: u32, func_len_words: usize) -> Vec<u32> {
    let base = if table.pic {
        table.base.wrapping_add(section.gp_ram_addr.unwrap_or(0))
    } else {
        table.base
    };

    let Some(rom_offset) = vram_to_rom_offset(section, base) else {
        return Vec::new();
    };

    let func_end = func_vram + (func_len_words as u32) * 4;
    let mut entries = Vec::new();
    let mut offset = rom_offset;
    while offset + 4 <= rom.len() as u32 {
        let word = u32::from_be_bytes([
            rom[offset as usize],
            rom[offset as usize + 1],
            rom[offset as usize + 2],
            rom[offset as usize + 3],
        ]);
        if word < func_vram || word >= func_end || word % 4 != 0 {
            break;
        }
        entries.push(word);
        offset += 4;
    }
    entries
}

fn vram_to_rom_offset(section: &Section, vram: u32) -> Option<u32> {
    if !section.rom_present() || !section.contains_vram(vram) {
        return None;
    }
    Some(section.rom_offset + (vram - section.ram_addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Section, SectionFlags};

    fn jr(rs: u32) -> u32 {
        (rs << 21) | special_funct::JR
    }

    fn addu(rs: u32, rt: u32, rd: u32) -> u32 {
        (rs << 21) | (rt << 16) | (rd << 11) | 0x21
    }

    fn lui(rt: u32, imm: u16) -> u32 {
        (opcode::LUI << 26) | (rt << 16) | imm as u32
    }

    fn addiu(rt: u32, rs: u32, imm: u16) -> u32 {
        (opcode::ADDIU << 26) | (rs << 21) | (rt << 16) | imm as u32
    }

    fn lw(rt: u32, rs: u32, imm: u16) -> u32 {
        (0x23 << 26) | (rs << 21) | (rt << 16) | imm as u32
    }

    #[test]
    fn scenario_a_no_tables_no_jumps() {
        let words = [addiu(2, 0, 0x2A), jr(31), 0];
        let result = analyze_function(&words, 0).unwrap();
        assert!(result.jump_tables.is_empty());
        assert!(result.absolute_jumps.is_empty());
    }

    #[test]
    fn recovers_absolute_jump_from_lui_addiu() {
        let words = [lui(1, 0x8012), addiu(1, 1, 0x3450), jr(1), 0];
        let result = analyze_function(&words, 0).unwrap();
        assert_eq!(result.absolute_jumps.len(), 1);
        assert_eq!(result.absolute_jumps[0].target, 0x8012_3450);
    }

    #[test]
    fn recovers_jump_table_from_lui_addu_lw_jr() {
        const AT: u32 = 1;
        const V0: u32 = 2;
        let words = [lui(AT, 0), addu(AT, V0, AT), lw(AT, AT, 0x40), jr(AT)];
        let result = analyze_function(&words, 0).unwrap();
        assert_eq!(result.jump_tables.len(), 1);
        let table = &result.jump_tables[0];
        assert_eq!(table.base, 0x40);
        assert_eq!(table.addend_register, V0 as u8);
        assert_eq!(table.lw_vram, 8);
    }

    #[test]
    fn unclassified_jr_fails_unless_penultimate() {
        let words = [addiu(3, 0, 5), jr(3), addiu(4, 0, 6), 0];
        assert_eq!(analyze_function(&words, 0), Err(4));
    }

    #[test]
    fn tail_call_heuristic_tolerates_penultimate_jr() {
        let words = [addiu(3, 0, 5), jr(3), 0];
        let result = analyze_function(&words, 0).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.absolute_jumps.is_empty());
    }

    #[test]
    fn sizes_jump_table_by_scanning_rom() {
        let section = Section {
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
        };
        let mut rom = vec![0u8; 0x100];
        rom[0x40..0x44].copy_from_slice(&0u32.to_be_bytes());
        rom[0x44..0x48].copy_from_slice(&4u32.to_be_bytes());
        rom[0x48..0x4C].copy_from_slice(&8u32.to_be_bytes());
        rom[0x4C..0x50].copy_from_slice(&0xFFFF_FFFFu32.to_be_bytes());

        let table = JumpTable {
            jr_vram: 12,
            lw_vram: 8,
            base: 0x40,
            pic: false,
            addend_register: 2,
            entries: Vec::new(),
        };
        let entries = size_jump_table(&table, &section, &rom, 0, 4);
        assert_eq!(entries, vec![0, 4, 8]);
    }
}
