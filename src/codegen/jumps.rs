use super::instr::{Instruction, OpCode, NO_REG};
use super::{CodegenError, FuncState};

// ── Pending-jump lists ──────────────────────────────────────────────
//
// Unresolved jumps form singly linked lists threaded through their own
// sBx fields: each node's offset field holds the relative position of
// the next pending jump, terminated by NO_JUMP. No allocation happens
// during codegen; the sentinel encoding never leaves this module.

const NO_JUMP: i32 = -1;

/// Opaque head of a pending-jump list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpList(i32);

impl JumpList {
    pub fn empty() -> JumpList {
        JumpList(NO_JUMP)
    }

    pub(crate) fn single(pc: usize) -> JumpList {
        JumpList(pc as i32)
    }

    pub fn is_empty(self) -> bool {
        self.0 == NO_JUMP
    }

    fn head(self) -> Option<usize> {
        if self.0 == NO_JUMP {
            None
        } else {
            Some(self.0 as usize)
        }
    }
}

impl Default for JumpList {
    fn default() -> JumpList {
        JumpList::empty()
    }
}

impl FuncState {
    /// Emit an unconditional jump with an unresolved target. Any jumps
    /// deferred to "here" are chained into the new jump so both patch
    /// together.
    pub(crate) fn jump(&mut self) -> Result<usize, CodegenError> {
        let saved = std::mem::take(&mut self.jpc);
        let j = self.emit(Instruction::asbx(OpCode::Jmp, 0, NO_JUMP))?;
        let mut list = JumpList::single(j);
        self.concat(&mut list, saved)?;
        Ok(list.0 as usize)
    }

    /// Follow one link of the threaded list.
    fn next_jump(&self, pc: usize) -> JumpList {
        let offset = self.code[pc].sbx();
        if offset == NO_JUMP {
            JumpList(NO_JUMP)
        } else {
            JumpList(pc as i32 + 1 + offset)
        }
    }

    /// Replace a pending jump's link with its real offset.
    fn fix_jump(&mut self, pc: usize, dest: usize) -> Result<(), CodegenError> {
        let offset = dest as i32 - (pc as i32 + 1);
        debug_assert!(offset != NO_JUMP, "jump may not target itself");
        if offset.abs() > super::instr::MAXARG_SBX {
            return Err(CodegenError::ControlTooLong { line: self.line });
        }
        self.code[pc].set_sbx(offset);
        Ok(())
    }

    /// Mark the current position as a jump target, blocking peephole
    /// merges across the label.
    pub(crate) fn get_label(&mut self) -> usize {
        self.last_target = self.pc();
        self.pc()
    }

    /// The instruction controlling a jump: a preceding test-mode
    /// instruction if there is one, else the jump itself.
    fn jump_control(&self, pc: usize) -> usize {
        if pc >= 1 && self.code[pc - 1].opcode().is_test() {
            pc - 1
        } else {
            pc
        }
    }

    /// Whether any jump on the list will need a materialized boolean
    /// (i.e. is not controlled by a TestSet that can produce it).
    pub(crate) fn need_value(&self, list: JumpList) -> bool {
        let mut node = list;
        while let Some(pc) = node.head() {
            if self.code[self.jump_control(pc)].opcode() != OpCode::TestSet {
                return true;
            }
            node = self.next_jump(pc);
        }
        false
    }

    /// Retarget a TestSet's destination register, or demote it to a
    /// plain Test when its value is unused. Returns false if the jump
    /// is not value-producing.
    fn patch_test_reg(&mut self, node: usize, reg: u32) -> bool {
        let pos = self.jump_control(node);
        let i = self.code[pos];
        if i.opcode() != OpCode::TestSet {
            return false;
        }
        if reg != NO_REG && reg != i.b() {
            self.code[pos].set_a(reg);
        } else {
            self.code[pos] = Instruction::abc(OpCode::Test, i.b(), 0, i.c());
        }
        true
    }

    /// Drop the values produced by a condition's TestSets; used when
    /// only control flow matters.
    pub(crate) fn remove_values(&mut self, list: JumpList) {
        let mut node = list;
        while let Some(pc) = node.head() {
            node = self.next_jump(pc);
            self.patch_test_reg(pc, NO_REG);
        }
    }

    /// Core patch walk: value-producing jumps go to `vtarget` with
    /// their register bound to `reg`, the rest to `dtarget`.
    pub(crate) fn patch_list_aux(
        &mut self,
        list: JumpList,
        vtarget: usize,
        reg: u32,
        dtarget: usize,
    ) -> Result<(), CodegenError> {
        let mut node = list;
        while let Some(pc) = node.head() {
            node = self.next_jump(pc);
            if self.patch_test_reg(pc, reg) {
                self.fix_jump(pc, vtarget)?;
            } else {
                self.fix_jump(pc, dtarget)?;
            }
        }
        Ok(())
    }

    /// Resolve all jumps deferred to the current position. Called by
    /// the emitter before every instruction.
    pub(crate) fn discharge_jpc(&mut self) -> Result<(), CodegenError> {
        let jpc = std::mem::take(&mut self.jpc);
        let pc = self.pc();
        self.patch_list_aux(jpc, pc, NO_REG, pc)
    }

    /// Patch every jump on `list` to a known, already-emitted target.
    pub(crate) fn patch_list(&mut self, list: JumpList, target: usize) -> Result<(), CodegenError> {
        if target == self.pc() {
            self.patch_to_here(list)
        } else {
            debug_assert!(target < self.pc());
            self.patch_list_aux(list, target, NO_REG, target)
        }
    }

    /// Defer `list` to the current position. The emitter patches it
    /// when the next instruction arrives, so a later emission at this
    /// same pc still receives the patch.
    pub(crate) fn patch_to_here(&mut self, list: JumpList) -> Result<(), CodegenError> {
        self.get_label();
        let mut jpc = self.jpc;
        self.concat(&mut jpc, list)?;
        self.jpc = jpc;
        Ok(())
    }

    /// Append `l2` to `l1`, threading through the instruction fields.
    /// A no-op when either side is empty.
    pub(crate) fn concat(&mut self, l1: &mut JumpList, l2: JumpList) -> Result<(), CodegenError> {
        let Some(l2_head) = l2.head() else {
            return Ok(());
        };
        match l1.head() {
            None => *l1 = l2,
            Some(mut pc) => {
                // walk to the tail
                loop {
                    match self.next_jump(pc).head() {
                        Some(next) => pc = next,
                        None => break,
                    }
                }
                self.fix_jump(pc, l2_head)?;
            }
        }
        Ok(())
    }

    /// Flip the sense of the test controlling a pending jump.
    pub(crate) fn invert_jump(&mut self, pc: usize) {
        let pos = self.jump_control(pc);
        let i = self.code[pos];
        debug_assert!(
            i.opcode().is_test() && i.opcode() != OpCode::TestSet && i.opcode() != OpCode::Test
        );
        let flipped = (i.a() == 0) as u32;
        self.code[pos].set_a(flipped);
    }
}
