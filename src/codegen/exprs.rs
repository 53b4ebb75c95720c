use super::exprdesc::{ExpDesc, ExpKind};
use super::instr::{
    rk_from_const, Instruction, OpCode, MAXINDEXRK, NO_REG,
};
use super::jumps::JumpList;
use super::{CodegenError, FuncState};

// ── Operators ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

impl BinOp {
    pub(crate) fn arith_opcode(self) -> Option<OpCode> {
        match self {
            BinOp::Add => Some(OpCode::Add),
            BinOp::Sub => Some(OpCode::Sub),
            BinOp::Mul => Some(OpCode::Mul),
            BinOp::Div => Some(OpCode::Div),
            BinOp::Mod => Some(OpCode::Mod),
            _ => None,
        }
    }

    /// Comparison lowering: opcode, expected flag, operand swap.
    /// `a > b` compiles as `b < a`, `a >= b` as `b <= a`.
    fn comparison(self) -> Option<(OpCode, bool, bool)> {
        match self {
            BinOp::Eq => Some((OpCode::Eq, true, false)),
            BinOp::Ne => Some((OpCode::Eq, false, false)),
            BinOp::Lt => Some((OpCode::Lt, true, false)),
            BinOp::Le => Some((OpCode::Le, true, false)),
            BinOp::Gt => Some((OpCode::Lt, true, true)),
            BinOp::Ge => Some((OpCode::Le, true, true)),
            _ => None,
        }
    }
}

// ── Expression compiler ─────────────────────────────────────────────
//
// The discharge state machine: every expression descriptor is forced
// step by step toward NonReloc (a concrete register), emitting at most
// one instruction per step and never revisiting emitted code except to
// bind an unbound destination operand.

impl FuncState {
    /// Turn variable references into computed values: locals become
    /// registers outright, upvalue/global/indexed reads emit their load
    /// with the destination left unbound, calls collapse to one result.
    pub(crate) fn discharge_vars(&mut self, e: &mut ExpDesc) -> Result<(), CodegenError> {
        match e.kind {
            ExpKind::Local(r) => e.kind = ExpKind::NonReloc(r),
            ExpKind::Upval(i) => {
                let pc = self.emit(Instruction::abc(OpCode::GetUpval, 0, i, 0))?;
                e.kind = ExpKind::Reloc(pc);
            }
            ExpKind::Global(k) => {
                let pc = self.emit(Instruction::abx(OpCode::GetGlobal, 0, k))?;
                e.kind = ExpKind::Reloc(pc);
            }
            ExpKind::Indexed { table, key } => {
                self.free_register(key);
                self.free_register(table);
                let pc = self.emit(Instruction::abc(OpCode::GetTable, 0, table, key))?;
                e.kind = ExpKind::Reloc(pc);
            }
            ExpKind::Call(_) | ExpKind::Vararg(_) => self.set_one_ret(e),
            _ => {}
        }
        Ok(())
    }

    /// Fix the number of results a call/vararg produces. `None` means
    /// "all results", spilling to the top of the stack.
    pub(crate) fn set_returns(
        &mut self,
        e: &ExpDesc,
        nresults: Option<u32>,
    ) -> Result<(), CodegenError> {
        let field = nresults.map_or(0, |n| n + 1);
        match e.kind {
            ExpKind::Call(pc) => self.code[pc].set_c(field),
            ExpKind::Vararg(pc) => {
                self.code[pc].set_b(field);
                let reg = self.free_reg;
                self.code[pc].set_a(reg);
                self.reserve_regs(1)?;
            }
            _ => unreachable!("set_returns on non-multi expression"),
        }
        Ok(())
    }

    /// Collapse a call/vararg to exactly one result.
    pub(crate) fn set_one_ret(&mut self, e: &mut ExpDesc) {
        match e.kind {
            ExpKind::Call(pc) => {
                // result lands in the call's base register
                e.kind = ExpKind::NonReloc(self.code[pc].a());
            }
            ExpKind::Vararg(pc) => {
                self.code[pc].set_b(2);
                e.kind = ExpKind::Reloc(pc);
            }
            _ => {}
        }
    }

    /// Force the value into `reg`, without touching jump lists.
    fn discharge_to_reg(&mut self, e: &mut ExpDesc, reg: u32) -> Result<(), CodegenError> {
        self.discharge_vars(e)?;
        match e.kind {
            ExpKind::Nil => self.emit_nil(reg, 1)?,
            ExpKind::False => {
                self.emit(Instruction::abc(OpCode::LoadBool, reg, 0, 0))?;
            }
            ExpKind::True => {
                self.emit(Instruction::abc(OpCode::LoadBool, reg, 1, 0))?;
            }
            ExpKind::Const(k) => {
                self.emit(Instruction::abx(OpCode::LoadK, reg, k))?;
            }
            ExpKind::Number(n) => {
                let k = self.number_k(n)?;
                self.emit(Instruction::abx(OpCode::LoadK, reg, k))?;
            }
            ExpKind::Reloc(pc) => {
                // bind the unbound destination in place: no move needed
                self.code[pc].set_a(reg);
            }
            ExpKind::NonReloc(r) => {
                if r != reg {
                    self.emit(Instruction::abc(OpCode::Move, reg, r, 0))?;
                }
            }
            ExpKind::Void | ExpKind::Jump(_) => return Ok(()),
            _ => unreachable!("cannot discharge {:?}", e.kind),
        }
        e.kind = ExpKind::NonReloc(reg);
        Ok(())
    }

    fn discharge_to_any_reg(&mut self, e: &mut ExpDesc) -> Result<(), CodegenError> {
        if !matches!(e.kind, ExpKind::NonReloc(_)) {
            self.reserve_regs(1)?;
            let reg = self.free_reg - 1;
            self.discharge_to_reg(e, reg)?;
        }
        Ok(())
    }

    /// `LoadBool reg` guarded as a branch target.
    fn code_label(&mut self, reg: u32, value: bool, skip_next: bool) -> Result<usize, CodegenError> {
        self.get_label();
        self.emit(Instruction::abc(
            OpCode::LoadBool,
            reg,
            value as u32,
            skip_next as u32,
        ))
    }

    /// Full discharge: place the value in `reg` and resolve any pending
    /// true/false exits, materializing booleans when a branch needs one.
    pub(crate) fn exp_to_reg(&mut self, e: &mut ExpDesc, reg: u32) -> Result<(), CodegenError> {
        self.discharge_to_reg(e, reg)?;
        if let ExpKind::Jump(pc) = e.kind {
            let mut t = e.true_list;
            self.concat(&mut t, JumpList::single(pc))?;
            e.true_list = t;
        }
        if e.has_jumps() {
            let mut p_f = 0; // LoadBool false position
            let mut p_t = 0; // LoadBool true position
            if self.need_value(e.true_list) || self.need_value(e.false_list) {
                let fj = if matches!(e.kind, ExpKind::Jump(_)) {
                    JumpList::empty()
                } else {
                    JumpList::single(self.jump()?)
                };
                p_f = self.code_label(reg, false, true)?;
                p_t = self.code_label(reg, true, false)?;
                self.patch_to_here(fj)?;
            }
            let end = self.get_label();
            let (t, f) = (e.true_list, e.false_list);
            self.patch_list_aux(f, end, reg, p_f)?;
            self.patch_list_aux(t, end, reg, p_t)?;
        }
        e.true_list = JumpList::empty();
        e.false_list = JumpList::empty();
        e.kind = ExpKind::NonReloc(reg);
        Ok(())
    }

    /// Release the expression's temporary and re-discharge it into the
    /// next free register; operand lists build contiguously this way.
    pub(crate) fn exp_to_next_reg(&mut self, e: &mut ExpDesc) -> Result<(), CodegenError> {
        self.discharge_vars(e)?;
        self.free_exp(e);
        self.reserve_regs(1)?;
        let reg = self.free_reg - 1;
        self.exp_to_reg(e, reg)
    }

    /// Discharge into any register, reusing the current one when the
    /// expression already sits in a free (non-local) register.
    pub(crate) fn exp_to_any_reg(&mut self, e: &mut ExpDesc) -> Result<u32, CodegenError> {
        self.discharge_vars(e)?;
        if let ExpKind::NonReloc(r) = e.kind {
            if !e.has_jumps() {
                return Ok(r);
            }
            if r >= self.nactive {
                // not a local: can resolve the jumps onto it
                self.exp_to_reg(e, r)?;
                return Ok(r);
            }
        }
        self.exp_to_next_reg(e)?;
        match e.kind {
            ExpKind::NonReloc(r) => Ok(r),
            _ => unreachable!("exp_to_next_reg always yields a register"),
        }
    }

    pub(crate) fn exp_to_val(&mut self, e: &mut ExpDesc) -> Result<(), CodegenError> {
        if e.has_jumps() {
            self.exp_to_any_reg(e)?;
            Ok(())
        } else {
            self.discharge_vars(e)
        }
    }

    /// Yield an RK operand: a constant-pool encoding whenever the index
    /// fits the operand width, a register otherwise.
    pub(crate) fn exp_to_rk(&mut self, e: &mut ExpDesc) -> Result<u32, CodegenError> {
        self.exp_to_val(e)?;
        match e.kind {
            ExpKind::Number(_) | ExpKind::True | ExpKind::False | ExpKind::Nil
                if self.constants.len() as u32 <= MAXINDEXRK =>
            {
                let k = match e.kind {
                    ExpKind::Number(n) => self.number_k(n)?,
                    ExpKind::True => self.bool_k(true)?,
                    ExpKind::False => self.bool_k(false)?,
                    _ => self.nil_k()?,
                };
                e.kind = ExpKind::Const(k);
                return Ok(rk_from_const(k));
            }
            ExpKind::Const(k) if k <= MAXINDEXRK => return Ok(rk_from_const(k)),
            _ => {}
        }
        // constant does not fit an RK operand: go through a register
        self.exp_to_any_reg(e)
    }

    /// Store `ex` into the variable described by `var`.
    pub(crate) fn store_var(&mut self, var: &ExpDesc, ex: &mut ExpDesc) -> Result<(), CodegenError> {
        match var.kind {
            ExpKind::Local(r) => {
                self.free_exp(ex);
                return self.exp_to_reg(ex, r);
            }
            ExpKind::Upval(i) => {
                let r = self.exp_to_any_reg(ex)?;
                self.emit(Instruction::abc(OpCode::SetUpval, r, i, 0))?;
            }
            ExpKind::Global(k) => {
                let r = self.exp_to_any_reg(ex)?;
                self.emit(Instruction::abx(OpCode::SetGlobal, r, k))?;
            }
            ExpKind::Indexed { table, key } => {
                let r = self.exp_to_rk(ex)?;
                self.emit(Instruction::abc(OpCode::SetTable, table, key, r))?;
            }
            _ => unreachable!("store into non-variable"),
        }
        self.free_exp(ex);
        Ok(())
    }

    /// Rewrite `t` (already in a register) as the element `t[k]`.
    pub(crate) fn indexed(&mut self, t: &mut ExpDesc, k: &mut ExpDesc) -> Result<(), CodegenError> {
        let key = self.exp_to_rk(k)?;
        let table = match t.kind {
            ExpKind::NonReloc(r) | ExpKind::Local(r) => r,
            _ => unreachable!("indexed table not in a register"),
        };
        t.kind = ExpKind::Indexed { table, key };
        Ok(())
    }

    // ── Conditionals ────────────────────────────────────────────────

    fn cond_jump(
        &mut self,
        op: OpCode,
        a: u32,
        b: u32,
        c: u32,
    ) -> Result<usize, CodegenError> {
        self.emit(Instruction::abc(op, a, b, c))?;
        self.jump()
    }

    /// Emit a test that jumps when the expression's truth differs from
    /// `cond`. A trailing Not is absorbed by flipping the test.
    fn jump_on_cond(&mut self, e: &mut ExpDesc, cond: bool) -> Result<usize, CodegenError> {
        if let ExpKind::Reloc(pc) = e.kind {
            let ie = self.code[pc];
            if ie.opcode() == OpCode::Not {
                debug_assert_eq!(pc, self.code.len() - 1);
                self.code.pop();
                self.lines.pop();
                return self.cond_jump(OpCode::Test, ie.b(), 0, !cond as u32);
            }
        }
        self.discharge_to_any_reg(e)?;
        self.free_exp(e);
        let r = match e.kind {
            ExpKind::NonReloc(r) => r,
            _ => unreachable!(),
        };
        self.cond_jump(OpCode::TestSet, NO_REG, r, cond as u32)
    }

    /// Continue here only if the expression is true; false exits are
    /// collected on its false list.
    pub(crate) fn go_if_true(&mut self, e: &mut ExpDesc) -> Result<(), CodegenError> {
        self.discharge_vars(e)?;
        let pc = match e.kind {
            ExpKind::Const(_) | ExpKind::Number(_) | ExpKind::True => JumpList::empty(),
            ExpKind::Jump(pc) => {
                self.invert_jump(pc);
                JumpList::single(pc)
            }
            _ => JumpList::single(self.jump_on_cond(e, false)?),
        };
        let mut f = e.false_list;
        self.concat(&mut f, pc)?;
        e.false_list = f;
        self.patch_to_here(e.true_list)?;
        e.true_list = JumpList::empty();
        Ok(())
    }

    pub(crate) fn go_if_false(&mut self, e: &mut ExpDesc) -> Result<(), CodegenError> {
        self.discharge_vars(e)?;
        let pc = match e.kind {
            ExpKind::Nil | ExpKind::False => JumpList::empty(),
            ExpKind::Jump(pc) => JumpList::single(pc),
            _ => JumpList::single(self.jump_on_cond(e, true)?),
        };
        let mut t = e.true_list;
        self.concat(&mut t, pc)?;
        e.true_list = t;
        self.patch_to_here(e.false_list)?;
        e.false_list = JumpList::empty();
        Ok(())
    }

    fn code_not(&mut self, e: &mut ExpDesc) -> Result<(), CodegenError> {
        self.discharge_vars(e)?;
        match e.kind {
            ExpKind::Nil | ExpKind::False => e.kind = ExpKind::True,
            ExpKind::Const(_) | ExpKind::Number(_) | ExpKind::True => e.kind = ExpKind::False,
            ExpKind::Jump(pc) => self.invert_jump(pc),
            ExpKind::Reloc(_) | ExpKind::NonReloc(_) => {
                self.discharge_to_any_reg(e)?;
                self.free_exp(e);
                let r = match e.kind {
                    ExpKind::NonReloc(r) => r,
                    _ => unreachable!(),
                };
                let pc = self.emit(Instruction::abc(OpCode::Not, 0, r, 0))?;
                e.kind = ExpKind::Reloc(pc);
            }
            _ => unreachable!("cannot negate {:?}", e.kind),
        }
        // `not` swaps the exits; values on the lists become useless
        std::mem::swap(&mut e.true_list, &mut e.false_list);
        self.remove_values(e.true_list);
        self.remove_values(e.false_list);
        Ok(())
    }

    // ── Folding and arithmetic ──────────────────────────────────────

    /// Compile-time arithmetic over two bare numeric literals. Refuses
    /// zero divisors and NaN results so folding never changes runtime
    /// semantics. On success `e1` holds the folded literal.
    fn fold(op: OpCode, e1: &mut ExpDesc, e2: &ExpDesc) -> bool {
        let (Some(v1), Some(v2)) = (e1.as_number(), e2.as_number()) else {
            return false;
        };
        let r = match op {
            OpCode::Add => v1 + v2,
            OpCode::Sub => v1 - v2,
            OpCode::Mul => v1 * v2,
            OpCode::Div => {
                if v2 == 0.0 {
                    return false;
                }
                v1 / v2
            }
            OpCode::Mod => {
                if v2 == 0.0 {
                    return false;
                }
                v1 - (v1 / v2).floor() * v2
            }
            OpCode::Unm => -v1,
            _ => return false,
        };
        if r.is_nan() {
            return false;
        }
        e1.kind = ExpKind::Number(r);
        true
    }

    /// Arithmetic: fold if possible, otherwise RK both operands, free
    /// them LIFO, and emit with the destination left unbound.
    fn code_arith(
        &mut self,
        op: OpCode,
        e1: &mut ExpDesc,
        e2: &mut ExpDesc,
    ) -> Result<(), CodegenError> {
        if Self::fold(op, e1, e2) {
            return Ok(());
        }
        let o2 = if op == OpCode::Unm {
            0
        } else {
            self.exp_to_rk(e2)?
        };
        let o1 = self.exp_to_rk(e1)?;
        if o1 > o2 {
            self.free_exp(e1);
            self.free_exp(e2);
        } else {
            self.free_exp(e2);
            self.free_exp(e1);
        }
        let pc = self.emit(Instruction::abc(op, 0, o1, o2))?;
        e1.kind = ExpKind::Reloc(pc);
        e1.true_list = JumpList::empty();
        e1.false_list = JumpList::empty();
        Ok(())
    }

    /// Comparisons produce no value register: the VM instruction skips
    /// or falls into the jump emitted right behind it.
    fn code_comparison(
        &mut self,
        op: OpCode,
        flag: bool,
        swap: bool,
        e1: &mut ExpDesc,
        e2: &mut ExpDesc,
    ) -> Result<(), CodegenError> {
        let mut o1 = self.exp_to_rk(e1)?;
        let mut o2 = self.exp_to_rk(e2)?;
        self.free_exp(e2);
        self.free_exp(e1);
        if swap {
            std::mem::swap(&mut o1, &mut o2);
        }
        let pc = self.cond_jump(op, flag as u32, o1, o2)?;
        e1.kind = ExpKind::Jump(pc);
        Ok(())
    }

    // ── Operator driver (called by the parser) ──────────────────────

    pub(crate) fn prefix(&mut self, op: UnOp, e: &mut ExpDesc) -> Result<(), CodegenError> {
        match op {
            UnOp::Neg => {
                if !e.is_numeral() {
                    self.exp_to_any_reg(e)?;
                }
                let mut zero = ExpDesc::number(0.0);
                self.code_arith(OpCode::Unm, e, &mut zero)
            }
            UnOp::Not => self.code_not(e),
        }
    }

    /// Prepare the left operand before the right one is parsed.
    pub(crate) fn infix(&mut self, op: BinOp, e: &mut ExpDesc) -> Result<(), CodegenError> {
        match op {
            BinOp::And => self.go_if_true(e),
            BinOp::Or => self.go_if_false(e),
            _ if op.arith_opcode().is_some() => {
                // keep bare literals available for folding
                if !e.is_numeral() {
                    self.exp_to_rk(e)?;
                }
                Ok(())
            }
            _ => {
                self.exp_to_rk(e)?;
                Ok(())
            }
        }
    }

    /// Combine both operands once the right one is compiled.
    pub(crate) fn posfix(
        &mut self,
        op: BinOp,
        e1: &mut ExpDesc,
        e2: &mut ExpDesc,
    ) -> Result<(), CodegenError> {
        match op {
            BinOp::And => {
                debug_assert!(e1.true_list.is_empty(), "true list closed by infix");
                self.discharge_vars(e2)?;
                let mut f = e2.false_list;
                self.concat(&mut f, e1.false_list)?;
                e2.false_list = f;
                *e1 = e2.clone();
            }
            BinOp::Or => {
                debug_assert!(e1.false_list.is_empty(), "false list closed by infix");
                self.discharge_vars(e2)?;
                let mut t = e2.true_list;
                self.concat(&mut t, e1.true_list)?;
                e2.true_list = t;
                *e1 = e2.clone();
            }
            _ => {
                if let Some(opcode) = op.arith_opcode() {
                    self.code_arith(opcode, e1, e2)?;
                } else {
                    let (opcode, flag, swap) = op
                        .comparison()
                        .unwrap_or_else(|| unreachable!("non-binary operator {op:?}"));
                    self.code_comparison(opcode, flag, swap, e1, e2)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs() -> FuncState {
        FuncState::new(0, true)
    }

    #[test]
    fn fold_add_emits_nothing() {
        let mut f = fs();
        let mut e1 = ExpDesc::number(2.0);
        let mut e2 = ExpDesc::number(3.0);
        f.infix(BinOp::Add, &mut e1).unwrap();
        f.posfix(BinOp::Add, &mut e1, &mut e2).unwrap();
        assert_eq!(e1.kind, ExpKind::Number(5.0));
        assert!(f.code.is_empty());
    }

    #[test]
    fn fold_refuses_zero_divisor() {
        let mut e1 = ExpDesc::number(1.0);
        let e2 = ExpDesc::number(0.0);
        assert!(!FuncState::fold(OpCode::Div, &mut e1, &e2));
        assert_eq!(e1.kind, ExpKind::Number(1.0));
        assert!(!FuncState::fold(OpCode::Mod, &mut e1, &e2));
    }

    #[test]
    fn fold_refuses_nan_result() {
        let mut e1 = ExpDesc::number(f64::INFINITY);
        let e2 = ExpDesc::number(f64::INFINITY);
        assert!(!FuncState::fold(OpCode::Sub, &mut e1, &e2));
    }

    #[test]
    fn fold_skips_pooled_constants() {
        let mut f = fs();
        let k = f.number_k(2.0).unwrap();
        let mut e1 = ExpDesc::new(ExpKind::Const(k));
        let mut e2 = ExpDesc::number(3.0);
        f.posfix(BinOp::Add, &mut e1, &mut e2).unwrap();
        // not folded: a real Add instruction was emitted
        assert!(matches!(e1.kind, ExpKind::Reloc(_)));
        assert_eq!(f.code.len(), 1);
        assert_eq!(f.code[0].opcode(), OpCode::Add);
    }

    #[test]
    fn unary_minus_folds() {
        let mut f = fs();
        let mut e = ExpDesc::number(7.0);
        f.prefix(UnOp::Neg, &mut e).unwrap();
        assert_eq!(e.kind, ExpKind::Number(-7.0));
        assert!(f.code.is_empty());
    }

    #[test]
    fn discharge_is_idempotent_on_own_register() {
        let mut f = fs();
        f.reserve_regs(1).unwrap();
        let mut e = ExpDesc::new(ExpKind::NonReloc(0));
        f.exp_to_reg(&mut e, 0).unwrap();
        assert_eq!(e.kind, ExpKind::NonReloc(0));
        assert!(f.code.is_empty());
    }

    #[test]
    fn arith_result_is_relocatable() {
        let mut f = fs();
        f.new_local("a");
        f.new_local("b");
        f.reserve_regs(2).unwrap();
        f.activate_locals(2);

        let mut e1 = ExpDesc::new(ExpKind::Local(0));
        let mut e2 = ExpDesc::new(ExpKind::Local(1));
        f.infix(BinOp::Add, &mut e1).unwrap();
        f.posfix(BinOp::Add, &mut e1, &mut e2).unwrap();

        let ExpKind::Reloc(pc) = e1.kind else {
            panic!("expected relocatable result, got {:?}", e1.kind)
        };
        assert_eq!(f.code[pc].opcode(), OpCode::Add);
        // destination bound directly where the caller wants it
        f.exp_to_reg(&mut e1, 5).unwrap();
        assert_eq!(f.code[pc].a(), 5);
        assert_eq!(f.code.len(), 1);
    }

    #[test]
    fn rk_prefers_constants() {
        let mut f = fs();
        let mut e = ExpDesc::number(1.5);
        let rk = f.exp_to_rk(&mut e).unwrap();
        assert!(crate::codegen::instr::rk_is_const(rk));
        assert!(f.code.is_empty());
    }

    #[test]
    fn comparison_yields_jump_descriptor() {
        let mut f = fs();
        f.new_local("a");
        f.reserve_regs(1).unwrap();
        f.activate_locals(1);
        let mut e1 = ExpDesc::new(ExpKind::Local(0));
        let mut e2 = ExpDesc::number(1.0);
        f.infix(BinOp::Lt, &mut e1).unwrap();
        f.posfix(BinOp::Lt, &mut e1, &mut e2).unwrap();
        let ExpKind::Jump(pc) = e1.kind else {
            panic!("expected jump descriptor")
        };
        assert_eq!(f.code[pc].opcode(), OpCode::Jmp);
        assert_eq!(f.code[pc - 1].opcode(), OpCode::Lt);
    }

    #[test]
    fn greater_than_swaps_operands() {
        let mut f = fs();
        f.new_local("a");
        f.new_local("b");
        f.reserve_regs(2).unwrap();
        f.activate_locals(2);
        let mut e1 = ExpDesc::new(ExpKind::Local(0));
        let mut e2 = ExpDesc::new(ExpKind::Local(1));
        f.infix(BinOp::Gt, &mut e1).unwrap();
        f.posfix(BinOp::Gt, &mut e1, &mut e2).unwrap();
        let lt = f.code[f.code.len() - 2];
        assert_eq!(lt.opcode(), OpCode::Lt);
        assert_eq!((lt.b(), lt.c()), (1, 0)); // a > b emitted as b < a
    }
}
