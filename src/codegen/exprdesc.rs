use super::jumps::JumpList;

// ── Expression descriptors ──────────────────────────────────────────
//
// An ExpDesc says where an expression's value currently lives and how
// to finish materializing it. The parser creates one per syntactic
// value, the expression compiler mutates it toward NonReloc, and the
// enclosing construct consumes it before the statement ends.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpKind {
    /// No value (empty expression list, call with no results).
    Void,
    Nil,
    True,
    False,
    /// Numeric literal, not yet in the constant pool.
    Number(f64),
    /// Constant pool index.
    Const(u32),
    /// Value lives in a local variable's register.
    Local(u32),
    /// Upvalue index into the enclosing function.
    Upval(u32),
    /// Global; payload is the name's constant pool index.
    Global(u32),
    /// Table element: table register + RK-encoded key.
    Indexed { table: u32, key: u32 },
    /// Pending conditional jump at this instruction index.
    Jump(usize),
    /// Instruction already emitted, destination register still unbound.
    Reloc(usize),
    /// Value sits in a concrete register.
    NonReloc(u32),
    /// Call instruction whose return count is still adjustable.
    Call(usize),
    /// Vararg instruction whose result count is still adjustable.
    Vararg(usize),
}

#[derive(Debug, Clone)]
pub struct ExpDesc {
    pub kind: ExpKind,
    /// Jumps taken when the expression is true.
    pub true_list: JumpList,
    /// Jumps taken when the expression is false.
    pub false_list: JumpList,
}

impl ExpDesc {
    pub fn new(kind: ExpKind) -> ExpDesc {
        ExpDesc {
            kind,
            true_list: JumpList::empty(),
            false_list: JumpList::empty(),
        }
    }

    pub fn void() -> ExpDesc {
        ExpDesc::new(ExpKind::Void)
    }

    pub fn number(n: f64) -> ExpDesc {
        ExpDesc::new(ExpKind::Number(n))
    }

    pub fn has_jumps(&self) -> bool {
        !self.true_list.is_empty() || !self.false_list.is_empty()
    }

    /// A bare numeric literal: foldable. A literal that carries pending
    /// jump lists is part of a conditional and must not be folded.
    pub fn is_numeral(&self) -> bool {
        matches!(self.kind, ExpKind::Number(_)) && !self.has_jumps()
    }

    pub(crate) fn as_number(&self) -> Option<f64> {
        match self.kind {
            ExpKind::Number(n) if !self.has_jumps() => Some(n),
            _ => None,
        }
    }
}
