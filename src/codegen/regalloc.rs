use super::exprdesc::{ExpDesc, ExpKind};
use super::instr::rk_is_const;
use super::{CodegenError, FuncState};

// ── Register allocation ─────────────────────────────────────────────
//
// One index space, three zones:
//
//   [0, nactive)          named locals, pinned until their scope ends
//   [nactive, free_reg)   temporaries, released strictly LIFO
//   [free_reg, ..)        unallocated
//
// max_stack is the high-water mark of free_reg; the VM allocates that
// many registers for the function's frame.

/// Hard per-function register ceiling.
pub const STACK_LIMIT: u32 = 250;

impl FuncState {
    pub(crate) fn check_stack(&mut self, n: u32) -> Result<(), CodegenError> {
        let newstack = self.free_reg + n;
        if newstack > self.max_stack {
            if newstack > STACK_LIMIT {
                return Err(CodegenError::TooComplex { line: self.line });
            }
            self.max_stack = newstack;
        }
        Ok(())
    }

    pub(crate) fn reserve_regs(&mut self, n: u32) -> Result<(), CodegenError> {
        self.check_stack(n)?;
        self.free_reg += n;
        Ok(())
    }

    /// Release one temporary. Constants are never register-resident and
    /// named locals are pinned; both pass through untouched. Releasing
    /// out of LIFO order is a caller bug, not a recoverable error.
    pub(crate) fn free_register(&mut self, r: u32) {
        if !rk_is_const(r) && r >= self.nactive {
            self.free_reg -= 1;
            debug_assert_eq!(r, self.free_reg, "register released out of LIFO order");
        }
    }

    pub(crate) fn free_exp(&mut self, e: &ExpDesc) {
        if let ExpKind::NonReloc(r) = e.kind {
            self.free_register(r);
        }
    }

    /// Record a local's name; it occupies a reserved register but stays
    /// inactive (invisible to lookup) until `activate_locals`.
    pub(crate) fn new_local(&mut self, name: &str) {
        self.locals.push(name.to_string());
    }

    /// Promote the top `n` declared locals to active status, pinning
    /// the temporaries that hold their initial values.
    pub(crate) fn activate_locals(&mut self, n: u32) {
        self.nactive += n;
        debug_assert!(self.nactive as usize <= self.locals.len());
    }

    /// Scope exit: drop back to `n` active locals and discard every
    /// temporary above them.
    pub(crate) fn remove_locals(&mut self, n: u32) {
        self.locals.truncate(n as usize);
        self.nactive = n;
        self.free_reg = n;
    }

    /// Innermost active local with this name, if any.
    pub(crate) fn resolve_local(&self, name: &str) -> Option<u32> {
        self.locals[..self.nactive as usize]
            .iter()
            .rposition(|n| n == name)
            .map(|i| i as u32)
    }
}
