use std::collections::HashMap;

use serde::Serialize;

pub mod constants;
pub mod exprdesc;
pub mod exprs;
pub mod instr;
pub mod jumps;
pub mod regalloc;

use constants::{ConstKey, Value};
use instr::{Instruction, OpCode, MAXARG_BX};
use jumps::JumpList;

// ── Errors ──────────────────────────────────────────────────────────
//
// All of these are fatal to the compilation unit: the input exceeds a
// hard structural limit. Each carries the source line active when the
// limit was hit.

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("line {line}: function or expression too complex")]
    TooComplex { line: u32 },
    #[error("line {line}: control structure too long")]
    ControlTooLong { line: u32 },
    #[error("line {line}: constant table overflow")]
    ConstantOverflow { line: u32 },
    #[error("line {line}: function too long")]
    FunctionTooLong { line: u32 },
    #[error("line {line}: too many upvalues")]
    TooManyUpvalues { line: u32 },
    #[error("line {line}: too many nested functions")]
    TooManyProtos { line: u32 },
}

/// Instruction-count ceiling per function. Effectively unreachable,
/// but checked rather than silently wrapped.
pub const MAX_CODE: usize = i32::MAX as usize;

/// Upvalue slots per function.
pub const MAX_UPVALUES: usize = 60;

// ── Compiled artifact ───────────────────────────────────────────────

/// A finished function: what the VM consumes. The main chunk is a
/// vararg Proto whose `protos` holds every nested function.
#[derive(Debug, Clone, Serialize)]
pub struct Proto {
    pub code: Vec<Instruction>,
    /// Source line per instruction, parallel to `code`.
    pub lines: Vec<u32>,
    pub constants: Vec<Value>,
    pub protos: Vec<Proto>,
    pub num_params: u8,
    pub is_vararg: bool,
    pub max_stack: u32,
}

impl Proto {
    pub fn disassemble(&self, name: &str) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "function {name} ({} params, {} registers, {} constants)",
            self.num_params,
            self.max_stack,
            self.constants.len()
        );
        for (pc, i) in self.code.iter().enumerate() {
            let _ = writeln!(out, "  [{pc:3}] line {:<4} {i}", self.lines[pc]);
        }
        for (ki, k) in self.constants.iter().enumerate() {
            let _ = writeln!(out, "  k{ki} = {k}");
        }
        for (pi, p) in self.protos.iter().enumerate() {
            out.push_str(&p.disassemble(&format!("{name}.{pi}")));
        }
        out
    }
}

// ── Per-function compile state ──────────────────────────────────────

/// An enclosing block scope: where its locals start and where `break`
/// escapes to, if it is a loop.
#[derive(Debug)]
pub(crate) struct Block {
    pub break_list: JumpList,
    pub nactive_outer: u32,
    pub breakable: bool,
}

/// One upvalue captured by a function: either a parent local (by
/// register) or a parent upvalue (by index).
#[derive(Debug, Clone)]
pub(crate) struct UpvalDesc {
    pub name: String,
    pub in_stack: bool,
    pub index: u32,
}

/// State for one function being compiled. Exactly one writer; nested
/// functions own their own state, chained through `parent` for
/// upvalue resolution.
pub struct FuncState {
    pub code: Vec<Instruction>,
    pub lines: Vec<u32>,
    pub constants: Vec<Value>,
    pub(crate) const_index: HashMap<ConstKey, u32>,
    pub(crate) protos: Vec<Proto>,
    pub(crate) upvals: Vec<UpvalDesc>,
    pub(crate) blocks: Vec<Block>,
    pub(crate) parent: Option<Box<FuncState>>,
    /// Declared local names; the first `nactive` are in scope.
    pub(crate) locals: Vec<String>,
    /// Count of live named locals (register boundary).
    pub(crate) nactive: u32,
    /// First unallocated register.
    pub(crate) free_reg: u32,
    /// High-water mark of `free_reg`: the frame size the VM allocates.
    pub max_stack: u32,
    /// Jumps deferred to the next emitted instruction.
    pub(crate) jpc: JumpList,
    /// Highest pc that is a jump target; peephole merges stop here.
    pub(crate) last_target: usize,
    /// Source line for the next emitted instruction.
    pub(crate) line: u32,
    pub(crate) num_params: u8,
    pub(crate) is_vararg: bool,
}

impl FuncState {
    pub fn new(num_params: u8, is_vararg: bool) -> FuncState {
        FuncState {
            code: Vec::new(),
            lines: Vec::new(),
            constants: Vec::new(),
            const_index: HashMap::new(),
            protos: Vec::new(),
            upvals: Vec::new(),
            blocks: Vec::new(),
            parent: None,
            locals: Vec::new(),
            nactive: 0,
            free_reg: 0,
            max_stack: num_params as u32,
            jpc: JumpList::empty(),
            last_target: 0,
            line: 1,
            num_params,
            is_vararg,
        }
    }

    /// Next instruction slot.
    #[inline]
    pub(crate) fn pc(&self) -> usize {
        self.code.len()
    }

    pub(crate) fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    /// The single choke point all instructions pass through. Jumps
    /// deferred to "here" are resolved first, so new code never
    /// obscures the position they refer to.
    pub(crate) fn emit(&mut self, i: Instruction) -> Result<usize, CodegenError> {
        self.discharge_jpc()?;
        if self.code.len() >= MAX_CODE {
            return Err(CodegenError::FunctionTooLong { line: self.line });
        }
        self.code.push(i);
        self.lines.push(self.line);
        Ok(self.code.len() - 1)
    }

    /// Set `n` registers starting at `from` to nil. Extends an
    /// adjacent LoadNil instead of emitting, unless the current
    /// position is a jump target.
    pub(crate) fn emit_nil(&mut self, from: u32, n: u32) -> Result<(), CodegenError> {
        if self.pc() == 0 {
            // function start: fresh registers are already nil
            if from >= self.nactive {
                return Ok(());
            }
        } else if self.pc() > self.last_target {
            let prev_pc = self.pc() - 1;
            let prev = &mut self.code[prev_pc];
            if prev.opcode() == OpCode::LoadNil {
                let pfrom = prev.a();
                let pto = prev.b();
                if pfrom <= from && from <= pto + 1 {
                    if from + n - 1 > pto {
                        prev.set_b(from + n - 1);
                    }
                    return Ok(());
                }
            }
        }
        self.emit(Instruction::abc(OpCode::LoadNil, from, from + n - 1, 0))?;
        Ok(())
    }

    /// `return` of `nret` values starting at `first`; `None` returns
    /// everything up to the stack top.
    pub(crate) fn emit_return(&mut self, first: u32, nret: Option<u32>) -> Result<(), CodegenError> {
        let b = nret.map_or(0, |n| n + 1);
        self.emit(Instruction::abc(OpCode::Return, first, b, 0))?;
        Ok(())
    }

    pub(crate) fn enter_block(&mut self, breakable: bool) {
        self.blocks.push(Block {
            break_list: JumpList::empty(),
            nactive_outer: self.nactive,
            breakable,
        });
    }

    /// Scope exit is a hard reset: locals die, temporaries are
    /// discarded, breaks land here.
    pub(crate) fn leave_block(&mut self) -> Result<(), CodegenError> {
        let bl = self.blocks.pop().expect("leave_block without enter_block");
        self.remove_locals(bl.nactive_outer);
        self.patch_to_here(bl.break_list)
    }

    /// Register a `break` jump with the innermost enclosing loop.
    /// Returns false when there is none (the parser reports it).
    pub(crate) fn register_break(&mut self) -> Result<bool, CodegenError> {
        let Some(idx) = self.blocks.iter().rposition(|b| b.breakable) else {
            return Ok(false);
        };
        let j = self.jump()?;
        let mut list = self.blocks[idx].break_list;
        self.concat(&mut list, JumpList::single(j))?;
        self.blocks[idx].break_list = list;
        Ok(true)
    }

    /// Find or intern an upvalue for `name`, given where the enclosing
    /// function keeps it.
    pub(crate) fn index_upvalue(
        &mut self,
        name: &str,
        in_stack: bool,
        index: u32,
    ) -> Result<u32, CodegenError> {
        if let Some(i) = self.upvals.iter().position(|u| u.name == name) {
            return Ok(i as u32);
        }
        if self.upvals.len() >= MAX_UPVALUES {
            return Err(CodegenError::TooManyUpvalues { line: self.line });
        }
        self.upvals.push(UpvalDesc {
            name: name.to_string(),
            in_stack,
            index,
        });
        Ok(self.upvals.len() as u32 - 1)
    }

    /// Register a nested function's finished Proto, for Closure's Bx.
    pub(crate) fn add_proto(&mut self, p: Proto) -> Result<u32, CodegenError> {
        if self.protos.len() as u32 > MAXARG_BX {
            return Err(CodegenError::TooManyProtos { line: self.line });
        }
        self.protos.push(p);
        Ok(self.protos.len() as u32 - 1)
    }

    /// Seal the function: emit the implicit final return and produce
    /// the artifact. No jump may still hold the unpatched sentinel
    /// after this.
    pub(crate) fn finish(mut self) -> Result<(Proto, Vec<UpvalDesc>), CodegenError> {
        self.emit_return(0, Some(0))?;
        debug_assert!(self.jpc.is_empty(), "deferred jumps survived the final return");
        let proto = Proto {
            code: self.code,
            lines: self.lines,
            constants: self.constants,
            protos: self.protos,
            num_params: self.num_params,
            is_vararg: self.is_vararg,
            max_stack: self.max_stack.max(2),
        };
        Ok((proto, self.upvals))
    }
}
