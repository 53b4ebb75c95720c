use crate::codegen::exprdesc::{ExpDesc, ExpKind};
use crate::codegen::exprs::{BinOp, UnOp};
use crate::codegen::instr::{Instruction, OpCode, MAXARG_B};
use crate::codegen::jumps::JumpList;
use crate::codegen::{CodegenError, FuncState, Proto};
use crate::lexer::Token;
use crate::Error;

// ── Single-pass parser ──────────────────────────────────────────────
//
// There is no syntax tree: every recognized production calls straight
// into the code generator, so instructions stream out while the token
// stream is still being consumed. Nested functions recurse into a
// fresh FuncState and finish before the enclosing one resumes.

/// Array elements buffered per SetList batch.
const FIELDS_PER_FLUSH: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: expected {expected}, got {found}")]
    Unexpected {
        line: u32,
        expected: String,
        found: String,
    },
    #[error("unexpected end of input: expected {expected}")]
    UnexpectedEof { expected: String },
    #[error("line {line}: break outside a loop")]
    BreakOutsideLoop { line: u32 },
    #[error("line {line}: cannot use '...' outside a vararg function")]
    VarargOutsideVararg { line: u32 },
    #[error("line {line}: cannot assign to this expression")]
    NotAssignable { line: u32 },
    #[error("line {line}: expression is not a statement")]
    ExpressionStatement { line: u32 },
}

pub struct Parser {
    tokens: Vec<Token>,
    /// Source line per token, parallel to `tokens`.
    lines: Vec<u32>,
    pos: usize,
    fs: FuncState,
}

type PResult<T> = std::result::Result<T, Error>;

/// Compile a whole source text as the main chunk (always vararg).
pub fn parse_chunk(source: &str) -> PResult<Proto> {
    let spanned = crate::lexer::lex(source)?;
    let mut lines = Vec::with_capacity(spanned.len());
    let mut tokens = Vec::with_capacity(spanned.len());
    // spans are monotonic, so one forward scan covers the whole source
    let mut line = 1u32;
    let mut scanned = 0;
    for (tok, span) in spanned {
        line += source[scanned..span.start].matches('\n').count() as u32;
        scanned = span.start;
        lines.push(line);
        tokens.push(tok);
    }
    let mut p = Parser {
        tokens,
        lines,
        pos: 0,
        fs: FuncState::new(0, true),
    };
    p.statement_list()?;
    if let Some(tok) = p.peek() {
        return Err(p.unexpected("end of input", &format!("{tok:?}")).into());
    }
    let fs = std::mem::replace(&mut p.fs, FuncState::new(0, true));
    let (proto, _upvals) = fs.finish()?;
    Ok(proto)
}

impl Parser {
    // ── Token plumbing ──────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn line(&self) -> u32 {
        self.lines
            .get(self.pos)
            .or(self.lines.last())
            .copied()
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.fs.set_line(self.lines[self.pos]);
            self.pos += 1;
        }
        tok
    }

    fn accept(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Token, what: &str) -> PResult<()> {
        if self.accept(tok) {
            Ok(())
        } else {
            match self.peek() {
                Some(found) => Err(self.unexpected(what, &format!("{found:?}")).into()),
                None => Err(ParseError::UnexpectedEof {
                    expected: what.to_string(),
                }
                .into()),
            }
        }
    }

    fn expect_name(&mut self) -> PResult<String> {
        match self.peek().cloned() {
            Some(Token::Name(n)) => {
                self.advance();
                Ok(n)
            }
            Some(found) => Err(self.unexpected("a name", &format!("{found:?}")).into()),
            None => Err(ParseError::UnexpectedEof {
                expected: "a name".to_string(),
            }
            .into()),
        }
    }

    fn unexpected(&self, expected: &str, found: &str) -> ParseError {
        ParseError::Unexpected {
            line: self.line(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    // ── Statements ──────────────────────────────────────────────────

    fn block_follow(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(Token::End) | Some(Token::Else) | Some(Token::Elseif) | Some(Token::Until)
        )
    }

    /// Statements until a block terminator. After each one, every
    /// temporary above the active locals is dead.
    fn statement_list(&mut self) -> PResult<()> {
        while !self.block_follow() {
            let is_return = self.statement()?;
            self.accept(&Token::Semi);
            debug_assert!(self.fs.free_reg >= self.fs.nactive);
            self.fs.free_reg = self.fs.nactive;
            if is_return {
                break;
            }
        }
        Ok(())
    }

    /// A scoped block: locals declared inside die at the end.
    fn block(&mut self) -> PResult<()> {
        self.fs.enter_block(false);
        self.statement_list()?;
        self.fs.leave_block()?;
        Ok(())
    }

    /// Returns true for `return`, which must close its block.
    fn statement(&mut self) -> PResult<bool> {
        match self.peek() {
            Some(Token::If) => self.if_stat()?,
            Some(Token::While) => self.while_stat()?,
            Some(Token::Repeat) => self.repeat_stat()?,
            Some(Token::Do) => {
                self.advance();
                self.block()?;
                self.expect(&Token::End, "'end' to close 'do'")?;
            }
            Some(Token::Local) => self.local_stat()?,
            Some(Token::Function) => self.function_stat()?,
            Some(Token::Return) => {
                self.return_stat()?;
                return Ok(true);
            }
            Some(Token::Break) => {
                let line = self.line();
                self.advance();
                if !self.fs.register_break()? {
                    return Err(ParseError::BreakOutsideLoop { line }.into());
                }
            }
            _ => self.expr_stat()?,
        }
        Ok(false)
    }

    /// `if cond then block {elseif cond then block} [else block] end`
    fn if_stat(&mut self) -> PResult<()> {
        let mut escapes = JumpList::empty();
        let mut false_exits = self.test_then_block()?;
        while self.peek() == Some(&Token::Elseif) {
            self.escape_to(&mut escapes)?;
            self.fs.patch_to_here(false_exits)?;
            false_exits = self.test_then_block()?;
        }
        if self.accept(&Token::Else) {
            self.escape_to(&mut escapes)?;
            self.fs.patch_to_here(false_exits)?;
            self.block()?;
        } else {
            self.fs.concat(&mut escapes, false_exits)?;
        }
        self.fs.patch_to_here(escapes)?;
        self.expect(&Token::End, "'end' to close 'if'")
    }

    fn escape_to(&mut self, escapes: &mut JumpList) -> PResult<()> {
        let j = self.fs.jump()?;
        self.fs
            .concat(escapes, JumpList::single(j))?;
        Ok(())
    }

    /// `if`/`elseif` condition plus its then-block; yields the false
    /// exits still awaiting a target.
    fn test_then_block(&mut self) -> PResult<JumpList> {
        self.advance(); // skip `if` / `elseif`
        let false_exits = self.cond()?;
        self.expect(&Token::Then, "'then'")?;
        self.block()?;
        Ok(false_exits)
    }

    /// Compile a condition; control continues when it is true, and the
    /// returned list holds every jump taken when it is false.
    fn cond(&mut self) -> PResult<JumpList> {
        let mut e = self.expr()?;
        if e.kind == ExpKind::Nil {
            e.kind = ExpKind::False; // same truth value, foldable branch
        }
        self.fs.go_if_true(&mut e)?;
        Ok(e.false_list)
    }

    fn while_stat(&mut self) -> PResult<()> {
        self.advance();
        let top = self.fs.get_label();
        let false_exits = self.cond()?;
        self.fs.enter_block(true);
        self.expect(&Token::Do, "'do'")?;
        self.block()?;
        let back = self.fs.jump()?;
        self.fs
            .patch_list(JumpList::single(back), top)?;
        self.expect(&Token::End, "'end' to close 'while'")?;
        self.fs.leave_block()?;
        self.fs.patch_to_here(false_exits)?;
        Ok(())
    }

    /// `repeat block until cond`; body locals stay visible in the
    /// condition, so the scope closes only after it.
    fn repeat_stat(&mut self) -> PResult<()> {
        self.advance();
        let top = self.fs.get_label();
        self.fs.enter_block(true); // loop
        self.fs.enter_block(false); // scope including the condition
        self.statement_list()?;
        self.expect(&Token::Until, "'until'")?;
        let false_exits = self.cond()?;
        self.fs.leave_block()?;
        self.fs.patch_list(false_exits, top)?;
        self.fs.leave_block()?;
        Ok(())
    }

    /// `local` names [= explist] | `local function` name body
    fn local_stat(&mut self) -> PResult<()> {
        self.advance();
        if self.accept(&Token::Function) {
            let name = self.expect_name()?;
            self.fs.new_local(&name);
            let target = ExpDesc::new(ExpKind::Local(self.fs.free_reg));
            self.fs.reserve_regs(1)?;
            self.fs.activate_locals(1);
            // the function can refer to itself through the local
            let mut body = self.function_body()?;
            self.fs.store_var(&target, &mut body)?;
            return Ok(());
        }

        let mut nvars = 0u32;
        loop {
            let name = self.expect_name()?;
            self.fs.new_local(&name);
            nvars += 1;
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        let (nexps, mut e) = if self.accept(&Token::Assign) {
            self.explist()?
        } else {
            (0, ExpDesc::void())
        };
        self.adjust_assign(nvars, nexps, &mut e)?;
        self.fs.activate_locals(nvars);
        Ok(())
    }

    /// `function name(params) body end` — sugar for assigning a
    /// function expression to a global or local.
    fn function_stat(&mut self) -> PResult<()> {
        self.advance();
        let name = self.expect_name()?;
        let target = self.single_var(&name)?;
        let mut body = self.function_body()?;
        self.fs.store_var(&target, &mut body)?;
        Ok(())
    }

    fn return_stat(&mut self) -> PResult<()> {
        self.advance();
        if self.block_follow() || self.peek() == Some(&Token::Semi) {
            return Ok(self.fs.emit_return(0, Some(0))?);
        }
        let (n, mut e) = self.explist()?;
        if matches!(e.kind, ExpKind::Call(_) | ExpKind::Vararg(_)) {
            self.fs.set_returns(&e, None)?;
            let first = self.fs.nactive;
            self.fs.emit_return(first, None)?;
        } else if n == 1 {
            let first = self.fs.exp_to_any_reg(&mut e)?;
            self.fs.emit_return(first, Some(1))?;
        } else {
            self.fs.exp_to_next_reg(&mut e)?;
            let first = self.fs.nactive;
            debug_assert_eq!(n, self.fs.free_reg - first);
            self.fs.emit_return(first, Some(n))?;
        }
        Ok(())
    }

    /// Call statement or single-target assignment.
    fn expr_stat(&mut self) -> PResult<()> {
        let line = self.line();
        let e = self.suffixed_expr()?;
        if self.accept(&Token::Assign) {
            match e.kind {
                ExpKind::Local(_)
                | ExpKind::Upval(_)
                | ExpKind::Global(_)
                | ExpKind::Indexed { .. } => {}
                _ => return Err(ParseError::NotAssignable { line }.into()),
            }
            let mut rhs = self.expr()?;
            self.fs.store_var(&e, &mut rhs)?;
            return Ok(());
        }
        match e.kind {
            ExpKind::Call(pc) => {
                // statement call: discard all results
                self.fs.code[pc].set_c(1);
                Ok(())
            }
            _ => Err(ParseError::ExpressionStatement { line }.into()),
        }
    }

    /// Balance declared names against initializer values, padding with
    /// nil loads or widening a trailing call/vararg.
    fn adjust_assign(&mut self, nvars: u32, nexps: u32, e: &mut ExpDesc) -> PResult<()> {
        let extra = nvars as i64 - nexps as i64;
        if matches!(e.kind, ExpKind::Call(_) | ExpKind::Vararg(_)) {
            let want = (extra + 1).max(0) as u32; // the call itself counts
            self.fs.set_returns(e, Some(want))?;
            if want > 1 {
                self.fs.reserve_regs(want - 1)?;
            }
        } else {
            if e.kind != ExpKind::Void {
                self.fs.exp_to_next_reg(e)?;
            }
            if extra > 0 {
                let reg = self.fs.free_reg;
                self.fs.reserve_regs(extra as u32)?;
                self.fs.emit_nil(reg, extra as u32)?;
            }
        }
        Ok(())
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn explist(&mut self) -> PResult<(u32, ExpDesc)> {
        let mut n = 1;
        let mut e = self.expr()?;
        while self.accept(&Token::Comma) {
            self.fs.exp_to_next_reg(&mut e)?;
            e = self.expr()?;
            n += 1;
        }
        Ok((n, e))
    }

    fn expr(&mut self) -> PResult<ExpDesc> {
        self.sub_expr(0)
    }

    /// Precedence climbing: consume operators binding tighter than
    /// `limit`, calling infix/posfix around each right operand.
    fn sub_expr(&mut self, limit: u8) -> PResult<ExpDesc> {
        let mut e = if let Some(uop) = self.unary_op() {
            self.advance();
            let mut operand = self.sub_expr(UNARY_PRIORITY)?;
            self.fs.prefix(uop, &mut operand)?;
            operand
        } else {
            self.simple_expr()?
        };
        while let Some(op) = self.binary_op() {
            let (left, right) = priority(op);
            if left <= limit {
                break;
            }
            self.advance();
            self.fs.infix(op, &mut e)?;
            let mut e2 = self.sub_expr(right)?;
            self.fs.posfix(op, &mut e, &mut e2)?;
        }
        Ok(e)
    }

    fn unary_op(&self) -> Option<UnOp> {
        match self.peek() {
            Some(Token::Minus) => Some(UnOp::Neg),
            Some(Token::Not) => Some(UnOp::Not),
            _ => None,
        }
    }

    fn binary_op(&self) -> Option<BinOp> {
        match self.peek() {
            Some(Token::Plus) => Some(BinOp::Add),
            Some(Token::Minus) => Some(BinOp::Sub),
            Some(Token::Star) => Some(BinOp::Mul),
            Some(Token::Slash) => Some(BinOp::Div),
            Some(Token::Percent) => Some(BinOp::Mod),
            Some(Token::EqEq) => Some(BinOp::Eq),
            Some(Token::NotEq) => Some(BinOp::Ne),
            Some(Token::Less) => Some(BinOp::Lt),
            Some(Token::LessEq) => Some(BinOp::Le),
            Some(Token::Greater) => Some(BinOp::Gt),
            Some(Token::GreaterEq) => Some(BinOp::Ge),
            Some(Token::And) => Some(BinOp::And),
            Some(Token::Or) => Some(BinOp::Or),
            _ => None,
        }
    }

    fn simple_expr(&mut self) -> PResult<ExpDesc> {
        let e = match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.advance();
                ExpDesc::number(n)
            }
            Some(Token::Str(s)) => {
                self.advance();
                let k = self.fs.string_k(&s)?;
                ExpDesc::new(ExpKind::Const(k))
            }
            Some(Token::Nil) => {
                self.advance();
                ExpDesc::new(ExpKind::Nil)
            }
            Some(Token::True) => {
                self.advance();
                ExpDesc::new(ExpKind::True)
            }
            Some(Token::False) => {
                self.advance();
                ExpDesc::new(ExpKind::False)
            }
            Some(Token::Ellipsis) => {
                let line = self.line();
                self.advance();
                if !self.fs.is_vararg {
                    return Err(ParseError::VarargOutsideVararg { line }.into());
                }
                let pc = self.fs.emit(Instruction::abc(OpCode::Vararg, 0, 1, 0))?;
                ExpDesc::new(ExpKind::Vararg(pc))
            }
            Some(Token::LBrace) => self.table_constructor()?,
            Some(Token::Function) => {
                self.advance();
                self.function_body()?
            }
            _ => return self.suffixed_expr(),
        };
        Ok(e)
    }

    /// primary expression plus `.name`, `[k]`, and call suffixes.
    fn suffixed_expr(&mut self) -> PResult<ExpDesc> {
        let mut e = self.primary_expr()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let name = self.expect_name()?;
                    self.fs.exp_to_any_reg(&mut e)?;
                    let k = self.fs.string_k(&name)?;
                    let mut key = ExpDesc::new(ExpKind::Const(k));
                    self.fs.indexed(&mut e, &mut key)?;
                }
                Some(Token::LBracket) => {
                    self.advance();
                    self.fs.exp_to_any_reg(&mut e)?;
                    let mut key = self.expr()?;
                    self.fs.exp_to_val(&mut key)?;
                    self.expect(&Token::RBracket, "']'")?;
                    self.fs.indexed(&mut e, &mut key)?;
                }
                Some(Token::LParen) => {
                    self.call_suffix(&mut e)?;
                }
                _ => return Ok(e),
            }
        }
    }

    fn primary_expr(&mut self) -> PResult<ExpDesc> {
        match self.peek().cloned() {
            Some(Token::Name(name)) => {
                self.advance();
                self.single_var(&name)
            }
            Some(Token::LParen) => {
                self.advance();
                let mut e = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                // parentheses truncate multiple results to one
                self.fs.discharge_vars(&mut e)?;
                Ok(e)
            }
            Some(found) => Err(self.unexpected("an expression", &format!("{found:?}")).into()),
            None => Err(ParseError::UnexpectedEof {
                expected: "an expression".to_string(),
            }
            .into()),
        }
    }

    /// Resolve a name: active local, captured upvalue, else global.
    fn single_var(&mut self, name: &str) -> PResult<ExpDesc> {
        match resolve_var(&mut self.fs, name)? {
            Some(kind) => Ok(ExpDesc::new(kind)),
            None => {
                let k = self.fs.string_k(name)?;
                Ok(ExpDesc::new(ExpKind::Global(k)))
            }
        }
    }

    /// `(args)` — the callee is already compiled; arguments evaluate
    /// left to right into consecutive registers above it.
    fn call_suffix(&mut self, e: &mut ExpDesc) -> PResult<()> {
        self.fs.exp_to_next_reg(e)?;
        let base = match e.kind {
            ExpKind::NonReloc(r) => r,
            _ => unreachable!("callee always lands in a register"),
        };
        self.expect(&Token::LParen, "'('")?;

        let nparams;
        if self.accept(&Token::RParen) {
            nparams = Some(0);
        } else {
            let (_, mut last) = self.explist()?;
            if matches!(last.kind, ExpKind::Call(_) | ExpKind::Vararg(_)) {
                self.fs.set_returns(&last, None)?;
                nparams = None; // open argument count
            } else {
                self.fs.exp_to_next_reg(&mut last)?;
                nparams = Some(self.fs.free_reg - (base + 1));
            }
            self.expect(&Token::RParen, "')'")?;
        }

        let b = nparams.map_or(0, |n| n + 1);
        let pc = self.fs.emit(Instruction::abc(OpCode::Call, base, b, 2))?;
        // the call consumes its arguments and leaves one result slot
        self.fs.free_reg = base + 1;
        *e = ExpDesc::new(ExpKind::Call(pc));
        Ok(())
    }

    /// `{e1, e2, ...}` — array-style constructor. Elements flush to
    /// the table in SetList batches so register use stays bounded.
    fn table_constructor(&mut self) -> PResult<ExpDesc> {
        self.expect(&Token::LBrace, "'{'")?;
        let pc = self.fs.emit(Instruction::abc(OpCode::NewTable, 0, 0, 0))?;
        let mut t = ExpDesc::new(ExpKind::Reloc(pc));
        self.fs.exp_to_next_reg(&mut t)?;
        let base = match t.kind {
            ExpKind::NonReloc(r) => r,
            _ => unreachable!(),
        };

        // the last item stays undischarged until the brace: a trailing
        // call or vararg expands into the array instead of truncating
        let mut total = 0u32;
        let mut pending = 0u32;
        let mut last: Option<ExpDesc> = None;
        while self.peek() != Some(&Token::RBrace) {
            if let Some(mut prev) = last.take() {
                self.fs.exp_to_next_reg(&mut prev)?;
                total += 1;
                pending += 1;
                if pending == FIELDS_PER_FLUSH {
                    self.flush_fields(base, pending, total)?;
                    pending = 0;
                }
            }
            last = Some(self.expr()?);
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        if let Some(mut item) = last {
            if matches!(item.kind, ExpKind::Call(_) | ExpKind::Vararg(_)) {
                self.fs.set_returns(&item, None)?;
                let batch = total / FIELDS_PER_FLUSH + 1;
                self.fs
                    .emit(Instruction::abc(OpCode::SetList, base, 0, batch))?;
                self.fs.free_reg = base + 1;
                // total excludes the open expansion
            } else {
                self.fs.exp_to_next_reg(&mut item)?;
                total += 1;
                pending += 1;
                self.flush_fields(base, pending, total)?;
            }
        }
        self.expect(&Token::RBrace, "'}' to close table constructor")?;
        self.fs.code[pc].set_b(total.min(MAXARG_B));
        Ok(t)
    }

    fn flush_fields(&mut self, base: u32, pending: u32, total: u32) -> PResult<()> {
        let batch = total.div_ceil(FIELDS_PER_FLUSH);
        self.fs
            .emit(Instruction::abc(OpCode::SetList, base, pending, batch))?;
        self.fs.free_reg = base + 1;
        Ok(())
    }

    /// `(params) block end` — compiles the nested function to its own
    /// Proto, then emits Closure plus one capture pseudo-instruction
    /// per upvalue in the enclosing function.
    fn function_body(&mut self) -> PResult<ExpDesc> {
        let line = self.line();
        self.expect(&Token::LParen, "'(' to start parameter list")?;
        let mut params = Vec::new();
        let mut is_vararg = false;
        if !self.accept(&Token::RParen) {
            loop {
                match self.peek().cloned() {
                    Some(Token::Name(n)) => {
                        self.advance();
                        params.push(n);
                    }
                    Some(Token::Ellipsis) => {
                        self.advance();
                        is_vararg = true;
                        break;
                    }
                    Some(found) => {
                        return Err(self
                            .unexpected("a parameter name or '...'", &format!("{found:?}"))
                            .into())
                    }
                    None => {
                        return Err(ParseError::UnexpectedEof {
                            expected: "a parameter name".to_string(),
                        }
                        .into())
                    }
                }
                if !self.accept(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RParen, "')' to close parameter list")?;
        }

        self.open_func(&params, is_vararg, line)?;
        self.statement_list()?;
        self.expect(&Token::End, "'end' to close 'function'")?;
        self.close_func()
    }

    fn open_func(&mut self, params: &[String], is_vararg: bool, line: u32) -> PResult<()> {
        let mut child = FuncState::new(params.len() as u8, is_vararg);
        child.set_line(line);
        let parent = std::mem::replace(&mut self.fs, child);
        self.fs.parent = Some(Box::new(parent));
        for p in params {
            self.fs.new_local(p);
        }
        self.fs.reserve_regs(params.len() as u32)?;
        self.fs.activate_locals(params.len() as u32);
        Ok(())
    }

    fn close_func(&mut self) -> PResult<ExpDesc> {
        let mut child = std::mem::replace(&mut self.fs, FuncState::new(0, true));
        let parent = child.parent.take().expect("nested function has a parent");
        self.fs = *parent;
        let (proto, upvals) = child.finish()?;
        let idx = self.fs.add_proto(proto)?;
        let pc = self.fs.emit(Instruction::abx(OpCode::Closure, 0, idx))?;
        for u in &upvals {
            let op = if u.in_stack {
                OpCode::Move
            } else {
                OpCode::GetUpval
            };
            self.fs.emit(Instruction::abc(op, 0, u.index, 0))?;
        }
        Ok(ExpDesc::new(ExpKind::Reloc(pc)))
    }
}

const UNARY_PRIORITY: u8 = 8;

/// Left/right binding powers; all binary operators associate left.
fn priority(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Or => (1, 1),
        BinOp::And => (2, 2),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => (3, 3),
        BinOp::Add | BinOp::Sub => (6, 6),
        BinOp::Mul | BinOp::Div | BinOp::Mod => (7, 7),
    }
}

/// Walk the chain of enclosing functions: a hit in a parent becomes an
/// upvalue interned at every level in between.
fn resolve_var(
    fs: &mut FuncState,
    name: &str,
) -> std::result::Result<Option<ExpKind>, CodegenError> {
    if let Some(r) = fs.resolve_local(name) {
        return Ok(Some(ExpKind::Local(r)));
    }
    if let Some(i) = fs.upvals.iter().position(|u| u.name == name) {
        return Ok(Some(ExpKind::Upval(i as u32)));
    }
    let Some(parent) = fs.parent.as_deref_mut() else {
        return Ok(None);
    };
    match resolve_var(parent, name)? {
        Some(ExpKind::Local(r)) => Ok(Some(ExpKind::Upval(fs.index_upvalue(name, true, r)?))),
        Some(ExpKind::Upval(i)) => Ok(Some(ExpKind::Upval(fs.index_upvalue(name, false, i)?))),
        _ => Ok(None),
    }
}
