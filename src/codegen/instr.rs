use std::fmt;

use serde::Serialize;

// ── Instruction layout ──────────────────────────────────────────────
//
// Every instruction is 32 bits. Three layouts share the opcode field:
//
//   ABC:   [B:9 | C:9 | A:8 | op:6]
//   ABx:   [    Bx:18 | A:8 | op:6]
//   AsBx:  [   sBx:18 | A:8 | op:6]   (sBx stored excess-MAXARG_SBX)
//
// B and C can hold an RK operand: bit 8 set means "constant pool index",
// clear means "register index". This layout is the binary contract the
// VM decodes; the widths are fixed at design time.

pub const SIZE_OP: u32 = 6;
pub const SIZE_A: u32 = 8;
pub const SIZE_C: u32 = 9;
pub const SIZE_B: u32 = 9;
pub const SIZE_BX: u32 = SIZE_C + SIZE_B;

pub const POS_OP: u32 = 0;
pub const POS_A: u32 = POS_OP + SIZE_OP;
pub const POS_C: u32 = POS_A + SIZE_A;
pub const POS_B: u32 = POS_C + SIZE_C;
pub const POS_BX: u32 = POS_C;

pub const MAXARG_A: u32 = (1 << SIZE_A) - 1;
pub const MAXARG_B: u32 = (1 << SIZE_B) - 1;
pub const MAXARG_C: u32 = (1 << SIZE_C) - 1;
pub const MAXARG_BX: u32 = (1 << SIZE_BX) - 1;
pub const MAXARG_SBX: i32 = (MAXARG_BX >> 1) as i32;

/// Bit that marks a B/C operand as a constant-pool index rather than
/// a register.
pub const BITRK: u32 = 1 << (SIZE_B - 1);

/// Largest constant index that still fits in an RK operand.
pub const MAXINDEXRK: u32 = BITRK - 1;

/// Placeholder register argument used while a TestSet's destination is
/// still unknown.
pub const NO_REG: u32 = MAXARG_A;

#[inline(always)]
pub const fn rk_is_const(r: u32) -> bool {
    r & BITRK != 0
}

#[inline(always)]
pub const fn rk_from_const(k: u32) -> u32 {
    k | BITRK
}

#[inline(always)]
pub const fn rk_index(r: u32) -> u32 {
    r & !BITRK
}

// ── Opcodes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum OpCode {
    Move = 0,      // A B     R[A] = R[B]
    LoadK = 1,     // A Bx    R[A] = K[Bx]
    LoadBool = 2,  // A B C   R[A] = (bool)B; if C, skip next instruction
    LoadNil = 3,   // A B     R[A..=B] = nil
    GetUpval = 4,  // A B     R[A] = U[B]
    GetGlobal = 5, // A Bx    R[A] = G[K[Bx]]
    GetTable = 6,  // A B C   R[A] = R[B][RK(C)]
    SetGlobal = 7, // A Bx    G[K[Bx]] = R[A]
    SetUpval = 8,  // A B     U[B] = R[A]
    SetTable = 9,  // A B C   R[A][RK(B)] = RK(C)
    NewTable = 10, // A B     R[A] = {} with array hint B
    Add = 11,      // A B C   R[A] = RK(B) + RK(C)
    Sub = 12,      // A B C   R[A] = RK(B) - RK(C)
    Mul = 13,      // A B C   R[A] = RK(B) * RK(C)
    Div = 14,      // A B C   R[A] = RK(B) / RK(C)
    Mod = 15,      // A B C   R[A] = RK(B) % RK(C)
    Unm = 16,      // A B     R[A] = -R[B]
    Not = 17,      // A B     R[A] = not R[B]
    Jmp = 18,      // sBx     pc += sBx
    Eq = 19,       // A B C   if (RK(B) == RK(C)) != A then pc++
    Lt = 20,       // A B C   if (RK(B) <  RK(C)) != A then pc++
    Le = 21,       // A B C   if (RK(B) <= RK(C)) != A then pc++
    Test = 22,     // A C     if bool(R[A]) != C then pc++
    TestSet = 23,  // A B C   if bool(R[B]) == C then R[A] = R[B] else pc++
    Call = 24,     // A B C   R[A..] = R[A](B-1 args), C-1 results
    Return = 25,   // A B     return B-1 values starting at R[A]
    Vararg = 26,   // A B     R[A..A+B-2] = ...
    SetList = 27,  // A B C   array-store B elements into R[A], batch C
    Closure = 28,  // A Bx    R[A] = closure(proto Bx)
}

impl OpCode {
    pub(crate) fn from_raw(raw: u32) -> OpCode {
        match raw {
            0 => OpCode::Move,
            1 => OpCode::LoadK,
            2 => OpCode::LoadBool,
            3 => OpCode::LoadNil,
            4 => OpCode::GetUpval,
            5 => OpCode::GetGlobal,
            6 => OpCode::GetTable,
            7 => OpCode::SetGlobal,
            8 => OpCode::SetUpval,
            9 => OpCode::SetTable,
            10 => OpCode::NewTable,
            11 => OpCode::Add,
            12 => OpCode::Sub,
            13 => OpCode::Mul,
            14 => OpCode::Div,
            15 => OpCode::Mod,
            16 => OpCode::Unm,
            17 => OpCode::Not,
            18 => OpCode::Jmp,
            19 => OpCode::Eq,
            20 => OpCode::Lt,
            21 => OpCode::Le,
            22 => OpCode::Test,
            23 => OpCode::TestSet,
            24 => OpCode::Call,
            25 => OpCode::Return,
            26 => OpCode::Vararg,
            27 => OpCode::SetList,
            28 => OpCode::Closure,
            _ => unreachable!("bad opcode {raw}"),
        }
    }

    /// Test-mode instructions conditionally skip the jump that always
    /// follows them. The jump engine must patch the pair as a unit.
    pub(crate) fn is_test(self) -> bool {
        matches!(
            self,
            OpCode::Eq | OpCode::Lt | OpCode::Le | OpCode::Test | OpCode::TestSet
        )
    }

    fn uses_bx(self) -> bool {
        matches!(
            self,
            OpCode::LoadK | OpCode::GetGlobal | OpCode::SetGlobal | OpCode::Closure
        )
    }
}

// ── Packed instruction ──────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Instruction(u32);

impl Instruction {
    #[inline(always)]
    pub fn abc(op: OpCode, a: u32, b: u32, c: u32) -> Instruction {
        debug_assert!(a <= MAXARG_A && b <= MAXARG_B && c <= MAXARG_C);
        Instruction((op as u32) << POS_OP | a << POS_A | b << POS_B | c << POS_C)
    }

    #[inline(always)]
    pub fn abx(op: OpCode, a: u32, bx: u32) -> Instruction {
        debug_assert!(a <= MAXARG_A && bx <= MAXARG_BX);
        Instruction((op as u32) << POS_OP | a << POS_A | bx << POS_BX)
    }

    #[inline(always)]
    pub fn asbx(op: OpCode, a: u32, sbx: i32) -> Instruction {
        debug_assert!(-MAXARG_SBX <= sbx && sbx <= MAXARG_SBX);
        Instruction::abx(op, a, (sbx + MAXARG_SBX) as u32)
    }

    #[inline(always)]
    pub fn opcode(self) -> OpCode {
        OpCode::from_raw(self.0 >> POS_OP & ((1 << SIZE_OP) - 1))
    }

    #[inline(always)]
    pub fn a(self) -> u32 {
        self.0 >> POS_A & MAXARG_A
    }

    #[inline(always)]
    pub fn b(self) -> u32 {
        self.0 >> POS_B & MAXARG_B
    }

    #[inline(always)]
    pub fn c(self) -> u32 {
        self.0 >> POS_C & MAXARG_C
    }

    #[inline(always)]
    pub fn bx(self) -> u32 {
        self.0 >> POS_BX & MAXARG_BX
    }

    #[inline(always)]
    pub fn sbx(self) -> i32 {
        self.bx() as i32 - MAXARG_SBX
    }

    #[inline(always)]
    pub fn set_a(&mut self, a: u32) {
        debug_assert!(a <= MAXARG_A);
        self.0 = self.0 & !(MAXARG_A << POS_A) | a << POS_A;
    }

    #[inline(always)]
    pub fn set_b(&mut self, b: u32) {
        debug_assert!(b <= MAXARG_B);
        self.0 = self.0 & !(MAXARG_B << POS_B) | b << POS_B;
    }

    #[inline(always)]
    pub fn set_c(&mut self, c: u32) {
        debug_assert!(c <= MAXARG_C);
        self.0 = self.0 & !(MAXARG_C << POS_C) | c << POS_C;
    }

    #[inline(always)]
    pub fn set_sbx(&mut self, sbx: i32) {
        debug_assert!(-MAXARG_SBX <= sbx && sbx <= MAXARG_SBX);
        let bx = (sbx + MAXARG_SBX) as u32;
        self.0 = self.0 & !(MAXARG_BX << POS_BX) | bx << POS_BX;
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

fn fmt_rk(f: &mut fmt::Formatter<'_>, r: u32) -> fmt::Result {
    if rk_is_const(r) {
        write!(f, "k{}", rk_index(r))
    } else {
        write!(f, "r{r}")
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        write!(f, "{op:?} ")?;
        match op {
            OpCode::Jmp => write!(f, "{:+}", self.sbx()),
            _ if op.uses_bx() => write!(f, "r{} {}", self.a(), self.bx()),
            OpCode::Move | OpCode::LoadNil | OpCode::Unm | OpCode::Not => {
                write!(f, "r{} r{}", self.a(), self.b())
            }
            OpCode::GetTable => {
                write!(f, "r{} r{} ", self.a(), self.b())?;
                fmt_rk(f, self.c())
            }
            OpCode::SetTable => {
                write!(f, "r{} ", self.a())?;
                fmt_rk(f, self.b())?;
                write!(f, " ")?;
                fmt_rk(f, self.c())
            }
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Mod => {
                write!(f, "r{} ", self.a())?;
                fmt_rk(f, self.b())?;
                write!(f, " ")?;
                fmt_rk(f, self.c())
            }
            OpCode::Eq | OpCode::Lt | OpCode::Le => {
                write!(f, "{} ", self.a())?;
                fmt_rk(f, self.b())?;
                write!(f, " ")?;
                fmt_rk(f, self.c())
            }
            _ => write!(f, "r{} {} {}", self.a(), self.b(), self.c()),
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abc_roundtrip() {
        let i = Instruction::abc(OpCode::Add, 7, rk_from_const(200), 12);
        assert_eq!(i.opcode(), OpCode::Add);
        assert_eq!(i.a(), 7);
        assert_eq!(i.b(), rk_from_const(200));
        assert_eq!(i.c(), 12);
        assert!(rk_is_const(i.b()));
        assert_eq!(rk_index(i.b()), 200);
    }

    #[test]
    fn abx_roundtrip() {
        let i = Instruction::abx(OpCode::LoadK, MAXARG_A, MAXARG_BX);
        assert_eq!(i.a(), MAXARG_A);
        assert_eq!(i.bx(), MAXARG_BX);
    }

    #[test]
    fn sbx_roundtrip_extremes() {
        for sbx in [-MAXARG_SBX, -1, 0, 1, MAXARG_SBX] {
            let i = Instruction::asbx(OpCode::Jmp, 0, sbx);
            assert_eq!(i.sbx(), sbx, "sbx {sbx} did not round-trip");
        }
    }

    #[test]
    fn set_fields_in_place() {
        let mut i = Instruction::abc(OpCode::TestSet, NO_REG, 3, 1);
        i.set_a(9);
        assert_eq!(i.a(), 9);
        assert_eq!((i.b(), i.c()), (3, 1));
        let mut j = Instruction::asbx(OpCode::Jmp, 0, 0);
        j.set_sbx(-42);
        assert_eq!(j.sbx(), -42);
    }

    #[test]
    fn rk_bit_partitions_operand_space() {
        assert!(!rk_is_const(MAXINDEXRK));
        assert!(rk_is_const(rk_from_const(0)));
        assert_eq!(rk_index(rk_from_const(MAXINDEXRK)), MAXINDEXRK);
    }
}
