use std::fmt;

use serde::Serialize;

use super::instr::MAXARG_BX;
use super::{CodegenError, FuncState};

// ── Constant values ─────────────────────────────────────────────────

/// A compile-time constant stored in a function's pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// Pool lookup key. Numbers are keyed by their bit pattern so that
/// textually different literals evaluating to the same f64 share a
/// slot, and so the key can be hashed at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ConstKey {
    Nil,
    Bool(bool),
    Number(u64),
    Str(String),
}

impl ConstKey {
    fn of(v: &Value) -> ConstKey {
        match v {
            Value::Nil => ConstKey::Nil,
            Value::Bool(b) => ConstKey::Bool(*b),
            Value::Number(n) => ConstKey::Number(n.to_bits()),
            Value::Str(s) => ConstKey::Str(s.clone()),
        }
    }
}

// ── Interning ───────────────────────────────────────────────────────

impl FuncState {
    /// Deduplicating pool append: structurally equal constants always
    /// map to the same index within one function.
    fn intern(&mut self, v: Value) -> Result<u32, CodegenError> {
        let key = ConstKey::of(&v);
        if let Some(&idx) = self.const_index.get(&key) {
            return Ok(idx);
        }
        if self.constants.len() as u32 > MAXARG_BX {
            return Err(CodegenError::ConstantOverflow { line: self.line });
        }
        let idx = self.constants.len() as u32;
        self.constants.push(v);
        self.const_index.insert(key, idx);
        Ok(idx)
    }

    pub(crate) fn number_k(&mut self, n: f64) -> Result<u32, CodegenError> {
        self.intern(Value::Number(n))
    }

    pub(crate) fn string_k(&mut self, s: &str) -> Result<u32, CodegenError> {
        self.intern(Value::Str(s.to_string()))
    }

    pub(crate) fn bool_k(&mut self, b: bool) -> Result<u32, CodegenError> {
        self.intern(Value::Bool(b))
    }

    pub(crate) fn nil_k(&mut self) -> Result<u32, CodegenError> {
        self.intern(Value::Nil)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_interning_is_stable() {
        let mut fs = FuncState::new(0, true);
        let a = fs.string_k("x").unwrap();
        let len = fs.constants.len();
        let b = fs.string_k("x").unwrap();
        assert_eq!(a, b);
        assert_eq!(fs.constants.len(), len);
    }

    #[test]
    fn distinct_values_get_distinct_slots() {
        let mut fs = FuncState::new(0, true);
        let a = fs.number_k(1.0).unwrap();
        let b = fs.number_k(2.0).unwrap();
        let c = fs.bool_k(true).unwrap();
        let d = fs.nil_k().unwrap();
        let mut idx = vec![a, b, c, d];
        idx.dedup();
        assert_eq!(idx.len(), 4);
    }

    #[test]
    fn equal_numbers_share_a_slot() {
        let mut fs = FuncState::new(0, true);
        let a = fs.number_k(2.0).unwrap();
        let b = fs.number_k(4.0 / 2.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pool_overflow_is_reported() {
        let mut fs = FuncState::new(0, true);
        // fill every index an ABx operand can address
        for i in 0..=MAXARG_BX {
            fs.number_k(i as f64).unwrap();
        }
        let err = fs.number_k(-1.0).unwrap_err();
        assert!(matches!(err, CodegenError::ConstantOverflow { .. }));
        // hits on the dedup map still resolve
        assert_eq!(fs.number_k(5.0).unwrap(), 5);
    }
}
