// The tagged value model: every value a running program can hold.
//
// `Value` owns all of its heap storage directly (`Vec<u8>` for strings,
// `Vec<Value>` for arrays, recursively). There is no `Rc`/`Weak` sharing
// anywhere in this type, so Rust's ordinary move/drop semantics already
// release every live value exactly once, with no reference count or free
// list to maintain. `deep_clone` is kept as an explicit, separate method
// from an automatically derived `Clone` so that the two call sites that
// need a copy (`LOAD_VAR`, `DUP`) stay visible as deliberate, rather than
// disappearing into a blanket derive.

use enumflags2::BitFlags;

use crate::error::{expected, Result, VmError};

#[derive(BitFlags, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeTag {
    Integer = 0b0000001,
    BigInteger = 0b0000010,
    Float = 0b0000100,
    Str = 0b0001000,
    Boolean = 0b0010000,
    Array = 0b0100000,
    Null = 0b1000000,
}

// Re-exported by crate::error as the canonical alias; kept here too since
// every arm of this file constructs sets of its own TypeTag.
pub type TypeSet = BitFlags<TypeTag>;

#[derive(Debug)]
pub enum Value {
    Integer(i64),
    BigInteger(i128),
    Float(f64),
    Str(Vec<u8>),
    Boolean(bool),
    Array(Vec<Value>),
    Null,
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Integer(_) => TypeTag::Integer,
            Value::BigInteger(_) => TypeTag::BigInteger,
            Value::Float(_) => TypeTag::Float,
            Value::Str(_) => TypeTag::Str,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Array(_) => TypeTag::Array,
            Value::Null => TypeTag::Null,
        }
    }

    // Deep-copy: scalars bit-copy, strings/arrays (recursively) copy their
    // owned storage. Used by LOAD_VAR and DUP.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Integer(i) => Value::Integer(*i),
            Value::BigInteger(b) => Value::BigInteger(*b),
            Value::Float(f) => Value::Float(*f),
            Value::Str(bytes) => Value::Str(bytes.clone()),
            Value::Boolean(b) => Value::Boolean(*b),
            Value::Array(items) => Value::Array(items.iter().map(Value::deep_clone).collect()),
            Value::Null => Value::Null,
        }
    }

    // Truthiness projection, used by AND/OR/NOT and by JMP_IF_*.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Integer(i) => *i != 0,
            Value::BigInteger(b) => *b != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(bytes) => !bytes.is_empty(),
            Value::Boolean(b) => *b,
            Value::Array(items) => !items.is_empty(),
            Value::Null => false,
        }
    }

    // Value-to-bytes rendering. Used by PRINT and by string-concatenation
    // in ADD.
    pub fn render_bytes(&self) -> Vec<u8> {
        match self {
            Value::Integer(i) => i.to_string().into_bytes(),
            Value::BigInteger(b) => b.to_string().into_bytes(),
            Value::Float(x) => format_float(*x).into_bytes(),
            Value::Str(bytes) => bytes.clone(),
            Value::Boolean(b) => (if *b { "true" } else { "false" }).as_bytes().to_vec(),
            Value::Array(items) => {
                let mut out = Vec::new();
                out.push(b'[');
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        out.extend_from_slice(b", ");
                    }
                    out.extend_from_slice(&v.render_bytes());
                }
                out.push(b']');
                out
            }
            Value::Null => b"null".to_vec(),
        }
    }

    pub fn array_len(&self) -> Result<i64> {
        match self {
            Value::Array(items) => Ok(items.len() as i64),
            Value::Str(bytes) => Ok(bytes.len() as i64),
            v => Err(expected(TypeTag::Array | TypeTag::Str, v)),
        }
    }

    pub fn to_int(&self) -> Result<i64> {
        match self {
            Value::Integer(i) => Ok(*i),
            Value::BigInteger(b) => Ok(*b as i64),
            Value::Float(f) => Ok(*f as i64),
            Value::Boolean(b) => Ok(if *b { 1 } else { 0 }),
            Value::Str(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .ok_or_else(|| expected(int_set(), self)),
            v => Err(expected(int_set(), v)),
        }
    }

    // CAST_INT.
    pub fn cast_int(&self) -> Result<Value> {
        if let Value::BigInteger(b) = self {
            if i64::try_from(*b).is_err() {
                return Ok(Value::BigInteger(*b));
            }
        }
        match self {
            Value::Integer(i) => Ok(Value::Integer(*i)),
            Value::BigInteger(b) => Ok(widen_int(*b)),
            Value::Float(f) => Ok(widen_int(f.trunc() as i128)),
            Value::Boolean(b) => Ok(Value::Integer(if *b { 1 } else { 0 })),
            Value::Str(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.trim().parse::<i128>().ok())
                .map(widen_int)
                .ok_or_else(|| expected(int_set(), self)),
            v => Err(expected(int_set(), v)),
        }
    }

    // CAST_FLOAT.
    pub fn cast_float(&self) -> Result<Value> {
        match self {
            Value::Integer(i) => Ok(Value::Float(*i as f64)),
            Value::BigInteger(b) => Ok(Value::Float(*b as f64)),
            Value::Float(f) => Ok(Value::Float(*f)),
            Value::Boolean(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            Value::Str(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .map(Value::Float)
                .ok_or_else(|| expected(TypeTag::Float.into(), self)),
            v => Err(expected(TypeTag::Float.into(), v)),
        }
    }
}

fn int_set() -> TypeSet {
    TypeTag::Integer | TypeTag::BigInteger | TypeTag::Float | TypeTag::Boolean | TypeTag::Str
}

fn format_float(x: f64) -> String {
    // Default decimal rendering, no forced exponent.
    if x == x.trunc() && x.is_finite() && x.abs() < 1e15 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

fn widen_int(v: i128) -> Value {
    match i64::try_from(v) {
        Ok(i) => Value::Integer(i),
        Err(_) => Value::BigInteger(v),
    }
}

#[derive(Copy, Clone)]
enum Num {
    I(i64),
    B(i128),
    F(f64),
}

fn as_num(v: &Value) -> Option<Num> {
    match v {
        Value::Integer(i) => Some(Num::I(*i)),
        Value::BigInteger(b) => Some(Num::B(*b)),
        Value::Float(f) => Some(Num::F(*f)),
        _ => None,
    }
}

fn to_i128(n: Num) -> i128 {
    match n {
        Num::I(i) => i as i128,
        Num::B(b) => b,
        Num::F(f) => f as i128,
    }
}

fn to_f64(n: Num) -> f64 {
    match n {
        Num::I(i) => i as f64,
        Num::B(b) => b as f64,
        Num::F(f) => f,
    }
}

fn is_zero(n: Num) -> bool {
    match n {
        Num::I(i) => i == 0,
        Num::B(b) => b == 0,
        Num::F(f) => f == 0.0,
    }
}

// Stringable operands for ADD's concatenation path: numeric, boolean, or
// string itself. Arrays and null are not; pairing either with anything
// falls through to InvalidCast.
fn is_stringable(v: &Value) -> bool {
    matches!(
        v,
        Value::Integer(_) | Value::BigInteger(_) | Value::Float(_) | Value::Boolean(_) | Value::Str(_)
    )
}

// integer+integer widens to big_integer only on overflow; any operand
// already tagged big_integer forces a big_integer result regardless of
// whether the value would fit back in i64.
fn int_result(p: Num, q: Num, v: i128) -> Value {
    match (p, q) {
        (Num::I(_), Num::I(_)) => widen_int(v),
        _ => Value::BigInteger(v),
    }
}

fn numeric_binop(
    a: &Value,
    b: &Value,
    int_op: fn(i128, i128) -> i128,
    float_op: fn(f64, f64) -> f64,
) -> Option<Value> {
    let (x, y) = (as_num(a)?, as_num(b)?);
    Some(match (x, y) {
        (Num::F(p), q) => Value::Float(float_op(p, to_f64(q))),
        (p, Num::F(q)) => Value::Float(float_op(to_f64(p), q)),
        (p, q) => int_result(p, q, int_op(to_i128(p), to_i128(q))),
    })
}

impl Value {
    pub fn add(&self, other: &Value) -> Result<Value> {
        if let Some(v) = numeric_binop(self, other, |a, b| a + b, |a, b| a + b) {
            return Ok(v);
        }
        if (matches!(self, Value::Str(_)) || matches!(other, Value::Str(_)))
            && is_stringable(self)
            && is_stringable(other)
        {
            let mut bytes = self.render_bytes();
            bytes.extend_from_slice(&other.render_bytes());
            return Ok(Value::Str(bytes));
        }
        Err(numeric_mismatch(self, other))
    }

    pub fn sub(&self, other: &Value) -> Result<Value> {
        numeric_binop(self, other, |a, b| a - b, |a, b| a - b)
            .ok_or_else(|| numeric_mismatch(self, other))
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        numeric_binop(self, other, |a, b| a * b, |a, b| a * b)
            .ok_or_else(|| numeric_mismatch(self, other))
    }

    pub fn div(&self, other: &Value) -> Result<Value> {
        let (a, b) = numeric_pair(self, other)?;
        if is_zero(b) {
            return Err(VmError::DivisionByZero);
        }
        Ok(match (a, b) {
            (Num::F(p), q) => Value::Float(p / to_f64(q)),
            (p, Num::F(q)) => Value::Float(to_f64(p) / q),
            (p, q) => int_result(p, q, to_i128(p) / to_i128(q)),
        })
    }

    pub fn modulo(&self, other: &Value) -> Result<Value> {
        let (a, b) = numeric_pair(self, other)?;
        if is_zero(b) {
            return Err(VmError::DivisionByZero);
        }
        Ok(match (a, b) {
            (Num::F(p), q) => Value::Float(p % to_f64(q)),
            (p, Num::F(q)) => Value::Float(to_f64(p) % q),
            (p, q) => int_result(p, q, to_i128(p) % to_i128(q)),
        })
    }

    pub fn eq_value(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Array(a), Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_value(y))
            }
            _ => {
                if let (Some(a), Some(b)) = (as_num(self), as_num(other)) {
                    numeric_eq(a, b)
                } else {
                    false
                }
            }
        }
    }

    fn numeric_cmp(&self, other: &Value) -> Option<std::cmp::Ordering> {
        let (a, b) = (as_num(self)?, as_num(other)?);
        match (a, b) {
            (Num::F(p), q) => p.partial_cmp(&to_f64(q)),
            (p, Num::F(q)) => to_f64(p).partial_cmp(&q),
            (p, q) => Some(to_i128(p).cmp(&to_i128(q))),
        }
    }

    pub fn lt_value(&self, other: &Value) -> bool {
        self.numeric_cmp(other) == Some(std::cmp::Ordering::Less)
    }

    pub fn le_value(&self, other: &Value) -> bool {
        matches!(
            self.numeric_cmp(other),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        )
    }

    pub fn gt_value(&self, other: &Value) -> bool {
        self.numeric_cmp(other) == Some(std::cmp::Ordering::Greater)
    }

    pub fn ge_value(&self, other: &Value) -> bool {
        matches!(
            self.numeric_cmp(other),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        )
    }
}

fn numeric_pair(a: &Value, b: &Value) -> Result<(Num, Num)> {
    match (as_num(a), as_num(b)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(numeric_mismatch(a, b)),
    }
}

// Report the error against whichever operand is actually non-numeric; if
// both are, report the left one.
fn numeric_mismatch(a: &Value, b: &Value) -> VmError {
    if as_num(a).is_none() {
        expected(numeric_set(), a)
    } else {
        expected(numeric_set(), b)
    }
}

fn numeric_eq(a: Num, b: Num) -> bool {
    match (a, b) {
        (Num::F(x), y) => x == to_f64(y),
        (x, Num::F(y)) => to_f64(x) == y,
        (x, y) => to_i128(x) == to_i128(y),
    }
}

fn numeric_set() -> TypeSet {
    TypeTag::Integer | TypeTag::BigInteger | TypeTag::Float
}

