//! Runtime values for the interpreter

use std::fmt;

use serde::Serialize;

use crate::ir::{Literal, Type};

/// Runtime value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::I32(_) => Type::I32,
            Value::I64(_) => Type::I64,
            Value::F32(_) => Type::F32,
            Value::F64(_) => Type::F64,
        }
    }

    /// Zero of a value type
    pub fn zero(ty: Type) -> Option<Value> {
        Literal::zero(ty).map(Value::from)
    }

    /// Integer value converted to `ty`, as handed back by imported calls
    pub fn from_count(count: usize, ty: Type) -> Option<Value> {
        match ty {
            Type::I32 => Some(Value::I32(count as i32)),
            Type::I64 => Some(Value::I64(count as i64)),
            Type::F32 => Some(Value::F32(count as f32)),
            Type::F64 => Some(Value::F64(count as f64)),
            Type::None | Type::Unreachable => None,
        }
    }

    /// Parse a command-line argument as a value of type `ty`
    pub fn parse(text: &str, ty: Type) -> Option<Value> {
        match ty {
            Type::I32 => text.parse().ok().map(Value::I32),
            Type::I64 => text.parse().ok().map(Value::I64),
            Type::F32 => text.parse().ok().map(Value::F32),
            Type::F64 => text.parse().ok().map(Value::F64),
            Type::None | Type::Unreachable => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(n) => Some(*n),
            _ => None,
        }
    }

    /// Little-endian encoding, as stored in linear memory
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Value::I32(n) => n.to_le_bytes().to_vec(),
            Value::I64(n) => n.to_le_bytes().to_vec(),
            Value::F32(x) => x.to_le_bytes().to_vec(),
            Value::F64(x) => x.to_le_bytes().to_vec(),
        }
    }

    /// Decode `ty` from exactly `ty.byte_size()` bytes
    pub fn from_le_bytes(ty: Type, bytes: &[u8]) -> Option<Value> {
        match ty {
            Type::I32 => bytes.try_into().ok().map(|b| Value::I32(i32::from_le_bytes(b))),
            Type::I64 => bytes.try_into().ok().map(|b| Value::I64(i64::from_le_bytes(b))),
            Type::F32 => bytes.try_into().ok().map(|b| Value::F32(f32::from_le_bytes(b))),
            Type::F64 => bytes.try_into().ok().map(|b| Value::F64(f64::from_le_bytes(b))),
            Type::None | Type::Unreachable => None,
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::I32(n) => Value::I32(n),
            Literal::I64(n) => Value::I64(n),
            Literal::F32(x) => Value::F32(x),
            Literal::F64(x) => Value::F64(x),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(n) => write!(f, "{n}:i32"),
            Value::I64(n) => write!(f, "{n}:i64"),
            Value::F32(x) => write!(f, "{x}:f32"),
            Value::F64(x) => write!(f, "{x}:f64"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_by_type() {
        assert_eq!(Value::parse("-7", Type::I32), Some(Value::I32(-7)));
        assert_eq!(Value::parse("2.5", Type::F64), Some(Value::F64(2.5)));
        assert_eq!(Value::parse("x", Type::I64), None);
        assert_eq!(Value::parse("1", Type::None), None);
    }

    #[test]
    fn test_memory_encoding() {
        let v = Value::I32(0x0102_0304);
        assert_eq!(v.to_le_bytes(), vec![4, 3, 2, 1]);
        assert_eq!(Value::from_le_bytes(Type::I32, &[4, 3, 2, 1]), Some(v));
        assert_eq!(Value::from_le_bytes(Type::I64, &[0; 4]), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::I64(3).to_string(), "3:i64");
        assert_eq!(Value::F32(1.5).to_string(), "1.5:f32");
    }
}
