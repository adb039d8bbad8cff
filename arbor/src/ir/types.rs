//! Type lattice, literals and operators

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type of an expression.
///
/// `Unreachable` is the bottom of the lattice: an expression of that type
/// never hands control back to its parent, so it may stand wherever any
/// other type is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    None,
    Unreachable,
    I32,
    I64,
    F32,
    F64,
}

impl Type {
    /// True for the value-carrying types
    pub fn is_concrete(self) -> bool {
        matches!(self, Type::I32 | Type::I64 | Type::F32 | Type::F64)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Type::I32 | Type::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    /// Parse a value type name (`i32`, `i64`, `f32`, `f64`)
    pub fn from_name(name: &str) -> Option<Type> {
        match name {
            "i32" => Some(Type::I32),
            "i64" => Some(Type::I64),
            "f32" => Some(Type::F32),
            "f64" => Some(Type::F64),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Type::None => "none",
            Type::Unreachable => "unreachable",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F32 => "f32",
            Type::F64 => "f64",
        }
    }

    /// Size in bytes of a value of this type in linear memory
    pub fn byte_size(self) -> Option<usize> {
        match self {
            Type::I32 | Type::F32 => Some(4),
            Type::I64 | Type::F64 => Some(8),
            Type::None | Type::Unreachable => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constant value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::I32(_) => Type::I32,
            Literal::I64(_) => Type::I64,
            Literal::F32(_) => Type::F32,
            Literal::F64(_) => Type::F64,
        }
    }

    pub fn zero(ty: Type) -> Option<Literal> {
        match ty {
            Type::I32 => Some(Literal::I32(0)),
            Type::I64 => Some(Literal::I64(0)),
            Type::F32 => Some(Literal::F32(0.0)),
            Type::F64 => Some(Literal::F64(0.0)),
            Type::None | Type::Unreachable => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::I32(n) => write!(f, "{n}"),
            Literal::I64(n) => write!(f, "{n}"),
            Literal::F32(x) => write!(f, "{x:?}"),
            Literal::F64(x) => write!(f, "{x:?}"),
        }
    }
}

/// Unary operator family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryKind {
    Eqz,
    Clz,
    Ctz,
    Popcnt,
    Neg,
    Abs,
    Sqrt,
    Wrap,
    ExtendS,
    ExtendU,
    TruncS,
    TruncU,
    ConvertS,
    ConvertU,
}

/// Unary operator with its operand and result types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnaryOp {
    pub kind: UnaryKind,
    pub operand: Type,
    pub result: Type,
}

impl UnaryOp {
    /// Parse `i32.eqz`, `f64.neg`, `i32.wrap_i64`, `i64.trunc_f32_s`, ...
    pub fn from_name(name: &str) -> Option<UnaryOp> {
        let (prefix, rest) = name.split_once('.')?;
        let prefix = Type::from_name(prefix)?;
        let simple = |kind, valid: bool, result| valid.then_some(UnaryOp { kind, operand: prefix, result });
        match rest {
            "eqz" => simple(UnaryKind::Eqz, prefix.is_integer(), Type::I32),
            "clz" => simple(UnaryKind::Clz, prefix.is_integer(), prefix),
            "ctz" => simple(UnaryKind::Ctz, prefix.is_integer(), prefix),
            "popcnt" => simple(UnaryKind::Popcnt, prefix.is_integer(), prefix),
            "neg" => simple(UnaryKind::Neg, prefix.is_float(), prefix),
            "abs" => simple(UnaryKind::Abs, prefix.is_float(), prefix),
            "sqrt" => simple(UnaryKind::Sqrt, prefix.is_float(), prefix),
            _ => {
                let mut parts = rest.split('_');
                let family = parts.next()?;
                let operand = Type::from_name(parts.next()?)?;
                let sign = parts.next();
                if parts.next().is_some() {
                    return None;
                }
                let kind = match (family, sign) {
                    ("wrap", None) if prefix == Type::I32 && operand == Type::I64 => UnaryKind::Wrap,
                    ("extend", Some("s")) if prefix == Type::I64 && operand == Type::I32 => UnaryKind::ExtendS,
                    ("extend", Some("u")) if prefix == Type::I64 && operand == Type::I32 => UnaryKind::ExtendU,
                    ("trunc", Some("s")) if prefix.is_integer() && operand.is_float() => UnaryKind::TruncS,
                    ("trunc", Some("u")) if prefix.is_integer() && operand.is_float() => UnaryKind::TruncU,
                    ("convert", Some("s")) if prefix.is_float() && operand.is_integer() => UnaryKind::ConvertS,
                    ("convert", Some("u")) if prefix.is_float() && operand.is_integer() => UnaryKind::ConvertU,
                    _ => return None,
                };
                Some(UnaryOp { kind, operand, result: prefix })
            }
        }
    }

    pub fn name(&self) -> String {
        let (family, sign) = match self.kind {
            UnaryKind::Eqz => return format!("{}.eqz", self.operand),
            UnaryKind::Clz => return format!("{}.clz", self.operand),
            UnaryKind::Ctz => return format!("{}.ctz", self.operand),
            UnaryKind::Popcnt => return format!("{}.popcnt", self.operand),
            UnaryKind::Neg => return format!("{}.neg", self.operand),
            UnaryKind::Abs => return format!("{}.abs", self.operand),
            UnaryKind::Sqrt => return format!("{}.sqrt", self.operand),
            UnaryKind::Wrap => ("wrap", ""),
            UnaryKind::ExtendS => ("extend", "_s"),
            UnaryKind::ExtendU => ("extend", "_u"),
            UnaryKind::TruncS => ("trunc", "_s"),
            UnaryKind::TruncU => ("trunc", "_u"),
            UnaryKind::ConvertS => ("convert", "_s"),
            UnaryKind::ConvertU => ("convert", "_u"),
        };
        format!("{}.{}_{}{}", self.result, family, self.operand, sign)
    }

    /// Float to integer truncation traps on NaN and out-of-range inputs
    pub fn may_trap(&self) -> bool {
        matches!(self.kind, UnaryKind::TruncS | UnaryKind::TruncU)
    }
}

/// Binary operator family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryKind {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Eq,
    Ne,
    LtS,
    LtU,
    GtS,
    GtU,
    LeS,
    LeU,
    GeS,
    GeU,
    Div,
    Lt,
    Gt,
    Le,
    Ge,
    Min,
    Max,
}

const BINARY_NAMES: &[(&str, BinaryKind)] = &[
    ("add", BinaryKind::Add),
    ("sub", BinaryKind::Sub),
    ("mul", BinaryKind::Mul),
    ("div_s", BinaryKind::DivS),
    ("div_u", BinaryKind::DivU),
    ("rem_s", BinaryKind::RemS),
    ("rem_u", BinaryKind::RemU),
    ("and", BinaryKind::And),
    ("or", BinaryKind::Or),
    ("xor", BinaryKind::Xor),
    ("shl", BinaryKind::Shl),
    ("shr_s", BinaryKind::ShrS),
    ("shr_u", BinaryKind::ShrU),
    ("eq", BinaryKind::Eq),
    ("ne", BinaryKind::Ne),
    ("lt_s", BinaryKind::LtS),
    ("lt_u", BinaryKind::LtU),
    ("gt_s", BinaryKind::GtS),
    ("gt_u", BinaryKind::GtU),
    ("le_s", BinaryKind::LeS),
    ("le_u", BinaryKind::LeU),
    ("ge_s", BinaryKind::GeS),
    ("ge_u", BinaryKind::GeU),
    ("div", BinaryKind::Div),
    ("lt", BinaryKind::Lt),
    ("gt", BinaryKind::Gt),
    ("le", BinaryKind::Le),
    ("ge", BinaryKind::Ge),
    ("min", BinaryKind::Min),
    ("max", BinaryKind::Max),
];

impl BinaryKind {
    fn as_str(self) -> &'static str {
        BINARY_NAMES
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }

    fn is_comparison(self) -> bool {
        use BinaryKind::*;
        matches!(self, Eq | Ne | LtS | LtU | GtS | GtU | LeS | LeU | GeS | GeU | Lt | Gt | Le | Ge)
    }

    fn valid_for(self, ty: Type) -> bool {
        use BinaryKind::*;
        match self {
            Add | Sub | Mul | Eq | Ne => ty.is_concrete(),
            DivS | DivU | RemS | RemU | And | Or | Xor | Shl | ShrS | ShrU | LtS | LtU | GtS | GtU
            | LeS | LeU | GeS | GeU => ty.is_integer(),
            Div | Lt | Gt | Le | Ge | Min | Max => ty.is_float(),
        }
    }
}

/// Binary operator over operands of type `ty`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinaryOp {
    pub kind: BinaryKind,
    pub ty: Type,
}

impl BinaryOp {
    pub fn from_name(name: &str) -> Option<BinaryOp> {
        let (prefix, rest) = name.split_once('.')?;
        let ty = Type::from_name(prefix)?;
        let kind = BINARY_NAMES.iter().find(|(n, _)| *n == rest).map(|(_, k)| *k)?;
        kind.valid_for(ty).then_some(BinaryOp { kind, ty })
    }

    pub fn name(&self) -> String {
        format!("{}.{}", self.ty, self.kind.as_str())
    }

    pub fn result(&self) -> Type {
        if self.kind.is_comparison() { Type::I32 } else { self.ty }
    }

    /// Integer division and remainder trap on a zero divisor
    pub fn may_trap(&self) -> bool {
        matches!(
            self.kind,
            BinaryKind::DivS | BinaryKind::DivU | BinaryKind::RemS | BinaryKind::RemU
        )
    }
}

/// Read-modify-write operation of an atomic RMW
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicRmwOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Xchg,
}

impl AtomicRmwOp {
    pub fn from_name(name: &str) -> Option<AtomicRmwOp> {
        match name {
            "add" => Some(AtomicRmwOp::Add),
            "sub" => Some(AtomicRmwOp::Sub),
            "and" => Some(AtomicRmwOp::And),
            "or" => Some(AtomicRmwOp::Or),
            "xor" => Some(AtomicRmwOp::Xor),
            "xchg" => Some(AtomicRmwOp::Xchg),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AtomicRmwOp::Add => "add",
            AtomicRmwOp::Sub => "sub",
            AtomicRmwOp::And => "and",
            AtomicRmwOp::Or => "or",
            AtomicRmwOp::Xor => "xor",
            AtomicRmwOp::Xchg => "xchg",
        }
    }
}
