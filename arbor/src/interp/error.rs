//! Traps raised while interpreting

use thiserror::Error;

/// Abnormal termination of an interpreted call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Trap {
    #[error("unreachable executed")]
    Unreachable,

    #[error("integer divide by zero")]
    DivideByZero,

    #[error("integer overflow")]
    IntegerOverflow,

    #[error("invalid conversion to integer")]
    InvalidConversion,

    #[error("out of bounds memory access at {address} (+{size})")]
    OutOfBounds { address: u32, size: usize },

    #[error("indirect call to unknown function index {index}")]
    UndefinedElement { index: u32 },

    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },

    #[error("function `{name}` expects {expected} argument(s), got {got}")]
    ArgumentMismatch { name: String, expected: usize, got: usize },

    #[error("call stack exhausted")]
    CallStackExhausted,

    #[error("out of fuel")]
    OutOfFuel,

    /// Operands the reader should have rejected
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}
