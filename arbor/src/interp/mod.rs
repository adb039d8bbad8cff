//! Reference interpreter
//!
//! Runs functions of a [`crate::ir::Module`] directly on the tree. Imported
//! functions have no bodies: each call is appended to a trace and answers
//! with the trace length, so two runs can be compared call for call. Used to
//! check that an optimized module behaves exactly like the original.

mod error;
mod eval;
mod value;

pub use error::Trap;
pub use eval::{CallRecord, Execution, Interpreter, MEMORY_SIZE};
pub use value::Value;
