//! Arbor Library
//!
//! Block merging optimizer for a structured tree IR, with the text format,
//! effect analysis and reference interpreter it is tested against.

pub mod ast;
pub mod config;
pub mod error;
pub mod interp;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod passes;

pub use ast::Span;
pub use config::{Config, PassOptions};
pub use error::{ArborError, Result};
