//! Concrete syntax tree for the textual IR
//!
//! The text format is a parenthesized S-expression language. The parser
//! only recovers the nesting structure; giving meaning to the atoms is the
//! job of [`crate::ir::read`].

mod span;

pub use span::*;

use serde::{Deserialize, Serialize};

/// A single S-expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SExpr {
    /// `( ... )`
    List(Vec<Spanned<SExpr>>),
    /// Bare keyword or operator name, e.g. `block` or `i32.add`
    Atom(String),
    /// `$name`, stored without the sigil
    Label(String),
    Int(i64),
    Float(f64),
}

impl SExpr {
    pub fn as_list(&self) -> Option<&[Spanned<SExpr>]> {
        match self {
            SExpr::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            SExpr::Label(label) => Some(label),
            _ => None,
        }
    }

    /// The head atom of a list, e.g. `block` for `(block ...)`
    pub fn head(&self) -> Option<&str> {
        self.as_list()
            .and_then(|items| items.first())
            .and_then(|first| first.node.as_atom())
    }

    /// Short description used in diagnostics
    pub fn describe(&self) -> String {
        match self {
            SExpr::List(_) => match self.head() {
                Some(head) => format!("`({head} ...)`"),
                None => "list".to_string(),
            },
            SExpr::Atom(atom) => format!("`{atom}`"),
            SExpr::Label(label) => format!("`${label}`"),
            SExpr::Int(n) => format!("`{n}`"),
            SExpr::Float(x) => format!("`{x}`"),
        }
    }
}
