//! Token definitions

use logos::Logos;
use std::fmt;

/// Token of the S-expression text format
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
#[logos(skip r";;[^\n]*")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    /// `$name`, without the sigil
    #[regex(r"\$[A-Za-z0-9_.\-]+", |lex| lex.slice()[1..].to_string())]
    Label(String),

    /// Keywords and operator names (`block`, `i32.add`, `local.get`, ...)
    #[regex(r"[a-z][A-Za-z0-9_.]*", |lex| lex.slice().to_string())]
    Atom(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Label(name) => write!(f, "${name}"),
            Token::Atom(atom) => write!(f, "{atom}"),
            Token::Int(n) => write!(f, "{n}"),
            Token::Float(x) => write!(f, "{x}"),
        }
    }
}
