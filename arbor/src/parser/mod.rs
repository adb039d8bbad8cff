//! Parser implementation using lalrpop

use crate::ast::{SExpr, Span, Spanned};
use crate::error::{ArborError, Result};
use crate::lexer::Token;

#[cfg(test)]
mod tests;

lalrpop_util::lalrpop_mod!(
    #[allow(clippy::all)]
    grammar
);

/// Parse tokens into a sequence of top-level S-expressions
pub fn parse(tokens: Vec<(Token, Span)>) -> Result<Vec<Spanned<SExpr>>> {
    let token_iter = tokens
        .into_iter()
        .map(|(tok, span)| (span.start, tok, span.end));

    grammar::DocumentParser::new()
        .parse(token_iter)
        .map_err(|e| {
            let span = match &e {
                lalrpop_util::ParseError::InvalidToken { location } => Span::new(*location, *location + 1),
                lalrpop_util::ParseError::UnrecognizedEof { location, .. } => {
                    Span::new(*location, *location + 1)
                }
                lalrpop_util::ParseError::UnrecognizedToken { token, .. } => {
                    Span::new(token.0, token.2)
                }
                lalrpop_util::ParseError::ExtraToken { token } => Span::new(token.0, token.2),
                lalrpop_util::ParseError::User { .. } => Span::new(0, 1),
            };
            ArborError::parser(format!("{e}"), span)
        })
}

/// Tokenize and parse source text
pub fn parse_source(source: &str) -> Result<Vec<Spanned<SExpr>>> {
    let tokens = crate::lexer::tokenize(source)?;
    parse(tokens)
}
