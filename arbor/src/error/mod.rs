//! Error types and reporting

use crate::ast::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ArborError>;

/// Errors raised while loading IR text or configuration.
///
/// The optimizer itself never fails: it either rewrites a pattern or leaves
/// it alone. Everything here comes from the surrounding tooling.
#[derive(Debug, Error)]
pub enum ArborError {
    #[error("Lexer error at {span}: {message}")]
    Lexer { message: String, span: Span },

    #[error("Parser error at {span}: {message}")]
    Parser { message: String, span: Span },

    /// Well-formed S-expressions that do not describe valid IR
    #[error("Read error at {span}: {message}")]
    Read { message: String, span: Span },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Config error: {message}")]
    Config { message: String },
}

impl ArborError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::Parser {
            message: message.into(),
            span,
        }
    }

    pub fn read(message: impl Into<String>, span: Span) -> Self {
        Self::Read {
            message: message.into(),
            span,
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexer { span, .. } => Some(*span),
            Self::Parser { span, .. } => Some(*span),
            Self::Read { span, .. } => Some(*span),
            Self::Io { .. } | Self::Config { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lexer { message, .. } => message,
            Self::Parser { message, .. } => message,
            Self::Read { message, .. } => message,
            Self::Io { message } => message,
            Self::Config { message } => message,
        }
    }
}

impl From<std::io::Error> for ArborError {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

/// Report error with ariadne
pub fn report_error(filename: &str, source: &str, error: &ArborError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = match error {
        ArborError::Lexer { .. } => "Lexer",
        ArborError::Parser { .. } => "Parser",
        ArborError::Read { .. } => "Read",
        ArborError::Io { .. } => "IO",
        ArborError::Config { .. } => "Config",
    };

    let printed = if let Some(span) = error.span() {
        Report::build(ReportKind::Error, (filename, span.range()))
            .with_message(format!("{kind} error"))
            .with_label(
                Label::new((filename, span.range()))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
            .print((filename, Source::from(source)))
    } else {
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind} error: {}", error.message()))
            .finish()
            .print((filename, Source::from(source)))
    };

    if printed.is_err() {
        eprintln!("{kind} error: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_only_on_source_errors() {
        assert_eq!(ArborError::read("bad", Span::new(1, 4)).span(), Some(Span::new(1, 4)));
        assert_eq!(ArborError::config_error("bad").span(), None);
    }

    #[test]
    fn test_display_includes_message() {
        let err = ArborError::parser("unexpected `)`", Span::new(0, 1));
        assert_eq!(err.to_string(), "Parser error at 0..1: unexpected `)`");
        assert_eq!(err.message(), "unexpected `)`");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ArborError = io.into();
        assert!(matches!(err, ArborError::Io { .. }));
        assert_eq!(err.message(), "missing");
    }
}
