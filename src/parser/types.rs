//! Parser Types and Constants
//!
//! Shared types used across parser modules: the error type, the dialect
//! selector, and small classification helpers.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::ast::types::Position;

/// Shell dialect to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LangVariant {
    /// POSIX sh, as described by POSIX.1-2017 and implemented by dash.
    Posix,
    /// GNU Bash 5.2.
    #[default]
    Bash,
    /// The MirBSD Korn shell, mksh R59.
    MirBsdKorn,
    /// Bats, the Bash automated testing system; a Bash superset.
    Bats,
}

impl LangVariant {
    /// Bash and Bats share Bash's grammar.
    pub fn is_bash(&self) -> bool {
        matches!(self, Self::Bash | Self::Bats)
    }

    pub fn is_mksh(&self) -> bool {
        matches!(self, Self::MirBsdKorn)
    }

    pub fn is_posix(&self) -> bool {
        matches!(self, Self::Posix)
    }
}

impl fmt::Display for LangVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Posix => "posix",
            Self::Bash => "bash",
            Self::MirBsdKorn => "mksh",
            Self::Bats => "bats",
        };
        f.write_str(s)
    }
}

/// A syntax error with its source position.
///
/// Rendered as `<filename>:<line>:<col>: <text>`, with the filename part
/// omitted when no name was given to the parser. Saturated line or column
/// numbers render as `?`.
#[derive(Debug, Clone, Error)]
pub struct SyntaxError {
    pub filename: String,
    pub pos: Position,
    pub message: String,
    /// Set when the cause is premature EOF inside an open construct, so
    /// interactive callers can prompt for more input.
    pub incomplete: bool,
}

impl SyntaxError {
    pub fn new(filename: impl Into<String>, pos: Position, message: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            pos,
            message: message.into(),
            incomplete: false,
        }
    }

    pub fn incomplete(mut self) -> Self {
        self.incomplete = true;
        self
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filename.is_empty() {
            write!(f, "{}: {}", self.pos, self.message)
        } else {
            write!(f, "{}:{}: {}", self.filename, self.pos, self.message)
        }
    }
}

/// Error returned by all parse entry points.
///
/// Read errors from the byte source are carried through unchanged.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ParseError {
    /// Whether the error was caused by reaching EOF inside an open
    /// construct, such as an unclosed quote or parenthesis.
    pub fn is_incomplete(&self) -> bool {
        match self {
            Self::Syntax(e) => e.incomplete,
            Self::Io(_) => false,
        }
    }
}

/// Whether an error from a parse entry point means the input was cut short
/// inside an open construct. Always false for I/O errors.
pub fn is_incomplete(err: &ParseError) -> bool {
    err.is_incomplete()
}

/// Whether `s` is a valid shell variable name per POSIX:
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Whether `c` can appear in a shell variable name after the first
/// character.
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Special parameters that can follow `$` or appear inside `${...}`.
pub fn is_special_param(c: char) -> bool {
    matches!(c, '@' | '*' | '#' | '?' | '-' | '$' | '!' | '0'..='9')
}

/// Builds the message for a feature used under the wrong dialect, e.g.
/// `arrays are a bash/mksh feature; tried parsing as posix`.
pub fn lang_feature_msg(feature: &str, lang: LangVariant) -> String {
    format!("{feature}; tried parsing as {lang}")
}
