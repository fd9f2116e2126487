//! sh-syntax - a multi-dialect shell parser
//!
//! This library parses POSIX sh, Bash, MirBSDKorn (mksh) and Bats source
//! into a position-annotated AST, reporting precise errors on malformed
//! input. Pretty-printing, pattern matching and execution are out of
//! scope; the AST is the interface to those tools.

pub mod ast;
pub mod parser;

pub use ast::types::*;
pub use ast::{walk, NodeRef};
pub use parser::{is_incomplete, split_braces, valid_name, LangVariant, ParseError, Parser, SyntaxError};
