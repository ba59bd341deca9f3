//! Parsing, writing and diffing primitives for FortiOS CLI configuration text.
//!
//! The format is a nested block structure:
//!
//! ```text
//! config firewall address
//!     edit "web"
//!         set subnet 10.0.0.10 255.255.255.255
//!     next
//! end
//! ```
//!
//! This crate turns it into a generic [`ConfigTree`] and knows nothing about
//! what the sections mean; firewall semantics live in higher-level tools.

pub mod diff;
pub mod lexer;
pub mod parser;
pub mod tree;
pub mod writer;

pub use diff::{diff, diff_with_options, DiffEntry, DiffOptions, DiffSummary};
pub use lexer::{lex, Statement};
pub use parser::{parse, parse_file, ParseError, SyntaxErrorKind};
pub use tree::{ConfigBlock, ConfigEntry, ConfigTree, DirectiveNote, SetOp, Setting};
pub use writer::{write, write_block, write_file, WriteError};
