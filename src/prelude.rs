// prelude.rs - Convenient re-exports.
//
//! # Prelude
//!
//! ```
//! use sre_compile::prelude::*;
//!
//! let parsed = ParsedPattern::from_nodes(vec![Node::Any]);
//! let code = compile_code(&parsed, Flags::DOTALL).unwrap();
//! assert!(code.contains(&Opcode::AnyAll.code()));
//! ```

pub use crate::cache::{CacheConfig, Parser, PatternCache};
pub use crate::compiler::{compile, compile_code};
pub use crate::constants::{AtCode, ChCode, Flags, Opcode, SreCode, MAXREPEAT};
pub use crate::error::{Error, PatternError, PatternErrorKind, Result};
pub use crate::pattern::{Pattern, PatternInput, PatternSource};
pub use crate::subpattern::{Node, ParsedPattern, RepeatKind, SetItem, State, SubPattern};
pub use crate::template::Template;
