//! # sre-compile
//!
//! Regular-expression bytecode compiler. Takes a parsed pattern tree and
//! emits the flat code-word program a backtracking matcher executes, with
//! an INFO header carrying width bounds and a literal-prefix or charset
//! search hint. Character classes are compressed into literal/range
//! items, 256-bit bitmaps or block-deduplicated big charsets, with
//! case-fold expansion under ignore-case.
//!
//! ## Quick Start
//!
//! ```rust
//! use sre_compile::prelude::*;
//!
//! // "abc" as the parser would hand it over.
//! let parsed = ParsedPattern::from_nodes(vec![
//!     Node::literal('a'),
//!     Node::literal('b'),
//!     Node::literal('c'),
//! ]);
//! let pattern = compile(&parsed, Flags::empty(), Some("abc".into())).unwrap();
//! assert_eq!(pattern.code()[0], Opcode::Info.code());
//! assert_eq!(*pattern.code().last().unwrap(), Opcode::Success.code());
//! println!("{}", pattern.dis());
//! ```
//!
//! Patterns given as text go through a [`cache::PatternCache`], which owns
//! the [`cache::Parser`] turning text into trees:
//!
//! ```rust
//! use sre_compile::prelude::*;
//!
//! let cache = PatternCache::builder(|src: &PatternSource, _flags: Flags| -> Result<ParsedPattern> {
//!     Ok(ParsedPattern::from_nodes(
//!         src.to_text().chars().map(Node::literal).collect(),
//!     ))
//! })
//! .max_cache(64)
//! .build();
//!
//! let a = cache.compile_cached("hello", Flags::empty()).unwrap();
//! let b = cache.compile_cached("hello", Flags::empty()).unwrap();
//! assert!(std::sync::Arc::ptr_eq(&a, &b));
//! ```
//!
//! ## Module Structure
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`constants`] | Opcodes, anchors, categories, flags, limits |
//! | [`subpattern`] | Parsed pattern tree and group state |
//! | [`casefold`] | Case-fold functions and fold-equivalence data |
//! | [`charset`] | Charset optimizer and emitter |
//! | [`prefix`] | Literal/charset prefix analysis, overlap table |
//! | [`compiler`] | Bytecode emitter and INFO block |
//! | [`pattern`] | Compiled pattern object |
//! | [`dis`] | Program listing |
//! | [`cache`] | Two-tier pattern cache and template cache |
//! | [`template`] | Replacement templates |
//! | [`error`] | Error types |

pub mod cache;
pub mod casefold;
pub mod charset;
pub mod compiler;
pub mod constants;
pub mod dis;
pub mod error;
pub mod pattern;
pub mod prefix;
pub mod prelude;
pub mod subpattern;
pub mod template;

pub use compiler::{compile, compile_code};
pub use error::{Error, Result};
