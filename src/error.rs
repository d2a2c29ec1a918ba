// error.rs - Error types for pattern compilation.
//
// Pattern errors are user-facing and carry the pattern text, flags and a
// source position when the parser supplied one. Internal errors mean the
// parser handed the compiler a tree it should never have produced.

use thiserror::Error;

use crate::constants::{Flags, Opcode};

/// Error type for compilation and the pattern cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid user input discovered while compiling.
    #[error(transparent)]
    Pattern(#[from] PatternError),
    /// Parser/compiler contract violation (a bug, not bad input).
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
    /// Flags were passed together with an already-compiled pattern.
    #[error("cannot process flags argument with a compiled pattern")]
    InvalidArgument,
    /// Error reported by the external pattern parser.
    #[error("parse error: {0}")]
    Parse(String),
}

impl Error {
    pub fn is_pattern_error(&self) -> bool {
        matches!(self, Error::Pattern(_))
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }

    /// Kind of a pattern error, if this is one.
    pub fn pattern_kind(&self) -> Option<PatternErrorKind> {
        match self {
            Error::Pattern(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Kinds of user-facing pattern errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternErrorKind {
    LookBehindNotFixedWidth,
    LookBehindTooLong,
    TemplateRepeat,
    BadEscape,
    MissingGroupName,
    UnknownGroupName,
    InvalidGroupReference,
}

impl PatternErrorKind {
    fn message(self) -> &'static str {
        match self {
            PatternErrorKind::LookBehindNotFixedWidth => {
                "look-behind requires fixed-width pattern"
            }
            PatternErrorKind::LookBehindTooLong => "looks too much behind",
            PatternErrorKind::TemplateRepeat => "unsupported template operator",
            PatternErrorKind::BadEscape => "bad escape",
            PatternErrorKind::MissingGroupName => "missing group name",
            PatternErrorKind::UnknownGroupName => "unknown group name",
            PatternErrorKind::InvalidGroupReference => "invalid group reference",
        }
    }
}

/// A user-facing error in a pattern or replacement template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{}", .kind.message(), detail_and_position(.detail, .pos))]
pub struct PatternError {
    pub kind: PatternErrorKind,
    /// Extra detail (offending escape, group name, ...).
    pub detail: Option<String>,
    pub pattern: Option<String>,
    pub pos: Option<usize>,
    pub flags: Flags,
}

impl PatternError {
    pub fn new(kind: PatternErrorKind) -> Self {
        PatternError {
            kind,
            detail: None,
            pattern: None,
            pos: None,
            flags: Flags::empty(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn at(mut self, pos: Option<usize>) -> Self {
        self.pos = pos;
        self
    }

    /// Attach the pattern text and flags, keeping any already recorded.
    pub fn in_pattern(mut self, pattern: Option<&str>, flags: Flags) -> Self {
        if self.pattern.is_none() {
            self.pattern = pattern.map(str::to_owned);
        }
        self.flags |= flags;
        self
    }
}

fn detail_and_position(detail: &Option<String>, pos: &Option<usize>) -> String {
    let mut text = String::new();
    if let Some(detail) = detail {
        text.push(' ');
        text.push_str(detail);
    }
    if let Some(pos) = pos {
        text.push_str(&format!(" at position {}", pos));
    }
    text
}

/// Contract violations between the parser and the compiler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InternalError {
    #[error("malformed charset: {0}")]
    MalformedCharset(&'static str),
    #[error("malformed operand for {op}: {reason}")]
    MalformedOperand { op: Opcode, reason: &'static str },
    #[error("unsupported set operator {0}")]
    UnsupportedSetOperator(Opcode),
    #[error("invalid group number {0}")]
    InvalidGroup(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Tests
// ============================================================================
