// pattern.rs - Compiled pattern object.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::constants::{Flags, SreCode};
use crate::dis::dis;
use crate::subpattern::FxIndexMap;

/// The value a pattern was compiled from. Text and byte patterns with the
/// same content are distinct cache keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PatternSource {
    Text(String),
    Bytes(Vec<u8>),
}

impl PatternSource {
    pub fn is_bytes(&self) -> bool {
        matches!(self, PatternSource::Bytes(_))
    }

    /// Text for messages; byte patterns are decoded lossily.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            PatternSource::Text(s) => Cow::Borrowed(s),
            PatternSource::Bytes(b) => String::from_utf8_lossy(b),
        }
    }
}

impl From<&str> for PatternSource {
    fn from(s: &str) -> Self {
        PatternSource::Text(s.to_owned())
    }
}

impl From<String> for PatternSource {
    fn from(s: String) -> Self {
        PatternSource::Text(s)
    }
}

impl From<&[u8]> for PatternSource {
    fn from(b: &[u8]) -> Self {
        PatternSource::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for PatternSource {
    fn from(b: Vec<u8>) -> Self {
        PatternSource::Bytes(b)
    }
}

impl fmt::Display for PatternSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternSource::Text(s) => write!(f, "{:?}", s),
            PatternSource::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
        }
    }
}

/// Argument accepted by the pattern cache: a pattern to compile, or one
/// compiled earlier.
#[derive(Clone, Debug)]
pub enum PatternInput {
    Source(PatternSource),
    Compiled(Arc<Pattern>),
}

impl From<PatternSource> for PatternInput {
    fn from(source: PatternSource) -> Self {
        PatternInput::Source(source)
    }
}

impl From<&str> for PatternInput {
    fn from(s: &str) -> Self {
        PatternInput::Source(s.into())
    }
}

impl From<&[u8]> for PatternInput {
    fn from(b: &[u8]) -> Self {
        PatternInput::Source(b.into())
    }
}

impl From<Arc<Pattern>> for PatternInput {
    fn from(p: Arc<Pattern>) -> Self {
        PatternInput::Compiled(p)
    }
}

/// A compiled program with its group metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    source: Option<PatternSource>,
    flags: Flags,
    code: Vec<SreCode>,
    groups: usize,
    groupindex: FxIndexMap<String, usize>,
    indexgroup: Vec<Option<String>>,
}

impl Pattern {
    pub(crate) fn new(
        source: Option<PatternSource>,
        flags: Flags,
        code: Vec<SreCode>,
        groups: usize,
        groupindex: FxIndexMap<String, usize>,
        indexgroup: Vec<Option<String>>,
    ) -> Self {
        Pattern {
            source,
            flags,
            code,
            groups,
            groupindex,
            indexgroup,
        }
    }

    /// The source the pattern was compiled from, if known.
    pub fn source(&self) -> Option<&PatternSource> {
        self.source.as_ref()
    }

    /// Caller flags merged with the flags the parser collected.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn code(&self) -> &[SreCode] {
        &self.code
    }

    /// Number of capturing groups.
    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Group name to group number.
    pub fn groupindex(&self) -> &FxIndexMap<String, usize> {
        &self.groupindex
    }

    /// Group number to group name; position 0 is the whole match and
    /// unnamed groups are `None`.
    pub fn indexgroup(&self) -> &[Option<String>] {
        &self.indexgroup
    }

    pub fn group_name(&self, group: usize) -> Option<&str> {
        self.indexgroup.get(group)?.as_deref()
    }

    pub fn group_number(&self, name: &str) -> Option<usize> {
        self.groupindex.get(name).copied()
    }

    /// Human-readable listing of the program.
    pub fn dis(&self) -> String {
        dis(&self.code)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Pattern({})", source)?,
            None => f.write_str("Pattern(<parsed>)")?,
        }
        if !self.flags.is_empty() {
            write!(f, " flags={:?}", self.flags)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
