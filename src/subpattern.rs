// subpattern.rs - Parsed pattern model consumed by the compiler.
//
// The textual parser lives outside this crate; it hands over a
// `ParsedPattern`: a tree of `Node`s plus the `State` it accumulated
// (group count, group names, group widths, global flags). Nothing here is
// mutated by the compiler.

use std::hash::BuildHasherDefault;

use indexmap::IndexMap;
use rustc_hash::FxHasher;

use crate::constants::*;
use crate::error::{InternalError, Result};

pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Repetition flavour of a `Node::Repeat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatKind {
    /// Lazy (`*?`, `+?`, `{m,n}?`).
    Min,
    /// Greedy.
    Max,
    /// Possessive (`*+`, `++`, `{m,n}+`).
    Possessive,
}

impl RepeatKind {
    pub fn opcode(self) -> Opcode {
        match self {
            RepeatKind::Min => Opcode::MinRepeat,
            RepeatKind::Max => Opcode::MaxRepeat,
            RepeatKind::Possessive => Opcode::PossessiveRepeat,
        }
    }
}

/// A member of a character class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetItem {
    Literal(u32),
    /// Inclusive range.
    Range(u32, u32),
    RangeUniIgnore(u32, u32),
    Negate,
    Category(ChCode),
    /// 256-bit bitmap as 8 code words.
    Charset(Vec<SreCode>),
    /// Block count, 64 words of block indices, then the blocks.
    BigCharset(Vec<SreCode>),
}

impl SetItem {
    pub fn opcode(&self) -> Opcode {
        match self {
            SetItem::Literal(_) => Opcode::Literal,
            SetItem::Range(..) => Opcode::Range,
            SetItem::RangeUniIgnore(..) => Opcode::RangeUniIgnore,
            SetItem::Negate => Opcode::Negate,
            SetItem::Category(_) => Opcode::Category,
            SetItem::Charset(_) => Opcode::Charset,
            SetItem::BigCharset(_) => Opcode::BigCharset,
        }
    }
}

/// One operation of a parsed pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Literal(u32),
    NotLiteral(u32),
    Any,
    In(Vec<SetItem>),
    Assert {
        negated: bool,
        lookbehind: bool,
        body: SubPattern,
    },
    At(AtCode),
    Branch(Vec<SubPattern>),
    Category(ChCode),
    /// Backreference to a 1-based group number.
    GroupRef(usize),
    GroupRefExists {
        group: usize,
        yes: SubPattern,
        no: Option<SubPattern>,
    },
    SubPattern {
        group: Option<usize>,
        add_flags: Flags,
        del_flags: Flags,
        body: SubPattern,
    },
    AtomicGroup(SubPattern),
    Repeat {
        kind: RepeatKind,
        min: u32,
        max: u32,
        body: SubPattern,
    },
    Success,
    Failure,
}

impl Node {
    pub fn literal(c: char) -> Node {
        Node::Literal(c as u32)
    }

    /// Capturing group.
    pub fn group(group: usize, body: SubPattern) -> Node {
        Node::SubPattern {
            group: Some(group),
            add_flags: Flags::empty(),
            del_flags: Flags::empty(),
            body,
        }
    }

    /// Non-capturing group, optionally changing flags.
    pub fn non_capturing(add_flags: Flags, del_flags: Flags, body: SubPattern) -> Node {
        Node::SubPattern {
            group: None,
            add_flags,
            del_flags,
            body,
        }
    }

    pub fn repeat(kind: RepeatKind, min: u32, max: u32, body: SubPattern) -> Node {
        Node::Repeat {
            kind,
            min,
            max,
            body,
        }
    }

    /// The tag identifying this operation.
    pub fn opcode(&self) -> Opcode {
        match self {
            Node::Literal(_) => Opcode::Literal,
            Node::NotLiteral(_) => Opcode::NotLiteral,
            Node::Any => Opcode::Any,
            Node::In(_) => Opcode::In,
            Node::Assert { negated: false, .. } => Opcode::Assert,
            Node::Assert { negated: true, .. } => Opcode::AssertNot,
            Node::At(_) => Opcode::At,
            Node::Branch(_) => Opcode::Branch,
            Node::Category(_) => Opcode::Category,
            Node::GroupRef(_) => Opcode::GroupRef,
            Node::GroupRefExists { .. } => Opcode::GroupRefExists,
            Node::SubPattern { .. } => Opcode::Subpattern,
            Node::AtomicGroup(_) => Opcode::AtomicGroup,
            Node::Repeat { kind, .. } => kind.opcode(),
            Node::Success => Opcode::Success,
            Node::Failure => Opcode::Failure,
        }
    }

    /// Operations consuming exactly one character.
    pub fn is_unit(&self) -> bool {
        matches!(
            self,
            Node::Literal(_) | Node::NotLiteral(_) | Node::Any | Node::In(_)
        )
    }
}

/// An ordered sequence of operations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubPattern {
    pub data: Vec<Node>,
    /// Offset of this subpattern in the pattern text, when the parser knows it.
    pub pos: Option<usize>,
}

impl SubPattern {
    pub fn new(data: Vec<Node>) -> Self {
        SubPattern { data, pos: None }
    }

    /// A run of literal characters.
    pub fn from_literal(s: &str) -> Self {
        SubPattern::new(s.chars().map(Node::literal).collect())
    }

    pub fn at_pos(mut self, pos: usize) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Minimum and maximum number of characters this subpattern can match.
    /// The minimum saturates at `MAXREPEAT - 1`, the maximum at `MAXREPEAT`
    /// which also stands for "unbounded".
    pub fn getwidth(&self, state: &State) -> (u32, u32) {
        let mut lo: u64 = 0;
        let mut hi: u64 = 0;
        for node in &self.data {
            match node {
                Node::Branch(alternatives) => {
                    let mut i = (MAXREPEAT - 1) as u64;
                    let mut j = 0u64;
                    for alt in alternatives {
                        let (l, h) = alt.getwidth(state);
                        i = i.min(l as u64);
                        j = j.max(h as u64);
                    }
                    lo += i;
                    hi += j;
                }
                Node::AtomicGroup(body) | Node::SubPattern { body, .. } => {
                    let (i, j) = body.getwidth(state);
                    lo += i as u64;
                    hi += j as u64;
                }
                Node::Repeat { min, max, body, .. } => {
                    let (i, j) = body.getwidth(state);
                    lo += i as u64 * *min as u64;
                    if *max == MAXREPEAT && j != 0 {
                        hi = MAXREPEAT as u64;
                    } else {
                        hi += j as u64 * *max as u64;
                    }
                }
                Node::Literal(_)
                | Node::NotLiteral(_)
                | Node::Any
                | Node::In(_)
                | Node::Category(_) => {
                    lo += 1;
                    hi += 1;
                }
                Node::GroupRef(group) => {
                    let (i, j) = state.group_width(*group);
                    lo += i as u64;
                    hi += j as u64;
                }
                Node::GroupRefExists { yes, no, .. } => {
                    let (mut i, mut j) = yes.getwidth(state);
                    match no {
                        Some(no) => {
                            let (l, h) = no.getwidth(state);
                            i = i.min(l);
                            j = j.max(h);
                        }
                        None => i = 0,
                    }
                    lo += i as u64;
                    hi += j as u64;
                }
                Node::Success => break,
                Node::Assert { .. } | Node::At(_) | Node::Failure => {}
            }
            // Saturate early so long patterns cannot overflow the u64 sums.
            lo = lo.min(MAXREPEAT as u64);
            hi = hi.min(MAXREPEAT as u64);
        }
        (
            lo.min(MAXREPEAT as u64 - 1) as u32,
            hi.min(MAXREPEAT as u64) as u32,
        )
    }
}

impl From<Vec<Node>> for SubPattern {
    fn from(data: Vec<Node>) -> Self {
        SubPattern::new(data)
    }
}

/// Group bookkeeping accumulated by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State {
    pub flags: Flags,
    groupdict: FxIndexMap<String, usize>,
    /// Index 0 is the whole match; `None` while a group is still open.
    groupwidths: Vec<Option<(u32, u32)>>,
}

impl Default for State {
    fn default() -> Self {
        State::new(Flags::empty())
    }
}

impl State {
    pub fn new(flags: Flags) -> Self {
        State {
            flags,
            groupdict: FxIndexMap::default(),
            groupwidths: vec![None],
        }
    }

    /// Number of groups including group 0.
    pub fn groups(&self) -> usize {
        self.groupwidths.len()
    }

    pub fn groupdict(&self) -> &FxIndexMap<String, usize> {
        &self.groupdict
    }

    /// Allocate the next group number, optionally binding a name to it.
    pub fn open_group(&mut self, name: Option<&str>) -> Result<usize> {
        let gid = self.groupwidths.len();
        if gid as u64 > MAXGROUPS as u64 {
            return Err(InternalError::InvalidGroup(gid).into());
        }
        self.groupwidths.push(None);
        if let Some(name) = name {
            self.groupdict.insert(name.to_owned(), gid);
        }
        Ok(gid)
    }

    /// Record the width of a finished group.
    pub fn close_group(&mut self, gid: usize, body: &SubPattern) -> Result<()> {
        if gid == 0 || gid >= self.groupwidths.len() {
            return Err(InternalError::InvalidGroup(gid).into());
        }
        let width = body.getwidth(self);
        self.groupwidths[gid] = Some(width);
        Ok(())
    }

    /// Width of a closed group; an open or unknown group is treated as
    /// unbounded.
    pub fn group_width(&self, gid: usize) -> (u32, u32) {
        self.groupwidths
            .get(gid)
            .copied()
            .flatten()
            .unwrap_or((0, MAXREPEAT))
    }
}

/// Parser output: the root subpattern and its state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedPattern {
    pub state: State,
    pub root: SubPattern,
}

impl ParsedPattern {
    pub fn new(state: State, root: SubPattern) -> Self {
        ParsedPattern { state, root }
    }

    /// A pattern without groups.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        ParsedPattern::new(State::default(), SubPattern::new(nodes))
    }

    pub fn getwidth(&self) -> (u32, u32) {
        self.root.getwidth(&self.state)
    }
}

// ============================================================================
// Tests
// ============================================================================
