// compiler.rs - Bytecode emitter.
//
// Walks a parsed pattern and emits a flat program of code words for the
// matching engine: an INFO header with width bounds and a search hint, the
// body, and a final SUCCESS. Forward references (skips and jumps) are
// emitted as placeholder words whose index is remembered and patched once
// the target is known; every offset is a count of code words relative to
// the placeholder itself.

use log::debug;
use smallvec::SmallVec;

use crate::casefold::Folding;
use crate::charset::{compile_charset, optimize_charset};
use crate::constants::*;
use crate::dis::dis;
use crate::error::{Error, InternalError, PatternError, PatternErrorKind, Result};
use crate::pattern::{Pattern, PatternSource};
use crate::prefix::{generate_overlap_table, get_charset_prefix, get_literal_prefix};
use crate::subpattern::{Node, ParsedPattern, RepeatKind, SetItem, State, SubPattern};

// ============================================================================
// Emission context
// ============================================================================

/// Per-compilation context threaded through the recursive walk. Each call
/// to `compile_code` owns its own, so nested compilations never share
/// state.
struct Compiler<'a> {
    state: &'a State,
    code: Vec<SreCode>,
}

impl<'a> Compiler<'a> {
    fn new(state: &'a State) -> Self {
        Compiler {
            state,
            code: Vec::new(),
        }
    }

    #[inline]
    fn emit(&mut self, op: Opcode) {
        self.code.push(op.code());
    }

    #[inline]
    fn emit_word(&mut self, word: SreCode) {
        self.code.push(word);
    }

    /// Emit a zero word to be patched later and return its index.
    #[inline]
    fn placeholder(&mut self) -> usize {
        let at = self.code.len();
        self.code.push(0);
        at
    }

    /// Store the distance from `at` to the current end of the program.
    #[inline]
    fn patch(&mut self, at: usize) {
        self.patch_with(at, 0);
    }

    fn patch_with(&mut self, at: usize, extra: usize) {
        self.code[at] = (self.code.len() - at + extra) as SreCode;
    }

    /// Zero-based group index for a 1-based group number.
    fn group_index(&self, group: usize) -> Result<SreCode> {
        if group == 0 || group >= self.state.groups() {
            return Err(InternalError::InvalidGroup(group).into());
        }
        Ok((group - 1) as SreCode)
    }

    // ========================================================================
    // Literals and classes
    // ========================================================================

    fn compile_literal(&mut self, op: Opcode, ch: u32, flags: Flags) {
        if !flags.contains(Flags::IGNORECASE) {
            self.emit(op);
            self.emit_word(ch);
            return;
        }
        if flags.contains(Flags::LOCALE) {
            self.emit(op.locale_ignore());
            self.emit_word(ch);
            return;
        }
        let folding = if flags.contains(Flags::UNICODE) {
            Folding::UNICODE
        } else {
            Folding::ASCII
        };
        if !folding.has_equivalents(ch) {
            self.emit(op);
            self.emit_word(ch);
            return;
        }

        let lo = (folding.lower)(ch);
        let extra = folding.extra_folds(lo);
        if !folding.is_unicode() {
            self.emit(op.ignore());
            self.emit_word(lo);
        } else if extra.is_empty() {
            self.emit(op.unicode_ignore());
            self.emit_word(lo);
        } else {
            // Equivalents beyond the lower/upper pair: test the whole class.
            self.emit(Opcode::InUniIgnore);
            let skip = self.placeholder();
            if op == Opcode::NotLiteral {
                self.emit(Opcode::Negate);
            }
            for &k in std::iter::once(&lo).chain(extra) {
                self.emit(Opcode::Literal);
                self.emit_word(k);
            }
            self.emit(Opcode::Failure);
            self.patch(skip);
        }
    }

    fn compile_in(&mut self, items: &[SetItem], flags: Flags) -> Result<()> {
        let folding = Folding::for_flags(flags);
        let (charset, hascased) = optimize_charset(items, folding.as_ref())?;
        let op = if flags.is_locale_ignorecase() {
            Opcode::InLocIgnore
        } else if !hascased {
            Opcode::In
        } else if folding.is_some_and(|f| f.is_unicode()) {
            Opcode::InUniIgnore
        } else {
            Opcode::InIgnore
        };
        self.emit(op);
        let skip = self.placeholder();
        compile_charset(&charset, flags, &mut self.code)?;
        self.patch(skip);
        Ok(())
    }

    // ========================================================================
    // Tree compilation
    // ========================================================================

    fn compile(&mut self, pattern: &SubPattern, flags: Flags) -> Result<()> {
        for node in &pattern.data {
            match node {
                Node::Literal(ch) => self.compile_literal(Opcode::Literal, *ch, flags),
                Node::NotLiteral(ch) => self.compile_literal(Opcode::NotLiteral, *ch, flags),
                Node::In(items) => self.compile_in(items, flags)?,
                Node::Any => {
                    if flags.contains(Flags::DOTALL) {
                        self.emit(Opcode::AnyAll);
                    } else {
                        self.emit(Opcode::Any);
                    }
                }
                Node::Repeat {
                    kind,
                    min,
                    max,
                    body,
                } => {
                    if flags.contains(Flags::TEMPLATE) {
                        return Err(PatternError::new(PatternErrorKind::TemplateRepeat)
                            .with_detail(kind.opcode().name())
                            .at(body.pos.or(pattern.pos))
                            .into());
                    }
                    if min > max {
                        return Err(InternalError::MalformedOperand {
                            op: kind.opcode(),
                            reason: "min exceeds max",
                        }
                        .into());
                    }
                    self.compile_repeat(*kind, *min, *max, body, flags)?;
                }
                Node::SubPattern {
                    group,
                    add_flags,
                    del_flags,
                    body,
                } => {
                    let index = group.map(|g| self.group_index(g)).transpose()?;
                    if let Some(index) = index {
                        self.emit(Opcode::Mark);
                        self.emit_word(index * 2);
                    }
                    self.compile(body, flags.combine(*add_flags, *del_flags))?;
                    if let Some(index) = index {
                        self.emit(Opcode::Mark);
                        self.emit_word(index * 2 + 1);
                    }
                }
                Node::AtomicGroup(body) => {
                    self.emit(Opcode::AtomicGroup);
                    let skip = self.placeholder();
                    self.compile(body, flags)?;
                    self.emit(Opcode::Success);
                    self.patch(skip);
                }
                Node::Assert {
                    negated,
                    lookbehind,
                    body,
                } => {
                    self.emit(if *negated {
                        Opcode::AssertNot
                    } else {
                        Opcode::Assert
                    });
                    let skip = self.placeholder();
                    if *lookbehind {
                        let back = self.lookbehind_width(body, pattern.pos)?;
                        self.emit_word(back);
                    } else {
                        self.emit_word(0);
                    }
                    self.compile(body, flags)?;
                    self.emit(Opcode::Success);
                    self.patch(skip);
                }
                Node::At(at) => {
                    self.emit(Opcode::At);
                    self.emit_word(at.for_flags(flags).code());
                }
                Node::Branch(alternatives) => {
                    self.emit(Opcode::Branch);
                    let mut tails: SmallVec<[usize; 8]> = SmallVec::new();
                    for alt in alternatives {
                        let skip = self.placeholder();
                        self.compile(alt, flags)?;
                        self.emit(Opcode::Jump);
                        tails.push(self.placeholder());
                        self.patch(skip);
                    }
                    self.emit(Opcode::Failure);
                    for tail in tails {
                        self.patch(tail);
                    }
                }
                Node::Category(ch) => {
                    self.emit(Opcode::Category);
                    self.emit_word(ch.for_flags(flags).code());
                }
                Node::GroupRef(group) => {
                    let index = self.group_index(*group)?;
                    let op = if !flags.contains(Flags::IGNORECASE) {
                        Opcode::GroupRef
                    } else if flags.contains(Flags::LOCALE) {
                        Opcode::GroupRefLocIgnore
                    } else if flags.contains(Flags::UNICODE) {
                        Opcode::GroupRefUniIgnore
                    } else {
                        Opcode::GroupRefIgnore
                    };
                    self.emit(op);
                    self.emit_word(index);
                }
                Node::GroupRefExists { group, yes, no } => {
                    let index = self.group_index(*group)?;
                    self.emit(Opcode::GroupRefExists);
                    self.emit_word(index);
                    let skipyes = self.placeholder();
                    self.compile(yes, flags)?;
                    match no.as_ref().filter(|no| !no.is_empty()) {
                        Some(no) => {
                            self.emit(Opcode::Jump);
                            let skipno = self.placeholder();
                            self.patch_with(skipyes, 1);
                            self.compile(no, flags)?;
                            self.patch(skipno);
                        }
                        None => self.patch_with(skipyes, 1),
                    }
                }
                Node::Success => self.emit(Opcode::Success),
                Node::Failure => self.emit(Opcode::Failure),
            }
        }
        Ok(())
    }

    fn compile_repeat(
        &mut self,
        kind: RepeatKind,
        min: u32,
        max: u32,
        body: &SubPattern,
        flags: Flags,
    ) -> Result<()> {
        if is_simple(body) {
            self.emit(match kind {
                RepeatKind::Min => Opcode::MinRepeatOne,
                RepeatKind::Max => Opcode::RepeatOne,
                RepeatKind::Possessive => Opcode::PossessiveRepeatOne,
            });
            let skip = self.placeholder();
            self.emit_word(min);
            self.emit_word(max);
            self.compile(body, flags)?;
            self.emit(Opcode::Success);
            self.patch(skip);
        } else {
            self.emit(match kind {
                RepeatKind::Possessive => Opcode::PossessiveRepeat,
                RepeatKind::Min | RepeatKind::Max => Opcode::Repeat,
            });
            let skip = self.placeholder();
            self.emit_word(min);
            self.emit_word(max);
            self.compile(body, flags)?;
            self.patch(skip);
            self.emit(match kind {
                RepeatKind::Min => Opcode::MinUntil,
                RepeatKind::Max => Opcode::MaxUntil,
                RepeatKind::Possessive => Opcode::Success,
            });
        }
        Ok(())
    }

    /// Distance a lookbehind rewinds before matching its body.
    fn lookbehind_width(&self, body: &SubPattern, outer_pos: Option<usize>) -> Result<SreCode> {
        let (lo, hi) = body.getwidth(self.state);
        let pos = body.pos.or(outer_pos);
        // A saturated minimum means the true width is not representable.
        if lo >= MAXREPEAT - 1 {
            return Err(PatternError::new(PatternErrorKind::LookBehindTooLong)
                .at(pos)
                .into());
        }
        if lo != hi {
            return Err(PatternError::new(PatternErrorKind::LookBehindNotFixedWidth)
                .at(pos)
                .into());
        }
        Ok(lo)
    }

    // ========================================================================
    // INFO block
    // ========================================================================

    fn compile_info(&mut self, pattern: &SubPattern, flags: Flags) -> Result<()> {
        let (lo, hi) = pattern.getwidth(self.state);
        let hi = hi.min(MAXCODE);
        if lo == 0 {
            self.code
                .extend_from_slice(&[Opcode::Info.code(), 4, 0, lo, hi]);
            return Ok(());
        }

        let mut prefix = None;
        let mut charset = None;
        if !flags.is_locale_ignorecase() {
            let literal = get_literal_prefix(pattern, flags);
            if literal.chars.is_empty() {
                charset = get_charset_prefix(pattern, flags).filter(|c| !c.is_empty());
            } else {
                prefix = Some(literal);
            }
        }

        self.emit(Opcode::Info);
        let skip = self.placeholder();
        let mask = match (&prefix, &charset) {
            (Some(p), _) if p.skip.is_none() && p.got_all => SRE_INFO_PREFIX | SRE_INFO_LITERAL,
            (Some(_), _) => SRE_INFO_PREFIX,
            (None, Some(_)) => SRE_INFO_CHARSET,
            (None, None) => 0,
        };
        self.emit_word(mask);
        self.emit_word(lo.min(MAXCODE));
        self.emit_word(hi);

        if let Some(mut prefix) = prefix {
            prefix.chars.truncate(MAXCODE as usize);
            let len = prefix.chars.len();
            self.emit_word(len as SreCode);
            self.emit_word(prefix.skip.unwrap_or(len) as SreCode);
            self.code.extend_from_slice(&prefix.chars);
            self.code.extend(generate_overlap_table(&prefix.chars));
        } else if let Some(charset) = charset {
            let (charset, hascased) = optimize_charset(&charset, None)?;
            debug_assert!(!hascased);
            compile_charset(&charset, flags, &mut self.code)?;
        }
        self.patch(skip);
        Ok(())
    }
}

/// A repeat body the matcher can run one character at a time: a single
/// character-consuming operation, possibly inside plain non-capturing
/// groups.
fn is_simple(body: &SubPattern) -> bool {
    match body.data.as_slice() {
        [node] if node.is_unit() => true,
        [Node::SubPattern {
            group: None,
            add_flags,
            del_flags,
            body,
        }] => add_flags.is_empty() && del_flags.is_empty() && is_simple(body),
        _ => false,
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Compile a parsed pattern into a program: INFO block, body, SUCCESS.
pub fn compile_code(parsed: &ParsedPattern, flags: Flags) -> Result<Vec<SreCode>> {
    let flags = parsed.state.flags | flags;
    let mut compiler = Compiler::new(&parsed.state);
    compiler.compile_info(&parsed.root, flags)?;
    compiler.compile(&parsed.root, flags)?;
    compiler.emit(Opcode::Success);
    Ok(compiler.code)
}

/// Compile a parsed pattern into a `Pattern` carrying its group metadata.
/// `source` is the pattern text the tree was parsed from, if any; it is
/// recorded on the pattern and used in error messages.
pub fn compile(
    parsed: &ParsedPattern,
    flags: Flags,
    source: Option<PatternSource>,
) -> Result<Pattern> {
    let code = compile_code(parsed, flags).map_err(|err| match err {
        Error::Pattern(e) => {
            let text = source.as_ref().map(PatternSource::to_text);
            Error::Pattern(e.in_pattern(text.as_deref(), flags | parsed.state.flags))
        }
        other => other,
    })?;

    if flags.contains(Flags::DEBUG) {
        debug!("compiled program:\n{}", dis(&code));
    }

    let state = &parsed.state;
    let mut indexgroup = vec![None; state.groups()];
    for (name, &index) in state.groupdict() {
        if let Some(slot) = indexgroup.get_mut(index) {
            *slot = Some(name.clone());
        }
    }
    Ok(Pattern::new(
        source,
        flags | state.flags,
        code,
        state.groups() - 1,
        state.groupdict().clone(),
        indexgroup,
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SUCCESS: u32 = Opcode::Success as u32;
    const LITERAL: u32 = Opcode::Literal as u32;

    fn body_of(nodes: Vec<Node>, flags: Flags) -> Vec<SreCode> {
        let state = State::default();
        let mut c = Compiler::new(&state);
        c.compile(&SubPattern::new(nodes), flags).unwrap();
        c.code
    }

    #[test]
    fn plain_literals() {
        assert_eq!(
            body_of(vec![Node::literal('a'), Node::NotLiteral('b' as u32)], Flags::empty()),
            vec![LITERAL, 0x61, Opcode::NotLiteral.code(), 0x62]
        );
    }

    #[test]
    fn ignorecase_literals() {
        let ascii = Flags::IGNORECASE;
        assert_eq!(
            body_of(vec![Node::literal('A'), Node::literal('1')], ascii),
            vec![Opcode::LiteralIgnore.code(), 0x61, LITERAL, 0x31]
        );
        let locale = Flags::IGNORECASE | Flags::LOCALE;
        assert_eq!(
            body_of(vec![Node::literal('A')], locale),
            vec![Opcode::LiteralLocIgnore.code(), 0x41]
        );
        let uni = Flags::IGNORECASE | Flags::UNICODE;
        assert_eq!(
            body_of(vec![Node::literal('\u{C9}')], uni),
            vec![Opcode::LiteralUniIgnore.code(), 0xE9]
        );
    }

    #[test]
    fn multi_fold_literal_emits_class() {
        let uni = Flags::IGNORECASE | Flags::UNICODE;
        assert_eq!(
            body_of(vec![Node::NotLiteral(0x3a3)], uni),
            vec![
                Opcode::InUniIgnore.code(),
                7,
                Opcode::Negate.code(),
                LITERAL,
                0x3c3,
                LITERAL,
                0x3c2,
                Opcode::Failure.code(),
            ]
        );
    }

    #[test]
    fn any_respects_dotall() {
        assert_eq!(body_of(vec![Node::Any], Flags::empty()), vec![Opcode::Any.code()]);
        assert_eq!(body_of(vec![Node::Any], Flags::DOTALL), vec![Opcode::AnyAll.code()]);
    }

    #[test]
    fn branch_layout() {
        let code = body_of(
            vec![Node::Branch(vec![
                SubPattern::from_literal("a"),
                SubPattern::from_literal("bc"),
            ])],
            Flags::empty(),
        );
        let jump = Opcode::Jump.code();
        assert_eq!(
            code,
            vec![
                Opcode::Branch.code(),
                5, LITERAL, 0x61, jump, 9,
                7, LITERAL, 0x62, LITERAL, 0x63, jump, 2,
                Opcode::Failure.code(),
            ]
        );
    }

    #[test]
    fn group_ref_exists_offsets() {
        let mut state = State::default();
        let g = state.open_group(None).unwrap();
        state.close_group(g, &SubPattern::from_literal("x")).unwrap();
        let mut c = Compiler::new(&state);
        let pat = SubPattern::new(vec![Node::GroupRefExists {
            group: 1,
            yes: SubPattern::from_literal("a"),
            no: Some(SubPattern::from_literal("b")),
        }]);
        c.compile(&pat, Flags::empty()).unwrap();
        assert_eq!(
            c.code,
            vec![
                Opcode::GroupRefExists.code(), 0,
                6, LITERAL, 0x61, Opcode::Jump.code(), 3,
                LITERAL, 0x62,
            ]
        );

        let mut c = Compiler::new(&state);
        let pat = SubPattern::new(vec![Node::GroupRefExists {
            group: 1,
            yes: SubPattern::from_literal("a"),
            no: None,
        }]);
        c.compile(&pat, Flags::empty()).unwrap();
        assert_eq!(c.code, vec![Opcode::GroupRefExists.code(), 0, 4, LITERAL, 0x61]);
    }

    #[test]
    fn unknown_group_is_internal_error() {
        let state = State::default();
        let mut c = Compiler::new(&state);
        let err = c
            .compile(&SubPattern::new(vec![Node::GroupRef(1)]), Flags::empty())
            .unwrap_err();
        assert_eq!(err, Error::Internal(InternalError::InvalidGroup(1)));
    }

    #[test]
    fn in_variant_selection() {
        let digits = vec![Node::In(vec![SetItem::Range('0' as u32, '9' as u32)])];
        assert_eq!(body_of(digits.clone(), Flags::IGNORECASE)[0], Opcode::In.code());
        let letters = vec![Node::In(vec![SetItem::Literal('k' as u32)])];
        assert_eq!(body_of(letters.clone(), Flags::IGNORECASE)[0], Opcode::InIgnore.code());
        assert_eq!(
            body_of(letters.clone(), Flags::IGNORECASE | Flags::UNICODE)[0],
            Opcode::InUniIgnore.code()
        );
        assert_eq!(
            body_of(digits, Flags::IGNORECASE | Flags::LOCALE)[0],
            Opcode::InLocIgnore.code()
        );
    }

    #[test]
    fn simple_bodies() {
        assert!(is_simple(&SubPattern::from_literal("a")));
        assert!(is_simple(&SubPattern::new(vec![Node::non_capturing(
            Flags::empty(),
            Flags::empty(),
            SubPattern::new(vec![Node::Any]),
        )])));
        assert!(!is_simple(&SubPattern::new(vec![Node::non_capturing(
            Flags::IGNORECASE,
            Flags::empty(),
            SubPattern::new(vec![Node::Any]),
        )])));
        assert!(!is_simple(&SubPattern::from_literal("ab")));
        assert!(!is_simple(&SubPattern::new(vec![Node::group(1, SubPattern::from_literal("a"))])));
    }

    #[test]
    fn info_without_minimum() {
        let parsed = ParsedPattern::from_nodes(vec![Node::repeat(
            RepeatKind::Max,
            0,
            MAXREPEAT,
            SubPattern::from_literal("a"),
        )]);
        let code = compile_code(&parsed, Flags::empty()).unwrap();
        assert_eq!(&code[..5], &[Opcode::Info.code(), 4, 0, 0, MAXCODE]);
        assert_eq!(code.last(), Some(&SUCCESS));
    }
}
