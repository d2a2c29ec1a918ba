// constants.rs - Opcode, anchor and category tables, flags and limits.
//
// The numbering of every table here is part of the bytecode format: the
// matching engine decodes words by these values, so entries must never be
// reordered.

use std::fmt;

use bitflags::bitflags;

/// Bytecode word.
pub type SreCode = u32;

/// Identifies the bytecode layout produced by this compiler.
pub const MAGIC: u32 = 20220615;

/// Size of one code word in bytes.
pub const CODESIZE: usize = std::mem::size_of::<SreCode>();

/// Bits per code word.
pub const CODEBITS: usize = CODESIZE * 8;

/// Largest value a code word can carry.
pub const MAXCODE: u32 = SreCode::MAX;

/// Repeat upper bound meaning "unbounded".
pub const MAXREPEAT: u32 = SreCode::MAX;

/// Largest number of capture groups a pattern may declare.
pub const MAXGROUPS: u32 = SreCode::MAX / 2;

/// Highest Unicode scalar value.
pub const MAXUNICODE: u32 = 0x10FFFF;

// === INFO block mask bits ===
pub const SRE_INFO_PREFIX: u32 = 1;
pub const SRE_INFO_LITERAL: u32 = 2;
pub const SRE_INFO_CHARSET: u32 = 4;

bitflags! {
    /// Compilation flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Template mode: repeats are rejected.
        const TEMPLATE = 1;
        const IGNORECASE = 2;
        const LOCALE = 4;
        const MULTILINE = 8;
        const DOTALL = 16;
        const UNICODE = 32;
        const VERBOSE = 64;
        /// Dump the compiled program and bypass the pattern cache.
        const DEBUG = 128;
        const ASCII = 256;
    }
}

impl Flags {
    /// Flags selecting the character model; a subpattern that adds any of
    /// them replaces the enclosing selection instead of merging with it.
    pub const TYPE_FLAGS: Flags = Flags::LOCALE.union(Flags::UNICODE).union(Flags::ASCII);

    /// Combine inherited flags with a subpattern's add/remove deltas.
    pub fn combine(self, add: Flags, del: Flags) -> Flags {
        let mut flags = self;
        if add.intersects(Flags::TYPE_FLAGS) {
            flags.remove(Flags::TYPE_FLAGS);
        }
        (flags | add) - del
    }

    /// Ignore-case under the locale model: decided by the matcher at run time.
    #[inline]
    pub fn is_locale_ignorecase(self) -> bool {
        self.contains(Flags::IGNORECASE | Flags::LOCALE)
    }
}

/// Declares a `#[repr(u32)]` enum with stable numbering, a name table and
/// a checked conversion from a code word.
macro_rules! code_table {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident = $value:expr => $text:expr,)+ }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u32)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl $name {
            /// Every entry, in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Mnemonic used by the disassembler.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            #[inline]
            pub fn code(self) -> SreCode {
                self as SreCode
            }
        }

        impl TryFrom<SreCode> for $name {
            type Error = SreCode;

            fn try_from(code: SreCode) -> Result<Self, Self::Error> {
                match code {
                    $(x if x == $value => Ok($name::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

code_table! {
    /// Instruction opcodes. `MinRepeat` and `MaxRepeat` only occur in parser
    /// output and never in compiled code.
    pub enum Opcode {
        Failure = 0 => "FAILURE",
        Success = 1 => "SUCCESS",
        Any = 2 => "ANY",
        AnyAll = 3 => "ANY_ALL",
        Assert = 4 => "ASSERT",
        AssertNot = 5 => "ASSERT_NOT",
        At = 6 => "AT",
        Branch = 7 => "BRANCH",
        Category = 8 => "CATEGORY",
        Charset = 9 => "CHARSET",
        BigCharset = 10 => "BIGCHARSET",
        GroupRef = 11 => "GROUPREF",
        GroupRefExists = 12 => "GROUPREF_EXISTS",
        In = 13 => "IN",
        Info = 14 => "INFO",
        Jump = 15 => "JUMP",
        Literal = 16 => "LITERAL",
        Mark = 17 => "MARK",
        MaxUntil = 18 => "MAX_UNTIL",
        MinUntil = 19 => "MIN_UNTIL",
        NotLiteral = 20 => "NOT_LITERAL",
        Negate = 21 => "NEGATE",
        Range = 22 => "RANGE",
        Repeat = 23 => "REPEAT",
        RepeatOne = 24 => "REPEAT_ONE",
        Subpattern = 25 => "SUBPATTERN",
        MinRepeatOne = 26 => "MIN_REPEAT_ONE",
        AtomicGroup = 27 => "ATOMIC_GROUP",
        PossessiveRepeat = 28 => "POSSESSIVE_REPEAT",
        PossessiveRepeatOne = 29 => "POSSESSIVE_REPEAT_ONE",

        GroupRefIgnore = 30 => "GROUPREF_IGNORE",
        InIgnore = 31 => "IN_IGNORE",
        LiteralIgnore = 32 => "LITERAL_IGNORE",
        NotLiteralIgnore = 33 => "NOT_LITERAL_IGNORE",

        GroupRefLocIgnore = 34 => "GROUPREF_LOC_IGNORE",
        InLocIgnore = 35 => "IN_LOC_IGNORE",
        LiteralLocIgnore = 36 => "LITERAL_LOC_IGNORE",
        NotLiteralLocIgnore = 37 => "NOT_LITERAL_LOC_IGNORE",

        GroupRefUniIgnore = 38 => "GROUPREF_UNI_IGNORE",
        InUniIgnore = 39 => "IN_UNI_IGNORE",
        LiteralUniIgnore = 40 => "LITERAL_UNI_IGNORE",
        NotLiteralUniIgnore = 41 => "NOT_LITERAL_UNI_IGNORE",
        RangeUniIgnore = 42 => "RANGE_UNI_IGNORE",

        MinRepeat = 43 => "MIN_REPEAT",
        MaxRepeat = 44 => "MAX_REPEAT",
    }
}

code_table! {
    /// Anchor kinds, the argument of `AT`.
    pub enum AtCode {
        Beginning = 0 => "AT_BEGINNING",
        BeginningLine = 1 => "AT_BEGINNING_LINE",
        BeginningString = 2 => "AT_BEGINNING_STRING",
        Boundary = 3 => "AT_BOUNDARY",
        NonBoundary = 4 => "AT_NON_BOUNDARY",
        End = 5 => "AT_END",
        EndLine = 6 => "AT_END_LINE",
        EndString = 7 => "AT_END_STRING",
        LocBoundary = 8 => "AT_LOC_BOUNDARY",
        LocNonBoundary = 9 => "AT_LOC_NON_BOUNDARY",
        UniBoundary = 10 => "AT_UNI_BOUNDARY",
        UniNonBoundary = 11 => "AT_UNI_NON_BOUNDARY",
    }
}

code_table! {
    /// Character categories, the argument of `CATEGORY`.
    pub enum ChCode {
        Digit = 0 => "CATEGORY_DIGIT",
        NotDigit = 1 => "CATEGORY_NOT_DIGIT",
        Space = 2 => "CATEGORY_SPACE",
        NotSpace = 3 => "CATEGORY_NOT_SPACE",
        Word = 4 => "CATEGORY_WORD",
        NotWord = 5 => "CATEGORY_NOT_WORD",
        Linebreak = 6 => "CATEGORY_LINEBREAK",
        NotLinebreak = 7 => "CATEGORY_NOT_LINEBREAK",
        LocWord = 8 => "CATEGORY_LOC_WORD",
        LocNotWord = 9 => "CATEGORY_LOC_NOT_WORD",
        UniDigit = 10 => "CATEGORY_UNI_DIGIT",
        UniNotDigit = 11 => "CATEGORY_UNI_NOT_DIGIT",
        UniSpace = 12 => "CATEGORY_UNI_SPACE",
        UniNotSpace = 13 => "CATEGORY_UNI_NOT_SPACE",
        UniWord = 14 => "CATEGORY_UNI_WORD",
        UniNotWord = 15 => "CATEGORY_UNI_NOT_WORD",
        UniLinebreak = 16 => "CATEGORY_UNI_LINEBREAK",
        UniNotLinebreak = 17 => "CATEGORY_UNI_NOT_LINEBREAK",
    }
}

// === Substitution tables ===

impl Opcode {
    /// ASCII ignore-case variant of a literal opcode.
    pub fn ignore(self) -> Opcode {
        match self {
            Opcode::Literal => Opcode::LiteralIgnore,
            Opcode::NotLiteral => Opcode::NotLiteralIgnore,
            other => other,
        }
    }

    /// Locale ignore-case variant of a literal opcode.
    pub fn locale_ignore(self) -> Opcode {
        match self {
            Opcode::Literal => Opcode::LiteralLocIgnore,
            Opcode::NotLiteral => Opcode::NotLiteralLocIgnore,
            other => other,
        }
    }

    /// Unicode ignore-case variant of a literal opcode.
    pub fn unicode_ignore(self) -> Opcode {
        match self {
            Opcode::Literal => Opcode::LiteralUniIgnore,
            Opcode::NotLiteral => Opcode::NotLiteralUniIgnore,
            other => other,
        }
    }
}

impl AtCode {
    pub fn multiline(self) -> AtCode {
        match self {
            AtCode::Beginning => AtCode::BeginningLine,
            AtCode::End => AtCode::EndLine,
            other => other,
        }
    }

    pub fn locale(self) -> AtCode {
        match self {
            AtCode::Boundary => AtCode::LocBoundary,
            AtCode::NonBoundary => AtCode::LocNonBoundary,
            other => other,
        }
    }

    pub fn unicode(self) -> AtCode {
        match self {
            AtCode::Boundary => AtCode::UniBoundary,
            AtCode::NonBoundary => AtCode::UniNonBoundary,
            other => other,
        }
    }

    /// Apply the multiline, locale and unicode substitutions selected by
    /// `flags`.
    pub fn for_flags(self, flags: Flags) -> AtCode {
        let mut at = self;
        if flags.contains(Flags::MULTILINE) {
            at = at.multiline();
        }
        if flags.contains(Flags::LOCALE) {
            at.locale()
        } else if flags.contains(Flags::UNICODE) {
            at.unicode()
        } else {
            at
        }
    }
}

impl ChCode {
    /// Locale-dependent counterpart. Only the word categories depend on the
    /// locale; the rest map to themselves.
    pub fn locale(self) -> ChCode {
        match self {
            ChCode::Word => ChCode::LocWord,
            ChCode::NotWord => ChCode::LocNotWord,
            other => other,
        }
    }

    pub fn unicode(self) -> ChCode {
        match self {
            ChCode::Digit => ChCode::UniDigit,
            ChCode::NotDigit => ChCode::UniNotDigit,
            ChCode::Space => ChCode::UniSpace,
            ChCode::NotSpace => ChCode::UniNotSpace,
            ChCode::Word => ChCode::UniWord,
            ChCode::NotWord => ChCode::UniNotWord,
            ChCode::Linebreak => ChCode::UniLinebreak,
            ChCode::NotLinebreak => ChCode::UniNotLinebreak,
            other => other,
        }
    }

    pub fn for_flags(self, flags: Flags) -> ChCode {
        if flags.contains(Flags::LOCALE) {
            self.locale()
        } else if flags.contains(Flags::UNICODE) {
            self.unicode()
        } else {
            self
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_numbering_is_dense() {
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.code() as usize, i);
            assert_eq!(Opcode::try_from(i as u32), Ok(*op));
        }
        assert_eq!(Opcode::try_from(45), Err(45));
        assert_eq!(Opcode::MaxRepeat.code(), 44);
    }

    #[test]
    fn names() {
        assert_eq!(Opcode::RepeatOne.name(), "REPEAT_ONE");
        assert_eq!(AtCode::EndString.to_string(), "AT_END_STRING");
        assert_eq!(ChCode::UniNotLinebreak.code(), 17);
    }

    #[test]
    fn combine_replaces_type_flags() {
        let base = Flags::UNICODE | Flags::IGNORECASE;
        let combined = base.combine(Flags::ASCII, Flags::empty());
        assert_eq!(combined, Flags::ASCII | Flags::IGNORECASE);

        let removed = base.combine(Flags::MULTILINE, Flags::IGNORECASE);
        assert_eq!(removed, Flags::UNICODE | Flags::MULTILINE);
    }

    #[test]
    fn anchor_substitution() {
        let ml = Flags::MULTILINE;
        assert_eq!(AtCode::Beginning.for_flags(ml), AtCode::BeginningLine);
        assert_eq!(AtCode::End.for_flags(ml), AtCode::EndLine);
        assert_eq!(AtCode::Boundary.for_flags(Flags::LOCALE), AtCode::LocBoundary);
        assert_eq!(AtCode::NonBoundary.for_flags(Flags::UNICODE), AtCode::UniNonBoundary);
        assert_eq!(AtCode::EndString.for_flags(ml | Flags::UNICODE), AtCode::EndString);
    }

    #[test]
    fn category_substitution() {
        assert_eq!(ChCode::Digit.for_flags(Flags::LOCALE), ChCode::Digit);
        assert_eq!(ChCode::Word.for_flags(Flags::LOCALE), ChCode::LocWord);
        assert_eq!(ChCode::Space.for_flags(Flags::UNICODE), ChCode::UniSpace);
        assert_eq!(ChCode::NotWord.for_flags(Flags::empty()), ChCode::NotWord);
    }

    #[test]
    fn literal_variants() {
        assert_eq!(Opcode::Literal.ignore(), Opcode::LiteralIgnore);
        assert_eq!(Opcode::NotLiteral.locale_ignore(), Opcode::NotLiteralLocIgnore);
        assert_eq!(Opcode::NotLiteral.unicode_ignore(), Opcode::NotLiteralUniIgnore);
    }
}
