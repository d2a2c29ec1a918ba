// casefold.rs - Case-fold lookup data for ignore-case compilation.
//
// Simple (one-to-one) case mappings come from the standard library's
// full mappings: a single-character result is the simple mapping, and the
// few code points whose full mapping expands but still have a simple
// mapping are listed explicitly. On top of that, EQUIVALENCES lists the
// fold classes with three or more members, or pairs that do not map onto
// each other by lower/upper alone.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::constants::Flags;

// === ASCII ===

pub fn ascii_iscased(ch: u32) -> bool {
    ch < 128 && (ch as u8).is_ascii_alphabetic()
}

pub fn ascii_tolower(ch: u32) -> u32 {
    if ch < 128 {
        (ch as u8).to_ascii_lowercase() as u32
    } else {
        ch
    }
}

// === Unicode ===

/// Simple lowercase mappings whose full mapping is longer than one char.
const LOWER_EXPANDING: &[(u32, u32)] = &[(0x0130, 0x0069)];

fn single(mut it: impl Iterator<Item = char>) -> Option<char> {
    let first = it.next()?;
    match it.next() {
        None => Some(first),
        Some(_) => None,
    }
}

pub fn unicode_tolower(ch: u32) -> u32 {
    let Some(c) = char::from_u32(ch) else {
        return ch;
    };
    match single(c.to_lowercase()) {
        Some(lo) => lo as u32,
        None => LOWER_EXPANDING
            .iter()
            .find(|&&(from, _)| from == ch)
            .map_or(ch, |&(_, to)| to),
    }
}

pub fn unicode_toupper(ch: u32) -> u32 {
    let Some(c) = char::from_u32(ch) else {
        return ch;
    };
    if let Some(up) = single(c.to_uppercase()) {
        return up as u32;
    }
    // Greek letters with ypogegrammeni map onto their titlecase forms.
    match ch {
        0x1F80..=0x1F87 | 0x1F90..=0x1F97 | 0x1FA0..=0x1FA7 => ch + 8,
        0x1FB3 | 0x1FC3 | 0x1FF3 => ch + 9,
        _ => ch,
    }
}

pub fn unicode_iscased(ch: u32) -> bool {
    ch != unicode_tolower(ch) || ch != unicode_toupper(ch)
}

/// Characters that match each other case-insensitively but are not tied
/// together by a plain lower/upper mapping.
const EQUIVALENCES: &[&[u32]] = &[
    // LATIN SMALL LETTER I, LATIN SMALL LETTER DOTLESS I
    &[0x69, 0x131],
    // LATIN SMALL LETTER S, LATIN SMALL LETTER LONG S
    &[0x73, 0x17f],
    // MICRO SIGN, GREEK SMALL LETTER MU
    &[0xb5, 0x3bc],
    // COMBINING GREEK YPOGEGRAMMENI, GREEK SMALL LETTER IOTA, GREEK PROSGEGRAMMENI
    &[0x345, 0x3b9, 0x1fbe],
    // GREEK SMALL LETTER IOTA WITH DIALYTIKA AND TONOS / AND OXIA
    &[0x390, 0x1fd3],
    // GREEK SMALL LETTER UPSILON WITH DIALYTIKA AND TONOS / AND OXIA
    &[0x3b0, 0x1fe3],
    // GREEK SMALL LETTER BETA, GREEK BETA SYMBOL
    &[0x3b2, 0x3d0],
    // GREEK SMALL LETTER EPSILON, GREEK LUNATE EPSILON SYMBOL
    &[0x3b5, 0x3f5],
    // GREEK SMALL LETTER THETA, GREEK THETA SYMBOL
    &[0x3b8, 0x3d1],
    // GREEK SMALL LETTER KAPPA, GREEK KAPPA SYMBOL
    &[0x3ba, 0x3f0],
    // GREEK SMALL LETTER PI, GREEK PI SYMBOL
    &[0x3c0, 0x3d6],
    // GREEK SMALL LETTER RHO, GREEK RHO SYMBOL
    &[0x3c1, 0x3f1],
    // GREEK SMALL LETTER FINAL SIGMA, GREEK SMALL LETTER SIGMA
    &[0x3c2, 0x3c3],
    // GREEK SMALL LETTER PHI, GREEK PHI SYMBOL
    &[0x3c6, 0x3d5],
    // CYRILLIC SMALL LETTER VE, CYRILLIC SMALL LETTER ROUNDED VE
    &[0x432, 0x1c80],
    // CYRILLIC SMALL LETTER DE, CYRILLIC SMALL LETTER LONG-LEGGED DE
    &[0x434, 0x1c81],
    // CYRILLIC SMALL LETTER O, CYRILLIC SMALL LETTER NARROW O
    &[0x43e, 0x1c82],
    // CYRILLIC SMALL LETTER ES, CYRILLIC SMALL LETTER WIDE ES
    &[0x441, 0x1c83],
    // CYRILLIC SMALL LETTER TE, TALL TE, THREE-LEGGED TE
    &[0x442, 0x1c84, 0x1c85],
    // CYRILLIC SMALL LETTER HARD SIGN, CYRILLIC SMALL LETTER TALL HARD SIGN
    &[0x44a, 0x1c86],
    // CYRILLIC SMALL LETTER YAT, CYRILLIC SMALL LETTER TALL YAT
    &[0x463, 0x1c87],
    // CYRILLIC SMALL LETTER UNBLENDED UK, CYRILLIC SMALL LETTER MONOGRAPH UK
    &[0x1c88, 0xa64b],
    // LATIN SMALL LETTER S WITH DOT ABOVE, LONG S WITH DOT ABOVE
    &[0x1e61, 0x1e9b],
    // LATIN SMALL LIGATURE LONG S T, LATIN SMALL LIGATURE ST
    &[0xfb05, 0xfb06],
];

static FOLD_FIXES: LazyLock<FxHashMap<u32, SmallVec<[u32; 2]>>> = LazyLock::new(|| {
    let mut fixes = FxHashMap::default();
    for class in EQUIVALENCES {
        for &ch in class.iter() {
            let others = class.iter().copied().filter(|&o| o != ch).collect();
            fixes.insert(ch, others);
        }
    }
    fixes
});

/// Additional characters equivalent to the lowercase `ch` under Unicode
/// ignore-case matching, beyond its own upper/lower pair.
pub fn unicode_extra_folds(ch: u32) -> &'static [u32] {
    FOLD_FIXES.get(&ch).map_or(&[], |v| v.as_slice())
}

/// Whether ignore-case matching lets `ch` match some other character:
/// either it is cased or its lowercase form has extra fold equivalents.
pub fn unicode_has_equivalents(ch: u32) -> bool {
    unicode_iscased(ch) || !unicode_extra_folds(unicode_tolower(ch)).is_empty()
}

/// Case-folding functions used by the charset optimizer and the literal
/// emitter.
#[derive(Clone, Copy)]
pub struct Folding {
    pub is_cased: fn(u32) -> bool,
    pub lower: fn(u32) -> u32,
    /// Present only for Unicode folding.
    pub extra: Option<fn(u32) -> &'static [u32]>,
}

impl std::fmt::Debug for Folding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = if self.is_unicode() { "unicode" } else { "ascii" };
        f.debug_tuple("Folding").field(&name).finish()
    }
}

impl Folding {
    pub const ASCII: Folding = Folding {
        is_cased: ascii_iscased,
        lower: ascii_tolower,
        extra: None,
    };

    pub const UNICODE: Folding = Folding {
        is_cased: unicode_iscased,
        lower: unicode_tolower,
        extra: Some(unicode_extra_folds),
    };

    /// Folding the compiler applies itself. Locale ignore-case is resolved
    /// at match time, so it gets none.
    pub fn for_flags(flags: Flags) -> Option<Folding> {
        if !flags.contains(Flags::IGNORECASE) || flags.contains(Flags::LOCALE) {
            None
        } else if flags.contains(Flags::UNICODE) {
            Some(Folding::UNICODE)
        } else {
            Some(Folding::ASCII)
        }
    }

    pub fn is_unicode(&self) -> bool {
        self.extra.is_some()
    }

    /// Extra fold equivalents of an already-lowered character.
    pub fn extra_folds(&self, lo: u32) -> &'static [u32] {
        match self.extra {
            Some(extra) => extra(lo),
            None => &[],
        }
    }

    /// `ch` matches more than itself under this folding.
    pub fn has_equivalents(&self, ch: u32) -> bool {
        (self.is_cased)(ch) || !self.extra_folds((self.lower)(ch)).is_empty()
    }
}

/// Case predicate used by the prefix analyzer: it only needs to know
/// whether a literal could match anything but itself.
pub fn iscased_for_flags(flags: Flags) -> Option<fn(u32) -> bool> {
    if !flags.contains(Flags::IGNORECASE) {
        None
    } else if flags.contains(Flags::UNICODE) {
        Some(unicode_has_equivalents)
    } else {
        Some(ascii_iscased)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_folding() {
        assert_eq!(ascii_tolower('A' as u32), 'a' as u32);
        assert_eq!(ascii_tolower('z' as u32), 'z' as u32);
        assert_eq!(ascii_tolower(0xC0), 0xC0);
        assert!(ascii_iscased('Q' as u32));
        assert!(!ascii_iscased('1' as u32));
        assert!(!ascii_iscased(0xE9));
    }

    #[test]
    fn unicode_folding() {
        assert_eq!(unicode_tolower(0xC9), 0xE9);
        assert_eq!(unicode_toupper(0xE9), 0xC9);
        assert_eq!(unicode_tolower(0x130), 0x69);
        assert!(unicode_iscased(0x3A3));
        assert!(!unicode_iscased('5' as u32));
        // Full uppercase of sharp s is "SS": no simple mapping.
        assert_eq!(unicode_toupper(0xDF), 0xDF);
        assert_eq!(unicode_toupper(0x1F80), 0x1F88);
        assert_eq!(unicode_toupper(0x1FB3), 0x1FBC);
        assert_eq!(unicode_tolower(0xD800), 0xD800);
    }

    #[test]
    fn extra_folds() {
        assert_eq!(unicode_extra_folds('s' as u32), &[0x17f]);
        assert_eq!(unicode_extra_folds(0x3b9), &[0x345, 0x1fbe]);
        assert_eq!(unicode_extra_folds(0x442), &[0x1c84, 0x1c85]);
        assert!(unicode_extra_folds('a' as u32).is_empty());
    }

    #[test]
    fn uncased_letters_with_equivalents() {
        for (ch, other) in [(0x390, 0x1fd3), (0x3b0, 0x1fe3), (0xfb05, 0xfb06)] {
            assert!(!unicode_iscased(ch), "{:#x}", ch);
            assert!(unicode_has_equivalents(ch), "{:#x}", ch);
            assert!(unicode_has_equivalents(other), "{:#x}", other);
            assert!(Folding::UNICODE.has_equivalents(ch));
            assert!(!Folding::ASCII.has_equivalents(ch));
        }
        assert!(!unicode_has_equivalents('5' as u32));
        let f = iscased_for_flags(Flags::IGNORECASE | Flags::UNICODE).unwrap();
        assert!(f(0x390));
    }

    #[test]
    fn folding_selection() {
        assert!(Folding::for_flags(Flags::empty()).is_none());
        assert!(Folding::for_flags(Flags::IGNORECASE | Flags::LOCALE).is_none());
        assert!(!Folding::for_flags(Flags::IGNORECASE).unwrap().is_unicode());
        assert!(Folding::for_flags(Flags::IGNORECASE | Flags::UNICODE)
            .unwrap()
            .is_unicode());
        assert!(Folding::ASCII.extra_folds('s' as u32).is_empty());
    }

    #[test]
    fn iscased_selection() {
        assert!(iscased_for_flags(Flags::UNICODE).is_none());
        let f = iscased_for_flags(Flags::IGNORECASE | Flags::LOCALE).unwrap();
        assert!(f('a' as u32));
    }
}
