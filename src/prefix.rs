// prefix.rs - Search-start hints for the INFO block.
//
// A pattern that must start with a fixed string lets the matcher skip ahead
// with a string search; one that must start with a member of a small class
// lets it test a charset before trying a full match.

use crate::casefold::iscased_for_flags;
use crate::constants::Flags;
use crate::subpattern::{Node, SetItem, SubPattern};

/// Literal prefix of a pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiteralPrefix {
    pub chars: Vec<u32>,
    /// Number of prefix characters that lie before the end of the first
    /// capturing group.
    pub skip: Option<usize>,
    /// The prefix is the whole pattern.
    pub got_all: bool,
}

/// Collect the literal characters every match must start with.
pub fn get_literal_prefix(pattern: &SubPattern, flags: Flags) -> LiteralPrefix {
    let iscased = iscased_for_flags(flags);
    let mut prefix = LiteralPrefix::default();
    for node in &pattern.data {
        match node {
            Node::Literal(c) => {
                if iscased.is_some_and(|f| f(*c)) {
                    return prefix;
                }
                prefix.chars.push(*c);
            }
            Node::SubPattern {
                group,
                add_flags,
                del_flags,
                body,
            } => {
                let inner_flags = flags.combine(*add_flags, *del_flags);
                if inner_flags.is_locale_ignorecase() {
                    return prefix;
                }
                let inner = get_literal_prefix(body, inner_flags);
                if prefix.skip.is_none() {
                    if group.is_some() {
                        prefix.skip = Some(prefix.chars.len() + inner.chars.len());
                    } else if let Some(skip) = inner.skip {
                        prefix.skip = Some(prefix.chars.len() + skip);
                    }
                }
                prefix.chars.extend(inner.chars);
                if !inner.got_all {
                    return prefix;
                }
            }
            _ => return prefix,
        }
    }
    prefix.got_all = true;
    prefix
}

/// Charset every match must start with, used when there is no literal
/// prefix.
pub fn get_charset_prefix(pattern: &SubPattern, flags: Flags) -> Option<Vec<SetItem>> {
    let mut pattern = pattern;
    let mut flags = flags;
    let first = loop {
        match pattern.data.first()? {
            Node::SubPattern {
                group: None,
                add_flags,
                del_flags,
                body,
            } => {
                flags = flags.combine(*add_flags, *del_flags);
                if flags.is_locale_ignorecase() {
                    return None;
                }
                pattern = body;
            }
            node => break node,
        }
    };

    let iscased = iscased_for_flags(flags);
    let cased = |c: u32| iscased.is_some_and(|f| f(c));
    match first {
        Node::Literal(c) if !cased(*c) => Some(vec![SetItem::Literal(*c)]),
        Node::Branch(alternatives) => alternatives
            .iter()
            .map(|alt| match alt.data.first() {
                Some(Node::Literal(c)) if !cased(*c) => Some(SetItem::Literal(*c)),
                _ => None,
            })
            .collect(),
        Node::In(items) => {
            if iscased.is_some() {
                for item in items {
                    match item {
                        SetItem::Literal(c) if cased(*c) => return None,
                        SetItem::Range(lo, hi) => {
                            if *hi > 0xffff || (*lo..=*hi).any(cased) {
                                return None;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Some(items.clone())
        }
        _ => None,
    }
}

/// KMP failure function: `table[i]` is the length of the longest proper
/// prefix of `prefix[..=i]` that is also its suffix.
pub fn generate_overlap_table(prefix: &[u32]) -> Vec<u32> {
    let mut table = vec![0u32; prefix.len()];
    for i in 1..prefix.len() {
        let mut idx = table[i - 1] as usize;
        loop {
            if prefix[i] == prefix[idx] {
                table[i] = idx as u32 + 1;
                break;
            }
            if idx == 0 {
                table[i] = 0;
                break;
            }
            idx = table[idx - 1] as usize;
        }
    }
    table
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::subpattern::RepeatKind;
    use pretty_assertions::assert_eq;

    fn chars(s: &str) -> Vec<u32> {
        s.chars().map(|c| c as u32).collect()
    }

    #[test]
    fn whole_literal() {
        let p = get_literal_prefix(&SubPattern::from_literal("abc"), Flags::empty());
        assert_eq!(p.chars, chars("abc"));
        assert_eq!(p.skip, None);
        assert!(p.got_all);
    }

    #[test]
    fn capturing_group_sets_skip() {
        let pat = SubPattern::new(vec![
            Node::group(1, SubPattern::from_literal("a")),
            Node::literal('b'),
            Node::literal('c'),
        ]);
        let p = get_literal_prefix(&pat, Flags::empty());
        assert_eq!(p.chars, chars("abc"));
        assert_eq!(p.skip, Some(1));
        assert!(p.got_all);
    }

    #[test]
    fn nested_skip_propagates() {
        let inner = SubPattern::new(vec![Node::literal('y'), Node::group(1, SubPattern::from_literal("z"))]);
        let pat = SubPattern::new(vec![
            Node::literal('x'),
            Node::non_capturing(Flags::empty(), Flags::empty(), inner),
        ]);
        let p = get_literal_prefix(&pat, Flags::empty());
        assert_eq!(p.chars, chars("xyz"));
        assert_eq!(p.skip, Some(3));
    }

    #[test]
    fn stops_at_cased_literal() {
        let p = get_literal_prefix(&SubPattern::from_literal("1a2"), Flags::IGNORECASE);
        assert_eq!(p.chars, chars("1"));
        assert!(!p.got_all);
    }

    #[test]
    fn stops_at_other_ops() {
        let pat = SubPattern::new(vec![
            Node::literal('a'),
            Node::repeat(RepeatKind::Max, 0, MAXREPEAT, SubPattern::from_literal("b")),
            Node::literal('c'),
        ]);
        let p = get_literal_prefix(&pat, Flags::empty());
        assert_eq!(p.chars, chars("a"));
        assert!(!p.got_all);
    }

    #[test]
    fn locale_ignorecase_group_stops() {
        let pat = SubPattern::new(vec![
            Node::literal('a'),
            Node::non_capturing(
                Flags::LOCALE | Flags::IGNORECASE,
                Flags::empty(),
                SubPattern::from_literal("1"),
            ),
        ]);
        let p = get_literal_prefix(&pat, Flags::empty());
        assert_eq!(p.chars, chars("a"));
        assert!(!p.got_all);
    }

    #[test]
    fn charset_prefix_from_branch() {
        let pat = SubPattern::new(vec![Node::Branch(vec![
            SubPattern::from_literal("ab"),
            SubPattern::from_literal("cd"),
        ])]);
        assert_eq!(
            get_charset_prefix(&pat, Flags::empty()),
            Some(vec![SetItem::Literal('a' as u32), SetItem::Literal('c' as u32)])
        );

        let pat = SubPattern::new(vec![Node::Branch(vec![
            SubPattern::from_literal("ab"),
            SubPattern::new(vec![Node::Any]),
        ])]);
        assert_eq!(get_charset_prefix(&pat, Flags::empty()), None);
    }

    #[test]
    fn charset_prefix_from_class() {
        let items = vec![SetItem::Range('0' as u32, '9' as u32)];
        let pat = SubPattern::new(vec![Node::In(items.clone()), Node::literal('x')]);
        assert_eq!(get_charset_prefix(&pat, Flags::IGNORECASE), Some(items));

        let cased = SubPattern::new(vec![Node::In(vec![SetItem::Range('a' as u32, 'f' as u32)])]);
        assert_eq!(get_charset_prefix(&cased, Flags::IGNORECASE), None);
        assert!(get_charset_prefix(&cased, Flags::empty()).is_some());

        let wide = SubPattern::new(vec![Node::In(vec![SetItem::Range(0x30, 0x10000)])]);
        assert_eq!(get_charset_prefix(&wide, Flags::IGNORECASE), None);
    }

    #[test]
    fn fold_equivalents_block_prefixes() {
        let unicode = Flags::IGNORECASE | Flags::UNICODE;
        let class = SubPattern::new(vec![Node::In(vec![SetItem::Literal(0x390)])]);
        assert_eq!(get_charset_prefix(&class, unicode), None);
        assert!(get_charset_prefix(&class, Flags::IGNORECASE).is_some());

        let range = SubPattern::new(vec![Node::In(vec![SetItem::Range(0xfb00, 0xfb05)])]);
        assert_eq!(get_charset_prefix(&range, unicode), None);

        let lit = SubPattern::new(vec![Node::Literal(0x3b0), Node::literal('x')]);
        assert_eq!(get_charset_prefix(&lit, unicode), None);
        let p = get_literal_prefix(&lit, unicode);
        assert!(p.chars.is_empty());
        assert!(!p.got_all);
    }

    #[test]
    fn charset_prefix_unwraps_non_capturing() {
        let pat = SubPattern::new(vec![Node::non_capturing(
            Flags::empty(),
            Flags::empty(),
            SubPattern::new(vec![Node::In(vec![SetItem::Literal(1), SetItem::Literal(5)])]),
        )]);
        assert!(get_charset_prefix(&pat, Flags::empty()).is_some());

        let captured = SubPattern::new(vec![Node::group(
            1,
            SubPattern::new(vec![Node::In(vec![SetItem::Literal(1)])]),
        )]);
        assert_eq!(get_charset_prefix(&captured, Flags::empty()), None);
    }

    fn brute_overlap(prefix: &[u32], i: usize) -> u32 {
        let s = &prefix[..=i];
        (0..s.len())
            .rev()
            .find(|&k| s[..k] == s[s.len() - k..])
            .unwrap_or(0) as u32
    }

    #[test]
    fn overlap_table_matches_brute_force() {
        for text in ["abcabd", "aaaa", "abababca", "x", "abacabab", ""] {
            let prefix = chars(text);
            let table = generate_overlap_table(&prefix);
            assert_eq!(table.len(), prefix.len());
            for i in 0..prefix.len() {
                assert_eq!(table[i], brute_overlap(&prefix, i), "{:?}[{}]", text, i);
            }
        }
        assert_eq!(generate_overlap_table(&chars("abcabd")), vec![0, 0, 0, 1, 2, 0]);
    }
}
