// cache_test.rs - Pattern cache, replacement templates and error reporting.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use sre_compile::error::InternalError;
use sre_compile::prelude::*;

/// Stand-in parser: a few fixed shapes, everything else is literal text.
fn parse(source: &PatternSource, _flags: Flags) -> Result<ParsedPattern> {
    let text = source.to_text();
    let parsed = match text.as_ref() {
        "(?P<word>ab)c" => {
            let mut state = State::default();
            let g = state.open_group(Some("word"))?;
            let body = SubPattern::from_literal("ab");
            state.close_group(g, &body)?;
            ParsedPattern::new(
                state,
                SubPattern::new(vec![Node::group(g, body), Node::literal('c')]),
            )
        }
        "(?<=a+)b" => {
            let behind = SubPattern::new(vec![Node::repeat(
                RepeatKind::Max,
                1,
                MAXREPEAT,
                SubPattern::from_literal("a"),
            )])
            .at_pos(4);
            ParsedPattern::from_nodes(vec![
                Node::Assert {
                    negated: false,
                    lookbehind: true,
                    body: behind,
                },
                Node::literal('b'),
            ])
        }
        "a*" => ParsedPattern::from_nodes(vec![Node::repeat(
            RepeatKind::Max,
            0,
            MAXREPEAT,
            SubPattern::from_literal("a"),
        )]),
        "\\3" => ParsedPattern::from_nodes(vec![Node::GroupRef(3)]),
        _ => ParsedPattern::from_nodes(text.chars().map(Node::literal).collect()),
    };
    Ok(parsed)
}

type TestCache = PatternCache<fn(&PatternSource, Flags) -> Result<ParsedPattern>>;

fn cache() -> TestCache {
    PatternCache::builder(parse as fn(&PatternSource, Flags) -> Result<ParsedPattern>)
        .max_cache(16)
        .max_fifo(8)
        .max_templates(4)
        .build()
}

// === Pattern cache ===

#[test]
fn default_config() {
    let c = PatternCache::new(parse as fn(&PatternSource, Flags) -> Result<ParsedPattern>);
    assert_eq!(*c.config(), CacheConfig::default());
    assert_eq!(c.config().max_cache, 512);
    assert_eq!(c.config().max_fifo, 256);
}

#[test]
fn cached_pattern_matches_direct_compile() {
    let c = cache();
    let cached = c.compile_cached("hello", Flags::IGNORECASE).unwrap();
    let direct = compile(
        &parse(&"hello".into(), Flags::IGNORECASE).unwrap(),
        Flags::IGNORECASE,
        Some("hello".into()),
    )
    .unwrap();
    assert_eq!(*cached, direct);
    assert_eq!(cached.source(), Some(&PatternSource::from("hello")));
}

#[test]
fn text_and_bytes_are_distinct_keys() {
    let c = cache();
    let text = c.compile_cached("xy", Flags::empty()).unwrap();
    let bytes = c.compile_cached(&b"xy"[..], Flags::empty()).unwrap();
    assert!(!Arc::ptr_eq(&text, &bytes));
    assert_eq!(text.code(), bytes.code());
    assert!(bytes.source().unwrap().is_bytes());
    assert_eq!(c.len(), 2);
}

#[test]
fn concurrent_lookups() {
    let c = cache();
    let sources = ["alpha", "beta", "gamma", "delta"];
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..50 {
                    for src in sources {
                        let p = c.compile_cached(src, Flags::empty()).unwrap();
                        assert_eq!(p.source(), Some(&PatternSource::from(src)));
                    }
                }
            });
        }
    });
    assert_eq!(c.len(), sources.len());
    for src in sources {
        let a = c.compile_cached(src, Flags::empty()).unwrap();
        let b = c.compile_cached(src, Flags::empty()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}

#[test]
fn debug_compiles_are_not_cached() {
    let _ = env_logger::builder().is_test(true).try_init();
    let c = cache();
    let a = c.compile_cached("dbg", Flags::DEBUG).unwrap();
    let b = c.compile_cached("dbg", Flags::DEBUG).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(c.is_empty());
}

#[test]
fn compiled_pattern_with_flags_is_rejected() {
    let c = cache();
    let p = c.compile_cached("abc", Flags::empty()).unwrap();
    assert_eq!(
        c.compile_cached(p, Flags::MULTILINE).unwrap_err(),
        Error::InvalidArgument
    );
}

// === Templates ===

#[test]
fn template_expansion() {
    let c = cache();
    let p = c.compile_cached("(?P<word>ab)c", Flags::empty()).unwrap();
    assert_eq!(p.group_number("word"), Some(1));

    let t = c.compile_template(&p, r"[\g<word>]-\g<0>\n").unwrap();
    assert_eq!(t.as_literal(), None);
    assert_eq!(t.expand(&[Some("abc"), Some("ab")]).unwrap(), "[ab]-abc\n");
    assert_eq!(t.expand(&[Some("abc"), None]).unwrap(), "[]-abc\n");

    let again = c.compile_template(&p, r"[\g<word>]-\g<0>\n").unwrap();
    assert!(Arc::ptr_eq(&t, &again));
    assert_eq!(c.template_len(), 1);

    let plain = c.compile_template(&p, "plain").unwrap();
    assert_eq!(plain.as_literal(), Some("plain"));
}

#[test]
fn template_cache_is_bounded() {
    let c = cache();
    let p = c.compile_cached("(?P<word>ab)c", Flags::empty()).unwrap();
    for repl in ["a", "b", "c", "d", "e", "f"] {
        c.compile_template(&p, repl).unwrap();
    }
    assert_eq!(c.template_len(), 4);
}

#[test]
fn template_errors() {
    let c = cache();
    let p = c.compile_cached("(?P<word>ab)c", Flags::empty()).unwrap();

    let err = c.compile_template(&p, r"x\g<nope>").unwrap_err();
    assert_eq!(err.pattern_kind(), Some(PatternErrorKind::UnknownGroupName));
    assert_eq!(err.to_string(), "unknown group name 'nope' at position 1");

    let err = c.compile_template(&p, r"\5").unwrap_err();
    assert_eq!(err.pattern_kind(), Some(PatternErrorKind::InvalidGroupReference));

    let err = c.compile_template(&p, r"\q").unwrap_err();
    assert_eq!(err.pattern_kind(), Some(PatternErrorKind::BadEscape));
    assert_eq!(c.template_len(), 0);
}

// === Errors ===

#[test]
fn variable_width_lookbehind() {
    let c = cache();
    let err = c.compile_cached("(?<=a+)b", Flags::IGNORECASE).unwrap_err();
    let Error::Pattern(e) = &err else {
        panic!("expected a pattern error, got {:?}", err);
    };
    assert_eq!(e.kind, PatternErrorKind::LookBehindNotFixedWidth);
    assert_eq!(e.pos, Some(4));
    assert_eq!(e.pattern.as_deref(), Some("(?<=a+)b"));
    assert!(e.flags.contains(Flags::IGNORECASE));
    assert!(c.is_empty());
}

#[test]
fn repeat_in_template_mode() {
    let c = cache();
    let err = c.compile_cached("a*", Flags::TEMPLATE).unwrap_err();
    assert_eq!(err.pattern_kind(), Some(PatternErrorKind::TemplateRepeat));
    assert!(c.compile_cached("a*", Flags::empty()).is_ok());
}

#[test]
fn reference_to_missing_group_is_internal() {
    let c = cache();
    let err = c.compile_cached("\\3", Flags::empty()).unwrap_err();
    assert!(err.is_internal());
    assert_eq!(err, Error::Internal(InternalError::InvalidGroup(3)));
}
