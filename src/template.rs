// template.rs - Replacement templates.
//
// A replacement string is split into literal runs and group references
// (`\1`, `\g<2>`, `\g<name>`). Standard escapes and octal escapes are
// decoded into the literal runs; unknown escapes of ASCII letters are
// errors, other unknown escapes are kept verbatim.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::constants::{Flags, MAXGROUPS};
use crate::error::{Error, PatternError, PatternErrorKind, Result};
use crate::pattern::Pattern;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateItem {
    Literal(String),
    Group(usize),
}

/// A compiled replacement template.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Template {
    items: Vec<TemplateItem>,
}

impl Template {
    pub fn items(&self) -> &[TemplateItem] {
        &self.items
    }

    /// The whole replacement when it contains no group references.
    pub fn as_literal(&self) -> Option<&str> {
        match self.items.as_slice() {
            [] => Some(""),
            [TemplateItem::Literal(s)] => Some(s),
            _ => None,
        }
    }

    /// Substitute group values; unmatched groups expand to nothing.
    pub fn expand(&self, groups: &[Option<&str>]) -> Result<String> {
        let mut out = String::new();
        for item in &self.items {
            match item {
                TemplateItem::Literal(s) => out.push_str(s),
                TemplateItem::Group(index) => match groups.get(*index) {
                    Some(value) => out.push_str(value.unwrap_or("")),
                    None => {
                        return Err(PatternError::new(PatternErrorKind::InvalidGroupReference)
                            .with_detail(index.to_string())
                            .into())
                    }
                },
            }
        }
        Ok(out)
    }
}

fn error(kind: PatternErrorKind, detail: impl Into<String>, pos: usize, repl: &str) -> Error {
    PatternError::new(kind)
        .with_detail(detail)
        .at(Some(pos))
        .in_pattern(Some(repl), Flags::empty())
        .into()
}

struct TemplateBuilder<'p> {
    pattern: &'p Pattern,
    items: Vec<TemplateItem>,
    literal: String,
}

impl TemplateBuilder<'_> {
    fn add_group(&mut self, index: usize, pos: usize, repl: &str) -> Result<()> {
        if index > self.pattern.groups() {
            return Err(error(
                PatternErrorKind::InvalidGroupReference,
                index.to_string(),
                pos,
                repl,
            ));
        }
        self.flush();
        self.items.push(TemplateItem::Group(index));
        Ok(())
    }

    fn flush(&mut self) {
        if !self.literal.is_empty() {
            self.items.push(TemplateItem::Literal(std::mem::take(&mut self.literal)));
        }
    }
}

fn next_if_digit(chars: &mut Peekable<CharIndices<'_>>, radix: u32) -> Option<char> {
    chars.next_if(|&(_, c)| c.is_ascii() && c.is_digit(radix)).map(|(_, c)| c)
}

fn is_group_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Parse `repl` against the groups of `pattern`.
pub fn compile_template(pattern: &Pattern, repl: &str) -> Result<Template> {
    let mut b = TemplateBuilder {
        pattern,
        items: Vec::new(),
        literal: String::new(),
    };
    let mut chars = repl.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '\\' {
            b.literal.push(c);
            continue;
        }
        let Some((_, esc)) = chars.next() else {
            return Err(error(PatternErrorKind::BadEscape, "(end of pattern)", pos, repl));
        };
        match esc {
            'g' => {
                if chars.next_if(|&(_, c)| c == '<').is_none() {
                    return Err(error(PatternErrorKind::MissingGroupName, "missing <", pos, repl));
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '>')) => break,
                        Some((_, c)) => name.push(c),
                        None => {
                            return Err(error(
                                PatternErrorKind::MissingGroupName,
                                "missing >, unterminated name",
                                pos,
                                repl,
                            ))
                        }
                    }
                }
                if name.is_empty() {
                    return Err(error(PatternErrorKind::MissingGroupName, "in \\g<>", pos, repl));
                }
                let index = if name.bytes().all(|c| c.is_ascii_digit()) {
                    match name.parse::<usize>() {
                        Ok(index) if index < MAXGROUPS as usize => index,
                        _ => {
                            return Err(error(
                                PatternErrorKind::InvalidGroupReference,
                                name,
                                pos,
                                repl,
                            ))
                        }
                    }
                } else if !is_group_name(&name) {
                    return Err(error(
                        PatternErrorKind::InvalidGroupReference,
                        format!("bad character in group name '{}'", name),
                        pos,
                        repl,
                    ));
                } else {
                    match pattern.group_number(&name) {
                        Some(index) => index,
                        None => {
                            return Err(error(
                                PatternErrorKind::UnknownGroupName,
                                format!("'{}'", name),
                                pos,
                                repl,
                            ))
                        }
                    }
                };
                b.add_group(index, pos, repl)?;
            }
            '0' => {
                let mut value = 0u32;
                for _ in 0..2 {
                    match next_if_digit(&mut chars, 8) {
                        Some(d) => value = value * 8 + d.to_digit(8).unwrap_or(0),
                        None => break,
                    }
                }
                // At most two octal digits follow, so the value fits a byte.
                b.literal.push(char::from(value as u8));
            }
            '1'..='9' => {
                let mut digits = String::from(esc);
                let mut octal = false;
                if let Some(d2) = next_if_digit(&mut chars, 10) {
                    digits.push(d2);
                    if esc <= '7' && d2 <= '7' {
                        if let Some(d3) = next_if_digit(&mut chars, 8) {
                            digits.push(d3);
                            octal = true;
                        }
                    }
                }
                if octal {
                    let value = u32::from_str_radix(&digits, 8).unwrap_or(u32::MAX);
                    if value > 0o377 {
                        return Err(error(
                            PatternErrorKind::BadEscape,
                            format!("\\{}: octal value outside of range 0-0o377", digits),
                            pos,
                            repl,
                        ));
                    }
                    b.literal.push(char::from(value as u8));
                } else {
                    let index = digits.parse::<usize>().unwrap_or(usize::MAX);
                    b.add_group(index, pos, repl)?;
                }
            }
            'a' => b.literal.push('\x07'),
            'b' => b.literal.push('\x08'),
            'f' => b.literal.push('\x0c'),
            'n' => b.literal.push('\n'),
            'r' => b.literal.push('\r'),
            't' => b.literal.push('\t'),
            'v' => b.literal.push('\x0b'),
            '\\' => b.literal.push('\\'),
            c if c.is_ascii_alphabetic() => {
                return Err(error(PatternErrorKind::BadEscape, format!("\\{}", c), pos, repl));
            }
            c => {
                b.literal.push('\\');
                b.literal.push(c);
            }
        }
    }
    b.flush();
    Ok(Template { items: b.items })
}

// ============================================================================
// Tests
// ============================================================================
