// dis.rs - Program listing for debugging.
//
// One instruction per line: offset, mnemonic, decoded operands and, for
// forward references, the absolute target. Offsets that an earlier
// instruction jumps to are marked with ':' instead of '.'. Nested bodies
// (classes, repeats, assertions, branch alternatives) are indented.

use std::fmt::Write;

use rustc_hash::FxHashSet;

use crate::charset::{BITMAP_WORDS, BLOCK_INDEX_WORDS};
use crate::constants::*;

/// Render `code` as text.
pub fn dis(code: &[SreCode]) -> String {
    let mut d = Disassembler {
        code,
        out: String::new(),
        labels: FxHashSet::default(),
        level: 0,
        width: code.len().saturating_sub(1).to_string().len(),
    };
    if d.range(0, code.len()).is_none() {
        d.out.push_str("<truncated program>\n");
    }
    d.out
}

struct Disassembler<'a> {
    code: &'a [SreCode],
    out: String,
    labels: FxHashSet<usize>,
    level: usize,
    width: usize,
}

fn show_char(c: u32) -> String {
    match char::from_u32(c) {
        Some(ch) => format!("{:#x} ({:?})", c, ch),
        None => format!("{:#x}", c),
    }
}

fn show_max(max: u32) -> String {
    if max == MAXREPEAT {
        "MAXREPEAT".to_owned()
    } else {
        max.to_string()
    }
}

fn hex_words(words: &[SreCode]) -> String {
    let parts: Vec<String> = words
        .iter()
        .map(|w| format!("{:#0width$x}", w, width = CODESIZE * 2 + 2))
        .collect();
    format!("[{}]", parts.join(", "))
}

impl<'a> Disassembler<'a> {
    fn word(&self, i: usize) -> Option<SreCode> {
        self.code.get(i).copied()
    }

    fn words(&self, i: usize, n: usize) -> Option<&'a [SreCode]> {
        self.code.get(i..i.checked_add(n)?)
    }

    fn line(&mut self, start: usize, text: &str, to: Option<usize>) {
        if let Some(to) = to {
            self.labels.insert(to);
        }
        let mark = if self.labels.contains(&start) { ':' } else { '.' };
        let _ = write!(
            self.out,
            "{:>w$}{} {}{}",
            start,
            mark,
            "  ".repeat(self.level.saturating_sub(1)),
            text,
            w = self.width
        );
        if let Some(to) = to {
            let _ = write!(self.out, " (to {})", to);
        }
        self.out.push('\n');
    }

    /// Continuation line without an offset.
    fn line2(&mut self, text: &str) {
        let _ = writeln!(
            self.out,
            "{}{}",
            " ".repeat(self.width + 2 * self.level),
            text
        );
    }

    fn range(&mut self, start: usize, end: usize) -> Option<()> {
        self.level += 1;
        let result = self.range_inner(start, end);
        self.level -= 1;
        result
    }

    fn range_inner(&mut self, start: usize, end: usize) -> Option<()> {
        let mut i = start;
        while i < end {
            let start = i;
            let raw = self.word(i)?;
            i += 1;
            let Ok(op) = Opcode::try_from(raw) else {
                self.line(start, &format!("<invalid opcode {}>", raw), None);
                return None;
            };
            let name = op.name();
            match op {
                Opcode::Success
                | Opcode::Failure
                | Opcode::Any
                | Opcode::AnyAll
                | Opcode::MaxUntil
                | Opcode::MinUntil
                | Opcode::Negate => self.line(start, name, None),
                Opcode::Literal
                | Opcode::NotLiteral
                | Opcode::LiteralIgnore
                | Opcode::NotLiteralIgnore
                | Opcode::LiteralUniIgnore
                | Opcode::NotLiteralUniIgnore
                | Opcode::LiteralLocIgnore
                | Opcode::NotLiteralLocIgnore => {
                    let arg = self.word(i)?;
                    i += 1;
                    self.line(start, &format!("{} {}", name, show_char(arg)), None);
                }
                Opcode::At => {
                    let arg = self.word(i)?;
                    i += 1;
                    let text = match AtCode::try_from(arg) {
                        Ok(at) => format!("{} {}", name, at.name().trim_start_matches("AT_")),
                        Err(_) => format!("{} <invalid anchor {}>", name, arg),
                    };
                    self.line(start, &text, None);
                }
                Opcode::Category => {
                    let arg = self.word(i)?;
                    i += 1;
                    let text = match ChCode::try_from(arg) {
                        Ok(ch) => {
                            format!("{} {}", name, ch.name().trim_start_matches("CATEGORY_"))
                        }
                        Err(_) => format!("{} <invalid category {}>", name, arg),
                    };
                    self.line(start, &text, None);
                }
                Opcode::In | Opcode::InIgnore | Opcode::InUniIgnore | Opcode::InLocIgnore => {
                    let skip = self.word(i)? as usize;
                    self.line(start, &format!("{} {}", name, skip), Some(i + skip));
                    self.range(i + 1, i + skip)?;
                    i += skip;
                }
                Opcode::Range | Opcode::RangeUniIgnore => {
                    let lo = self.word(i)?;
                    let hi = self.word(i + 1)?;
                    i += 2;
                    self.line(
                        start,
                        &format!("{} {} {}", name, show_char(lo), show_char(hi)),
                        None,
                    );
                }
                Opcode::Charset => {
                    let text = format!("{} {}", name, hex_words(self.words(i, BITMAP_WORDS)?));
                    self.line(start, &text, None);
                    i += BITMAP_WORDS;
                }
                Opcode::BigCharset => {
                    let count = self.word(i)? as usize;
                    i += 1;
                    let mapping: Vec<u8> = self
                        .words(i, BLOCK_INDEX_WORDS)?
                        .iter()
                        .flat_map(|w| w.to_le_bytes())
                        .collect();
                    self.line(start, &format!("{} {} {:?}", name, count, mapping), None);
                    i += BLOCK_INDEX_WORDS;
                    self.level += 1;
                    for _ in 0..count {
                        let Some(block) = self.words(i, BITMAP_WORDS) else {
                            self.level -= 1;
                            return None;
                        };
                        let text = hex_words(block);
                        self.line2(&text);
                        i += BITMAP_WORDS;
                    }
                    self.level -= 1;
                }
                Opcode::Mark
                | Opcode::GroupRef
                | Opcode::GroupRefIgnore
                | Opcode::GroupRefUniIgnore
                | Opcode::GroupRefLocIgnore => {
                    let arg = self.word(i)?;
                    i += 1;
                    self.line(start, &format!("{} {}", name, arg), None);
                }
                Opcode::Jump => {
                    let skip = self.word(i)? as usize;
                    self.line(start, &format!("{} {}", name, skip), Some(i + skip));
                    i += 1;
                }
                Opcode::Branch => {
                    let mut skip = self.word(i)? as usize;
                    self.line(start, &format!("{} {}", name, skip), Some(i + skip));
                    while skip != 0 {
                        self.range(i + 1, i + skip)?;
                        i += skip;
                        skip = self.word(i)? as usize;
                        if skip != 0 {
                            self.line(i, &format!("branch {}", skip), Some(i + skip));
                        } else {
                            self.line(i, Opcode::Failure.name(), None);
                        }
                    }
                    i += 1;
                }
                Opcode::Repeat
                | Opcode::RepeatOne
                | Opcode::MinRepeatOne
                | Opcode::PossessiveRepeat
                | Opcode::PossessiveRepeatOne => {
                    let skip = self.word(i)? as usize;
                    let min = self.word(i + 1)?;
                    let max = self.word(i + 2)?;
                    let text = format!("{} {} {} {}", name, skip, min, show_max(max));
                    self.line(start, &text, Some(i + skip));
                    self.range(i + 3, i + skip)?;
                    i += skip;
                }
                Opcode::GroupRefExists => {
                    let arg = self.word(i)?;
                    let skip = self.word(i + 1)? as usize;
                    self.line(start, &format!("{} {} {}", name, arg, skip), Some(i + skip));
                    i += 2;
                }
                Opcode::Assert | Opcode::AssertNot => {
                    let skip = self.word(i)? as usize;
                    let back = self.word(i + 1)?;
                    self.line(start, &format!("{} {} {}", name, skip, back), Some(i + skip));
                    self.range(i + 2, i + skip)?;
                    i += skip;
                }
                Opcode::AtomicGroup => {
                    let skip = self.word(i)? as usize;
                    self.line(start, &format!("{} {}", name, skip), Some(i + skip));
                    self.range(i + 1, i + skip)?;
                    i += skip;
                }
                Opcode::Info => self.info(start, &mut i)?,
                Opcode::Subpattern | Opcode::MinRepeat | Opcode::MaxRepeat => {
                    self.line(start, &format!("<unexpected {}>", name), None);
                    return None;
                }
            }
        }
        Some(())
    }

    fn info(&mut self, start: usize, i: &mut usize) -> Option<()> {
        let at = *i;
        let skip = self.word(at)? as usize;
        let mask = self.word(at + 1)?;
        let min = self.word(at + 2)?;
        let max = self.word(at + 3)?;
        let text = format!("INFO {} {:#b} {} {}", skip, mask, min, show_max(max));
        self.line(start, &text, Some(at + skip));

        let mut body = at + 4;
        if mask & SRE_INFO_PREFIX != 0 {
            let len = self.word(at + 4)? as usize;
            let prefix_skip = self.word(at + 5)?;
            self.line2(&format!("  prefix_skip {}", prefix_skip));
            body = at + 6;
            let prefix = self.words(body, len)?.to_vec();
            let hex: Vec<String> = prefix.iter().map(|c| format!("{:#x}", c)).collect();
            let text: String = prefix
                .iter()
                .map(|&c| char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect();
            self.line2(&format!("  prefix [{}] ({:?})", hex.join(", "), text));
            body += len;
            let overlap = self.words(body, len)?.to_vec();
            self.line2(&format!("  overlap {:?}", overlap));
            body += len;
        }
        if mask & SRE_INFO_CHARSET != 0 {
            self.level += 1;
            self.line2("in");
            let result = self.range(body, at + skip);
            self.level -= 1;
            result?;
        }
        *i = at + skip;
        Some(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn literal_program() {
        let code = [
            Opcode::Info.code(), 12, 3, 3, 3, 3, 3, 0x61, 0x62, 0x63, 0, 0, 0,
            Opcode::Literal.code(), 0x61,
            Opcode::Success.code(),
        ];
        let expected = "\
 0. INFO 12 0b11 3 3 (to 13)
      prefix_skip 3
      prefix [0x61, 0x62, 0x63] (\"abc\")
      overlap [0, 0, 0]
13: LITERAL 0x61 ('a')
15. SUCCESS
";
        assert_eq!(dis(&code), expected);
    }

    #[test]
    fn nested_bodies_are_indented() {
        let code = [
            Opcode::RepeatOne.code(), 5, 0, MAXREPEAT,
            Opcode::Any.code(),
            Opcode::Success.code(),
            Opcode::At.code(), AtCode::EndString.code(),
        ];
        let expected = "\
0. REPEAT_ONE 5 0 MAXREPEAT (to 6)
4.   ANY
5.   SUCCESS
6: AT END_STRING
";
        assert_eq!(dis(&code), expected);
    }

    #[test]
    fn branch_alternatives() {
        let jump = Opcode::Jump.code();
        let lit = Opcode::Literal.code();
        let code = [
            Opcode::Branch.code(),
            5, lit, 0x61, jump, 7,
            5, lit, 0x62, jump, 2,
            0,
        ];
        let text = dis(&code);
        assert!(text.contains(" 0. BRANCH 5 (to 6)"));
        assert!(text.contains(" 6: branch 5 (to 11)"));
        assert!(text.contains("11: FAILURE"));
    }

    #[test]
    fn truncated_input() {
        let text = dis(&[Opcode::Literal.code()]);
        assert!(text.ends_with("<truncated program>\n"));
        let text = dis(&[99]);
        assert!(text.contains("<invalid opcode 99>"));
    }

    #[test]
    fn unknown_operands_are_shown_inline() {
        let code = [
            Opcode::At.code(), 99,
            Opcode::Category.code(), 77,
            Opcode::Success.code(),
        ];
        let expected = "\
0. AT <invalid anchor 99>
2. CATEGORY <invalid category 77>
4. SUCCESS
";
        assert_eq!(dis(&code), expected);
    }
}
