// charset.rs - Character class optimization and emission.
//
// A class is first rendered into a membership map indexed by code point
// (256 entries, grown once to 65536), case-folded on the way in when
// ignore-case is active. The map is then re-expressed in the cheapest form
// the matcher understands: up to two LITERAL/RANGE items, a 256-bit
// CHARSET bitmap, or a BIGCHARSET made of deduplicated 256-entry blocks.
// Members that do not fit the map (categories, existing bitmaps, code
// points past the BMP) are passed through after the compressed body.

use log::trace;
use memchr::memchr;
use rustc_hash::FxHashMap;

use crate::casefold::Folding;
use crate::constants::*;
use crate::error::{InternalError, Result};
use crate::subpattern::SetItem;

const SMALL_MAP: usize = 256;
const BMP_MAP: usize = 65536;

/// Words in a 256-bit bitmap.
pub const BITMAP_WORDS: usize = 256 / CODEBITS;

/// Words in the BIGCHARSET block-index table (256 one-byte indices).
pub const BLOCK_INDEX_WORDS: usize = 256 / CODESIZE;

/// Raised while marking a code point that does not fit the current map.
struct Overflow;

struct CharMap {
    map: Vec<u8>,
}

impl CharMap {
    fn new() -> Self {
        CharMap {
            map: vec![0; SMALL_MAP],
        }
    }

    #[inline]
    fn mark(&mut self, ch: u32) -> std::result::Result<(), Overflow> {
        match self.map.get_mut(ch as usize) {
            Some(slot) => {
                *slot = 1;
                Ok(())
            }
            None => Err(Overflow),
        }
    }

    /// Mark `ch` folded through `folding`, together with its extra fold
    /// equivalents.
    fn mark_folded(&mut self, ch: u32, folding: &Folding) -> std::result::Result<(), Overflow> {
        let lo = (folding.lower)(ch);
        self.mark(lo)?;
        for &k in folding.extra_folds(lo) {
            self.mark(k)?;
        }
        Ok(())
    }

    /// Grow to cover the BMP. Returns false when already grown.
    fn grow(&mut self) -> bool {
        if self.map.len() == SMALL_MAP {
            self.map.resize(BMP_MAP, 0);
            true
        } else {
            false
        }
    }

    /// Up to two runs of set entries, or `None` when there are more.
    fn runs(&self) -> Option<Vec<(usize, usize)>> {
        let mut runs = Vec::with_capacity(2);
        let mut q = 0;
        while let Some(off) = memchr(1, &self.map[q..]) {
            let p = q + off;
            if runs.len() >= 2 {
                return None;
            }
            match memchr(0, &self.map[p..]) {
                Some(off) => {
                    q = p + off;
                    runs.push((p, q));
                }
                None => {
                    runs.push((p, self.map.len()));
                    break;
                }
            }
        }
        Some(runs)
    }
}

/// Reject charsets the parser should never produce.
fn validate(items: &[SetItem]) -> Result<()> {
    for (i, item) in items.iter().enumerate() {
        match item {
            SetItem::Negate if i != 0 => {
                return Err(InternalError::MalformedCharset("NEGATE must come first").into());
            }
            SetItem::Range(lo, hi) if lo > hi => {
                return Err(InternalError::MalformedCharset("empty RANGE").into());
            }
            SetItem::Literal(c) | SetItem::Range(_, c) if *c > MAXUNICODE => {
                return Err(InternalError::MalformedCharset("code point out of range").into());
            }
            SetItem::RangeUniIgnore(..) => {
                return Err(InternalError::UnsupportedSetOperator(Opcode::RangeUniIgnore).into());
            }
            SetItem::Charset(words) => check_charset_words(words)?,
            SetItem::BigCharset(words) => check_bigcharset_words(words)?,
            _ => {}
        }
    }
    Ok(())
}

fn check_charset_words(words: &[SreCode]) -> Result<()> {
    if words.len() != BITMAP_WORDS {
        return Err(InternalError::MalformedCharset("CHARSET bitmap must be 8 words").into());
    }
    Ok(())
}

fn check_bigcharset_words(words: &[SreCode]) -> Result<()> {
    let Some(&count) = words.first() else {
        return Err(InternalError::MalformedCharset("BIGCHARSET without block count").into());
    };
    let expected = (count as usize)
        .checked_mul(BITMAP_WORDS)
        .and_then(|n| n.checked_add(1 + BLOCK_INDEX_WORDS));
    if expected != Some(words.len()) {
        return Err(InternalError::MalformedCharset("BIGCHARSET length mismatch").into());
    }
    // Every block index must name an existing block.
    let max_index = words[1..1 + BLOCK_INDEX_WORDS]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .max()
        .unwrap_or(0);
    if count == 0 || max_index as u32 >= count {
        return Err(InternalError::MalformedCharset("BIGCHARSET block index out of range").into());
    }
    Ok(())
}

/// Optimize a character class.
///
/// With `folding`, every literal and range member is lowered and widened
/// with its extra fold equivalents. Returns the optimized members and
/// whether any member is case-sensitive under folding (the caller then
/// picks an ignore-case IN variant).
pub fn optimize_charset(
    items: &[SetItem],
    folding: Option<&Folding>,
) -> Result<(Vec<SetItem>, bool)> {
    validate(items)?;

    let mut out = Vec::new();
    let mut tail = Vec::new();
    let mut charmap = CharMap::new();
    let mut hascased = false;

    for item in items {
        loop {
            let marked = match (item, folding) {
                (SetItem::Literal(c), Some(f)) => charmap.mark_folded(*c, f).map(|()| {
                    if !hascased && f.has_equivalents(*c) {
                        hascased = true;
                    }
                }),
                (SetItem::Literal(c), None) => charmap.mark(*c),
                (SetItem::Range(lo, hi), Some(f)) => (*lo..=*hi)
                    .try_for_each(|c| charmap.mark_folded(c, f))
                    .map(|()| {
                        if !hascased {
                            hascased = (*lo..=*hi).any(|c| f.has_equivalents(c));
                        }
                    }),
                (SetItem::Range(lo, hi), None) => (*lo..=*hi).try_for_each(|c| charmap.mark(c)),
                (SetItem::Negate, _) => {
                    out.push(SetItem::Negate);
                    Ok(())
                }
                (other, _) => {
                    tail.push(other.clone());
                    Ok(())
                }
            };
            if marked.is_ok() {
                break;
            }
            if charmap.grow() {
                continue;
            }
            // Past the BMP: the members already marked stay in the map and
            // the item itself is matched from the tail.
            match (item, folding) {
                (SetItem::Range(lo, hi), Some(_)) => {
                    hascased = true;
                    tail.push(SetItem::RangeUniIgnore(*lo, *hi));
                }
                (other, Some(_)) => {
                    hascased = true;
                    tail.push(other.clone());
                }
                (other, None) => tail.push(other.clone()),
            }
            break;
        }
    }

    if let Some(runs) = charmap.runs() {
        for (p, q) in runs {
            if q - p == 1 {
                out.push(SetItem::Literal(p as u32));
            } else {
                out.push(SetItem::Range(p as u32, (q - 1) as u32));
            }
        }
        out.extend(tail);
        if hascased || out.len() <= items.len() {
            return Ok((out, hascased));
        }
        return Ok((items.to_vec(), hascased));
    }

    if charmap.map.len() == SMALL_MAP {
        out.push(SetItem::Charset(mk_bitmap(&charmap.map)));
    } else {
        let big = bigcharset(&charmap.map);
        trace!("bigcharset with {} distinct blocks", big[0]);
        out.push(SetItem::BigCharset(big));
    }
    out.extend(tail);
    Ok((out, hascased))
}

/// Pack a 0/1 map into code words: bit `i` of word `j` is `bits[j * 32 + i]`.
pub fn mk_bitmap(bits: &[u8]) -> Vec<SreCode> {
    bits.chunks(CODEBITS)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0, |word, (i, &b)| word | ((b as SreCode & 1) << i))
        })
        .collect()
}

/// Build a BIGCHARSET body from a 65536-entry map: the block count, 64
/// words of little-endian block indices, then one 256-bit bitmap per
/// distinct block.
pub fn bigcharset(map: &[u8]) -> Vec<SreCode> {
    debug_assert_eq!(map.len(), BMP_MAP);
    let mut blocks: FxHashMap<&[u8], u8> = FxHashMap::default();
    let mut mapping = [0u8; 256];
    let mut data = Vec::new();
    for (i, chunk) in map.chunks(256).enumerate() {
        let next = blocks.len() as u8;
        let block = *blocks.entry(chunk).or_insert_with(|| {
            data.extend_from_slice(chunk);
            next
        });
        mapping[i] = block;
    }

    let mut words = Vec::with_capacity(1 + BLOCK_INDEX_WORDS + data.len() / CODEBITS);
    words.push(blocks.len() as SreCode);
    words.extend(
        mapping
            .chunks(CODESIZE)
            .map(|b| SreCode::from_le_bytes([b[0], b[1], b[2], b[3]])),
    );
    words.extend(mk_bitmap(&data));
    words
}

/// Emit a charset body followed by FAILURE.
pub fn compile_charset(items: &[SetItem], flags: Flags, code: &mut Vec<SreCode>) -> Result<()> {
    for item in items {
        code.push(item.opcode().code());
        match item {
            SetItem::Negate => {}
            SetItem::Literal(c) => code.push(*c),
            SetItem::Range(lo, hi) | SetItem::RangeUniIgnore(lo, hi) => {
                if lo > hi {
                    return Err(InternalError::MalformedCharset("empty RANGE").into());
                }
                code.push(*lo);
                code.push(*hi);
            }
            SetItem::Charset(words) => {
                check_charset_words(words)?;
                code.extend_from_slice(words);
            }
            SetItem::BigCharset(words) => {
                check_bigcharset_words(words)?;
                code.extend_from_slice(words);
            }
            SetItem::Category(ch) => code.push(ch.for_flags(flags).code()),
        }
    }
    code.push(Opcode::Failure.code());
    Ok(())
}

/// Whether `ch` belongs to a charset body as compiled by `compile_charset`
/// (case-sensitive interpretation, categories excluded). Used to check
/// optimized charsets against their source.
#[cfg(test)]
pub(crate) fn charset_contains(items: &[SetItem], ch: u32) -> bool {
    let mut negated = false;
    let mut hit = false;
    for item in items {
        match item {
            SetItem::Negate => negated = true,
            SetItem::Literal(c) => hit |= *c == ch,
            SetItem::Range(lo, hi) | SetItem::RangeUniIgnore(lo, hi) => hit |= *lo <= ch && ch <= *hi,
            SetItem::Charset(words) => {
                hit |= ch < 256 && words[(ch as usize) / CODEBITS] & (1 << (ch as usize % CODEBITS)) != 0
            }
            SetItem::BigCharset(words) => {
                if ch < 65536 {
                    let block_byte = (ch >> 8) as usize;
                    let index_word = words[1 + block_byte / CODESIZE];
                    let block = index_word.to_le_bytes()[block_byte % CODESIZE] as usize;
                    let low = (ch & 0xff) as usize;
                    let word = words[1 + BLOCK_INDEX_WORDS + block * BITMAP_WORDS + low / CODEBITS];
                    hit |= word & (1 << (low % CODEBITS)) != 0;
                }
            }
            SetItem::Category(_) => {}
        }
    }
    hit != negated
}

// ============================================================================
// Tests
// ============================================================================
