//! Twitter content rules: weighted length and thread auto-split
//!
//! Length is weighted, not counted: URLs bill at a flat 23 regardless of
//! their spelled length, wide characters (CJK, emoji) bill at 2, everything
//! else at 1. Content over the safe limit is split into an ordered thread
//! chain; the engine never truncates.

use crate::error::ValidationError;
use crate::rules::PreparedContent;
use crate::types::{MediaClass, ResolvedMedia, ThreadChunk};

/// Weighted-length ceiling a single published chunk must satisfy
pub const HARD_LIMIT: usize = 280;
/// Split threshold and packing target; stays below the hard limit so
/// numbering markers can be appended downstream without re-splitting
pub const SAFE_LIMIT: usize = 260;
/// Maximum chunks a thread chain may carry
pub const MAX_THREAD_CHUNKS: usize = 25;
/// Media cap; media attaches to the first chunk only
pub const MAX_MEDIA: usize = 4;

const URL_WEIGHT: usize = 23;
/// Packing counts plain characters, which under-estimates weighted cost for
/// wide text; each re-pack tightens the target by this much
const REPACK_SHRINK: usize = 40;
const MAX_REPACK_ATTEMPTS: usize = 6;

pub fn validate_and_transform(
    content: &str,
    media: &[ResolvedMedia],
) -> Result<PreparedContent, ValidationError> {
    if media.len() > MAX_MEDIA {
        return Err(ValidationError::TooManyMedia {
            count: media.len(),
            max: MAX_MEDIA,
        });
    }
    for item in media {
        match item.class() {
            MediaClass::Image | MediaClass::Video => {}
            MediaClass::Document | MediaClass::Other => {
                return Err(ValidationError::UnsupportedMedia {
                    mime: item.mime_type.clone(),
                });
            }
        }
    }

    if weighted_length(content) <= SAFE_LIMIT {
        return Ok(PreparedContent::single(content.to_string()));
    }

    let mut chunks = auto_split(content)?.into_iter();
    let first = chunks.next().unwrap_or_default();
    let thread_chain = chunks.map(ThreadChunk::new).collect();

    Ok(PreparedContent {
        content: first,
        thread_chain,
    })
}

/// Validate one author-specified thread item
pub fn validate_thread_item(
    content: &str,
    media_count: usize,
) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    let length = weighted_length(content);
    if length > HARD_LIMIT {
        return Err(ValidationError::ContentTooLong {
            length,
            limit: HARD_LIMIT,
        });
    }
    if media_count > MAX_MEDIA {
        return Err(ValidationError::TooManyMedia {
            count: media_count,
            max: MAX_MEDIA,
        });
    }
    Ok(())
}

/// Weighted length of a piece of content.
pub fn weighted_length(text: &str) -> usize {
    let mut total = 0;
    for seg in segments(text) {
        let word = seg.trim_end();
        let whitespace = seg.chars().count() - word.chars().count();
        total += whitespace;
        if word.is_empty() {
            continue;
        }
        if is_url(word) {
            total += URL_WEIGHT;
        } else {
            total += word.chars().map(char_weight).sum::<usize>();
        }
    }
    total
}

/// Split over-limit content into thread chunks.
///
/// Greedy whitespace-token packing under a shrinking safe limit. Packing
/// counts plain characters; chunks are then validated against the weighted
/// hard limit, and the pass repeats with a tighter target whenever the plain
/// count under-estimated the true weighted cost.
pub fn auto_split(content: &str) -> Result<Vec<String>, ValidationError> {
    let mut safe_limit = SAFE_LIMIT;

    for _ in 0..MAX_REPACK_ATTEMPTS {
        let chunks = pack(content, safe_limit);

        if chunks.len() > MAX_THREAD_CHUNKS {
            return Err(ValidationError::ThreadTooLong {
                chunks: chunks.len(),
                max: MAX_THREAD_CHUNKS,
            });
        }
        if chunks.iter().all(|c| weighted_length(c) <= HARD_LIMIT) {
            return Ok(chunks);
        }

        safe_limit = safe_limit.saturating_sub(REPACK_SHRINK).max(1);
    }

    Err(ValidationError::Unsplittable { limit: HARD_LIMIT })
}

/// Greedily pack whitespace tokens into chunks of at most `safe_limit` plain
/// characters, preserving the author's exact inter-token spacing.
fn pack(content: &str, safe_limit: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for seg in segments(content) {
        let word = seg.trim_end();

        if !word.is_empty() && word.chars().count() > safe_limit {
            flush(&mut chunks, &current);
            current.clear();
            hard_split(word, safe_limit, &mut chunks, &mut current);
            current.push_str(&seg[word.len()..]);
            continue;
        }

        let mut candidate = current.clone();
        candidate.push_str(seg);

        if !current.trim().is_empty()
            && candidate.trim_end().chars().count() > safe_limit
        {
            flush(&mut chunks, &current);
            current = seg.to_string();
        } else {
            current = candidate;
        }
    }

    flush(&mut chunks, &current);
    chunks
}

/// Split a single oversize token character by character; each piece shrinks
/// until the weighted-length check passes. The final partial piece is left
/// in `current` so following tokens can still join it.
fn hard_split(word: &str, safe_limit: usize, chunks: &mut Vec<String>, current: &mut String) {
    let mut piece = String::new();
    for c in word.chars() {
        piece.push(c);
        if weighted_length(&piece) > safe_limit {
            piece.pop();
            flush(chunks, &piece);
            piece.clear();
            piece.push(c);
        }
    }
    *current = piece;
}

fn flush(chunks: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Word-plus-trailing-whitespace slices covering the whole input
fn segments(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_whitespace = false;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_whitespace = true;
        } else if in_whitespace {
            out.push(&text[start..i]);
            start = i;
            in_whitespace = false;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn is_url(word: &str) -> bool {
    word.starts_with("http://") || word.starts_with("https://") || word.starts_with("www.")
}

fn char_weight(c: char) -> usize {
    // Latin, general punctuation and a handful of symbol ranges weigh 1;
    // everything else (CJK, emoji, ...) weighs 2
    match c as u32 {
        0..=0x10FF | 0x2000..=0x200D | 0x2010..=0x201F | 0x2032..=0x2037 => 1,
        _ => 2,
    }
}
