//! The chunk rewrite passes: greedy assembly, neighbor merging, oversize
//! splitting, the strict final merge, and overlap attachment.
//!
//! The merger may overshoot the upper bound slightly as a softening
//! heuristic; the final pass is the authority on bounds. Token counts are
//! summed per pass and recomputed from the final text at the end, because
//! tokenization of a concatenation can drift from the sum of the parts.

use chunk_model::NO_HEADING_LEVEL;
use tiktoken_lite::Tokenizer;

use crate::units::SemanticUnit;
use crate::Chunk;

/// Greedy-pack semantic units into chunks under `max_tokens`.
///
/// A unit that alone exceeds the bound still becomes a chunk; the splitter
/// deals with it downstream.
pub fn assemble_chunks(units: &[SemanticUnit], max_tokens: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = Chunk::new();

    for unit in units {
        if !current.text.is_empty() && current.tokens + unit.total_tokens > max_tokens {
            chunks.push(std::mem::replace(&mut current, Chunk::new()));
        }

        current.text.push_str(&unit.text());
        current.tokens += unit.total_tokens;

        if let Some(&first) = unit.pages.iter().next() {
            if current.start_page.is_none() {
                current.start_page = Some(first);
            }
            current.end_page = unit.pages.iter().next_back().copied();
        }
        if unit.has_major_heading {
            current.has_major_heading = true;
            current.min_heading_level = current.min_heading_level.min(unit.min_heading_level);
        }
    }

    if !current.text.is_empty() {
        chunks.push(current);
    }
    chunks
}

// A merge is vetoed when it would pull a strong structural break (a major
// heading of level <= 2) into a predecessor that is already at least half
// the minimum size.
fn merge_vetoed(predecessor: &Chunk, absorbed: &Chunk, min_tokens: usize) -> bool {
    absorbed.has_major_heading
        && absorbed.min_heading_level <= 2
        && predecessor.tokens >= min_tokens / 2
}

fn absorb(current: &mut Chunk, next: &Chunk) {
    current.text.push_str(&next.text);
    current.tokens += next.tokens;
    if current.start_page.is_none() {
        current.start_page = next.start_page;
    }
    if next.end_page.is_some() {
        current.end_page = next.end_page;
    }
    if next.has_major_heading {
        current.has_major_heading = true;
        current.min_heading_level = current.min_heading_level.min(next.min_heading_level);
    }
}

/// Merge undersized chunks forward into their successors.
///
/// A mild overshoot (`<= max * 1.1`) is allowed only to absorb a tiny
/// successor; merges across a major heading are vetoed once the current
/// chunk holds a reasonable amount of text.
pub fn merge_undersized(chunks: Vec<Chunk>, min_tokens: usize, max_tokens: usize) -> Vec<Chunk> {
    if chunks.is_empty() {
        return chunks;
    }

    let mut merged = Vec::new();
    let mut i = 0usize;

    while i < chunks.len() {
        let mut current = chunks[i].clone();

        while current.tokens < min_tokens && i + 1 < chunks.len() {
            let next = &chunks[i + 1];
            let combined = current.tokens + next.tokens;

            let mut should_merge = combined <= max_tokens
                || (combined as f64 <= max_tokens as f64 * 1.1
                    && next.tokens < min_tokens / 2);
            if merge_vetoed(&current, next, min_tokens) {
                should_merge = false;
            }
            if !should_merge {
                break;
            }

            absorb(&mut current, next);
            i += 1;
        }

        merged.push(current);
        i += 1;
    }

    merged
}

/// Split chunks over `max_tokens` at line boundaries.
///
/// A split point requires the accumulator to have reached 80% of the bound,
/// which stops pathological splitting around one long line; a line that
/// alone exceeds the bound descends to sentence, word and finally character
/// granularity so the hard bound always holds.
pub fn split_oversized(chunks: Vec<Chunk>, max_tokens: usize, tokenizer: &Tokenizer) -> Vec<Chunk> {
    let split_floor = max_tokens * 4 / 5;
    let mut result = Vec::new();

    for chunk in chunks {
        if chunk.tokens <= max_tokens {
            result.push(chunk);
            continue;
        }

        let mut first_piece = true;
        let mut acc = String::new();
        let mut acc_tokens = 0usize;
        let mut buf = String::new();

        for line in chunk.text.lines() {
            // Measured with the newline it will carry in the piece text.
            buf.clear();
            buf.push_str(line);
            buf.push('\n');
            let line_tokens = tokenizer.count(&buf);
            if !acc.is_empty() && acc_tokens + line_tokens > max_tokens && acc_tokens >= split_floor
            {
                push_piece(
                    &mut result,
                    &chunk,
                    std::mem::take(&mut acc),
                    acc_tokens,
                    first_piece,
                    max_tokens,
                    tokenizer,
                );
                first_piece = false;
                acc_tokens = 0;
            }
            acc.push_str(line);
            acc.push('\n');
            acc_tokens += line_tokens;
        }

        if !acc.is_empty() {
            push_piece(
                &mut result,
                &chunk,
                acc,
                acc_tokens,
                first_piece,
                max_tokens,
                tokenizer,
            );
        }
    }

    result
}

// Splits inherit the source chunk's page range; heading provenance stays
// with the first piece, where the heading text is.
fn piece_of(source: &Chunk, text: String, tokens: usize, is_first: bool) -> Chunk {
    Chunk {
        text,
        tokens,
        start_page: source.start_page,
        end_page: source.end_page,
        overlap_text: String::new(),
        overlap_tokens: 0,
        has_major_heading: if is_first {
            source.has_major_heading
        } else {
            false
        },
        min_heading_level: if is_first {
            source.min_heading_level
        } else {
            NO_HEADING_LEVEL
        },
    }
}

fn push_piece(
    out: &mut Vec<Chunk>,
    source: &Chunk,
    text: String,
    tokens: usize,
    is_first: bool,
    max_tokens: usize,
    tokenizer: &Tokenizer,
) {
    if tokens <= max_tokens {
        out.push(piece_of(source, text, tokens, is_first));
        return;
    }
    for (i, part) in split_to_limit(&text, max_tokens, tokenizer)
        .into_iter()
        .enumerate()
    {
        let part_tokens = tokenizer.count(&part);
        out.push(piece_of(source, part, part_tokens, is_first && i == 0));
    }
}

/// Partition `text` into pieces of at most `max_tokens` tokens each,
/// descending from sentence to word to character boundaries. Concatenating
/// the pieces reproduces `text` exactly.
pub fn split_to_limit(text: &str, max_tokens: usize, tokenizer: &Tokenizer) -> Vec<String> {
    if tokenizer.count(text) <= max_tokens {
        return vec![text.to_string()];
    }

    for cuts in [sentence_cuts(text), word_cuts(text), char_cuts(text)] {
        let pieces = pack_pieces(text, &cuts, max_tokens, tokenizer);
        if pieces.len() > 1 && pieces.iter().all(|p| tokenizer.count(p) <= max_tokens) {
            return pieces;
        }
    }

    // No boundary at any granularity kept every piece under the bound; an
    // indivisible fragment passes through as-is.
    vec![text.to_string()]
}

// Greedy packing along candidate cut positions: extend the current piece
// while it stays under the budget, emit at the last position that fit.
fn pack_pieces(text: &str, cuts: &[usize], max_tokens: usize, tokenizer: &Tokenizer) -> Vec<String> {
    let mut bounds: Vec<usize> = cuts
        .iter()
        .copied()
        .filter(|&c| c > 0 && c < text.len())
        .collect();
    bounds.push(text.len());

    let mut pieces = Vec::new();
    let mut start = 0usize;
    let mut fitting: Option<usize> = None;

    let mut idx = 0usize;
    while idx < bounds.len() {
        let end = bounds[idx];
        if end <= start {
            idx += 1;
            continue;
        }
        if tokenizer.count(&text[start..end]) <= max_tokens {
            fitting = Some(end);
            idx += 1;
            continue;
        }
        match fitting.take() {
            Some(stop) => {
                pieces.push(text[start..stop].to_string());
                start = stop;
                // retry the same bound against the shortened piece
            }
            None => {
                // the smallest possible piece already exceeds the budget
                pieces.push(text[start..end].to_string());
                start = end;
                idx += 1;
            }
        }
    }

    if let Some(stop) = fitting {
        if stop > start {
            pieces.push(text[start..stop].to_string());
            start = stop;
        }
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }

    pieces
}

fn sentence_cuts(text: &str) -> Vec<usize> {
    let mut cuts = Vec::new();
    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?' | '。' | '！' | '？') {
            cuts.push(idx + ch.len_utf8());
        }
    }
    cuts
}

fn word_cuts(text: &str) -> Vec<usize> {
    let mut cuts = Vec::new();
    let mut prev_was_ws = false;
    for (idx, ch) in text.char_indices() {
        if prev_was_ws && !ch.is_whitespace() {
            cuts.push(idx);
        }
        prev_was_ws = ch.is_whitespace();
    }
    cuts
}

fn char_cuts(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).skip(1).collect()
}

/// Strict-bound merge pass: forward merges first, then one backward merge
/// attempt, never exceeding `max_tokens` and still honoring the major
/// heading veto.
pub fn final_merge(chunks: Vec<Chunk>, min_tokens: usize, max_tokens: usize) -> Vec<Chunk> {
    if chunks.is_empty() {
        return chunks;
    }

    let mut finals: Vec<Chunk> = Vec::new();
    let mut i = 0usize;

    while i < chunks.len() {
        let mut current = chunks[i].clone();

        while current.tokens < min_tokens && i + 1 < chunks.len() {
            let next = &chunks[i + 1];
            if current.tokens + next.tokens > max_tokens || merge_vetoed(&current, next, min_tokens)
            {
                break;
            }
            absorb(&mut current, next);
            i += 1;
        }

        if current.tokens < min_tokens {
            if let Some(prev) = finals.last_mut() {
                if prev.tokens + current.tokens <= max_tokens
                    && !merge_vetoed(prev, &current, min_tokens)
                {
                    absorb(prev, &current);
                    i += 1;
                    continue;
                }
            }
        }

        finals.push(current);
        i += 1;
    }

    finals
}

/// Recompute every chunk's token count from its final text.
pub fn recount(chunks: &mut [Chunk], tokenizer: &Tokenizer) {
    for chunk in chunks {
        chunk.tokens = tokenizer.count(&chunk.text);
    }
}

/// Hard-bound backstop: re-split any chunk whose recounted total exceeds
/// the limit (summed pass counts can drift under the true count).
pub fn enforce_upper_bound(chunks: Vec<Chunk>, max_tokens: usize, tokenizer: &Tokenizer) -> Vec<Chunk> {
    let mut out = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if chunk.tokens <= max_tokens {
            out.push(chunk);
            continue;
        }
        for (i, text) in split_to_limit(&chunk.text, max_tokens, tokenizer)
            .into_iter()
            .enumerate()
        {
            let tokens = tokenizer.count(&text);
            out.push(piece_of(&chunk, text, tokens, i == 0));
        }
    }
    out
}

/// Attach to every non-first chunk a tail excerpt of its predecessor's
/// final text, at most `overlap_tokens` tokens. Pure metadata: the excerpt
/// does not contribute to the chunk's text or token count.
pub fn attach_overlap(chunks: &mut [Chunk], overlap_tokens: usize, tokenizer: &Tokenizer) {
    if overlap_tokens == 0 || chunks.len() < 2 {
        return;
    }

    let mut excerpts = Vec::with_capacity(chunks.len() - 1);
    for i in 1..chunks.len() {
        let prev = chunks[i - 1].text.as_str();

        // Seed with ~5 bytes per token, then trim from the left until the
        // excerpt fits the budget.
        let mut start = ceil_char_boundary(prev, prev.len().saturating_sub(overlap_tokens * 5));
        while tokenizer.count(&prev[start..]) > overlap_tokens {
            let remaining = prev.len() - start;
            if remaining > 10 {
                start = ceil_char_boundary(prev, start + 10);
            } else if let Some((offset, _)) = prev[start..].char_indices().nth(1) {
                start += offset;
            } else {
                break;
            }
        }

        let excerpt = prev[start..].to_string();
        let count = tokenizer.count(&excerpt);
        excerpts.push((excerpt, count));
    }

    for (i, (text, count)) in excerpts.into_iter().enumerate() {
        chunks[i + 1].overlap_text = text;
        chunks[i + 1].overlap_tokens = count;
    }
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx.min(text.len())
}
