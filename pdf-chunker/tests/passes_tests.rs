use chunk_model::NO_HEADING_LEVEL;
use pdf_chunker::annotate::{classify_line, LineType};
use pdf_chunker::passes::{
    attach_overlap, final_merge, merge_undersized, split_to_limit,
};
use pdf_chunker::units::group_units;
use pdf_chunker::{annotate, Chunk};
use tiktoken_lite::Tokenizer;

fn chunk(text: &str, tokens: usize, major: bool, level: u32) -> Chunk {
    Chunk {
        text: text.to_string(),
        tokens,
        start_page: Some(0),
        end_page: Some(0),
        overlap_text: String::new(),
        overlap_tokens: 0,
        has_major_heading: major,
        min_heading_level: level,
    }
}

fn plain(text: &str, tokens: usize) -> Chunk {
    chunk(text, tokens, false, NO_HEADING_LEVEL)
}

// --- Line classification ----------------------------------------------------

#[test]
fn classifies_markdown_headings_by_level() {
    assert_eq!(classify_line("# Foo", false), (LineType::MajorHeading, 1));
    assert_eq!(classify_line("## Foo Bar", false), (LineType::MajorHeading, 2));
    assert_eq!(classify_line("### Foo", false), (LineType::MinorHeading, 3));
    assert_eq!(classify_line("##### Deep", false), (LineType::MinorHeading, 5));
    // Marker without a following space is not a heading.
    assert_eq!(classify_line("#Foo", false), (LineType::Normal, 0));
    // Marker without a title is not a heading.
    assert_eq!(classify_line("##", false), (LineType::Normal, 0));
}

#[test]
fn classifies_list_items() {
    assert_eq!(classify_line("- item", false), (LineType::ListItem, 0));
    assert_eq!(classify_line("  * item", false), (LineType::ListItem, 0));
    assert_eq!(classify_line("+ item", false), (LineType::ListItem, 0));
    assert_eq!(classify_line("• bullet", false), (LineType::ListItem, 0));
    assert_eq!(classify_line("3. numbered", false), (LineType::ListItem, 0));
    assert_eq!(classify_line("12. also numbered", false), (LineType::ListItem, 0));
    // Decimal without a space is prose, not a list.
    assert_eq!(classify_line("3.numbered", false), (LineType::Normal, 0));
}

#[test]
fn classifies_blank_and_code_lines() {
    assert_eq!(classify_line("", false), (LineType::Blank, 0));
    assert_eq!(classify_line("\t", false), (LineType::Blank, 0));
    assert_eq!(classify_line("   ", false), (LineType::Blank, 0));
    assert_eq!(classify_line("```rust", false), (LineType::CodeBlock, 0));
    assert_eq!(classify_line("  indented code", false), (LineType::CodeBlock, 0));
    assert_eq!(classify_line("plain prose here", false), (LineType::Normal, 0));
}

#[test]
fn soft_heading_heuristics_only_fire_when_enabled() {
    // Numbered section heading: level = dot count + 1.
    assert_eq!(classify_line("3.2 Results", false), (LineType::Normal, 0));
    assert_eq!(classify_line("3.2 Results", true), (LineType::MajorHeading, 2));
    assert_eq!(
        classify_line("1.2.3 Deep Section", true),
        (LineType::MinorHeading, 3)
    );
    // Mostly-uppercase short line.
    assert_eq!(
        classify_line("INTRODUCTION AND SCOPE", true),
        (LineType::MajorHeading, 2)
    );
    // Dotted-leader TOC rows are never promoted.
    assert_eq!(
        classify_line("1.2 Results .......... 17", true),
        (LineType::Normal, 0)
    );
    // Lowercase numbering is prose.
    assert_eq!(classify_line("3.2 results follow", true), (LineType::Normal, 0));
}

// --- Semantic grouping ------------------------------------------------------

fn annotate_one_page(text: &str) -> Vec<pdf_chunker::annotate::AnnotatedLine> {
    annotate::annotate_pages(&[(text.to_string(), 0)], false, &Tokenizer::new())
}

#[test]
fn headings_start_fresh_units() {
    let lines = annotate_one_page("intro text\n# Heading\nbody text");
    let units = group_units(&lines);
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].lines[0].text, "intro text");
    assert_eq!(units[1].lines[0].text, "# Heading");
    assert_eq!(units[1].lines[1].text, "body text");
    assert!(units[1].has_major_heading);
    assert_eq!(units[1].min_heading_level, 1);
}

#[test]
fn blank_before_heading_breaks_and_is_skipped() {
    let lines = annotate_one_page("para one\n\n# Head\nbody");
    let units = group_units(&lines);
    assert_eq!(units.len(), 2);
    // The blank belongs to neither unit.
    assert_eq!(units[0].lines.len(), 1);
    assert_eq!(units[1].lines[0].text, "# Head");
}

#[test]
fn interior_blanks_stay_in_their_unit() {
    let lines = annotate_one_page("alpha\n\nbeta");
    let units = group_units(&lines);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].lines.len(), 3);
}

#[test]
fn unit_tokens_and_pages_accumulate() {
    let tok = Tokenizer::new();
    let pages = vec![
        ("first page line".to_string(), 0),
        ("second page line".to_string(), 1),
    ];
    let lines = annotate::annotate_pages(&pages, false, &tok);
    let units = group_units(&lines);
    assert_eq!(units.len(), 1);
    let unit = &units[0];
    assert_eq!(
        unit.total_tokens,
        tok.count("first page line\n") + tok.count("second page line\n")
    );
    assert!(unit.pages.contains(&0) && unit.pages.contains(&1));
    assert_eq!(unit.text(), "first page line\nsecond page line\n");
}

// --- Merger -----------------------------------------------------------------

#[test]
fn merger_combines_undersized_neighbors() {
    let chunks = vec![plain("a\n", 10), plain("b\n", 15)];
    let merged = merge_undersized(chunks, 30, 100);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].text, "a\nb\n");
    assert_eq!(merged[0].tokens, 25);
}

#[test]
fn merger_allows_mild_overshoot_for_tiny_successors() {
    // combined 43 > max 40 but <= 44, and the successor is tiny (< min/2).
    let chunks = vec![plain("a\n", 29), plain("b\n", 14)];
    let merged = merge_undersized(chunks, 30, 40);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].tokens, 43);
}

#[test]
fn merger_rejects_large_overshoot() {
    let chunks = vec![plain("a\n", 29), plain("b\n", 25)];
    let merged = merge_undersized(chunks, 30, 40);
    assert_eq!(merged.len(), 2);
}

#[test]
fn merger_vetoes_major_heading_absorption() {
    // Predecessor holds >= min/2 tokens, successor opens a level-1 section:
    // the merge is vetoed even though the combined size is legal.
    let chunks = vec![plain("before\n", 15), chunk("# Next\nbody\n", 10, true, 1)];
    let merged = merge_undersized(chunks, 30, 100);
    assert_eq!(merged.len(), 2);
    assert!(merged[1].text.starts_with("# Next"));

    // Below min/2 the veto does not apply.
    let chunks = vec![plain("tiny\n", 14), chunk("# Next\nbody\n", 10, true, 1)];
    let merged = merge_undersized(chunks, 30, 100);
    assert_eq!(merged.len(), 1);
}

#[test]
fn merger_does_not_veto_minor_headings() {
    let chunks = vec![plain("before\n", 20), chunk("### Sub\nbody\n", 8, false, NO_HEADING_LEVEL)];
    let merged = merge_undersized(chunks, 30, 100);
    assert_eq!(merged.len(), 1);
}

// --- Finalizer --------------------------------------------------------------

#[test]
fn final_merge_is_strict_about_the_bound() {
    // 29 + 78 exceeds the bound; the merger's 1.1x allowance does not apply.
    let chunks = vec![plain("a\n", 29), plain("b\n", 78)];
    let merged = final_merge(chunks, 30, 100);
    assert_eq!(merged.len(), 2);
}

#[test]
fn final_merge_falls_back_to_backward_merge() {
    let chunks = vec![plain("big\n", 60), plain("tail\n", 25)];
    let merged = final_merge(chunks, 30, 100);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].text, "big\ntail\n");
    assert_eq!(merged[0].tokens, 85);
}

#[test]
fn final_merge_keeps_undersized_chunk_when_no_merge_is_legal() {
    let chunks = vec![plain("big\n", 90), plain("tail\n", 25)];
    let merged = final_merge(chunks, 30, 100);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[1].tokens, 25);
}

#[test]
fn final_merge_honors_the_heading_veto_backwards() {
    let chunks = vec![plain("before\n", 60), chunk("# Major\nbody\n", 20, true, 1)];
    let merged = final_merge(chunks, 30, 100);
    assert_eq!(merged.len(), 2);
    assert!(merged[1].text.starts_with("# Major"));
}

// --- Sub-line splitting -----------------------------------------------------

#[test]
fn split_to_limit_partitions_exactly_at_sentences() {
    let tok = Tokenizer::new();
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(30);
    let pieces = split_to_limit(&text, 40, &tok);

    assert!(pieces.len() >= 2);
    assert!(pieces.iter().all(|p| tok.count(p) <= 40));
    assert_eq!(pieces.concat(), text);
}

#[test]
fn split_to_limit_descends_to_words_without_sentences() {
    let tok = Tokenizer::new();
    let text = "alpha beta gamma delta epsilon zeta eta theta ".repeat(25);
    let pieces = split_to_limit(&text, 30, &tok);

    assert!(pieces.len() >= 2);
    assert!(pieces.iter().all(|p| tok.count(p) <= 30));
    assert_eq!(pieces.concat(), text);
}

#[test]
fn split_to_limit_descends_to_characters_as_a_last_resort() {
    let tok = Tokenizer::new();
    let text = "#".repeat(400);
    let pieces = split_to_limit(&text, 25, &tok);

    assert!(pieces.len() >= 2);
    assert!(pieces.iter().all(|p| tok.count(p) <= 25));
    assert_eq!(pieces.concat(), text);
}

#[test]
fn split_to_limit_returns_fitting_text_unchanged() {
    let tok = Tokenizer::new();
    let text = "short text.";
    assert_eq!(split_to_limit(text, 100, &tok), vec![text.to_string()]);
}

// --- Overlap ----------------------------------------------------------------

#[test]
fn overlap_is_a_bounded_suffix_of_the_predecessor() {
    let tok = Tokenizer::new();
    let text_a = "the quick brown fox jumps over the lazy dog again and again\n".to_string();
    let mut chunks = vec![
        Chunk {
            tokens: tok.count(&text_a),
            text: text_a,
            ..Chunk::new()
        },
        plain("second chunk body\n", 4),
        plain("third chunk body\n", 4),
    ];

    attach_overlap(&mut chunks, 5, &tok);

    assert!(chunks[0].overlap_text.is_empty());
    for i in 1..chunks.len() {
        let overlap = &chunks[i].overlap_text;
        assert!(!overlap.is_empty());
        assert!(chunks[i - 1].text.ends_with(overlap.as_str()));
        assert!(chunks[i].overlap_tokens <= 5);
        assert_eq!(chunks[i].overlap_tokens, tok.count(overlap));
    }
}

#[test]
fn overlap_respects_multibyte_boundaries() {
    let tok = Tokenizer::new();
    let text_a = "日本語のテキストが続きます。さらに続きます。\n".to_string();
    let mut chunks = vec![
        Chunk {
            tokens: tok.count(&text_a),
            text: text_a,
            ..Chunk::new()
        },
        plain("second\n", 2),
    ];

    attach_overlap(&mut chunks, 6, &tok);

    let overlap = &chunks[1].overlap_text;
    assert!(!overlap.is_empty());
    assert!(chunks[0].text.ends_with(overlap.as_str()));
    assert!(chunks[1].overlap_tokens <= 6);
}

#[test]
fn zero_overlap_is_a_no_op() {
    let tok = Tokenizer::new();
    let mut chunks = vec![plain("a\n", 1), plain("b\n", 1)];
    attach_overlap(&mut chunks, 0, &tok);
    assert!(chunks[1].overlap_text.is_empty());
    assert_eq!(chunks[1].overlap_tokens, 0);
}
