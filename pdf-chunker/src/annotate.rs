//! Line classification: the first pipeline pass.
//!
//! Every line of every page is tagged with a structural type, its token
//! count and the 0-based page it came from. Classification is a fixed set
//! of hand-written matchers; first match wins.

use tiktoken_lite::Tokenizer;

/// Structural classification of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    Normal,
    /// `#` or `##` heading.
    MajorHeading,
    /// `###` and deeper.
    MinorHeading,
    ListItem,
    Blank,
    CodeBlock,
}

/// One classified line.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedLine {
    pub text: String,
    pub line_type: LineType,
    pub tokens: usize,
    /// 0-based page index.
    pub page: usize,
    /// 1 for `#`, 2 for `##`, ...; 0 when not a heading.
    pub heading_level: u32,
}

/// Classify a single line. `soft_headings` enables the enrichment
/// heuristics (numbered and all-caps headings); these only ever promote a
/// line, never demote one.
pub fn classify_line(line: &str, soft_headings: bool) -> (LineType, u32) {
    if line.trim().is_empty() {
        return (LineType::Blank, 0);
    }

    if let Some(level) = markdown_heading_level(line) {
        return heading_type(level);
    }

    if is_list_item(line) {
        return (LineType::ListItem, 0);
    }

    if line.contains("```") || line.starts_with("  ") {
        return (LineType::CodeBlock, 0);
    }

    if soft_headings && !is_toc_entry(line) {
        if let Some(level) = numbered_heading_level(line) {
            return heading_type(level);
        }
        if is_caps_heading(line) {
            return heading_type(2);
        }
    }

    (LineType::Normal, 0)
}

fn heading_type(level: u32) -> (LineType, u32) {
    if level <= 2 {
        (LineType::MajorHeading, level)
    } else {
        (LineType::MinorHeading, level)
    }
}

/// Annotate all pages in input order; output order is source order.
///
/// The token count covers the line including its terminating newline, the
/// form in which the line reaches chunk text, so pass-level sums track the
/// materialized chunks.
pub fn annotate_pages(
    pages: &[(String, usize)],
    soft_headings: bool,
    tokenizer: &Tokenizer,
) -> Vec<AnnotatedLine> {
    let mut annotated = Vec::new();
    let mut buf = String::new();

    for (page_text, page_number) in pages {
        for line in page_text.lines() {
            let (line_type, heading_level) = classify_line(line, soft_headings);
            buf.clear();
            buf.push_str(line);
            buf.push('\n');
            annotated.push(AnnotatedLine {
                text: line.to_string(),
                line_type,
                tokens: tokenizer.count(&buf),
                page: *page_number,
                heading_level,
            });
        }
    }

    annotated
}

// `^(#+)\s+(.+)$`
fn markdown_heading_level(line: &str) -> Option<u32> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 {
        return None;
    }
    let rest = &line[hashes..];
    let trimmed = rest.trim_start();
    if trimmed.is_empty() || trimmed.len() == rest.len() {
        // No whitespace after the marker, or nothing follows it.
        return None;
    }
    Some(hashes as u32)
}

// `^\s*[-*+•]\s+.+` or `^\s*\d+\.\s+.+`
fn is_list_item(line: &str) -> bool {
    let s = line.trim_start();
    let mut chars = s.chars();
    match chars.next() {
        Some('-') | Some('*') | Some('+') | Some('•') => {
            let rest = chars.as_str();
            let trimmed = rest.trim_start();
            !trimmed.is_empty() && trimmed.len() < rest.len()
        }
        Some(c) if c.is_ascii_digit() => {
            let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
            let rest = &s[digits..];
            if let Some(rest) = rest.strip_prefix('.') {
                let trimmed = rest.trim_start();
                !trimmed.is_empty() && trimmed.len() < rest.len()
            } else {
                false
            }
        }
        _ => false,
    }
}

// `^\d+(\.\d+)*\s+[A-Z]` — numbered section headings like "3.2 Results".
fn numbered_heading_level(line: &str) -> Option<u32> {
    let s = line.trim_start();
    let mut dots = 0u32;
    let mut pos = 0usize;
    let bytes = s.as_bytes();

    loop {
        let start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == start {
            return None;
        }
        if pos < bytes.len() && bytes[pos] == b'.' && bytes.get(pos + 1).is_some_and(|b| b.is_ascii_digit()) {
            dots += 1;
            pos += 1;
            continue;
        }
        break;
    }

    let rest = &s[pos..];
    let trimmed = rest.trim_start();
    if trimmed.len() == rest.len() {
        // Requires whitespace between the numbering and the title.
        return None;
    }
    if trimmed.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        Some(dots + 1)
    } else {
        None
    }
}

// Short lines that are mostly uppercase read as headings.
fn is_caps_heading(line: &str) -> bool {
    let len = line.chars().count();
    if !(3..=100).contains(&len) {
        return false;
    }
    let upper = line.chars().filter(|c| c.is_ascii_uppercase()).count();
    upper as f64 > len as f64 * 0.7
}

// Dotted-leader table-of-contents rows; never promoted.
fn is_toc_entry(line: &str) -> bool {
    line.contains("....") || line.contains(". . .")
}
