//! Semantic grouping: fold annotated lines into heading-delimited units.

use std::collections::BTreeSet;

use chunk_model::NO_HEADING_LEVEL;

use crate::annotate::{AnnotatedLine, LineType};

/// A heading-delimited group of lines, the atomic input to chunk assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticUnit {
    pub lines: Vec<AnnotatedLine>,
    pub total_tokens: usize,
    /// 0-based pages this unit spans.
    pub pages: BTreeSet<usize>,
    pub has_major_heading: bool,
    /// Minimum level among major heading lines; sentinel 999 when none.
    pub min_heading_level: u32,
}

impl SemanticUnit {
    fn new() -> Self {
        SemanticUnit {
            lines: Vec::new(),
            total_tokens: 0,
            pages: BTreeSet::new(),
            has_major_heading: false,
            min_heading_level: NO_HEADING_LEVEL,
        }
    }

    fn push_line(&mut self, line: &AnnotatedLine) {
        self.total_tokens += line.tokens;
        self.pages.insert(line.page);
        if line.line_type == LineType::MajorHeading {
            self.has_major_heading = true;
            self.min_heading_level = self.min_heading_level.min(line.heading_level);
        }
        self.lines.push(line.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Unit text: every line terminated by `\n`.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }
}

/// Group lines into semantic units.
///
/// A fresh unit starts at every heading, and at a blank line whose
/// immediate successor is a heading. Blank lines at the start of a unit
/// are skipped. Units come out non-empty and in source order.
pub fn group_units(lines: &[AnnotatedLine]) -> Vec<SemanticUnit> {
    let mut units = Vec::new();
    let mut current = SemanticUnit::new();

    for (i, line) in lines.iter().enumerate() {
        let is_heading = matches!(
            line.line_type,
            LineType::MajorHeading | LineType::MinorHeading
        );
        let blank_before_heading = line.line_type == LineType::Blank
            && lines.get(i + 1).is_some_and(|next| {
                matches!(
                    next.line_type,
                    LineType::MajorHeading | LineType::MinorHeading
                )
            });

        if (is_heading || blank_before_heading) && !current.is_empty() {
            units.push(current);
            current = SemanticUnit::new();
        }

        // Skip blank lines at unit boundaries.
        if !(line.line_type == LineType::Blank && current.is_empty()) {
            current.push_line(line);
        }
    }

    if !current.is_empty() {
        units.push(current);
    }

    units
}
