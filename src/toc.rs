//! Table-of-contents building and fragment lookup.

use std::collections::HashSet;

use crate::document::Document;
use crate::slug::Slugifier;
use crate::tokenize::Token;
use crate::types::Range;

/// One heading in a document outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// The heading's own line range (text and underline for setext).
    pub heading_range: Range,
    /// Heading level 1–6.
    pub level: u8,
    /// The section this heading opens: from the heading's start to the
    /// next heading of level ≤ its own, or to document end.
    pub section_range: Range,
    /// Anchor slug, unique within the document.
    pub slug: String,
    /// Display text with markup stripped and entities decoded.
    pub text: String,
}

/// Ordered document outline. Section ranges of same-or-shallower levels
/// partition the document with no gaps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableOfContents {
    /// Entries in document order.
    pub entries: Vec<TocEntry>,
}

impl TableOfContents {
    /// Build the outline from a token stream in two passes: collect
    /// headings in emission order, then resolve unique slugs and section
    /// ranges. Nesting is trusted to the tokenizer: headings inside raw
    /// blocks are never emitted by a conforming implementation.
    pub fn build(doc: &Document, tokens: &[Token], slugifier: &dyn Slugifier) -> Self {
        let raw = collect_headings(tokens);
        if raw.is_empty() {
            return Self::default();
        }

        let doc_end = doc.position_at(doc.text().len());
        let mut used: HashSet<String> = HashSet::new();
        let mut entries = Vec::with_capacity(raw.len());

        for (idx, heading) in raw.iter().enumerate() {
            let slug = unique_slug(slugifier.slugify(&heading.text), &mut used);
            let section_end = raw
                .iter()
                .skip(idx.saturating_add(1))
                .find(|next| return next.level <= heading.level)
                .map_or(doc_end, |next| return next.range.start);

            entries.push(TocEntry {
                heading_range: heading.range,
                level: heading.level,
                section_range: Range::new(heading.range.start, section_end),
                slug,
                text: heading.text.clone(),
            });
        }

        return Self { entries };
    }

    /// Find the entry a fragment addresses. Matching is case-insensitive
    /// and slug-normalized: the raw fragment is re-slugified before
    /// comparison, so `#A-b-C` and `#a-b-c` address the same heading.
    pub fn lookup(&self, fragment: &str, slugifier: &dyn Slugifier) -> Option<&TocEntry> {
        let wanted = slugifier.slugify(fragment);
        return self.entries.iter().find(|e| return e.slug == wanted);
    }
}

/// A heading captured during the first pass.
struct RawHeading {
    level: u8,
    range: Range,
    text: String,
}

/// Scan tokens in order, concatenating the stripped text runs between
/// each heading open/close pair and decoding entity references.
fn collect_headings(tokens: &[Token]) -> Vec<RawHeading> {
    let mut raw = Vec::new();
    let mut open: Option<RawHeading> = None;

    for token in tokens {
        match token {
            Token::HeadingOpen { level, range } => {
                open = Some(RawHeading { level: *level, range: *range, text: String::new() });
            },
            Token::Text { content, .. } => {
                if let Some(heading) = open.as_mut() {
                    heading.text.push_str(content);
                }
            },
            Token::HeadingClose { .. } => {
                if let Some(mut heading) = open.take() {
                    heading.text =
                        html_escape::decode_html_entities(heading.text.trim()).into_owned();
                    raw.push(heading);
                }
            },
            _ => {},
        }
    }

    return raw;
}

/// Resolve a slug against the already-used set: the first occurrence
/// keeps the bare slug, later duplicates get the smallest unused numeric
/// suffix in order of appearance.
fn unique_slug(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{base}-{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n = n.saturating_add(1);
    }
}
