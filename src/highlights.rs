//! Cursor-driven highlight resolution.
//!
//! Given a position, classify what logical entity sits under the cursor,
//! then enumerate every range in the SAME document referring to it.
//! Scan order may interleave heading and link discovery, so results are
//! stable-sorted into document order before returning.

use crate::links::{LinkKind, LinkRecord, LinkTarget};
use crate::slug::Slugifier;
use crate::toc::TableOfContents;
use crate::types::{DocUri, Position, Range};

/// Whether an occurrence declares the entity or merely uses it, mirroring
/// standard editor highlight semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// A usage site.
    Read,
    /// A declaration site: heading or reference definition.
    Write,
}

/// One highlighted range with its access tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    /// Access tag for the occurrence.
    pub access: Access,
    /// The highlighted range.
    pub range: Range,
}

/// The logical entity under a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entity {
    /// A heading anchor: (target document, slug). The target may be the
    /// current document (heading lines, `#frag` targets) or another one
    /// (`path#frag` targets).
    Fragment {
        /// Document owning the anchor.
        doc: DocUri,
        /// Normalized slug.
        slug: String,
    },
    /// A reference label, normalized.
    Label {
        /// Normalized label key.
        label: String,
    },
    /// A resolved link path.
    Path {
        /// Normalized workspace-relative path.
        path: DocUri,
    },
}

/// Resolve highlights for a cursor position over one document's cached
/// outline and validated link records. Empty when nothing relevant sits
/// under the cursor; that is an answer, not an error.
pub fn resolve_highlights(
    current: &DocUri,
    toc: &TableOfContents,
    records: &[LinkRecord],
    position: Position,
    slugifier: &dyn Slugifier,
) -> Vec<Highlight> {
    let Some(entity) = classify(current, toc, records, position, slugifier) else {
        return Vec::new();
    };
    let mut highlights = enumerate(current, toc, records, &entity, slugifier);
    highlights.sort_by(|a, b| return a.range.start.cmp(&b.range.start));
    return highlights;
}

/// Classify the position, first match wins: heading line, then link
/// fragment, then link path, then reference label.
fn classify(
    current: &DocUri,
    toc: &TableOfContents,
    records: &[LinkRecord],
    position: Position,
    slugifier: &dyn Slugifier,
) -> Option<Entity> {
    if let Some(entry) = toc.entries.iter().find(|e| return e.heading_range.contains(position)) {
        return Some(Entity::Fragment { doc: current.clone(), slug: entry.slug.clone() });
    }

    for record in records {
        if !record.fragment_range.is_some_and(|r| return r.contains(position)) {
            continue;
        }
        return match &record.target {
            Some(LinkTarget::Fragment { fragment }) => Some(Entity::Fragment {
                doc: current.clone(),
                slug: slugifier.slugify(fragment),
            }),
            Some(LinkTarget::Path { fragment: Some(fragment), path }) => Some(Entity::Fragment {
                doc: path.clone(),
                slug: slugifier.slugify(fragment),
            }),
            _ => None,
        };
    }

    for record in records {
        if record.path_range.is_some_and(|r| return r.contains(position))
            && let Some(LinkTarget::Path { path, .. }) = &record.target
        {
            return Some(Entity::Path { path: path.clone() });
        }
    }

    for record in records {
        if record.label_range.is_some_and(|r| return r.contains(position))
            && let Some(label) = &record.label
        {
            return Some(Entity::Label { label: label.clone() });
        }
    }

    return None;
}

/// Collect every same-document occurrence of the entity.
fn enumerate(
    current: &DocUri,
    toc: &TableOfContents,
    records: &[LinkRecord],
    entity: &Entity,
    slugifier: &dyn Slugifier,
) -> Vec<Highlight> {
    let mut out = Vec::new();

    match entity {
        Entity::Fragment { doc, slug } => {
            if doc == current
                && let Some(entry) = toc.entries.iter().find(|e| return e.slug == *slug)
            {
                out.push(Highlight { access: Access::Write, range: entry.heading_range });
            }
            for record in records {
                let Some(fragment_range) = record.fragment_range else {
                    continue;
                };
                let matches = match &record.target {
                    Some(LinkTarget::Fragment { fragment }) => {
                        doc == current && slugifier.slugify(fragment) == *slug
                    },
                    Some(LinkTarget::Path { fragment: Some(fragment), path }) => {
                        path == doc && slugifier.slugify(fragment) == *slug
                    },
                    _ => false,
                };
                if matches {
                    out.push(Highlight { access: access_of(record.kind), range: fragment_range });
                }
            }
        },
        Entity::Path { path } => {
            for record in records {
                let Some(LinkTarget::Path { path: record_path, .. }) = &record.target else {
                    continue;
                };
                if record_path != path {
                    continue;
                }
                let range = record.path_range.or(record.target_range).unwrap_or(record.range);
                out.push(Highlight { access: access_of(record.kind), range });
            }
        },
        Entity::Label { label } => {
            for record in records {
                if record.label.as_ref() != Some(label) {
                    continue;
                }
                let range = record.label_range.unwrap_or(record.range);
                out.push(Highlight { access: access_of(record.kind), range });
            }
        },
    }

    return out;
}

/// Definitions declare; everything else reads.
fn access_of(kind: LinkKind) -> Access {
    return match kind {
        LinkKind::ReferenceDefinition => Access::Write,
        _ => Access::Read,
    };
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::document::Document;
    use crate::links::extract_links;
    use crate::slug::GithubSlugifier;
    use crate::toc::TableOfContents;
    use crate::tokenize::tokenize_document;
    use crate::types::{DocUri, Position};

    use super::{resolve_highlights, Access, Highlight};

    /// Extraction-only setup: enough for same-document scenarios, where
    /// no cross-file validation is involved.
    fn highlights_at(uri: &str, text: &str, position: Position) -> Vec<Highlight> {
        let doc = Document::new(DocUri::new(uri), 0, text.to_string());
        let tokens = tokenize_document(&doc).expect("tokenize");
        let toc = TableOfContents::build(&doc, &tokens, &GithubSlugifier);
        let records = extract_links(&doc, &tokens, &toc, &GithubSlugifier);
        return resolve_highlights(doc.uri(), &toc, &records, position, &GithubSlugifier);
    }

    const FRAGMENT_DOC: &str = "\
# A b C

text [link](#a-b-c)
text [link](#a-B-c \"title\")
text [link](doc.md#a-B-c \"title\")

[ref]: #a-B-c \"title\"
";

    #[test]
    fn heading_cursor_collects_all_fragment_references() {
        let highlights = highlights_at("doc.md", FRAGMENT_DOC, Position::new(0, 3));
        let lines: Vec<u32> = highlights.iter().map(|h| return h.range.start.line).collect();
        assert_eq!(lines, vec![0, 2, 3, 4, 6]);
        assert_eq!(highlights.first().map(|h| return h.access), Some(Access::Write));
        assert_eq!(highlights.last().map(|h| return h.access), Some(Access::Write));
    }

    #[test]
    fn every_fragment_entry_point_agrees() {
        let from_heading = highlights_at("doc.md", FRAGMENT_DOC, Position::new(0, 3));
        for position in [
            Position::new(2, 14),
            Position::new(3, 14),
            Position::new(4, 21),
            Position::new(6, 9),
        ] {
            let highlights = highlights_at("doc.md", FRAGMENT_DOC, position);
            assert_eq!(highlights, from_heading, "entry point {position:?}");
        }
    }

    const LABEL_DOC: &str = "\
[text][def]
[def]
[def][]
[def][def]

[def]: http://example.com
";

    #[test]
    fn label_cursor_collects_usages_and_definition() {
        let highlights = highlights_at("doc.md", LABEL_DOC, Position::new(0, 8));
        let lines: Vec<u32> = highlights.iter().map(|h| return h.range.start.line).collect();
        assert_eq!(lines, vec![0, 1, 2, 3, 5]);
        let write_count = highlights.iter().filter(|h| return h.access == Access::Write).count();
        assert_eq!(write_count, 1);
    }

    #[test]
    fn definition_entry_point_agrees_with_usage_entry_point() {
        let from_usage = highlights_at("doc.md", LABEL_DOC, Position::new(0, 8));
        let from_definition = highlights_at("doc.md", LABEL_DOC, Position::new(5, 2));
        assert_eq!(from_usage, from_definition);
    }

    #[test]
    fn path_cursor_collects_matching_paths() {
        let text = "[a](other.md)\n[b](other.md#frag)\n[c](different.md)\n";
        let highlights = highlights_at("doc.md", text, Position::new(0, 6));
        let lines: Vec<u32> = highlights.iter().map(|h| return h.range.start.line).collect();
        assert_eq!(lines, vec![0, 1]);
    }

    #[test]
    fn unrelated_position_returns_empty() {
        let highlights = highlights_at("doc.md", FRAGMENT_DOC, Position::new(2, 1));
        assert!(highlights.is_empty());
    }
}
