/// Core domain types for positions, ranges, and document identity.
use std::fmt;

/// Identity of a markdown document: a normalized, `/`-separated path
/// relative to the workspace root. Newtype prevents mixing with arbitrary
/// strings and guarantees dot-segment normalization by construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct DocUri(String);

impl DocUri {
    /// Create a URI from a workspace-relative path, normalizing `.` and
    /// `..` segments. Leading `..` segments that cannot be popped are
    /// preserved; such a URI never resolves to a workspace document.
    pub fn new(path: &str) -> Self {
        return Self(normalize_segments(path));
    }

    /// The normalized path as a string slice.
    pub fn as_str(&self) -> &str {
        return &self.0;
    }

    /// The extension of the final segment, without the leading dot.
    /// `None` when the final segment has no dot or only a leading dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.0.rsplit('/').next().unwrap_or(&self.0);
        return match name.rfind('.') {
            None | Some(0) => None,
            Some(idx) => name.get(idx.saturating_add(1)..).filter(|e| return !e.is_empty()),
        };
    }

    /// The directory portion of this URI, empty for root-level documents.
    pub fn parent(&self) -> &str {
        return match self.0.rfind('/') {
            None => "",
            Some(idx) => self.0.get(..idx).unwrap_or(""),
        };
    }

    /// Resolve a raw link target against this document's location.
    /// A leading `/` resolves from the workspace root; anything else is
    /// relative to this document's directory.
    pub fn resolve(&self, target: &str) -> DocUri {
        if let Some(absolute) = target.strip_prefix('/') {
            return DocUri::new(absolute);
        }
        let dir = self.parent();
        if dir.is_empty() {
            return DocUri::new(target);
        }
        return DocUri::new(&format!("{dir}/{target}"));
    }

    /// A copy of this URI with `.{ext}` appended to the final segment.
    pub fn with_appended_extension(&self, ext: &str) -> DocUri {
        return Self(format!("{}.{ext}", self.0));
    }
}

impl fmt::Display for DocUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.0);
    }
}

/// Collapse `.` and `..` segments of a `/`-separated path without touching
/// the filesystem. Preserves leading `..` when there is nothing to pop.
fn normalize_segments(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                let can_pop = matches!(segments.last(), Some(s) if *s != "..");
                if can_pop {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            },
            other => segments.push(other),
        }
    }
    return segments.join("/");
}

/// A zero-based location in a document. The column is a byte offset within
/// the line; transport encodings are the embedder's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// Zero-based byte column within the line.
    pub character: u32,
    /// Zero-based line number.
    pub line: u32,
}

impl Position {
    /// Construct a position from line and byte column.
    pub fn new(line: u32, character: u32) -> Self {
        return Self { character, line };
    }
}

impl PartialOrd for Position {
    /// Delegate to `Ord`.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        return Some(self.cmp(other));
    }
}

impl Ord for Position {
    /// Compare in document order: line first, then column.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        return (self.line, self.character).cmp(&(other.line, other.character));
    }
}

/// A span between two positions. Hit-testing via `contains` is inclusive
/// at both edges so a cursor sitting at the end of a token still selects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    /// End position.
    pub end: Position,
    /// Start position.
    pub start: Position,
}

impl Range {
    /// Construct a range from start and end positions.
    pub fn new(start: Position, end: Position) -> Self {
        return Self { end, start };
    }

    /// Whether the position falls within this range, edges included.
    pub fn contains(&self, position: Position) -> bool {
        return self.start <= position && position <= self.end;
    }
}

#[cfg(test)]
mod tests {
    use super::{DocUri, Position, Range};

    #[test]
    fn normalizes_dot_segments() {
        assert_eq!(DocUri::new("docs/./guide.md").as_str(), "docs/guide.md");
        assert_eq!(DocUri::new("docs/../other.md").as_str(), "other.md");
    }

    #[test]
    fn preserves_leading_parent_segments() {
        assert_eq!(DocUri::new("../outside.md").as_str(), "../outside.md");
    }

    #[test]
    fn resolves_relative_to_document_directory() {
        let source = DocUri::new("docs/nested/guide.md");
        assert_eq!(source.resolve("../intro.md").as_str(), "docs/intro.md");
        assert_eq!(source.resolve("other.md").as_str(), "docs/nested/other.md");
    }

    #[test]
    fn resolves_absolute_from_workspace_root() {
        let source = DocUri::new("docs/guide.md");
        assert_eq!(source.resolve("/readme.md").as_str(), "readme.md");
    }

    #[test]
    fn extension_of_final_segment() {
        assert_eq!(DocUri::new("docs/guide.md").extension(), Some("md"));
        assert_eq!(DocUri::new("docs/guide").extension(), None);
        assert_eq!(DocUri::new("docs/.hidden").extension(), None);
    }

    #[test]
    fn range_contains_is_edge_inclusive() {
        let range = Range::new(Position::new(1, 2), Position::new(1, 8));
        assert!(range.contains(Position::new(1, 2)));
        assert!(range.contains(Position::new(1, 8)));
        assert!(!range.contains(Position::new(1, 9)));
        assert!(!range.contains(Position::new(0, 5)));
    }
}
