//! Immutable document snapshots with position⇄offset conversion.

use std::sync::Arc;

use crate::types::{DocUri, Position, Range};

/// An immutable snapshot of a markdown document, identified by (URI,
/// version). The workspace owns the document lifecycle; every change
/// manifests as a new snapshot with a higher version, so the engine can
/// key derived values on the pair and never observe in-place mutation.
#[derive(Debug)]
pub struct Document {
    /// Byte offset of the start of each line, always beginning with 0.
    line_starts: Vec<usize>,
    /// Full document text.
    text: String,
    /// Workspace-relative identity.
    uri: DocUri,
    /// Monotonically increasing per URI.
    version: i32,
}

impl Document {
    /// Build a snapshot, precomputing the line index.
    pub fn new(uri: DocUri, version: i32, text: String) -> Arc<Self> {
        let mut line_starts = vec![0];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx.saturating_add(1));
            }
        }
        return Arc::new(Self { line_starts, text, uri, version });
    }

    /// Number of lines, counting a trailing newline as opening a new line.
    pub fn line_count(&self) -> u32 {
        return u32::try_from(self.line_starts.len()).unwrap_or(u32::MAX);
    }

    /// The text of the given line without its terminator, or `None` past
    /// the end of the document.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let idx = usize::try_from(line).ok()?;
        let start = *self.line_starts.get(idx)?;
        let end = match self.line_starts.get(idx.saturating_add(1)) {
            None => self.text.len(),
            Some(next) => *next,
        };
        let raw = self.text.get(start..end)?;
        return Some(raw.trim_end_matches(['\n', '\r']));
    }

    /// Convert a byte offset into a position. Offsets past the end clamp
    /// to the document end.
    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = self.line_starts.partition_point(|start| return *start <= offset).saturating_sub(1);
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        return Position::new(
            u32::try_from(line).unwrap_or(u32::MAX),
            u32::try_from(offset.saturating_sub(line_start)).unwrap_or(u32::MAX),
        );
    }

    /// Convert a position into a byte offset, clamping to line and
    /// document bounds.
    pub fn offset_at(&self, position: Position) -> usize {
        let idx = usize::try_from(position.line).unwrap_or(usize::MAX);
        let Some(start) = self.line_starts.get(idx).copied() else {
            return self.text.len();
        };
        let line_end = match self.line_starts.get(idx.saturating_add(1)) {
            None => self.text.len(),
            Some(next) => *next,
        };
        let column = usize::try_from(position.character).unwrap_or(usize::MAX);
        return start.saturating_add(column).min(line_end);
    }

    /// Convert a byte span into a position range.
    pub fn range_of(&self, start: usize, end: usize) -> Range {
        return Range::new(self.position_at(start), self.position_at(end));
    }

    /// Full document text.
    pub fn text(&self) -> &str {
        return &self.text;
    }

    /// Workspace-relative identity.
    pub fn uri(&self) -> &DocUri {
        return &self.uri;
    }

    /// Snapshot version.
    pub fn version(&self) -> i32 {
        return self.version;
    }
}
