//! Markdown tokenization: the token model consumed by the engine and the
//! default tokenizer built on the split markdown grammar.
//!
//! Tokens are produced fresh per computation pass and carry source ranges
//! plus the raw attributes (target, title, label) the extractors need.
//! Any conforming [`Tokenizer`] can be injected in place of the default.

use async_trait::async_trait;
use tree_sitter::{Node, Parser};

use crate::document::Document;
use crate::error::Error;
use crate::types::Range;

/// One construct emitted by the tokenizer, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// An autolink such as `<https://example.com>`; the target range is
    /// the visible URI span inside the angle brackets.
    Autolink {
        /// Whole construct range including the angle brackets.
        range: Range,
        /// The URI as written.
        target: String,
        /// Range of the visible URI text.
        target_range: Range,
    },
    /// End of the heading opened by the matching `HeadingOpen`.
    HeadingClose {
        /// Heading level 1–6.
        level: u8,
    },
    /// Start of an ATX or setext heading.
    HeadingOpen {
        /// Heading level 1–6.
        level: u8,
        /// The heading's line range, excluding the line terminator. A
        /// setext heading covers its text and underline lines.
        range: Range,
    },
    /// An inline image `![alt](dest "title")`.
    Image {
        /// Whole construct range.
        range: Range,
        /// Destination as written.
        target: String,
        /// Range of the destination text.
        target_range: Range,
        /// Title without its quotes, when present.
        title: Option<String>,
    },
    /// An inline link `[text](dest "title")`.
    InlineLink {
        /// Whole construct range.
        range: Range,
        /// Destination as written.
        target: String,
        /// Range of the destination text.
        target_range: Range,
        /// Title without its quotes, when present.
        title: Option<String>,
    },
    /// A link reference definition `[label]: dest "title"`.
    RefDefinition {
        /// Label text without the surrounding brackets.
        label: String,
        /// Range of the label text.
        label_range: Range,
        /// Whole definition range, excluding the line terminator.
        range: Range,
        /// Destination as written.
        target: String,
        /// Range of the destination text.
        target_range: Range,
        /// Title without its quotes, when present.
        title: Option<String>,
    },
    /// A reference-style usage: `[text][label]`, `[label]`, or `[label][]`.
    RefLink {
        /// Label text without the surrounding brackets.
        label: String,
        /// Range of the label text.
        label_range: Range,
        /// Whole construct range.
        range: Range,
    },
    /// A plain text run of heading content, markup stripped. Entity
    /// references are kept raw for the consumer to decode.
    Text {
        /// The stripped text.
        content: String,
        /// Range of the originating inline content.
        range: Range,
    },
}

/// Capability for turning a document into an ordered token sequence.
/// Implementations may cache internally; the engine treats every call as
/// producing a fresh pass over the snapshot it was given.
#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Tokenize one document snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Tokenize` when the document cannot be processed;
    /// this is a collaborator contract violation, not an absence signal.
    async fn tokenize(&self, doc: &Document) -> Result<Vec<Token>, Error>;
}

/// Default tokenizer over the split markdown grammar: the block grammar
/// finds headings, definitions, and inline content; the inline grammar is
/// then run over each inline span via included ranges, so all byte
/// offsets stay document-absolute.
#[derive(Debug, Default)]
pub struct MarkdownTokenizer;

#[async_trait]
impl Tokenizer for MarkdownTokenizer {
    async fn tokenize(&self, doc: &Document) -> Result<Vec<Token>, Error> {
        return tokenize_document(doc);
    }
}

/// Synchronous tokenization pass shared by the trait impl and tests.
///
/// # Errors
///
/// Returns `Error::Tokenize` when either grammar fails to load or parse.
pub(crate) fn tokenize_document(doc: &Document) -> Result<Vec<Token>, Error> {
    let source = doc.text();

    let mut block_parser = Parser::new();
    block_parser
        .set_language(&tree_sitter_md::LANGUAGE.into())
        .map_err(|e| return tokenize_error(doc, &e.to_string()))?;
    let block_tree = block_parser
        .parse(source, None)
        .ok_or_else(|| return tokenize_error(doc, "block grammar returned no tree"))?;

    let mut inline_parser = Parser::new();
    inline_parser
        .set_language(&tree_sitter_md::INLINE_LANGUAGE.into())
        .map_err(|e| return tokenize_error(doc, &e.to_string()))?;

    let mut tokens = Vec::new();
    walk_block(block_tree.root_node(), doc, &mut inline_parser, &mut tokens)?;
    return Ok(tokens);
}

/// Build a tokenizer contract-violation error.
fn tokenize_error(doc: &Document, reason: &str) -> Error {
    return Error::Tokenize {
        reason: reason.to_string(),
        uri: doc.uri().clone(),
    };
}

/// Recursive walk over the block tree, dispatching on node kind.
fn walk_block(
    node: Node<'_>,
    doc: &Document,
    inline_parser: &mut Parser,
    tokens: &mut Vec<Token>,
) -> Result<(), Error> {
    match node.kind() {
        "atx_heading" => {
            let level = atx_level(node).unwrap_or(1);
            emit_heading(node, level, child_of_kind(node, "inline"), doc, inline_parser, tokens)?;
        },
        "setext_heading" => {
            let level = if child_of_kind(node, "setext_h1_underline").is_some() { 1 } else { 2 };
            let inline = child_of_kind(node, "paragraph")
                .and_then(|p| return child_of_kind(p, "inline"))
                .or_else(|| return child_of_kind(node, "inline"));
            emit_heading(node, level, inline, doc, inline_parser, tokens)?;
        },
        "link_reference_definition" => emit_definition(node, doc, tokens),
        "inline" => emit_inline_links(node, doc, inline_parser, tokens)?,
        _ => {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            for child in children {
                walk_block(child, doc, inline_parser, tokens)?;
            }
        },
    }
    return Ok(());
}

/// Heading level from an ATX marker child, `None` for malformed nodes.
fn atx_level(heading: Node<'_>) -> Option<u8> {
    let mut cursor = heading.walk();
    let children: Vec<Node<'_>> = heading.children(&mut cursor).collect();
    for child in children {
        let level = match child.kind() {
            "atx_h1_marker" => 1,
            "atx_h2_marker" => 2,
            "atx_h3_marker" => 3,
            "atx_h4_marker" => 4,
            "atx_h5_marker" => 5,
            "atx_h6_marker" => 6,
            _ => continue,
        };
        return Some(level);
    }
    return None;
}

/// Emit open, stripped text, contained links, and close for one heading.
fn emit_heading(
    heading: Node<'_>,
    level: u8,
    inline: Option<Node<'_>>,
    doc: &Document,
    inline_parser: &mut Parser,
    tokens: &mut Vec<Token>,
) -> Result<(), Error> {
    let (start, end) = trimmed_span(heading, doc.text());
    tokens.push(Token::HeadingOpen { level, range: doc.range_of(start, end) });

    if let Some(inline) = inline {
        let inline_tree = parse_inline(inline, doc, inline_parser)?;
        let root = inline_tree.root_node();
        let mut content = String::new();
        collect_plain_text(root, doc.text(), &mut content);
        tokens.push(Token::Text {
            content,
            range: doc.range_of(inline.start_byte(), inline.end_byte()),
        });
        collect_links(root, doc, tokens);
    }

    tokens.push(Token::HeadingClose { level });
    return Ok(());
}

/// Emit a `RefDefinition` token for a block-level definition node.
fn emit_definition(node: Node<'_>, doc: &Document, tokens: &mut Vec<Token>) {
    let Some(label) = child_of_kind(node, "link_label") else {
        return;
    };
    let Some(destination) = child_of_kind(node, "link_destination") else {
        return;
    };
    let (label_start, label_end) = inner_span(label);
    let (dest_start, dest_end) = destination_span(destination, doc.text());
    let (start, end) = trimmed_span(node, doc.text());

    tokens.push(Token::RefDefinition {
        label: span_text(doc.text(), label_start, label_end).to_string(),
        label_range: doc.range_of(label_start, label_end),
        range: doc.range_of(start, end),
        target: span_text(doc.text(), dest_start, dest_end).to_string(),
        target_range: doc.range_of(dest_start, dest_end),
        title: child_of_kind(node, "link_title").map(|t| return title_text(t, doc.text())),
    });
}

/// Parse one block-level inline span with the inline grammar, keeping all
/// byte offsets document-absolute via an included range.
fn parse_inline(
    inline: Node<'_>,
    doc: &Document,
    inline_parser: &mut Parser,
) -> Result<tree_sitter::Tree, Error> {
    inline_parser
        .set_included_ranges(&[inline.range()])
        .map_err(|e| return tokenize_error(doc, &format!("included ranges: {e:?}")))?;
    return inline_parser
        .parse(doc.text(), None)
        .ok_or_else(|| return tokenize_error(doc, "inline grammar returned no tree"));
}

/// Parse an inline span and emit only its link constructs.
fn emit_inline_links(
    inline: Node<'_>,
    doc: &Document,
    inline_parser: &mut Parser,
    tokens: &mut Vec<Token>,
) -> Result<(), Error> {
    let inline_tree = parse_inline(inline, doc, inline_parser)?;
    collect_links(inline_tree.root_node(), doc, tokens);
    return Ok(());
}

/// Recursive walk over an inline tree collecting link-like constructs.
fn collect_links(node: Node<'_>, doc: &Document, tokens: &mut Vec<Token>) {
    let source = doc.text();
    match node.kind() {
        "inline_link" | "image" => {
            let Some(destination) = child_of_kind(node, "link_destination") else {
                return;
            };
            let (dest_start, dest_end) = destination_span(destination, source);
            let range = doc.range_of(node.start_byte(), node.end_byte());
            let target = span_text(source, dest_start, dest_end).to_string();
            let target_range = doc.range_of(dest_start, dest_end);
            let title = child_of_kind(node, "link_title").map(|t| return title_text(t, source));
            if node.kind() == "image" {
                tokens.push(Token::Image { range, target, target_range, title });
            } else {
                tokens.push(Token::InlineLink { range, target, target_range, title });
            }
        },
        "full_reference_link" => {
            if let Some(label) = child_of_kind(node, "link_label") {
                push_ref_link(node, label, doc, tokens);
            }
        },
        "collapsed_reference_link" | "shortcut_link" => {
            if let Some(label) = child_of_kind(node, "link_text") {
                push_ref_link(node, label, doc, tokens);
            }
        },
        "uri_autolink" | "email_autolink" => {
            let (start, end) = inner_span(node);
            tokens.push(Token::Autolink {
                range: doc.range_of(node.start_byte(), node.end_byte()),
                target: span_text(source, start, end).to_string(),
                target_range: doc.range_of(start, end),
            });
        },
        _ => {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            for child in children {
                collect_links(child, doc, tokens);
            }
        },
    }
}

/// Emit a reference usage token from its bracketed label node.
fn push_ref_link(node: Node<'_>, label: Node<'_>, doc: &Document, tokens: &mut Vec<Token>) {
    let (label_start, label_end) = inner_span(label);
    tokens.push(Token::RefLink {
        label: span_text(doc.text(), label_start, label_end).to_string(),
        label_range: doc.range_of(label_start, label_end),
        range: doc.range_of(node.start_byte(), node.end_byte()),
    });
}

/// First named child of the given kind.
fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    return node.named_children(&mut cursor).find(|c| return c.kind() == kind);
}

/// Node byte span minus one leading and one trailing delimiter character.
fn inner_span(node: Node<'_>) -> (usize, usize) {
    let start = node.start_byte().saturating_add(1);
    let end = node.end_byte().saturating_sub(1);
    return (start, end.max(start));
}

/// Destination byte span, unwrapping the `<...>` form when present.
fn destination_span(node: Node<'_>, source: &str) -> (usize, usize) {
    let text = span_text(source, node.start_byte(), node.end_byte());
    if text.starts_with('<') && text.ends_with('>') && text.len() >= 2 {
        return inner_span(node);
    }
    return (node.start_byte(), node.end_byte());
}

/// Title node content without the surrounding quote characters.
fn title_text(node: Node<'_>, source: &str) -> String {
    let (start, end) = inner_span(node);
    return span_text(source, start, end).to_string();
}

/// Source text for a byte span, empty when out of bounds.
fn span_text(source: &str, start: usize, end: usize) -> &str {
    return source.get(start..end).unwrap_or("");
}

/// Collect the visible text of an inline subtree, dropping markup
/// delimiters and link machinery. Gaps between named children are literal
/// text in the inline grammar, so the walk stitches gaps and recursions.
fn collect_plain_text(node: Node<'_>, source: &str, out: &mut String) {
    match node.kind() {
        "emphasis_delimiter" | "code_span_delimiter" | "html_tag" => return,
        "backslash_escape" => {
            let text = span_text(source, node.start_byte(), node.end_byte());
            out.push_str(text.strip_prefix('\\').unwrap_or(text));
            return;
        },
        "inline_link" | "full_reference_link" | "collapsed_reference_link" | "shortcut_link" => {
            if let Some(text_node) = child_of_kind(node, "link_text") {
                let (start, end) = inner_span(text_node);
                collect_span_text(text_node, source, start, end, out);
            }
            return;
        },
        "image" => {
            if let Some(alt) = child_of_kind(node, "image_description") {
                let (start, end) = inner_span(alt);
                collect_span_text(alt, source, start, end, out);
            }
            return;
        },
        "uri_autolink" | "email_autolink" => {
            let (start, end) = inner_span(node);
            out.push_str(span_text(source, start, end));
            return;
        },
        _ => {},
    }
    collect_span_text(node, source, node.start_byte(), node.end_byte(), out);
}

/// Gap-and-recursion text walk over one node clamped to a byte span.
fn collect_span_text(node: Node<'_>, source: &str, span_start: usize, span_end: usize, out: &mut String) {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    let mut pos = span_start;
    for child in children {
        let child_start = child.start_byte().clamp(span_start, span_end);
        let child_end = child.end_byte().clamp(span_start, span_end);
        if child_start > pos {
            out.push_str(span_text(source, pos, child_start));
        }
        collect_plain_text(child, source, out);
        pos = pos.max(child_end);
    }
    if span_end > pos {
        out.push_str(span_text(source, pos, span_end));
    }
}

/// Trim trailing line terminators from a block node's byte span.
fn trimmed_span(node: Node<'_>, source: &str) -> (usize, usize) {
    let start = node.start_byte();
    let mut end = node.end_byte().min(source.len());
    while end > start && matches!(source.as_bytes().get(end.saturating_sub(1)), Some(b'\n' | b'\r')) {
        end = end.saturating_sub(1);
    }
    return (start, end);
}
