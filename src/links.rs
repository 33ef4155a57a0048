//! Link extraction, label joining, and target resolution.
//!
//! Extraction and same-document classification are pure functions of one
//! snapshot, so their output is cached per (URI, version). Cross-file
//! checks (existence, target fragments) run per request through the
//! target's own independently-cached outline, so edits to a linked-to
//! file are observed without invalidating the linking document.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::DocumentCache;
use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::Error;
use crate::slug::Slugifier;
use crate::toc::TableOfContents;
use crate::tokenize::Token;
use crate::types::{DocUri, Range};
use crate::workspace::Workspace;

/// Resolved classification of a link target. Unresolvable targets are a
/// classification value, never an error; whether to warn on them is a
/// downstream concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A workspace path, confirmed to exist or exempt from validation.
    ExternalPath,
    /// An absolute URI with a scheme; never further validated.
    ExternalUri,
    /// A fragment addressing a heading of the owning document.
    InternalFragment,
    /// Malformed, missing, or failing validation.
    Unresolved,
}

/// The construct a record was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// `<https://example.com>` with the visible span as target.
    Autolink,
    /// `![alt](dest)`.
    Image,
    /// `[text](dest)`.
    Inline,
    /// `[label]: dest`.
    ReferenceDefinition,
    /// `[text][label]`, `[label]`, or `[label][]`.
    ReferenceUsage,
}

/// Structural target parsed from a raw destination string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Absolute URI, kept as written.
    External {
        /// The URI text.
        uri: String,
    },
    /// `#fragment` into the owning document.
    Fragment {
        /// Fragment text without the leading `#`.
        fragment: String,
    },
    /// A path, normalized against the owning document's location, with
    /// an optional trailing fragment into the target document.
    Path {
        /// Fragment text without the `#`, when present.
        fragment: Option<String>,
        /// Normalized workspace-relative path. Resolution replaces this
        /// with the confirmed path when an omitted extension is inferred.
        path: DocUri,
    },
}

/// One link-like construct, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    /// Resolved classification; provisional `ExternalPath` records are
    /// finalized by [`LinkResolver::resolve`].
    pub classification: Classification,
    /// For usages, index of the authoritative definition record.
    pub definition: Option<usize>,
    /// Sub-range of the fragment text, when the target carries one.
    pub fragment_range: Option<Range>,
    /// Construct kind.
    pub kind: LinkKind,
    /// Normalized label for reference kinds.
    pub label: Option<String>,
    /// Range of the label text for reference kinds.
    pub label_range: Option<Range>,
    /// Sub-range of the path portion, when the target is a path with a
    /// fragment. Equal to `target_range` for fragment-less paths.
    pub path_range: Option<Range>,
    /// Whole-construct range.
    pub range: Range,
    /// The destination exactly as written, absent for usages.
    pub raw_target: Option<String>,
    /// Parsed structural target, absent for usages.
    pub target: Option<LinkTarget>,
    /// Range of the destination text, absent for usages.
    pub target_range: Option<Range>,
}

/// Walk a token stream and produce the ordered record sequence, joining
/// reference usages to their definitions. The first definition of a label
/// in document order is authoritative; later duplicates are kept as
/// records but never joined.
pub fn extract_links(
    doc: &Document,
    tokens: &[Token],
    own_toc: &TableOfContents,
    slugifier: &dyn Slugifier,
) -> Vec<LinkRecord> {
    let mut records = Vec::new();

    for token in tokens {
        match token {
            Token::InlineLink { range, target, target_range, .. } => {
                records.push(targeted_record(
                    LinkKind::Inline,
                    *range,
                    target,
                    *target_range,
                    doc,
                    own_toc,
                    slugifier,
                ));
            },
            Token::Image { range, target, target_range, .. } => {
                records.push(targeted_record(
                    LinkKind::Image,
                    *range,
                    target,
                    *target_range,
                    doc,
                    own_toc,
                    slugifier,
                ));
            },
            Token::Autolink { range, target, target_range } => {
                records.push(LinkRecord {
                    classification: Classification::ExternalUri,
                    definition: None,
                    fragment_range: None,
                    kind: LinkKind::Autolink,
                    label: None,
                    label_range: None,
                    path_range: None,
                    range: *range,
                    raw_target: Some(target.clone()),
                    target: Some(LinkTarget::External { uri: target.clone() }),
                    target_range: Some(*target_range),
                });
            },
            Token::RefDefinition { label, label_range, range, target, target_range, .. } => {
                let mut record = targeted_record(
                    LinkKind::ReferenceDefinition,
                    *range,
                    target,
                    *target_range,
                    doc,
                    own_toc,
                    slugifier,
                );
                record.label = Some(normalize_label(label));
                record.label_range = Some(*label_range);
                records.push(record);
            },
            Token::RefLink { label, label_range, range } => {
                records.push(LinkRecord {
                    classification: Classification::Unresolved,
                    definition: None,
                    fragment_range: None,
                    kind: LinkKind::ReferenceUsage,
                    label: Some(normalize_label(label)),
                    label_range: Some(*label_range),
                    path_range: None,
                    range: *range,
                    raw_target: None,
                    target: None,
                    target_range: None,
                });
            },
            Token::HeadingOpen { .. } | Token::HeadingClose { .. } | Token::Text { .. } => {},
        }
    }

    join_usages_to_definitions(&mut records);
    return records;
}

/// Build a record for a construct that carries its own destination.
fn targeted_record(
    kind: LinkKind,
    range: Range,
    raw_target: &str,
    target_range: Range,
    doc: &Document,
    own_toc: &TableOfContents,
    slugifier: &dyn Slugifier,
) -> LinkRecord {
    let mut record = LinkRecord {
        classification: Classification::Unresolved,
        definition: None,
        fragment_range: None,
        kind,
        label: None,
        label_range: None,
        path_range: None,
        range,
        raw_target: Some(raw_target.to_string()),
        target: None,
        target_range: Some(target_range),
    };

    if raw_target.is_empty() {
        return record;
    }

    if has_scheme(raw_target) {
        record.classification = Classification::ExternalUri;
        record.target = Some(LinkTarget::External { uri: raw_target.to_string() });
        return record;
    }

    let target_start = doc.offset_at(target_range.start);
    let target_end = doc.offset_at(target_range.end);

    if let Some(fragment) = raw_target.strip_prefix('#') {
        record.fragment_range = Some(doc.range_of(target_start.saturating_add(1), target_end));
        record.classification = if own_toc.lookup(fragment, slugifier).is_some() {
            Classification::InternalFragment
        } else {
            Classification::Unresolved
        };
        record.target = Some(LinkTarget::Fragment { fragment: fragment.to_string() });
        return record;
    }

    record.classification = Classification::ExternalPath;
    match raw_target.split_once('#') {
        None => {
            record.path_range = Some(target_range);
            record.target = Some(LinkTarget::Path {
                fragment: None,
                path: doc.uri().resolve(raw_target),
            });
        },
        Some((path_part, fragment)) => {
            let path_end = target_start.saturating_add(path_part.len());
            record.path_range = Some(doc.range_of(target_start, path_end));
            record.fragment_range = Some(doc.range_of(path_end.saturating_add(1), target_end));
            record.target = Some(LinkTarget::Path {
                fragment: Some(fragment.to_string()),
                path: doc.uri().resolve(path_part),
            });
        },
    }
    return record;
}

/// Point every usage at the first definition sharing its label and adopt
/// that definition's classification.
fn join_usages_to_definitions(records: &mut [LinkRecord]) {
    let mut first_by_label: HashMap<String, usize> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        if record.kind == LinkKind::ReferenceDefinition
            && let Some(label) = &record.label
        {
            first_by_label.entry(label.clone()).or_insert(idx);
        }
    }

    for idx in 0..records.len() {
        let Some(record) = records.get(idx) else {
            continue;
        };
        if record.kind != LinkKind::ReferenceUsage {
            continue;
        }
        let joined = record
            .label
            .as_ref()
            .and_then(|label| return first_by_label.get(label).copied());
        let classification =
            joined.and_then(|def| return records.get(def).map(|r| return r.classification));
        if let Some(record) = records.get_mut(idx) {
            record.definition = joined;
            if let Some(classification) = classification {
                record.classification = classification;
            }
        }
    }
}

/// Case-insensitive, whitespace-collapsed label key. The first definition
/// in document order is authoritative for each key.
pub fn normalize_label(label: &str) -> String {
    return label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
}

/// Whether the target starts with an absolute URI scheme, per the generic
/// `scheme:` syntax: an ASCII letter, then letters, digits, `+`, `-` or
/// `.`, terminated by `:` before any slash.
fn has_scheme(target: &str) -> bool {
    let Some(colon) = target.find(':') else {
        return false;
    };
    let Some(prefix) = target.get(..colon) else {
        return false;
    };
    if prefix.is_empty() || prefix.contains('/') {
        return false;
    }
    let mut chars = prefix.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    return first.is_ascii_alphabetic()
        && chars.all(|c| return c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
}

/// On-demand validation of provisional path targets: existence with
/// extension inference, excluded-glob exemption, and fragment checks
/// against the target document's cached outline.
pub struct LinkResolver {
    config: Arc<EngineConfig>,
    slugifier: Arc<dyn Slugifier>,
    toc_cache: Arc<DocumentCache<Arc<TableOfContents>>>,
    workspace: Arc<dyn Workspace>,
}

impl LinkResolver {
    /// Wire the resolver to its collaborators.
    pub fn new(
        config: Arc<EngineConfig>,
        slugifier: Arc<dyn Slugifier>,
        toc_cache: Arc<DocumentCache<Arc<TableOfContents>>>,
        workspace: Arc<dyn Workspace>,
    ) -> Self {
        return Self { config, slugifier, toc_cache, workspace };
    }

    /// Validate a cached record sequence against the current workspace,
    /// returning finalized records. Checks cancellation between records.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` when the token fires mid-scan. Absence
    /// of targets is classification, never an error.
    pub async fn resolve(
        &self,
        records: &[LinkRecord],
        token: &CancellationToken,
    ) -> Result<Vec<LinkRecord>, Error> {
        let mut out: Vec<LinkRecord> = records.to_vec();

        for record in &mut out {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if record.kind == LinkKind::ReferenceUsage {
                continue;
            }
            let Some(LinkTarget::Path { fragment, path }) = record.target.clone() else {
                continue;
            };
            if self.config.is_excluded(&path) {
                continue;
            }

            match self.resolve_path(&path).await {
                None => {
                    debug!(path = %path, "link target not found");
                    record.classification = Classification::Unresolved;
                },
                Some(resolved) => {
                    record.classification =
                        if self.fragment_resolves(&resolved, fragment.as_deref(), token).await? {
                            Classification::ExternalPath
                        } else {
                            Classification::Unresolved
                        };
                    record.target = Some(LinkTarget::Path { fragment, path: resolved });
                },
            }
        }

        rejoin_usages(&mut out);
        return Ok(out);
    }

    /// Check a trailing fragment against the target document's outline.
    /// Fragments into non-markdown targets are not validated.
    async fn fragment_resolves(
        &self,
        resolved: &DocUri,
        fragment: Option<&str>,
        token: &CancellationToken,
    ) -> Result<bool, Error> {
        let Some(fragment) = fragment else {
            return Ok(true);
        };
        let is_markdown = resolved
            .extension()
            .is_some_and(|ext| return self.config.is_markdown_extension(ext));
        if !is_markdown {
            return Ok(true);
        }
        return match self.toc_cache.get(resolved, token).await? {
            None => Ok(false),
            Some(toc) => Ok(toc.lookup(fragment, self.slugifier.as_ref()).is_some()),
        };
    }

    /// Confirm a path's existence. Extension-less paths try each
    /// configured markdown extension in order and take the first that
    /// exists; recognized extensions are stat-checked as written; paths
    /// with unrecognized extensions are exempt from validation.
    async fn resolve_path(&self, path: &DocUri) -> Option<DocUri> {
        return match path.extension() {
            Some(ext)
                if self.config.is_markdown_extension(ext)
                    || self.config.is_linked_file_extension(ext) =>
            {
                if self.workspace.stat(path).await.is_some() {
                    Some(path.clone())
                } else {
                    None
                }
            },
            Some(_) => Some(path.clone()),
            None => {
                for ext in self.config.markdown_extensions() {
                    let candidate = path.with_appended_extension(ext);
                    if self.workspace.stat(&candidate).await.is_some() {
                        return Some(candidate);
                    }
                }
                None
            },
        };
    }
}

/// Re-derive usage classifications after their definitions were
/// finalized by validation.
fn rejoin_usages(records: &mut [LinkRecord]) {
    let updates: Vec<(usize, Classification)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| return r.kind == LinkKind::ReferenceUsage)
        .filter_map(|(idx, r)| {
            let def = r.definition?;
            return records.get(def).map(|d| return (idx, d.classification));
        })
        .collect();
    for (idx, classification) in updates {
        if let Some(record) = records.get_mut(idx) {
            record.classification = classification;
        }
    }
}
