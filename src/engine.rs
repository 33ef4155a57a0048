//! The engine facade: capability wiring and the produced surface.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cache::{DocumentCache, WorkspaceCache};
use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::Error;
use crate::highlights::{resolve_highlights, Highlight};
use crate::links::{extract_links, LinkRecord, LinkResolver};
use crate::slug::{GithubSlugifier, Slugifier};
use crate::toc::TableOfContents;
use crate::tokenize::{MarkdownTokenizer, Tokenizer};
use crate::types::{DocUri, Position};
use crate::workspace::Workspace;

/// Cached per-document outline.
pub type TocValue = Arc<TableOfContents>;
/// Cached per-document extraction output.
pub type LinksValue = Arc<Vec<LinkRecord>>;
/// Aggregate of every document's outline, ordered by URI.
pub type WorkspaceTocs = Arc<Vec<(DocUri, Arc<TableOfContents>)>>;

/// Incremental analysis over a workspace of markdown documents.
///
/// The engine owns two per-document caches (outline and link extraction)
/// and one workspace-wide aggregate, all invalidated by workspace
/// lifecycle events. Tokenizer and slugifier are injected capabilities;
/// any conforming implementation can be substituted at construction.
pub struct Engine {
    config: Arc<EngineConfig>,
    link_cache: Arc<DocumentCache<LinksValue>>,
    resolver: LinkResolver,
    slugifier: Arc<dyn Slugifier>,
    toc_cache: Arc<DocumentCache<TocValue>>,
    workspace_toc_cache: Arc<WorkspaceCache<WorkspaceTocs>>,
}

impl Engine {
    /// An engine with the default tokenizer and slugifier.
    pub fn new(workspace: Arc<dyn Workspace>, config: EngineConfig) -> Self {
        return Self::with_capabilities(
            workspace,
            Arc::new(MarkdownTokenizer),
            Arc::new(GithubSlugifier),
            Arc::new(config),
        );
    }

    /// An engine with explicit capability implementations.
    pub fn with_capabilities(
        workspace: Arc<dyn Workspace>,
        tokenizer: Arc<dyn Tokenizer>,
        slugifier: Arc<dyn Slugifier>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let toc_cache = DocumentCache::new(Arc::clone(&workspace), {
            let tokenizer = Arc::clone(&tokenizer);
            let slugifier = Arc::clone(&slugifier);
            Box::new(move |doc, token| {
                let tokenizer = Arc::clone(&tokenizer);
                let slugifier = Arc::clone(&slugifier);
                return Box::pin(async move {
                    let tokens = tokenizer.tokenize(&doc).await?;
                    if token.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    return Ok(Arc::new(TableOfContents::build(&doc, &tokens, slugifier.as_ref())));
                });
            })
        });

        let link_cache = DocumentCache::new(Arc::clone(&workspace), {
            let tokenizer = Arc::clone(&tokenizer);
            let slugifier = Arc::clone(&slugifier);
            let toc_cache = Arc::clone(&toc_cache);
            Box::new(move |doc, token| {
                let tokenizer = Arc::clone(&tokenizer);
                let slugifier = Arc::clone(&slugifier);
                let toc_cache = Arc::clone(&toc_cache);
                return Box::pin(async move {
                    let toc = toc_cache.get_for_document(&doc, &token).await?;
                    let tokens = tokenizer.tokenize(&doc).await?;
                    if token.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    return Ok(Arc::new(extract_links(
                        &doc,
                        &tokens,
                        toc.as_ref(),
                        slugifier.as_ref(),
                    )));
                });
            })
        });

        let workspace_toc_cache = WorkspaceCache::new(Arc::clone(&workspace), {
            let toc_cache = Arc::clone(&toc_cache);
            Box::new(move |mut docs, token| {
                let toc_cache = Arc::clone(&toc_cache);
                return Box::pin(async move {
                    docs.sort_by(|a, b| return a.uri().cmp(b.uri()));
                    let mut tocs = Vec::with_capacity(docs.len());
                    for doc in docs {
                        if token.is_cancelled() {
                            return Err(Error::Cancelled);
                        }
                        let toc = toc_cache.get_for_document(&doc, &token).await?;
                        tocs.push((doc.uri().clone(), toc));
                    }
                    return Ok(Arc::new(tocs));
                });
            })
        });

        let resolver = LinkResolver::new(
            Arc::clone(&config),
            Arc::clone(&slugifier),
            Arc::clone(&toc_cache),
            workspace,
        );

        return Self {
            config,
            link_cache,
            resolver,
            slugifier,
            toc_cache,
            workspace_toc_cache,
        };
    }

    /// The engine's immutable configuration.
    pub fn config(&self) -> &EngineConfig {
        return &self.config;
    }

    /// The ordered outline of one document snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` when the token fires, or a tokenizer
    /// contract violation.
    pub async fn table_of_contents(
        &self,
        doc: &Arc<Document>,
        token: &CancellationToken,
    ) -> Result<TocValue, Error> {
        return self.toc_cache.get_for_document(doc, token).await;
    }

    /// The outline for a URI, loading the document through the workspace.
    /// `None` when the document does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` when the token fires, or a tokenizer
    /// contract violation.
    pub async fn table_of_contents_for(
        &self,
        uri: &DocUri,
        token: &CancellationToken,
    ) -> Result<Option<TocValue>, Error> {
        return self.toc_cache.get(uri, token).await;
    }

    /// The ordered, fully-resolved link records of one document snapshot.
    /// Extraction is served from the cache; cross-file validation runs
    /// per call against the target documents' own cached outlines, so
    /// edits to a linked-to file are observed immediately.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` when the token fires, or a tokenizer
    /// contract violation.
    pub async fn links(
        &self,
        doc: &Arc<Document>,
        token: &CancellationToken,
    ) -> Result<Vec<LinkRecord>, Error> {
        let cached = self.link_cache.get_for_document(doc, token).await?;
        return self.resolver.resolve(cached.as_ref(), token).await;
    }

    /// Every range in the document referring to the same logical entity
    /// as the one under the cursor, in document order with access tags.
    /// Empty when nothing relevant sits under the cursor.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` when the token fires, or a tokenizer
    /// contract violation.
    pub async fn highlights(
        &self,
        doc: &Arc<Document>,
        position: Position,
        token: &CancellationToken,
    ) -> Result<Vec<Highlight>, Error> {
        let toc = self.toc_cache.get_for_document(doc, token).await?;
        let links = self.links(doc, token).await?;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        return Ok(resolve_highlights(
            doc.uri(),
            &toc,
            &links,
            position,
            self.slugifier.as_ref(),
        ));
    }

    /// Every document's outline, ordered by URI. Recomputed from the
    /// whole corpus after any workspace event; per-document outlines are
    /// still served from their own cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` when the token fires, or a tokenizer
    /// contract violation.
    pub async fn workspace_tocs(&self, token: &CancellationToken) -> Result<WorkspaceTocs, Error> {
        return self.workspace_toc_cache.get(token).await;
    }
}
