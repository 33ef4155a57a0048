//! The workspace capability consumed by the engine.
//!
//! The engine never owns document storage or file watching; an embedder
//! supplies an implementation of [`Workspace`] and the engine reacts to
//! its lifecycle events through registered listeners.

use std::sync::Arc;

use async_trait::async_trait;

use crate::document::Document;
use crate::types::DocUri;

/// Callback invoked with the URI a lifecycle event concerns.
pub type Listener = Arc<dyn Fn(&DocUri) + Send + Sync>;

/// Minimal existence metadata from the workspace's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Whether the path names a directory rather than a file.
    pub is_directory: bool,
}

/// Scoped registration of a workspace event listener. Dropping the guard
/// releases the listener, so a cache that subscribes at construction
/// unsubscribes on every exit path.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a release action to run exactly once on drop.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        return Self { release: Some(Box::new(release)) };
    }

    /// A subscription with nothing to release, for workspaces that do not
    /// emit events.
    pub fn noop() -> Self {
        return Self { release: None };
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish();
    }
}

/// The document store and lifecycle event source the engine analyses.
/// All lookup operations are asynchronous because implementations may
/// reach storage; absence is reported as `None`, never as an error.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Every markdown document currently in the workspace, in no
    /// particular order.
    async fn all_markdown_documents(&self) -> Vec<Arc<Document>>;

    /// The current snapshot for a URI, loading it from storage if it is
    /// not yet open. `None` when the document does not exist.
    async fn get_or_load_markdown_document(&self, uri: &DocUri) -> Option<Arc<Document>>;

    /// Whether a markdown document exists at the URI without loading it.
    async fn has_markdown_document(&self, uri: &DocUri) -> bool;

    /// Register a listener for content changes to an existing document.
    fn on_did_change_markdown_document(&self, listener: Listener) -> Subscription;

    /// Register a listener for newly created documents.
    fn on_did_create_markdown_document(&self, listener: Listener) -> Subscription;

    /// Register a listener for deleted documents.
    fn on_did_delete_markdown_document(&self, listener: Listener) -> Subscription;

    /// Existence metadata for any path the workspace can see, markdown or
    /// not. `None` when nothing exists at the URI.
    async fn stat(&self, uri: &DocUri) -> Option<FileStat>;

    /// Ordered root folders of the workspace.
    fn workspace_folders(&self) -> Vec<DocUri>;
}
