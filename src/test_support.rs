//! In-memory workspace for tests and examples.
//!
//! Mirrors the lifecycle contract of a real editor workspace: documents
//! are versioned snapshots, and every mutation fires the matching event
//! synchronously before the call returns.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::document::Document;
use crate::types::DocUri;
use crate::workspace::{FileStat, Listener, Subscription, Workspace};

/// Identifies which lifecycle event a listener table serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Changed,
    Created,
    Deleted,
}

/// Listener table shared with `Subscription` guards for unregistration.
type ListenerTable = Arc<Mutex<HashMap<u64, Listener>>>;

/// A workspace holding markdown documents in memory, plus bare paths that
/// only exist for `stat` (images and other linked-to assets).
pub struct InMemoryWorkspace {
    changed: ListenerTable,
    created: ListenerTable,
    deleted: ListenerTable,
    docs: Mutex<BTreeMap<DocUri, Arc<Document>>>,
    files: Mutex<BTreeSet<DocUri>>,
    next_listener_id: AtomicU64,
    versions: Mutex<HashMap<DocUri, i32>>,
}

impl InMemoryWorkspace {
    /// An empty workspace.
    pub fn new() -> Arc<Self> {
        return Arc::new(Self {
            changed: Arc::new(Mutex::new(HashMap::new())),
            created: Arc::new(Mutex::new(HashMap::new())),
            deleted: Arc::new(Mutex::new(HashMap::new())),
            docs: Mutex::new(BTreeMap::new()),
            files: Mutex::new(BTreeSet::new()),
            next_listener_id: AtomicU64::new(0),
            versions: Mutex::new(HashMap::new()),
        });
    }

    /// Insert or replace a document. New URIs start at version 0 and fire
    /// the created event; replacements bump the version and fire changed.
    pub fn upsert(&self, uri: &str, text: &str) -> Arc<Document> {
        let uri = DocUri::new(uri);
        let (doc, kind) = {
            let mut versions = self.versions.lock();
            let mut docs = self.docs.lock();
            let existed = docs.contains_key(&uri);
            let version = versions
                .entry(uri.clone())
                .and_modify(|v| *v = v.saturating_add(1))
                .or_insert(0);
            let doc = Document::new(uri.clone(), *version, text.to_string());
            docs.insert(uri.clone(), doc.clone());
            let kind = if existed { EventKind::Changed } else { EventKind::Created };
            (doc, kind)
        };
        self.fire(kind, &uri);
        return doc;
    }

    /// Remove a document and fire the deleted event. No-op for unknown
    /// URIs so teardown code can call it unconditionally.
    pub fn remove(&self, uri: &str) {
        let uri = DocUri::new(uri);
        let existed = self.docs.lock().remove(&uri).is_some();
        if existed {
            self.fire(EventKind::Deleted, &uri);
        }
    }

    /// Make a non-markdown path visible to `stat` only, the way images
    /// and other linked-to assets are in a real workspace.
    pub fn touch_file(&self, uri: &str) {
        self.files.lock().insert(DocUri::new(uri));
    }

    /// Invoke every listener registered for the event kind.
    fn fire(&self, kind: EventKind, uri: &DocUri) {
        let table = match kind {
            EventKind::Changed => &self.changed,
            EventKind::Created => &self.created,
            EventKind::Deleted => &self.deleted,
        };
        let listeners: Vec<Listener> = table.lock().values().cloned().collect();
        for listener in listeners {
            listener(uri);
        }
    }

    /// Register a listener in a table, returning its unregistration guard.
    fn register(&self, table: &ListenerTable, listener: Listener) -> Subscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        table.lock().insert(id, listener);
        let table = Arc::clone(table);
        return Subscription::new(move || {
            table.lock().remove(&id);
        });
    }
}

#[async_trait]
impl Workspace for InMemoryWorkspace {
    async fn all_markdown_documents(&self) -> Vec<Arc<Document>> {
        return self.docs.lock().values().cloned().collect();
    }

    async fn get_or_load_markdown_document(&self, uri: &DocUri) -> Option<Arc<Document>> {
        return self.docs.lock().get(uri).cloned();
    }

    async fn has_markdown_document(&self, uri: &DocUri) -> bool {
        return self.docs.lock().contains_key(uri);
    }

    fn on_did_change_markdown_document(&self, listener: Listener) -> Subscription {
        return self.register(&self.changed, listener);
    }

    fn on_did_create_markdown_document(&self, listener: Listener) -> Subscription {
        return self.register(&self.created, listener);
    }

    fn on_did_delete_markdown_document(&self, listener: Listener) -> Subscription {
        return self.register(&self.deleted, listener);
    }

    async fn stat(&self, uri: &DocUri) -> Option<FileStat> {
        if self.docs.lock().contains_key(uri) || self.files.lock().contains(uri) {
            return Some(FileStat { is_directory: false });
        }
        return None;
    }

    fn workspace_folders(&self) -> Vec<DocUri> {
        return vec![DocUri::new("")];
    }
}
