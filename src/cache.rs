//! Version-checked memoization of document-derived values.
//!
//! Freshness is (URI, version) equality: a stored value is served only
//! while its version matches the document's current version; any mismatch
//! forces recomputation, never stale reuse. Concurrent requests for one
//! key coalesce onto a single in-flight computation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::document::Document;
use crate::error::Error;
use crate::types::DocUri;
use crate::workspace::{Subscription, Workspace};

/// Boxed future produced by cache compute functions.
pub type ComputeFuture<T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send>>;

/// How a per-document value is derived from one snapshot.
pub type ComputeFn<T> =
    dyn Fn(Arc<Document>, CancellationToken) -> ComputeFuture<T> + Send + Sync;

/// How a workspace-wide value is derived from every document.
pub type AggregateFn<T> =
    dyn Fn(Vec<Arc<Document>>, CancellationToken) -> ComputeFuture<T> + Send + Sync;

/// One cache slot. The cell is installed before its computation settles,
/// so every concurrent waiter observes and awaits the same outcome; a
/// cancelled computation leaves the cell empty for the next caller to
/// retry, never holding a half-built value.
struct CacheEntry<T> {
    cell: Arc<OnceCell<T>>,
    version: i32,
}

/// Generic memoization of a value derived from a document, keyed by
/// (URI, version) and invalidated by workspace lifecycle events. Shared
/// by the outline cache and the link cache rather than duplicated.
pub struct DocumentCache<T> {
    compute: Box<ComputeFn<T>>,
    entries: Mutex<HashMap<DocUri, CacheEntry<T>>>,
    subscriptions: Mutex<Vec<Subscription>>,
    workspace: Arc<dyn Workspace>,
}

impl<T: Clone + Send + Sync + 'static> DocumentCache<T> {
    /// Create the cache and register its lifecycle listeners. The
    /// returned `Arc` is held by the engine; listeners hold only weak
    /// references and are released when the cache drops.
    pub fn new(workspace: Arc<dyn Workspace>, compute: Box<ComputeFn<T>>) -> Arc<Self> {
        let cache = Arc::new(Self {
            compute,
            entries: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
            workspace: Arc::clone(&workspace),
        });

        let on_change = listener(&cache, |cache, uri| return cache.invalidate(uri));
        let on_create = listener(&cache, |cache, uri| return cache.invalidate(uri));
        let on_delete = listener(&cache, |cache, uri| return cache.delete(uri));
        *cache.subscriptions.lock() = vec![
            workspace.on_did_change_markdown_document(on_change),
            workspace.on_did_create_markdown_document(on_create),
            workspace.on_did_delete_markdown_document(on_delete),
        ];

        return cache;
    }

    /// The value for the document's current version, loading the document
    /// through the workspace. Returns `Ok(None)` and drops any existing
    /// entry when the document is absent; absence is not an error.
    pub async fn get(
        &self,
        uri: &DocUri,
        token: &CancellationToken,
    ) -> Result<Option<T>, Error> {
        let Some(doc) = self.workspace.get_or_load_markdown_document(uri).await else {
            self.entries.lock().remove(uri);
            return Ok(None);
        };
        return Ok(Some(self.get_for_document(&doc, token).await?));
    }

    /// The value for an already-resolved snapshot, for callers that hold
    /// an authoritative (possibly unpersisted) document.
    pub async fn get_for_document(
        &self,
        doc: &Arc<Document>,
        token: &CancellationToken,
    ) -> Result<T, Error> {
        let cell = {
            let mut entries = self.entries.lock();
            match entries.get(doc.uri()) {
                Some(entry) if entry.version == doc.version() => Arc::clone(&entry.cell),
                _ => {
                    let cell = Arc::new(OnceCell::new());
                    entries.insert(
                        doc.uri().clone(),
                        CacheEntry { cell: Arc::clone(&cell), version: doc.version() },
                    );
                    cell
                },
            }
        };

        let value = cell
            .get_or_try_init(|| {
                debug!(uri = %doc.uri(), version = doc.version(), "cache recompute");
                return (self.compute)(Arc::clone(doc), token.clone());
            })
            .await?;
        return Ok(value.clone());
    }

    /// Drop the cached entry for a changed document. Idempotent.
    pub fn invalidate(&self, uri: &DocUri) {
        if self.entries.lock().remove(uri).is_some() {
            debug!(uri = %uri, "cache invalidate");
        }
    }

    /// Drop the cached entry for a deleted document. Idempotent.
    pub fn delete(&self, uri: &DocUri) {
        if self.entries.lock().remove(uri).is_some() {
            debug!(uri = %uri, "cache delete");
        }
    }
}

/// Workspace-wide aggregate variant: one value derived from every
/// document, invalidated by any create/change/delete event and recomputed
/// by re-enumerating the corpus. The full re-scan is the acknowledged
/// scalability hot spot; edits are human-paced.
pub struct WorkspaceCache<T> {
    compute: Box<AggregateFn<T>>,
    slot: Mutex<Arc<OnceCell<T>>>,
    subscriptions: Mutex<Vec<Subscription>>,
    workspace: Arc<dyn Workspace>,
}

impl<T: Clone + Send + Sync + 'static> WorkspaceCache<T> {
    /// Create the cache and register listeners for all three lifecycle
    /// events; any of them resets the slot.
    pub fn new(workspace: Arc<dyn Workspace>, compute: Box<AggregateFn<T>>) -> Arc<Self> {
        let cache = Arc::new(Self {
            compute,
            slot: Mutex::new(Arc::new(OnceCell::new())),
            subscriptions: Mutex::new(Vec::new()),
            workspace: Arc::clone(&workspace),
        });

        let on_change = listener(&cache, |cache, _uri| return cache.invalidate());
        let on_create = listener(&cache, |cache, _uri| return cache.invalidate());
        let on_delete = listener(&cache, |cache, _uri| return cache.invalidate());
        *cache.subscriptions.lock() = vec![
            workspace.on_did_change_markdown_document(on_change),
            workspace.on_did_create_markdown_document(on_create),
            workspace.on_did_delete_markdown_document(on_delete),
        ];

        return cache;
    }

    /// The aggregate value, recomputing over the full corpus when the
    /// slot was reset since the last computation settled.
    pub async fn get(&self, token: &CancellationToken) -> Result<T, Error> {
        let cell = Arc::clone(&self.slot.lock());
        let value = cell
            .get_or_try_init(|| {
                return async move {
                    debug!("workspace cache recompute");
                    let docs = self.workspace.all_markdown_documents().await;
                    if token.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    return (self.compute)(docs, token.clone()).await;
                };
            })
            .await?;
        return Ok(value.clone());
    }

    /// Reset the slot so the next `get` recomputes. In-flight waiters on
    /// the old slot still settle against the snapshot they started with.
    pub fn invalidate(&self) {
        *self.slot.lock() = Arc::new(OnceCell::new());
    }
}

/// Adapt a weakly-held cache method into a workspace event listener, so
/// the subscription never keeps the cache alive on its own.
fn listener<C: Send + Sync + 'static>(
    cache: &Arc<C>,
    apply: impl Fn(&C, &DocUri) + Send + Sync + 'static,
) -> Arc<dyn Fn(&DocUri) + Send + Sync> {
    let weak: Weak<C> = Arc::downgrade(cache);
    return Arc::new(move |uri| {
        if let Some(cache) = weak.upgrade() {
            apply(&cache, uri);
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::sync::Semaphore;
    use tokio_util::sync::CancellationToken;

    use crate::error::Error;
    use crate::test_support::InMemoryWorkspace;
    use crate::types::DocUri;

    use super::{DocumentCache, WorkspaceCache};

    /// A cache computing document text length, with an invocation counter
    /// and an optional gate the test opens to let computations proceed.
    fn counting_cache(
        ws: &Arc<InMemoryWorkspace>,
        gate: Option<Arc<Semaphore>>,
    ) -> (Arc<DocumentCache<usize>>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let cache = DocumentCache::new(
            Arc::clone(ws) as Arc<dyn crate::workspace::Workspace>,
            Box::new(move |doc, token| {
                let counter = Arc::clone(&counter);
                let gate = gate.clone();
                return Box::pin(async move {
                    if let Some(gate) = gate {
                        let _permit =
                            gate.acquire().await.map_err(|_| return Error::Cancelled)?;
                    }
                    if token.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    return Ok(doc.text().len());
                });
            }),
        );
        return (cache, count);
    }

    #[tokio::test]
    async fn consecutive_gets_compute_once() {
        let ws = InMemoryWorkspace::new();
        ws.upsert("doc.md", "abc");
        let (cache, count) = counting_cache(&ws, None);
        let token = CancellationToken::new();

        let first = cache.get(&DocUri::new("doc.md"), &token).await.unwrap();
        let second = cache.get(&DocUri::new("doc.md"), &token).await.unwrap();
        assert_eq!(first, Some(3));
        assert_eq!(second, Some(3));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn change_event_forces_recompute_of_new_content() {
        let ws = InMemoryWorkspace::new();
        ws.upsert("doc.md", "abc");
        let (cache, count) = counting_cache(&ws, None);
        let token = CancellationToken::new();

        assert_eq!(cache.get(&DocUri::new("doc.md"), &token).await.unwrap(), Some(3));
        ws.upsert("doc.md", "abcdef");
        assert_eq!(cache.get(&DocUri::new("doc.md"), &token).await.unwrap(), Some(6));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_gets_coalesce_into_one_compute() {
        let ws = InMemoryWorkspace::new();
        ws.upsert("doc.md", "abcd");
        let gate = Arc::new(Semaphore::new(0));
        let (cache, count) = counting_cache(&ws, Some(Arc::clone(&gate)));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move {
                let token = CancellationToken::new();
                return cache.get(&DocUri::new("doc.md"), &token).await;
            }));
        }
        gate.add_permits(1);

        for task in tasks {
            let value = task.await.expect("join").expect("get");
            assert_eq!(value, Some(4));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_document_resolves_empty_and_drops_entry() {
        let ws = InMemoryWorkspace::new();
        ws.upsert("doc.md", "abc");
        let (cache, count) = counting_cache(&ws, None);
        let token = CancellationToken::new();

        assert_eq!(cache.get(&DocUri::new("doc.md"), &token).await.unwrap(), Some(3));
        ws.remove("doc.md");
        assert_eq!(cache.get(&DocUri::new("doc.md"), &token).await.unwrap(), None);

        ws.upsert("doc.md", "abcd");
        assert_eq!(cache.get(&DocUri::new("doc.md"), &token).await.unwrap(), Some(4));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_compute_leaves_cache_retryable() {
        let ws = InMemoryWorkspace::new();
        ws.upsert("doc.md", "abc");
        let (cache, count) = counting_cache(&ws, None);

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let result = cache.get(&DocUri::new("doc.md"), &cancelled).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let token = CancellationToken::new();
        assert_eq!(cache.get(&DocUri::new("doc.md"), &token).await.unwrap(), Some(3));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn workspace_cache_recomputes_after_any_event() {
        let ws = InMemoryWorkspace::new();
        ws.upsert("a.md", "aa");
        ws.upsert("b.md", "bbb");

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let cache = WorkspaceCache::new(
            Arc::clone(&ws) as Arc<dyn crate::workspace::Workspace>,
            Box::new(move |docs, _token| {
                let counter = Arc::clone(&counter);
                return Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    return Ok(docs.iter().map(|d| return d.text().len()).sum::<usize>());
                });
            }),
        );
        let token = CancellationToken::new();

        assert_eq!(cache.get(&token).await.unwrap(), 5);
        assert_eq!(cache.get(&token).await.unwrap(), 5);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        ws.upsert("c.md", "c");
        assert_eq!(cache.get(&token).await.unwrap(), 6);
        ws.remove("b.md");
        assert_eq!(cache.get(&token).await.unwrap(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
