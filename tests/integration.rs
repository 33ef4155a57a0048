use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use mdnav::test_support::InMemoryWorkspace;
use mdnav::{
    Access, Classification, Document, Engine, EngineConfig, Error, GithubSlugifier,
    MarkdownTokenizer, Position, Token, Tokenizer, Workspace,
};

fn engine_over(ws: &Arc<InMemoryWorkspace>) -> Engine {
    return Engine::new(Arc::clone(ws) as Arc<dyn Workspace>, EngineConfig::default());
}

#[tokio::test]
async fn outline_is_served_and_invalidated_with_the_document() {
    let ws = InMemoryWorkspace::new();
    let engine = engine_over(&ws);
    let token = CancellationToken::new();

    let doc = ws.upsert("doc.md", "# One\n\n## Two\n");
    let toc = engine.table_of_contents(&doc, &token).await.unwrap();
    let slugs: Vec<&str> = toc.entries.iter().map(|e| e.slug.as_str()).collect();
    assert_eq!(slugs, vec!["one", "two"]);

    let doc = ws.upsert("doc.md", "# Only\n");
    let toc = engine.table_of_contents(&doc, &token).await.unwrap();
    let slugs: Vec<&str> = toc.entries.iter().map(|e| e.slug.as_str()).collect();
    assert_eq!(slugs, vec!["only"]);

    ws.remove("doc.md");
    let absent = engine
        .table_of_contents_for(&mdnav::DocUri::new("doc.md"), &token)
        .await
        .unwrap();
    assert!(absent.is_none());
}

#[tokio::test]
async fn edits_to_a_linked_file_are_observed_without_touching_the_source() {
    let ws = InMemoryWorkspace::new();
    let engine = engine_over(&ws);
    let token = CancellationToken::new();

    ws.upsert("other.md", "plain text, no headings\n");
    let doc = ws.upsert("file.md", "[jump](other.md#frag)\n");

    let links = engine.links(&doc, &token).await.unwrap();
    assert_eq!(links[0].classification, Classification::Unresolved);

    // The linking document is untouched; only the target gains a heading.
    ws.upsert("other.md", "# Frag\n\ntext\n");
    let links = engine.links(&doc, &token).await.unwrap();
    assert_eq!(links[0].classification, Classification::ExternalPath);
}

const FRAGMENT_DOC: &str = "\
# A b C

text [link](#a-b-c)
text [link](#a-B-c \"title\")
text [link](doc.md#a-B-c \"title\")

[ref]: #a-B-c \"title\"
";

#[tokio::test]
async fn fragment_highlights_agree_from_every_entry_point() {
    let ws = InMemoryWorkspace::new();
    let engine = engine_over(&ws);
    let token = CancellationToken::new();
    let doc = ws.upsert("doc.md", FRAGMENT_DOC);

    let from_heading = engine.highlights(&doc, Position::new(0, 3), &token).await.unwrap();
    let lines: Vec<u32> = from_heading.iter().map(|h| h.range.start.line).collect();
    assert_eq!(lines, vec![0, 2, 3, 4, 6]);

    for position in [
        Position::new(2, 14),
        Position::new(3, 14),
        Position::new(4, 21),
        Position::new(6, 9),
    ] {
        let highlights = engine.highlights(&doc, position, &token).await.unwrap();
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

#[tokio::test]
async fn label_highlights_agree_between_usage_and_definition() {
    let ws = InMemoryWorkspace::new();
    let engine = engine_over(&ws);
    let token = CancellationToken::new();
    let doc = ws.upsert("doc.md", LABEL_DOC);

    let from_usage = engine.highlights(&doc, Position::new(0, 8), &token).await.unwrap();
    let lines: Vec<u32> = from_usage.iter().map(|h| h.range.start.line).collect();
    assert_eq!(lines, vec![0, 1, 2, 3, 5]);
    assert_eq!(from_usage.iter().filter(|h| h.access == Access::Write).count(), 1);

    let from_definition = engine.highlights(&doc, Position::new(5, 2), &token).await.unwrap();
    assert_eq!(from_usage, from_definition);
}

#[tokio::test]
async fn unmatched_cursor_position_yields_empty_not_error() {
    let ws = InMemoryWorkspace::new();
    let engine = engine_over(&ws);
    let token = CancellationToken::new();
    let doc = ws.upsert("doc.md", FRAGMENT_DOC);

    let highlights = engine.highlights(&doc, Position::new(2, 1), &token).await.unwrap();
    assert!(highlights.is_empty());
}

#[tokio::test]
async fn workspace_outlines_follow_corpus_churn() {
    let ws = InMemoryWorkspace::new();
    let engine = engine_over(&ws);
    let token = CancellationToken::new();

    ws.upsert("b.md", "# Bee\n");
    ws.upsert("a.md", "# Ay\n");

    let tocs = engine.workspace_tocs(&token).await.unwrap();
    let uris: Vec<&str> = tocs.iter().map(|(uri, _)| uri.as_str()).collect();
    assert_eq!(uris, vec!["a.md", "b.md"]);

    ws.upsert("c.md", "# Sea\n");
    let tocs = engine.workspace_tocs(&token).await.unwrap();
    assert_eq!(tocs.len(), 3);

    ws.remove("a.md");
    let tocs = engine.workspace_tocs(&token).await.unwrap();
    let uris: Vec<&str> = tocs.iter().map(|(uri, _)| uri.as_str()).collect();
    assert_eq!(uris, vec!["b.md", "c.md"]);
}

#[tokio::test]
async fn cancelled_token_is_a_distinguished_result() {
    let ws = InMemoryWorkspace::new();
    let engine = engine_over(&ws);
    ws.upsert("doc.md", "# T\n");

    let token = CancellationToken::new();
    token.cancel();
    let result = engine.workspace_tocs(&token).await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

/// Wraps the default tokenizer, counting passes, to observe coalescing
/// through the public surface.
struct CountingTokenizer {
    inner: MarkdownTokenizer,
    passes: AtomicUsize,
}

#[async_trait]
impl Tokenizer for CountingTokenizer {
    async fn tokenize(&self, doc: &Document) -> Result<Vec<Token>, Error> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        return self.inner.tokenize(doc).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_outline_requests_coalesce() {
    let ws = InMemoryWorkspace::new();
    let counting = Arc::new(CountingTokenizer {
        inner: MarkdownTokenizer,
        passes: AtomicUsize::new(0),
    });
    let engine = Arc::new(Engine::with_capabilities(
        Arc::clone(&ws) as Arc<dyn Workspace>,
        Arc::clone(&counting) as Arc<dyn Tokenizer>,
        Arc::new(GithubSlugifier),
        Arc::new(EngineConfig::default()),
    ));
    let doc = ws.upsert("doc.md", "# One\n\n## Two\n");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        let doc = Arc::clone(&doc);
        tasks.push(tokio::spawn(async move {
            let token = CancellationToken::new();
            return engine.table_of_contents(&doc, &token).await;
        }));
    }

    let mut outlines = Vec::new();
    for task in tasks {
        outlines.push(task.await.expect("join").expect("outline"));
    }
    for outline in &outlines {
        assert_eq!(outline.entries.len(), 2);
    }
    assert_eq!(counting.passes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn excluded_targets_survive_missing_files() {
    let ws = InMemoryWorkspace::new();
    let config = EngineConfig::new(mdnav::ConfigSettings {
        excluded_globs: vec!["archive/**".to_string()],
        ..mdnav::ConfigSettings::default()
    })
    .unwrap();
    let engine = Engine::new(Arc::clone(&ws) as Arc<dyn Workspace>, config);
    let token = CancellationToken::new();

    let doc = ws.upsert("doc.md", "[old](archive/gone.md)\n[real](missing.md)\n");
    let links = engine.links(&doc, &token).await.unwrap();
    assert_eq!(links[0].classification, Classification::ExternalPath);
    assert_eq!(links[1].classification, Classification::Unresolved);
}
