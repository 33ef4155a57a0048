//! Incremental markdown analysis for editor tooling.
//!
//! Gives callers document outlines, link navigation/validation, and
//! cursor-driven highlight sets over a corpus of markdown documents that
//! reference each other by relative path and in-document fragment,
//! without re-scanning the corpus per request.
//!
//! # Architecture
//!
//! - `types`, `document`: positions, ranges, URIs, versioned snapshots
//! - `slug`, `tokenize`, `workspace`: injected capabilities (defaults
//!   included for the first two; the workspace is always the embedder's)
//! - `cache`: (URI, version)-keyed memoization with in-flight coalescing
//! - `toc`, `links`, `highlights`: the analysis passes
//! - `engine`: wiring and the produced surface
//!
//! # Usage
//!
//! ```rust,ignore
//! use mdnav::{Engine, EngineConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = Engine::new(workspace, EngineConfig::default());
//! let token = CancellationToken::new();
//!
//! let toc = engine.table_of_contents(&doc, &token).await?;
//! let links = engine.links(&doc, &token).await?;
//! let highlights = engine.highlights(&doc, cursor, &token).await?;
//! ```
//!
//! Every operation accepts a cancellation token and degrades to empty
//! results for absent documents; nothing here is fatal to the process.

pub mod cache;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod highlights;
pub mod links;
pub mod slug;
pub mod toc;
pub mod tokenize;
pub mod types;
pub mod workspace;

// Test support (available to integration tests and embedder test suites)
pub mod test_support;

pub use config::{ConfigSettings, EngineConfig, ExtensionStyle};
pub use document::Document;
pub use engine::Engine;
pub use error::Error;
pub use highlights::{Access, Highlight};
pub use links::{Classification, LinkKind, LinkRecord, LinkTarget};
pub use slug::{GithubSlugifier, Slugifier};
pub use toc::{TableOfContents, TocEntry};
pub use tokenize::{MarkdownTokenizer, Token, Tokenizer};
pub use types::{DocUri, Position, Range};
pub use workspace::{FileStat, Listener, Subscription, Workspace};
