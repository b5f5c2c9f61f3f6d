//! # mdchunk
//!
//! Adaptive, structure-aware Markdown chunking for retrieval and embedding
//! pipelines.
//!
//! ## Philosophy
//!
//! Chunks should follow the document rather than a fixed byte count:
//! - Fenced code blocks and tables stay whole
//! - Sections break at headers and carry their header path
//! - Every source character lands in some chunk, and this is checked
//! - A strategy failure degrades to a simpler strategy, never to an error
//!
//! ## Architecture
//!
//! ```text
//! Markdown text
//!     │
//!     ├──> AstBuilder (pulldown-cmark) → SyntaxTree + diagnostics
//!     │
//!     ├──> ContentAnalyzer → ratios, counts, complexity, content type
//!     │
//!     ├──> StrategySelector (strict | weighted) over the StrategyRegistry
//!     │
//!     ├──> FallbackExecutor
//!     │    ├─> selected strategy
//!     │    ├─> structural
//!     │    └─> sentences
//!     │
//!     └──> Post-processing
//!          ├─> OverlapProcessor
//!          ├─> MetadataEnricher
//!          └─> CompletenessValidator (BlockTracker)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use mdchunk::{ChunkConfig, MarkdownChunker};
//!
//! let chunker = MarkdownChunker::new(ChunkConfig::for_embeddings()).unwrap();
//!
//! let text = "# Guide\n\nSome introduction.\n\n```rust\nfn main() {}\n```\n";
//! let result = chunker.chunk(text, None).unwrap();
//!
//! for chunk in &result.chunks {
//!     println!("lines {}-{}: {} chars", chunk.start_line, chunk.end_line, chunk.size());
//! }
//! println!("strategy: {}", result.strategy_used);
//! ```

pub mod ast;
mod analyzer;
mod cache;
mod chunker;
mod config;
mod document;
mod error;
mod fallback;
mod metadata;
mod overlap;
mod registry;
mod selector;
mod sentences;
pub mod strategy;
mod types;
pub mod validation;
mod window;

pub use analyzer::{ContentAnalysis, ContentAnalyzer, ContentType};
pub use cache::{CacheKey, ResultCache};
pub use chunker::MarkdownChunker;
pub use config::{ChunkConfig, SelectionMode};
pub use document::{BlockKind, ParsedDocument, SourceBlock};
pub use error::{ChunkerError, Result};
pub use fallback::{FallbackAttempt, FallbackExecutor, FallbackOutcome};
pub use metadata::MetadataEnricher;
pub use overlap::{own_content, OverlapProcessor};
pub use registry::StrategyRegistry;
pub use selector::{Selection, StrategySelector};
pub use sentences::{fixed_windows, split_sentences};
pub use strategy::ChunkingStrategy;
pub use types::{keys, Chunk, ChunkStatistics, ChunkingResult, ChunkingWarning, StrategyMetrics, WarningCode};
