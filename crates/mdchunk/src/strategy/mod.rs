//! Chunking strategies.
//!
//! Every strategy exposes the same three operations: a cheap `can_handle`
//! test over the [`ContentAnalysis`], a `calculate_quality` score used by
//! weighted selection, and `apply`, which splits a [`ParsedDocument`].
//! Built-in strategies share the packing engine in [`packing`].

mod code;
mod list;
mod mixed;
pub(crate) mod packing;
mod sentences;
mod structural;
mod table;

pub use code::CodeStrategy;
pub use list::ListStrategy;
pub use mixed::MixedStrategy;
pub use sentences::SentencesStrategy;
pub use structural::StructuralStrategy;
pub use table::TableStrategy;

use crate::analyzer::ContentAnalysis;
use crate::config::ChunkConfig;
use crate::document::ParsedDocument;
use crate::error::Result;
use crate::types::Chunk;
use std::sync::Arc;

/// A named method for splitting a document into chunks
///
/// Implementations must be stateless (or internally synchronized): one
/// instance is shared by every invocation of the engine.
pub trait ChunkingStrategy: Send + Sync {
    /// Unique registry name
    fn name(&self) -> &str;

    /// Lower numbers are preferred
    fn priority(&self) -> u32;

    /// Whether the strategy applies to a document with this profile
    fn can_handle(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> bool;

    /// Suitability score in 0.0-1.0
    fn calculate_quality(&self, analysis: &ContentAnalysis) -> f64;

    /// Split the document
    ///
    /// An empty list is treated as a failure by the fallback chain.
    fn apply(&self, doc: &ParsedDocument, config: &ChunkConfig) -> Result<Vec<Chunk>>;

    /// Short explanation of the `can_handle` outcome, recorded in strategy metrics
    fn selection_reason(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> String {
        if self.can_handle(analysis, config) {
            format!("{} accepts {} content", self.name(), analysis.content_type)
        } else {
            format!("{} rejects {} content", self.name(), analysis.content_type)
        }
    }
}

/// The six built-in strategies, by ascending priority
pub fn default_strategies() -> Vec<Arc<dyn ChunkingStrategy>> {
    vec![
        Arc::new(CodeStrategy),
        Arc::new(MixedStrategy),
        Arc::new(ListStrategy),
        Arc::new(TableStrategy),
        Arc::new(StructuralStrategy),
        Arc::new(SentencesStrategy),
    ]
}

/// Saturating share of `count` relative to `full`
pub(crate) fn saturate(count: usize, full: f64) -> f64 {
    (count as f64 / full).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ContentAnalyzer;
    use crate::ast::AstBuilder;

    #[test]
    fn test_default_priorities() {
        let priorities: Vec<(String, u32)> = default_strategies()
            .iter()
            .map(|s| (s.name().to_string(), s.priority()))
            .collect();
        assert_eq!(
            priorities,
            vec![
                ("code".to_string(), 1),
                ("mixed".to_string(), 2),
                ("list".to_string(), 3),
                ("table".to_string(), 4),
                ("structural".to_string(), 5),
                ("sentences".to_string(), 6),
            ]
        );
    }

    #[test]
    fn test_quality_scores_in_range() {
        let config = ChunkConfig::default();
        let text = "# A\n\n## B\n\n- x\n- y\n\n```rust\nfn f() {}\n```\n\n| a |\n|---|\n| 1 |\n";
        let analysis = ContentAnalyzer::new(&config).analyze(&AstBuilder::new().build(text));
        for strategy in default_strategies() {
            let quality = strategy.calculate_quality(&analysis);
            assert!((0.0..=1.0).contains(&quality), "{} out of range", strategy.name());
            assert!(!strategy.selection_reason(&analysis, &config).is_empty());
        }
    }
}
