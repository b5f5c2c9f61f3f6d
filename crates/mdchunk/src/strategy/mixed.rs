use super::packing::{block_units, PackPolicy, Packer};
use super::ChunkingStrategy;
use crate::analyzer::{ContentAnalysis, ContentType};
use crate::config::ChunkConfig;
use crate::document::{BlockKind, ParsedDocument};
use crate::error::Result;
use crate::types::Chunk;

/// Share a category needs to count as present in a mixed document
const CATEGORY_SHARE: f64 = 0.1;

/// Splits documents that combine several structured element kinds
#[derive(Debug, Clone, Copy, Default)]
pub struct MixedStrategy;

const POLICY: PackPolicy = PackPolicy {
    break_at_headers: true,
    flush_at_target: true,
    glue: &[BlockKind::CodeBlock, BlockKind::List, BlockKind::Table],
};

impl ChunkingStrategy for MixedStrategy {
    fn name(&self) -> &str {
        "mixed"
    }

    fn priority(&self) -> u32 {
        2
    }

    fn can_handle(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> bool {
        let diverse = analysis.structured_categories(CATEGORY_SHARE) >= 2
            && analysis.complexity_score >= config.min_complexity;
        diverse || analysis.content_type == ContentType::Mixed
    }

    fn calculate_quality(&self, analysis: &ContentAnalysis) -> f64 {
        let balance = 1.0 - analysis.max_ratio();
        (0.6 * analysis.complexity_score + 0.4 * balance).clamp(0.0, 1.0)
    }

    fn apply(&self, doc: &ParsedDocument, config: &ChunkConfig) -> Result<Vec<Chunk>> {
        Ok(Packer::new(doc, config, POLICY).pack(&block_units(doc), self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ContentAnalyzer;

    #[test]
    fn test_handles_code_and_list_document() {
        let text = "# Guide\n\nSome words about it.\n\n- one item\n- two items\n- three items\n\n```rust\nfn main() {\n    run();\n}\n```\n";
        let config = ChunkConfig::default();
        let analysis = ContentAnalyzer::new(&config).analyze(ParsedDocument::parse(text).tree());
        assert!(analysis.code_ratio >= 0.1 && analysis.list_ratio >= 0.1);
        assert!(MixedStrategy.can_handle(&analysis, &config));
    }

    #[test]
    fn test_rejects_plain_prose() {
        let config = ChunkConfig::default();
        let analysis = ContentAnalyzer::new(&config).analyze(ParsedDocument::parse("Only words.\n").tree());
        assert!(!MixedStrategy.can_handle(&analysis, &config));
    }
}
