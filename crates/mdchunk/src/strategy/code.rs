use super::packing::{block_units, PackPolicy, Packer};
use super::{saturate, ChunkingStrategy};
use crate::analyzer::ContentAnalysis;
use crate::config::ChunkConfig;
use crate::document::{BlockKind, ParsedDocument};
use crate::error::Result;
use crate::types::Chunk;

/// Splits code-dominated documents, keeping each code block with the prose
/// that introduces it
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeStrategy;

const POLICY: PackPolicy = PackPolicy {
    break_at_headers: true,
    flush_at_target: true,
    glue: &[BlockKind::CodeBlock],
};

impl ChunkingStrategy for CodeStrategy {
    fn name(&self) -> &str {
        "code"
    }

    fn priority(&self) -> u32 {
        1
    }

    fn can_handle(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> bool {
        analysis.code_ratio >= config.code_ratio_threshold
            && analysis.code_block_count >= config.min_code_blocks
    }

    fn calculate_quality(&self, analysis: &ContentAnalysis) -> f64 {
        let ratio = 0.6 * analysis.code_ratio;
        let blocks = 0.25 * saturate(analysis.code_block_count, 10.0);
        let languages = 0.15 * saturate(analysis.languages.len(), 3.0);
        (ratio + blocks + languages).clamp(0.0, 1.0)
    }

    fn apply(&self, doc: &ParsedDocument, config: &ChunkConfig) -> Result<Vec<Chunk>> {
        Ok(Packer::new(doc, config, POLICY).pack(&block_units(doc), self.name()))
    }

    fn selection_reason(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> String {
        format!(
            "code ratio {:.2} (threshold {:.2}), {} code blocks (minimum {})",
            analysis.code_ratio,
            config.code_ratio_threshold,
            analysis.code_block_count,
            config.min_code_blocks
        )
    }
}
