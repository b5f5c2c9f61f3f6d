use super::packing::{block_units, PackPolicy, Packer};
use super::{saturate, ChunkingStrategy};
use crate::analyzer::ContentAnalysis;
use crate::config::ChunkConfig;
use crate::document::{BlockKind, ParsedDocument};
use crate::error::Result;
use crate::types::Chunk;

/// Splits list-dominated documents between top-level items
#[derive(Debug, Clone, Copy, Default)]
pub struct ListStrategy;

const POLICY: PackPolicy = PackPolicy {
    break_at_headers: true,
    flush_at_target: true,
    glue: &[BlockKind::List],
};

impl ChunkingStrategy for ListStrategy {
    fn name(&self) -> &str {
        "list"
    }

    fn priority(&self) -> u32 {
        3
    }

    fn can_handle(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> bool {
        analysis.list_ratio >= config.list_ratio_threshold
            || analysis.list_count >= config.list_count_threshold
    }

    fn calculate_quality(&self, analysis: &ContentAnalysis) -> f64 {
        let ratio = 0.6 * analysis.list_ratio;
        let lists = 0.2 * saturate(analysis.list_count, 5.0);
        let nesting = 0.2 * saturate(analysis.max_list_depth, 3.0);
        (ratio + lists + nesting).clamp(0.0, 1.0)
    }

    fn apply(&self, doc: &ParsedDocument, config: &ChunkConfig) -> Result<Vec<Chunk>> {
        Ok(Packer::new(doc, config, POLICY).pack(&block_units(doc), self.name()))
    }

    fn selection_reason(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> String {
        format!(
            "list ratio {:.2} (threshold {:.2}), {} lists (threshold {})",
            analysis.list_ratio, config.list_ratio_threshold, analysis.list_count, config.list_count_threshold
        )
    }
}
