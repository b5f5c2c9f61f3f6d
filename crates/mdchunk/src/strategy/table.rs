use super::packing::{block_units, PackPolicy, Packer};
use super::{saturate, ChunkingStrategy};
use crate::analyzer::ContentAnalysis;
use crate::config::ChunkConfig;
use crate::document::{BlockKind, ParsedDocument};
use crate::error::Result;
use crate::types::Chunk;

/// Splits table-heavy documents, keeping tables whole
#[derive(Debug, Clone, Copy, Default)]
pub struct TableStrategy;

const POLICY: PackPolicy = PackPolicy {
    break_at_headers: true,
    flush_at_target: true,
    glue: &[BlockKind::Table],
};

impl ChunkingStrategy for TableStrategy {
    fn name(&self) -> &str {
        "table"
    }

    fn priority(&self) -> u32 {
        4
    }

    fn can_handle(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> bool {
        analysis.table_count >= config.table_count_threshold
    }

    fn calculate_quality(&self, analysis: &ContentAnalysis) -> f64 {
        (0.5 * saturate(analysis.table_count, 5.0) + 0.5 * analysis.table_ratio).clamp(0.0, 1.0)
    }

    fn apply(&self, doc: &ParsedDocument, config: &ChunkConfig) -> Result<Vec<Chunk>> {
        Ok(Packer::new(doc, config, POLICY).pack(&block_units(doc), self.name()))
    }
}
