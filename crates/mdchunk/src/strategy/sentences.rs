use super::packing::{paragraph_units, PackPolicy, Packer};
use super::ChunkingStrategy;
use crate::analyzer::ContentAnalysis;
use crate::config::ChunkConfig;
use crate::document::ParsedDocument;
use crate::error::Result;
use crate::types::Chunk;

/// Universal strategy: packs blank-line separated paragraphs and splits
/// oversize ones at sentence boundaries
///
/// Works from lines alone, so it succeeds on any non-whitespace input.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentencesStrategy;

const POLICY: PackPolicy = PackPolicy {
    break_at_headers: false,
    flush_at_target: true,
    glue: &[],
};

impl ChunkingStrategy for SentencesStrategy {
    fn name(&self) -> &str {
        "sentences"
    }

    fn priority(&self) -> u32 {
        6
    }

    fn can_handle(&self, _analysis: &ContentAnalysis, _config: &ChunkConfig) -> bool {
        true
    }

    fn calculate_quality(&self, analysis: &ContentAnalysis) -> f64 {
        (0.2 + 0.2 * analysis.text_ratio).clamp(0.0, 1.0)
    }

    fn apply(&self, doc: &ParsedDocument, config: &ChunkConfig) -> Result<Vec<Chunk>> {
        Ok(Packer::new(doc, config, POLICY).pack(&paragraph_units(doc), self.name()))
    }

    fn selection_reason(&self, _analysis: &ContentAnalysis, _config: &ChunkConfig) -> String {
        "sentences accepts any content".to_string()
    }
}
