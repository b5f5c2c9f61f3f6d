use super::packing::{block_units, PackPolicy, Packer};
use super::{saturate, ChunkingStrategy};
use crate::analyzer::ContentAnalysis;
use crate::config::ChunkConfig;
use crate::document::ParsedDocument;
use crate::error::Result;
use crate::types::{keys, Chunk};
use serde_json::Value;

/// Splits along the header hierarchy and records each chunk's section path
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralStrategy;

const POLICY: PackPolicy = PackPolicy {
    break_at_headers: true,
    flush_at_target: false,
    glue: &[],
};

impl ChunkingStrategy for StructuralStrategy {
    fn name(&self) -> &str {
        "structural"
    }

    fn priority(&self) -> u32 {
        5
    }

    fn can_handle(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> bool {
        analysis.header_count >= config.header_count_threshold
    }

    fn calculate_quality(&self, analysis: &ContentAnalysis) -> f64 {
        let headers = 0.4 * saturate(analysis.header_count, 10.0);
        let depth = 0.3 * saturate(analysis.max_header_depth, 4.0);
        let text = 0.3 * analysis.text_ratio;
        (headers + depth + text).clamp(0.0, 1.0)
    }

    fn apply(&self, doc: &ParsedDocument, config: &ChunkConfig) -> Result<Vec<Chunk>> {
        let mut chunks = Packer::new(doc, config, POLICY).pack(&block_units(doc), self.name());
        for chunk in &mut chunks {
            let local_line = chunk.start_line.saturating_sub(doc.line_offset());
            let path = doc.header_path_at(local_line);
            if let Some(title) = path.last() {
                chunk.set(keys::SECTION_TITLE, title.as_str());
            }
            chunk.set(
                keys::HEADER_PATH,
                Value::Array(path.into_iter().map(Value::String).collect()),
            );
        }
        Ok(chunks)
    }

    fn selection_reason(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> String {
        format!(
            "{} headers (threshold {})",
            analysis.header_count, config.header_count_threshold
        )
    }
}
