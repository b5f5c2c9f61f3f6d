//! Completeness validation.
//!
//! Source blocks are registered in a [`BlockTracker`] before any strategy
//! runs. After post-processing the final chunk list is checked three ways:
//! every non-trivial block must appear somewhere, no body block may be
//! copied into too many consecutive chunks, and the chunks must carry
//! nearly all non-whitespace source characters.

mod tracker;

pub use tracker::{BlockRecord, BlockTracker};

use crate::config::ChunkConfig;
use crate::document::BlockKind;
use crate::error::{ChunkerError, Result};
use crate::overlap::own_content;
use crate::types::{Chunk, ChunkingWarning, WarningCode};
use serde::{Deserialize, Serialize};

/// A block that no chunk covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingBlock {
    pub id: String,
    pub kind: BlockKind,
    pub start_line: usize,
    pub end_line: usize,
}

/// A block repeated in more consecutive chunks than allowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicatedBlock {
    pub id: String,
    pub kind: BlockKind,
    pub consecutive_chunks: usize,
}

/// Findings of one validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub total_blocks: usize,
    pub missing: Vec<MissingBlock>,
    pub over_duplicated: Vec<DuplicatedBlock>,
    /// Non-whitespace characters in the source
    pub source_chars: usize,
    /// Non-whitespace characters in the chunks, overlap excluded
    pub chunk_chars: usize,
    /// `chunk_chars / source_chars`, capped at 1.0
    pub coverage: f64,
    pub tolerance: f64,
}

impl CompletenessReport {
    #[must_use]
    pub fn coverage_ok(&self) -> bool {
        self.coverage + f64::EPSILON >= 1.0 - self.tolerance
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.over_duplicated.is_empty() && self.coverage_ok()
    }

    /// One warning per finding
    #[must_use]
    pub fn warnings(&self) -> Vec<ChunkingWarning> {
        let mut warnings: Vec<ChunkingWarning> = self
            .missing
            .iter()
            .map(|m| {
                ChunkingWarning::new(
                    WarningCode::MissingBlock,
                    format!(
                        "{} {} (lines {}-{}) is not covered by any chunk",
                        m.kind.as_str(),
                        m.id,
                        m.start_line,
                        m.end_line
                    ),
                )
            })
            .collect();

        warnings.extend(self.over_duplicated.iter().map(|d| {
            ChunkingWarning::new(
                WarningCode::OverDuplication,
                format!(
                    "{} {} appears in {} consecutive chunks",
                    d.kind.as_str(),
                    d.id,
                    d.consecutive_chunks
                ),
            )
        }));

        if !self.coverage_ok() {
            warnings.push(ChunkingWarning::new(
                WarningCode::CharacterLoss,
                format!(
                    "chunks cover {:.1}% of source characters ({} of {}), below the {:.1}% minimum",
                    self.coverage * 100.0,
                    self.chunk_chars,
                    self.source_chars,
                    (1.0 - self.tolerance) * 100.0
                ),
            ));
        }
        warnings
    }

    fn summary(&self) -> String {
        format!(
            "{} missing blocks, {} over-duplicated blocks, {:.1}% character coverage",
            self.missing.len(),
            self.over_duplicated.len(),
            self.coverage * 100.0
        )
    }
}

/// Checks a chunk list against the registered source blocks
#[derive(Debug, Clone, Copy)]
pub struct CompletenessValidator {
    tolerance: f64,
    strict: bool,
    max_duplication: usize,
}

impl CompletenessValidator {
    pub fn new(config: &ChunkConfig) -> Self {
        Self {
            tolerance: config.completeness_tolerance,
            strict: config.strict_completeness,
            max_duplication: config.max_block_duplication,
        }
    }

    /// Record appearances in `tracker` and build the report
    pub fn validate(&self, tracker: &mut BlockTracker, source: &str, chunks: &[Chunk]) -> CompletenessReport {
        tracker.record_chunks(chunks);

        let missing = tracker
            .records()
            .iter()
            .filter(|r| !r.is_trivial() && !r.is_present())
            .map(|r| MissingBlock {
                id: r.id.clone(),
                kind: r.kind,
                start_line: r.start_line,
                end_line: r.end_line,
            })
            .collect();

        let over_duplicated = tracker
            .records()
            .iter()
            .filter(|r| !r.is_duplication_exempt())
            .filter_map(|r| {
                let run = r.max_consecutive_containment();
                (run > self.max_duplication).then(|| DuplicatedBlock {
                    id: r.id.clone(),
                    kind: r.kind,
                    consecutive_chunks: run,
                })
            })
            .collect();

        let source_chars = visible_chars(source);
        let chunk_chars: usize = chunks.iter().map(|c| visible_chars(own_content(c))).sum();
        let coverage = if source_chars == 0 {
            1.0
        } else {
            (chunk_chars as f64 / source_chars as f64).min(1.0)
        };

        CompletenessReport {
            total_blocks: tracker.len(),
            missing,
            over_duplicated,
            source_chars,
            chunk_chars,
            coverage,
            tolerance: self.tolerance,
        }
    }

    /// Turn a report into warnings, or an error in strict mode
    pub fn check(&self, report: &CompletenessReport) -> Result<Vec<ChunkingWarning>> {
        if report.is_complete() {
            return Ok(Vec::new());
        }
        if self.strict {
            return Err(ChunkerError::CompletenessViolation(report.summary()));
        }
        log::warn!("Completeness check failed: {}", report.summary());
        Ok(report.warnings())
    }
}

fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}
