use crate::analyzer::ContentAnalysis;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Metadata keys written by strategies and the post-processing stages
pub mod keys {
    pub const STRATEGY: &str = "strategy";
    pub const CONTENT_TYPE: &str = "content_type";
    pub const OVERSIZE: &str = "oversize";
    pub const OVERSIZE_REASON: &str = "oversize_reason";
    pub const HEADER_PATH: &str = "header_path";
    pub const SECTION_TITLE: &str = "section_title";
    pub const HAS_OVERLAP: &str = "has_overlap";
    pub const OVERLAP_SIZE: &str = "overlap_size";
    pub const OVERLAP_SOURCE: &str = "overlap_source";
}

/// A bounded slice of the source document plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub content: String,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// Free-form metadata attached by strategies and enrichment
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Chunk {
    /// Create a chunk without metadata
    #[must_use]
    pub fn new(content: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            content: content.into(),
            start_line,
            end_line: end_line.max(start_line),
            metadata: BTreeMap::new(),
        }
    }

    /// Builder: set a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set a metadata entry
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Size in characters
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.chars().count()
    }

    /// Check if the chunk shares a line with `start..=end`
    #[must_use]
    pub const fn overlaps_lines(&self, start: usize, end: usize) -> bool {
        self.start_line <= end && start <= self.end_line
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.metadata
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| usize::try_from(v).ok())
    }

    /// Name of the strategy that produced this chunk
    #[must_use]
    pub fn strategy(&self) -> Option<&str> {
        self.get_str(keys::STRATEGY)
    }

    /// Whether the chunk exceeds the size bound because it holds an atomic element
    #[must_use]
    pub fn is_oversize(&self) -> bool {
        self.get_bool(keys::OVERSIZE).unwrap_or(false)
    }

    /// Number of leading characters copied from the previous chunk
    #[must_use]
    pub fn overlap_size(&self) -> usize {
        self.get_usize(keys::OVERLAP_SIZE).unwrap_or(0)
    }
}

/// Category of a non-fatal issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    EmptyInput,
    ParseDegradation,
    SelectionFailure,
    StrategyFallback,
    MissingBlock,
    OverDuplication,
    CharacterLoss,
    WindowedProcessing,
    OversizeChunk,
}

/// Structured warning accumulated during one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingWarning {
    pub code: WarningCode,
    pub message: String,
}

impl ChunkingWarning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Per-strategy record from one selection call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub name: String,
    pub can_handle: bool,
    pub quality_score: f64,
    pub priority: u32,
    pub final_score: f64,
    pub reason: String,
}

/// Aggregate size statistics over the final chunk list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkStatistics {
    pub total_chunks: usize,
    pub total_chars: usize,
    pub average_chunk_size: f64,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub oversize_chunks: usize,
    pub chunks_with_overlap: usize,
}

impl ChunkStatistics {
    #[must_use]
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }

        let sizes: Vec<usize> = chunks.iter().map(Chunk::size).collect();
        let total_chars: usize = sizes.iter().sum();

        Self {
            total_chunks: chunks.len(),
            total_chars,
            average_chunk_size: total_chars as f64 / chunks.len() as f64,
            min_chunk_size: sizes.iter().copied().min().unwrap_or(0),
            max_chunk_size: sizes.iter().copied().max().unwrap_or(0),
            oversize_chunks: chunks.iter().filter(|c| c.is_oversize()).count(),
            chunks_with_overlap: chunks.iter().filter(|c| c.overlap_size() > 0).count(),
        }
    }
}

/// Output of one chunking invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingResult {
    pub chunks: Vec<Chunk>,
    pub strategy_used: String,
    pub fallback_used: bool,
    pub fallback_level: u8,
    pub processing_time_ms: f64,
    pub warnings: Vec<ChunkingWarning>,
    pub errors: Vec<String>,
    pub statistics: ChunkStatistics,
    pub analysis: Option<ContentAnalysis>,
    pub strategy_metrics: Vec<StrategyMetrics>,
    pub windowed: bool,
}

impl ChunkingResult {
    /// Result with no chunks
    #[must_use]
    pub fn empty(strategy_used: impl Into<String>) -> Self {
        Self {
            chunks: Vec::new(),
            strategy_used: strategy_used.into(),
            fallback_used: false,
            fallback_level: 0,
            processing_time_ms: 0.0,
            warnings: Vec::new(),
            errors: Vec::new(),
            statistics: ChunkStatistics::default(),
            analysis: None,
            strategy_metrics: Vec::new(),
            windowed: false,
        }
    }

    #[must_use]
    pub fn has_warning(&self, code: WarningCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Flat serializable map with the same field names as the struct
    pub fn to_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                Ok(map)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_overlaps_lines() {
        let chunk = Chunk::new("text", 10, 15);
        assert!(chunk.overlaps_lines(15, 20));
        assert!(chunk.overlaps_lines(1, 10));
        assert!(chunk.overlaps_lines(12, 12));
        assert!(!chunk.overlaps_lines(16, 20));
        assert!(!chunk.overlaps_lines(1, 9));
    }

    #[test]
    fn test_chunk_end_never_precedes_start() {
        let chunk = Chunk::new("text", 7, 3);
        assert_eq!(chunk.end_line, 7);
    }

    #[test]
    fn test_metadata_accessors() {
        let chunk = Chunk::new("é code", 1, 1)
            .with_metadata(keys::STRATEGY, "code")
            .with_metadata(keys::OVERSIZE, true)
            .with_metadata(keys::OVERLAP_SIZE, 12);

        assert_eq!(chunk.size(), 6);
        assert_eq!(chunk.strategy(), Some("code"));
        assert!(chunk.is_oversize());
        assert_eq!(chunk.overlap_size(), 12);
        assert_eq!(chunk.get_usize("missing"), None);
    }

    #[test]
    fn test_statistics() {
        let chunks = vec![
            Chunk::new("aaaa", 1, 1),
            Chunk::new("bb", 2, 2).with_metadata(keys::OVERLAP_SIZE, 1),
        ];
        let stats = ChunkStatistics::from_chunks(&chunks);
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.total_chars, 6);
        assert_eq!(stats.min_chunk_size, 2);
        assert_eq!(stats.max_chunk_size, 4);
        assert_eq!(stats.chunks_with_overlap, 1);
        assert!((stats.average_chunk_size - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_result_to_map_keeps_field_names() {
        let mut result = ChunkingResult::empty("sentences");
        result.chunks.push(Chunk::new("x", 1, 1));
        let map = result.to_map().unwrap();
        for field in ["chunks", "strategy_used", "fallback_used", "fallback_level", "warnings", "errors"] {
            assert!(map.contains_key(field), "missing {field}");
        }
        assert_eq!(map["strategy_used"], Value::from("sentences"));
    }
}
