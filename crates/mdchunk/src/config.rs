use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration for Markdown chunking behavior
///
/// Sizes are measured in characters. Missing fields fall back to
/// [`ChunkConfig::default`] when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Maximum chunk size (hard limit unless an atomic element is oversize)
    pub max_chunk_size: usize,

    /// Minimum chunk size (smaller groups are merged with neighbours)
    pub min_chunk_size: usize,

    /// Preferred chunk size for packing
    pub target_chunk_size: usize,

    /// Inject trailing content of the previous chunk into the next one
    pub enable_overlap: bool,

    /// Fixed overlap cap in characters
    pub overlap_size: usize,

    /// Overlap cap as a fraction of the receiving chunk (0.0-1.0)
    pub overlap_percentage: f64,

    /// Minimum share of code characters for the code strategy
    pub code_ratio_threshold: f64,

    /// Minimum number of fenced code blocks for the code strategy
    pub min_code_blocks: usize,

    /// Minimum share of list characters for the list strategy
    pub list_ratio_threshold: f64,

    /// Minimum number of lists that also qualifies the list strategy
    pub list_count_threshold: usize,

    /// Minimum number of tables for the table strategy
    pub table_count_threshold: usize,

    /// Minimum number of headers for the structural strategy
    pub header_count_threshold: usize,

    /// Minimum complexity score for a document to be classified as mixed
    pub min_complexity: f64,

    /// Allow atomic elements to exceed `max_chunk_size`
    pub allow_oversize: bool,

    /// Keep fenced code blocks whole
    pub preserve_code_blocks: bool,

    /// Keep tables whole
    pub preserve_tables: bool,

    /// Retry with structural and sentence strategies when the chosen one fails
    pub enable_fallback: bool,

    /// Accepted share of lost non-whitespace characters (0.0-1.0)
    pub completeness_tolerance: f64,

    /// Turn completeness violations into hard errors
    pub strict_completeness: bool,

    /// Maximum number of consecutive chunks that may carry a whole non-header block
    pub max_block_duplication: usize,

    /// Policy used to pick a strategy
    pub selection_mode: SelectionMode,

    /// Weight of `1 / priority` in weighted selection
    pub priority_weight: f64,

    /// Weight of strategy quality in weighted selection
    pub quality_weight: f64,

    /// Documents larger than this many bytes are processed in windows
    pub large_document_threshold: usize,

    /// Approximate window size in bytes for windowed processing
    pub window_size: usize,

    /// Cache results keyed by content and configuration
    pub enable_cache: bool,

    /// Maximum number of cached results
    pub cache_capacity: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 4096,
            min_chunk_size: 512,
            target_chunk_size: 2048,
            enable_overlap: true,
            overlap_size: 200,
            overlap_percentage: 0.1,
            code_ratio_threshold: 0.7,
            min_code_blocks: 3,
            list_ratio_threshold: 0.6,
            list_count_threshold: 5,
            table_count_threshold: 3,
            header_count_threshold: 3,
            min_complexity: 0.3,
            allow_oversize: true,
            preserve_code_blocks: true,
            preserve_tables: true,
            enable_fallback: true,
            completeness_tolerance: 0.05,
            strict_completeness: false,
            max_block_duplication: 2,
            selection_mode: SelectionMode::Weighted,
            priority_weight: 0.5,
            quality_weight: 0.5,
            large_document_threshold: 1024 * 1024,
            window_size: 256 * 1024,
            enable_cache: false,
            cache_capacity: 128,
        }
    }
}

impl ChunkConfig {
    /// Create config optimized for embeddings (smaller, focused chunks)
    pub fn for_embeddings() -> Self {
        Self {
            max_chunk_size: 1536,
            min_chunk_size: 256,
            target_chunk_size: 1024,
            overlap_size: 150,
            ..Default::default()
        }
    }

    /// Create config optimized for LLM context (larger, comprehensive chunks)
    pub fn for_llm_context() -> Self {
        Self {
            max_chunk_size: 8192,
            min_chunk_size: 1024,
            target_chunk_size: 4096,
            overlap_size: 400,
            ..Default::default()
        }
    }

    /// Create config for API references and tutorials dominated by code samples
    pub fn for_code_docs() -> Self {
        Self {
            max_chunk_size: 6144,
            min_chunk_size: 512,
            target_chunk_size: 3072,
            code_ratio_threshold: 0.5,
            min_code_blocks: 2,
            overlap_size: 100,
            ..Default::default()
        }
    }

    /// Create config for manuals with a deep header hierarchy
    pub fn for_structured_docs() -> Self {
        Self {
            max_chunk_size: 3072,
            min_chunk_size: 256,
            target_chunk_size: 1536,
            header_count_threshold: 2,
            ..Default::default()
        }
    }

    /// Create config for conversational retrieval (short chunks)
    pub fn for_chat() -> Self {
        Self {
            max_chunk_size: 1024,
            min_chunk_size: 128,
            target_chunk_size: 512,
            overlap_size: 100,
            overlap_percentage: 0.15,
            ..Default::default()
        }
    }

    /// Create config optimized for speed (no overlap, strict selection, cached)
    pub fn for_speed() -> Self {
        Self {
            enable_overlap: false,
            selection_mode: SelectionMode::Strict,
            enable_cache: true,
            ..Default::default()
        }
    }

    /// Parse a (possibly partial) JSON configuration map and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(ChunkerError::invalid_config("max_chunk_size must be > 0"));
        }

        if self.min_chunk_size > self.target_chunk_size {
            return Err(ChunkerError::invalid_config(format!(
                "min_chunk_size ({}) cannot exceed target_chunk_size ({})",
                self.min_chunk_size, self.target_chunk_size
            )));
        }

        if self.target_chunk_size > self.max_chunk_size {
            return Err(ChunkerError::invalid_config(format!(
                "target_chunk_size ({}) cannot exceed max_chunk_size ({})",
                self.target_chunk_size, self.max_chunk_size
            )));
        }

        if self.enable_overlap && self.overlap_size >= self.max_chunk_size {
            return Err(ChunkerError::invalid_config(format!(
                "overlap_size ({}) must be smaller than max_chunk_size ({})",
                self.overlap_size, self.max_chunk_size
            )));
        }

        for (name, value) in [
            ("overlap_percentage", self.overlap_percentage),
            ("code_ratio_threshold", self.code_ratio_threshold),
            ("list_ratio_threshold", self.list_ratio_threshold),
            ("min_complexity", self.min_complexity),
            ("completeness_tolerance", self.completeness_tolerance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ChunkerError::invalid_config(format!(
                    "{name} must be within 0.0..=1.0, got {value}"
                )));
            }
        }

        if self.priority_weight < 0.0
            || self.quality_weight < 0.0
            || self.priority_weight + self.quality_weight <= 0.0
        {
            return Err(ChunkerError::invalid_config(
                "selection weights must be non-negative and not both zero",
            ));
        }

        if self.max_block_duplication == 0 {
            return Err(ChunkerError::invalid_config(
                "max_block_duplication must be >= 1",
            ));
        }

        if self.window_size == 0 {
            return Err(ChunkerError::invalid_config("window_size must be > 0"));
        }

        if self.enable_cache && self.cache_capacity == 0 {
            return Err(ChunkerError::invalid_config(
                "cache_capacity must be > 0 when caching is enabled",
            ));
        }

        Ok(())
    }
}

/// Policy for choosing among strategies that can handle a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// First strategy by ascending priority whose `can_handle` is true
    Strict,

    /// Highest `priority_weight / priority + quality_weight * quality`
    #[default]
    Weighted,
}

impl SelectionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Weighted => "weighted",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionMode {
    type Err = ChunkerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "weighted" => Ok(Self::Weighted),
            other => Err(ChunkerError::invalid_config(format!(
                "unknown selection_mode '{other}' (expected \"strict\" or \"weighted\")"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ChunkConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preset_configs_valid() {
        assert!(ChunkConfig::for_embeddings().validate().is_ok());
        assert!(ChunkConfig::for_llm_context().validate().is_ok());
        assert!(ChunkConfig::for_code_docs().validate().is_ok());
        assert!(ChunkConfig::for_structured_docs().validate().is_ok());
        assert!(ChunkConfig::for_chat().validate().is_ok());
        assert!(ChunkConfig::for_speed().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ChunkConfig::default();

        // Invalid: min > target
        config.min_chunk_size = 3000;
        config.target_chunk_size = 2000;
        assert!(config.validate().is_err());

        // Invalid: target > max
        config.min_chunk_size = 100;
        config.target_chunk_size = 5000;
        config.max_chunk_size = 4000;
        assert!(config.validate().is_err());

        // Invalid: max = 0
        config.max_chunk_size = 0;
        assert!(config.validate().is_err());

        // Valid configuration
        config.min_chunk_size = 100;
        config.target_chunk_size = 1000;
        config.max_chunk_size = 2000;
        assert!(config.validate().is_ok());

        config.overlap_percentage = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlap_must_fit_in_chunk() {
        let config = ChunkConfig {
            max_chunk_size: 200,
            min_chunk_size: 10,
            target_chunk_size: 100,
            overlap_size: 200,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ChunkConfig {
            enable_overlap: false,
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_selection_mode_parsing() {
        assert_eq!("strict".parse::<SelectionMode>().unwrap(), SelectionMode::Strict);
        assert_eq!(" Weighted ".parse::<SelectionMode>().unwrap(), SelectionMode::Weighted);
        assert!(matches!(
            "random".parse::<SelectionMode>(),
            Err(ChunkerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ChunkConfig::from_json(r#"{"max_chunk_size": 8000, "selection_mode": "strict"}"#)
            .unwrap();
        assert_eq!(config.max_chunk_size, 8000);
        assert_eq!(config.selection_mode, SelectionMode::Strict);
        assert_eq!(config.min_chunk_size, ChunkConfig::default().min_chunk_size);

        assert!(ChunkConfig::from_json(r#"{"min_chunk_size": 9000}"#).is_err());
    }
}
