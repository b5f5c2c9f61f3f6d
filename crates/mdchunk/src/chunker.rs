use crate::analyzer::{ContentAnalysis, ContentAnalyzer};
use crate::ast::AstBuilder;
use crate::cache::ResultCache;
use crate::config::ChunkConfig;
use crate::document::ParsedDocument;
use crate::error::{ChunkerError, Result};
use crate::fallback::FallbackExecutor;
use crate::metadata::MetadataEnricher;
use crate::overlap::OverlapProcessor;
use crate::registry::StrategyRegistry;
use crate::selector::StrategySelector;
use crate::strategy::ChunkingStrategy;
use crate::types::{keys, Chunk, ChunkStatistics, ChunkingResult, ChunkingWarning, StrategyMetrics, WarningCode};
use crate::validation::{BlockTracker, CompletenessValidator};
use crate::window::{split_windows, Window};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Reported as `strategy_used` when no strategy ran
const NO_STRATEGY: &str = "none";

/// Adaptive Markdown chunking engine
///
/// Owns the strategy registry and the optional result cache. `chunk` takes
/// `&self` and may be called from many threads at once.
pub struct MarkdownChunker {
    config: ChunkConfig,
    registry: StrategyRegistry,
    selector: StrategySelector,
    analyzer: ContentAnalyzer,
    fallback: FallbackExecutor,
    overlap: OverlapProcessor,
    enricher: MetadataEnricher,
    validator: CompletenessValidator,
    cache: Option<ResultCache>,
}

impl fmt::Debug for MarkdownChunker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkdownChunker")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Default for MarkdownChunker {
    fn default() -> Self {
        Self::build(ChunkConfig::default(), StrategyRegistry::with_defaults())
    }
}

/// Per-invocation accumulator shared by all windows
#[derive(Default)]
struct Pass {
    chunks: Vec<Chunk>,
    warnings: Vec<ChunkingWarning>,
    errors: Vec<String>,
    strategies: Vec<String>,
    fallback_used: bool,
    fallback_level: u8,
    metrics: Vec<StrategyMetrics>,
    analysis: Option<ContentAnalysis>,
}

impl MarkdownChunker {
    /// Engine with the built-in strategies
    pub fn new(config: ChunkConfig) -> Result<Self> {
        Self::with_registry(config, StrategyRegistry::with_defaults())
    }

    /// Engine with a caller-supplied registry
    pub fn with_registry(config: ChunkConfig, registry: StrategyRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, registry))
    }

    fn build(config: ChunkConfig, registry: StrategyRegistry) -> Self {
        let cache = config
            .enable_cache
            .then(|| ResultCache::new(config.cache_capacity));
        Self {
            selector: StrategySelector::from_config(&config),
            analyzer: ContentAnalyzer::new(&config),
            fallback: FallbackExecutor::new(),
            overlap: OverlapProcessor::new(&config),
            enricher: MetadataEnricher::new(),
            validator: CompletenessValidator::new(&config),
            config,
            registry,
            cache,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Registered strategy names by ascending priority
    #[must_use]
    pub fn strategy_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn register_strategy(&mut self, strategy: Arc<dyn ChunkingStrategy>) -> Result<()> {
        self.registry.register(strategy)?;
        self.clear_cache();
        Ok(())
    }

    pub fn unregister_strategy(&mut self, name: &str) -> bool {
        let removed = self.registry.unregister(name);
        if removed {
            self.clear_cache();
        }
        removed
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Content profile of `text` without chunking it
    #[must_use]
    pub fn analyze(&self, text: &str) -> ContentAnalysis {
        let text = normalize_input(text);
        self.analyzer.analyze(&AstBuilder::new().build(&text))
    }

    /// Chunk and return only the chunk list
    pub fn chunk_simple(&self, text: &str) -> Result<Vec<Chunk>> {
        Ok(self.chunk(text, None)?.chunks)
    }

    /// Chunk raw bytes, rejecting invalid UTF-8
    pub fn chunk_bytes(&self, bytes: &[u8], strategy: Option<&str>) -> Result<ChunkingResult> {
        let text = std::str::from_utf8(bytes)
            .map_err(|err| ChunkerError::invalid_input(format!("input is not valid UTF-8: {err}")))?;
        self.chunk(text, strategy)
    }

    /// Chunk a document
    ///
    /// `strategy` forces a registered strategy by name, bypassing selection;
    /// the fallback chain still applies. Strategy failures never surface as
    /// errors: the result carries warnings and the collected reasons instead.
    pub fn chunk(&self, text: &str, strategy: Option<&str>) -> Result<ChunkingResult> {
        let started = Instant::now();
        let forced = strategy
            .map(|name| {
                self.registry
                    .get(name)
                    .ok_or_else(|| ChunkerError::UnknownStrategy(name.to_string()))
            })
            .transpose()?;

        let text = normalize_input(text);
        if text.trim().is_empty() {
            let mut result = ChunkingResult::empty(NO_STRATEGY);
            result.warnings.push(ChunkingWarning::new(
                WarningCode::EmptyInput,
                "input is empty or contains only whitespace",
            ));
            result.processing_time_ms = elapsed_ms(started);
            return Ok(result);
        }

        let cache_key = match &self.cache {
            Some(cache) => {
                let key = ResultCache::key(&text, &self.config, strategy)?;
                if let Some(hit) = cache.get(&key) {
                    log::debug!("Result cache hit ({} chunks)", hit.chunks.len());
                    return Ok(ChunkingResult::clone(&hit));
                }
                Some(key)
            }
            None => None,
        };

        let result = self.run(&text, forced, started)?;

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            cache.insert(key, Arc::new(result.clone()));
        }
        Ok(result)
    }

    fn run(
        &self,
        text: &str,
        forced: Option<Arc<dyn ChunkingStrategy>>,
        started: Instant,
    ) -> Result<ChunkingResult> {
        let windowed = text.len() > self.config.large_document_threshold;
        let windows = if windowed {
            split_windows(text, self.config.window_size)
        } else {
            vec![Window {
                text,
                byte_offset: 0,
                line_offset: 0,
            }]
        };

        let mut pass = Pass::default();
        let mut tracker = BlockTracker::new();
        if windowed {
            log::debug!(
                "Processing {} bytes in {} windows of up to {} bytes",
                text.len(),
                windows.len(),
                self.config.window_size
            );
            pass.warnings.push(ChunkingWarning::new(
                WarningCode::WindowedProcessing,
                format!(
                    "document of {} bytes exceeds {} bytes; processed in {} windows",
                    text.len(),
                    self.config.large_document_threshold,
                    windows.len()
                ),
            ));
        }

        for window in &windows {
            let doc = ParsedDocument::parse_window(window.text, window.line_offset, window.byte_offset);
            tracker.register_document(&doc);
            self.chunk_window(&doc, forced.as_ref(), windowed, &mut pass);
        }

        let mut chunks = std::mem::take(&mut pass.chunks);
        chunks.sort_by_key(|c| c.start_line);
        let chunks = self.overlap.apply(chunks);
        let chunks = self.enricher.enrich(chunks);

        let report = self.validator.validate(&mut tracker, text, &chunks);
        pass.warnings.extend(self.validator.check(&report)?);
        pass.warnings.extend(self.oversize_warnings(&chunks));

        let strategy_used = if pass.strategies.is_empty() {
            NO_STRATEGY.to_string()
        } else {
            pass.strategies.join("+")
        };
        log::debug!(
            "Chunked {} bytes into {} chunks with '{}'",
            text.len(),
            chunks.len(),
            strategy_used
        );

        Ok(ChunkingResult {
            statistics: ChunkStatistics::from_chunks(&chunks),
            chunks,
            strategy_used,
            fallback_used: pass.fallback_used,
            fallback_level: pass.fallback_level,
            processing_time_ms: elapsed_ms(started),
            warnings: pass.warnings,
            errors: pass.errors,
            analysis: pass.analysis,
            strategy_metrics: pass.metrics,
            windowed,
        })
    }

    fn chunk_window(
        &self,
        doc: &ParsedDocument,
        forced: Option<&Arc<dyn ChunkingStrategy>>,
        windowed: bool,
        pass: &mut Pass,
    ) {
        for diagnostic in doc.tree().diagnostics() {
            let line = diagnostic.line + doc.line_offset();
            log::warn!("Parse degradation at line {}: {}", line, diagnostic.message);
            pass.warnings.push(ChunkingWarning::new(
                WarningCode::ParseDegradation,
                format!("line {}: {}", line, diagnostic.message),
            ));
        }

        let analysis = self.analyzer.analyze(doc.tree());
        let (primary, metrics) = match forced {
            Some(strategy) => (
                Some(Arc::clone(strategy)),
                self.selector.metrics(&analysis, &self.config, &self.registry),
            ),
            None => match self.selector.select(&analysis, &self.config, &self.registry) {
                Ok(selection) => (Some(selection.strategy), selection.metrics),
                Err(err) => {
                    log::warn!("{}", err);
                    pass.warnings.push(ChunkingWarning::new(
                        WarningCode::SelectionFailure,
                        err.to_string(),
                    ));
                    pass.errors.push(err.to_string());
                    (None, self.selector.metrics(&analysis, &self.config, &self.registry))
                }
            },
        };
        let had_primary = primary.is_some();

        let outcome = self.fallback.execute(doc, primary, &self.registry, &self.config);
        if outcome.succeeded() && (outcome.level > 0 || !had_primary) {
            pass.warnings.push(ChunkingWarning::new(
                WarningCode::StrategyFallback,
                format!(
                    "fell back to '{}' (level {}) at line {}",
                    outcome.strategy_used,
                    outcome.level,
                    doc.line_offset() + 1
                ),
            ));
        }
        if outcome.level > 0 || !had_primary {
            pass.fallback_used = true;
        }
        pass.fallback_level = pass.fallback_level.max(outcome.level);
        pass.errors.extend(outcome.errors());

        if outcome.succeeded() && !pass.strategies.contains(&outcome.strategy_used) {
            pass.strategies.push(outcome.strategy_used.clone());
        }
        pass.chunks.extend(outcome.chunks);

        if pass.metrics.is_empty() {
            pass.metrics = metrics;
        }
        if !windowed {
            pass.analysis = Some(analysis);
        }
    }

    fn oversize_warnings(&self, chunks: &[Chunk]) -> Vec<ChunkingWarning> {
        chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_oversize())
            .map(|(idx, c)| {
                let reason = c.get_str(keys::OVERSIZE_REASON).unwrap_or("unsplittable");
                ChunkingWarning::new(
                    WarningCode::OversizeChunk,
                    format!(
                        "chunk {} (lines {}-{}) has {} chars, above the {} limit ({})",
                        idx,
                        c.start_line,
                        c.end_line,
                        c.size(),
                        self.config.max_chunk_size,
                        reason
                    ),
                )
            })
            .collect()
    }
}

/// Strip a byte order mark and normalize CRLF line endings
fn normalize_input(text: &str) -> Cow<'_, str> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.contains("\r\n") {
        Cow::Owned(text.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
