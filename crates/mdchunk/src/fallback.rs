use crate::config::ChunkConfig;
use crate::document::ParsedDocument;
use crate::registry::StrategyRegistry;
use crate::strategy::{ChunkingStrategy, SentencesStrategy};
use crate::types::Chunk;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const STRUCTURAL: &str = "structural";
const SENTENCES: &str = "sentences";

/// One step of the fallback chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackAttempt {
    /// 0 = selected strategy, 1 = structural, 2 = sentences
    pub level: u8,
    pub strategy: String,
    pub succeeded: bool,
    pub reason: String,
}

/// Result of running the fallback chain
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome {
    pub chunks: Vec<Chunk>,
    pub strategy_used: String,
    pub level: u8,
    pub attempts: Vec<FallbackAttempt>,
}

impl FallbackOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.chunks.is_empty()
    }

    /// Failure reasons of every unsuccessful attempt
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| !a.succeeded)
            .map(|a| format!("level {} ({}): {}", a.level, a.strategy, a.reason))
            .collect()
    }
}

/// Runs the selected strategy and, on failure, progressively safer ones
///
/// A failure is an error from `apply` or an empty chunk list. The chain never
/// returns an error: when every level fails the outcome has no chunks and
/// carries the accumulated reasons.
#[derive(Clone)]
pub struct FallbackExecutor {
    sentences: Arc<dyn ChunkingStrategy>,
}

impl Default for FallbackExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackExecutor {
    pub fn new() -> Self {
        Self {
            sentences: Arc::new(SentencesStrategy),
        }
    }

    pub fn execute(
        &self,
        doc: &ParsedDocument,
        primary: Option<Arc<dyn ChunkingStrategy>>,
        registry: &StrategyRegistry,
        config: &ChunkConfig,
    ) -> FallbackOutcome {
        let chain = self.chain(primary, registry, config);
        let mut attempts = Vec::with_capacity(chain.len());

        for (level, strategy) in chain {
            match strategy.apply(doc, config) {
                Ok(chunks) if !chunks.is_empty() => {
                    attempts.push(FallbackAttempt {
                        level,
                        strategy: strategy.name().to_string(),
                        succeeded: true,
                        reason: format!("produced {} chunks", chunks.len()),
                    });
                    return FallbackOutcome {
                        chunks,
                        strategy_used: strategy.name().to_string(),
                        level,
                        attempts,
                    };
                }
                Ok(_) => {
                    log::warn!("Strategy '{}' produced no chunks", strategy.name());
                    attempts.push(FallbackAttempt {
                        level,
                        strategy: strategy.name().to_string(),
                        succeeded: false,
                        reason: "produced no chunks".to_string(),
                    });
                }
                Err(err) => {
                    log::warn!("Strategy '{}' failed: {}", strategy.name(), err);
                    attempts.push(FallbackAttempt {
                        level,
                        strategy: strategy.name().to_string(),
                        succeeded: false,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let (strategy_used, level) = attempts
            .last()
            .map_or(("none".to_string(), 0), |a| (a.strategy.clone(), a.level));
        FallbackOutcome {
            chunks: Vec::new(),
            strategy_used,
            level,
            attempts,
        }
    }

    /// Ordered (level, strategy) list with duplicate names removed
    fn chain(
        &self,
        primary: Option<Arc<dyn ChunkingStrategy>>,
        registry: &StrategyRegistry,
        config: &ChunkConfig,
    ) -> Vec<(u8, Arc<dyn ChunkingStrategy>)> {
        let mut chain: Vec<(u8, Arc<dyn ChunkingStrategy>)> = Vec::with_capacity(3);
        if let Some(primary) = primary {
            chain.push((0, primary));
        }
        if !config.enable_fallback && !chain.is_empty() {
            return chain;
        }

        let candidates = [
            (1, registry.get(STRUCTURAL)),
            (2, Some(registry.get(SENTENCES).unwrap_or_else(|| Arc::clone(&self.sentences)))),
        ];
        for (level, candidate) in candidates {
            let Some(strategy) = candidate else {
                continue;
            };
            if chain.iter().all(|(_, s)| s.name() != strategy.name()) {
                chain.push((level, strategy));
            }
        }
        chain
    }
}
