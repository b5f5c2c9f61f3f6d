use crate::analyzer::ContentAnalysis;
use crate::config::{ChunkConfig, SelectionMode};
use crate::error::{ChunkerError, Result};
use crate::registry::StrategyRegistry;
use crate::strategy::ChunkingStrategy;
use crate::types::StrategyMetrics;
use std::sync::Arc;

/// Scores closer than this are treated as equal
const SCORE_EPSILON: f64 = 1e-9;

/// Chosen strategy plus the audit trail for every candidate
#[derive(Clone)]
pub struct Selection {
    pub strategy: Arc<dyn ChunkingStrategy>,
    pub metrics: Vec<StrategyMetrics>,
}

/// Picks the strategy for a document from its analysis
#[derive(Debug, Clone, Copy)]
pub struct StrategySelector {
    mode: SelectionMode,
    priority_weight: f64,
    quality_weight: f64,
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::from_config(&ChunkConfig::default())
    }
}

impl StrategySelector {
    pub fn from_config(config: &ChunkConfig) -> Self {
        Self {
            mode: config.selection_mode,
            priority_weight: config.priority_weight,
            quality_weight: config.quality_weight,
        }
    }

    pub const fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Weighted score of one strategy
    pub fn score(&self, strategy: &dyn ChunkingStrategy, analysis: &ContentAnalysis) -> f64 {
        let priority = f64::from(strategy.priority().max(1));
        self.priority_weight / priority + self.quality_weight * strategy.calculate_quality(analysis)
    }

    /// Metrics for every registered strategy, by ascending priority
    pub fn metrics(
        &self,
        analysis: &ContentAnalysis,
        config: &ChunkConfig,
        registry: &StrategyRegistry,
    ) -> Vec<StrategyMetrics> {
        registry
            .iter()
            .map(|strategy| {
                let can_handle = strategy.can_handle(analysis, config);
                StrategyMetrics {
                    name: strategy.name().to_string(),
                    can_handle,
                    quality_score: strategy.calculate_quality(analysis),
                    priority: strategy.priority(),
                    final_score: if can_handle {
                        self.score(strategy.as_ref(), analysis)
                    } else {
                        0.0
                    },
                    reason: strategy.selection_reason(analysis, config),
                }
            })
            .collect()
    }

    /// Choose a strategy
    ///
    /// Fails with [`ChunkerError::SelectionFailed`] when no registered
    /// strategy can handle the document.
    pub fn select(
        &self,
        analysis: &ContentAnalysis,
        config: &ChunkConfig,
        registry: &StrategyRegistry,
    ) -> Result<Selection> {
        let metrics = self.metrics(analysis, config, registry);

        let chosen = match self.mode {
            SelectionMode::Strict => metrics.iter().position(|m| m.can_handle),
            SelectionMode::Weighted => {
                let mut best: Option<usize> = None;
                for (idx, candidate) in metrics.iter().enumerate().filter(|(_, m)| m.can_handle) {
                    // Registry order is ascending priority, so earlier entries win ties
                    let better = best.map_or(true, |b| {
                        candidate.final_score > metrics[b].final_score + SCORE_EPSILON
                    });
                    if better {
                        best = Some(idx);
                    }
                }
                best
            }
        };

        let strategy = chosen
            .and_then(|idx| registry.iter().nth(idx).cloned())
            .ok_or_else(|| {
                ChunkerError::SelectionFailed(format!(
                    "none of {} registered strategies can handle {} content",
                    registry.len(),
                    analysis.content_type
                ))
            })?;

        log::debug!(
            "Selected strategy '{}' ({} mode)",
            strategy.name(),
            self.mode
        );

        Ok(Selection { strategy, metrics })
    }
}
