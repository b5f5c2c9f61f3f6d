use crate::error::{ChunkerError, Result};
use crate::strategy::{default_strategies, ChunkingStrategy};
use std::fmt;
use std::sync::Arc;

/// Named strategies ordered by ascending priority (then name)
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn ChunkingStrategy>>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| (s.name(), s.priority())))
            .finish()
    }
}

impl StrategyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the six built-in strategies
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for strategy in default_strategies() {
            registry.insert_sorted(strategy);
        }
        registry
    }

    /// Add a strategy; names must be unique
    pub fn register(&mut self, strategy: Arc<dyn ChunkingStrategy>) -> Result<()> {
        if self.get(strategy.name()).is_some() {
            return Err(ChunkerError::DuplicateStrategy(strategy.name().to_string()));
        }
        log::debug!(
            "Registered strategy '{}' (priority {})",
            strategy.name(),
            strategy.priority()
        );
        self.insert_sorted(strategy);
        Ok(())
    }

    /// Remove a strategy by name; returns whether it was present
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.strategies.len();
        self.strategies.retain(|s| s.name() != name);
        before != self.strategies.len()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ChunkingStrategy>> {
        self.strategies.iter().find(|s| s.name() == name).cloned()
    }

    /// Names by ascending priority
    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ChunkingStrategy>> {
        self.strategies.iter()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    fn insert_sorted(&mut self, strategy: Arc<dyn ChunkingStrategy>) {
        let key = (strategy.priority(), strategy.name().to_string());
        let at = self
            .strategies
            .partition_point(|s| (s.priority(), s.name()) <= (key.0, key.1.as_str()));
        self.strategies.insert(at, strategy);
    }
}
