use crate::config::ChunkConfig;
use crate::error::Result;
use crate::types::ChunkingResult;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Digest of (content, configuration, explicit strategy)
pub type CacheKey = [u8; 32];

/// In-memory LRU cache of finished chunking results
pub struct ResultCache {
    entries: Mutex<LruCache<CacheKey, Arc<ChunkingResult>>>,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cache key for one invocation
    pub fn key(text: &str, config: &ChunkConfig, strategy: Option<&str>) -> Result<CacheKey> {
        let config_json = serde_json::to_string(config)?;
        let mut hasher = Sha256::new();
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
        hasher.update(config_json.as_bytes());
        hasher.update([0u8]);
        hasher.update(strategy.unwrap_or_default().as_bytes());
        Ok(hasher.finalize().into())
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ChunkingResult>> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, result: Arc<ChunkingResult>) {
        self.lock().put(key, result);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    // Poisoned locks are recovered; entries are replaced whole.
    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Arc<ChunkingResult>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_depends_on_all_inputs() {
        let config = ChunkConfig::default();
        let base = ResultCache::key("text", &config, None).unwrap();
        assert_eq!(base, ResultCache::key("text", &config, None).unwrap());
        assert_ne!(base, ResultCache::key("text!", &config, None).unwrap());
        assert_ne!(base, ResultCache::key("text", &config, Some("code")).unwrap());
        assert_ne!(base, ResultCache::key("text", &ChunkConfig::for_chat(), None).unwrap());
    }

    #[test]
    fn test_lru_eviction_and_clear() {
        let cache = ResultCache::new(2);
        let config = ChunkConfig::default();
        let keys: Vec<CacheKey> = ["a", "b", "c"]
            .iter()
            .map(|t| ResultCache::key(t, &config, None).unwrap())
            .collect();

        for key in &keys {
            cache.insert(*key, Arc::new(ChunkingResult::empty("sentences")));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&keys[0]).is_none());
        assert!(cache.get(&keys[2]).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one_entry() {
        assert_eq!(ResultCache::new(0).capacity(), 1);
    }
}
