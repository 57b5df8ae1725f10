//! Process-wide semantic cache shared by concurrent runs.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

use weft_core::config::CacheConfig;
use weft_core::error::{Result, WeftError};

use crate::embedding::{content_key, cosine_similarity, embed};

/// One cached response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: String,
    pub embedding: Vec<f32>,
    pub last_access: DateTime<Utc>,
    pub hit_count: u64,
    /// Logical access clock; breaks timestamp ties during eviction.
    tick: u64,
}

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub response: String,
    pub similarity: f32,
}

/// Aggregate counters for outer reporting surfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub lookups: u64,
    pub hits: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<u64, CacheEntry>,
    clock: u64,
    lookups: u64,
    hits: u64,
}

/// Approximate-match store mapping normalized prompt text to a previously
/// produced answer.
///
/// All read-modify-write sequences (lookup + touch, insert + evict) happen
/// under one lock acquisition, so concurrent runs never observe a torn
/// update or double-evict.
pub struct SemanticCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    similarity_threshold: f32,
}

impl SemanticCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: config.capacity.max(1),
            similarity_threshold: config.similarity_threshold,
        }
    }

    /// Look up a response for `text`, reporting a hit when cosine
    /// similarity exceeds the configured threshold. A hit bumps the
    /// winning entry's `last_access` and `hit_count`.
    pub fn lookup(&self, text: &str) -> Result<Option<CacheHit>> {
        let query = embed(text);
        let key = content_key(text);

        let mut inner = self
            .inner
            .lock()
            .map_err(|_| WeftError::Cache("cache lock poisoned".into()))?;
        inner.lookups += 1;
        inner.clock += 1;
        let now_tick = inner.clock;

        // Exact-key fast path for identically normalized prompts.
        let winner = if inner.entries.contains_key(&key) {
            Some((key, 1.0f32))
        } else {
            inner
                .entries
                .iter()
                .map(|(k, e)| (*k, cosine_similarity(&query, &e.embedding)))
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                .filter(|(_, sim)| *sim > self.similarity_threshold)
        };

        match winner {
            Some((k, similarity)) => {
                inner.hits += 1;
                let entry = inner
                    .entries
                    .get_mut(&k)
                    .ok_or_else(|| WeftError::Cache("winning entry vanished".into()))?;
                entry.last_access = Utc::now();
                entry.hit_count += 1;
                entry.tick = now_tick;
                debug!(similarity, hit_count = entry.hit_count, "semantic cache hit");
                Ok(Some(CacheHit {
                    response: entry.response.clone(),
                    similarity,
                }))
            }
            None => Ok(None),
        }
    }

    /// Insert a response, evicting the least recently accessed entry when
    /// the store is full.
    pub fn store(&self, text: &str, response: &str) -> Result<()> {
        let embedding = embed(text);
        let key = content_key(text);

        let mut inner = self
            .inner
            .lock()
            .map_err(|_| WeftError::Cache("cache lock poisoned".into()))?;
        inner.clock += 1;
        let tick = inner.clock;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.tick)
                .map(|(k, _)| *k)
            {
                inner.entries.remove(&oldest);
                debug!(evicted = oldest, "semantic cache evicted oldest entry");
            }
        }

        inner.entries.insert(
            key,
            CacheEntry {
                response: response.to_string(),
                embedding,
                last_access: Utc::now(),
                hit_count: 0,
                tick,
            },
        );
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        match self.inner.lock() {
            Ok(inner) => CacheStats {
                entries: inner.entries.len(),
                lookups: inner.lookups,
                hits: inner.hits,
            },
            Err(_) => CacheStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> SemanticCache {
        SemanticCache::new(&CacheConfig::default())
    }

    #[test]
    fn test_miss_on_empty() {
        let c = cache();
        assert!(c.lookup("anything at all").unwrap().is_none());
    }

    #[test]
    fn test_exact_hit_after_store() {
        let c = cache();
        c.store("What is 2+2?", "4").unwrap();
        let hit = c.lookup("What is 2+2?").unwrap().unwrap();
        assert_eq!(hit.response, "4");
        assert!((hit.similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_near_match_hit() {
        let c = cache();
        c.store("what is the capital of France", "Paris").unwrap();
        let hit = c.lookup("What is the capital of France?").unwrap();
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().response, "Paris");
    }

    #[test]
    fn test_dissimilar_text_misses() {
        let c = cache();
        c.store("what is the capital of France", "Paris").unwrap();
        assert!(c
            .lookup("recommend a thriller novel from the nineties")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_hit_updates_counters() {
        let c = cache();
        c.store("hello world", "hi").unwrap();
        c.lookup("hello world").unwrap();
        c.lookup("hello world").unwrap();
        let stats = c.stats();
        assert_eq!(stats.lookups, 2);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_capacity_bound_and_lru_eviction() {
        let c = SemanticCache::new(&CacheConfig {
            capacity: 100,
            similarity_threshold: 0.85,
        });
        // Mostly-disjoint token sets keep cross-entry similarity well
        // below the hit threshold.
        let prompt = |i: usize| format!("prompt {} {} {}", i, i * 7 + 1, i * 13 + 2);
        for i in 0..100 {
            c.store(&prompt(i), "r").unwrap();
        }
        assert_eq!(c.len(), 100);

        // Touch entry 0 so it is no longer the oldest; entry 1 becomes the
        // eviction candidate.
        c.lookup(&prompt(0)).unwrap().unwrap();

        c.store(&prompt(100), "r").unwrap();
        assert_eq!(c.len(), 100);
        assert!(c.lookup(&prompt(0)).unwrap().is_some());
        assert!(c.lookup(&prompt(1)).unwrap().is_none());
    }

    #[test]
    fn test_restore_same_key_does_not_evict() {
        let c = SemanticCache::new(&CacheConfig {
            capacity: 2,
            similarity_threshold: 0.85,
        });
        c.store("alpha bravo", "1").unwrap();
        c.store("charlie delta", "2").unwrap();
        c.store("alpha bravo", "updated").unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.lookup("alpha bravo").unwrap().unwrap().response, "updated");
    }
}
