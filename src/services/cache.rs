//! Bounded in-memory cache of text embeddings.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::models::EvictionPolicyKind;

/// A cached vector with the bookkeeping eviction policies look at.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub vector: Vec<f32>,
    /// Logical clock value of the last read or write.
    pub last_used: u64,
    pub hits: u64,
}

/// Picks the entry to drop when the cache is full.
pub trait EvictionPolicy: Send + Sync {
    fn select_victim(&self, entries: &HashMap<String, CacheEntry>) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeastRecentlyUsed;

impl EvictionPolicy for LeastRecentlyUsed {
    fn select_victim(&self, entries: &HashMap<String, CacheEntry>) -> Option<String> {
        entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())
    }
}

/// Fewest hits first; ties go to the least recently used.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastFrequentlyUsed;

impl EvictionPolicy for LeastFrequentlyUsed {
    fn select_victim(&self, entries: &HashMap<String, CacheEntry>) -> Option<String> {
        entries
            .iter()
            .min_by_key(|(_, entry)| (entry.hits, entry.last_used))
            .map(|(key, _)| key.clone())
    }
}

pub fn policy_for(kind: EvictionPolicyKind) -> Box<dyn EvictionPolicy> {
    match kind {
        EvictionPolicyKind::Lru => Box::new(LeastRecentlyUsed),
        EvictionPolicyKind::Lfu => Box::new(LeastFrequentlyUsed),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Text → embedding cache keyed by the SHA-256 of the text.
///
/// Victim selection scans every entry, so an insert into a full cache costs
/// O(capacity). Lookups and inserts below capacity are O(1).
pub struct EmbeddingCache {
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
    policy: Box<dyn EvictionPolicy>,
    clock: u64,
    stats: CacheStats,
}

impl EmbeddingCache {
    pub fn new(capacity: usize, policy: Box<dyn EvictionPolicy>) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::with_capacity(capacity.min(4096)),
            policy,
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn lru(capacity: usize) -> Self {
        Self::new(capacity, Box::new(LeastRecentlyUsed))
    }

    pub fn key(text: &str) -> String {
        hex::encode(Sha256::digest(text.as_bytes()))
    }

    pub fn get(&mut self, text: &str) -> Option<Vec<f32>> {
        self.clock += 1;
        let now = self.clock;
        match self.entries.get_mut(&Self::key(text)) {
            Some(entry) => {
                entry.last_used = now;
                entry.hits += 1;
                self.stats.hits += 1;
                Some(entry.vector.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Store `vector` for `text`, evicting one entry first when a new key
    /// arrives at capacity.
    pub fn insert(&mut self, text: &str, vector: Vec<f32>) {
        self.clock += 1;
        let key = Self::key(text);

        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.capacity {
                let Some(victim) = self.policy.select_victim(&self.entries) else {
                    break;
                };
                self.entries.remove(&victim);
                self.stats.evictions += 1;
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                vector,
                last_used: self.clock,
                hits: 0,
            },
        );
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(&Self::key(text))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }
}
