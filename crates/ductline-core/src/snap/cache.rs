//! Memo of recent snap queries.
//!
//! Pointer positions repeat or cluster during a drag, so queries are cached
//! by rounded position for a short time. Each entry keeps the result for the
//! position that filled it plus the candidate neighbourhood around it, so a
//! different position with the same key can be answered exactly. Entries
//! expire after their TTL and the least recently used entry is evicted once
//! capacity is reached.

use super::{SnapPoint, SnapResult};
use kurbo::Point;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};
#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Default maximum number of cached results.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Default entry lifetime in milliseconds.
pub const DEFAULT_CACHE_TTL_MS: u64 = 100;

/// Default rounding step for cache keys, in world units.
pub const DEFAULT_CACHE_PRECISION: f64 = 1.0;

/// Cache key: rounded query position plus everything that shapes the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    x: i64,
    y: i64,
    config_version: u64,
    exclude_mask: u8,
    snap_threshold_bits: u64,
    magnetic_threshold_bits: u64,
}

impl CacheKey {
    /// Build a key for a query.
    ///
    /// Positions are rounded to multiples of `precision` so sub-unit jitter
    /// maps onto the same key.
    pub fn new(
        position: Point,
        precision: f64,
        config_version: u64,
        exclude_mask: u8,
        snap_threshold: f64,
        magnetic_threshold: f64,
    ) -> Self {
        Self {
            x: (position.x / precision).round() as i64,
            y: (position.y / precision).round() as i64,
            config_version,
            exclude_mask,
            snap_threshold_bits: snap_threshold.to_bits(),
            magnetic_threshold_bits: magnetic_threshold.to_bits(),
        }
    }
}

/// A memoized query.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery {
    /// Exact position the query was run for.
    pub origin: Point,
    /// Result for `origin`.
    pub result: SnapResult,
    /// Every candidate that any position sharing the key could snap to,
    /// in no particular order.
    pub neighbourhood: Vec<SnapPoint>,
}

impl CachedQuery {
    /// Upper bound on the distance between two positions that share a key.
    pub fn key_spread(precision: f64) -> f64 {
        precision * std::f64::consts::SQRT_2
    }

    fn payload_bytes(&self) -> usize {
        let point_bytes = |p: &SnapPoint| std::mem::size_of::<SnapPoint>() + p.id.len() + p.element_id.len();
        self.result.snap_point.as_ref().map_or(0, |p| p.id.len() + p.element_id.len())
            + self.neighbourhood.iter().map(point_bytes).sum::<usize>()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    query: CachedQuery,
    inserted_at: Instant,
    ttl: Duration,
    tick: u64,
}

/// Cache counters for the diagnostics surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 before the first lookup.
    pub hit_rate: f64,
    pub entry_count: usize,
    /// Entries dropped to make room for new ones.
    pub eviction_count: u64,
    /// Entries dropped because their TTL ran out.
    pub expired_count: u64,
    /// Rough heap footprint in bytes.
    pub memory_usage_estimate: usize,
}

/// TTL + LRU cache of snap queries.
#[derive(Debug, Clone)]
pub struct SnapCache {
    capacity: usize,
    entries: HashMap<CacheKey, CacheEntry>,
    /// Recency order: smallest tick is least recently used.
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl Default for SnapCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl SnapCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity, evicting least recently used entries if needed.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.evict_lru();
        }
    }

    /// Number of live entries (expired ones included until touched).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    /// Look up a query.
    pub fn get(&mut self, key: &CacheKey) -> Option<CachedQuery> {
        self.get_at(key, Instant::now())
    }

    /// Look up a query as of `now`. Expired entries are removed and count as misses.
    pub fn get_at(&mut self, key: &CacheKey, now: Instant) -> Option<CachedQuery> {
        let expired = match self.entries.get(key) {
            None => {
                self.misses += 1;
                return None;
            }
            Some(entry) => now.saturating_duration_since(entry.inserted_at) > entry.ttl,
        };

        if expired {
            if let Some(entry) = self.entries.remove(key) {
                self.recency.remove(&entry.tick);
            }
            self.expirations += 1;
            self.misses += 1;
            return None;
        }

        let tick = self.touch();
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        self.recency.insert(tick, *key);
        self.hits += 1;
        Some(entry.query.clone())
    }

    /// Store a query.
    pub fn set(&mut self, key: CacheKey, query: CachedQuery, ttl: Duration) {
        self.set_at(key, query, ttl, Instant::now());
    }

    /// Store a query as of `now`, evicting the least recently used entry when full.
    pub fn set_at(&mut self, key: CacheKey, query: CachedQuery, ttl: Duration, now: Instant) {
        if let Some(old) = self.entries.remove(&key) {
            self.recency.remove(&old.tick);
        } else if self.entries.len() >= self.capacity {
            self.evict_lru();
        }

        let tick = self.touch();
        self.recency.insert(tick, key);
        self.entries.insert(
            key,
            CacheEntry {
                query,
                inserted_at: now,
                ttl,
                tick,
            },
        );
    }

    fn evict_lru(&mut self) {
        if let Some((_, key)) = self.recency.pop_first() {
            self.entries.remove(&key);
            self.evictions += 1;
        }
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    /// Reset the hit/miss/eviction counters.
    pub fn reset_metrics(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
        self.expirations = 0;
    }

    /// Current counters.
    pub fn metrics(&self) -> CacheMetrics {
        let lookups = self.hits + self.misses;
        let per_entry = std::mem::size_of::<CacheKey>() * 2
            + std::mem::size_of::<CacheEntry>()
            + std::mem::size_of::<u64>();
        let payload: usize = self.entries.values().map(|e| e.query.payload_bytes()).sum();

        CacheMetrics {
            hits: self.hits,
            misses: self.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                self.hits as f64 / lookups as f64
            },
            entry_count: self.entries.len(),
            eviction_count: self.evictions,
            expired_count: self.expirations,
            memory_usage_estimate: self.entries.len() * per_entry + payload,
        }
    }
}
