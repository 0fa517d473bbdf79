//! Bounded, concurrent caches mapping regex source bytes to compiled matchers
//! and to prefix decompositions.
//!
//! A query engine owns one [`RegexpCaches`] instance and threads it through
//! every [`crate::filters::TagFilters`] it builds; there is no process-global
//! state, and fresh instances in tests prove absence of cross-test leakage.

use crate::error::FilterError;
use crate::regexutil::{get_regexp_prefix, CompiledRegexp, DEFAULT_MAX_OR_VALUES};
use crate::telemetry::{filter_metrics, noop_event_listener, FilterEvent, FilterEventListener};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

/// Shards per cache. Lookups take a single shard read lock; misses serialise
/// only on the shard holding the key.
const SHARD_COUNT: usize = 16;

/// Default capacity of the compiled-regexp cache.
pub const DEFAULT_REGEXP_CACHE_CAPACITY: usize = 1024;
/// Default capacity of the prefix-decomposition cache.
pub const DEFAULT_PREFIX_CACHE_CAPACITY: usize = 1024;

/// Configuration for [`RegexpCaches`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexpCacheConfig {
    /// Maximum number of compiled regexps kept across all shards.
    pub regexp_cache_capacity: usize,
    /// Maximum number of prefix decompositions kept across all shards.
    pub prefix_cache_capacity: usize,
    /// Cap on enumerated OR-values per expression.
    pub max_or_values: usize,
}

impl Default for RegexpCacheConfig {
    fn default() -> Self {
        RegexpCacheConfig {
            regexp_cache_capacity: DEFAULT_REGEXP_CACHE_CAPACITY,
            prefix_cache_capacity: DEFAULT_PREFIX_CACHE_CAPACITY,
            max_or_values: DEFAULT_MAX_OR_VALUES,
        }
    }
}

/// A cached `(prefix, residual)` decomposition of a regex source string.
#[derive(Debug, Clone)]
pub struct RegexpPrefix {
    pub prefix: Vec<u8>,
    pub suffix: Vec<u8>,
}

/// Concurrent caches for compiled regexps and prefix decompositions.
///
/// Entries are immutable and reconstructible, so eviction never invalidates a
/// reference already returned to a caller, and duplicate concurrent misses may
/// each compile once without harm.
#[derive(Debug)]
pub struct RegexpCaches {
    regexps: ShardedCache<CompiledRegexp>,
    prefixes: ShardedCache<RegexpPrefix>,
    max_or_values: usize,
    event_listener: Arc<dyn FilterEventListener>,
}

impl RegexpCaches {
    pub fn new(config: RegexpCacheConfig) -> Self {
        Self::with_event_listener(config, noop_event_listener())
    }

    pub fn with_event_listener(
        config: RegexpCacheConfig,
        event_listener: Arc<dyn FilterEventListener>,
    ) -> Self {
        RegexpCaches {
            regexps: ShardedCache::new(config.regexp_cache_capacity),
            prefixes: ShardedCache::new(config.prefix_cache_capacity),
            max_or_values: config.max_or_values,
            event_listener,
        }
    }

    /// Returns the compiled, anchored matcher for `expr`, compiling on a miss.
    pub fn regexp(&self, expr: &[u8]) -> Result<Arc<CompiledRegexp>, FilterError> {
        if let Some(hit) = self.regexps.get(expr) {
            filter_metrics::record_regexp_cache_hit();
            return Ok(hit);
        }
        filter_metrics::record_regexp_cache_miss();

        let pattern = std::str::from_utf8(expr).map_err(|e| FilterError::RegexParse {
            expr: String::from_utf8_lossy(expr).into_owned(),
            reason: e.to_string(),
        })?;
        let compiled = match CompiledRegexp::compile(pattern, self.max_or_values) {
            Ok(compiled) => compiled,
            Err(err) => {
                self.event_listener.on_event(FilterEvent::RegexpCompileFailed {
                    expr: pattern.to_string(),
                    error: err.to_string(),
                });
                return Err(err);
            }
        };
        filter_metrics::record_regexp_compilation();

        let value = Arc::new(compiled);
        let evicted = self.regexps.insert(expr, Arc::clone(&value));
        if evicted > 0 {
            filter_metrics::record_regexp_cache_evictions(evicted as u64);
            self.event_listener
                .on_event(FilterEvent::RegexpCacheEvicted { entries: evicted });
        }
        Ok(value)
    }

    /// Returns the `(prefix, residual)` decomposition for `expr`. Total: an
    /// invalid pattern decomposes to `(expr, "")`.
    pub fn regexp_prefix(&self, expr: &[u8]) -> Arc<RegexpPrefix> {
        if let Some(hit) = self.prefixes.get(expr) {
            filter_metrics::record_prefix_cache_hit();
            return hit;
        }
        filter_metrics::record_prefix_cache_miss();

        let (prefix, suffix) = get_regexp_prefix(expr);
        let value = Arc::new(RegexpPrefix { prefix, suffix });
        let evicted = self.prefixes.insert(expr, Arc::clone(&value));
        if evicted > 0 {
            filter_metrics::record_prefix_cache_evictions(evicted as u64);
            self.event_listener
                .on_event(FilterEvent::PrefixCacheEvicted { entries: evicted });
        }
        value
    }

    /// Current number of cached compiled regexps.
    pub fn regexp_cache_len(&self) -> usize {
        self.regexps.len()
    }

    /// Current number of cached prefix decompositions.
    pub fn prefix_cache_len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn max_or_values(&self) -> usize {
        self.max_or_values
    }
}

#[derive(Debug)]
struct ShardedCache<V> {
    shards: Vec<RwLock<HashMap<Box<[u8]>, Arc<V>>>>,
    max_entries_per_shard: usize,
}

impl<V> ShardedCache<V> {
    fn new(capacity: usize) -> Self {
        let max_entries_per_shard = capacity.div_ceil(SHARD_COUNT).max(1);
        let shards = (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect();
        ShardedCache {
            shards,
            max_entries_per_shard,
        }
    }

    fn shard(&self, key: &[u8]) -> &RwLock<HashMap<Box<[u8]>, Arc<V>>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    fn get(&self, key: &[u8]) -> Option<Arc<V>> {
        self.shard(key)
            .read()
            .expect("regexp cache lock")
            .get(key)
            .cloned()
    }

    /// Inserts `value`, evicting an arbitrary batch of entries first when the
    /// shard is full. Returns the number of evicted entries.
    fn insert(&self, key: &[u8], value: Arc<V>) -> usize {
        let mut map = self.shard(key).write().expect("regexp cache lock");
        let mut evicted = 0;
        if map.len() >= self.max_entries_per_shard && !map.contains_key(key) {
            // Entries are reconstructible; dropping an arbitrary quarter of the
            // shard only costs recompiles.
            let batch = (self.max_entries_per_shard / 4).max(1);
            let victims: Vec<Box<[u8]>> = map.keys().take(batch).cloned().collect();
            for victim in &victims {
                map.remove(victim);
            }
            evicted = victims.len();
        }
        map.insert(key.into(), value);
        evicted
    }

    fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().expect("regexp cache lock").len())
            .sum()
    }
}
