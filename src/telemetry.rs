//! Structured, in-process observability for the filter core.

use std::sync::Arc;

/// Structured event hook for observability.
///
/// This crate is a library; emitting logs directly is not acceptable for
/// production. Callers can provide an implementation that forwards these
/// events to `tracing`, `log`, metrics, or custom sinks.
pub trait FilterEventListener: std::fmt::Debug + Send + Sync + 'static {
    fn on_event(&self, event: FilterEvent);
}

/// Structured events emitted by the filter core.
#[derive(Debug, Clone)]
pub enum FilterEvent {
    RegexpCompileFailed { expr: String, error: String },
    RegexpCacheEvicted { entries: usize },
    PrefixCacheEvicted { entries: usize },
}

#[derive(Debug)]
pub struct NoopEventListener;

impl FilterEventListener for NoopEventListener {
    #[inline]
    fn on_event(&self, _event: FilterEvent) {}
}

pub fn noop_event_listener() -> Arc<dyn FilterEventListener> {
    Arc::new(NoopEventListener)
}

/// Metrics instrumentation over the `metrics` facade.
///
/// Recording is effectively a no-op until the enclosing engine installs a
/// recorder; this crate never installs one itself.
pub mod filter_metrics {
    use ::metrics::{describe_counter, Unit};

    // Counters are exposed as `<name>_total` by Prometheus-style exporters.

    pub const REGEXP_CACHE_HITS: &str = "tagsieve_regexp_cache_hits";
    pub const REGEXP_CACHE_MISSES: &str = "tagsieve_regexp_cache_misses";
    pub const REGEXP_CACHE_EVICTIONS: &str = "tagsieve_regexp_cache_evictions";
    pub const PREFIX_CACHE_HITS: &str = "tagsieve_prefix_cache_hits";
    pub const PREFIX_CACHE_MISSES: &str = "tagsieve_prefix_cache_misses";
    pub const PREFIX_CACHE_EVICTIONS: &str = "tagsieve_prefix_cache_evictions";
    pub const REGEXP_COMPILATIONS: &str = "tagsieve_regexp_compilations";

    #[inline]
    pub fn record_regexp_cache_hit() {
        ::metrics::counter!(REGEXP_CACHE_HITS).increment(1);
    }

    #[inline]
    pub fn record_regexp_cache_miss() {
        ::metrics::counter!(REGEXP_CACHE_MISSES).increment(1);
    }

    #[inline]
    pub fn record_regexp_cache_evictions(entries: u64) {
        if entries > 0 {
            ::metrics::counter!(REGEXP_CACHE_EVICTIONS).increment(entries);
        }
    }

    #[inline]
    pub fn record_prefix_cache_hit() {
        ::metrics::counter!(PREFIX_CACHE_HITS).increment(1);
    }

    #[inline]
    pub fn record_prefix_cache_miss() {
        ::metrics::counter!(PREFIX_CACHE_MISSES).increment(1);
    }

    #[inline]
    pub fn record_prefix_cache_evictions(entries: u64) {
        if entries > 0 {
            ::metrics::counter!(PREFIX_CACHE_EVICTIONS).increment(entries);
        }
    }

    #[inline]
    pub fn record_regexp_compilation() {
        ::metrics::counter!(REGEXP_COMPILATIONS).increment(1);
    }

    /// Registers descriptions for every metric this crate records. Call once
    /// after installing a recorder.
    pub fn describe_all() {
        describe_counter!(
            REGEXP_CACHE_HITS,
            Unit::Count,
            "Compiled-regexp cache lookups served from the cache."
        );
        describe_counter!(
            REGEXP_CACHE_MISSES,
            Unit::Count,
            "Compiled-regexp cache lookups that required a compile."
        );
        describe_counter!(
            REGEXP_CACHE_EVICTIONS,
            Unit::Count,
            "Entries dropped from the compiled-regexp cache to stay within capacity."
        );
        describe_counter!(
            PREFIX_CACHE_HITS,
            Unit::Count,
            "Prefix-decomposition cache lookups served from the cache."
        );
        describe_counter!(
            PREFIX_CACHE_MISSES,
            Unit::Count,
            "Prefix-decomposition cache lookups that required analysis."
        );
        describe_counter!(
            PREFIX_CACHE_EVICTIONS,
            Unit::Count,
            "Entries dropped from the prefix-decomposition cache to stay within capacity."
        );
        describe_counter!(
            REGEXP_COMPILATIONS,
            Unit::Count,
            "Total regexp compilations performed on cache misses."
        );
    }
}
