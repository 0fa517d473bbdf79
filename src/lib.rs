#![doc = r#"
tagsieve: Tag-Filter Core for a Time-Series Index

This crate turns user-supplied label matchers (equality, inequality, regex, negated regex) into efficient prefix + suffix matchers over an ordered on-disk key index whose keys are byte-encoded (metric, tag_key, tag_value) tuples. It provides:
- Regex analysis: literal seek-prefix extraction and residual suffix expressions
- Finite or-value enumeration, short-circuiting common queries past the regex engine
- Canonicalised empty/absent-value semantics for negative filters
- Bounded, sharded caches for compiled regexes and prefix decompositions
- Thread-safe matchers: single-writer during construction, lock-free during scans

The block-level index scanner and query planner consume the derived (prefix, match_suffix) pairs; see the module docs for the contract at that seam.
"#]
// Declare modules
pub mod cache;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod filters;
pub mod regexutil;
pub mod telemetry;

/// Per-query ordered set of tag filters.
pub use crate::filters::TagFilters;
/// A single tag matcher with its seek prefix and suffix predicate.
pub use crate::filter::TagFilter;
/// Concurrent caches for compiled regexes and prefix decompositions.
pub use crate::cache::RegexpCaches;
/// Configuration options for the caches.
pub use crate::cache::RegexpCacheConfig;
/// Error type for filter construction and suffix matching.
pub use crate::error::FilterError;
/// Compiled, anchored matcher plus its analysis results.
pub use crate::regexutil::CompiledRegexp;
/// Structured event hook for observability.
pub use crate::telemetry::{FilterEvent, FilterEventListener};

/// Default cap on enumerated or-values per expression.
pub use crate::regexutil::DEFAULT_MAX_OR_VALUES;
