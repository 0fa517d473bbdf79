//! Per-query ordered collection of tag filters with canonicalised
//! empty/absent-value semantics.

use crate::cache::RegexpCaches;
use crate::error::FilterError;
use crate::filter::TagFilter;
use std::fmt;
use std::sync::Arc;

/// An ordered set of [`TagFilter`]s sharing one common index prefix.
///
/// Built per query, immutable once the scan starts; safe to share across
/// threads after construction.
#[derive(Debug)]
pub struct TagFilters {
    caches: Arc<RegexpCaches>,
    common_prefix: Vec<u8>,
    filters: Vec<TagFilter>,
}

impl TagFilters {
    /// Creates an empty set scoped to `common_prefix` (the metric-name-scoped
    /// byte prefix every contained filter seeks under).
    pub fn new(caches: Arc<RegexpCaches>, common_prefix: &[u8]) -> Self {
        TagFilters {
            caches,
            common_prefix: common_prefix.to_vec(),
            filters: Vec::new(),
        }
    }

    /// Adds one user-supplied filter, canonicalising empty/absent semantics:
    ///
    /// - an empty value (regex or not) means "the tag must be absent" and
    ///   becomes a negated `.+` regex;
    /// - a regex matching anything is dropped when positive (it filters
    ///   nothing) and kept as `.*` when negative;
    /// - a regex accepting only the empty string is treated like an empty
    ///   value.
    pub fn add(
        &mut self,
        key: &[u8],
        value: &[u8],
        is_negative: bool,
        is_regexp: bool,
    ) -> Result<(), FilterError> {
        let mut value = value.to_vec();
        let mut is_negative = is_negative;
        let mut is_regexp = is_regexp;

        if value.is_empty() {
            is_negative = !is_negative;
            is_regexp = true;
            value = b".+".to_vec();
        }

        if is_regexp {
            if let Ok(compiled) = self.caches.regexp(&value) {
                if compiled.matches_any() {
                    if !is_negative {
                        // Matches anything: equal to no filter at all.
                        return Ok(());
                    }
                    value = b".*".to_vec();
                } else if compiled.accepts_empty_only() {
                    is_negative = !is_negative;
                    value = b".+".to_vec();
                }
            }
        }

        let tf = TagFilter::new(
            &self.caches,
            &self.common_prefix,
            key,
            &value,
            is_negative,
            is_regexp,
        )?;
        self.filters.push(tf);
        Ok(())
    }

    /// Empties the set, keeping the common prefix for reuse.
    pub fn reset(&mut self) {
        self.filters.clear();
    }

    /// Contained filters in insertion order.
    pub fn filters(&self) -> &[TagFilter] {
        &self.filters
    }

    /// Filters ordered by ascending match cost, for the scan planner. The
    /// stored insertion order is left untouched.
    pub fn by_match_cost(&self) -> Vec<&TagFilter> {
        let mut ordered: Vec<&TagFilter> = self.filters.iter().collect();
        ordered.sort_by_key(|tf| tf.match_cost());
        ordered
    }

    pub fn common_prefix(&self) -> &[u8] {
        &self.common_prefix
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Display for TagFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, tf) in self.filters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", tf)?;
        }
        write!(f, "]")
    }
}
