//! A single tag matcher: derives the index seek prefix, the enumerable
//! or-suffixes, and the residual suffix predicate for one
//! `(key, value, is_negative, is_regexp)` tuple.

use crate::cache::RegexpCaches;
use crate::encoding::{
    escape_tag_value, escape_tag_value_no_terminator, unescape_tag_value, TAG_VALUE_TERMINATOR,
};
use crate::error::FilterError;
use crate::regexutil::CompiledRegexp;
use std::fmt;
use std::sync::Arc;

/// Match-cost hint for an exact-literal filter.
pub const LITERAL_MATCH_COST: u32 = 1;
/// Match-cost hint for a residual-regexp filter.
pub const REGEXP_MATCH_COST: u32 = 100;

/// Above this many or-suffixes, membership switches to binary search.
const OR_SUFFIXES_LINEAR_SCAN_MAX: usize = 16;

/// A matcher for one tag constraint, immutable once constructed.
///
/// `is_negative` never affects `prefix` or the suffix predicate; the scanner
/// XORs it against [`TagFilter::match_suffix`] at the public boundary.
#[derive(Debug, Clone)]
pub struct TagFilter {
    key: Vec<u8>,
    value: Vec<u8>,
    is_negative: bool,
    is_regexp: bool,
    prefix: Vec<u8>,
    or_suffixes: Vec<String>,
    re_suffix: Option<Arc<CompiledRegexp>>,
    match_cost: u32,
}

impl TagFilter {
    /// Builds the matcher, deriving the seek prefix and suffix predicate.
    ///
    /// Regex values degenerate to the exact-literal form when the expression
    /// is equivalent to a single literal (singleton OR-values, or an empty
    /// residual after prefix extraction). A value that fails to compile is
    /// treated as an exact literal on the raw bytes: escaped index keys never
    /// equal a broken pattern unless the stored value is byte-identical, so
    /// the filter over-matches safely instead of failing the query.
    pub fn new(
        caches: &RegexpCaches,
        common_prefix: &[u8],
        key: &[u8],
        value: &[u8],
        is_negative: bool,
        is_regexp: bool,
    ) -> Result<Self, FilterError> {
        let mut prefix =
            Vec::with_capacity(common_prefix.len() + key.len() + value.len() + 2);
        prefix.extend_from_slice(common_prefix);
        escape_tag_value(&mut prefix, key);

        let mut literal_value = value.to_vec();
        if is_regexp {
            if let Ok(compiled) = caches.regexp(value) {
                let singleton = compiled
                    .or_values()
                    .and_then(|vs| (vs.len() == 1).then(|| vs[0].clone()));
                if let Some(v) = singleton {
                    literal_value = v.into_bytes();
                } else {
                    let decomposed = caches.regexp_prefix(value);
                    if decomposed.suffix.is_empty() {
                        literal_value = decomposed.prefix.clone();
                    } else {
                        escape_tag_value_no_terminator(&mut prefix, &decomposed.prefix);
                        let residual = caches.regexp(&decomposed.suffix)?;
                        let or_suffixes: Vec<String> = residual
                            .or_values()
                            .map(|values| values.to_vec())
                            .unwrap_or_default();
                        let (re_suffix, match_cost) = if or_suffixes.is_empty() {
                            (Some(residual), REGEXP_MATCH_COST)
                        } else {
                            (None, 1 + or_suffixes.len() as u32)
                        };
                        return Ok(TagFilter {
                            key: key.to_vec(),
                            value: value.to_vec(),
                            is_negative,
                            is_regexp: true,
                            prefix,
                            or_suffixes,
                            re_suffix,
                            match_cost,
                        });
                    }
                }
            }
        }

        // Exact literal: the whole escaped value, terminator included, goes
        // into the seek prefix and only the empty suffix can match.
        escape_tag_value(&mut prefix, &literal_value);
        Ok(TagFilter {
            key: key.to_vec(),
            value: literal_value,
            is_negative,
            is_regexp: false,
            prefix,
            or_suffixes: vec![String::new()],
            re_suffix: None,
            match_cost: LITERAL_MATCH_COST,
        })
    }

    /// Tests the key bytes following [`TagFilter::prefix`], up to and
    /// including the tag value terminator. `is_negative` is not applied here.
    pub fn match_suffix(&self, suffix: &[u8]) -> Result<bool, FilterError> {
        if !self.is_regexp {
            // The seek prefix already covers the full escaped value and its
            // terminator, so only the empty remainder matches.
            return Ok(suffix.is_empty());
        }
        let Some((&last, escaped)) = suffix.split_last() else {
            return Err(FilterError::CorruptSuffix(
                "empty suffix for a regexp filter".to_string(),
            ));
        };
        if last != TAG_VALUE_TERMINATOR {
            return Err(FilterError::CorruptSuffix(format!(
                "suffix {:?} does not end with the tag value terminator",
                suffix
            )));
        }
        let raw = unescape_tag_value(escaped)?;
        if !self.or_suffixes.is_empty() {
            return Ok(self.or_suffixes_contain(raw.as_ref()));
        }
        match &self.re_suffix {
            Some(re) => Ok(re.is_match(raw.as_ref())),
            // A regexp filter carries either or-suffixes or a residual matcher.
            None => Ok(false),
        }
    }

    fn or_suffixes_contain(&self, raw: &[u8]) -> bool {
        if self.or_suffixes.len() <= OR_SUFFIXES_LINEAR_SCAN_MAX {
            return self.or_suffixes.iter().any(|s| s.as_bytes() == raw);
        }
        self.or_suffixes
            .binary_search_by(|s| s.as_bytes().cmp(raw))
            .is_ok()
    }

    /// The index key prefix every matching key starts with.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Sorted, deduplicated alternatives the raw suffix may take; `[""]` for
    /// an exact-literal matcher, empty when only the residual predicate can
    /// decide.
    pub fn or_suffixes(&self) -> &[String] {
        &self.or_suffixes
    }

    /// Full index keys for the direct-lookup path: when or-suffixes are known
    /// and the filter is positive, the scanner can probe these keys instead of
    /// scanning from [`TagFilter::prefix`].
    pub fn or_suffix_keys(&self) -> Vec<Vec<u8>> {
        if !self.is_regexp {
            return vec![self.prefix.clone()];
        }
        self.or_suffixes
            .iter()
            .map(|s| {
                let mut key = self.prefix.clone();
                escape_tag_value(&mut key, s.as_bytes());
                key
            })
            .collect()
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn is_negative(&self) -> bool {
        self.is_negative
    }

    pub fn is_regexp(&self) -> bool {
        self.is_regexp
    }

    /// Relative evaluation cost: exact literal < or-suffixes < residual regexp.
    pub fn match_cost(&self) -> u32 {
        self.match_cost
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match (self.is_negative, self.is_regexp) {
            (false, false) => "=",
            (true, false) => "!=",
            (false, true) => "=~",
            (true, true) => "!~",
        };
        write!(
            f,
            "{{{}{}{:?}}}",
            String::from_utf8_lossy(&self.key),
            op,
            String::from_utf8_lossy(&self.value)
        )
    }
}
