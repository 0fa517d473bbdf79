//! Canonicalisation rules for the per-query filter set, plus property tests
//! for the analyzer/matcher invariants.

use proptest::prelude::*;
use std::sync::Arc;
use tagsieve::encoding::escape_tag_value;
use tagsieve::regexutil::{get_or_values, get_regexp_prefix, DEFAULT_MAX_OR_VALUES};
use tagsieve::{CompiledRegexp, RegexpCacheConfig, RegexpCaches, TagFilter, TagFilters};

fn new_tag_filters() -> TagFilters {
    TagFilters::new(
        Arc::new(RegexpCaches::new(RegexpCacheConfig::default())),
        b"prefix",
    )
}

fn expect_filter(tfs: &TagFilters, idx: usize, value: &str, is_negative: bool, is_regexp: bool) {
    assert_eq!(tfs.len(), idx + 1, "expecting filter #{idx} to be present");
    let tf = &tfs.filters()[idx];
    assert_eq!(tf.value(), value.as_bytes(), "unexpected value for {tf}");
    assert_eq!(tf.is_negative(), is_negative, "unexpected is_negative for {tf}");
    assert_eq!(tf.is_regexp(), is_regexp, "unexpected is_regexp for {tf}");
}

#[test]
fn empty_values_become_negated_non_empty_matches() {
    let mut tfs = new_tag_filters();

    tfs.add(b"", b"", false, false).unwrap();
    expect_filter(&tfs, 0, ".+", true, true);
    tfs.add(b"foo", b"", false, false).unwrap();
    expect_filter(&tfs, 1, ".+", true, true);
    tfs.add(b"foo", b"", true, false).unwrap();
    expect_filter(&tfs, 2, ".+", false, true);
}

#[test]
fn match_anything_regexps_are_dropped_or_canonicalised() {
    let mut tfs = new_tag_filters();

    tfs.add(b"foo", b".*", false, true).unwrap();
    assert!(tfs.is_empty(), "positive .* filter must be dropped");

    tfs.add(b"foo", b".*", true, true).unwrap();
    expect_filter(&tfs, 0, ".*", true, true);

    // Matching the empty string is not the same as matching anything.
    tfs.add(b"foo", b"foo||bar", false, true).unwrap();
    expect_filter(&tfs, 1, "foo||bar", false, true);
    tfs.add(b"", b"foo||bar", true, true).unwrap();
    expect_filter(&tfs, 2, "foo||bar", true, true);

    // Alternations hiding a match-anything branch canonicalise to `.*`.
    let mut tfs = new_tag_filters();
    tfs.add(b"foo", b"foo|.*", false, true).unwrap();
    assert!(tfs.is_empty());
    tfs.add(b"foo", b"foo|.*", true, true).unwrap();
    expect_filter(&tfs, 0, ".*", true, true);
}

#[test]
fn empty_only_regexps_behave_as_empty_values() {
    let mut tfs = new_tag_filters();
    tfs.add(b"foo", b"()", false, true).unwrap();
    expect_filter(&tfs, 0, ".+", true, true);
    tfs.add(b"foo", b"^$", true, true).unwrap();
    expect_filter(&tfs, 1, ".+", false, true);
}

#[test]
fn ordinary_filters_are_appended_in_order() {
    let mut tfs = new_tag_filters();
    tfs.add(b"", b"foobar", false, false).unwrap();
    assert_eq!(tfs.len(), 1);
    tfs.add(b"bar", b"foobar", true, false).unwrap();
    assert_eq!(tfs.len(), 2);
    tfs.add(b"", b"foo.+bar", true, true).unwrap();
    assert_eq!(tfs.len(), 3);
    tfs.add(b"bar", b"foo.+bar", false, true).unwrap();
    assert_eq!(tfs.len(), 4);
    tfs.add(b"bar", b"foo.*", false, true).unwrap();
    assert_eq!(tfs.len(), 5);
}

#[test]
fn reset_empties_the_set_and_keeps_the_common_prefix() {
    let mut tfs = new_tag_filters();
    tfs.add(b"env", b"prod", false, false).unwrap();
    assert_eq!(tfs.len(), 1);

    tfs.reset();
    assert!(tfs.is_empty());
    assert_eq!(tfs.common_prefix(), b"prefix");

    tfs.add(b"env", b"prod", false, false).unwrap();
    assert!(tfs.filters()[0].prefix().starts_with(b"prefix"));
}

#[test]
fn every_filter_shares_the_common_prefix() {
    let mut tfs = new_tag_filters();
    tfs.add(b"env", b"prod", false, false).unwrap();
    tfs.add(b"job", b"api(foo|bar)", false, true).unwrap();
    tfs.add(b"host", b"web.*", true, true).unwrap();
    for tf in tfs.filters() {
        assert!(
            tf.prefix().starts_with(b"prefix"),
            "{tf} must seek under the common prefix"
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// Negation only flips the scanner-boundary result; prefixes and raw
    /// suffix matching are identical for both polarities.
    #[test]
    fn prop_negation_is_an_involution(
        value in "[a-z]{1,6}",
        suffix in "[a-z]{0,6}",
        is_regexp in any::<bool>(),
    ) {
        let caches = RegexpCaches::new(RegexpCacheConfig::default());
        let pos =
            TagFilter::new(&caches, b"p", b"k", value.as_bytes(), false, is_regexp).unwrap();
        let neg =
            TagFilter::new(&caches, b"p", b"k", value.as_bytes(), true, is_regexp).unwrap();
        prop_assert_eq!(pos.prefix(), neg.prefix());

        let input = if !pos.is_regexp() && suffix.is_empty() {
            Vec::new()
        } else {
            let mut buf = Vec::new();
            escape_tag_value(&mut buf, suffix.as_bytes());
            buf
        };
        let raw_pos = pos.match_suffix(&input).unwrap();
        let raw_neg = neg.match_suffix(&input).unwrap();
        prop_assert_eq!(raw_pos, raw_neg);
        prop_assert_ne!(
            raw_pos != pos.is_negative(),
            raw_neg != neg.is_negative()
        );
    }

    /// OR-values are sorted, deduplicated, and accepted by the source regex.
    #[test]
    fn prop_or_values_are_sorted_unique_and_accepted(
        parts in prop::collection::vec("[a-z]{0,4}", 1..5),
    ) {
        let expr = parts.join("|");
        let values = get_or_values(&expr, DEFAULT_MAX_OR_VALUES)
            .expect("literal alternations are always enumerable");
        let mut sorted = values.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(&values, &sorted);

        let re = CompiledRegexp::compile(&expr, DEFAULT_MAX_OR_VALUES).unwrap();
        for v in &values {
            prop_assert!(re.is_match(v.as_bytes()), "{} must accept {:?}", expr, v);
        }
    }

    /// The (prefix, residual) decomposition reconstructs the full matcher.
    #[test]
    fn prop_prefix_decomposition_reconstructs_full_matcher(
        head in "[a-z]{0,5}",
        a in "[a-z]{0,5}",
        b in "[a-z]{0,5}",
        probe in "[a-z]{0,10}",
    ) {
        let expr = format!("{head}({a}|{b})");
        let (prefix, suffix) = get_regexp_prefix(expr.as_bytes());
        let full = CompiledRegexp::compile(&expr, DEFAULT_MAX_OR_VALUES).unwrap();
        let residual =
            CompiledRegexp::compile(std::str::from_utf8(&suffix).unwrap(), DEFAULT_MAX_OR_VALUES)
                .unwrap();

        let accepted_a = format!("{head}{a}");
        let accepted_b = format!("{head}{b}");
        for s in [probe.as_str(), accepted_a.as_str(), accepted_b.as_str()] {
            let via_decomposition = s
                .as_bytes()
                .strip_prefix(prefix.as_slice())
                .map(|tail| residual.is_match(tail))
                .unwrap_or(false);
            prop_assert_eq!(
                full.is_match(s.as_bytes()),
                via_decomposition,
                "decomposition of {} diverges on {:?}",
                expr,
                s
            );
        }
    }
}
