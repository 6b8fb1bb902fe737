//! Filter equivalence
//!
//! Two filters are equivalent when their query fragments are equal and the
//! metadata flags selected by [`CompareOptions`] agree. Fragments are
//! `serde_json::Value`s backed by ordered maps, so key order never matters.

use super::Filter;

/// Which attributes besides the query fragment take part in a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOptions {
    /// Compare `meta.negate`
    pub negate: bool,
    /// Compare `meta.disabled`
    pub disabled: bool,
    /// Compare `state`
    pub state: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            negate: true,
            disabled: true,
            state: false,
        }
    }
}

impl CompareOptions {
    /// Compare every attribute
    pub const COMPARE_ALL: Self = Self {
        negate: true,
        disabled: true,
        state: true,
    };

    /// Compare the query fragment only
    pub const QUERY_ONLY: Self = Self {
        negate: false,
        disabled: false,
        state: false,
    };

    /// Disregard `negate`
    pub fn ignore_negate(mut self) -> Self {
        self.negate = false;
        self
    }

    /// Disregard `disabled`
    pub fn ignore_disabled(mut self) -> Self {
        self.disabled = false;
        self
    }

    /// Disregard `state`
    pub fn ignore_state(mut self) -> Self {
        self.state = false;
        self
    }
}

/// Whether two filters are equivalent under `options`
pub fn compare_filters(a: &Filter, b: &Filter, options: CompareOptions) -> bool {
    if a.query != b.query {
        return false;
    }
    if options.negate && a.meta.negate != b.meta.negate {
        return false;
    }
    if options.disabled && a.meta.disabled != b.meta.disabled {
        return false;
    }
    if options.state && a.state != b.state {
        return false;
    }
    true
}

/// Whether two lists hold the same filters, ignoring order
///
/// Lists are compared as multisets: each filter of `a` must be matched by a
/// distinct filter of `b`.
pub fn compare_filter_lists(a: &[Filter], b: &[Filter], options: CompareOptions) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|left| {
        let found = b
            .iter()
            .enumerate()
            .position(|(i, right)| !used[i] && compare_filters(left, right, options));
        match found {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// Drop filters equivalent to an earlier one, keeping first occurrences
pub fn uniq_filters(filters: &[Filter], options: CompareOptions) -> Vec<Filter> {
    let mut kept: Vec<Filter> = Vec::with_capacity(filters.len());
    for filter in filters {
        if !kept.iter().any(|k| compare_filters(k, filter, options)) {
            kept.push(filter.clone());
        }
    }
    kept
}

/// Filters of `new` that have no equivalent in `existing`
pub fn dedup_filters(existing: &[Filter], new: &[Filter], options: CompareOptions) -> Vec<Filter> {
    new.iter()
        .filter(|n| !existing.iter().any(|e| compare_filters(e, n, options)))
        .cloned()
        .collect()
}

/// Whether the only difference between two filter lists is in disabled filters
///
/// Used to skip a refetch when the user toggles a filter that does not
/// contribute to the query.
pub fn only_disabled_filters_changed(new: &[Filter], old: &[Filter]) -> bool {
    let enabled = |filters: &[Filter]| -> Vec<Filter> {
        filters.iter().filter(|f| f.is_enabled()).cloned().collect()
    };
    compare_filter_lists(&enabled(new), &enabled(old), CompareOptions::COMPARE_ALL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldKind, IndexPattern};
    use crate::filter::{build_exists_filter, build_phrase_filter};
    use serde_json::json;

    fn index() -> IndexPattern {
        IndexPattern::new("logs", "logs-*")
            .with_field(Field::new("status", FieldKind::Number))
            .with_field(Field::new("service", FieldKind::String))
    }

    fn status(value: i64) -> Filter {
        let index = index();
        build_phrase_filter(index.field("status").unwrap(), value, &index).unwrap()
    }

    #[test]
    fn test_differ_only_in_disabled() {
        let a = status(500);
        let b = a.disable();

        assert!(compare_filters(&a, &b, CompareOptions::default().ignore_disabled()));
        assert!(!compare_filters(&a, &b, CompareOptions::default()));
    }

    #[test]
    fn test_state_ignored_by_default() {
        let a = status(500);
        let b = a.pin();

        assert!(compare_filters(&a, &b, CompareOptions::default()));
        assert!(!compare_filters(&a, &b, CompareOptions::COMPARE_ALL));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let mut a = status(500);
        let mut b = status(500);
        a.query = json!({ "range": { "bytes": { "gte": 1, "lt": 10 } } });
        b.query = serde_json::from_str(r#"{"range":{"bytes":{"lt":10,"gte":1}}}"#).unwrap();

        assert!(compare_filters(&a, &b, CompareOptions::COMPARE_ALL));
    }

    #[test]
    fn test_negate_respected() {
        let a = status(500);
        let b = a.toggle_negated();

        assert!(!compare_filters(&a, &b, CompareOptions::default()));
        assert!(compare_filters(&a, &b, CompareOptions::default().ignore_negate()));
    }

    #[test]
    fn test_uniq_keeps_first() {
        let filters = vec![status(500), status(404), status(500).pin()];
        let uniq = uniq_filters(&filters, CompareOptions::default());

        assert_eq!(uniq.len(), 2);
        assert!(!uniq[0].is_pinned());
    }

    #[test]
    fn test_dedup_against_existing() {
        let existing = vec![status(500)];
        let new = vec![status(500), status(404)];
        let added = dedup_filters(&existing, &new, CompareOptions::default());

        assert_eq!(added.len(), 1);
        assert_eq!(added[0].phrase_value(), Some(&json!(404)));
    }

    #[test]
    fn test_lists_compare_as_multisets() {
        let a = vec![status(500), status(404)];
        let b = vec![status(404), status(500)];
        let c = vec![status(404), status(404)];

        assert!(compare_filter_lists(&a, &b, CompareOptions::COMPARE_ALL));
        assert!(!compare_filter_lists(&a, &c, CompareOptions::COMPARE_ALL));
    }

    #[test]
    fn test_only_disabled_filters_changed() {
        let index = index();
        let exists = build_exists_filter(index.field("service").unwrap(), &index).unwrap();

        let old = vec![status(500)];
        let new = vec![status(500), exists.disable()];
        assert!(only_disabled_filters_changed(&new, &old));

        let new = vec![status(500), exists];
        assert!(!only_disabled_filters_changed(&new, &old));

        // Disabling an applied filter changes the query
        let new = vec![status(500).disable()];
        assert!(!only_disabled_filters_changed(&new, &old));
    }
}
