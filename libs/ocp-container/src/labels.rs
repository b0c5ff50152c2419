//! Label kernel (C3, spec.md §4.3): parse/filter/merge/canonicalise over
//! label maps. A `LabelMap` is a `BTreeMap` rather than a `HashMap` on
//! purpose — canonicalisation needs lexicographic key order, and `BTreeMap`
//! gives it for free instead of requiring a sort at every call site.

use std::collections::BTreeMap;

use ocp_model::{AuditKind, AuditLog};

pub type LabelMap = BTreeMap<String, String>;

/// `parse(json_or_null) → map` — spec.md §4.3.1. Malformed JSON never fails
/// the row; it becomes an empty map plus an audit record.
pub fn parse(json: Option<&str>, audit: &mut AuditLog) -> LabelMap {
    let Some(json) = json else {
        return LabelMap::new();
    };
    if json.is_empty() {
        return LabelMap::new();
    }
    match serde_json::from_str::<LabelMap>(json) {
        Ok(map) => map,
        Err(e) => {
            audit.push(AuditKind::MalformedLabelJson, format!("{e}: {json}"));
            LabelMap::new()
        }
    }
}

/// `filter(map, allow_set) → map` — spec.md §4.3.2.
pub fn filter(map: LabelMap, allow_set: &[String]) -> LabelMap {
    map.into_iter().filter(|(k, _)| allow_set.iter().any(|a| a == k)).collect()
}

/// `merge(lower, middle, upper) → map` — spec.md §4.3.3, right-bias: later
/// arguments' keys win on conflict. `merge2` is the base case every wider
/// arity composes from.
pub fn merge2(lower: &LabelMap, upper: &LabelMap) -> LabelMap {
    let mut out = lower.clone();
    for (k, v) in upper {
        out.insert(k.clone(), v.clone());
    }
    out
}

pub fn merge3(lower: &LabelMap, middle: &LabelMap, upper: &LabelMap) -> LabelMap {
    merge2(&merge2(lower, middle), upper)
}

pub fn merge4(a: &LabelMap, b: &LabelMap, c: &LabelMap, d: &LabelMap) -> LabelMap {
    merge2(&merge3(a, b, c), d)
}

/// `canonicalise(map) → string` — spec.md §4.3.4. `BTreeMap`'s key order is
/// already lexicographic, so `serde_json`'s compact encoding (no whitespace
/// by default) is already the canonical form; two semantically equal maps
/// always produce byte-identical output.
pub fn canonicalise(map: &LabelMap) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
}

/// `pattern matches namespace under LIKE` (spec.md §4.5/§4.6's cost-category
/// rule; the `LIKE`-pattern question flagged in spec.md §9). Rather than
/// pull in a regex engine for SQL `%`/`_` wildcards, this compiles nothing
/// and matches directly with a two-pointer scan, the standard technique for
/// glob-style wildcard matching.
pub struct CostCategoryMatcher<'a> {
    patterns: &'a [ocp_model::CostCategoryPattern],
}

impl<'a> CostCategoryMatcher<'a> {
    pub fn new(patterns: &'a [ocp_model::CostCategoryPattern]) -> Self {
        Self { patterns }
    }

    /// `cost_category_id := max({ id : pattern matches namespace under LIKE
    /// })`; `None` if no pattern matches.
    pub fn best_match(&self, namespace: &str) -> Option<i32> {
        self.patterns
            .iter()
            .filter(|p| like_match(p.pattern.as_bytes(), namespace.as_bytes()))
            .map(|p| p.cost_category_id)
            .max()
    }
}

/// SQL `LIKE` match: `%` matches any run of characters (including none),
/// `_` matches exactly one character. Case-sensitive, no escape character
/// (none of the patterns in scope need one).
fn like_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut match_from = 0usize;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'_' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'%' {
            star = Some(p);
            match_from = t;
            p += 1;
        } else if let Some(star_pos) = star {
            p = star_pos + 1;
            match_from += 1;
            t = match_from;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'%' {
        p += 1;
    }
    p == pattern.len()
}
