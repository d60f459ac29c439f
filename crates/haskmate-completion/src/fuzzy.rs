//! Fuzzy candidate ranking with nucleo
//!
//! Candidates are scored against a typed prefix over several keys; the
//! best key wins, zero-score candidates are discarded, and ties break on
//! the index of the winning key (lower wins).

use nucleo::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo::{Config, Matcher, Utf32Str};

/// Key extractor for one candidate type
pub type KeyFn<T> = for<'a> fn(&'a T) -> Option<&'a str>;

/// Score one haystack against an already-built pattern
fn score_with(matcher: &mut Matcher, pattern: &Pattern, text: &str) -> Option<u32> {
    let mut buf = Vec::new();
    pattern.score(Utf32Str::new(text, &mut buf), matcher)
}

/// Fuzzy similarity of two strings, for ordering when there is no prefix
pub fn similarity(text: &str, against: &str) -> u32 {
    if against.is_empty() {
        return 0;
    }
    let mut matcher = Matcher::new(Config::DEFAULT);
    let pattern = Pattern::new(
        against,
        CaseMatching::Smart,
        Normalization::Smart,
        AtomKind::Fuzzy,
    );
    score_with(&mut matcher, &pattern, text).unwrap_or(0)
}

/// Rank `items` against `prefix` over `keys`.
///
/// An empty prefix keeps every item in its incoming order.
pub fn rank<T>(items: Vec<T>, prefix: &str, keys: &[KeyFn<T>]) -> Vec<T> {
    if prefix.is_empty() {
        return items;
    }
    let mut matcher = Matcher::new(Config::DEFAULT);
    let pattern = Pattern::new(
        prefix,
        CaseMatching::Smart,
        Normalization::Smart,
        AtomKind::Fuzzy,
    );

    let mut scored: Vec<(u32, usize, T)> = items
        .into_iter()
        .filter_map(|item| {
            let mut best: Option<(u32, usize)> = None;
            for (index, key) in keys.iter().enumerate() {
                let Some(text) = key(&item) else { continue };
                let Some(score) = score_with(&mut matcher, &pattern, text) else {
                    continue;
                };
                if best.map_or(true, |(b, _)| score > b) {
                    best = Some((score, index));
                }
            }
            best.map(|(score, index)| (score, index, item))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, _, item)| item).collect()
}
