//! Keyword relevance shared by the semantic memory backends.

use std::collections::HashSet;

/// Lowercased words of at least three characters.
pub(crate) fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of the query's keywords present in `content`, in `[0, 1]`.
pub(crate) fn relevance(query: &HashSet<String>, content: &str) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let words = keywords(content);
    let hits = query.iter().filter(|w| words.contains(*w)).count();
    hits as f32 / query.len() as f32
}

/// Indices of the `limit` best-scoring entries with a non-zero score.
/// Ties go to the most recent entry.
pub(crate) fn rank<'a>(
    query: &str,
    contents: impl Iterator<Item = &'a str>,
    limit: usize,
) -> Vec<usize> {
    let query = keywords(query);
    let mut scored: Vec<(usize, f32)> = contents
        .enumerate()
        .map(|(i, c)| (i, relevance(&query, c)))
        .filter(|(_, score)| *score > 0.0)
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.0.cmp(&a.0))
    });
    scored.into_iter().take(limit).map(|(i, _)| i).collect()
}
