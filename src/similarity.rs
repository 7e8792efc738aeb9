use std::collections::HashSet;

/// The share of `candidate` tags that also appear in `existing`.
///
/// This is deliberately not symmetric: extra tags on the existing side
/// never lower the score. An empty candidate scores `0.0`.
///
/// ```
/// use catalog::similarity::similarity;
/// assert_eq!(similarity(&["a", "b"], &["a", "c", "d"]), 0.5);
/// assert_eq!(similarity::<&str>(&[], &["a"]), 0.0);
/// ```
pub fn similarity<S: AsRef<str>>(candidate: &[S], existing: &[S]) -> f64 {
    if candidate.is_empty() {
        return 0.0;
    }

    let existing: HashSet<&str> = existing.iter().map(AsRef::<str>::as_ref).collect();
    let shared = candidate
        .iter()
        .filter(|t| existing.contains(AsRef::<str>::as_ref(*t)))
        .count();

    shared as f64 / candidate.len() as f64
}
