//! Character-level Levenshtein distance.

/// Minimum number of single-character insertions, deletions and substitutions
/// turning `a` into `b`.
///
/// Works on Unicode scalar values and is case-sensitive; callers lowercase
/// both sides when they want case-insensitive matching.
pub fn distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}
