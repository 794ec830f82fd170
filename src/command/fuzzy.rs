//! Edit-distance similarity for misspelled action identifiers

use crate::actions::Capability;

/// Levenshtein distance over chars (single-row dynamic programming)
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = if ca == cb { 0 } else { 1 };
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }
    row[b.len()]
}

/// `(max_len - distance) / max_len`, 1.0 for two empty strings
pub fn similarity(a: &str, b: &str) -> f32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(a, b);
    (max_len - distance) as f32 / max_len as f32
}

/// Highest-scoring candidate; earlier candidates win ties
pub fn best_match<I>(raw: &str, candidates: I) -> Option<(Capability, f32)>
where
    I: IntoIterator<Item = Capability>,
{
    let mut best: Option<(Capability, f32)> = None;
    for cap in candidates {
        let score = similarity(raw, cap.as_str());
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((cap, score)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("member", "memeber"), 1);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
    }

    #[test]
    fn test_similarity_range() {
        assert_eq!(similarity("role.add", "role.add"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        let s = similarity("memeber.timeot", "member.timeout");
        assert!((s - 12.0 / 14.0).abs() < 1e-6);
    }

    #[test]
    fn test_best_match_prefers_first_on_tie() {
        // Two substitutions away from both candidates
        let raw = "channel.edck";
        let forward = best_match(raw, [Capability::ChannelEdit, Capability::ChannelLock]);
        let reverse = best_match(raw, [Capability::ChannelLock, Capability::ChannelEdit]);
        assert_eq!(forward.map(|(c, _)| c), Some(Capability::ChannelEdit));
        assert_eq!(reverse.map(|(c, _)| c), Some(Capability::ChannelLock));
        assert!(best_match("x.y", std::iter::empty()).is_none());
    }
}
