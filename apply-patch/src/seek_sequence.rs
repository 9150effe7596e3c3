/// Find every position at or after `start` where `pattern` occurs as a contiguous run of
/// `lines`. Matching is attempted with decreasing strictness: exact match, then ignoring
/// trailing whitespace, then ignoring leading and trailing whitespace. The first tier that
/// produces any match decides the result, so a hunk that matches exactly once is never
/// reported as ambiguous because of looser whitespace-insensitive matches elsewhere.
///
/// Special cases:
///  • Empty `pattern` → returns `vec![start]` (no-op match)
///  • `pattern.len() > lines.len()` → returns no matches
pub(crate) fn seek_all(lines: &[String], pattern: &[String], start: usize) -> Vec<usize> {
    if pattern.is_empty() {
        return vec![start];
    }
    if pattern.len() > lines.len() || start > lines.len() - pattern.len() {
        return Vec::new();
    }

    let tiers: [fn(&str, &str) -> bool; 3] = [
        |a, b| a == b,
        |a, b| a.trim_end() == b.trim_end(),
        |a, b| a.trim() == b.trim(),
    ];
    for matches_line in tiers {
        let found: Vec<usize> = (start..=lines.len() - pattern.len())
            .filter(|&i| {
                pattern
                    .iter()
                    .enumerate()
                    .all(|(p_idx, pat)| matches_line(&lines[i + p_idx], pat))
            })
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}
