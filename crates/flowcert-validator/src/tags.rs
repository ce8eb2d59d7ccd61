//! Phrase matching for the `tags` mode.

use crate::config::{TagMode, TagStrategy};
use crate::normalize::Normalize;

/// Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / max_len`; two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / longest as f64
}

/// Best similarity of `candidate` against the whole subject or any of its
/// words.
fn best_similarity(subject: &str, candidate: &str) -> f64 {
    subject
        .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|w| !w.is_empty())
        .map(|word| similarity(word, candidate))
        .fold(similarity(subject, candidate), f64::max)
}

fn prepare(text: &str, normalize: &Normalize, case_sensitive: bool) -> String {
    let text = normalize.apply(text);
    if case_sensitive {
        text
    } else {
        text.to_lowercase()
    }
}

/// `true` when any candidate matches `subject` under the mode's strategy.
pub fn matches(mode: &TagMode, subject: &str, normalize: &Normalize) -> bool {
    let subject = prepare(subject, normalize, mode.case_sensitive);
    mode.candidates.iter().any(|candidate| {
        let candidate = prepare(candidate, normalize, mode.case_sensitive);
        match mode.strategy {
            TagStrategy::Exact => subject == candidate,
            TagStrategy::Contains => subject.contains(&candidate),
            TagStrategy::StartsWith => subject.starts_with(&candidate),
            TagStrategy::EndsWith => subject.ends_with(&candidate),
            TagStrategy::Fuzzy => best_similarity(&subject, &candidate) >= mode.threshold,
        }
    })
}
