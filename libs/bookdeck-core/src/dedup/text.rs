//! Text normalization and edit-distance similarity.

use std::sync::OnceLock;

use regex::Regex;

fn cloze_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{c\d+::(.*?)\}\}").expect("valid cloze pattern"))
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("valid punctuation pattern"))
}

/// Normalize card text for comparison.
///
/// Lowercases, unwraps `{{c1::term}}` cloze markup to `term`, drops
/// punctuation and collapses whitespace.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let unwrapped = cloze_re().replace_all(&lowered, "$1");
    let stripped = punctuation_re().replace_all(&unwrapped, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Calculate Levenshtein distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    // Two rows instead of the full matrix
    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;

        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };

            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }

        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Similarity ratio in [0.0, 1.0] derived from Levenshtein distance.
///
/// Two empty strings are identical; an empty string shares nothing with a
/// non-empty one. Lengths are counted in characters.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();

    match (a_len, b_len) {
        (0, 0) => 1.0,
        (0, _) | (_, 0) => 0.0,
        _ => {
            let distance = levenshtein_distance(a, b);
            1.0 - (distance as f64 / a_len.max(b_len) as f64)
        }
    }
}
