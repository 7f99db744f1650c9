//! Line and block similarity in `[0, 1]`.

use crate::normalize::{normalize, NormalizedLine};

/// Scores two raw lines.
///
/// Returns 1.0 when the normalized forms are equal (including two blank
/// lines), otherwise `1 - levenshtein / max(len_a, len_b, 1)` over the
/// normalized characters.
///
/// # Example
///
/// ```
/// # use driftpatch::score::score_line;
/// assert_eq!(score_line("    return 1", "\treturn   1"), 1.0);
/// assert_eq!(score_line("", "   "), 1.0);
/// assert!((score_line("return 1", "return 10") - (1.0 - 1.0 / 9.0)).abs() < 1e-9);
/// ```
pub fn score_line(a: &str, b: &str) -> f64 {
    score_normalized(&normalize(a), &normalize(b))
}

/// [`score_line`] for lines that are already normalized.
pub fn score_normalized(a: &NormalizedLine, b: &NormalizedLine) -> f64 {
    if a.text == b.text {
        return 1.0;
    }
    let a_chars: Vec<char> = a.text.chars().collect();
    let b_chars: Vec<char> = b.text.chars().collect();
    let longest = a_chars.len().max(b_chars.len()).max(1);
    1.0 - levenshtein(&a_chars, &b_chars) as f64 / longest as f64
}

/// Edit distance with unit costs, two rows of memory.
fn levenshtein(a: &[char], b: &[char]) -> usize {
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
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Scores two equal-length blocks of raw lines.
///
/// The result is the mean of per-line scores with the first and last lines
/// (the anchors) counted twice. A block made only of blank lines scores 0.0,
/// and so do blocks of different or zero length.
///
/// # Example
///
/// ```
/// # use driftpatch::score::score_block;
/// let expected = ["fn a() {", "    x();", "}"];
/// let actual = ["fn a() {", "    y();", "}"];
/// let s = score_block(&expected, &actual);
/// // anchors 1.0 (x2 each), middle line 1 - 1/4
/// assert!((s - (4.0 + 0.75) / 5.0).abs() < 1e-9);
/// ```
pub fn score_block<A: AsRef<str>, B: AsRef<str>>(expected: &[A], actual: &[B]) -> f64 {
    if expected.len() != actual.len() {
        return 0.0;
    }
    let expected: Vec<_> = expected.iter().map(|l| normalize(l.as_ref())).collect();
    let actual: Vec<_> = actual.iter().map(|l| normalize(l.as_ref())).collect();
    let mask = vec![true; expected.len()];
    score_window(&expected, &actual, &mask).score
}

/// The detailed score of one candidate window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WindowScore {
    /// Anchor-weighted mean over the compared lines.
    pub score: f64,
    /// The lower of the two anchor line scores.
    pub anchor_min: f64,
    /// How many lines took part in the comparison.
    pub compared: usize,
}

impl WindowScore {
    const NONE: WindowScore = WindowScore {
        score: 0.0,
        anchor_min: 0.0,
        compared: 0,
    };
}

/// Scores `actual` against `expected` using only the positions where `mask`
/// is set. The first and last compared positions are the anchors.
///
/// All three slices must have the same length.
pub(crate) fn score_window(
    expected: &[NormalizedLine],
    actual: &[NormalizedLine],
    mask: &[bool],
) -> WindowScore {
    let positions: Vec<usize> = (0..expected.len()).filter(|&i| mask[i]).collect();
    let (Some(&first), Some(&last)) = (positions.first(), positions.last()) else {
        return WindowScore::NONE;
    };
    if positions.iter().all(|&i| expected[i].is_blank()) {
        return WindowScore::NONE;
    }

    let mut weighted = 0.0;
    let mut weights = 0.0;
    let mut first_score = 0.0;
    let mut last_score = 0.0;
    for &i in &positions {
        let s = score_normalized(&expected[i], &actual[i]);
        let weight = if i == first || i == last { 2.0 } else { 1.0 };
        weighted += s * weight;
        weights += weight;
        if i == first {
            first_score = s;
        }
        if i == last {
            last_score = s;
        }
    }

    WindowScore {
        score: weighted / weights,
        anchor_min: first_score.min(last_score),
        compared: positions.len(),
    }
}
