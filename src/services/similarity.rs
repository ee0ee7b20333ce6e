//! Edit-distance string similarity.
//!
//! [`ratio`] is the normalized Indel similarity used by common fuzzy string
//! matchers: `100 * (len_a + len_b - indel) / (len_a + len_b)`, where `indel`
//! counts the insertions and deletions needed to turn one string into the
//! other. Lengths are measured in Unicode scalar values.

/// Returns the similarity of `a` and `b` on a 0–100 scale.
///
/// Identical strings score 100 (two empty strings included). A string
/// compared with an empty one scores 0. Halves round to even.
#[must_use]
pub fn ratio(a: &str, b: &str) -> u8 {
    if a == b {
        return 100;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    // len_a + len_b - indel == 2 * lcs
    let total = a.len() + b.len();
    let scaled = 200 * longest_common_subsequence(&a, &b);
    let rounded = round_half_even(scaled, total);
    u8::try_from(rounded).unwrap_or(100)
}

/// Length of the longest common subsequence, two-row dynamic programming.
fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut previous = vec![0usize; short.len() + 1];
    let mut current = vec![0usize; short.len() + 1];

    for &lc in long {
        for (j, &sc) in short.iter().enumerate() {
            current[j + 1] = if lc == sc {
                previous[j] + 1
            } else {
                current[j].max(previous[j + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[short.len()]
}

/// Integer division rounding to the nearest value, ties to even.
const fn round_half_even(numerator: usize, denominator: usize) -> usize {
    let quotient = numerator / denominator;
    let twice_remainder = 2 * (numerator % denominator);
    if twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    }
}
