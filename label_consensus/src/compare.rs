//! String comparison strategies used when grouping answers.

/// Compares two normalized answers.
///
/// The exact comparison is used on the lossless forms. The approximate
/// comparison is only used by the lossy pass, on the lossy forms.
pub trait Comparator {
    fn exact_match(&self, reference: &str, candidate: &str) -> bool;

    fn approx_match(&self, reference: &str, candidate: &str, threshold: f64) -> bool;
}

/// Exact equality, and a Ratcliff/Obershelp similarity ratio for the
/// approximate comparison.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct SequenceComparator;

impl Comparator for SequenceComparator {
    fn exact_match(&self, reference: &str, candidate: &str) -> bool {
        reference == candidate
    }

    fn approx_match(&self, reference: &str, candidate: &str, threshold: f64) -> bool {
        sequence_ratio(reference, candidate) >= threshold
    }
}

/// Only exact matches, even in the lossy pass.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct ExactComparator;

impl Comparator for ExactComparator {
    fn exact_match(&self, reference: &str, candidate: &str) -> bool {
        reference == candidate
    }

    fn approx_match(&self, reference: &str, candidate: &str, _threshold: f64) -> bool {
        reference == candidate
    }
}

/// The similarity of two strings, between 0 and 1.
///
/// Twice the number of characters in matching blocks over the total number of
/// characters. The matching blocks are found by taking the longest common
/// block, then recursing on the pieces to its left and to its right.
/// Two empty strings are identical.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let length = a.len() + b.len();
    if length == 0 {
        return 1.0;
    }
    (2 * matched_characters(&a, &b)) as f64 / length as f64
}

fn matched_characters(a: &[char], b: &[char]) -> usize {
    let mut queue: Vec<(usize, usize, usize, usize)> = vec![(0, a.len(), 0, b.len())];
    let mut total = 0;
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        total += size;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            queue.push((i + size, ahi, j + size, bhi));
        }
    }
    total
}

// Longest block common to a[alo..ahi] and b[blo..bhi].
// Among the blocks of maximal size, returns the one that starts first in a,
// then first in b.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // prev[k] is the length of the block ending at a[i - 1] and b[blo + k - 1]
    let mut prev: Vec<usize> = vec![0; bhi - blo + 1];
    for i in alo..ahi {
        let mut cur: Vec<usize> = vec![0; bhi - blo + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let size = prev[j - blo] + 1;
                cur[j - blo + 1] = size;
                if size > best_size {
                    best_i = i + 1 - size;
                    best_j = j + 1 - size;
                    best_size = size;
                }
            }
        }
        prev = cur;
    }
    (best_i, best_j, best_size)
}
