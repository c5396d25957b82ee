//! Motif window extraction from gapped sequences.
//!
//! A k-mer is read by walking forward from a position and collecting the
//! first `k` non-gap characters. Near the end of a sequence fewer than `k`
//! may remain; the short k-mer is returned as is.

use std::ops::Range;

use crate::model::GAP;

/// A k-mer read from a gapped sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kmer {
    /// Uppercased, gap-free text; at most `k` characters
    pub text: String,
    /// Number of aligned characters scanned to read it
    pub consumed: usize,
}

impl Kmer {
    /// Returns true when fewer than `k` bases were available.
    pub fn is_ragged(&self, k: usize) -> bool {
        self.text.chars().count() < k
    }
}

/// Reads up to `k` non-gap characters of `aligned` starting at `start`.
///
/// `consumed` counts every scanned character including gaps, so
/// `start..start + consumed` is the aligned span of the window.
pub fn extract_kmer(aligned: &str, k: usize, start: usize) -> Kmer {
    let mut text = String::with_capacity(k);
    let mut consumed = 0;
    let mut taken = 0;

    if k > 0 {
        for c in aligned.chars().skip(start) {
            consumed += 1;
            if c != GAP {
                text.extend(c.to_uppercase());
                taken += 1;
                if taken >= k {
                    break;
                }
            }
        }
    }

    Kmer { text, consumed }
}

/// Aligned span covered by the k-length window anchored at `start`.
pub fn window_span(aligned: &str, k: usize, start: usize) -> Range<usize> {
    let kmer = extract_kmer(aligned, k, start);
    start..start + kmer.consumed
}

/// Reference coordinate of an aligned position: the number of non-gap
/// characters before it.
pub fn ungapped_offset(aligned: &str, pos: usize) -> usize {
    aligned.chars().take(pos).filter(|&c| c != GAP).count()
}
