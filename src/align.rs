//! Gapped alignment reconstruction.
//!
//! The scoring backend reports one score per sliding window and `null`
//! where the window falls on an alignment gap. This module rebuilds the
//! gapped sequence those scores correspond to, and derives the
//! x-coordinates used to plot sequences carrying insertions.
//!
//! ## Prefix convention
//!
//! For a reference of length `L` and `n` scores, the reconstructed string
//! starts with an ungapped prefix of the reference. Two conventions exist
//! for its length and they differ by one:
//!
//! - [`PrefixConvention::Inclusive`]: `L - n + 1` (output length `L + 1`)
//! - [`PrefixConvention::Exclusive`]: `L - n` (output length `L`)
//!
//! Which one matches the backend's coordinate system has to be checked at
//! integration time, so it is a configuration value rather than a constant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ScoreVector, GAP};

/// Errors that can occur while aligning scores to a sequence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignError {
    #[error("Score vector of length {scores_len} does not fit reference of length {reference_len} (prefix {prefix})")]
    InvalidRange {
        reference_len: usize,
        scores_len: usize,
        prefix: i64,
    },

    #[error("Unknown mutation suffix in sequence name: {0}")]
    UnknownMutation(String),

    #[error("Mutation position {position} is outside sequence of length {len}")]
    MutationOutOfRange { position: usize, len: usize },
}

/// Result type for alignment operations.
pub type AlignResult<T> = Result<T, AlignError>;

/// How the ungapped prefix length is derived from `L` and `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixConvention {
    /// `prefix = L - n + 1`
    #[default]
    Inclusive,
    /// `prefix = L - n`
    Exclusive,
}

impl PrefixConvention {
    /// Signed prefix length; negative when the scores do not fit.
    pub fn prefix_len(self, reference_len: usize, scores_len: usize) -> i64 {
        let base = reference_len as i64 - scores_len as i64;
        match self {
            PrefixConvention::Inclusive => base + 1,
            PrefixConvention::Exclusive => base,
        }
    }
}

impl std::fmt::Display for PrefixConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefixConvention::Inclusive => write!(f, "inclusive (L-n+1)"),
            PrefixConvention::Exclusive => write!(f, "exclusive (L-n)"),
        }
    }
}

/// Rebuilds the gapped sequence for `scores` against `reference`.
///
/// The output is the reference prefix followed by one character per score:
/// the next reference base for a present score, a gap for an absent one.
/// Positions past the end of the reference (a present score there, or an
/// empty score vector under the inclusive convention) become gaps, so the
/// output length is always `prefix + n`.
///
/// # Examples
///
/// ```
/// use bindview::align::{reconstruct, PrefixConvention};
/// use bindview::model::ScoreVector;
///
/// let scores = ScoreVector::new(vec![Some(1.0), None, Some(2.0), None, Some(3.0)]);
/// let aligned = reconstruct("ACGTACGT", &scores, PrefixConvention::Inclusive).unwrap();
/// assert_eq!(aligned, "ACGTA-C-G");
/// ```
pub fn reconstruct(
    reference: &str,
    scores: &ScoreVector,
    convention: PrefixConvention,
) -> AlignResult<String> {
    let bases: Vec<char> = reference.chars().collect();
    let prefix = convention.prefix_len(bases.len(), scores.len());
    if prefix < 0 {
        return Err(AlignError::InvalidRange {
            reference_len: bases.len(),
            scores_len: scores.len(),
            prefix,
        });
    }
    let prefix = prefix as usize;

    let mut aligned = String::with_capacity(prefix + scores.len());
    aligned.extend(bases.iter().take(prefix));
    aligned.extend(std::iter::repeat(GAP).take(prefix.saturating_sub(bases.len())));

    let mut cursor = prefix;
    for score in scores.iter() {
        match (score, bases.get(cursor)) {
            (Some(_), Some(&base)) => {
                aligned.push(base);
                cursor += 1;
            }
            _ => aligned.push(GAP),
        }
    }

    Ok(aligned)
}

/// X-coordinate of every character of an aligned sequence.
///
/// Uppercase letters and gaps sit on consecutive integers. A run of `m`
/// lowercase letters (insertions relative to the reference) is spread
/// evenly between the integer before it and the next one.
pub fn insertion_positions(aligned: &str) -> Vec<f64> {
    let mut xs = Vec::with_capacity(aligned.len());
    let mut next = 0i64;
    let mut inserted = 0usize;

    for c in aligned.chars() {
        if c.is_ascii_lowercase() {
            inserted += 1;
            continue;
        }
        if inserted > 0 {
            xs.extend(fractions(inserted, next - 1));
            inserted = 0;
        }
        xs.push(next as f64);
        next += 1;
    }
    if inserted > 0 {
        xs.extend(fractions(inserted, next - 1));
    }

    xs
}

fn fractions(count: usize, base: i64) -> impl Iterator<Item = f64> {
    (0..count).map(move |i| base as f64 + (i + 1) as f64 / (count + 1) as f64)
}

/// Maximal gap runs inside `aligned[start..=end]`, as `(x_first, x_last)`.
pub fn gap_runs(aligned: &str, start: usize, end: usize, xs: &[f64]) -> Vec<(f64, f64)> {
    runs(aligned, start, end, |c| c == GAP)
        .into_iter()
        .filter_map(|(first, last)| Some((*xs.get(first)?, *xs.get(last)?)))
        .collect()
}

/// Maximal insertion (lowercase) runs inside `aligned[start..=end]`,
/// as `(x_midpoint, uppercased_text)`.
pub fn insertion_runs(aligned: &str, start: usize, end: usize, xs: &[f64]) -> Vec<(f64, String)> {
    runs(aligned, start, end, |c| c.is_ascii_lowercase())
        .into_iter()
        .filter_map(|(first, last)| {
            let mid = (xs.get(first)? + xs.get(last)?) / 2.0;
            let text: String = aligned.chars().skip(first).take(last + 1 - first).collect();
            Some((mid, text.to_uppercase()))
        })
        .collect()
}

fn runs(aligned: &str, start: usize, end: usize, pred: impl Fn(char) -> bool) -> Vec<(usize, usize)> {
    let chars: Vec<char> = aligned.chars().collect();
    let end = end.min(chars.len().saturating_sub(1));
    let mut found = Vec::new();
    let mut open: Option<usize> = None;

    for i in start..=end {
        let hit = chars.get(i).is_some_and(|&c| pred(c));
        match (hit, open) {
            (true, None) => open = Some(i),
            (false, Some(first)) => {
                found.push((first, i - 1));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(first) = open {
        found.push((first, end));
    }

    found
}

/// A single-base mutation encoded in a sequence name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// `_m<pos><base>`
    Substitution { position: usize, base: char },
    /// `_i<pos><base>`
    Insertion { position: usize, base: char },
    /// `_d<pos>`
    Deletion { position: usize },
}

impl Mutation {
    /// Parses the part after the last `_` of a sequence name.
    ///
    /// Returns `Ok(None)` for names without a suffix (the reference).
    pub fn from_name(name: &str) -> AlignResult<Option<Self>> {
        let Some((_, suffix)) = name.rsplit_once('_') else {
            return Ok(None);
        };
        let unknown = || AlignError::UnknownMutation(name.to_string());
        let mut chars = suffix.chars();
        let kind = chars.next().ok_or_else(unknown)?;
        let rest = chars.as_str();

        let with_base = |rest: &str| -> AlignResult<(usize, char)> {
            let base = rest.chars().last().filter(|c| c.is_ascii_alphabetic()).ok_or_else(unknown)?;
            let position = rest[..rest.len() - 1].parse().map_err(|_| unknown())?;
            Ok((position, base))
        };

        match kind {
            'm' => with_base(rest).map(|(position, base)| Some(Mutation::Substitution { position, base })),
            'i' => with_base(rest).map(|(position, base)| Some(Mutation::Insertion { position, base })),
            'd' => rest
                .parse()
                .map(|position| Some(Mutation::Deletion { position }))
                .map_err(|_| unknown()),
            _ => Err(unknown()),
        }
    }
}

/// A mutant sequence placed on reference coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct MutantAlignment {
    /// Aligned sequence; inserted bases are lowercase, deleted ones are gaps
    pub aligned: String,
    /// X-coordinate of every aligned character
    pub positions: Vec<f64>,
    pub scores: ScoreVector,
}

/// Aligns a mutant to the reference using only the mutation in its name.
pub fn align_by_mutation_name(
    name: &str,
    sequence: &str,
    scores: &ScoreVector,
) -> AlignResult<MutantAlignment> {
    let identity = || MutantAlignment {
        aligned: sequence.to_string(),
        positions: (0..sequence.len()).map(|i| i as f64).collect(),
        scores: scores.clone(),
    };

    match Mutation::from_name(name)? {
        None | Some(Mutation::Substitution { .. }) => Ok(identity()),
        Some(Mutation::Insertion { position, .. }) => {
            if position >= sequence.len() {
                return Err(AlignError::MutationOutOfRange {
                    position,
                    len: sequence.len(),
                });
            }
            let mut aligned = String::with_capacity(sequence.len());
            aligned.push_str(&sequence[..position]);
            aligned.push_str(&sequence[position..=position].to_ascii_lowercase());
            aligned.push_str(&sequence[position + 1..]);

            let positions = (0..sequence.len())
                .map(|i| match i.cmp(&position) {
                    std::cmp::Ordering::Less => i as f64,
                    std::cmp::Ordering::Equal => position as f64 - 0.5,
                    std::cmp::Ordering::Greater => (i - 1) as f64,
                })
                .collect();

            Ok(MutantAlignment {
                aligned,
                positions,
                scores: scores.clone(),
            })
        }
        Some(Mutation::Deletion { position }) => {
            if position > sequence.len() {
                return Err(AlignError::MutationOutOfRange {
                    position,
                    len: sequence.len(),
                });
            }
            let mut aligned = String::with_capacity(sequence.len() + 1);
            aligned.push_str(&sequence[..position]);
            aligned.push(GAP);
            aligned.push_str(&sequence[position..]);

            let split = position.min(scores.len());
            let mut gapped = scores.0[..split].to_vec();
            gapped.push(None);
            gapped.extend_from_slice(&scores.0[split..]);

            Ok(MutantAlignment {
                positions: (0..aligned.len()).map(|i| i as f64).collect(),
                aligned,
                scores: ScoreVector::new(gapped),
            })
        }
    }
}
