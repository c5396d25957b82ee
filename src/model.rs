//! Data model for the binding-score viewer.
//!
//! This module contains the plain data structures shared by the pipeline:
//! - Sequences and their nullable score vectors
//! - Binding-site intervals and display lanes
//! - Viewport ranges and view identities
//!
//! Nothing here mutates a sequence or a score vector in place; derived
//! forms (gapped sequences, lanes) are always new values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Symbol used for alignment gaps in derived sequences.
pub const GAP: char = '-';

/// Represents a single named sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// The sequence name (key of `sequence_strs`)
    pub id: String,
    /// The sequence data over {A,C,G,T,N}
    pub data: String,
}

impl Sequence {
    /// Creates a new sequence.
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }

    /// Returns the length of the sequence.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Sliding-window scores for one (file, sequence) pair.
///
/// `None` marks a window without a score, i.e. an alignment gap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreVector(pub Vec<Option<f64>>);

impl ScoreVector {
    pub fn new(scores: Vec<Option<f64>>) -> Self {
        Self(scores)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<Option<f64>>> for ScoreVector {
    fn from(scores: Vec<Option<f64>>) -> Self {
        Self(scores)
    }
}

/// A closed integer interval over reference coordinates.
pub trait Interval {
    fn start(&self) -> i64;
    fn end(&self) -> i64;

    /// Closed-interval overlap: `[a,b]` and `[c,d]` overlap iff `a <= d && b >= c`.
    fn overlaps<I: Interval + ?Sized>(&self, other: &I) -> bool {
        self.start() <= other.end() && self.end() >= other.start()
    }
}

impl Interval for (i64, i64) {
    fn start(&self) -> i64 {
        self.0
    }

    fn end(&self) -> i64 {
        self.1
    }
}

/// A region of predicted motif binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "crate::plot_data::RawBindingSite", into = "crate::plot_data::RawBindingSite")]
pub struct BindingSite {
    pub start: i64,
    pub end: i64,
    /// Underlying (possibly gapped) substring
    pub substring: String,
    /// `true` for observed sites, `false` for sites re-flagged as removed
    pub is_added: bool,
}

impl BindingSite {
    pub fn new(start: i64, end: i64, substring: impl Into<String>, is_added: bool) -> Self {
        Self {
            start,
            end,
            substring: substring.into(),
            is_added,
        }
    }

    /// The substring with gap symbols removed.
    pub fn ungapped(&self) -> String {
        self.substring.chars().filter(|&c| c != GAP).collect()
    }
}

impl Interval for BindingSite {
    fn start(&self) -> i64 {
        self.start
    }

    fn end(&self) -> i64 {
        self.end
    }
}

/// A set of mutually non-overlapping intervals sharing one display slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lane<T> {
    /// Creation order, used as the vertical display offset
    pub index: usize,
    pub members: Vec<T>,
}

impl<T: Interval> Lane<T> {
    pub fn new(index: usize, first: T) -> Self {
        Self {
            index,
            members: vec![first],
        }
    }

    /// Returns true if `item` overlaps none of the members.
    pub fn accepts(&self, item: &T) -> bool {
        self.members.iter().all(|m| !m.overlaps(item))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Identity of one chart view inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ViewId(pub usize);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// The visible x-range of one chart view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewRange {
    pub start: f64,
    pub end: f64,
}

impl ViewRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Finite and strictly increasing.
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start < self.end
    }

    /// Zooms around the centre; `factor < 1` zooms in.
    pub fn zoomed(&self, factor: f64) -> Self {
        let centre = (self.start + self.end) / 2.0;
        let half = (self.width() * factor / 2.0).max(0.5);
        Self::new(centre - half, centre + half)
    }

    /// Shifts by `delta` x-units.
    pub fn panned(&self, delta: f64) -> Self {
        Self::new(self.start + delta, self.end + delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_creation() {
        let seq = Sequence::new("wt", "ACGT");
        assert_eq!(seq.id, "wt");
        assert_eq!(seq.len(), 4);
    }

    #[test]
    fn test_score_vector_counts() {
        let scores = ScoreVector::new(vec![Some(1.0), None, Some(3.5), None]);
        assert_eq!(scores.len(), 4);
        assert_eq!(scores.iter().flatten().count(), 2);
        assert!(ScoreVector::default().is_empty());
    }

    #[test]
    fn test_closed_interval_overlap() {
        assert!((1i64, 5i64).overlaps(&(3i64, 8i64)));
        assert!((1i64, 5i64).overlaps(&(5i64, 9i64)));
        assert!(!(1i64, 5i64).overlaps(&(6i64, 10i64)));
        assert!((3i64, 8i64).overlaps(&(6i64, 10i64)));
    }

    #[test]
    fn test_binding_site_ungapped() {
        let site = BindingSite::new(2, 9, "AC-GT--A", true);
        assert_eq!(site.ungapped(), "ACGTA");
    }

    #[test]
    fn test_view_range_zoom_and_pan() {
        let range = ViewRange::new(0.0, 100.0);
        assert_eq!(range.zoomed(0.5), ViewRange::new(25.0, 75.0));
        assert_eq!(range.panned(10.0), ViewRange::new(10.0, 110.0));
        assert!(range.is_valid());
        assert!(!ViewRange::new(5.0, 5.0).is_valid());
        assert!(!ViewRange::new(f64::NAN, 5.0).is_valid());
    }
}
