//! Binding-site lane packing.
//!
//! Intervals are assigned online, in input order: each goes into the first
//! existing lane where it overlaps nothing, or opens a new lane. The result
//! never has overlaps inside a lane but is not guaranteed to use the fewest
//! lanes; that would need sorting by start first.

use serde::Serialize;

use crate::model::{Interval, Lane};

/// Packs intervals into non-overlapping lanes.
///
/// # Examples
///
/// ```
/// use bindview::lanes::pack_lanes;
///
/// let lanes = pack_lanes(vec![(1i64, 5i64), (3, 8), (6, 10)]);
/// assert_eq!(lanes[0].members, vec![(1i64, 5i64), (6, 10)]);
/// assert_eq!(lanes[1].members, vec![(3i64, 8i64)]);
/// ```
pub fn pack_lanes<T, I>(intervals: I) -> Vec<Lane<T>>
where
    T: Interval,
    I: IntoIterator<Item = T>,
{
    let mut lanes: Vec<Lane<T>> = Vec::new();

    for item in intervals {
        match lanes.iter_mut().find(|lane| lane.accepts(&item)) {
            Some(lane) => lane.members.push(item),
            None => {
                let index = lanes.len();
                lanes.push(Lane::new(index, item));
            }
        }
    }

    lanes
}

/// Vertical placement of lanes below a chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LaneLayout {
    /// Y of lane 0
    pub base: f64,
    /// Distance between consecutive lanes
    pub height: f64,
}

impl LaneLayout {
    pub fn new(base: f64, height: f64) -> Self {
        Self { base, height }
    }

    /// Y offset of the lane with the given index; lanes stack downward.
    pub fn offset(&self, index: usize) -> f64 {
        self.base - self.height * index as f64
    }
}

/// Returns true when no lane holds two overlapping intervals.
pub fn lanes_are_disjoint<T: Interval>(lanes: &[Lane<T>]) -> bool {
    lanes.iter().all(|lane| {
        lane.members
            .iter()
            .enumerate()
            .all(|(i, a)| lane.members[i + 1..].iter().all(|b| !a.overlaps(b)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BindingSite;

    #[test]
    fn test_pack_scenario() {
        let lanes = pack_lanes(vec![(1i64, 5i64), (3, 8), (6, 10)]);
        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[0].members, vec![(1i64, 5i64), (6, 10)]);
        assert_eq!(lanes[1].members, vec![(3i64, 8i64)]);
        assert_eq!(lanes[1].index, 1);
    }

    #[test]
    fn test_pack_empty() {
        let lanes = pack_lanes(Vec::<(i64, i64)>::new());
        assert!(lanes.is_empty());
    }

    #[test]
    fn test_pack_fully_overlapping() {
        let lanes = pack_lanes(vec![(0i64, 10i64); 4]);
        assert_eq!(lanes.len(), 4);
        assert!(lanes.iter().all(|lane| lane.len() == 1));
    }

    #[test]
    fn test_touching_endpoints_overlap() {
        // Closed intervals: sharing an endpoint is an overlap
        let lanes = pack_lanes(vec![(0i64, 4i64), (4, 8), (9, 12)]);
        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[0].members, vec![(0i64, 4i64), (9, 12)]);
    }

    #[test]
    fn test_pack_keeps_lanes_disjoint() {
        // Deterministic pseudo-random intervals
        let mut seed = 17u64;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as i64
        };
        let intervals: Vec<(i64, i64)> = (0..200)
            .map(|_| {
                let start = next() % 500;
                (start, start + next() % 40)
            })
            .collect();

        let lanes = pack_lanes(intervals.clone());
        assert!(lanes_are_disjoint(&lanes));
        assert_eq!(lanes.iter().map(|l| l.len()).sum::<usize>(), intervals.len());
    }

    #[test]
    fn test_pack_binding_sites_keeps_payload() {
        let sites = vec![
            BindingSite::new(0, 7, "ACGTACGT", true),
            BindingSite::new(3, 10, "TACGTACG", false),
        ];
        let lanes = pack_lanes(sites);
        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[1].members[0].substring, "TACGTACG");
        assert!(!lanes[1].members[0].is_added);
    }

    #[test]
    fn test_lane_offsets() {
        let layout = LaneLayout::new(-0.2, 0.1);
        assert_eq!(layout.offset(0), -0.2);
        assert!((layout.offset(2) - (-0.4)).abs() < 1e-12);
    }
}
