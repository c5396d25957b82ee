//! Chart traces.
//!
//! A small tagged model of what a chart draws. The pipeline's output is
//! turned into traces here, and the terminal renderer only has to know how
//! to draw each kind.

use serde::Serialize;

use crate::pipeline::{FileView, ScorePoint, Session};

/// One drawable element of a chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trace {
    /// Score line; absent scores break it into segments
    Line {
        name: String,
        segments: Vec<Vec<(f64, f64)>>,
    },
    /// Isolated points with a short label each
    Marker {
        name: String,
        points: Vec<(f64, f64)>,
        labels: Vec<String>,
    },
    /// A binding site drawn on its lane
    StackedInterval {
        name: String,
        lane: usize,
        y: f64,
        start: f64,
        end: f64,
        is_added: bool,
    },
    /// Horizontal line across the whole sequence
    Threshold {
        name: String,
        y: f64,
        start: f64,
        end: f64,
    },
}

impl Trace {
    pub fn name(&self) -> &str {
        match self {
            Trace::Line { name, .. }
            | Trace::Marker { name, .. }
            | Trace::StackedInterval { name, .. }
            | Trace::Threshold { name, .. } => name,
        }
    }

    /// Point lists to draw; lines and intervals as polylines, markers as
    /// a single scatter list.
    pub fn polylines(&self) -> Vec<Vec<(f64, f64)>> {
        match self {
            Trace::Line { segments, .. } => segments.clone(),
            Trace::Marker { points, .. } => vec![points.clone()],
            Trace::StackedInterval { y, start, end, .. } => vec![vec![(*start, *y), (*end, *y)]],
            Trace::Threshold { y, start, end, .. } => vec![vec![(*start, *y), (*end, *y)]],
        }
    }

    /// Lowest and highest y of the trace.
    pub fn y_extent(&self) -> Option<(f64, f64)> {
        self.polylines()
            .iter()
            .flatten()
            .map(|&(_, y)| y)
            .fold(None, |acc, y| match acc {
                None => Some((y, y)),
                Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
            })
    }
}

/// Splits scores into runs of consecutive present values.
pub fn line_segments(points: &[ScorePoint]) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for point in points {
        match point.score {
            Some(score) => current.push((point.x, score)),
            None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Every trace of one score file's chart.
pub fn build_traces(session: &Session, file: &FileView) -> Vec<Trace> {
    let mut traces = Vec::new();

    for track in &file.tracks {
        traces.push(Trace::Line {
            name: track.sequence.clone(),
            segments: line_segments(&track.points),
        });
        if !track.peaks.is_empty() {
            traces.push(Trace::Marker {
                name: format!("{} peaks", track.sequence),
                points: track.peaks.clone(),
                labels: Vec::new(),
            });
        }
    }

    for lane in &file.lanes {
        for placed in &lane.sites {
            traces.push(Trace::StackedInterval {
                name: placed.sequence.clone(),
                lane: lane.index,
                y: lane.y,
                start: placed.site.start as f64,
                end: placed.site.end as f64,
                is_added: placed.site.is_added,
            });
        }
    }

    if let Some(max_score) = file.max_score {
        traces.push(Trace::Threshold {
            name: "Max Score".to_string(),
            y: max_score,
            start: 0.0,
            end: session.reference_len() as f64,
        });
    }

    if !session.mutant_markers.is_empty() {
        traces.push(Trace::Marker {
            name: "Mutant effect".to_string(),
            points: session
                .mutant_markers
                .iter()
                .map(|m| (m.position as f64, m.delta))
                .collect(),
            labels: session.mutant_markers.iter().map(|m| m.base.to_string()).collect(),
        });
    }

    traces
}

/// Y bounds covering every trace, padded by 10%.
pub fn y_bounds(traces: &[Trace]) -> [f64; 2] {
    let (lo, hi) = traces
        .iter()
        .filter_map(Trace::y_extent)
        .fold((0.0f64, 0.0f64), |(lo, hi), (a, b)| (lo.min(a), hi.max(b)));
    let pad = ((hi - lo) * 0.1).max(0.05);
    [lo - pad, hi + pad]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pipeline::process;
    use crate::plot_data::PlotData;

    fn session() -> Session {
        let data = PlotData::from_json_str(
            r#"{
                "sequence_strs": { "wt": "ACGTACGT" },
                "aligned_scores": { "tf1.txt": { "wt": [1.0, null, 2.0, 2.5, null] } },
                "binding_sites": { "tf1.txt": { "wt": [[1, 5, "CGTA", true], [3, 8, "TACG", false]] } },
                "max_scores": { "tf1.txt": 2.2 }
            }"#,
        )
        .unwrap();
        process(&data, &Config::default()).unwrap()
    }

    #[test]
    fn test_line_breaks_at_gaps() {
        let session = session();
        let segments = line_segments(&session.files[0].tracks[0].points);
        assert_eq!(segments, vec![vec![(0.0, 1.0)], vec![(2.0, 2.0), (3.0, 2.5)]]);
        assert!(line_segments(&[]).is_empty());
    }

    #[test]
    fn test_build_traces() {
        let session = session();
        let traces = build_traces(&session, &session.files[0]);
        assert_eq!(traces.len(), 4);
        assert_eq!(traces[0].name(), "wt");

        match &traces[2] {
            Trace::StackedInterval { lane, y, is_added, .. } => {
                assert_eq!(*lane, 1);
                assert!((*y - (-0.2)).abs() < 1e-12);
                assert!(!is_added);
            }
            other => panic!("unexpected trace {:?}", other),
        }
        assert_eq!(
            traces[3],
            Trace::Threshold {
                name: "Max Score".to_string(),
                y: 2.2,
                start: 0.0,
                end: 8.0
            }
        );
    }

    #[test]
    fn test_y_bounds_cover_lanes_and_scores() {
        let session = session();
        let traces = build_traces(&session, &session.files[0]);
        let [lo, hi] = y_bounds(&traces);
        assert!(lo < -0.2);
        assert!(hi > 2.5);
        assert_eq!(y_bounds(&[]), [-0.05, 0.05]);
    }

    #[test]
    fn test_trace_serializes_with_kind() {
        let trace = Trace::Threshold {
            name: "Max Score".to_string(),
            y: 1.0,
            start: 0.0,
            end: 4.0,
        };
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["kind"], "threshold");
    }
}
