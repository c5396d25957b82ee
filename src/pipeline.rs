//! Server response to display model.
//!
//! Every (score file, sequence) pair becomes a [`Track`]: the gapped
//! sequence its scores align to, one plotted point per score with its
//! hover text, and the gap and insertion runs. Binding sites of each file
//! are packed into lanes. A pair that cannot be aligned is reported in
//! [`Session::errors`] and the remaining pairs are processed normally.

use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::align::{
    align_by_mutation_name, gap_runs, insertion_positions, insertion_runs, reconstruct, AlignError,
    PrefixConvention,
};
use crate::config::Config;
use crate::kmer::{extract_kmer, ungapped_offset, window_span};
use crate::lanes::{pack_lanes, LaneLayout};
use crate::model::{BindingSite, Interval, ScoreVector};
use crate::plot_data::{PlotData, PlotDataError, PlotDataResult};
use crate::sites;

/// Why one track could not be built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackError {
    #[error(transparent)]
    Align(#[from] AlignError),

    #[error("No sequence named {0}")]
    MissingSequence(String),
}

/// One score and where it is plotted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorePoint {
    pub x: f64,
    pub score: Option<f64>,
    /// Window text and score; absent for gap positions
    pub hover: Option<String>,
    /// Aligned span of the scored window
    pub span: Option<(usize, usize)>,
}

/// Aligned scores of one sequence within one score file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub sequence: String,
    pub aligned: String,
    /// Motif width `k`, inferred as `L - n + 1`
    pub motif_width: usize,
    pub points: Vec<ScorePoint>,
    /// Scores above the backend's thresholds, as `(x, score)`
    pub peaks: Vec<(f64, f64)>,
    pub gaps: Vec<(f64, f64)>,
    pub insertions: Vec<(f64, String)>,
}

impl Track {
    /// Index of the point closest to `x`.
    pub fn nearest_point(&self, x: f64) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1.x - x).abs().total_cmp(&(b.1.x - x).abs()))
            .map(|(i, _)| i)
    }
}

/// A binding site together with the sequence it was found on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedSite {
    pub sequence: String,
    pub site: BindingSite,
}

impl Interval for PlacedSite {
    fn start(&self) -> i64 {
        self.site.start
    }

    fn end(&self) -> i64 {
        self.site.end
    }
}

/// One lane of binding sites with its vertical offset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedLane {
    pub index: usize,
    pub y: f64,
    pub sites: Vec<PlacedSite>,
}

/// Everything shown in one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileView {
    pub name: String,
    pub max_score: Option<f64>,
    pub tracks: Vec<Track>,
    pub lanes: Vec<PlacedLane>,
}

/// Strongest substitution effect at one position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MutantMarker {
    pub position: usize,
    pub base: char,
    pub delta: f64,
}

/// A track that failed to build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedTrack {
    pub file: String,
    pub sequence: String,
    pub error: String,
}

/// The processed form of one server response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub reference_name: String,
    pub reference: String,
    pub convention: PrefixConvention,
    pub layout: LaneLayout,
    pub files: Vec<FileView>,
    pub mutant_markers: Vec<MutantMarker>,
    pub errors: Vec<FailedTrack>,
}

impl Session {
    pub fn reference_len(&self) -> usize {
        self.reference.len()
    }

    pub fn track_count(&self) -> usize {
        self.files.iter().map(|f| f.tracks.len()).sum()
    }
}

/// Builds the display model for `data`.
pub fn process(data: &PlotData, config: &Config) -> PlotDataResult<Session> {
    let reference = data.reference().ok_or(PlotDataError::NoSequences)?;
    let layout = config.lane_layout();
    let mut errors = Vec::new();
    let mut files = Vec::new();

    for file in data.score_files() {
        let mut tracks = Vec::new();
        if let Some(per_seq) = data.aligned_scores.get(file) {
            for (name, scores) in per_seq {
                match build_track(data, config, &reference.id, file, name, scores) {
                    Ok(track) => tracks.push(track),
                    Err(e) => {
                        warn!("{} / {}: {}", file, name, e);
                        errors.push(FailedTrack {
                            file: file.to_string(),
                            sequence: name.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        files.push(FileView {
            name: file.to_string(),
            max_score: data.max_scores.get(file).copied(),
            lanes: place_sites(data, config, &reference.id, file, layout),
            tracks,
        });
    }

    let mutant_markers = data
        .mutants_effect
        .as_ref()
        .map(|effects| {
            effects
                .strongest()
                .into_iter()
                .map(|(position, base, delta)| MutantMarker { position, base, delta })
                .collect()
        })
        .unwrap_or_default();

    let session = Session {
        reference_name: reference.id.clone(),
        reference: reference.data,
        convention: config.prefix_convention,
        layout,
        files,
        mutant_markers,
        errors,
    };
    info!(
        "Loaded {} tracks in {} score files against {} ({} failed, prefix {})",
        session.track_count(),
        session.files.len(),
        session.reference_name,
        session.errors.len(),
        session.convention
    );
    Ok(session)
}

fn build_track(
    data: &PlotData,
    config: &Config,
    reference_name: &str,
    file: &str,
    name: &str,
    scores: &ScoreVector,
) -> Result<Track, TrackError> {
    let sequence = data
        .sequence_strs
        .get(name)
        .ok_or_else(|| TrackError::MissingSequence(name.to_string()))?;
    let motif_width = (sequence.len() + 1).saturating_sub(scores.len());

    let is_mutant = name != reference_name
        && name
            .rsplit_once('_')
            .is_some_and(|(base, _)| base == reference_name);

    let (aligned, positions, scores) = if is_mutant {
        let mutant = align_by_mutation_name(name, sequence, scores)?;
        (mutant.aligned, mutant.positions, mutant.scores)
    } else {
        let aligned = reconstruct(sequence, scores, config.prefix_convention)?;
        let positions = insertion_positions(&aligned);
        (aligned, positions, scores.clone())
    };
    let x_at = |i: usize| positions.get(i).copied().unwrap_or(i as f64);

    let precision = config.hover_precision;
    let points = scores
        .iter()
        .enumerate()
        .map(|(i, score)| {
            let x = x_at(i);
            let hover = score.map(|value| {
                let kmer = extract_kmer(&aligned, motif_width, i);
                let tail = if kmer.is_ragged(motif_width) { ".." } else { "" };
                format!(
                    "{} @ {}: {}{} ({:.*}), base {}",
                    name,
                    x,
                    kmer.text,
                    tail,
                    precision,
                    value,
                    ungapped_offset(&aligned, i) + 1
                )
            });
            let span = score.map(|_| {
                let window = window_span(&aligned, motif_width, i);
                (window.start, window.end)
            });
            ScorePoint { x, score, hover, span }
        })
        .collect();

    let peaks = data
        .highest_for(file, name)
        .map(|highest| {
            highest
                .iter()
                .enumerate()
                .filter_map(|(i, value)| Some((x_at(i), value?)))
                .collect()
        })
        .unwrap_or_default();

    let last = aligned.len().saturating_sub(1);
    let gaps = gap_runs(&aligned, 0, last, &positions);
    let insertions = insertion_runs(&aligned, 0, last, &positions);
    debug!("{} / {}: k={} aligned={}", file, name, motif_width, aligned);

    Ok(Track {
        sequence: name.to_string(),
        aligned,
        motif_width,
        points,
        peaks,
        gaps,
        insertions,
    })
}

fn place_sites(
    data: &PlotData,
    config: &Config,
    reference_name: &str,
    file: &str,
    layout: LaneLayout,
) -> Vec<PlacedLane> {
    let Some(mut per_seq) = data.binding_sites.get(file).cloned() else {
        return Vec::new();
    };
    // Diff against the full reference list, then dedupe
    if config.diff_only {
        sites::diff_against_reference(&mut per_seq, reference_name);
    }
    if config.dedupe_sites {
        sites::dedupe_by_substring(&mut per_seq);
    }
    sites::drop_empty(&mut per_seq);

    let placed = per_seq.into_iter().flat_map(|(sequence, list)| {
        list.into_iter().map(move |site| PlacedSite {
            sequence: sequence.clone(),
            site,
        })
    });

    pack_lanes(placed)
        .into_iter()
        .map(|lane| PlacedLane {
            index: lane.index,
            y: layout.offset(lane.index),
            sites: lane.members,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"{
        "ref_name": "wt",
        "sequence_strs": { "wt": "ACGTACGT", "wt_d2": "ACTACGT", "short": "AC" },
        "aligned_scores": {
            "tf1.txt": {
                "wt": [1.0, null, 2.0, null, 3.0],
                "wt_d2": [0.5, 0.4, 0.3, 0.2],
                "short": [1.0, 1.0, 1.0, 1.0, 1.0]
            },
            "tf2.txt": { "wt": [0.1, 0.2, 0.3, 0.4, 0.5], "ghost": [1.0] }
        },
        "binding_sites": {
            "tf1.txt": {
                "wt": [[1, 5, "CGTA", true], [6, 10, "GT", true]],
                "wt_d2": [[1, 5, "CGTA", true], [3, 8, "TACG", true]]
            }
        },
        "highest_values": { "tf1.txt": { "wt": [null, null, 2.0, null, 3.0] } },
        "max_scores": { "tf1.txt": 2.5 },
        "mutants_effect": { "3": { "A": 0.4, "C": -0.6 } }
    }"#;

    fn session(config: &Config) -> Session {
        let data = PlotData::from_json_str(DATA).unwrap();
        process(&data, config).unwrap()
    }

    fn track<'a>(session: &'a Session, file: &str, seq: &str) -> &'a Track {
        session
            .files
            .iter()
            .find(|f| f.name == file)
            .and_then(|f| f.tracks.iter().find(|t| t.sequence == seq))
            .unwrap()
    }

    #[test]
    fn test_reconstructed_track() {
        let session = session(&Config::default());
        let wt = track(&session, "tf1.txt", "wt");
        assert_eq!(wt.aligned, "ACGTA-C-G");
        assert_eq!(wt.motif_width, 4);
        assert_eq!(wt.points.len(), 5);
        assert_eq!(wt.points[0].hover.as_deref(), Some("wt @ 0: ACGT (1.000), base 1"));
        assert_eq!(wt.points[1].score, None);
        assert!(wt.points[1].hover.is_none());
        assert_eq!(wt.points[2].span, Some((2, 7)));
        assert_eq!(wt.gaps, vec![(5.0, 5.0), (7.0, 7.0)]);
        assert_eq!(wt.peaks, vec![(2.0, 2.0), (4.0, 3.0)]);
    }

    #[test]
    fn test_ragged_window_marked_in_hover() {
        let config = Config {
            prefix_convention: PrefixConvention::Exclusive,
            ..Config::default()
        };
        let session = session(&config);
        let wt = track(&session, "tf1.txt", "wt");
        assert_eq!(wt.aligned, "ACGT-A-C");
        assert_eq!(wt.points[0].hover.as_deref(), Some("wt @ 0: ACGT (1.000), base 1"));
        assert_eq!(wt.points[4].hover.as_deref(), Some("wt @ 4: AC.. (3.000), base 5"));
    }

    #[test]
    fn test_failures_are_isolated() {
        let session = session(&Config::default());
        assert_eq!(session.errors.len(), 2);
        assert!(session
            .errors
            .iter()
            .any(|e| e.sequence == "short" && e.error.contains("does not fit")));
        assert!(session.errors.iter().any(|e| e.sequence == "ghost"));

        // Everything else still builds
        assert_eq!(session.track_count(), 3);
        assert_eq!(track(&session, "tf2.txt", "wt").aligned, "ACGTACGT-");
    }

    #[test]
    fn test_mutant_aligned_by_name() {
        let session = session(&Config::default());
        let mutant = track(&session, "tf1.txt", "wt_d2");
        assert_eq!(mutant.aligned, "AC-TACGT");
        assert_eq!(mutant.motif_width, 4);
        assert_eq!(mutant.points.len(), 5);
        assert_eq!(mutant.points[2].score, None);
        assert_eq!(mutant.points[3].score, Some(0.3));
        assert!(mutant.points[3].hover.as_deref().unwrap().ends_with(": TACG (0.300), base 3"));
        assert_eq!(mutant.gaps, vec![(2.0, 2.0)]);
    }

    #[test]
    fn test_sites_packed_into_lanes() {
        let session = session(&Config::default());
        let lanes = &session.files[0].lanes;
        // wt sorts before wt_d2: [1,5] [6,10] then [1,5] [3,8]
        assert_eq!(lanes.len(), 3);
        assert_eq!(lanes[0].y, -0.1);
        assert_eq!(lanes[0].sites.len(), 2);
        assert_eq!(lanes[0].sites[1].site.start, 6);
        assert!(crate::lanes::lanes_are_disjoint(&[crate::model::Lane {
            index: 0,
            members: lanes[0].sites.clone()
        }]));
        assert!(session.files[1].lanes.is_empty());
    }

    #[test]
    fn test_diff_only_sites() {
        let config = Config {
            diff_only: true,
            ..Config::default()
        };
        let session = session(&config);
        let sites: Vec<&PlacedSite> = session.files[0].lanes.iter().flat_map(|l| &l.sites).collect();
        assert_eq!(sites.len(), 2);
        assert!(sites.iter().all(|s| s.sequence == "wt_d2"));
        assert!(sites.iter().any(|s| s.site.substring == "TACG" && s.site.is_added));
        assert!(sites.iter().any(|s| s.site.substring == "GT" && !s.site.is_added));
    }

    #[test]
    fn test_dedupe_sites() {
        let config = Config {
            dedupe_sites: true,
            ..Config::default()
        };
        let session = session(&config);
        let count: usize = session.files[0].lanes.iter().map(|l| l.sites.len()).sum();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_session_extras() {
        let session = session(&Config::default());
        assert_eq!(session.reference_name, "wt");
        assert_eq!(session.files[0].max_score, Some(2.5));
        assert_eq!(session.files[1].max_score, None);
        assert_eq!(
            session.mutant_markers,
            vec![MutantMarker {
                position: 3,
                base: 'C',
                delta: -0.6
            }]
        );

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["convention"], "inclusive");
        assert_eq!(json["files"][0]["lanes"][0]["sites"][0]["site"][2], "CGTA");
    }

    #[test]
    fn test_nearest_point() {
        let session = session(&Config::default());
        let wt = track(&session, "tf1.txt", "wt");
        assert_eq!(wt.nearest_point(2.4), Some(2));
        assert_eq!(wt.nearest_point(100.0), Some(4));
    }
}
