//! Server response model.
//!
//! The scoring backend answers with one JSON document holding every array
//! the viewer needs. Everything except the sequences and the aligned
//! scores is optional: a missing field means "nothing to highlight".
//!
//! ```text
//! {
//!   "ref_name": "wt",
//!   "sequence_strs": { "wt": "ACGT..." },
//!   "aligned_scores": { "file.txt": { "wt": [0.1, null, ...] } },
//!   "binding_sites":  { "file.txt": { "wt": [[3, 12, "ACGT-ACGT", true]] } },
//!   "highest_values": { "file.txt": { "wt": [null, 0.45, ...] } },
//!   "max_scores":     { "file.txt": 0.5 },
//!   "mutants_effect": { "12": { "A": -0.1, "C": 0.2 } }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{BindingSite, ScoreVector, Sequence};

/// Errors that can occur while loading a server response.
#[derive(Error, Debug)]
pub enum PlotDataError {
    #[error("Failed to open file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid plot data: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("No sequences in plot data")]
    NoSequences,

    #[error("Sequence {0} contains non-ASCII characters")]
    NonAsciiSequence(String),
}

/// Result type for loading operations.
pub type PlotDataResult<T> = Result<T, PlotDataError>;

/// Per-file, per-sequence map as sent by the backend.
pub type PerFile<T> = BTreeMap<String, BTreeMap<String, T>>;

/// One response of the scoring backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotData {
    /// Reference sequence for base labels and diffs
    #[serde(default)]
    pub ref_name: Option<String>,

    pub sequence_strs: BTreeMap<String, String>,

    pub aligned_scores: PerFile<ScoreVector>,

    #[serde(default)]
    pub binding_sites: PerFile<Vec<BindingSite>>,

    #[serde(default)]
    pub highest_values: PerFile<ScoreVector>,

    #[serde(default)]
    pub max_scores: BTreeMap<String, f64>,

    /// Single-sequence mode only
    #[serde(default)]
    pub mutants_effect: Option<MutantEffects>,
}

impl PlotData {
    /// Parses a response from a JSON string.
    pub fn from_json_str(content: &str) -> PlotDataResult<Self> {
        let data: PlotData = serde_json::from_str(content)?;
        data.validate()?;
        Ok(data)
    }

    /// Loads a response saved as a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> PlotDataResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let data: PlotData = serde_json::from_reader(reader)?;
        data.validate()?;
        Ok(data)
    }

    fn validate(&self) -> PlotDataResult<()> {
        if self.sequence_strs.is_empty() {
            return Err(PlotDataError::NoSequences);
        }
        if let Some(name) = self.sequence_strs.iter().find(|(_, data)| !data.is_ascii()).map(|(name, _)| name) {
            return Err(PlotDataError::NonAsciiSequence(name.clone()));
        }
        Ok(())
    }

    /// The reference name, falling back to the first sequence.
    pub fn reference_name(&self) -> Option<&str> {
        self.ref_name
            .as_deref()
            .filter(|name| self.sequence_strs.contains_key(*name))
            .or_else(|| self.sequence_strs.keys().next().map(String::as_str))
    }

    pub fn reference(&self) -> Option<Sequence> {
        let name = self.reference_name()?;
        self.sequence(name)
    }

    pub fn sequence(&self, name: &str) -> Option<Sequence> {
        self.sequence_strs
            .get(name)
            .map(|data| Sequence::new(name, data.as_str()))
    }

    /// Score file names in display order.
    pub fn score_files(&self) -> impl Iterator<Item = &str> {
        self.aligned_scores.keys().map(String::as_str)
    }

    pub fn sites_for(&self, file: &str, seq: &str) -> &[BindingSite] {
        self.binding_sites
            .get(file)
            .and_then(|per_seq| per_seq.get(seq))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn highest_for(&self, file: &str, seq: &str) -> Option<&ScoreVector> {
        self.highest_values.get(file)?.get(seq)
    }
}

/// Wire form of a binding site.
///
/// The backend sends either `[start, end, substring, is_added]` or the
/// longer `[start, end, substring, bs_start, bs_end, is_added]`. Positions
/// of sites touching an insertion can be fractional; they are widened to
/// the enclosing integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBindingSite {
    Short(f64, f64, String, bool),
    Long(f64, f64, String, i64, i64, bool),
}

impl From<RawBindingSite> for BindingSite {
    fn from(raw: RawBindingSite) -> Self {
        let (start, end, substring, is_added) = match raw {
            RawBindingSite::Short(start, end, substring, is_added) => (start, end, substring, is_added),
            RawBindingSite::Long(start, end, substring, _, _, is_added) => (start, end, substring, is_added),
        };
        BindingSite::new(start.floor() as i64, end.ceil() as i64, substring, is_added)
    }
}

impl From<BindingSite> for RawBindingSite {
    fn from(site: BindingSite) -> Self {
        RawBindingSite::Short(site.start as f64, site.end as f64, site.substring, site.is_added)
    }
}

/// Per-position score change for every substituted base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawMutantEffects")]
pub struct MutantEffects(pub BTreeMap<usize, BTreeMap<char, f64>>);

/// The backend sends either a position-keyed object or a list indexed by
/// position.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawMutantEffects {
    ByPosition(BTreeMap<String, BTreeMap<String, Option<f64>>>),
    Listed(Vec<BTreeMap<String, Option<f64>>>),
}

impl From<RawMutantEffects> for MutantEffects {
    fn from(raw: RawMutantEffects) -> Self {
        let entries: Vec<(usize, BTreeMap<String, Option<f64>>)> = match raw {
            RawMutantEffects::ByPosition(map) => map
                .into_iter()
                .filter_map(|(pos, bases)| Some((pos.trim().parse().ok()?, bases)))
                .collect(),
            RawMutantEffects::Listed(list) => list.into_iter().enumerate().collect(),
        };
        let effects = entries
            .into_iter()
            .map(|(pos, bases)| {
                let bases = bases
                    .into_iter()
                    .filter_map(|(base, delta)| Some((base.chars().next()?.to_ascii_uppercase(), delta?)))
                    .collect();
                (pos, bases)
            })
            .collect();
        MutantEffects(effects)
    }
}

impl MutantEffects {
    /// The substitution with the largest absolute effect at each position.
    pub fn strongest(&self) -> Vec<(usize, char, f64)> {
        self.0
            .iter()
            .filter_map(|(&pos, bases)| {
                bases
                    .iter()
                    .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
                    .map(|(&base, &delta)| (pos, base, delta))
            })
            .collect()
    }
}
