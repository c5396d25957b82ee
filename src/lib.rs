//! # bindview - Terminal Binding-Score Viewer
//!
//! Plots per-position binding-affinity scores of sequences against a
//! reference, with binding-site lanes and linked zoom across charts.
//!
//! ## Architecture
//!
//! The data pipeline is independent of the terminal front end:
//! - `plot_data`: Server response model and JSON loading
//! - `model`: Sequences, score vectors, binding sites, lanes, view ranges
//! - `align`: Gapped alignment reconstruction from nullable scores
//! - `kmer`: Motif windows read from gapped sequences
//! - `lanes`: Packing binding sites into non-overlapping lanes
//! - `sites`: Binding-site de-duplication and diff against the reference
//! - `pipeline`: Server response to per-chart tracks and lanes
//! - `trace`: Tagged chart traces built from the pipeline output
//! - `sync`: Linked chart viewports with a lossy reentrancy guard
//! - `annotate`: Per-base labels for zoomed-in charts
//! - `config`: YAML display configuration
//!
//! The terminal front end:
//! - `state`: Chart panels and application state
//! - `event`: Keyboard event handling (Vim-style navigation)
//! - `ui`: TUI rendering with ratatui
//! - `controller`: Orchestration of state transitions

pub mod align;
pub mod annotate;
pub mod config;
pub mod controller;
pub mod event;
pub mod kmer;
pub mod lanes;
pub mod model;
pub mod pipeline;
pub mod plot_data;
pub mod sites;
pub mod state;
pub mod sync;
pub mod trace;
pub mod ui;
