//! Per-base labels under a chart.
//!
//! When a view is zoomed in far enough, every visible reference base is
//! written under the x-axis. Wider windows clear the labels, since they
//! would overlap into an unreadable band.

use log::debug;

use crate::model::ViewRange;
use crate::sync::{ChartView, Completion, ViewError};

/// Y position of base labels, just below the x-axis (paper coordinates).
pub const LABEL_Y: f64 = -0.15;

/// One base label anchored at an integer x position.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct BaseLabel {
    pub x: usize,
    pub y: f64,
    pub text: char,
}

/// Visible integer positions `[x_start, x_end)` of `range` on a sequence
/// of length `len`.
pub fn visible_positions(range: ViewRange, len: usize) -> (usize, usize) {
    let x_start = range.start.ceil().max(0.0);
    let x_end = (range.end.floor() + 1.0).min(len as f64);
    let x_start = if x_start.is_finite() { (x_start as usize).min(len) } else { 0 };
    let x_end = if x_end.is_finite() && x_end > 0.0 { x_end as usize } else { 0 };
    (x_start, x_end.max(x_start))
}

/// Labels for every visible base, or `None` if `window` or more positions
/// are visible.
pub fn base_labels(range: ViewRange, reference: &str, window: usize) -> Option<Vec<BaseLabel>> {
    let (x_start, x_end) = visible_positions(range, reference.len());
    if x_end - x_start >= window {
        return None;
    }
    let labels = reference.as_bytes()[x_start..x_end]
        .iter()
        .enumerate()
        .map(|(i, &b)| BaseLabel {
            x: x_start + i,
            y: LABEL_Y,
            text: b as char,
        })
        .collect();
    Some(labels)
}

/// Per-view "overlay update in flight" flag.
///
/// Held from the moment new labels are handed to the view until the view
/// reports that the overlay update completed, so a notification raised by
/// the update itself cannot start another one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OverlayGuard {
    busy: bool,
}

impl OverlayGuard {
    /// Acquire-or-skip: returns false if an update is already in flight.
    pub fn try_acquire(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    pub fn release(&mut self) {
        self.busy = false;
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

/// What happened to one view's labels.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationOutcome {
    /// These labels were handed to the view
    Labelled(Vec<BaseLabel>),
    /// Window too wide; labels were removed
    Cleared,
    /// An earlier overlay update has not completed yet
    Skipped,
    /// The view rejected the overlay update
    Failed(ViewError),
}

impl AnnotationOutcome {
    pub fn label_count(&self) -> usize {
        match self {
            AnnotationOutcome::Labelled(labels) => labels.len(),
            _ => 0,
        }
    }
}

/// Recomputes and pushes the base labels of one view.
///
/// The guard stays held when the view answers with a pending completion;
/// the caller releases it once that completion arrives.
pub fn render_annotations<V: ChartView + ?Sized>(
    view: &mut V,
    guard: &mut OverlayGuard,
    reference: &str,
    window: usize,
) -> AnnotationOutcome {
    if !guard.try_acquire() {
        debug!("overlay update already in flight, skipping labels");
        return AnnotationOutcome::Skipped;
    }

    let labels = base_labels(view.range(), reference, window);
    let overlay = labels.clone().unwrap_or_default();

    match view.set_overlay(overlay) {
        Ok(Completion::Pending) => {}
        Ok(Completion::Settled) => guard.release(),
        Err(e) => {
            guard.release();
            return AnnotationOutcome::Failed(e);
        }
    }

    match labels {
        Some(labels) => AnnotationOutcome::Labelled(labels),
        None => AnnotationOutcome::Cleared,
    }
}
