//! Interactive application state.
//!
//! Holds one [`ChartPanel`] per score file, all linked in a single
//! [`LinkedViews`] session. The panels implement [`ChartView`] the way a
//! charting front end does: a range or overlay update is accepted
//! immediately but only completes once the next frame has been drawn.
//! Completing a range update also reports the range as changed again,
//! which is the echo the sync lock exists to drop.

use log::debug;

use crate::annotate::BaseLabel;
use crate::model::{ViewId, ViewRange};
use crate::pipeline::{FileView, Session};
use crate::sync::{ChartView, Completion, LinkedViews, SyncOutcome, ViewError, ViewEvent};

/// Fraction of the visible width moved by one pan step.
const PAN_STEP: f64 = 0.25;
/// Zoom factor of one zoom-in step.
const ZOOM_STEP: f64 = 0.5;

/// Application mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMode {
    /// Normal mode for navigation
    Normal,
    /// Command mode (after pressing ':')
    Command(String),
}

/// One chart on screen.
#[derive(Debug, Clone)]
pub struct ChartPanel {
    /// Index into `Session::files`
    pub file: usize,
    range: ViewRange,
    labels: Vec<BaseLabel>,
    range_pending: bool,
    overlay_pending: bool,
}

impl ChartPanel {
    pub fn new(file: usize, range: ViewRange) -> Self {
        Self {
            file,
            range,
            labels: Vec::new(),
            range_pending: false,
            overlay_pending: false,
        }
    }

    /// Moves the panel directly (user interaction).
    pub fn show(&mut self, range: ViewRange) {
        if range.is_valid() {
            self.range = range;
        }
    }

    pub fn labels(&self) -> &[BaseLabel] {
        &self.labels
    }

    pub fn has_pending(&self) -> bool {
        self.range_pending || self.overlay_pending
    }

    /// Events produced by a drawn frame: the relayout echo of every
    /// pending update, followed by its completion.
    pub fn take_completions(&mut self, id: ViewId) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        if std::mem::take(&mut self.range_pending) {
            events.push(ViewEvent::RangeChanged(id));
            events.push(ViewEvent::RangeSettled(id, Ok(())));
        }
        if std::mem::take(&mut self.overlay_pending) {
            events.push(ViewEvent::RangeChanged(id));
            events.push(ViewEvent::OverlaySettled(id, Ok(())));
        }
        events
    }
}

impl ChartView for ChartPanel {
    fn range(&self) -> ViewRange {
        self.range
    }

    fn set_range(&mut self, range: ViewRange) -> Result<Completion, ViewError> {
        if !range.is_valid() {
            return Err(ViewError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        self.range = range;
        self.range_pending = true;
        Ok(Completion::Pending)
    }

    fn set_overlay(&mut self, labels: Vec<BaseLabel>) -> Result<Completion, ViewError> {
        self.labels = labels;
        self.overlay_pending = true;
        Ok(Completion::Pending)
    }
}

/// Main application state.
#[derive(Debug)]
pub struct AppState {
    pub session: Session,
    pub views: LinkedViews<ChartPanel>,
    /// Chart receiving zoom and pan keys
    pub focus: ViewId,
    /// Index of the track whose hover text is shown
    pub selected: usize,
    pub mode: AppMode,
    pub should_quit: bool,
    pub status_message: Option<String>,
    /// Source file name for display
    pub file_name: String,
}

impl AppState {
    /// Creates the state with every chart showing the whole reference.
    pub fn new(session: Session, file_name: String, label_window: usize) -> Self {
        let full = full_range(&session);
        let mut views = LinkedViews::new(session.reference.clone(), label_window);
        for file in 0..session.files.len() {
            views.register(ChartPanel::new(file, full));
        }
        views.refresh_annotations();

        let status_message = if session.errors.is_empty() {
            None
        } else {
            Some(format!("{} tracks could not be aligned (see log)", session.errors.len()))
        };

        Self {
            session,
            views,
            focus: ViewId(0),
            selected: 0,
            mode: AppMode::Normal,
            should_quit: false,
            status_message,
            file_name,
        }
    }

    pub fn chart_count(&self) -> usize {
        self.views.len()
    }

    pub fn focused_range(&self) -> Option<ViewRange> {
        self.views.view(self.focus).map(ChartView::range)
    }

    pub fn pan(&mut self, direction: f64) {
        if let Some(range) = self.focused_range() {
            self.move_focused(range.panned(range.width() * PAN_STEP * direction));
        }
    }

    pub fn zoom_in(&mut self) {
        if let Some(range) = self.focused_range() {
            self.move_focused(range.zoomed(ZOOM_STEP));
        }
    }

    pub fn zoom_out(&mut self) {
        if let Some(range) = self.focused_range() {
            self.move_focused(range.zoomed(1.0 / ZOOM_STEP));
        }
    }

    pub fn reset_zoom(&mut self) {
        self.move_focused(full_range(&self.session));
    }

    /// Centres the focused chart on a reference position.
    pub fn goto_position(&mut self, position: usize) {
        if let Some(range) = self.focused_range() {
            let half = range.width() / 2.0;
            let x = position as f64;
            self.move_focused(ViewRange::new(x - half, x + half));
        }
    }

    fn move_focused(&mut self, range: ViewRange) {
        let focus = self.focus;
        if let Some(panel) = self.views.view_mut(focus) {
            panel.show(range);
        }
        let outcome = self.views.handle(ViewEvent::RangeChanged(focus));
        self.report(outcome);
    }

    fn report(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Dropped { source, busy_with } => {
                debug!("change from {} dropped while syncing {}", source, busy_with);
            }
            SyncOutcome::Propagating { failed, .. } | SyncOutcome::Settled { failed, .. } if !failed.is_empty() => {
                self.status_message = Some(format!("{} charts did not follow", failed.len()));
            }
            _ => {}
        }
    }

    pub fn has_pending(&self) -> bool {
        self.views.slots().any(|slot| slot.view.has_pending())
    }

    /// Delivers the completions of the frame just drawn.
    pub fn settle_completions(&mut self) {
        let ids: Vec<ViewId> = self.views.slots().map(|slot| slot.id).collect();
        let mut events = Vec::new();
        for id in ids {
            if let Some(panel) = self.views.view_mut(id) {
                events.extend(panel.take_completions(id));
            }
        }
        for event in events {
            let outcome = self.views.handle(event);
            self.report(outcome);
        }
    }

    pub fn focus_next(&mut self) {
        if self.chart_count() > 0 {
            self.focus = ViewId((self.focus.0 + 1) % self.chart_count());
        }
    }

    fn track_count(&self) -> usize {
        self.focused_file().map(|f| f.tracks.len()).unwrap_or(0)
    }

    pub fn focused_file(&self) -> Option<&FileView> {
        let panel = self.views.view(self.focus)?;
        self.session.files.get(panel.file)
    }

    pub fn select_next(&mut self) {
        let count = self.track_count();
        if count > 0 {
            self.selected = (self.selected + 1) % count;
        }
    }

    pub fn select_previous(&mut self) {
        let count = self.track_count();
        if count > 0 {
            self.selected = (self.selected + count - 1) % count;
        }
    }

    /// Hover text of the selected track at the centre of the focused chart.
    pub fn hover_text(&self) -> Option<&str> {
        let range = self.focused_range()?;
        let file = self.focused_file()?;
        let track = file.tracks.get(self.selected.min(file.tracks.len().saturating_sub(1)))?;
        let index = track.nearest_point((range.start + range.end) / 2.0)?;
        track.points.get(index)?.hover.as_deref()
    }

    /// Enters command mode.
    pub fn enter_command_mode(&mut self) {
        self.mode = AppMode::Command(String::new());
        self.status_message = None;
    }

    /// Adds a character to the command buffer.
    pub fn command_input(&mut self, c: char) {
        if let AppMode::Command(ref mut cmd) = self.mode {
            cmd.push(c);
        }
    }

    /// Removes the last character from the command buffer.
    pub fn command_backspace(&mut self) {
        if let AppMode::Command(ref mut cmd) = self.mode {
            if cmd.pop().is_none() {
                self.mode = AppMode::Normal;
            }
        }
    }

    pub fn cancel_command(&mut self) {
        self.mode = AppMode::Normal;
    }

    /// Executes the current command.
    pub fn execute_command(&mut self) {
        let AppMode::Command(cmd) = std::mem::replace(&mut self.mode, AppMode::Normal) else {
            return;
        };
        match cmd.trim() {
            "q" | "quit" => self.should_quit = true,
            other => match other.parse::<usize>() {
                Ok(position) => self.goto_position(position),
                Err(_) => self.status_message = Some(format!("Unknown command: {}", other)),
            },
        }
    }
}

fn full_range(session: &Session) -> ViewRange {
    ViewRange::new(0.0, session.reference_len().max(1) as f64)
}
