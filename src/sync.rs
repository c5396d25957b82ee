//! Linked chart viewports.
//!
//! Every chart registered in a [`LinkedViews`] session follows the zoom and
//! pan of the others. When one view reports a range change, its range is
//! read once and pushed to every other view. Updating a view can itself
//! raise "range changed" again, so the session holds a sync lock while
//! propagated updates are in flight and drops (does not queue) any range
//! change that arrives meanwhile. This is what keeps linked views from
//! bouncing updates back and forth forever.
//!
//! ## State machine
//!
//! ```text
//!   Idle --RangeChanged(v)--> Syncing(v) --all targets settled--> Idle
//!                               |  ^
//!                               +--+ RangeChanged(*) dropped
//! ```
//!
//! Once a sync settles, every view's base labels are refreshed (see
//! [`crate::annotate`]).

use std::collections::BTreeSet;

use log::{debug, warn};
use thiserror::Error;

use crate::annotate::{render_annotations, AnnotationOutcome, BaseLabel, OverlayGuard};
use crate::model::{ViewId, ViewRange};

/// Errors reported by chart views.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    #[error("Invalid range {start}..{end}")]
    InvalidRange { start: f64, end: f64 },

    #[error("Render failed: {0}")]
    Render(String),
}

/// Completion signal of an asynchronous view update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The update is already applied
    Settled,
    /// The view will report completion later through a [`ViewEvent`]
    Pending,
}

/// A chart whose x-range can be read and set.
pub trait ChartView {
    /// Currently visible x-range.
    fn range(&self) -> ViewRange;

    /// Shows `range`.
    fn set_range(&mut self, range: ViewRange) -> Result<Completion, ViewError>;

    /// Replaces the per-base label overlay.
    fn set_overlay(&mut self, labels: Vec<BaseLabel>) -> Result<Completion, ViewError>;
}

/// Notifications delivered by the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The view's range changed (user zoom/pan or a finished render)
    RangeChanged(ViewId),
    /// A pending `set_range` finished
    RangeSettled(ViewId, Result<(), ViewError>),
    /// A pending `set_overlay` finished
    OverlaySettled(ViewId, Result<(), ViewError>),
}

/// Result of handling one [`ViewEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// A sync was already running; the change was dropped
    Dropped { source: ViewId, busy_with: ViewId },
    /// The change came from a view whose label overlay is being replaced
    OverlayEcho(ViewId),
    /// Propagation started and is waiting on `pending` targets
    Propagating {
        source: ViewId,
        range: ViewRange,
        pending: usize,
        failed: Vec<ViewId>,
    },
    /// Propagation finished; labels were refreshed on every view
    Settled {
        source: ViewId,
        failed: Vec<ViewId>,
        annotations: Vec<(ViewId, AnnotationOutcome)>,
    },
    /// Nothing to do (stale completion, unknown view)
    Ignored,
}

/// The sync lock: acquire-or-skip, never blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SyncLock {
    #[default]
    Idle,
    Syncing {
        source: ViewId,
        range: ViewRange,
        pending: BTreeSet<ViewId>,
        failed: Vec<ViewId>,
    },
}

impl SyncLock {
    /// Takes the lock for `source`; returns the current holder when busy.
    pub fn try_acquire(&mut self, source: ViewId, range: ViewRange) -> Result<(), ViewId> {
        match self {
            SyncLock::Syncing { source: holder, .. } => Err(*holder),
            SyncLock::Idle => {
                *self = SyncLock::Syncing {
                    source,
                    range,
                    pending: BTreeSet::new(),
                    failed: Vec::new(),
                };
                Ok(())
            }
        }
    }

    pub fn is_held(&self) -> bool {
        matches!(self, SyncLock::Syncing { .. })
    }

    fn release(&mut self) -> Option<(ViewId, Vec<ViewId>)> {
        match std::mem::take(self) {
            SyncLock::Syncing { source, failed, .. } => Some((source, failed)),
            SyncLock::Idle => None,
        }
    }
}

/// Per-view state owned by the session.
#[derive(Debug)]
pub struct ViewSlot<V> {
    pub id: ViewId,
    pub view: V,
    pub overlay: OverlayGuard,
}

/// A session of linked chart views sharing one reference sequence.
#[derive(Debug)]
pub struct LinkedViews<V> {
    slots: Vec<ViewSlot<V>>,
    lock: SyncLock,
    reference: String,
    label_window: usize,
}

impl<V: ChartView> LinkedViews<V> {
    /// Creates an empty session; `reference` supplies the base labels.
    pub fn new(reference: impl Into<String>, label_window: usize) -> Self {
        Self {
            slots: Vec::new(),
            lock: SyncLock::Idle,
            reference: reference.into(),
            label_window,
        }
    }

    /// Adds a view to the session.
    pub fn register(&mut self, view: V) -> ViewId {
        let id = ViewId(self.slots.len());
        self.slots.push(ViewSlot {
            id,
            view,
            overlay: OverlayGuard::default(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn view(&self, id: ViewId) -> Option<&V> {
        self.slots.get(id.0).map(|slot| &slot.view)
    }

    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut V> {
        self.slots.get_mut(id.0).map(|slot| &mut slot.view)
    }

    pub fn slots(&self) -> impl Iterator<Item = &ViewSlot<V>> {
        self.slots.iter()
    }

    pub fn is_syncing(&self) -> bool {
        self.lock.is_held()
    }

    /// Dispatches one event from the event loop.
    pub fn handle(&mut self, event: ViewEvent) -> SyncOutcome {
        match event {
            ViewEvent::RangeChanged(id) => self.on_range_changed(id),
            ViewEvent::RangeSettled(id, result) => self.on_range_settled(id, result),
            ViewEvent::OverlaySettled(id, result) => self.on_overlay_settled(id, result),
        }
    }

    /// Propagates the range of `source` to every other view.
    pub fn on_range_changed(&mut self, source: ViewId) -> SyncOutcome {
        let Some(slot) = self.slots.get(source.0) else {
            warn!("range change from unknown {}", source);
            return SyncOutcome::Ignored;
        };
        if slot.overlay.is_busy() {
            debug!("{} changed while its labels update, ignoring", source);
            return SyncOutcome::OverlayEcho(source);
        }

        // Read once; every target gets this exact value.
        let range = slot.view.range();
        if let Err(holder) = self.lock.try_acquire(source, range) {
            debug!("sync from {} in progress, dropping change from {}", holder, source);
            return SyncOutcome::Dropped {
                source,
                busy_with: holder,
            };
        }

        let mut pending = BTreeSet::new();
        let mut failed = Vec::new();
        for slot in self.slots.iter_mut().filter(|slot| slot.id != source) {
            match slot.view.set_range(range) {
                Ok(Completion::Settled) => {}
                Ok(Completion::Pending) => {
                    pending.insert(slot.id);
                }
                Err(e) => {
                    warn!("{} did not follow {}: {}", slot.id, source, e);
                    failed.push(slot.id);
                }
            }
        }

        if pending.is_empty() {
            if let SyncLock::Syncing { failed: f, .. } = &mut self.lock {
                *f = failed;
            }
            return self.settle();
        }

        let count = pending.len();
        if let SyncLock::Syncing {
            pending: p,
            failed: f,
            ..
        } = &mut self.lock
        {
            *p = pending;
            *f = failed.clone();
        }
        SyncOutcome::Propagating {
            source,
            range,
            pending: count,
            failed,
        }
    }

    fn on_range_settled(&mut self, id: ViewId, result: Result<(), ViewError>) -> SyncOutcome {
        let SyncLock::Syncing {
            source,
            pending,
            failed,
            ..
        } = &mut self.lock
        else {
            return SyncOutcome::Ignored;
        };
        if !pending.remove(&id) {
            return SyncOutcome::Ignored;
        }
        if let Err(e) = result {
            warn!("{} did not follow {}: {}", id, source, e);
            failed.push(id);
        }
        if pending.is_empty() {
            self.settle()
        } else {
            SyncOutcome::Ignored
        }
    }

    fn on_overlay_settled(&mut self, id: ViewId, result: Result<(), ViewError>) -> SyncOutcome {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.overlay.release();
            if let Err(e) = result {
                warn!("labels on {} failed: {}", id, e);
            }
        }
        SyncOutcome::Ignored
    }

    /// Releases the lock and refreshes labels on every view.
    fn settle(&mut self) -> SyncOutcome {
        let Some((source, failed)) = self.lock.release() else {
            return SyncOutcome::Ignored;
        };
        let annotations = self.refresh_annotations();
        SyncOutcome::Settled {
            source,
            failed,
            annotations,
        }
    }

    /// Recomputes base labels for every view.
    pub fn refresh_annotations(&mut self) -> Vec<(ViewId, AnnotationOutcome)> {
        let reference = &self.reference;
        let window = self.label_window;
        self.slots
            .iter_mut()
            .map(|slot| {
                let outcome = render_annotations(&mut slot.view, &mut slot.overlay, reference, window);
                if let AnnotationOutcome::Failed(e) = &outcome {
                    warn!("labels on {} failed: {}", slot.id, e);
                }
                (slot.id, outcome)
            })
            .collect()
    }

    /// Clears the sync lock and all overlay guards, e.g. when new data
    /// replaces the session's content.
    pub fn reset(&mut self) {
        self.lock = SyncLock::Idle;
        for slot in &mut self.slots {
            slot.overlay.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct MockView {
        range: ViewRange,
        set_range_calls: Vec<ViewRange>,
        overlays: Vec<Vec<BaseLabel>>,
        defer: bool,
        fail: bool,
    }

    impl MockView {
        fn new(start: f64, end: f64) -> Self {
            Self {
                range: ViewRange::new(start, end),
                set_range_calls: Vec::new(),
                overlays: Vec::new(),
                defer: false,
                fail: false,
            }
        }

        fn deferred(mut self) -> Self {
            self.defer = true;
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn completion(&self) -> Completion {
            if self.defer {
                Completion::Pending
            } else {
                Completion::Settled
            }
        }
    }

    impl ChartView for MockView {
        fn range(&self) -> ViewRange {
            self.range
        }

        fn set_range(&mut self, range: ViewRange) -> Result<Completion, ViewError> {
            self.set_range_calls.push(range);
            if self.fail {
                return Err(ViewError::Render("mock failure".into()));
            }
            self.range = range;
            Ok(self.completion())
        }

        fn set_overlay(&mut self, labels: Vec<BaseLabel>) -> Result<Completion, ViewError> {
            self.overlays.push(labels);
            Ok(Completion::Settled)
        }
    }

    fn session(views: Vec<MockView>) -> (LinkedViews<MockView>, Vec<ViewId>) {
        let mut linked = LinkedViews::new("ACGT".repeat(100), 200);
        let ids = views.into_iter().map(|v| linked.register(v)).collect();
        (linked, ids)
    }

    fn calls(linked: &LinkedViews<MockView>, id: ViewId) -> usize {
        linked.view(id).unwrap().set_range_calls.len()
    }

    #[test]
    fn test_one_set_range_per_other_view() {
        let (mut linked, ids) = session(vec![
            MockView::new(10.0, 20.0),
            MockView::new(0.0, 400.0),
            MockView::new(0.0, 400.0),
        ]);

        let outcome = linked.on_range_changed(ids[0]);
        assert!(matches!(outcome, SyncOutcome::Settled { source, .. } if source == ids[0]));
        assert_eq!(calls(&linked, ids[0]), 0);
        assert_eq!(calls(&linked, ids[1]), 1);
        assert_eq!(calls(&linked, ids[2]), 1);
        assert_eq!(linked.view(ids[2]).unwrap().range(), ViewRange::new(10.0, 20.0));
        assert!(!linked.is_syncing());
    }

    #[test]
    fn test_changes_dropped_until_settled() {
        let (mut linked, ids) = session(vec![
            MockView::new(10.0, 20.0),
            MockView::new(0.0, 400.0).deferred(),
            MockView::new(0.0, 400.0).deferred(),
        ]);

        let outcome = linked.on_range_changed(ids[0]);
        assert!(matches!(outcome, SyncOutcome::Propagating { pending: 2, .. }));
        assert!(linked.is_syncing());

        // Echoes from the propagated updates, and a new user change, are dropped
        for &id in &ids {
            assert_eq!(
                linked.handle(ViewEvent::RangeChanged(id)),
                SyncOutcome::Dropped {
                    source: id,
                    busy_with: ids[0]
                }
            );
        }
        assert_eq!(calls(&linked, ids[1]), 1);
        assert_eq!(calls(&linked, ids[2]), 1);

        assert_eq!(linked.handle(ViewEvent::RangeSettled(ids[1], Ok(()))), SyncOutcome::Ignored);
        assert!(linked.is_syncing());
        let outcome = linked.handle(ViewEvent::RangeSettled(ids[2], Ok(())));
        assert!(matches!(outcome, SyncOutcome::Settled { .. }));
        assert!(!linked.is_syncing());

        // The next change propagates again
        linked.on_range_changed(ids[1]);
        assert_eq!(calls(&linked, ids[0]), 1);
        assert_eq!(calls(&linked, ids[2]), 2);
    }

    #[test]
    fn test_failure_is_isolated() {
        let (mut linked, ids) = session(vec![
            MockView::new(5.0, 50.0),
            MockView::new(0.0, 400.0).failing(),
            MockView::new(0.0, 400.0),
        ]);

        let outcome = linked.on_range_changed(ids[0]);
        match outcome {
            SyncOutcome::Settled { failed, .. } => assert_eq!(failed, vec![ids[1]]),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(linked.view(ids[2]).unwrap().range(), ViewRange::new(5.0, 50.0));
        assert_eq!(linked.view(ids[1]).unwrap().range(), ViewRange::new(0.0, 400.0));
        assert!(!linked.is_syncing());
    }

    #[test]
    fn test_failed_completion_still_releases() {
        let (mut linked, ids) = session(vec![MockView::new(5.0, 50.0), MockView::new(0.0, 400.0).deferred()]);
        linked.on_range_changed(ids[0]);
        let outcome = linked.handle(ViewEvent::RangeSettled(ids[1], Err(ViewError::Render("lost".into()))));
        match outcome {
            SyncOutcome::Settled { failed, .. } => assert_eq!(failed, vec![ids[1]]),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!linked.is_syncing());
    }

    #[test]
    fn test_every_target_gets_the_same_range() {
        let (mut linked, ids) = session(vec![
            MockView::new(0.0, 400.0),
            MockView::new(33.0, 66.0),
            MockView::new(0.0, 400.0),
            MockView::new(0.0, 400.0),
        ]);
        linked.on_range_changed(ids[1]);
        for &id in &[ids[0], ids[2], ids[3]] {
            assert_eq!(linked.view(id).unwrap().set_range_calls, vec![ViewRange::new(33.0, 66.0)]);
        }
    }

    #[test]
    fn test_settle_refreshes_labels() {
        let (mut linked, ids) = session(vec![MockView::new(10.0, 19.0), MockView::new(0.0, 400.0)]);
        let outcome = linked.on_range_changed(ids[0]);
        let SyncOutcome::Settled { annotations, .. } = outcome else {
            panic!("sync did not settle");
        };
        assert_eq!(annotations.len(), 2);
        assert!(annotations.iter().all(|(_, a)| a.label_count() == 10));
        assert_eq!(linked.view(ids[1]).unwrap().overlays[0][0].x, 10);

        // Zooming back out clears the labels
        linked.view_mut(ids[1]).unwrap().range = ViewRange::new(0.0, 399.0);
        let SyncOutcome::Settled { annotations, .. } = linked.on_range_changed(ids[1]) else {
            panic!("sync did not settle");
        };
        assert!(annotations.iter().all(|(_, a)| *a == AnnotationOutcome::Cleared));
    }

    #[test]
    fn test_unknown_and_stale_events_ignored() {
        let (mut linked, ids) = session(vec![MockView::new(0.0, 10.0), MockView::new(0.0, 10.0)]);
        assert_eq!(linked.on_range_changed(ViewId(9)), SyncOutcome::Ignored);
        assert_eq!(linked.handle(ViewEvent::RangeSettled(ids[1], Ok(()))), SyncOutcome::Ignored);
        assert!(!linked.is_syncing());
    }

    #[test]
    fn test_reset_unwedges_session() {
        let (mut linked, ids) = session(vec![MockView::new(0.0, 10.0), MockView::new(0.0, 10.0).deferred()]);
        linked.on_range_changed(ids[0]);
        assert!(linked.is_syncing());
        linked.reset();
        assert!(!linked.is_syncing());
        assert!(matches!(linked.on_range_changed(ids[0]), SyncOutcome::Propagating { .. }));
    }

    #[test]
    fn test_lock_is_acquire_or_skip() {
        let mut lock = SyncLock::default();
        let range = ViewRange::new(0.0, 1.0);
        assert_eq!(lock.try_acquire(ViewId(0), range), Ok(()));
        assert_eq!(lock.try_acquire(ViewId(1), range), Err(ViewId(0)));
        assert!(lock.is_held());
        assert_eq!(lock.release(), Some((ViewId(0), Vec::new())));
        assert!(!lock.is_held());
    }
}
