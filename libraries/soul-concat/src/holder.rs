//! Per-entry bookkeeping owned by the engine

use crate::deferred::DeferredTimeline;
use crate::source::{MediaSource, RefreshListener};
use crate::timeline::Timeline;
use crate::types::{HolderUid, PeriodHandle, PeriodUid};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// One playlist entry as seen by the engine
///
/// Offsets locate the entry inside the concatenated timeline: its windows
/// start at `first_window_index` and its periods at `first_period_index`.
pub struct Holder {
    source: Arc<dyn MediaSource>,
    uid: HolderUid,

    pub(crate) timeline: DeferredTimeline,
    pub(crate) child_index: usize,
    pub(crate) first_window_index: usize,
    pub(crate) first_period_index: usize,

    pub(crate) has_started_preparing: bool,
    pub(crate) is_prepared: bool,
    pub(crate) is_removed: bool,

    /// Periods handed out for this entry and not released yet
    pub(crate) active_periods: BTreeSet<PeriodHandle>,

    /// Registration made with the child when preparation started
    pub(crate) listener: Option<RefreshListener>,
}

impl Holder {
    /// New entry with a fresh uid
    pub(crate) fn new(source: Arc<dyn MediaSource>) -> Self {
        Self {
            source,
            uid: HolderUid::new(),
            timeline: DeferredTimeline::new(),
            child_index: 0,
            first_window_index: 0,
            first_period_index: 0,
            has_started_preparing: false,
            is_prepared: false,
            is_removed: false,
            active_periods: BTreeSet::new(),
            listener: None,
        }
    }

    /// Place the entry at `child_index` with the given offsets and clear its
    /// lifecycle state
    pub(crate) fn reset(
        &mut self,
        child_index: usize,
        first_window_index: usize,
        first_period_index: usize,
    ) {
        self.child_index = child_index;
        self.first_window_index = first_window_index;
        self.first_period_index = first_period_index;
        self.has_started_preparing = false;
        self.is_prepared = false;
        self.is_removed = false;
        self.active_periods.clear();
    }

    /// Apply offset deltas
    pub(crate) fn shift(&mut self, child_delta: isize, window_delta: isize, period_delta: isize) {
        self.child_index = self.child_index.saturating_add_signed(child_delta);
        self.first_window_index = self.first_window_index.saturating_add_signed(window_delta);
        self.first_period_index = self.first_period_index.saturating_add_signed(period_delta);
    }

    /// Removed and no period keeps the child alive
    pub(crate) fn can_release(&self) -> bool {
        self.is_removed && self.active_periods.is_empty()
    }

    /// Global uid for a period uid reported by the child
    pub(crate) fn period_uid(&self, child_uid: PeriodUid) -> PeriodUid {
        PeriodUid::composite(self.uid, self.timeline.exposed_period_uid(child_uid))
    }

    /// Child-side uid for a global period uid of this entry
    pub(crate) fn child_period_uid(&self, period_uid: &PeriodUid) -> Option<PeriodUid> {
        if period_uid.holder_uid() != Some(self.uid) {
            return None;
        }
        period_uid
            .child_uid()
            .map(|child| self.timeline.child_period_uid(child))
    }

    pub fn uid(&self) -> HolderUid {
        self.uid
    }

    pub fn source(&self) -> &Arc<dyn MediaSource> {
        &self.source
    }

    pub fn timeline(&self) -> &DeferredTimeline {
        &self.timeline
    }

    pub fn child_index(&self) -> usize {
        self.child_index
    }

    pub fn first_window_index(&self) -> usize {
        self.first_window_index
    }

    pub fn first_period_index(&self) -> usize {
        self.first_period_index
    }

    /// Windows this entry contributes
    pub fn window_count(&self) -> usize {
        self.timeline.window_count()
    }

    /// Periods this entry contributes
    pub fn period_count(&self) -> usize {
        self.timeline.period_count()
    }

    pub fn has_started_preparing(&self) -> bool {
        self.has_started_preparing
    }

    pub fn is_prepared(&self) -> bool {
        self.is_prepared
    }

    pub fn is_removed(&self) -> bool {
        self.is_removed
    }

    pub fn active_period_count(&self) -> usize {
        self.active_periods.len()
    }
}

impl fmt::Debug for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder")
            .field("uid", &self.uid)
            .field("child_index", &self.child_index)
            .field("first_window_index", &self.first_window_index)
            .field("first_period_index", &self.first_period_index)
            .field("windows", &self.window_count())
            .field("periods", &self.period_count())
            .field("is_prepared", &self.is_prepared)
            .field("is_removed", &self.is_removed)
            .field("active_periods", &self.active_periods.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::FakeSource;
    use crate::timeline::StaticTimeline;

    #[test]
    fn new_holder_is_unprepared_placeholder() {
        let holder = Holder::new(FakeSource::new());

        assert_eq!(holder.window_count(), 1);
        assert_eq!(holder.period_count(), 1);
        assert!(!holder.has_started_preparing());
        assert!(!holder.is_prepared());
        assert!(!holder.is_removed());
    }

    #[test]
    fn shared_source_gets_distinct_uids() {
        let source: Arc<dyn MediaSource> = FakeSource::new();
        let a = Holder::new(Arc::clone(&source));
        let b = Holder::new(source);
        assert_ne!(a.uid(), b.uid());
    }

    #[test]
    fn reset_places_and_clears_state() {
        let mut holder = Holder::new(FakeSource::new());
        holder.is_removed = true;
        holder.active_periods.insert(PeriodHandle(1));

        holder.reset(3, 7, 9);

        assert_eq!(holder.child_index(), 3);
        assert_eq!(holder.first_window_index(), 7);
        assert_eq!(holder.first_period_index(), 9);
        assert!(!holder.is_removed());
        assert_eq!(holder.active_period_count(), 0);
    }

    #[test]
    fn shift_applies_signed_deltas() {
        let mut holder = Holder::new(FakeSource::new());
        holder.reset(2, 5, 8);

        holder.shift(-1, -2, 3);

        assert_eq!(holder.child_index(), 1);
        assert_eq!(holder.first_window_index(), 3);
        assert_eq!(holder.first_period_index(), 11);
    }

    #[test]
    fn release_waits_for_active_periods() {
        let mut holder = Holder::new(FakeSource::new());
        holder.is_removed = true;
        holder.active_periods.insert(PeriodHandle(4));
        assert!(!holder.can_release());

        holder.active_periods.clear();
        assert!(holder.can_release());
    }

    #[test]
    fn placeholder_uid_maps_to_first_child_period_after_prepare() {
        let mut holder = Holder::new(FakeSource::new());
        let placeholder = holder.period_uid(PeriodUid::Placeholder);

        holder.timeline = holder
            .timeline
            .with_timeline(Arc::new(StaticTimeline::new(40, &[2])));

        assert_eq!(
            holder.child_period_uid(&placeholder),
            Some(PeriodUid::Local(40))
        );
        assert_eq!(holder.period_uid(PeriodUid::Local(40)), placeholder);
        assert_eq!(
            holder.child_period_uid(&PeriodUid::composite(HolderUid::new(), PeriodUid::Local(40))),
            None
        );
    }
}
