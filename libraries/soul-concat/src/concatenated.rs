//! Concatenated timeline snapshots
//!
//! Built by the engine each time it publishes, never modified afterwards.
//! Global window/period indices are resolved to the owning entry by binary
//! search over the entries' first-index offsets.

use crate::deferred::DeferredTimeline;
use crate::holder::Holder;
use crate::shuffle::ShuffleOrder;
use crate::timeline::Timeline;
use crate::types::{HolderUid, Period, PeriodUid, RepeatMode, Window};
use std::collections::HashMap;

/// Immutable view of the whole playlist as one timeline
#[derive(Debug, Clone)]
pub struct ConcatenatedTimeline {
    window_count: usize,
    period_count: usize,
    first_window_indices: Vec<usize>,
    first_period_indices: Vec<usize>,
    timelines: Vec<DeferredTimeline>,
    uids: Vec<HolderUid>,
    index_by_uid: HashMap<HolderUid, usize>,
    shuffle_order: ShuffleOrder,
    is_atomic: bool,
}

impl ConcatenatedTimeline {
    /// Snapshot `holders` (in playlist order) with the engine's totals
    pub(crate) fn new<'a>(
        holders: impl IntoIterator<Item = &'a Holder>,
        window_count: usize,
        period_count: usize,
        shuffle_order: ShuffleOrder,
        is_atomic: bool,
    ) -> Self {
        let mut timeline = Self {
            window_count,
            period_count,
            first_window_indices: Vec::new(),
            first_period_indices: Vec::new(),
            timelines: Vec::new(),
            uids: Vec::new(),
            index_by_uid: HashMap::new(),
            shuffle_order,
            is_atomic,
        };
        for (index, holder) in holders.into_iter().enumerate() {
            timeline.first_window_indices.push(holder.first_window_index());
            timeline.first_period_indices.push(holder.first_period_index());
            timeline.timelines.push(holder.timeline().clone());
            timeline.uids.push(holder.uid());
            timeline.index_by_uid.insert(holder.uid(), index);
        }
        timeline
    }

    /// Snapshot of an empty playlist
    pub fn empty(shuffle_order: ShuffleOrder, is_atomic: bool) -> Self {
        Self::new(std::iter::empty(), 0, 0, shuffle_order, is_atomic)
    }

    /// Number of playlist entries
    pub fn child_count(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_atomic(&self) -> bool {
        self.is_atomic
    }

    pub fn shuffle_order(&self) -> &ShuffleOrder {
        &self.shuffle_order
    }

    /// Entry owning the global period `period_index`
    ///
    /// The last entry whose first period is at or before the index; entries
    /// without periods are skipped this way.
    pub fn child_index_by_period_index(&self, period_index: usize) -> Option<usize> {
        if period_index >= self.period_count {
            return None;
        }
        floor_index(&self.first_period_indices, period_index)
    }

    /// Entry owning the global window `window_index`
    pub fn child_index_by_window_index(&self, window_index: usize) -> Option<usize> {
        if window_index >= self.window_count {
            return None;
        }
        floor_index(&self.first_window_indices, window_index)
    }

    /// Playlist position of the entry with `uid`
    pub fn child_index_by_uid(&self, uid: HolderUid) -> Option<usize> {
        self.index_by_uid.get(&uid).copied()
    }

    /// Uid of the entry at `child_index`
    pub fn child_uid(&self, child_index: usize) -> Option<HolderUid> {
        self.uids.get(child_index).copied()
    }

    /// Timeline of the entry at `child_index`
    pub fn child_timeline(&self, child_index: usize) -> Option<&DeferredTimeline> {
        self.timelines.get(child_index)
    }

    pub fn first_window_index_of_child(&self, child_index: usize) -> Option<usize> {
        self.first_window_indices.get(child_index).copied()
    }

    pub fn first_period_index_of_child(&self, child_index: usize) -> Option<usize> {
        self.first_period_indices.get(child_index).copied()
    }

    /// Encode a global period uid
    pub fn concatenated_uid(holder: HolderUid, child_period_uid: PeriodUid) -> PeriodUid {
        PeriodUid::composite(holder, child_period_uid)
    }

    /// Entry part of a global period uid
    pub fn holder_uid_of(period_uid: &PeriodUid) -> Option<HolderUid> {
        period_uid.holder_uid()
    }

    /// Child part of a global period uid
    pub fn child_period_uid_of(period_uid: &PeriodUid) -> Option<&PeriodUid> {
        period_uid.child_uid()
    }

    fn next_child_index(&self, child_index: usize, shuffle: bool) -> Option<usize> {
        if shuffle {
            self.shuffle_order.next_index(child_index)
        } else if child_index + 1 < self.child_count() {
            Some(child_index + 1)
        } else {
            None
        }
    }

    fn previous_child_index(&self, child_index: usize, shuffle: bool) -> Option<usize> {
        if shuffle {
            self.shuffle_order.previous_index(child_index)
        } else {
            child_index.checked_sub(1)
        }
    }

    /// Skip forward over entries without windows
    fn first_non_empty_from(&self, mut child: Option<usize>, shuffle: bool) -> Option<usize> {
        while let Some(index) = child {
            if !self.timelines[index].is_empty() {
                return Some(index);
            }
            child = self.next_child_index(index, shuffle);
        }
        None
    }

    /// Skip backwards over entries without windows
    fn last_non_empty_from(&self, mut child: Option<usize>, shuffle: bool) -> Option<usize> {
        while let Some(index) = child {
            if !self.timelines[index].is_empty() {
                return Some(index);
            }
            child = self.previous_child_index(index, shuffle);
        }
        None
    }
}

/// Last position whose offset is at or before `index`
fn floor_index(offsets: &[usize], index: usize) -> Option<usize> {
    offsets
        .partition_point(|&offset| offset <= index)
        .checked_sub(1)
}

impl Timeline for ConcatenatedTimeline {
    fn window_count(&self) -> usize {
        self.window_count
    }

    fn period_count(&self) -> usize {
        self.period_count
    }

    fn window(&self, index: usize) -> Option<Window> {
        let child = self.child_index_by_window_index(index)?;
        let first_window = self.first_window_indices[child];
        let first_period = self.first_period_indices[child];
        let mut window = self.timelines[child].window(index - first_window)?;
        window.first_period_index += first_period;
        window.last_period_index += first_period;
        Some(window)
    }

    fn period(&self, index: usize) -> Option<Period> {
        let child = self.child_index_by_period_index(index)?;
        let first_window = self.first_window_indices[child];
        let first_period = self.first_period_indices[child];
        let mut period = self.timelines[child].period(index - first_period)?;
        period.window_index += first_window;
        period.uid = Self::concatenated_uid(self.uids[child], period.uid);
        Some(period)
    }

    fn index_of_period(&self, uid: &PeriodUid) -> Option<usize> {
        let child = self.child_index_by_uid(Self::holder_uid_of(uid)?)?;
        let child_uid = Self::child_period_uid_of(uid)?;
        let index_in_child = self.timelines[child].index_of_period(child_uid)?;
        Some(self.first_period_indices[child] + index_in_child)
    }

    fn first_window_index(&self, shuffle: bool) -> Option<usize> {
        if self.child_count() == 0 {
            return None;
        }
        let shuffle = shuffle && !self.is_atomic;
        let start = if shuffle {
            self.shuffle_order.first_index()
        } else {
            Some(0)
        };
        let child = self.first_non_empty_from(start, shuffle)?;
        let inner = self.timelines[child].first_window_index(shuffle)?;
        Some(self.first_window_indices[child] + inner)
    }

    fn last_window_index(&self, shuffle: bool) -> Option<usize> {
        if self.child_count() == 0 {
            return None;
        }
        let shuffle = shuffle && !self.is_atomic;
        let start = if shuffle {
            self.shuffle_order.last_index()
        } else {
            Some(self.child_count() - 1)
        };
        let child = self.last_non_empty_from(start, shuffle)?;
        let inner = self.timelines[child].last_window_index(shuffle)?;
        Some(self.first_window_indices[child] + inner)
    }

    fn next_window_index(&self, window: usize, repeat: RepeatMode, shuffle: bool) -> Option<usize> {
        let (repeat, shuffle) = if self.is_atomic {
            let repeat = if repeat == RepeatMode::One {
                RepeatMode::All
            } else {
                repeat
            };
            (repeat, false)
        } else {
            (repeat, shuffle)
        };

        let child = self.child_index_by_window_index(window)?;
        let first_window = self.first_window_indices[child];
        let child_repeat = if repeat == RepeatMode::All {
            RepeatMode::Off
        } else {
            repeat
        };
        if let Some(next) =
            self.timelines[child].next_window_index(window - first_window, child_repeat, shuffle)
        {
            return Some(first_window + next);
        }

        let next_child =
            self.first_non_empty_from(self.next_child_index(child, shuffle), shuffle);
        if let Some(next_child) = next_child {
            let inner = self.timelines[next_child].first_window_index(shuffle)?;
            return Some(self.first_window_indices[next_child] + inner);
        }
        if repeat == RepeatMode::All {
            return self.first_window_index(shuffle);
        }
        None
    }

    fn previous_window_index(
        &self,
        window: usize,
        repeat: RepeatMode,
        shuffle: bool,
    ) -> Option<usize> {
        let (repeat, shuffle) = if self.is_atomic {
            let repeat = if repeat == RepeatMode::One {
                RepeatMode::All
            } else {
                repeat
            };
            (repeat, false)
        } else {
            (repeat, shuffle)
        };

        let child = self.child_index_by_window_index(window)?;
        let first_window = self.first_window_indices[child];
        let child_repeat = if repeat == RepeatMode::All {
            RepeatMode::Off
        } else {
            repeat
        };
        if let Some(previous) = self.timelines[child].previous_window_index(
            window - first_window,
            child_repeat,
            shuffle,
        ) {
            return Some(first_window + previous);
        }

        let previous_child =
            self.last_non_empty_from(self.previous_child_index(child, shuffle), shuffle);
        if let Some(previous_child) = previous_child {
            let inner = self.timelines[previous_child].last_window_index(shuffle)?;
            return Some(self.first_window_indices[previous_child] + inner);
        }
        if repeat == RepeatMode::All {
            return self.last_window_index(shuffle);
        }
        None
    }
}
