//! Timeline abstraction
//!
//! A timeline is an indexed sequence of windows, each made of one or more
//! periods. Child sources publish timelines, the engine wraps them in deferred
//! timelines and aggregates those into one concatenated timeline.

use crate::types::{Period, PeriodUid, RepeatMode, Window};
use std::fmt;
use std::time::Duration;

/// Read-only timeline
///
/// Traversal methods have sequential defaults: windows are visited in index
/// order and the shuffle flag is ignored. Timelines composed of several
/// children override them.
pub trait Timeline: Send + Sync + fmt::Debug {
    /// Number of windows
    fn window_count(&self) -> usize;

    /// Number of periods
    fn period_count(&self) -> usize;

    /// Window at `index`
    fn window(&self, index: usize) -> Option<Window>;

    /// Period at `index`
    fn period(&self, index: usize) -> Option<Period>;

    /// Index of the period with the given uid
    fn index_of_period(&self, uid: &PeriodUid) -> Option<usize>;

    /// Uid of the period at `index`
    fn uid_of_period(&self, index: usize) -> Option<PeriodUid> {
        self.period(index).map(|period| period.uid)
    }

    /// Whether the timeline has no windows
    fn is_empty(&self) -> bool {
        self.window_count() == 0
    }

    /// First window in playback order
    fn first_window_index(&self, _shuffle: bool) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    /// Last window in playback order
    fn last_window_index(&self, _shuffle: bool) -> Option<usize> {
        self.window_count().checked_sub(1)
    }

    /// Window played after `window`, or None at the end
    fn next_window_index(&self, window: usize, repeat: RepeatMode, shuffle: bool) -> Option<usize> {
        match repeat {
            RepeatMode::One => Some(window),
            RepeatMode::Off => {
                if Some(window) == self.last_window_index(shuffle) {
                    None
                } else {
                    Some(window + 1)
                }
            }
            RepeatMode::All => {
                if Some(window) == self.last_window_index(shuffle) {
                    self.first_window_index(shuffle)
                } else {
                    Some(window + 1)
                }
            }
        }
    }

    /// Window played before `window`, or None at the start
    fn previous_window_index(
        &self,
        window: usize,
        repeat: RepeatMode,
        shuffle: bool,
    ) -> Option<usize> {
        match repeat {
            RepeatMode::One => Some(window),
            RepeatMode::Off => {
                if Some(window) == self.first_window_index(shuffle) {
                    None
                } else {
                    window.checked_sub(1)
                }
            }
            RepeatMode::All => {
                if Some(window) == self.first_window_index(shuffle) {
                    self.last_window_index(shuffle)
                } else {
                    window.checked_sub(1)
                }
            }
        }
    }
}

/// In-memory timeline with a fixed window/period layout
///
/// Period uids are `Local(first_uid)`, `Local(first_uid + 1)`, ... in period
/// order, which keeps timelines built with distinct `first_uid` values apart.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticTimeline {
    windows: Vec<Window>,
    periods: Vec<Period>,
}

impl StaticTimeline {
    /// Build a timeline where window `i` has `periods_per_window[i]` periods
    ///
    /// A count of zero is treated as one; windows always own a period.
    pub fn new(first_uid: u64, periods_per_window: &[usize]) -> Self {
        let mut windows = Vec::with_capacity(periods_per_window.len());
        let mut periods = Vec::new();

        for (window_index, &count) in periods_per_window.iter().enumerate() {
            let first_period_index = periods.len();
            for _ in 0..count.max(1) {
                periods.push(Period {
                    uid: PeriodUid::Local(first_uid + periods.len() as u64),
                    window_index,
                    duration: None,
                    position_in_window: Duration::ZERO,
                });
            }
            windows.push(Window {
                is_seekable: true,
                is_dynamic: false,
                default_position: Duration::ZERO,
                duration: None,
                first_period_index,
                last_period_index: periods.len() - 1,
                position_in_first_period: Duration::ZERO,
            });
        }

        Self { windows, periods }
    }

    /// Timeline without windows
    pub fn empty() -> Self {
        Self {
            windows: Vec::new(),
            periods: Vec::new(),
        }
    }

    /// Set the default start position of every window
    pub fn with_default_position(mut self, position: Duration) -> Self {
        for window in &mut self.windows {
            window.default_position = position;
        }
        self
    }
}

impl Timeline for StaticTimeline {
    fn window_count(&self) -> usize {
        self.windows.len()
    }

    fn period_count(&self) -> usize {
        self.periods.len()
    }

    fn window(&self, index: usize) -> Option<Window> {
        self.windows.get(index).cloned()
    }

    fn period(&self, index: usize) -> Option<Period> {
        self.periods.get(index).cloned()
    }

    fn index_of_period(&self, uid: &PeriodUid) -> Option<usize> {
        self.periods.iter().position(|period| &period.uid == uid)
    }
}
