//! Deferred timelines
//!
//! Before a child reports its timeline, its playlist entry still needs a
//! window and a period so the playback driver can address it. The deferred
//! timeline provides one synthetic window with one `Placeholder` period.
//!
//! Once the real timeline arrives, the child's first period uid is remapped to
//! `Placeholder`. Periods the driver created against the placeholder keep
//! addressing the same logical period after preparation.

use crate::timeline::Timeline;
use crate::types::{Period, PeriodUid, RepeatMode, Window};
use std::sync::Arc;
use std::time::Duration;

/// Placeholder or real timeline of one playlist entry
#[derive(Debug, Clone, Default)]
pub enum DeferredTimeline {
    /// No timeline reported yet: one dynamic window, one placeholder period
    #[default]
    Unprepared,

    /// Wraps the child timeline
    Prepared {
        timeline: Arc<dyn Timeline>,

        /// Child uid exposed as `Placeholder` (None if the child had no
        /// periods when it was first wrapped)
        replaced_id: Option<PeriodUid>,
    },
}

impl DeferredTimeline {
    pub fn new() -> Self {
        Self::Unprepared
    }

    /// Wrap a newly reported timeline, keeping an established remap
    pub fn with_timeline(&self, timeline: Arc<dyn Timeline>) -> Self {
        let replaced_id = match self {
            Self::Prepared {
                replaced_id: Some(id),
                ..
            } => Some(id.clone()),
            _ => timeline.uid_of_period(0),
        };
        Self::Prepared {
            timeline,
            replaced_id,
        }
    }

    /// Whether `timeline` is the one already wrapped
    pub fn wraps(&self, timeline: &Arc<dyn Timeline>) -> bool {
        match self {
            Self::Prepared { timeline: inner, .. } => {
                Arc::as_ptr(inner).cast::<()>() == Arc::as_ptr(timeline).cast::<()>()
            }
            Self::Unprepared => false,
        }
    }

    pub fn is_prepared(&self) -> bool {
        matches!(self, Self::Prepared { .. })
    }

    fn replaced_id(&self) -> Option<&PeriodUid> {
        match self {
            Self::Prepared { replaced_id, .. } => replaced_id.as_ref(),
            Self::Unprepared => None,
        }
    }

    /// Uid the child knows for a uid exposed by this timeline
    pub fn child_period_uid(&self, uid: &PeriodUid) -> PeriodUid {
        match (uid, self.replaced_id()) {
            (PeriodUid::Placeholder, Some(replaced)) => replaced.clone(),
            _ => uid.clone(),
        }
    }

    /// Uid this timeline exposes for a uid reported by the child
    pub fn exposed_period_uid(&self, child_uid: PeriodUid) -> PeriodUid {
        if self.replaced_id() == Some(&child_uid) {
            PeriodUid::Placeholder
        } else {
            child_uid
        }
    }
}

impl Timeline for DeferredTimeline {
    fn window_count(&self) -> usize {
        match self {
            Self::Unprepared => 1,
            Self::Prepared { timeline, .. } => timeline.window_count(),
        }
    }

    fn period_count(&self) -> usize {
        match self {
            Self::Unprepared => 1,
            Self::Prepared { timeline, .. } => timeline.period_count(),
        }
    }

    fn window(&self, index: usize) -> Option<Window> {
        match self {
            Self::Unprepared => (index == 0).then(Window::placeholder),
            Self::Prepared { timeline, .. } => timeline.window(index),
        }
    }

    fn period(&self, index: usize) -> Option<Period> {
        match self {
            Self::Unprepared => (index == 0).then(|| Period {
                uid: PeriodUid::Placeholder,
                window_index: 0,
                duration: None,
                position_in_window: Duration::ZERO,
            }),
            Self::Prepared { timeline, .. } => {
                let mut period = timeline.period(index)?;
                period.uid = self.exposed_period_uid(period.uid);
                Some(period)
            }
        }
    }

    fn index_of_period(&self, uid: &PeriodUid) -> Option<usize> {
        match self {
            Self::Unprepared => (uid == &PeriodUid::Placeholder).then_some(0),
            Self::Prepared { timeline, .. } => {
                timeline.index_of_period(&self.child_period_uid(uid))
            }
        }
    }

    fn first_window_index(&self, shuffle: bool) -> Option<usize> {
        match self {
            Self::Unprepared => Some(0),
            Self::Prepared { timeline, .. } => timeline.first_window_index(shuffle),
        }
    }

    fn last_window_index(&self, shuffle: bool) -> Option<usize> {
        match self {
            Self::Unprepared => Some(0),
            Self::Prepared { timeline, .. } => timeline.last_window_index(shuffle),
        }
    }

    fn next_window_index(&self, window: usize, repeat: RepeatMode, shuffle: bool) -> Option<usize> {
        match self {
            Self::Unprepared => (repeat != RepeatMode::Off).then_some(window),
            Self::Prepared { timeline, .. } => timeline.next_window_index(window, repeat, shuffle),
        }
    }

    fn previous_window_index(
        &self,
        window: usize,
        repeat: RepeatMode,
        shuffle: bool,
    ) -> Option<usize> {
        match self {
            Self::Unprepared => (repeat != RepeatMode::Off).then_some(window),
            Self::Prepared { timeline, .. } => {
                timeline.previous_window_index(window, repeat, shuffle)
            }
        }
    }
}
