//! Core types for playlist concatenation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Identity of one playlist entry inside the engine
///
/// Generated fresh for every entry, never reused. Two entries pointing at the
/// same source still get distinct uids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HolderUid(Uuid);

impl HolderUid {
    /// Generate a new unique uid
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HolderUid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HolderUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of a period within a timeline
///
/// Child timelines report `Local` ids. The deferred timeline of an unprepared
/// entry reports `Placeholder`. The concatenated timeline wraps whatever the
/// child reports into `Composite`, which nests when a concatenation is itself
/// used as a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeriodUid {
    /// Child-defined id
    Local(u64),

    /// Synthetic period of a timeline that is not prepared yet
    Placeholder,

    /// Global id: owning entry + id inside that entry's timeline
    Composite {
        holder: HolderUid,
        child: Box<PeriodUid>,
    },
}

impl PeriodUid {
    /// Build a composite id
    pub fn composite(holder: HolderUid, child: PeriodUid) -> Self {
        Self::Composite {
            holder,
            child: Box::new(child),
        }
    }

    /// Holder embedded in a composite id
    pub fn holder_uid(&self) -> Option<HolderUid> {
        match self {
            Self::Composite { holder, .. } => Some(*holder),
            _ => None,
        }
    }

    /// Child-local id embedded in a composite id
    pub fn child_uid(&self) -> Option<&PeriodUid> {
        match self {
            Self::Composite { child, .. } => Some(child),
            _ => None,
        }
    }
}

/// Identifies a period requested by the playback driver
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaPeriodId {
    /// Period uid in the timeline the id was resolved against
    pub period_uid: PeriodUid,

    /// Distinguishes repeated plays of the same window
    pub window_sequence_number: u64,
}

impl MediaPeriodId {
    pub fn new(period_uid: PeriodUid, window_sequence_number: u64) -> Self {
        Self {
            period_uid,
            window_sequence_number,
        }
    }

    /// Same id addressing a different period uid
    pub fn with_period_uid(&self, period_uid: PeriodUid) -> Self {
        Self {
            period_uid,
            window_sequence_number: self.window_sequence_number,
        }
    }
}

/// Opaque key for a period handed out by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodHandle(pub(crate) u64);

/// A seekable program unit inside a timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Whether seeking within the window is possible
    pub is_seekable: bool,

    /// Whether the window may still change (live, or not prepared yet)
    pub is_dynamic: bool,

    /// Default start position, relative to the window start
    pub default_position: Duration,

    /// Window duration (None if unknown)
    pub duration: Option<Duration>,

    /// Index of the first period belonging to the window
    pub first_period_index: usize,

    /// Index of the last period belonging to the window
    pub last_period_index: usize,

    /// Offset of the window start inside its first period
    pub position_in_first_period: Duration,
}

impl Window {
    /// Window reported for an entry whose source has not been prepared yet
    pub fn placeholder() -> Self {
        Self {
            is_seekable: false,
            is_dynamic: true,
            default_position: Duration::ZERO,
            duration: None,
            first_period_index: 0,
            last_period_index: 0,
            position_in_first_period: Duration::ZERO,
        }
    }

    /// Default start position relative to the first period
    pub fn default_position_in_first_period(&self) -> Duration {
        self.position_in_first_period + self.default_position
    }
}

/// The smallest timeline unit with a stable identity
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    /// Stable identity of the period
    pub uid: PeriodUid,

    /// Window the period belongs to
    pub window_index: usize,

    /// Period duration (None if unknown)
    pub duration: Option<Duration>,

    /// Offset of the period start relative to its window start
    pub position_in_window: Duration,
}

/// Repeat mode used for timeline traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatMode {
    /// Stop at the end of the timeline
    Off,

    /// Loop the whole timeline
    All,

    /// Loop the current window only
    One,
}

/// Configuration for the playlist engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcatConfig {
    /// Treat the whole playlist as one unit for outer repeat/shuffle
    /// (default: false)
    pub is_atomic: bool,

    /// Only prepare a child when its first period is requested
    /// (default: false)
    pub lazy_preparation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ConcatConfig::default();
        assert!(!config.is_atomic);
        assert!(!config.lazy_preparation);
    }

    #[test]
    fn holder_uids_are_unique() {
        let a = HolderUid::new();
        let b = HolderUid::new();
        assert_ne!(a, b);
    }

    #[test]
    fn composite_uid_round_trip() {
        let holder = HolderUid::new();
        let uid = PeriodUid::composite(holder, PeriodUid::Local(7));

        assert_eq!(uid.holder_uid(), Some(holder));
        assert_eq!(uid.child_uid(), Some(&PeriodUid::Local(7)));
        assert_eq!(PeriodUid::Local(7).holder_uid(), None);
    }

    #[test]
    fn placeholder_window_is_dynamic_with_unknown_duration() {
        let window = Window::placeholder();
        assert!(window.is_dynamic);
        assert!(!window.is_seekable);
        assert_eq!(window.duration, None);
    }

    #[test]
    fn config_deserializes_from_json() {
        let config: ConcatConfig =
            serde_json::from_str(r#"{"is_atomic":true,"lazy_preparation":false}"#)
                .expect("valid config");
        assert!(config.is_atomic);
    }
}
