//! Child source contract
//!
//! The engine composes children it knows only through these traits. Concrete
//! sources (files, streams, other concatenations) live outside this crate.

use crate::command::{Command, CommandSender};
use crate::error::SourceError;
use crate::timeline::Timeline;
use crate::types::{HolderUid, MediaPeriodId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A sequenceable media source
///
/// Sources are shared (`Arc`) and may appear several times in one playlist.
/// Each occurrence prepares the source with its own listener and releases that
/// same listener later, so implementations should track listeners rather than
/// a single prepared flag.
pub trait MediaSource: Send + Sync {
    /// Start preparing; the timeline is reported through `listener`, possibly
    /// from another thread and possibly several times
    fn prepare(&self, listener: RefreshListener);

    /// Error that prevented the source from producing its timeline
    fn maybe_throw_prepare_error(&self) -> Result<(), SourceError>;

    /// Create the period identified by `id` (a child-local id)
    fn create_period(&self, id: &MediaPeriodId) -> Box<dyn MediaPeriod>;

    /// Hand back a period created by `create_period`
    fn release_period(&self, period: Box<dyn MediaPeriod>);

    /// Drop the registration made by `prepare(listener)`
    fn release(&self, listener: &RefreshListener);
}

/// A period created by a child source
pub trait MediaPeriod: Send {
    /// Child-local id the period was created with
    fn id(&self) -> &MediaPeriodId;

    /// Start loading media from `position`
    fn prepare(&mut self, position: Duration);

    /// Error that prevented the period from preparing
    fn maybe_throw_prepare_error(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Callback handle a child uses to report its timeline
///
/// Reports never run engine code directly: they are queued behind any pending
/// commands and applied on the engine context. Reports sent after the engine
/// was released are dropped.
#[derive(Clone)]
pub struct RefreshListener {
    holder: HolderUid,
    sender: CommandSender,
}

impl RefreshListener {
    pub(crate) fn new(holder: HolderUid, sender: CommandSender) -> Self {
        Self { holder, sender }
    }

    /// Playlist entry this listener belongs to
    pub fn holder(&self) -> HolderUid {
        self.holder
    }

    /// Report a new timeline
    pub fn refresh(&self, timeline: Arc<dyn Timeline>) {
        // Err means the engine was released; the report is stale
        let _ = self.sender.send(Command::ChildRefreshed {
            holder: self.holder,
            timeline,
        });
    }
}

impl fmt::Debug for RefreshListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshListener")
            .field("holder", &self.holder)
            .finish_non_exhaustive()
    }
}

/// Stand-in for a source whose playlist entry no longer exists
///
/// Never reports a timeline, so periods created against it stay unprepared
/// and never fail.
#[derive(Debug, Default)]
pub(crate) struct InertSource;

impl MediaSource for InertSource {
    fn prepare(&self, _listener: RefreshListener) {}

    fn maybe_throw_prepare_error(&self) -> Result<(), SourceError> {
        Ok(())
    }

    fn create_period(&self, id: &MediaPeriodId) -> Box<dyn MediaPeriod> {
        Box::new(InertPeriod { id: id.clone() })
    }

    fn release_period(&self, _period: Box<dyn MediaPeriod>) {}

    fn release(&self, _listener: &RefreshListener) {}
}

#[derive(Debug)]
struct InertPeriod {
    id: MediaPeriodId,
}

impl MediaPeriod for InertPeriod {
    fn id(&self) -> &MediaPeriodId {
        &self.id
    }

    fn prepare(&mut self, _position: Duration) {}
}
