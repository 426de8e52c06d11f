//! Periods handed to the playback driver
//!
//! A deferred period can be created before its child source is prepared. The
//! real child period is attached once the child's timeline is known; until
//! then prepare requests are remembered.

use crate::error::Result;
use crate::source::{MediaPeriod, MediaSource};
use crate::types::MediaPeriodId;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Period wrapper returned by the engine
pub struct DeferredPeriod {
    source: Arc<dyn MediaSource>,

    /// Global id the driver asked for
    id: MediaPeriodId,

    /// Real child period, once created
    period: Option<Box<dyn MediaPeriod>>,

    /// Position requested before the real period existed
    pending_prepare: Option<Duration>,

    /// Start position to use when the request asked for the beginning
    default_prepare_position: Option<Duration>,
}

impl DeferredPeriod {
    pub(crate) fn new(source: Arc<dyn MediaSource>, id: MediaPeriodId) -> Self {
        Self {
            source,
            id,
            period: None,
            pending_prepare: None,
            default_prepare_position: None,
        }
    }

    /// Global id of this period
    pub fn id(&self) -> &MediaPeriodId {
        &self.id
    }

    /// Whether the real child period exists
    pub fn is_created(&self) -> bool {
        self.period.is_some()
    }

    /// Real child period
    pub fn inner(&self) -> Option<&dyn MediaPeriod> {
        self.period.as_deref()
    }

    pub(crate) fn set_default_prepare_position(&mut self, position: Duration) {
        self.default_prepare_position = Some(position);
    }

    /// Create the real period with the child-side id
    pub(crate) fn create_period(&mut self, id_in_source: &MediaPeriodId) {
        let mut period = self.source.create_period(id_in_source);
        if let Some(requested) = self.pending_prepare.take() {
            let position = match self.default_prepare_position {
                Some(default) if requested.is_zero() => default,
                _ => requested,
            };
            period.prepare(position);
        }
        self.period = Some(period);
    }

    /// Start loading from `position`, now or once the real period exists
    pub fn prepare(&mut self, position: Duration) {
        match self.period.as_mut() {
            Some(period) => period.prepare(position),
            None => self.pending_prepare = Some(position),
        }
    }

    /// Forward the error blocking preparation, if any
    ///
    /// Reports the real period's error, or the child source's error while the
    /// real period does not exist yet.
    pub fn maybe_throw_prepare_error(&self) -> Result<()> {
        match &self.period {
            Some(period) => period.maybe_throw_prepare_error()?,
            None => self.source.maybe_throw_prepare_error()?,
        }
        Ok(())
    }

    /// Hand the real period back to its source
    pub(crate) fn release(mut self) {
        if let Some(period) = self.period.take() {
            self.source.release_period(period);
        }
    }
}

impl fmt::Debug for DeferredPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredPeriod")
            .field("id", &self.id)
            .field("created", &self.period.is_some())
            .field("pending_prepare", &self.pending_prepare)
            .finish_non_exhaustive()
    }
}
