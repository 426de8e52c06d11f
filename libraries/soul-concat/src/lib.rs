//! Soul Player - Playlist Concatenation
//!
//! Plays an editable list of media sources back to back as one timeline.
//!
//! This crate provides:
//! - A thread-safe playlist (`PlaylistMirror`) that can be edited while playing
//! - An engine that keeps window/period offsets of every entry consistent
//! - Placeholder timelines for entries whose source has not reported yet
//! - Periods that can be created before their source is prepared
//! - Shuffle orders and repeat-aware traversal over the whole playlist
//! - Completion callbacks that run once an edit is visible in a published
//!   timeline
//!
//! # Architecture
//!
//! Edits and child reports never touch engine state directly. They are queued
//! as commands and applied by whoever owns the [`PlaylistEngine`], in order,
//! on one context. Each batch of applied commands publishes one immutable
//! [`ConcatenatedTimeline`] snapshot.
//!
//! # Example
//!
//! ```rust
//! use soul_concat::{ConcatConfig, PlaylistEngine, PlaylistMirror, Timeline};
//! use std::sync::{Arc, Mutex};
//!
//! let playlist = PlaylistMirror::new();
//! let mut engine = PlaylistEngine::new(playlist.clone(), ConcatConfig::default());
//!
//! let published = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&published);
//! engine
//!     .prepare(move |timeline| sink.lock().unwrap().push(timeline))
//!     .unwrap();
//!
//! // Empty playlists publish right away
//! assert_eq!(published.lock().unwrap().len(), 1);
//!
//! // Edits are visible in the playlist immediately...
//! playlist.clear(None);
//! assert!(playlist.is_empty());
//!
//! // ...and in the timeline once the engine has applied them
//! engine.poll().unwrap();
//! assert!(engine.current_timeline().is_empty());
//! ```
//!
//! # Example: Child Sources
//!
//! ```rust,no_run
//! use soul_concat::{
//!     MediaPeriod, MediaPeriodId, MediaSource, RefreshListener, SourceError, StaticTimeline,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct FileSource;
//!
//! impl MediaSource for FileSource {
//!     fn prepare(&self, listener: RefreshListener) {
//!         // Report from any thread once the layout is known
//!         listener.refresh(Arc::new(StaticTimeline::new(0, &[1])));
//!     }
//!
//!     fn maybe_throw_prepare_error(&self) -> Result<(), SourceError> {
//!         Ok(())
//!     }
//!
//!     fn create_period(&self, id: &MediaPeriodId) -> Box<dyn MediaPeriod> {
//!         Box::new(FilePeriod { id: id.clone() })
//!     }
//!
//!     fn release_period(&self, _period: Box<dyn MediaPeriod>) {}
//!
//!     fn release(&self, _listener: &RefreshListener) {}
//! }
//!
//! struct FilePeriod {
//!     id: MediaPeriodId,
//! }
//!
//! impl MediaPeriod for FilePeriod {
//!     fn id(&self) -> &MediaPeriodId {
//!         &self.id
//!     }
//!
//!     fn prepare(&mut self, _position: Duration) {}
//! }
//! ```

mod command;
mod concatenated;
mod deferred;
mod engine;
mod error;
mod holder;
mod mirror;
mod period;
mod shuffle;
mod source;
mod timeline;
pub mod types;

// Public exports
pub use command::Completion;
pub use concatenated::ConcatenatedTimeline;
pub use deferred::DeferredTimeline;
pub use engine::{EngineState, PlaylistEngine, TimelineListener};
pub use error::{ConcatError, Result, SourceError};
pub use holder::Holder;
pub use mirror::PlaylistMirror;
pub use period::DeferredPeriod;
pub use shuffle::ShuffleOrder;
pub use source::{MediaPeriod, MediaSource, RefreshListener};
pub use timeline::{StaticTimeline, Timeline};
pub use types::{
    ConcatConfig, HolderUid, MediaPeriodId, Period, PeriodHandle, PeriodUid, RepeatMode, Window,
};
