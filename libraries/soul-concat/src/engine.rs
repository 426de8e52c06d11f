//! Playlist engine - applies playlist edits and publishes timelines
//!
//! The engine owns one holder per playlist entry and keeps their window and
//! period offsets consistent. It runs on a single context: whoever owns it
//! calls [`PlaylistEngine::poll`] (or [`PlaylistEngine::process_blocking`]) to
//! apply the commands sent by the mirror and by child sources.

use crate::{
    command::{Command, CommandQueue, Completion},
    concatenated::ConcatenatedTimeline,
    error::{ConcatError, Result},
    holder::Holder,
    mirror::PlaylistMirror,
    period::DeferredPeriod,
    shuffle::ShuffleOrder,
    source::{InertSource, RefreshListener},
    timeline::Timeline,
    types::{ConcatConfig, HolderUid, MediaPeriodId, PeriodHandle},
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// Callback receiving every published timeline
pub type TimelineListener = Box<dyn FnMut(Arc<ConcatenatedTimeline>) + Send>;

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not prepared yet
    Idle,

    /// Attached to the mirror and applying commands
    Active,

    /// Released; may be prepared again
    Released,
}

/// A period handed to the playback driver
struct ActivePeriod {
    /// Entry the period belongs to (None for inert substitutes)
    holder: Option<HolderUid>,
    period: DeferredPeriod,
}

/// Playlist concatenation engine
pub struct PlaylistEngine {
    mirror: PlaylistMirror,
    config: ConcatConfig,
    state: EngineState,

    /// Present while active; dropping it makes pending and later commands stale
    queue: Option<CommandQueue>,
    listener: Option<TimelineListener>,

    /// Live entries in playlist order
    order: Vec<HolderUid>,
    holders: HashMap<HolderUid, Holder>,

    /// Removed entries waiting for their last period to be released
    detached: HashMap<HolderUid, Holder>,

    periods: HashMap<PeriodHandle, ActivePeriod>,
    next_handle: u64,

    shuffle_order: ShuffleOrder,
    window_count: usize,
    period_count: usize,

    notification_scheduled: bool,
    pending_completions: Vec<Completion>,

    /// Last published snapshot
    timeline: Arc<ConcatenatedTimeline>,
}

impl PlaylistEngine {
    /// Create an idle engine for `mirror`
    pub fn new(mirror: PlaylistMirror, config: ConcatConfig) -> Self {
        let timeline = Arc::new(ConcatenatedTimeline::empty(
            ShuffleOrder::default(),
            config.is_atomic,
        ));
        Self {
            mirror,
            config,
            state: EngineState::Idle,
            queue: None,
            listener: None,
            order: Vec::new(),
            holders: HashMap::new(),
            detached: HashMap::new(),
            periods: HashMap::new(),
            next_handle: 0,
            shuffle_order: ShuffleOrder::default(),
            window_count: 0,
            period_count: 0,
            notification_scheduled: false,
            pending_completions: Vec::new(),
            timeline,
        }
    }

    // ===== Lifecycle =====

    /// Attach to the mirror and start building the timeline
    ///
    /// An empty playlist publishes right away. Otherwise every entry is added
    /// and the first timeline is published by the next [`poll`](Self::poll).
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if the engine is already active or the mirror is
    /// attached to another engine
    pub fn prepare(
        &mut self,
        listener: impl FnMut(Arc<ConcatenatedTimeline>) + Send + 'static,
    ) -> Result<()> {
        if self.state == EngineState::Active {
            return Err(ConcatError::InvalidOperation(
                "engine is already prepared".to_string(),
            ));
        }

        let queue = CommandQueue::new();
        let (sources, shuffle_order) = self.mirror.attach(queue.sender())?;
        info!(entries = sources.len(), "Preparing playlist engine");

        self.queue = Some(queue);
        self.listener = Some(Box::new(listener));
        self.state = EngineState::Active;
        self.shuffle_order = shuffle_order;

        if sources.is_empty() {
            self.notify_listener();
        } else {
            self.shuffle_order = self.shuffle_order.clone_and_insert(0, sources.len());
            let holders = sources.into_iter().map(Holder::new).collect();
            self.insert_holders(0, holders);
            self.schedule_notification(None);
        }
        Ok(())
    }

    /// Detach from the mirror and release every child
    ///
    /// Pending commands and completions are discarded. Does nothing unless
    /// the engine is active.
    pub fn release(&mut self) {
        if self.state != EngineState::Active {
            return;
        }
        info!(
            entries = self.order.len(),
            detached = self.detached.len(),
            periods = self.periods.len(),
            "Releasing playlist engine"
        );

        self.mirror.detach(&self.shuffle_order);
        self.queue = None;
        self.listener = None;

        for active in std::mem::take(&mut self.periods).into_values() {
            active.period.release();
        }
        for holder in self.holders.values_mut().chain(self.detached.values_mut()) {
            release_child(holder);
        }

        self.order.clear();
        self.holders.clear();
        self.detached.clear();
        self.shuffle_order = self.shuffle_order.clone_and_clear();
        self.window_count = 0;
        self.period_count = 0;
        self.notification_scheduled = false;
        self.pending_completions.clear();
        self.timeline = Arc::new(ConcatenatedTimeline::empty(
            self.shuffle_order.clone(),
            self.config.is_atomic,
        ));
        self.state = EngineState::Released;
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &ConcatConfig {
        &self.config
    }

    /// Playlist this engine follows
    pub fn mirror(&self) -> &PlaylistMirror {
        &self.mirror
    }

    // ===== Driving =====

    /// Apply every queued command without blocking
    ///
    /// Returns the number of commands applied.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` if a command does not fit the holder list; later
    /// commands stay queued
    pub fn poll(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Some(command) = self.queue.as_ref().and_then(CommandQueue::try_next) {
            self.apply(command)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Wait up to `timeout` for a command, then apply everything queued
    ///
    /// # Errors
    ///
    /// Same as [`poll`](Self::poll)
    pub fn process_blocking(&mut self, timeout: Duration) -> Result<usize> {
        let Some(command) = self
            .queue
            .as_ref()
            .and_then(|queue| queue.next_timeout(timeout))
        else {
            return Ok(0);
        };
        self.apply(command)?;
        Ok(1 + self.poll()?)
    }

    fn apply(&mut self, command: Command) -> Result<()> {
        debug!(command = ?command, "Applying command");
        let result = match command {
            Command::Add {
                index,
                holders,
                on_done,
            } => self.handle_add(index, holders, on_done),
            Command::Remove { from, to, on_done } => self.handle_remove(from, to, on_done),
            Command::Move { from, to, on_done } => self.handle_move(from, to, on_done),
            Command::SetShuffleOrder { order, on_done } => {
                self.handle_set_shuffle_order(order, on_done);
                Ok(())
            }
            Command::NotifyListeners => {
                self.notify_listener();
                Ok(())
            }
            Command::RunCompletions(completions) => {
                for completion in completions {
                    completion();
                }
                Ok(())
            }
            Command::ChildRefreshed { holder, timeline } => {
                self.handle_child_refreshed(holder, timeline);
                Ok(())
            }
        };
        if let Err(e) = &result {
            error!("Failed to apply command: {}", e);
        }
        result
    }

    // ===== Command handlers =====

    fn handle_add(
        &mut self,
        index: usize,
        holders: Vec<Holder>,
        on_done: Option<Completion>,
    ) -> Result<()> {
        if index > self.order.len() {
            return Err(self.misfit("Add", index, index));
        }
        self.shuffle_order = self.shuffle_order.clone_and_insert(index, holders.len());
        self.insert_holders(index, holders);
        self.schedule_notification(on_done);
        Ok(())
    }

    fn handle_remove(&mut self, from: usize, to: usize, on_done: Option<Completion>) -> Result<()> {
        if from > to || to > self.order.len() {
            return Err(self.misfit("Remove", from, to));
        }
        if from == 0 && to == self.order.len() {
            self.shuffle_order = self.shuffle_order.clone_and_clear();
        } else {
            for index in (from..to).rev() {
                self.shuffle_order = self.shuffle_order.clone_and_remove(index);
            }
        }
        for index in (from..to).rev() {
            self.remove_holder(index);
        }
        self.schedule_notification(on_done);
        Ok(())
    }

    fn handle_move(&mut self, from: usize, to: usize, on_done: Option<Completion>) -> Result<()> {
        if from >= self.order.len() || to >= self.order.len() {
            return Err(self.misfit("Move", from, to));
        }
        self.shuffle_order = self
            .shuffle_order
            .clone_and_remove(from)
            .clone_and_insert(to, 1);
        self.move_holder(from, to);
        self.schedule_notification(on_done);
        Ok(())
    }

    fn handle_set_shuffle_order(&mut self, order: ShuffleOrder, on_done: Option<Completion>) {
        self.shuffle_order = order.normalized(self.order.len());
        self.schedule_notification(on_done);
    }

    fn handle_child_refreshed(&mut self, uid: HolderUid, timeline: Arc<dyn Timeline>) {
        if let Some(holder) = self.holders.get(&uid) {
            if holder.timeline.wraps(&timeline) {
                return;
            }
            let child_index = holder.child_index;
            let window_delta = signed(timeline.window_count()) - signed(holder.window_count());
            let period_delta = signed(timeline.period_count()) - signed(holder.period_count());
            if window_delta != 0 || period_delta != 0 {
                self.correct_offsets(child_index + 1, 0, window_delta, period_delta);
            }
            if let Some(holder) = self.holders.get_mut(&uid) {
                apply_child_timeline(holder, timeline, &mut self.periods);
            }
            self.schedule_notification(None);
        } else if let Some(holder) = self.detached.get_mut(&uid) {
            debug!(holder = %uid, "Refresh for removed entry, updating periods only");
            apply_child_timeline(holder, timeline, &mut self.periods);
        } else {
            debug!(holder = %uid, "Ignoring refresh for unknown entry");
        }
    }

    fn misfit(&self, command: &str, from: usize, to: usize) -> ConcatError {
        ConcatError::InvariantViolation(format!(
            "{command}({from}, {to}) does not fit {} entries",
            self.order.len()
        ))
    }

    // ===== Holder list =====

    fn insert_holders(&mut self, index: usize, holders: Vec<Holder>) {
        for (offset, holder) in holders.into_iter().enumerate() {
            self.insert_holder(index + offset, holder);
        }
    }

    fn insert_holder(&mut self, index: usize, mut holder: Holder) {
        let (first_window, first_period) = match index
            .checked_sub(1)
            .and_then(|previous| self.holder(previous))
        {
            Some(previous) => (
                previous.first_window_index + previous.window_count(),
                previous.first_period_index + previous.period_count(),
            ),
            None => (0, 0),
        };
        holder.reset(index, first_window, first_period);
        self.correct_offsets(
            index,
            1,
            signed(holder.window_count()),
            signed(holder.period_count()),
        );

        let uid = holder.uid();
        self.order.insert(index, uid);
        self.holders.insert(uid, holder);

        if !self.config.lazy_preparation {
            self.prepare_child(uid);
        }
    }

    fn remove_holder(&mut self, index: usize) {
        let uid = self.order.remove(index);
        let Some(mut holder) = self.holders.remove(&uid) else {
            return;
        };
        self.correct_offsets(
            index,
            -1,
            -signed(holder.window_count()),
            -signed(holder.period_count()),
        );
        holder.is_removed = true;

        if holder.can_release() {
            release_child(&mut holder);
        } else {
            debug!(
                holder = %uid,
                periods = holder.active_period_count(),
                "Deferring release of removed entry"
            );
            self.detached.insert(uid, holder);
        }
    }

    /// Move and recompute offsets across the affected span only
    fn move_holder(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let start = from.min(to);
        let end = from.max(to);
        let (mut window_offset, mut period_offset) = match self.holder(start) {
            Some(holder) => (holder.first_window_index, holder.first_period_index),
            None => return,
        };

        let uid = self.order.remove(from);
        self.order.insert(to, uid);

        trace!(start, end, "Recomputing offsets after move");
        for index in start..=end {
            let Some(holder) = self.holders.get_mut(&self.order[index]) else {
                continue;
            };
            holder.child_index = index;
            holder.first_window_index = window_offset;
            holder.first_period_index = period_offset;
            window_offset += holder.window_count();
            period_offset += holder.period_count();
        }
    }

    /// Shift every holder at `start` or later and adjust the totals
    fn correct_offsets(
        &mut self,
        start: usize,
        child_delta: isize,
        window_delta: isize,
        period_delta: isize,
    ) {
        trace!(start, child_delta, window_delta, period_delta, "Correcting offsets");
        self.window_count = self.window_count.saturating_add_signed(window_delta);
        self.period_count = self.period_count.saturating_add_signed(period_delta);
        for uid in self.order.iter().skip(start) {
            if let Some(holder) = self.holders.get_mut(uid) {
                holder.shift(child_delta, window_delta, period_delta);
            }
        }
    }

    fn prepare_child(&mut self, uid: HolderUid) {
        let Some(sender) = self.queue.as_ref().map(CommandQueue::sender) else {
            return;
        };
        let Some(holder) = self.holders.get_mut(&uid) else {
            return;
        };
        debug!(holder = %uid, index = holder.child_index, "Preparing child source");
        let listener = RefreshListener::new(uid, sender);
        holder.has_started_preparing = true;
        holder.listener = Some(listener.clone());
        holder.source().prepare(listener);
    }

    // ===== Notification =====

    fn schedule_notification(&mut self, on_done: Option<Completion>) {
        if !self.notification_scheduled {
            if let Some(queue) = &self.queue {
                queue.push(Command::NotifyListeners);
                self.notification_scheduled = true;
            }
        }
        if let Some(on_done) = on_done {
            self.pending_completions.push(on_done);
        }
    }

    fn notify_listener(&mut self) {
        self.notification_scheduled = false;
        let completions = std::mem::take(&mut self.pending_completions);

        let snapshot = Arc::new(ConcatenatedTimeline::new(
            self.order.iter().filter_map(|uid| self.holders.get(uid)),
            self.window_count,
            self.period_count,
            self.shuffle_order.clone(),
            self.config.is_atomic,
        ));
        self.timeline = Arc::clone(&snapshot);
        debug!(
            entries = self.order.len(),
            windows = self.window_count,
            periods = self.period_count,
            "Publishing timeline"
        );
        if let Some(listener) = self.listener.as_mut() {
            listener(snapshot);
        }

        if !completions.is_empty() {
            if let Some(queue) = &self.queue {
                queue.push(Command::RunCompletions(completions));
            }
        }
    }

    // ===== Periods =====

    /// Create the period identified by a global id
    ///
    /// Ids naming an entry that no longer exists get an inert period that
    /// never prepares. On a lazily prepared entry the first request starts
    /// preparation.
    pub fn create_period(&mut self, id: &MediaPeriodId) -> PeriodHandle {
        let handle = PeriodHandle(self.next_handle);
        self.next_handle += 1;

        let Some(uid) = id
            .period_uid
            .holder_uid()
            .filter(|uid| self.holders.contains_key(uid))
        else {
            debug!(?id, "Period requested for unknown entry, using inert period");
            let period = DeferredPeriod::new(Arc::new(InertSource), id.clone());
            self.periods.insert(
                handle,
                ActivePeriod {
                    holder: None,
                    period,
                },
            );
            return handle;
        };

        let Some(holder) = self.holders.get_mut(&uid) else {
            return handle;
        };
        let mut period = DeferredPeriod::new(Arc::clone(holder.source()), id.clone());
        holder.active_periods.insert(handle);
        let start_preparing = !holder.has_started_preparing;
        if holder.is_prepared {
            if let Some(child_uid) = holder.child_period_uid(&id.period_uid) {
                period.create_period(&id.with_period_uid(child_uid));
            }
        }
        self.periods.insert(
            handle,
            ActivePeriod {
                holder: Some(uid),
                period,
            },
        );

        if start_preparing {
            self.prepare_child(uid);
        }
        handle
    }

    /// Hand a period back
    ///
    /// Releases a removed entry's child once its last period is gone.
    pub fn release_period(&mut self, handle: PeriodHandle) {
        let Some(active) = self.periods.remove(&handle) else {
            debug!(?handle, "Ignoring release of unknown period");
            return;
        };
        active.period.release();

        let Some(uid) = active.holder else {
            return;
        };
        if let Some(holder) = self.holders.get_mut(&uid) {
            holder.active_periods.remove(&handle);
        } else if let Some(holder) = self.detached.get_mut(&uid) {
            holder.active_periods.remove(&handle);
            if holder.can_release() {
                if let Some(mut holder) = self.detached.remove(&uid) {
                    release_child(&mut holder);
                }
            }
        }
    }

    /// Period behind `handle`
    pub fn period(&self, handle: PeriodHandle) -> Option<&DeferredPeriod> {
        self.periods.get(&handle).map(|active| &active.period)
    }

    pub fn period_mut(&mut self, handle: PeriodHandle) -> Option<&mut DeferredPeriod> {
        self.periods.get_mut(&handle).map(|active| &mut active.period)
    }

    /// Number of periods handed out and not released
    pub fn active_period_count(&self) -> usize {
        self.periods.len()
    }

    // ===== Child id translation =====

    /// Child errors surface through the periods instead
    pub fn maybe_throw_source_info_refresh_error(&self) -> Result<()> {
        Ok(())
    }

    /// Global window index for a window reported by the child of `holder`
    pub fn window_index_for_child(&self, holder: HolderUid, child_window: usize) -> Option<usize> {
        self.holders
            .get(&holder)
            .or_else(|| self.detached.get(&holder))
            .map(|holder| holder.first_window_index + child_window)
    }

    /// Global period id for an id reported by the child of `holder`
    ///
    /// Only ids matching one of the entry's active periods (by window sequence
    /// number) are translated.
    pub fn period_id_for_child(
        &self,
        holder: HolderUid,
        child_id: &MediaPeriodId,
    ) -> Option<MediaPeriodId> {
        let holder = self
            .holders
            .get(&holder)
            .or_else(|| self.detached.get(&holder))?;
        let matches = holder.active_periods.iter().any(|handle| {
            self.periods.get(handle).is_some_and(|active| {
                active.period.id().window_sequence_number == child_id.window_sequence_number
            })
        });
        matches.then(|| child_id.with_period_uid(holder.period_uid(child_id.period_uid.clone())))
    }

    // ===== Inspection =====

    /// Last published timeline
    pub fn current_timeline(&self) -> Arc<ConcatenatedTimeline> {
        Arc::clone(&self.timeline)
    }

    /// Total windows, including edits not published yet
    pub fn window_count(&self) -> usize {
        self.window_count
    }

    /// Total periods, including edits not published yet
    pub fn period_count(&self) -> usize {
        self.period_count
    }

    pub fn shuffle_order(&self) -> &ShuffleOrder {
        &self.shuffle_order
    }

    /// Number of live entries
    pub fn holder_count(&self) -> usize {
        self.order.len()
    }

    /// Entry at playlist position `index`
    pub fn holder(&self, index: usize) -> Option<&Holder> {
        self.order.get(index).and_then(|uid| self.holders.get(uid))
    }

    /// Removed entries still waiting for their periods to be released
    pub fn detached_count(&self) -> usize {
        self.detached.len()
    }
}

impl Drop for PlaylistEngine {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for PlaylistEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaylistEngine")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("entries", &self.order.len())
            .field("detached", &self.detached.len())
            .field("periods", &self.periods.len())
            .field("window_count", &self.window_count)
            .field("period_count", &self.period_count)
            .finish_non_exhaustive()
    }
}

/// Store a child timeline and create the real periods on first preparation
fn apply_child_timeline(
    holder: &mut Holder,
    timeline: Arc<dyn Timeline>,
    periods: &mut HashMap<PeriodHandle, ActivePeriod>,
) {
    let first_window = timeline.window(0);
    holder.timeline = holder.timeline.with_timeline(timeline);
    if holder.is_prepared {
        return;
    }
    let Some(first_window) = first_window else {
        return;
    };
    holder.is_prepared = true;

    let default_position = first_window.default_position_in_first_period();
    for handle in &holder.active_periods {
        let Some(active) = periods.get_mut(handle) else {
            continue;
        };
        let Some(child_uid) = holder.child_period_uid(&active.period.id().period_uid) else {
            continue;
        };
        let id_in_source = active.period.id().with_period_uid(child_uid);
        active.period.set_default_prepare_position(default_position);
        active.period.create_period(&id_in_source);
    }
}

fn release_child(holder: &mut Holder) {
    if let Some(listener) = holder.listener.take() {
        debug!(holder = %holder.uid(), "Releasing child source");
        holder.source().release(&listener);
    }
}

fn signed(count: usize) -> isize {
    count as isize
}
