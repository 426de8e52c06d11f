/// Common test utilities and fixtures
use soul_concat::{
    ConcatConfig, ConcatenatedTimeline, HolderUid, MediaPeriod, MediaPeriodId, MediaSource,
    PlaylistEngine, PlaylistMirror, RefreshListener, SourceError, StaticTimeline, Timeline,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scriptable child source
///
/// Records every registration and period; timelines are published on demand
/// (or right away when built with `ready`).
#[derive(Default)]
pub struct TestSource {
    listeners: Mutex<Vec<RefreshListener>>,
    released: Mutex<Vec<HolderUid>>,
    created: Mutex<Vec<MediaPeriodId>>,
    released_periods: Mutex<Vec<MediaPeriodId>>,
    prepared_periods: Arc<Mutex<Vec<(MediaPeriodId, Duration)>>>,
    immediate: Option<Arc<dyn Timeline>>,
    error: Mutex<Option<String>>,
}

#[allow(dead_code)]
impl TestSource {
    /// Source that reports nothing until `publish` is called
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Source that reports `periods_per_window` as soon as it is prepared
    pub fn ready(first_uid: u64, periods_per_window: &[usize]) -> Arc<Self> {
        Arc::new(Self {
            immediate: Some(Arc::new(StaticTimeline::new(first_uid, periods_per_window))),
            ..Self::default()
        })
    }

    /// Report `timeline` to every registered listener
    pub fn publish(&self, timeline: Arc<dyn Timeline>) {
        for listener in self.listeners.lock().unwrap().iter() {
            listener.refresh(Arc::clone(&timeline));
        }
    }

    /// Report a static layout to every registered listener
    pub fn publish_layout(&self, first_uid: u64, periods_per_window: &[usize]) {
        self.publish(Arc::new(StaticTimeline::new(first_uid, periods_per_window)));
    }

    pub fn fail_with(&self, message: &str) {
        *self.error.lock().unwrap() = Some(message.to_string());
    }

    /// Registrations currently held
    pub fn active_registrations(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Registrations handed back through `release`
    pub fn release_count(&self) -> usize {
        self.released.lock().unwrap().len()
    }

    pub fn created_periods(&self) -> Vec<MediaPeriodId> {
        self.created.lock().unwrap().clone()
    }

    pub fn released_periods(&self) -> Vec<MediaPeriodId> {
        self.released_periods.lock().unwrap().clone()
    }

    pub fn prepared_periods(&self) -> Vec<(MediaPeriodId, Duration)> {
        self.prepared_periods.lock().unwrap().clone()
    }
}

impl MediaSource for TestSource {
    fn prepare(&self, listener: RefreshListener) {
        if let Some(timeline) = &self.immediate {
            listener.refresh(Arc::clone(timeline));
        }
        self.listeners.lock().unwrap().push(listener);
    }

    fn maybe_throw_prepare_error(&self) -> Result<(), SourceError> {
        match self.error.lock().unwrap().as_ref() {
            Some(message) => Err(SourceError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }

    fn create_period(&self, id: &MediaPeriodId) -> Box<dyn MediaPeriod> {
        self.created.lock().unwrap().push(id.clone());
        Box::new(TestPeriod {
            id: id.clone(),
            prepared: Arc::clone(&self.prepared_periods),
        })
    }

    fn release_period(&self, period: Box<dyn MediaPeriod>) {
        self.released_periods
            .lock()
            .unwrap()
            .push(period.id().clone());
    }

    fn release(&self, listener: &RefreshListener) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|registered| registered.holder() != listener.holder());
        self.released.lock().unwrap().push(listener.holder());
    }
}

struct TestPeriod {
    id: MediaPeriodId,
    prepared: Arc<Mutex<Vec<(MediaPeriodId, Duration)>>>,
}

impl MediaPeriod for TestPeriod {
    fn id(&self) -> &MediaPeriodId {
        &self.id
    }

    fn prepare(&mut self, position: Duration) {
        self.prepared
            .lock()
            .unwrap()
            .push((self.id.clone(), position));
    }
}

/// Published snapshots, in publication order
pub type Published = Arc<Mutex<Vec<Arc<ConcatenatedTimeline>>>>;

/// Prepared engine over `mirror`, recording every published timeline
#[allow(dead_code)]
pub fn prepared_engine(
    mirror: &PlaylistMirror,
    config: ConcatConfig,
) -> (PlaylistEngine, Published) {
    let mut engine = PlaylistEngine::new(mirror.clone(), config);
    let published: Published = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&published);
    engine
        .prepare(move |timeline| sink.lock().unwrap().push(timeline))
        .unwrap();
    (engine, published)
}

/// Completion that bumps the returned counter
#[allow(dead_code)]
pub fn counting_completion() -> (Arc<AtomicUsize>, Option<soul_concat::Completion>) {
    let count = Arc::new(AtomicUsize::new(0));
    let clone = Arc::clone(&count);
    let completion: soul_concat::Completion = Box::new(move || {
        clone.fetch_add(1, Ordering::SeqCst);
    });
    (count, Some(completion))
}

/// Window/period offsets of every live entry
#[allow(dead_code)]
pub fn offsets(engine: &PlaylistEngine) -> Vec<(usize, usize)> {
    (0..engine.holder_count())
        .filter_map(|index| engine.holder(index))
        .map(|holder| (holder.first_window_index(), holder.first_period_index()))
        .collect()
}

/// Upcast for APIs taking trait objects
#[allow(dead_code)]
pub fn dyn_source(source: &Arc<TestSource>) -> Arc<dyn MediaSource> {
    Arc::clone(source) as Arc<dyn MediaSource>
}
