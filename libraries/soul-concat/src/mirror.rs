//! Client-side playlist
//!
//! The mirror is the list application code edits. Every edit is applied to the
//! mirror at once, so `len`/`get` reflect it immediately. While an engine is
//! attached the edit is also forwarded as exactly one command; the engine
//! applies it later on its own context and runs the completion once the
//! change is visible in a published timeline.

use crate::command::{Command, CommandSender, Completion};
use crate::error::{ConcatError, Result};
use crate::holder::Holder;
use crate::shuffle::ShuffleOrder;
use crate::source::MediaSource;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Shared, thread-safe playlist handle
///
/// Clones share the same list.
#[derive(Clone, Default)]
pub struct PlaylistMirror {
    state: Arc<Mutex<MirrorState>>,
}

#[derive(Default)]
struct MirrorState {
    entries: Vec<Arc<dyn MediaSource>>,

    /// Present while an engine is attached
    sender: Option<CommandSender>,

    /// Shuffle order kept while no engine is attached (always cleared)
    shuffle_order: ShuffleOrder,
}

impl PlaylistMirror {
    /// Create an empty playlist
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a playlist holding `sources`
    pub fn with_sources(sources: impl IntoIterator<Item = Arc<dyn MediaSource>>) -> Self {
        let mirror = Self::new();
        mirror.lock().entries.extend(sources);
        mirror
    }

    fn lock(&self) -> MutexGuard<'_, MirrorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `source` at `index`
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index > len()`
    pub fn insert(
        &self,
        index: usize,
        source: Arc<dyn MediaSource>,
        on_done: Option<Completion>,
    ) -> Result<()> {
        self.insert_all(index, vec![source], on_done)
    }

    /// Insert `sources` starting at `index`, keeping their order
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index > len()`
    pub fn insert_all(
        &self,
        index: usize,
        sources: Vec<Arc<dyn MediaSource>>,
        on_done: Option<Completion>,
    ) -> Result<()> {
        let inline = {
            let mut state = self.lock();
            let size = state.entries.len();
            if index > size {
                return Err(ConcatError::IndexOutOfBounds { index, size });
            }

            let holders: Vec<Holder> = sources
                .iter()
                .map(|source| Holder::new(Arc::clone(source)))
                .collect();
            let tail = state.entries.split_off(index);
            state.entries.extend(sources);
            state.entries.extend(tail);

            if holders.is_empty() {
                on_done
            } else {
                state.forward(Command::Add {
                    index,
                    holders,
                    on_done,
                })
            }
        };
        run(inline);
        Ok(())
    }

    /// Append `source`
    pub fn push(&self, source: Arc<dyn MediaSource>, on_done: Option<Completion>) {
        let inline = {
            let mut state = self.lock();
            let index = state.entries.len();
            let holder = Holder::new(Arc::clone(&source));
            state.entries.push(source);
            state.forward(Command::Add {
                index,
                holders: vec![holder],
                on_done,
            })
        };
        run(inline);
    }

    /// Remove the entry at `index`
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index >= len()`
    pub fn remove(&self, index: usize, on_done: Option<Completion>) -> Result<()> {
        let inline = {
            let mut state = self.lock();
            let size = state.entries.len();
            if index >= size {
                return Err(ConcatError::IndexOutOfBounds { index, size });
            }
            state.entries.remove(index);
            state.forward(Command::Remove {
                from: index,
                to: index + 1,
                on_done,
            })
        };
        run(inline);
        Ok(())
    }

    /// Remove entries in `from..to`
    ///
    /// An empty range changes nothing and runs `on_done` right away.
    ///
    /// # Errors
    ///
    /// `InvalidRange` if `from > to`, `IndexOutOfBounds` if `to > len()`
    pub fn remove_range(&self, from: usize, to: usize, on_done: Option<Completion>) -> Result<()> {
        if from > to {
            return Err(ConcatError::InvalidRange { from, to });
        }
        let inline = {
            let mut state = self.lock();
            let size = state.entries.len();
            if to > size {
                return Err(ConcatError::IndexOutOfBounds { index: to, size });
            }
            if from == to {
                on_done
            } else {
                state.entries.drain(from..to);
                state.forward(Command::Remove { from, to, on_done })
            }
        };
        run(inline);
        Ok(())
    }

    /// Move the entry at `from` so that it ends up at `to`
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if either index is `>= len()`
    pub fn move_source(&self, from: usize, to: usize, on_done: Option<Completion>) -> Result<()> {
        let inline = {
            let mut state = self.lock();
            let size = state.entries.len();
            if from >= size {
                return Err(ConcatError::IndexOutOfBounds { index: from, size });
            }
            if to >= size {
                return Err(ConcatError::IndexOutOfBounds { index: to, size });
            }
            if from == to {
                on_done
            } else {
                let source = state.entries.remove(from);
                state.entries.insert(to, source);
                state.forward(Command::Move { from, to, on_done })
            }
        };
        run(inline);
        Ok(())
    }

    /// Replace the shuffle order
    ///
    /// While attached, an order whose length differs from the playlist is
    /// replaced by a fresh order of the right length. While detached the order
    /// is kept cleared and grown to full length on the next attach.
    pub fn set_shuffle_order(&self, order: ShuffleOrder, on_done: Option<Completion>) {
        let inline = {
            let mut state = self.lock();
            if state.sender.is_some() {
                let order = order.normalized(state.entries.len());
                state.forward(Command::SetShuffleOrder { order, on_done })
            } else {
                state.shuffle_order = order.clone_and_clear();
                on_done
            }
        };
        run(inline);
    }

    /// Remove every entry
    pub fn clear(&self, on_done: Option<Completion>) {
        let inline = {
            let mut state = self.lock();
            let to = state.entries.len();
            if to == 0 {
                on_done
            } else {
                state.entries.clear();
                state.forward(Command::Remove { from: 0, to, on_done })
            }
        };
        run(inline);
    }

    /// Number of entries, including edits the engine has not applied yet
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Source at `index`
    pub fn get(&self, index: usize) -> Option<Arc<dyn MediaSource>> {
        self.lock().entries.get(index).cloned()
    }

    /// Whether an engine currently receives this playlist's edits
    pub fn is_attached(&self) -> bool {
        self.lock().sender.is_some()
    }

    /// Start forwarding edits to `sender`
    ///
    /// Returns the current entries and the stored shuffle order.
    pub(crate) fn attach(
        &self,
        sender: CommandSender,
    ) -> Result<(Vec<Arc<dyn MediaSource>>, ShuffleOrder)> {
        let mut state = self.lock();
        if state.sender.is_some() {
            return Err(ConcatError::InvalidOperation(
                "playlist is already attached to an engine".to_string(),
            ));
        }
        state.sender = Some(sender);
        Ok((state.entries.clone(), state.shuffle_order.clone()))
    }

    /// Stop forwarding edits and keep `shuffle_order` (cleared) for later
    pub(crate) fn detach(&self, shuffle_order: &ShuffleOrder) {
        let mut state = self.lock();
        state.sender = None;
        state.shuffle_order = shuffle_order.clone_and_clear();
    }
}

impl MirrorState {
    /// Send `command` to the attached engine
    ///
    /// Returns the completion to run inline when nothing will run it later.
    fn forward(&mut self, command: Command) -> Option<Completion> {
        let Some(sender) = self.sender.as_ref() else {
            return command.into_completion();
        };
        match sender.send(command) {
            Ok(()) => None,
            Err(command) => {
                debug!(command = command.name(), "Engine gone, completing edit inline");
                self.sender = None;
                command.into_completion()
            }
        }
    }
}

fn run(completion: Option<Completion>) {
    if let Some(completion) = completion {
        completion();
    }
}

impl fmt::Debug for PlaylistMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("PlaylistMirror")
            .field("len", &state.entries.len())
            .field("attached", &state.sender.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandQueue;
    use crate::source::fake::FakeSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn source() -> Arc<dyn MediaSource> {
        FakeSource::new()
    }

    fn counter() -> (Arc<AtomicUsize>, Option<Completion>) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&count);
        let completion: Completion = Box::new(move || {
            clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, Some(completion))
    }

    fn attached() -> (PlaylistMirror, CommandQueue) {
        let mirror = PlaylistMirror::new();
        let queue = CommandQueue::new();
        mirror.attach(queue.sender()).unwrap();
        (mirror, queue)
    }

    #[test]
    fn detached_edits_complete_inline() {
        let mirror = PlaylistMirror::new();
        let (count, on_done) = counter();

        mirror.insert(0, source(), on_done).unwrap();

        assert_eq!(mirror.len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn insert_past_end_is_rejected() {
        let mirror = PlaylistMirror::new();

        let error = mirror.insert(1, source(), None).unwrap_err();

        assert!(matches!(
            error,
            ConcatError::IndexOutOfBounds { index: 1, size: 0 }
        ));
        assert!(mirror.is_empty());
    }

    #[test]
    fn insert_all_keeps_order() {
        let mirror = PlaylistMirror::new();
        let a = source();
        let b = source();
        let c = source();
        mirror.push(Arc::clone(&c), None);

        mirror
            .insert_all(0, vec![Arc::clone(&a), Arc::clone(&b)], None)
            .unwrap();

        assert!(Arc::ptr_eq(&mirror.get(0).unwrap(), &a));
        assert!(Arc::ptr_eq(&mirror.get(1).unwrap(), &b));
        assert!(Arc::ptr_eq(&mirror.get(2).unwrap(), &c));
        assert!(mirror.get(3).is_none());
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let mirror = PlaylistMirror::with_sources(vec![source(), source()]);

        assert!(matches!(
            mirror.remove_range(2, 1, None),
            Err(ConcatError::InvalidRange { from: 2, to: 1 })
        ));
        assert!(matches!(
            mirror.remove_range(0, 3, None),
            Err(ConcatError::IndexOutOfBounds { index: 3, size: 2 })
        ));
        assert!(matches!(
            mirror.remove(2, None),
            Err(ConcatError::IndexOutOfBounds { index: 2, size: 2 })
        ));
        assert!(matches!(
            mirror.move_source(0, 2, None),
            Err(ConcatError::IndexOutOfBounds { index: 2, size: 2 })
        ));
        assert_eq!(mirror.len(), 2);
    }

    #[test]
    fn attached_edit_sends_one_command() {
        let (mirror, queue) = attached();
        let (count, on_done) = counter();

        mirror.insert_all(0, vec![source(), source()], on_done).unwrap();

        assert_eq!(mirror.len(), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        match queue.try_next() {
            Some(Command::Add { index, holders, .. }) => {
                assert_eq!(index, 0);
                assert_eq!(holders.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn empty_edits_complete_inline_without_command() {
        let (mirror, queue) = attached();
        mirror.push(source(), None);
        queue.try_next();

        let (inserted, on_insert) = counter();
        mirror.insert_all(0, Vec::new(), on_insert).unwrap();
        let (removed, on_remove) = counter();
        mirror.remove_range(1, 1, on_remove).unwrap();
        let (moved, on_move) = counter();
        mirror.move_source(0, 0, on_move).unwrap();

        assert!(queue.is_empty());
        assert_eq!(inserted.load(Ordering::SeqCst), 1);
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert_eq!(moved.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn move_updates_list_immediately() {
        let a = source();
        let b = source();
        let mirror = PlaylistMirror::with_sources(vec![Arc::clone(&a), Arc::clone(&b)]);

        mirror.move_source(0, 1, None).unwrap();

        assert!(Arc::ptr_eq(&mirror.get(0).unwrap(), &b));
        assert!(Arc::ptr_eq(&mirror.get(1).unwrap(), &a));
    }

    #[test]
    fn dropped_engine_completes_inline() {
        let (mirror, queue) = attached();
        drop(queue);
        let (count, on_done) = counter();

        mirror.push(source(), on_done);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!mirror.is_attached());
    }

    #[test]
    fn attached_shuffle_order_is_normalized() {
        let (mirror, queue) = attached();
        mirror.insert_all(0, vec![source(), source(), source()], None).unwrap();
        queue.try_next();

        mirror.set_shuffle_order(ShuffleOrder::with_seed(5, 1), None);

        match queue.try_next() {
            Some(Command::SetShuffleOrder { order, .. }) => assert_eq!(order.len(), 3),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn detached_shuffle_order_is_stored_cleared() {
        let mirror = PlaylistMirror::with_sources(vec![source(), source()]);
        let (count, on_done) = counter();

        mirror.set_shuffle_order(ShuffleOrder::unshuffled(2), on_done);

        let (_, order) = mirror.attach(CommandQueue::new().sender()).unwrap();
        assert!(order.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_attach_is_rejected() {
        let (mirror, _queue) = attached();

        let Err(error) = mirror.attach(CommandQueue::new().sender()) else {
            panic!("second attach succeeded");
        };

        assert!(matches!(error, ConcatError::InvalidOperation(_)));
        assert!(mirror.is_attached());
    }

    #[test]
    fn remove_forwards_single_entry_range() {
        let (mirror, queue) = attached();
        mirror.insert_all(0, vec![source(), source()], None).unwrap();
        queue.try_next();

        assert!(matches!(
            mirror.remove(5, None),
            Err(ConcatError::IndexOutOfBounds { index: 5, size: 2 })
        ));
        mirror.remove(1, None).unwrap();

        assert_eq!(mirror.len(), 1);
        assert!(matches!(
            queue.try_next(),
            Some(Command::Remove { from: 1, to: 2, .. })
        ));
        assert!(queue.try_next().is_none());
    }

    #[test]
    fn clear_sends_full_range() {
        let (mirror, queue) = attached();
        mirror.insert_all(0, vec![source(), source()], None).unwrap();
        queue.try_next();

        mirror.clear(None);

        assert!(mirror.is_empty());
        assert!(matches!(
            queue.try_next(),
            Some(Command::Remove { from: 0, to: 2, .. })
        ));
    }

    #[test]
    fn clones_share_the_list_across_threads() {
        let mirror = PlaylistMirror::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mirror = mirror.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        mirror.push(source(), None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(mirror.len(), 40);
    }
}
