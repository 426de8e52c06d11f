//! Shuffle orders for playlist traversal
//!
//! A shuffle order is an immutable permutation of `0..len`. Structural changes
//! to the playlist produce a new order through the `clone_and_*` methods; an
//! existing order is never modified.

use crate::error::{ConcatError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng, SeedableRng};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShuffleKind {
    /// Fisher-Yates shuffle, new entries land at random positions
    Random,

    /// Identity permutation
    Unshuffled,
}

/// Immutable permutation over playlist entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleOrder {
    kind: ShuffleKind,

    /// Entry indices in playback order
    shuffled: Arc<[usize]>,

    /// Position of each entry index inside `shuffled`
    index_in_shuffled: Arc<[usize]>,

    /// Seed for the next derived order
    seed: u64,
}

impl ShuffleOrder {
    /// Random order of `len` entries
    pub fn new(len: usize) -> Self {
        Self::with_seed(len, thread_rng().gen())
    }

    /// Random order of `len` entries, reproducible from `seed`
    pub fn with_seed(len: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut shuffled: Vec<usize> = (0..len).collect();
        shuffled.shuffle(&mut rng);
        Self::build(ShuffleKind::Random, shuffled, rng.gen())
    }

    /// Identity order: shuffled traversal equals list order
    pub fn unshuffled(len: usize) -> Self {
        Self::build(ShuffleKind::Unshuffled, (0..len).collect(), 0)
    }

    /// Order from an explicit permutation
    pub fn from_shuffled(shuffled: Vec<usize>, seed: u64) -> Result<Self> {
        let mut seen = vec![false; shuffled.len()];
        for &index in &shuffled {
            match seen.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(ConcatError::InvalidShuffleOrder(format!(
                        "index {} appears twice",
                        index
                    )))
                }
                None => {
                    return Err(ConcatError::InvalidShuffleOrder(format!(
                        "index {} outside 0..{}",
                        index,
                        shuffled.len()
                    )))
                }
            }
        }
        Ok(Self::build(ShuffleKind::Random, shuffled, seed))
    }

    fn build(kind: ShuffleKind, shuffled: Vec<usize>, seed: u64) -> Self {
        let mut index_in_shuffled = vec![0; shuffled.len()];
        for (position, &index) in shuffled.iter().enumerate() {
            index_in_shuffled[index] = position;
        }
        Self {
            kind,
            shuffled: shuffled.into(),
            index_in_shuffled: index_in_shuffled.into(),
            seed,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.shuffled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shuffled.is_empty()
    }

    /// Entry indices in playback order
    pub fn as_slice(&self) -> &[usize] {
        &self.shuffled
    }

    /// Entry played after `index`
    pub fn next_index(&self, index: usize) -> Option<usize> {
        let position = *self.index_in_shuffled.get(index)?;
        self.shuffled.get(position + 1).copied()
    }

    /// Entry played before `index`
    pub fn previous_index(&self, index: usize) -> Option<usize> {
        let position = *self.index_in_shuffled.get(index)?;
        position
            .checked_sub(1)
            .and_then(|previous| self.shuffled.get(previous).copied())
    }

    /// First entry in playback order
    pub fn first_index(&self) -> Option<usize> {
        self.shuffled.first().copied()
    }

    /// Last entry in playback order
    pub fn last_index(&self) -> Option<usize> {
        self.shuffled.last().copied()
    }

    /// New order with `count` entries inserted at list position `insertion_index`
    ///
    /// Existing entries at or after `insertion_index` are renumbered. New
    /// entries are placed at random positions (identity for unshuffled orders).
    pub fn clone_and_insert(&self, insertion_index: usize, count: usize) -> Self {
        if self.kind == ShuffleKind::Unshuffled {
            return Self::unshuffled(self.len() + count);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let len = self.len();

        let mut insertion_points: Vec<usize> =
            (0..count).map(|_| rng.gen_range(0..=len)).collect();
        insertion_points.sort_unstable();

        let mut insertion_values: Vec<usize> = (insertion_index..insertion_index + count).collect();
        insertion_values.shuffle(&mut rng);

        let mut shuffled = Vec::with_capacity(len + count);
        let mut old_position = 0;
        let mut inserted = 0;
        while shuffled.len() < len + count {
            if inserted < count && insertion_points[inserted] == old_position {
                shuffled.push(insertion_values[inserted]);
                inserted += 1;
            } else {
                let index = self.shuffled[old_position];
                old_position += 1;
                shuffled.push(if index >= insertion_index {
                    index + count
                } else {
                    index
                });
            }
        }

        Self::build(ShuffleKind::Random, shuffled, rng.gen())
    }

    /// New order without the entry at list position `index`
    ///
    /// Entries after `index` are renumbered. Out-of-range indices return an
    /// unchanged copy.
    pub fn clone_and_remove(&self, index: usize) -> Self {
        if index >= self.len() {
            return self.clone();
        }
        if self.kind == ShuffleKind::Unshuffled {
            return Self::unshuffled(self.len() - 1);
        }

        let shuffled = self
            .shuffled
            .iter()
            .filter(|&&entry| entry != index)
            .map(|&entry| if entry > index { entry - 1 } else { entry })
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        Self::build(ShuffleKind::Random, shuffled, rng.gen())
    }

    /// New empty order of the same kind
    pub fn clone_and_clear(&self) -> Self {
        match self.kind {
            ShuffleKind::Unshuffled => Self::unshuffled(0),
            ShuffleKind::Random => {
                let mut rng = StdRng::seed_from_u64(self.seed);
                Self::build(ShuffleKind::Random, Vec::new(), rng.gen())
            }
        }
    }

    /// Same kind of order resized to `len`, dropping the current permutation
    ///
    /// Used to bring an order of the wrong length in line with the playlist.
    pub fn normalized(&self, len: usize) -> Self {
        if self.len() == len {
            self.clone()
        } else {
            self.clone_and_clear().clone_and_insert(0, len)
        }
    }
}

impl Default for ShuffleOrder {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_permutation(order: &ShuffleOrder) {
        let seen: HashSet<usize> = order.as_slice().iter().copied().collect();
        assert_eq!(seen.len(), order.len(), "duplicate entries: {:?}", order);
        assert!(
            order.as_slice().iter().all(|&index| index < order.len()),
            "entry out of range: {:?}",
            order
        );
    }

    fn traversal(order: &ShuffleOrder) -> Vec<usize> {
        let mut visited = Vec::new();
        let mut current = order.first_index();
        while let Some(index) = current {
            visited.push(index);
            current = order.next_index(index);
        }
        visited
    }

    #[test]
    fn seeded_order_is_reproducible() {
        let a = ShuffleOrder::with_seed(20, 42);
        let b = ShuffleOrder::with_seed(20, 42);
        assert_eq!(a, b);
        assert_permutation(&a);
    }

    #[test]
    fn random_shuffle_changes_order() {
        let order = ShuffleOrder::with_seed(50, 7);
        let identity: Vec<usize> = (0..50).collect();

        // 1 in 50! chance of matching identity
        assert_ne!(order.as_slice(), identity.as_slice());
    }

    #[test]
    fn traversal_visits_every_entry_once() {
        let order = ShuffleOrder::with_seed(10, 3);
        let visited = traversal(&order);

        assert_eq!(visited, order.as_slice());
        assert_eq!(order.last_index(), visited.last().copied());
    }

    #[test]
    fn previous_index_walks_backwards() {
        let order = ShuffleOrder::with_seed(6, 11);
        let slice = order.as_slice();

        assert_eq!(order.previous_index(slice[0]), None);
        for window in slice.windows(2) {
            assert_eq!(order.previous_index(window[1]), Some(window[0]));
        }
    }

    #[test]
    fn insert_renumbers_and_keeps_relative_order() {
        let order = ShuffleOrder::from_shuffled(vec![2, 0, 1], 5).unwrap();
        let inserted = order.clone_and_insert(1, 2);

        assert_eq!(inserted.len(), 5);
        assert_permutation(&inserted);

        // Old entries keep their relative order: 2->4, 0->0, 1->3
        let old: Vec<usize> = inserted
            .as_slice()
            .iter()
            .copied()
            .filter(|&index| index != 1 && index != 2)
            .collect();
        assert_eq!(old, vec![4, 0, 3]);
    }

    #[test]
    fn insert_into_empty_order() {
        let order = ShuffleOrder::with_seed(0, 9).clone_and_insert(0, 8);
        assert_eq!(order.len(), 8);
        assert_permutation(&order);
    }

    #[test]
    fn remove_renumbers_following_entries() {
        let order = ShuffleOrder::from_shuffled(vec![3, 1, 0, 2], 1).unwrap();
        let removed = order.clone_and_remove(1);

        assert_eq!(removed.as_slice(), &[2, 0, 1]);
        assert_permutation(&removed);
    }

    #[test]
    fn remove_out_of_range_is_unchanged() {
        let order = ShuffleOrder::with_seed(3, 1);
        assert_eq!(order.clone_and_remove(3).as_slice(), order.as_slice());
    }

    #[test]
    fn clear_produces_empty_order() {
        let order = ShuffleOrder::with_seed(5, 1).clone_and_clear();
        assert!(order.is_empty());
        assert_eq!(order.first_index(), None);
    }

    #[test]
    fn unshuffled_stays_identity() {
        let order = ShuffleOrder::unshuffled(3)
            .clone_and_insert(1, 2)
            .clone_and_remove(0);

        assert_eq!(order.as_slice(), &[0, 1, 2, 3]);
    }

    #[test]
    fn normalized_matches_requested_length() {
        let order = ShuffleOrder::with_seed(2, 1);

        let grown = order.normalized(5);
        assert_eq!(grown.len(), 5);
        assert_permutation(&grown);

        assert_eq!(order.normalized(2), order);
    }

    #[test]
    fn from_shuffled_rejects_duplicates() {
        let result = ShuffleOrder::from_shuffled(vec![0, 0, 1], 0);
        assert!(matches!(result, Err(ConcatError::InvalidShuffleOrder(_))));
    }

    #[test]
    fn from_shuffled_rejects_out_of_range() {
        let result = ShuffleOrder::from_shuffled(vec![0, 3, 1], 0);
        assert!(matches!(result, Err(ConcatError::InvalidShuffleOrder(_))));
    }
}
