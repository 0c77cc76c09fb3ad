//! Counting storage for pending messages.
//!
//! A message indexer maps each tuple to its signed net count: an insert adds
//! one, a delete subtracts one, and a tuple whose count returns to zero is
//! forgotten. Opposite updates of the same tuple therefore cancel exactly.

use std::collections::hash_map::{self, Entry};
use std::collections::HashMap;
use std::fmt;

use crate::{Direction, Tuple, TupleMask};

/// Signed counting storage used by the mailboxes.
///
/// Invariant: a tuple is present iff its net count is non-zero.
pub trait MessageIndexer {
    /// Net count of `tuple`, zero if absent.
    fn count(&self, tuple: &Tuple) -> i64;

    /// Add `delta` to the net count of `tuple`, removing it at zero.
    fn update(&mut self, tuple: &Tuple, delta: i64);

    /// Number of tuples with a non-zero count.
    fn len(&self) -> usize;

    /// Forget every tuple.
    fn clear(&mut self);

    /// A new, empty indexer configured like this one.
    fn empty_like(&self) -> Self
    where
        Self: Sized;

    /// Whether no tuple has a non-zero count.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record one insertion of `tuple`.
    fn insert(&mut self, tuple: &Tuple) {
        self.update(tuple, 1);
    }

    /// Record one deletion of `tuple`.
    fn delete(&mut self, tuple: &Tuple) {
        self.update(tuple, -1);
    }

    /// Record one update of `tuple` in `direction`.
    fn apply(&mut self, direction: Direction, tuple: &Tuple) {
        self.update(tuple, direction.delta());
    }
}

/// Adds `delta` to `tuple` in a plain count map.
fn update_counts(counts: &mut HashMap<Tuple, i64>, tuple: &Tuple, delta: i64) {
    if delta == 0 {
        return;
    }
    match counts.entry(tuple.clone()) {
        Entry::Occupied(mut slot) => {
            let count = slot.get_mut();
            *count += delta;
            if *count == 0 {
                slot.remove();
            }
        }
        Entry::Vacant(slot) => {
            slot.insert(delta);
        }
    }
}

/// A flat tuple → net count map.
///
/// This is also what receivers see as a delivered batch.
///
/// # Example
///
/// ```
/// use rete_mailbox::prelude::*;
///
/// let mut queue = CountingQueue::new();
/// let t = Tuple::from([1, 2]);
/// queue.insert(&t);
/// queue.insert(&t);
/// queue.delete(&t);
/// assert_eq!(queue.count(&t), 1);
///
/// queue.delete(&t);
/// assert!(queue.is_empty());
/// ```
#[derive(Default, Clone, PartialEq, Eq)]
pub struct CountingQueue {
    counts: HashMap<Tuple, i64>,
}

impl CountingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over `(tuple, net count)` pairs in unspecified order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.counts.iter(),
        }
    }
}

impl MessageIndexer for CountingQueue {
    fn count(&self, tuple: &Tuple) -> i64 {
        self.counts.get(tuple).copied().unwrap_or(0)
    }

    fn update(&mut self, tuple: &Tuple, delta: i64) {
        update_counts(&mut self.counts, tuple, delta);
    }

    fn len(&self) -> usize {
        self.counts.len()
    }

    fn clear(&mut self) {
        self.counts.clear();
    }

    fn empty_like(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for CountingQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.counts.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a CountingQueue {
    type Item = (&'a Tuple, i64);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`CountingQueue`].
pub struct Iter<'a> {
    inner: hash_map::Iter<'a, Tuple, i64>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Tuple, i64);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(tuple, &count)| (tuple, count))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A counting map partitioned by a group projection.
///
/// Tuples whose projection through the group mask is equal land in the same
/// group, which makes "all pending updates of this group" a direct lookup.
#[derive(Clone)]
pub struct GroupedCountingQueue {
    mask: TupleMask,
    groups: HashMap<Tuple, HashMap<Tuple, i64>>,
    len: usize,
}

impl GroupedCountingQueue {
    /// Create an empty queue grouping tuples by `mask`.
    pub fn new(mask: TupleMask) -> Self {
        Self {
            mask,
            groups: HashMap::new(),
            len: 0,
        }
    }

    /// The group projection.
    #[must_use]
    pub fn mask(&self) -> &TupleMask {
        &self.mask
    }

    /// Group key of `tuple`.
    #[must_use]
    pub fn group_of(&self, tuple: &Tuple) -> Tuple {
        self.mask.transform(tuple)
    }

    /// Iterate over the keys of the non-empty groups.
    pub fn groups(&self) -> impl Iterator<Item = &Tuple> {
        self.groups.keys()
    }

    /// Iterate over `(tuple, net count)` pairs of the group `key`.
    pub fn group(&self, key: &Tuple) -> impl Iterator<Item = (&Tuple, i64)> {
        self.groups
            .get(key)
            .into_iter()
            .flat_map(|members| members.iter().map(|(tuple, &count)| (tuple, count)))
    }

    /// Iterate over every `(tuple, net count)` pair, group by group.
    pub fn iter(&self) -> impl Iterator<Item = (&Tuple, i64)> {
        self.groups
            .values()
            .flat_map(|members| members.iter().map(|(tuple, &count)| (tuple, count)))
    }
}

impl MessageIndexer for GroupedCountingQueue {
    fn count(&self, tuple: &Tuple) -> i64 {
        let key = self.group_of(tuple);
        self.groups
            .get(&key)
            .and_then(|members| members.get(tuple))
            .copied()
            .unwrap_or(0)
    }

    fn update(&mut self, tuple: &Tuple, delta: i64) {
        if delta == 0 {
            return;
        }
        let key = self.group_of(tuple);
        let members = self.groups.entry(key.clone()).or_default();
        let before = members.len();
        update_counts(members, tuple, delta);
        let after = members.len();
        if members.is_empty() {
            self.groups.remove(&key);
        }
        self.len = self.len + after - before;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.groups.clear();
        self.len = 0;
    }

    fn empty_like(&self) -> Self {
        Self::new(self.mask.clone())
    }
}

impl fmt::Debug for GroupedCountingQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.groups.iter()).finish()
    }
}
