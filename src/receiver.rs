//! Capabilities a mailbox consumes from the network node it feeds.

use crate::{CountingQueue, Direction, Timestamp, Tuple, TupleMask};

/// A network node that consumes the updates collected by its mailbox.
///
/// Methods take `&self`: processing an update typically posts new updates
/// into other mailboxes, or back into this receiver's own mailbox, so
/// receivers keep their state behind interior mutability.
pub trait Receiver {
    /// Process a single update.
    fn update(&self, direction: Direction, tuple: &Tuple, timestamp: Timestamp);

    /// Process a coalesced batch of `(tuple, net count)` entries at once.
    ///
    /// The default implementation replays each entry as `|count|` calls to
    /// [`Receiver::update`].
    fn batch_update(&self, batch: &CountingQueue, timestamp: Timestamp) {
        for (tuple, count) in batch {
            let direction = Direction::of_count(count);
            for _ in 0..count.unsigned_abs() {
                self.update(direction, tuple, timestamp);
            }
        }
    }
}

/// A partial order over projected tuple values.
pub trait PosetComparator {
    /// Whether `left` ≤ `right` in the order.
    fn is_less_or_equal(&self, left: &Tuple, right: &Tuple) -> bool;
}

impl<F> PosetComparator for F
where
    F: Fn(&Tuple, &Tuple) -> bool,
{
    fn is_less_or_equal(&self, left: &Tuple, right: &Tuple) -> bool {
        self(left, right)
    }
}

/// A receiver whose tuples carry a partially ordered component.
///
/// Each tuple splits into a group key ([`core_mask`](Self::core_mask)) and an
/// ordered value ([`poset_mask`](Self::poset_mask)). Only tuples of the same
/// group are ever compared.
pub trait PosetAwareReceiver: Receiver {
    /// Process a single update, stating whether it respects the declared order.
    fn update_with_poset_info(&self, direction: Direction, tuple: &Tuple, monotone: bool);

    /// Projection to the group key.
    fn core_mask(&self) -> &TupleMask;

    /// Projection to the ordered value.
    fn poset_mask(&self) -> &TupleMask;

    /// The order over projected values.
    fn poset_comparator(&self) -> &dyn PosetComparator;
}
