use std::fmt;
use std::rc::{Rc, Weak};

use crate::mailbox::Registration;
use crate::splitting_mailbox::SplitQueues;
use crate::{
    CommunicationGroup, Direction, GroupedCountingQueue, Mailbox, MailboxConfig, MailboxError,
    MessageIndexer, MessageSelector, PosetAwareReceiver, Receiver, Result, Timestamp, Tuple,
};

/// A splitting mailbox that classifies updates by a partial order.
///
/// The receiver splits every tuple into a group key and an ordered value.
/// A pending deletion of `c` is monotone ("safe") as long as the monotone
/// queue holds an insertion `w` of the same group with `value(c) ≤ value(w)`:
/// the retraction is then paired with an insertion that dominates it.
/// Deletions without such a witness wait in the anti-monotone queue.
///
/// Classification is revisited on every update:
///
/// - a tuple newly inserted into the monotone queue pulls every pending
///   deletion it dominates over from the anti-monotone queue;
/// - deleting a monotone tuple sends back to the anti-monotone queue every
///   safe deletion of its group that no longer has a witness;
/// - a fresh deletion goes straight to the monotone queue if a witness is
///   already pending.
///
/// [`MessageSelector::Monotone`] delivers insertions and safe deletions with
/// `monotone = true`; [`MessageSelector::AntiMonotone`] delivers the remaining
/// deletions with `monotone = false`. Witnesses are only searched within a
/// group.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use rete_mailbox::prelude::*;
///
/// struct ByValue;
///
/// impl PosetComparator for ByValue {
///     fn is_less_or_equal(&self, left: &Tuple, right: &Tuple) -> bool {
///         left <= right
///     }
/// }
///
/// struct Levels {
///     core: TupleMask,
///     poset: TupleMask,
///     seen: RefCell<Vec<(Direction, Tuple, bool)>>,
/// }
///
/// impl Receiver for Levels {
///     fn update(&self, _direction: Direction, _tuple: &Tuple, _timestamp: Timestamp) {}
/// }
///
/// impl PosetAwareReceiver for Levels {
///     fn update_with_poset_info(&self, direction: Direction, tuple: &Tuple, monotone: bool) {
///         self.seen.borrow_mut().push((direction, tuple.clone(), monotone));
///     }
///     fn core_mask(&self) -> &TupleMask { &self.core }
///     fn poset_mask(&self) -> &TupleMask { &self.poset }
///     fn poset_comparator(&self) -> &dyn PosetComparator { &ByValue }
/// }
///
/// let receiver = Rc::new(Levels {
///     core: TupleMask::select_single(0, 2),
///     poset: TupleMask::select_single(1, 2),
///     seen: RefCell::new(Vec::new()),
/// });
/// let mailbox = PosetAwareMailbox::new(receiver.clone());
///
/// // (1, 5) is replaced by the larger (1, 7): the retraction is safe.
/// mailbox.post_message(Direction::Delete, &Tuple::from([1, 5]), Timestamp::ZERO);
/// mailbox.post_message(Direction::Insert, &Tuple::from([1, 7]), Timestamp::ZERO);
///
/// mailbox.deliver_all(MessageSelector::AntiMonotone).unwrap();
/// assert!(receiver.seen.borrow().is_empty());
///
/// mailbox.deliver_all(MessageSelector::Monotone).unwrap();
/// let mut seen = receiver.seen.take();
/// seen.sort();
/// assert_eq!(
///     seen,
///     vec![
///         (Direction::Insert, Tuple::from([1, 7]), true),
///         (Direction::Delete, Tuple::from([1, 5]), true),
///     ]
/// );
/// ```
pub struct PosetAwareMailbox<R: PosetAwareReceiver + 'static> {
    queues: SplitQueues<GroupedCountingQueue>,
    receiver: Rc<R>,
    registration: Registration,
}

impl<R: PosetAwareReceiver + 'static> PosetAwareMailbox<R> {
    /// Create a mailbox delivering to `receiver`, grouped by its core mask.
    pub fn new(receiver: Rc<R>) -> Rc<Self> {
        Self::with_config(receiver, MailboxConfig::default())
    }

    /// Create a mailbox with explicit settings.
    pub fn with_config(receiver: Rc<R>, config: MailboxConfig) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| {
            let adapter: Weak<dyn Mailbox> = me.clone();
            let queue = GroupedCountingQueue::new(receiver.core_mask().clone());
            Self {
                queues: SplitQueues::new(queue, config),
                receiver,
                registration: Registration::new(adapter),
            }
        })
    }

    /// Net count of `tuple` waiting in the monotone queue.
    #[must_use]
    pub fn monotone_count(&self, tuple: &Tuple) -> i64 {
        self.queues.monotone_count(tuple)
    }

    /// Net count of `tuple` waiting in the anti-monotone queue.
    #[must_use]
    pub fn anti_monotone_count(&self, tuple: &Tuple) -> i64 {
        self.queues.anti_monotone_count(tuple)
    }

    fn is_less_or_equal(&self, left: &Tuple, right: &Tuple) -> bool {
        let mask = self.receiver.poset_mask();
        self.receiver
            .poset_comparator()
            .is_less_or_equal(&mask.transform(left), &mask.transform(right))
    }

    /// Whether `monotone` holds an insertion of `tuple`'s group that dominates it.
    fn has_witness(&self, monotone: &GroupedCountingQueue, tuple: &Tuple) -> bool {
        let key = monotone.group_of(tuple);
        monotone
            .group(&key)
            .any(|(other, count)| count > 0 && self.is_less_or_equal(tuple, other))
    }

    /// Pending deletions in `anti_monotone` that `tuple` dominates.
    fn dominated_by(&self, anti_monotone: &GroupedCountingQueue, tuple: &Tuple) -> Vec<Tuple> {
        let key = anti_monotone.group_of(tuple);
        anti_monotone
            .group(&key)
            .filter(|(other, _)| self.is_less_or_equal(other, tuple))
            .map(|(other, _)| other.clone())
            .collect()
    }

    /// Safe deletions in `tuple`'s group that lost their last witness.
    fn orphaned(&self, monotone: &GroupedCountingQueue, tuple: &Tuple) -> Vec<Tuple> {
        let key = monotone.group_of(tuple);
        monotone
            .group(&key)
            .filter(|&(candidate, count)| count < 0 && !self.has_witness(monotone, candidate))
            .map(|(candidate, _)| candidate.clone())
            .collect()
    }

    fn deliver(&self, selector: MessageSelector) -> Result<()> {
        let (buffer, monotone) = match selector {
            MessageSelector::AntiMonotone => (&self.queues.anti_monotone, false),
            _ => (&self.queues.monotone, true),
        };
        let delivery = buffer.begin_delivery(selector)?;
        let batch = delivery.batch();
        tracing::trace!(%selector, entries = batch.len(), "delivering poset batch");
        for key in batch.groups() {
            for (tuple, count) in batch.group(key) {
                debug_assert!(count != 0, "zero count for {tuple}");
                debug_assert!(
                    monotone || count < 0,
                    "anti-monotone entry {tuple} has count {count}"
                );
                let direction = Direction::of_count(count);
                for _ in 0..count.unsigned_abs() {
                    self.receiver
                        .update_with_poset_info(direction, tuple, monotone);
                }
            }
        }
        Ok(())
    }
}

impl<R: PosetAwareReceiver + 'static> Mailbox for PosetAwareMailbox<R> {
    fn post_message(&self, direction: Direction, tuple: &Tuple, _timestamp: Timestamp) {
        let before = self.queues.emptiness();
        {
            let mut monotone = self.queues.monotone.active_mut();
            let mut anti_monotone = self.queues.anti_monotone.active_mut();
            let in_monotone = monotone.count(tuple) != 0;
            let in_anti_monotone = anti_monotone.count(tuple) != 0;
            debug_assert!(
                !(in_monotone && in_anti_monotone),
                "{tuple} is pending in both queues"
            );

            match direction {
                Direction::Insert if in_anti_monotone => anti_monotone.insert(tuple),
                Direction::Insert => {
                    monotone.insert(tuple);
                    if !in_monotone {
                        for pending in self.dominated_by(&anti_monotone, tuple) {
                            let count = anti_monotone.count(&pending);
                            debug_assert!(count < 0);
                            tracing::trace!(%pending, witness = %tuple, "deletion became monotone");
                            anti_monotone.update(&pending, -count);
                            monotone.update(&pending, count);
                        }
                    }
                }
                Direction::Delete if in_anti_monotone => anti_monotone.delete(tuple),
                Direction::Delete if in_monotone => {
                    monotone.delete(tuple);
                    for orphan in self.orphaned(&monotone, tuple) {
                        let count = monotone.count(&orphan);
                        debug_assert!(count < 0);
                        tracing::trace!(%orphan, "deletion lost its witness");
                        monotone.update(&orphan, -count);
                        anti_monotone.update(&orphan, count);
                    }
                }
                Direction::Delete => {
                    if self.has_witness(&monotone, tuple) {
                        monotone.delete(tuple);
                    } else {
                        anti_monotone.delete(tuple);
                    }
                }
            }
        }
        self.queues.report(&self.registration, before);
    }

    fn deliver_all(&self, selector: MessageSelector) -> Result<()> {
        match selector {
            MessageSelector::AntiMonotone | MessageSelector::Monotone => self.deliver(selector),
            _ => Err(MailboxError::UnsupportedSelector {
                mailbox: "PosetAwareMailbox",
                selector,
            }),
        }
    }

    fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    fn clear(&self) {
        self.queues.clear();
    }

    fn receiver(&self) -> Rc<dyn Receiver> {
        let receiver: Rc<dyn Receiver> = self.receiver.clone();
        receiver
    }

    fn current_group(&self) -> Option<Rc<dyn CommunicationGroup>> {
        self.registration.current_group()
    }

    fn set_current_group(&self, group: Rc<dyn CommunicationGroup>) {
        self.registration.set_current_group(group);
    }
}

impl<R: PosetAwareReceiver + 'static> fmt::Debug for PosetAwareMailbox<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PosetAwareMailbox")
            .field("queues", &self.queues)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, Notice, PosetReceiver, RecordingGroup};

    type Setup = (
        Rc<PosetReceiver>,
        Rc<PosetAwareMailbox<PosetReceiver>>,
        Rc<RecordingGroup>,
    );

    fn setup() -> Setup {
        let receiver = PosetReceiver::new();
        let mailbox = PosetAwareMailbox::new(receiver.clone());
        let group = RecordingGroup::new();
        mailbox.set_current_group(group.clone());
        (receiver, mailbox, group)
    }

    fn post(mailbox: &PosetAwareMailbox<PosetReceiver>, direction: Direction, t: [i64; 2]) {
        mailbox.post_message(direction, &Tuple::from(t), Timestamp::ZERO);
    }

    fn deliver(
        receiver: &PosetReceiver,
        mailbox: &PosetAwareMailbox<PosetReceiver>,
        selector: MessageSelector,
    ) -> Vec<Call> {
        mailbox.deliver_all(selector).unwrap();
        let mut calls = receiver.take();
        calls.sort();
        calls
    }

    fn poset(direction: Direction, t: [i64; 2], monotone: bool) -> Call {
        Call::Poset(direction, Tuple::from(t), monotone)
    }

    #[test]
    fn later_witness_makes_deletion_monotone() {
        let (receiver, mailbox, group) = setup();
        post(&mailbox, Direction::Delete, [1, 5]);
        assert_eq!(group.take(), vec![Notice::Has(MessageSelector::AntiMonotone)]);

        post(&mailbox, Direction::Insert, [1, 7]);
        assert_eq!(
            group.take(),
            vec![
                Notice::Lost(MessageSelector::AntiMonotone),
                Notice::Has(MessageSelector::Monotone),
            ]
        );

        assert!(deliver(&receiver, &mailbox, MessageSelector::AntiMonotone).is_empty());
        assert_eq!(
            deliver(&receiver, &mailbox, MessageSelector::Monotone),
            vec![
                poset(Direction::Insert, [1, 7], true),
                poset(Direction::Delete, [1, 5], true),
            ]
        );
    }

    #[test]
    fn existing_witness_justifies_fresh_deletion() {
        let (_receiver, mailbox, _group) = setup();
        post(&mailbox, Direction::Insert, [1, 7]);
        post(&mailbox, Direction::Delete, [1, 5]);
        assert_eq!(mailbox.monotone_count(&Tuple::from([1, 5])), -1);
        assert_eq!(mailbox.anti_monotone_count(&Tuple::from([1, 5])), 0);
    }

    #[test]
    fn smaller_insertion_is_no_witness() {
        let (receiver, mailbox, _group) = setup();
        post(&mailbox, Direction::Delete, [1, 9]);
        post(&mailbox, Direction::Insert, [1, 7]);

        assert_eq!(
            deliver(&receiver, &mailbox, MessageSelector::AntiMonotone),
            vec![poset(Direction::Delete, [1, 9], false)]
        );
        assert_eq!(
            deliver(&receiver, &mailbox, MessageSelector::Monotone),
            vec![poset(Direction::Insert, [1, 7], true)]
        );
    }

    #[test]
    fn witnesses_do_not_cross_groups() {
        let (_receiver, mailbox, _group) = setup();
        post(&mailbox, Direction::Delete, [1, 5]);
        post(&mailbox, Direction::Insert, [2, 7]);
        assert_eq!(mailbox.anti_monotone_count(&Tuple::from([1, 5])), -1);
        assert_eq!(mailbox.monotone_count(&Tuple::from([2, 7])), 1);
    }

    #[test]
    fn one_insertion_justifies_all_dominated_deletions() {
        let (_receiver, mailbox, _group) = setup();
        post(&mailbox, Direction::Delete, [1, 3]);
        post(&mailbox, Direction::Delete, [1, 4]);
        post(&mailbox, Direction::Delete, [1, 9]);
        post(&mailbox, Direction::Insert, [1, 5]);

        assert_eq!(mailbox.monotone_count(&Tuple::from([1, 3])), -1);
        assert_eq!(mailbox.monotone_count(&Tuple::from([1, 4])), -1);
        assert_eq!(mailbox.anti_monotone_count(&Tuple::from([1, 9])), -1);
    }

    #[test]
    fn removing_last_witness_demotes_deletions() {
        let (receiver, mailbox, _group) = setup();
        post(&mailbox, Direction::Insert, [1, 7]);
        post(&mailbox, Direction::Delete, [1, 5]);
        post(&mailbox, Direction::Delete, [1, 7]);

        assert_eq!(mailbox.monotone_count(&Tuple::from([1, 7])), 0);
        assert_eq!(mailbox.monotone_count(&Tuple::from([1, 5])), 0);
        assert_eq!(mailbox.anti_monotone_count(&Tuple::from([1, 5])), -1);

        assert_eq!(
            deliver(&receiver, &mailbox, MessageSelector::AntiMonotone),
            vec![poset(Direction::Delete, [1, 5], false)]
        );
    }

    #[test]
    fn remaining_witness_keeps_deletion_monotone() {
        let (_receiver, mailbox, _group) = setup();
        post(&mailbox, Direction::Insert, [1, 7]);
        post(&mailbox, Direction::Insert, [1, 8]);
        post(&mailbox, Direction::Delete, [1, 5]);
        post(&mailbox, Direction::Delete, [1, 7]);

        assert_eq!(mailbox.monotone_count(&Tuple::from([1, 5])), -1);
        assert_eq!(mailbox.anti_monotone_count(&Tuple::from([1, 5])), 0);
    }

    #[test]
    fn reinsert_cancels_safe_deletion() {
        let (_receiver, mailbox, _group) = setup();
        post(&mailbox, Direction::Insert, [1, 7]);
        post(&mailbox, Direction::Delete, [1, 5]);
        post(&mailbox, Direction::Insert, [1, 5]);
        assert_eq!(mailbox.monotone_count(&Tuple::from([1, 5])), 0);
        assert_eq!(mailbox.monotone_count(&Tuple::from([1, 7])), 1);
    }

    #[test]
    fn insert_then_delete_cancels() {
        let (receiver, mailbox, group) = setup();
        post(&mailbox, Direction::Insert, [1, 1]);
        post(&mailbox, Direction::Delete, [1, 1]);
        assert!(mailbox.is_empty());
        assert_eq!(
            group.take(),
            vec![
                Notice::Has(MessageSelector::Monotone),
                Notice::Lost(MessageSelector::Monotone),
            ]
        );
        assert!(deliver(&receiver, &mailbox, MessageSelector::Monotone).is_empty());
    }

    #[test]
    fn rejects_default_selector() {
        let (_receiver, mailbox, _group) = setup();
        assert!(mailbox
            .deliver_all(MessageSelector::Default)
            .unwrap_err()
            .is_unsupported_selector());
    }
}
