use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::mailbox::Registration;
use crate::{
    CommunicationGroup, CountingQueue, Direction, Mailbox, MailboxConfig, MailboxError,
    MessageIndexer, MessageSelector, Receiver, Result, Timestamp, Tuple,
};

/// A counting mailbox with one queue per timestamp.
///
/// Each timestamp is its own channel, [`MessageSelector::At`]. The group is
/// told when a timestamp gets its first pending update and when its last
/// update cancels out. Delivering a timestamp takes its whole queue out of
/// the mailbox first, so updates posted at that timestamp while the receiver
/// works on the batch wait for the next delivery.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use rete_mailbox::prelude::*;
///
/// #[derive(Default)]
/// struct Sink(RefCell<Vec<(Tuple, i64, Timestamp)>>);
///
/// impl Receiver for Sink {
///     fn update(&self, _direction: Direction, _tuple: &Tuple, _timestamp: Timestamp) {}
///
///     fn batch_update(&self, batch: &CountingQueue, timestamp: Timestamp) {
///         let mut sink = self.0.borrow_mut();
///         sink.extend(batch.iter().map(|(t, c)| (t.clone(), c, timestamp)));
///     }
/// }
///
/// let sink = Rc::new(Sink::default());
/// let mailbox = TimelyMailbox::new(sink.clone());
/// mailbox.post_message(Direction::Insert, &Tuple::from([1]), Timestamp(3));
/// mailbox.post_message(Direction::Insert, &Tuple::from([2]), Timestamp(5));
/// assert_eq!(mailbox.timestamps(), vec![Timestamp(3), Timestamp(5)]);
///
/// mailbox.deliver_all(MessageSelector::At(Timestamp(3))).unwrap();
/// assert_eq!(sink.0.borrow().as_slice(), &[(Tuple::from([1]), 1, Timestamp(3))]);
/// assert_eq!(mailbox.timestamps(), vec![Timestamp(5)]);
/// ```
pub struct TimelyMailbox {
    queues: RefCell<BTreeMap<Timestamp, CountingQueue>>,
    receiver: Rc<dyn Receiver>,
    registration: Registration,
}

impl TimelyMailbox {
    /// Create a mailbox delivering to `receiver`.
    pub fn new(receiver: Rc<dyn Receiver>) -> Rc<Self> {
        Self::with_config(receiver, MailboxConfig::default())
    }

    /// Create a mailbox with explicit settings.
    ///
    /// Delivered queues are handed over whole, so there is nothing to
    /// recycle; the setting is accepted for uniformity.
    pub fn with_config(receiver: Rc<dyn Receiver>, _config: MailboxConfig) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| {
            let adapter: Weak<dyn Mailbox> = me.clone();
            Self {
                queues: RefCell::new(BTreeMap::new()),
                receiver,
                registration: Registration::new(adapter),
            }
        })
    }

    /// Timestamps with pending updates, in ascending order.
    #[must_use]
    pub fn timestamps(&self) -> Vec<Timestamp> {
        self.queues.borrow().keys().copied().collect()
    }

    /// Net count of `tuple` pending at `timestamp`.
    #[must_use]
    pub fn count(&self, tuple: &Tuple, timestamp: Timestamp) -> i64 {
        self.queues
            .borrow()
            .get(&timestamp)
            .map_or(0, |queue| queue.count(tuple))
    }
}

impl Mailbox for TimelyMailbox {
    fn post_message(&self, direction: Direction, tuple: &Tuple, timestamp: Timestamp) {
        let (was_empty, is_empty) = {
            let mut queues = self.queues.borrow_mut();
            let queue = queues.entry(timestamp).or_default();
            let was_empty = queue.is_empty();
            queue.apply(direction, tuple);
            let is_empty = queue.is_empty();
            if is_empty {
                queues.remove(&timestamp);
            }
            (was_empty, is_empty)
        };
        self.registration
            .report(MessageSelector::At(timestamp), was_empty, is_empty);
    }

    fn deliver_all(&self, selector: MessageSelector) -> Result<()> {
        let MessageSelector::At(timestamp) = selector else {
            return Err(MailboxError::UnsupportedSelector {
                mailbox: "TimelyMailbox",
                selector,
            });
        };
        let batch = self.queues.borrow_mut().remove(&timestamp);
        if let Some(batch) = batch {
            tracing::trace!(%timestamp, entries = batch.len(), "delivering timely batch");
            self.receiver.batch_update(&batch, timestamp);
        }
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.queues.borrow().is_empty()
    }

    fn clear(&self) {
        self.queues.borrow_mut().clear();
    }

    fn receiver(&self) -> Rc<dyn Receiver> {
        Rc::clone(&self.receiver)
    }

    fn current_group(&self) -> Option<Rc<dyn CommunicationGroup>> {
        self.registration.current_group()
    }

    fn set_current_group(&self, group: Rc<dyn CommunicationGroup>) {
        self.registration.set_current_group(group);
    }
}

impl fmt::Debug for TimelyMailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.queues.try_borrow() {
            Ok(queues) => f.debug_map().entries(queues.iter()).finish(),
            Err(_) => f.write_str("TimelyMailbox(<busy>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, Notice, RecordingGroup, RecordingReceiver};

    fn setup() -> (Rc<RecordingReceiver>, Rc<TimelyMailbox>, Rc<RecordingGroup>) {
        let receiver = RecordingReceiver::new();
        let mailbox = TimelyMailbox::new(receiver.clone());
        let group = RecordingGroup::new();
        mailbox.set_current_group(group.clone());
        (receiver, mailbox, group)
    }

    #[test]
    fn each_timestamp_is_its_own_channel() {
        let (_receiver, mailbox, group) = setup();
        let t = Tuple::from([1]);
        mailbox.post_message(Direction::Insert, &t, Timestamp(1));
        mailbox.post_message(Direction::Insert, &t, Timestamp(1));
        mailbox.post_message(Direction::Insert, &t, Timestamp(2));

        assert_eq!(
            group.take(),
            vec![
                Notice::Has(MessageSelector::At(Timestamp(1))),
                Notice::Has(MessageSelector::At(Timestamp(2))),
            ]
        );
        assert_eq!(mailbox.count(&t, Timestamp(1)), 2);
        assert_eq!(mailbox.count(&t, Timestamp(2)), 1);
    }

    #[test]
    fn cancelled_timestamp_is_dropped() {
        let (_receiver, mailbox, group) = setup();
        let t = Tuple::from([1]);
        mailbox.post_message(Direction::Insert, &t, Timestamp(4));
        mailbox.post_message(Direction::Delete, &t, Timestamp(4));

        assert!(mailbox.is_empty());
        assert!(mailbox.timestamps().is_empty());
        assert_eq!(
            group.take(),
            vec![
                Notice::Has(MessageSelector::At(Timestamp(4))),
                Notice::Lost(MessageSelector::At(Timestamp(4))),
            ]
        );
    }

    #[test]
    fn delivers_batch_with_its_timestamp() {
        let (receiver, mailbox, _group) = setup();
        mailbox.post_message(Direction::Delete, &Tuple::from([9]), Timestamp(2));
        mailbox.post_message(Direction::Insert, &Tuple::from([8]), Timestamp(3));

        mailbox.deliver_all(MessageSelector::At(Timestamp(2))).unwrap();
        assert_eq!(receiver.take(), vec![Call::Batch(vec![(Tuple::from([9]), -1)])]);
        assert_eq!(mailbox.timestamps(), vec![Timestamp(3)]);
    }

    #[test]
    fn absent_timestamp_delivers_nothing() {
        let (receiver, mailbox, _group) = setup();
        mailbox.deliver_all(MessageSelector::At(Timestamp(7))).unwrap();
        assert!(receiver.take().is_empty());
    }

    #[test]
    fn reentrant_posts_start_a_fresh_queue() {
        let (receiver, mailbox, group) = setup();
        let target = Rc::downgrade(&mailbox);
        receiver.on_delivery(move |tuple| {
            if let Some(mailbox) = target.upgrade() {
                if mailbox.count(tuple, Timestamp(1)) == 0 {
                    mailbox.post_message(Direction::Insert, tuple, Timestamp(1));
                }
            }
        });

        mailbox.post_message(Direction::Insert, &Tuple::from([1]), Timestamp(1));
        group.take();
        mailbox.deliver_all(MessageSelector::At(Timestamp(1))).unwrap();

        assert_eq!(receiver.take(), vec![Call::Batch(vec![(Tuple::from([1]), 1)])]);
        assert_eq!(mailbox.count(&Tuple::from([1]), Timestamp(1)), 1);
        assert_eq!(
            group.take(),
            vec![Notice::Has(MessageSelector::At(Timestamp(1)))]
        );
    }

    #[test]
    fn rejects_phased_selectors() {
        let (_receiver, mailbox, _group) = setup();
        for selector in [
            MessageSelector::Default,
            MessageSelector::Monotone,
            MessageSelector::AntiMonotone,
        ] {
            assert!(mailbox.deliver_all(selector).unwrap_err().is_unsupported_selector());
        }
    }

    #[test]
    fn clear_drops_every_timestamp() {
        let (receiver, mailbox, _group) = setup();
        mailbox.post_message(Direction::Insert, &Tuple::from([1]), Timestamp(1));
        mailbox.post_message(Direction::Insert, &Tuple::from([1]), Timestamp(2));
        mailbox.clear();
        assert!(mailbox.is_empty());
        mailbox.deliver_all(MessageSelector::At(Timestamp(1))).unwrap();
        assert!(receiver.take().is_empty());
    }
}
