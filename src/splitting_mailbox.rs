use std::fmt;
use std::rc::{Rc, Weak};

use crate::buffer::DoubleBuffer;
use crate::mailbox::Registration;
use crate::{
    CommunicationGroup, CountingQueue, Direction, Mailbox, MailboxConfig, MailboxError,
    MessageIndexer, MessageSelector, Receiver, Result, Timestamp, Tuple,
};

/// The monotone and anti-monotone queues of a splitting mailbox.
///
/// Each queue is double buffered on its own, so the two channels can be
/// delivered at different times. A tuple has a non-zero count in at most one
/// of the two active queues.
pub(crate) struct SplitQueues<Q> {
    pub(crate) monotone: DoubleBuffer<Q>,
    pub(crate) anti_monotone: DoubleBuffer<Q>,
}

/// Emptiness of (anti-monotone, monotone) active queues.
pub(crate) type Emptiness = (bool, bool);

impl<Q: MessageIndexer> SplitQueues<Q> {
    pub(crate) fn new(queue: Q, config: MailboxConfig) -> Self {
        let other = queue.empty_like();
        Self {
            monotone: DoubleBuffer::new(queue, config.recycle_threshold),
            anti_monotone: DoubleBuffer::new(other, config.recycle_threshold),
        }
    }

    pub(crate) fn emptiness(&self) -> Emptiness {
        (
            self.anti_monotone.active().is_empty(),
            self.monotone.active().is_empty(),
        )
    }

    /// Report every channel whose emptiness differs from `before`.
    pub(crate) fn report(&self, registration: &Registration, before: Emptiness) {
        let (anti_after, mono_after) = self.emptiness();
        registration.report(MessageSelector::AntiMonotone, before.0, anti_after);
        registration.report(MessageSelector::Monotone, before.1, mono_after);
    }

    pub(crate) fn is_empty(&self) -> bool {
        let (anti, mono) = self.emptiness();
        anti && mono
    }

    pub(crate) fn clear(&self) {
        self.monotone.clear();
        self.anti_monotone.clear();
    }

    pub(crate) fn monotone_count(&self, tuple: &Tuple) -> i64 {
        self.monotone.active().count(tuple)
    }

    pub(crate) fn anti_monotone_count(&self, tuple: &Tuple) -> i64 {
        self.anti_monotone.active().count(tuple)
    }
}

impl<Q: fmt::Debug> fmt::Debug for SplitQueues<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitQueues")
            .field("monotone", &self.monotone)
            .field("anti_monotone", &self.anti_monotone)
            .finish()
    }
}

/// A mailbox that separates insertions from deletions.
///
/// Under the plain subset order, insertions are monotone and deletions are
/// anti-monotone. An update first cancels against the queue that already
/// holds its tuple; otherwise an insert goes to the monotone queue and a
/// delete to the anti-monotone queue.
/// [`MessageSelector::Monotone`] delivers one insert per unit of count,
/// [`MessageSelector::AntiMonotone`] one delete per unit of count.
pub struct UpdateSplittingMailbox {
    queues: SplitQueues<CountingQueue>,
    receiver: Rc<dyn Receiver>,
    registration: Registration,
}

impl UpdateSplittingMailbox {
    /// Create a mailbox delivering to `receiver`.
    pub fn new(receiver: Rc<dyn Receiver>) -> Rc<Self> {
        Self::with_config(receiver, MailboxConfig::default())
    }

    /// Create a mailbox with explicit settings.
    pub fn with_config(receiver: Rc<dyn Receiver>, config: MailboxConfig) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| {
            let adapter: Weak<dyn Mailbox> = me.clone();
            Self::adapted(receiver, config, adapter)
        })
    }

    pub(crate) fn adapted(
        receiver: Rc<dyn Receiver>,
        config: MailboxConfig,
        adapter: Weak<dyn Mailbox>,
    ) -> Self {
        Self {
            queues: SplitQueues::new(CountingQueue::new(), config),
            receiver,
            registration: Registration::new(adapter),
        }
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

    fn deliver(
        &self,
        selector: MessageSelector,
        buffer: &DoubleBuffer<CountingQueue>,
    ) -> Result<()> {
        let delivery = buffer.begin_delivery(selector)?;
        let batch = delivery.batch();
        tracing::trace!(%selector, entries = batch.len(), "delivering split batch");
        for (tuple, count) in batch.iter() {
            let direction = match selector {
                MessageSelector::AntiMonotone => {
                    debug_assert!(count < 0, "anti-monotone entry {tuple} has count {count}");
                    Direction::Delete
                }
                _ => {
                    debug_assert!(count > 0, "monotone entry {tuple} has count {count}");
                    Direction::Insert
                }
            };
            for _ in 0..count.unsigned_abs() {
                self.receiver.update(direction, tuple, Timestamp::ZERO);
            }
        }
        Ok(())
    }
}

impl Mailbox for UpdateSplittingMailbox {
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
                Direction::Insert => monotone.insert(tuple),
                Direction::Delete if in_monotone => monotone.delete(tuple),
                Direction::Delete => anti_monotone.delete(tuple),
            }
        }
        self.queues.report(&self.registration, before);
    }

    fn deliver_all(&self, selector: MessageSelector) -> Result<()> {
        match selector {
            MessageSelector::AntiMonotone => self.deliver(selector, &self.queues.anti_monotone),
            MessageSelector::Monotone => self.deliver(selector, &self.queues.monotone),
            _ => Err(MailboxError::UnsupportedSelector {
                mailbox: "UpdateSplittingMailbox",
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
        Rc::clone(&self.receiver)
    }

    fn current_group(&self) -> Option<Rc<dyn CommunicationGroup>> {
        self.registration.current_group()
    }

    fn set_current_group(&self, group: Rc<dyn CommunicationGroup>) {
        self.registration.set_current_group(group);
    }
}

impl fmt::Debug for UpdateSplittingMailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSplittingMailbox")
            .field("queues", &self.queues)
            .finish()
    }
}
