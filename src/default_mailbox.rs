use std::fmt;
use std::rc::{Rc, Weak};

use crate::buffer::DoubleBuffer;
use crate::mailbox::Registration;
use crate::{
    CommunicationGroup, CountingQueue, Direction, Mailbox, MailboxConfig, MailboxError,
    MessageIndexer, MessageSelector, Receiver, Result, Timestamp, Tuple,
};

/// The basic counting mailbox.
///
/// Opposite updates of the same tuple cancel each other while they wait, and
/// [`deliver_all`](Mailbox::deliver_all) hands the surviving net counts to the
/// receiver in a single [`Receiver::batch_update`] call. Only
/// [`MessageSelector::Default`] is served.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use rete_mailbox::prelude::*;
///
/// #[derive(Default)]
/// struct Sink(RefCell<Vec<(Tuple, i64)>>);
///
/// impl Receiver for Sink {
///     fn update(&self, _direction: Direction, _tuple: &Tuple, _timestamp: Timestamp) {}
///
///     fn batch_update(&self, batch: &CountingQueue, _timestamp: Timestamp) {
///         let mut sink = self.0.borrow_mut();
///         sink.extend(batch.iter().map(|(t, c)| (t.clone(), c)));
///     }
/// }
///
/// let sink = Rc::new(Sink::default());
/// let mailbox = DefaultMailbox::new(sink.clone());
///
/// let t = Tuple::from([1, 2]);
/// mailbox.post_message(Direction::Insert, &t, Timestamp::ZERO);
/// mailbox.post_message(Direction::Insert, &t, Timestamp::ZERO);
/// mailbox.post_message(Direction::Delete, &t, Timestamp::ZERO);
///
/// mailbox.deliver_all(MessageSelector::Default).unwrap();
/// assert_eq!(sink.0.borrow().as_slice(), &[(t, 1)]);
/// assert!(mailbox.is_empty());
/// ```
pub struct DefaultMailbox {
    queue: DoubleBuffer<CountingQueue>,
    receiver: Rc<dyn Receiver>,
    registration: Registration,
}

impl DefaultMailbox {
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

    /// Build a mailbox that reports under `adapter`'s identity and group.
    pub(crate) fn adapted(
        receiver: Rc<dyn Receiver>,
        config: MailboxConfig,
        adapter: Weak<dyn Mailbox>,
    ) -> Self {
        Self {
            queue: DoubleBuffer::new(CountingQueue::new(), config.recycle_threshold),
            receiver,
            registration: Registration::new(adapter),
        }
    }

    /// Net count currently pending for `tuple`.
    #[must_use]
    pub fn count(&self, tuple: &Tuple) -> i64 {
        self.queue.active().count(tuple)
    }

    /// Number of distinct tuples pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.active().len()
    }
}

impl Mailbox for DefaultMailbox {
    fn post_message(&self, direction: Direction, tuple: &Tuple, _timestamp: Timestamp) {
        let (was_empty, is_empty) = {
            let mut queue = self.queue.active_mut();
            let was_empty = queue.is_empty();
            queue.apply(direction, tuple);
            (was_empty, queue.is_empty())
        };
        self.registration
            .report(MessageSelector::Default, was_empty, is_empty);
    }

    fn deliver_all(&self, selector: MessageSelector) -> Result<()> {
        if selector != MessageSelector::Default {
            return Err(MailboxError::UnsupportedSelector {
                mailbox: "DefaultMailbox",
                selector,
            });
        }
        let delivery = self.queue.begin_delivery(selector)?;
        let batch = delivery.batch();
        tracing::trace!(entries = batch.len(), "delivering default batch");
        self.receiver.batch_update(&batch, Timestamp::ZERO);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.queue.active().is_empty()
    }

    fn clear(&self) {
        self.queue.clear();
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

impl fmt::Debug for DefaultMailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultMailbox")
            .field("queue", &self.queue)
            .field("delivering", &self.queue.is_delivering())
            .finish()
    }
}
