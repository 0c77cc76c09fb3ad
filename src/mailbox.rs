use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::{CommunicationGroup, Direction, MessageSelector, Receiver, Result, Timestamp, Tuple};

/// Collects the updates addressed to one receiver and hands them over in
/// batches when the scheduler asks for them.
///
/// All methods take `&self`: a receiver processing a delivered batch may
/// post new messages into the very mailbox that is delivering to it. Such
/// posts are deferred to the next delivery round, never lost, never
/// delivered twice and never visible to the batch being processed.
///
/// Mailboxes are single-threaded (`!Send`); each network partition owns its
/// own set.
pub trait Mailbox {
    /// Record an update for the receiver.
    ///
    /// Notifies the current [`CommunicationGroup`] when a delivery channel
    /// goes from empty to non-empty or back, and only then.
    fn post_message(&self, direction: Direction, tuple: &Tuple, timestamp: Timestamp);

    /// Deliver everything pending on the channel `selector` to the receiver.
    ///
    /// # Errors
    ///
    /// - [`MailboxError::UnsupportedSelector`](crate::MailboxError::UnsupportedSelector)
    ///   if this kind of mailbox has no such channel.
    /// - [`MailboxError::DeliveryInProgress`](crate::MailboxError::DeliveryInProgress)
    ///   if the channel is already being delivered further up the stack.
    fn deliver_all(&self, selector: MessageSelector) -> Result<()>;

    /// Whether no message is pending for the next delivery.
    fn is_empty(&self) -> bool;

    /// Drop every pending message without telling the receiver.
    fn clear(&self);

    /// The receiver this mailbox delivers to.
    fn receiver(&self) -> Rc<dyn Receiver>;

    /// The group this mailbox reports to, if it has been assigned one.
    fn current_group(&self) -> Option<Rc<dyn CommunicationGroup>>;

    /// Assign the group this mailbox reports to.
    fn set_current_group(&self, group: Rc<dyn CommunicationGroup>);
}

/// Whether two handles name the same mailbox.
pub fn same_mailbox(left: &Rc<dyn Mailbox>, right: &Rc<dyn Mailbox>) -> bool {
    std::ptr::eq(
        Rc::as_ptr(left) as *const (),
        Rc::as_ptr(right) as *const (),
    )
}

/// Group membership of a mailbox.
///
/// `adapter` is the handle the scheduler knows the mailbox by: the mailbox
/// itself, or the adaptive mailbox wrapping it. Notifications name the
/// adapter and go to the adapter's current group.
pub(crate) struct Registration {
    adapter: Weak<dyn Mailbox>,
    group: RefCell<Option<Rc<dyn CommunicationGroup>>>,
}

impl Registration {
    pub(crate) fn new(adapter: Weak<dyn Mailbox>) -> Self {
        Self {
            adapter,
            group: RefCell::new(None),
        }
    }

    pub(crate) fn adapter(&self) -> Weak<dyn Mailbox> {
        self.adapter.clone()
    }

    pub(crate) fn current_group(&self) -> Option<Rc<dyn CommunicationGroup>> {
        self.group.borrow().clone()
    }

    pub(crate) fn set_current_group(&self, group: Rc<dyn CommunicationGroup>) {
        *self.group.borrow_mut() = Some(group);
    }

    /// Tell the group about a change of emptiness of channel `selector`.
    pub(crate) fn report(&self, selector: MessageSelector, was_empty: bool, is_empty: bool) {
        if was_empty == is_empty {
            return;
        }
        let Some(target) = self.adapter.upgrade() else {
            return;
        };
        let Some(group) = target.current_group() else {
            tracing::warn!(%selector, "mailbox has no communication group, notification dropped");
            return;
        };
        if was_empty {
            group.notify_has_message(&target, selector);
        } else {
            group.notify_lost_all_messages(&target, selector);
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("grouped", &self.group.borrow().is_some())
            .finish()
    }
}
