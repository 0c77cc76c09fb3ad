//! The scheduling side of the mailbox protocol.
//!
//! A [`CommunicationGroup`] learns which mailboxes have something to deliver
//! and decides when to flush them. [`PhasedGroup`] is a ready-made group that
//! flushes anti-monotone channels before monotone ones.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::mailbox::same_mailbox;
use crate::{Mailbox, MessageSelector, Result};

/// Scheduler unit a mailbox reports its state transitions to.
pub trait CommunicationGroup {
    /// The channel `selector` of `mailbox` went from empty to non-empty.
    fn notify_has_message(&self, mailbox: &Rc<dyn Mailbox>, selector: MessageSelector);

    /// The channel `selector` of `mailbox` went from non-empty to empty.
    fn notify_lost_all_messages(&self, mailbox: &Rc<dyn Mailbox>, selector: MessageSelector);
}

#[derive(Default)]
struct MailboxSet(VecDeque<Rc<dyn Mailbox>>);

impl MailboxSet {
    fn insert(&mut self, mailbox: &Rc<dyn Mailbox>) {
        if !self.contains(mailbox) {
            self.0.push_back(Rc::clone(mailbox));
        }
    }

    fn remove(&mut self, mailbox: &Rc<dyn Mailbox>) {
        self.0.retain(|m| !same_mailbox(m, mailbox));
    }

    fn contains(&self, mailbox: &Rc<dyn Mailbox>) -> bool {
        self.0.iter().any(|m| same_mailbox(m, mailbox))
    }

    fn pop(&mut self) -> Option<Rc<dyn Mailbox>> {
        self.0.pop_front()
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A group that delivers in two phases.
///
/// [`deliver_messages`](Self::deliver_messages) first drains the anti-monotone
/// channels, then the default channels, and repeats until both are empty;
/// then it does the same for the monotone channels. The two phases alternate
/// until no mailbox is registered any more. Mailboxes are
/// unregistered before they are flushed, so a mailbox that receives new
/// messages while delivering (its own or another mailbox's) registers again
/// and is flushed in a later round of the same phase.
///
/// Only phased selectors are served.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use rete_mailbox::prelude::*;
///
/// #[derive(Default)]
/// struct Sink(RefCell<Vec<Tuple>>);
///
/// impl Receiver for Sink {
///     fn update(&self, _direction: Direction, tuple: &Tuple, _timestamp: Timestamp) {
///         self.0.borrow_mut().push(tuple.clone());
///     }
/// }
///
/// let sink = Rc::new(Sink::default());
/// let mailbox = DefaultMailbox::new(sink.clone());
/// let group = Rc::new(PhasedGroup::new());
/// mailbox.set_current_group(group.clone());
///
/// mailbox.post_message(Direction::Insert, &Tuple::from([1]), Timestamp::ZERO);
/// assert!(!group.is_empty());
///
/// group.deliver_messages().unwrap();
/// assert_eq!(sink.0.borrow().as_slice(), &[Tuple::from([1])]);
/// assert!(group.is_empty());
/// ```
#[derive(Default)]
pub struct PhasedGroup {
    anti_monotone: RefCell<MailboxSet>,
    monotone: RefCell<MailboxSet>,
    default: RefCell<MailboxSet>,
    delivering: Cell<bool>,
}

impl PhasedGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no mailbox is waiting to be flushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anti_monotone.borrow().is_empty()
            && self.monotone.borrow().is_empty()
            && self.default.borrow().is_empty()
    }

    /// Whether [`deliver_messages`](Self::deliver_messages) is running.
    #[must_use]
    pub fn is_delivering(&self) -> bool {
        self.delivering.get()
    }

    /// Number of mailboxes waiting on channel `selector`.
    #[must_use]
    pub fn pending(&self, selector: MessageSelector) -> usize {
        self.set(selector).borrow().len()
    }

    /// Whether `mailbox` is waiting on channel `selector`.
    #[must_use]
    pub fn contains(&self, mailbox: &Rc<dyn Mailbox>, selector: MessageSelector) -> bool {
        self.set(selector).borrow().contains(mailbox)
    }

    /// Flush every registered mailbox, anti-monotone phase first.
    ///
    /// Both phases are repeated until the group is empty, so retractions
    /// posted during the monotone phase are flushed before this returns.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by a mailbox's `deliver_all`. The
    /// failing mailbox stays registered, as do all the others.
    pub fn deliver_messages(&self) -> Result<()> {
        self.delivering.set(true);
        let result = self.run_rounds();
        self.delivering.set(false);
        result
    }

    fn run_rounds(&self) -> Result<()> {
        while !self.is_empty() {
            self.run_phase(&self.anti_monotone, MessageSelector::AntiMonotone)?;
            self.run_phase(&self.monotone, MessageSelector::Monotone)?;
        }
        Ok(())
    }

    fn run_phase(&self, phased: &RefCell<MailboxSet>, selector: MessageSelector) -> Result<()> {
        tracing::trace!(%selector, "delivery phase started");
        while !phased.borrow().is_empty() || !self.default.borrow().is_empty() {
            Self::flush(phased, selector)?;
            Self::flush(&self.default, MessageSelector::Default)?;
        }
        Ok(())
    }

    fn flush(set: &RefCell<MailboxSet>, selector: MessageSelector) -> Result<()> {
        while let Some(mailbox) = Self::next(set) {
            if let Err(err) = mailbox.deliver_all(selector) {
                set.borrow_mut().insert(&mailbox);
                return Err(err);
            }
        }
        Ok(())
    }

    fn next(set: &RefCell<MailboxSet>) -> Option<Rc<dyn Mailbox>> {
        set.borrow_mut().pop()
    }

    fn set(&self, selector: MessageSelector) -> &RefCell<MailboxSet> {
        match selector {
            MessageSelector::Default => &self.default,
            MessageSelector::Monotone => &self.monotone,
            MessageSelector::AntiMonotone => &self.anti_monotone,
            MessageSelector::At(_) => panic!("PhasedGroup does not serve selector {selector}"),
        }
    }
}

impl CommunicationGroup for PhasedGroup {
    /// # Panics
    ///
    /// Panics on a timestamp selector.
    fn notify_has_message(&self, mailbox: &Rc<dyn Mailbox>, selector: MessageSelector) {
        self.set(selector).borrow_mut().insert(mailbox);
    }

    /// # Panics
    ///
    /// Panics on a timestamp selector.
    fn notify_lost_all_messages(&self, mailbox: &Rc<dyn Mailbox>, selector: MessageSelector) {
        self.set(selector).borrow_mut().remove(mailbox);
    }
}

impl fmt::Debug for PhasedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhasedGroup")
            .field("anti_monotone", &self.anti_monotone.borrow().len())
            .field("monotone", &self.monotone.borrow().len())
            .field("default", &self.default.borrow().len())
            .field("delivering", &self.delivering.get())
            .finish()
    }
}
