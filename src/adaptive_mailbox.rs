//! A mailbox whose delivery strategy is chosen after the network is built.
//!
//! The scheduler only learns which receivers sit on a recursive boundary
//! once the topology has been analysed, but the receivers already hold their
//! mailbox by then. [`BehaviorChangingMailbox`] is that stable handle: it
//! starts as a [`DefaultMailbox`] and can be switched to an
//! [`UpdateSplittingMailbox`] while it is empty.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::mailbox::Registration;
use crate::{
    CommunicationGroup, DefaultMailbox, Direction, Mailbox, MailboxConfig, MailboxError,
    MessageSelector, Receiver, Result, Timestamp, Tuple, UpdateSplittingMailbox,
};

/// Network-wide flags consulted by the mailboxes of one partition.
#[derive(Debug, Default)]
pub struct NetworkState {
    executing_delayed_commands: Cell<bool>,
}

impl NetworkState {
    /// Create a state with no delayed commands running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the network is replaying delayed construction commands.
    ///
    /// Fall-through mailboxes queue their updates while this is set.
    #[must_use]
    pub fn is_executing_delayed_commands(&self) -> bool {
        self.executing_delayed_commands.get()
    }

    pub fn set_executing_delayed_commands(&self, executing: bool) {
        self.executing_delayed_commands.set(executing);
    }
}

/// What the topology analysis found out about a receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxTopology {
    /// The receiver belongs to a recursive communication group.
    pub recursive_group: bool,
    /// The receiver consumes updates from outside its strongly connected
    /// component.
    pub at_scc_boundary: bool,
    /// The receiver is the only member of its component.
    pub singleton: bool,
}

impl MailboxTopology {
    /// Whether insertions and deletions must be delivered in separate phases.
    #[must_use]
    pub fn requires_split(&self) -> bool {
        self.recursive_group && self.at_scc_boundary && self.singleton
    }
}

enum Strategy {
    Basic(DefaultMailbox),
    Splitting(UpdateSplittingMailbox),
}

impl Strategy {
    fn mailbox(&self) -> &dyn Mailbox {
        match self {
            Self::Basic(mailbox) => mailbox,
            Self::Splitting(mailbox) => mailbox,
        }
    }
}

/// A mailbox that can change from counting to splitting delivery.
///
/// The wrapped mailbox reports to the group under the wrapper's identity,
/// so switching strategies never invalidates a registration.
///
/// In fall-through mode, posts skip the queues and call
/// [`Receiver::update`] right away, unless the [`NetworkState`] says delayed
/// construction commands are running. Switching fall-through on while
/// messages are queued is the caller's business: they stay queued until the
/// next delivery.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use rete_mailbox::prelude::*;
///
/// struct Ignore;
///
/// impl Receiver for Ignore {
///     fn update(&self, _direction: Direction, _tuple: &Tuple, _timestamp: Timestamp) {}
/// }
///
/// let network = Rc::new(NetworkState::new());
/// let mailbox = BehaviorChangingMailbox::new(Rc::new(Ignore), network);
/// assert!(!mailbox.is_split());
///
/// let topology = MailboxTopology {
///     recursive_group: true,
///     at_scc_boundary: true,
///     singleton: true,
/// };
/// mailbox.adapt_to(&topology).unwrap();
/// assert!(mailbox.is_split());
///
/// mailbox.post_message(Direction::Delete, &Tuple::from([1]), Timestamp::ZERO);
/// assert!(mailbox.set_split_flag(false).is_err());
/// ```
pub struct BehaviorChangingMailbox {
    strategy: RefCell<Strategy>,
    fall_through: Cell<bool>,
    delivering: Cell<Option<MessageSelector>>,
    receiver: Rc<dyn Receiver>,
    network: Rc<NetworkState>,
    registration: Registration,
    config: MailboxConfig,
}

impl BehaviorChangingMailbox {
    /// Create a counting mailbox delivering to `receiver`.
    pub fn new(receiver: Rc<dyn Receiver>, network: Rc<NetworkState>) -> Rc<Self> {
        Self::with_config(receiver, network, MailboxConfig::default())
    }

    /// Create a counting mailbox with explicit settings.
    pub fn with_config(
        receiver: Rc<dyn Receiver>,
        network: Rc<NetworkState>,
        config: MailboxConfig,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| {
            let adapter: Weak<dyn Mailbox> = me.clone();
            let basic = DefaultMailbox::adapted(Rc::clone(&receiver), config, adapter.clone());
            Self {
                strategy: RefCell::new(Strategy::Basic(basic)),
                fall_through: Cell::new(false),
                delivering: Cell::new(None),
                receiver,
                network,
                registration: Registration::new(adapter),
                config,
            }
        })
    }

    /// Whether insertions and deletions are delivered separately.
    #[must_use]
    pub fn is_split(&self) -> bool {
        matches!(*self.strategy.borrow(), Strategy::Splitting(_))
    }

    #[must_use]
    pub fn is_fall_through(&self) -> bool {
        self.fall_through.get()
    }

    pub fn set_fall_through(&self, fall_through: bool) {
        if self.fall_through.replace(fall_through) != fall_through {
            tracing::debug!(fall_through, "mailbox fall-through changed");
        }
    }

    /// Switch between counting and splitting delivery.
    ///
    /// Does nothing if the mailbox already uses the requested strategy.
    ///
    /// # Errors
    ///
    /// - [`MailboxError::NotEmpty`] if messages are pending.
    /// - [`MailboxError::DeliveryInProgress`] if called from within a delivery.
    pub fn set_split_flag(&self, split: bool) -> Result<()> {
        if self.is_split() == split {
            return Ok(());
        }
        if !self.is_empty() {
            return Err(MailboxError::NotEmpty {
                operation: "change the delivery strategy",
            });
        }
        let mut strategy = self.strategy.try_borrow_mut().map_err(|_| {
            MailboxError::DeliveryInProgress {
                selector: self.delivering.get().unwrap_or(MessageSelector::Default),
            }
        })?;
        let receiver = Rc::clone(&self.receiver);
        let adapter = self.registration.adapter();
        *strategy = if split {
            Strategy::Splitting(UpdateSplittingMailbox::adapted(receiver, self.config, adapter))
        } else {
            Strategy::Basic(DefaultMailbox::adapted(receiver, self.config, adapter))
        };
        tracing::debug!(split, "mailbox delivery strategy changed");
        Ok(())
    }

    /// Apply the strategy the topology calls for.
    ///
    /// # Errors
    ///
    /// See [`set_split_flag`](Self::set_split_flag).
    pub fn adapt_to(&self, topology: &MailboxTopology) -> Result<()> {
        self.set_split_flag(topology.requires_split())
    }
}

impl Mailbox for BehaviorChangingMailbox {
    fn post_message(&self, direction: Direction, tuple: &Tuple, timestamp: Timestamp) {
        if self.fall_through.get() && !self.network.is_executing_delayed_commands() {
            self.receiver.update(direction, tuple, timestamp);
            return;
        }
        self.strategy
            .borrow()
            .mailbox()
            .post_message(direction, tuple, timestamp);
    }

    fn deliver_all(&self, selector: MessageSelector) -> Result<()> {
        let outer = self.delivering.replace(Some(selector));
        let result = self.strategy.borrow().mailbox().deliver_all(selector);
        self.delivering.set(outer);
        result
    }

    fn is_empty(&self) -> bool {
        self.strategy.borrow().mailbox().is_empty()
    }

    fn clear(&self) {
        self.strategy.borrow().mailbox().clear();
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

impl fmt::Debug for BehaviorChangingMailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("BehaviorChangingMailbox");
        match self.strategy.try_borrow() {
            Ok(strategy) => match &*strategy {
                Strategy::Basic(mailbox) => out.field("strategy", mailbox),
                Strategy::Splitting(mailbox) => out.field("strategy", mailbox),
            },
            Err(_) => out.field("strategy", &"<busy>"),
        };
        out.field("fall_through", &self.fall_through.get()).finish()
    }
}
