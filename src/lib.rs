//! # rete-mailbox
//!
//! Mailboxes for incremental dataflow networks.
//!
//! In an incremental network every node receives a stream of tuple updates
//! (insertions and deletions) from its parents. A mailbox sits in front of a
//! node and collects those updates until the scheduler asks it to deliver.
//! While they wait, opposite updates of the same tuple cancel each other, so
//! the node only ever sees net changes.
//!
//! Delivery is reentrancy-safe: a node that reacts to a delivered batch by
//! posting new updates, even into its own mailbox, never disturbs the batch
//! it is processing. Those updates wait for the next round.
//!
//! ## Quick Start
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use rete_mailbox::prelude::*;
//!
//! #[derive(Default)]
//! struct Node(RefCell<Vec<(Direction, Tuple)>>);
//!
//! impl Receiver for Node {
//!     fn update(&self, direction: Direction, tuple: &Tuple, _timestamp: Timestamp) {
//!         self.0.borrow_mut().push((direction, tuple.clone()));
//!     }
//! }
//!
//! let node = Rc::new(Node::default());
//! let mailbox = DefaultMailbox::new(node.clone());
//! let group = Rc::new(PhasedGroup::new());
//! mailbox.set_current_group(group.clone());
//!
//! // Inserted and deleted again before anybody looked: nothing to deliver.
//! mailbox.post_message(Direction::Insert, &Tuple::from([1, 2]), Timestamp::ZERO);
//! mailbox.post_message(Direction::Delete, &Tuple::from([1, 2]), Timestamp::ZERO);
//! mailbox.post_message(Direction::Insert, &Tuple::from([3, 4]), Timestamp::ZERO);
//!
//! group.deliver_messages().unwrap();
//! assert_eq!(
//!     node.0.borrow().as_slice(),
//!     &[(Direction::Insert, Tuple::from([3, 4]))]
//! );
//! ```
//!
//! ## Available Mailboxes
//!
//! - [`DefaultMailbox`] - Counting mailbox delivering net counts in one batch
//! - [`UpdateSplittingMailbox`] - Delivers deletions and insertions in separate phases
//! - [`PosetAwareMailbox`] - Splits by a partial order over tuple values
//! - [`BehaviorChangingMailbox`] - Stable handle switching between counting and splitting
//! - [`TimelyMailbox`] - One counting queue per timestamp
//!
//! ## The `Mailbox` Trait
//!
//! All mailboxes implement [`Mailbox`]. They report empty/non-empty
//! transitions of each delivery channel to their [`CommunicationGroup`],
//! which decides when to call [`Mailbox::deliver_all`]. [`PhasedGroup`] is a
//! ready-made group that runs the anti-monotone phase before the monotone one.
//!
//! ## Threading
//!
//! Mailboxes, receivers and groups are single-threaded (`Rc`/`RefCell`).
//! A network partition running on its own thread owns its own set.

mod adaptive_mailbox;
mod buffer;
mod config;
mod default_mailbox;
mod error;
mod group;
mod indexer;
mod mailbox;
mod message;
mod poset_mailbox;
mod receiver;
mod splitting_mailbox;
mod timely_mailbox;
mod tuple;

#[cfg(test)]
mod test_support;

pub mod prelude;

pub use adaptive_mailbox::{BehaviorChangingMailbox, MailboxTopology, NetworkState};
pub use config::{MailboxConfig, DEFAULT_RECYCLE_THRESHOLD};
pub use default_mailbox::DefaultMailbox;
pub use error::{MailboxError, Result};
pub use group::{CommunicationGroup, PhasedGroup};
pub use indexer::{CountingQueue, GroupedCountingQueue, Iter, MessageIndexer};
pub use mailbox::{same_mailbox, Mailbox};
pub use message::{Direction, MessageSelector, Timestamp};
pub use poset_mailbox::PosetAwareMailbox;
pub use receiver::{PosetAwareReceiver, PosetComparator, Receiver};
pub use splitting_mailbox::UpdateSplittingMailbox;
pub use timely_mailbox::TimelyMailbox;
pub use tuple::{Tuple, TupleMask, Value};
