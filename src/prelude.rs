//! Convenient re-exports for common usage.
//!
//! ```
//! use rete_mailbox::prelude::*;
//! ```

pub use crate::BehaviorChangingMailbox;
pub use crate::CommunicationGroup;
pub use crate::CountingQueue;
pub use crate::DefaultMailbox;
pub use crate::Direction;
pub use crate::GroupedCountingQueue;
pub use crate::Mailbox;
pub use crate::MailboxConfig;
pub use crate::MailboxError;
pub use crate::MailboxTopology;
pub use crate::MessageIndexer;
pub use crate::MessageSelector;
pub use crate::NetworkState;
pub use crate::PhasedGroup;
pub use crate::PosetAwareMailbox;
pub use crate::PosetAwareReceiver;
pub use crate::PosetComparator;
pub use crate::Receiver;
pub use crate::Timestamp;
pub use crate::TimelyMailbox;
pub use crate::Tuple;
pub use crate::TupleMask;
pub use crate::UpdateSplittingMailbox;
pub use crate::Value;
