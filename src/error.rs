//! Error types for mailbox operations.
//!
//! Only misuse by the scheduler is reported through [`MailboxError`].
//! Corruption of a mailbox's internal invariants (a tuple pending in both
//! the monotone and anti-monotone queue, a wrongly signed entry at delivery)
//! is a bug in this crate and is caught by debug assertions instead.

use thiserror::Error;

use crate::MessageSelector;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, MailboxError>;

/// Errors returned by mailbox operations.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailboxError {
    /// `deliver_all` was asked for a channel this kind of mailbox does not have.
    #[error("{mailbox} does not support message selector {selector}")]
    UnsupportedSelector {
        mailbox: &'static str,
        selector: MessageSelector,
    },

    /// `deliver_all` was re-entered for a channel that is still being delivered.
    #[error("messages for {selector} are already being delivered")]
    DeliveryInProgress { selector: MessageSelector },

    /// The operation requires the mailbox to hold no pending messages.
    #[error("cannot {operation} while messages are pending")]
    NotEmpty { operation: &'static str },
}

impl MailboxError {
    /// Check if this error reports a selector the mailbox cannot serve.
    pub fn is_unsupported_selector(&self) -> bool {
        matches!(self, Self::UnsupportedSelector { .. })
    }
}
