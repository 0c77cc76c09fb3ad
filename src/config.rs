//! Mailbox tuning.

/// Default for [`MailboxConfig::recycle_threshold`].
pub const DEFAULT_RECYCLE_THRESHOLD: usize = 127;

/// Settings shared by all mailbox kinds.
///
/// None of these settings change what a mailbox delivers, only how it
/// manages its memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MailboxConfig {
    /// After a delivery, a delivered queue holding more entries than this is
    /// dropped and replaced by a fresh one. Smaller queues are cleared and
    /// keep their allocation for the next round.
    pub recycle_threshold: usize,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            recycle_threshold: DEFAULT_RECYCLE_THRESHOLD,
        }
    }
}

impl MailboxConfig {
    /// Override the recycle threshold.
    #[must_use]
    pub fn with_recycle_threshold(mut self, threshold: usize) -> Self {
        self.recycle_threshold = threshold;
        self
    }
}
