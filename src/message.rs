use std::fmt;

/// Whether an update adds or retracts a tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// The tuple appeared.
    Insert,
    /// The tuple disappeared.
    Delete,
}

impl Direction {
    /// `+1` for [`Direction::Insert`], `-1` for [`Direction::Delete`].
    #[must_use]
    pub fn delta(self) -> i64 {
        match self {
            Self::Insert => 1,
            Self::Delete => -1,
        }
    }

    /// The direction of a non-zero signed count.
    #[must_use]
    pub fn of_count(count: i64) -> Self {
        if count < 0 {
            Self::Delete
        } else {
            Self::Insert
        }
    }

    /// The opposite direction.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Insert => Self::Delete,
            Self::Delete => Self::Insert,
        }
    }
}

/// A logical timestamp attached to an update.
///
/// Timeless mailboxes ignore it and deliver at [`Timestamp::ZERO`]; the
/// [`TimelyMailbox`](crate::TimelyMailbox) keys its queues by it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The initial timestamp.
    pub const ZERO: Timestamp = Timestamp(0);

    /// The timestamp right after this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Names a delivery channel of a mailbox.
///
/// Every mailbox kind serves only the channels meaningful to it: the default
/// mailbox serves [`MessageSelector::Default`], the splitting and poset-aware
/// mailboxes serve [`MessageSelector::Monotone`] and
/// [`MessageSelector::AntiMonotone`], the timely mailbox serves
/// [`MessageSelector::At`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageSelector {
    /// Unsplit updates.
    Default,
    /// Updates consistent with the declared order.
    Monotone,
    /// Retractions that are not (yet) justified by the declared order.
    AntiMonotone,
    /// Updates stamped with a given timestamp.
    At(Timestamp),
}

impl fmt::Display for MessageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("DEFAULT"),
            Self::Monotone => f.write_str("MONOTONE"),
            Self::AntiMonotone => f.write_str("ANTI_MONOTONE"),
            Self::At(ts) => write!(f, "{ts}"),
        }
    }
}

impl From<Timestamp> for MessageSelector {
    fn from(timestamp: Timestamp) -> Self {
        Self::At(timestamp)
    }
}
