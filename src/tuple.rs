use std::fmt;
use std::sync::Arc;

/// A single element of a [`Tuple`].
///
/// Elements are opaque to the mailboxes: they are only hashed, compared and
/// projected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// An integer data value.
    Int(i64),
    /// The identifier of a model object.
    Object(u64),
    /// A string data value.
    Text(Arc<str>),
    /// A boolean data value.
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Object(id) => write!(f, "#{id}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(Arc::from(value))
    }
}

/// A fixed-arity, immutable row of values.
///
/// Tuples are used as map keys throughout the mailboxes, so cloning only
/// bumps a reference count.
///
/// # Example
///
/// ```
/// use rete_mailbox::prelude::*;
///
/// let t = Tuple::from([1, 2, 3]);
/// assert_eq!(t.arity(), 3);
/// assert_eq!(t.get(1), Some(&Value::Int(2)));
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tuple(Arc<[Value]>);

impl Tuple {
    /// Create a tuple from its elements.
    pub fn new(values: Vec<Value>) -> Self {
        Self(Arc::from(values))
    }

    /// The tuple of arity zero.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of elements.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Element at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

impl<const N: usize> From<[i64; N]> for Tuple {
    fn from(values: [i64; N]) -> Self {
        values.into_iter().map(Value::Int).collect()
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl FromIterator<Value> for Tuple {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A projection selecting a subset of a tuple's positions.
///
/// Poset-aware receivers describe their tuples with two masks: the core mask
/// extracts the group key that identifies which updates are compared with
/// each other, and the poset mask extracts the value that is ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TupleMask {
    indices: Vec<usize>,
    source_width: usize,
}

impl TupleMask {
    /// Create a mask that keeps `indices` (in that order) of tuples of arity
    /// `source_width`.
    pub fn new(indices: Vec<usize>, source_width: usize) -> Self {
        debug_assert!(indices.iter().all(|&i| i < source_width));
        Self {
            indices,
            source_width,
        }
    }

    /// Keep every position unchanged.
    pub fn identity(size: usize) -> Self {
        Self::linear(size, size)
    }

    /// Keep the first `size` positions.
    pub fn linear(size: usize, source_width: usize) -> Self {
        Self::new((0..size).collect(), source_width)
    }

    /// Keep every position except `omission`.
    pub fn omit(omission: usize, source_width: usize) -> Self {
        Self::new(
            (0..source_width).filter(|&i| i != omission).collect(),
            source_width,
        )
    }

    /// Keep only position `selected`.
    pub fn select_single(selected: usize, source_width: usize) -> Self {
        Self::new(vec![selected], source_width)
    }

    /// Keep the positions whose indicator is `true`.
    pub fn from_keep_indicators(keep: &[bool]) -> Self {
        let indices = keep
            .iter()
            .enumerate()
            .filter(|(_, k)| **k)
            .map(|(i, _)| i)
            .collect();
        Self::new(indices, keep.len())
    }

    /// Project `tuple` through this mask.
    ///
    /// # Panics
    ///
    /// Panics if the tuple is narrower than a selected position.
    #[must_use]
    pub fn transform(&self, tuple: &Tuple) -> Tuple {
        self.indices.iter().map(|&i| tuple.0[i].clone()).collect()
    }

    /// Arity of the projected tuples.
    #[must_use]
    pub fn size(&self) -> usize {
        self.indices.len()
    }

    /// Arity of the tuples this mask applies to.
    #[must_use]
    pub fn source_width(&self) -> usize {
        self.source_width
    }

    /// The selected positions.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Whether the mask keeps every position in order.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.indices.len() == self.source_width
            && self.indices.iter().enumerate().all(|(i, &j)| i == j)
    }
}
