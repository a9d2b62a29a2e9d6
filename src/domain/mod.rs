//! Domain primitives for the feed subsystem.
//!
//! Newtypes keep store-assigned query ids apart from the job board's offer ids,
//! and give the (keywords, location) pair a single hashable identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of a persisted search query.
///
/// ```rust
/// use jobfeed::domain::QueryId;
///
/// let id = QueryId::new(42);
/// assert_eq!(id.value(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct QueryId(i32);

impl QueryId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        debug_assert!(id >= 0, "QueryId should be non-negative");
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<QueryId> for i32 {
    fn from(id: QueryId) -> Self {
        id.0
    }
}

impl From<i32> for QueryId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl Serialize for QueryId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(self.0)
    }
}

impl<'de> Deserialize<'de> for QueryId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i32::deserialize(deserializer)?;
        Ok(Self::new(id))
    }
}

/// The (keywords, location) pair a query is known by outside the store.
///
/// Kept as two fields rather than a concatenated string so that
/// `("go", "lang berlin")` and `("go lang", "berlin")` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryTag {
    pub keywords: String,
    pub location: String,
}

impl QueryTag {
    #[must_use]
    pub fn new(keywords: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for QueryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ {:?}", self.keywords, self.location)
    }
}
