use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An offer as extracted from a job board page, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOffer {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub posted_at: NaiveDate,
}

/// A stored offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub posted_at: NaiveDate,
    pub created_at: DateTime<Utc>,
}
