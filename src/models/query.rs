use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{QueryId, QueryTag};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: QueryId,
    pub keywords: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
    /// Last time somebody read the feed.
    pub queried_at: DateTime<Utc>,
    /// Last time a scrape cycle completed. `None` until the first one does.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Query {
    #[must_use]
    pub fn tag(&self) -> QueryTag {
        QueryTag::new(&self.keywords, &self.location)
    }

    /// Whether the feed has gone unread for longer than `max_idle`.
    #[must_use]
    pub fn is_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> bool {
        now - self.queried_at > max_idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(queried_days_ago: i64) -> Query {
        let now = Utc::now();
        Query {
            id: QueryId::new(1),
            keywords: "golang".to_string(),
            location: "berlin".to_string(),
            created_at: now - Duration::days(30),
            queried_at: now - Duration::days(queried_days_ago),
            updated_at: None,
        }
    }

    #[test]
    fn idle_after_threshold() {
        let now = Utc::now();
        assert!(query(8).is_idle(now, Duration::days(7)));
        assert!(!query(6).is_idle(now, Duration::days(7)));
        assert!(!query(0).is_idle(now, Duration::days(7)));
    }

    #[test]
    fn tag_matches_fields() {
        let q = query(0);
        assert_eq!(q.tag(), QueryTag::new("golang", "berlin"));
    }
}
