/// Post Module
///
/// The post record the rest of the bot works with. Everything the API leaves
/// out is filled with a default here, so downstream code never handles
/// missing fields.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Engagement counts attached to a post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub quote_count: u64,
}

impl Metrics {
    /// Sum of every engagement count.
    ///
    /// Used as a rough stand-in for impression/click data, which the API
    /// does not expose on the free tier. It is an approximation, not a
    /// measurement.
    pub fn total_engagement(&self) -> u64 {
        self.like_count
            .saturating_add(self.retweet_count)
            .saturating_add(self.reply_count)
            .saturating_add(self.quote_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: Option<String>,
    pub text: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub metrics: Metrics,
}

impl Post {
    /// Create a post with only an id and metrics. Mostly useful in tests and mocks.
    pub fn new(id: impl Into<String>, metrics: Metrics) -> Self {
        Self {
            id: id.into(),
            author_id: None,
            text: None,
            created_at: None,
            metrics,
        }
    }

    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author_id.as_deref() == Some(user_id)
    }

    /// True when the post is known to be older than `max_age`.
    /// Posts without a timestamp are never considered stale.
    pub fn is_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.created_at
            .map(|created| now - created > max_age)
            .unwrap_or(false)
    }
}

/// Parse an RFC 3339 timestamp, returning `None` for anything unparsable
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}
