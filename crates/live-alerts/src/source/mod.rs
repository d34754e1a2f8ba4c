//! Event source trait and cursor types.
//!
//! An [`EventSource`] yields the audience events observed after a [`Cursor`].
//! The caller owns the cursors, so a failed poll can be abandoned without
//! losing events: the cursor is simply not committed.

mod rumble;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, SourceError};
use crate::event::Event;

pub use rumble::{RumbleApiSource, RumbleSourceConfig};

/// Result type for source queries.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Position in an append-only event stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    last_seen: Option<DateTime<Utc>>,
}

impl Cursor {
    /// A cursor before every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor positioned at `timestamp`; only later events are new.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            last_seen: Some(timestamp),
        }
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// Whether an event at `timestamp` has not been seen yet.
    pub fn is_new(&self, timestamp: DateTime<Utc>) -> bool {
        self.last_seen.is_none_or(|seen| timestamp > seen)
    }

    /// Move forward to `timestamp`. Never moves backwards.
    pub fn advance(&mut self, timestamp: DateTime<Utc>) {
        if self.is_new(timestamp) {
            self.last_seen = Some(timestamp);
        }
    }

    /// Keep the records newer than this cursor, oldest first, and advance
    /// past them.
    pub fn take_new<T>(&mut self, records: impl IntoIterator<Item = (DateTime<Utc>, T)>) -> Vec<T> {
        let mut fresh: Vec<(DateTime<Utc>, T)> = records
            .into_iter()
            .filter(|(ts, _)| self.is_new(*ts))
            .collect();
        fresh.sort_by_key(|(ts, _)| *ts);
        if let Some((newest, _)) = fresh.last() {
            self.advance(*newest);
        }
        fresh.into_iter().map(|(_, record)| record).collect()
    }
}

/// The live broadcast that scopes rant events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub id: String,
    pub title: Option<String>,
}

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
        }
    }
}

/// Where audience events come from.
///
/// Every method advances the cursor it is given as a side effect; calling it
/// twice with the same cursor value may return the same events again.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Shortest useful interval between polls. Polling faster only returns
    /// cached data.
    fn min_poll_interval(&self) -> Duration {
        Duration::ZERO
    }

    /// Follow a settings change: poll `api_url` from now on, once every
    /// `refresh`. Sources with nothing to rebind accept any settings.
    fn apply_settings(&self, _api_url: &str, _refresh: Duration) -> Result<()> {
        Ok(())
    }

    /// Followers observed after `cursor`, oldest first. Returns [`Event::Follower`]s.
    async fn new_followers_since(&self, cursor: &mut Cursor) -> SourceResult<Vec<Event>>;

    /// Subscribers observed after `cursor`, oldest first. Returns [`Event::Subscriber`]s.
    async fn new_subscribers_since(&self, cursor: &mut Cursor) -> SourceResult<Vec<Event>>;

    /// The current live session, if a broadcast is active.
    async fn current_session(&self) -> SourceResult<Option<SessionHandle>>;

    /// Rants in `session` observed after `cursor`, oldest first. Returns [`Event::Rant`]s.
    async fn new_rants_since(
        &self,
        session: &SessionHandle,
        cursor: &mut Cursor,
    ) -> SourceResult<Vec<Event>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_cursor_take_new_orders_oldest_first() {
        let mut cursor = Cursor::new();
        let taken = cursor.take_new(vec![(ts(3), "c"), (ts(1), "a"), (ts(2), "b")]);
        assert_eq!(taken, ["a", "b", "c"]);
        assert_eq!(cursor.last_seen(), Some(ts(3)));

        let again = cursor.take_new(vec![(ts(3), "c"), (ts(4), "d")]);
        assert_eq!(again, ["d"]);
    }

    #[test]
    fn test_cursor_never_moves_backwards() {
        let mut cursor = Cursor::at(ts(10));
        cursor.advance(ts(5));
        assert_eq!(cursor.last_seen(), Some(ts(10)));
        assert!(!cursor.is_new(ts(10)));
        assert!(cursor.is_new(ts(11)));
    }

    #[test]
    fn test_empty_batch_keeps_cursor() {
        let mut cursor = Cursor::at(ts(1));
        let taken: Vec<&str> = cursor.take_new(Vec::new());
        assert!(taken.is_empty());
        assert_eq!(cursor, Cursor::at(ts(1)));
    }
}
