//! Event source polling.
//!
//! The poller owns one cursor per category plus the live session used to
//! scope rants. A tick queries every category and only commits cursors and
//! appends to the queues once all queries succeeded; a faulted tick leaves
//! both untouched and is simply retried on the next tick.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::event::Category;
use crate::queue::QueueSet;
use crate::source::{Cursor, EventSource, SessionHandle};

/// Cursor per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursors {
    pub followers: Cursor,
    pub subscribers: Cursor,
    pub rants: Cursor,
}

/// Number of events appended by one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub followers: usize,
    pub subscribers: usize,
    pub rants: usize,
    /// Set when this tick resolved a new session or lost the old one.
    pub session_changed: bool,
}

impl PollReport {
    pub fn total(&self) -> usize {
        self.followers + self.subscribers + self.rants
    }
}

/// Pulls new events from an [`EventSource`] into the category queues.
pub struct Poller {
    source: Arc<dyn EventSource>,
    queues: QueueSet,
    cursors: Cursors,
    session: Option<SessionHandle>,
    skip_backlog: bool,
    primed: bool,
}

impl Poller {
    pub fn new(source: Arc<dyn EventSource>, queues: QueueSet, skip_backlog: bool) -> Self {
        Self {
            source,
            queues,
            cursors: Cursors::default(),
            session: None,
            skip_backlog,
            primed: false,
        }
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    pub fn cursors(&self) -> Cursors {
        self.cursors
    }

    /// Whether the backlog has been skipped, or there is none to skip.
    pub fn is_primed(&self) -> bool {
        self.primed || !self.skip_backlog
    }

    /// Move every cursor past what the source currently holds, discarding it.
    ///
    /// Does nothing unless backlog skipping is enabled.
    pub async fn prime(&mut self) -> Result<(), SourceError> {
        if self.is_primed() {
            return Ok(());
        }

        let mut cursors = self.cursors;
        let followers = self.source.new_followers_since(&mut cursors.followers).await?;
        let subscribers = self
            .source
            .new_subscribers_since(&mut cursors.subscribers)
            .await?;

        let session = self.source.current_session().await?;
        let mut rants = Vec::new();
        if let Some(session) = &session {
            match self.source.new_rants_since(session, &mut cursors.rants).await {
                Ok(batch) => rants = batch,
                Err(SourceError::SessionEnded(_)) => {}
                Err(e) => return Err(e),
            }
        }

        debug!(
            followers = followers.len(),
            subscribers = subscribers.len(),
            rants = rants.len(),
            "Skipped alert backlog"
        );
        self.cursors = cursors;
        self.session = session;
        self.primed = true;
        Ok(())
    }

    /// Run one poll tick.
    ///
    /// If priming failed earlier, this tick primes instead and reports
    /// nothing.
    pub async fn tick(&mut self) -> Result<PollReport, SourceError> {
        if !self.is_primed() {
            self.prime().await?;
            return Ok(PollReport {
                session_changed: self.session.is_some(),
                ..PollReport::default()
            });
        }

        let mut cursors = self.cursors;
        let mut report = PollReport::default();

        let followers = self.source.new_followers_since(&mut cursors.followers).await?;
        let subscribers = self
            .source
            .new_subscribers_since(&mut cursors.subscribers)
            .await?;

        let mut session = self.session.clone();
        let mut fresh_session = false;
        if session.is_none() {
            session = self.source.current_session().await?;
            if let Some(found) = &session {
                info!(session = %found.id, title = ?found.title, "Found livestream");
                cursors.rants = Cursor::new();
                fresh_session = true;
                report.session_changed = true;
            }
        }

        let mut rants = Vec::new();
        if let Some(current) = &session {
            match self.source.new_rants_since(current, &mut cursors.rants).await {
                Ok(batch) if fresh_session && self.skip_backlog => {
                    debug!(rants = batch.len(), "Skipped rant backlog of new livestream");
                }
                Ok(batch) => rants = batch,
                Err(SourceError::SessionEnded(id)) => {
                    info!(session = %id, "Livestream ended");
                    session = None;
                    report.session_changed = true;
                }
                Err(e) => return Err(e),
            }
        }

        self.cursors = cursors;
        self.session = session;

        report.followers = followers.len();
        report.subscribers = subscribers.len();
        report.rants = rants.len();
        self.queues.extend(Category::Follower, followers);
        self.queues.extend(Category::Subscriber, subscribers);
        self.queues.extend(Category::Rant, rants);

        if report.total() > 0 {
            debug!(
                followers = report.followers,
                subscribers = report.subscribers,
                rants = report.rants,
                "Queued new alerts"
            );
        }
        Ok(report)
    }

    /// Run one tick, logging faults instead of returning them.
    pub async fn tick_logged(&mut self) -> Result<PollReport, SourceError> {
        let result = self.tick().await;
        if let Err(e) = &result {
            warn!(source = %self.source.name(), error = %e, "Poll failed, skipping this tick");
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use parking_lot::Mutex;

    use super::*;
    use crate::event::Event;
    use crate::source::SourceResult;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    /// Scripted in-memory source. Events carry timestamps so cursors behave
    /// like the real API.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub followers: Mutex<Vec<(DateTime<Utc>, Event)>>,
        pub subscribers: Mutex<Vec<(DateTime<Utc>, Event)>>,
        pub rants: Mutex<Vec<(DateTime<Utc>, Event)>>,
        pub session: Mutex<Option<SessionHandle>>,
        pub faults: Mutex<VecDeque<SourceError>>,
        pub fail_rants: Mutex<Option<SourceError>>,
        pub min_interval: Duration,
        /// When set, the minimum interval follows the last applied refresh
        /// the way a response cache would.
        pub follows_refresh: bool,
        pub applied: Mutex<Option<(String, Duration)>>,
    }

    impl FakeSource {
        fn next_fault(&self) -> SourceResult<()> {
            match self.faults.lock().pop_front() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl EventSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        fn min_poll_interval(&self) -> Duration {
            match &*self.applied.lock() {
                Some((_, refresh)) if self.follows_refresh => {
                    refresh.saturating_sub(Duration::from_millis(500))
                }
                _ => self.min_interval,
            }
        }

        fn apply_settings(&self, api_url: &str, refresh: Duration) -> crate::Result<()> {
            *self.applied.lock() = Some((api_url.to_string(), refresh));
            Ok(())
        }

        async fn new_followers_since(&self, cursor: &mut Cursor) -> SourceResult<Vec<Event>> {
            self.next_fault()?;
            Ok(cursor.take_new(self.followers.lock().clone()))
        }

        async fn new_subscribers_since(&self, cursor: &mut Cursor) -> SourceResult<Vec<Event>> {
            self.next_fault()?;
            Ok(cursor.take_new(self.subscribers.lock().clone()))
        }

        async fn current_session(&self) -> SourceResult<Option<SessionHandle>> {
            self.next_fault()?;
            Ok(self.session.lock().clone())
        }

        async fn new_rants_since(
            &self,
            session: &SessionHandle,
            cursor: &mut Cursor,
        ) -> SourceResult<Vec<Event>> {
            self.next_fault()?;
            if let Some(e) = self.fail_rants.lock().clone() {
                return Err(e);
            }
            if self.session.lock().as_ref() != Some(session) {
                return Err(SourceError::SessionEnded(session.id.clone()));
            }
            Ok(cursor.take_new(self.rants.lock().clone()))
        }
    }

    fn poller(source: &Arc<FakeSource>, skip_backlog: bool) -> (Poller, QueueSet) {
        let queues = QueueSet::new(None);
        let poller = Poller::new(source.clone(), queues.clone(), skip_backlog);
        (poller, queues)
    }

    #[tokio::test]
    async fn test_tick_appends_in_order() {
        let source = Arc::new(FakeSource::default());
        source.followers.lock().extend([
            (ts(2), Event::follower("second")),
            (ts(1), Event::follower("first")),
        ]);
        source
            .subscribers
            .lock()
            .push((ts(1), Event::subscriber("ann", 550)));
        let (mut poller, queues) = poller(&source, false);

        let report = poller.tick().await.unwrap();
        assert_eq!(report.followers, 2);
        assert_eq!(report.subscribers, 1);
        assert_eq!(report.rants, 0);

        let follower_queue = queues.get(Category::Follower).lock();
        let names: Vec<&str> = follower_queue.iter().map(Event::username).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_fault_leaves_queues_and_cursors_unchanged() {
        let source = Arc::new(FakeSource::default());
        source.followers.lock().push((ts(1), Event::follower("a")));
        source
            .subscribers
            .lock()
            .push((ts(1), Event::subscriber("b", 100)));
        let (mut poller, queues) = poller(&source, false);

        source.faults.lock().push_back(SourceError::connectivity("timed out"));
        let err = poller.tick().await.unwrap_err();
        assert!(err.is_fault());
        assert_eq!(queues.len(Category::Follower), 0);
        assert_eq!(queues.len(Category::Subscriber), 0);
        assert_eq!(poller.cursors(), Cursors::default());

        // Next tick recovers everything.
        let report = poller.tick().await.unwrap();
        assert_eq!(report.total(), 2);
    }

    #[tokio::test]
    async fn test_partial_fault_commits_nothing() {
        let source = Arc::new(FakeSource::default());
        source.followers.lock().push((ts(1), Event::follower("a")));
        *source.session.lock() = Some(SessionHandle::new("live"));
        source.rants.lock().push((ts(1), Event::rant("r", "hi", 100)));
        *source.fail_rants.lock() = Some(SourceError::auth("bad key"));
        let (mut poller, queues) = poller(&source, false);

        let err = poller.tick().await.unwrap_err();
        assert_eq!(err, SourceError::auth("bad key"));
        assert_eq!(queues.len(Category::Follower), 0);
        assert_eq!(queues.len(Category::Rant), 0);
        assert!(poller.session().is_none());

        *source.fail_rants.lock() = None;
        let report = poller.tick().await.unwrap();
        assert_eq!(report.followers, 1);
        assert_eq!(report.rants, 1);
    }

    #[tokio::test]
    async fn test_session_resolved_before_rants() {
        let source = Arc::new(FakeSource::default());
        let (mut poller, queues) = poller(&source, false);

        let report = poller.tick().await.unwrap();
        assert!(!report.session_changed);
        assert!(poller.session().is_none());

        *source.session.lock() = Some(SessionHandle::new("live"));
        source.rants.lock().push((ts(5), Event::rant("bo", "hi", 100)));
        let report = poller.tick().await.unwrap();
        assert!(report.session_changed);
        assert_eq!(report.rants, 1);
        assert_eq!(queues.len(Category::Rant), 1);
    }

    #[tokio::test]
    async fn test_ended_session_is_re_resolved() {
        let source = Arc::new(FakeSource::default());
        *source.session.lock() = Some(SessionHandle::new("one"));
        let (mut poller, _queues) = poller(&source, false);
        poller.tick().await.unwrap();
        assert_eq!(poller.session().map(|s| s.id.as_str()), Some("one"));

        *source.session.lock() = Some(SessionHandle::new("two"));
        let report = poller.tick().await.unwrap();
        assert!(report.session_changed);
        assert!(poller.session().is_none());

        poller.tick().await.unwrap();
        assert_eq!(poller.session().map(|s| s.id.as_str()), Some("two"));
    }

    #[tokio::test]
    async fn test_prime_skips_backlog() {
        let source = Arc::new(FakeSource::default());
        source.followers.lock().push((ts(1), Event::follower("old")));
        *source.session.lock() = Some(SessionHandle::new("live"));
        source.rants.lock().push((ts(1), Event::rant("old", "x", 100)));
        let (mut poller, queues) = poller(&source, true);

        poller.prime().await.unwrap();
        assert_eq!(queues.len(Category::Follower), 0);

        source.followers.lock().push((ts(2), Event::follower("new")));
        source.rants.lock().push((ts(2), Event::rant("new", "y", 200)));
        let report = poller.tick().await.unwrap();
        assert_eq!(report.followers, 1);
        assert_eq!(report.rants, 1);
        assert_eq!(
            queues.get(Category::Follower).lock().dequeue_head(),
            Some(Event::follower("new"))
        );
    }

    #[tokio::test]
    async fn test_failed_prime_retried_on_tick() {
        let source = Arc::new(FakeSource::default());
        source.followers.lock().push((ts(1), Event::follower("old")));
        let (mut poller, queues) = poller(&source, true);

        source.faults.lock().push_back(SourceError::connectivity("down"));
        assert!(poller.prime().await.is_err());
        assert!(!poller.is_primed());

        let report = poller.tick().await.unwrap();
        assert_eq!(report.total(), 0);
        assert!(poller.is_primed());
        assert_eq!(queues.len(Category::Follower), 0);

        source.followers.lock().push((ts(2), Event::follower("new")));
        assert_eq!(poller.tick().await.unwrap().followers, 1);
    }

    #[tokio::test]
    async fn test_new_session_rant_backlog_skipped() {
        let source = Arc::new(FakeSource::default());
        let (mut poller, queues) = poller(&source, true);
        poller.prime().await.unwrap();

        *source.session.lock() = Some(SessionHandle::new("live"));
        source.rants.lock().push((ts(1), Event::rant("early", "x", 100)));
        let report = poller.tick().await.unwrap();
        assert_eq!(report.rants, 0);
        assert_eq!(queues.len(Category::Rant), 0);

        source.rants.lock().push((ts(2), Event::rant("later", "y", 100)));
        assert_eq!(poller.tick().await.unwrap().rants, 1);
    }
}
