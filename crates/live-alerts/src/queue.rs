//! Per-category FIFO queues of pending events.
//!
//! Queues are unbounded unless a cap is configured, in which case the oldest
//! pending event is evicted to make room.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::event::{Category, CategoryMap, Event};

/// Ordered buffer of pending events for one category.
#[derive(Debug)]
pub struct CategoryQueue {
    category: Category,
    events: VecDeque<Event>,
    max_pending: Option<usize>,
    evicted: u64,
}

impl CategoryQueue {
    /// Create an unbounded queue.
    pub fn new(category: Category) -> Self {
        Self::with_cap(category, None)
    }

    /// Create a queue holding at most `max_pending` events (`None` = unbounded).
    pub fn with_cap(category: Category, max_pending: Option<usize>) -> Self {
        Self {
            category,
            events: VecDeque::new(),
            max_pending,
            evicted: 0,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Append an event to the tail.
    ///
    /// Events of another category are ignored; the queue never holds mixed kinds.
    pub fn enqueue(&mut self, event: Event) {
        if event.category() != self.category {
            warn!(
                expected = %self.category,
                actual = %event.category(),
                "Ignoring event routed to the wrong queue"
            );
            return;
        }

        if let Some(cap) = self.max_pending {
            while self.events.len() >= cap.max(1) {
                if let Some(oldest) = self.events.pop_front() {
                    self.evicted += 1;
                    warn!(category = %self.category, event = %oldest, "Queue full, evicting oldest pending alert");
                }
            }
        }

        self.events.push_back(event);
    }

    /// Remove and return the head event, or `None` when empty.
    pub fn dequeue_head(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Whether there is at least one pending event.
    pub fn peek_non_empty(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events evicted by the cap so far.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Change the cap. Existing overflow is trimmed from the head.
    pub fn set_cap(&mut self, max_pending: Option<usize>) {
        self.max_pending = max_pending;
        if let Some(cap) = max_pending {
            let cap = cap.max(1);
            while self.events.len() > cap {
                self.events.pop_front();
                self.evicted += 1;
            }
        }
    }

    /// Pending events, head first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

/// A queue shared between the poller (producer) and one rotator (consumer).
pub type SharedQueue = Arc<Mutex<CategoryQueue>>;

/// The three category queues.
#[derive(Debug, Clone)]
pub struct QueueSet {
    queues: CategoryMap<SharedQueue>,
}

impl QueueSet {
    pub fn new(max_pending: Option<usize>) -> Self {
        Self {
            queues: CategoryMap::from_fn(|c| Arc::new(Mutex::new(CategoryQueue::with_cap(c, max_pending)))),
        }
    }

    pub fn get(&self, category: Category) -> &SharedQueue {
        self.queues.get(category)
    }

    /// Route an event to its category's queue.
    pub fn enqueue(&self, event: Event) {
        self.queues.get(event.category()).lock().enqueue(event);
    }

    /// Append a batch in order. The lock is taken once per batch.
    pub fn extend(&self, category: Category, events: impl IntoIterator<Item = Event>) {
        let mut queue = self.queues.get(category).lock();
        for event in events {
            queue.enqueue(event);
        }
    }

    pub fn len(&self, category: Category) -> usize {
        self.queues.get(category).lock().len()
    }

    pub fn set_cap(&self, max_pending: Option<usize>) {
        for (_, queue) in self.queues.iter() {
            queue.lock().set_cap(max_pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = CategoryQueue::new(Category::Follower);
        assert!(!queue.peek_non_empty());
        assert_eq!(queue.dequeue_head(), None);

        queue.enqueue(Event::follower("a"));
        queue.enqueue(Event::follower("b"));
        queue.enqueue(Event::follower("c"));
        assert!(queue.peek_non_empty());
        assert_eq!(queue.len(), 3);

        let names: Vec<String> = std::iter::from_fn(|| queue.dequeue_head())
            .map(|e| e.username().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_peek_does_not_mutate() {
        let mut queue = CategoryQueue::new(Category::Rant);
        queue.enqueue(Event::rant("a", "hi", 100));
        assert!(queue.peek_non_empty());
        assert!(queue.peek_non_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_wrong_category_ignored() {
        let mut queue = CategoryQueue::new(Category::Subscriber);
        queue.enqueue(Event::follower("a"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut queue = CategoryQueue::with_cap(Category::Follower, Some(2));
        queue.enqueue(Event::follower("a"));
        queue.enqueue(Event::follower("b"));
        queue.enqueue(Event::follower("c"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.evicted(), 1);
        assert_eq!(queue.dequeue_head(), Some(Event::follower("b")));
    }

    #[test]
    fn test_set_cap_trims_head() {
        let mut queue = CategoryQueue::new(Category::Follower);
        for name in ["a", "b", "c", "d"] {
            queue.enqueue(Event::follower(name));
        }
        queue.set_cap(Some(1));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.evicted(), 3);
        assert_eq!(queue.dequeue_head(), Some(Event::follower("d")));
    }

    #[test]
    fn test_queue_set_routes_by_category() {
        let queues = QueueSet::new(None);
        queues.enqueue(Event::follower("f"));
        queues.enqueue(Event::subscriber("s", 500));
        queues.enqueue(Event::rant("r", "hey", 100));
        queues.extend(Category::Follower, vec![Event::follower("g")]);

        assert_eq!(queues.len(Category::Follower), 2);
        assert_eq!(queues.len(Category::Subscriber), 1);
        assert_eq!(queues.len(Category::Rant), 1);
        assert!(
            queues
                .get(Category::Follower)
                .lock()
                .iter()
                .all(|e| e.category() == Category::Follower)
        );
    }
}
