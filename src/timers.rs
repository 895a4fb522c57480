//! Deferred work owned by the controller
//!
//! Impulse releases and recognizer restarts are kept as plain deadlines so
//! the event loop can sleep until the earliest one, and tests can fire them
//! with explicit instants.

use std::collections::BTreeMap;

use tokio::time::Instant;

/// Handle to a scheduled entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Deadline-ordered queue; entries sharing a deadline fire in schedule order
#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    entries: BTreeMap<(Instant, TimerId), T>,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
        }
    }

    pub fn schedule(&mut self, due: Instant, item: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.insert((due, id), item);
        id
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(due, _)| *due)
    }

    /// Remove a scheduled entry. Returns `None` if it already fired.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let key = self.entries.keys().find(|(_, entry)| *entry == id).copied()?;
        self.entries.remove(&key)
    }

    /// Remove and return every entry due at or before `now`
    pub fn drain_due(&mut self, now: Instant) -> Vec<T> {
        let mut fired = Vec::new();
        while let Some(entry) = self.entries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            fired.push(entry.remove());
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_drains_in_deadline_order() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule(t0 + Duration::from_millis(200), "late");
        queue.schedule(t0 + Duration::from_millis(100), "early");
        queue.schedule(t0 + Duration::from_millis(100), "early-second");

        assert_eq!(queue.next_deadline(), Some(t0 + Duration::from_millis(100)));
        assert!(queue.drain_due(t0 + Duration::from_millis(99)).is_empty());
        assert_eq!(
            queue.drain_due(t0 + Duration::from_millis(150)),
            vec!["early", "early-second"]
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_due(t0 + Duration::from_secs(1)), vec!["late"]);
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn test_cancel_removes_only_that_entry() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        let first = queue.schedule(t0 + Duration::from_millis(100), "first");
        let second = queue.schedule(t0 + Duration::from_millis(100), "second");

        assert_eq!(queue.cancel(first), Some("first"));
        assert_eq!(queue.cancel(first), None);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.drain_due(t0 + Duration::from_millis(100)), vec!["second"]);
        assert_eq!(queue.cancel(second), None);
    }
}
