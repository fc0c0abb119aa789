// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Cancellable timers on a virtual clock.
//!
//! The engine never sleeps. Deferred work is pushed onto a [`TimerQueue`] with an
//! absolute due time, and whoever drives the engine pops due entries as the clock
//! advances. Entries due at the same instant pop in insertion order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::time::Duration;

/// Identifies a scheduled timer so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// A priority queue of tasks keyed by due time.
///
/// Cancellation is lazy: the task payload is dropped immediately, and the stale heap
/// entry is skipped when it reaches the top.
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<(Duration, u64)>>,
    tasks: HashMap<u64, T>,
    next_id: u64,
}

impl<T> TimerQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            tasks: HashMap::new(),
            next_id: 1,
        }
    }

    /// Schedules the task to run at the given absolute time.
    pub fn schedule(&mut self, due: Duration, task: T) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Reverse((due, id)));
        self.tasks.insert(id, task);
        TimerId(id)
    }

    /// Cancels the timer. Returns true if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.tasks.remove(&id.0).is_some()
    }

    /// Returns true if the timer has neither fired nor been cancelled.
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.tasks.contains_key(&id.0)
    }

    /// Pops the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(Duration, T)> {
        while let Some(Reverse((due, id))) = self.heap.peek().copied() {
            if due > now {
                return None;
            }
            self.heap.pop();
            if let Some(task) = self.tasks.remove(&id) {
                return Some((due, task));
            }
        }
        None
    }

    /// Returns the due time of the earliest pending task.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        while let Some(Reverse((due, id))) = self.heap.peek().copied() {
            if self.tasks.contains_key(&id) {
                return Some(due);
            }
            self.heap.pop();
        }
        None
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drops every pending task.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.tasks.clear();
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TimerQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_pops_in_due_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(30), "c");
        queue.schedule(ms(10), "a");
        queue.schedule(ms(20), "b");

        assert_eq!(queue.pop_due(ms(5)), None);
        assert_eq!(queue.pop_due(ms(25)), Some((ms(10), "a")));
        assert_eq!(queue.pop_due(ms(25)), Some((ms(20), "b")));
        assert_eq!(queue.pop_due(ms(25)), None);
        assert_eq!(queue.pop_due(ms(30)), Some((ms(30), "c")));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_same_deadline_is_fifo() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(10), 1);
        queue.schedule(ms(10), 2);
        queue.schedule(ms(10), 3);

        let order: Vec<i32> = std::iter::from_fn(|| queue.pop_due(ms(10)).map(|(_, t)| t)).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_cancel() {
        let mut queue = TimerQueue::new();
        let first = queue.schedule(ms(10), "first");
        queue.schedule(ms(20), "second");

        assert!(queue.is_pending(first));
        assert!(queue.cancel(first));
        assert!(!queue.is_pending(first));
        assert!(!queue.cancel(first));

        assert_eq!(queue.next_deadline(), Some(ms(20)));
        assert_eq!(queue.pop_due(ms(100)), Some((ms(20), "second")));
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn test_clear() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(ms(1), ());
        queue.clear();
        assert!(!queue.is_pending(id));
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.pop_due(ms(10)), None);
    }
}
