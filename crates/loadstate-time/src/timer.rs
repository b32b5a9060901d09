//! Deadline-ordered timer queue
//!
//! Timers are identified by a [`TimerId`] handle. Cancelling a handle is
//! O(1); the heap entry is dropped lazily the next time it reaches the head.
//! Timers with equal deadlines fire in scheduling order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use loadstate_core::Timestamp;

/// Handle of a scheduled timer
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// A timer that reached its deadline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Due<K> {
    pub id: TimerId,
    pub deadline: Timestamp,
    pub key: K,
}

struct Entry<K> {
    deadline: Timestamp,
    id: TimerId,
    key: K,
}

impl<K> PartialEq for Entry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl<K> Eq for Entry<K> {}

impl<K> PartialOrd for Entry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Entry<K> {
    // Reversed: BinaryHeap is a max-heap, the earliest deadline must win
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Timer queue keyed by caller-defined data
pub struct TimerQueue<K> {
    heap: BinaryHeap<Entry<K>>,
    live: HashSet<TimerId>,
    next_id: u64,
}

impl<K> TimerQueue<K> {
    pub fn new() -> Self {
        TimerQueue {
            heap: BinaryHeap::new(),
            live: HashSet::new(),
            next_id: 0,
        }
    }

    /// Schedule a timer firing at `deadline`
    pub fn schedule(&mut self, deadline: Timestamp, key: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.live.insert(id);
        self.heap.push(Entry { deadline, id, key });
        id
    }

    /// Cancel a timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.live.remove(&id)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.live.contains(&id)
    }

    /// Pop the earliest live timer whose deadline is at or before `now`
    pub fn pop_due(&mut self, now: Timestamp) -> Option<Due<K>> {
        self.purge_cancelled();
        if self.heap.peek()?.deadline > now {
            return None;
        }
        let entry = self.heap.pop()?;
        self.live.remove(&entry.id);
        Some(Due {
            id: entry.id,
            deadline: entry.deadline,
            key: entry.key,
        })
    }

    /// Deadline of the earliest live timer
    pub fn next_deadline(&mut self) -> Option<Timestamp> {
        self.purge_cancelled();
        self.heap.peek().map(|entry| entry.deadline)
    }

    /// Number of live timers
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }

    fn purge_cancelled(&mut self) {
        while let Some(head) = self.heap.peek() {
            if self.live.contains(&head.id) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> std::fmt::Debug for TimerQueue<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerQueue")
            .field("live", &self.live.len())
            .field("queued", &self.heap.len())
            .finish()
    }
}
