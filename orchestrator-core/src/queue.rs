//! Four-level FIFO-within-level priority queue. See `spec.md` §4.2.

use crate::message::{Message, Priority};
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct PriorityQueue {
    buckets: [VecDeque<Message>; 4],
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, message: Message) {
        self.buckets[message.priority.index()].push_back(message);
    }

    /// Drain all buckets in `Urgent, High, Normal, Low` order, preserving
    /// FIFO order within each bucket.
    pub fn dequeue_all(&mut self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.size());
        for priority in Priority::ALL_HIGH_TO_LOW {
            out.extend(self.buckets[priority.index()].drain(..));
        }
        out
    }

    pub fn size(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    pub fn size_at(&self, priority: Priority) -> usize {
        self.buckets[priority.index()].len()
    }

    /// The next message `dequeue_all` would return first, without removing it.
    pub fn peek(&self) -> Option<&Message> {
        Priority::ALL_HIGH_TO_LOW
            .iter()
            .find_map(|p| self.buckets[p.index()].front())
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
