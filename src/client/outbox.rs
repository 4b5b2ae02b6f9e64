use std::collections::VecDeque;

use crate::client::codec::Outbound;

/// Bounded FIFO of messages sent while the connection was not open.
/// When full, the oldest message makes room for the newest.
pub(crate) struct Outbox {
    queue: VecDeque<Outbound>,
    capacity: usize,
}

impl Outbox {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Queues `message` and returns the message it evicted, if any.
    pub(crate) fn push(&mut self, message: Outbound) -> Option<Outbound> {
        if self.capacity == 0 {
            return Some(message);
        }
        let evicted = if self.queue.len() >= self.capacity {
            self.queue.pop_front()
        } else {
            None
        };
        self.queue.push_back(message);
        evicted
    }

    pub(crate) fn pop_front(&mut self) -> Option<Outbound> {
        self.queue.pop_front()
    }

    /// Puts back a message whose transmission failed, ahead of the rest.
    pub(crate) fn push_front(&mut self, message: Outbound) {
        self.queue.push_front(message);
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}
