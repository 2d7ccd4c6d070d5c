//! Typed publish/subscribe topics.
//!
//! Tasks never share mutable structures; they exchange complete records
//! through topics owned by the composition root. Two topic flavors exist:
//!
//! - [`Topic`]: single-slot latest-value semantics with a generational
//!   sequence number, so a subscriber can detect how many publications it
//!   missed since its last read.
//! - [`QueuedTopic`]: a bounded FIFO for records that must not be
//!   overwritten before consumption (commands, action requests, events).
//!   Overflow drops the oldest record and counts the loss.
//!
//! Scheduling is single-threaded cooperative; interior mutability uses
//! `core::cell`, so a topic set must stay on one task executor. The only
//! interrupt-context entry point in the system (the power button) uses a
//! dedicated `heapless::spsc::Queue` instead, see the commander.

mod topics;

pub use topics::Topics;

use core::cell::{Cell, RefCell};
use heapless::Deque;

/// Single-slot topic with generational sequence numbers.
#[derive(Debug)]
pub struct Topic<T: Clone> {
    slot: RefCell<Option<T>>,
    generation: Cell<u32>,
    publication_order: Cell<u64>,
}

impl<T: Clone> Topic<T> {
    pub const fn new() -> Self {
        Self {
            slot: RefCell::new(None),
            generation: Cell::new(0),
            publication_order: Cell::new(0),
        }
    }

    /// Publish a new record, replacing the previous one.
    pub fn publish(&self, value: T) {
        *self.slot.borrow_mut() = Some(value);
        self.generation.set(self.generation.get().wrapping_add(1));
    }

    /// Publish with a bus-wide ordering stamp (see [`Topics::next_order`]).
    ///
    /// Output modules use the stamps to verify cross-topic publication
    /// order (`actuator_armed` strictly before the mode and status
    /// records within a tick).
    pub fn publish_ordered(&self, value: T, order: u64) {
        self.publish(value);
        self.publication_order.set(order);
    }

    /// Ordering stamp of the latest `publish_ordered`.
    pub fn publication_order(&self) -> u64 {
        self.publication_order.get()
    }

    /// Generation counter; increments on every publish.
    pub fn generation(&self) -> u32 {
        self.generation.get()
    }

    /// Clone the latest record without generation tracking.
    pub fn read(&self) -> Option<T> {
        self.slot.borrow().clone()
    }

    /// Create a subscription that considers already-published data unread.
    pub fn subscribe(&self) -> Subscription<'_, T> {
        Subscription {
            topic: self,
            last_seen: Cell::new(0),
        }
    }
}

impl<T: Clone> Default for Topic<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read handle with per-subscriber generation tracking.
#[derive(Debug)]
pub struct Subscription<'t, T: Clone> {
    topic: &'t Topic<T>,
    last_seen: Cell<u32>,
}

impl<'t, T: Clone> Subscription<'t, T> {
    /// True if a publication happened since the last `copy`/`update`.
    pub fn updated(&self) -> bool {
        self.topic.generation() != self.last_seen.get()
    }

    /// Copy the latest record into `dest` if there is unread data.
    pub fn update(&self, dest: &mut T) -> bool {
        if !self.updated() {
            return false;
        }
        if let Some(value) = self.topic.read() {
            *dest = value;
            self.last_seen.set(self.topic.generation());
            true
        } else {
            false
        }
    }

    /// Clone the latest record, marking it read.
    pub fn copy(&self) -> Option<T> {
        self.last_seen.set(self.topic.generation());
        self.topic.read()
    }

    /// Publications missed since the last read (0 when caught up or when
    /// only one publication is pending).
    pub fn missed(&self) -> u32 {
        self.topic
            .generation()
            .wrapping_sub(self.last_seen.get())
            .saturating_sub(1)
    }

    pub fn last_generation(&self) -> u32 {
        self.last_seen.get()
    }
}

/// Bounded FIFO topic. Drops the oldest record on overflow.
#[derive(Debug)]
pub struct QueuedTopic<T, const N: usize> {
    queue: RefCell<Deque<T, N>>,
    lost: Cell<u32>,
}

impl<T, const N: usize> QueuedTopic<T, N> {
    pub const fn new() -> Self {
        Self {
            queue: RefCell::new(Deque::new()),
            lost: Cell::new(0),
        }
    }

    /// Enqueue a record. Returns false if an older record had to be dropped.
    pub fn publish(&self, value: T) -> bool {
        let mut queue = self.queue.borrow_mut();
        if queue.is_full() {
            queue.pop_front();
            self.lost.set(self.lost.get() + 1);
            let _ = queue.push_back(value);
            false
        } else {
            let _ = queue.push_back(value);
            true
        }
    }

    /// Dequeue the oldest record.
    pub fn pop(&self) -> Option<T> {
        self.queue.borrow_mut().pop_front()
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Records dropped to overflow since boot.
    pub fn lost(&self) -> u32 {
        self.lost.get()
    }
}

impl<T, const N: usize> Default for QueuedTopic<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_topic_has_no_data() {
        let topic: Topic<u32> = Topic::new();
        let sub = topic.subscribe();
        assert_eq!(topic.generation(), 0);
        assert!(!sub.updated());
        assert!(sub.copy().is_none());
    }

    #[test]
    fn subscription_sees_each_publication_once() {
        let topic: Topic<u32> = Topic::new();
        let sub = topic.subscribe();

        topic.publish(7);
        assert!(sub.updated());
        assert_eq!(sub.copy(), Some(7));
        assert!(!sub.updated());

        topic.publish(8);
        let mut value = 0;
        assert!(sub.update(&mut value));
        assert_eq!(value, 8);
        assert!(!sub.update(&mut value));
    }

    #[test]
    fn late_subscriber_sees_existing_data() {
        let topic: Topic<u32> = Topic::new();
        topic.publish(1);
        topic.publish(2);

        let sub = topic.subscribe();
        assert!(sub.updated());
        assert_eq!(sub.copy(), Some(2));
    }

    #[test]
    fn missed_generations_are_counted() {
        let topic: Topic<u32> = Topic::new();
        let sub = topic.subscribe();

        topic.publish(1);
        assert_eq!(sub.missed(), 0);
        topic.publish(2);
        topic.publish(3);
        assert_eq!(sub.missed(), 2);

        sub.copy();
        assert_eq!(sub.missed(), 0);
    }

    #[test]
    fn queued_topic_is_fifo() {
        let queue: QueuedTopic<u32, 4> = QueuedTopic::new();
        assert!(queue.is_empty());

        queue.publish(1);
        queue.publish(2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn queued_topic_overflow_drops_oldest() {
        let queue: QueuedTopic<u32, 2> = QueuedTopic::new();
        assert!(queue.publish(1));
        assert!(queue.publish(2));
        assert!(!queue.publish(3));

        assert_eq!(queue.lost(), 1);
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
    }
}
