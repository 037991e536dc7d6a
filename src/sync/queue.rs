//! Bounded blocking FIFO queue.
//!
//! `dequeue` on an empty queue blocks the calling thread until an entry
//! arrives; `enqueue` on a full queue blocks until a slot opens. Capacity
//! exhaustion is therefore back-pressure, not an error: callers size the
//! queue for their burst rate. Single-element operations are FIFO; batched
//! operations preserve order within the batch but may interleave with
//! other threads between capacity windows.

use crate::sync::bounded::{Bounded, Slots};

/// Circular buffer storage: an enqueue cursor, a dequeue cursor, and a
/// live count to tell full from empty.
pub(crate) struct Ring<T> {
    contents: Box<[T]>,
    // next slot to dequeue from
    head: usize,
    // next slot to enqueue into
    tail: usize,
    len: usize,
}

impl<T: Copy + Default> Slots<T> for Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Ring {
            contents: vec![T::default(); capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    fn put(&mut self, item: T) {
        self.contents[self.tail] = item;
        self.tail += 1;
        if self.tail == self.contents.len() {
            self.tail = 0;
        }
        self.len += 1;
    }

    fn take(&mut self) -> T {
        let item = self.contents[self.head];
        self.head += 1;
        if self.head == self.contents.len() {
            self.head = 0;
        }
        self.len -= 1;
        item
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Bounded blocking queue of `Copy` values.
pub struct BlockingQueue<T: Copy + Default> {
    inner: Bounded<T, Ring<T>>,
}

impl<T: Copy + Default> BlockingQueue<T> {
    /// Create a queue holding at most `capacity` entries. Storage is
    /// allocated once, up front.
    pub fn new(capacity: usize) -> Self {
        BlockingQueue {
            inner: Bounded::new(capacity),
        }
    }

    /// Block until the item can be inserted.
    pub fn enqueue(&self, item: T) {
        self.inner.put_one(item);
    }

    /// Block until every item has been inserted. Partial progress is made
    /// whenever at least one slot is free.
    pub fn enqueue_many(&self, items: &[T]) {
        self.inner.put_many(items);
    }

    /// Block until an entry is available and return it.
    pub fn dequeue(&self) -> T {
        self.inner.take_one()
    }

    /// Block until `out` has been filled.
    pub fn dequeue_many(&self, out: &mut [T]) {
        self.inner.take_many(out);
    }

    /// Wake every blocked thread so it can re-examine its situation. Needed
    /// when a thread in a consumer pool drops out, to prevent its peers
    /// sleeping through work they could take over.
    pub fn kick(&self) {
        self.inner.kick();
    }

    /// Current entry count. Diagnostic only.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when no entries are stored. Diagnostic only.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn fill_and_drain(capacity: usize) {
        let queue = BlockingQueue::new(capacity);
        let values: Vec<usize> = (0..capacity).collect();

        // One at a time.
        for &v in &values {
            queue.enqueue(v);
        }
        for &v in &values {
            assert_eq!(queue.dequeue(), v);
        }

        // All at once.
        queue.enqueue_many(&values);
        for &v in &values {
            assert_eq!(queue.dequeue(), v);
        }
    }

    #[test]
    fn basic_fifo_order() {
        let queue = BlockingQueue::new(16);

        queue.enqueue(1i32);
        assert_eq!(queue.dequeue(), 1);

        queue.enqueue(1);
        queue.enqueue(2);
        assert_eq!(queue.dequeue(), 1);
        assert_eq!(queue.dequeue(), 2);

        fill_and_drain(1);
        fill_and_drain(2);
        fill_and_drain(3);
        fill_and_drain(4);
    }

    #[test]
    fn wraparound_keeps_order() {
        let queue = BlockingQueue::new(4);
        for round in 0..10usize {
            queue.enqueue(2 * round);
            queue.enqueue(2 * round + 1);
            assert_eq!(queue.dequeue(), 2 * round);
            assert_eq!(queue.dequeue(), 2 * round + 1);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn batched_dequeue_matches_batched_enqueue() {
        let queue = BlockingQueue::new(8);
        let values: Vec<u32> = (0..8).collect();
        queue.enqueue_many(&values);

        let mut out = [0u32; 8];
        queue.dequeue_many(&mut out);
        assert_eq!(&out[..], &values[..]);
    }

    #[test]
    fn batch_larger_than_capacity_transfers_in_windows() {
        let queue = Arc::new(BlockingQueue::new(4));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut out = vec![0usize; 64];
                queue.dequeue_many(&mut out);
                out
            })
        };

        let values: Vec<usize> = (0..64).collect();
        queue.enqueue_many(&values);

        let received = consumer.join().unwrap();
        assert_eq!(received, values);
    }

    #[test]
    fn enqueue_blocks_at_capacity() {
        let queue = Arc::new(BlockingQueue::new(2));
        queue.enqueue(0usize);
        queue.enqueue(1);

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.enqueue(2))
        };

        // The producer should be parked on the full queue.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.dequeue(), 0);
        producer.join().unwrap();
        assert_eq!(queue.dequeue(), 1);
        assert_eq!(queue.dequeue(), 2);
    }

    #[test]
    fn cross_thread_transfer_preserves_order() {
        let queue = Arc::new(BlockingQueue::new(8));
        const COUNT: usize = 1000;

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut previous = None;
                for _ in 0..COUNT {
                    let value: usize = queue.dequeue();
                    if let Some(p) = previous {
                        assert!(value > p, "single consumer must observe FIFO order");
                    }
                    previous = Some(value);
                }
            })
        };

        for i in 0..COUNT {
            queue.enqueue(i);
        }
        consumer.join().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn kick_leaves_contents_intact() {
        let queue = BlockingQueue::new(4);
        queue.enqueue(7usize);
        queue.kick();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue(), 7);
    }
}
