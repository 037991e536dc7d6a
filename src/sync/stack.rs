//! Bounded blocking LIFO stack.
//!
//! Same monitor and capacity behavior as the queue, with removal in
//! last-in-first-out order. The scheduler uses it as the free list: the
//! most recently returned record is the most likely to still be cache-hot
//! when the next submission pops it.

use crate::sync::bounded::{Bounded, Slots};

/// Downward-growing array storage.
pub(crate) struct Pile<T> {
    contents: Box<[T]>,
    top: usize,
}

impl<T: Copy + Default> Slots<T> for Pile<T> {
    fn with_capacity(capacity: usize) -> Self {
        Pile {
            contents: vec![T::default(); capacity].into_boxed_slice(),
            top: 0,
        }
    }

    fn put(&mut self, item: T) {
        self.contents[self.top] = item;
        self.top += 1;
    }

    fn take(&mut self) -> T {
        self.top -= 1;
        self.contents[self.top]
    }

    fn len(&self) -> usize {
        self.top
    }
}

/// Bounded blocking stack of `Copy` values.
pub struct BlockingStack<T: Copy + Default> {
    inner: Bounded<T, Pile<T>>,
}

impl<T: Copy + Default> BlockingStack<T> {
    /// Create a stack holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        BlockingStack {
            inner: Bounded::new(capacity),
        }
    }

    /// Block until the item can be inserted.
    pub fn push(&self, item: T) {
        self.inner.put_one(item);
    }

    /// Block until every item has been inserted.
    pub fn push_many(&self, items: &[T]) {
        self.inner.put_many(items);
    }

    /// Block until an entry is available and return it.
    pub fn pop(&self) -> T {
        self.inner.take_one()
    }

    /// Block until `out` has been filled.
    pub fn pop_many(&self, out: &mut [T]) {
        self.inner.take_many(out);
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

    #[test]
    fn basic_lifo_order() {
        let stack = BlockingStack::new(16);

        stack.push(1i32);
        assert_eq!(stack.pop(), 1);

        stack.push(1);
        stack.push(2);
        assert_eq!(stack.pop(), 2);
        assert_eq!(stack.pop(), 1);
    }

    #[test]
    fn fill_then_drain_reverses() {
        for capacity in 1..=4usize {
            let stack = BlockingStack::new(capacity);
            let values: Vec<usize> = (0..capacity).collect();

            stack.push_many(&values);
            for &v in values.iter().rev() {
                assert_eq!(stack.pop(), v);
            }
            assert!(stack.is_empty());
        }
    }

    #[test]
    fn batched_pop_drains_from_the_top() {
        let stack = BlockingStack::new(8);
        stack.push_many(&[0u32, 1, 2, 3]);

        let mut out = [0u32; 4];
        stack.pop_many(&mut out);
        assert_eq!(out, [3, 2, 1, 0]);
    }

    #[test]
    fn push_blocks_at_capacity() {
        let stack = Arc::new(BlockingStack::new(1));
        stack.push(10usize);

        let producer = {
            let stack = Arc::clone(&stack);
            thread::spawn(move || stack.push(20))
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(stack.len(), 1);

        assert_eq!(stack.pop(), 10);
        producer.join().unwrap();
        assert_eq!(stack.pop(), 20);
    }

    #[test]
    fn cross_thread_transfer_conserves_items() {
        let stack = Arc::new(BlockingStack::new(4));
        const COUNT: usize = 500;

        let consumer = {
            let stack = Arc::clone(&stack);
            thread::spawn(move || {
                let mut sum = 0usize;
                for _ in 0..COUNT {
                    sum += stack.pop();
                }
                sum
            })
        };

        for i in 1..=COUNT {
            stack.push(i);
        }

        assert_eq!(consumer.join().unwrap(), COUNT * (COUNT + 1) / 2);
        assert!(stack.is_empty());
    }
}
