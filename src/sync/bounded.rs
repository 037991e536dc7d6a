// bounded.rs — monitor machinery shared by the blocking queue and stack.
//
// The two public containers differ only in removal order, so the mutex,
// the two condition variables, and the windowed batch-transfer loops live
// here once, generic over the storage discipline.

use std::marker::PhantomData;
use std::sync::{Condvar, Mutex};

/// Storage discipline plugged into [`Bounded`]. Implementations are plain
/// single-threaded containers; `Bounded` provides all synchronization.
pub(crate) trait Slots<T> {
    fn with_capacity(capacity: usize) -> Self;
    /// Store one item. Never called when `len() == capacity`.
    fn put(&mut self, item: T);
    /// Remove one item. Never called when `len() == 0`.
    fn take(&mut self) -> T;
    fn len(&self) -> usize;
}

/// Fixed-capacity blocking container. Insertion blocks while full, removal
/// blocks while empty. There is no fairness guarantee between concurrent
/// producers or consumers.
pub(crate) struct Bounded<T, S: Slots<T>> {
    state: Mutex<S>,
    item_added: Condvar,
    item_removed: Condvar,
    capacity: usize,
    _items: PhantomData<fn(T) -> T>,
}

impl<T: Copy, S: Slots<T>> Bounded<T, S> {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cannot have a queue or stack of size 0");
        Bounded {
            state: Mutex::new(S::with_capacity(capacity)),
            item_added: Condvar::new(),
            item_removed: Condvar::new(),
            capacity,
            _items: PhantomData,
        }
    }

    /// Block until the item can be inserted.
    pub(crate) fn put_one(&self, item: T) {
        let mut state = self.state.lock().unwrap();
        while state.len() == self.capacity {
            state = self.item_removed.wait(state).unwrap();
        }
        state.put(item);
        self.signal_inserted(state.len());
    }

    /// Block until all items have been inserted. Takes whatever window of
    /// free capacity is available (at least one slot) per pass, so other
    /// threads can interleave between windows.
    pub(crate) fn put_many(&self, items: &[T]) {
        let mut remaining = items;
        while !remaining.is_empty() {
            let mut state = self.state.lock().unwrap();
            while state.len() == self.capacity {
                state = self.item_removed.wait(state).unwrap();
            }
            let window = remaining.len().min(self.capacity - state.len());
            for &item in &remaining[..window] {
                state.put(item);
            }
            self.signal_inserted(state.len());
            remaining = &remaining[window..];
        }
    }

    /// Block until an item is available and return it.
    pub(crate) fn take_one(&self) -> T {
        let mut state = self.state.lock().unwrap();
        while state.len() == 0 {
            state = self.item_added.wait(state).unwrap();
        }
        let item = state.take();
        self.signal_removed(state.len());
        item
    }

    /// Block until `out` has been filled, windowing like [`put_many`].
    ///
    /// [`put_many`]: Bounded::put_many
    pub(crate) fn take_many(&self, out: &mut [T]) {
        let mut filled = 0;
        while filled < out.len() {
            let mut state = self.state.lock().unwrap();
            while state.len() == 0 {
                state = self.item_added.wait(state).unwrap();
            }
            let window = (out.len() - filled).min(state.len());
            for slot in &mut out[filled..filled + window] {
                *slot = state.take();
            }
            self.signal_removed(state.len());
            filled += window;
        }
    }

    /// Wake every waiter on both conditions. Used when a consumer thread is
    /// leaving its pool and must not leave peers stranded mid-wait.
    pub(crate) fn kick(&self) {
        let _state = self.state.lock().unwrap();
        self.item_removed.notify_all();
        self.item_added.notify_all();
    }

    /// Number of items currently stored. Diagnostic only: the answer can be
    /// stale by the time the caller looks at it.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().unwrap().len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    // One wakeup on the opposite condition per completed window; when slack
    // remains, also wake a friend on the same side. The friend-wake chains
    // from waiter to waiter, which keeps contention lower than a broadcast.
    fn signal_inserted(&self, len: usize) {
        debug_assert!(len <= self.capacity, "container count exceeded capacity");
        self.item_added.notify_one();
        if len < self.capacity {
            self.item_removed.notify_one();
        }
    }

    fn signal_removed(&self, len: usize) {
        self.item_removed.notify_one();
        if len > 0 {
            self.item_added.notify_one();
        }
    }
}
