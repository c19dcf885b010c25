use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

struct QueueState<T> {
    items: VecDeque<T>,
    canceled: bool,
}

/// Blocking FIFO queue shared between a producer and a pool of worker threads.
///
/// Cancellation wakes every waiter; `wait_and_pop` then returns `None`, which
/// workers treat as "no more work, exit the loop".
pub struct JobQueue<T> {
    state: Mutex<QueueState<T>>,
    cond: Condvar,
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                canceled: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn push(&self, item: T) {
        self.state.lock().items.push_back(item);
        self.cond.notify_one();
    }

    /// Blocks until an item is available or the queue is canceled.
    pub fn wait_and_pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if state.canceled {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            self.cond.wait(&mut state);
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        if state.canceled {
            return None;
        }
        state.items.pop_front()
    }

    pub fn cancel(&self) {
        self.state.lock().canceled = true;
        self.cond.notify_all();
    }

    /// Clears the cancellation flag so a new set of workers can be started.
    /// Items queued before the cancellation are kept.
    pub fn resume(&self) {
        self.state.lock().canceled = false;
        self.cond.notify_all();
    }

    /// Removes every queued item, regardless of the cancellation state.
    pub fn drain(&self) -> Vec<T> {
        self.state.lock().items.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_canceled(&self) -> bool {
        self.state.lock().canceled
    }
}

#[cfg(test)]
mod tests {
    use super::JobQueue;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order() {
        let queue = JobQueue::new();
        for i in 0..5 {
            queue.push(i);
        }
        assert_eq!(queue.len(), 5);

        let popped: Vec<_> = (0..5).map(|_| queue.wait_and_pop().unwrap()).collect();
        assert_eq!(popped, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn cancel_wakes_all_waiters() {
        let queue = Arc::new(JobQueue::<u32>::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.wait_and_pop())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        queue.cancel();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), None);
        }
        assert!(queue.is_canceled());
    }

    #[test]
    fn canceled_queue_keeps_items_until_drained() {
        let queue = JobQueue::new();
        queue.push(1);
        queue.push(2);
        queue.cancel();

        assert_eq!(queue.wait_and_pop(), None);
        assert_eq!(queue.try_pop(), None);
        assert_eq!(queue.len(), 2);

        queue.resume();
        assert_eq!(queue.wait_and_pop(), Some(1));
        assert_eq!(queue.drain(), vec![2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn every_item_is_consumed_once() {
        let queue = Arc::new(JobQueue::new());
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut got = vec![];
                    while let Some(v) = queue.wait_and_pop() {
                        if v == u32::MAX {
                            break;
                        }
                        got.push(v);
                    }
                    got
                })
            })
            .collect();

        for i in 0..300 {
            queue.push(i);
        }
        for _ in 0..3 {
            queue.push(u32::MAX);
        }

        let mut all: Vec<u32> = consumers.into_iter().flat_map(|c| c.join().unwrap()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..300).collect::<Vec<_>>());
    }
}
