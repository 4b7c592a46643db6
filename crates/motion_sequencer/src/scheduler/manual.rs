// SPDX-License-Identifier: MIT OR Apache-2.0
//! Virtual clock scheduler.

use super::{OnceTask, RepeatingTask, Scheduler, TimerId, MIN_INTERVAL};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

enum Task {
    Once(OnceTask),
    Repeating {
        interval: Duration,
        task: RepeatingTask,
    },
}

struct Entry {
    deadline: Duration,
    order: u64,
    task: Task,
}

/// Recurring timer currently running its callback
struct Firing {
    id: TimerId,
    cancelled: bool,
}

#[derive(Default)]
struct TimerQueue {
    now: Duration,
    next_id: u64,
    next_order: u64,
    heap: BinaryHeap<Reverse<(Duration, u64, TimerId)>>,
    entries: HashMap<TimerId, Entry>,
    firing: Option<Firing>,
}

impl TimerQueue {
    fn allocate(&mut self) -> TimerId {
        self.next_id += 1;
        TimerId::from_raw(self.next_id)
    }

    fn push(&mut self, id: TimerId, deadline: Duration, task: Task) {
        self.next_order += 1;
        let order = self.next_order;
        self.heap.push(Reverse((deadline, order, id)));
        self.entries.insert(id, Entry { deadline, order, task });
    }

    /// Pop the earliest live entry due at or before `target`.
    /// Heap slots of cancelled or re-armed timers are skipped.
    fn pop_due(&mut self, target: Duration) -> Option<(TimerId, Entry)> {
        while let Some(Reverse((deadline, order, id))) = self.heap.peek().copied() {
            if deadline > target {
                return None;
            }
            self.heap.pop();
            let live = self.entries.get(&id).is_some_and(|e| e.order == order);
            if live {
                return self.entries.remove(&id).map(|entry| (id, entry));
            }
        }
        None
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.entries.values().map(|e| e.deadline).min()
    }
}

/// Deterministic scheduler driven by [`ManualScheduler::advance`].
///
/// Time only moves when the owner advances it. Due timers fire in deadline
/// order, ties broken by scheduling order. The queue is unlocked while a
/// callback runs, so callbacks may schedule and cancel freely.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<TimerQueue>,
}

impl ManualScheduler {
    /// Create a scheduler at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `by`, firing every timer that comes due
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.queue.lock().now + by;
        self.advance_to(target)
    }

    /// Advance the clock to `target`. Returns the number of callbacks run.
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut fired = 0;
        loop {
            let (id, entry) = {
                let mut queue = self.queue.lock();
                let Some((id, entry)) = queue.pop_due(target) else {
                    if queue.now < target {
                        queue.now = target;
                    }
                    break;
                };
                queue.now = queue.now.max(entry.deadline);
                if matches!(entry.task, Task::Repeating { .. }) {
                    queue.firing = Some(Firing { id, cancelled: false });
                }
                (id, entry)
            };

            fired += 1;
            match entry.task {
                Task::Once(task) => task(),
                Task::Repeating { interval, mut task } => {
                    task();
                    let mut queue = self.queue.lock();
                    let cancelled = queue.firing.take().is_some_and(|f| f.cancelled);
                    if !cancelled {
                        queue.push(id, entry.deadline + interval, Task::Repeating { interval, task });
                    }
                }
            }
        }
        fired
    }

    /// Deadline of the earliest live timer
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.lock().next_deadline()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.queue.lock().now
    }

    fn after(&self, delay: Duration, task: OnceTask) -> TimerId {
        let mut queue = self.queue.lock();
        let id = queue.allocate();
        let deadline = queue.now + delay;
        queue.push(id, deadline, Task::Once(task));
        id
    }

    fn every(&self, interval: Duration, task: RepeatingTask) -> TimerId {
        let interval = interval.max(MIN_INTERVAL);
        let mut queue = self.queue.lock();
        let id = queue.allocate();
        let deadline = queue.now + interval;
        queue.push(id, deadline, Task::Repeating { interval, task });
        id
    }

    fn cancel(&self, timer: TimerId) -> bool {
        let mut queue = self.queue.lock();
        if queue.entries.remove(&timer).is_some() {
            return true;
        }
        match queue.firing.as_mut() {
            Some(firing) if firing.id == timer && !firing.cancelled => {
                firing.cancelled = true;
                true
            }
            _ => false,
        }
    }

    fn pending(&self) -> usize {
        let queue = self.queue.lock();
        // A recurring timer is out of `entries` while its callback runs
        let firing = queue.firing.as_ref().is_some_and(|f| !f.cancelled);
        queue.entries.len() + usize::from(firing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> OnceTask) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |label: &'static str| -> OnceTask {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.after(ms(300), task("c"));
        scheduler.after(ms(100), task("a"));
        scheduler.after(ms(200), task("b"));

        assert_eq!(scheduler.advance(ms(150)), 1);
        assert_eq!(*log.lock(), vec!["a"]);

        scheduler.advance(ms(150));
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.now(), ms(300));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_equal_deadlines_are_fifo() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.after(ms(50), task("first"));
        scheduler.after(ms(50), task("second"));
        scheduler.after(ms(50), task("third"));
        scheduler.advance(ms(50));

        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_cancel() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        let id = scheduler.after(ms(10), task("cancelled"));
        scheduler.after(ms(20), task("kept"));
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(ms(100));
        assert_eq!(*log.lock(), vec!["kept"]);
    }

    #[test]
    fn test_every_rearms_until_cancelled() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let id = scheduler.every(ms(100), Box::new(move || *counter.lock() += 1));

        scheduler.advance(ms(350));
        assert_eq!(*count.lock(), 3);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.next_deadline(), Some(ms(400)));

        assert!(scheduler.cancel(id));
        scheduler.advance(ms(1000));
        assert_eq!(*count.lock(), 3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_recurring_timer_cancelled_from_its_own_callback() {
        let scheduler = Arc::new(ManualScheduler::new());
        let count = Arc::new(Mutex::new(0u32));
        let own_id: Arc<Mutex<Option<TimerId>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&scheduler);
        let counter = Arc::clone(&count);
        let slot = Arc::clone(&own_id);
        let id = scheduler.every(
            ms(10),
            Box::new(move || {
                *counter.lock() += 1;
                if let (Some(scheduler), Some(id)) = (weak.upgrade(), *slot.lock()) {
                    scheduler.cancel(id);
                }
            }),
        );
        *own_id.lock() = Some(id);

        scheduler.advance(ms(100));
        assert_eq!(*count.lock(), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_pending_counts_running_recurring_timer() {
        let scheduler = Arc::new(ManualScheduler::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&scheduler);
        let sink = Arc::clone(&seen);
        let id = scheduler.every(
            ms(10),
            Box::new(move || {
                if let Some(scheduler) = weak.upgrade() {
                    sink.lock().push(scheduler.pending());
                }
            }),
        );

        scheduler.advance(ms(30));
        assert_eq!(*seen.lock(), vec![1, 1, 1]);

        scheduler.cancel(id);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_callbacks_can_schedule_more_work() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (log, task) = recorder();
        let task = Arc::new(task);

        let weak = Arc::downgrade(&scheduler);
        let chained = Arc::clone(&task);
        scheduler.after(
            ms(10),
            Box::new(move || {
                if let Some(scheduler) = weak.upgrade() {
                    scheduler.after(ms(10), chained("chained"));
                }
            }),
        );

        scheduler.advance(ms(15));
        assert!(log.lock().is_empty());
        scheduler.advance(ms(5));
        assert_eq!(*log.lock(), vec!["chained"]);
    }

    #[test]
    fn test_zero_interval_is_raised_to_minimum() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        scheduler.every(Duration::ZERO, Box::new(move || *counter.lock() += 1));

        scheduler.advance(ms(5));
        assert_eq!(*count.lock(), 5);
    }
}
