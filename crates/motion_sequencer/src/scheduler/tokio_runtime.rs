// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scheduler backed by the tokio runtime.

use super::{OnceTask, RepeatingTask, Scheduler, TimerId, MIN_INTERVAL};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Runs every timer as a spawned task; cancellation aborts the task.
pub struct TokioScheduler {
    handle: Handle,
    epoch: Instant,
    next_id: AtomicU64,
    tasks: Arc<Mutex<HashMap<TimerId, AbortHandle>>>,
}

impl TokioScheduler {
    /// Create a scheduler spawning onto `handle`
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            epoch: Instant::now(),
            next_id: AtomicU64::new(0),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a scheduler for the runtime the caller is running on
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    fn allocate(&self) -> TimerId {
        TimerId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn after(&self, delay: Duration, task: OnceTask) -> TimerId {
        let id = self.allocate();
        let tasks = Arc::clone(&self.tasks);
        // Measured from the call, not from the task's first poll
        let deadline = Instant::now() + delay;

        // Held across the spawn so the task cannot finish before it is registered
        let mut registry = self.tasks.lock();
        let join = self.handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let live = tasks.lock().remove(&id).is_some();
            if live {
                task();
            }
        });
        registry.insert(id, join.abort_handle());
        id
    }

    fn every(&self, interval: Duration, mut task: RepeatingTask) -> TimerId {
        let id = self.allocate();
        let interval = interval.max(MIN_INTERVAL);
        let start = Instant::now() + interval;

        let mut registry = self.tasks.lock();
        let join = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task();
            }
        });
        registry.insert(id, join.abort_handle());
        id
    }

    fn cancel(&self, timer: TimerId) -> bool {
        match self.tasks.lock().remove(&timer) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn pending(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.lock().drain() {
            handle.abort();
        }
    }
}
