// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timer scheduling capability.
//!
//! Components never read a clock on their own. They ask a [`Scheduler`] to
//! run a callback after a delay or on an interval and keep the returned
//! [`TimerId`] so every pending timer can be cancelled on teardown.
//!
//! Two backends are provided:
//! - [`ManualScheduler`] - virtual clock advanced explicitly (tests, simulation)
//! - `TokioScheduler` - spawned tokio tasks (feature `tokio-runtime`)

mod manual;
#[cfg(feature = "tokio-runtime")]
mod tokio_runtime;

pub use manual::ManualScheduler;
#[cfg(feature = "tokio-runtime")]
pub use tokio_runtime::TokioScheduler;

use std::time::Duration;

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub(crate) fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw ID value
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Callback fired once
pub type OnceTask = Box<dyn FnOnce() + Send>;

/// Callback fired on every interval
pub type RepeatingTask = Box<dyn FnMut() + Send>;

/// Smallest interval a recurring timer is allowed to run at
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Host capability for delayed and recurring callbacks.
///
/// Callbacks scheduled earlier with the same deadline fire first. Every
/// handle is individually cancellable and [`Scheduler::pending`] reports
/// how many timers are still live.
pub trait Scheduler: Send + Sync {
    /// Time elapsed since the scheduler's epoch
    fn now(&self) -> Duration;

    /// Run `task` once after `delay`
    fn after(&self, delay: Duration, task: OnceTask) -> TimerId;

    /// Run `task` every `interval`, first firing one interval from now
    fn every(&self, interval: Duration, task: RepeatingTask) -> TimerId;

    /// Cancel a timer. Returns `false` if it already fired or was cancelled.
    fn cancel(&self, timer: TimerId) -> bool;

    /// Number of timers that are still live
    fn pending(&self) -> usize;
}

/// Cancel every timer in `timers`, draining it
pub(crate) fn cancel_all(scheduler: &dyn Scheduler, timers: impl IntoIterator<Item = TimerId>) -> usize {
    timers
        .into_iter()
        .filter(|timer| scheduler.cancel(*timer))
        .count()
}
