// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded carousel navigation.
//!
//! [`CarouselNavigator`] is a guarded index over a fixed collection:
//! stepping past either end is a no-op. [`FadeCarousel`] wraps it in an
//! Idle -> `FadingOut` -> `FadingIn` -> Idle transition driven by a
//! [`Scheduler`], coalescing requests that arrive mid-transition.

use crate::error::{MotionError, Result};
use crate::scheduler::{Scheduler, TimerId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Guarded index over a fixed collection
#[derive(Debug, Clone)]
pub struct CarouselNavigator<T> {
    items: Vec<T>,
    index: usize,
}

impl<T> CarouselNavigator<T> {
    /// Create a navigator at the first item
    pub fn new(items: Vec<T>) -> Result<Self> {
        if items.is_empty() {
            return Err(MotionError::invalid("carousel needs at least one item"));
        }
        Ok(Self { items, index: 0 })
    }

    /// Step back; returns whether the index moved
    pub fn previous(&mut self) -> bool {
        match previous_index(self.index) {
            Some(index) => {
                self.index = index;
                true
            }
            None => false,
        }
    }

    /// Step forward; returns whether the index moved
    pub fn next(&mut self) -> bool {
        match next_index(self.index, self.items.len()) {
            Some(index) => {
                self.index = index;
                true
            }
            None => false,
        }
    }

    /// Jump to `index`
    pub fn go_to(&mut self, index: usize) -> Result<()> {
        self.check(index)?;
        self.index = index;
        Ok(())
    }

    fn check(&self, index: usize) -> Result<()> {
        if index >= self.items.len() {
            return Err(MotionError::OutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(())
    }

    /// Current index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current item
    pub fn current(&self) -> &T {
        &self.items[self.index]
    }

    /// All items
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always `false`; construction rejects empty collections
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether `previous` would be a no-op
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    /// Whether `next` would be a no-op
    pub fn is_last(&self) -> bool {
        self.index + 1 == self.items.len()
    }
}

fn previous_index(from: usize) -> Option<usize> {
    from.checked_sub(1)
}

fn next_index(from: usize, len: usize) -> Option<usize> {
    (from + 1 < len).then_some(from + 1)
}

/// Fade transition state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FadeTransition {
    /// No transition in flight
    #[default]
    Idle,
    /// Old item fading out; the index has not changed yet
    FadingOut,
    /// New item fading in
    FadingIn,
}

/// Fade durations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FadeTiming {
    /// Time before the index swaps
    pub fade_out: Duration,
    /// Time from the swap back to idle
    pub fade_in: Duration,
}

impl Default for FadeTiming {
    fn default() -> Self {
        Self {
            fade_out: Duration::from_millis(300),
            fade_in: Duration::from_millis(300),
        }
    }
}

impl FadeTiming {
    /// Reject zero durations
    pub fn validate(&self) -> Result<()> {
        if self.fade_out.is_zero() || self.fade_in.is_zero() {
            return Err(MotionError::invalid("fade durations must be positive"));
        }
        Ok(())
    }
}

/// Render-facing view of a fading carousel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarouselSnapshot {
    /// Displayed index
    pub index: usize,
    /// Transition state
    pub transition: FadeTransition,
    /// Latest requested index not yet displayed
    pub pending: Option<usize>,
}

struct FadeCore<T> {
    navigator: CarouselNavigator<T>,
    transition: FadeTransition,
    pending: Option<usize>,
    timing: FadeTiming,
    scheduler: Arc<dyn Scheduler>,
    timer: Option<TimerId>,
    torn_down: bool,
}

impl<T: Send + 'static> FadeCore<T> {
    /// Index the user last asked for
    fn logical_index(&self) -> usize {
        self.pending.unwrap_or(self.navigator.index)
    }

    fn request(&mut self, target: usize, weak: Weak<Mutex<FadeCore<T>>>) -> bool {
        if self.torn_down || target == self.logical_index() {
            return false;
        }
        self.pending = Some(target);
        if self.transition == FadeTransition::Idle {
            self.begin_fade_out(weak);
        }
        true
    }

    fn begin_fade_out(&mut self, weak: Weak<Mutex<FadeCore<T>>>) {
        self.transition = FadeTransition::FadingOut;
        let delay = self.timing.fade_out;
        self.schedule(weak, delay, Self::on_faded_out);
    }

    fn on_faded_out(&mut self, weak: Weak<Mutex<FadeCore<T>>>) {
        if let Some(target) = self.pending.take() {
            self.navigator.index = target;
        }
        self.transition = FadeTransition::FadingIn;
        tracing::trace!(index = self.navigator.index, "Carousel swapped");
        let delay = self.timing.fade_in;
        self.schedule(weak, delay, Self::on_faded_in);
    }

    fn on_faded_in(&mut self, weak: Weak<Mutex<FadeCore<T>>>) {
        match self.pending {
            Some(target) if target != self.navigator.index => self.begin_fade_out(weak),
            _ => {
                self.pending = None;
                self.transition = FadeTransition::Idle;
            }
        }
    }

    fn schedule(
        &mut self,
        weak: Weak<Mutex<FadeCore<T>>>,
        delay: Duration,
        step: fn(&mut FadeCore<T>, Weak<Mutex<FadeCore<T>>>),
    ) {
        let timer = self.scheduler.after(
            delay,
            Box::new(move || {
                if let Some(core) = weak.upgrade() {
                    let next = Arc::downgrade(&core);
                    let mut core = core.lock();
                    core.timer = None;
                    if !core.torn_down {
                        step(&mut *core, next);
                    }
                }
            }),
        );
        self.timer = Some(timer);
    }
}

/// Carousel whose navigation fades out, swaps, then fades in.
///
/// Requests arriving mid-transition coalesce: the displayed index always
/// ends at the most recent valid request.
pub struct FadeCarousel<T> {
    core: Arc<Mutex<FadeCore<T>>>,
}

impl<T: Clone + Send + 'static> FadeCarousel<T> {
    /// Create a fading carousel at the first item
    pub fn new(items: Vec<T>, timing: FadeTiming, scheduler: Arc<dyn Scheduler>) -> Result<Self> {
        timing.validate()?;
        let navigator = CarouselNavigator::new(items)?;

        Ok(Self {
            core: Arc::new(Mutex::new(FadeCore {
                navigator,
                transition: FadeTransition::Idle,
                pending: None,
                timing,
                scheduler,
                timer: None,
                torn_down: false,
            })),
        })
    }

    /// Step back from the latest requested index
    pub fn previous(&self) -> bool {
        let mut core = self.core.lock();
        match previous_index(core.logical_index()) {
            Some(target) => core.request(target, Arc::downgrade(&self.core)),
            None => false,
        }
    }

    /// Step forward from the latest requested index
    pub fn next(&self) -> bool {
        let mut core = self.core.lock();
        match next_index(core.logical_index(), core.navigator.len()) {
            Some(target) => core.request(target, Arc::downgrade(&self.core)),
            None => false,
        }
    }

    /// Jump to `index`; out-of-range requests leave every state untouched
    pub fn go_to(&self, index: usize) -> Result<()> {
        let mut core = self.core.lock();
        core.navigator.check(index)?;
        core.request(index, Arc::downgrade(&self.core));
        Ok(())
    }

    /// Displayed index
    pub fn index(&self) -> usize {
        self.core.lock().navigator.index
    }

    /// Displayed item
    pub fn current(&self) -> T {
        self.core.lock().navigator.current().clone()
    }

    /// Transition state
    pub fn transition(&self) -> FadeTransition {
        self.core.lock().transition
    }

    /// Render-facing snapshot
    pub fn snapshot(&self) -> CarouselSnapshot {
        let core = self.core.lock();
        CarouselSnapshot {
            index: core.navigator.index,
            transition: core.transition,
            pending: core.pending,
        }
    }

    /// Cancel any in-flight transition
    pub fn teardown(&self) {
        let mut core = self.core.lock();
        if core.torn_down {
            return;
        }
        core.torn_down = true;
        if let Some(timer) = core.timer.take() {
            core.scheduler.cancel(timer);
        }
        core.pending = None;
        core.transition = FadeTransition::Idle;
        tracing::debug!("Carousel torn down");
    }
}

impl<T> Drop for FadeCarousel<T> {
    fn drop(&mut self) {
        let mut core = self.core.lock();
        core.torn_down = true;
        if let Some(timer) = core.timer.take() {
            core.scheduler.cancel(timer);
        }
    }
}
