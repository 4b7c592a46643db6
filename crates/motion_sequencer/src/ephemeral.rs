// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ephemeral item spawning with per-item expiry.
//!
//! An [`EphemeralQueue`] spawns an item on a fixed interval and removes each
//! item exactly one TTL after its own creation. Expiry targets the item by
//! id, so the queue stays correct when the TTL changes between spawns.

use crate::error::{MotionError, Result};
use crate::scheduler::{cancel_all, Scheduler, TimerId};
use indexmap::IndexMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for an ephemeral item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// Create a new random item ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// A live item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemeralItem<A> {
    /// Unique item ID
    pub id: ItemId,
    /// Generated payload
    pub attributes: A,
    /// Scheduler time at creation
    pub created_at: Duration,
}

/// Generator producing horizontal positions in `[0, 100)`.
///
/// A seed makes the sequence reproducible.
pub fn horizontal_position(seed: Option<u64>) -> impl FnMut() -> f32 + Send + 'static {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    move || rng.gen_range(0.0..100.0)
}

struct QueueCore<A> {
    scheduler: Arc<dyn Scheduler>,
    ttl: Duration,
    generator: Box<dyn FnMut() -> A + Send>,
    items: IndexMap<ItemId, EphemeralItem<A>>,
    expiries: HashMap<ItemId, TimerId>,
    spawn_timer: Option<TimerId>,
    torn_down: bool,
}

impl<A> QueueCore<A> {
    /// Cancel every timer and drop all items
    fn release(&mut self) -> usize {
        self.torn_down = true;
        let mut timers: Vec<TimerId> = self.expiries.drain().map(|(_, timer)| timer).collect();
        timers.extend(self.spawn_timer.take());
        self.items.clear();
        cancel_all(self.scheduler.as_ref(), timers)
    }
}

impl<A: Send + 'static> QueueCore<A> {
    fn spawn(&mut self, weak: Weak<Mutex<QueueCore<A>>>) {
        if self.torn_down {
            return;
        }

        let id = ItemId::new();
        let item = EphemeralItem {
            id,
            attributes: (self.generator)(),
            created_at: self.scheduler.now(),
        };
        self.items.insert(id, item);

        let expiry = self.scheduler.after(
            self.ttl,
            Box::new(move || {
                if let Some(core) = weak.upgrade() {
                    core.lock().expire(id);
                }
            }),
        );
        self.expiries.insert(id, expiry);
        tracing::trace!(?id, live = self.items.len(), "Ephemeral item spawned");
    }

    fn expire(&mut self, id: ItemId) {
        self.expiries.remove(&id);
        if self.items.shift_remove(&id).is_some() {
            tracing::trace!(?id, live = self.items.len(), "Ephemeral item expired");
        }
    }
}

/// Interval spawner with per-item TTL
pub struct EphemeralQueue<A> {
    core: Arc<Mutex<QueueCore<A>>>,
}

impl<A: Clone + Send + 'static> EphemeralQueue<A> {
    /// Start spawning one item per `interval`, each living for `ttl`.
    /// The first item appears one interval after mounting.
    pub fn spawn_loop(
        interval: Duration,
        ttl: Duration,
        generator: impl FnMut() -> A + Send + 'static,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(MotionError::invalid("spawn interval must be positive"));
        }
        if ttl.is_zero() {
            return Err(MotionError::invalid("item TTL must be positive"));
        }

        let core = Arc::new(Mutex::new(QueueCore {
            scheduler: Arc::clone(&scheduler),
            ttl,
            generator: Box::new(generator),
            items: IndexMap::new(),
            expiries: HashMap::new(),
            spawn_timer: None,
            torn_down: false,
        }));

        let weak = Arc::downgrade(&core);
        let spawn_timer = scheduler.every(
            interval,
            Box::new(move || {
                if let Some(core) = weak.upgrade() {
                    let next = Arc::downgrade(&core);
                    core.lock().spawn(next);
                }
            }),
        );
        core.lock().spawn_timer = Some(spawn_timer);

        tracing::debug!(?interval, ?ttl, "Ephemeral queue mounted");
        Ok(Self { core })
    }

    /// Change the TTL applied to items spawned from now on
    pub fn set_ttl(&self, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(MotionError::invalid("item TTL must be positive"));
        }
        self.core.lock().ttl = ttl;
        Ok(())
    }

    /// Live items, oldest first
    pub fn live_items(&self) -> Vec<EphemeralItem<A>> {
        self.core.lock().items.values().cloned().collect()
    }

    /// IDs of live items, oldest first
    pub fn ids(&self) -> Vec<ItemId> {
        self.core.lock().items.keys().copied().collect()
    }

    /// Whether an item is still live
    pub fn contains(&self, id: ItemId) -> bool {
        self.core.lock().items.contains_key(&id)
    }

    /// Number of live items
    pub fn len(&self) -> usize {
        self.core.lock().items.len()
    }

    /// Whether no items are live
    pub fn is_empty(&self) -> bool {
        self.core.lock().items.is_empty()
    }

    /// Spawn timer plus every pending expiry
    pub fn pending_timers(&self) -> usize {
        let core = self.core.lock();
        core.expiries.len() + usize::from(core.spawn_timer.is_some())
    }

    /// Stop spawning, cancel every expiry and drop all items
    pub fn teardown(&self) {
        let mut core = self.core.lock();
        if core.torn_down {
            return;
        }
        let cancelled = core.release();
        tracing::debug!(cancelled, "Ephemeral queue torn down");
    }
}

impl<A> Drop for EphemeralQueue<A> {
    fn drop(&mut self) {
        self.core.lock().release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn counter() -> impl FnMut() -> u32 + Send + 'static {
        let mut next = 0;
        move || {
            next += 1;
            next
        }
    }

    fn setup(interval: u64, ttl: u64) -> (Arc<ManualScheduler>, EphemeralQueue<u32>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let queue = EphemeralQueue::spawn_loop(ms(interval), ms(ttl), counter(), scheduler.clone()).unwrap();
        (scheduler, queue)
    }

    #[test]
    fn test_rejects_zero_parameters() {
        let scheduler = Arc::new(ManualScheduler::new());
        assert!(matches!(
            EphemeralQueue::spawn_loop(Duration::ZERO, ms(100), counter(), scheduler.clone()),
            Err(MotionError::InvalidConfiguration(_))
        ));
        assert!(EphemeralQueue::spawn_loop(ms(100), Duration::ZERO, counter(), scheduler.clone()).is_err());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_item_lives_exactly_one_ttl() {
        let (scheduler, queue) = setup(500, 2000);

        scheduler.advance_to(ms(500));
        let first = queue.live_items()[0].clone();
        assert_eq!(first.created_at, ms(500));
        assert_eq!(first.attributes, 1);

        scheduler.advance_to(ms(2499));
        assert!(queue.contains(first.id));

        scheduler.advance_to(ms(2500));
        assert!(!queue.contains(first.id));
    }

    #[test]
    fn test_expiry_beyond_first_ttl() {
        let (scheduler, queue) = setup(100, 450);

        // Five spawns at 100..=500, first expires at 550
        scheduler.advance_to(ms(500));
        assert_eq!(queue.len(), 5);
        scheduler.advance_to(ms(550));
        assert_eq!(queue.len(), 4);
        let attributes: Vec<u32> = queue.live_items().into_iter().map(|i| i.attributes).collect();
        assert_eq!(attributes, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_steady_state_population() {
        let (scheduler, queue) = setup(500, 2000);
        scheduler.advance(ms(10_000));
        // Items from 8500..=10000; the one from 8000 expired at 10000
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.pending_timers(), 5);
    }

    #[test]
    fn test_expiry_by_identity_with_changed_ttl() {
        let (scheduler, queue) = setup(100, 1000);
        scheduler.advance_to(ms(100));
        let long_lived = queue.ids()[0];

        queue.set_ttl(ms(50)).unwrap();
        scheduler.advance_to(ms(200));
        let short_lived = queue.ids()[1];

        scheduler.advance_to(ms(250));
        assert!(queue.contains(long_lived));
        assert!(!queue.contains(short_lived));
    }

    #[test]
    fn test_teardown_cancels_everything() {
        let (scheduler, queue) = setup(100, 1000);
        scheduler.advance(ms(550));
        assert_eq!(queue.len(), 5);
        assert_eq!(scheduler.pending(), 6);

        queue.teardown();
        assert_eq!(scheduler.pending(), 0);
        assert!(queue.is_empty());

        scheduler.advance(ms(5000));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_cancels_everything() {
        let (scheduler, queue) = setup(100, 1000);
        scheduler.advance(ms(300));
        drop(queue);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_seeded_positions_are_reproducible() {
        let mut a = horizontal_position(Some(7));
        let mut b = horizontal_position(Some(7));
        for _ in 0..100 {
            let value = a();
            assert!((0.0..100.0).contains(&value));
            assert_eq!(value, b());
        }
    }
}
