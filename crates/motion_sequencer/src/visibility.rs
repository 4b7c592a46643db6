// SPDX-License-Identifier: MIT OR Apache-2.0
//! Viewport visibility gate.
//!
//! A [`VisibilityGate`] turns the fractional intersection ratio reported by
//! a [`ViewportObserver`] into a boolean and notifies listeners on edges only.

use crate::error::{MotionError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Identifier of an observed region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(pub Uuid);

impl RegionId {
    /// Create a new random region ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle of a viewport subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Callback receiving the visible fraction of a region, in `[0, 1]`
pub type RatioCallback = Box<dyn FnMut(f32) + Send>;

/// Host primitive reporting how much of a region is inside the viewport
pub trait ViewportObserver: Send + Sync {
    /// Start observing `region`, reporting ratios to `callback`
    fn observe(&self, region: RegionId, threshold: f32, callback: RatioCallback) -> SubscriptionId;

    /// Release a subscription. Returns `false` if it was not live.
    fn unobserve(&self, subscription: SubscriptionId) -> bool;
}

/// Boolean visibility of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisibilityState {
    /// Whether the observed fraction meets the threshold
    pub is_visible: bool,
}

/// Listener notified on every visibility edge
pub type VisibilityListener = Box<dyn FnMut(VisibilityState) + Send>;

#[derive(Default)]
struct GateState {
    visible: bool,
    listeners: Vec<VisibilityListener>,
    /// Edges not yet delivered to listeners
    queued: VecDeque<VisibilityState>,
    dispatching: bool,
}

impl GateState {
    /// Record a ratio and notify listeners if the boolean flipped.
    ///
    /// Listeners run with the gate unlocked. An edge raised by a listener
    /// is queued and delivered after the current one, so every listener
    /// sees every edge in order.
    fn apply(state: &Mutex<GateState>, threshold: f32, ratio: f32) {
        let visible = ratio >= threshold;
        let mut listeners = {
            let mut guard = state.lock();
            if guard.visible == visible {
                return;
            }
            guard.visible = visible;
            guard.queued.push_back(VisibilityState { is_visible: visible });
            if guard.dispatching {
                return;
            }
            guard.dispatching = true;
            std::mem::take(&mut guard.listeners)
        };

        loop {
            let edge = {
                let mut guard = state.lock();
                // Listeners subscribed mid-dispatch receive the remaining edges
                listeners.append(&mut guard.listeners);
                match guard.queued.pop_front() {
                    Some(edge) => edge,
                    None => {
                        guard.listeners = listeners;
                        guard.dispatching = false;
                        return;
                    }
                }
            };

            tracing::debug!(visible = edge.is_visible, threshold, "Visibility edge");
            for listener in &mut listeners {
                listener(edge);
            }
        }
    }
}

struct Attachment {
    observer: Arc<dyn ViewportObserver>,
    region: RegionId,
    subscription: SubscriptionId,
}

/// Stable boolean view of a region's visibility.
///
/// An unattached gate never fires; "never visible" is a valid terminal
/// state. Dropping the gate releases its subscription.
pub struct VisibilityGate {
    threshold: f32,
    state: Arc<Mutex<GateState>>,
    attachment: Option<Attachment>,
}

impl VisibilityGate {
    /// Create a gate firing once `threshold` of the region is visible.
    /// `threshold` must lie in `(0, 1]`.
    pub fn new(threshold: f32) -> Result<Self> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(MotionError::invalid(format!(
                "visibility threshold {threshold} outside (0, 1]"
            )));
        }

        Ok(Self {
            threshold,
            state: Arc::new(Mutex::new(GateState::default())),
            attachment: None,
        })
    }

    /// Observe `region` through `observer`, replacing any previous attachment
    pub fn attach(&mut self, observer: Arc<dyn ViewportObserver>, region: RegionId) {
        self.detach();

        let weak: Weak<Mutex<GateState>> = Arc::downgrade(&self.state);
        let threshold = self.threshold;
        let subscription = observer.observe(
            region,
            threshold,
            Box::new(move |ratio| {
                if let Some(state) = weak.upgrade() {
                    GateState::apply(&state, threshold, ratio);
                }
            }),
        );

        tracing::debug!(?region, ?subscription, threshold, "Visibility gate attached");
        self.attachment = Some(Attachment {
            observer,
            region,
            subscription,
        });
    }

    /// Release the subscription. A visible gate emits a final `false` edge.
    pub fn detach(&mut self) -> bool {
        let Some(attachment) = self.attachment.take() else {
            return false;
        };

        attachment.observer.unobserve(attachment.subscription);
        tracing::debug!(region = ?attachment.region, "Visibility gate detached");
        GateState::apply(&self.state, self.threshold, 0.0);
        true
    }

    /// Register a listener for visibility edges
    pub fn subscribe(&self, listener: impl FnMut(VisibilityState) + Send + 'static) {
        self.state.lock().listeners.push(Box::new(listener));
    }

    /// Current visibility
    pub fn state(&self) -> VisibilityState {
        VisibilityState {
            is_visible: self.state.lock().visible,
        }
    }

    /// Whether the region currently meets the threshold
    pub fn is_visible(&self) -> bool {
        self.state().is_visible
    }

    /// Whether the gate is observing a region
    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// Observed region, if attached
    pub fn region(&self) -> Option<RegionId> {
        self.attachment.as_ref().map(|a| a.region)
    }

    /// Visibility threshold
    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Drop for VisibilityGate {
    fn drop(&mut self) {
        self.detach();
    }
}

struct Subscription {
    region: RegionId,
    callback: Arc<Mutex<RatioCallback>>,
}

#[derive(Default)]
struct ViewportInner {
    next_id: u64,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    ratios: HashMap<RegionId, f32>,
}

/// In-memory [`ViewportObserver`] whose ratios are set by hand.
///
/// New subscriptions receive the region's last known ratio immediately,
/// mirroring how intersection observers report on `observe`.
#[derive(Default)]
pub struct ManualViewport {
    inner: Mutex<ViewportInner>,
}

impl ManualViewport {
    /// Create an empty viewport
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a new intersection ratio for `region`.
    ///
    /// A callback must not report a ratio for its own region from inside
    /// the callback.
    pub fn set_ratio(&self, region: RegionId, ratio: f32) {
        let ratio = ratio.clamp(0.0, 1.0);
        let callbacks: Vec<_> = {
            let mut inner = self.inner.lock();
            inner.ratios.insert(region, ratio);
            inner
                .subscriptions
                .values()
                .filter(|s| s.region == region)
                .map(|s| Arc::clone(&s.callback))
                .collect()
        };

        for callback in callbacks {
            let mut callback = callback.lock();
            (*callback)(ratio);
        }
    }

    /// Last ratio reported for `region`
    pub fn ratio(&self, region: RegionId) -> Option<f32> {
        self.inner.lock().ratios.get(&region).copied()
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }
}

impl ViewportObserver for ManualViewport {
    fn observe(&self, region: RegionId, _threshold: f32, callback: RatioCallback) -> SubscriptionId {
        let callback = Arc::new(Mutex::new(callback));
        let (id, initial) = {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = SubscriptionId(inner.next_id);
            inner.subscriptions.insert(
                id,
                Subscription {
                    region,
                    callback: Arc::clone(&callback),
                },
            );
            (id, inner.ratios.get(&region).copied())
        };

        if let Some(ratio) = initial {
            let mut callback = callback.lock();
            (*callback)(ratio);
        }
        id
    }

    fn unobserve(&self, subscription: SubscriptionId) -> bool {
        self.inner.lock().subscriptions.remove(&subscription).is_some()
    }
}
