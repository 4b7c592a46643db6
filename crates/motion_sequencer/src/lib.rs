// SPDX-License-Identifier: MIT OR Apache-2.0
//! UI motion sequencing.
//!
//! This crate provides the timed state machines behind page motion:
//! - Visibility gates over viewport intersection ratios
//! - Staged reveals replayed each time a section scrolls into view
//! - A typewriter cycling through words
//! - Ephemeral items spawned on an interval and expired by TTL
//! - A bounded carousel with an optional fade transition
//!
//! ## Architecture
//!
//! No component owns a clock or renders anything. Each one receives a
//! [`Scheduler`] (and, for gates, a [`ViewportObserver`]), mutates its own
//! state from timer callbacks and exposes a read-only snapshot for the
//! host view. Teardown, explicit or on drop, cancels every timer and
//! subscription the instance created.

pub mod carousel;
pub mod config;
pub mod ephemeral;
pub mod error;
pub mod reveal;
pub mod scheduler;
pub mod stage;
pub mod typewriter;
pub mod visibility;

pub use carousel::{CarouselNavigator, CarouselSnapshot, FadeCarousel, FadeTiming, FadeTransition};
pub use config::{
    CarouselConfig, MotionConfig, ParticleConfig, SectionConfig, SectionTrigger, StageConfig,
    TypewriterConfig, CONFIG_FILE_NAME, CONFIG_FORMAT_VERSION,
};
pub use ephemeral::{horizontal_position, EphemeralItem, EphemeralQueue, ItemId};
pub use error::{MotionError, Result};
pub use reveal::RevealSection;
#[cfg(feature = "tokio-runtime")]
pub use scheduler::TokioScheduler;
pub use scheduler::{ManualScheduler, Scheduler, TimerId};
pub use stage::{RevealSnapshot, ReplayPolicy, StageSequence, StageSequencer, StageSpec, StageTiming};
pub use typewriter::{TypewriterCycler, TypewriterPhase, TypewriterSnapshot, TypewriterState, TypewriterTiming};
pub use visibility::{
    ManualViewport, RegionId, SubscriptionId, ViewportObserver, VisibilityGate, VisibilityState,
};
