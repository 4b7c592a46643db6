// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visibility-triggered reveal sections.

use crate::error::Result;
use crate::scheduler::Scheduler;
use crate::stage::{RevealSnapshot, StageSequence, StageSequencer};
use crate::visibility::{RegionId, ViewportObserver, VisibilityGate};
use std::sync::Arc;

/// A section whose reveal stages replay each time it scrolls into view.
///
/// Owns a [`VisibilityGate`] wired into a [`StageSequencer`]. On teardown
/// the gate is detached before the sequencer cancels its timers.
pub struct RevealSection {
    // Declaration order is drop order: the gate must go first
    gate: VisibilityGate,
    sequencer: StageSequencer,
}

impl RevealSection {
    /// Mount a section observing `region`
    pub fn mount(
        observer: Arc<dyn ViewportObserver>,
        scheduler: Arc<dyn Scheduler>,
        region: RegionId,
        threshold: f32,
        sequence: StageSequence,
    ) -> Result<Self> {
        let mut gate = VisibilityGate::new(threshold)?;
        let sequencer = StageSequencer::new(sequence, scheduler)?;

        gate.subscribe(sequencer.visibility_listener());
        gate.attach(observer, region);

        Ok(Self { gate, sequencer })
    }

    /// The section's gate
    pub fn gate(&self) -> &VisibilityGate {
        &self.gate
    }

    /// The section's sequencer
    pub fn sequencer(&self) -> &StageSequencer {
        &self.sequencer
    }

    /// Render-facing snapshot
    pub fn snapshot(&self) -> RevealSnapshot {
        self.sequencer.snapshot()
    }

    /// Whether `flag` has fired
    pub fn is_active(&self, flag: &str) -> bool {
        self.sequencer.is_active(flag)
    }

    /// Detach the gate and cancel every pending stage
    pub fn teardown(&mut self) {
        self.gate.detach();
        self.sequencer.teardown();
    }
}
