// SPDX-License-Identifier: MIT OR Apache-2.0
//! Staged reveal sequencing.
//!
//! A [`StageSequencer`] drives an ordered set of flags to "fired" once its
//! section becomes visible. Every stage is an independent timer measured
//! from the visibility edge, so a later stage is never blocked by an earlier
//! one. Losing visibility cancels every pending timer and, under
//! [`ReplayPolicy::Replay`], clears the fired set so the next entry replays
//! the reveal from the first stage.

use crate::error::{MotionError, Result};
use crate::scheduler::{cancel_all, Scheduler, TimerId};
use crate::visibility::VisibilityState;
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// One timed flag in a reveal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Delay as authored (see [`StageTiming`])
    pub delay: Duration,
    /// Flag set when the stage fires
    pub flag: String,
}

impl StageSpec {
    /// Create a stage
    pub fn new(delay: Duration, flag: impl Into<String>) -> Self {
        Self {
            delay,
            flag: flag.into(),
        }
    }

    /// Create a stage with a delay in milliseconds
    pub fn from_millis(delay_ms: u64, flag: impl Into<String>) -> Self {
        Self::new(Duration::from_millis(delay_ms), flag)
    }
}

/// How stage delays are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StageTiming {
    /// Each delay is measured from the visibility edge
    #[default]
    Absolute,
    /// Each delay is measured from the previous stage's offset
    Cumulative,
}

/// What happens to fired flags when the section leaves the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReplayPolicy {
    /// Clear every flag; the reveal replays on the next entry
    #[default]
    Replay,
    /// Keep fired flags; only unfired stages are rescheduled on re-entry
    Once,
}

/// Ordered stages of a reveal
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageSequence {
    /// Stages in authored order
    pub stages: Vec<StageSpec>,
    /// Delay interpretation
    pub timing: StageTiming,
    /// Behaviour on visibility loss
    pub policy: ReplayPolicy,
}

impl StageSequence {
    /// Create an absolute, replaying sequence
    pub fn new(stages: Vec<StageSpec>) -> Self {
        Self {
            stages,
            ..Self::default()
        }
    }

    /// Append a stage
    pub fn stage(mut self, delay: Duration, flag: impl Into<String>) -> Self {
        self.stages.push(StageSpec::new(delay, flag));
        self
    }

    /// Set the delay interpretation
    pub fn with_timing(mut self, timing: StageTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Set the replay policy
    pub fn with_policy(mut self, policy: ReplayPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether there are no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Offset of every stage from the visibility edge, in authored order
    pub fn offsets(&self) -> Vec<(Duration, &str)> {
        let mut elapsed = Duration::ZERO;
        self.stages
            .iter()
            .map(|stage| {
                let offset = match self.timing {
                    StageTiming::Absolute => stage.delay,
                    StageTiming::Cumulative => {
                        elapsed += stage.delay;
                        elapsed
                    }
                };
                (offset, stage.flag.as_str())
            })
            .collect()
    }

    /// Time from the visibility edge until the last stage fires
    pub fn total_duration(&self) -> Duration {
        self.offsets()
            .into_iter()
            .map(|(offset, _)| offset)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Reject duplicate or empty flags
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.flag.is_empty() {
                return Err(MotionError::invalid("stage flag must not be empty"));
            }
            if !seen.insert(stage.flag.as_str()) {
                return Err(MotionError::invalid(format!(
                    "duplicate stage flag '{}'",
                    stage.flag
                )));
            }
        }
        Ok(())
    }
}

/// Render-facing view of a sequencer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RevealSnapshot {
    /// Whether the current visibility session is active
    pub visible: bool,
    /// Fired flags, in firing order
    pub active: Vec<String>,
    /// Timers still waiting to fire
    pub pending_timers: usize,
}

struct SequencerCore {
    scheduler: Arc<dyn Scheduler>,
    offsets: Vec<(Duration, String)>,
    policy: ReplayPolicy,
    visible: bool,
    session: u64,
    active: IndexSet<String>,
    /// Pending timer per stage index
    timers: IndexMap<usize, TimerId>,
    torn_down: bool,
}

impl SequencerCore {
    fn begin_session(&mut self, weak: Weak<Mutex<SequencerCore>>) {
        // Leftovers from a previous session never survive into a new one
        self.cancel_pending();
        self.visible = true;
        self.session += 1;
        let session = self.session;

        for (index, (offset, flag)) in self.offsets.iter().enumerate() {
            if self.active.contains(flag) {
                continue;
            }
            if offset.is_zero() {
                self.active.insert(flag.clone());
                continue;
            }

            let weak = weak.clone();
            let timer = self.scheduler.after(
                *offset,
                Box::new(move || {
                    if let Some(core) = weak.upgrade() {
                        core.lock().fire(session, index);
                    }
                }),
            );
            self.timers.insert(index, timer);
        }

        tracing::debug!(
            session,
            scheduled = self.timers.len(),
            already_active = self.active.len(),
            "Reveal session started"
        );
    }

    fn end_session(&mut self) {
        self.visible = false;
        let cancelled = self.cancel_pending();
        if self.policy == ReplayPolicy::Replay {
            self.active.clear();
        }
        tracing::debug!(session = self.session, cancelled, "Reveal session ended");
    }

    fn fire(&mut self, session: u64, index: usize) {
        if self.torn_down || !self.visible || session != self.session {
            return;
        }
        self.timers.shift_remove(&index);
        if let Some((_, flag)) = self.offsets.get(index) {
            if self.active.insert(flag.clone()) {
                tracing::trace!(flag = %flag, "Stage fired");
            }
        }
    }

    fn cancel_pending(&mut self) -> usize {
        let timers: Vec<TimerId> = self.timers.drain(..).map(|(_, timer)| timer).collect();
        cancel_all(self.scheduler.as_ref(), timers)
    }
}

fn apply_visibility(core: &Arc<Mutex<SequencerCore>>, visible: bool) {
    let mut guard = core.lock();
    if guard.torn_down || guard.visible == visible {
        return;
    }
    if visible {
        guard.begin_session(Arc::downgrade(core));
    } else {
        guard.end_session();
    }
}

/// Drives reveal flags from visibility edges
pub struct StageSequencer {
    core: Arc<Mutex<SequencerCore>>,
}

impl StageSequencer {
    /// Create a sequencer. Nothing is scheduled until the first visible edge.
    pub fn new(sequence: StageSequence, scheduler: Arc<dyn Scheduler>) -> Result<Self> {
        sequence.validate()?;
        let offsets = sequence
            .offsets()
            .into_iter()
            .map(|(offset, flag)| (offset, flag.to_string()))
            .collect();

        Ok(Self {
            core: Arc::new(Mutex::new(SequencerCore {
                scheduler,
                offsets,
                policy: sequence.policy,
                visible: false,
                session: 0,
                active: IndexSet::new(),
                timers: IndexMap::new(),
                torn_down: false,
            })),
        })
    }

    /// Feed a visibility value. Only edges have an effect.
    pub fn set_visible(&self, visible: bool) {
        apply_visibility(&self.core, visible);
    }

    /// Listener suitable for [`crate::VisibilityGate::subscribe`].
    /// Holds the sequencer weakly.
    pub fn visibility_listener(&self) -> impl FnMut(VisibilityState) + Send + 'static {
        let weak = Arc::downgrade(&self.core);
        move |state: VisibilityState| {
            if let Some(core) = weak.upgrade() {
                apply_visibility(&core, state.is_visible);
            }
        }
    }

    /// Fired flags, in firing order
    pub fn active(&self) -> Vec<String> {
        self.core.lock().active.iter().cloned().collect()
    }

    /// Whether `flag` has fired in the current session
    pub fn is_active(&self, flag: &str) -> bool {
        self.core.lock().active.contains(flag)
    }

    /// Whether a visibility session is in progress
    pub fn is_visible(&self) -> bool {
        self.core.lock().visible
    }

    /// Whether every stage has fired. Zero-stage sequences are always complete.
    pub fn is_complete(&self) -> bool {
        let core = self.core.lock();
        core.active.len() == core.offsets.len()
    }

    /// Timers still waiting to fire
    pub fn pending_timers(&self) -> usize {
        self.core.lock().timers.len()
    }

    /// Render-facing snapshot
    pub fn snapshot(&self) -> RevealSnapshot {
        let core = self.core.lock();
        RevealSnapshot {
            visible: core.visible,
            active: core.active.iter().cloned().collect(),
            pending_timers: core.timers.len(),
        }
    }

    /// Cancel every pending timer and stop reacting to visibility
    pub fn teardown(&self) {
        let mut core = self.core.lock();
        if core.torn_down {
            return;
        }
        core.torn_down = true;
        core.visible = false;
        let cancelled = core.cancel_pending();
        core.active.clear();
        tracing::debug!(cancelled, "Stage sequencer torn down");
    }
}

impl Drop for StageSequencer {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn steps_sequence() -> StageSequence {
        StageSequence::new(vec![
            StageSpec::from_millis(1500, "block1"),
            StageSpec::from_millis(3000, "block2"),
            StageSpec::from_millis(4500, "block3"),
            StageSpec::from_millis(6000, "block4"),
        ])
    }

    fn setup(sequence: StageSequence) -> (Arc<ManualScheduler>, StageSequencer) {
        let scheduler = Arc::new(ManualScheduler::new());
        let sequencer = StageSequencer::new(sequence, scheduler.clone()).unwrap();
        (scheduler, sequencer)
    }

    #[test]
    fn test_steps_reveal_scenario() {
        let (scheduler, sequencer) = setup(steps_sequence());
        sequencer.set_visible(true);
        assert!(sequencer.active().is_empty());
        assert_eq!(scheduler.pending(), 4);

        scheduler.advance_to(ms(1500));
        assert_eq!(sequencer.active(), vec!["block1"]);

        scheduler.advance_to(ms(3000));
        assert_eq!(sequencer.active(), vec!["block1", "block2"]);

        scheduler.advance_to(ms(6000));
        assert_eq!(sequencer.active(), vec!["block1", "block2", "block3", "block4"]);
        assert!(sequencer.is_complete());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_nothing_fires_before_visible() {
        let (scheduler, sequencer) = setup(steps_sequence());
        scheduler.advance(ms(10_000));
        assert!(sequencer.active().is_empty());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_visibility_loss_resets_and_replays() {
        let (scheduler, sequencer) = setup(steps_sequence());
        sequencer.set_visible(true);
        scheduler.advance(ms(3200));
        assert_eq!(sequencer.active().len(), 2);

        sequencer.set_visible(false);
        assert!(sequencer.active().is_empty());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(sequencer.pending_timers(), 0);

        scheduler.advance(ms(500));
        sequencer.set_visible(true);
        scheduler.advance(ms(1500));
        assert_eq!(sequencer.active(), vec!["block1"]);
    }

    #[test]
    fn test_rapid_toggling_does_not_leak_timers() {
        let (scheduler, sequencer) = setup(steps_sequence());
        for _ in 0..10 {
            sequencer.set_visible(true);
            scheduler.advance(ms(100));
            sequencer.set_visible(false);
        }
        assert_eq!(scheduler.pending(), 0);

        sequencer.set_visible(true);
        sequencer.set_visible(true);
        assert_eq!(scheduler.pending(), 4);

        scheduler.advance(ms(6000));
        assert!(sequencer.is_complete());
    }

    #[test]
    fn test_stages_are_independent_timers() {
        let sequence = StageSequence::new(vec![
            StageSpec::from_millis(3000, "late"),
            StageSpec::from_millis(1000, "early"),
        ]);
        let (scheduler, sequencer) = setup(sequence);
        sequencer.set_visible(true);

        scheduler.advance(ms(1000));
        assert_eq!(sequencer.active(), vec!["early"]);
        scheduler.advance(ms(2000));
        assert_eq!(sequencer.active(), vec!["early", "late"]);
    }

    #[test]
    fn test_zero_stage_sequence_is_complete() {
        let (scheduler, sequencer) = setup(StageSequence::default());
        assert!(sequencer.is_complete());

        sequencer.set_visible(true);
        assert!(sequencer.is_complete());
        assert!(sequencer.active().is_empty());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_zero_delay_stage_fires_on_edge() {
        let sequence = StageSequence::default()
            .stage(Duration::ZERO, "heading")
            .stage(ms(1000), "text");
        let (scheduler, sequencer) = setup(sequence);

        sequencer.set_visible(true);
        assert_eq!(sequencer.active(), vec!["heading"]);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_cumulative_timing_chains_offsets() {
        let sequence = StageSequence::default()
            .stage(Duration::ZERO, "visible1")
            .stage(ms(2000), "visible2")
            .stage(ms(2000), "visible3")
            .stage(ms(2000), "visible4")
            .stage(ms(2000), "visible5")
            .with_timing(StageTiming::Cumulative);
        assert_eq!(sequence.total_duration(), ms(8000));

        let (scheduler, sequencer) = setup(sequence);
        sequencer.set_visible(true);
        assert_eq!(sequencer.active(), vec!["visible1"]);

        scheduler.advance(ms(4000));
        assert_eq!(sequencer.active().len(), 3);
        scheduler.advance(ms(4000));
        assert!(sequencer.is_complete());
    }

    #[test]
    fn test_once_policy_keeps_fired_flags() {
        let (scheduler, sequencer) = setup(steps_sequence().with_policy(ReplayPolicy::Once));
        sequencer.set_visible(true);
        scheduler.advance(ms(3000));
        sequencer.set_visible(false);

        assert_eq!(sequencer.active(), vec!["block1", "block2"]);
        assert_eq!(scheduler.pending(), 0);

        sequencer.set_visible(true);
        assert_eq!(scheduler.pending(), 2);
        scheduler.advance(ms(6000));
        assert!(sequencer.is_complete());
    }

    #[test]
    fn test_duplicate_flags_rejected() {
        let scheduler = Arc::new(ManualScheduler::new());
        let sequence = StageSequence::default()
            .stage(ms(100), "block")
            .stage(ms(200), "block");
        assert!(matches!(
            StageSequencer::new(sequence, scheduler),
            Err(MotionError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_teardown_cancels_everything() {
        let (scheduler, sequencer) = setup(steps_sequence());
        sequencer.set_visible(true);
        scheduler.advance(ms(1500));

        sequencer.teardown();
        assert_eq!(scheduler.pending(), 0);
        assert!(sequencer.active().is_empty());

        sequencer.set_visible(true);
        scheduler.advance(ms(10_000));
        assert!(sequencer.active().is_empty());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_drop_cancels_pending_timers() {
        let (scheduler, sequencer) = setup(steps_sequence());
        sequencer.set_visible(true);
        assert_eq!(scheduler.pending(), 4);

        drop(sequencer);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_snapshot() {
        let (scheduler, sequencer) = setup(steps_sequence());
        sequencer.set_visible(true);
        scheduler.advance(ms(1500));

        let snapshot = sequencer.snapshot();
        assert!(snapshot.visible);
        assert_eq!(snapshot.active, vec!["block1".to_string()]);
        assert_eq!(snapshot.pending_timers, 3);
    }
}
