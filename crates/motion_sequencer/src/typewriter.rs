// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typewriter word cycler.
//!
//! Types a word one letter per tick, holds it, deletes it one letter per
//! tick and moves on to the next word, forever. [`TypewriterState`] is the
//! pure state machine; [`TypewriterCycler`] drives it from a [`Scheduler`].

use crate::error::{MotionError, Result};
use crate::scheduler::{Scheduler, TimerId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Typewriter phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TypewriterPhase {
    /// Adding letters
    #[default]
    Typing,
    /// Holding the full word
    Pausing,
    /// Removing letters
    Deleting,
}

/// Tick rates per phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypewriterTiming {
    /// Delay between typed letters
    pub typing: Duration,
    /// Delay between deleted letters
    pub deleting: Duration,
    /// Dwell on the full word before deleting starts
    pub pause: Duration,
}

impl Default for TypewriterTiming {
    fn default() -> Self {
        Self {
            typing: Duration::from_millis(200),
            deleting: Duration::from_millis(100),
            pause: Duration::from_millis(1000),
        }
    }
}

impl TypewriterTiming {
    /// Reject zero durations
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("typing", self.typing),
            ("deleting", self.deleting),
            ("pause", self.pause),
        ] {
            if value.is_zero() {
                return Err(MotionError::invalid(format!(
                    "typewriter {name} delay must be positive"
                )));
            }
        }
        Ok(())
    }

    /// Delay before the tick that follows entering `phase`
    pub fn delay_for(&self, phase: TypewriterPhase) -> Duration {
        match phase {
            TypewriterPhase::Typing => self.typing,
            TypewriterPhase::Pausing => self.pause,
            TypewriterPhase::Deleting => self.deleting,
        }
    }
}

/// Render-facing view of a typewriter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypewriterSnapshot {
    /// Visible prefix of the current word
    pub display_text: String,
    /// Index of the current word
    pub word_index: usize,
    /// Number of letters shown
    pub letter_index: usize,
    /// Current phase
    pub phase: TypewriterPhase,
}

/// Pure typewriter state machine.
///
/// Invariant: `display_text() == words[word_index][..letter_index]`, with
/// letters counted as `char`s.
#[derive(Debug, Clone)]
pub struct TypewriterState {
    words: Vec<String>,
    timing: TypewriterTiming,
    word_index: usize,
    letter_index: usize,
    phase: TypewriterPhase,
}

impl TypewriterState {
    /// Create a typewriter at the start of the first word
    pub fn new(words: Vec<String>, timing: TypewriterTiming) -> Result<Self> {
        if words.is_empty() {
            return Err(MotionError::invalid("typewriter needs at least one word"));
        }
        timing.validate()?;

        Ok(Self {
            words,
            timing,
            word_index: 0,
            letter_index: 0,
            phase: TypewriterPhase::Typing,
        })
    }

    fn current_len(&self) -> usize {
        self.words[self.word_index].chars().count()
    }

    /// Advance one step. Returns the delay before the next tick.
    pub fn tick(&mut self) -> Duration {
        match self.phase {
            TypewriterPhase::Typing => {
                let len = self.current_len();
                if self.letter_index < len {
                    self.letter_index += 1;
                }
                if self.letter_index >= len {
                    self.phase = TypewriterPhase::Pausing;
                }
            }
            TypewriterPhase::Pausing => {
                self.phase = TypewriterPhase::Deleting;
            }
            TypewriterPhase::Deleting => {
                self.letter_index = self.letter_index.saturating_sub(1);
                if self.letter_index == 0 {
                    self.word_index = (self.word_index + 1) % self.words.len();
                    self.phase = TypewriterPhase::Typing;
                }
            }
        }
        self.timing.delay_for(self.phase)
    }

    /// Delay before the next tick from the current phase
    pub fn next_delay(&self) -> Duration {
        self.timing.delay_for(self.phase)
    }

    /// Visible prefix of the current word
    pub fn display_text(&self) -> &str {
        let word = &self.words[self.word_index];
        let end = word
            .char_indices()
            .nth(self.letter_index)
            .map_or(word.len(), |(offset, _)| offset);
        &word[..end]
    }

    /// Current word
    pub fn current_word(&self) -> &str {
        &self.words[self.word_index]
    }

    /// Index of the current word
    pub fn word_index(&self) -> usize {
        self.word_index
    }

    /// Number of letters shown
    pub fn letter_index(&self) -> usize {
        self.letter_index
    }

    /// Current phase
    pub fn phase(&self) -> TypewriterPhase {
        self.phase
    }

    /// Words being cycled
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Render-facing snapshot
    pub fn snapshot(&self) -> TypewriterSnapshot {
        TypewriterSnapshot {
            display_text: self.display_text().to_string(),
            word_index: self.word_index,
            letter_index: self.letter_index,
            phase: self.phase,
        }
    }
}

struct CyclerCore {
    state: TypewriterState,
    scheduler: Arc<dyn Scheduler>,
    timer: Option<TimerId>,
    torn_down: bool,
}

impl CyclerCore {
    fn schedule(&mut self, weak: Weak<Mutex<CyclerCore>>, delay: Duration) {
        let timer = self.scheduler.after(
            delay,
            Box::new(move || {
                if let Some(core) = weak.upgrade() {
                    let next = Arc::downgrade(&core);
                    core.lock().on_tick(next);
                }
            }),
        );
        self.timer = Some(timer);
    }

    fn on_tick(&mut self, weak: Weak<Mutex<CyclerCore>>) {
        self.timer = None;
        if self.torn_down {
            return;
        }
        let delay = self.state.tick();
        tracing::trace!(
            text = self.state.display_text(),
            phase = ?self.state.phase(),
            "Typewriter tick"
        );
        self.schedule(weak, delay);
    }
}

/// Scheduler-driven typewriter; runs until torn down
pub struct TypewriterCycler {
    core: Arc<Mutex<CyclerCore>>,
}

impl TypewriterCycler {
    /// Start cycling `words`. The first letter appears after one typing delay.
    pub fn mount(
        words: Vec<String>,
        timing: TypewriterTiming,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        let state = TypewriterState::new(words, timing)?;
        let delay = state.next_delay();
        tracing::debug!(words = state.words().len(), "Typewriter mounted");

        let core = Arc::new(Mutex::new(CyclerCore {
            state,
            scheduler,
            timer: None,
            torn_down: false,
        }));
        core.lock().schedule(Arc::downgrade(&core), delay);

        Ok(Self { core })
    }

    /// Render-facing snapshot
    pub fn snapshot(&self) -> TypewriterSnapshot {
        self.core.lock().state.snapshot()
    }

    /// Visible text
    pub fn display_text(&self) -> String {
        self.core.lock().state.display_text().to_string()
    }

    /// Whether a tick is scheduled
    pub fn is_running(&self) -> bool {
        self.core.lock().timer.is_some()
    }

    /// Cancel the pending tick
    pub fn teardown(&self) {
        let mut core = self.core.lock();
        if core.torn_down {
            return;
        }
        core.torn_down = true;
        if let Some(timer) = core.timer.take() {
            core.scheduler.cancel(timer);
        }
        tracing::debug!("Typewriter torn down");
    }
}

impl Drop for TypewriterCycler {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    fn words() -> Vec<String> {
        ["HEALTH", "SAFETY", "FUTURE"].map(String::from).to_vec()
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_rejects_empty_word_list() {
        assert!(matches!(
            TypewriterState::new(Vec::new(), TypewriterTiming::default()),
            Err(MotionError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_zero_timing() {
        let timing = TypewriterTiming {
            deleting: Duration::ZERO,
            ..TypewriterTiming::default()
        };
        assert!(TypewriterState::new(words(), timing).is_err());
    }

    #[test]
    fn test_full_cycle_advances_word() {
        let mut state = TypewriterState::new(words(), TypewriterTiming::default()).unwrap();

        for expected in ["H", "HE", "HEA", "HEAL", "HEALT", "HEALTH"] {
            state.tick();
            assert_eq!(state.display_text(), expected);
        }
        assert_eq!(state.phase(), TypewriterPhase::Pausing);

        state.tick();
        assert_eq!(state.phase(), TypewriterPhase::Deleting);
        assert_eq!(state.display_text(), "HEALTH");

        for _ in 0..6 {
            state.tick();
        }
        assert_eq!(state.word_index(), 1);
        assert_eq!(state.display_text(), "");
        assert_eq!(state.phase(), TypewriterPhase::Typing);
        assert_eq!(state.current_word(), "SAFETY");
    }

    #[test]
    fn test_cycle_wraps_around() {
        let mut state = TypewriterState::new(words(), TypewriterTiming::default()).unwrap();
        // Six typing ticks, one pause tick, six deleting ticks per word
        for _ in 0..(13 * 3) {
            state.tick();
        }
        assert_eq!(state.word_index(), 0);
        assert_eq!(state.letter_index(), 0);
    }

    #[test]
    fn test_tick_delays_follow_phase() {
        let mut state = TypewriterState::new(vec!["AB".into()], TypewriterTiming::default()).unwrap();
        assert_eq!(state.tick(), ms(200));
        assert_eq!(state.tick(), ms(1000));
        assert_eq!(state.tick(), ms(100));
        assert_eq!(state.tick(), ms(100));
        assert_eq!(state.tick(), ms(200));
    }

    #[test]
    fn test_multibyte_words() {
        let mut state = TypewriterState::new(vec!["SALÜD".into()], TypewriterTiming::default()).unwrap();
        for _ in 0..4 {
            state.tick();
        }
        assert_eq!(state.display_text(), "SALÜ");
        state.tick();
        assert_eq!(state.display_text(), "SALÜD");
    }

    #[test]
    fn test_empty_word_is_skipped_through() {
        let mut state =
            TypewriterState::new(vec![String::new(), "A".into()], TypewriterTiming::default()).unwrap();
        state.tick();
        assert_eq!(state.phase(), TypewriterPhase::Pausing);
        state.tick();
        state.tick();
        assert_eq!(state.word_index(), 1);
    }

    #[test]
    fn test_cycler_on_scheduler() {
        let scheduler = Arc::new(ManualScheduler::new());
        let cycler = TypewriterCycler::mount(words(), TypewriterTiming::default(), scheduler.clone()).unwrap();
        assert_eq!(cycler.display_text(), "");

        scheduler.advance(ms(200 * 6));
        assert_eq!(cycler.display_text(), "HEALTH");
        assert_eq!(cycler.snapshot().phase, TypewriterPhase::Pausing);

        // Pause, then six deletions
        scheduler.advance(ms(1000 + 100 * 6));
        let snapshot = cycler.snapshot();
        assert_eq!(snapshot.word_index, 1);
        assert_eq!(snapshot.display_text, "");

        scheduler.advance(ms(200));
        assert_eq!(cycler.display_text(), "S");
    }

    #[test]
    fn test_teardown_cancels_tick() {
        let scheduler = Arc::new(ManualScheduler::new());
        let cycler = TypewriterCycler::mount(words(), TypewriterTiming::default(), scheduler.clone()).unwrap();
        scheduler.advance(ms(400));
        assert_eq!(scheduler.pending(), 1);

        cycler.teardown();
        assert_eq!(scheduler.pending(), 0);
        assert!(!cycler.is_running());

        scheduler.advance(ms(5000));
        assert_eq!(cycler.display_text(), "HE");
    }

    #[test]
    fn test_drop_cancels_tick() {
        let scheduler = Arc::new(ManualScheduler::new());
        let cycler = TypewriterCycler::mount(words(), TypewriterTiming::default(), scheduler.clone()).unwrap();
        drop(cycler);
        assert_eq!(scheduler.pending(), 0);
    }
}
