// SPDX-License-Identifier: MIT OR Apache-2.0
//! The site's motion, mounted against one scheduler and one viewport.

use crate::error::{PlaygroundError, Result};
use motion_sequencer::{
    horizontal_position, CarouselSnapshot, EphemeralQueue, FadeCarousel, ManualViewport,
    MotionConfig, RegionId, RevealSection, RevealSnapshot, Scheduler, SectionTrigger,
    StageSequencer, TypewriterCycler, TypewriterSnapshot,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Testimonial authors shown by the carousel
pub const TESTIMONIALS: [&str; 4] = ["Emily Davis", "Michael Johnson", "Samantha William", "David Wilson"];

enum MountedSection {
    Viewport {
        region: RegionId,
        section: RevealSection,
    },
    Mount(StageSequencer),
}

impl MountedSection {
    fn snapshot(&self) -> RevealSnapshot {
        match self {
            Self::Viewport { section, .. } => section.snapshot(),
            Self::Mount(sequencer) => sequencer.snapshot(),
        }
    }

    fn teardown(&mut self) {
        match self {
            Self::Viewport { section, .. } => section.teardown(),
            Self::Mount(sequencer) => sequencer.teardown(),
        }
    }
}

/// Everything a renderer would need for one frame
#[derive(Debug, Serialize)]
pub struct SiteFrame {
    /// Scheduler time in milliseconds
    pub at_ms: u64,
    /// Hero typewriter
    pub typewriter: TypewriterSnapshot,
    /// Horizontal positions of live particles
    pub particles: Vec<f32>,
    /// Testimonial carousel
    pub carousel: CarouselSnapshot,
    /// Testimonial currently displayed
    pub testimonial: &'static str,
    /// Reveal state per section
    pub sections: BTreeMap<String, RevealSnapshot>,
}

/// Mounted motion components of every page section
pub struct Site {
    viewport: Arc<ManualViewport>,
    sections: BTreeMap<String, MountedSection>,
    typewriter: TypewriterCycler,
    particles: EphemeralQueue<f32>,
    carousel: FadeCarousel<&'static str>,
}

impl Site {
    /// Mount every component described by `config`
    pub fn mount(
        config: &MotionConfig,
        scheduler: Arc<dyn Scheduler>,
        viewport: Arc<ManualViewport>,
    ) -> Result<Self> {
        config.validate()?;

        let mut sections = BTreeMap::new();
        for section in &config.sections {
            let sequence = section.sequence()?;
            let mounted = match section.trigger {
                SectionTrigger::Viewport { threshold } => {
                    let region = RegionId::new();
                    let reveal = RevealSection::mount(
                        viewport.clone(),
                        Arc::clone(&scheduler),
                        region,
                        threshold,
                        sequence,
                    )?;
                    MountedSection::Viewport {
                        region,
                        section: reveal,
                    }
                }
                SectionTrigger::Mount => {
                    let sequencer = StageSequencer::new(sequence, Arc::clone(&scheduler))?;
                    sequencer.set_visible(true);
                    MountedSection::Mount(sequencer)
                }
            };
            sections.insert(section.name.clone(), mounted);
        }

        let typewriter = TypewriterCycler::mount(
            config.typewriter.words.clone(),
            config.typewriter.timing()?,
            Arc::clone(&scheduler),
        )?;
        let particles = EphemeralQueue::spawn_loop(
            config.particles.interval()?,
            config.particles.ttl()?,
            horizontal_position(config.particles.seed),
            Arc::clone(&scheduler),
        )?;
        let carousel = FadeCarousel::new(TESTIMONIALS.to_vec(), config.carousel.timing()?, scheduler)?;

        tracing::info!(sections = sections.len(), "Site mounted");
        Ok(Self {
            viewport,
            sections,
            typewriter,
            particles,
            carousel,
        })
    }

    /// Report how much of `section` is inside the viewport
    pub fn scroll(&self, section: &str, ratio: f32) -> Result<()> {
        match self.sections.get(section) {
            Some(MountedSection::Viewport { region, .. }) => {
                tracing::debug!(section, ratio, "Scroll");
                self.viewport.set_ratio(*region, ratio);
                Ok(())
            }
            Some(MountedSection::Mount(_)) => {
                tracing::warn!(section, "Section is mount-triggered; scroll ignored");
                Ok(())
            }
            None => Err(PlaygroundError::UnknownSection(section.to_string())),
        }
    }

    /// Testimonial carousel
    pub fn carousel(&self) -> &FadeCarousel<&'static str> {
        &self.carousel
    }

    /// Snapshot of every component
    pub fn frame(&self, now: Duration) -> SiteFrame {
        SiteFrame {
            at_ms: u64::try_from(now.as_millis()).unwrap_or(u64::MAX),
            typewriter: self.typewriter.snapshot(),
            particles: self
                .particles
                .live_items()
                .into_iter()
                .map(|item| item.attributes)
                .collect(),
            carousel: self.carousel.snapshot(),
            testimonial: self.carousel.current(),
            sections: self
                .sections
                .iter()
                .map(|(name, section)| (name.clone(), section.snapshot()))
                .collect(),
        }
    }

    /// Tear every component down
    pub fn teardown(&mut self) {
        for section in self.sections.values_mut() {
            section.teardown();
        }
        self.typewriter.teardown();
        self.particles.teardown();
        self.carousel.teardown();
        tracing::info!("Site torn down");
    }
}
