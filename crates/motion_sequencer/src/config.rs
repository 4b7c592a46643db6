// SPDX-License-Identifier: MIT OR Apache-2.0
//! Motion configuration.
//!
//! Every tunable of the site's motion lives in one RON document:
//! - Typewriter words and tick rates
//! - Particle spawn interval and lifetime
//! - Carousel fade durations
//! - Reveal sections and their stages
//!
//! Millisecond fields are signed so that negative values are reported as
//! [`MotionError::InvalidConfiguration`] instead of failing to parse or
//! being clamped.

use crate::carousel::FadeTiming;
use crate::error::{MotionError, Result};
use crate::stage::{ReplayPolicy, StageSequence, StageSpec, StageTiming};
use crate::typewriter::TypewriterTiming;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Current config format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "motion.ron";

fn millis(field: &str, value: i64) -> Result<Duration> {
    u64::try_from(value)
        .map(Duration::from_millis)
        .map_err(|_| MotionError::invalid(format!("{field} must not be negative (got {value})")))
}

/// Typewriter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypewriterConfig {
    /// Words to cycle through
    pub words: Vec<String>,
    /// Delay between typed letters
    pub typing_ms: i64,
    /// Delay between deleted letters
    pub deleting_ms: i64,
    /// Dwell on the full word
    pub pause_ms: i64,
}

impl Default for TypewriterConfig {
    fn default() -> Self {
        Self {
            words: ["HEALTH", "SAFETY", "FUTURE"].map(String::from).to_vec(),
            typing_ms: 200,
            deleting_ms: 100,
            pause_ms: 1000,
        }
    }
}

impl TypewriterConfig {
    /// Typed timing
    pub fn timing(&self) -> Result<TypewriterTiming> {
        let timing = TypewriterTiming {
            typing: millis("typewriter.typing_ms", self.typing_ms)?,
            deleting: millis("typewriter.deleting_ms", self.deleting_ms)?,
            pause: millis("typewriter.pause_ms", self.pause_ms)?,
        };
        timing.validate()?;
        Ok(timing)
    }
}

/// Particle spawner settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Time between spawns
    pub interval_ms: i64,
    /// Lifetime of each particle
    pub ttl_ms: i64,
    /// Seed for reproducible positions
    pub seed: Option<u64>,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            ttl_ms: 3000,
            seed: None,
        }
    }
}

impl ParticleConfig {
    /// Spawn interval; must be positive
    pub fn interval(&self) -> Result<Duration> {
        positive("particles.interval_ms", self.interval_ms)
    }

    /// Particle lifetime; must be positive
    pub fn ttl(&self) -> Result<Duration> {
        positive("particles.ttl_ms", self.ttl_ms)
    }
}

fn positive(field: &str, value: i64) -> Result<Duration> {
    let duration = millis(field, value)?;
    if duration.is_zero() {
        return Err(MotionError::invalid(format!("{field} must be positive")));
    }
    Ok(duration)
}

/// Carousel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarouselConfig {
    /// Fade-out duration before the swap
    pub fade_out_ms: i64,
    /// Fade-in duration after the swap
    pub fade_in_ms: i64,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            fade_out_ms: 300,
            fade_in_ms: 300,
        }
    }
}

impl CarouselConfig {
    /// Typed timing
    pub fn timing(&self) -> Result<FadeTiming> {
        let timing = FadeTiming {
            fade_out: millis("carousel.fade_out_ms", self.fade_out_ms)?,
            fade_in: millis("carousel.fade_in_ms", self.fade_in_ms)?,
        };
        timing.validate()?;
        Ok(timing)
    }
}

/// What starts a section's reveal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SectionTrigger {
    /// Scrolling at least `threshold` of the section into view
    Viewport {
        /// Visible fraction in `(0, 1]`
        threshold: f32,
    },
    /// Mounting the section
    Mount,
}

/// One authored stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Delay in milliseconds
    pub delay_ms: i64,
    /// Flag set when the stage fires
    pub flag: String,
}

impl StageConfig {
    fn new(delay_ms: i64, flag: &str) -> Self {
        Self {
            delay_ms,
            flag: flag.to_string(),
        }
    }
}

/// A reveal section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionConfig {
    /// Section name
    pub name: String,
    /// What starts the reveal
    pub trigger: SectionTrigger,
    /// Delay interpretation
    #[serde(default)]
    pub timing: StageTiming,
    /// Behaviour on visibility loss
    #[serde(default)]
    pub policy: ReplayPolicy,
    /// Stages in authored order
    pub stages: Vec<StageConfig>,
}

impl SectionConfig {
    /// Typed stage sequence
    pub fn sequence(&self) -> Result<StageSequence> {
        let mut stages = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let field = format!("sections.{}.{}.delay_ms", self.name, stage.flag);
            stages.push(StageSpec::new(millis(&field, stage.delay_ms)?, stage.flag.clone()));
        }

        let sequence = StageSequence::new(stages)
            .with_timing(self.timing)
            .with_policy(self.policy);
        sequence.validate()?;
        Ok(sequence)
    }

    /// Viewport threshold, if triggered by scrolling
    pub fn threshold(&self) -> Option<f32> {
        match self.trigger {
            SectionTrigger::Viewport { threshold } => Some(threshold),
            SectionTrigger::Mount => None,
        }
    }
}

/// Complete motion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Format version
    pub version: u32,
    /// Hero typewriter
    pub typewriter: TypewriterConfig,
    /// Floating particles
    pub particles: ParticleConfig,
    /// Testimonial carousel
    pub carousel: CarouselConfig,
    /// Reveal sections
    pub sections: Vec<SectionConfig>,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            typewriter: TypewriterConfig::default(),
            particles: ParticleConfig::default(),
            carousel: CarouselConfig::default(),
            sections: default_sections(),
        }
    }
}

fn default_sections() -> Vec<SectionConfig> {
    vec![
        SectionConfig {
            name: "steps".into(),
            trigger: SectionTrigger::Viewport { threshold: 0.4 },
            timing: StageTiming::Absolute,
            policy: ReplayPolicy::Replay,
            stages: vec![
                StageConfig::new(1500, "block1"),
                StageConfig::new(3000, "block2"),
                StageConfig::new(4500, "block3"),
                StageConfig::new(6000, "block4"),
            ],
        },
        SectionConfig {
            name: "testimonials".into(),
            trigger: SectionTrigger::Viewport { threshold: 0.4 },
            timing: StageTiming::Cumulative,
            policy: ReplayPolicy::Once,
            stages: vec![
                StageConfig::new(0, "heading"),
                StageConfig::new(2000, "image"),
                StageConfig::new(2000, "title"),
                StageConfig::new(2000, "quote"),
                StageConfig::new(2000, "publisher"),
            ],
        },
        SectionConfig {
            name: "mission".into(),
            trigger: SectionTrigger::Viewport { threshold: 0.4 },
            timing: StageTiming::Absolute,
            policy: ReplayPolicy::Once,
            stages: vec![
                StageConfig::new(0, "section"),
                StageConfig::new(1000, "block"),
                StageConfig::new(1000, "text"),
            ],
        },
        SectionConfig {
            name: "about-hero".into(),
            trigger: SectionTrigger::Viewport { threshold: 0.1 },
            timing: StageTiming::Absolute,
            policy: ReplayPolicy::Replay,
            stages: vec![StageConfig::new(0, "paragraph")],
        },
        SectionConfig {
            name: "splash".into(),
            trigger: SectionTrigger::Mount,
            timing: StageTiming::Cumulative,
            policy: ReplayPolicy::Once,
            stages: vec![
                StageConfig::new(5000, "loaded"),
                StageConfig::new(300, "content"),
            ],
        },
    ]
}

impl MotionConfig {
    /// Parse a RON document
    pub fn from_ron(source: &str) -> Result<Self> {
        let config: MotionConfig = ron::from_str(source)?;
        config.check_version()?;
        Ok(config)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), sections = config.sections.len(), "Loaded motion config");
        Ok(config)
    }

    /// Write the config as RON
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        tracing::info!(path = %path.display(), "Saved motion config");
        Ok(())
    }

    fn check_version(&self) -> Result<()> {
        if self.version > CONFIG_FORMAT_VERSION {
            return Err(MotionError::invalid(format!(
                "config version {} is newer than supported version {}",
                self.version, CONFIG_FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Check every value the components would reject at construction
    pub fn validate(&self) -> Result<()> {
        self.check_version()?;

        if self.typewriter.words.is_empty() {
            return Err(MotionError::invalid("typewriter.words must not be empty"));
        }
        self.typewriter.timing()?;
        self.particles.interval()?;
        self.particles.ttl()?;
        self.carousel.timing()?;

        let mut names = HashSet::new();
        for section in &self.sections {
            if !names.insert(section.name.as_str()) {
                return Err(MotionError::invalid(format!(
                    "duplicate section '{}'",
                    section.name
                )));
            }
            if let Some(threshold) = section.threshold() {
                if !(threshold > 0.0 && threshold <= 1.0) {
                    return Err(MotionError::invalid(format!(
                        "section '{}' threshold {threshold} outside (0, 1]",
                        section.name
                    )));
                }
            }
            section.sequence()?;
        }
        Ok(())
    }

    /// Look up a section by name
    pub fn section(&self, name: &str) -> Option<&SectionConfig> {
        self.sections.iter().find(|s| s.name == name)
    }
}
