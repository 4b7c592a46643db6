// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scripted visitor session.

use crate::error::Result;
use crate::site::Site;
use std::time::Duration;

/// Something the visitor does
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Scroll so that `ratio` of `section` is visible
    Scroll {
        /// Section name
        section: &'static str,
        /// Visible fraction
        ratio: f32,
    },
    /// Click the right testimonial arrow
    CarouselNext,
    /// Click the left testimonial arrow
    CarouselPrevious,
    /// Jump to a testimonial
    CarouselGoTo(usize),
}

/// An action at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Time since mount
    pub at: Duration,
    /// What happens
    pub action: Action,
}

fn step(at_ms: u64, action: Action) -> Step {
    Step {
        at: Duration::from_millis(at_ms),
        action,
    }
}

fn scroll(section: &'static str, ratio: f32) -> Action {
    Action::Scroll { section, ratio }
}

/// A visitor who scrolls through the home page, flicks through the
/// testimonials and scrolls back up before the reveals finish.
pub fn default_script() -> Vec<Step> {
    vec![
        step(5300, scroll("steps", 0.5)),
        step(7000, scroll("steps", 0.1)),
        step(7500, scroll("steps", 0.9)),
        step(9000, scroll("testimonials", 0.6)),
        step(9500, Action::CarouselNext),
        step(9600, Action::CarouselNext),
        step(9700, Action::CarouselNext),
        step(11_000, Action::CarouselPrevious),
        step(11_200, Action::CarouselGoTo(7)),
        step(12_000, scroll("mission", 0.5)),
        step(12_000, scroll("about-hero", 0.3)),
        step(14_000, scroll("steps", 0.0)),
    ]
}

/// Perform `action` on `site`
pub fn apply(site: &Site, action: &Action) -> Result<()> {
    match action {
        Action::Scroll { section, ratio } => site.scroll(section, *ratio)?,
        Action::CarouselNext => {
            site.carousel().next();
        }
        Action::CarouselPrevious => {
            site.carousel().previous();
        }
        Action::CarouselGoTo(index) => {
            if let Err(e) = site.carousel().go_to(*index) {
                tracing::warn!("Carousel request ignored: {e}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_script_is_ordered() {
        let script = default_script();
        assert!(script.windows(2).all(|pair| pair[0].at <= pair[1].at));
    }
}
