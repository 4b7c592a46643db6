// SPDX-License-Identifier: MIT OR Apache-2.0
//! Motion playground - headless host for the motion sequencer.
//!
//! Mounts every section of the site from a RON config, replays a scripted
//! visitor session against it and logs one JSON frame per tick.
//!
//! ```text
//! motion_playground [--config motion.ron] [--realtime] [--duration-ms 16000] [--frame-ms 500]
//! ```
//!
//! By default the session runs on a virtual clock and finishes instantly;
//! `--realtime` drives it from the tokio runtime instead.

mod error;
mod script;
mod site;

use clap::Parser;
use error::{PlaygroundError, Result};
use motion_sequencer::{ManualScheduler, ManualViewport, MotionConfig, Scheduler, TokioScheduler};
use script::Step;
use site::Site;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Headless host for the site's motion sections
#[derive(Parser, Debug)]
#[command(name = "motion_playground")]
#[command(version, about, long_about = None)]
struct Options {
    /// Motion config file (RON); the site defaults are used when omitted
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Drive the session from the tokio runtime in wall-clock time
    #[arg(short = 'r', long)]
    realtime: bool,

    /// Session length in milliseconds
    #[arg(long, default_value_t = 16_000, value_name = "MS")]
    duration_ms: u64,

    /// Time between logged frames in milliseconds
    #[arg(long, default_value_t = 500, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    frame_ms: u64,
}

impl Options {
    fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}

/// Live resources left once a session has torn the site down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SessionReport {
    pending_timers: usize,
    subscriptions: usize,
}

fn log_frame(site: &Site, now: Duration) -> Result<()> {
    let frame = site.frame(now);
    tracing::info!(target: "motion_playground::frame", "{}", serde_json::to_string(&frame)?);
    Ok(())
}

/// Run the session on a virtual clock
fn simulate(config: &MotionConfig, options: &Options, script: Vec<Step>) -> Result<SessionReport> {
    let scheduler = Arc::new(ManualScheduler::new());
    let viewport = Arc::new(ManualViewport::new());
    let mut site = Site::mount(config, scheduler.clone(), viewport.clone())?;

    let mut steps = script.into_iter().peekable();
    let mut now = Duration::ZERO;
    while now <= options.duration() {
        while let Some(step) = steps.next_if(|s| s.at <= now) {
            scheduler.advance_to(step.at);
            script::apply(&site, &step.action)?;
        }
        scheduler.advance_to(now);
        log_frame(&site, scheduler.now())?;
        now += options.frame();
    }

    site.teardown();
    Ok(SessionReport {
        pending_timers: scheduler.pending(),
        subscriptions: viewport.subscription_count(),
    })
}

/// Run the session on the tokio runtime in wall-clock time
fn realtime(config: &MotionConfig, options: &Options, script: Vec<Step>) -> Result<SessionReport> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    runtime.block_on(async {
        let scheduler = Arc::new(TokioScheduler::new(tokio::runtime::Handle::current()));
        let viewport = Arc::new(ManualViewport::new());
        let mut site = Site::mount(config, scheduler.clone(), viewport.clone())?;
        let start = tokio::time::Instant::now();

        let mut steps = script.into_iter().peekable();
        let mut now = Duration::ZERO;
        while now <= options.duration() {
            while let Some(step) = steps.next_if(|s| s.at <= now) {
                tokio::time::sleep_until(start + step.at).await;
                script::apply(&site, &step.action)?;
            }
            tokio::time::sleep_until(start + now).await;
            log_frame(&site, scheduler.now())?;
            now += options.frame();
        }

        site.teardown();
        Ok::<_, PlaygroundError>(SessionReport {
            pending_timers: scheduler.pending(),
            subscriptions: viewport.subscription_count(),
        })
    })
}

fn run() -> Result<()> {
    let options = Options::parse();
    let config = match &options.config {
        Some(path) => MotionConfig::load(path)?,
        None => MotionConfig::default(),
    };

    let script = script::default_script();
    let report = if options.realtime {
        realtime(&config, &options, script)?
    } else {
        simulate(&config, &options, script)?
    };
    tracing::info!(
        pending_timers = report.pending_timers,
        subscriptions = report.subscriptions,
        "Session finished"
    );
    Ok(())
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("motion_playground=debug,motion_sequencer=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting motion playground v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        tracing::error!("Playground failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Options, clap::Error> {
        Options::try_parse_from(std::iter::once("motion_playground").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_defaults() {
        let options = parse(&[]).unwrap();
        assert!(!options.realtime);
        assert!(options.config.is_none());
        assert_eq!(options.frame(), Duration::from_millis(500));
        assert_eq!(options.duration(), Duration::from_millis(16_000));
    }

    #[test]
    fn test_parse_flags() {
        let options = parse(&["--realtime", "--duration-ms", "2000", "--config", "motion.ron"]).unwrap();
        assert!(options.realtime);
        assert_eq!(options.duration(), Duration::from_millis(2000));
        assert_eq!(options.config, Some(PathBuf::from("motion.ron")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["--frame-ms"]).is_err());
        assert!(parse(&["--frame-ms", "0"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }

    #[test]
    fn test_simulated_session_cleans_up() {
        let options = parse(&["--duration-ms", "15000"]).unwrap();
        let report = simulate(&MotionConfig::default(), &options, script::default_script()).unwrap();
        assert_eq!(
            report,
            SessionReport {
                pending_timers: 0,
                subscriptions: 0,
            }
        );
    }
}
