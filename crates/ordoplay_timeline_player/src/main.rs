// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless player for OrdoPlay timeline documents.
//!
//! Usage:
//!   ordoplay-timeline-player demos/fade.ron
//!   ordoplay-timeline-player demos/slides.ron --speed 2 --repeat 3
//!   ordoplay-timeline-player demos/slides.ron --reverse --realtime

mod document;
mod runner;
mod scene;

use anyhow::Result;
use clap::Parser;
use document::{PlayerSettings, SceneDocument};
use ordoplay_timeline::RepeatCount;
use runner::{PlayOptions, Player};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Plays a timeline document against in-memory targets.
#[derive(Parser, Debug)]
#[command(name = "ordoplay-timeline-player")]
#[command(about = "Play OrdoPlay timeline documents headlessly", version)]
struct Args {
    /// Timeline document (RON)
    document: PathBuf,

    /// Player settings file (RON)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Clock ticks per second
    #[arg(long)]
    fps: Option<u32>,

    /// Playback speed
    #[arg(long)]
    speed: Option<f64>,

    /// Pace ticks with the wall clock
    #[arg(long)]
    realtime: bool,

    /// Number of iterations, 0 repeats forever
    #[arg(long)]
    repeat: Option<u64>,

    /// Play the timeline back-to-front
    #[arg(long)]
    reverse: bool,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("ordoplay_timeline=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => PlayerSettings::load(path)?,
        None => PlayerSettings::default(),
    };
    if let Some(fps) = args.fps {
        settings.timeline.preferred_frames_per_second = fps;
    }
    if let Some(speed) = args.speed {
        settings.speed = speed;
    }
    settings.realtime |= args.realtime;

    let options = PlayOptions {
        repeat: args.repeat.map(|n| match n {
            0 => RepeatCount::Infinite,
            n => RepeatCount::Times(n),
        }),
        reverse: args.reverse,
    };

    let document = SceneDocument::load(&args.document)?;
    tracing::info!(document = %document.name, path = %args.document.display(), "Loaded document");

    let player = Player::new(&document, settings, &options)?;
    let report = player.run()?;

    println!("{}", report.summary.trim_end());
    println!("state: {:?} after {:.3}s", report.state, report.elapsed);
    for (target, values) in &report.values {
        println!("{target}:");
        for (key, value) in values {
            println!("  {key} = {value}");
        }
    }
    Ok(())
}
