// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builds timelines from a document and drives them with a manual clock.

use crate::document::{Composition, PlayerSettings, SceneDocument, TimelineDocument};
use crate::scene::{LoggedAudio, Scene};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use ordoplay_timeline::{
    Entity, GroupTimeline, ManualClock, PropertyValue, RepeatCount, Timeline, TimelineContext,
    TimelineState,
};
use std::rc::Rc;
use std::time::Duration;

/// Overrides applied on top of the document and settings
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    /// Repeat count of the played timeline
    pub repeat: Option<RepeatCount>,
    /// Play the reversed timeline
    pub reverse: bool,
}

/// Outcome of a run
#[derive(Debug)]
pub struct RunReport {
    /// Simulated seconds until playback stopped
    pub elapsed: f64,
    /// Final state of the played timeline
    pub state: TimelineState,
    /// Final property values by target name
    pub values: IndexMap<String, Vec<(String, PropertyValue)>>,
    /// Description of the played timeline
    pub summary: String,
}

/// A loaded document ready to play
pub struct Player {
    clock: Rc<ManualClock>,
    scene: Scene,
    timeline: Timeline,
    settings: PlayerSettings,
}

impl Player {
    /// Build the scene and timelines of `document`
    pub fn new(document: &SceneDocument, settings: PlayerSettings, options: &PlayOptions) -> Result<Self> {
        let clock = Rc::new(ManualClock::with_frames_per_second(
            settings.timeline.preferred_frames_per_second,
        ));
        let context = TimelineContext::with_config(clock.clone(), settings.timeline.clone());
        let scene = Scene::new(&document.targets);

        let timelines = document
            .timelines
            .iter()
            .map(|timeline| build_timeline(&context, &scene, timeline))
            .collect::<Result<Vec<_>>>()?;

        let mut timeline = match document.composition {
            Composition::Single => timelines
                .into_iter()
                .next()
                .context("Document has no timelines")?,
            Composition::Together => GroupTimeline::together(&context, timelines)?.into_timeline(),
            Composition::Sequentially => {
                GroupTimeline::sequentially(&context, timelines)?.into_timeline()
            }
        };
        timeline.set_name(document.name.clone());
        install_logging(&timeline);

        if let Some(repeat) = options.repeat {
            timeline.set_repeat_count(repeat)?;
        }
        if options.reverse {
            timeline = timeline.reversed()?;
            install_logging(&timeline);
        }

        Ok(Self {
            clock,
            scene,
            timeline,
            settings,
        })
    }

    /// The timeline that will be played
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Play to completion or until the time limit
    pub fn run(&self) -> Result<RunReport> {
        tracing::info!("{}", self.timeline.summary().trim_end());
        self.timeline.set_speed(self.settings.speed)?;
        self.timeline.play()?;

        let interval = self.clock.frame_interval();
        let mut elapsed = 0.0;
        while self.timeline.is_playing() && elapsed < self.settings.time_limit {
            if self.settings.realtime {
                std::thread::sleep(Duration::from_secs_f64(interval));
            }
            self.clock.advance(interval);
            elapsed += interval;
        }
        if self.timeline.is_playing() {
            tracing::warn!(limit = self.settings.time_limit, "Time limit reached, clearing");
            self.timeline.clear();
        }

        Ok(RunReport {
            elapsed,
            state: self.timeline.state(),
            values: self.scene.snapshot(),
            summary: self.timeline.summary(),
        })
    }
}

fn build_timeline(context: &TimelineContext, scene: &Scene, document: &TimelineDocument) -> Result<Timeline> {
    let timeline = Timeline::with_name(context, document.name.clone());
    for entry in &document.entries {
        let target = scene.target(&entry.target)?;
        let (key, target_name) = (entry.animation.key.to_string(), entry.target.clone());
        let started = (key.clone(), target_name.clone());
        let entity = Entity::new(&target, entry.animation.clone())
            .at(entry.begin)
            .on_start(move || {
                tracing::debug!(target = %started.1, key = %started.0, "Animation started");
            })
            .on_complete(move |finished| {
                tracing::debug!(target = %target_name, key = %key, finished, "Animation completed");
            });
        timeline
            .insert_entity(entity)
            .with_context(|| format!("Cannot place animation in '{}'", document.name))?;
    }

    for &time in &document.markers {
        let name = document.name.clone();
        timeline.notify_at_time(time, move || {
            tracing::info!(timeline = %name, time, "Marker reached");
        })?;
    }
    for &progress in &document.progress_markers {
        let name = document.name.clone();
        timeline.notify_at_progress(progress, move || {
            tracing::info!(timeline = %name, progress, "Progress marker reached");
        })?;
    }
    for audio in &document.audio {
        timeline.associate_audio(
            Rc::new(LoggedAudio::new(audio.name.clone(), audio.duration)),
            audio.anchor,
        )?;
    }
    if let Some(repeat) = document.repeat {
        timeline.set_repeat_count(repeat)?;
    }
    Ok(timeline)
}

fn install_logging(timeline: &Timeline) {
    let name = timeline.name();
    let started = name.clone();
    timeline.set_on_start(move || tracing::info!(timeline = %started, "Timeline started"));
    timeline.set_completion(move |finished| {
        tracing::info!(timeline = %name, finished, "Timeline completed");
    });
    timeline.set_repeat_on_start(|iteration| tracing::debug!(iteration, "Iteration started"));
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"(
        name: "slides",
        targets: {
            "title": { "opacity": Float(0.0) },
            "card": { "position": Vec2((0.0, 0.0)) },
        },
        timelines: [
            (
                name: "title",
                entries: [
                    (
                        target: "title",
                        animation: (
                            key: "opacity",
                            kind: Basic(to: Some(Float(1.0))),
                            duration: 1.0,
                        ),
                    ),
                ],
                audio: [(name: "whoosh", duration: 0.5, anchor: OnStart)],
            ),
            (
                name: "card",
                entries: [
                    (
                        target: "card",
                        animation: (
                            key: "position",
                            kind: Basic(to: Some(Vec2((10.0, 5.0)))),
                            duration: 2.0,
                            curve: CubicInOut,
                        ),
                    ),
                ],
                markers: [1.0],
            ),
        ],
        composition: Sequentially,
    )"#;

    fn value(report: &RunReport, target: &str, key: &str) -> Option<PropertyValue> {
        report.values[target]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| *value)
    }

    #[test]
    fn test_runs_document_to_completion() {
        let document = SceneDocument::from_ron(DOCUMENT).unwrap();
        let player = Player::new(&document, PlayerSettings::default(), &PlayOptions::default()).unwrap();
        assert_eq!(player.timeline().duration(), 3.0);

        let report = player.run().unwrap();
        assert_eq!(report.state, TimelineState::Finished);
        assert!((report.elapsed - 3.0).abs() < 0.05);
        assert_eq!(value(&report, "title", "opacity"), Some(PropertyValue::Float(1.0)));
        assert_eq!(
            value(&report, "card", "position"),
            Some(PropertyValue::Vec2([10.0, 5.0]))
        );
    }

    #[test]
    fn test_speed_and_repeat_overrides() {
        let document = SceneDocument::from_ron(DOCUMENT).unwrap();
        let settings = PlayerSettings {
            speed: 2.0,
            ..Default::default()
        };
        let options = PlayOptions {
            repeat: Some(RepeatCount::Times(2)),
            reverse: false,
        };
        let player = Player::new(&document, settings, &options).unwrap();
        let report = player.run().unwrap();
        assert_eq!(report.state, TimelineState::Finished);
        assert!((report.elapsed - 3.0).abs() < 0.05);
    }

    #[test]
    fn test_reverse_ends_at_start_values() {
        let mut document = SceneDocument::from_ron(DOCUMENT).unwrap();
        document.composition = Composition::Together;
        let options = PlayOptions {
            repeat: None,
            reverse: true,
        };
        let player = Player::new(&document, PlayerSettings::default(), &options).unwrap();
        assert!(player.timeline().is_reversed());
        let report = player.run().unwrap();
        assert_eq!(report.state, TimelineState::Finished);
        assert_eq!(value(&report, "title", "opacity"), Some(PropertyValue::Float(0.0)));
    }

    #[test]
    fn test_time_limit_clears() {
        let document = SceneDocument::from_ron(DOCUMENT).unwrap();
        let settings = PlayerSettings {
            time_limit: 1.0,
            ..Default::default()
        };
        let player = Player::new(&document, settings, &PlayOptions::default()).unwrap();
        let report = player.run().unwrap();
        assert_eq!(report.state, TimelineState::Cleared);
    }
}
