// SPDX-License-Identifier: MIT OR Apache-2.0
//! Audio associated with a timeline.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// A playable sound
pub trait TimelineAudio {
    /// Length of the sound in seconds
    fn duration(&self) -> f64;

    /// Start playback
    fn play(&self);

    /// Stop playback, optionally fading out
    fn stop(&self, fade_out: bool);
}

/// Where an audio starts relative to its timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AudioAnchor {
    /// When the timeline starts
    OnStart,
    /// Halfway through the timeline
    OnMid,
    /// When the timeline completes
    OnCompletion,
    /// At a time relative to the timeline start
    AtTime(f64),
}

impl AudioAnchor {
    /// Start time of the anchor in a timeline of `duration` seconds
    pub fn time(self, duration: f64) -> f64 {
        match self {
            AudioAnchor::OnStart => 0.0,
            AudioAnchor::OnMid => duration / 2.0,
            AudioAnchor::OnCompletion => duration,
            AudioAnchor::AtTime(time) => time,
        }
    }

    /// Mirror the anchor for back-to-front playback.
    ///
    /// A sound starting at `t` ends at `t + len`, so in the reversed timeline
    /// it starts at `duration - t - len`.
    pub fn reversed(self, duration: f64, audio_duration: f64) -> AudioAnchor {
        match self {
            AudioAnchor::OnStart => AudioAnchor::OnCompletion,
            AudioAnchor::OnCompletion => AudioAnchor::OnStart,
            AudioAnchor::OnMid => AudioAnchor::OnMid,
            AudioAnchor::AtTime(time) => {
                AudioAnchor::AtTime((duration - time - audio_duration).max(0.0))
            }
        }
    }

    /// Scale an explicit time by `factor`
    pub fn scaled(self, factor: f64) -> AudioAnchor {
        match self {
            AudioAnchor::AtTime(time) => AudioAnchor::AtTime(time * factor),
            anchor => anchor,
        }
    }

    /// Shift an explicit time by `delay`
    pub fn shifted(self, delay: f64) -> AudioAnchor {
        match self {
            AudioAnchor::AtTime(time) => AudioAnchor::AtTime(time + delay),
            anchor => anchor,
        }
    }
}

#[derive(Clone)]
struct AudioEntry {
    audio: Rc<dyn TimelineAudio>,
    anchor: AudioAnchor,
    played: bool,
}

/// Audio associations of one timeline
#[derive(Clone, Default)]
pub(crate) struct AudioAssociations {
    entries: Vec<AudioEntry>,
    muted: bool,
}

impl AudioAssociations {
    pub fn new(muted: bool) -> Self {
        Self {
            entries: Vec::new(),
            muted,
        }
    }

    pub fn add(&mut self, audio: Rc<dyn TimelineAudio>, anchor: AudioAnchor) {
        self.entries.push(AudioEntry {
            audio,
            anchor,
            played: false,
        });
    }

    /// Remove every association at `anchor`
    pub fn remove_at(&mut self, anchor: AudioAnchor) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.anchor != anchor);
        before - self.entries.len()
    }

    /// Remove every association of `audio`
    pub fn remove_audio(&mut self, audio: &Rc<dyn TimelineAudio>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !Rc::ptr_eq(&entry.audio, audio));
        before - self.entries.len()
    }

    /// Drop all associations, returning the sounds that were started
    pub fn take_played(&mut self) -> Vec<Rc<dyn TimelineAudio>> {
        self.entries
            .drain(..)
            .filter(|entry| entry.played)
            .map(|entry| entry.audio)
            .collect()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sounds whose anchor is at or before `time` and that have not played yet.
    ///
    /// Returned sounds are marked played. Muted timelines mark them without
    /// returning them.
    pub fn due(&mut self, time: f64, duration: f64) -> Vec<Rc<dyn TimelineAudio>> {
        let muted = self.muted;
        let mut due = Vec::new();
        for entry in self.entries.iter_mut().filter(|e| !e.played) {
            if entry.anchor.time(duration) <= time {
                entry.played = true;
                if !muted {
                    due.push(Rc::clone(&entry.audio));
                }
            }
        }
        due
    }

    /// Mark anchors strictly before `time` as played without playing them
    pub fn skip_before(&mut self, time: f64, duration: f64) {
        for entry in &mut self.entries {
            if entry.anchor.time(duration) < time {
                entry.played = true;
            }
        }
    }

    pub fn rearm(&mut self) {
        for entry in &mut self.entries {
            entry.played = false;
        }
    }

    pub fn beginning_at(&self, time: f64, duration: f64) -> Vec<Rc<dyn TimelineAudio>> {
        self.entries
            .iter()
            .filter(|e| (e.anchor.time(duration) - time).abs() < 0.0005)
            .map(|e| Rc::clone(&e.audio))
            .collect()
    }

    pub fn ongoing_at(&self, time: f64, duration: f64) -> Vec<Rc<dyn TimelineAudio>> {
        self.entries
            .iter()
            .filter(|e| {
                let start = e.anchor.time(duration);
                start <= time && time < start + e.audio.duration()
            })
            .map(|e| Rc::clone(&e.audio))
            .collect()
    }

    pub fn audios(&self) -> Vec<Rc<dyn TimelineAudio>> {
        let mut audios: Vec<Rc<dyn TimelineAudio>> = Vec::new();
        for entry in &self.entries {
            if !audios.iter().any(|a| Rc::ptr_eq(a, &entry.audio)) {
                audios.push(Rc::clone(&entry.audio));
            }
        }
        audios
    }

    /// Copy with every anchor mapped through `map`, unplayed
    pub fn mapped(&self, map: impl Fn(AudioAnchor, &dyn TimelineAudio) -> AudioAnchor) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|e| AudioEntry {
                    audio: Rc::clone(&e.audio),
                    anchor: map(e.anchor, e.audio.as_ref()),
                    played: false,
                })
                .collect(),
            muted: self.muted,
        }
    }

    pub fn shift(&mut self, delay: f64) {
        for entry in &mut self.entries {
            entry.anchor = entry.anchor.shifted(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAudio;

    #[test]
    fn test_anchor_reversal() {
        assert_eq!(AudioAnchor::OnStart.reversed(5.0, 1.0), AudioAnchor::OnCompletion);
        assert_eq!(AudioAnchor::OnMid.reversed(5.0, 1.0), AudioAnchor::OnMid);
        assert_eq!(AudioAnchor::AtTime(1.0).reversed(5.0, 2.0), AudioAnchor::AtTime(2.0));
        assert_eq!(AudioAnchor::AtTime(4.0).reversed(5.0, 2.0), AudioAnchor::AtTime(0.0));
    }

    #[test]
    fn test_due_once_and_muted() {
        let audio: Rc<dyn TimelineAudio> = Rc::new(MockAudio::new(1.0));
        let mut associations = AudioAssociations::new(false);
        associations.add(audio.clone(), AudioAnchor::OnMid);

        assert!(associations.due(1.0, 4.0).is_empty());
        assert_eq!(associations.due(2.0, 4.0).len(), 1);
        assert!(associations.due(3.0, 4.0).is_empty());

        associations.rearm();
        associations.set_muted(true);
        assert!(associations.due(4.0, 4.0).is_empty());
        associations.set_muted(false);
        assert!(associations.due(4.0, 4.0).is_empty());
    }

    #[test]
    fn test_ongoing_and_removal() {
        let a: Rc<dyn TimelineAudio> = Rc::new(MockAudio::new(2.0));
        let b: Rc<dyn TimelineAudio> = Rc::new(MockAudio::new(0.5));
        let mut associations = AudioAssociations::new(false);
        associations.add(a.clone(), AudioAnchor::OnStart);
        associations.add(b.clone(), AudioAnchor::AtTime(1.0));
        associations.add(a.clone(), AudioAnchor::OnCompletion);

        assert_eq!(associations.ongoing_at(1.2, 4.0).len(), 2);
        assert_eq!(associations.beginning_at(1.0, 4.0).len(), 1);
        assert_eq!(associations.audios().len(), 2);

        assert_eq!(associations.remove_audio(&a), 2);
        assert_eq!(associations.remove_at(AudioAnchor::OnStart), 0);
        assert_eq!(associations.len(), 1);
    }
}
