// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory targets and log-only audio for headless playback.

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use ordoplay_timeline::{AnimationTarget, PropertyTarget, PropertyValue, TimelineAudio};
use std::rc::Rc;

/// Named targets of a document
#[derive(Default)]
pub struct Scene {
    targets: IndexMap<String, Rc<PropertyTarget>>,
}

impl Scene {
    /// Build targets with their initial values
    pub fn new(targets: &IndexMap<String, IndexMap<String, PropertyValue>>) -> Self {
        let targets = targets
            .iter()
            .map(|(name, values)| {
                let target = values
                    .iter()
                    .fold(PropertyTarget::new(name.clone()), |target, (key, value)| {
                        target.with_value(key.as_str(), *value)
                    });
                (name.clone(), Rc::new(target))
            })
            .collect();
        Self { targets }
    }

    /// Look up a target by name
    pub fn target(&self, name: &str) -> Result<Rc<dyn AnimationTarget>> {
        let target = self
            .targets
            .get(name)
            .ok_or_else(|| anyhow!("Unknown target '{name}'"))?;
        Ok(Rc::clone(target) as Rc<dyn AnimationTarget>)
    }

    /// Current values of every target, by target name
    pub fn snapshot(&self) -> IndexMap<String, Vec<(String, PropertyValue)>> {
        self.targets
            .iter()
            .map(|(name, target)| {
                let values = target
                    .values()
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), value))
                    .collect();
                (name.clone(), values)
            })
            .collect()
    }
}

/// Audio that only logs
pub struct LoggedAudio {
    name: String,
    duration: f64,
}

impl LoggedAudio {
    /// Create a sound of `duration` seconds
    pub fn new(name: impl Into<String>, duration: f64) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }
}

impl TimelineAudio for LoggedAudio {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn play(&self) {
        tracing::info!(audio = %self.name, duration = self.duration, "Audio started");
    }

    fn stop(&self, fade_out: bool) {
        tracing::info!(audio = %self.name, fade_out, "Audio stopped");
    }
}
