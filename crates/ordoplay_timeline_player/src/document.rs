// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline documents and player settings, both stored as RON.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use ordoplay_timeline::{AnimationSpec, AudioAnchor, PropertyValue, RepeatCount, TimelineConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the document's timelines are combined into the played timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Composition {
    /// Play the only timeline directly
    #[default]
    Single,
    /// Group with every timeline beginning at 0
    Together,
    /// Group with each timeline beginning where the previous one ends
    Sequentially,
}

/// One animation placed on a named target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDocument {
    /// Target name
    pub target: String,
    /// Begin time in the timeline
    #[serde(default)]
    pub begin: f64,
    /// The animation
    pub animation: AnimationSpec,
}

/// A sound placed on the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDocument {
    /// Name used in logs
    pub name: String,
    /// Length in seconds
    pub duration: f64,
    /// Where the sound starts
    pub anchor: AudioAnchor,
}

/// One timeline of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineDocument {
    /// Name used in logs
    pub name: String,
    /// Animations
    #[serde(default)]
    pub entries: Vec<EntryDocument>,
    /// Times at which a marker is logged
    #[serde(default)]
    pub markers: Vec<f64>,
    /// Progress values at which a marker is logged
    #[serde(default)]
    pub progress_markers: Vec<f32>,
    /// Associated sounds
    #[serde(default)]
    pub audio: Vec<AudioDocument>,
    /// Repeat count, once when absent
    #[serde(default)]
    pub repeat: Option<RepeatCount>,
}

/// A scene of named targets and the timelines animating them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Document name
    pub name: String,
    /// Targets with their initial property values
    #[serde(default)]
    pub targets: IndexMap<String, IndexMap<String, PropertyValue>>,
    /// Timelines
    pub timelines: Vec<TimelineDocument>,
    /// How the timelines are combined
    #[serde(default)]
    pub composition: Composition,
}

impl SceneDocument {
    /// Parse a document from RON text
    pub fn from_ron(content: &str) -> Result<Self> {
        let document: SceneDocument =
            ron::from_str(content).context("Failed to parse timeline document")?;
        document.validate()?;
        Ok(document)
    }

    /// Load a document from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_ron(&content).with_context(|| format!("Invalid document {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.timelines.is_empty() {
            bail!("Document '{}' has no timelines", self.name);
        }
        if self.composition == Composition::Single && self.timelines.len() > 1 {
            bail!(
                "Document '{}' has {} timelines, use Together or Sequentially composition",
                self.name,
                self.timelines.len()
            );
        }
        for timeline in &self.timelines {
            for entry in &timeline.entries {
                if !self.targets.contains_key(&entry.target) {
                    bail!(
                        "Timeline '{}' animates unknown target '{}'",
                        timeline.name,
                        entry.target
                    );
                }
            }
        }
        Ok(())
    }
}

fn default_speed() -> f64 {
    1.0
}

fn default_time_limit() -> f64 {
    600.0
}

/// Player configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Engine configuration
    #[serde(default)]
    pub timeline: TimelineConfig,
    /// Playback speed
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Pace ticks with the wall clock
    #[serde(default)]
    pub realtime: bool,
    /// Simulated seconds after which playback is abandoned
    #[serde(default = "default_time_limit")]
    pub time_limit: f64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            timeline: TimelineConfig::default(),
            speed: default_speed(),
            realtime: false,
            time_limit: default_time_limit(),
        }
    }
}

impl PlayerSettings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        ron::from_str(&content)
            .with_context(|| format!("Failed to parse settings {}", path.display()))
    }
}
