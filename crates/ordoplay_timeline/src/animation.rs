// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property animation descriptions.
//!
//! An [`AnimationSpec`] is the immutable "what" of an entity: which property
//! is animated, between which values, for how long and along which curve.
//! Applying it to a target over time is the entity's job.

use crate::easing::TimingCurve;
use crate::error::{check_time, Result, TimelineError};
use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};

/// Key path of an animatable property (`"opacity"`, `"position.x"`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyKey(pub String);

impl PropertyKey {
    /// Create a key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key path
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the two key paths address overlapping state.
    ///
    /// `"position"` overlaps `"position.x"`, `"position.x"` does not overlap
    /// `"position.y"`.
    pub fn overlaps(&self, other: &PropertyKey) -> bool {
        let (a, b) = (self.as_str(), other.as_str());
        if a == b {
            return true;
        }
        let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };
        long.starts_with(short) && long.as_bytes().get(short.len()) == Some(&b'.')
    }
}

impl From<&str> for PropertyKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shape of the value change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnimationKind {
    /// Interpolation between two values.
    ///
    /// Missing ends are resolved against the target's current value when the
    /// entity starts: `to` alone animates from the current value, `by` alone
    /// animates from the current value to current + by, `from` + `by`
    /// animates to from + by.
    Basic {
        /// Start value
        #[serde(default)]
        from: Option<PropertyValue>,
        /// End value
        #[serde(default)]
        to: Option<PropertyValue>,
        /// Relative offset
        #[serde(default)]
        by: Option<PropertyValue>,
    },
    /// Piecewise interpolation through a list of values
    Keyframes {
        /// Values, at least one
        values: Vec<PropertyValue>,
        /// Normalized times of each value, evenly spaced when absent
        #[serde(default)]
        key_times: Option<Vec<f32>>,
    },
}

/// Immutable description of one property animation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationSpec {
    /// Animated property
    pub key: PropertyKey,
    /// Value change
    pub kind: AnimationKind,
    /// Duration in seconds
    pub duration: f64,
    /// Easing curve
    #[serde(default)]
    pub curve: TimingCurve,
    /// Plays back-to-front
    #[serde(default)]
    pub reversed: bool,
}

/// Start and end values fixed when an entity starts
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPath {
    /// Two-point interpolation
    Span(PropertyValue, PropertyValue),
    /// Keyframe values with their normalized times
    Keyframes(Vec<(f32, PropertyValue)>),
}

impl AnimationSpec {
    /// Create an animation from `from` to `to`
    pub fn basic(
        key: impl Into<PropertyKey>,
        from: PropertyValue,
        to: PropertyValue,
        duration: f64,
    ) -> Self {
        Self::new(
            key,
            AnimationKind::Basic {
                from: Some(from),
                to: Some(to),
                by: None,
            },
            duration,
        )
    }

    /// Create an animation from the current value to `to`
    pub fn to(key: impl Into<PropertyKey>, to: PropertyValue, duration: f64) -> Self {
        Self::new(
            key,
            AnimationKind::Basic {
                from: None,
                to: Some(to),
                by: None,
            },
            duration,
        )
    }

    /// Create an animation offsetting the current value by `by`
    pub fn by(key: impl Into<PropertyKey>, by: PropertyValue, duration: f64) -> Self {
        Self::new(
            key,
            AnimationKind::Basic {
                from: None,
                to: None,
                by: Some(by),
            },
            duration,
        )
    }

    /// Create a keyframe animation
    pub fn keyframes(
        key: impl Into<PropertyKey>,
        values: Vec<PropertyValue>,
        key_times: Option<Vec<f32>>,
        duration: f64,
    ) -> Self {
        Self::new(key, AnimationKind::Keyframes { values, key_times }, duration)
    }

    /// Fade `opacity` from 0 to 1
    pub fn fade_in(duration: f64) -> Self {
        Self::basic(
            "opacity",
            PropertyValue::Float(0.0),
            PropertyValue::Float(1.0),
            duration,
        )
    }

    /// Fade `opacity` from 1 to 0
    pub fn fade_out(duration: f64) -> Self {
        Self::basic(
            "opacity",
            PropertyValue::Float(1.0),
            PropertyValue::Float(0.0),
            duration,
        )
    }

    /// Move `position` to a point
    pub fn move_to(to: [f32; 2], duration: f64) -> Self {
        Self::to("position", PropertyValue::Vec2(to), duration)
    }

    /// Scale with an intermediate overshoot value (`from` → `by` → `to`)
    pub fn scale_with_bounce(from: f32, to: f32, by: f32, duration: f64) -> Self {
        Self::keyframes(
            "transform.scale",
            vec![
                PropertyValue::Float(from),
                PropertyValue::Float(by),
                PropertyValue::Float(to),
            ],
            None,
            duration,
        )
    }

    fn new(key: impl Into<PropertyKey>, kind: AnimationKind, duration: f64) -> Self {
        Self {
            key: key.into(),
            kind,
            duration,
            curve: TimingCurve::Default,
            reversed: false,
        }
    }

    /// Set the timing curve
    pub fn with_curve(mut self, curve: TimingCurve) -> Self {
        self.curve = curve;
        self
    }

    /// Copy with another duration
    pub fn with_duration(&self, duration: f64) -> Self {
        let mut copy = self.clone();
        copy.duration = duration;
        copy
    }

    /// Copy that plays back-to-front
    pub fn reversed_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.reversed = !copy.reversed;
        copy
    }

    /// Check duration and keyframe layout
    pub fn validate(&self) -> Result<()> {
        check_time("animation duration", self.duration)?;
        match &self.kind {
            AnimationKind::Basic { from, to, by } => {
                if from.is_none() && to.is_none() && by.is_none() {
                    return Err(TimelineError::InvalidArgument(format!(
                        "animation on '{}' has neither from, to nor by",
                        self.key
                    )));
                }
            }
            AnimationKind::Keyframes { values, key_times } => {
                if values.is_empty() {
                    return Err(TimelineError::InvalidArgument(format!(
                        "keyframe animation on '{}' has no values",
                        self.key
                    )));
                }
                if let Some(times) = key_times {
                    if times.len() != values.len() {
                        return Err(TimelineError::InvalidArgument(format!(
                            "keyframe animation on '{}' has {} values but {} key times",
                            self.key,
                            values.len(),
                            times.len()
                        )));
                    }
                    let ordered = times.windows(2).all(|w| w[0] <= w[1]);
                    let bounded = times.iter().all(|t| (0.0..=1.0).contains(t));
                    if !ordered || !bounded {
                        return Err(TimelineError::InvalidArgument(format!(
                            "key times of '{}' must be ascending within [0, 1]",
                            self.key
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Fix the start and end values against the target's current value
    pub fn resolve(&self, current: Option<PropertyValue>) -> Option<ResolvedPath> {
        match &self.kind {
            AnimationKind::Basic { from, to, by } => {
                let start = from.or(current)?;
                let end = match (to, by) {
                    (Some(to), _) => *to,
                    (None, Some(by)) => start.offset_by(by)?,
                    (None, None) => current?,
                };
                Some(ResolvedPath::Span(start, end))
            }
            AnimationKind::Keyframes { values, key_times } => {
                let count = values.len();
                let frames = values
                    .iter()
                    .enumerate()
                    .map(|(i, value)| {
                        let time = match key_times {
                            Some(times) => *times.get(i)?,
                            None if count > 1 => i as f32 / (count - 1) as f32,
                            None => 1.0,
                        };
                        Some((time, *value))
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(ResolvedPath::Keyframes(frames))
            }
        }
    }

    /// Value at normalized time `progress`, honoring the curve and direction
    pub fn value_at(&self, path: &ResolvedPath, progress: f64) -> Option<PropertyValue> {
        let local = if self.reversed { 1.0 - progress } else { progress };
        let eased = self.curve.evaluate(local.clamp(0.0, 1.0)) as f32;
        match path {
            ResolvedPath::Span(from, to) => from.interpolate(to, eased),
            ResolvedPath::Keyframes(frames) => sample_keyframes(frames, eased),
        }
    }
}

fn sample_keyframes(frames: &[(f32, PropertyValue)], t: f32) -> Option<PropertyValue> {
    let first = frames.first()?;
    if t <= first.0 {
        return Some(first.1);
    }
    let next_idx = frames.iter().position(|(time, _)| *time >= t);
    match next_idx {
        None => frames.last().map(|(_, value)| *value),
        Some(0) => Some(first.1),
        Some(idx) => {
            let (ta, a) = frames[idx - 1];
            let (tb, b) = frames[idx];
            if (tb - ta).abs() < 0.0001 {
                return Some(b);
            }
            a.interpolate(&b, (t - ta) / (tb - ta))
        }
    }
}
