// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline entities: one animation bound to one target over one interval.

use crate::animation::{AnimationSpec, PropertyKey, ResolvedPath};
use crate::callback::{CompletionCallback, Deferred, StartCallback};
use crate::error::{Result, TimelineError};
use crate::target::{AnimationTarget, TargetId, TargetSet};
use serde::{Deserialize, Serialize};
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// Unique identifier for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// One property animation placed on a timeline
#[derive(Clone)]
pub struct Entity {
    id: EntityId,
    target: Option<Weak<dyn AnimationTarget>>,
    target_id: TargetId,
    animation: AnimationSpec,
    begin_time: f64,
    on_start: Option<StartCallback>,
    on_complete: Option<CompletionCallback>,
    path: Option<ResolvedPath>,
    started: bool,
    finished: bool,
    paused: bool,
    cleared: bool,
}

impl Entity {
    /// Create an entity beginning at time 0
    pub fn new(target: &Rc<dyn AnimationTarget>, animation: AnimationSpec) -> Self {
        Self {
            id: EntityId::new(),
            target: Some(Rc::downgrade(target)),
            target_id: target.id(),
            animation,
            begin_time: 0.0,
            on_start: None,
            on_complete: None,
            path: None,
            started: false,
            finished: false,
            paused: false,
            cleared: false,
        }
    }

    /// Set the begin time
    pub fn at(mut self, begin_time: f64) -> Self {
        self.begin_time = begin_time;
        self
    }

    /// Set the start callback
    pub fn on_start(mut self, callback: impl Fn() + 'static) -> Self {
        self.on_start = Some(Rc::new(callback));
        self
    }

    /// Set the completion callback
    pub fn on_complete(mut self, callback: impl Fn(bool) + 'static) -> Self {
        self.on_complete = Some(Rc::new(callback));
        self
    }

    pub(crate) fn with_callbacks(
        mut self,
        on_start: Option<StartCallback>,
        on_complete: Option<CompletionCallback>,
    ) -> Self {
        self.on_start = on_start;
        self.on_complete = on_complete;
        self
    }

    /// Get the entity ID
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Identity of the target, kept after the target is dropped
    pub fn target_id(&self) -> TargetId {
        self.target_id
    }

    /// The target, if it is still alive
    pub fn target(&self) -> Option<Rc<dyn AnimationTarget>> {
        self.target.as_ref().and_then(Weak::upgrade)
    }

    /// Get the animation
    pub fn animation(&self) -> &AnimationSpec {
        &self.animation
    }

    /// Get the animated property key
    pub fn key(&self) -> &PropertyKey {
        &self.animation.key
    }

    /// Begin time relative to the timeline start
    pub fn begin_time(&self) -> f64 {
        self.begin_time
    }

    /// Animation duration
    pub fn duration(&self) -> f64 {
        self.animation.duration
    }

    /// `begin_time + duration`
    pub fn end_time(&self) -> f64 {
        self.begin_time + self.animation.duration
    }

    /// Whether the entity started in the current run
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Whether the entity finished in the current run
    pub fn has_finished(&self) -> bool {
        self.finished
    }

    /// Whether the entity is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the entity was cleared
    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    pub(crate) fn set_begin_time(&mut self, begin_time: f64) {
        self.begin_time = begin_time;
    }

    /// Whether the interval contains `time`
    pub fn is_ongoing_at(&self, time: f64) -> bool {
        self.begin_time <= time && time < self.end_time()
    }

    /// Same target, overlapping key paths and overlapping intervals
    pub fn conflicting_with(&self, other: &Entity) -> bool {
        self.target_id == other.target_id
            && self.key().overlaps(other.key())
            && self.begin_time < other.end_time()
            && other.begin_time < self.end_time()
    }

    /// Fail unless the target is alive and in its hierarchy
    pub fn check_target(&self) -> Result<()> {
        match self.target() {
            Some(target) if target.is_in_hierarchy() => Ok(()),
            Some(_) => Err(TimelineError::ElementsNotInHierarchy(format!(
                "'{}' on {:?} is detached",
                self.key(),
                self.target_id
            ))),
            None => Err(TimelineError::ElementsNotInHierarchy(format!(
                "'{}' on {:?} was dropped",
                self.key(),
                self.target_id
            ))),
        }
    }

    /// Start playback at the time reported by `now`
    pub(crate) fn play_with_current_time(
        &mut self,
        now: &dyn Fn() -> f64,
        deferred: &mut Deferred,
    ) -> Result<()> {
        self.check_target()?;
        self.reset();
        self.update(now(), deferred);
        Ok(())
    }

    /// Advance to timeline time `time`
    pub(crate) fn update(&mut self, time: f64, deferred: &mut Deferred) {
        if self.cleared || self.finished || self.paused || time < self.begin_time {
            return;
        }

        let Some(target) = self.target() else {
            tracing::warn!(key = %self.key(), target = ?self.target_id, "Animation target dropped");
            self.finished = true;
            if self.started {
                if let Some(callback) = &self.on_complete {
                    deferred.complete(callback, false);
                }
            }
            return;
        };

        if !self.started {
            self.started = true;
            self.path = self.animation.resolve(target.value(self.key()));
            if self.path.is_none() {
                tracing::warn!(
                    key = %self.key(),
                    target = ?self.target_id,
                    "Cannot resolve animation values, target has no current value"
                );
            }
            if let Some(callback) = &self.on_start {
                deferred.start(callback);
            }
        }

        self.apply_at(target.as_ref(), time);

        if time >= self.end_time() {
            self.finished = true;
            if let Some(callback) = &self.on_complete {
                deferred.complete(callback, true);
            }
        }
    }

    fn apply_at(&self, target: &dyn AnimationTarget, time: f64) {
        let progress = if self.duration() > 0.0 {
            ((time - self.begin_time) / self.duration()).clamp(0.0, 1.0)
        } else {
            1.0
        };
        if let Some(path) = &self.path {
            if let Some(value) = self.animation.value_at(path, progress) {
                target.apply(self.key(), value);
            }
        }
    }

    /// Pause if running at the time reported by `now`.
    ///
    /// The target's own pause hook runs only if it is not in `paused` yet.
    pub(crate) fn pause_with_current_time(
        &mut self,
        now: &dyn Fn() -> f64,
        paused: &mut TargetSet,
    ) {
        if !self.started || self.finished || self.paused || !self.is_ongoing_at(now()) {
            return;
        }
        self.paused = true;
        if paused.insert(self.target_id) {
            if let Some(target) = self.target() {
                target.pause();
            }
        }
    }

    /// Resume a paused entity and re-apply its value at `now`
    pub(crate) fn resume_with_current_time(
        &mut self,
        now: &dyn Fn() -> f64,
        resumed: &mut TargetSet,
    ) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if let Some(target) = self.target() {
            if resumed.insert(self.target_id) {
                target.resume();
            }
            self.apply_at(target.as_ref(), now());
        }
    }

    /// Restore the pre-play state
    pub fn reset(&mut self) {
        self.started = false;
        self.finished = false;
        self.paused = false;
        self.path = None;
    }

    /// Jump to the end without callbacks
    pub(crate) fn finish_silently(&mut self) {
        if let Some(target) = self.target() {
            if !self.started {
                self.path = self.animation.resolve(target.value(self.key()));
            }
            self.apply_at(target.as_ref(), self.end_time());
        }
        self.started = true;
        self.finished = true;
    }

    /// Detach the target permanently. A running entity completes with `false`.
    pub(crate) fn clear(&mut self, deferred: &mut Deferred) {
        if self.started && !self.finished {
            if let Some(callback) = &self.on_complete {
                deferred.complete(callback, false);
            }
        }
        self.target = None;
        self.finished = true;
        self.paused = false;
        self.cleared = true;
    }

    /// Fresh unplayed copy with a new id
    pub fn duplicate(&self) -> Entity {
        let mut copy = self.clone();
        copy.id = EntityId::new();
        copy.reset();
        copy.cleared = false;
        copy
    }

    /// Copy playing back-to-front, mirrored within `timeline_duration`
    pub fn reversed_copy(&self, timeline_duration: f64) -> Entity {
        let mut copy = self.duplicate();
        copy.animation = self.animation.reversed_copy();
        copy.begin_time = (timeline_duration - self.end_time()).max(0.0);
        copy
    }

    /// Copy with another duration and begin time
    pub fn copy_with_duration(&self, duration: f64, begin_time: f64) -> Entity {
        let mut copy = self.duplicate();
        copy.animation = self.animation.with_duration(duration);
        copy.begin_time = begin_time;
        copy
    }

    /// Portable description of this entity
    pub fn description(&self) -> AnimationDescription {
        AnimationDescription {
            target: self.target.clone(),
            target_id: self.target_id,
            animation: self.animation.clone(),
            begin_time: self.begin_time,
            on_start: self.on_start.clone(),
            on_complete: self.on_complete.clone(),
        }
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("target_id", &self.target_id)
            .field("key", &self.animation.key)
            .field("begin_time", &self.begin_time)
            .field("end_time", &self.end_time())
            .field("started", &self.started)
            .field("finished", &self.finished)
            .field("paused", &self.paused)
            .finish()
    }
}

/// Everything needed to rebuild an entity in another timeline
#[derive(Clone)]
pub struct AnimationDescription {
    target: Option<Weak<dyn AnimationTarget>>,
    /// Target identity
    pub target_id: TargetId,
    /// Animation
    pub animation: AnimationSpec,
    /// Begin time in the source timeline
    pub begin_time: f64,
    on_start: Option<StartCallback>,
    on_complete: Option<CompletionCallback>,
}

impl AnimationDescription {
    pub(crate) fn into_entity(self) -> Entity {
        Entity {
            id: EntityId::new(),
            target: self.target,
            target_id: self.target_id,
            animation: self.animation,
            begin_time: self.begin_time,
            on_start: self.on_start,
            on_complete: self.on_complete,
            path: None,
            started: false,
            finished: false,
            paused: false,
            cleared: false,
        }
    }
}

impl std::fmt::Debug for AnimationDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationDescription")
            .field("target_id", &self.target_id)
            .field("animation", &self.animation)
            .field("begin_time", &self.begin_time)
            .finish_non_exhaustive()
    }
}
