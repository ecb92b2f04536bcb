// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timelines: timed entities sharing one playback state.
//!
//! A [`Timeline`] is a cheap, cloneable handle. All clones refer to the same
//! timeline; structural changes are only accepted while it is idle.

use crate::animation::AnimationSpec;
use crate::audio::{AudioAnchor, AudioAssociations, TimelineAudio};
use crate::callback::{
    CompletionCallback, Deferred, RepeatCompletionCallback, RepeatStartCallback, StartCallback,
};
use crate::clock::SubscriptionId;
use crate::config::TimelineContext;
use crate::entity::{AnimationDescription, Entity};
use crate::error::{check_time, Result, TimelineError};
use crate::group::GroupEntity;
use crate::notify::NotificationRegistry;
use crate::observe::{ObserverId, ObserverRegistry, PropertyChange};
use crate::target::AnimationTarget;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt::Write as _;
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// Unique identifier for a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineId(pub Uuid);

impl TimelineId {
    /// Create a new random timeline ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimelineId {
    fn default() -> Self {
        Self::new()
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelineState {
    /// Built but not played, or reset by a replay
    #[default]
    Idle,
    /// Advancing with the clock
    Playing,
    /// Stopped mid-run, resumable
    Paused,
    /// Ran to completion
    Finished,
    /// Torn down, never plays again
    Cleared,
}

/// How many times a timeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatCount {
    /// A fixed number of iterations. `Times(0)` runs once.
    Times(u64),
    /// Repeat until stopped or cleared
    Infinite,
}

impl Default for RepeatCount {
    fn default() -> Self {
        RepeatCount::Times(1)
    }
}

impl RepeatCount {
    /// Number of iterations, `None` when infinite
    pub fn iterations(self) -> Option<u64> {
        match self {
            RepeatCount::Times(n) => Some(n.max(1)),
            RepeatCount::Infinite => None,
        }
    }

    /// Whether iteration `iteration` (0-based) may run
    pub fn allows(self, iteration: u64) -> bool {
        self.iterations().map_or(true, |n| iteration < n)
    }

    /// Whether the count is infinite
    pub fn is_infinite(self) -> bool {
        matches!(self, RepeatCount::Infinite)
    }
}

/// Where new entities are placed
#[derive(Debug, Clone, Copy)]
pub(crate) enum Placement {
    /// Keep each entity's own begin time
    Keep,
    /// Begin at a fixed time
    At(f64),
    /// Begin after the current end time plus a delay
    AfterEnd(f64),
}

pub(crate) enum Content {
    Entities(Vec<Entity>),
    Group(IndexMap<TimelineId, GroupEntity>),
}

pub(crate) struct TimelineInner {
    pub id: TimelineId,
    pub name: String,
    pub user_info: IndexMap<String, String>,
    pub context: TimelineContext,
    pub content: Content,
    pub state: TimelineState,
    pub begin_time: f64,
    /// Lower bound of the duration. A reversed copy keeps the span it was
    /// mirrored within, so leading gaps survive as trailing ones.
    pub span: f64,
    pub repeat_count: RepeatCount,
    pub repeat_iteration: u64,
    pub speed: f64,
    /// Speed to restore when a zero-speed pause is resumed
    pub resume_speed: f64,
    pub speed_paused: bool,
    pub progress: f32,
    pub reversed: bool,
    pub originate: Option<WeakTimeline>,
    pub parent: Option<WeakTimeline>,
    pub on_start: Option<StartCallback>,
    pub on_complete: Option<CompletionCallback>,
    pub repeat_on_start: Option<RepeatStartCallback>,
    pub repeat_completion: Option<RepeatCompletionCallback>,
    pub notifications: NotificationRegistry,
    pub audio: AudioAssociations,
    pub observers: ObserverRegistry,
    pub subscription: Option<SubscriptionId>,
    /// Local time since play, speed applied
    pub elapsed: f64,
    /// Clock time of the last tick
    pub last_wall: f64,
    /// Local time at which the current iteration began
    pub iteration_origin: f64,
}

impl TimelineInner {
    pub fn new(context: TimelineContext, content: Content) -> Self {
        let muted = context.config().mute_audio;
        Self {
            id: TimelineId::new(),
            name: String::new(),
            user_info: IndexMap::new(),
            context,
            content,
            state: TimelineState::Idle,
            begin_time: 0.0,
            span: 0.0,
            repeat_count: RepeatCount::default(),
            repeat_iteration: 0,
            speed: 1.0,
            resume_speed: 1.0,
            speed_paused: false,
            progress: 0.0,
            reversed: false,
            originate: None,
            parent: None,
            on_start: None,
            on_complete: None,
            repeat_on_start: None,
            repeat_completion: None,
            notifications: NotificationRegistry::default(),
            audio: AudioAssociations::new(muted),
            observers: ObserverRegistry::default(),
            subscription: None,
            elapsed: 0.0,
            last_wall: 0.0,
            iteration_origin: 0.0,
        }
    }

    /// New inner sharing this one's configuration and callbacks, idle and
    /// with fresh identity
    pub fn derive(&self, content: Content) -> Self {
        let mut inner = Self::new(self.context.clone(), content);
        inner.name = self.name.clone();
        inner.user_info = self.user_info.clone();
        inner.span = self.span;
        inner.repeat_count = self.repeat_count;
        inner.speed = self.speed;
        inner.resume_speed = self.resume_speed;
        inner.reversed = self.reversed;
        inner.on_start = self.on_start.clone();
        inner.on_complete = self.on_complete.clone();
        inner.repeat_on_start = self.repeat_on_start.clone();
        inner.repeat_completion = self.repeat_completion.clone();
        inner.audio.set_muted(self.audio.is_muted());
        inner
    }

    /// Length of one iteration
    pub fn duration(&self) -> f64 {
        match &self.content {
            Content::Entities(entities) => {
                entities.iter().map(Entity::end_time).fold(self.span, f64::max)
            }
            Content::Group(children) => children
                .values()
                .map(|child| child.begin_time + child.timeline.finite_total_duration())
                .fold(self.span, f64::max),
        }
    }

    pub fn total_duration(&self) -> f64 {
        match self.repeat_count.iterations() {
            Some(n) => self.duration() * n as f64,
            None => f64::INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.content {
            Content::Entities(entities) => entities.is_empty(),
            Content::Group(children) => children.is_empty(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.content, Content::Group(_))
    }

    /// Time within the current iteration
    pub fn iteration_time(&self) -> f64 {
        (self.elapsed - self.iteration_origin).max(0.0)
    }

    pub fn ensure_mutable(&self, what: &str) -> Result<()> {
        if self.state == TimelineState::Idle {
            Ok(())
        } else {
            Err(TimelineError::ImmutableTimeline {
                timeline: self.id,
                reason: format!("cannot {what} while {:?}", self.state),
            })
        }
    }

    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.is_empty() {
            Err(TimelineError::EmptyTimeline(self.id))
        } else {
            Ok(())
        }
    }

    pub fn entities(&self) -> Result<&Vec<Entity>> {
        match &self.content {
            Content::Entities(entities) => Ok(entities),
            Content::Group(_) => Err(TimelineError::UnsupportedMessage(
                "group timelines hold timelines, not animations".into(),
            )),
        }
    }

    /// Validate and insert entities, all or nothing
    pub fn insert_entities(&mut self, mut new: Vec<Entity>, placement: Placement) -> Result<()> {
        self.ensure_mutable("add animations")?;
        let base = match placement {
            Placement::Keep => None,
            Placement::At(time) => {
                check_time("begin time", time)?;
                Some(time)
            }
            Placement::AfterEnd(delay) => {
                check_time("delay", delay)?;
                Some(self.duration() + delay)
            }
        };
        let existing = self.entities()?;

        for entity in new.iter_mut() {
            if let Some(base) = base {
                entity.set_begin_time(base);
            }
            check_time("begin time", entity.begin_time())?;
            entity.animation().validate()?;
        }

        for (idx, entity) in new.iter().enumerate() {
            let clash = existing
                .iter()
                .chain(new[..idx].iter())
                .find(|other| entity.conflicting_with(other));
            if let Some(other) = clash {
                return Err(TimelineError::ConflictingAnimations {
                    key: entity.key().to_string(),
                    begin: entity.begin_time(),
                    end: entity.end_time(),
                    existing: other.id(),
                });
            }
        }

        if let Content::Entities(entities) = &mut self.content {
            entities.extend(new);
        }
        Ok(())
    }

    /// Fail if any target is gone or detached
    pub fn check_targets(&self) -> Result<()> {
        match &self.content {
            Content::Entities(entities) => {
                let missing: Vec<String> = entities
                    .iter()
                    .filter_map(|entity| entity.check_target().err())
                    .map(|err| match err {
                        TimelineError::ElementsNotInHierarchy(what) => what,
                        other => other.to_string(),
                    })
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(TimelineError::ElementsNotInHierarchy(missing.join(", ")))
                }
            }
            Content::Group(children) => children
                .values()
                .try_for_each(|child| child.timeline.inner().check_targets()),
        }
    }

    pub fn publish(&self, change: PropertyChange, deferred: &mut Deferred) {
        self.observers.publish(change, deferred);
    }

    pub fn set_progress(&mut self, progress: f32, deferred: &mut Deferred) {
        let progress = progress.clamp(0.0, 1.0);
        if progress != self.progress {
            self.progress = progress;
            self.publish(PropertyChange::Progress(progress), deferred);
        }
    }

    pub fn set_state(&mut self, state: TimelineState, deferred: &mut Deferred) {
        let before = self.state;
        if before == state {
            return;
        }
        self.state = state;
        tracing::debug!(timeline = ?self.id, name = %self.name, from = ?before, to = ?state, "Timeline state changed");

        let paused = |s: TimelineState| s == TimelineState::Paused;
        let started = |s: TimelineState| {
            matches!(s, TimelineState::Playing | TimelineState::Paused | TimelineState::Finished)
        };
        let finished = |s: TimelineState| s == TimelineState::Finished;
        if paused(before) != paused(state) {
            self.publish(PropertyChange::Paused(paused(state)), deferred);
        }
        if started(before) != started(state) {
            self.publish(PropertyChange::Started(started(state)), deferred);
        }
        if finished(before) != finished(state) {
            self.publish(PropertyChange::Finished(finished(state)), deferred);
        }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.context.clock().unsubscribe(id);
        }
    }
}

/// A timeline of property animations
#[derive(Clone)]
pub struct Timeline {
    pub(crate) inner: Rc<RefCell<TimelineInner>>,
}

/// Non-owning reference to a timeline
#[derive(Clone, Default)]
pub struct WeakTimeline {
    inner: Weak<RefCell<TimelineInner>>,
}

impl WeakTimeline {
    /// Get the timeline if it is still alive
    pub fn upgrade(&self) -> Option<Timeline> {
        self.inner.upgrade().map(|inner| Timeline { inner })
    }
}

impl std::fmt::Debug for WeakTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WeakTimeline")
    }
}

impl Timeline {
    /// Create an empty timeline
    pub fn new(context: &TimelineContext) -> Self {
        Self::from_inner(TimelineInner::new(
            context.clone(),
            Content::Entities(Vec::new()),
        ))
    }

    /// Create an empty named timeline
    pub fn with_name(context: &TimelineContext, name: impl Into<String>) -> Self {
        let timeline = Self::new(context);
        timeline.set_name(name);
        timeline
    }

    /// Create an empty timeline with start and completion callbacks
    pub fn with_callbacks(
        context: &TimelineContext,
        on_start: impl Fn() + 'static,
        on_complete: impl Fn(bool) + 'static,
    ) -> Self {
        let timeline = Self::new(context);
        timeline.set_on_start(on_start);
        timeline.set_completion(on_complete);
        timeline
    }

    pub(crate) fn from_inner(inner: TimelineInner) -> Self {
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub(crate) fn inner(&self) -> Ref<'_, TimelineInner> {
        self.inner.borrow()
    }

    pub(crate) fn inner_mut(&self) -> RefMut<'_, TimelineInner> {
        self.inner.borrow_mut()
    }

    /// Apply the context's error mode
    pub(crate) fn settle<T: Default>(&self, result: Result<T>) -> Result<T> {
        let context = self.context();
        context.settle(result)
    }

    /// Get a non-owning reference
    pub fn downgrade(&self) -> WeakTimeline {
        WeakTimeline {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same timeline
    pub fn ptr_eq(&self, other: &Timeline) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Get the timeline ID
    pub fn id(&self) -> TimelineId {
        self.inner().id
    }

    /// Get the shared context
    pub fn context(&self) -> TimelineContext {
        self.inner().context.clone()
    }

    /// Get the name
    pub fn name(&self) -> String {
        self.inner().name.clone()
    }

    /// Set the name
    pub fn set_name(&self, name: impl Into<String>) {
        self.inner_mut().name = name.into();
    }

    /// Get the user info map
    pub fn user_info(&self) -> IndexMap<String, String> {
        self.inner().user_info.clone()
    }

    /// Set a user info entry
    pub fn set_user_info(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner_mut().user_info.insert(key.into(), value.into());
    }

    // ---------------------------------------------------------------------
    // Population
    // ---------------------------------------------------------------------

    fn populate(&self, entities: Vec<Entity>, placement: Placement) -> Result<()> {
        let result = self.inner_mut().insert_entities(entities, placement);
        self.settle(result)
    }

    /// Append an entity after the current end time plus `delay`
    pub fn add_entity(&self, entity: Entity, delay: f64) -> Result<()> {
        self.populate(vec![entity], Placement::AfterEnd(delay))
    }

    /// Insert an entity at its own begin time
    pub fn insert_entity(&self, entity: Entity) -> Result<()> {
        self.populate(vec![entity], Placement::Keep)
    }

    /// Insert an entity at `time`
    pub fn insert_entity_at_time(&self, entity: Entity, time: f64) -> Result<()> {
        self.populate(vec![entity], Placement::At(time))
    }

    /// Append an animation after the current end time
    pub fn add_animation(&self, target: &Rc<dyn AnimationTarget>, animation: AnimationSpec) -> Result<()> {
        self.add_entity(Entity::new(target, animation), 0.0)
    }

    /// Append an animation `delay` seconds after the current end time
    pub fn add_animation_with_delay(
        &self,
        target: &Rc<dyn AnimationTarget>,
        animation: AnimationSpec,
        delay: f64,
    ) -> Result<()> {
        self.add_entity(Entity::new(target, animation), delay)
    }

    /// Insert an animation at `time`
    pub fn insert_animation(
        &self,
        target: &Rc<dyn AnimationTarget>,
        animation: AnimationSpec,
        time: f64,
    ) -> Result<()> {
        self.insert_entity_at_time(Entity::new(target, animation), time)
    }

    /// Insert several animations on one target, all beginning at `time`.
    ///
    /// Callback vectors, when given, must have one entry per animation.
    pub fn insert_animations(
        &self,
        target: &Rc<dyn AnimationTarget>,
        animations: Vec<AnimationSpec>,
        time: f64,
        on_starts: Option<Vec<StartCallback>>,
        on_completes: Option<Vec<CompletionCallback>>,
    ) -> Result<()> {
        let result = batch(target, animations, on_starts, on_completes);
        match result {
            Ok(entities) => self.populate(entities, Placement::At(time)),
            Err(error) => self.settle(Err(error)),
        }
    }

    /// Append several animations on one target, all beginning `delay`
    /// seconds after the current end time
    pub fn add_animations(
        &self,
        target: &Rc<dyn AnimationTarget>,
        animations: Vec<AnimationSpec>,
        delay: f64,
        on_starts: Option<Vec<StartCallback>>,
        on_completes: Option<Vec<CompletionCallback>>,
    ) -> Result<()> {
        let result = batch(target, animations, on_starts, on_completes);
        match result {
            Ok(entities) => self.populate(entities, Placement::AfterEnd(delay)),
            Err(error) => self.settle(Err(error)),
        }
    }

    /// Insert copies of another timeline's entities at their begin times
    pub fn merge(&self, other: &Timeline) -> Result<()> {
        if self.ptr_eq(other) {
            return self.settle(Err(TimelineError::InvalidArgument(
                "cannot merge a timeline into itself".into(),
            )));
        }
        let copies = other
            .inner()
            .entities()
            .map(|entities| entities.iter().map(Entity::duplicate).collect::<Vec<_>>());
        match copies {
            Ok(copies) => self.populate(copies, Placement::Keep),
            Err(error) => self.settle(Err(error)),
        }
    }

    /// Descriptions of every entity, for moving them between timelines
    pub fn animation_descriptions(&self) -> Result<Vec<AnimationDescription>> {
        let result = self
            .inner()
            .entities()
            .map(|entities| entities.iter().map(Entity::description).collect());
        self.settle(result)
    }

    /// Insert entities rebuilt from descriptions
    pub fn combine_animation_descriptions(
        &self,
        descriptions: Vec<AnimationDescription>,
    ) -> Result<()> {
        let entities = descriptions
            .into_iter()
            .map(AnimationDescription::into_entity)
            .collect();
        self.populate(entities, Placement::Keep)
    }

    // ---------------------------------------------------------------------
    // Callbacks
    // ---------------------------------------------------------------------

    /// Set the start callback
    pub fn set_on_start(&self, callback: impl Fn() + 'static) {
        self.inner_mut().on_start = Some(Rc::new(callback));
    }

    /// Set the completion callback
    pub fn set_completion(&self, callback: impl Fn(bool) + 'static) {
        self.inner_mut().on_complete = Some(Rc::new(callback));
    }

    /// Remove the start callback
    pub fn remove_on_start_blocks(&self) {
        self.inner_mut().on_start = None;
    }

    /// Remove the completion callback
    pub fn remove_completion_blocks(&self) {
        self.inner_mut().on_complete = None;
    }

    /// Set the callback run when each iteration begins
    pub fn set_repeat_on_start(&self, callback: impl Fn(u64) + 'static) {
        self.inner_mut().repeat_on_start = Some(Rc::new(callback));
    }

    /// Set the callback run after each iteration
    pub fn set_repeat_completion(&self, callback: impl Fn(bool, u64, &mut bool) + 'static) {
        self.inner_mut().repeat_completion = Some(Rc::new(callback));
    }

    /// Set the repeat count
    pub fn set_repeat_count(&self, count: RepeatCount) -> Result<()> {
        let result = {
            let mut inner = self.inner_mut();
            match inner.ensure_mutable("change the repeat count") {
                Ok(()) => {
                    inner.repeat_count = count;
                    Ok(())
                }
                Err(error) => Err(error),
            }
        };
        self.settle(result)
    }

    /// Get the repeat count
    pub fn repeat_count(&self) -> RepeatCount {
        self.inner().repeat_count
    }

    /// Index of the running iteration
    pub fn repeat_iteration(&self) -> u64 {
        self.inner().repeat_iteration
    }

    // ---------------------------------------------------------------------
    // Notifications
    // ---------------------------------------------------------------------

    /// Call `callback` once per run when the timeline reaches `time`
    pub fn notify_at_time(&self, time: f64, callback: impl Fn() + 'static) -> Result<()> {
        let result = {
            let mut inner = self.inner_mut();
            check_notification_time(&inner, time).map(|()| {
                inner.notifications.add_time(time, Rc::new(callback));
            })
        };
        self.settle(result)
    }

    /// Call `callback` once per run when progress reaches at least `progress`.
    ///
    /// Progress is sampled on clock ticks before completion, so values close
    /// to 1.0 (above roughly 0.97) may never be observed.
    pub fn notify_at_progress(&self, progress: f32, callback: impl Fn() + 'static) -> Result<()> {
        let result = {
            let mut inner = self.inner_mut();
            inner.ensure_mutable("add notifications").and_then(|()| {
                if progress.is_finite() && (0.0..=1.0).contains(&progress) {
                    inner.notifications.add_progress(progress, Rc::new(callback));
                    Ok(())
                } else {
                    Err(TimelineError::InvalidArgument(format!(
                        "progress must be within [0, 1], got {progress}"
                    )))
                }
            })
        };
        self.settle(result)
    }

    // ---------------------------------------------------------------------
    // Audio
    // ---------------------------------------------------------------------

    /// Play `audio` when the timeline reaches `anchor`
    pub fn associate_audio(&self, audio: Rc<dyn TimelineAudio>, anchor: AudioAnchor) -> Result<()> {
        let result = {
            let mut inner = self.inner_mut();
            let checked = match anchor {
                AudioAnchor::AtTime(time) => check_notification_time(&inner, time),
                _ => inner
                    .ensure_mutable("associate audio")
                    .and_then(|()| inner.ensure_not_empty()),
            };
            checked.map(|()| inner.audio.add(audio, anchor))
        };
        self.settle(result)
    }

    /// Remove the audio associated at `anchor`, if any
    pub fn disassociate_audio_at(&self, anchor: AudioAnchor) {
        if self.inner_mut().audio.remove_at(anchor) == 0 {
            tracing::debug!(?anchor, "No audio associated at anchor");
        }
    }

    /// Remove every association of `audio`, if any
    pub fn disassociate_audio(&self, audio: &Rc<dyn TimelineAudio>) {
        if self.inner_mut().audio.remove_audio(audio) == 0 {
            tracing::debug!("Audio was not associated");
        }
    }

    /// Remove all audio associations
    pub fn disassociate_all_audio(&self) {
        let mut inner = self.inner_mut();
        let muted = inner.audio.is_muted();
        inner.audio = AudioAssociations::new(muted);
    }

    /// Audio starting at `time`. Only available before the timeline starts.
    pub fn associated_audio_beginning_at(&self, time: f64) -> Result<Vec<Rc<dyn TimelineAudio>>> {
        let result = {
            let inner = self.inner();
            ensure_not_started(&inner)
                .map(|()| inner.audio.beginning_at(time, inner.duration()))
        };
        self.settle(result)
    }

    /// Audio playing at `time`. Only available before the timeline starts.
    pub fn associated_audio_ongoing_at(&self, time: f64) -> Result<Vec<Rc<dyn TimelineAudio>>> {
        let result = {
            let inner = self.inner();
            ensure_not_started(&inner).map(|()| inner.audio.ongoing_at(time, inner.duration()))
        };
        self.settle(result)
    }

    /// Every associated audio, once each
    pub fn associated_audios(&self) -> Vec<Rc<dyn TimelineAudio>> {
        self.inner().audio.audios()
    }

    /// Mute or unmute associated audio
    pub fn set_mute_associated_sounds(&self, muted: bool) {
        self.inner_mut().audio.set_muted(muted);
    }

    /// Whether associated audio is muted
    pub fn mute_associated_sounds(&self) -> bool {
        self.inner().audio.is_muted()
    }

    // ---------------------------------------------------------------------
    // Observation
    // ---------------------------------------------------------------------

    /// Register an observer of progress and state flags
    pub fn observe(&self, callback: impl Fn(PropertyChange) + 'static) -> ObserverId {
        self.inner_mut().observers.add(Rc::new(callback))
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner_mut().observers.remove(id)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Length of one iteration
    pub fn duration(&self) -> f64 {
        self.inner().duration()
    }

    /// Begin time within the enclosing group, 0 for root timelines
    pub fn begin_time(&self) -> f64 {
        self.inner().begin_time
    }

    /// `begin_time + duration`
    pub fn end_time(&self) -> f64 {
        let inner = self.inner();
        inner.begin_time + inner.duration()
    }

    /// Duration of all iterations, infinite for infinite repeats
    pub fn total_duration(&self) -> f64 {
        self.inner().total_duration()
    }

    pub(crate) fn finite_total_duration(&self) -> f64 {
        let inner = self.inner();
        match inner.repeat_count.iterations() {
            Some(n) => inner.duration() * n as f64,
            None => inner.duration(),
        }
    }

    /// Progress of the current iteration
    pub fn progress(&self) -> f32 {
        self.inner().progress
    }

    /// Playback state
    pub fn state(&self) -> TimelineState {
        self.inner().state
    }

    /// Playback speed multiplier
    pub fn speed(&self) -> f64 {
        self.inner().speed
    }

    /// Whether the timeline holds no entities or child timelines
    pub fn is_empty(&self) -> bool {
        self.inner().is_empty()
    }

    /// Whether this timeline composes child timelines
    pub fn is_group(&self) -> bool {
        self.inner().is_group()
    }

    /// Whether this timeline plays back-to-front relative to its origin
    pub fn is_reversed(&self) -> bool {
        self.inner().reversed
    }

    /// Whether the timeline was cleared
    pub fn is_cleared(&self) -> bool {
        self.state() == TimelineState::Cleared
    }

    /// Whether the timeline started and has not been reset
    pub fn has_started(&self) -> bool {
        matches!(
            self.state(),
            TimelineState::Playing | TimelineState::Paused | TimelineState::Finished
        )
    }

    /// Whether the timeline ran to completion
    pub fn has_finished(&self) -> bool {
        self.state() == TimelineState::Finished
    }

    /// Whether the timeline is paused
    pub fn is_paused(&self) -> bool {
        self.state() == TimelineState::Paused
    }

    /// Whether the timeline is playing
    pub fn is_playing(&self) -> bool {
        self.state() == TimelineState::Playing
    }

    /// The group this timeline belongs to
    pub fn parent(&self) -> Option<Timeline> {
        self.inner().parent.as_ref().and_then(WeakTimeline::upgrade)
    }

    /// The timeline this one was reversed from
    pub fn originate(&self) -> Option<Timeline> {
        self.inner().originate.as_ref().and_then(WeakTimeline::upgrade)
    }

    /// Number of entities, 0 for groups
    pub fn entity_count(&self) -> usize {
        self.inner().entities().map_or(0, Vec::len)
    }

    /// Snapshot of the entities, empty for groups
    pub fn entities(&self) -> Vec<Entity> {
        self.inner().entities().cloned().unwrap_or_default()
    }

    /// Entities beginning at `time`
    pub fn entities_beginning_at(&self, time: f64) -> Vec<Entity> {
        self.entities()
            .into_iter()
            .filter(|entity| (entity.begin_time() - time).abs() < 0.0005)
            .collect()
    }

    /// Entities whose interval contains `time`
    pub fn entities_ongoing_at(&self, time: f64) -> Vec<Entity> {
        self.entities()
            .into_iter()
            .filter(|entity| entity.is_ongoing_at(time))
            .collect()
    }

    /// Number of registered time and progress notifications
    pub fn notification_count(&self) -> usize {
        let inner = self.inner();
        inner.notifications.time_count() + inner.notifications.progress_count()
    }

    /// Human readable description of the timeline
    pub fn summary(&self) -> String {
        let inner = self.inner();
        let mut out = String::new();
        let name = if inner.name.is_empty() { "untitled" } else { inner.name.as_str() };
        let _ = writeln!(
            out,
            "Timeline '{}' {:?}: {:?}, duration {:.3}s, repeat {:?}, speed {}, progress {:.3}",
            name,
            inner.id.0,
            inner.state,
            inner.duration(),
            inner.repeat_count,
            inner.speed,
            inner.progress,
        );
        match &inner.content {
            Content::Entities(entities) => {
                for entity in entities {
                    let _ = writeln!(
                        out,
                        "  [{:.3}, {:.3}) '{}' on {:?}{}",
                        entity.begin_time(),
                        entity.end_time(),
                        entity.key(),
                        entity.target_id().0,
                        if entity.animation().reversed { " (reversed)" } else { "" },
                    );
                }
            }
            Content::Group(children) => {
                for child in children.values() {
                    let child_inner = child.timeline.inner();
                    let _ = writeln!(
                        out,
                        "  [{:.3}, {:.3}) timeline '{}' {:?}",
                        child.begin_time,
                        child.begin_time + child.timeline.finite_total_duration(),
                        child_inner.name,
                        child_inner.state,
                    );
                }
            }
        }
        let times = inner.notifications.times();
        if !times.is_empty() {
            let _ = writeln!(out, "  notifications at {times:?}");
        }
        if inner.audio.len() > 0 {
            let _ = writeln!(out, "  {} audio associations", inner.audio.len());
        }
        out
    }
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Timeline")
                .field("id", &inner.id)
                .field("name", &inner.name)
                .field("state", &inner.state)
                .field("duration", &inner.duration())
                .finish(),
            Err(_) => f.write_str("Timeline(<borrowed>)"),
        }
    }
}

fn batch(
    target: &Rc<dyn AnimationTarget>,
    animations: Vec<AnimationSpec>,
    on_starts: Option<Vec<StartCallback>>,
    on_completes: Option<Vec<CompletionCallback>>,
) -> Result<Vec<Entity>> {
    let count = animations.len();
    for callbacks in [on_starts.as_ref().map(Vec::len), on_completes.as_ref().map(Vec::len)] {
        if let Some(actual) = callbacks {
            if actual != count {
                return Err(TimelineError::InvalidNumberOfBlocks {
                    expected: count,
                    actual,
                });
            }
        }
    }
    let mut on_starts = on_starts.map(Vec::into_iter);
    let mut on_completes = on_completes.map(Vec::into_iter);
    Ok(animations
        .into_iter()
        .map(|animation| {
            let on_start = on_starts.as_mut().and_then(Iterator::next);
            let on_complete = on_completes.as_mut().and_then(Iterator::next);
            Entity::new(target, animation).with_callbacks(on_start, on_complete)
        })
        .collect())
}

fn check_notification_time(inner: &TimelineInner, time: f64) -> Result<()> {
    inner.ensure_mutable("add notifications")?;
    inner.ensure_not_empty()?;
    if !time.is_finite() {
        return Err(TimelineError::InvalidArgument(format!(
            "notification time must be finite, got {time}"
        )));
    }
    let end_time = inner.duration();
    if time < 0.0 || time >= end_time {
        return Err(TimelineError::TimeNotificationOutOfBounds { time, end_time });
    }
    Ok(())
}

fn ensure_not_started(inner: &TimelineInner) -> Result<()> {
    match inner.state {
        TimelineState::Idle => Ok(()),
        _ => Err(TimelineError::OngoingTimeline(inner.id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fade, harness, MockAudio, RecordingSink};
    use crate::config::TimelineConfig;
    use crate::error::ErrorMode;
    use crate::target::PropertyTarget;
    use crate::value::PropertyValue;

    #[test]
    fn test_duration_is_max_end_time() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::new(&context);
        assert_eq!(timeline.duration(), 0.0);
        assert!(timeline.is_empty());

        timeline.insert_animation(&target, fade(3.0), 1.0).unwrap();
        timeline
            .insert_animation(&target, AnimationSpec::move_to([1.0, 0.0], 1.0), 0.5)
            .unwrap();
        assert_eq!(timeline.duration(), 4.0);
        assert_eq!(
            timeline.duration(),
            timeline.entities().iter().map(Entity::end_time).fold(0.0, f64::max)
        );

        timeline.set_repeat_count(RepeatCount::Times(3)).unwrap();
        assert_eq!(timeline.total_duration(), 12.0);
        timeline.set_repeat_count(RepeatCount::Infinite).unwrap();
        assert!(timeline.total_duration().is_infinite());
    }

    #[test]
    fn test_add_appends_after_end() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::new(&context);
        timeline.add_animation(&target, fade(2.0)).unwrap();
        timeline.add_animation_with_delay(&target, fade(1.0), 0.5).unwrap();

        let entities = timeline.entities();
        assert_eq!(entities[0].begin_time(), 0.0);
        assert_eq!(entities[1].begin_time(), 2.5);
        assert_eq!(timeline.end_time(), 3.5);
    }

    #[test]
    fn test_conflicting_insertion_scenario() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::new(&context);

        timeline.insert_animation(&target, fade(2.0), 0.0).unwrap();
        timeline.insert_animation(&target, fade(3.0), 2.0).unwrap();
        let err = timeline.insert_animation(&target, fade(2.0), 1.0).unwrap_err();
        assert!(matches!(err, TimelineError::ConflictingAnimations { .. }));
        assert_eq!(timeline.entity_count(), 2);

        // different property on the same target does not conflict
        timeline
            .insert_animation(&target, AnimationSpec::move_to([0.0, 1.0], 2.0), 1.0)
            .unwrap();
        assert!(timeline.play().is_ok());
    }

    #[test]
    fn test_batch_insertion() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::new(&context);
        let specs = vec![fade(1.0), AnimationSpec::move_to([1.0, 1.0], 2.0)];

        let on_start: StartCallback = Rc::new(|| {});
        let err = timeline
            .insert_animations(&target, specs.clone(), 0.0, Some(vec![on_start]), None)
            .unwrap_err();
        assert_eq!(err, TimelineError::InvalidNumberOfBlocks { expected: 2, actual: 1 });

        timeline.insert_animations(&target, specs.clone(), 1.0, None, None).unwrap();
        assert_eq!(timeline.entities_beginning_at(1.0).len(), 2);

        // all or nothing: the second batch conflicts with itself
        let clash = vec![fade(1.0), fade(1.0)];
        assert!(timeline.add_animations(&target, clash, 0.0, None, None).is_err());
        assert_eq!(timeline.entity_count(), 2);
    }

    #[test]
    fn test_time_notification_bounds() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::new(&context);
        assert_eq!(
            timeline.notify_at_time(0.0, || {}),
            Err(TimelineError::EmptyTimeline(timeline.id()))
        );

        timeline.add_animation(&target, fade(5.0)).unwrap();
        assert_eq!(timeline.end_time(), 5.0);
        assert!(matches!(
            timeline.notify_at_time(10.0, || {}),
            Err(TimelineError::TimeNotificationOutOfBounds { .. })
        ));
        assert!(timeline.notify_at_time(5.0, || {}).is_err());
        assert!(timeline.notify_at_time(-1.0, || {}).is_err());
        assert!(timeline.notify_at_time(4.999, || {}).is_ok());
        assert!(timeline.notify_at_progress(1.5, || {}).is_err());
        assert!(timeline.notify_at_progress(0.5, || {}).is_ok());
        assert_eq!(timeline.notification_count(), 2);
    }

    #[test]
    fn test_immutable_after_play() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::new(&context);
        timeline.add_animation(&target, fade(1.0)).unwrap();
        timeline.play().unwrap();

        assert!(matches!(
            timeline.add_animation(&target, fade(1.0)),
            Err(TimelineError::ImmutableTimeline { .. })
        ));
        assert!(matches!(
            timeline.notify_at_time(0.5, || {}),
            Err(TimelineError::ImmutableTimeline { .. })
        ));
        assert!(timeline.set_repeat_count(RepeatCount::Times(2)).is_err());
    }

    #[test]
    fn test_report_mode_skips_operation() {
        let clock = Rc::new(crate::clock::ManualClock::new());
        let sink = Rc::new(RecordingSink::default());
        let context = TimelineContext::with_config(
            clock,
            TimelineConfig {
                error_mode: ErrorMode::Report,
                ..Default::default()
            },
        )
        .with_sink(sink.clone());
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::new(&context);

        timeline.add_animation(&target, fade(5.0)).unwrap();
        assert_eq!(timeline.notify_at_time(10.0, || {}), Ok(()));
        assert_eq!(timeline.notification_count(), 0);
        assert_eq!(sink.kinds(), vec!["TimeNotificationOutOfBounds"]);
    }

    #[test]
    fn test_audio_associations() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::new(&context);
        let audio: Rc<dyn TimelineAudio> = Rc::new(MockAudio::new(1.0));

        assert!(matches!(
            timeline.associate_audio(audio.clone(), AudioAnchor::OnStart),
            Err(TimelineError::EmptyTimeline(_))
        ));
        timeline.add_animation(&target, fade(4.0)).unwrap();
        timeline.associate_audio(audio.clone(), AudioAnchor::OnMid).unwrap();
        assert!(timeline.associate_audio(audio.clone(), AudioAnchor::AtTime(4.0)).is_err());
        timeline.associate_audio(audio.clone(), AudioAnchor::AtTime(0.5)).unwrap();

        assert_eq!(timeline.associated_audio_beginning_at(2.0).unwrap().len(), 1);
        assert_eq!(timeline.associated_audio_ongoing_at(0.7).unwrap().len(), 1);
        assert_eq!(timeline.associated_audios().len(), 1);

        timeline.disassociate_audio_at(AudioAnchor::OnCompletion);
        timeline.disassociate_audio_at(AudioAnchor::OnMid);
        assert_eq!(timeline.associated_audio_beginning_at(2.0).unwrap().len(), 0);

        timeline.play().unwrap();
        assert!(matches!(
            timeline.associated_audio_ongoing_at(0.7),
            Err(TimelineError::OngoingTimeline(_))
        ));
        timeline.disassociate_all_audio();
        assert!(timeline.associated_audios().is_empty());
    }

    #[test]
    fn test_merge_and_descriptions() {
        let (_clock, context) = harness();
        let a: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("a"));
        let b: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("b"));
        let first = Timeline::new(&context);
        first.add_animation(&a, fade(2.0)).unwrap();
        let second = Timeline::new(&context);
        second.insert_animation(&b, fade(1.0), 3.0).unwrap();

        first.merge(&second).unwrap();
        assert_eq!(first.entity_count(), 2);
        assert_eq!(first.duration(), 4.0);
        assert!(first.merge(&second).is_err());

        let third = Timeline::new(&context);
        third
            .combine_animation_descriptions(first.animation_descriptions().unwrap())
            .unwrap();
        assert_eq!(third.duration(), 4.0);
        assert_eq!(third.entities_ongoing_at(3.5).len(), 1);
    }

    #[test]
    fn test_summary_lists_entities() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(
            PropertyTarget::new("box").with_value("opacity", PropertyValue::Float(0.0)),
        );
        let timeline = Timeline::with_name(&context, "intro");
        timeline.add_animation(&target, fade(2.0)).unwrap();
        timeline.notify_at_time(1.0, || {}).unwrap();
        timeline.set_user_info("scene", "title");

        let summary = timeline.summary();
        assert!(summary.contains("Timeline 'intro'"));
        assert!(summary.contains("'opacity'"));
        assert!(summary.contains("notifications at [1.0]"));
        assert_eq!(timeline.user_info().get("scene").map(String::as_str), Some("title"));
    }
}
