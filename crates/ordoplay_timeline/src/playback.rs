// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback control and clock-driven stepping.
//!
//! Root timelines subscribe to the context clock when played and accumulate
//! local time as `clock delta * speed`. Child timelines of a group are driven
//! by the group with their time relative to their begin time in the group.
//!
//! Each step processes at most one iteration boundary. A tick that jumps past
//! several boundaries catches up over the following ticks.

use crate::callback::Deferred;
use crate::error::{Result, TimelineError};
use crate::target::TargetSet;
use crate::timeline::{Content, Timeline, TimelineInner, TimelineState};
use std::rc::Rc;

enum Child {
    /// Fully before the start point
    Skip(Timeline),
    /// Straddling the start point
    StartAt(Timeline, f64),
}

impl TimelineInner {
    /// Rewind to the start of the first iteration
    fn reset_run(&mut self, deferred: &mut Deferred) {
        self.repeat_iteration = 0;
        self.elapsed = 0.0;
        self.iteration_origin = 0.0;
        self.last_wall = self.context.now();
        self.rewind_content();
        self.set_progress(0.0, deferred);
    }

    fn rewind_content(&mut self) {
        match &mut self.content {
            Content::Entities(entities) => entities.iter_mut().for_each(|e| e.reset()),
            Content::Group(children) => children.values_mut().for_each(|c| c.launched = false),
        }
        self.notifications.rearm();
        self.audio.rearm();
    }

    fn begin_iteration(&mut self, deferred: &mut Deferred) {
        self.iteration_origin += self.duration();
        self.repeat_iteration += 1;
        self.rewind_content();
        self.set_progress(0.0, deferred);
        tracing::debug!(timeline = ?self.id, iteration = self.repeat_iteration, "Timeline repeating");
        if let Some(callback) = &self.repeat_on_start {
            let callback = Rc::clone(callback);
            let iteration = self.repeat_iteration;
            deferred.push(move || callback(iteration));
        }
    }

    /// Advance entities, notifications and audio to iteration time `time`.
    /// Returns whether the iteration is complete.
    fn step_iteration(&mut self, time: f64, duration: f64, deferred: &mut Deferred) -> bool {
        let done = time >= duration;
        let time = time.min(duration);

        if let Content::Entities(entities) = &mut self.content {
            for entity in entities.iter_mut() {
                entity.update(time, deferred);
            }
        }

        if done {
            self.notifications.fire_remaining_times(deferred);
        } else {
            self.notifications.fire_times(time, deferred);
        }

        for audio in self.audio.due(time, duration) {
            deferred.push(move || audio.play());
        }

        if done {
            self.set_progress(1.0, deferred);
        } else {
            let progress = if duration > 0.0 { (time / duration) as f32 } else { 1.0 };
            self.set_progress(progress, deferred);
            // progress notifications are only sampled before completion
            let progress = self.progress;
            self.notifications.fire_progress(progress, deferred);
        }
        done
    }

    /// Whether every child of a group ran to completion
    fn children_finished(&self) -> bool {
        match &self.content {
            Content::Entities(_) => true,
            Content::Group(children) => children.values().all(|c| c.timeline.has_finished()),
        }
    }

    fn finish(&mut self, result: bool, deferred: &mut Deferred) {
        self.unsubscribe();
        if let Some(callback) = &self.on_complete {
            deferred.complete(callback, result);
        }
        self.set_state(TimelineState::Finished, deferred);
    }

    /// Fold the clock time since the last tick into `elapsed`
    fn catch_up_clock(&mut self) {
        if self.subscription.is_some() {
            let now = self.context.now();
            let delta = (now - self.last_wall).max(0.0);
            self.last_wall = now;
            self.elapsed += delta * self.speed;
        }
    }
}

impl Timeline {
    /// Start playback from the beginning.
    ///
    /// The start callback runs before this returns. An empty timeline
    /// completes immediately.
    pub fn play(&self) -> Result<()> {
        let result = self
            .ensure_not_owned("play")
            .and_then(|()| self.begin_playback(0.0, true));
        self.settle(result)
    }

    /// Restart a finished timeline from the beginning
    pub fn replay(&self) -> Result<()> {
        let result = self.ensure_not_owned("replay").and_then(|()| match self.state() {
            TimelineState::Finished | TimelineState::Idle => self.begin_playback(0.0, true),
            TimelineState::Cleared => Err(TimelineError::ClearedTimeline(self.id())),
            TimelineState::Playing | TimelineState::Paused => {
                Err(TimelineError::OngoingTimeline(self.id()))
            }
        });
        self.settle(result)
    }

    /// Start playback at `progress` of the first iteration.
    ///
    /// Entities ending before that point take their final value and
    /// notifications before it are skipped, all without callbacks.
    pub fn play_from_progress(&self, progress: f32) -> Result<()> {
        let result = self.ensure_not_owned("play").and_then(|()| {
            if progress.is_finite() && (0.0..=1.0).contains(&progress) {
                let time = f64::from(progress) * self.duration();
                self.begin_playback(time, true)
            } else {
                Err(TimelineError::InvalidArgument(format!(
                    "progress must be within [0, 1], got {progress}"
                )))
            }
        });
        self.settle(result)
    }

    pub(crate) fn begin_playback(&self, from: f64, subscribe: bool) -> Result<()> {
        let mut deferred = Deferred::new();
        let empty = {
            let mut inner = self.inner_mut();
            match inner.state {
                TimelineState::Cleared => return Err(TimelineError::ClearedTimeline(inner.id)),
                TimelineState::Playing | TimelineState::Paused => {
                    return Err(TimelineError::OngoingTimeline(inner.id))
                }
                TimelineState::Idle | TimelineState::Finished => {}
            }
            if let Content::Group(children) = &inner.content {
                if children.values().any(|c| c.timeline.repeat_count().is_infinite()) {
                    return Err(TimelineError::InvalidArgument(
                        "timelines in a group must repeat a finite number of times".into(),
                    ));
                }
            }
            inner.check_targets()?;
            inner.reset_run(&mut deferred);

            if let Some(callback) = &inner.on_start {
                deferred.start(callback);
            }
            let empty = inner.is_empty();
            if empty {
                if let Some(callback) = &inner.on_complete {
                    deferred.complete(callback, true);
                }
                inner.set_progress(1.0, &mut deferred);
                inner.set_state(TimelineState::Playing, &mut deferred);
                inner.set_state(TimelineState::Finished, &mut deferred);
            } else {
                if let Some(callback) = &inner.repeat_on_start {
                    let callback = Rc::clone(callback);
                    deferred.push(move || callback(0));
                }
                inner.set_state(TimelineState::Playing, &mut deferred);
                if subscribe {
                    let timeline = self.clone();
                    let clock = Rc::clone(inner.context.clock());
                    inner.subscription = Some(clock.subscribe(Rc::new(move |now| timeline.tick(now))));
                }
                if from == 0.0 {
                    let elapsed = inner.elapsed;
                    if let Content::Entities(entities) = &mut inner.content {
                        for entity in entities.iter_mut() {
                            entity.play_with_current_time(&|| elapsed, &mut deferred)?;
                        }
                    }
                }
            }
            tracing::debug!(
                timeline = ?inner.id,
                name = %inner.name,
                duration = inner.duration(),
                from,
                "Timeline playing"
            );
            empty
        };
        deferred.run();

        if !empty {
            if from > 0.0 {
                self.skip_to(from);
            }
            self.advance(from);
            let zero_speed = {
                let mut inner = self.inner_mut();
                let zero = inner.state == TimelineState::Playing && inner.speed == 0.0;
                if zero {
                    inner.speed_paused = true;
                }
                zero
            };
            if zero_speed {
                self.pause();
            }
        }
        Ok(())
    }

    /// Silently move past everything before `time`
    fn skip_to(&self, time: f64) {
        let mut deferred = Deferred::new();
        let children = {
            let mut inner = self.inner_mut();
            if inner.state != TimelineState::Playing {
                return;
            }
            let duration = inner.duration();
            let progress = if duration > 0.0 { (time / duration) as f32 } else { 1.0 };
            inner.notifications.skip_before(time, progress);
            inner.audio.skip_before(time, duration);
            inner.set_progress(progress, &mut deferred);

            let mut children = Vec::new();
            match &mut inner.content {
                Content::Entities(entities) => {
                    for entity in entities.iter_mut().filter(|e| e.end_time() <= time) {
                        entity.finish_silently();
                    }
                }
                Content::Group(placed) => {
                    for child in placed.values_mut() {
                        let end = child.begin_time + child.timeline.finite_total_duration();
                        if end <= time {
                            child.launched = true;
                            children.push(Child::Skip(child.timeline.clone()));
                        } else if child.begin_time < time {
                            child.launched = true;
                            children.push(Child::StartAt(
                                child.timeline.clone(),
                                time - child.begin_time,
                            ));
                        }
                    }
                }
            }
            children
        };
        deferred.run();

        let context = self.context();
        for child in children {
            match child {
                Child::Skip(timeline) => timeline.finish_silently(),
                Child::StartAt(timeline, local) => {
                    if let Err(error) = timeline.begin_playback(local, false) {
                        context.report(&error);
                    }
                }
            }
        }
    }

    /// Jump an idle or finished timeline to its end without callbacks
    pub(crate) fn finish_silently(&self) {
        let mut deferred = Deferred::new();
        let children = {
            let mut inner = self.inner_mut();
            if !matches!(inner.state, TimelineState::Idle | TimelineState::Finished) {
                return;
            }
            let children: Vec<Timeline> = match &mut inner.content {
                Content::Entities(entities) => {
                    entities.iter_mut().for_each(|e| e.finish_silently());
                    Vec::new()
                }
                Content::Group(placed) => placed.values().map(|c| c.timeline.clone()).collect(),
            };
            inner.set_progress(1.0, &mut deferred);
            inner.set_state(TimelineState::Finished, &mut deferred);
            children
        };
        for child in children {
            child.finish_silently();
        }
        deferred.run();
    }

    fn tick(&self, now: f64) {
        let elapsed = {
            let mut inner = self.inner_mut();
            if inner.state != TimelineState::Playing {
                return;
            }
            let delta = (now - inner.last_wall).max(0.0);
            inner.last_wall = now;
            inner.elapsed + delta * inner.speed
        };
        self.advance(elapsed);
    }

    /// Move to local time `elapsed` (all iterations)
    pub(crate) fn advance(&self, elapsed: f64) {
        self.step(elapsed, true);
    }

    fn step(&self, elapsed: f64, allow_boundary: bool) {
        let (time, duration, children) = {
            let mut inner = self.inner_mut();
            if inner.state != TimelineState::Playing {
                return;
            }
            inner.elapsed = elapsed;
            let children: Vec<(Timeline, f64, bool)> = match &inner.content {
                Content::Entities(_) => Vec::new(),
                Content::Group(placed) => placed
                    .values()
                    .map(|c| (c.timeline.clone(), c.begin_time, c.launched))
                    .collect(),
            };
            (inner.iteration_time(), inner.duration(), children)
        };
        if !allow_boundary && time >= duration {
            return;
        }
        tracing::trace!(time, duration, "Timeline step");

        if !children.is_empty() {
            self.drive_children(children, time, duration);
        }

        let mut deferred = Deferred::new();
        let done = {
            let mut inner = self.inner_mut();
            if inner.state != TimelineState::Playing {
                return;
            }
            inner.step_iteration(time, duration, &mut deferred)
        };
        deferred.run();

        if done {
            self.complete_iteration(elapsed);
        }
    }

    fn drive_children(&self, children: Vec<(Timeline, f64, bool)>, time: f64, duration: f64) {
        let group_done = time >= duration;
        let time = time.min(duration);
        for (child, begin, launched) in children {
            if !self.is_playing() {
                break;
            }
            let local = time - begin;
            if local < 0.0 {
                continue;
            }
            if !launched {
                self.mark_launched(&child);
                if let Err(error) = child.begin_playback(0.0, false) {
                    self.context().report(&error);
                    continue;
                }
            }
            child.advance(local);
            if group_done {
                // a repeating child crosses one boundary per step
                let mut guard = child.repeat_count().iterations().unwrap_or(1) + 1;
                while child.is_playing() && guard > 0 {
                    child.advance(local);
                    guard -= 1;
                }
            }
        }
    }

    fn ignored_in_group(&self, action: &str) -> bool {
        match self.owning_group() {
            Some(group) => {
                tracing::warn!(
                    timeline = ?self.id(),
                    group = ?group.id(),
                    action,
                    "Ignored, timeline is driven by a group"
                );
                true
            }
            None => false,
        }
    }

    fn mark_launched(&self, child: &Timeline) {
        let id = child.id();
        if let Content::Group(placed) = &mut self.inner_mut().content {
            if let Some(entry) = placed.get_mut(&id) {
                entry.launched = true;
            }
        }
    }

    fn complete_iteration(&self, elapsed: f64) {
        let (iteration, callback, result) = {
            let inner = self.inner();
            (
                inner.repeat_iteration,
                inner.repeat_completion.clone(),
                inner.children_finished(),
            )
        };
        let mut stop = false;
        if let Some(callback) = callback {
            callback(result, iteration, &mut stop);
        }

        let mut deferred = Deferred::new();
        let repeat = {
            let mut inner = self.inner_mut();
            if !matches!(inner.state, TimelineState::Playing | TimelineState::Paused) {
                return;
            }
            if !result {
                tracing::warn!(
                    timeline = ?inner.id,
                    name = %inner.name,
                    "Group finished with unfinished children"
                );
                inner.finish(false, &mut deferred);
                false
            } else if !stop && inner.repeat_count.allows(iteration + 1) {
                match inner.check_targets() {
                    Ok(()) => {
                        inner.begin_iteration(&mut deferred);
                        true
                    }
                    Err(error) => {
                        let context = inner.context.clone();
                        deferred.push(move || context.report(&error));
                        inner.finish(false, &mut deferred);
                        false
                    }
                }
            } else {
                tracing::debug!(timeline = ?inner.id, name = %inner.name, "Timeline finished");
                inner.finish(true, &mut deferred);
                false
            }
        };
        deferred.run();

        if repeat {
            self.step(elapsed, false);
        }
    }

    /// Pause a playing timeline. No-op otherwise, and for timelines driven
    /// by a group.
    pub fn pause(&self) {
        if self.ignored_in_group("pause") {
            return;
        }
        let mut paused = TargetSet::new();
        self.pause_cascade(&mut paused);
    }

    pub(crate) fn pause_cascade(&self, paused: &mut TargetSet) {
        let mut deferred = Deferred::new();
        let children = {
            let mut inner = self.inner_mut();
            if inner.state != TimelineState::Playing {
                tracing::debug!(timeline = ?inner.id, state = ?inner.state, "Pause ignored");
                return;
            }
            inner.catch_up_clock();
            let time = inner.iteration_time();
            let children: Vec<Timeline> = match &mut inner.content {
                Content::Entities(entities) => {
                    for entity in entities.iter_mut() {
                        entity.pause_with_current_time(&|| time, paused);
                    }
                    Vec::new()
                }
                Content::Group(placed) => placed
                    .values()
                    .filter(|c| c.timeline.is_playing())
                    .map(|c| c.timeline.clone())
                    .collect(),
            };
            inner.set_state(TimelineState::Paused, &mut deferred);
            children
        };
        for child in children {
            child.pause_cascade(paused);
        }
        deferred.run();
    }

    /// Resume a paused timeline where it left off. No-op otherwise, and for
    /// timelines driven by a group.
    pub fn resume(&self) {
        if self.ignored_in_group("resume") {
            return;
        }
        let mut resumed = TargetSet::new();
        self.resume_cascade(&mut resumed);
    }

    pub(crate) fn resume_cascade(&self, resumed: &mut TargetSet) {
        let mut deferred = Deferred::new();
        let children = {
            let mut inner = self.inner_mut();
            if inner.state != TimelineState::Paused {
                tracing::debug!(timeline = ?inner.id, state = ?inner.state, "Resume ignored");
                return;
            }
            inner.last_wall = inner.context.now();
            if inner.speed == 0.0 {
                inner.speed = inner.resume_speed;
            }
            inner.speed_paused = false;
            let time = inner.iteration_time();
            let children: Vec<Timeline> = match &mut inner.content {
                Content::Entities(entities) => {
                    for entity in entities.iter_mut() {
                        entity.resume_with_current_time(&|| time, resumed);
                    }
                    Vec::new()
                }
                Content::Group(placed) => placed
                    .values()
                    .filter(|c| c.timeline.is_paused())
                    .map(|c| c.timeline.clone())
                    .collect(),
            };
            inner.set_state(TimelineState::Playing, &mut deferred);
            children
        };
        for child in children {
            child.resume_cascade(resumed);
        }
        deferred.run();
    }

    /// Set the playback speed. Zero pauses, a positive speed after a zero
    /// speed resumes. Timelines in a group play at the group's speed.
    pub fn set_speed(&self, speed: f64) -> Result<()> {
        if let Err(error) = self.ensure_not_owned("set the speed of") {
            return self.settle(Err(error));
        }
        if !speed.is_finite() || speed < 0.0 {
            return self.settle(Err(TimelineError::InvalidArgument(format!(
                "speed must be finite and >= 0, got {speed}"
            ))));
        }

        enum Then {
            Pause,
            Resume,
            Nothing,
        }
        let then = {
            let mut inner = self.inner_mut();
            if inner.state == TimelineState::Playing {
                inner.catch_up_clock();
            }
            if speed == 0.0 {
                if inner.speed > 0.0 {
                    inner.resume_speed = inner.speed;
                }
                inner.speed = 0.0;
                if inner.state == TimelineState::Playing {
                    inner.speed_paused = true;
                    Then::Pause
                } else {
                    Then::Nothing
                }
            } else {
                inner.speed = speed;
                inner.resume_speed = speed;
                if inner.state == TimelineState::Paused && inner.speed_paused {
                    Then::Resume
                } else {
                    Then::Nothing
                }
            }
        };
        match then {
            Then::Pause => self.pause(),
            Then::Resume => self.resume(),
            Then::Nothing => {}
        }
        Ok(())
    }

    /// Tear the timeline down for good.
    ///
    /// Running entities and the timeline itself complete with `false`.
    /// Targets, audio and the clock subscription are released. A timeline
    /// driven by a group is cleared with its group.
    pub fn clear(&self) {
        if self.ignored_in_group("clear") {
            return;
        }
        let mut deferred = Deferred::new();
        let mut completion = Deferred::new();
        let children = {
            let mut inner = self.inner_mut();
            if inner.state == TimelineState::Cleared {
                return;
            }
            let in_flight = matches!(inner.state, TimelineState::Playing | TimelineState::Paused);
            inner.unsubscribe();

            let children: Vec<Timeline> = match &mut inner.content {
                Content::Entities(entities) => {
                    for entity in entities.iter_mut() {
                        entity.clear(&mut deferred);
                    }
                    entities.clear();
                    Vec::new()
                }
                Content::Group(placed) => placed.drain(..).map(|(_, c)| c.timeline).collect(),
            };
            for audio in inner.audio.take_played() {
                deferred.push(move || audio.stop(false));
            }
            inner.notifications.clear();

            if in_flight {
                if let Some(callback) = &inner.on_complete {
                    completion.complete(callback, false);
                }
            }
            inner.on_start = None;
            inner.on_complete = None;
            inner.repeat_on_start = None;
            inner.repeat_completion = None;
            inner.set_state(TimelineState::Cleared, &mut completion);
            tracing::debug!(timeline = ?inner.id, name = %inner.name, in_flight, "Timeline cleared");
            children
        };
        deferred.run();
        for child in children {
            child.clear();
        }
        completion.run();
    }
}
