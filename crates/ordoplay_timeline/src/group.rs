// SPDX-License-Identifier: MIT OR Apache-2.0
//! Groups of timelines played as one.
//!
//! A [`GroupTimeline`] places child timelines at begin times within itself
//! and drives them from its own local time. Playback control cascades to the
//! children; completion flows back up through the group's own callbacks.

use crate::config::TimelineContext;
use crate::error::{check_time, Result, TimelineError};
use crate::timeline::{Content, Timeline, TimelineId, TimelineInner, TimelineState};
use indexmap::IndexMap;
use std::ops::Deref;

/// A child timeline placed in a group
#[derive(Debug, Clone)]
pub struct GroupEntity {
    pub(crate) timeline: Timeline,
    pub(crate) begin_time: f64,
    /// Whether the group started the child in the current iteration
    pub(crate) launched: bool,
}

impl GroupEntity {
    pub(crate) fn new(timeline: Timeline, begin_time: f64) -> Self {
        Self {
            timeline,
            begin_time,
            launched: false,
        }
    }

    /// Get the child timeline
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Begin time within the group
    pub fn begin_time(&self) -> f64 {
        self.begin_time
    }

    /// End of the child's last iteration within the group
    pub fn end_time(&self) -> f64 {
        self.begin_time + self.timeline.finite_total_duration()
    }
}

/// A timeline whose content is other timelines
#[derive(Debug, Clone)]
pub struct GroupTimeline(Timeline);

impl Deref for GroupTimeline {
    type Target = Timeline;

    fn deref(&self) -> &Timeline {
        &self.0
    }
}

impl GroupTimeline {
    /// Create an empty group
    pub fn new(context: &TimelineContext) -> Self {
        Self(Timeline::from_inner(TimelineInner::new(
            context.clone(),
            Content::Group(IndexMap::new()),
        )))
    }

    /// Create an empty named group
    pub fn with_name(context: &TimelineContext, name: impl Into<String>) -> Self {
        let group = Self::new(context);
        group.set_name(name);
        group
    }

    /// Group with every child beginning at 0
    pub fn together(context: &TimelineContext, timelines: Vec<Timeline>) -> Result<Self> {
        let group = Self::new(context);
        group.place(timelines, |_| 0.0)?;
        Ok(group)
    }

    /// Group with each child beginning where the previous one ends
    pub fn sequentially(context: &TimelineContext, timelines: Vec<Timeline>) -> Result<Self> {
        let group = Self::new(context);
        group.place(timelines, |end| end)?;
        Ok(group)
    }

    /// View a timeline as a group, if it is one
    pub fn from_timeline(timeline: Timeline) -> Option<Self> {
        timeline.is_group().then_some(Self(timeline))
    }

    /// Borrow the underlying timeline
    pub fn as_timeline(&self) -> &Timeline {
        &self.0
    }

    /// Unwrap the underlying timeline
    pub fn into_timeline(self) -> Timeline {
        self.0
    }

    /// Append a child after the current end time
    pub fn add_timeline(&self, timeline: &Timeline) -> Result<()> {
        self.add_timeline_with_delay(timeline, 0.0)
    }

    /// Append a child `delay` seconds after the current end time
    pub fn add_timeline_with_delay(&self, timeline: &Timeline, delay: f64) -> Result<()> {
        let result = check_time("delay", delay)
            .and_then(|()| self.place(vec![timeline.clone()], |end| end + delay));
        self.settle(result)
    }

    /// Insert a child at `time`
    pub fn insert_timeline_at_time(&self, timeline: &Timeline, time: f64) -> Result<()> {
        let result = self.place(vec![timeline.clone()], |_| time);
        self.settle(result)
    }

    /// Append several children, all beginning after the current end time
    pub fn add_timelines(&self, timelines: &[Timeline], delay: f64) -> Result<()> {
        let result = check_time("delay", delay).and_then(|()| {
            let begin = self.duration() + delay;
            self.place(timelines.to_vec(), |_| begin)
        });
        self.settle(result)
    }

    /// Insert several children, all beginning at `time`
    pub fn insert_timelines(&self, timelines: &[Timeline], time: f64) -> Result<()> {
        let result = self.place(timelines.to_vec(), |_| time);
        self.settle(result)
    }

    /// Validate and insert children, all or nothing. `begin` maps the end
    /// time of the group so far to the begin time of the next child.
    fn place(&self, timelines: Vec<Timeline>, begin: impl Fn(f64) -> f64) -> Result<()> {
        {
            let inner = self.inner();
            inner.ensure_mutable("add timelines")?;
        }
        for (idx, timeline) in timelines.iter().enumerate() {
            self.check_child(timeline)?;
            if timelines[..idx].iter().any(|other| other.ptr_eq(timeline)) {
                return Err(TimelineError::InvalidArgument(format!(
                    "timeline {:?} appears twice",
                    timeline.id().0
                )));
            }
        }

        let mut end = self.duration();
        let mut placed = Vec::with_capacity(timelines.len());
        for timeline in timelines {
            let begin_time = begin(end);
            check_time("begin time", begin_time)?;
            end = end.max(begin_time + timeline.finite_total_duration());
            placed.push((timeline, begin_time));
        }

        let parent = self.downgrade();
        for (timeline, begin_time) in placed {
            {
                let mut child = timeline.inner_mut();
                child.begin_time = begin_time;
                child.parent = Some(parent.clone());
            }
            tracing::debug!(
                group = ?self.id(),
                child = ?timeline.id(),
                begin_time,
                "Timeline added to group"
            );
            if let Content::Group(children) = &mut self.inner_mut().content {
                children.insert(timeline.id(), GroupEntity::new(timeline, begin_time));
            }
        }
        Ok(())
    }

    fn check_child(&self, timeline: &Timeline) -> Result<()> {
        if timeline.ptr_eq(self) || contains(timeline, self) {
            return Err(TimelineError::InvalidArgument(
                "a group cannot contain itself".into(),
            ));
        }
        if self.contains_timeline(timeline) || timeline.parent().is_some() {
            return Err(TimelineError::InvalidArgument(format!(
                "timeline {:?} already belongs to a group",
                timeline.id().0
            )));
        }
        match timeline.state() {
            TimelineState::Cleared => return Err(TimelineError::ClearedTimeline(timeline.id())),
            TimelineState::Playing | TimelineState::Paused => {
                return Err(TimelineError::OngoingTimeline(timeline.id()))
            }
            TimelineState::Idle | TimelineState::Finished => {}
        }
        if timeline.repeat_count().is_infinite() {
            return Err(TimelineError::InvalidArgument(
                "timelines in a group must repeat a finite number of times".into(),
            ));
        }
        if timeline.speed() != 1.0 {
            return Err(TimelineError::InvalidArgument(format!(
                "timelines in a group play at the group's speed, got {}",
                timeline.speed()
            )));
        }
        Ok(())
    }

    /// Remove a child. Returns whether it was in the group.
    pub fn remove_timeline(&self, timeline: &Timeline) -> Result<bool> {
        let result = {
            let mut inner = self.inner_mut();
            inner.ensure_mutable("remove timelines").map(|()| match &mut inner.content {
                Content::Group(children) => children.shift_remove(&timeline.id()),
                Content::Entities(_) => None,
            })
        };
        match result {
            Ok(Some(removed)) => {
                let mut child = removed.timeline.inner_mut();
                child.begin_time = 0.0;
                child.parent = None;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(error) => self.settle(Err(error)),
        }
    }

    /// Whether `timeline` is a direct child
    pub fn contains_timeline(&self, timeline: &Timeline) -> bool {
        match &self.inner().content {
            Content::Group(children) => children
                .get(&timeline.id())
                .is_some_and(|child| child.timeline.ptr_eq(timeline)),
            Content::Entities(_) => false,
        }
    }

    /// Children in insertion order
    pub fn timelines(&self) -> Vec<GroupEntity> {
        match &self.inner().content {
            Content::Group(children) => children.values().cloned().collect(),
            Content::Entities(_) => Vec::new(),
        }
    }

    /// Begin time of a child within the group
    pub fn child_begin_time(&self, id: TimelineId) -> Option<f64> {
        match &self.inner().content {
            Content::Group(children) => children.get(&id).map(GroupEntity::begin_time),
            Content::Entities(_) => None,
        }
    }

    /// Children beginning at `time`
    pub fn timelines_beginning_at(&self, time: f64) -> Vec<Timeline> {
        self.timelines()
            .into_iter()
            .filter(|child| (child.begin_time - time).abs() < 0.0005)
            .map(|child| child.timeline)
            .collect()
    }

    /// Children whose span contains `time`
    pub fn timelines_ongoing_at(&self, time: f64) -> Vec<Timeline> {
        self.timelines()
            .into_iter()
            .filter(|child| child.begin_time <= time && time < child.end_time())
            .map(|child| child.timeline)
            .collect()
    }
}

impl From<GroupTimeline> for Timeline {
    fn from(group: GroupTimeline) -> Self {
        group.0
    }
}

/// Whether `needle` is a descendant of `haystack`
fn contains(haystack: &Timeline, needle: &Timeline) -> bool {
    match &haystack.inner().content {
        Content::Group(children) => children
            .values()
            .any(|child| child.timeline.ptr_eq(needle) || contains(&child.timeline, needle)),
        Content::Entities(_) => false,
    }
}

impl Timeline {
    /// The group driving this timeline, if it is placed in one
    pub(crate) fn owning_group(&self) -> Option<Timeline> {
        let parent = self.parent()?;
        let owned = match &parent.inner().content {
            Content::Group(children) => children.contains_key(&self.id()),
            Content::Entities(_) => false,
        };
        owned.then_some(parent)
    }

    /// Fail when a group drives this timeline
    pub(crate) fn ensure_not_owned(&self, action: &str) -> Result<()> {
        match self.owning_group() {
            Some(group) => Err(TimelineError::InvalidArgument(format!(
                "cannot {action} timeline {:?}, it is driven by group {:?}",
                self.id().0,
                group.id().0
            ))),
            None => Ok(()),
        }
    }

    /// Point every child's parent link and begin time at this group
    pub(crate) fn adopt_children(&self) {
        let parent = self.downgrade();
        let children: Vec<(Timeline, f64)> = match &self.inner().content {
            Content::Group(children) => children
                .values()
                .map(|child| (child.timeline.clone(), child.begin_time))
                .collect(),
            Content::Entities(_) => Vec::new(),
        };
        for (child, begin_time) in children {
            let mut inner = child.inner_mut();
            inner.parent = Some(parent.clone());
            inner.begin_time = begin_time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{AnimationTarget, PropertyTarget};
    use crate::testing::{fade, harness, new_log, push};
    use crate::timeline::RepeatCount;
    use std::rc::Rc;

    fn timeline_of(context: &TimelineContext, target: &Rc<dyn AnimationTarget>, duration: f64) -> Timeline {
        let timeline = Timeline::new(context);
        timeline.add_animation(target, fade(duration)).unwrap();
        timeline
    }

    #[test]
    fn test_sequential_placement() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let t1 = timeline_of(&context, &target, 2.0);
        let t2 = timeline_of(&context, &target, 3.0);

        let group = GroupTimeline::sequentially(&context, vec![t1.clone(), t2.clone()]).unwrap();
        assert_eq!(group.duration(), 5.0);
        assert_eq!(group.child_begin_time(t2.id()), Some(2.0));
        assert_eq!(t2.begin_time(), 2.0);
        assert!(t2.parent().is_some_and(|parent| parent.ptr_eq(&group)));
        assert_eq!(group.timelines_ongoing_at(2.5).len(), 1);
        assert_eq!(group.timelines_beginning_at(0.0).len(), 1);
    }

    #[test]
    fn test_together_and_repeats() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let t1 = timeline_of(&context, &target, 2.0);
        let t2 = timeline_of(&context, &target, 1.0);
        t2.set_repeat_count(RepeatCount::Times(3)).unwrap();

        let group = GroupTimeline::together(&context, vec![t1, t2]).unwrap();
        assert_eq!(group.duration(), 3.0);
        assert!(group.timelines().iter().all(|child| child.begin_time() == 0.0));
    }

    #[test]
    fn test_invalid_children() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let group = GroupTimeline::new(&context);
        assert!(matches!(
            group.add_animation(&target, fade(1.0)),
            Err(TimelineError::UnsupportedMessage(_))
        ));
        assert!(group.add_timeline(&group).is_err());

        let inner = GroupTimeline::new(&context);
        group.add_timeline(&inner).unwrap();
        assert!(inner.add_timeline(&group).is_err());
        assert!(group.add_timeline(&inner).is_err());

        let infinite = timeline_of(&context, &target, 1.0);
        infinite.set_repeat_count(RepeatCount::Infinite).unwrap();
        assert!(group.add_timeline(&infinite).is_err());

        let playing = timeline_of(&context, &target, 1.0);
        playing.play().unwrap();
        assert_eq!(
            group.add_timeline(&playing),
            Err(TimelineError::OngoingTimeline(playing.id()))
        );

        assert!(group.remove_timeline(&inner).unwrap());
        assert!(inner.parent().is_none());
        assert!(!group.remove_timeline(&inner).unwrap());
    }

    #[test]
    fn test_group_playback_order() {
        let (clock, context) = harness();
        let a: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("a"));
        let b: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("b"));
        let log = new_log();
        let t1 = timeline_of(&context, &a, 1.0);
        let t2 = timeline_of(&context, &b, 1.0);
        for (timeline, name) in [(&t1, "t1"), (&t2, "t2")] {
            let (s, c) = (log.clone(), log.clone());
            timeline.set_on_start(move || push(&s, format!("{name} start")));
            timeline.set_completion(move |done| push(&c, format!("{name} complete {done}")));
        }
        let group = GroupTimeline::sequentially(&context, vec![t1.clone(), t2.clone()]).unwrap();
        {
            let (s, c) = (log.clone(), log.clone());
            group.set_on_start(move || push(&s, "group start"));
            group.set_completion(move |done| push(&c, format!("group complete {done}")));
        }

        group.play().unwrap();
        assert!(t1.is_playing());
        assert_eq!(t2.state(), TimelineState::Idle);
        clock.run_for(2.2);
        assert_eq!(
            *log.borrow(),
            vec![
                "group start",
                "t1 start",
                "t1 complete true",
                "t2 start",
                "t2 complete true",
                "group complete true",
            ]
        );
        assert!(group.has_finished());
        assert_eq!(clock.subscriber_count(), 0);

        group.replay().unwrap();
        clock.run_for(2.2);
        assert_eq!(log.borrow().len(), 12);
    }

    #[test]
    fn test_shared_target_paused_once() {
        let (clock, context) = harness();
        let concrete = Rc::new(PropertyTarget::new("box"));
        let target: Rc<dyn AnimationTarget> = concrete.clone();
        let t1 = Timeline::new(&context);
        t1.add_animation(&target, fade(2.0)).unwrap();
        let t2 = Timeline::new(&context);
        t2.add_animation(&target, crate::animation::AnimationSpec::move_to([1.0, 1.0], 2.0))
            .unwrap();
        let group = GroupTimeline::together(&context, vec![t1.clone(), t2.clone()]).unwrap();

        group.play().unwrap();
        clock.run_for(0.5);
        group.pause();
        assert!(t1.is_paused() && t2.is_paused());
        assert_eq!(concrete.pause_count(), 1);

        let progress = t1.progress();
        clock.run_for(1.0);
        assert_eq!(t1.progress(), progress);

        group.resume();
        assert!(t1.is_playing() && t2.is_playing());
        assert_eq!(concrete.resume_count(), 1);
        clock.run_for(1.6);
        assert!(group.has_finished() && t1.has_finished() && t2.has_finished());
    }

    #[test]
    fn test_children_controlled_through_group() {
        let (clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let log = new_log();
        let t1 = timeline_of(&context, &target, 1.0);
        let group = GroupTimeline::together(&context, vec![t1.clone()]).unwrap();
        {
            let log = log.clone();
            group.set_completion(move |done| push(&log, format!("group {done}")));
        }

        group.play().unwrap();
        clock.run_for(0.3);
        t1.pause();
        assert!(t1.is_playing());
        t1.clear();
        assert!(t1.is_playing());
        assert!(matches!(t1.set_speed(2.0), Err(TimelineError::InvalidArgument(_))));
        assert!(matches!(t1.play(), Err(TimelineError::InvalidArgument(_))));
        assert!(matches!(t1.replay(), Err(TimelineError::InvalidArgument(_))));

        clock.run_for(1.0);
        assert!(group.has_finished() && t1.has_finished());
        assert_eq!(*log.borrow(), vec!["group true"]);

        group.replay().unwrap();
        assert!(t1.is_playing());
        clock.run_for(1.1);
        assert!(group.has_finished() && t1.has_finished());
        assert_eq!(*log.borrow(), vec!["group true", "group true"]);

        // once the group is gone the child is free again
        drop(group);
        t1.replay().unwrap();
        assert!(t1.is_playing());
    }

    #[test]
    fn test_unlaunched_child_fails_group() {
        let (clock, context) = harness();
        let a: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("a"));
        let concrete = Rc::new(PropertyTarget::new("b"));
        let b: Rc<dyn AnimationTarget> = concrete.clone();
        let t1 = timeline_of(&context, &a, 1.0);
        let t2 = timeline_of(&context, &b, 1.0);
        let group = GroupTimeline::sequentially(&context, vec![t1, t2.clone()]).unwrap();
        let completed = Rc::new(std::cell::Cell::new(None));
        {
            let completed = completed.clone();
            group.set_completion(move |done| completed.set(Some(done)));
        }

        group.play().unwrap();
        concrete.set_attached(false);
        clock.run_for(2.2);
        assert!(group.has_finished());
        assert_eq!(t2.state(), TimelineState::Idle);
        assert_eq!(completed.get(), Some(false));
    }

    #[test]
    fn test_child_speed_rejected() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let fast = timeline_of(&context, &target, 2.0);
        fast.set_speed(2.0).unwrap();
        assert!(matches!(
            GroupTimeline::together(&context, vec![fast.clone()]),
            Err(TimelineError::InvalidArgument(_))
        ));
        assert!(fast.parent().is_none());

        fast.set_speed(1.0).unwrap();
        let group = GroupTimeline::together(&context, vec![fast.clone()]).unwrap();
        assert_eq!(group.duration(), 2.0);
    }

    #[test]
    fn test_repeating_child_plays_in_group() {
        let (clock, context) = harness();
        let a: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("a"));
        let b: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("b"));
        let log = new_log();
        let t1 = timeline_of(&context, &a, 2.0);
        let t2 = timeline_of(&context, &b, 1.0);
        t2.set_repeat_count(RepeatCount::Times(3)).unwrap();
        {
            let (s, c) = (log.clone(), log.clone());
            t2.set_repeat_on_start(move |i| push(&s, format!("t2 begin {i}")));
            t2.set_completion(move |done| push(&c, format!("t2 complete {done}")));
        }
        let group = GroupTimeline::together(&context, vec![t1.clone(), t2.clone()]).unwrap();
        {
            let log = log.clone();
            group.set_completion(move |done| push(&log, format!("group {done}")));
        }

        group.play().unwrap();
        clock.run_for(2.5);
        assert!(group.is_playing());
        assert!(t1.has_finished());
        assert_eq!(t2.repeat_iteration(), 2);

        clock.run_for(0.6);
        assert!(group.has_finished() && t2.has_finished());
        assert_eq!(
            *log.borrow(),
            vec!["t2 begin 0", "t2 begin 1", "t2 begin 2", "t2 complete true", "group true"]
        );
    }

    #[test]
    fn test_clear_cascades() {
        let (clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let t1 = timeline_of(&context, &target, 1.0);
        let completed = Rc::new(std::cell::Cell::new(None));
        {
            let completed = completed.clone();
            t1.set_completion(move |done| completed.set(Some(done)));
        }
        let group = GroupTimeline::together(&context, vec![t1.clone()]).unwrap();
        group.play().unwrap();
        clock.run_for(0.3);
        group.clear();
        assert!(t1.is_cleared());
        assert_eq!(completed.get(), Some(false));
        assert!(group.timelines().is_empty());
    }
}
