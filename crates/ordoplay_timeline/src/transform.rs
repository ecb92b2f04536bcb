// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structural copies: reversal, rescaling, delay and duplication.
//!
//! Copies are idle timelines with fresh identity that share the source's
//! targets, callbacks and configuration.

use crate::error::{check_time, Result, TimelineError};
use crate::group::GroupEntity;
use crate::timeline::{Content, Timeline, TimelineInner, TimelineState};
use indexmap::IndexMap;

/// Rebuild every child of a group through `copy`, placing each at the
/// begin time returned alongside it
fn map_children(
    children: &IndexMap<crate::timeline::TimelineId, GroupEntity>,
    copy: impl Fn(&GroupEntity) -> Result<(Timeline, f64)>,
) -> Result<Content> {
    let mut placed = IndexMap::with_capacity(children.len());
    for child in children.values() {
        let (timeline, begin_time) = copy(child)?;
        placed.insert(timeline.id(), GroupEntity::new(timeline, begin_time));
    }
    Ok(Content::Group(placed))
}

fn ensure_not_cleared(inner: &TimelineInner) -> Result<()> {
    if inner.state == TimelineState::Cleared {
        Err(TimelineError::ClearedTimeline(inner.id))
    } else {
        Ok(())
    }
}

impl Timeline {
    /// Copy that plays back-to-front.
    ///
    /// Every entity is mirrored within the duration (`begin = duration - end`)
    /// and animates from its end value to its start value. The copy keeps
    /// the full duration, so reversing it again restores the original layout. Notifications and
    /// audio anchors are mirrored too. The copy's
    /// [`originate`](Timeline::originate) is this timeline.
    pub fn reversed(&self) -> Result<Timeline> {
        let timeline = {
            let inner = self.inner();
            ensure_not_cleared(&inner)?;
            let duration = inner.duration();
            let content = match &inner.content {
                Content::Entities(entities) => Content::Entities(
                    entities.iter().map(|e| e.reversed_copy(duration)).collect(),
                ),
                Content::Group(children) => map_children(children, |child| {
                    let begin = (duration - child.end_time()).max(0.0);
                    Ok((child.timeline.reversed()?, begin))
                })?,
            };

            let mut derived = inner.derive(content);
            derived.span = duration;
            derived.reversed = !inner.reversed;
            derived.originate = Some(self.downgrade());
            derived.notifications = inner.notifications.mapped(|t| duration - t, |p| 1.0 - p);
            derived.audio = inner
                .audio
                .mapped(|anchor, audio| anchor.reversed(duration, audio.duration()));
            tracing::debug!(source = ?inner.id, copy = ?derived.id, duration, "Timeline reversed");
            Timeline::from_inner(derived)
        };
        timeline.adopt_children();
        Ok(timeline)
    }

    /// Copy with every begin time and duration scaled to fit `duration`.
    ///
    /// An empty or zero-length timeline is copied unscaled.
    pub fn timeline_with_duration(&self, duration: f64) -> Result<Timeline> {
        check_time("duration", duration)?;
        let timeline = {
            let inner = self.inner();
            ensure_not_cleared(&inner)?;
            let original = inner.duration();
            let factor = if original > 0.0 { duration / original } else { 1.0 };
            let content = match &inner.content {
                Content::Entities(entities) => Content::Entities(
                    entities
                        .iter()
                        .map(|e| e.copy_with_duration(e.duration() * factor, e.begin_time() * factor))
                        .collect(),
                ),
                Content::Group(children) => map_children(children, |child| {
                    let scaled = child
                        .timeline
                        .timeline_with_duration(child.timeline.duration() * factor)?;
                    Ok((scaled, child.begin_time * factor))
                })?,
            };

            let mut derived = inner.derive(content);
            derived.span = inner.span * factor;
            derived.originate = inner.originate.clone();
            derived.notifications = inner.notifications.mapped(|t| t * factor, |p| p);
            derived.audio = inner.audio.mapped(|anchor, _| anchor.scaled(factor));
            Timeline::from_inner(derived)
        };
        timeline.adopt_children();
        Ok(timeline)
    }

    /// Shift all content `delay` seconds later
    pub fn delay(&self, delay: f64) -> Result<()> {
        let result = self.shift(delay);
        self.settle(result)
    }

    fn shift(&self, delay: f64) -> Result<()> {
        check_time("delay", delay)?;
        let mut inner = self.inner_mut();
        inner.ensure_mutable("delay")?;
        match &mut inner.content {
            Content::Entities(entities) => {
                for entity in entities.iter_mut() {
                    let begin = entity.begin_time() + delay;
                    entity.set_begin_time(begin);
                }
            }
            Content::Group(children) => {
                for child in children.values_mut() {
                    child.begin_time += delay;
                    child.timeline.inner_mut().begin_time = child.begin_time;
                }
            }
        }
        if inner.span > 0.0 {
            inner.span += delay;
        }
        inner.notifications = inner.notifications.mapped(|t| t + delay, |p| p);
        inner.audio.shift(delay);
        Ok(())
    }

    /// Idle copy with fresh identity for this timeline and its content
    pub fn duplicate(&self) -> Timeline {
        let timeline = {
            let inner = self.inner();
            let content = match &inner.content {
                Content::Entities(entities) => {
                    Content::Entities(entities.iter().map(|e| e.duplicate()).collect())
                }
                Content::Group(children) => {
                    let mut placed = IndexMap::with_capacity(children.len());
                    for child in children.values() {
                        let copy = child.timeline.duplicate();
                        placed.insert(copy.id(), GroupEntity::new(copy, child.begin_time));
                    }
                    Content::Group(placed)
                }
            };
            let mut derived = inner.derive(content);
            derived.originate = inner.originate.clone();
            derived.notifications = inner.notifications.mapped(|t| t, |p| p);
            derived.audio = inner.audio.mapped(|anchor, _| anchor);
            Timeline::from_inner(derived)
        };
        timeline.adopt_children();
        timeline
    }
}

#[cfg(test)]
mod tests {
    use crate::animation::AnimationSpec;
    use crate::audio::AudioAnchor;
    use crate::group::GroupTimeline;
    use crate::target::{AnimationTarget, PropertyTarget};
    use crate::testing::{fade, harness, MockAudio};
    use crate::timeline::Timeline;
    use std::rc::Rc;

    fn begins(timeline: &Timeline) -> Vec<f64> {
        timeline.entities().iter().map(|e| e.begin_time()).collect()
    }

    #[test]
    fn test_reversed_round_trip() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::new(&context);
        timeline.insert_animation(&target, fade(2.0), 0.0).unwrap();
        timeline
            .insert_animation(&target, AnimationSpec::move_to([1.0, 0.0], 3.0), 1.0)
            .unwrap();
        timeline.notify_at_time(1.0, || {}).unwrap();

        let reversed = timeline.reversed().unwrap();
        assert!(reversed.is_reversed());
        assert!(reversed.originate().is_some_and(|o| o.ptr_eq(&timeline)));
        assert_eq!(reversed.duration(), 4.0);
        assert_eq!(begins(&reversed), vec![2.0, 0.0]);
        assert!(reversed.entities().iter().all(|e| e.animation().reversed));
        assert!(reversed.summary().contains("notifications at [3.0]"));

        let back = reversed.reversed().unwrap();
        assert!(!back.is_reversed());
        assert_eq!(back.duration(), timeline.duration());
        assert_eq!(begins(&back), begins(&timeline));
        assert!(back.entities().iter().all(|e| !e.animation().reversed));
        assert!(back.summary().contains("notifications at [1.0]"));
    }

    #[test]
    fn test_reversed_keeps_leading_gap() {
        let (clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::new(&context);
        timeline.insert_animation(&target, fade(2.0), 1.0).unwrap();
        assert_eq!(timeline.duration(), 3.0);

        let reversed = timeline.reversed().unwrap();
        assert_eq!(reversed.duration(), 3.0);
        assert_eq!(begins(&reversed), vec![0.0]);

        let back = reversed.reversed().unwrap();
        assert_eq!(back.duration(), 3.0);
        assert_eq!(begins(&back), vec![1.0]);

        let scaled = reversed.timeline_with_duration(6.0).unwrap();
        assert_eq!(scaled.duration(), 6.0);

        // the trailing gap is played through
        reversed.play().unwrap();
        clock.run_for(2.5);
        assert!(reversed.is_playing());
        clock.run_for(0.6);
        assert!(reversed.has_finished());
    }

    #[test]
    fn test_reversed_plays_back_to_front() {
        let (clock, context) = harness();
        let concrete = Rc::new(PropertyTarget::new("box"));
        let target: Rc<dyn AnimationTarget> = concrete.clone();
        let timeline = Timeline::new(&context);
        timeline.add_animation(&target, fade(2.0)).unwrap();
        let audio = Rc::new(MockAudio::new(0.5));
        timeline.associate_audio(audio.clone(), AudioAnchor::OnStart).unwrap();

        let reversed = timeline.reversed().unwrap();
        assert_eq!(reversed.associated_audio_beginning_at(2.0).unwrap().len(), 1);
        reversed.play().unwrap();
        let opacity = || concrete.value(&"opacity".into()).and_then(|v| v.as_float());
        assert_eq!(opacity(), Some(1.0));
        clock.run_for(2.1);
        assert_eq!(opacity(), Some(0.0));
        assert_eq!(audio.plays(), 1);
    }

    #[test]
    fn test_reversed_group_mirrors_children() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let t1 = Timeline::new(&context);
        t1.add_animation(&target, fade(2.0)).unwrap();
        let t2 = Timeline::new(&context);
        t2.add_animation(&target, AnimationSpec::move_to([1.0, 1.0], 3.0)).unwrap();
        let group = GroupTimeline::sequentially(&context, vec![t1, t2]).unwrap();

        let reversed = GroupTimeline::from_timeline(group.reversed().unwrap()).unwrap();
        assert_eq!(reversed.duration(), 5.0);
        let begins: Vec<f64> = reversed.timelines().iter().map(|c| c.begin_time()).collect();
        assert_eq!(begins, vec![3.0, 0.0]);
        assert!(reversed
            .timelines()
            .iter()
            .all(|c| c.timeline().parent().is_some_and(|p| p.ptr_eq(&reversed))));
    }

    #[test]
    fn test_rescale_to_duration() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::new(&context);
        timeline.insert_animation(&target, fade(1.0), 1.0).unwrap();
        timeline.notify_at_time(1.5, || {}).unwrap();

        let scaled = timeline.timeline_with_duration(4.0).unwrap();
        assert_eq!(scaled.duration(), 4.0);
        assert_eq!(begins(&scaled), vec![2.0]);
        assert_eq!(scaled.entities()[0].duration(), 2.0);
        assert!(scaled.summary().contains("notifications at [3.0]"));
        assert!(!scaled.ptr_eq(&timeline));
        assert!(timeline.timeline_with_duration(-1.0).is_err());

        let empty = Timeline::new(&context).timeline_with_duration(3.0).unwrap();
        assert_eq!(empty.duration(), 0.0);
    }

    #[test]
    fn test_delay_and_duplicate() {
        let (_clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let timeline = Timeline::with_name(&context, "intro");
        timeline.add_animation(&target, fade(1.0)).unwrap();
        timeline.notify_at_time(0.5, || {}).unwrap();

        timeline.delay(2.0).unwrap();
        assert_eq!(begins(&timeline), vec![2.0]);
        assert_eq!(timeline.duration(), 3.0);
        assert!(timeline.summary().contains("notifications at [2.5]"));
        assert!(timeline.delay(-1.0).is_err());

        let copy = timeline.duplicate();
        assert_ne!(copy.id(), timeline.id());
        assert_eq!(copy.name(), "intro");
        assert_eq!(copy.duration(), 3.0);
        assert_ne!(copy.entities()[0].id(), timeline.entities()[0].id());
        assert_eq!(copy.notification_count(), 1);

        timeline.play().unwrap();
        assert!(timeline.delay(1.0).is_err());
        assert!(copy.delay(1.0).is_ok());
    }
}
