// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playing a timeline back once it has run forward.

use crate::error::Result;
use crate::observe::{ObserverId, PropertyChange};
use crate::timeline::{Timeline, TimelineState};
use std::cell::Cell;

/// Plays the reversed copy of a timeline.
///
/// If the original is playing or paused the reversed copy waits for it to
/// finish; otherwise it plays right away. `completion` receives the reversed
/// copy when it finishes.
pub struct ReverseCoordinator {
    original: Timeline,
    reversed: Timeline,
    waiting: Option<ObserverId>,
}

impl ReverseCoordinator {
    /// Derive the reversed copy of `original` and schedule it
    pub fn new(original: &Timeline, completion: impl Fn(&Timeline) + 'static) -> Result<Self> {
        let reversed = original.reversed()?;
        {
            let handle = reversed.downgrade();
            reversed.observe(move |change| {
                if change == PropertyChange::Finished(true) {
                    if let Some(timeline) = handle.upgrade() {
                        completion(&timeline);
                    }
                }
            });
        }

        let in_flight = matches!(
            original.state(),
            TimelineState::Playing | TimelineState::Paused
        );
        let waiting = if in_flight {
            tracing::debug!(original = ?original.id(), "Reverse waits for the original to finish");
            let handle = reversed.downgrade();
            let fired = Cell::new(false);
            Some(original.observe(move |change| {
                if change != PropertyChange::Finished(true) || fired.replace(true) {
                    return;
                }
                if let Some(timeline) = handle.upgrade() {
                    if let Err(error) = timeline.play() {
                        timeline.context().report(&error);
                    }
                }
            }))
        } else {
            reversed.play()?;
            None
        };

        Ok(Self {
            original: original.clone(),
            reversed,
            waiting,
        })
    }

    /// The reversed copy
    pub fn timeline(&self) -> &Timeline {
        &self.reversed
    }

    /// The timeline being reversed
    pub fn original(&self) -> &Timeline {
        &self.original
    }

    /// Whether the reversed copy is still waiting for the original
    pub fn is_waiting(&self) -> bool {
        self.waiting.is_some() && self.reversed.state() == TimelineState::Idle
    }
}

impl Drop for ReverseCoordinator {
    fn drop(&mut self) {
        if let Some(id) = self.waiting.take() {
            self.original.remove_observer(id);
        }
    }
}

impl std::fmt::Debug for ReverseCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverseCoordinator")
            .field("original", &self.original)
            .field("reversed", &self.reversed)
            .field("waiting", &self.waiting.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{AnimationTarget, PropertyTarget};
    use crate::testing::{fade, harness};
    use std::rc::Rc;

    #[test]
    fn test_idle_original_plays_reversed_now() {
        let (clock, context) = harness();
        let concrete = Rc::new(PropertyTarget::new("box"));
        let target: Rc<dyn AnimationTarget> = concrete.clone();
        let original = Timeline::new(&context);
        original.add_animation(&target, fade(1.0)).unwrap();

        let done = Rc::new(Cell::new(0));
        let coordinator = {
            let done = done.clone();
            ReverseCoordinator::new(&original, move |timeline| {
                assert!(timeline.is_reversed());
                done.set(done.get() + 1);
            })
            .unwrap()
        };
        assert!(coordinator.timeline().is_playing());
        assert!(!coordinator.is_waiting());
        assert!(coordinator
            .timeline()
            .originate()
            .is_some_and(|o| o.ptr_eq(coordinator.original())));

        clock.run_for(1.2);
        assert_eq!(done.get(), 1);
        assert_eq!(
            concrete.value(&"opacity".into()).and_then(|v| v.as_float()),
            Some(0.0)
        );
    }

    #[test]
    fn test_waits_for_playing_original() {
        let (clock, context) = harness();
        let target: Rc<dyn AnimationTarget> = Rc::new(PropertyTarget::new("box"));
        let original = Timeline::new(&context);
        original.add_animation(&target, fade(1.0)).unwrap();
        original.play().unwrap();
        clock.run_for(0.5);

        let done = Rc::new(Cell::new(false));
        let coordinator = {
            let done = done.clone();
            ReverseCoordinator::new(&original, move |_| done.set(true)).unwrap()
        };
        assert!(coordinator.is_waiting());

        clock.run_for(0.6);
        assert!(original.has_finished());
        assert!(coordinator.timeline().is_playing());
        assert!(!done.get());

        clock.run_for(1.1);
        assert!(done.get());
        assert!(coordinator.timeline().has_finished());

        // a later replay of the original does not replay the copy
        original.replay().unwrap();
        clock.run_for(1.1);
        assert!(coordinator.timeline().has_finished());
    }
}
