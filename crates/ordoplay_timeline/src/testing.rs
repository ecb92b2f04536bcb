// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared fixtures for unit tests.

use crate::animation::AnimationSpec;
use crate::audio::TimelineAudio;
use crate::clock::ManualClock;
use crate::config::TimelineContext;
use crate::easing::TimingCurve;
use crate::error::{ErrorSink, TimelineError};
use crate::value::PropertyValue;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Ordered record of callback invocations
pub type Log = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn push(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

/// A 60 fps manual clock and a default context driven by it
pub fn harness() -> (Rc<ManualClock>, TimelineContext) {
    let clock = Rc::new(ManualClock::new());
    let context = TimelineContext::new(clock.clone());
    (clock, context)
}

/// Linear opacity animation from 0 to 1
pub fn fade(duration: f64) -> AnimationSpec {
    AnimationSpec::basic(
        "opacity",
        PropertyValue::Float(0.0),
        PropertyValue::Float(1.0),
        duration,
    )
    .with_curve(TimingCurve::Linear)
}

/// Audio that counts play and stop calls
pub struct MockAudio {
    duration: f64,
    plays: Cell<u32>,
    stops: Cell<u32>,
}

impl MockAudio {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            plays: Cell::new(0),
            stops: Cell::new(0),
        }
    }

    pub fn plays(&self) -> u32 {
        self.plays.get()
    }

    pub fn stops(&self) -> u32 {
        self.stops.get()
    }
}

impl TimelineAudio for MockAudio {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn play(&self) {
        self.plays.set(self.plays.get() + 1);
    }

    fn stop(&self, _fade_out: bool) {
        self.stops.set(self.stops.get() + 1);
    }
}

/// Sink keeping every reported error
#[derive(Default)]
pub struct RecordingSink {
    errors: RefCell<Vec<TimelineError>>,
}

impl RecordingSink {
    pub fn errors(&self) -> Vec<TimelineError> {
        self.errors.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.errors.borrow().iter().map(TimelineError::kind).collect()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: &TimelineError) {
        self.errors.borrow_mut().push(error.clone());
    }
}
