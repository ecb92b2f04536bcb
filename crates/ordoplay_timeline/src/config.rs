// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline configuration and the shared playback context.

use crate::clock::ClockDriver;
use crate::error::{ErrorMode, ErrorSink, Result, TracingErrorSink, TimelineError};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// How failed operations surface
    pub error_mode: ErrorMode,
    /// Tick rate requested from clock drivers built from this config
    pub preferred_frames_per_second: u32,
    /// Initial mute state of associated audio
    pub mute_audio: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Propagate,
            preferred_frames_per_second: 60,
            mute_audio: false,
        }
    }
}

/// Clock, configuration and error sink shared by related timelines
#[derive(Clone)]
pub struct TimelineContext {
    clock: Rc<dyn ClockDriver>,
    config: TimelineConfig,
    sink: Rc<dyn ErrorSink>,
}

impl TimelineContext {
    /// Create a context with the default configuration
    pub fn new(clock: Rc<dyn ClockDriver>) -> Self {
        Self::with_config(clock, TimelineConfig::default())
    }

    /// Create a context with a custom configuration
    pub fn with_config(clock: Rc<dyn ClockDriver>, config: TimelineConfig) -> Self {
        Self {
            clock,
            config,
            sink: Rc::new(TracingErrorSink),
        }
    }

    /// Replace the error sink used in [`ErrorMode::Report`]
    pub fn with_sink(mut self, sink: Rc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Get the clock driver
    pub fn clock(&self) -> &Rc<dyn ClockDriver> {
        &self.clock
    }

    /// Get the configuration
    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Current clock time
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Apply the error mode to the outcome of an operation
    pub(crate) fn settle<T: Default>(&self, result: Result<T>) -> Result<T> {
        match (result, self.config.error_mode) {
            (Err(error), ErrorMode::Report) => {
                self.sink.report(&error);
                Ok(T::default())
            }
            (result, _) => result,
        }
    }

    /// Report an error that has no caller to return to
    pub(crate) fn report(&self, error: &TimelineError) {
        self.sink.report(error);
    }
}

impl std::fmt::Debug for TimelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
