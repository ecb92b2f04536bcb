// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline errors and the error reporting policy.

use crate::entity::EntityId;
use crate::timeline::TimelineId;
use serde::{Deserialize, Serialize};

/// Errors raised by timeline population and control
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    /// Structural mutation after the timeline left the idle state
    #[error("Timeline {timeline:?} is immutable: {reason}")]
    ImmutableTimeline {
        /// The timeline that rejected the call
        timeline: TimelineId,
        /// What was attempted
        reason: String,
    },

    /// Notification or audio association on a timeline with no entities
    #[error("Timeline {0:?} is empty")]
    EmptyTimeline(TimelineId),

    /// Play requested on a cleared timeline
    #[error("Timeline {0:?} was cleared and cannot be played")]
    ClearedTimeline(TimelineId),

    /// Play requested on a timeline that is already playing or paused
    #[error("Timeline {0:?} is already ongoing")]
    OngoingTimeline(TimelineId),

    /// Time notification outside `[0, end_time)`
    #[error("Notification time {time} is outside [0, {end_time})")]
    TimeNotificationOutOfBounds {
        /// Requested time
        time: f64,
        /// End time of the timeline
        end_time: f64,
    },

    /// Two entities animate the same target property over overlapping intervals
    #[error("Animation on '{key}' [{begin}, {end}) conflicts with entity {existing:?}")]
    ConflictingAnimations {
        /// Property key of both entities
        key: String,
        /// Begin time of the rejected entity
        begin: f64,
        /// End time of the rejected entity
        end: f64,
        /// The entity already in the timeline
        existing: EntityId,
    },

    /// Callback vector length differs from the animation count
    #[error("Expected {expected} callbacks, got {actual}")]
    InvalidNumberOfBlocks {
        /// Number of animations
        expected: usize,
        /// Number of callbacks provided
        actual: usize,
    },

    /// Raw per-target animation call on a group timeline
    #[error("Unsupported on group timelines: {0}")]
    UnsupportedMessage(String),

    /// A target is gone or not attached to a renderable hierarchy
    #[error("Targets not in hierarchy: {0}")]
    ElementsNotInHierarchy(String),

    /// Invalid argument value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl TimelineError {
    /// Short kind name, stable across messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ImmutableTimeline { .. } => "ImmutableTimeline",
            Self::EmptyTimeline(_) => "EmptyTimeline",
            Self::ClearedTimeline(_) => "ClearedTimeline",
            Self::OngoingTimeline(_) => "OngoingTimeline",
            Self::TimeNotificationOutOfBounds { .. } => "TimeNotificationOutOfBounds",
            Self::ConflictingAnimations { .. } => "ConflictingAnimations",
            Self::InvalidNumberOfBlocks { .. } => "InvalidNumberOfBlocks",
            Self::UnsupportedMessage(_) => "UnsupportedMessage",
            Self::ElementsNotInHierarchy(_) => "ElementsNotInHierarchy",
            Self::InvalidArgument(_) => "InvalidArgument",
        }
    }
}

/// Result type for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;

/// How failed operations surface to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorMode {
    /// Return the error from the failing call
    #[default]
    Propagate,
    /// Hand the error to the context's sink, skip the operation and return `Ok`
    Report,
}

/// Receiver of structured errors in [`ErrorMode::Report`]
pub trait ErrorSink {
    /// Called once per failed operation
    fn report(&self, error: &TimelineError);
}

/// Sink that logs through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, error: &TimelineError) {
        tracing::error!(kind = error.kind(), "{}", error);
    }
}

/// Check that a time or duration is finite and non-negative
pub(crate) fn check_time(what: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TimelineError::InvalidArgument(format!(
            "{what} must be finite and >= 0, got {value}"
        )))
    }
}
