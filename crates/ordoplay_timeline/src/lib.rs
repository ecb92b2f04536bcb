// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative animation timelines for OrdoPlay.
//!
//! This crate schedules property animations and drives them as one unit:
//! - Conflict-checked placement of animations on targets
//! - Play, pause, resume, speed, repeat and clear
//! - Time and progress notifications
//! - Audio associated with timeline anchors
//! - Groups of timelines played together or in sequence
//! - Reversed, rescaled and delayed copies
//!
//! ## Architecture
//!
//! Timelines are built on:
//! - A [`ClockDriver`] that ticks root timelines
//! - [`Entity`] values binding one [`AnimationSpec`] to one [`AnimationTarget`]
//! - [`TimingCurve`] easing and [`PropertyValue`] interpolation
//! - A [`TimelineContext`] carrying the clock, configuration and error sink
//!
//! Everything is single-threaded. Callbacks run after timeline state is
//! released, so they may control the timeline that called them.

pub mod animation;
pub mod audio;
pub mod callback;
pub mod clock;
pub mod config;
pub mod easing;
pub mod entity;
pub mod error;
pub mod group;
pub mod notify;
pub mod observe;
pub mod reverse;
pub mod target;
pub mod timeline;
pub mod value;

mod playback;
mod transform;

#[cfg(test)]
mod testing;

pub use animation::{AnimationKind, AnimationSpec, PropertyKey, ResolvedPath};
pub use audio::{AudioAnchor, TimelineAudio};
pub use callback::{
    CompletionCallback, NotifyCallback, RepeatCompletionCallback, RepeatStartCallback,
    StartCallback,
};
pub use clock::{ClockDriver, ManualClock, SubscriptionId, TickCallback};
pub use config::{TimelineConfig, TimelineContext};
pub use easing::TimingCurve;
pub use entity::{AnimationDescription, Entity, EntityId};
pub use error::{ErrorMode, ErrorSink, Result, TimelineError, TracingErrorSink};
pub use group::{GroupEntity, GroupTimeline};
pub use notify::TimeKey;
pub use observe::{ObserverCallback, ObserverId, PropertyChange};
pub use reverse::ReverseCoordinator;
pub use target::{AnimationTarget, PropertyTarget, TargetId, TargetSet};
pub use timeline::{RepeatCount, Timeline, TimelineId, TimelineState, WeakTimeline};
pub use value::{Interpolation, PropertyValue};
