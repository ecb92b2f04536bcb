// SPDX-License-Identifier: MIT OR Apache-2.0
//! Time and progress notifications.
//!
//! Time notifications are keyed by millisecond so that callbacks registered
//! for "the same" time share one slot and fire in registration order.

use crate::callback::{Deferred, NotifyCallback};
use std::collections::BTreeMap;

/// Time rounded to whole milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeKey(pub u64);

impl TimeKey {
    /// Round a time in seconds to the nearest millisecond
    pub fn from_seconds(seconds: f64) -> Self {
        Self((seconds.max(0.0) * 1000.0).round() as u64)
    }

    /// Last key whose time has been reached at `seconds`
    pub fn reached_at(seconds: f64) -> Self {
        // tolerate accumulated float error just below a whole millisecond
        Self((seconds.max(0.0) * 1000.0 + 1e-6).floor() as u64)
    }

    /// Time in seconds
    pub fn seconds(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

#[derive(Clone)]
struct Notification {
    callback: NotifyCallback,
    fired: bool,
}

impl Notification {
    fn new(callback: NotifyCallback) -> Self {
        Self {
            callback,
            fired: false,
        }
    }
}

#[derive(Clone)]
struct ProgressNotification {
    progress: f32,
    notification: Notification,
}

/// One-shot callbacks keyed by time or progress
#[derive(Clone, Default)]
pub(crate) struct NotificationRegistry {
    times: BTreeMap<TimeKey, Vec<Notification>>,
    progress: Vec<ProgressNotification>,
}

impl NotificationRegistry {
    pub fn add_time(&mut self, time: f64, callback: NotifyCallback) {
        self.times
            .entry(TimeKey::from_seconds(time))
            .or_default()
            .push(Notification::new(callback));
    }

    pub fn add_progress(&mut self, progress: f32, callback: NotifyCallback) {
        self.progress.push(ProgressNotification {
            progress,
            notification: Notification::new(callback),
        });
    }

    pub fn time_count(&self) -> usize {
        self.times.values().map(Vec::len).sum()
    }

    pub fn progress_count(&self) -> usize {
        self.progress.len()
    }

    /// Queue unfired time notifications at or before `time`
    pub fn fire_times(&mut self, time: f64, deferred: &mut Deferred) {
        let limit = TimeKey::reached_at(time);
        for entries in self.times.range_mut(..=limit).map(|(_, v)| v) {
            for entry in entries.iter_mut().filter(|e| !e.fired) {
                entry.fired = true;
                deferred.notify(&entry.callback);
            }
        }
    }

    /// Queue every unfired time notification
    pub fn fire_remaining_times(&mut self, deferred: &mut Deferred) {
        for entry in self.times.values_mut().flatten().filter(|e| !e.fired) {
            entry.fired = true;
            deferred.notify(&entry.callback);
        }
    }

    /// Queue unfired progress notifications at or below `progress`
    pub fn fire_progress(&mut self, progress: f32, deferred: &mut Deferred) {
        for entry in self.progress.iter_mut() {
            if !entry.notification.fired && entry.progress <= progress {
                entry.notification.fired = true;
                deferred.notify(&entry.notification.callback);
            }
        }
    }

    /// Mark notifications strictly before `time` / `progress` as fired
    pub fn skip_before(&mut self, time: f64, progress: f32) {
        let limit = TimeKey::from_seconds(time);
        for entry in self.times.range_mut(..limit).flat_map(|(_, v)| v.iter_mut()) {
            entry.fired = true;
        }
        for entry in self.progress.iter_mut().filter(|e| e.progress < progress) {
            entry.notification.fired = true;
        }
    }

    pub fn rearm(&mut self) {
        for entry in self.times.values_mut().flatten() {
            entry.fired = false;
        }
        for entry in &mut self.progress {
            entry.notification.fired = false;
        }
    }

    pub fn clear(&mut self) {
        self.times.clear();
        self.progress.clear();
    }

    /// Copy with times mapped through `map_time` and progress values through
    /// `map_progress`, unfired
    pub fn mapped(
        &self,
        map_time: impl Fn(f64) -> f64,
        map_progress: impl Fn(f32) -> f32,
    ) -> Self {
        let mut copy = Self::default();
        for (key, entries) in &self.times {
            for entry in entries {
                copy.add_time(map_time(key.seconds()), entry.callback.clone());
            }
        }
        for entry in &self.progress {
            copy.add_progress(
                map_progress(entry.progress),
                entry.notification.callback.clone(),
            );
        }
        copy
    }

    /// Times of all registered time notifications, ascending
    pub fn times(&self) -> Vec<f64> {
        self.times.keys().map(|key| key.seconds()).collect()
    }
}
