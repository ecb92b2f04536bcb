// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame clock abstraction.

use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use uuid::Uuid;

/// Handle of a clock subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    /// Create a new random subscription ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Called on every tick with the current clock time in seconds
pub type TickCallback = Rc<dyn Fn(f64)>;

/// Source of periodic ticks driving root timelines
pub trait ClockDriver {
    /// Current time in seconds
    fn now(&self) -> f64;

    /// Register a tick callback
    fn subscribe(&self, on_tick: TickCallback) -> SubscriptionId;

    /// Remove a tick callback. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Tick rate the driver aims for
    fn preferred_frames_per_second(&self) -> u32 {
        60
    }
}

/// Deterministic clock advanced by hand
pub struct ManualClock {
    now: Cell<f64>,
    frames_per_second: u32,
    subscribers: RefCell<IndexMap<SubscriptionId, TickCallback>>,
}

impl ManualClock {
    /// Create a clock at time 0 ticking at 60 fps
    pub fn new() -> Self {
        Self::with_frames_per_second(60)
    }

    /// Create a clock with a custom tick rate
    pub fn with_frames_per_second(frames_per_second: u32) -> Self {
        Self {
            now: Cell::new(0.0),
            frames_per_second: frames_per_second.max(1),
            subscribers: RefCell::new(IndexMap::new()),
        }
    }

    /// Seconds between two ticks
    pub fn frame_interval(&self) -> f64 {
        1.0 / f64::from(self.frames_per_second)
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Move time forward by `delta` seconds and deliver one tick.
    ///
    /// Subscribers added during the tick are not called until the next one.
    /// Subscribers removed during the tick are skipped.
    pub fn advance(&self, delta: f64) {
        let now = self.now.get() + delta.max(0.0);
        self.now.set(now);

        let ids: Vec<SubscriptionId> = self.subscribers.borrow().keys().copied().collect();
        for id in ids {
            let callback = self.subscribers.borrow().get(&id).cloned();
            if let Some(callback) = callback {
                callback(now);
            }
        }
    }

    /// Tick at the frame interval for `duration` seconds
    pub fn run_for(&self, duration: f64) {
        let interval = self.frame_interval();
        let mut remaining = duration;
        while remaining > 1e-9 {
            let step = remaining.min(interval);
            self.advance(step);
            remaining -= step;
        }
    }

    /// Tick at the frame interval until nothing is subscribed or `limit`
    /// seconds have passed. Returns the simulated time spent.
    pub fn run_until_idle(&self, limit: f64) -> f64 {
        let interval = self.frame_interval();
        let start = self.now.get();
        while self.subscriber_count() > 0 && self.now.get() - start < limit {
            self.advance(interval);
        }
        self.now.get() - start
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockDriver for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn subscribe(&self, on_tick: TickCallback) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.subscribers.borrow_mut().insert(id, on_tick);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.borrow_mut().shift_remove(&id);
    }

    fn preferred_frames_per_second(&self) -> u32 {
        self.frames_per_second
    }
}
