// SPDX-License-Identifier: MIT OR Apache-2.0
//! Callback types and deferred invocation.
//!
//! Timelines never call user code while their state is borrowed. Calls are
//! queued in a [`Deferred`] during a step and run once the borrow is released,
//! so a callback may freely re-enter the timeline that invoked it.

use std::rc::Rc;

/// Called when a timeline or entity starts
pub type StartCallback = Rc<dyn Fn()>;

/// Called with `true` on natural completion, `false` when interrupted
pub type CompletionCallback = Rc<dyn Fn(bool)>;

/// Called by time and progress notifications
pub type NotifyCallback = Rc<dyn Fn()>;

/// Called with the iteration index when an iteration begins
pub type RepeatStartCallback = Rc<dyn Fn(u64)>;

/// Called after each iteration with `(result, iteration, stop)`.
///
/// Setting `stop` to `true` finishes the timeline after the current iteration.
pub type RepeatCompletionCallback = Rc<dyn Fn(bool, u64, &mut bool)>;

/// Queue of calls collected while timeline state is borrowed
#[derive(Default)]
pub(crate) struct Deferred {
    calls: Vec<Box<dyn FnOnce()>>,
}

impl Deferred {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an arbitrary call
    pub fn push(&mut self, call: impl FnOnce() + 'static) {
        self.calls.push(Box::new(call));
    }

    /// Queue a start callback
    pub fn start(&mut self, callback: &StartCallback) {
        let callback = Rc::clone(callback);
        self.push(move || callback());
    }

    /// Queue a completion callback
    pub fn complete(&mut self, callback: &CompletionCallback, finished: bool) {
        let callback = Rc::clone(callback);
        self.push(move || callback(finished));
    }

    /// Queue a notification
    pub fn notify(&mut self, callback: &NotifyCallback) {
        let callback = Rc::clone(callback);
        self.push(move || callback());
    }

    /// Run every queued call in order
    pub fn run(self) {
        for call in self.calls {
            call();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_deferred_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut deferred = Deferred::new();

        let on_start: StartCallback = {
            let log = log.clone();
            Rc::new(move || log.borrow_mut().push("start".to_string()))
        };
        let on_complete: CompletionCallback = {
            let log = log.clone();
            Rc::new(move |finished| log.borrow_mut().push(format!("complete {finished}")))
        };

        deferred.start(&on_start);
        deferred.complete(&on_complete, true);
        assert!(log.borrow().is_empty());

        deferred.run();
        assert_eq!(*log.borrow(), vec!["start", "complete true"]);
    }
}
