// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observation of timeline properties.

use crate::callback::Deferred;
use indexmap::IndexMap;
use std::rc::Rc;
use uuid::Uuid;

/// Handle of a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub Uuid);

impl ObserverId {
    /// Create a new random observer ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

/// A change of an observable timeline property
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyChange {
    /// Progress of the current iteration
    Progress(f32),
    /// Paused flag
    Paused(bool),
    /// Started flag
    Started(bool),
    /// Finished flag
    Finished(bool),
}

/// Observer callback
pub type ObserverCallback = Rc<dyn Fn(PropertyChange)>;

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: IndexMap<ObserverId, ObserverCallback>,
}

impl ObserverRegistry {
    pub fn add(&mut self, callback: ObserverCallback) -> ObserverId {
        let id = ObserverId::new();
        self.observers.insert(id, callback);
        id
    }

    pub fn remove(&mut self, id: ObserverId) -> bool {
        self.observers.shift_remove(&id).is_some()
    }

    /// Queue `change` for every observer
    pub fn publish(&self, change: PropertyChange, deferred: &mut Deferred) {
        for observer in self.observers.values() {
            let observer = Rc::clone(observer);
            deferred.push(move || observer(change));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_publish_and_remove() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ObserverRegistry::default();
        let id = {
            let seen = seen.clone();
            registry.add(Rc::new(move |change| seen.borrow_mut().push(change)))
        };

        let mut deferred = Deferred::new();
        registry.publish(PropertyChange::Paused(true), &mut deferred);
        deferred.run();
        assert_eq!(*seen.borrow(), vec![PropertyChange::Paused(true)]);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        let mut deferred = Deferred::new();
        registry.publish(PropertyChange::Paused(false), &mut deferred);
        deferred.run();
        assert_eq!(seen.borrow().len(), 1);
    }
}
