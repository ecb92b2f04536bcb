// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation targets.
//!
//! Timelines never own the objects they animate. Entities hold a weak
//! reference to an [`AnimationTarget`] and write interpolated values through it.

use crate::animation::PropertyKey;
use crate::value::PropertyValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use uuid::Uuid;

/// Stable identity of an animation target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub Uuid);

impl TargetId {
    /// Create a new random target ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Targets already paused or resumed during one cascade
pub type TargetSet = HashSet<TargetId>;

/// An object whose properties can be animated
pub trait AnimationTarget {
    /// Stable identity, used for conflict detection
    fn id(&self) -> TargetId;

    /// Current value of a property, if the target has one
    fn value(&self, key: &PropertyKey) -> Option<PropertyValue>;

    /// Write a property value
    fn apply(&self, key: &PropertyKey, value: PropertyValue);

    /// Whether the target is attached to a renderable hierarchy
    fn is_in_hierarchy(&self) -> bool {
        true
    }

    /// Called once per pause cascade
    fn pause(&self) {}

    /// Called once per resume cascade
    fn resume(&self) {}
}

/// In-memory target backed by a property map
#[derive(Debug)]
pub struct PropertyTarget {
    id: TargetId,
    name: String,
    values: RefCell<IndexMap<PropertyKey, PropertyValue>>,
    attached: Cell<bool>,
    pauses: Cell<u32>,
    resumes: Cell<u32>,
}

impl PropertyTarget {
    /// Create a target with no properties
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TargetId::new(),
            name: name.into(),
            values: RefCell::new(IndexMap::new()),
            attached: Cell::new(true),
            pauses: Cell::new(0),
            resumes: Cell::new(0),
        }
    }

    /// Set an initial property value
    pub fn with_value(self, key: impl Into<PropertyKey>, value: PropertyValue) -> Self {
        self.values.borrow_mut().insert(key.into(), value);
        self
    }

    /// Get the target name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach or detach the target from its hierarchy
    pub fn set_attached(&self, attached: bool) {
        self.attached.set(attached);
    }

    /// Snapshot of all property values
    pub fn values(&self) -> Vec<(PropertyKey, PropertyValue)> {
        self.values
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), *value))
            .collect()
    }

    /// Number of pause calls received
    pub fn pause_count(&self) -> u32 {
        self.pauses.get()
    }

    /// Number of resume calls received
    pub fn resume_count(&self) -> u32 {
        self.resumes.get()
    }
}

impl AnimationTarget for PropertyTarget {
    fn id(&self) -> TargetId {
        self.id
    }

    fn value(&self, key: &PropertyKey) -> Option<PropertyValue> {
        self.values.borrow().get(key).copied()
    }

    fn apply(&self, key: &PropertyKey, value: PropertyValue) {
        self.values.borrow_mut().insert(key.clone(), value);
    }

    fn is_in_hierarchy(&self) -> bool {
        self.attached.get()
    }

    fn pause(&self) {
        self.pauses.set(self.pauses.get() + 1);
    }

    fn resume(&self) {
        self.resumes.set(self.resumes.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_target() {
        let target = PropertyTarget::new("box").with_value("opacity", PropertyValue::Float(0.5));
        let key = PropertyKey::from("opacity");
        assert_eq!(target.value(&key), Some(PropertyValue::Float(0.5)));

        target.apply(&key, PropertyValue::Float(1.0));
        assert_eq!(target.value(&key), Some(PropertyValue::Float(1.0)));
        assert_eq!(target.values().len(), 1);

        assert!(target.is_in_hierarchy());
        target.set_attached(false);
        assert!(!target.is_in_hierarchy());
    }
}
