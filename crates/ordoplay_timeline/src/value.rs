// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animatable property values and interpolation.

use serde::{Deserialize, Serialize};

/// Value of an animatable property
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Float value (opacity, rotation, corner radius, ...)
    Float(f32),
    /// 2D vector (position, anchor point, size)
    Vec2([f32; 2]),
    /// 3D vector
    Vec3([f32; 3]),
    /// 4D vector / quaternion
    Vec4([f32; 4]),
    /// Color (RGBA)
    Color([f32; 4]),
    /// Boolean (hidden, masks to bounds)
    Bool(bool),
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Interpolate Vec2
    pub fn lerp_vec2(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
        [Self::lerp(a[0], b[0], t), Self::lerp(a[1], b[1], t)]
    }

    /// Interpolate Vec3
    pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
        [
            Self::lerp(a[0], b[0], t),
            Self::lerp(a[1], b[1], t),
            Self::lerp(a[2], b[2], t),
        ]
    }

    /// Interpolate Vec4
    pub fn lerp_vec4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
        [
            Self::lerp(a[0], b[0], t),
            Self::lerp(a[1], b[1], t),
            Self::lerp(a[2], b[2], t),
            Self::lerp(a[3], b[3], t),
        ]
    }
}

impl PropertyValue {
    /// Interpolate towards `other`. `t` may leave `[0, 1]` for overshooting curves.
    ///
    /// Returns `None` when the two values have different kinds.
    pub fn interpolate(&self, other: &PropertyValue, t: f32) -> Option<PropertyValue> {
        match (self, other) {
            (PropertyValue::Float(a), PropertyValue::Float(b)) => {
                Some(PropertyValue::Float(Interpolation::lerp(*a, *b, t)))
            }
            (PropertyValue::Vec2(a), PropertyValue::Vec2(b)) => {
                Some(PropertyValue::Vec2(Interpolation::lerp_vec2(*a, *b, t)))
            }
            (PropertyValue::Vec3(a), PropertyValue::Vec3(b)) => {
                Some(PropertyValue::Vec3(Interpolation::lerp_vec3(*a, *b, t)))
            }
            (PropertyValue::Vec4(a), PropertyValue::Vec4(b)) => {
                Some(PropertyValue::Vec4(Interpolation::lerp_vec4(*a, *b, t)))
            }
            (PropertyValue::Color(a), PropertyValue::Color(b)) => {
                Some(PropertyValue::Color(Interpolation::lerp_vec4(*a, *b, t)))
            }
            // Booleans flip at the end of the span
            (PropertyValue::Bool(a), PropertyValue::Bool(b)) => {
                Some(PropertyValue::Bool(if t >= 1.0 { *b } else { *a }))
            }
            _ => None,
        }
    }

    /// Component-wise sum, used to resolve `by` offsets
    pub fn offset_by(&self, by: &PropertyValue) -> Option<PropertyValue> {
        match (self, by) {
            (PropertyValue::Float(a), PropertyValue::Float(b)) => Some(PropertyValue::Float(a + b)),
            (PropertyValue::Vec2(a), PropertyValue::Vec2(b)) => {
                Some(PropertyValue::Vec2([a[0] + b[0], a[1] + b[1]]))
            }
            (PropertyValue::Vec3(a), PropertyValue::Vec3(b)) => {
                Some(PropertyValue::Vec3([a[0] + b[0], a[1] + b[1], a[2] + b[2]]))
            }
            (PropertyValue::Vec4(a), PropertyValue::Vec4(b)) => Some(PropertyValue::Vec4([
                a[0] + b[0],
                a[1] + b[1],
                a[2] + b[2],
                a[3] + b[3],
            ])),
            (PropertyValue::Color(a), PropertyValue::Color(b)) => Some(PropertyValue::Color([
                a[0] + b[0],
                a[1] + b[1],
                a[2] + b[2],
                a[3] + b[3],
            ])),
            (PropertyValue::Bool(_), PropertyValue::Bool(b)) => Some(PropertyValue::Bool(*b)),
            _ => None,
        }
    }

    /// Short kind name, for logs and summaries
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::Float(_) => "float",
            PropertyValue::Vec2(_) => "vec2",
            PropertyValue::Vec3(_) => "vec3",
            PropertyValue::Vec4(_) => "vec4",
            PropertyValue::Color(_) => "color",
            PropertyValue::Bool(_) => "bool",
        }
    }

    /// Get as float if possible
    pub fn as_float(&self) -> Option<f32> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as Vec2 if possible
    pub fn as_vec2(&self) -> Option<[f32; 2]> {
        match self {
            PropertyValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as color if possible
    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            PropertyValue::Color(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Float(v) => write!(f, "{v:.3}"),
            PropertyValue::Vec2(v) => write!(f, "({:.3}, {:.3})", v[0], v[1]),
            PropertyValue::Vec3(v) => write!(f, "({:.3}, {:.3}, {:.3})", v[0], v[1], v[2]),
            PropertyValue::Vec4(v) | PropertyValue::Color(v) => {
                write!(f, "({:.3}, {:.3}, {:.3}, {:.3})", v[0], v[1], v[2], v[3])
            }
            PropertyValue::Bool(v) => write!(f, "{v}"),
        }
    }
}
