//! Point values - the tagged representation of a driver data point.
//!
//! Drivers exchange heterogeneous point values (a temperature reading, a
//! status string, a run flag). At the wire boundary those are plain JSON
//! scalars; inside the crate they are a tagged variant with explicit
//! normalization rules instead of a dynamically typed value:
//!
//! - JSON booleans map to [`PointValue::Bool`]
//! - JSON integers map to [`PointValue::Int`] (`i64`)
//! - all other JSON numbers map to [`PointValue::Float`] (`f64`)
//! - JSON strings map to [`PointValue::Text`]

use serde::{Deserialize, Serialize};

/// A single point value read from or written to a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    /// Boolean point (e.g. a run flag).
    Bool(bool),
    /// Integer point, normalized to `i64`.
    Int(i64),
    /// Floating-point point, normalized to `f64`.
    Float(f64),
    /// Textual point (e.g. a status label).
    Text(String),
}

impl PointValue {
    /// Returns the boolean value, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PointValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an `Int`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PointValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the numeric value as `f64`, promoting integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PointValue::Int(i) => Some(*i as f64),
            PointValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the text value, if this is a `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PointValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for PointValue {
    fn from(value: bool) -> Self {
        PointValue::Bool(value)
    }
}

impl From<i64> for PointValue {
    fn from(value: i64) -> Self {
        PointValue::Int(value)
    }
}

impl From<f64> for PointValue {
    fn from(value: f64) -> Self {
        PointValue::Float(value)
    }
}

impl From<&str> for PointValue {
    fn from(value: &str) -> Self {
        PointValue::Text(value.to_string())
    }
}

impl From<String> for PointValue {
    fn from(value: String) -> Self {
        PointValue::Text(value)
    }
}
