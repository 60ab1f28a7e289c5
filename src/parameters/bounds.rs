//! Parameter bounds.
//!
//! Bounds are a closed interval a parameter value must stay inside. They are
//! never enforced by clamping: assigning a value outside the interval is a
//! caller error and surfaces as `OutOfBounds`.

use serde::{Deserialize, Serialize};

use crate::error::{FuncOptError, Result};

/// The bounds constraint on a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter.
    pub min: f64,

    /// Maximum allowed value for the parameter.
    pub max: f64,
}

impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Bounds", 2)?;

        // Infinite bounds map to null so the JSON form stays portable.
        if self.min.is_infinite() && self.min.is_sign_negative() {
            state.serialize_field("min", &Option::<f64>::None)?;
        } else {
            state.serialize_field("min", &self.min)?;
        }

        if self.max.is_infinite() && self.max.is_sign_positive() {
            state.serialize_field("max", &Option::<f64>::None)?;
        } else {
            state.serialize_field("max", &self.max)?;
        }

        state.end()
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BoundsHelper {
            #[serde(default)]
            min: Option<f64>,

            #[serde(default)]
            max: Option<f64>,
        }

        let helper = BoundsHelper::deserialize(deserializer)?;

        Ok(Bounds {
            min: helper.min.unwrap_or(f64::NEG_INFINITY),
            max: helper.max.unwrap_or(f64::INFINITY),
        })
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }
}

impl Bounds {
    /// Create a new bounds constraint, failing with `InvalidBounds` if
    /// `min > max`.
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if min > max {
            return Err(FuncOptError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    /// An unbounded constraint (negative infinity to positive infinity).
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Whether a value lies inside the bounds. NaN never does.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp a value into the bounds.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}
