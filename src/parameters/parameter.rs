//! Parameter definition and implementation.
//!
//! A `Parameter` is a named scalar with a free/fixed flag, bounds, and a
//! multiplicative scale factor. The stored `value` is the optimizer-space
//! value; the externally meaningful quantity is `true_value = value * scale`.
//! The scale exists so that all free parameters presented to an external
//! engine have comparable magnitude.

use serde::{Deserialize, Serialize};

use crate::error::{FuncOptError, Result};
use crate::parameters::bounds::Bounds;

/// A named, bounded, optionally-fixed scalar parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    value: f64,
    scale: f64,
    free: bool,
    bounds: Bounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stderr: Option<f64>,
}

impl Parameter {
    /// Create an unbounded parameter with unit scale.
    pub fn new(name: &str, value: f64, free: bool) -> Self {
        Self {
            name: name.to_string(),
            value,
            scale: 1.0,
            free,
            bounds: Bounds::default(),
            stderr: None,
        }
    }

    /// Create a parameter with bounds.
    ///
    /// Fails with `InvalidBounds` if `min > max`, or with `OutOfBounds` if the
    /// initial value lies outside the interval.
    pub fn with_bounds(name: &str, value: f64, free: bool, min: f64, max: f64) -> Result<Self> {
        let bounds = Bounds::new(min, max)?;
        if !bounds.contains(value) {
            return Err(FuncOptError::OutOfBounds { value, min, max });
        }
        Ok(Self {
            name: name.to_string(),
            value,
            scale: 1.0,
            free,
            bounds,
            stderr: None,
        })
    }

    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value in optimizer-space units.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the optimizer-space value.
    ///
    /// Fails with `OutOfBounds` (carrying the value and both bounds) and
    /// leaves the stored value unchanged; values are never clamped.
    pub fn set_value(&mut self, value: f64) -> Result<()> {
        if !self.bounds.contains(value) {
            return Err(FuncOptError::OutOfBounds {
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }
        self.value = value;
        Ok(())
    }

    /// The externally meaningful value, `value * scale`.
    pub fn true_value(&self) -> f64 {
        self.value * self.scale
    }

    /// Set the externally meaningful value; the stored optimizer-space value
    /// becomes `true_value / scale` and is bounds-checked.
    pub fn set_true_value(&mut self, true_value: f64) -> Result<()> {
        self.set_value(true_value / self.scale)
    }

    /// The scale factor.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Set the scale factor; zero is rejected since it would make the
    /// true-value mapping singular.
    pub fn set_scale(&mut self, scale: f64) -> Result<()> {
        if scale == 0.0 {
            return Err(FuncOptError::InvalidScale(scale));
        }
        self.scale = scale;
        Ok(())
    }

    /// Whether the parameter is eligible for adjustment by an optimizer.
    pub fn is_free(&self) -> bool {
        self.free
    }

    /// Set the free/fixed flag. The free-parameter count seen by an engine
    /// must stay constant for the engine's lifetime, so this is only safe
    /// between minimization runs.
    pub fn set_free(&mut self, free: bool) {
        self.free = free;
    }

    /// The `(lower, upper)` bounds pair.
    pub fn bounds(&self) -> (f64, f64) {
        (self.bounds.min, self.bounds.max)
    }

    /// Replace the bounds.
    ///
    /// Fails with `InvalidBounds` if `min > max`, or with `OutOfBounds` if the
    /// current value falls outside the new interval; either way nothing
    /// changes.
    pub fn set_bounds(&mut self, min: f64, max: f64) -> Result<()> {
        let bounds = Bounds::new(min, max)?;
        if !bounds.contains(self.value) {
            return Err(FuncOptError::OutOfBounds {
                value: self.value,
                min,
                max,
            });
        }
        self.bounds = bounds;
        Ok(())
    }

    /// Uncertainty estimate from the last converged run, if any.
    pub fn stderr(&self) -> Option<f64> {
        self.stderr
    }

    /// Record or clear the uncertainty estimate.
    pub fn set_stderr(&mut self, stderr: Option<f64>) {
        self.stderr = stderr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_creation() {
        let param = Parameter::new("Prefactor", 10.0, true);
        assert_eq!(param.name(), "Prefactor");
        assert_eq!(param.value(), 10.0);
        assert_eq!(param.scale(), 1.0);
        assert!(param.is_free());
        assert_eq!(param.bounds(), (f64::NEG_INFINITY, f64::INFINITY));
        assert!(param.stderr().is_none());

        let param = Parameter::with_bounds("Index", -2.1, true, -5.0, -1.0).unwrap();
        assert_eq!(param.value(), -2.1);
        assert_eq!(param.bounds(), (-5.0, -1.0));

        // Initial value outside the interval is rejected, not clamped.
        let err = Parameter::with_bounds("Index", 0.0, true, -5.0, -1.0).unwrap_err();
        assert_eq!(
            err,
            FuncOptError::OutOfBounds {
                value: 0.0,
                min: -5.0,
                max: -1.0
            }
        );
    }

    #[test]
    fn test_set_value_bounds() {
        let mut param = Parameter::with_bounds("x", 0.5, true, 0.0, 1.0).unwrap();

        param.set_value(0.75).unwrap();
        assert_eq!(param.value(), 0.75);

        let err = param.set_value(2.0).unwrap_err();
        assert_eq!(
            err,
            FuncOptError::OutOfBounds {
                value: 2.0,
                min: 0.0,
                max: 1.0
            }
        );
        // Stored value unchanged after the failed call.
        assert_eq!(param.value(), 0.75);
    }

    #[test]
    fn test_true_value_and_scale() {
        let mut param = Parameter::new("Prefactor", 2.0, true);
        param.set_scale(1e-9).unwrap();
        assert_eq!(param.true_value(), 2.0e-9);

        param.set_true_value(3.0e-9).unwrap();
        assert!((param.value() - 3.0).abs() < 1e-12);

        let err = param.set_scale(0.0).unwrap_err();
        assert_eq!(err, FuncOptError::InvalidScale(0.0));
        assert_eq!(param.scale(), 1e-9);
    }

    #[test]
    fn test_set_bounds() {
        let mut param = Parameter::new("x", 5.0, true);

        param.set_bounds(0.0, 10.0).unwrap();
        assert_eq!(param.bounds(), (0.0, 10.0));

        // min > max
        assert!(param.set_bounds(10.0, 0.0).is_err());
        assert_eq!(param.bounds(), (0.0, 10.0));

        // Current value outside the new interval.
        let err = param.set_bounds(6.0, 10.0).unwrap_err();
        assert!(matches!(err, FuncOptError::OutOfBounds { value, .. } if value == 5.0));
        assert_eq!(param.bounds(), (0.0, 10.0));
    }

    #[test]
    fn test_stderr() {
        let mut param = Parameter::new("x", 1.0, true);
        assert!(param.stderr().is_none());

        param.set_stderr(Some(0.25));
        assert_eq!(param.stderr(), Some(0.25));

        param.set_stderr(None);
        assert!(param.stderr().is_none());
    }

    #[test]
    fn test_serde_round_trip() {
        let param = Parameter::with_bounds("Index", -2.1, true, -5.0, -1.0).unwrap();
        let json = serde_json::to_string(&param).unwrap();
        let back: Parameter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, param);

        // Unbounded parameters survive the null encoding of infinite bounds.
        let param = Parameter::new("Prefactor", 10.0, true);
        let json = serde_json::to_string(&param).unwrap();
        let back: Parameter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, param);
    }
}
