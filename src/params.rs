//! Parameter metadata for pattern detectors
//!
//! This module provides metadata about detector parameters, enabling:
//! - Grid search optimization
//! - Parameter documentation
//! - Construction from loosely typed name/value maps
//!
//! # Example
//!
//! ```rust
//! use hnsd::params::{ParamMeta, ParamType, ParameterizedDetector};
//! use hnsd::prelude::*;
//!
//! // Get parameter metadata for a detector
//! let params = HeadShouldersDetector::param_meta();
//! for param in params {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::{PatternError, Period, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Period value (positive integer)
  Period,
  /// Bar count (non-negative integer, zero allowed)
  Count,
}

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "leftbars")
  pub name: &'static str,
  /// Parameter type (Period or Count)
  pub param_type: ParamType,
  /// Default value
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Period parameter
  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Create a new ParamMeta for a Count parameter
  pub const fn count(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Count, default, range, description }
  }

  /// Generate all values for grid search
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(PatternError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(PatternError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Count => {
        if value < 0.0 || value.fract() != 0.0 {
          return Err(PatternError::InvalidValue("Count must be a non-negative integer"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Trait for detectors that support parameterization
///
/// Implementing this trait enables:
/// - Discovery of available parameters
/// - Creation of detectors with custom parameter values
/// - Grid search optimization
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a HashMap
  ///
  /// Missing parameters use their default values.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Returns the pattern ID string
  fn pattern_id_str() -> &'static str;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value < 0.0 || value.fract() != 0.0 {
    return Err(PatternError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

/// Helper to get a bar count from params with default fallback
pub fn get_count(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<usize> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value.is_nan() || value < 0.0 || value.fract() != 0.0 {
    return Err(PatternError::InvalidValue("Count must be a non-negative integer"));
  }
  Ok(value as usize)
}

// ============================================================
// TESTS
// ============================================================
