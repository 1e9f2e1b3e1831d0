//! Progress curve shapes and expected-value evaluation.
//!
//! A curve shape maps the elapsed fraction of an enrollment window to the
//! fraction of the target a user is expected to have reached. Evaluation
//! is pure; callers clamp the fraction through
//! [`Span::elapsed_fraction`](crate::duration::Span::elapsed_fraction)
//! first.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default convexity exponent for the exponential shape. Tunable via
/// service configuration; must stay above 1 so the curve models a
/// slow-start, fast-finish expectation.
pub const DEFAULT_EXPONENT: f64 = 2.0;

/// Known shape names accepted from stored/user data.
pub mod shape_names {
    pub const LINEAR: &str = "linear";
    pub const EXPONENTIAL: &str = "exponential";
}

// ---------------------------------------------------------------------------
// CurveShape
// ---------------------------------------------------------------------------

/// The function mapping elapsed time fraction to expected progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurveShape {
    /// Expected progress grows proportionally with elapsed time.
    Linear,
    /// Expected = target × fraction^exponent, exponent > 1.
    Exponential { exponent: f64 },
    /// Custom step curve: expected jumps to `value × target` once the
    /// elapsed fraction reaches each point's `at` threshold.
    Steps { points: Vec<StepPoint> },
}

/// One step of a custom curve. Both coordinates are fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepPoint {
    pub at: f64,
    pub value: f64,
}

impl Default for CurveShape {
    fn default() -> Self {
        CurveShape::Linear
    }
}

/// Resolve a shape name from stored or user-supplied data.
///
/// Only the named shapes are accepted here; step curves arrive fully
/// structured through serde. Unknown names are an error — callers must
/// not silently fall back to linear.
pub fn parse_shape(name: &str) -> Result<CurveShape, CoreError> {
    match name {
        shape_names::LINEAR => Ok(CurveShape::Linear),
        shape_names::EXPONENTIAL => Ok(CurveShape::Exponential {
            exponent: DEFAULT_EXPONENT,
        }),
        other => Err(CoreError::UnknownCurveShape(other.to_string())),
    }
}

/// Validate the structural invariants of a shape.
///
/// Exponential exponents must exceed 1. Step points must be non-empty,
/// strictly ascending in `at`, confined to `[0, 1]` on both axes, and end
/// at value 1 so the curve reaches the target.
pub fn validate_shape(shape: &CurveShape) -> Result<(), CoreError> {
    match shape {
        CurveShape::Linear => Ok(()),
        CurveShape::Exponential { exponent } => {
            if !exponent.is_finite() || *exponent <= 1.0 {
                return Err(CoreError::Validation(format!(
                    "Exponential curve exponent must be greater than 1, got {exponent}"
                )));
            }
            Ok(())
        }
        CurveShape::Steps { points } => {
            if points.is_empty() {
                return Err(CoreError::Validation(
                    "Step curve requires at least one point".to_string(),
                ));
            }
            let mut previous = -1.0f64;
            for point in points {
                if !(0.0..=1.0).contains(&point.at) || !(0.0..=1.0).contains(&point.value) {
                    return Err(CoreError::Validation(format!(
                        "Step point ({}, {}) outside [0, 1]",
                        point.at, point.value
                    )));
                }
                if point.at <= previous {
                    return Err(CoreError::Validation(
                        "Step points must be strictly ascending in 'at'".to_string(),
                    ));
                }
                previous = point.at;
            }
            let last = points[points.len() - 1];
            if (last.value - 1.0).abs() > f64::EPSILON {
                return Err(CoreError::Validation(
                    "Step curve must end at value 1 to reach the target".to_string(),
                ));
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Expected progress value at the given elapsed fraction.
///
/// Preconditions: `target > 0` and `fraction ∈ [0, 1]`; both are enforced
/// rather than clamped, since an out-of-range fraction means the caller
/// skipped the duration clamp.
pub fn expected_at(target: f64, fraction: f64, shape: &CurveShape) -> Result<f64, CoreError> {
    if !target.is_finite() || target <= 0.0 {
        return Err(CoreError::Validation(format!(
            "Curve target must be positive, got {target}"
        )));
    }
    if !(0.0..=1.0).contains(&fraction) {
        return Err(CoreError::Validation(format!(
            "Elapsed fraction must be within [0, 1], got {fraction}"
        )));
    }
    let value = match shape {
        CurveShape::Linear => target * fraction,
        CurveShape::Exponential { exponent } => target * fraction.powf(*exponent),
        CurveShape::Steps { points } => {
            let reached = points
                .iter()
                .take_while(|p| p.at <= fraction)
                .last()
                .map(|p| p.value)
                .unwrap_or(0.0);
            target * reached
        }
    };
    Ok(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
