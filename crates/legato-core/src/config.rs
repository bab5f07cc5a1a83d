//! Machine configuration shared by the conversion, junction and shaping
//! stages. Read-only to the planner.

use thiserror::Error;

use crate::axis::{Axis, AxisVector};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name}[{axis}] must be positive and finite, got {value}")]
    NonPositiveAxisValue {
        name: &'static str,
        axis: char,
        value: f64,
    },
    #[error("speed_factor must be positive and finite, got {0}")]
    BadSpeedFactor(f64),
    #[error("threshold_angle must be non-negative and finite, got {0}")]
    BadThresholdAngle(f64),
}

/// Per-axis limits and global tuning knobs. Validated once at planner
/// construction; the planner never mutates it.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Step-space conversion per axis, steps/mm.
    pub steps_per_mm: AxisVector<f64>,
    /// Per-axis feedrate clamp, mm/s.
    pub max_feedrate: AxisVector<f64>,
    /// Per-axis acceleration clamp, mm/s².
    pub acceleration: AxisVector<f64>,
    /// Global feedrate multiplier.
    pub speed_factor: f64,
    /// Angular deviation (degrees) below which a corner is taken without
    /// stopping.
    pub threshold_angle: f64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            steps_per_mm: AxisVector::splat(80.0),
            max_feedrate: AxisVector::splat(200.0),
            acceleration: AxisVector::splat(1000.0),
            speed_factor: 1.0,
            threshold_angle: 10.0,
        }
    }
}

impl MachineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for &axis in &Axis::ALL {
            for (name, values) in [
                ("steps_per_mm", &self.steps_per_mm),
                ("max_feedrate", &self.max_feedrate),
                ("acceleration", &self.acceleration),
            ] {
                let value = values[axis];
                if !(value.is_finite() && value > 0.0) {
                    return Err(ConfigError::NonPositiveAxisValue {
                        name,
                        axis: axis.letter(),
                        value,
                    });
                }
            }
        }
        if !(self.speed_factor.is_finite() && self.speed_factor > 0.0) {
            return Err(ConfigError::BadSpeedFactor(self.speed_factor));
        }
        if !(self.threshold_angle.is_finite() && self.threshold_angle >= 0.0) {
            return Err(ConfigError::BadThresholdAngle(self.threshold_angle));
        }
        Ok(())
    }
}
