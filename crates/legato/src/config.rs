use anyhow::{Context, Result};
use legato_core::{Axis, MachineConfig};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

/// Machine profile as stored on disk. Axes are keyed by letter; anything
/// not listed falls back to `default_axis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Global feedrate multiplier
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,

    /// Corner angle (degrees) below which the planner keeps moving
    #[serde(default)]
    pub threshold_angle: f64,

    /// Limits applied to axes without their own entry
    pub default_axis: Option<AxisLimits>,

    /// Per-axis limits, keyed by axis letter
    #[serde(default)]
    pub axes: BTreeMap<String, AxisLimits>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AxisLimits {
    /// Steps per millimetre
    pub steps_per_mm: f64,

    /// Maximum feedrate, mm/s
    pub max_feedrate: f64,

    /// Maximum acceleration, mm/s²
    pub acceleration: f64,
}

fn default_speed_factor() -> f64 {
    1.0
}

impl Profile {
    /// Load a profile from a file, auto-detecting TOML or JSON format
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read profile {}", path.display()))?;

        let extension = path.extension().and_then(|s| s.to_str());

        match extension {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => {
                // Try TOML first (preferred), fall back to JSON
                Self::from_toml(&content).or_else(|_| Self::from_json(&content))
            }
        }
    }

    /// Parse a profile from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse profile as TOML")
    }

    /// Parse a profile from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("failed to parse profile as JSON")
    }

    /// Resolve the profile into a validated planner configuration.
    pub fn to_machine_config(&self) -> Result<MachineConfig> {
        let mut config = MachineConfig {
            speed_factor: self.speed_factor,
            threshold_angle: self.threshold_angle,
            ..MachineConfig::default()
        };

        if let Some(defaults) = &self.default_axis {
            for &axis in &Axis::ALL {
                apply(&mut config, axis, defaults);
            }
        }

        for (name, limits) in &self.axes {
            let mut letters = name.chars();
            let axis = letters
                .next()
                .filter(|_| letters.next().is_none())
                .and_then(Axis::from_letter)
                .with_context(|| format!("unknown axis '{name}' in profile"))?;
            apply(&mut config, axis, limits);
        }

        config
            .validate()
            .context("profile resolves to an invalid machine configuration")?;
        Ok(config)
    }
}

fn apply(config: &mut MachineConfig, axis: Axis, limits: &AxisLimits) {
    config.steps_per_mm[axis] = limits.steps_per_mm;
    config.max_feedrate[axis] = limits.max_feedrate;
    config.acceleration[axis] = limits.acceleration;
}
