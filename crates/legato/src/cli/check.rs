use crate::config::Profile;
use anyhow::Result;
use clap::Args;
use legato_core::Axis;
use std::path::PathBuf;

#[derive(Args)]
pub struct CheckArgs {
    /// Path to the machine profile (TOML or JSON).
    pub profile: PathBuf,
}

impl CheckArgs {
    pub fn run(&self) -> Result<()> {
        let profile = Profile::from_file(&self.profile)?;
        let config = profile.to_machine_config()?;

        println!("profile ok: {}", self.profile.display());
        println!(
            "speed_factor {}  threshold_angle {}°",
            config.speed_factor, config.threshold_angle
        );
        println!(
            "{:>4}  {:>12}  {:>14}  {:>16}",
            "axis", "steps/mm", "feedrate mm/s", "accel mm/s²"
        );
        for &axis in &Axis::ALL {
            println!(
                "{:>4}  {:>12}  {:>14}  {:>16}",
                axis.letter(),
                config.steps_per_mm[axis],
                config.max_feedrate[axis],
                config.acceleration[axis]
            );
        }
        Ok(())
    }
}
