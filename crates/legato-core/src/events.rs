//! Thin adapter translating upstream parse events into planner calls.
//!
//! The upstream parser owns modal state (units, absolute/relative mode,
//! plane selection) and hands down absolute positions in mm. This module
//! only maps its event vocabulary onto the planner façade.

use crate::axis::{AxesRegister, Axis};
use crate::backend::MotorBackend;
use crate::config::MachineConfig;
use crate::planner::{Planner, PlannerError};

/// The events an upstream interpreter emits towards the machine.
pub trait ParseEvents {
    /// Straight move to `target` at the requested feedrate (mm/s).
    fn coordinated_move(&mut self, feedrate_mm_s: f64, target: &AxesRegister)
    -> Result<(), PlannerError>;

    /// Straight move at the fastest permissible rate.
    fn rapid_move(&mut self, target: &AxesRegister) -> Result<(), PlannerError>;

    /// Scale subsequent feedrates.
    fn set_speed_factor(&mut self, factor: f64);

    /// Auxiliary output bits to carry on subsequent segments.
    fn set_aux_bits(&mut self, bits: u16);

    /// Switch motor power. Disabling first brings the path to a halt.
    fn motors_enable(&mut self, on: bool) -> Result<(), PlannerError>;

    /// The input stream ended; flush everything.
    fn stream_finished(&mut self) -> Result<(), PlannerError>;
}

/// Event receiver driving a [`Planner`]. The façade hands this out to the
/// parser; ownership of the planner can be reclaimed with
/// [`EventAdapter::into_planner`].
pub struct EventAdapter<B: MotorBackend> {
    planner: Planner<B>,
    rapid_feedrate: f64,
}

impl<B: MotorBackend> EventAdapter<B> {
    pub fn new(config: &MachineConfig, planner: Planner<B>) -> Self {
        // Requesting the fastest axis everywhere; the per-axis clamp scales
        // each rapid down to what its direction allows.
        let rapid_feedrate = Axis::ALL
            .iter()
            .map(|&axis| config.max_feedrate[axis])
            .fold(0.0, f64::max);
        Self {
            planner,
            rapid_feedrate,
        }
    }

    pub fn planner(&self) -> &Planner<B> {
        &self.planner
    }

    pub fn planner_mut(&mut self) -> &mut Planner<B> {
        &mut self.planner
    }

    pub fn into_planner(self) -> Planner<B> {
        self.planner
    }
}

impl<B: MotorBackend> ParseEvents for EventAdapter<B> {
    fn coordinated_move(
        &mut self,
        feedrate_mm_s: f64,
        target: &AxesRegister,
    ) -> Result<(), PlannerError> {
        self.planner.enqueue(target, feedrate_mm_s)
    }

    fn rapid_move(&mut self, target: &AxesRegister) -> Result<(), PlannerError> {
        self.planner.enqueue(target, self.rapid_feedrate)
    }

    fn set_speed_factor(&mut self, factor: f64) {
        self.planner.set_speed_factor(factor);
    }

    fn set_aux_bits(&mut self, bits: u16) {
        self.planner.set_aux_bits(bits);
    }

    fn motors_enable(&mut self, on: bool) -> Result<(), PlannerError> {
        if !on {
            self.planner.bring_path_to_halt()?;
        }
        self.planner.motor_enable(on);
        Ok(())
    }

    fn stream_finished(&mut self) -> Result<(), PlannerError> {
        self.planner.bring_path_to_halt()
    }
}
