//! Conversion of a Euclidean move request into step space.
//!
//! Produces a [`QueuedMove`] whose nominal speed and acceleration are
//! expressed as step rates of the defining axis, clamped so that no axis
//! ever exceeds its configured feedrate or acceleration.

use crate::axis::{Axis, StepVector};
use crate::config::MachineConfig;
use crate::move_buffer::QueuedMove;

pub struct StepConverter<'a> {
    config: &'a MachineConfig,
}

impl<'a> StepConverter<'a> {
    pub fn new(config: &'a MachineConfig) -> Self {
        Self { config }
    }

    /// Build a planable move from a step delta and a requested feedrate.
    /// Returns `None` when nothing moves.
    pub fn convert(
        &self,
        delta_steps: StepVector,
        feedrate_mm_s: f64,
        speed_factor: f64,
        aux_bits: u16,
    ) -> Option<QueuedMove> {
        if delta_steps.is_zero() {
            return None;
        }
        let cfg = self.config;

        let delta_mm: [f64; crate::axis::AXIS_COUNT] =
            std::array::from_fn(|i| f64::from(delta_steps.0[i]) / cfg.steps_per_mm.0[i]);
        let mm = |axis: Axis| delta_mm[axis.index()];

        let euclid_len =
            (mm(Axis::X).powi(2) + mm(Axis::Y).powi(2) + mm(Axis::Z).powi(2)).sqrt();
        let defining_axis = delta_steps.defining_axis();

        // Length governing how the feedrate distributes over the axes. An
        // axis-only move borrows its largest component as path length.
        let (path_len, direction) = if euclid_len > 0.0 {
            (
                euclid_len,
                [
                    mm(Axis::X) / euclid_len,
                    mm(Axis::Y) / euclid_len,
                    mm(Axis::Z) / euclid_len,
                ],
            )
        } else {
            let longest = delta_mm.iter().fold(0.0, |acc: f64, &d| acc.max(d.abs()));
            (longest, [0.0, 0.0, 0.0])
        };

        let requested = feedrate_mm_s * speed_factor;

        // Largest scale in (0, 1] keeping every axis within its feedrate.
        let mut scale: f64 = 1.0;
        for (axis, steps) in delta_steps.iter() {
            if steps == 0 {
                continue;
            }
            let axis_speed = mm(axis).abs() / path_len * requested;
            if axis_speed > cfg.max_feedrate[axis] {
                scale = scale.min(cfg.max_feedrate[axis] / axis_speed);
            }
        }
        let clamped = requested * scale;

        // Path acceleration is capped by the most constrained axis along the
        // direction of travel.
        let mut path_accel = f64::INFINITY;
        for (axis, steps) in delta_steps.iter() {
            if steps == 0 {
                continue;
            }
            path_accel = path_accel.min(cfg.acceleration[axis] * path_len / mm(axis).abs());
        }

        let defining_steps = f64::from(delta_steps[defining_axis].abs());
        let (nominal_rate, accel_rate) = if euclid_len > 0.0 {
            (
                clamped * defining_steps / euclid_len,
                path_accel * defining_steps / euclid_len,
            )
        } else {
            (
                clamped * cfg.steps_per_mm[defining_axis],
                cfg.acceleration[defining_axis] * cfg.steps_per_mm[defining_axis],
            )
        };

        Some(QueuedMove {
            delta_steps,
            direction,
            euclid_len,
            defining_axis,
            nominal_rate,
            accel_rate,
            entry_rate: 0.0,
            exit_rate: 0.0,
            entry_desired: 0.0,
            entry_pinned: false,
            aux_bits,
        })
    }
}
