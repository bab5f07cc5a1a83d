//! Junction speed between two consecutive moves.
//!
//! The junction is carried as a single defining-axis step rate shared by
//! both neighbours: the rate the step generator holds while crossing the
//! corner. Below the configured threshold angle the corner is taken without
//! stopping, limited only by how large a velocity step each axis can absorb;
//! at or beyond it the path comes to a full stop.

use crate::config::MachineConfig;
use crate::move_buffer::QueuedMove;

/// The velocity-step budget per axis assumes this much time is available to
/// absorb the change, multiplied by the axis acceleration limit.
pub const MIN_JUNCTION_TIME: f64 = 0.1;

pub struct JunctionPolicy<'a> {
    config: &'a MachineConfig,
}

impl<'a> JunctionPolicy<'a> {
    pub fn new(config: &'a MachineConfig) -> Self {
        Self { config }
    }

    /// Maximum permissible defining-axis step rate through the elbow
    /// between `from` and `to`.
    pub fn junction_rate(&self, from: &QueuedMove, to: &QueuedMove) -> f64 {
        if from.euclid_len == 0.0 || to.euclid_len == 0.0 {
            return 0.0;
        }

        let dot = from.direction[0] * to.direction[0]
            + from.direction[1] * to.direction[1]
            + from.direction[2] * to.direction[2];
        let deviation = dot.clamp(-1.0, 1.0).acos().to_degrees();
        if deviation.abs() > self.config.threshold_angle {
            return 0.0;
        }

        let mut rate = from.nominal_rate.min(to.nominal_rate);
        for (axis, _) in from.delta_steps.iter() {
            if from.delta_steps[axis] == 0 && to.delta_steps[axis] == 0 {
                continue;
            }
            // Per step of the respective defining axis; the difference is
            // the rate jump this axis sees per unit of junction rate.
            let jump = (to.rate_ratio(axis) - from.rate_ratio(axis)).abs();
            if jump > f64::EPSILON {
                let budget =
                    self.config.acceleration[axis] * self.config.steps_per_mm[axis] * MIN_JUNCTION_TIME;
                rate = rate.min(budget / jump);
            }
        }
        rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{Axis, AxisVector, StepVector};
    use crate::convert::StepConverter;

    fn config(threshold_angle: f64) -> MachineConfig {
        let mut cfg = MachineConfig::default();
        cfg.steps_per_mm = AxisVector::splat(1000.0);
        cfg.max_feedrate = AxisVector::splat(10_000.0);
        cfg.acceleration = AxisVector::splat(100.0);
        cfg.threshold_angle = threshold_angle;
        cfg
    }

    fn planar_move(cfg: &MachineConfig, dx: i32, dy: i32, feed: f64) -> QueuedMove {
        let mut delta = StepVector::default();
        delta[Axis::X] = dx;
        delta[Axis::Y] = dy;
        StepConverter::new(cfg).convert(delta, feed, 1.0, 0).unwrap()
    }

    #[test]
    fn right_angle_stops() {
        let cfg = config(5.0);
        let policy = JunctionPolicy::new(&cfg);
        let a = planar_move(&cfg, 100_000, 0, 100.0);
        let b = planar_move(&cfg, 0, 100_000, 100.0);
        assert_eq!(policy.junction_rate(&a, &b), 0.0);
    }

    #[test]
    fn reversal_stops() {
        let cfg = config(5.0);
        let policy = JunctionPolicy::new(&cfg);
        let a = planar_move(&cfg, 100_000, 0, 100.0);
        let b = planar_move(&cfg, -100_000, 0, 100.0);
        assert_eq!(policy.junction_rate(&a, &b), 0.0);
    }

    #[test]
    fn straight_through_keeps_nominal() {
        let cfg = config(0.0);
        let policy = JunctionPolicy::new(&cfg);
        let a = planar_move(&cfg, 100_000, 0, 100.0);
        let b = planar_move(&cfg, 100_000, 0, 50.0);
        // Collinear moves join at the slower nominal.
        let rate = policy.junction_rate(&a, &b);
        assert!((rate - b.nominal_rate).abs() < 1e-9);
    }

    #[test]
    fn shallow_corner_is_jump_limited() {
        let cfg = config(10.0);
        let policy = JunctionPolicy::new(&cfg);
        // 100 mm along X, then 100 mm at ~5.7 degrees.
        let a = planar_move(&cfg, 100_000, 0, 3000.0);
        let b = planar_move(&cfg, 100_000, 10_000, 3000.0);
        let rate = policy.junction_rate(&a, &b);
        assert!(rate > 0.0);
        // The Y ratio steps from 0 to 0.1; budget is accel * steps_per_mm *
        // MIN_JUNCTION_TIME = 10_000 steps/s.
        let expected = (100.0 * 1000.0 * MIN_JUNCTION_TIME / 0.1)
            .min(a.nominal_rate)
            .min(b.nominal_rate);
        assert!((rate - expected).abs() < 1e-6);
    }

    #[test]
    fn axis_only_neighbour_stops() {
        let cfg = config(45.0);
        let policy = JunctionPolicy::new(&cfg);
        let a = planar_move(&cfg, 100_000, 0, 100.0);
        let mut delta = StepVector::default();
        delta[Axis::E] = 5000;
        let b = StepConverter::new(&cfg).convert(delta, 100.0, 1.0, 0).unwrap();
        assert_eq!(policy.junction_rate(&a, &b), 0.0);
        assert_eq!(policy.junction_rate(&b, &a), 0.0);
    }
}
