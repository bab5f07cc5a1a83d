//! Shaping of one planned move into up to three step segments:
//! accelerate, cruise, decelerate.
//!
//! Segment boundaries are quantised to whole defining-axis steps and the
//! boundary speeds are derived back from the quantised counts, so the
//! acceleration actually implied by each emitted segment never exceeds the
//! move's budget. Accel steps round down (the top speed stays below the
//! planned peak), decel steps round up (the planned exit speed is emitted
//! exactly whenever it is reachable).

use crate::axis::{AXIS_COUNT, Axis};
use crate::backend::LinearSegmentSteps;
use crate::move_buffer::QueuedMove;

/// Result of shaping one move.
#[derive(Debug)]
pub struct ShapedMove {
    /// At most three segments, in execution order. Empty for a move without
    /// defining-axis steps.
    pub segments: Vec<LinearSegmentSteps>,
    /// Defining-axis rate actually reached at the end of the move. Lower
    /// than the planned exit when the move was too short to accelerate all
    /// the way; higher only in the known short-move deceleration limit.
    pub exit_rate: f64,
}

/// Split `mv` into step segments, entering at `entry_rate` (the rate the
/// predecessor actually handed over).
pub fn shape(mv: &QueuedMove, entry_rate: f64) -> ShapedMove {
    let n = mv.defining_steps();
    if n == 0 {
        return ShapedMove {
            segments: Vec::new(),
            exit_rate: entry_rate,
        };
    }
    let n_f = f64::from(n);
    let a = mv.accel_rate;
    let v0 = entry_rate.min(mv.nominal_rate);
    let v2 = mv.exit_rate.min(mv.nominal_rate);

    // Highest rate from which both ramps still fit in n steps, capped at
    // nominal.
    let peak = (a * n_f + 0.5 * (v0 * v0 + v2 * v2))
        .sqrt()
        .min(mv.nominal_rate);

    // Slack absorbing float noise around whole-step boundaries, so an exact
    // ramp never gains or loses a one-step sliver segment.
    let quantum = |ideal: f64| 1e-9 * ideal.max(1.0);

    let accel_ideal = ((peak * peak - v0 * v0) / (2.0 * a)).max(0.0);
    let accel_steps = ((accel_ideal + quantum(accel_ideal)).floor() as u32).min(n);
    let mut v_top = (v0 * v0 + 2.0 * a * f64::from(accel_steps))
        .sqrt()
        .min(mv.nominal_rate);
    if v_top <= 0.0 {
        // Slower than a single accelerating step can express; cruise at the
        // planned rate instead.
        v_top = peak;
    }

    let decel_ideal = (v_top * v_top - v2 * v2) / (2.0 * a);
    let (decel_steps, exit_rate) = if decel_ideal <= quantum(decel_ideal) {
        if v_top > v2 {
            // Within noise of the planned exit; close the move on it.
            v_top = v2;
        }
        // The move never gets above its exit rate; whatever the ramp
        // reached is handed to the successor.
        (0, v_top)
    } else {
        let decel_steps =
            ((decel_ideal - quantum(decel_ideal)).ceil() as u32).min(n - accel_steps);
        if f64::from(decel_steps) + quantum(decel_ideal) >= decel_ideal {
            (decel_steps, v2)
        } else {
            // Not enough steps left to slow down to the planned exit; the
            // segment ends hot. Known limit for short moves.
            let reached = (v_top * v_top - 2.0 * a * f64::from(decel_steps))
                .max(0.0)
                .sqrt();
            tracing::warn!(
                planned = v2,
                reached,
                steps = n,
                "move too short to decelerate to its planned exit rate"
            );
            (decel_steps, reached)
        }
    };
    let cruise_steps = n - accel_steps - decel_steps;

    let mut segments = Vec::with_capacity(3);
    let mut emitted = [0_i32; AXIS_COUNT];
    let mut boundary = 0_u32;
    for (seg_steps, seg_v0, seg_v1) in [
        (accel_steps, v0, v_top),
        (cruise_steps, v_top, v_top),
        (decel_steps, v_top, exit_rate),
    ] {
        if seg_steps == 0 {
            continue;
        }
        boundary += seg_steps;
        let fraction = f64::from(boundary) / n_f;
        let mut segment = LinearSegmentSteps {
            v0: seg_v0 as f32,
            v1: seg_v1 as f32,
            aux_bits: mv.aux_bits,
            ..LinearSegmentSteps::default()
        };
        // Cumulative rounding: per axis, the counts across segments sum to
        // the move's exact step delta.
        for &axis in &Axis::ALL {
            let target = (f64::from(mv.delta_steps[axis]) * fraction).round() as i32;
            segment.steps[axis.index()] = target - emitted[axis.index()];
            emitted[axis.index()] = target;
        }
        segments.push(segment);
    }

    ShapedMove {
        segments,
        exit_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::StepVector;

    fn planar_move(dx: i32, dy: i32, nominal: f64, accel: f64) -> QueuedMove {
        let mut delta_steps = StepVector::default();
        delta_steps[Axis::X] = dx;
        delta_steps[Axis::Y] = dy;
        let defining_axis = delta_steps.defining_axis();
        QueuedMove {
            delta_steps,
            direction: [1.0, 0.0, 0.0],
            euclid_len: 1.0,
            defining_axis,
            nominal_rate: nominal,
            accel_rate: accel,
            entry_rate: 0.0,
            exit_rate: 0.0,
            entry_desired: 0.0,
            entry_pinned: false,
            aux_bits: 0,
        }
    }

    fn total_steps(segments: &[LinearSegmentSteps], axis: Axis) -> i32 {
        segments.iter().map(|s| s.steps[axis.index()]).sum()
    }

    #[test]
    fn long_move_full_trapezoid() {
        let mut mv = planar_move(1_000_000, 0, 1000.0, 100.0);
        mv.exit_rate = 0.0;
        let shaped = shape(&mv, 0.0);
        assert_eq!(shaped.segments.len(), 3);
        let &[accel, cruise, decel] = shaped.segments.as_slice() else {
            panic!("expected three segments");
        };
        assert_eq!(accel.v0, 0.0);
        assert_eq!(accel.v1, cruise.v0);
        assert_eq!(cruise.v0, cruise.v1);
        assert_eq!(cruise.v1, decel.v0);
        assert_eq!(decel.v1, 0.0);
        // Ramps hold 1000²/200 = 5000 steps each.
        assert_eq!(accel.steps[Axis::X.index()], 5000);
        assert_eq!(decel.steps[Axis::X.index()], 5000);
        assert_eq!(total_steps(&shaped.segments, Axis::X), 1_000_000);
        assert_eq!(shaped.exit_rate, 0.0);
    }

    #[test]
    fn short_move_has_no_cruise() {
        let mut mv = planar_move(100, 0, 10_000.0, 100.0);
        mv.exit_rate = 0.0;
        let shaped = shape(&mv, 0.0);
        assert_eq!(shaped.segments.len(), 2);
        let peak = shaped.segments[0].v1;
        assert!(peak > 0.0);
        assert_eq!(shaped.segments[1].v0, peak);
        assert_eq!(shaped.segments[1].v1, 0.0);
        assert_eq!(total_steps(&shaped.segments, Axis::X), 100);
    }

    #[test]
    fn coupled_axis_steps_sum_exactly() {
        // 997 Y steps over 100_000 X steps force fractional splits.
        let mut mv = planar_move(100_000, 997, 1000.0, 100.0);
        mv.exit_rate = 0.0;
        let shaped = shape(&mv, 0.0);
        assert_eq!(total_steps(&shaped.segments, Axis::X), 100_000);
        assert_eq!(total_steps(&shaped.segments, Axis::Y), 997);
    }

    #[test]
    fn accel_shortfall_hands_over_reached_rate() {
        // 50 steps cannot reach an exit of 1000 at accel 100: the ramp tops
        // out at sqrt(2 * 100 * 50) = 100.
        let mut mv = planar_move(50, 0, 10_000.0, 100.0);
        mv.exit_rate = 1000.0;
        let shaped = shape(&mv, 0.0);
        assert_eq!(shaped.segments.len(), 1);
        assert!((shaped.exit_rate - 100.0).abs() < 1e-9);
        assert_eq!(shaped.segments[0].v1, 100.0);
    }

    #[test]
    fn decel_shortfall_ends_hot() {
        // Entering at 1000 with only 10 steps to stop: physically
        // impossible, the final rate stays high. The planner reports but
        // does not error on this.
        let mut mv = planar_move(10, 0, 10_000.0, 100.0);
        mv.exit_rate = 0.0;
        let shaped = shape(&mv, 1000.0);
        assert_eq!(shaped.segments.len(), 1);
        assert!(shaped.exit_rate > 900.0);
        let last = shaped.segments.last().unwrap();
        assert!(last.v1 > 900.0);
    }

    #[test]
    fn exit_rate_matches_planned_junction_exactly() {
        let mut mv = planar_move(100_000, 0, 1000.0, 100.0);
        mv.exit_rate = 250.0;
        let shaped = shape(&mv, 0.0);
        assert_eq!(shaped.exit_rate, 250.0);
        assert_eq!(shaped.segments.last().unwrap().v1, 250.0);
    }

    #[test]
    fn zero_defining_steps_emits_nothing() {
        let mut mv = planar_move(1, 0, 1000.0, 100.0);
        mv.delta_steps[Axis::X] = 0;
        let shaped = shape(&mv, 5.0);
        assert!(shaped.segments.is_empty());
        assert_eq!(shaped.exit_rate, 5.0);
    }

    #[test]
    fn aux_bits_stamped_on_every_segment() {
        let mut mv = planar_move(1_000_000, 0, 1000.0, 100.0);
        mv.aux_bits = 0xBEEF;
        let shaped = shape(&mv, 0.0);
        assert!(shaped.segments.iter().all(|s| s.aux_bits == 0xBEEF));
    }
}
