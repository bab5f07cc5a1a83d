//! The look-ahead planner façade.
//!
//! Accepts absolute-position move requests one at a time, negotiates the
//! junction speed with the previous queued move, keeps a sliding window of
//! moves reachable via the backward pass, and emits shaped segments to the
//! motor backend in strict FIFO order. A move is only shaped once its entry
//! speed can no longer change.

use thiserror::Error;

use crate::axis::{AxesRegister, Axis, StepVector};
use crate::backend::{BackendError, MotorBackend};
use crate::config::{ConfigError, MachineConfig};
use crate::convert::StepConverter;
use crate::junction::JunctionPolicy;
use crate::move_buffer::MoveBuffer;
use crate::shaper;

/// Queued moves kept unshaped behind the freshest one. Emitting this far
/// behind the tail leaves the backward pass enough window to lower earlier
/// exit speeds when a later move demands it.
pub const PLANNING_WINDOW: usize = 4;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid machine configuration")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("planner is tainted after a backend failure and must be reconstructed")]
    Tainted,
    #[error("position can only be set while the queue is empty")]
    QueueNotEmpty,
}

pub struct Planner<B: MotorBackend> {
    config: MachineConfig,
    backend: B,
    buffer: MoveBuffer,
    position_steps: StepVector,
    speed_factor: f64,
    aux_bits: u16,
    /// Defining-axis rate the last emitted move actually ended at; `None`
    /// while the machine is at rest.
    carry_rate: Option<f64>,
    tainted: bool,
}

impl<B: MotorBackend> Planner<B> {
    /// Create a planner over a validated configuration. The initial
    /// position is all zeros until homing calls [`Planner::set_position`].
    pub fn new(config: MachineConfig, backend: B) -> Result<Self, PlannerError> {
        config.validate()?;
        let speed_factor = config.speed_factor;
        Ok(Self {
            config,
            backend,
            buffer: MoveBuffer::new(),
            position_steps: StepVector::default(),
            speed_factor,
            aux_bits: 0,
            carry_rate: None,
            tainted: false,
        })
    }

    /// Append a move from the current position to `target` at the given
    /// feedrate. A move without any step delta is absorbed silently. The
    /// logical position updates immediately.
    pub fn enqueue(&mut self, target: &AxesRegister, feedrate_mm_s: f64) -> Result<(), PlannerError> {
        self.ensure_usable()?;
        if !(feedrate_mm_s.is_finite() && feedrate_mm_s > 0.0) {
            tracing::warn!(feedrate_mm_s, "dropping move with unusable feedrate");
            return Ok(());
        }

        let target_steps = self.to_steps(target);
        let delta_steps = target_steps - self.position_steps;
        let converter = StepConverter::new(&self.config);
        let Some(mv) = converter.convert(delta_steps, feedrate_mm_s, self.speed_factor, self.aux_bits)
        else {
            tracing::debug!("no motion, move dropped");
            return Ok(());
        };
        self.position_steps = target_steps;

        let junction = match self.buffer.last() {
            Some(prev) => JunctionPolicy::new(&self.config).junction_rate(prev, &mv),
            // Coming out of a standstill.
            None => 0.0,
        };
        self.buffer.push(mv, junction);
        self.emit_down_to(PLANNING_WINDOW)
    }

    /// Force the queue tail to a standstill, emit everything still pending
    /// and wait for the backend to drain.
    pub fn bring_path_to_halt(&mut self) -> Result<(), PlannerError> {
        self.ensure_usable()?;
        self.buffer.force_halt();
        self.emit_down_to(0)?;
        self.backend.wait_queue_empty();
        self.carry_rate = None;
        Ok(())
    }

    /// Scale the feedrate of subsequent moves. Already queued moves are not
    /// revisited.
    pub fn set_speed_factor(&mut self, factor: f64) {
        if factor.is_finite() && factor > 0.0 {
            self.speed_factor = factor;
        } else {
            tracing::warn!(factor, "ignoring non-positive speed factor");
        }
    }

    /// Auxiliary output bits stamped on every segment of subsequent moves.
    pub fn set_aux_bits(&mut self, bits: u16) {
        self.aux_bits = bits;
    }

    /// Current logical position in mm.
    pub fn position(&self) -> AxesRegister {
        let mut pos = AxesRegister::default();
        for &axis in &Axis::ALL {
            pos[axis] = f64::from(self.position_steps[axis]) / self.config.steps_per_mm[axis];
        }
        pos
    }

    /// Reset the logical position, e.g. after homing. Only valid while no
    /// move is queued.
    pub fn set_position(&mut self, position: &AxesRegister) -> Result<(), PlannerError> {
        if !self.buffer.is_empty() {
            return Err(PlannerError::QueueNotEmpty);
        }
        self.position_steps = self.to_steps(position);
        Ok(())
    }

    /// Forwarded to the backend.
    pub fn motor_enable(&mut self, on: bool) {
        self.backend.motor_enable(on);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Tear down the planner and hand back its backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    fn to_steps(&self, register: &AxesRegister) -> StepVector {
        let mut steps = StepVector::default();
        for &axis in &Axis::ALL {
            steps[axis] = (register[axis] * self.config.steps_per_mm[axis]).round() as i32;
        }
        steps
    }

    /// Shape and emit queued moves until at most `keep` remain.
    fn emit_down_to(&mut self, keep: usize) -> Result<(), PlannerError> {
        while self.buffer.len() > keep {
            let mv = self.buffer.pop_for_emit().expect("buffer not empty");
            let entry = match self.carry_rate {
                // The predecessor may have handed over less than planned.
                Some(carry) => mv.entry_rate.min(carry),
                None => mv.entry_rate,
            };
            let shaped = shaper::shape(&mv, entry);
            for segment in &shaped.segments {
                if let Err(err) = self.backend.enqueue(segment) {
                    self.tainted = true;
                    return Err(err.into());
                }
            }
            // An overshooting exit (short-move limit) is reported by the
            // shaper; the successor still plans from the junction it was
            // promised.
            self.carry_rate = Some(shaped.exit_rate.min(mv.exit_rate));
        }
        Ok(())
    }

    fn ensure_usable(&self) -> Result<(), PlannerError> {
        if self.tainted {
            return Err(PlannerError::Tainted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisVector;
    use crate::backend::{LinearSegmentSteps, RecordingBackend};

    fn test_config() -> MachineConfig {
        let mut cfg = MachineConfig::default();
        cfg.steps_per_mm = AxisVector::splat(1000.0);
        cfg.steps_per_mm[Axis::Y] = 8000.0;
        cfg.steps_per_mm[Axis::Z] = 64000.0;
        cfg.max_feedrate = AxisVector::splat(10_000.0);
        cfg.acceleration = AxisVector::splat(100.0);
        cfg.threshold_angle = 0.0;
        cfg
    }

    fn planner() -> Planner<RecordingBackend> {
        Planner::new(test_config(), RecordingBackend::default()).unwrap()
    }

    fn pos(x: f64, y: f64) -> AxesRegister {
        let mut p = AxesRegister::default();
        p[Axis::X] = x;
        p[Axis::Y] = y;
        p
    }

    struct RejectingBackend;

    impl MotorBackend for RejectingBackend {
        fn enqueue(&mut self, _segment: &LinearSegmentSteps) -> Result<(), BackendError> {
            Err(BackendError::new("queue full"))
        }

        fn motor_enable(&mut self, _on: bool) {}

        fn wait_queue_empty(&mut self) {}
    }

    #[test]
    fn invalid_config_fails_construction() {
        let mut cfg = test_config();
        cfg.acceleration[Axis::X] = -1.0;
        assert!(matches!(
            Planner::new(cfg, RecordingBackend::default()),
            Err(PlannerError::Config(_))
        ));
    }

    #[test]
    fn no_motion_is_absorbed() {
        let mut planner = planner();
        planner.enqueue(&AxesRegister::default(), 100.0).unwrap();
        planner.bring_path_to_halt().unwrap();
        assert!(planner.backend().segments.is_empty());
        assert_eq!(planner.backend().queue_waits, 1);
    }

    #[test]
    fn position_tracks_enqueued_moves() {
        let mut planner = planner();
        planner.enqueue(&pos(10.0, 20.0), 100.0).unwrap();
        let p = planner.position();
        assert_eq!(p[Axis::X], 10.0);
        assert_eq!(p[Axis::Y], 20.0);
    }

    #[test]
    fn set_position_requires_empty_queue() {
        let mut planner = planner();
        planner.enqueue(&pos(10.0, 0.0), 100.0).unwrap();
        assert!(matches!(
            planner.set_position(&pos(0.0, 0.0)),
            Err(PlannerError::QueueNotEmpty)
        ));
        planner.bring_path_to_halt().unwrap();
        planner.set_position(&pos(5.0, 5.0)).unwrap();
        assert_eq!(planner.position()[Axis::X], 5.0);
    }

    #[test]
    fn moves_are_held_back_within_the_window() {
        let mut planner = planner();
        for i in 1..=PLANNING_WINDOW + 1 {
            planner.enqueue(&pos(10.0 * i as f64, 0.0), 100.0).unwrap();
        }
        // One more move than the window: exactly the head was emitted.
        assert!(!planner.backend().segments.is_empty());
        let emitted_x: i32 = planner
            .backend()
            .segments
            .iter()
            .map(|s| s.steps[Axis::X.index()])
            .sum();
        assert_eq!(emitted_x, 10_000);
    }

    #[test]
    fn halt_flushes_and_waits() {
        let mut planner = planner();
        planner.enqueue(&pos(100.0, 0.0), 100.0).unwrap();
        assert!(planner.backend().segments.is_empty());
        planner.bring_path_to_halt().unwrap();
        assert!(!planner.backend().segments.is_empty());
        assert_eq!(planner.backend().queue_waits, 1);
        let total: i32 = planner
            .backend()
            .segments
            .iter()
            .map(|s| s.steps[Axis::X.index()])
            .sum();
        assert_eq!(total, 100_000);
    }

    #[test]
    fn backend_rejection_taints_the_planner() {
        let mut planner = Planner::new(test_config(), RejectingBackend).unwrap();
        planner.enqueue(&pos(100.0, 0.0), 100.0).unwrap();
        let err = planner.bring_path_to_halt();
        assert!(matches!(err, Err(PlannerError::Backend(_))));
        // Everything after the failure fails fast.
        assert!(matches!(
            planner.enqueue(&pos(200.0, 0.0), 100.0),
            Err(PlannerError::Tainted)
        ));
        assert!(matches!(
            planner.bring_path_to_halt(),
            Err(PlannerError::Tainted)
        ));
    }

    #[test]
    fn speed_factor_scales_subsequent_moves() {
        let mut planner = planner();
        planner.set_speed_factor(0.5);
        planner.enqueue(&pos(100.0, 0.0), 10.0).unwrap();
        planner.bring_path_to_halt().unwrap();
        // 10 mm/s halved: the cruise runs at 5 mm/s * 1000 steps/mm.
        let cruise = planner.backend().segments[1];
        assert!((cruise.v0 - 5000.0).abs() < 1.0);
    }

    #[test]
    fn aux_bits_reach_emitted_segments() {
        let mut planner = planner();
        planner.set_aux_bits(0x3);
        planner.enqueue(&pos(100.0, 0.0), 100.0).unwrap();
        planner.bring_path_to_halt().unwrap();
        assert!(planner.backend().segments.iter().all(|s| s.aux_bits == 0x3));
    }
}
