//! The segment record handed to the motor layer, and the sink consuming it.

use thiserror::Error;

use crate::axis::AXIS_COUNT;

/// One straight-line chunk of stepper motion at constant acceleration.
///
/// This record is bit-exact wire format: some deployments persist it as
/// telemetry. Step counts are signed 32-bit, the defining-axis step rates are
/// IEEE-754 single precision and never negative, and `aux_bits` passes
/// through from move metadata unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearSegmentSteps {
    /// Signed step count per logical axis.
    pub steps: [i32; AXIS_COUNT],
    /// Defining-axis step rate at the start of the segment, steps/s.
    pub v0: f32,
    /// Defining-axis step rate at the end of the segment, steps/s.
    pub v1: f32,
    /// Auxiliary output bits, opaque to the motor layer.
    pub aux_bits: u16,
}

#[derive(Debug, Error)]
#[error("motor backend rejected segment: {reason}")]
pub struct BackendError {
    pub reason: String,
}

impl BackendError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Sink consuming emitted segments in FIFO order.
///
/// The planner assumes segments are never dropped or reordered and that any
/// backpressure is hidden behind `enqueue`.
pub trait MotorBackend {
    fn enqueue(&mut self, segment: &LinearSegmentSteps) -> Result<(), BackendError>;
    fn motor_enable(&mut self, on: bool);
    fn wait_queue_empty(&mut self);
}

/// In-memory backend recording everything it is handed. Used by tests and
/// the offline planning harness.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub segments: Vec<LinearSegmentSteps>,
    pub motor_enabled: bool,
    pub queue_waits: usize,
}

impl MotorBackend for RecordingBackend {
    fn enqueue(&mut self, segment: &LinearSegmentSteps) -> Result<(), BackendError> {
        self.segments.push(*segment);
        Ok(())
    }

    fn motor_enable(&mut self, on: bool) {
        self.motor_enabled = on;
    }

    fn wait_queue_empty(&mut self) {
        self.queue_waits += 1;
    }
}
