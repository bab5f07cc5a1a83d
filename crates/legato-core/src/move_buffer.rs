//! Sliding window of pending moves and the backward pass that keeps their
//! entry/exit speeds mutually reachable.

use std::collections::VecDeque;

use crate::axis::{Axis, StepVector};

/// A move queued for planning. Speeds are step rates of the defining axis.
///
/// While a move sits in the buffer its entry and exit rates may be lowered
/// by backward propagation; they are never raised above the junction caps
/// recorded at insertion.
#[derive(Debug, Clone)]
pub struct QueuedMove {
    /// Signed step counts for the move.
    pub delta_steps: StepVector,
    /// Unit vector of the X/Y/Z component, zero if the move has no
    /// Euclidean motion.
    pub direction: [f64; 3],
    /// ‖XYZ delta‖ in mm; zero for axis-only moves.
    pub euclid_len: f64,
    /// Axis with the greatest absolute step count.
    pub defining_axis: Axis,
    /// Target defining-axis step rate after per-axis clamping, steps/s.
    pub nominal_rate: f64,
    /// Defining-axis acceleration, steps/s².
    pub accel_rate: f64,
    /// Defining-axis step rate at the start of the move.
    pub entry_rate: f64,
    /// Defining-axis step rate at the end of the move.
    pub exit_rate: f64,
    /// Junction cap negotiated with the predecessor; `entry_rate` never
    /// exceeds this.
    pub entry_desired: f64,
    /// Entry committed by an already-emitted predecessor; the backward pass
    /// must not lower it any further.
    pub entry_pinned: bool,
    /// Opaque auxiliary bits copied into every emitted segment.
    pub aux_bits: u16,
}

impl QueuedMove {
    /// Absolute step count of the defining axis.
    pub fn defining_steps(&self) -> u32 {
        self.delta_steps[self.defining_axis].unsigned_abs()
    }

    /// Steps of `axis` per step of the defining axis, signed.
    pub fn rate_ratio(&self, axis: Axis) -> f64 {
        let defining = self.delta_steps[self.defining_axis];
        debug_assert!(defining != 0, "queued move without defining steps");
        f64::from(self.delta_steps[axis]) / f64::from(defining)
    }
}

/// Highest entry rate from which `exit_rate` is still reachable by
/// decelerating over the whole move.
fn reachable_entry(exit_rate: f64, accel_rate: f64, defining_steps: u32) -> f64 {
    (exit_rate * exit_rate + 2.0 * accel_rate * f64::from(defining_steps)).sqrt()
}

/// Ordered window of queued moves. Insertion runs the backward pass so that
/// every adjacent pair shares its junction rate and every move can reach its
/// exit rate within its own length.
#[derive(Debug, Default)]
pub struct MoveBuffer {
    moves: VecDeque<QueuedMove>,
}

impl MoveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn last(&self) -> Option<&QueuedMove> {
        self.moves.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedMove> {
        self.moves.iter()
    }

    /// Append a move joining its predecessor at `junction_rate`, then
    /// re-run the reachability sweeps over the window.
    pub fn push(&mut self, mut mv: QueuedMove, junction_rate: f64) {
        let entry = junction_rate.min(mv.nominal_rate);
        mv.entry_desired = entry;
        mv.entry_rate = entry;
        mv.exit_rate = 0.0; // tentative terminal
        mv.entry_pinned = false;
        self.moves.push_back(mv);
        self.backward_pass();
        self.forward_pass();
    }

    /// Force the tail to come to a halt and restore reachability.
    pub fn force_halt(&mut self) {
        if let Some(last) = self.moves.back_mut() {
            last.exit_rate = 0.0;
            self.backward_pass();
            self.forward_pass();
        }
    }

    /// Pop the head for shaping. The new head's entry becomes pinned: its
    /// predecessor's segments are already on the wire.
    pub fn pop_for_emit(&mut self) -> Option<QueuedMove> {
        let mv = self.moves.pop_front()?;
        if let Some(head) = self.moves.front_mut() {
            head.entry_pinned = true;
        }
        Some(mv)
    }

    /// Sweep from the tail towards the head: each move's entry becomes the
    /// junction cap negotiated at insertion, lowered to what the
    /// deceleration budget can deliver given its (just recomputed)
    /// successor entry, and is mirrored into the predecessor's exit. A
    /// pinned head entry is committed on the wire and is left alone.
    fn backward_pass(&mut self) {
        for idx in (0..self.moves.len()).rev() {
            let mv = &self.moves[idx];
            let cap = reachable_entry(mv.exit_rate, mv.accel_rate, mv.defining_steps());
            let new_entry = if mv.entry_pinned {
                if cap < mv.entry_rate {
                    // The predecessor is already emitted at this rate;
                    // shaping absorbs the shortfall instead (known
                    // short-move limit).
                    tracing::warn!(
                        entry = mv.entry_rate,
                        reachable = cap,
                        "pinned entry exceeds deceleration budget"
                    );
                }
                mv.entry_rate
            } else {
                mv.entry_desired.min(cap)
            };
            self.moves[idx].entry_rate = new_entry;
            if idx > 0 {
                self.moves[idx - 1].exit_rate = new_entry;
            }
        }
    }

    /// Sweep head to tail, lowering each successor's entry to what its
    /// predecessor can accelerate to. Keeps the symmetric half of the
    /// reachability invariant; backward reachability is unaffected since a
    /// lowered exit always stays within its own move's deceleration budget.
    fn forward_pass(&mut self) {
        for idx in 0..self.moves.len().saturating_sub(1) {
            let mv = &self.moves[idx];
            let cap = reachable_entry(mv.entry_rate, mv.accel_rate, mv.defining_steps());
            let next = &mut self.moves[idx + 1];
            if next.entry_rate > cap {
                next.entry_rate = cap;
            }
            let next_entry = next.entry_rate;
            self.moves[idx].exit_rate = next_entry;
        }
        debug_assert!(self.speeds_consistent());
    }

    #[cfg(debug_assertions)]
    fn speeds_consistent(&self) -> bool {
        // Adjacent moves share the junction rate and every move keeps
        // 0 <= entry, exit <= nominal.
        let mut ok = true;
        let mut prev_exit = None;
        for mv in &self.moves {
            ok &= mv.entry_rate >= 0.0 && mv.entry_rate <= mv.nominal_rate + 1e-9;
            ok &= mv.exit_rate >= 0.0 && mv.exit_rate <= mv.nominal_rate + 1e-9;
            if let Some(exit) = prev_exit {
                ok &= mv.entry_rate == exit;
            }
            prev_exit = Some(mv.exit_rate);
        }
        ok
    }

    #[cfg(not(debug_assertions))]
    fn speeds_consistent(&self) -> bool {
        true
    }
}
