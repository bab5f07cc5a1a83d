use crate::config::Profile;
use anyhow::{Context, Result};
use clap::Args;
use legato_core::{AxesRegister, Axis, Planner, RecordingBackend};
use serde::Deserialize;
use std::{fs, path::PathBuf};

#[derive(Args)]
pub struct PlanArgs {
    /// Path to the machine profile (TOML or JSON).
    #[arg(long)]
    pub profile: PathBuf,

    /// Move stream: one JSON object per line, absolute target positions in
    /// mm plus a feedrate, e.g. {"x": 10.0, "y": 5.0, "f": 50.0}.
    pub moves: PathBuf,

    /// Only print the summary, not every segment.
    #[arg(long)]
    pub quiet: bool,
}

/// One line of the move stream. Axes left out stay where they are.
#[derive(Debug, Deserialize)]
struct MoveRecord {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    e: Option<f64>,
    a: Option<f64>,
    b: Option<f64>,
    c: Option<f64>,
    /// Feedrate, mm/s.
    f: f64,
}

impl MoveRecord {
    fn target(&self, current: &AxesRegister) -> AxesRegister {
        let mut target = *current;
        for (axis, value) in [
            (Axis::X, self.x),
            (Axis::Y, self.y),
            (Axis::Z, self.z),
            (Axis::E, self.e),
            (Axis::A, self.a),
            (Axis::B, self.b),
            (Axis::C, self.c),
        ] {
            if let Some(value) = value {
                target[axis] = value;
            }
        }
        target
    }
}

impl PlanArgs {
    pub fn run(&self) -> Result<()> {
        tracing_subscriber::fmt::init();

        let profile = Profile::from_file(&self.profile)?;
        let config = profile.to_machine_config()?;

        let mut planner = Planner::new(config, RecordingBackend::default())
            .context("failed to construct planner")?;

        let stream = fs::read_to_string(&self.moves)
            .with_context(|| format!("failed to read move stream {}", self.moves.display()))?;

        let mut enqueued = 0usize;
        for (lineno, line) in stream.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record: MoveRecord = serde_json::from_str(line)
                .with_context(|| format!("bad move record on line {}", lineno + 1))?;
            let target = record.target(&planner.position());
            planner
                .enqueue(&target, record.f)
                .with_context(|| format!("failed to enqueue move on line {}", lineno + 1))?;
            enqueued += 1;
        }

        planner
            .bring_path_to_halt()
            .context("failed to flush the planned path")?;

        tracing::info!(moves = enqueued, "move stream planned");
        let backend = planner.into_backend();

        if !self.quiet {
            println!("{:>4}  {:>42}  {:>12}  {:>12}", "#", "steps (X Y Z E A B C)", "v0", "v1");
            for (index, segment) in backend.segments.iter().enumerate() {
                let steps = segment
                    .steps
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                println!(
                    "{index:>4}  {steps:>42}  {:>12.1}  {:>12.1}",
                    segment.v0, segment.v1
                );
            }
        }

        let mut totals = [0i64; legato_core::AXIS_COUNT];
        for segment in &backend.segments {
            for (total, steps) in totals.iter_mut().zip(segment.steps) {
                *total += i64::from(steps);
            }
        }
        println!(
            "{} segments from {} moves; net steps: {:?}",
            backend.segments.len(),
            enqueued,
            totals
        );
        Ok(())
    }
}
