use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;
mod config;

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Plan(args) => args.run(),
        Command::Check(args) => args.run(),
    }
}

#[derive(Parser)]
#[command(name = "legato", about = "Offline tooling for the legato motion planner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a move stream against a machine profile and print the emitted
    /// step segments.
    Plan(cli::plan::PlanArgs),
    /// Load and validate a machine profile.
    Check(cli::check::CheckArgs),
}
